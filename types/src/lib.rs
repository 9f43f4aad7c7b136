//! Core domain types for proxyprobe.
//!
//! Everything in this crate is plain data: addresses, identifiers, JSON-RPC
//! envelopes, the network parameters a proxy advertises, and the verdict a
//! probe session produces. No IO, no async.

mod address;
mod ids;
mod params;
mod probe;
mod rpc;
mod secret;

pub use address::{EmptyAddressError, ProxyAddress};
pub use ids::{RequestId, SessionId};
pub use params::{
    MAX_THRESHOLD_BITS, NetworkParams, QuantityError, ThresholdError, parse_quantity,
    threshold_ceiling,
};
pub use probe::{ProbeState, Verdict};
pub use rpc::{JSONRPC_VERSION, RemoteError, RpcOutcome, RpcRequest, RpcResponse};
pub use secret::{BLOCK_BYTES, BlockLengthError, GeneratedSecret};
