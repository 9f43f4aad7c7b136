//! Transports and JSON-RPC correlation for proxy probing.
//!
//! A proxy speaks JSON-RPC in text frames and tunnels raw bytes in binary
//! frames over one duplex transport. [`Transport`] abstracts that socket as
//! an event source; [`WsConnector`] is the WebSocket implementation and
//! [`memory`] offers a scripted in-process one. [`RpcChannel`] layers
//! request ids and response matching on top.

pub mod correlator;
pub mod memory;
pub mod transport;
pub mod ws;

pub use correlator::{RpcChannel, RpcCounter, RpcError};
pub use transport::{
    Connector, Frame, ReadyState, Transport, TransportError, TransportEvent, arm_message,
    wait_message, wait_open,
};
pub use ws::WsConnector;
