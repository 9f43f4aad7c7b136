//! Probe orchestration for proxyprobe.
//!
//! [`Prober`] drives one session per address through the protocol steps and
//! folds every failure into an Inactive [`ProbeReport`]. [`ProbeRunner`]
//! fans sessions out over a [`CandidateSource`].

mod config;
mod error;
mod payload;
mod probe;
mod runner;
mod session;
mod source;

pub use config::{
    ConfigError, DEFAULT_CONCURRENCY, DEFAULT_GENERATE_TIMEOUT_MS, DEFAULT_GRAPH_ENDPOINT,
    DEFAULT_PAGE_SIZE, ProbeConfig, ProbeSection, RunnerSection, SourceSection, config_path,
    expand_env_vars,
};
pub use error::ProbeError;
pub use payload::CLIENT_HELLO;
pub use probe::{
    DEFAULT_SCHEME, DEFAULT_STEP_TIMEOUT, DEFAULT_TARGET_HOST, DEFAULT_TARGET_PORT, ProbeReport,
    ProbeSettings, Prober, SessionIds, UuidSessionIds,
};
pub use runner::{ProbeRunner, RunReport, RunSummary};
pub use session::{ProbeSession, TransitionError, TransportGuard};
pub use source::{CandidateSource, GraphSource, Page, PageFut, SourceError, StaticSource};

pub use proxyprobe_pow::{SecretGenerator, ThreadDelegate};
pub use proxyprobe_rpc::{Connector, WsConnector};
pub use proxyprobe_types::{ProbeState, ProxyAddress, SessionId, Verdict};
