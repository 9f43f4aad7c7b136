//! Session failure taxonomy.

use std::time::Duration;

use proxyprobe_core::SettleError;
use proxyprobe_pow::DelegateError;
use proxyprobe_rpc::RpcError;
use proxyprobe_types::{ProbeState, ThresholdError};
use thiserror::Error;

/// Why a probe session ended Inactive. Never escapes [`crate::Prober`].
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("{step} timed out after {}ms", .after.as_millis())]
    Timeout { step: ProbeState, after: Duration },
    #[error("protocol error while {step}: {reason}")]
    Protocol { step: ProbeState, reason: String },
    #[error("threshold rejected: {0}")]
    Validation(#[from] ThresholdError),
    #[error("secret generation failed: {0}")]
    Delegate(#[from] DelegateError),
    #[error("transport failed while {step}: {reason}")]
    Transport { step: ProbeState, reason: String },
}

impl ProbeError {
    pub(crate) fn protocol(step: ProbeState, reason: impl ToString) -> Self {
        Self::Protocol {
            step,
            reason: reason.to_string(),
        }
    }

    /// Waiting for the transport to open.
    pub(crate) fn from_open(error: SettleError) -> Self {
        match error {
            SettleError::Timeout(after) => Self::Timeout {
                step: ProbeState::Connecting,
                after,
            },
            SettleError::Error(reason) => Self::Connect(reason),
            SettleError::Closed => Self::Connect("closed before open".to_string()),
        }
    }

    /// Waiting on an open transport during `step`.
    pub(crate) fn from_settle(step: ProbeState, error: SettleError) -> Self {
        match error {
            SettleError::Timeout(after) => Self::Timeout { step, after },
            SettleError::Error(reason) => Self::Transport { step, reason },
            SettleError::Closed => Self::Transport {
                step,
                reason: "closed".to_string(),
            },
        }
    }

    pub(crate) fn from_rpc(step: ProbeState, error: RpcError) -> Self {
        match error {
            RpcError::Settle(settle) => Self::from_settle(step, settle),
            RpcError::Transport(transport) => Self::Transport {
                step,
                reason: transport.to_string(),
            },
            remote @ (RpcError::Remote { .. } | RpcError::Malformed { .. } | RpcError::Encode(_)) => {
                Self::protocol(step, remote)
            }
        }
    }

    /// Short machine-readable kind, used in JSON output.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect",
            Self::Timeout { .. } => "timeout",
            Self::Protocol { .. } => "protocol",
            Self::Validation(_) => "validation",
            Self::Delegate(_) => "delegate",
            Self::Transport { .. } => "transport",
        }
    }
}
