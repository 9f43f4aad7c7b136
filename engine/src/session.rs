//! Per-probe state and scoped transport release.

use std::ops::Deref;
use std::sync::Arc;

use proxyprobe_rpc::Transport;
use proxyprobe_types::{ProbeState, ProxyAddress, SessionId};
use thiserror::Error;

use crate::error::ProbeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot move from {from} to {to}")]
pub struct TransitionError {
    pub from: ProbeState,
    pub to: ProbeState,
}

impl From<TransitionError> for ProbeError {
    fn from(error: TransitionError) -> Self {
        ProbeError::protocol(error.from, error)
    }
}

/// One verification run. Moves strictly forward; never reused.
#[derive(Debug)]
pub struct ProbeSession {
    id: SessionId,
    address: ProxyAddress,
    state: ProbeState,
    steps: Vec<ProbeState>,
}

impl ProbeSession {
    #[must_use]
    pub fn new(id: SessionId, address: ProxyAddress) -> Self {
        Self {
            id,
            address,
            state: ProbeState::Connecting,
            steps: vec![ProbeState::Connecting],
        }
    }

    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    #[must_use]
    pub fn address(&self) -> &ProxyAddress {
        &self.address
    }

    #[must_use]
    pub fn state(&self) -> ProbeState {
        self.state
    }

    #[must_use]
    pub fn steps(&self) -> &[ProbeState] {
        &self.steps
    }

    pub fn advance(&mut self, next: ProbeState) -> Result<(), TransitionError> {
        if !self.state.can_advance_to(next) {
            return Err(TransitionError {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(step = %next, "step");
        self.state = next;
        self.steps.push(next);
        Ok(())
    }

    /// Move to `Inactive` from any non-terminal state. Returns the step that
    /// failed, or `None` when the session had already finished.
    pub fn fail(&mut self) -> Option<ProbeState> {
        let failed = self.state;
        self.advance(ProbeState::Inactive).ok().map(|()| failed)
    }

    #[must_use]
    pub fn into_steps(self) -> Vec<ProbeState> {
        self.steps
    }
}

/// Closes the wrapped transport when dropped, on every exit path.
pub struct TransportGuard {
    transport: Arc<dyn Transport>,
}

impl TransportGuard {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Another handle to the same transport. Only the guard closes it.
    #[must_use]
    pub fn shared(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }
}

impl Deref for TransportGuard {
    type Target = dyn Transport;

    fn deref(&self) -> &Self::Target {
        self.transport.as_ref()
    }
}

impl Drop for TransportGuard {
    fn drop(&mut self) {
        self.transport.close();
    }
}
