//! The transport seam: a duplex socket seen as an event source.

use std::sync::Arc;
use std::time::Duration;

use proxyprobe_core::{Armed, ListenerHub, SettleError, arm_event};
use thiserror::Error;
use url::Url;

/// One message on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Binary(_) => "binary",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Open,
    Message(Frame),
    Error(String),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closing,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport is not open ({0:?})")]
    NotOpen(ReadyState),
    #[error("transport writer has shut down")]
    WriterGone,
}

/// A duplex connection to a proxy.
///
/// Progress is reported through [`Transport::events`]; nothing is buffered
/// for listeners that register late, so callers arm before they trigger.
pub trait Transport: Send + Sync {
    fn events(&self) -> &ListenerHub<TransportEvent>;

    fn ready_state(&self) -> ReadyState;

    fn send(&self, frame: Frame) -> Result<(), TransportError>;

    /// Begin closing. Calling it again is a no-op.
    fn close(&self);
}

/// Opens transports. The returned transport starts out `Connecting` and
/// emits `Open` (or `Error` then `Close`) later.
pub trait Connector: Send + Sync {
    fn connect(&self, url: &Url) -> Arc<dyn Transport>;
}

/// Wait for the transport to open.
pub async fn wait_open(transport: &dyn Transport, timeout: Duration) -> Result<(), SettleError> {
    let armed = arm_event(transport.events(), Some(timeout), |event| match event {
        TransportEvent::Open => Some(Ok(())),
        TransportEvent::Error(reason) => Some(Err(SettleError::Error(reason.clone()))),
        TransportEvent::Close => Some(Err(SettleError::Closed)),
        TransportEvent::Message(_) => None,
    });

    // The transport may have opened, or died, before the listener existed.
    match transport.ready_state() {
        ReadyState::Open => return Ok(()),
        ReadyState::Closing | ReadyState::Closed => return Err(SettleError::Closed),
        ReadyState::Connecting => {}
    }

    armed.wait().await
}

/// Register for the next inbound frame of either kind.
pub fn arm_message(transport: &dyn Transport, timeout: Duration) -> Armed<Frame> {
    arm_event(transport.events(), Some(timeout), |event| match event {
        TransportEvent::Message(frame) => Some(Ok(frame.clone())),
        TransportEvent::Error(reason) => Some(Err(SettleError::Error(reason.clone()))),
        TransportEvent::Close => Some(Err(SettleError::Closed)),
        TransportEvent::Open => None,
    })
}

/// Wait for the next inbound frame of either kind.
pub async fn wait_message(transport: &dyn Transport, timeout: Duration) -> Result<Frame, SettleError> {
    let armed = arm_message(transport, timeout);
    if matches!(
        transport.ready_state(),
        ReadyState::Closing | ReadyState::Closed
    ) {
        return Err(SettleError::Closed);
    }
    armed.wait().await
}
