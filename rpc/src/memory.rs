//! In-process transport for tests and dry runs.
//!
//! A [`MemoryTransport`] never touches the network. Outbound frames are
//! recorded and handed to an optional responder, whose returned events are
//! emitted synchronously before `send` returns.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use proxyprobe_core::ListenerHub;
use url::Url;

use crate::transport::{Connector, Frame, ReadyState, Transport, TransportError, TransportEvent};

type Responder = Box<dyn FnMut(&Frame) -> Vec<TransportEvent> + Send>;
type Factory = Box<dyn Fn(&Url) -> Arc<MemoryTransport> + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct MemoryTransport {
    hub: ListenerHub<TransportEvent>,
    state: Mutex<ReadyState>,
    sent: Mutex<Vec<Frame>>,
    responder: Mutex<Option<Responder>>,
    close_calls: AtomicUsize,
}

impl MemoryTransport {
    /// A transport still `Connecting`; drive it with [`open`](Self::open) or
    /// [`fail`](Self::fail).
    #[must_use]
    pub fn new() -> Self {
        Self::with_state(ReadyState::Connecting)
    }

    /// A transport that is already `Open`.
    #[must_use]
    pub fn opened() -> Self {
        Self::with_state(ReadyState::Open)
    }

    fn with_state(state: ReadyState) -> Self {
        Self {
            hub: ListenerHub::new(),
            state: Mutex::new(state),
            sent: Mutex::new(Vec::new()),
            responder: Mutex::new(None),
            close_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_responder<F>(self, responder: F) -> Self
    where
        F: FnMut(&Frame) -> Vec<TransportEvent> + Send + 'static,
    {
        *lock(&self.responder) = Some(Box::new(responder));
        self
    }

    pub fn open(&self) {
        self.apply(TransportEvent::Open);
    }

    /// Report a connection failure: `Error` followed by `Close`.
    pub fn fail(&self, reason: impl Into<String>) {
        self.apply(TransportEvent::Error(reason.into()));
        self.apply(TransportEvent::Close);
    }

    pub fn deliver(&self, frame: Frame) {
        self.apply(TransportEvent::Message(frame));
    }

    #[must_use]
    pub fn sent(&self) -> Vec<Frame> {
        lock(&self.sent).clone()
    }

    /// Outbound text frames decoded as JSON; anything else is skipped.
    #[must_use]
    pub fn sent_json(&self) -> Vec<serde_json::Value> {
        lock(&self.sent)
            .iter()
            .filter_map(|frame| match frame {
                Frame::Text(text) => serde_json::from_str(text).ok(),
                Frame::Binary(_) => None,
            })
            .collect()
    }

    #[must_use]
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    fn apply(&self, event: TransportEvent) {
        {
            let mut state = lock(&self.state);
            match event {
                TransportEvent::Open => *state = ReadyState::Open,
                TransportEvent::Close => *state = ReadyState::Closed,
                TransportEvent::Message(_) | TransportEvent::Error(_) => {}
            }
        }
        self.hub.emit(&event);
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("state", &*lock(&self.state))
            .field("sent", &lock(&self.sent).len())
            .field("close_calls", &self.close_calls())
            .finish_non_exhaustive()
    }
}

impl Transport for MemoryTransport {
    fn events(&self) -> &ListenerHub<TransportEvent> {
        &self.hub
    }

    fn ready_state(&self) -> ReadyState {
        *lock(&self.state)
    }

    fn send(&self, frame: Frame) -> Result<(), TransportError> {
        let state = self.ready_state();
        if state != ReadyState::Open {
            return Err(TransportError::NotOpen(state));
        }
        lock(&self.sent).push(frame.clone());

        let replies = lock(&self.responder)
            .as_mut()
            .map(|respond| respond(&frame))
            .unwrap_or_default();
        for reply in replies {
            self.apply(reply);
        }
        Ok(())
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.ready_state() != ReadyState::Closed {
            self.apply(TransportEvent::Close);
        }
    }
}

/// Hands out transports built by a factory and remembers every request.
pub struct MemoryConnector {
    factory: Factory,
    urls: Mutex<Vec<Url>>,
    transports: Mutex<Vec<Arc<MemoryTransport>>>,
}

impl MemoryConnector {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&Url) -> Arc<MemoryTransport> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            urls: Mutex::new(Vec::new()),
            transports: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn urls(&self) -> Vec<Url> {
        lock(&self.urls).clone()
    }

    #[must_use]
    pub fn transports(&self) -> Vec<Arc<MemoryTransport>> {
        lock(&self.transports).clone()
    }
}

impl fmt::Debug for MemoryConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryConnector")
            .field("urls", &*lock(&self.urls))
            .finish_non_exhaustive()
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, url: &Url) -> Arc<dyn Transport> {
        let transport = (self.factory)(url);
        lock(&self.urls).push(url.clone());
        lock(&self.transports).push(Arc::clone(&transport));
        transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_requires_open() {
        let transport = MemoryTransport::new();
        assert_eq!(
            transport.send(Frame::Text("x".into())),
            Err(TransportError::NotOpen(ReadyState::Connecting))
        );
        transport.open();
        assert!(transport.send(Frame::Text("x".into())).is_ok());
        assert_eq!(transport.sent(), vec![Frame::Text("x".into())]);
    }

    #[test]
    fn close_counts_every_call_but_emits_once() {
        let transport = MemoryTransport::opened();
        let closes = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&closes);
        let _registration = transport.events().register(move |event| {
            if *event == TransportEvent::Close {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        });

        transport.close();
        transport.close();

        assert_eq!(transport.close_calls(), 2);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(transport.ready_state(), ReadyState::Closed);
    }

    #[test]
    fn responder_replies_are_emitted_before_send_returns() {
        let transport = MemoryTransport::opened().with_responder(|frame| match frame {
            Frame::Text(text) => vec![TransportEvent::Message(Frame::Text(text.to_uppercase()))],
            Frame::Binary(_) => Vec::new(),
        });
        let replies = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&replies);
        let _registration = transport.events().register(move |event| {
            if let TransportEvent::Message(frame) = event {
                lock(&sink).push(frame.clone());
            }
        });

        transport.send(Frame::Text("ping".into())).unwrap();
        transport.send(Frame::Binary(vec![0])).unwrap();

        assert_eq!(*lock(&replies), vec![Frame::Text("PING".into())]);
    }

    #[test]
    fn connector_records_urls_and_transports() {
        let connector = MemoryConnector::new(|_| Arc::new(MemoryTransport::opened()));
        let url = Url::parse("wss://proxy.example/?session=abc").unwrap();
        let transport = connector.connect(&url);

        assert_eq!(transport.ready_state(), ReadyState::Open);
        assert_eq!(connector.urls(), vec![url]);
        assert_eq!(connector.transports().len(), 1);
    }
}
