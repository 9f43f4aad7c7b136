//! WebSocket transport backed by `tokio-tungstenite`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use proxyprobe_core::ListenerHub;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::transport::{Connector, Frame, ReadyState, Transport, TransportError, TransportEvent};

/// Upper bound on flushing our close frame once a close was requested.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

enum WriterCommand {
    Send(Frame),
    Close,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the handle and its socket task.
struct Shared {
    hub: ListenerHub<TransportEvent>,
    state: Mutex<ReadyState>,
}

impl Shared {
    fn mark_open(&self) -> bool {
        let mut state = lock(&self.state);
        if *state == ReadyState::Connecting {
            *state = ReadyState::Open;
            true
        } else {
            false
        }
    }

    fn fail(&self, reason: String) {
        self.hub.emit(&TransportEvent::Error(reason));
    }

    fn finish(&self) {
        *lock(&self.state) = ReadyState::Closed;
        self.hub.emit(&TransportEvent::Close);
    }
}

/// Opens one WebSocket per `connect` call, each driven by its own task.
///
/// Must be used from inside a Tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

impl WsConnector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WsConnector {
    fn connect(&self, url: &Url) -> Arc<dyn Transport> {
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            hub: ListenerHub::new(),
            state: Mutex::new(ReadyState::Connecting),
        });
        tokio::spawn(run_socket(Arc::clone(&shared), url.clone(), writer_rx));
        Arc::new(WsTransport { shared, writer_tx })
    }
}

/// Handle to a socket task. Dropping it without `close` still tears the
/// socket down once the task notices the writer channel is gone.
pub struct WsTransport {
    shared: Arc<Shared>,
    writer_tx: mpsc::UnboundedSender<WriterCommand>,
}

impl Transport for WsTransport {
    fn events(&self) -> &ListenerHub<TransportEvent> {
        &self.shared.hub
    }

    fn ready_state(&self) -> ReadyState {
        *lock(&self.shared.state)
    }

    fn send(&self, frame: Frame) -> Result<(), TransportError> {
        let state = self.ready_state();
        if state != ReadyState::Open {
            return Err(TransportError::NotOpen(state));
        }
        self.writer_tx
            .send(WriterCommand::Send(frame))
            .map_err(|_| TransportError::WriterGone)
    }

    fn close(&self) {
        {
            let mut state = lock(&self.shared.state);
            match *state {
                ReadyState::Connecting | ReadyState::Open => *state = ReadyState::Closing,
                ReadyState::Closing | ReadyState::Closed => return,
            }
        }
        let _ = self.writer_tx.send(WriterCommand::Close);
    }
}

fn into_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::text(text),
        Frame::Binary(bytes) => Message::binary(bytes),
    }
}

async fn run_socket(
    shared: Arc<Shared>,
    url: Url,
    mut writer_rx: mpsc::UnboundedReceiver<WriterCommand>,
) {
    let stream = tokio::select! {
        connected = tokio_tungstenite::connect_async(url.as_str()) => match connected {
            Ok((stream, _response)) => stream,
            Err(e) => {
                tracing::debug!(url = %url, "WebSocket connect failed: {e}");
                shared.fail(e.to_string());
                shared.finish();
                return;
            }
        },
        // Only a close request (or a dropped handle) can arrive before open.
        _ = writer_rx.recv() => {
            shared.finish();
            return;
        }
    };

    if shared.mark_open() {
        shared.hub.emit(&TransportEvent::Open);
    }

    let (mut sink, mut incoming) = stream.split();
    loop {
        tokio::select! {
            command = writer_rx.recv() => match command {
                Some(WriterCommand::Send(frame)) => {
                    if let Err(e) = sink.send(into_message(frame)).await {
                        tracing::warn!(url = %url, "WebSocket write error: {e}");
                        shared.fail(e.to_string());
                        break;
                    }
                }
                Some(WriterCommand::Close) | None => {
                    let _ = tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, sink.close()).await;
                    break;
                }
            },
            message = incoming.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    shared
                        .hub
                        .emit(&TransportEvent::Message(Frame::Text(text.as_str().to_owned())));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    shared
                        .hub
                        .emit(&TransportEvent::Message(Frame::Binary(bytes.to_vec())));
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(url = %url, "WebSocket read error: {e}");
                    shared.fail(e.to_string());
                    break;
                }
            }
        }
    }

    shared.finish();
}
