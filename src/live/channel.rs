//! Push-channel connection to the poll service.
//!
//! Owns at most one WebSocket at a time. Incoming text frames are decoded
//! into [`PollEvent`]s and handed to every registered handler. When the
//! socket drops, for whatever reason, a new one is attempted after a fixed
//! delay, forever, until [`ChannelConnection::disconnect`] is called.

use crate::live::models::PollEvent;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

pub type ChannelHandler = Arc<dyn Fn(&PollEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct Worker {
    handle: JoinHandle<()>,
    stop: watch::Sender<bool>,
}

struct Shared {
    url: String,
    reconnect_delay: Duration,
    handlers: Mutex<Vec<(HandlerId, ChannelHandler)>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    next_id: AtomicU64,
}

pub struct ChannelConnection {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl ChannelConnection {
    pub fn new(url: impl Into<String>, reconnect_delay: Duration) -> Self {
        ChannelConnection {
            shared: Arc::new(Shared {
                url: url.into(),
                reconnect_delay,
                handlers: Mutex::new(Vec::new()),
                outbound: Mutex::new(None),
                next_id: AtomicU64::new(1),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.shared.url
    }

    /// Starts the connection loop unless one is already running.
    pub fn connect(&self) {
        let mut worker = self.worker.lock();
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!("Channel cannot connect outside of a tokio runtime");
            return;
        };

        let (stop, stop_rx) = watch::channel(false);
        let handle = runtime.spawn(run(Arc::clone(&self.shared), stop_rx));
        *worker = Some(Worker { handle, stop });
    }

    /// Stops reconnecting, closes the socket and forgets every handler.
    pub fn disconnect(&self) {
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.stop.send(true);
        }
        self.shared.outbound.lock().take();
        self.shared.handlers.lock().clear();
        info!("Channel disconnected by client");
    }

    pub fn is_open(&self) -> bool {
        self.shared.outbound.lock().is_some()
    }

    pub fn on_message<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&PollEvent) + Send + Sync + 'static,
    {
        let id = HandlerId(self.shared.next_id.fetch_add(1, Ordering::SeqCst));
        self.shared.handlers.lock().push((id, Arc::new(handler)));
        id
    }

    pub fn remove_handler(&self, id: HandlerId) {
        self.shared.handlers.lock().retain(|(hid, _)| *hid != id);
    }

    pub fn handler_count(&self) -> usize {
        self.shared.handlers.lock().len()
    }

    /// Sends `event` if the socket is open. Otherwise the event is dropped
    /// with a warning; nothing is queued.
    pub fn send(&self, event: &PollEvent) {
        let outbound = self.shared.outbound.lock();
        let Some(tx) = outbound.as_ref() else {
            warn!("Channel not open, {} event not sent", event.kind());
            return;
        };

        match event.encode() {
            Ok(text) => {
                if tx.send(Message::Text(text)).is_err() {
                    warn!("Channel closed while sending {} event", event.kind());
                }
            }
            Err(e) => error!("Failed to send {} event: {}", event.kind(), e),
        }
    }
}

impl Drop for ChannelConnection {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            let _ = worker.stop.send(true);
        }
    }
}

impl Shared {
    fn dispatch_frame(&self, frame: &str) {
        let event = match PollEvent::decode(frame) {
            Ok(event) => event,
            Err(e) => {
                warn!("Failed to parse channel message: {}", e);
                return;
            }
        };
        debug!("Channel message received: {}", event.kind());

        // Handlers may add or remove handlers while running.
        let handlers: Vec<ChannelHandler> = self
            .handlers
            .lock()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in handlers {
            handler(&event);
        }
    }

    async fn session(
        &self,
        socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
        stop: &mut watch::Receiver<bool>,
    ) {
        let (mut sink, mut stream) = socket.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        *self.outbound.lock() = Some(tx);

        loop {
            tokio::select! {
                incoming = stream.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => self.dispatch_frame(&text),
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!("Channel error: {}", e);
                            break;
                        }
                    }
                }
                outgoing = rx.recv() => {
                    let Some(message) = outgoing else { break };
                    if let Err(e) = sink.send(message).await {
                        error!("Channel error: {}", e);
                        break;
                    }
                }
                _ = stop.changed() => break,
            }
        }

        self.outbound.lock().take();
        let _ = sink.close().await;
    }
}

async fn run(shared: Arc<Shared>, mut stop: watch::Receiver<bool>) {
    loop {
        if *stop.borrow() {
            return;
        }

        tokio::select! {
            connected = connect_async(shared.url.as_str()) => match connected {
                Ok((socket, _)) => {
                    info!("Channel connected to {}", shared.url);
                    shared.session(socket, &mut stop).await;
                }
                Err(e) => error!("Channel error: {}", e),
            },
            _ = stop.changed() => return,
        }

        if *stop.borrow() {
            return;
        }
        warn!(
            "Channel disconnected, retrying in {}ms",
            shared.reconnect_delay.as_millis()
        );

        tokio::select! {
            _ = tokio::time::sleep(shared.reconnect_delay) => {}
            _ = stop.changed() => return,
        }
    }
}
