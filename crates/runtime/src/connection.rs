//! RPC connection layer between the host and the worker process.
//!
//! This module implements request/response correlation and inbound
//! notification dispatch on top of the pipe transport. It handles:
//! - Generating unique request IDs
//! - Correlating responses with pending requests
//! - Distinguishing notifications from responses
//! - Dispatching typed notifications to a registered handler
//!
//! # Message Flow
//!
//! 1. The host calls [`Connection::call`] (awaitable) or
//!    [`Connection::post`] (fire-and-forget)
//! 2. For calls, the connection allocates an ID and a oneshot channel
//! 3. The frame is queued to the writer task and written to the worker
//! 4. The run loop receives frames from the worker
//! 5. Responses are correlated by ID; notifications are decoded into
//!    [`WorkerNotification`] and handed to the [`IncomingHandler`]
//!
//! The handler may be registered after the transport is attached: frames
//! arriving in between sit in the transport channel and are only pumped
//! once [`Connection::run`] starts, so none are dropped.

use crate::error::{Error, Result};
use crate::transport::{Transport, TransportParts, TransportReceiver};
use oophost_protocol::{ErrorPayload, Message, Notification, Request, WorkerNotification};
use parking_lot::{Mutex as ParkingLotMutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::task::{Context, Poll};
use tokio::sync::Mutex as TokioMutex;
use tokio::sync::{mpsc, oneshot};

/// Incoming-dispatch target for worker notifications.
///
/// Runs on the connection's dispatch context; implementations must not
/// block. Per-browser ordering follows the dispatch loop: notifications are
/// delivered in the order the worker emitted them.
pub trait IncomingHandler: Send + Sync {
    /// Handles one decoded worker notification.
    fn handle_notification(&self, notification: WorkerNotification);

    /// Called once when the session closes (worker EOF or local disposal).
    fn handle_session_closed(&self);
}

/// Pending request callbacks keyed by request ID.
type CallbackMap = Arc<TokioMutex<HashMap<u32, oneshot::Sender<Result<Value>>>>>;

/// RAII guard ensuring callback cleanup when a request future is dropped.
struct CancelGuard {
    id: u32,
    callbacks: CallbackMap,
    completed: bool,
}

impl CancelGuard {
    fn new(id: u32, callbacks: CallbackMap) -> Self {
        Self {
            id,
            callbacks,
            completed: false,
        }
    }

    fn complete(&mut self) {
        self.completed = true;
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if self.completed {
            return;
        }

        let id = self.id;
        let callbacks = Arc::clone(&self.callbacks);

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if callbacks.lock().await.remove(&id).is_some() {
                    tracing::debug!(id, "CancelGuard: removed orphaned callback");
                }
            });
        }
    }
}

/// Future returned by [`Connection::call`] with automatic cancellation cleanup.
struct ResponseFuture {
    rx: oneshot::Receiver<Result<Value>>,
    guard: CancelGuard,
}

impl Future for ResponseFuture {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(result) => {
                self.guard.complete();
                Poll::Ready(result.map_err(|_| Error::SessionClosed).and_then(|r| r))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// RPC connection to the worker process.
///
/// Manages request/response correlation and notification dispatch. Uses
/// sequential request IDs and oneshot channels for correlation. Once the
/// session closes, every outbound operation fails fast with
/// [`Error::SessionClosed`].
pub struct Connection {
    /// Sequential request ID counter
    last_id: AtomicU32,
    /// Pending request callbacks keyed by request ID
    callbacks: CallbackMap,
    /// Channel for queueing outbound frames to the writer task
    outbound_tx: ParkingLotMutex<Option<mpsc::UnboundedSender<Value>>>,
    /// Transport sender (taken by run() to start the writer task)
    transport_sender: TokioMutex<Option<Box<dyn Transport>>>,
    /// Transport receiver (taken by run() to start the reader task)
    transport_receiver: TokioMutex<Option<Box<dyn TransportReceiver>>>,
    /// Incoming frames decoded by the transport receiver
    message_rx: TokioMutex<Option<mpsc::UnboundedReceiver<Value>>>,
    /// Outbound frame queue (taken by run() to start the writer task)
    outbound_rx: TokioMutex<Option<mpsc::UnboundedReceiver<Value>>>,
    /// Dispatch target, registerable after attachment
    handler: RwLock<Option<Arc<dyn IncomingHandler>>>,
    /// Set once the session is closed in either direction
    closed: AtomicBool,
}

impl Connection {
    /// Creates a new connection over the given transport.
    pub fn new(parts: TransportParts) -> Self {
        let TransportParts {
            sender,
            receiver,
            message_rx,
        } = parts;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        Self {
            last_id: AtomicU32::new(0),
            callbacks: Arc::new(TokioMutex::new(HashMap::new())),
            outbound_tx: ParkingLotMutex::new(Some(outbound_tx)),
            transport_sender: TokioMutex::new(Some(sender)),
            transport_receiver: TokioMutex::new(Some(receiver)),
            message_rx: TokioMutex::new(Some(message_rx)),
            outbound_rx: TokioMutex::new(Some(outbound_rx)),
            handler: RwLock::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Registers the incoming-dispatch target.
    ///
    /// May be called after the transport is already attached; frames that
    /// arrived in the meantime are still buffered and will be dispatched
    /// once the run loop pumps them.
    pub fn set_handler(&self, handler: Arc<dyn IncomingHandler>) {
        *self.handler.write() = Some(handler);
    }

    /// Returns true once the session is closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Sends a request to the worker and awaits the correlated response.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        if self.is_closed() {
            return Err(Error::SessionClosed);
        }

        let id = self.last_id.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(id, method, "sending request");

        let (tx, rx) = oneshot::channel();
        self.callbacks.lock().await.insert(id, tx);

        let guard = CancelGuard::new(id, Arc::clone(&self.callbacks));

        let request = Request {
            id,
            method: method.to_string(),
            params,
        };
        let frame = serde_json::to_value(&request)?;

        self.queue_frame(frame)?;

        ResponseFuture { rx, guard }.await
    }

    /// Sends a one-way notification to the worker.
    ///
    /// Best-effort by contract: this reports queueing failures, but no
    /// acknowledgement ever arrives for the frame itself.
    pub fn post(&self, method: &str, params: Value) -> Result<()> {
        if self.is_closed() {
            return Err(Error::SessionClosed);
        }

        tracing::debug!(method, "posting notification");

        let notification = Notification {
            method: method.to_string(),
            params,
        };
        self.queue_frame(serde_json::to_value(&notification)?)
    }

    fn queue_frame(&self, frame: Value) -> Result<()> {
        let guard = self.outbound_tx.lock();
        let tx = guard.as_ref().ok_or(Error::SessionClosed)?;
        tx.send(frame).map_err(|_| Error::SessionClosed)
    }

    /// Runs the message dispatch loop until the worker closes its end.
    ///
    /// Spawns the transport reader and writer tasks, then pumps incoming
    /// frames. When the loop ends the session is closed: pending calls fail
    /// with [`Error::SessionClosed`] and the handler's closed hook fires.
    pub async fn run(self: &Arc<Self>) {
        let transport_receiver = self
            .transport_receiver
            .lock()
            .await
            .take()
            .expect("run() can only be called once - transport receiver already taken");

        let mut transport_sender = self
            .transport_sender
            .lock()
            .await
            .take()
            .expect("run() can only be called once - transport sender already taken");

        let mut outbound_rx = self
            .outbound_rx
            .lock()
            .await
            .take()
            .expect("run() can only be called once - outbound receiver already taken");

        let reader_handle = tokio::spawn(async move {
            if let Err(e) = transport_receiver.run().await {
                tracing::error!("transport read error: {e}");
            }
        });

        // A write failure is terminal for the whole session, not just the
        // frame that hit it: close so pending and future calls fail fast
        // instead of pending forever while the read side stays open.
        let writer_connection = Arc::clone(self);
        let writer_handle = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if let Err(e) = transport_sender.send(frame).await {
                    tracing::error!("transport write error: {e}");
                    writer_connection.close().await;
                    break;
                }
            }
        });

        let mut message_rx = self
            .message_rx
            .lock()
            .await
            .take()
            .expect("run() can only be called once - message receiver already taken");

        while let Some(frame) = message_rx.recv().await {
            match serde_json::from_value::<Message>(frame) {
                Ok(message) => self.dispatch_internal(message).await,
                Err(e) => tracing::error!("failed to parse frame: {e}"),
            }
        }

        // Worker closed its stdout (or the transport failed): terminal.
        self.close().await;

        let _ = reader_handle.await;
        let _ = writer_handle.await;
    }

    /// Closes the session: fails pending calls, drops the outbound queue,
    /// and fires the handler's closed hook exactly once.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.outbound_tx.lock().take();

        let mut callbacks = self.callbacks.lock().await;
        for (_, tx) in callbacks.drain() {
            let _ = tx.send(Err(Error::SessionClosed));
        }
        drop(callbacks);

        let handler = self.handler.read().clone();
        if let Some(handler) = handler {
            handler.handle_session_closed();
        }
    }

    /// Dispatch an incoming message (test-only public version).
    #[cfg(test)]
    pub async fn dispatch(self: &Arc<Self>, message: Message) {
        self.dispatch_internal(message).await;
    }

    async fn dispatch_internal(self: &Arc<Self>, message: Message) {
        match message {
            Message::Response(response) => {
                let callback = self.callbacks.lock().await.remove(&response.id);
                match callback {
                    Some(tx) => {
                        let result = if let Some(error) = response.error {
                            Err(remote_error(error))
                        } else {
                            Ok(response.result.unwrap_or(Value::Null))
                        };
                        let _ = tx.send(result);
                    }
                    None => {
                        // Response for a cancelled or unknown request.
                        tracing::warn!(id = response.id, "response with no pending request");
                    }
                }
            }
            Message::Notification(notification) => {
                match WorkerNotification::decode(&notification.method, notification.params) {
                    Ok(decoded) => {
                        let handler = self.handler.read().clone();
                        match handler {
                            Some(handler) => handler.handle_notification(decoded),
                            None => tracing::warn!(
                                method = notification.method,
                                "notification before handler registration"
                            ),
                        }
                    }
                    Err(e) => {
                        // Tolerated protocol violation: log, never fatal.
                        let violation = Error::from(e);
                        tracing::warn!("undecodable notification: {violation}");
                    }
                }
            }
            Message::Unknown(value) => {
                tracing::debug!(
                    "unknown frame shape (ignored): {}",
                    serde_json::to_string(&value).unwrap_or_else(|_| "<unprintable>".to_string())
                );
            }
        }
    }
}

/// Converts a worker [`ErrorPayload`] into [`Error::Remote`].
fn remote_error(error: ErrorPayload) -> Error {
    Error::Remote {
        name: error.name.unwrap_or_else(|| "Error".to_string()),
        message: error.message,
        stack: error.stack,
    }
}
