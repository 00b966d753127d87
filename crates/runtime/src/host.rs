//! The out-of-process host coordinator.
//!
//! [`OutOfProcessHost`] owns the worker process and the RPC session over
//! its stdio streams. It assigns browser identifiers, keeps the registry
//! mapping identifiers to the [`BrowserHandle`]s that receive worker
//! notifications, and exposes the outbound method surface.
//!
//! # Lifecycle
//!
//! ```text
//! launch() -> Launching -> AwaitingHandshake -> Ready -> Disposing -> Disposed
//! ```
//!
//! Worker exit is observable orthogonally at any point after launch; once
//! the session is closed every outbound call fails with `SessionClosed`
//! instead of blocking.

use crate::browser::BrowserHandle;
use crate::connection::{Connection, IncomingHandler};
use crate::error::{Error, Result};
use crate::process::{Settings, WorkerProcess, WorkerSupervisor};
use crate::transport::{PipeTransport, TransportParts};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use oophost_protocol::{
    BrowserId, EngineVersions, HostCall, Preferences, WindowHandle, WorkerNotification,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{oneshot, watch};

/// Bounded wait for the worker to exit after a graceful `CloseHost`.
const DISPOSE_EXIT_TIMEOUT: Duration = Duration::from_secs(3);

/// Coordinator lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    /// Worker spawned, session attaching
    Launching,
    /// Session live, waiting for the readiness handshake
    AwaitingHandshake,
    /// Handshake complete, outbound calls meaningful
    Ready,
    /// Disposal in progress
    Disposing,
    /// Session torn down by disposal
    Disposed,
    /// Worker exited on its own; session terminal
    WorkerExited,
}

/// Readiness data carried by the one-time handshake notification.
#[derive(Debug, Clone)]
pub struct Handshake {
    /// UI-thread identifier inside the worker process
    pub remote_thread_id: i32,
    /// Engine version triplet reported by the worker
    pub versions: EngineVersions,
}

/// State shared between the host and its incoming-dispatch service.
struct HostShared {
    /// Next browser identifier; per-instance, monotonic, starts at 1
    next_browser_id: AtomicI32,
    /// Browser identifier -> session handle registry
    browsers: DashMap<BrowserId, Arc<dyn BrowserHandle>>,
    /// Pending handshake resolution; taken by the first notification
    handshake_tx: Mutex<Option<oneshot::Sender<Handshake>>>,
    /// Readiness data, written exactly once
    ready: RwLock<Option<Handshake>>,
    /// Lifecycle state
    state: RwLock<HostState>,
    /// Set while dispose() runs so session-closed is not misreported
    disposing: AtomicBool,
}

/// Incoming-RPC target: routes worker notifications to the registry.
struct HostService {
    shared: Arc<HostShared>,
}

impl HostService {
    fn with_browser(&self, browser_id: BrowserId, f: impl FnOnce(&dyn BrowserHandle)) {
        match self.shared.browsers.get(&browser_id) {
            Some(handle) => f(handle.value().as_ref()),
            None => {
                // Expected race: late notifications after close are dropped.
                tracing::trace!(browser_id, "notification for unknown browser (ignored)");
            }
        }
    }

    fn resolve_handshake(&self, handshake: Handshake) {
        {
            let mut ready = self.shared.ready.write();
            if ready.is_some() {
                tracing::warn!("duplicate NotifyContextInitialized dropped");
                return;
            }
            *ready = Some(handshake.clone());
        }

        *self.shared.state.write() = HostState::Ready;

        if let Some(tx) = self.shared.handshake_tx.lock().take() {
            let _ = tx.send(handshake);
        }
    }
}

impl IncomingHandler for HostService {
    fn handle_notification(&self, notification: WorkerNotification) {
        match notification {
            WorkerNotification::ContextInitialized {
                thread_id,
                wrapper_version,
                engine_version,
                runtime_version,
            } => self.resolve_handshake(Handshake {
                remote_thread_id: thread_id,
                versions: EngineVersions {
                    wrapper: wrapper_version,
                    engine: engine_version,
                    runtime: runtime_version,
                },
            }),
            WorkerNotification::BrowserCreated {
                browser_id,
                window_handle,
            } => self.with_browser(browser_id, |b| b.on_browser_created(window_handle)),
            WorkerNotification::AddressChanged {
                browser_id,
                address,
            } => self.with_browser(browser_id, |b| b.set_address(&address)),
            WorkerNotification::TitleChanged { browser_id, title } => {
                self.with_browser(browser_id, |b| b.set_title(&title))
            }
            WorkerNotification::StatusMessage {
                browser_id,
                message,
            } => self.with_browser(browser_id, |b| b.set_status_message(&message)),
            WorkerNotification::LoadingStateChange {
                browser_id,
                can_go_back,
                can_go_forward,
                is_loading,
            } => self.with_browser(browser_id, |b| {
                b.set_loading_state(can_go_back, can_go_forward, is_loading)
            }),
            WorkerNotification::DevToolsReady { browser_id } => {
                self.with_browser(browser_id, |b| b.on_dev_tools_ready())
            }
            WorkerNotification::DevToolsMessage {
                browser_id,
                message,
            } => self.with_browser(browser_id, |b| b.on_dev_tools_message(&message)),
            WorkerNotification::DevToolsAgentDetached { browser_id } => {
                self.with_browser(browser_id, |b| b.on_dev_tools_agent_detached())
            }
        }
    }

    fn handle_session_closed(&self) {
        // Fail a still-pending handshake rather than leaving it hanging.
        self.shared.handshake_tx.lock().take();

        if !self.shared.disposing.load(Ordering::SeqCst) {
            let mut state = self.shared.state.write();
            if !matches!(*state, HostState::Disposed | HostState::Disposing) {
                *state = HostState::WorkerExited;
            }
        }
    }
}

/// Coordinator for one worker process and the browsers inside it.
pub struct OutOfProcessHost {
    connection: Arc<Connection>,
    shared: Arc<HostShared>,
    supervisor: Option<WorkerSupervisor>,
    handshake_rx: Mutex<Option<oneshot::Receiver<Handshake>>>,
    close_host_sent: AtomicBool,
    ui_thread: std::thread::ThreadId,
}

impl std::fmt::Debug for OutOfProcessHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutOfProcessHost")
            .field("ui_thread", &self.ui_thread)
            .finish_non_exhaustive()
    }
}

impl OutOfProcessHost {
    /// Spawns the worker executable and waits for the readiness handshake.
    ///
    /// Path validation fails before any process is spawned. The wait has
    /// no timeout; wrap in `tokio::time::timeout` if a bound is needed.
    /// If the worker exits before signalling readiness this fails with
    /// [`Error::SessionClosed`] instead of hanging.
    pub async fn launch(path: impl AsRef<Path>, settings: Settings) -> Result<Self> {
        let mut worker = WorkerProcess::launch(path.as_ref(), &settings)?;
        let (stdin, stdout) = worker.take_stdio()?;

        let (transport, message_rx) = PipeTransport::new(stdin, stdout);
        let parts = transport.into_transport_parts(message_rx);

        let host = Self::attach_parts(parts, Some(worker));
        host.initialized().await?;
        Ok(host)
    }

    /// Binds to an already-running worker over arbitrary byte streams.
    ///
    /// `writer` is the worker's input, `reader` its output. No process is
    /// supervised; the session ends when the streams close. Callers await
    /// [`OutOfProcessHost::initialized`] before issuing browser calls.
    pub fn attach<W, R>(writer: W, reader: R) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (transport, message_rx) = PipeTransport::new(writer, reader);
        let parts = transport.into_transport_parts(message_rx);
        Self::attach_parts(parts, None)
    }

    fn attach_parts(parts: TransportParts, worker: Option<WorkerProcess>) -> Self {
        let connection = Arc::new(Connection::new(parts));
        let (handshake_tx, handshake_rx) = oneshot::channel();

        let shared = Arc::new(HostShared {
            next_browser_id: AtomicI32::new(1),
            browsers: DashMap::new(),
            handshake_tx: Mutex::new(Some(handshake_tx)),
            ready: RwLock::new(None),
            state: RwLock::new(HostState::Launching),
            disposing: AtomicBool::new(false),
        });

        // The service needs the live session before it becomes a dispatch
        // target; registration after attachment drops no frames because
        // run() has not started pumping yet.
        connection.set_handler(Arc::new(HostService {
            shared: Arc::clone(&shared),
        }));

        let run_connection = Arc::clone(&connection);
        tokio::spawn(async move { run_connection.run().await });

        let supervisor = worker.map(|w| w.into_supervisor(Some(Arc::clone(&connection))));

        *shared.state.write() = HostState::AwaitingHandshake;

        Self {
            connection,
            shared,
            supervisor,
            handshake_rx: Mutex::new(Some(handshake_rx)),
            close_host_sent: AtomicBool::new(false),
            ui_thread: std::thread::current().id(),
        }
    }

    /// Waits for the one-time readiness handshake.
    ///
    /// Resolves immediately if the handshake already happened; fails with
    /// [`Error::SessionClosed`] if the worker exits first.
    pub async fn initialized(&self) -> Result<Handshake> {
        if let Some(handshake) = self.shared.ready.read().clone() {
            return Ok(handshake);
        }

        let rx = self
            .handshake_rx
            .lock()
            .take()
            .ok_or(Error::SessionClosed)?;
        rx.await.map_err(|_| Error::SessionClosed)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> HostState {
        *self.shared.state.read()
    }

    /// Engine versions, available once [`HostState::Ready`].
    pub fn versions(&self) -> Option<EngineVersions> {
        self.shared.ready.read().as_ref().map(|h| h.versions.clone())
    }

    /// UI-thread identifier inside the worker, available once ready.
    pub fn remote_thread_id(&self) -> Option<i32> {
        self.shared.ready.read().as_ref().map(|h| h.remote_thread_id)
    }

    /// The local thread that constructed this host.
    pub fn ui_thread_id(&self) -> std::thread::ThreadId {
        self.ui_thread
    }

    /// Exit code of the worker, once it has exited. Diagnostic only.
    pub fn exit_code(&self) -> Option<i32> {
        self.supervisor.as_ref().and_then(|s| s.exit_code())
    }

    /// Watch channel flipping from `None` to `Some(code)` on worker exit.
    ///
    /// The cross-context stop signal: an embedding run loop selects on it
    /// to shut itself down when the worker goes away.
    pub fn exited(&self) -> Option<watch::Receiver<Option<i32>>> {
        self.supervisor.as_ref().map(|s| s.exited())
    }

    /// Asks the worker to create a browser under `parent_window_handle`.
    ///
    /// The identifier is assigned locally before the call is issued; the
    /// returned flag reports the registry insertion, which only fails on
    /// an internal sequencing bug since identifiers are host-owned and
    /// monotonic.
    pub fn create_browser(
        &self,
        handle: Arc<dyn BrowserHandle>,
        parent_window_handle: WindowHandle,
        url: &str,
        preferences: Option<Preferences>,
    ) -> Result<(bool, BrowserId)> {
        let browser_id = self.shared.next_browser_id.fetch_add(1, Ordering::SeqCst);

        self.post(HostCall::CreateBrowser {
            parent_window_handle,
            url: url.to_string(),
            browser_id,
            preferences,
        })?;

        let ok = match self.shared.browsers.entry(browser_id) {
            Entry::Vacant(entry) => {
                entry.insert(handle);
                true
            }
            Entry::Occupied(_) => {
                tracing::error!(browser_id, "duplicate browser identifier in registry");
                false
            }
        };

        Ok((ok, browser_id))
    }

    /// Closes a browser and removes it from the registry.
    ///
    /// In-flight notifications for the identifier may still arrive and are
    /// silently dropped.
    pub fn close_browser(&self, browser_id: BrowserId) -> Result<()> {
        self.post(HostCall::CloseBrowser { browser_id })?;
        self.shared.browsers.remove(&browser_id);
        Ok(())
    }

    /// Sets whether a browser has focus.
    pub fn set_focus(&self, browser_id: BrowserId, focused: bool) -> Result<()> {
        self.post(HostCall::SetFocus {
            browser_id,
            focused,
        })
    }

    /// Tells the worker the hosting control started a move or resize.
    pub fn notify_move_or_resize_started(&self, browser_id: BrowserId) -> Result<()> {
        self.post(HostCall::NotifyMoveOrResizeStarted { browser_id })
    }

    /// Delivers a DevTools protocol message, awaiting the acknowledgement.
    pub async fn send_dev_tools_message(
        &self,
        browser_id: BrowserId,
        message: &str,
    ) -> Result<Value> {
        let call = HostCall::SendDevToolsMessage {
            browser_id,
            message: message.to_string(),
        };
        self.connection.call(call.method(), call.params()).await
    }

    /// Sets request context preferences for one browser.
    pub fn set_request_context_preferences(
        &self,
        browser_id: BrowserId,
        preferences: Preferences,
    ) -> Result<()> {
        self.post(HostCall::SetRequestContextPreferences {
            browser_id,
            preferences,
        })
    }

    /// Sets request context preferences for all browsers.
    pub fn set_global_request_context_preferences(
        &self,
        preferences: Preferences,
    ) -> Result<()> {
        self.post(HostCall::SetGlobalRequestContextPreferences { preferences })
    }

    fn post(&self, call: HostCall) -> Result<()> {
        self.connection.post(call.method(), call.params())
    }

    /// Disposes the host: best-effort `CloseHost` (exactly once), then
    /// transport teardown, then a bounded wait for the worker to exit
    /// before killing it. Idempotent; safe to call concurrently with
    /// worker exit.
    pub async fn dispose(&self) {
        self.shared.disposing.store(true, Ordering::SeqCst);
        {
            let mut state = self.shared.state.write();
            if *state == HostState::Disposed {
                return;
            }
            *state = HostState::Disposing;
        }

        if !self.close_host_sent.swap(true, Ordering::SeqCst) {
            // Queued before the outbound channel is torn down, so the
            // writer still flushes it to the worker.
            if let Err(e) = self.post(HostCall::CloseHost) {
                tracing::debug!("CloseHost not delivered: {e}");
            }
        }

        self.connection.close().await;

        if let Some(supervisor) = &self.supervisor {
            let graceful = tokio::time::timeout(DISPOSE_EXIT_TIMEOUT, supervisor.wait()).await;
            if graceful.is_err() {
                tracing::warn!("worker did not exit after CloseHost; killing");
                supervisor.request_kill();
                supervisor.wait().await;
            }
        }

        *self.shared.state.write() = HostState::Disposed;
    }
}
