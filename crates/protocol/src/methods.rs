//! Method names of the host/worker RPC surface.
//!
//! Host-to-worker calls carry positional parameters as JSON arrays; the
//! worker-to-host surface is notification-only (no call ever expects a
//! reply from the host).

/// Host -> worker: create a browser under the given parent window.
pub const CREATE_BROWSER: &str = "CreateBrowser";
/// Host -> worker: close a browser.
pub const CLOSE_BROWSER: &str = "CloseBrowser";
/// Host -> worker: set browser focus.
pub const SET_FOCUS: &str = "SetFocus";
/// Host -> worker: the hosting control started a move or resize.
pub const NOTIFY_MOVE_OR_RESIZE_STARTED: &str = "NotifyMoveOrResizeStarted";
/// Host -> worker: deliver a DevTools protocol message (awaitable ack).
pub const SEND_DEV_TOOLS_MESSAGE: &str = "SendDevToolsMessage";
/// Host -> worker: set per-browser request context preferences.
pub const SET_REQUEST_CONTEXT_PREFERENCES: &str = "SetRequestContextPreferences";
/// Host -> worker: set request context preferences for all browsers.
pub const SET_GLOBAL_REQUEST_CONTEXT_PREFERENCES: &str = "SetGlobalRequestContextPreferences";
/// Host -> worker: shut down the worker gracefully.
pub const CLOSE_HOST: &str = "CloseHost";

/// Worker -> host: one-shot readiness handshake.
pub const NOTIFY_CONTEXT_INITIALIZED: &str = "NotifyContextInitialized";
/// Worker -> host: a browser finished creation, carries its window handle.
pub const NOTIFY_BROWSER_CREATED: &str = "NotifyBrowserCreated";
/// Worker -> host: navigation address changed.
pub const NOTIFY_ADDRESS_CHANGED: &str = "NotifyAddressChanged";
/// Worker -> host: document title changed.
pub const NOTIFY_TITLE_CHANGED: &str = "NotifyTitleChanged";
/// Worker -> host: status bar message.
pub const NOTIFY_STATUS_MESSAGE: &str = "NotifyStatusMessage";
/// Worker -> host: loading state changed.
pub const NOTIFY_LOADING_STATE_CHANGE: &str = "NotifyLoadingStateChange";
/// Worker -> host: DevTools agent attached and ready.
pub const NOTIFY_DEV_TOOLS_READY: &str = "NotifyDevToolsReady";
/// Worker -> host: DevTools protocol message from the agent.
pub const NOTIFY_DEV_TOOLS_MESSAGE: &str = "NotifyDevToolsMessage";
/// Worker -> host: DevTools agent detached.
pub const NOTIFY_DEV_TOOLS_AGENT_DETACHED: &str = "NotifyDevToolsAgentDetached";
