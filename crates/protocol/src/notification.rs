//! Typed views of the host/worker method surface.
//!
//! [`WorkerNotification`] models every notification the worker may send as
//! one variant of a single enum, so the host's dispatch loop can match it
//! exhaustively. [`HostCall`] is the mirror image for outbound calls and
//! knows which method name and positional parameters each call carries.

use crate::methods;
use crate::types::{BrowserId, Preferences, WindowHandle};
use serde_json::Value;
use thiserror::Error;

/// Failure to decode an incoming frame into a typed notification.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Method name is not part of the worker -> host surface.
    #[error("unknown notification method: {0}")]
    UnknownMethod(String),

    /// Parameters did not match the method's fixed parameter list.
    #[error("bad parameters for {method}: {source}")]
    BadParams {
        method: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// One notification from the worker process, decoded by method name.
///
/// Each variant corresponds 1:1 to a `Notify*` method, with the method's
/// fixed positional parameter list as fields.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerNotification {
    /// One-shot readiness handshake with thread id and version triplet.
    ContextInitialized {
        thread_id: i32,
        wrapper_version: String,
        engine_version: String,
        runtime_version: String,
    },
    /// A browser finished creation; carries its native window handle.
    BrowserCreated {
        browser_id: BrowserId,
        window_handle: WindowHandle,
    },
    /// Navigation address changed.
    AddressChanged {
        browser_id: BrowserId,
        address: String,
    },
    /// Document title changed.
    TitleChanged {
        browser_id: BrowserId,
        title: String,
    },
    /// Status bar message.
    StatusMessage {
        browser_id: BrowserId,
        message: String,
    },
    /// Loading state changed.
    LoadingStateChange {
        browser_id: BrowserId,
        can_go_back: bool,
        can_go_forward: bool,
        is_loading: bool,
    },
    /// DevTools agent attached and ready.
    DevToolsReady { browser_id: BrowserId },
    /// DevTools protocol message from the agent.
    DevToolsMessage {
        browser_id: BrowserId,
        message: String,
    },
    /// DevTools agent detached.
    DevToolsAgentDetached { browser_id: BrowserId },
}

fn params<T: serde::de::DeserializeOwned>(
    method: &'static str,
    value: Value,
) -> Result<T, DecodeError> {
    serde_json::from_value(value).map_err(|source| DecodeError::BadParams { method, source })
}

impl WorkerNotification {
    /// Decodes a notification from its wire method name and parameter array.
    pub fn decode(method: &str, value: Value) -> Result<Self, DecodeError> {
        match method {
            methods::NOTIFY_CONTEXT_INITIALIZED => {
                let (thread_id, wrapper_version, engine_version, runtime_version) =
                    params(methods::NOTIFY_CONTEXT_INITIALIZED, value)?;
                Ok(Self::ContextInitialized {
                    thread_id,
                    wrapper_version,
                    engine_version,
                    runtime_version,
                })
            }
            methods::NOTIFY_BROWSER_CREATED => {
                let (browser_id, window_handle) = params(methods::NOTIFY_BROWSER_CREATED, value)?;
                Ok(Self::BrowserCreated {
                    browser_id,
                    window_handle,
                })
            }
            methods::NOTIFY_ADDRESS_CHANGED => {
                let (browser_id, address) = params(methods::NOTIFY_ADDRESS_CHANGED, value)?;
                Ok(Self::AddressChanged {
                    browser_id,
                    address,
                })
            }
            methods::NOTIFY_TITLE_CHANGED => {
                let (browser_id, title) = params(methods::NOTIFY_TITLE_CHANGED, value)?;
                Ok(Self::TitleChanged { browser_id, title })
            }
            methods::NOTIFY_STATUS_MESSAGE => {
                let (browser_id, message) = params(methods::NOTIFY_STATUS_MESSAGE, value)?;
                Ok(Self::StatusMessage {
                    browser_id,
                    message,
                })
            }
            methods::NOTIFY_LOADING_STATE_CHANGE => {
                let (browser_id, can_go_back, can_go_forward, is_loading) =
                    params(methods::NOTIFY_LOADING_STATE_CHANGE, value)?;
                Ok(Self::LoadingStateChange {
                    browser_id,
                    can_go_back,
                    can_go_forward,
                    is_loading,
                })
            }
            methods::NOTIFY_DEV_TOOLS_READY => {
                let (browser_id,) = params(methods::NOTIFY_DEV_TOOLS_READY, value)?;
                Ok(Self::DevToolsReady { browser_id })
            }
            methods::NOTIFY_DEV_TOOLS_MESSAGE => {
                let (browser_id, message) = params(methods::NOTIFY_DEV_TOOLS_MESSAGE, value)?;
                Ok(Self::DevToolsMessage {
                    browser_id,
                    message,
                })
            }
            methods::NOTIFY_DEV_TOOLS_AGENT_DETACHED => {
                let (browser_id,) = params(methods::NOTIFY_DEV_TOOLS_AGENT_DETACHED, value)?;
                Ok(Self::DevToolsAgentDetached { browser_id })
            }
            other => Err(DecodeError::UnknownMethod(other.to_string())),
        }
    }

    /// Returns the wire method name of this notification.
    pub fn method(&self) -> &'static str {
        match self {
            Self::ContextInitialized { .. } => methods::NOTIFY_CONTEXT_INITIALIZED,
            Self::BrowserCreated { .. } => methods::NOTIFY_BROWSER_CREATED,
            Self::AddressChanged { .. } => methods::NOTIFY_ADDRESS_CHANGED,
            Self::TitleChanged { .. } => methods::NOTIFY_TITLE_CHANGED,
            Self::StatusMessage { .. } => methods::NOTIFY_STATUS_MESSAGE,
            Self::LoadingStateChange { .. } => methods::NOTIFY_LOADING_STATE_CHANGE,
            Self::DevToolsReady { .. } => methods::NOTIFY_DEV_TOOLS_READY,
            Self::DevToolsMessage { .. } => methods::NOTIFY_DEV_TOOLS_MESSAGE,
            Self::DevToolsAgentDetached { .. } => methods::NOTIFY_DEV_TOOLS_AGENT_DETACHED,
        }
    }

    /// Returns the browser identifier this notification targets, if any.
    ///
    /// `ContextInitialized` is the only notification addressed to the host
    /// itself rather than to a browser.
    pub fn browser_id(&self) -> Option<BrowserId> {
        match self {
            Self::ContextInitialized { .. } => None,
            Self::BrowserCreated { browser_id, .. }
            | Self::AddressChanged { browser_id, .. }
            | Self::TitleChanged { browser_id, .. }
            | Self::StatusMessage { browser_id, .. }
            | Self::LoadingStateChange { browser_id, .. }
            | Self::DevToolsReady { browser_id }
            | Self::DevToolsMessage { browser_id, .. }
            | Self::DevToolsAgentDetached { browser_id } => Some(*browser_id),
        }
    }
}

/// One outbound call from the host to the worker.
///
/// All calls are fire-and-forget notifications except
/// [`HostCall::SendDevToolsMessage`], whose delivery the caller may await.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    CreateBrowser {
        parent_window_handle: WindowHandle,
        url: String,
        browser_id: BrowserId,
        preferences: Option<Preferences>,
    },
    CloseBrowser {
        browser_id: BrowserId,
    },
    SetFocus {
        browser_id: BrowserId,
        focused: bool,
    },
    NotifyMoveOrResizeStarted {
        browser_id: BrowserId,
    },
    SendDevToolsMessage {
        browser_id: BrowserId,
        message: String,
    },
    SetRequestContextPreferences {
        browser_id: BrowserId,
        preferences: Preferences,
    },
    SetGlobalRequestContextPreferences {
        preferences: Preferences,
    },
    CloseHost,
}

impl HostCall {
    /// Returns the wire method name of this call.
    pub fn method(&self) -> &'static str {
        match self {
            Self::CreateBrowser { .. } => methods::CREATE_BROWSER,
            Self::CloseBrowser { .. } => methods::CLOSE_BROWSER,
            Self::SetFocus { .. } => methods::SET_FOCUS,
            Self::NotifyMoveOrResizeStarted { .. } => methods::NOTIFY_MOVE_OR_RESIZE_STARTED,
            Self::SendDevToolsMessage { .. } => methods::SEND_DEV_TOOLS_MESSAGE,
            Self::SetRequestContextPreferences { .. } => methods::SET_REQUEST_CONTEXT_PREFERENCES,
            Self::SetGlobalRequestContextPreferences { .. } => {
                methods::SET_GLOBAL_REQUEST_CONTEXT_PREFERENCES
            }
            Self::CloseHost => methods::CLOSE_HOST,
        }
    }

    /// Encodes the positional parameter array for this call.
    pub fn params(&self) -> Value {
        match self {
            Self::CreateBrowser {
                parent_window_handle,
                url,
                browser_id,
                preferences,
            } => serde_json::json!([parent_window_handle, url, browser_id, preferences]),
            Self::CloseBrowser { browser_id } => serde_json::json!([browser_id]),
            Self::SetFocus {
                browser_id,
                focused,
            } => serde_json::json!([browser_id, focused]),
            Self::NotifyMoveOrResizeStarted { browser_id } => serde_json::json!([browser_id]),
            Self::SendDevToolsMessage {
                browser_id,
                message,
            } => serde_json::json!([browser_id, message]),
            Self::SetRequestContextPreferences {
                browser_id,
                preferences,
            } => serde_json::json!([browser_id, preferences]),
            Self::SetGlobalRequestContextPreferences { preferences } => {
                serde_json::json!([preferences])
            }
            Self::CloseHost => serde_json::json!([]),
        }
    }
}
