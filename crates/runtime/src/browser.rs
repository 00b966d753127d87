//! Browser session handle capability.
//!
//! The embedding layer (a UI-toolkit control, a test double) supplies one
//! [`BrowserHandle`] per browser it creates. The host never interprets the
//! handle beyond forwarding worker notifications to it, in the order the
//! worker emitted them for that browser.

use oophost_protocol::WindowHandle;

/// Receiver of engine events for one embedded browser.
///
/// Methods run on the host's dispatch context and must not block.
pub trait BrowserHandle: Send + Sync {
    /// Navigation address changed.
    fn set_address(&self, address: &str);

    /// Document title changed.
    fn set_title(&self, title: &str);

    /// Status bar message.
    fn set_status_message(&self, message: &str);

    /// Loading state changed.
    fn set_loading_state(&self, can_go_back: bool, can_go_forward: bool, is_loading: bool);

    /// The browser finished creation inside the worker; carries the native
    /// window handle to reparent.
    fn on_browser_created(&self, window_handle: WindowHandle);

    /// DevTools protocol message from the agent.
    fn on_dev_tools_message(&self, message: &str);

    /// DevTools agent attached and ready.
    fn on_dev_tools_ready(&self);

    /// DevTools agent detached.
    ///
    /// Extension point: the default implementation does nothing, matching
    /// embeddings that have no detach handling.
    fn on_dev_tools_agent_detached(&self) {}
}
