//! Core protocol types used across the wire.

use serde::{Deserialize, Serialize};

/// Identifier of one browser instance inside the worker process.
///
/// Assigned by the host (never the worker) from a per-host monotonic
/// counter starting at 1, and never reused within a host's lifetime.
pub type BrowserId = i32;

/// Native window handle, transported as a plain integer.
///
/// The host never interprets the value beyond forwarding it between the
/// embedding UI control and the worker.
pub type WindowHandle = u64;

/// Request context preferences, forwarded verbatim to the worker.
pub type Preferences = serde_json::Map<String, serde_json::Value>;

/// Engine version triplet reported by the worker during the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineVersions {
    /// Version of the embedding wrapper layer
    pub wrapper: String,
    /// Version of the browser engine itself
    pub engine: String,
    /// Version of the base runtime the engine is built on
    pub runtime: String,
}
