//! Wire types for the out-of-process browser host protocol.
//!
//! This crate contains the serde-serializable types exchanged between the
//! host (controller) process and the browser worker process over the stdio
//! RPC channel. These types represent the "protocol layer" - the shapes of
//! data as they appear on the wire.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! - **Pure data**: No behavior beyond serialization/deserialization
//! - **1:1 with protocol**: Match the host/worker method surface exactly
//! - **Stable**: Changes only when the wire protocol changes
//!
//! The coordinator built on top of these types lives in `oophost-runtime`.

pub mod envelope;
pub mod methods;
pub mod notification;
pub mod types;

pub use envelope::*;
pub use notification::*;
pub use types::*;
