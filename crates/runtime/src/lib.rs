//! Out-of-process browser host runtime.
//!
//! This crate coordinates a browser-rendering engine hosted in a separate
//! worker process:
//!
//! - **Process supervision**: spawning the worker with its startup
//!   contract and watching its exit
//! - **Transport**: length-prefixed JSON frames over the worker's stdio
//! - **Connection**: request/response correlation and notification dispatch
//! - **Registry**: routing per-browser notifications to session handles
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ embedding layer  │  UI controls implementing BrowserHandle
//! └────────┬─────────┘
//! ┌────────▼─────────┐
//! │ OutOfProcessHost │  identifier registry, handshake, method surface
//! │  ┌────────────┐  │
//! │  │ Connection │  │  correlation + dispatch
//! │  └────────────┘  │
//! │  ┌────────────┐  │
//! │  │ Transport  │  │  stdio pipe framing
//! │  └────────────┘  │
//! │  ┌────────────┐  │
//! │  │ Supervisor │  │  worker process lifecycle
//! │  └────────────┘  │
//! └──────────────────┘
//! ```
//!
//! The wire types live in `oophost-protocol`; the worker entry point and
//! any GUI-toolkit control are external collaborators.

pub mod browser;
pub mod connection;
pub mod error;
pub mod host;
pub mod process;
pub mod transport;

// Re-export key types at crate root
pub use browser::BrowserHandle;
pub use connection::{Connection, IncomingHandler};
pub use error::{Error, Result};
pub use host::{Handshake, HostState, OutOfProcessHost};
pub use process::{Settings, WorkerProcess, WorkerSupervisor, build_worker_args};
pub use transport::{
    PipeTransport, PipeTransportReceiver, PipeTransportSender, Transport, TransportParts,
    TransportReceiver,
};

pub use oophost_protocol as protocol;
