//! HoloDraft Bridge - Host protocol and async model pipeline
//!
//! This crate connects an external host (web page or AR runtime) to the
//! core registry:
//! - `{type, data}` message envelopes and their payload types
//! - A single-owner bridge task applying host commands in arrival order
//! - Background download, load, export and AR start-up tasks
//! - A file-backed loader for STL and OBJ models

pub mod bridge;
pub mod download;
pub mod error;
pub mod mesh_loader;
pub mod protocol;

pub use bridge::{
    BridgeHandle, BridgeRequest, BridgeSettings, Completion, HostBridge, DEFAULT_EXPORT_FORMAT, LOAD_CANCELLED,
};
pub use download::Downloader;
pub use error::BridgeError;
pub use mesh_loader::MeshFileLoader;
pub use protocol::{Envelope, HostCommand, HostEvent, LoadStatus};
