//! Application state management

use holodraft_bridge::{BridgeHandle, HostBridge, MeshFileLoader};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;

/// Shared application state
pub struct AppState {
    /// Handle to the bridge task that owns the registry
    pub bridge: BridgeHandle,
    /// Configuration
    pub config: Config,
}

impl AppState {
    /// Start the bridge task and wrap its handle
    pub fn new(config: Config) -> Arc<Self> {
        let settings = config.to_bridge_settings();
        info!(
            download_dir = %settings.download_dir.display(),
            export_base_url = %settings.export_base_url,
            "Starting host bridge"
        );
        let bridge = HostBridge::new(settings, MeshFileLoader::new()).spawn();
        Arc::new(Self { bridge, config })
    }
}
