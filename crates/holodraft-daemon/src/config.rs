//! Configuration loading

use anyhow::{Context, Result};
use glam::DVec3;
use holodraft_bridge::BridgeSettings;
use holodraft_core::{MeasurementStyle, RegistrySettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub visualization: VisualizationConfig,
    #[serde(default)]
    pub measurement: MeasurementStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Bind address for web server
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Directory remote models are downloaded into
    #[serde(default = "default_download_dir")]
    pub download_dir: String,
    /// Directory hosts may load local model files from; unset disables local paths
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_model_root: Option<String>,
    /// Simulated AR session start-up time
    #[serde(default = "default_ar_init_latency")]
    pub ar_init_latency_ms: u64,
    /// Simulated export time
    #[serde(default = "default_export_latency")]
    pub export_latency_ms: u64,
    /// Prefix of the URLs reported for finished exports
    #[serde(default = "default_export_base_url")]
    pub export_base_url: String,
    /// Outbound event buffer per subscriber
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            local_model_root: None,
            ar_init_latency_ms: default_ar_init_latency(),
            export_latency_ms: default_export_latency(),
            export_base_url: default_export_base_url(),
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_download_dir() -> String {
    "./downloads".to_string()
}

fn default_ar_init_latency() -> u64 {
    1000
}

fn default_export_latency() -> u64 {
    2000
}

fn default_export_base_url() -> String {
    "/api/exports".to_string()
}

fn default_event_capacity() -> usize {
    100
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationConfig {
    /// Distance each part moves outward in exploded view
    #[serde(default = "default_explode_offset")]
    pub explode_offset: f64,
    /// Clip plane normal for cross-section view
    #[serde(default = "default_cross_section_normal")]
    pub cross_section_normal: [f64; 3],
    #[serde(default)]
    pub cross_section_offset: f64,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            explode_offset: default_explode_offset(),
            cross_section_normal: default_cross_section_normal(),
            cross_section_offset: 0.0,
        }
    }
}

fn default_explode_offset() -> f64 {
    0.5
}

fn default_cross_section_normal() -> [f64; 3] {
    [0.0, 1.0, 0.0]
}

impl Config {
    /// Convert to the registry's settings
    pub fn to_registry_settings(&self) -> RegistrySettings {
        RegistrySettings {
            explode_offset: self.visualization.explode_offset,
            cross_section_normal: DVec3::from_array(self.visualization.cross_section_normal),
            cross_section_offset: self.visualization.cross_section_offset,
            measurement: self.measurement.clone(),
        }
    }

    /// Convert to BridgeSettings
    pub fn to_bridge_settings(&self) -> BridgeSettings {
        BridgeSettings {
            download_dir: PathBuf::from(&self.bridge.download_dir),
            local_model_root: self.bridge.local_model_root.as_ref().map(PathBuf::from),
            ar_init_latency: Duration::from_millis(self.bridge.ar_init_latency_ms),
            export_latency: Duration::from_millis(self.bridge.export_latency_ms),
            export_base_url: self.bridge.export_base_url.clone(),
            event_capacity: self.bridge.event_capacity,
            registry: self.to_registry_settings(),
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(&Config::default())?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use holodraft_core::Rgba;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.daemon.bind, "0.0.0.0:8080");
        assert_eq!(config.bridge.event_capacity, 100);
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holodraft.toml");
        std::fs::write(
            &path,
            r#"
[bridge]
export_latency_ms = 10
local_model_root = "/srv/models"

[visualization]
explode_offset = 1.25
cross_section_normal = [1.0, 0.0, 0.0]

[measurement]
arc_radius = 0.4
line_color = { r = 1.0, g = 0.0, b = 0.0, a = 1.0 }
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.bridge.export_latency_ms, 10);
        assert_eq!(config.bridge.ar_init_latency_ms, 1000);

        let registry = config.to_registry_settings();
        assert_eq!(registry.explode_offset, 1.25);
        assert_eq!(registry.cross_section_normal, DVec3::X);
        assert_eq!(registry.measurement.arc_radius, 0.4);
        assert_eq!(registry.measurement.line_color, Rgba::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(registry.measurement.text_color, Rgba::WHITE);

        let bridge = config.to_bridge_settings();
        assert_eq!(bridge.export_latency, Duration::from_millis(10));
        assert_eq!(bridge.download_dir, PathBuf::from("./downloads"));
        assert_eq!(bridge.local_model_root, Some(PathBuf::from("/srv/models")));
        assert_eq!(Config::default().to_bridge_settings().local_model_root, None);
    }

    #[test]
    fn test_default_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holodraft.toml");
        save_default_config(&path).unwrap();
        assert_eq!(load_config(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holodraft.toml");
        std::fs::write(&path, "[daemon]\nbind = 8080\n").unwrap();
        assert!(load_config(&path).is_err());
    }
}
