//! Contract for the external model loader
//!
//! The core never reads model bytes. A loader turns a file on disk into a
//! renderable node description plus the bounding volume of everything it
//! contains; the registry builds a [`crate::ModelEntity`] from that.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::geometry::BoundingVolume;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("download failed: {0}")]
    DownloadFailed(String),
    #[error("parse failed: {0}")]
    ParseFailed(String),
}

impl LoadError {
    /// Stable error code reported to the host
    pub fn code(&self) -> &'static str {
        match self {
            LoadError::UnsupportedFormat(_) => "unsupported_format",
            LoadError::DownloadFailed(_) => "download_failed",
            LoadError::ParseFailed(_) => "parse_failed",
        }
    }
}

/// Source file format of a loaded model
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Stl,
    Obj,
    Fbx,
    Other(String),
}

impl SourceFormat {
    /// Parse an extension or format name such as `".STL"`, `"obj"`
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "stl" => SourceFormat::Stl,
            "obj" => SourceFormat::Obj,
            "fbx" => SourceFormat::Fbx,
            _ => SourceFormat::Other(ext),
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or_else(|| SourceFormat::Other(String::new()))
    }

    /// Lower-case extension without the dot
    pub fn extension(&self) -> &str {
        match self {
            SourceFormat::Stl => "stl",
            SourceFormat::Obj => "obj",
            SourceFormat::Fbx => "fbx",
            SourceFormat::Other(ext) => ext,
        }
    }

    /// Upper-case tag shown in model metadata (e.g. `STL`)
    pub fn tag(&self) -> String {
        self.extension().to_ascii_uppercase()
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// One renderable child of a loaded node
#[derive(Debug, Clone, PartialEq)]
pub struct PartNode {
    pub name: String,
    /// Material name used for targeted material overrides
    pub material: String,
    /// World-space bounds at load time
    pub bounds: BoundingVolume,
    /// Local offset of the part relative to its parent at load time
    pub local_offset: DVec3,
}

impl PartNode {
    pub fn new(name: impl Into<String>, material: impl Into<String>, bounds: BoundingVolume) -> Self {
        Self {
            name: name.into(),
            material: material.into(),
            bounds,
            local_offset: DVec3::ZERO,
        }
    }
}

/// Opaque renderable node produced by a loader
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderNode {
    pub name: String,
    pub parts: Vec<PartNode>,
}

/// Loader output: the node, its bounds, and an optional collision volume
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedAsset {
    pub node: RenderNode,
    pub bounds: BoundingVolume,
    /// Collision volume supplied by the asset, if any
    pub collider: Option<BoundingVolume>,
}

impl LoadedAsset {
    /// Asset whose bounds are the union of its parts
    pub fn from_parts(name: impl Into<String>, parts: Vec<PartNode>) -> Self {
        let bounds = parts
            .iter()
            .fold(BoundingVolume::EMPTY, |acc, p| acc.union(&p.bounds));
        Self {
            node: RenderNode {
                name: name.into(),
                parts,
            },
            bounds,
            collider: None,
        }
    }
}

/// What a loader is asked to load
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub path: PathBuf,
    pub format: SourceFormat,
}

impl LoadRequest {
    /// Request with the format taken from the path's extension
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = SourceFormat::from_path(&path);
        Self { path, format }
    }
}

/// External loader collaborator
pub trait ModelLoader {
    fn load(&self, request: LoadRequest) -> impl Future<Output = Result<LoadedAsset, LoadError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_format_parsing() {
        assert_eq!(SourceFormat::from_extension(".STL"), SourceFormat::Stl);
        assert_eq!(SourceFormat::from_extension("obj"), SourceFormat::Obj);
        assert_eq!(
            SourceFormat::from_extension("step"),
            SourceFormat::Other("step".to_string())
        );
        assert_eq!(SourceFormat::from_path(Path::new("parts/a.Fbx")), SourceFormat::Fbx);
        assert_eq!(SourceFormat::Stl.tag(), "STL");
    }

    #[test]
    fn test_asset_bounds_from_parts() {
        let asset = LoadedAsset::from_parts(
            "bracket",
            vec![
                PartNode::new("a", "steel", BoundingVolume::from_corners(DVec3::ZERO, DVec3::ONE)),
                PartNode::new("b", "steel", BoundingVolume::from_corners(DVec3::ONE, DVec3::splat(2.0))),
            ],
        );
        assert_eq!(asset.bounds.min, DVec3::ZERO);
        assert_eq!(asset.bounds.max, DVec3::splat(2.0));
        assert!(asset.collider.is_none());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(LoadError::UnsupportedFormat("x".into()).code(), "unsupported_format");
        assert_eq!(LoadError::DownloadFailed("x".into()).code(), "download_failed");
        assert_eq!(LoadError::ParseFailed("x".into()).code(), "parse_failed");
    }
}
