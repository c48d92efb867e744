//! Loaded CAD model entities

use chrono::{DateTime, Utc};
use glam::DVec3;
use serde::Serialize;
use std::path::Path;

use crate::appearance::{ClipPlane, MaterialOverride, Rgba, Shading};
use crate::geometry::{box_surface_area, box_volume, unit, BoundingVolume, Pose};
use crate::loader::{LoadedAsset, PartNode, SourceFormat};

/// Material name that matches every sub-part in a material update
pub const ALL_MATERIALS: &str = "all";

/// File metadata recorded at load time
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetadata {
    pub file_name: String,
    pub file_path: String,
    pub source_format: SourceFormat,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl ModelMetadata {
    /// Metadata with the file name and format taken from `path`
    pub fn from_path(path: &str) -> Self {
        let p = Path::new(path);
        let file_name = p
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string());
        Self::new(path, file_name, SourceFormat::from_path(p))
    }

    pub fn new(file_path: impl Into<String>, file_name: impl Into<String>, source_format: SourceFormat) -> Self {
        let now = Utc::now();
        Self {
            file_name: file_name.into(),
            file_path: file_path.into(),
            source_format,
            created_at: now,
            last_modified: now,
        }
    }
}

/// Renderable child of a model entity
#[derive(Debug, Clone, PartialEq)]
pub struct SubPart {
    pub name: String,
    pub material: String,
    pub bounds: BoundingVolume,
    /// Part centre relative to the entity pivot at load time
    pub pivot_offset: DVec3,
    /// Local offset the part was loaded with
    pub rest_offset: DVec3,
    /// Live local offset (differs from rest while exploded)
    pub offset: DVec3,
    pub shading: Shading,
    pub material_override: Option<MaterialOverride>,
    pub clip_plane: Option<ClipPlane>,
}

impl SubPart {
    fn from_node(node: PartNode, pivot: DVec3) -> Self {
        Self {
            pivot_offset: node.bounds.center() - pivot,
            name: node.name,
            material: node.material,
            bounds: node.bounds,
            rest_offset: node.local_offset,
            offset: node.local_offset,
            shading: Shading::Default,
            material_override: None,
            clip_plane: None,
        }
    }
}

/// One loaded CAD model and its visualization state
#[derive(Debug, Clone, PartialEq)]
pub struct ModelEntity {
    id: String,
    metadata: ModelMetadata,
    node_name: String,
    original_pose: Pose,
    pose: Pose,
    bounds: BoundingVolume,
    collider: BoundingVolume,
    volume: f64,
    surface_area: f64,
    parts: Vec<SubPart>,
    color: Rgba,
    selected: bool,
    highlighted: bool,
    wireframe: bool,
    exploded: bool,
    cross_section: Option<ClipPlane>,
    transparency: f32,
    transform_dirty: bool,
}

impl ModelEntity {
    /// Build an entity from loader output placed at `pose`.
    ///
    /// Bounds are the union of the asset bounds and every part's bounds;
    /// volume and surface area are derived from them once here.
    pub fn from_asset(id: impl Into<String>, metadata: ModelMetadata, asset: LoadedAsset, pose: Pose) -> Self {
        let bounds = asset
            .node
            .parts
            .iter()
            .fold(asset.bounds, |acc, p| acc.union(&p.bounds));
        let collider = asset.collider.unwrap_or(bounds);
        let parts = asset
            .node
            .parts
            .into_iter()
            .map(|node| SubPart::from_node(node, pose.position))
            .collect();

        let mut entity = Self {
            id: id.into(),
            metadata,
            node_name: asset.node.name,
            original_pose: pose,
            pose,
            bounds,
            collider,
            volume: box_volume(&bounds),
            surface_area: box_surface_area(&bounds),
            parts,
            color: Rgba::WHITE,
            selected: false,
            highlighted: false,
            wireframe: false,
            exploded: false,
            cross_section: None,
            transparency: 1.0,
            transform_dirty: false,
        };
        entity.apply_appearance();
        entity
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    pub fn original_pose(&self) -> Pose {
        self.original_pose
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn bounds(&self) -> BoundingVolume {
        self.bounds
    }

    pub fn collider(&self) -> BoundingVolume {
        self.collider
    }

    /// Bounding-box volume estimate
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Bounding-box surface-area estimate
    pub fn surface_area(&self) -> f64 {
        self.surface_area
    }

    pub fn parts(&self) -> &[SubPart] {
        &self.parts
    }

    pub fn color(&self) -> Rgba {
        self.color
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }

    pub fn is_wireframe(&self) -> bool {
        self.wireframe
    }

    pub fn is_exploded(&self) -> bool {
        self.exploded
    }

    pub fn cross_section(&self) -> Option<ClipPlane> {
        self.cross_section
    }

    pub fn transparency(&self) -> f32 {
        self.transparency
    }

    pub fn center_of_mass(&self) -> DVec3 {
        self.bounds.center()
    }

    pub fn largest_dimension(&self) -> f64 {
        self.bounds.size().max_element()
    }

    /// Set the live pose; returns true if it differed from the previous one.
    ///
    /// A change bumps `last_modified` and marks the transform dirty until
    /// [`ModelEntity::take_transform_changed`] is called.
    pub fn set_pose(&mut self, pose: Pose) -> bool {
        if pose == self.pose {
            return false;
        }
        self.pose = pose;
        self.metadata.last_modified = Utc::now();
        self.transform_dirty = true;
        true
    }

    pub fn reset_to_original_pose(&mut self) -> bool {
        self.set_pose(self.original_pose)
    }

    /// Returns and clears the dirty flag set by pose changes
    pub fn take_transform_changed(&mut self) -> bool {
        std::mem::take(&mut self.transform_dirty)
    }

    pub fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
        self.apply_appearance();
    }

    pub fn set_highlighted(&mut self, highlighted: bool) {
        self.highlighted = highlighted;
        self.apply_appearance();
    }

    pub fn set_wireframe(&mut self, wireframe: bool) {
        self.wireframe = wireframe;
        self.apply_appearance();
    }

    /// Set opacity, clamped to [0, 1]; NaN is ignored
    pub fn set_transparency(&mut self, alpha: f32) {
        if alpha.is_nan() {
            return;
        }
        self.transparency = alpha.clamp(0.0, 1.0);
    }

    pub fn set_color(&mut self, color: Rgba) {
        self.color = color;
    }

    /// Push every part radially away from the pivot by `offset`, or restore
    /// rest offsets. Offsets are assigned, never accumulated.
    pub fn set_exploded(&mut self, exploded: bool, offset: f64) {
        self.exploded = exploded;
        for part in &mut self.parts {
            part.offset = if exploded {
                let dir = unit(part.pivot_offset).unwrap_or(DVec3::ZERO);
                part.rest_offset + dir * offset
            } else {
                part.rest_offset
            };
        }
    }

    pub fn set_cross_section(&mut self, plane: Option<ClipPlane>) {
        self.cross_section = plane;
        for part in &mut self.parts {
            part.clip_plane = plane;
        }
    }

    /// Apply a material override to parts whose material name contains
    /// `material_name` (or every part for `"all"`). Returns parts touched.
    pub fn apply_material(&mut self, material_name: &str, material: MaterialOverride) -> usize {
        let mut touched = 0;
        for part in &mut self.parts {
            if material_name == ALL_MATERIALS || part.material.contains(material_name) {
                part.material_override = Some(material);
                touched += 1;
            }
        }
        touched
    }

    fn apply_appearance(&mut self) {
        let shading = Shading::resolve(self.selected, self.highlighted, self.wireframe);
        for part in &mut self.parts {
            part.shading = shading;
        }
    }

    /// Serializable snapshot for the host and REST API
    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            id: self.id.clone(),
            file_name: self.metadata.file_name.clone(),
            file_path: self.metadata.file_path.clone(),
            format: self.metadata.source_format.tag(),
            position: self.pose.position,
            rotation: self.pose.euler_degrees(),
            scale: self.pose.scale,
            size: self.bounds.size(),
            volume: self.volume,
            surface_area: self.surface_area,
            parts: self.parts.len(),
            selected: self.selected,
            highlighted: self.highlighted,
            wireframe: self.wireframe,
            exploded: self.exploded,
            cross_section: self.cross_section.is_some(),
            transparency: self.transparency,
            created_at: self.metadata.created_at,
            last_modified: self.metadata.last_modified,
        }
    }
}

/// Flat view of a model entity
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSummary {
    pub id: String,
    pub file_name: String,
    pub file_path: String,
    pub format: String,
    pub position: DVec3,
    /// Euler angles in degrees
    pub rotation: DVec3,
    pub scale: DVec3,
    pub size: DVec3,
    pub volume: f64,
    pub surface_area: f64,
    pub parts: usize,
    pub selected: bool,
    pub highlighted: bool,
    pub wireframe: bool,
    pub exploded: bool,
    pub cross_section: bool,
    pub transparency: f32,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}
