//! Model registry: the owner of every loaded model, the current selection,
//! global visualization toggles, and the persisted measurements and
//! annotations.
//!
//! Operations that take a caller-supplied id never fail on unknown ids; they
//! log a warning and report `false`/`None`, because the host may race a
//! delete against commands still in flight.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::appearance::{ClipPlane, MaterialOverride, Rgba};
use crate::entity::{ModelEntity, ModelMetadata};
use crate::event::{CoreEvent, VisualizationMode};
use crate::geometry::Pose;
use crate::loader::{LoadError, LoadRequest, LoadedAsset, ModelLoader};
use crate::measurement::{
    Annotation, AnnotationId, AngleMeasurement, DistanceMeasurement, LabelFrame, LabelOwner,
    MeasurementId, MeasurementStyle,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("model id already registered: {0}")]
    DuplicateId(String),
    #[error("unknown model id: {0}")]
    UnknownId(String),
    #[error(transparent)]
    Load(#[from] LoadError),
}

impl RegistryError {
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::DuplicateId(_) => "duplicate_id",
            RegistryError::UnknownId(_) => "unknown_id",
            RegistryError::Load(e) => e.code(),
        }
    }
}

/// Registry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    /// Radial displacement of each sub-part in exploded view
    pub explode_offset: f64,
    /// Normal of the cross-section clip plane
    pub cross_section_normal: DVec3,
    /// Offset of the clip plane from each model's position along the normal
    pub cross_section_offset: f64,
    pub measurement: MeasurementStyle,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            explode_offset: 0.5,
            cross_section_normal: DVec3::Y,
            cross_section_offset: 0.0,
            measurement: MeasurementStyle::default(),
        }
    }
}

/// Owner of loaded models, selection, and measurement objects
#[derive(Debug, Default)]
pub struct ModelRegistry {
    settings: RegistrySettings,
    models: HashMap<String, ModelEntity>,
    selected: Option<String>,
    distances: Vec<DistanceMeasurement>,
    angles: Vec<AngleMeasurement>,
    annotations: Vec<Annotation>,
    wireframe: bool,
    exploded: bool,
    cross_section: bool,
    next_measurement_id: u64,
    next_annotation_id: u64,
    events: Vec<CoreEvent>,
}

impl ModelRegistry {
    pub fn new(settings: RegistrySettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    // ----------------------------------------------------------------
    // Loading
    // ----------------------------------------------------------------

    /// Load `file_path` through `loader` and register it under `id`.
    ///
    /// Fails with `DuplicateId` without touching the loader when the id is
    /// taken. Loader failures are reported as `ModelLoadFailed` and nothing
    /// is registered.
    pub async fn load<L: ModelLoader>(
        &mut self,
        loader: &L,
        file_path: &str,
        id: &str,
    ) -> Result<(), RegistryError> {
        self.check_available(id)?;

        let request = LoadRequest::from_path(file_path);
        match loader.load(request).await {
            Ok(asset) => self.register(id, ModelMetadata::from_path(file_path), asset),
            Err(e) => {
                self.report_load_failure(id, &e);
                Err(e.into())
            }
        }
    }

    /// Fail with `DuplicateId` (and report it) if `id` is already loaded
    pub fn check_available(&mut self, id: &str) -> Result<(), RegistryError> {
        if self.models.contains_key(id) {
            warn!(model = %id, "Model with this id already loaded");
            let err = RegistryError::DuplicateId(id.to_string());
            self.emit(CoreEvent::ModelLoadFailed {
                id: id.to_string(),
                code: err.code(),
                message: err.to_string(),
            });
            return Err(err);
        }
        Ok(())
    }

    /// Register loader output as a new model entity.
    ///
    /// Current global visualization toggles are applied to the new entity so
    /// every registered model shares them.
    pub fn register(
        &mut self,
        id: &str,
        metadata: ModelMetadata,
        asset: LoadedAsset,
    ) -> Result<(), RegistryError> {
        self.check_available(id)?;

        let mut entity = ModelEntity::from_asset(id, metadata, asset, Pose::IDENTITY);
        self.apply_global_modes(&mut entity);

        info!(
            model = %id,
            file = %entity.metadata().file_name,
            format = %entity.metadata().source_format,
            parts = entity.parts().len(),
            volume = entity.volume(),
            "Model loaded"
        );

        self.models.insert(id.to_string(), entity);
        self.emit(CoreEvent::ModelLoaded { id: id.to_string() });
        Ok(())
    }

    /// Report a load pipeline failure for `id`
    pub fn report_load_failure(&mut self, id: &str, error: &LoadError) {
        warn!(model = %id, error = %error, "Model load failed");
        self.emit(CoreEvent::ModelLoadFailed {
            id: id.to_string(),
            code: error.code(),
            message: error.to_string(),
        });
    }

    fn apply_global_modes(&self, entity: &mut ModelEntity) {
        entity.set_wireframe(self.wireframe);
        entity.set_exploded(self.exploded, self.settings.explode_offset);
        let plane = self.cross_section.then(|| self.clip_plane_for(entity));
        entity.set_cross_section(plane);
    }

    fn clip_plane_for(&self, entity: &ModelEntity) -> ClipPlane {
        ClipPlane::through(
            entity.pose().position,
            self.settings.cross_section_normal,
            self.settings.cross_section_offset,
        )
    }

    // ----------------------------------------------------------------
    // Selection and deletion
    // ----------------------------------------------------------------

    /// Select `id`, deselecting any previous selection. Unknown ids leave
    /// the selection unchanged.
    pub fn select(&mut self, id: &str) -> bool {
        if !self.models.contains_key(id) {
            warn!(model = %id, "Cannot select unknown model");
            return false;
        }

        self.deselect();

        if let Some(entity) = self.models.get_mut(id) {
            entity.set_selected(true);
        }
        self.selected = Some(id.to_string());
        debug!(model = %id, "Model selected");
        self.emit(CoreEvent::ModelSelected { id: id.to_string() });
        true
    }

    /// Clear the selection, restoring the previous entity's appearance
    pub fn deselect(&mut self) -> Option<String> {
        let previous = self.selected.take()?;
        if let Some(entity) = self.models.get_mut(&previous) {
            entity.set_selected(false);
        }
        self.emit(CoreEvent::ModelDeselected { id: previous.clone() });
        Some(previous)
    }

    /// Remove a model and release its visuals
    pub fn delete(&mut self, id: &str) -> bool {
        if !self.models.contains_key(id) {
            warn!(model = %id, "Cannot delete unknown model");
            return false;
        }

        if self.selected.as_deref() == Some(id) {
            self.deselect();
        }

        if let Some(entity) = self.models.remove(id) {
            info!(model = %id, parts = entity.parts().len(), "Model deleted");
        }
        self.emit(CoreEvent::ModelDeleted { id: id.to_string() });
        true
    }

    // ----------------------------------------------------------------
    // Per-model appearance and pose
    // ----------------------------------------------------------------

    pub fn set_highlighted(&mut self, id: &str, highlighted: bool) -> bool {
        match self.models.get_mut(id) {
            Some(entity) => {
                entity.set_highlighted(highlighted);
                true
            }
            None => {
                warn!(model = %id, "Cannot highlight unknown model");
                false
            }
        }
    }

    pub fn set_transparency(&mut self, id: &str, alpha: f32) -> bool {
        match self.models.get_mut(id) {
            Some(entity) => {
                entity.set_transparency(alpha);
                true
            }
            None => {
                warn!(model = %id, "Cannot set transparency of unknown model");
                false
            }
        }
    }

    pub fn set_color(&mut self, id: &str, color: Rgba) -> bool {
        match self.models.get_mut(id) {
            Some(entity) => {
                entity.set_color(color);
                true
            }
            None => {
                warn!(model = %id, "Cannot recolor unknown model");
                false
            }
        }
    }

    /// Set a model's pose authoritatively and report the resulting pose
    pub fn set_pose(&mut self, id: &str, pose: Pose) -> Option<Pose> {
        let Some(entity) = self.models.get_mut(id) else {
            warn!(model = %id, "Cannot transform unknown model");
            return None;
        };
        entity.set_pose(pose);
        entity.take_transform_changed();
        let pose = entity.pose();
        // The section plane is anchored to the model's position
        if self.cross_section {
            entity.set_cross_section(Some(ClipPlane::through(
                pose.position,
                self.settings.cross_section_normal,
                self.settings.cross_section_offset,
            )));
        }
        self.emit(CoreEvent::ModelTransformed {
            id: id.to_string(),
            pose,
        });
        Some(pose)
    }

    /// Move a model back to the pose it was loaded with
    pub fn reset_pose(&mut self, id: &str) -> Option<Pose> {
        let original = self.models.get(id).map(|e| e.original_pose());
        match original {
            Some(pose) => self.set_pose(id, pose),
            None => {
                warn!(model = %id, "Cannot reset unknown model");
                None
            }
        }
    }

    /// Apply a material override to matching parts of a model.
    ///
    /// Returns the number of parts updated, or `None` for an unknown id.
    pub fn update_material(
        &mut self,
        id: &str,
        material_name: &str,
        color: Rgba,
        metallic: f32,
        roughness: f32,
    ) -> Option<usize> {
        let Some(entity) = self.models.get_mut(id) else {
            warn!(model = %id, "Cannot update material of unknown model");
            return None;
        };
        let material = MaterialOverride::from_roughness(color, metallic, roughness);
        let touched = entity.apply_material(material_name, material);
        debug!(model = %id, material = %material_name, parts = touched, "Material updated");
        Some(touched)
    }

    // ----------------------------------------------------------------
    // Global visualization toggles
    // ----------------------------------------------------------------

    pub fn toggle_wireframe(&mut self) -> bool {
        self.wireframe = !self.wireframe;
        let wireframe = self.wireframe;
        for entity in self.models.values_mut() {
            entity.set_wireframe(wireframe);
        }
        self.visualization_changed(VisualizationMode::Wireframe, wireframe)
    }

    pub fn toggle_exploded_view(&mut self) -> bool {
        self.exploded = !self.exploded;
        let (exploded, offset) = (self.exploded, self.settings.explode_offset);
        for entity in self.models.values_mut() {
            entity.set_exploded(exploded, offset);
        }
        self.visualization_changed(VisualizationMode::Exploded, exploded)
    }

    pub fn toggle_cross_section(&mut self) -> bool {
        self.cross_section = !self.cross_section;
        let planes: Vec<(String, Option<ClipPlane>)> = self
            .models
            .values()
            .map(|e| (e.id().to_string(), self.cross_section.then(|| self.clip_plane_for(e))))
            .collect();
        for (id, plane) in planes {
            if let Some(entity) = self.models.get_mut(&id) {
                entity.set_cross_section(plane);
            }
        }
        self.visualization_changed(VisualizationMode::CrossSection, self.cross_section)
    }

    fn visualization_changed(&mut self, mode: VisualizationMode, enabled: bool) -> bool {
        info!(mode = ?mode, enabled, models = self.models.len(), "Visualization mode changed");
        self.emit(CoreEvent::VisualizationChanged { mode, enabled });
        enabled
    }

    pub fn is_wireframe(&self) -> bool {
        self.wireframe
    }

    pub fn is_exploded(&self) -> bool {
        self.exploded
    }

    pub fn is_cross_section(&self) -> bool {
        self.cross_section
    }

    // ----------------------------------------------------------------
    // Measurements and annotations
    // ----------------------------------------------------------------

    fn next_measurement_id(&mut self) -> MeasurementId {
        self.next_measurement_id += 1;
        MeasurementId(self.next_measurement_id)
    }

    pub fn add_measurement(&mut self, start: DVec3, end: DVec3) -> &DistanceMeasurement {
        let id = self.next_measurement_id();
        let measurement = DistanceMeasurement::new(id, start, end, &self.settings.measurement);
        debug!(measurement = %id, distance = measurement.distance(), "Distance measurement added");
        self.emit(CoreEvent::DistanceAdded {
            id,
            distance: measurement.distance(),
        });
        self.distances.push(measurement);
        &self.distances[self.distances.len() - 1]
    }

    pub fn add_angle_measurement(&mut self, point1: DVec3, vertex: DVec3, point2: DVec3) -> &AngleMeasurement {
        let id = self.next_measurement_id();
        let measurement = AngleMeasurement::new(id, point1, vertex, point2, &self.settings.measurement);
        if measurement.is_degenerate() {
            warn!(measurement = %id, "Angle measurement has a zero-length leg; angle is undefined");
        } else {
            debug!(measurement = %id, angle = measurement.angle(), "Angle measurement added");
        }
        self.emit(CoreEvent::AngleAdded {
            id,
            angle: measurement.angle(),
        });
        self.angles.push(measurement);
        &self.angles[self.angles.len() - 1]
    }

    pub fn add_annotation(&mut self, position: DVec3, text: &str) -> &Annotation {
        self.next_annotation_id += 1;
        let id = AnnotationId(self.next_annotation_id);
        let annotation = Annotation::new(id, position, text, &self.settings.measurement);
        self.emit(CoreEvent::AnnotationAdded {
            id,
            position,
            text: text.to_string(),
        });
        self.annotations.push(annotation);
        &self.annotations[self.annotations.len() - 1]
    }

    /// Annotate a model with its volume and surface-area estimates,
    /// half a unit above its position
    pub fn annotate_dimensions(&mut self, id: &str) -> Option<AnnotationId> {
        let Some(entity) = self.models.get(id) else {
            warn!(model = %id, "Cannot annotate unknown model");
            return None;
        };
        let position = entity.pose().position + DVec3::Y * 0.5;
        let text = format!(
            "Volume: {:.3}\nSurface Area: {:.3}",
            entity.volume(),
            entity.surface_area()
        );
        Some(self.add_annotation(position, &text).id())
    }

    pub fn remove_measurement(&mut self, id: MeasurementId) -> bool {
        let before = self.distances.len();
        self.distances.retain(|m| m.id() != id);
        self.measurement_removed(id, before != self.distances.len())
    }

    pub fn remove_angle_measurement(&mut self, id: MeasurementId) -> bool {
        let before = self.angles.len();
        self.angles.retain(|m| m.id() != id);
        self.measurement_removed(id, before != self.angles.len())
    }

    fn measurement_removed(&mut self, id: MeasurementId, removed: bool) -> bool {
        if removed {
            self.emit(CoreEvent::MeasurementRemoved { id });
        } else {
            debug!(measurement = %id, "Measurement not found");
        }
        removed
    }

    /// Remove all distance and angle measurements, keeping annotations
    pub fn clear_measurements(&mut self) {
        self.distances.clear();
        self.angles.clear();
        self.emit(CoreEvent::MeasurementsCleared);
    }

    /// Remove every measurement and annotation; models are untouched
    pub fn clear_measurements_and_annotations(&mut self) {
        info!(
            distances = self.distances.len(),
            angles = self.angles.len(),
            annotations = self.annotations.len(),
            "Clearing measurements and annotations"
        );
        self.distances.clear();
        self.angles.clear();
        self.annotations.clear();
        self.emit(CoreEvent::MeasurementsCleared);
    }

    /// Change the line color of new and existing distance measurements
    pub fn set_measurement_line_color(&mut self, color: Rgba) {
        self.settings.measurement.line_color = color;
        for m in &mut self.distances {
            m.set_line_color(color);
        }
    }

    /// Change the label color of new and existing measurements
    pub fn set_measurement_text_color(&mut self, color: Rgba) {
        self.settings.measurement.text_color = color;
        for m in &mut self.distances {
            m.set_text_color(color);
        }
        for m in &mut self.angles {
            m.set_text_color(color);
        }
    }

    pub fn measurements(&self) -> &[DistanceMeasurement] {
        &self.distances
    }

    pub fn angle_measurements(&self) -> &[AngleMeasurement] {
        &self.angles
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Billboard poses of every label for one render frame.
    ///
    /// Read-only: the render path calls this every frame without any
    /// coordination with command handling.
    pub fn label_frames(&self, eye: DVec3) -> Vec<LabelFrame> {
        let distances = self
            .distances
            .iter()
            .map(|m| (LabelOwner::Distance(m.id()), m.label()));
        let angles = self
            .angles
            .iter()
            .map(|m| (LabelOwner::Angle(m.id()), m.label()));
        let annotations = self
            .annotations
            .iter()
            .map(|a| (LabelOwner::Annotation(a.id()), a.label()));

        distances
            .chain(angles)
            .chain(annotations)
            .map(|(owner, label)| LabelFrame {
                owner,
                position: label.position,
                rotation: label.facing(eye),
            })
            .collect()
    }

    // ----------------------------------------------------------------
    // Queries
    // ----------------------------------------------------------------

    pub fn get(&self, id: &str) -> Option<&ModelEntity> {
        self.models.get(id)
    }

    pub fn selected(&self) -> Option<&ModelEntity> {
        self.selected.as_deref().and_then(|id| self.models.get(id))
    }

    /// Snapshot copy of every registered model
    pub fn all(&self) -> Vec<ModelEntity> {
        self.models.values().cloned().collect()
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.models.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    // ----------------------------------------------------------------
    // Events
    // ----------------------------------------------------------------

    pub(crate) fn emit(&mut self, event: CoreEvent) {
        self.events.push(event);
    }

    /// Take every event produced since the last drain, oldest first
    pub fn drain_events(&mut self) -> Vec<CoreEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingVolume;
    use crate::loader::PartNode;

    fn cube_asset(size: f64) -> LoadedAsset {
        LoadedAsset::from_parts(
            "cube",
            vec![
                PartNode::new(
                    "left",
                    "steel",
                    BoundingVolume::from_center_size(DVec3::new(-1.0, 0.0, 0.0), DVec3::splat(size)),
                ),
                PartNode::new(
                    "right",
                    "steel",
                    BoundingVolume::from_center_size(DVec3::new(1.0, 0.0, 0.0), DVec3::splat(size)),
                ),
            ],
        )
    }

    fn registry_with(ids: &[&str]) -> ModelRegistry {
        let mut registry = ModelRegistry::default();
        for id in ids {
            registry
                .register(id, ModelMetadata::from_path(&format!("{}.stl", id)), cube_asset(1.0))
                .unwrap();
        }
        registry.drain_events();
        registry
    }

    #[test]
    fn test_register_duplicate_is_rejected() {
        let mut registry = registry_with(&["m1"]);
        let err = registry
            .register("m1", ModelMetadata::from_path("other.stl"), cube_asset(2.0))
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateId("m1".to_string()));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("m1").unwrap().metadata().file_name, "m1.stl");
        assert!(matches!(
            registry.drain_events().as_slice(),
            [CoreEvent::ModelLoadFailed { code: "duplicate_id", .. }]
        ));
    }

    #[test]
    fn test_select_moves_selection() {
        let mut registry = registry_with(&["m1", "m2"]);
        assert!(registry.select("m1"));
        assert!(registry.select("m2"));
        assert!(!registry.get("m1").unwrap().is_selected());
        assert!(registry.get("m2").unwrap().is_selected());
        assert_eq!(registry.selected().unwrap().id(), "m2");

        // Unknown ids leave the selection alone
        assert!(!registry.select("ghost"));
        assert_eq!(registry.selected().unwrap().id(), "m2");

        let events = registry.drain_events();
        assert_eq!(
            events,
            vec![
                CoreEvent::ModelSelected { id: "m1".into() },
                CoreEvent::ModelDeselected { id: "m1".into() },
                CoreEvent::ModelSelected { id: "m2".into() },
            ]
        );
    }

    #[test]
    fn test_delete_clears_selection() {
        let mut registry = registry_with(&["m1", "m2"]);
        registry.select("m2");
        assert!(registry.delete("m2"));
        assert!(registry.selected().is_none());
        assert!(!registry.is_loaded("m2"));
        assert!(!registry.delete("m2"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_exploded_view_double_toggle_restores_offsets() {
        let mut registry = registry_with(&["m1"]);
        let before: Vec<DVec3> = registry.get("m1").unwrap().parts().iter().map(|p| p.offset).collect();

        assert!(registry.toggle_exploded_view());
        let exploded: Vec<DVec3> = registry.get("m1").unwrap().parts().iter().map(|p| p.offset).collect();
        assert_eq!(exploded, vec![DVec3::new(-0.5, 0.0, 0.0), DVec3::new(0.5, 0.0, 0.0)]);

        assert!(!registry.toggle_exploded_view());
        let after: Vec<DVec3> = registry.get("m1").unwrap().parts().iter().map(|p| p.offset).collect();
        assert_eq!(after, before);
        // Loaded parts rest at zero, so collapsing zeroes them
        assert!(after.iter().all(|o| *o == DVec3::ZERO));
    }

    #[test]
    fn test_global_modes_apply_to_new_models() {
        let mut registry = registry_with(&["m1"]);
        registry.toggle_wireframe();
        registry.toggle_cross_section();
        registry
            .register("m2", ModelMetadata::from_path("m2.obj"), cube_asset(1.0))
            .unwrap();
        let m2 = registry.get("m2").unwrap();
        assert!(m2.is_wireframe());
        assert!(m2.cross_section().is_some());
        assert!(m2.parts().iter().all(|p| p.clip_plane.is_some()));

        registry.toggle_cross_section();
        assert!(registry.all().iter().all(|m| m.cross_section().is_none()));
    }

    #[test]
    fn test_set_pose_emits_transformed() {
        let mut registry = registry_with(&["m1"]);
        let pose = Pose::IDENTITY.with_position(DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(registry.set_pose("m1", pose), Some(pose));
        assert_eq!(registry.set_pose("ghost", pose), None);
        assert_eq!(
            registry.drain_events(),
            vec![CoreEvent::ModelTransformed { id: "m1".into(), pose }]
        );
        assert_eq!(registry.reset_pose("m1"), Some(Pose::IDENTITY));
    }

    #[test]
    fn test_section_plane_follows_moved_model() {
        let mut registry = registry_with(&["m1"]);
        registry.toggle_cross_section();
        let moved = DVec3::new(0.0, 5.0, 0.0);
        registry.set_pose("m1", Pose::IDENTITY.with_position(moved));

        let m1 = registry.get("m1").unwrap();
        let plane = m1.cross_section().unwrap();
        assert_eq!(plane.origin, moved);
        assert!(m1.parts().iter().all(|p| p.clip_plane == Some(plane)));

        registry.reset_pose("m1");
        assert_eq!(registry.get("m1").unwrap().cross_section().unwrap().origin, DVec3::ZERO);

        // Moving with the section off leaves parts unclipped
        registry.toggle_cross_section();
        registry.set_pose("m1", Pose::IDENTITY.with_position(moved));
        assert!(registry.get("m1").unwrap().cross_section().is_none());
    }

    #[test]
    fn test_measurements_and_annotations_lifecycle() {
        let mut registry = registry_with(&["m1"]);
        let d = registry.add_measurement(DVec3::ZERO, DVec3::new(3.0, 4.0, 0.0)).id();
        let a = registry
            .add_angle_measurement(DVec3::X, DVec3::ZERO, DVec3::Y)
            .id();
        registry.add_annotation(DVec3::ZERO, "datum A");
        assert_ne!(d, a);
        assert_eq!(registry.measurements().len(), 1);
        assert_eq!(registry.angle_measurements().len(), 1);

        assert!(registry.remove_measurement(d));
        assert!(!registry.remove_measurement(d));
        assert!(!registry.remove_measurement(a), "angle id is not a distance");
        assert!(registry.remove_angle_measurement(a));

        registry.add_measurement(DVec3::ZERO, DVec3::X);
        registry.clear_measurements_and_annotations();
        assert!(registry.measurements().is_empty());
        assert!(registry.annotations().is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_annotate_dimensions() {
        let mut registry = registry_with(&["m1"]);
        registry.annotate_dimensions("m1").unwrap();
        let annotation = &registry.annotations()[0];
        // Two unit cubes at x = -1 and x = 1 give a 3 x 1 x 1 box
        assert_eq!(annotation.text(), "Volume: 3.000\nSurface Area: 14.000");
        assert_eq!(annotation.anchor(), DVec3::new(0.0, 0.5, 0.0));
        assert!(registry.annotate_dimensions("ghost").is_none());
    }

    #[test]
    fn test_style_updates_existing_measurements() {
        let mut registry = registry_with(&[]);
        registry.add_measurement(DVec3::ZERO, DVec3::X);
        let red = Rgba::new(1.0, 0.0, 0.0, 1.0);
        registry.set_measurement_line_color(red);
        registry.set_measurement_text_color(red);
        assert_eq!(registry.measurements()[0].line().color, red);
        assert_eq!(registry.measurements()[0].label().color, red);
        assert_eq!(registry.add_measurement(DVec3::ZERO, DVec3::Y).line().color, red);
    }

    #[test]
    fn test_label_frames_are_read_only() {
        let mut registry = registry_with(&["m1"]);
        registry.add_measurement(DVec3::ZERO, DVec3::X);
        registry.add_angle_measurement(DVec3::X, DVec3::ZERO, DVec3::Y);
        registry.add_annotation(DVec3::ZERO, "note");
        registry.drain_events();

        let frames = registry.label_frames(DVec3::new(0.0, 0.0, -10.0));
        assert_eq!(frames.len(), 3);
        assert!(matches!(frames[0].owner, LabelOwner::Distance(_)));
        assert!(matches!(frames[2].owner, LabelOwner::Annotation(_)));
        assert!(registry.drain_events().is_empty());
    }

    #[test]
    fn test_update_material_unknown_id() {
        let mut registry = registry_with(&["m1"]);
        assert_eq!(registry.update_material("m1", "all", Rgba::WHITE, 0.5, 0.5), Some(2));
        assert_eq!(registry.update_material("ghost", "all", Rgba::WHITE, 0.5, 0.5), None);
    }
}
