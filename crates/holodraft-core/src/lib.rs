//! HoloDraft Core - Model registry and interactive measurement engine
//!
//! This crate provides the state behind the HoloDraft viewer:
//! - Pose and bounding-volume helpers
//! - Model entities with visualization state (selection, wireframe, exploded, cross-section)
//! - Distance and angle measurements plus free-standing annotations
//! - The click-driven measurement state machine
//! - The model registry that owns all of the above and queues change events

pub mod appearance;
pub mod controller;
pub mod entity;
pub mod event;
pub mod geometry;
pub mod loader;
pub mod measurement;
pub mod registry;

pub use appearance::{ClipPlane, MaterialOverride, Rgba, Shading};
pub use controller::{AngleStep, ClickOutcome, DistanceStep, MeasurementController, MeasurementMode};
pub use entity::{ModelEntity, ModelMetadata, ModelSummary, SubPart, ALL_MATERIALS};
pub use event::{CoreEvent, VisualizationMode};
pub use geometry::{BoundingVolume, GeometryError, Pose};
pub use loader::{LoadError, LoadRequest, LoadedAsset, ModelLoader, PartNode, RenderNode, SourceFormat};
pub use measurement::{
    Annotation, AnnotationId, AngleMeasurement, DistanceMeasurement, LabelFrame, LabelOwner,
    MeasurementId, MeasurementKind, MeasurementStyle,
};
pub use registry::{ModelRegistry, RegistryError, RegistrySettings};
