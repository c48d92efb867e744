//! Events produced by registry and controller mutations
//!
//! Mutations push events onto the registry's queue; the owner (usually the
//! host bridge) drains the queue after each command and forwards what it
//! needs. Ordering within the queue is the order of mutation.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::geometry::Pose;
use crate::measurement::{AnnotationId, MeasurementId, MeasurementKind};

/// Global visualization toggles applied to every registered model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VisualizationMode {
    Wireframe,
    Exploded,
    CrossSection,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    /// Model registered after a successful load
    ModelLoaded { id: String },
    /// Load rejected or failed; `code` is a stable machine-readable reason
    ModelLoadFailed {
        id: String,
        code: &'static str,
        message: String,
    },
    ModelSelected { id: String },
    ModelDeselected { id: String },
    ModelDeleted { id: String },
    ModelTransformed { id: String, pose: Pose },
    VisualizationChanged { mode: VisualizationMode, enabled: bool },
    DistanceAdded { id: MeasurementId, distance: f64 },
    AngleAdded { id: MeasurementId, angle: f64 },
    MeasurementRemoved { id: MeasurementId },
    AnnotationAdded {
        id: AnnotationId,
        position: DVec3,
        text: String,
    },
    MeasurementsCleared,
    /// A click was recorded but the measurement is not complete yet
    PointCaptured {
        kind: MeasurementKind,
        index: usize,
        point: DVec3,
    },
    /// A click sequence finished and produced a measurement
    MeasurementCreated {
        kind: MeasurementKind,
        id: MeasurementId,
        value: f64,
    },
}
