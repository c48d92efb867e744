//! Interactive measurement state machine
//!
//! The controller turns a sequence of picked world points into persisted
//! measurements. The mode is a tagged variant carrying the points collected
//! so far, so a half-finished measurement of the wrong kind cannot exist.

use glam::DVec3;
use tracing::{debug, trace};

use crate::event::CoreEvent;
use crate::measurement::{MeasurementId, MeasurementKind};
use crate::registry::ModelRegistry;

/// Progress of a distance measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistanceStep {
    AwaitingStart,
    AwaitingEnd { start: DVec3 },
}

/// Progress of an angle measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AngleStep {
    AwaitingFirst,
    AwaitingVertex { first: DVec3 },
    AwaitingSecond { first: DVec3, vertex: DVec3 },
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MeasurementMode {
    #[default]
    Idle,
    Distance(DistanceStep),
    Angle(AngleStep),
}

impl MeasurementMode {
    fn start(kind: MeasurementKind) -> Self {
        match kind {
            MeasurementKind::Distance => MeasurementMode::Distance(DistanceStep::AwaitingStart),
            MeasurementKind::Angle => MeasurementMode::Angle(AngleStep::AwaitingFirst),
        }
    }

    pub fn kind(&self) -> Option<MeasurementKind> {
        match self {
            MeasurementMode::Idle => None,
            MeasurementMode::Distance(_) => Some(MeasurementKind::Distance),
            MeasurementMode::Angle(_) => Some(MeasurementKind::Angle),
        }
    }

    /// Points collected toward the measurement in progress, in click order
    pub fn pending_points(&self) -> Vec<DVec3> {
        match *self {
            MeasurementMode::Idle
            | MeasurementMode::Distance(DistanceStep::AwaitingStart)
            | MeasurementMode::Angle(AngleStep::AwaitingFirst) => Vec::new(),
            MeasurementMode::Distance(DistanceStep::AwaitingEnd { start }) => vec![start],
            MeasurementMode::Angle(AngleStep::AwaitingVertex { first }) => vec![first],
            MeasurementMode::Angle(AngleStep::AwaitingSecond { first, vertex }) => vec![first, vertex],
        }
    }
}

/// Result of feeding one click to the controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClickOutcome {
    /// No measurement mode is active
    Ignored,
    /// Point recorded; `index` is its zero-based position in the sequence
    PointCaptured { kind: MeasurementKind, index: usize },
    DistanceCreated { id: MeasurementId, distance: f64 },
    AngleCreated { id: MeasurementId, angle: f64 },
}

#[derive(Debug, Default)]
pub struct MeasurementController {
    mode: MeasurementMode,
}

impl MeasurementController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter `kind` mode, discarding any partial sequence
    pub fn start_mode(&mut self, kind: MeasurementKind) {
        if let Some(previous) = self.mode.kind() {
            let discarded = self.mode.pending_points().len();
            if discarded > 0 {
                debug!(previous = %previous, discarded, "Abandoning partial measurement");
            }
        }
        self.mode = MeasurementMode::start(kind);
        debug!(kind = %kind, "Measurement mode started");
    }

    pub fn stop_mode(&mut self) {
        if self.mode != MeasurementMode::Idle {
            debug!("Measurement mode stopped");
        }
        self.mode = MeasurementMode::Idle;
    }

    pub fn mode(&self) -> MeasurementMode {
        self.mode
    }

    pub fn kind(&self) -> Option<MeasurementKind> {
        self.mode.kind()
    }

    pub fn is_measuring(&self) -> bool {
        self.mode != MeasurementMode::Idle
    }

    pub fn pending_points(&self) -> Vec<DVec3> {
        self.mode.pending_points()
    }

    /// Feed one picked point.
    ///
    /// Completing a sequence creates the measurement in `registry` and
    /// leaves the controller in the same mode, ready for the next one.
    pub fn handle_click(&mut self, registry: &mut ModelRegistry, point: DVec3) -> ClickOutcome {
        let (next, outcome) = match self.mode {
            MeasurementMode::Idle => {
                trace!(?point, "Click ignored outside measurement mode");
                return ClickOutcome::Ignored;
            }
            MeasurementMode::Distance(DistanceStep::AwaitingStart) => (
                MeasurementMode::Distance(DistanceStep::AwaitingEnd { start: point }),
                Self::captured(registry, MeasurementKind::Distance, 0, point),
            ),
            MeasurementMode::Distance(DistanceStep::AwaitingEnd { start }) => {
                let m = registry.add_measurement(start, point);
                let (id, distance) = (m.id(), m.distance());
                registry.emit(CoreEvent::MeasurementCreated {
                    kind: MeasurementKind::Distance,
                    id,
                    value: distance,
                });
                (
                    MeasurementMode::Distance(DistanceStep::AwaitingStart),
                    ClickOutcome::DistanceCreated { id, distance },
                )
            }
            MeasurementMode::Angle(AngleStep::AwaitingFirst) => (
                MeasurementMode::Angle(AngleStep::AwaitingVertex { first: point }),
                Self::captured(registry, MeasurementKind::Angle, 0, point),
            ),
            MeasurementMode::Angle(AngleStep::AwaitingVertex { first }) => (
                MeasurementMode::Angle(AngleStep::AwaitingSecond { first, vertex: point }),
                Self::captured(registry, MeasurementKind::Angle, 1, point),
            ),
            MeasurementMode::Angle(AngleStep::AwaitingSecond { first, vertex }) => {
                let m = registry.add_angle_measurement(first, vertex, point);
                let (id, angle) = (m.id(), m.angle());
                registry.emit(CoreEvent::MeasurementCreated {
                    kind: MeasurementKind::Angle,
                    id,
                    value: angle,
                });
                (
                    MeasurementMode::Angle(AngleStep::AwaitingFirst),
                    ClickOutcome::AngleCreated { id, angle },
                )
            }
        };
        self.mode = next;
        outcome
    }

    fn captured(registry: &mut ModelRegistry, kind: MeasurementKind, index: usize, point: DVec3) -> ClickOutcome {
        trace!(kind = %kind, index, ?point, "Point captured");
        registry.emit(CoreEvent::PointCaptured { kind, index, point });
        ClickOutcome::PointCaptured { kind, index }
    }

    pub fn remove_measurement(&self, registry: &mut ModelRegistry, id: MeasurementId) -> bool {
        registry.remove_measurement(id)
    }

    pub fn remove_angle_measurement(&self, registry: &mut ModelRegistry, id: MeasurementId) -> bool {
        registry.remove_angle_measurement(id)
    }

    /// Remove every distance and angle measurement; annotations stay
    pub fn clear_all(&self, registry: &mut ModelRegistry) {
        registry.clear_measurements();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_click_is_ignored() {
        let mut registry = ModelRegistry::default();
        let mut controller = MeasurementController::new();
        assert_eq!(controller.handle_click(&mut registry, DVec3::ONE), ClickOutcome::Ignored);
        assert!(registry.drain_events().is_empty());
        assert!(!controller.is_measuring());
    }

    #[test]
    fn test_distance_sequence() {
        let mut registry = ModelRegistry::default();
        let mut controller = MeasurementController::new();
        controller.start_mode(MeasurementKind::Distance);

        let outcome = controller.handle_click(&mut registry, DVec3::ZERO);
        assert_eq!(
            outcome,
            ClickOutcome::PointCaptured {
                kind: MeasurementKind::Distance,
                index: 0
            }
        );
        assert!(registry.measurements().is_empty());
        assert_eq!(controller.pending_points(), vec![DVec3::ZERO]);

        let outcome = controller.handle_click(&mut registry, DVec3::new(3.0, 4.0, 0.0));
        let ClickOutcome::DistanceCreated { distance, .. } = outcome else {
            panic!("expected a distance, got {:?}", outcome);
        };
        assert!((distance - 5.0).abs() < 1e-9);
        assert!(controller.pending_points().is_empty());
        assert_eq!(controller.kind(), Some(MeasurementKind::Distance));
        assert_eq!(registry.measurements().len(), 1);
    }

    #[test]
    fn test_angle_sequence_stays_in_mode() {
        let mut registry = ModelRegistry::default();
        let mut controller = MeasurementController::new();
        controller.start_mode(MeasurementKind::Angle);

        controller.handle_click(&mut registry, DVec3::X);
        controller.handle_click(&mut registry, DVec3::ZERO);
        assert_eq!(controller.pending_points(), vec![DVec3::X, DVec3::ZERO]);
        let outcome = controller.handle_click(&mut registry, DVec3::Y);
        let ClickOutcome::AngleCreated { angle, .. } = outcome else {
            panic!("expected an angle, got {:?}", outcome);
        };
        assert!((angle - 90.0).abs() < 1e-9);
        assert_eq!(controller.mode(), MeasurementMode::Angle(AngleStep::AwaitingFirst));
    }

    #[test]
    fn test_switching_mode_discards_partial_points() {
        let mut registry = ModelRegistry::default();
        let mut controller = MeasurementController::new();
        controller.start_mode(MeasurementKind::Angle);
        controller.handle_click(&mut registry, DVec3::X);
        controller.handle_click(&mut registry, DVec3::ZERO);

        controller.start_mode(MeasurementKind::Distance);
        assert!(controller.pending_points().is_empty());
        controller.handle_click(&mut registry, DVec3::Y);
        assert!(registry.angle_measurements().is_empty());
        assert!(registry.measurements().is_empty());

        controller.stop_mode();
        assert_eq!(controller.mode(), MeasurementMode::Idle);
        assert!(controller.pending_points().is_empty());
    }

    #[test]
    fn test_same_point_twice_is_zero_distance() {
        let mut registry = ModelRegistry::default();
        let mut controller = MeasurementController::new();
        controller.start_mode(MeasurementKind::Distance);
        controller.handle_click(&mut registry, DVec3::ONE);
        let outcome = controller.handle_click(&mut registry, DVec3::ONE);
        assert!(matches!(outcome, ClickOutcome::DistanceCreated { distance, .. } if distance == 0.0));
    }

    #[test]
    fn test_degenerate_angle_is_created_with_nan() {
        let mut registry = ModelRegistry::default();
        let mut controller = MeasurementController::new();
        controller.start_mode(MeasurementKind::Angle);
        controller.handle_click(&mut registry, DVec3::ZERO);
        controller.handle_click(&mut registry, DVec3::ZERO);
        let outcome = controller.handle_click(&mut registry, DVec3::X);
        assert!(matches!(outcome, ClickOutcome::AngleCreated { angle, .. } if angle.is_nan()));
        assert!(registry.angle_measurements()[0].is_degenerate());
    }

    #[test]
    fn test_events_in_click_order() {
        let mut registry = ModelRegistry::default();
        let mut controller = MeasurementController::new();
        controller.start_mode(MeasurementKind::Distance);
        controller.handle_click(&mut registry, DVec3::ZERO);
        controller.handle_click(&mut registry, DVec3::X);

        let events = registry.drain_events();
        assert!(matches!(events[0], CoreEvent::PointCaptured { index: 0, .. }));
        assert!(matches!(events[1], CoreEvent::DistanceAdded { .. }));
        assert!(matches!(
            events[2],
            CoreEvent::MeasurementCreated {
                kind: MeasurementKind::Distance,
                ..
            }
        ));
    }

    #[test]
    fn test_clear_all_keeps_annotations() {
        let mut registry = ModelRegistry::default();
        let controller = MeasurementController::new();
        let id = registry.add_measurement(DVec3::ZERO, DVec3::X).id();
        registry.add_angle_measurement(DVec3::X, DVec3::ZERO, DVec3::Y);
        registry.add_annotation(DVec3::ZERO, "keep me");

        assert!(controller.remove_measurement(&mut registry, id));
        controller.clear_all(&mut registry);
        assert!(registry.angle_measurements().is_empty());
        assert_eq!(registry.annotations().len(), 1);
    }
}
