//! Persisted measurement and annotation objects
//!
//! Each object owns its visuals (polyline and label) and recomputes them
//! whenever its points change. Label orientation toward the viewer is not
//! stored; it is derived per frame by [`billboard_rotation`].

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::appearance::Rgba;
use crate::geometry::{distance, unit};

/// Number of segments used to approximate an angle arc
pub const ARC_SEGMENTS: usize = 20;

/// Annotations are drawn this far above their anchor point
pub const ANNOTATION_LIFT: DVec3 = DVec3::Y;

/// Handle to a distance or angle measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MeasurementId(pub u64);

impl std::fmt::Display for MeasurementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "measurement-{}", self.0)
    }
}

/// Handle to an annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnnotationId(pub u64);

impl std::fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "annotation-{}", self.0)
    }
}

/// Kind of measurement being collected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementKind {
    Distance,
    Angle,
}

impl MeasurementKind {
    /// Number of clicks needed to finish one measurement
    pub fn points_required(self) -> usize {
        match self {
            MeasurementKind::Distance => 2,
            MeasurementKind::Angle => 3,
        }
    }
}

impl std::fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeasurementKind::Distance => write!(f, "distance"),
            MeasurementKind::Angle => write!(f, "angle"),
        }
    }
}

/// Visual settings applied to new measurements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementStyle {
    pub line_color: Rgba,
    pub line_width: f64,
    pub text_color: Rgba,
    pub text_size: f64,
    pub arc_color: Rgba,
    pub arc_radius: f64,
    /// Extra distance past the arc radius at which the angle label sits
    pub label_offset: f64,
}

impl Default for MeasurementStyle {
    fn default() -> Self {
        Self {
            line_color: Rgba::YELLOW,
            line_width: 0.02,
            text_color: Rgba::WHITE,
            text_size: 0.05,
            arc_color: Rgba::GREEN,
            arc_radius: 0.2,
            label_offset: 0.1,
        }
    }
}

/// Open polyline visual
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline {
    pub points: Vec<DVec3>,
    pub color: Rgba,
    pub width: f64,
}

/// Text label anchored in world space
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub text: String,
    pub position: DVec3,
    pub color: Rgba,
    pub size: f64,
}

impl Label {
    /// Rotation that turns this label toward `eye`
    pub fn facing(&self, eye: DVec3) -> DQuat {
        billboard_rotation(self.position, eye)
    }
}

/// Rotation taking local +Z onto the direction from `eye` to `position`.
///
/// Text drawn in the local XY plane then reads correctly from `eye`.
pub fn billboard_rotation(position: DVec3, eye: DVec3) -> DQuat {
    match unit(position - eye) {
        Some(dir) => DQuat::from_rotation_arc(DVec3::Z, dir),
        None => DQuat::IDENTITY,
    }
}

/// Straight-line distance between two picked points
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMeasurement {
    id: MeasurementId,
    start: DVec3,
    end: DVec3,
    distance: f64,
    line: Polyline,
    label: Label,
}

impl DistanceMeasurement {
    pub fn new(id: MeasurementId, start: DVec3, end: DVec3, style: &MeasurementStyle) -> Self {
        let mut measurement = Self {
            id,
            start,
            end,
            distance: 0.0,
            line: Polyline {
                points: Vec::with_capacity(2),
                color: style.line_color,
                width: style.line_width,
            },
            label: Label {
                text: String::new(),
                position: DVec3::ZERO,
                color: style.text_color,
                size: style.text_size,
            },
        };
        measurement.recompute();
        measurement
    }

    pub fn id(&self) -> MeasurementId {
        self.id
    }

    pub fn start(&self) -> DVec3 {
        self.start
    }

    pub fn end(&self) -> DVec3 {
        self.end
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn midpoint(&self) -> DVec3 {
        (self.start + self.end) * 0.5
    }

    pub fn line(&self) -> &Polyline {
        &self.line
    }

    pub fn label(&self) -> &Label {
        &self.label
    }

    pub fn set_points(&mut self, start: DVec3, end: DVec3) {
        self.start = start;
        self.end = end;
        self.recompute();
    }

    pub fn set_start(&mut self, start: DVec3) {
        self.start = start;
        self.recompute();
    }

    pub fn set_end(&mut self, end: DVec3) {
        self.end = end;
        self.recompute();
    }

    pub fn set_line_color(&mut self, color: Rgba) {
        self.line.color = color;
    }

    pub fn set_line_width(&mut self, width: f64) {
        self.line.width = width;
    }

    pub fn set_text_color(&mut self, color: Rgba) {
        self.label.color = color;
    }

    fn recompute(&mut self) {
        self.distance = distance(self.start, self.end);
        self.line.points.clear();
        self.line.points.extend([self.start, self.end]);
        self.label.text = format!("{:.2}m", self.distance);
        self.label.position = self.midpoint();
    }
}

/// Angle at a vertex between two picked legs.
///
/// When either leg has zero length the angle is NaN, the arc is empty and
/// the label sits on the vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct AngleMeasurement {
    id: MeasurementId,
    point1: DVec3,
    vertex: DVec3,
    point2: DVec3,
    angle: f64,
    radius: f64,
    label_offset: f64,
    arc: Polyline,
    label: Label,
}

impl AngleMeasurement {
    pub fn new(
        id: MeasurementId,
        point1: DVec3,
        vertex: DVec3,
        point2: DVec3,
        style: &MeasurementStyle,
    ) -> Self {
        let mut measurement = Self {
            id,
            point1,
            vertex,
            point2,
            angle: f64::NAN,
            radius: style.arc_radius,
            label_offset: style.label_offset,
            arc: Polyline {
                points: Vec::with_capacity(ARC_SEGMENTS + 1),
                color: style.arc_color,
                width: style.line_width * 0.5,
            },
            label: Label {
                text: String::new(),
                position: vertex,
                color: style.text_color,
                size: style.text_size,
            },
        };
        measurement.recompute();
        measurement
    }

    pub fn id(&self) -> MeasurementId {
        self.id
    }

    pub fn point1(&self) -> DVec3 {
        self.point1
    }

    pub fn vertex(&self) -> DVec3 {
        self.vertex
    }

    pub fn point2(&self) -> DVec3 {
        self.point2
    }

    /// Angle in degrees, NaN for a zero-length leg
    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn is_degenerate(&self) -> bool {
        self.angle.is_nan()
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn arc(&self) -> &Polyline {
        &self.arc
    }

    pub fn label(&self) -> &Label {
        &self.label
    }

    pub fn set_points(&mut self, point1: DVec3, vertex: DVec3, point2: DVec3) {
        self.point1 = point1;
        self.vertex = vertex;
        self.point2 = point2;
        self.recompute();
    }

    pub fn set_arc_radius(&mut self, radius: f64) {
        self.radius = radius;
        self.recompute();
    }

    pub fn set_arc_color(&mut self, color: Rgba) {
        self.arc.color = color;
    }

    pub fn set_text_color(&mut self, color: Rgba) {
        self.label.color = color;
    }

    fn recompute(&mut self) {
        self.arc.points.clear();

        let (Some(u), Some(v)) = (unit(self.point1 - self.vertex), unit(self.point2 - self.vertex)) else {
            self.angle = f64::NAN;
            self.label.text = "n/a".to_string();
            self.label.position = self.vertex;
            return;
        };

        self.angle = u.dot(v).clamp(-1.0, 1.0).acos().to_degrees();

        // Legs pointing in opposite directions have no bisector or normal of
        // their own; any axis perpendicular to the first leg works.
        let axis = unit(u.cross(v)).unwrap_or_else(|| u.any_orthonormal_vector());
        let sweep = self.angle.to_radians();
        for i in 0..=ARC_SEGMENTS {
            let t = i as f64 / ARC_SEGMENTS as f64;
            let dir = DQuat::from_axis_angle(axis, sweep * t) * u;
            self.arc.points.push(self.vertex + dir * self.radius);
        }

        let bisector = unit(u + v).unwrap_or_else(|| axis.cross(u));
        self.label.text = format!("{:.1}°", self.angle);
        self.label.position = self.vertex + bisector * (self.radius + self.label_offset);
    }
}

/// Free-standing text label anchored at a world position
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    id: AnnotationId,
    anchor: DVec3,
    label: Label,
}

impl Annotation {
    pub fn new(id: AnnotationId, anchor: DVec3, text: impl Into<String>, style: &MeasurementStyle) -> Self {
        Self {
            id,
            anchor,
            label: Label {
                text: text.into(),
                position: anchor + ANNOTATION_LIFT,
                color: style.text_color,
                size: style.text_size * 2.0,
            },
        }
    }

    pub fn id(&self) -> AnnotationId {
        self.id
    }

    pub fn anchor(&self) -> DVec3 {
        self.anchor
    }

    pub fn text(&self) -> &str {
        &self.label.text
    }

    pub fn label(&self) -> &Label {
        &self.label
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.label.text = text.into();
    }

    pub fn set_color(&mut self, color: Rgba) {
        self.label.color = color;
    }
}

/// Which object a per-frame label pose belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelOwner {
    Distance(MeasurementId),
    Angle(MeasurementId),
    Annotation(AnnotationId),
}

/// Billboard pose of one label for the current frame
#[derive(Debug, Clone, PartialEq)]
pub struct LabelFrame {
    pub owner: LabelOwner,
    pub position: DVec3,
    pub rotation: DQuat,
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_distance_measurement() {
        let style = MeasurementStyle::default();
        let m = DistanceMeasurement::new(
            MeasurementId(1),
            DVec3::ZERO,
            DVec3::new(3.0, 4.0, 0.0),
            &style,
        );
        assert!((m.distance() - 5.0).abs() < EPS);
        assert_eq!(m.line().points, vec![DVec3::ZERO, DVec3::new(3.0, 4.0, 0.0)]);
        assert_eq!(m.label().text, "5.00m");
        assert_eq!(m.label().position, DVec3::new(1.5, 2.0, 0.0));
        assert_eq!(m.line().color, style.line_color);
    }

    #[test]
    fn test_distance_recomputes_on_point_change() {
        let style = MeasurementStyle::default();
        let mut m = DistanceMeasurement::new(MeasurementId(1), DVec3::ZERO, DVec3::X, &style);
        m.set_end(DVec3::new(0.0, 0.0, 2.0));
        assert!((m.distance() - 2.0).abs() < EPS);
        assert_eq!(m.label().position, DVec3::new(0.0, 0.0, 1.0));
        m.set_start(DVec3::new(0.0, 0.0, 2.0));
        assert_eq!(m.distance(), 0.0);
        assert_eq!(m.label().text, "0.00m");
    }

    #[test]
    fn test_right_angle_measurement() {
        let style = MeasurementStyle::default();
        let m = AngleMeasurement::new(MeasurementId(2), DVec3::X, DVec3::ZERO, DVec3::Y, &style);
        assert!((m.angle() - 90.0).abs() < EPS);
        assert_eq!(m.label().text, "90.0°");
        assert_eq!(m.arc().points.len(), ARC_SEGMENTS + 1);

        // Arc starts on the first leg and ends on the second, at the radius
        let first = m.arc().points[0];
        let last = m.arc().points[ARC_SEGMENTS];
        assert!((first - DVec3::X * style.arc_radius).length() < 1e-9);
        assert!((last - DVec3::Y * style.arc_radius).length() < 1e-9);
        for p in &m.arc().points {
            assert!((p.length() - style.arc_radius).abs() < 1e-9);
        }

        // Label on the bisector at radius + offset
        let expected = DVec3::new(1.0, 1.0, 0.0).normalize() * (style.arc_radius + style.label_offset);
        assert!((m.label().position - expected).length() < 1e-9);
    }

    #[test]
    fn test_straight_angle_measurement() {
        let style = MeasurementStyle::default();
        let m = AngleMeasurement::new(MeasurementId(3), DVec3::X, DVec3::ZERO, -DVec3::X, &style);
        assert!((m.angle() - 180.0).abs() < 1e-6);
        let last = m.arc().points[ARC_SEGMENTS];
        assert!((last + DVec3::X * style.arc_radius).length() < 1e-9);
        // Bisector falls back to a perpendicular of the first leg
        assert!(m.label().position.dot(DVec3::X).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_angle_measurement() {
        let style = MeasurementStyle::default();
        let m = AngleMeasurement::new(MeasurementId(4), DVec3::ZERO, DVec3::ZERO, DVec3::Y, &style);
        assert!(m.is_degenerate());
        assert!(m.angle().is_nan());
        assert!(m.arc().points.is_empty());
        assert_eq!(m.label().position, DVec3::ZERO);
    }

    #[test]
    fn test_annotation_lift() {
        let style = MeasurementStyle::default();
        let a = Annotation::new(AnnotationId(1), DVec3::new(1.0, 0.0, 0.0), "bolt", &style);
        assert_eq!(a.label().position, DVec3::new(1.0, 1.0, 0.0));
        assert_eq!(a.text(), "bolt");
    }

    #[test]
    fn test_billboard_faces_away_from_eye() {
        let rotation = billboard_rotation(DVec3::new(0.0, 0.0, 5.0), DVec3::ZERO);
        assert!((rotation * DVec3::Z - DVec3::Z).length() < 1e-9);

        let rotation = billboard_rotation(DVec3::X, DVec3::ZERO);
        assert!((rotation * DVec3::Z - DVec3::X).length() < 1e-9);

        assert_eq!(billboard_rotation(DVec3::ONE, DVec3::ONE), DQuat::IDENTITY);
    }
}
