//! Pose and bounding-volume helpers
//!
//! Pure functions and value types shared by model entities and
//! measurements. Nothing in here holds state.

use glam::{DQuat, DVec3, EulerRot};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Vectors shorter than this are treated as zero-length legs
pub const DEGENERATE_EPSILON: f64 = 1e-12;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(&'static str),
}

/// Euclidean distance between two points
pub fn distance(a: DVec3, b: DVec3) -> f64 {
    (a - b).length()
}

/// Angle between two vectors in degrees, in `[0, 180]`.
///
/// Returns NaN when either vector is zero-length; use
/// [`try_angle_degrees`] to get the degeneracy as an error instead.
pub fn angle_degrees(u: DVec3, v: DVec3) -> f64 {
    try_angle_degrees(u, v).unwrap_or(f64::NAN)
}

/// Angle between two vectors in degrees, rejecting zero-length inputs
pub fn try_angle_degrees(u: DVec3, v: DVec3) -> Result<f64, GeometryError> {
    let u = unit(u).ok_or(GeometryError::DegenerateGeometry("zero-length first vector"))?;
    let v = unit(v).ok_or(GeometryError::DegenerateGeometry("zero-length second vector"))?;
    Ok(u.dot(v).clamp(-1.0, 1.0).acos().to_degrees())
}

/// Normalize a vector, or `None` when it is too short to have a direction
pub fn unit(v: DVec3) -> Option<DVec3> {
    let len = v.length();
    if !len.is_finite() || len < DEGENERATE_EPSILON {
        None
    } else {
        Some(v / len)
    }
}

/// Componentwise union of two bounding volumes
pub fn union_bounds(a: &BoundingVolume, b: &BoundingVolume) -> BoundingVolume {
    a.union(b)
}

/// Bounding-box volume estimate (`size.x * size.y * size.z`)
pub fn box_volume(bounds: &BoundingVolume) -> f64 {
    let s = bounds.size();
    s.x * s.y * s.z
}

/// Bounding-box surface-area estimate
pub fn box_surface_area(bounds: &BoundingVolume) -> f64 {
    let s = bounds.size();
    2.0 * (s.x * s.y + s.x * s.z + s.y * s.z)
}

/// Placement of a node in world space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: DVec3,
    pub rotation: DQuat,
    pub scale: DVec3,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        position: DVec3::ZERO,
        rotation: DQuat::IDENTITY,
        scale: DVec3::ONE,
    };

    pub fn new(position: DVec3, rotation: DQuat, scale: DVec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Build a pose from Euler angles in degrees.
    ///
    /// Rotation is applied Z first, then X, then Y, matching the host's
    /// convention for Euler triples.
    pub fn from_euler_degrees(position: DVec3, euler: DVec3, scale: DVec3) -> Self {
        let rotation = DQuat::from_euler(
            EulerRot::YXZ,
            euler.y.to_radians(),
            euler.x.to_radians(),
            euler.z.to_radians(),
        );
        Self::new(position, rotation, scale)
    }

    /// Euler angles in degrees as (x, y, z), inverse of [`Pose::from_euler_degrees`]
    pub fn euler_degrees(&self) -> DVec3 {
        let (y, x, z) = self.rotation.to_euler(EulerRot::YXZ);
        DVec3::new(x.to_degrees(), y.to_degrees(), z.to_degrees())
    }

    pub fn with_position(mut self, position: DVec3) -> Self {
        self.position = position;
        self
    }
}

/// Axis-aligned bounding volume in world space.
///
/// The empty volume has inverted infinite corners so that the first union
/// yields exactly the other operand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingVolume {
    pub min: DVec3,
    pub max: DVec3,
}

impl Default for BoundingVolume {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl BoundingVolume {
    pub const EMPTY: BoundingVolume = BoundingVolume {
        min: DVec3::INFINITY,
        max: DVec3::NEG_INFINITY,
    };

    /// Build from two arbitrary corners
    pub fn from_corners(a: DVec3, b: DVec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn from_center_size(center: DVec3, size: DVec3) -> Self {
        let half = size.abs() * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Smallest volume containing every point, empty for no points
    pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Self {
        let mut bounds = Self::EMPTY;
        for p in points {
            bounds.encapsulate_point(p);
        }
        bounds
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn union(&self, other: &BoundingVolume) -> BoundingVolume {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        BoundingVolume {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Grow this volume to contain `other`
    pub fn encapsulate(&mut self, other: &BoundingVolume) {
        *self = self.union(other);
    }

    pub fn encapsulate_point(&mut self, p: DVec3) {
        if self.is_empty() {
            self.min = p;
            self.max = p;
        } else {
            self.min = self.min.min(p);
            self.max = self.max.max(p);
        }
    }

    /// Extent along each axis, zero for the empty volume
    pub fn size(&self) -> DVec3 {
        if self.is_empty() {
            DVec3::ZERO
        } else {
            self.max - self.min
        }
    }

    pub fn center(&self) -> DVec3 {
        if self.is_empty() {
            DVec3::ZERO
        } else {
            (self.min + self.max) * 0.5
        }
    }

    pub fn corners(&self) -> Option<(DVec3, DVec3)> {
        (!self.is_empty()).then_some((self.min, self.max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_distance_symmetric_and_zero() {
        let a = DVec3::new(1.0, -2.0, 3.5);
        let b = DVec3::new(-4.0, 0.25, 9.0);
        assert_eq!(distance(a, b), distance(b, a));
        assert_eq!(distance(a, a), 0.0);
        assert!((distance(DVec3::ZERO, DVec3::new(3.0, 4.0, 0.0)) - 5.0).abs() < EPS);
    }

    #[test]
    fn test_angle_degrees() {
        let x = DVec3::X;
        let y = DVec3::Y;
        assert!((angle_degrees(x, y) - 90.0).abs() < EPS);
        assert!((angle_degrees(y, x) - 90.0).abs() < EPS);
        assert!(angle_degrees(x, x).abs() < 1e-6);
        assert!((angle_degrees(x, -x) - 180.0).abs() < 1e-6);
        assert!((angle_degrees(x, DVec3::new(1.0, 1.0, 0.0)) - 45.0).abs() < 1e-6);
    }

    #[test]
    fn test_angle_range_for_many_vectors() {
        let samples = [
            DVec3::new(1.0, 2.0, 3.0),
            DVec3::new(-0.5, 0.1, 7.0),
            DVec3::new(1e-3, -1e-3, 2e-3),
            DVec3::new(-10.0, -10.0, -10.0),
        ];
        for u in samples {
            for v in samples {
                let a = angle_degrees(u, v);
                assert!((0.0..=180.0).contains(&a), "angle {} out of range", a);
                assert!((a - angle_degrees(v, u)).abs() < EPS);
            }
        }
    }

    #[test]
    fn test_angle_degenerate() {
        assert!(angle_degrees(DVec3::ZERO, DVec3::X).is_nan());
        assert_eq!(
            try_angle_degrees(DVec3::X, DVec3::ZERO),
            Err(GeometryError::DegenerateGeometry("zero-length second vector"))
        );
    }

    #[test]
    fn test_union_with_empty_is_identity() {
        let b = BoundingVolume::from_corners(DVec3::new(1.0, 2.0, 3.0), DVec3::new(-1.0, 0.0, 5.0));
        assert_eq!(BoundingVolume::EMPTY.union(&b), b);
        assert_eq!(b.union(&BoundingVolume::EMPTY), b);
        assert_eq!(b.min, DVec3::new(-1.0, 0.0, 3.0));
        assert_eq!(b.max, DVec3::new(1.0, 2.0, 5.0));
    }

    #[test]
    fn test_union_bounds() {
        let a = BoundingVolume::from_corners(DVec3::ZERO, DVec3::ONE);
        let b = BoundingVolume::from_corners(DVec3::splat(-1.0), DVec3::splat(0.5));
        let u = union_bounds(&a, &b);
        assert_eq!(u.min, DVec3::splat(-1.0));
        assert_eq!(u.max, DVec3::ONE);
    }

    #[test]
    fn test_box_volume_and_area() {
        let b = BoundingVolume::from_center_size(DVec3::ZERO, DVec3::new(2.0, 3.0, 4.0));
        assert!((box_volume(&b) - 24.0).abs() < EPS);
        assert!((box_surface_area(&b) - 52.0).abs() < EPS);
        assert_eq!(box_volume(&BoundingVolume::EMPTY), 0.0);
    }

    #[test]
    fn test_euler_round_trip() {
        let euler = DVec3::new(30.0, 45.0, 10.0);
        let pose = Pose::from_euler_degrees(DVec3::ZERO, euler, DVec3::ONE);
        let back = pose.euler_degrees();
        assert!((back - euler).length() < 1e-6, "got {:?}", back);
    }
}
