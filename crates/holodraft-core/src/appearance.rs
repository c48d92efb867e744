//! Appearance state applied to model sub-parts and measurement visuals

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// RGBA color with components in 0.0-1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::new(1.0, 1.0, 1.0, 1.0);
    pub const YELLOW: Rgba = Rgba::new(1.0, 0.92, 0.016, 1.0);
    pub const GREEN: Rgba = Rgba::new(0.0, 1.0, 0.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Shading applied to a part's renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shading {
    #[default]
    Default,
    Selected,
    Highlighted,
    Wireframe,
}

impl Shading {
    /// Resolve the shading for a part from its owner's flags.
    ///
    /// Selection wins over hover highlighting, which wins over wireframe.
    pub fn resolve(selected: bool, highlighted: bool, wireframe: bool) -> Self {
        if selected {
            Shading::Selected
        } else if highlighted {
            Shading::Highlighted
        } else if wireframe {
            Shading::Wireframe
        } else {
            Shading::Default
        }
    }
}

/// Host-supplied material parameters for a part
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialOverride {
    pub color: Rgba,
    pub metallic: f32,
    /// Stored as glossiness (`1 - roughness`)
    pub glossiness: f32,
}

impl MaterialOverride {
    pub fn from_roughness(color: Rgba, metallic: f32, roughness: f32) -> Self {
        Self {
            color,
            metallic: metallic.clamp(0.0, 1.0),
            glossiness: 1.0 - roughness.clamp(0.0, 1.0),
        }
    }
}

/// Clipping plane used for cross-section display
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipPlane {
    /// Point on the plane
    pub origin: DVec3,
    /// Unit normal; geometry on the positive side is clipped
    pub normal: DVec3,
}

impl ClipPlane {
    /// Plane through `pivot` shifted `offset` units along `normal`
    pub fn through(pivot: DVec3, normal: DVec3, offset: f64) -> Self {
        let normal = normal.try_normalize().unwrap_or(DVec3::Y);
        Self {
            origin: pivot + normal * offset,
            normal,
        }
    }

    /// Signed distance of `p` from the plane
    pub fn signed_distance(&self, p: DVec3) -> f64 {
        (p - self.origin).dot(self.normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shading_precedence() {
        assert_eq!(Shading::resolve(true, true, true), Shading::Selected);
        assert_eq!(Shading::resolve(false, true, true), Shading::Highlighted);
        assert_eq!(Shading::resolve(false, false, true), Shading::Wireframe);
        assert_eq!(Shading::resolve(false, false, false), Shading::Default);
    }

    #[test]
    fn test_material_glossiness() {
        let m = MaterialOverride::from_roughness(Rgba::WHITE, 0.3, 0.25);
        assert_eq!(m.glossiness, 0.75);
        assert_eq!(m.metallic, 0.3);
    }

    #[test]
    fn test_clip_plane_offset() {
        let plane = ClipPlane::through(DVec3::new(0.0, 2.0, 0.0), DVec3::new(0.0, 3.0, 0.0), 0.5);
        assert_eq!(plane.normal, DVec3::Y);
        assert_eq!(plane.origin, DVec3::new(0.0, 2.5, 0.0));
        assert!((plane.signed_distance(DVec3::new(4.0, 3.0, 1.0)) - 0.5).abs() < 1e-12);
    }
}
