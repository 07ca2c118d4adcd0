//! Rigid transforms and axis-aligned bounds, as plain arrays.
//!
//! Sections store a rest pose and a bounding box; the coordinator
//! interpolates poses between plan endpoints. Components are plain
//! `[f32; N]` arrays so the types serialize and compare without any
//! math-library dependency on the adapter side.

use serde::{Deserialize, Serialize};

/// A rigid (rotation + translation) transform.
/// `rotation` is a unit quaternion stored as (x, y, z, w).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: [f32; 3],
    pub rotation: [f32; 4],
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: [0.0, 0.0, 0.0],
        rotation: [0.0, 0.0, 0.0, 1.0],
    };

    #[inline]
    pub fn from_translation(translation: [f32; 3]) -> Self {
        Self {
            translation,
            rotation: [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Return this transform displaced by `offset` (rotation unchanged).
    #[inline]
    pub fn translated(&self, offset: [f32; 3]) -> Self {
        Self {
            translation: [
                self.translation[0] + offset[0],
                self.translation[1] + offset[1],
                self.translation[2] + offset[2],
            ],
            rotation: self.rotation,
        }
    }

    /// Component-wise tolerance comparison. Quaternion sign ambiguity is
    /// accepted (q and -q describe the same rotation).
    pub fn approx_eq(&self, other: &Transform, tol: f32) -> bool {
        let trans_ok = self
            .translation
            .iter()
            .zip(other.translation.iter())
            .all(|(a, b)| (a - b).abs() <= tol);
        if !trans_ok {
            return false;
        }
        let same = self
            .rotation
            .iter()
            .zip(other.rotation.iter())
            .all(|(a, b)| (a - b).abs() <= tol);
        let negated = self
            .rotation
            .iter()
            .zip(other.rotation.iter())
            .all(|(a, b)| (a + b).abs() <= tol);
        same || negated
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Aabb {
    #[inline]
    pub fn new(min: [f32; 3], max: [f32; 3]) -> Self {
        Self { min, max }
    }

    /// A degenerate box at a single point.
    #[inline]
    pub fn point(p: [f32; 3]) -> Self {
        Self { min: p, max: p }
    }

    #[inline]
    pub fn center(&self) -> [f32; 3] {
        [
            0.5 * (self.min[0] + self.max[0]),
            0.5 * (self.min[1] + self.max[1]),
            0.5 * (self.min[2] + self.max[2]),
        ]
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: [
                self.min[0].min(other.min[0]),
                self.min[1].min(other.min[1]),
                self.min[2].min(other.min[2]),
            ],
            max: [
                self.max[0].max(other.max[0]),
                self.max[1].max(other.max[1]),
                self.max[2].max(other.max[2]),
            ],
        }
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::point([0.0, 0.0, 0.0])
    }
}
