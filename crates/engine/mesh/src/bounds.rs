//! Axis-aligned bounding boxes

use glam::{Mat4, Vec3};

/// Axis-aligned bounding box in world units
///
/// An empty box has `min > max` on every axis, which makes it the identity
/// element for [`Aabb::union`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Aabb {
    /// Box containing nothing
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Create a box from two corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create a box from its center and full extent
    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        let half = size * 0.5;
        Self::new(center - half, center + half)
    }

    /// Smallest box containing every point
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Vec3>,
    {
        points.into_iter().fold(Self::EMPTY, |mut acc, p| {
            acc.expand(p);
            acc
        })
    }

    /// Grow the box to include `point`
    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Smallest box containing both boxes
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// True if the box contains no point
    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    /// Center point, or the origin for an empty box
    pub fn center(&self) -> Vec3 {
        if self.is_empty() {
            return Vec3::ZERO;
        }
        (self.min + self.max) * 0.5
    }

    /// Extent along each axis, or zero for an empty box
    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            return Vec3::ZERO;
        }
        self.max - self.min
    }

    /// Bounds of this box after applying `matrix` to its eight corners
    pub fn transformed(&self, matrix: &Mat4) -> Aabb {
        if self.is_empty() {
            return Self::EMPTY;
        }
        let corners = (0..8).map(|i| {
            Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            )
        });
        Self::from_points(corners.map(|c| matrix.transform_point3(c)))
    }

    /// True if both boxes match within `epsilon` on every corner coordinate
    pub fn abs_diff_eq(&self, other: &Aabb, epsilon: f32) -> bool {
        self.min.abs_diff_eq(other.min, epsilon) && self.max.abs_diff_eq(other.max, epsilon)
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl std::fmt::Display for Aabb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "<empty>");
        }
        let c = self.center();
        let s = self.size();
        write!(
            f,
            "center ({:.3}, {:.3}, {:.3}) size ({:.3}, {:.3}, {:.3})",
            c.x, c.y, c.z, s.x, s.y, s.z
        )
    }
}
