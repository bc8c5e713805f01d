use crate::{Ray, Vec3};

/// Axis-aligned bounding box given by its minimum and maximum corners.
///
/// Used both for per-mesh rejection tests and for the nodes of the
/// triangle spatial index.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// A box containing nothing. Growing it by any point yields that point.
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Create an AABB from two corner points, in any order.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Smallest box containing every point of the iterator.
    pub fn enclosing<I: IntoIterator<Item = Vec3>>(points: I) -> Self {
        points.into_iter().fold(Self::EMPTY, |acc, p| acc.grown(p))
    }

    /// True if the box contains no point at all.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// This box extended to contain `point`.
    pub fn grown(&self, point: Vec3) -> Self {
        Self {
            min: self.min.min(point),
            max: self.max.max(point),
        }
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &Aabb) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// This box with `margin` added on every side.
    pub fn expanded(&self, margin: f32) -> Self {
        if self.is_empty() {
            return *self;
        }
        Self {
            min: self.min - Vec3::splat(margin),
            max: self.max + Vec3::splat(margin),
        }
    }

    /// True if `point` lies inside the box (boundary included).
    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// True if `other` lies entirely inside this box.
    pub fn contains_box(&self, other: &Aabb) -> bool {
        other.is_empty() || (self.contains(other.min) && self.contains(other.max))
    }

    /// Returns the center point of the bounding box.
    pub fn centroid(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Extent along each axis.
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Slab test against a ray, limited to `[0, t_max]`.
    ///
    /// Returns the parametric distance at which the ray enters the box
    /// (0 if the origin is inside), or `None` if the ray misses.
    /// Uses the ray's cached inverse direction so no division happens here.
    #[inline]
    pub fn hit(&self, ray: &Ray, t_max: f32) -> Option<f32> {
        if self.is_empty() {
            return None;
        }

        let inv = ray.inv_direction();
        let t1 = (self.min - ray.origin()) * inv;
        let t2 = (self.max - ray.origin()) * inv;

        let t_enter = t1.min(t2).max_element().max(0.0);
        let t_exit = t1.max(t2).min_element().min(t_max);

        (t_exit >= t_enter).then_some(t_enter)
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}
