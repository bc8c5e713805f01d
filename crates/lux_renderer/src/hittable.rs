//! Hittable trait and HitRecord for ray-object intersection.

use lux_math::{Aabb, Ray, Vec2, Vec3};

/// Smallest accepted ray parameter. Hits closer than this are treated as
/// self-intersections of the surface the ray started on.
pub const MIN_T: f32 = 1e-5;

/// Record of a ray-object intersection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitRecord {
    /// Parameter t where the intersection occurs (a distance, rays are unit length)
    pub t: f32,
    /// Point of intersection
    pub p: Vec3,
    /// Unit geometric normal on the primitive's outward side
    pub normal: Vec3,
    /// Surface parameters for texture lookup
    pub uv: Vec2,
}

impl HitRecord {
    /// True if the ray arrives on the side the normal points to.
    #[inline]
    pub fn is_front_face(&self, ray: &Ray) -> bool {
        ray.direction().dot(self.normal) < 0.0
    }

    /// The normal flipped, if needed, to point against the ray.
    #[inline]
    pub fn facing_normal(&self, ray: &Ray) -> Vec3 {
        if self.is_front_face(ray) {
            self.normal
        } else {
            -self.normal
        }
    }
}

/// Keep whichever of two optional hits is closer. Ties keep `a`.
#[inline]
pub fn closer(a: Option<HitRecord>, b: Option<HitRecord>) -> Option<HitRecord> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if b.t < a.t { b } else { a }),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Trait for objects that can be hit by rays.
///
/// Implementations never mutate themselves and report degenerate cases
/// (parallel rays, zero-area surfaces, zero directions) as a miss.
pub trait Hittable: Send + Sync {
    /// Nearest intersection with `MIN_T < t < t_max`.
    fn hit(&self, ray: &Ray, t_max: f32) -> Option<HitRecord>;

    /// Get the axis-aligned bounding box of this object.
    fn bounding_box(&self) -> Aabb;
}
