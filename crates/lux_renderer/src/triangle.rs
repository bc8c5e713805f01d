//! Triangle primitive for ray tracing.
//!
//! Uses the Möller-Trumbore algorithm for ray-triangle intersection.

use crate::hittable::{HitRecord, Hittable, MIN_T};
use lux_math::{Aabb, Ray, Vec2, Vec3};

/// Determinants below this are treated as a ray parallel to the triangle.
const DET_EPSILON: f32 = 1e-6;

/// Padding for triangle bounding boxes so flat triangles keep some volume.
const BBOX_PADDING: f32 = 1e-4;

/// A triangle primitive.
///
/// Vertices are wound counter-clockwise around the face normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// Vertices
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
    /// Texture coordinates at each vertex
    uvs: [Vec2; 3],
    /// Pre-computed face normal (unit length, zero for degenerate triangles)
    normal: Vec3,
}

impl Triangle {
    /// Create a new triangle from three vertices.
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        Self::with_uvs(v0, v1, v2, [Vec2::ZERO, Vec2::X, Vec2::Y])
    }

    /// Create a triangle carrying per-vertex texture coordinates.
    pub fn with_uvs(v0: Vec3, v1: Vec3, v2: Vec3, uvs: [Vec2; 3]) -> Self {
        let normal = (v1 - v0).cross(v2 - v0).normalize_or_zero();
        Self {
            v0,
            v1,
            v2,
            uvs,
            normal,
        }
    }

    pub fn vertices(&self) -> [Vec3; 3] {
        [self.v0, self.v1, self.v2]
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    pub fn centroid(&self) -> Vec3 {
        (self.v0 + self.v1 + self.v2) / 3.0
    }

    /// Möller-Trumbore intersection with optional backface rejection.
    ///
    /// With `cull` set, rays arriving from behind the face are rejected
    /// before any of the barycentric work is done.
    pub fn intersect(&self, ray: &Ray, t_max: f32, cull: bool) -> Option<HitRecord> {
        if cull && self.normal.dot(ray.direction()) >= 0.0 {
            return None;
        }

        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;

        let h = ray.direction().cross(edge2);
        let a = edge1.dot(h);

        // Ray is parallel to triangle (or the triangle has no area)
        if a.abs() < DET_EPSILON {
            return None;
        }

        let f = 1.0 / a;
        let s = ray.origin() - self.v0;
        let u = f * s.dot(h);

        // Check if intersection is outside triangle (u parameter)
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(edge1);
        let v = f * ray.direction().dot(q);

        // Check if intersection is outside triangle (v parameter)
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * edge2.dot(q);
        if t <= MIN_T || t >= t_max {
            return None;
        }

        let uv = self.uvs[0] * (1.0 - u - v) + self.uvs[1] * u + self.uvs[2] * v;
        Some(HitRecord {
            t,
            p: ray.at(t),
            normal: self.normal,
            uv,
        })
    }
}

impl Hittable for Triangle {
    fn hit(&self, ray: &Ray, t_max: f32) -> Option<HitRecord> {
        self.intersect(ray, t_max, false)
    }

    fn bounding_box(&self) -> Aabb {
        Aabb::enclosing([self.v0, self.v1, self.v2]).expanded(BBOX_PADDING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Counter-clockwise seen from +Z, so the front face looks at +Z.
    fn ccw_triangle() -> Triangle {
        Triangle::new(
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(1.0, -1.0, -1.0),
            Vec3::new(0.0, 1.0, -1.0),
        )
    }

    #[test]
    fn test_triangle_hit() {
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));
        let rec = ccw_triangle().hit(&ray, f32::INFINITY).unwrap();

        assert!((rec.t - 1.0).abs() < 1e-5);
        assert!((rec.normal - Vec3::Z).length() < 1e-6);
    }

    #[test]
    fn test_triangle_miss() {
        // Ray pointing away
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0));
        assert!(ccw_triangle().hit(&ray, f32::INFINITY).is_none());

        // Outside the edges
        let ray = Ray::new(Vec3::new(0.9, 0.9, 0.0), -Vec3::Z);
        assert!(ccw_triangle().hit(&ray, f32::INFINITY).is_none());
    }

    #[test]
    fn test_backface_culling_handedness() {
        let tri = ccw_triangle();

        let outside = Ray::new(Vec3::new(0.0, 0.0, 3.0), -Vec3::Z);
        assert!(tri.intersect(&outside, f32::INFINITY, true).is_some());

        let inside = Ray::new(Vec3::new(0.0, 0.0, -3.0), Vec3::Z);
        assert!(tri.intersect(&inside, f32::INFINITY, true).is_none());
        assert!(tri.intersect(&inside, f32::INFINITY, false).is_some());
    }

    #[test]
    fn test_parallel_and_degenerate() {
        let parallel = Ray::new(Vec3::new(-5.0, 0.0, -1.0), Vec3::X);
        assert!(ccw_triangle().hit(&parallel, f32::INFINITY).is_none());

        let sliver = Triangle::new(Vec3::ZERO, Vec3::X, Vec3::X * 2.0);
        let ray = Ray::new(Vec3::new(1.0, 0.0, 1.0), -Vec3::Z);
        assert!(sliver.hit(&ray, f32::INFINITY).is_none());
        assert_eq!(sliver.normal(), Vec3::ZERO);
    }

    #[test]
    fn test_uv_interpolation() {
        let tri = Triangle::with_uvs(
            Vec3::ZERO,
            Vec3::X,
            Vec3::Y,
            [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)],
        );
        let ray = Ray::new(Vec3::new(0.25, 0.5, 1.0), -Vec3::Z);
        let rec = tri.hit(&ray, f32::INFINITY).unwrap();

        assert!((rec.uv - Vec2::new(0.25, 0.5)).length() < 1e-5);
        assert!((rec.p - Vec3::new(0.25, 0.5, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_t_max() {
        let ray = Ray::new(Vec3::ZERO, -Vec3::Z);
        assert!(ccw_triangle().hit(&ray, 0.5).is_none());
        assert!(ccw_triangle().hit(&ray, 1.5).is_some());
    }

    #[test]
    fn test_bounding_box_padded() {
        let bbox = ccw_triangle().bounding_box();
        assert!(bbox.max.z > -1.0);
        assert!(bbox.min.z < -1.0);
    }
}
