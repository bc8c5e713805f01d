//! Planar parallelogram ("quad") primitive.

use crate::hittable::{HitRecord, Hittable, MIN_T};
use crate::material::MaterialId;
use lux_math::{Aabb, Mat3, Ray, Vec2, Vec3};

/// Rays closer to parallel with the plane than this are treated as misses.
const PARALLEL_EPSILON: f32 = 1e-8;

/// A parallelogram spanned by two edge vectors from a corner.
///
/// The outward normal is `right × up`. Scenes built from quads (room walls,
/// floors) rely on that orientation when backface culling is on.
#[derive(Debug, Clone)]
pub struct Quad {
    corner: Vec3,
    right: Vec3,
    up: Vec3,
    uv_min: Vec2,
    uv_max: Vec2,
    pub material: MaterialId,
    /// Reject camera and bounce rays hitting the back of the quad
    pub cull_backfaces: bool,
    // Derived from the edges, refreshed after every transform
    normal: Vec3,
    w: Vec3,
}

impl Quad {
    /// A `width` by `height` quad with `bottom_left` at one corner, extending
    /// along the `right` and `up` directions.
    pub fn new(
        bottom_left: Vec3,
        right: Vec3,
        up: Vec3,
        width: f32,
        height: f32,
        material: MaterialId,
    ) -> Self {
        let mut quad = Self {
            corner: bottom_left,
            right: right.normalize_or_zero() * width,
            up: up.normalize_or_zero() * height,
            uv_min: Vec2::ZERO,
            uv_max: Vec2::ONE,
            material,
            cull_backfaces: true,
            normal: Vec3::ZERO,
            w: Vec3::ZERO,
        };
        quad.update_frame();
        quad
    }

    /// Map the quad's surface to `[uv_min, uv_max]` instead of the unit square.
    pub fn with_uv_range(mut self, uv_min: Vec2, uv_max: Vec2) -> Self {
        self.uv_min = uv_min;
        self.uv_max = uv_max;
        self
    }

    /// Set whether back faces are rejected.
    pub fn with_backface_culling(mut self, cull: bool) -> Self {
        self.cull_backfaces = cull;
        self
    }

    pub fn corner(&self) -> Vec3 {
        self.corner
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    /// The four corners, counter-clockwise around the normal.
    pub fn corners(&self) -> [Vec3; 4] {
        [
            self.corner,
            self.corner + self.right,
            self.corner + self.right + self.up,
            self.corner + self.up,
        ]
    }

    /// True if `ray` approaches the front (normal) side.
    #[inline]
    pub fn faces(&self, ray: &Ray) -> bool {
        ray.direction().dot(self.normal) < 0.0
    }

    pub fn translate(&mut self, offset: Vec3) {
        self.corner += offset;
    }

    /// Scale about the world origin.
    pub fn scale(&mut self, factors: Vec3) {
        self.apply_transform(Mat3::from_diagonal(factors));
    }

    pub fn rotate_x(&mut self, degrees: f32) {
        self.apply_transform(Mat3::from_rotation_x(degrees.to_radians()));
    }

    pub fn rotate_y(&mut self, degrees: f32) {
        self.apply_transform(Mat3::from_rotation_y(degrees.to_radians()));
    }

    pub fn rotate_z(&mut self, degrees: f32) {
        self.apply_transform(Mat3::from_rotation_z(degrees.to_radians()));
    }

    /// Transform the corner and both edges about the world origin.
    pub fn apply_transform(&mut self, transform: Mat3) {
        self.corner = transform * self.corner;
        self.right = transform * self.right;
        self.up = transform * self.up;
        self.update_frame();
    }

    fn update_frame(&mut self) {
        let n = self.right.cross(self.up);
        let len_sq = n.length_squared();
        if len_sq > 0.0 {
            self.normal = n / len_sq.sqrt();
            self.w = n / len_sq;
        } else {
            // Zero-area quad: never hit
            self.normal = Vec3::ZERO;
            self.w = Vec3::ZERO;
        }
    }

    /// Intersect with optional backface rejection.
    ///
    /// Shadow rays pass `cull = false` so that quads occlude from both sides.
    pub fn intersect(&self, ray: &Ray, t_max: f32, cull: bool) -> Option<HitRecord> {
        let denom = ray.direction().dot(self.normal);
        if denom.abs() < PARALLEL_EPSILON {
            return None;
        }
        if cull && denom > 0.0 {
            return None;
        }

        let t = (self.corner - ray.origin()).dot(self.normal) / denom;
        if t <= MIN_T || t >= t_max {
            return None;
        }

        // Planar coordinates of the hit in the (right, up) frame
        let p = ray.at(t);
        let local = p - self.corner;
        let alpha = self.w.dot(local.cross(self.up));
        let beta = self.w.dot(self.right.cross(local));
        if !(0.0..=1.0).contains(&alpha) || !(0.0..=1.0).contains(&beta) {
            return None;
        }

        Some(HitRecord {
            t,
            p,
            normal: self.normal,
            uv: self.uv_min + (self.uv_max - self.uv_min) * Vec2::new(alpha, beta),
        })
    }
}

impl Hittable for Quad {
    fn hit(&self, ray: &Ray, t_max: f32) -> Option<HitRecord> {
        self.intersect(ray, t_max, self.cull_backfaces)
    }

    fn bounding_box(&self) -> Aabb {
        Aabb::enclosing(self.corners())
    }
}
