use crate::Vec3;

/// A ray in 3D space with origin and unit direction.
///
/// The direction is normalized on construction so that the ray parameter `t`
/// is a world-space distance. The per-axis inverse direction is cached for
/// slab tests against bounding boxes; a zero direction component yields a
/// signed infinity, which the slab test relies on.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    origin: Vec3,
    direction: Vec3,
    inv_direction: Vec3,
}

impl Ray {
    /// Create a new ray. `direction` does not need to be normalized.
    ///
    /// A zero-length direction produces a degenerate ray that never
    /// intersects anything.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        let direction = direction.normalize_or_zero();
        Self {
            origin,
            direction,
            inv_direction: direction.recip(),
        }
    }

    /// Create a ray starting at `origin` and aimed at `target`.
    pub fn towards(origin: Vec3, target: Vec3) -> Self {
        Self::new(origin, target - origin)
    }

    /// Get the origin point of the ray.
    #[inline]
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Get the unit direction of the ray.
    #[inline]
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Get the per-axis reciprocal of the direction.
    #[inline]
    pub fn inv_direction(&self) -> Vec3 {
        self.inv_direction
    }

    /// True if the direction collapsed to zero on construction.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.direction == Vec3::ZERO
    }

    /// Get the point along the ray at parameter t.
    ///
    /// Returns: origin + t * direction
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_normalizes_direction() {
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 3.0, 4.0));

        assert!((ray.direction().length() - 1.0).abs() < 1e-6);
        assert!((ray.direction() - Vec3::new(0.0, 0.6, 0.8)).length() < 1e-6);
    }

    #[test]
    fn test_ray_at_is_distance() {
        let ray = Ray::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0));

        assert_eq!(ray.at(0.0), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(ray.at(2.5), Vec3::new(3.5, 0.0, 0.0));
        assert_eq!(ray.at(-1.0), Vec3::ZERO);
    }

    #[test]
    fn test_inverse_direction() {
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, -1.0, 0.0));
        let inv = ray.inv_direction();

        assert_eq!(inv.y, -1.0);
        assert!(inv.x.is_infinite());
        assert!(inv.z.is_infinite());
    }

    #[test]
    fn test_towards() {
        let ray = Ray::towards(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        assert_eq!(ray.direction(), Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn test_zero_direction_is_degenerate() {
        let ray = Ray::new(Vec3::ONE, Vec3::ZERO);
        assert!(ray.is_degenerate());
        assert_eq!(ray.at(10.0), Vec3::ONE);
    }
}
