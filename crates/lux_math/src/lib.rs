// Re-export glam for convenience
pub use glam::*;

mod aabb;
mod camera;
mod ray;

pub use aabb::Aabb;
pub use camera::Camera;
pub use ray::Ray;

/// RGB color with linear float channels, nominally in [0, 1].
pub type Color = Vec3;

/// Mirror `incident` about the plane with unit normal `normal`.
#[inline]
pub fn reflect(incident: Vec3, normal: Vec3) -> Vec3 {
    incident - 2.0 * incident.dot(normal) * normal
}

/// Bend the unit vector `incident` through a surface with unit normal
/// `normal` (facing against `incident`) using Snell's law.
///
/// `eta` is the ratio of the refractive index on the incident side to the
/// one on the transmitted side. Returns `None` on total internal reflection.
#[inline]
pub fn refract(incident: Vec3, normal: Vec3, eta: f32) -> Option<Vec3> {
    let cos_i = (-incident).dot(normal).min(1.0);
    let sin2_t = eta * eta * (1.0 - cos_i * cos_i);
    if sin2_t > 1.0 {
        return None;
    }
    let cos_t = (1.0 - sin2_t).sqrt();
    Some(eta * incident + (eta * cos_i - cos_t) * normal)
}
