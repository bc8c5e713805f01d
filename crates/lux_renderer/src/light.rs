//! Volume lights for soft shadows.

use lux_math::{Color, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A light with a position and a size.
///
/// Shadow rays aim at random points in the cube of half-size `radius`
/// around the center, which softens shadow edges as the radius grows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub position: Vec3,
    pub radius: f32,
    pub color: Color,
    /// Scales the emitted colour before inverse-square falloff
    pub power: f32,
}

impl Light {
    pub fn new(position: Vec3, radius: f32, color: Color, power: f32) -> Self {
        Self {
            position,
            radius: radius.max(0.0),
            color,
            power,
        }
    }

    /// A white light of the given power.
    pub fn white(position: Vec3, radius: f32, power: f32) -> Self {
        Self::new(position, radius, Color::ONE, power)
    }

    /// Uniformly jittered point inside the light's volume.
    pub fn random_target<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec3 {
        if self.radius == 0.0 {
            return self.position;
        }
        let r = self.radius;
        self.position
            + Vec3::new(
                rng.gen_range(-r..=r),
                rng.gen_range(-r..=r),
                rng.gen_range(-r..=r),
            )
    }

    /// Colour reaching `point` from the light center when nothing blocks it.
    pub fn irradiance_at(&self, point: Vec3) -> Color {
        let distance_sq = self.position.distance_squared(point);
        self.color * self.power / distance_sq.max(f32::EPSILON)
    }
}
