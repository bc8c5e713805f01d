//! Surface materials.
//!
//! A material answers two questions at a hit point: does the path continue
//! (and in which direction), and how do the direct lighting and the colour
//! brought back by the continued path combine into the surface colour.

use std::sync::Arc;

use lux_core::Texture;
use lux_math::{reflect, refract, Color, Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Refractive index of the medium surrounding glass objects (air).
pub const OUTSIDE_IOR: f32 = 1.0003;

/// Index into a scene's material table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaterialId(pub usize);

/// Light arriving at a shading point from one light source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightContribution {
    /// Unit vector from the shading point towards the light center
    pub direction: Vec3,
    /// Colour times power over squared distance, weighted by the fraction
    /// of shadow rays that reached the light
    pub irradiance: Color,
}

/// Everything a material needs to compute its colour at a hit.
#[derive(Debug, Clone, Copy)]
pub struct ShadingContext<'a> {
    /// Unit direction of the incoming ray
    pub incident: Vec3,
    /// Unit surface normal facing the incoming ray
    pub normal: Vec3,
    /// Surface parameters at the hit
    pub uv: Vec2,
    /// One entry per light, empty for materials without direct lighting
    pub lights: &'a [LightContribution],
    /// Colour returned along the scattered ray, black if none was traced
    pub scattered: Color,
}

/// Blinn-Phong surface parameters, shared by plain and textured materials.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Phong {
    pub ambient: Color,
    pub diffuse: Color,
    pub specular: Color,
    /// Highlight exponent
    pub shininess: f32,
    /// Weight of the mirror reflection, scaled by `specular`. No reflection
    /// ray is traced when this is zero.
    pub reflectivity: f32,
}

impl Phong {
    pub fn new(ambient: Color, diffuse: Color, specular: Color, shininess: f32) -> Self {
        Self {
            ambient,
            diffuse,
            specular,
            shininess,
            reflectivity: 0.0,
        }
    }

    /// A matte surface with a faint highlight.
    pub fn matte(diffuse: Color) -> Self {
        Self::new(Color::ZERO, diffuse, Color::splat(0.2), 16.0)
    }

    pub fn with_reflectivity(mut self, reflectivity: f32) -> Self {
        self.reflectivity = reflectivity.max(0.0);
        self
    }

    fn shade(&self, diffuse: Color, ctx: &ShadingContext) -> Color {
        let view = -ctx.incident;
        let mut color = self.ambient;

        for light in ctx.lights {
            let n_dot_l = ctx.normal.dot(light.direction);
            if n_dot_l <= 0.0 {
                continue;
            }
            color += diffuse * light.irradiance * n_dot_l;

            let half = (light.direction + view).normalize_or_zero();
            let n_dot_h = ctx.normal.dot(half).max(0.0);
            color += self.specular * light.irradiance * n_dot_h.powf(self.shininess);
        }

        color + self.specular * ctx.scattered * self.reflectivity
    }
}

/// Surface material, dispatched by variant.
#[derive(Debug, Clone)]
pub enum Material {
    /// Opaque, lit by the scene lights
    Phong(Phong),
    /// Perfect reflector
    Mirror,
    /// Refractive dielectric with the given index of refraction
    Glass { ior: f32 },
    /// Phong shading with the diffuse colour read from a texture
    Textured { phong: Phong, texture: Arc<Texture> },
}

impl Material {
    pub fn phong(ambient: Color, diffuse: Color, specular: Color, shininess: f32) -> Self {
        Material::Phong(Phong::new(ambient, diffuse, specular, shininess))
    }

    pub fn glass(ior: f32) -> Self {
        Material::Glass { ior }
    }

    pub fn textured(phong: Phong, texture: Texture) -> Self {
        Material::Textured {
            phong,
            texture: Arc::new(texture),
        }
    }

    /// Whether the material blocks shadow rays.
    pub fn casts_shadows(&self) -> bool {
        !matches!(self, Material::Glass { .. })
    }

    /// Whether the colour depends on the scene lights. Shadow rays are
    /// only traced for materials that need them.
    pub fn uses_direct_lighting(&self) -> bool {
        matches!(self, Material::Phong(_) | Material::Textured { .. })
    }

    /// Direction of the continued path, if any.
    ///
    /// `incident` is the unit ray direction and `normal` the unit outward
    /// geometric normal, which may face either way relative to the ray.
    pub fn scatter(&self, incident: Vec3, normal: Vec3) -> Option<Vec3> {
        let entering = incident.dot(normal) < 0.0;
        let facing = if entering { normal } else { -normal };

        match self {
            Material::Phong(phong) | Material::Textured { phong, .. } => {
                (phong.reflectivity > 0.0).then(|| reflect(incident, facing))
            }
            Material::Mirror => Some(reflect(incident, facing)),
            Material::Glass { ior } => {
                let eta = if entering {
                    OUTSIDE_IOR / ior
                } else {
                    ior / OUTSIDE_IOR
                };
                // Total internal reflection bounces back inside
                Some(refract(incident, facing, eta).unwrap_or_else(|| reflect(incident, facing)))
            }
        }
    }

    /// Final surface colour.
    pub fn compute_color(&self, ctx: &ShadingContext) -> Color {
        match self {
            Material::Phong(phong) => phong.shade(phong.diffuse, ctx),
            Material::Textured { phong, texture } => {
                let diffuse = phong.diffuse * texture.sample(ctx.uv.x, ctx.uv.y);
                phong.shade(diffuse, ctx)
            }
            Material::Mirror | Material::Glass { .. } => ctx.scattered,
        }
    }
}
