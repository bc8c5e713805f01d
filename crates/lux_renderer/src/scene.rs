//! Scene container and light transport.
//!
//! The scene owns every primitive, light and material. Primitives refer to
//! materials by [`MaterialId`]; ids are checked when a primitive is added, so
//! lookups during tracing cannot fail.

use crate::hittable::{HitRecord, Hittable};
use crate::kdtree::KdTree;
use crate::light::Light;
use crate::material::{LightContribution, Material, MaterialId, ShadingContext};
use crate::mesh::TriangleMesh;
use crate::quad::Quad;
use crate::sphere::Sphere;
use lux_core::{MeshError, TextureError};
use lux_math::{Color, Ray, Vec3};
use rand::Rng;
use thiserror::Error;

/// Default recursion limit for a camera ray.
pub const DEFAULT_MAX_BOUNCES: u32 = 5;

/// Default number of shadow rays per light and shading point.
pub const DEFAULT_OCCLUSION_RAYS: u32 = 10;

/// Limits applied while tracing a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceSettings {
    /// Surfaces a path may hit before it is cut off (black)
    pub max_bounces: u32,
    /// Shadow rays per light at each lit shading point
    pub occlusion_rays: u32,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            max_bounces: DEFAULT_MAX_BOUNCES,
            occlusion_rays: DEFAULT_OCCLUSION_RAYS,
        }
    }
}

/// Errors raised while assembling a scene.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("material {0:?} does not exist (scene has {1} materials)")]
    UnknownMaterial(MaterialId, usize),

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error(transparent)]
    Mesh(#[from] MeshError),

    #[error(transparent)]
    Texture(#[from] TextureError),
}

pub type SceneResult<T> = Result<T, SceneError>;

/// Which primitive a scene intersection landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectRef {
    Sphere(usize),
    Quad(usize),
    Mesh { mesh: usize, triangle: usize },
}

/// Nearest intersection across all primitives.
#[derive(Debug, Clone, Copy)]
pub struct SceneHit {
    pub record: HitRecord,
    pub object: ObjectRef,
}

/// Colour, first-surface normal and depth seen along one camera ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayResult {
    pub color: Color,
    /// Normal of the first opaque surface, zero if none was reached
    pub normal: Vec3,
    /// Distance to the first opaque surface, summed over any glass passed
    /// on the way; `-1` if the path escaped to the sky first
    pub depth: f32,
}

impl Default for RayResult {
    fn default() -> Self {
        Self {
            color: Color::ZERO,
            normal: Vec3::ZERO,
            depth: 0.0,
        }
    }
}

/// Background colour for rays that leave the scene.
pub fn sky_gradient(ray: &Ray) -> Color {
    let a = 0.5 * (ray.direction().y + 1.0);
    let white = Color::new(1.0, 1.0, 1.0);
    let blue = Color::new(0.5, 0.7, 1.0);
    white * (1.0 - a) + blue * a
}

/// A renderable scene.
#[derive(Debug, Clone)]
pub struct Scene {
    meshes: Vec<TriangleMesh>,
    spheres: Vec<Sphere>,
    quads: Vec<Quad>,
    lights: Vec<Light>,
    materials: Vec<Material>,
    kd_tree: Option<KdTree>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            meshes: Vec::new(),
            spheres: Vec::new(),
            quads: Vec::new(),
            lights: Vec::new(),
            materials: Vec::new(),
            kd_tree: None,
        }
    }

    /// Register a material and get the id primitives use to refer to it.
    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.push(material);
        MaterialId(self.materials.len() - 1)
    }

    pub fn add_sphere(&mut self, sphere: Sphere) -> SceneResult<usize> {
        self.check_material(sphere.material)?;
        if !(sphere.radius() > 0.0) {
            return Err(SceneError::InvalidGeometry(format!(
                "sphere radius must be positive, got {}",
                sphere.radius()
            )));
        }
        self.spheres.push(sphere);
        Ok(self.spheres.len() - 1)
    }

    pub fn add_quad(&mut self, quad: Quad) -> SceneResult<usize> {
        self.check_material(quad.material)?;
        if quad.normal() == Vec3::ZERO {
            return Err(SceneError::InvalidGeometry("quad has zero area".into()));
        }
        self.quads.push(quad);
        Ok(self.quads.len() - 1)
    }

    /// Add a mesh. A previously built spatial index no longer covers every
    /// mesh, so it is dropped and must be rebuilt.
    pub fn add_mesh(&mut self, mesh: TriangleMesh) -> SceneResult<usize> {
        self.check_material(mesh.material)?;
        if self.kd_tree.take().is_some() {
            log::warn!("Mesh added after KdTree build; index dropped until rebuilt");
        }
        self.meshes.push(mesh);
        Ok(self.meshes.len() - 1)
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    /// Build the spatial index over all current meshes and use it for
    /// mesh intersection from now on.
    pub fn build_kd_tree(&mut self) {
        self.kd_tree = Some(KdTree::build(&self.meshes));
    }

    /// Go back to testing every mesh directly.
    pub fn drop_kd_tree(&mut self) {
        self.kd_tree = None;
    }

    pub fn kd_tree(&self) -> Option<&KdTree> {
        self.kd_tree.as_ref()
    }

    pub fn meshes(&self) -> &[TriangleMesh] {
        &self.meshes
    }

    pub fn spheres(&self) -> &[Sphere] {
        &self.spheres
    }

    pub fn quads(&self) -> &[Quad] {
        &self.quads
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// Total number of triangles over all meshes.
    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|m| m.triangles().len()).sum()
    }

    fn check_material(&self, id: MaterialId) -> SceneResult<()> {
        if id.0 < self.materials.len() {
            Ok(())
        } else {
            Err(SceneError::UnknownMaterial(id, self.materials.len()))
        }
    }

    /// Look up a material, or `None` for an id from another scene.
    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0)
    }

    /// Ids of stored objects are validated on insertion.
    fn stored_material(&self, id: MaterialId) -> &Material {
        &self.materials[id.0]
    }

    /// Material of the object a hit landed on.
    pub(crate) fn material_of(&self, object: ObjectRef) -> &Material {
        let id = match object {
            ObjectRef::Sphere(i) => self.spheres[i].material,
            ObjectRef::Quad(i) => self.quads[i].material,
            ObjectRef::Mesh { mesh, .. } => self.meshes[mesh].material,
        };
        self.stored_material(id)
    }

    /// Nearest intersection over spheres, then quads, then meshes.
    ///
    /// Quads and meshes reject back faces when their culling flag is set.
    /// On equal distances the first object tested wins.
    pub fn intersect(&self, ray: &Ray) -> Option<SceneHit> {
        if ray.is_degenerate() {
            return None;
        }

        let mut closest = f32::INFINITY;
        let mut result = None;

        for (i, sphere) in self.spheres.iter().enumerate() {
            if let Some(record) = sphere.hit(ray, closest) {
                closest = record.t;
                result = Some(SceneHit {
                    record,
                    object: ObjectRef::Sphere(i),
                });
            }
        }

        for (i, quad) in self.quads.iter().enumerate() {
            if let Some(record) = quad.hit(ray, closest) {
                closest = record.t;
                result = Some(SceneHit {
                    record,
                    object: ObjectRef::Quad(i),
                });
            }
        }

        match &self.kd_tree {
            Some(tree) => {
                if let Some(hit) = tree.intersect(ray, closest) {
                    result = Some(SceneHit {
                        record: hit.record,
                        object: ObjectRef::Mesh {
                            mesh: hit.mesh_index,
                            triangle: hit.triangle_index,
                        },
                    });
                }
            }
            None => {
                for (i, mesh) in self.meshes.iter().enumerate() {
                    if let Some((record, triangle)) = mesh.intersect(ray, closest, mesh.cull_backfaces)
                    {
                        closest = record.t;
                        result = Some(SceneHit {
                            record,
                            object: ObjectRef::Mesh { mesh: i, triangle },
                        });
                    }
                }
            }
        }

        result
    }

    /// True if a shadow-casting surface lies along `ray` closer than `max_t`.
    ///
    /// Surfaces block from both sides; glass never blocks.
    pub fn is_occluded(&self, ray: &Ray, max_t: f32) -> bool {
        if ray.is_degenerate() {
            return false;
        }

        let sphere_blocks = self.spheres.iter().any(|s| {
            self.stored_material(s.material).casts_shadows() && s.hit(ray, max_t).is_some()
        });
        if sphere_blocks {
            return true;
        }

        let quad_blocks = self.quads.iter().any(|q| {
            self.stored_material(q.material).casts_shadows() && q.intersect(ray, max_t, false).is_some()
        });
        if quad_blocks {
            return true;
        }

        let mesh_casts = |i: usize| self.stored_material(self.meshes[i].material).casts_shadows();
        match &self.kd_tree {
            Some(tree) => tree.any_hit(ray, max_t, mesh_casts),
            None => (0..self.meshes.len())
                .any(|i| mesh_casts(i) && self.meshes[i].occludes(ray, max_t)),
        }
    }

    /// Light arriving at `point` from every light, attenuated by the
    /// fraction of `samples` jittered shadow rays that got through.
    pub fn direct_lighting<R: Rng + ?Sized>(
        &self,
        point: Vec3,
        samples: u32,
        rng: &mut R,
    ) -> Vec<LightContribution> {
        let samples = samples.max(1);

        self.lights
            .iter()
            .map(|light| {
                let visible = (0..samples)
                    .filter(|_| {
                        let target = light.random_target(rng);
                        let ray = Ray::towards(point, target);
                        !self.is_occluded(&ray, point.distance(target))
                    })
                    .count();

                LightContribution {
                    direction: (light.position - point).normalize_or_zero(),
                    irradiance: light.irradiance_at(point) * visible as f32 / samples as f32,
                }
            })
            .collect()
    }

    /// Trace a camera ray through the scene.
    pub fn trace<R: Rng + ?Sized>(
        &self,
        ray: &Ray,
        settings: &TraceSettings,
        rng: &mut R,
    ) -> RayResult {
        let mut result = RayResult::default();
        let color = self.trace_path(ray, settings, rng, settings.max_bounces, &mut result, true);
        RayResult { color, ..result }
    }

    /// One segment of a path. `record` stays set until the path reaches its
    /// first opaque surface, accumulating depth through glass on the way.
    fn trace_path<R: Rng + ?Sized>(
        &self,
        ray: &Ray,
        settings: &TraceSettings,
        rng: &mut R,
        bounces_left: u32,
        result: &mut RayResult,
        record: bool,
    ) -> Color {
        if bounces_left == 0 {
            return Color::ZERO;
        }

        let Some(hit) = self.intersect(ray) else {
            if record {
                result.depth = -1.0;
            }
            return sky_gradient(ray);
        };

        let material = self.material_of(hit.object);
        let point = hit.record.p;

        if record {
            result.depth += hit.record.t;
            result.normal = hit.record.normal;
        }
        let record = record && !material.casts_shadows();

        let lights = if material.uses_direct_lighting() {
            self.direct_lighting(point, settings.occlusion_rays, rng)
        } else {
            Vec::new()
        };

        let scattered = match material.scatter(ray.direction(), hit.record.normal) {
            Some(direction) => {
                let next = Ray::new(point, direction);
                self.trace_path(&next, settings, rng, bounces_left - 1, result, record)
            }
            None => Color::ZERO,
        };

        material.compute_color(&ShadingContext {
            incident: ray.direction(),
            normal: hit.record.facing_normal(ray),
            uv: hit.record.uv,
            lights: &lights,
            scattered,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Phong;
    use lux_core::Mesh;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn matte(scene: &mut Scene) -> MaterialId {
        scene.add_material(Material::Phong(Phong::new(
            Color::ZERO,
            Color::ONE,
            Color::ZERO,
            1.0,
        )))
    }

    #[test]
    fn test_unknown_material_rejected() {
        let mut scene = Scene::new();
        let result = scene.add_sphere(Sphere::new(Vec3::ZERO, 1.0, MaterialId(3)));
        assert!(matches!(result, Err(SceneError::UnknownMaterial(MaterialId(3), 0))));
    }

    #[test]
    fn test_material_lookup_with_foreign_id() {
        let mut other = Scene::new();
        matte(&mut other);
        let foreign = matte(&mut other);

        let mut scene = Scene::new();
        let own = matte(&mut scene);
        assert!(scene.material(own).is_some());
        assert!(scene.material(foreign).is_none());
    }

    #[test]
    fn test_invalid_geometry_rejected() {
        let mut scene = Scene::new();
        let mat = matte(&mut scene);
        assert!(matches!(
            scene.add_sphere(Sphere::new(Vec3::ZERO, 0.0, mat)),
            Err(SceneError::InvalidGeometry(_))
        ));
        assert!(matches!(
            scene.add_quad(Quad::new(Vec3::ZERO, Vec3::X, Vec3::X, 1.0, 1.0, mat)),
            Err(SceneError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_nearest_across_kinds() {
        let mut scene = Scene::new();
        let mat = matte(&mut scene);
        scene.add_sphere(Sphere::new(Vec3::new(0.0, 0.0, -10.0), 1.0, mat)).unwrap();
        scene
            .add_quad(Quad::new(Vec3::new(-1.0, -1.0, -5.0), Vec3::X, Vec3::Y, 2.0, 2.0, mat))
            .unwrap();
        let tri = Mesh::from_positions(
            vec![Vec3::new(-1.0, -1.0, -3.0), Vec3::new(1.0, -1.0, -3.0), Vec3::new(0.0, 1.0, -3.0)],
            vec![[0, 1, 2]],
        );
        scene.add_mesh(TriangleMesh::new(tri, mat).unwrap()).unwrap();

        let ray = Ray::new(Vec3::ZERO, -Vec3::Z);
        let hit = scene.intersect(&ray).unwrap();
        assert_eq!(hit.object, ObjectRef::Mesh { mesh: 0, triangle: 0 });
        assert!((hit.record.t - 3.0).abs() < 1e-5);

        scene.build_kd_tree();
        let hit = scene.intersect(&ray).unwrap();
        assert_eq!(hit.object, ObjectRef::Mesh { mesh: 0, triangle: 0 });

        // Off the triangle but still on the quad
        let ray = Ray::new(Vec3::new(0.9, 0.9, 0.0), -Vec3::Z);
        assert_eq!(scene.intersect(&ray).unwrap().object, ObjectRef::Quad(0));
    }

    #[test]
    fn test_quad_backface_culled_for_camera_rays_only() {
        let mut scene = Scene::new();
        let mat = matte(&mut scene);
        // Faces +Z
        scene
            .add_quad(Quad::new(Vec3::new(-1.0, -1.0, 0.0), Vec3::X, Vec3::Y, 2.0, 2.0, mat))
            .unwrap();

        let from_behind = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        assert!(scene.intersect(&from_behind).is_none());
        assert!(scene.is_occluded(&from_behind, 10.0));
        assert!(!scene.is_occluded(&from_behind, 4.0));
    }

    #[test]
    fn test_glass_does_not_occlude() {
        let mut scene = Scene::new();
        let glass = scene.add_material(Material::glass(1.5));
        scene.add_sphere(Sphere::new(Vec3::ZERO, 1.0, glass)).unwrap();

        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), -Vec3::Z);
        assert!(scene.intersect(&ray).is_some());
        assert!(!scene.is_occluded(&ray, 100.0));
    }

    #[test]
    fn test_sky_when_empty() {
        let scene = Scene::new();
        let mut rng = StdRng::seed_from_u64(0);
        let up = Ray::new(Vec3::ZERO, Vec3::Y);

        let result = scene.trace(&up, &TraceSettings::default(), &mut rng);
        assert_eq!(result.depth, -1.0);
        assert_eq!(result.normal, Vec3::ZERO);
        assert!((result.color - Color::new(0.5, 0.7, 1.0)).length() < 1e-6);
    }

    #[test]
    fn test_first_opaque_surface_recorded() {
        let mut scene = Scene::new();
        let mat = matte(&mut scene);
        scene.add_sphere(Sphere::new(Vec3::ZERO, 1.0, mat)).unwrap();
        scene.add_light(Light::white(Vec3::new(0.0, 0.0, 5.0), 0.0, 16.0));

        let mut rng = StdRng::seed_from_u64(0);
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), -Vec3::Z);
        let result = scene.trace(&ray, &TraceSettings::default(), &mut rng);

        assert!((result.depth - 4.0).abs() < 1e-5);
        assert!((result.normal - Vec3::Z).length() < 1e-5);
        // Point light 4 units away straight along the normal: 16 / 16
        assert!((result.color - Color::ONE).length() < 1e-4);
    }

    #[test]
    fn test_shadowed_point_gets_ambient_only() {
        let mut scene = Scene::new();
        let floor_mat = scene.add_material(Material::Phong(Phong::new(
            Color::splat(0.1),
            Color::ONE,
            Color::ZERO,
            1.0,
        )));
        let blocker = matte(&mut scene);
        // Floor facing +Y with a small sphere hanging between it and the light
        scene
            .add_quad(Quad::new(Vec3::new(-5.0, 0.0, -5.0), Vec3::Z, Vec3::X, 10.0, 10.0, floor_mat))
            .unwrap();
        scene.add_sphere(Sphere::new(Vec3::new(0.0, 2.0, 0.0), 0.5, blocker)).unwrap();
        scene.add_light(Light::white(Vec3::new(0.0, 4.0, 0.0), 0.0, 10.0));

        let mut rng = StdRng::seed_from_u64(3);

        let lit = scene.direct_lighting(Vec3::new(3.0, 0.0, 0.0), 10, &mut rng);
        assert!(lit[0].irradiance.x > 0.0);
        let shadowed = scene.direct_lighting(Vec3::ZERO, 10, &mut rng);
        assert_eq!(shadowed[0].irradiance, Color::ZERO);

        // Grazing ray that passes under the sphere and lands in its shadow
        let ray = Ray::towards(Vec3::new(-3.0, 1.0, 0.0), Vec3::ZERO);
        assert_eq!(scene.intersect(&ray).unwrap().object, ObjectRef::Quad(0));
        let result = scene.trace(&ray, &TraceSettings::default(), &mut rng);
        assert!((result.color - Color::splat(0.1)).length() < 1e-5);
    }

    #[test]
    fn test_bounce_limit_returns_black() {
        let mut scene = Scene::new();
        let mirror = scene.add_material(Material::Mirror);
        // Two facing mirrors trap the ray
        scene
            .add_quad(Quad::new(Vec3::new(-1.0, -1.0, 1.0), Vec3::Y, Vec3::X, 2.0, 2.0, mirror))
            .unwrap();
        scene
            .add_quad(Quad::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::X, Vec3::Y, 2.0, 2.0, mirror))
            .unwrap();

        let mut rng = StdRng::seed_from_u64(0);
        let ray = Ray::new(Vec3::ZERO, -Vec3::Z);
        let result = scene.trace(&ray, &TraceSettings::default(), &mut rng);
        assert_eq!(result.color, Color::ZERO);
        assert!((result.depth - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_depth_through_glass() {
        let mut scene = Scene::new();
        let glass = scene.add_material(Material::glass(1.0003));
        let mat = matte(&mut scene);
        // Index-matched glass slab in front of an opaque wall
        scene.add_sphere(Sphere::new(Vec3::new(0.0, 0.0, -3.0), 1.0, glass)).unwrap();
        scene
            .add_quad(Quad::new(Vec3::new(-5.0, -5.0, -10.0), Vec3::X, Vec3::Y, 10.0, 10.0, mat))
            .unwrap();

        let mut rng = StdRng::seed_from_u64(0);
        let result = scene.trace(&Ray::new(Vec3::ZERO, -Vec3::Z), &TraceSettings::default(), &mut rng);

        // 2 to the sphere, 2 through it, 6 to the wall
        assert!((result.depth - 10.0).abs() < 1e-3);
        assert!((result.normal - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn test_mesh_occlusion_respects_material() {
        let mut scene = Scene::new();
        let glass = scene.add_material(Material::glass(1.5));
        let opaque = matte(&mut scene);
        let wall = |z: f32| Mesh::quad(Vec3::new(-1.0, -1.0, z), Vec3::X, Vec3::Y, 2.0, 2.0);
        scene.add_mesh(TriangleMesh::new(wall(-2.0), glass).unwrap()).unwrap();
        scene.add_mesh(TriangleMesh::new(wall(-4.0), opaque).unwrap()).unwrap();

        let ray = Ray::new(Vec3::ZERO, -Vec3::Z);
        for use_tree in [false, true] {
            if use_tree {
                scene.build_kd_tree();
            }
            assert!(!scene.is_occluded(&ray, 3.0));
            assert!(scene.is_occluded(&ray, 5.0));
        }
    }
}
