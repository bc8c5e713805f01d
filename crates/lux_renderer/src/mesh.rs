//! Renderable triangle meshes.

use crate::hittable::{HitRecord, Hittable};
use crate::material::MaterialId;
use crate::triangle::Triangle;
use lux_core::{Mesh, MeshResult};
use lux_math::{Aabb, Ray, Vec3};

/// Margin around a mesh's vertex extrema so coplanar geometry still passes
/// the bounding box test.
const BBOX_MARGIN: f32 = 1e-4;

/// A triangle mesh placed in a scene.
///
/// Owns its source geometry plus the derived triangle list and bounding box.
/// Every transform rebuilds the derived data, so the two never disagree.
#[derive(Debug, Clone)]
pub struct TriangleMesh {
    geometry: Mesh,
    triangles: Vec<Triangle>,
    bbox: Aabb,
    pub material: MaterialId,
    pub cull_backfaces: bool,
}

impl TriangleMesh {
    /// Wrap validated geometry. Empty meshes and out-of-range indices are
    /// rejected here so that nothing half-built ever reaches the tracer.
    pub fn new(geometry: Mesh, material: MaterialId) -> MeshResult<Self> {
        geometry.validate()?;
        let mut mesh = Self {
            geometry,
            triangles: Vec::new(),
            bbox: Aabb::EMPTY,
            material,
            cull_backfaces: true,
        };
        mesh.rebuild();
        Ok(mesh)
    }

    /// Set whether back faces are rejected for camera and bounce rays.
    pub fn with_backface_culling(mut self, cull: bool) -> Self {
        self.cull_backfaces = cull;
        self
    }

    pub fn geometry(&self) -> &Mesh {
        &self.geometry
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn triangle(&self, index: usize) -> &Triangle {
        &self.triangles[index]
    }

    pub fn translate(&mut self, offset: Vec3) {
        self.geometry.translate(offset);
        self.rebuild();
    }

    pub fn scale(&mut self, factors: Vec3) {
        self.geometry.scale(factors);
        self.rebuild();
    }

    pub fn rotate_x(&mut self, degrees: f32) {
        self.geometry.rotate_x(degrees);
        self.rebuild();
    }

    pub fn rotate_y(&mut self, degrees: f32) {
        self.geometry.rotate_y(degrees);
        self.rebuild();
    }

    pub fn rotate_z(&mut self, degrees: f32) {
        self.geometry.rotate_z(degrees);
        self.rebuild();
    }

    /// Regenerate the triangle list and bounding box from the geometry.
    fn rebuild(&mut self) {
        self.triangles = (0..self.geometry.triangle_count())
            .map(|i| {
                let [a, b, c] = self.geometry.triangle_positions(i);
                Triangle::with_uvs(a, b, c, self.geometry.triangle_uvs(i))
            })
            .collect();
        self.bbox = self.geometry.bounds().expanded(BBOX_MARGIN);
    }

    /// Nearest hit over all triangles, honoring the mesh's culling flag.
    ///
    /// Returns the hit and the index of the triangle that produced it.
    pub fn intersect(&self, ray: &Ray, t_max: f32, cull: bool) -> Option<(HitRecord, usize)> {
        self.bbox.hit(ray, t_max)?;

        let mut closest = t_max;
        let mut result = None;
        for (i, tri) in self.triangles.iter().enumerate() {
            if let Some(rec) = tri.intersect(ray, closest, cull) {
                closest = rec.t;
                result = Some((rec, i));
            }
        }
        result
    }

    /// True if any triangle is hit closer than `t_max`, regardless of facing.
    pub fn occludes(&self, ray: &Ray, t_max: f32) -> bool {
        if self.bbox.hit(ray, t_max).is_none() {
            return false;
        }
        self.triangles
            .iter()
            .any(|tri| tri.intersect(ray, t_max, false).is_some())
    }
}

impl Hittable for TriangleMesh {
    fn hit(&self, ray: &Ray, t_max: f32) -> Option<HitRecord> {
        self.intersect(ray, t_max, self.cull_backfaces)
            .map(|(rec, _)| rec)
    }

    fn bounding_box(&self) -> Aabb {
        self.bbox
    }
}
