//! Mesh geometry representation for Lux scenes.
//!
//! This module provides a renderer-agnostic indexed triangle mesh that can be
//! generated procedurally or read from an OFF file, transformed in place, and
//! handed to the ray tracer which builds its intersection primitives from it.

use lux_math::{Aabb, Mat3, Vec2, Vec3};
use thiserror::Error;

/// Errors raised while building or loading a mesh.
#[derive(Error, Debug)]
pub enum MeshError {
    #[error("mesh has no vertices or no triangles")]
    Empty,

    #[error("triangle {triangle} references vertex {index}, but the mesh has {vertex_count} vertices")]
    IndexOutOfRange {
        triangle: usize,
        index: u32,
        vertex_count: usize,
    },

    #[error("OFF parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type MeshResult<T> = Result<T, MeshError>;

/// A single mesh vertex.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl MeshVertex {
    /// A vertex at `position` with no normal and zero uv.
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            normal: Vec3::ZERO,
            uv: Vec2::ZERO,
        }
    }

    /// A vertex with explicit texture coordinates.
    pub fn with_uv(position: Vec3, uv: Vec2) -> Self {
        Self {
            position,
            normal: Vec3::ZERO,
            uv,
        }
    }
}

/// An indexed triangle mesh.
///
/// Triangles are wound counter-clockwise when seen from the side their
/// normal points to.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    /// Vertex attributes
    pub vertices: Vec<MeshVertex>,

    /// Vertex index triples, one per triangle
    pub triangles: Vec<[u32; 3]>,
}

impl Mesh {
    /// Create a mesh from vertices and triangles and compute its normals.
    pub fn new(vertices: Vec<MeshVertex>, triangles: Vec<[u32; 3]>) -> Self {
        let mut mesh = Self {
            vertices,
            triangles,
        };
        mesh.recompute_normals();
        mesh
    }

    /// Create a mesh from bare positions.
    pub fn from_positions(positions: Vec<Vec3>, triangles: Vec<[u32; 3]>) -> Self {
        Self::new(positions.into_iter().map(MeshVertex::at).collect(), triangles)
    }

    /// A planar quad: `bottom_left`, then `width` along `right` and `height`
    /// along `up`. The face normal is `right × up`.
    pub fn quad(bottom_left: Vec3, right: Vec3, up: Vec3, width: f32, height: f32) -> Self {
        let r = right.normalize_or_zero() * width;
        let u = up.normalize_or_zero() * height;
        let vertices = vec![
            MeshVertex::with_uv(bottom_left, Vec2::new(0.0, 0.0)),
            MeshVertex::with_uv(bottom_left + r, Vec2::new(1.0, 0.0)),
            MeshVertex::with_uv(bottom_left + r + u, Vec2::new(1.0, 1.0)),
            MeshVertex::with_uv(bottom_left + u, Vec2::new(0.0, 1.0)),
        ];
        Self::new(vertices, vec![[0, 1, 2], [0, 2, 3]])
    }

    /// An axis-aligned box with outward-facing triangles.
    pub fn cuboid(center: Vec3, half_extents: Vec3) -> Self {
        // (normal, right, up) with right × up == normal
        let faces = [
            (Vec3::X, Vec3::Y, Vec3::Z),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::Z, Vec3::X),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::Y, Vec3::X),
        ];

        let mut mesh = Mesh::default();
        for (normal, right, up) in faces {
            let bottom_left = center + normal * half_extents - right * half_extents - up * half_extents;
            let width = (right * half_extents).length() * 2.0;
            let height = (up * half_extents).length() * 2.0;
            mesh.append(&Mesh::quad(bottom_left, right, up, width, height));
        }
        mesh.recompute_normals();
        mesh
    }

    /// Append all vertices and triangles of `other`.
    pub fn append(&mut self, other: &Mesh) {
        let offset = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.triangles.extend(
            other
                .triangles
                .iter()
                .map(|t| [t[0] + offset, t[1] + offset, t[2] + offset]),
        );
    }

    /// Check that the mesh can be rendered: it must have geometry and every
    /// index must refer to an existing vertex.
    pub fn validate(&self) -> MeshResult<()> {
        if self.vertices.is_empty() || self.triangles.is_empty() {
            return Err(MeshError::Empty);
        }
        let vertex_count = self.vertices.len();
        for (triangle, indices) in self.triangles.iter().enumerate() {
            if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(MeshError::IndexOutOfRange {
                    triangle,
                    index,
                    vertex_count,
                });
            }
        }
        Ok(())
    }

    /// Exact bounding box of the vertex positions.
    pub fn bounds(&self) -> Aabb {
        Aabb::enclosing(self.vertices.iter().map(|v| v.position))
    }

    /// Get the number of triangles in the mesh.
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Get the number of vertices in the mesh.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Corner positions of triangle `index`.
    pub fn triangle_positions(&self, index: usize) -> [Vec3; 3] {
        let [a, b, c] = self.triangles[index];
        [
            self.vertices[a as usize].position,
            self.vertices[b as usize].position,
            self.vertices[c as usize].position,
        ]
    }

    /// Corner texture coordinates of triangle `index`.
    pub fn triangle_uvs(&self, index: usize) -> [Vec2; 3] {
        let [a, b, c] = self.triangles[index];
        [
            self.vertices[a as usize].uv,
            self.vertices[b as usize].uv,
            self.vertices[c as usize].uv,
        ]
    }

    /// Move every vertex by `offset`.
    pub fn translate(&mut self, offset: Vec3) {
        for vertex in &mut self.vertices {
            vertex.position += offset;
        }
    }

    /// Scale every vertex about the origin, per axis.
    pub fn scale(&mut self, factors: Vec3) {
        self.apply_transform(Mat3::from_diagonal(factors));
    }

    /// Rotate about the x axis by `degrees`.
    pub fn rotate_x(&mut self, degrees: f32) {
        self.apply_transform(Mat3::from_rotation_x(degrees.to_radians()));
    }

    /// Rotate about the y axis by `degrees`.
    pub fn rotate_y(&mut self, degrees: f32) {
        self.apply_transform(Mat3::from_rotation_y(degrees.to_radians()));
    }

    /// Rotate about the z axis by `degrees`.
    pub fn rotate_z(&mut self, degrees: f32) {
        self.apply_transform(Mat3::from_rotation_z(degrees.to_radians()));
    }

    /// Apply a linear transform to every position.
    ///
    /// Normals are recomputed from the face windings rather than transformed,
    /// so they stay correct under non-uniform scale.
    pub fn apply_transform(&mut self, transform: Mat3) {
        for vertex in &mut self.vertices {
            vertex.position = transform * vertex.position;
        }
        self.recompute_normals();
    }

    /// Center the mesh on the origin and scale it so that its farthest vertex
    /// lies on the unit sphere.
    pub fn center_and_scale_to_unit(&mut self) {
        if self.vertices.is_empty() {
            return;
        }
        let center = self.vertices.iter().map(|v| v.position).sum::<Vec3>() / self.vertices.len() as f32;
        let radius = self
            .vertices
            .iter()
            .map(|v| (v.position - center).length())
            .fold(0.0_f32, f32::max);

        let scale = if radius > 0.0 { 1.0 / radius } else { 1.0 };
        for vertex in &mut self.vertices {
            vertex.position = (vertex.position - center) * scale;
        }
    }

    /// Compute smooth vertex normals from area-weighted face normals.
    ///
    /// Triangles with out-of-range indices are skipped; vertices that touch
    /// no valid triangle get an up normal.
    pub fn recompute_normals(&mut self) {
        let vertex_count = self.vertices.len();
        let mut normals = vec![Vec3::ZERO; vertex_count];

        for face in &self.triangles {
            let [i0, i1, i2] = face.map(|i| i as usize);
            if i0 >= vertex_count || i1 >= vertex_count || i2 >= vertex_count {
                continue;
            }

            let p0 = self.vertices[i0].position;
            let p1 = self.vertices[i1].position;
            let p2 = self.vertices[i2].position;
            let face_normal = (p1 - p0).cross(p2 - p0);

            normals[i0] += face_normal;
            normals[i1] += face_normal;
            normals[i2] += face_normal;
        }

        for (vertex, normal) in self.vertices.iter_mut().zip(normals) {
            vertex.normal = normal.try_normalize().unwrap_or(Vec3::Y);
        }
    }
}
