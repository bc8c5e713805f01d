//! Bundled demo scenes.

use std::path::Path;

use anyhow::{Context, Result};
use lux_core::{load_off, Mesh, Texture};
use lux_math::{Camera, Color, Vec3};
use lux_renderer::{
    Light, Material, MaterialId, Phong, Quad, Scene, SceneError, Sphere, TriangleMesh,
};

use crate::config::{MeshMaterial, SceneChoice};

/// Build the chosen scene and the camera that frames it.
pub fn build(choice: &SceneChoice, aspect: f32) -> Result<(Scene, Camera)> {
    match choice {
        SceneChoice::CornellBox => cornell_box(aspect),
        SceneChoice::SingleSphere { floor_texture } => {
            single_sphere(floor_texture.as_deref(), aspect)
        }
        SceneChoice::Mesh { path, material } => mesh_scene(path, *material, aspect),
    }
}

/// A 4 x 4 wall in the z = -2 plane facing +Z. Rotating it about the origin
/// gives any other wall of the box.
fn wall(material: MaterialId) -> Quad {
    let mut quad = Quad::new(Vec3::new(-1.0, -1.0, 0.0), Vec3::X, Vec3::Y, 2.0, 2.0, material);
    quad.translate(Vec3::new(0.0, 0.0, -2.0));
    quad.scale(Vec3::new(2.0, 2.0, 1.0));
    quad
}

/// Closed box with coloured walls, a mirror sphere, a glass sphere and one
/// soft light under the ceiling. The camera sits inside, against the front
/// wall.
pub fn cornell_box(aspect: f32) -> Result<(Scene, Camera)> {
    let mut scene = Scene::new();

    let white = scene.add_material(Material::phong(
        Color::ZERO,
        Color::ONE,
        Color::splat(0.2),
        0.5,
    ));
    let red = scene.add_material(Material::phong(
        Color::ZERO,
        Color::new(1.0, 0.3, 0.3),
        Color::splat(0.2),
        0.2,
    ));
    let green = scene.add_material(Material::phong(
        Color::ZERO,
        Color::new(0.3, 1.0, 0.3),
        Color::splat(0.2),
        0.2,
    ));
    let purple = scene.add_material(Material::phong(
        Color::ZERO,
        Color::new(1.0, 0.3, 0.8),
        Color::splat(0.2),
        0.1,
    ));
    let mirror = scene.add_material(Material::Mirror);
    let glass = scene.add_material(Material::glass(1.5));

    // (material, rotation about x, rotation about y) in degrees
    let walls = [
        (white, 0.0, 0.0),    // back
        (red, 0.0, 90.0),     // left
        (green, 0.0, -90.0),  // right
        (white, -90.0, 0.0),  // floor
        (purple, 90.0, 0.0),  // ceiling
        (white, 0.0, 180.0),  // front
    ];
    for (material, rx, ry) in walls {
        let mut quad = wall(material);
        quad.rotate_x(rx);
        quad.rotate_y(ry);
        scene.add_quad(quad)?;
    }

    scene.add_sphere(Sphere::new(Vec3::new(-0.9, -1.3, -0.8), 0.7, mirror))?;
    scene.add_sphere(Sphere::new(Vec3::new(0.9, -1.4, 0.3), 0.6, glass))?;
    scene.add_light(Light::white(Vec3::new(0.0, 1.0, 0.0), 0.5, 5.0));

    let camera = Camera::new(Vec3::new(0.0, 0.0, 1.9), Vec3::new(0.0, -0.2, -2.0), aspect)
        .with_fov_degrees(70.0);
    Ok((scene, camera))
}

/// A matte sphere resting above a floor under an open sky. The floor shows
/// `floor_texture` when given, a checker otherwise.
pub fn single_sphere(floor_texture: Option<&Path>, aspect: f32) -> Result<(Scene, Camera)> {
    let mut scene = Scene::new();

    let red = scene.add_material(Material::Phong(
        Phong::new(
            Color::splat(0.02),
            Color::new(1.0, 0.3, 0.3),
            Color::splat(0.4),
            32.0,
        )
        .with_reflectivity(0.2),
    ));
    let texture = match floor_texture {
        Some(path) => Texture::load(path)
            .map_err(SceneError::from)
            .with_context(|| format!("Failed to load floor texture {}", path.display()))?,
        None => Texture::checker(8, Color::splat(0.9), Color::splat(0.2)),
    };
    let floor = scene.add_material(Material::textured(Phong::matte(Color::ONE), texture));

    scene.add_sphere(Sphere::new(Vec3::ZERO, 1.0, red))?;

    let mut ground = Quad::new(Vec3::new(-1.0, -1.0, 0.0), Vec3::X, Vec3::Y, 2.0, 2.0, floor);
    ground.scale(Vec3::new(4.0, 4.0, 1.0));
    ground.rotate_x(-90.0);
    ground.translate(Vec3::new(0.0, -1.0, 0.0));
    scene.add_quad(ground)?;

    scene.add_light(Light::white(Vec3::new(0.0, 3.0, 0.0), 1.0, 20.0));

    let camera = Camera::new(Vec3::new(0.0, 1.5, 5.0), Vec3::ZERO, aspect);
    Ok((scene, camera))
}

/// An OFF mesh normalised to the unit sphere, standing on a floor.
pub fn mesh_scene(path: &Path, material: MeshMaterial, aspect: f32) -> Result<(Scene, Camera)> {
    let mut geometry =
        load_off(path).with_context(|| format!("Failed to load mesh {}", path.display()))?;
    geometry.center_and_scale_to_unit();

    let mut scene = Scene::new();
    let surface = scene.add_material(match material {
        MeshMaterial::Matte => Material::phong(
            Color::ZERO,
            Color::splat(0.8),
            Color::splat(0.2),
            1.0,
        ),
        MeshMaterial::Mirror => Material::Mirror,
        MeshMaterial::Glass => Material::glass(1.5),
    });
    let floor = scene.add_material(Material::Phong(Phong::matte(Color::splat(0.6))));

    // Glass needs its inside faces
    let cull = material != MeshMaterial::Glass;
    scene.add_mesh(TriangleMesh::new(geometry, surface)?.with_backface_culling(cull))?;

    let ground = Mesh::quad(Vec3::new(-3.0, -1.0, 3.0), Vec3::X, -Vec3::Z, 6.0, 6.0);
    scene.add_mesh(TriangleMesh::new(ground, floor)?)?;

    scene.add_light(Light::white(Vec3::new(-3.0, 3.0, 3.0), 2.5, 8.0));

    let camera = Camera::new(Vec3::new(0.0, 0.5, 3.0), Vec3::ZERO, aspect);
    Ok((scene, camera))
}
