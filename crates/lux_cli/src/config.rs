//! JSON render description.
//!
//! Every field has a default, so `{}` renders the Cornell box to
//! `render.ppm`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lux_math::{Camera, Vec3};
use lux_renderer::{PostProcessStage, RenderConfig};
use serde::{Deserialize, Serialize};

/// Material applied to a loaded mesh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshMaterial {
    #[default]
    Matte,
    Mirror,
    Glass,
}

/// Which bundled scene to build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SceneChoice {
    #[default]
    CornellBox,
    SingleSphere {
        /// Image for the floor instead of the built-in checker
        #[serde(default)]
        floor_texture: Option<PathBuf>,
    },
    Mesh {
        path: PathBuf,
        #[serde(default)]
        material: MeshMaterial,
    },
}

/// Camera overrides. Unset fields keep the scene's own camera.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CameraConfig {
    pub position: Option<Vec3>,
    pub target: Option<Vec3>,
    pub fov_degrees: Option<f32>,
    pub near: Option<f32>,
    pub far: Option<f32>,
}

impl CameraConfig {
    /// Apply the overrides to `camera`, which is re-aimed if the position
    /// or target changed.
    pub fn apply(&self, camera: Camera) -> Camera {
        let position = self.position.unwrap_or(camera.position);
        let target = self.target.unwrap_or(camera.target);

        let mut result = Camera::new(position, target, camera.aspect)
            .with_clip_planes(self.near.unwrap_or(camera.near), self.far.unwrap_or(camera.far));
        result.up = camera.up;
        result.fov_y = self.fov_degrees.map_or(camera.fov_y, f32::to_radians);
        result
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LuxConfig {
    pub render: RenderConfig,
    pub camera: CameraConfig,
    pub scene: SceneChoice,
    /// Build a kd-tree over the scene's meshes before rendering
    pub use_kd_tree: bool,
    /// Applied in order after the render
    pub post_process: Vec<PostProcessStage>,
    pub output: PathBuf,
}

impl Default for LuxConfig {
    fn default() -> Self {
        Self {
            render: RenderConfig::default(),
            camera: CameraConfig::default(),
            scene: SceneChoice::default(),
            use_kd_tree: true,
            post_process: Vec::new(),
            output: PathBuf::from("render.ppm"),
        }
    }
}

impl LuxConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Invalid render description")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_is_default() {
        let config = LuxConfig::from_json("{}").unwrap();
        assert_eq!(config, LuxConfig::default());
        assert!(config.use_kd_tree);
        assert_eq!(config.scene, SceneChoice::CornellBox);
    }

    #[test]
    fn test_full_description() {
        let config = LuxConfig::from_json(
            r#"{
                "render": {"width": 320, "height": 200, "samples_per_pixel": 8, "seed": 5},
                "camera": {"position": [0.0, 1.0, 6.0], "fov_degrees": 60.0},
                "scene": {"kind": "mesh", "path": "models/bunny.off", "material": "glass"},
                "use_kd_tree": false,
                "post_process": [{"stage": "contrast", "amount": 1.2}],
                "output": "out/bunny.ppm"
            }"#,
        )
        .unwrap();

        assert_eq!(config.render.width, 320);
        assert_eq!(config.render.tile_size, 30);
        assert_eq!(config.camera.position, Some(Vec3::new(0.0, 1.0, 6.0)));
        assert_eq!(
            config.scene,
            SceneChoice::Mesh {
                path: PathBuf::from("models/bunny.off"),
                material: MeshMaterial::Glass,
            }
        );
        assert!(!config.use_kd_tree);
        assert_eq!(config.post_process, vec![PostProcessStage::Contrast { amount: 1.2 }]);
        assert_eq!(config.output, PathBuf::from("out/bunny.ppm"));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(LuxConfig::from_json(r#"{"outptu": "x.ppm"}"#).is_err());
        assert!(LuxConfig::from_json(r#"{"scene": {"kind": "teapot"}}"#).is_err());
    }

    #[test]
    fn test_single_sphere_texture_is_optional() {
        let plain = LuxConfig::from_json(r#"{"scene": {"kind": "single_sphere"}}"#).unwrap();
        assert_eq!(plain.scene, SceneChoice::SingleSphere { floor_texture: None });

        let textured = LuxConfig::from_json(
            r#"{"scene": {"kind": "single_sphere", "floor_texture": "img/uv.ppm"}}"#,
        )
        .unwrap();
        assert_eq!(
            textured.scene,
            SceneChoice::SingleSphere {
                floor_texture: Some(PathBuf::from("img/uv.ppm")),
            }
        );
    }

    #[test]
    fn test_camera_overrides() {
        let base = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 2.0);
        let overrides = CameraConfig {
            target: Some(Vec3::Y),
            fov_degrees: Some(90.0),
            ..Default::default()
        };
        let camera = overrides.apply(base);

        assert_eq!(camera.position, base.position);
        assert_eq!(camera.target, Vec3::Y);
        assert_eq!(camera.aspect, 2.0);
        assert!((camera.fov_y - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert_eq!(camera.near, base.near);
    }
}
