//! Parallel tile renderer.
//!
//! Renders a scene into colour, normal and depth buffers:
//! - The image is split into buckets (see [`crate::bucket`])
//! - Buckets are traced in parallel on a rayon pool, each with its own RNG
//! - Post-processing stages then run over the finished buffers

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use lux_math::{Color, Vec3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bucket::{generate_buckets, render_bucket, Bucket, BucketResult, DEFAULT_BUCKET_SIZE};
use crate::camera::CameraRays;
use crate::postprocess::{apply_stage, PostProcess, StageInput};
use crate::ppm::{save_ppm, PpmError};
use crate::scene::{Scene, TraceSettings, DEFAULT_MAX_BOUNCES, DEFAULT_OCCLUSION_RAYS};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Invalid render configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Failed to export image: {0}")]
    Export(#[from] PpmError),
}

pub type RenderResult<T> = Result<T, RenderError>;

/// Render configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Jittered camera rays per pixel
    pub samples_per_pixel: u32,
    /// Edge length of a render tile
    pub tile_size: u32,
    /// Surfaces a path may hit before it is cut off
    pub max_bounces: u32,
    /// Shadow rays per light at each lit shading point
    pub occlusion_rays: u32,
    /// Base seed for the per-tile generators. `None` seeds from OS entropy.
    pub seed: Option<u64>,
    /// Worker pool size. `None` uses rayon's global pool.
    pub threads: Option<usize>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 480,
            height: 480,
            samples_per_pixel: 50,
            tile_size: DEFAULT_BUCKET_SIZE,
            max_bounces: DEFAULT_MAX_BOUNCES,
            occlusion_rays: DEFAULT_OCCLUSION_RAYS,
            seed: None,
            threads: None,
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> RenderResult<()> {
        let checks = [
            (self.width, "width"),
            (self.height, "height"),
            (self.samples_per_pixel, "samples_per_pixel"),
            (self.tile_size, "tile_size"),
        ];
        for (value, name) in checks {
            if value == 0 {
                return Err(RenderError::InvalidConfig(format!("{} must be positive", name)));
            }
        }
        if self.threads == Some(0) {
            return Err(RenderError::InvalidConfig("threads must be positive".into()));
        }
        Ok(())
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    pub fn trace_settings(&self) -> TraceSettings {
        TraceSettings {
            max_bounces: self.max_bounces,
            occlusion_rays: self.occlusion_rays,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Summary of a finished render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStats {
    pub elapsed: Duration,
    pub tiles: usize,
    pub primary_rays: u64,
}

/// Owns the output buffers of a render and the post-processing pipeline.
pub struct Renderer {
    config: RenderConfig,
    buckets: Vec<Bucket>,
    pool: Option<rayon::ThreadPool>,
    /// Raw traced colours
    image: Vec<Color>,
    normals: Vec<Vec3>,
    depth: Vec<f32>,
    /// Colours after post-processing
    result: Vec<Color>,
    post_process: Vec<Box<dyn PostProcess>>,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> RenderResult<Self> {
        config.validate()?;

        let pool = match config.threads {
            Some(threads) => Some(rayon::ThreadPoolBuilder::new().num_threads(threads).build()?),
            None => None,
        };

        let count = config.pixel_count();
        Ok(Self {
            buckets: generate_buckets(config.width, config.height, config.tile_size),
            pool,
            image: vec![Color::ZERO; count],
            normals: vec![Vec3::ZERO; count],
            depth: vec![-1.0; count],
            result: vec![Color::ZERO; count],
            post_process: Vec::new(),
            config,
        })
    }

    /// Append a stage to the post-processing pipeline.
    pub fn add_post_process(&mut self, stage: Box<dyn PostProcess>) {
        self.post_process.push(stage);
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn width(&self) -> u32 {
        self.config.width
    }

    pub fn height(&self) -> u32 {
        self.config.height
    }

    pub fn image(&self) -> &[Color] {
        &self.image
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn depth(&self) -> &[f32] {
        &self.depth
    }

    pub fn result(&self) -> &[Color] {
        &self.result
    }

    fn install<T: Send>(&self, op: impl FnOnce() -> T + Send) -> T {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    /// Render the scene, then run the post-processing pipeline.
    ///
    /// `progress` is called with `(tiles_done, tiles_total)` from worker
    /// threads as tiles finish. Blocks until every tile is done.
    pub fn render<F>(&mut self, scene: &Scene, camera: &CameraRays, progress: F) -> RenderStats
    where
        F: Fn(usize, usize) + Sync,
    {
        let start = Instant::now();
        let total = self.buckets.len();
        let settings = self.config.trace_settings();
        let size = (self.config.width, self.config.height);
        let samples = self.config.samples_per_pixel;
        let seed = self.config.seed;

        log::info!(
            "Rendering {}x{} ({} samples) in {} tiles, {} triangles",
            size.0,
            size.1,
            samples,
            total,
            scene.triangle_count()
        );

        let done = AtomicUsize::new(0);
        let buckets = &self.buckets;
        let tiles: Vec<BucketResult> = self.install(|| {
            buckets
                .par_iter()
                .map(|bucket| {
                    let mut rng = match seed {
                        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(bucket.index as u64)),
                        None => StdRng::from_entropy(),
                    };
                    let tile = render_bucket(bucket, size, scene, camera, &settings, samples, &mut rng);

                    let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                    log::debug!("Tiles done: {} / {}", finished, total);
                    progress(finished, total);
                    tile
                })
                .collect()
        });

        for tile in tiles {
            let indices = tile.bucket.pixel_indices(self.config.width);
            for (i, index) in indices.enumerate() {
                self.image[index] = tile.colors[i];
                self.normals[index] = tile.normals[i];
                self.depth[index] = tile.depths[i];
            }
        }

        self.post_process();

        let stats = RenderStats {
            elapsed: start.elapsed(),
            tiles: total,
            primary_rays: self.config.pixel_count() as u64 * u64::from(samples),
        };
        log::info!(
            "Rendered {} primary rays in {:.2?}",
            stats.primary_rays,
            stats.elapsed
        );
        stats
    }

    /// Rebuild the result buffer from the raw image through every stage.
    pub fn post_process(&mut self) {
        self.result.clone_from(&self.image);
        if self.post_process.is_empty() {
            return;
        }

        let start = Instant::now();
        for stage in &self.post_process {
            let input = StageInput::new(
                self.config.width,
                self.config.height,
                &self.result,
                &self.image,
                &self.normals,
                &self.depth,
            );
            let buckets = &self.buckets;
            let workspace = self.install(|| apply_stage(stage.as_ref(), &input, buckets));
            self.result = workspace;
            log::debug!("Applied {}", stage.name());
        }
        log::info!(
            "Applied {} post-processing stages in {:.2?}",
            self.post_process.len(),
            start.elapsed()
        );
    }

    /// Write the post-processed image as a PPM file.
    pub fn save_ppm(&self, path: impl AsRef<Path>) -> RenderResult<()> {
        save_ppm(path, self.config.width, self.config.height, &self.result)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{Material, Phong};
    use crate::postprocess::{Brightness, NormalView};
    use crate::sphere::Sphere;
    use crate::Light;
    use lux_math::Camera;

    fn small_config() -> RenderConfig {
        RenderConfig {
            width: 16,
            height: 12,
            samples_per_pixel: 2,
            tile_size: 5,
            max_bounces: 3,
            occlusion_rays: 2,
            seed: Some(7),
            threads: Some(2),
        }
    }

    fn sphere_scene() -> Scene {
        let mut scene = Scene::new();
        let matte = scene.add_material(Material::Phong(Phong::matte(Color::new(0.8, 0.3, 0.3))));
        scene.add_sphere(Sphere::new(Vec3::ZERO, 1.0, matte)).unwrap();
        scene.add_light(Light::white(Vec3::new(2.0, 3.0, 4.0), 0.2, 10.0));
        scene
    }

    fn camera_for(config: &RenderConfig) -> CameraRays {
        let camera = Camera::new(Vec3::new(0.0, 0.0, 4.0), Vec3::ZERO, config.aspect_ratio());
        CameraRays::from_camera(&camera)
    }

    #[test]
    fn test_validate() {
        assert!(RenderConfig::default().validate().is_ok());

        let zero_width = RenderConfig {
            width: 0,
            ..RenderConfig::default()
        };
        assert!(matches!(zero_width.validate(), Err(RenderError::InvalidConfig(_))));

        let zero_tiles = RenderConfig {
            tile_size: 0,
            ..RenderConfig::default()
        };
        assert!(Renderer::new(zero_tiles).is_err());

        let zero_threads = RenderConfig {
            threads: Some(0),
            ..RenderConfig::default()
        };
        assert!(zero_threads.validate().is_err());
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: RenderConfig = serde_json::from_str(r#"{"width": 64, "seed": 3}"#).unwrap();
        assert_eq!(config.width, 64);
        assert_eq!(config.height, 480);
        assert_eq!(config.seed, Some(3));
        assert_eq!(config.tile_size, DEFAULT_BUCKET_SIZE);
    }

    #[test]
    fn test_render_fills_buffers() {
        let config = small_config();
        let camera = camera_for(&config);
        let mut renderer = Renderer::new(config).unwrap();

        let calls = AtomicUsize::new(0);
        let stats = renderer.render(&sphere_scene(), &camera, |done, total| {
            assert!(done <= total);
            calls.fetch_add(1, Ordering::Relaxed);
        });

        assert_eq!(stats.tiles, renderer.buckets().len());
        assert_eq!(calls.load(Ordering::Relaxed), stats.tiles);
        assert_eq!(stats.primary_rays, 16 * 12 * 2);

        // Center pixel sees the sphere, the corner sees the sky
        let center = (6 * 16 + 8) as usize;
        assert!(renderer.depth()[center] > 2.9 && renderer.depth()[center] < 3.1);
        assert!(renderer.normals()[center].z > 0.9);
        assert_eq!(renderer.depth()[0], -1.0);

        // No stages: result mirrors the raw image
        assert_eq!(renderer.result(), renderer.image());
    }

    #[test]
    fn test_fixed_seed_is_reproducible() {
        let config = small_config();
        let camera = camera_for(&config);
        let scene = sphere_scene();

        let mut first = Renderer::new(config.clone()).unwrap();
        first.render(&scene, &camera, |_, _| {});
        let mut second = Renderer::new(config).unwrap();
        second.render(&scene, &camera, |_, _| {});

        assert_eq!(first.image(), second.image());
        assert_eq!(first.normals(), second.normals());
        assert_eq!(first.depth(), second.depth());
    }

    #[test]
    fn test_post_process_pipeline_runs_in_order() {
        let config = small_config();
        let camera = camera_for(&config);
        let mut renderer = Renderer::new(config).unwrap();
        renderer.add_post_process(Box::new(NormalView));
        renderer.add_post_process(Box::new(Brightness { factor: 0.5 }));
        renderer.render(&sphere_scene(), &camera, |_, _| {});

        for (color, normal) in renderer.result().iter().zip(renderer.normals()) {
            let expected = (*normal + Vec3::ONE) * 0.25;
            assert!((*color - expected).length() < 1e-6);
        }
    }

    #[test]
    fn test_save_ppm() {
        let config = RenderConfig {
            width: 4,
            height: 3,
            ..small_config()
        };
        let camera = camera_for(&config);
        let mut renderer = Renderer::new(config).unwrap();
        renderer.render(&Scene::new(), &camera, |_, _| {});

        let path = std::env::temp_dir().join(format!("lux_render_test_{}.ppm", std::process::id()));
        renderer.save_ppm(&path).unwrap();
        let image = crate::ppm::load_ppm(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!((image.width, image.height), (4, 3));
        assert_eq!(image.pixels.len(), 12);
    }

    #[test]
    fn test_save_ppm_io_failure_is_export_error() {
        let renderer = Renderer::new(small_config()).unwrap();
        let err = renderer
            .save_ppm("/definitely/not/a/dir/out.ppm")
            .unwrap_err();
        assert!(matches!(err, RenderError::Export(PpmError::Io(_))));
    }
}
