//! `lux [description.json]`
//!
//! Renders one of the bundled scenes to a PPM file. Without an argument the
//! default description (Cornell box, 480x480, `render.ppm`) is used.

mod config;
mod scenes;

use anyhow::{Context, Result};
use lux_renderer::{CameraRays, Renderer};

use crate::config::LuxConfig;

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => LuxConfig::load(&path)?,
        None => {
            log::info!("No render description given, using defaults");
            LuxConfig::default()
        }
    };

    let mut renderer = Renderer::new(config.render.clone()).context("Failed to set up renderer")?;
    for stage in &config.post_process {
        renderer.add_post_process(stage.build().context("Invalid post-processing stage")?);
    }

    let (mut scene, camera) = scenes::build(&config.scene, config.render.aspect_ratio())
        .context("Failed to build scene")?;
    if config.use_kd_tree && !scene.meshes().is_empty() {
        scene.build_kd_tree();
    }
    let camera = config.camera.apply(camera);

    let report_every = (renderer.buckets().len() / 10).max(1);
    let stats = renderer.render(&scene, &CameraRays::from_camera(&camera), |done, total| {
        if done % report_every == 0 || done == total {
            log::info!("Tiles done: {} / {}", done, total);
        }
    });
    log::info!(
        "Finished {} tiles in {:.2?}",
        stats.tiles,
        stats.elapsed
    );

    if let Some(parent) = config.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    renderer
        .save_ppm(&config.output)
        .with_context(|| format!("Failed to write {}", config.output.display()))?;

    Ok(())
}
