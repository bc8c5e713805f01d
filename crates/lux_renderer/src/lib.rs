//! Lux CPU ray tracer.
//!
//! A Whitted-style ray tracer with soft shadows from volume lights,
//! Phong/mirror/glass/textured materials and a kd-tree over triangle meshes.
//! Images are rendered tile by tile in parallel and can be post-processed
//! and exported as PPM.

mod bucket;
mod camera;
mod hittable;
mod kdtree;
mod light;
mod material;
mod mesh;
mod postprocess;
mod ppm;
mod quad;
mod renderer;
mod scene;
mod sphere;
mod triangle;

pub use bucket::{generate_buckets, render_bucket, Bucket, BucketResult, DEFAULT_BUCKET_SIZE};
pub use camera::CameraRays;
pub use hittable::{closer, HitRecord, Hittable, MIN_T};
pub use kdtree::{KdHit, KdTree, KdTreeStats};
pub use light::Light;
pub use material::{LightContribution, Material, MaterialId, Phong, ShadingContext, OUTSIDE_IOR};
pub use mesh::TriangleMesh;
pub use postprocess::{
    apply_stage, Brightness, Contrast, Convolve, CrossBlur, DepthView, NormalView, PostProcess,
    PostProcessStage, StageInput,
};
pub use ppm::{
    clamp_01, color_to_rgb8, load_ppm, read_ppm, save_ppm, write_ppm, PpmError, PpmImage,
    PpmResult, MAX_CHANNEL,
};
pub use quad::Quad;
pub use renderer::{RenderConfig, RenderError, RenderResult, RenderStats, Renderer};
pub use scene::{
    sky_gradient, ObjectRef, RayResult, Scene, SceneError, SceneHit, SceneResult, TraceSettings,
    DEFAULT_MAX_BOUNCES, DEFAULT_OCCLUSION_RAYS,
};
pub use sphere::Sphere;
pub use triangle::Triangle;

/// Re-export common math types from lux_math
pub use lux_math::{Aabb, Color, Ray, Vec2, Vec3};
