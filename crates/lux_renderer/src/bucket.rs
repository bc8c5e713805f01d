//! Bucket-based tile rendering.
//!
//! Divides the image into tiles (buckets) that can be rendered
//! independently and in parallel using rayon.

use crate::camera::CameraRays;
use crate::scene::{Scene, TraceSettings};
use lux_math::{Color, Vec3};
use rand::Rng;

/// A rectangular region of the image to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    /// X coordinate of bucket's top-left corner
    pub x: u32,
    /// Y coordinate of bucket's top-left corner
    pub y: u32,
    /// Width of the bucket in pixels
    pub width: u32,
    /// Height of the bucket in pixels
    pub height: u32,
    /// Index of this bucket in the render order
    pub index: usize,
}

impl Bucket {
    /// Create a new bucket.
    pub fn new(x: u32, y: u32, width: u32, height: u32, index: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
            index,
        }
    }

    /// Get the total number of pixels in this bucket.
    pub fn pixel_count(&self) -> u32 {
        self.width * self.height
    }

    /// Flat image indices of the bucket's pixels, row by row.
    pub fn pixel_indices(&self, image_width: u32) -> impl Iterator<Item = usize> + '_ {
        (self.y..self.y + self.height).flat_map(move |y| {
            (self.x..self.x + self.width).map(move |x| (y * image_width + x) as usize)
        })
    }
}

/// Default bucket size in pixels.
pub const DEFAULT_BUCKET_SIZE: u32 = 30;

/// Generate buckets for an image, sorted in spiral order from center.
///
/// Full-size buckets cover the image in a grid; the last column and row are
/// narrower when the image size is not a multiple of `bucket_size`. The
/// order is fixed for given dimensions, so a bucket's index can seed its
/// random generator reproducibly.
pub fn generate_buckets(width: u32, height: u32, bucket_size: u32) -> Vec<Bucket> {
    let mut buckets = Vec::new();
    if bucket_size == 0 {
        return buckets;
    }

    // Generate grid of buckets
    let mut y = 0;
    while y < height {
        let mut x = 0;
        while x < width {
            let bw = bucket_size.min(width - x);
            let bh = bucket_size.min(height - y);
            buckets.push(Bucket::new(x, y, bw, bh, buckets.len()));
            x += bucket_size;
        }
        y += bucket_size;
    }

    // Sort by distance from center (spiral order)
    sort_spiral(&mut buckets, width, height);

    // Update indices after sorting
    for (i, bucket) in buckets.iter_mut().enumerate() {
        bucket.index = i;
    }

    buckets
}

/// Sort buckets by distance from image center (spiral order).
///
/// Ties keep grid order, the sort is stable.
fn sort_spiral(buckets: &mut [Bucket], width: u32, height: u32) {
    let center_x = width as f32 / 2.0;
    let center_y = height as f32 / 2.0;

    buckets.sort_by(|a, b| {
        let a_center_x = a.x as f32 + a.width as f32 / 2.0;
        let a_center_y = a.y as f32 + a.height as f32 / 2.0;
        let b_center_x = b.x as f32 + b.width as f32 / 2.0;
        let b_center_y = b.y as f32 + b.height as f32 / 2.0;

        let a_dist = (a_center_x - center_x).powi(2) + (a_center_y - center_y).powi(2);
        let b_dist = (b_center_x - center_x).powi(2) + (b_center_y - center_y).powi(2);

        a_dist.total_cmp(&b_dist)
    });
}

/// Result of rendering a bucket. Buffers are row-major within the bucket.
#[derive(Debug, Clone)]
pub struct BucketResult {
    /// The bucket that was rendered
    pub bucket: Bucket,
    /// Sample-averaged colors
    pub colors: Vec<Color>,
    /// Sample-averaged first-surface normals
    pub normals: Vec<Vec3>,
    /// Nearest first-surface depth, `-1` where every sample saw the sky
    pub depths: Vec<f32>,
}

/// Render every pixel of a bucket with `samples` jittered rays each.
pub fn render_bucket<R: Rng + ?Sized>(
    bucket: &Bucket,
    image_size: (u32, u32),
    scene: &Scene,
    camera: &CameraRays,
    settings: &TraceSettings,
    samples: u32,
    rng: &mut R,
) -> BucketResult {
    let (image_width, image_height) = image_size;
    let count = bucket.pixel_count() as usize;
    let mut colors = Vec::with_capacity(count);
    let mut normals = Vec::with_capacity(count);
    let mut depths = Vec::with_capacity(count);

    let samples = samples.max(1);
    let scale = 1.0 / samples as f32;

    for y in bucket.y..bucket.y + bucket.height {
        for x in bucket.x..bucket.x + bucket.width {
            let mut color = Color::ZERO;
            let mut normal = Vec3::ZERO;
            let mut depth = f32::INFINITY;

            for _ in 0..samples {
                // Uniform jitter inside the pixel footprint
                let u = (x as f32 + rng.gen::<f32>()) / image_width as f32;
                let v = (y as f32 + rng.gen::<f32>()) / image_height as f32;
                let result = scene.trace(&camera.ray(u, v), settings, rng);

                color += result.color;
                normal += result.normal;
                if result.depth >= 0.0 {
                    depth = depth.min(result.depth);
                }
            }

            colors.push(color * scale);
            normals.push(normal * scale);
            depths.push(if depth.is_finite() { depth } else { -1.0 });
        }
    }

    BucketResult {
        bucket: *bucket,
        colors,
        normals,
        depths,
    }
}
