//! Image-space post-processing.
//!
//! Each stage reads the renderer's buffers and produces a new colour
//! buffer. Stages run one after another; the output of one becomes the
//! `image` input of the next while the raw render, normals and depth stay
//! untouched. Within a stage, tiles are shaded in parallel.

use std::fmt;

use lux_core::RepeatMode;
use lux_math::{Color, Vec3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::bucket::Bucket;
use crate::renderer::{RenderError, RenderResult};

/// Read-only view of the buffers a stage may sample.
///
/// Coordinates outside the image are mirrored back inside.
#[derive(Debug, Clone, Copy)]
pub struct StageInput<'a> {
    pub width: u32,
    pub height: u32,
    /// Output of the previous stage, or the raw render for the first one
    pub image: &'a [Color],
    pub raw: &'a [Color],
    pub normals: &'a [Vec3],
    pub depth: &'a [f32],
    /// Largest depth in the depth buffer, `0` when every pixel saw the sky
    pub max_depth: f32,
}

impl<'a> StageInput<'a> {
    pub fn new(
        width: u32,
        height: u32,
        image: &'a [Color],
        raw: &'a [Color],
        normals: &'a [Vec3],
        depth: &'a [f32],
    ) -> Self {
        let max_depth = depth.iter().copied().fold(0.0f32, f32::max);
        Self {
            width,
            height,
            image,
            raw,
            normals,
            depth,
            max_depth,
        }
    }

    #[inline]
    fn index(&self, x: i64, y: i64) -> usize {
        let x = RepeatMode::Mirror.resolve(x, self.width) as usize;
        let y = RepeatMode::Mirror.resolve(y, self.height) as usize;
        y * self.width as usize + x
    }

    pub fn image_at(&self, x: i64, y: i64) -> Color {
        self.image[self.index(x, y)]
    }

    pub fn raw_at(&self, x: i64, y: i64) -> Color {
        self.raw[self.index(x, y)]
    }

    pub fn normal_at(&self, x: i64, y: i64) -> Vec3 {
        self.normals[self.index(x, y)]
    }

    pub fn depth_at(&self, x: i64, y: i64) -> f32 {
        self.depth[self.index(x, y)]
    }
}

/// A per-pixel image effect.
pub trait PostProcess: Send + Sync + fmt::Debug {
    /// Short name used in log output.
    fn name(&self) -> &'static str;

    /// Output colour of pixel `(x, y)`.
    fn fragment(&self, x: u32, y: u32, input: &StageInput) -> Color;
}

/// Run one stage over the whole image, tile by tile.
///
/// `buckets` must partition the image; every pixel of the returned buffer
/// is written by exactly one tile.
pub fn apply_stage(stage: &dyn PostProcess, input: &StageInput, buckets: &[Bucket]) -> Vec<Color> {
    let tiles: Vec<(Bucket, Vec<Color>)> = buckets
        .par_iter()
        .map(|bucket| {
            let mut colors = Vec::with_capacity(bucket.pixel_count() as usize);
            for y in bucket.y..bucket.y + bucket.height {
                for x in bucket.x..bucket.x + bucket.width {
                    colors.push(stage.fragment(x, y, input));
                }
            }
            (*bucket, colors)
        })
        .collect();

    let mut workspace = vec![Color::ZERO; input.image.len()];
    for (bucket, colors) in tiles {
        for (index, color) in bucket.pixel_indices(input.width).zip(colors) {
            workspace[index] = color;
        }
    }
    workspace
}

/// Box blur along the row and column through each pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossBlur {
    pub size: u32,
}

impl PostProcess for CrossBlur {
    fn name(&self) -> &'static str {
        "cross blur"
    }

    fn fragment(&self, x: u32, y: u32, input: &StageInput) -> Color {
        let (x, y) = (i64::from(x), i64::from(y));
        let mut sum = input.image_at(x, y);
        for i in 1..=i64::from(self.size) {
            sum += input.image_at(x + i, y);
            sum += input.image_at(x - i, y);
            sum += input.image_at(x, y + i);
            sum += input.image_at(x, y - i);
        }
        sum / (4 * self.size + 1) as f32
    }
}

/// Arbitrary convolution kernel, row-major, centred on the pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct Convolve {
    kernel: Vec<f32>,
    width: usize,
}

impl Convolve {
    /// The kernel length must be a non-zero multiple of `width`.
    pub fn new(kernel: Vec<f32>, width: usize) -> RenderResult<Self> {
        if width == 0 || kernel.is_empty() || kernel.len() % width != 0 {
            return Err(RenderError::InvalidConfig(format!(
                "convolution kernel of {} values cannot have width {}",
                kernel.len(),
                width
            )));
        }
        Ok(Self { kernel, width })
    }

    /// Normalised `size × size` box filter.
    pub fn box_filter(size: usize) -> RenderResult<Self> {
        let count = size * size;
        Self::new(vec![1.0 / count.max(1) as f32; count], size)
    }

    pub fn kernel_height(&self) -> usize {
        self.kernel.len() / self.width
    }
}

impl PostProcess for Convolve {
    fn name(&self) -> &'static str {
        "convolve"
    }

    fn fragment(&self, x: u32, y: u32, input: &StageInput) -> Color {
        let half_w = (self.width / 2) as i64;
        let half_h = (self.kernel_height() / 2) as i64;

        let mut sum = Color::ZERO;
        for (i, weight) in self.kernel.iter().enumerate() {
            let kx = (i % self.width) as i64 - half_w;
            let ky = (i / self.width) as i64 - half_h;
            sum += input.image_at(i64::from(x) + kx, i64::from(y) + ky) * *weight;
        }
        sum
    }
}

/// Scales each channel's distance from mid-grey after clamping to [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contrast {
    pub amount: f32,
}

impl PostProcess for Contrast {
    fn name(&self) -> &'static str {
        "contrast"
    }

    fn fragment(&self, x: u32, y: u32, input: &StageInput) -> Color {
        let c = input
            .image_at(i64::from(x), i64::from(y))
            .clamp(Color::ZERO, Color::ONE);
        (c - Color::splat(0.5)) * self.amount + Color::splat(0.5)
    }
}

/// Multiplies every channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brightness {
    pub factor: f32,
}

impl PostProcess for Brightness {
    fn name(&self) -> &'static str {
        "brightness"
    }

    fn fragment(&self, x: u32, y: u32, input: &StageInput) -> Color {
        input.image_at(i64::from(x), i64::from(y)) * self.factor
    }
}

/// Grey-scale depth: white near the camera, dark far away, black sky.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DepthView;

impl PostProcess for DepthView {
    fn name(&self) -> &'static str {
        "depth view"
    }

    fn fragment(&self, x: u32, y: u32, input: &StageInput) -> Color {
        let depth = input.depth_at(i64::from(x), i64::from(y));
        if depth < 0.0 || input.max_depth <= 0.0 {
            return Color::ZERO;
        }
        Color::splat(1.0 - depth / input.max_depth)
    }
}

/// Maps unit normals from [-1, 1] to [0, 1] colours.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NormalView;

impl PostProcess for NormalView {
    fn name(&self) -> &'static str {
        "normal view"
    }

    fn fragment(&self, x: u32, y: u32, input: &StageInput) -> Color {
        let n = input.normal_at(i64::from(x), i64::from(y));
        (n + Vec3::ONE) * 0.5
    }
}

/// Serializable description of a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum PostProcessStage {
    CrossBlur { size: u32 },
    Convolve { kernel: Vec<f32>, width: usize },
    Contrast { amount: f32 },
    Brightness { factor: f32 },
    DepthView,
    NormalView,
}

impl PostProcessStage {
    pub fn build(&self) -> RenderResult<Box<dyn PostProcess>> {
        Ok(match self {
            PostProcessStage::CrossBlur { size } => Box::new(CrossBlur { size: *size }),
            PostProcessStage::Convolve { kernel, width } => {
                Box::new(Convolve::new(kernel.clone(), *width)?)
            }
            PostProcessStage::Contrast { amount } => Box::new(Contrast { amount: *amount }),
            PostProcessStage::Brightness { factor } => Box::new(Brightness { factor: *factor }),
            PostProcessStage::DepthView => Box::new(DepthView),
            PostProcessStage::NormalView => Box::new(NormalView),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::generate_buckets;

    struct Buffers {
        width: u32,
        height: u32,
        image: Vec<Color>,
        normals: Vec<Vec3>,
        depth: Vec<f32>,
    }

    impl Buffers {
        fn ramp(width: u32, height: u32) -> Self {
            let count = (width * height) as usize;
            let image = (0..count).map(|i| Color::splat(i as f32)).collect();
            Self {
                width,
                height,
                image,
                normals: vec![Vec3::Z; count],
                depth: (0..count).map(|i| i as f32).collect(),
            }
        }

        fn input(&self) -> StageInput<'_> {
            StageInput::new(
                self.width,
                self.height,
                &self.image,
                &self.image,
                &self.normals,
                &self.depth,
            )
        }
    }

    #[test]
    fn test_mirror_reads_outside_image() {
        let buffers = Buffers::ramp(3, 2);
        let input = buffers.input();

        assert_eq!(input.image_at(-1, 0), input.image_at(0, 0));
        assert_eq!(input.image_at(3, 1), input.image_at(2, 1));
        assert_eq!(input.image_at(1, -2), input.image_at(1, 1));
    }

    #[test]
    fn test_cross_blur_of_constant_is_constant() {
        let mut buffers = Buffers::ramp(8, 8);
        buffers.image = vec![Color::splat(0.3); 64];
        let input = buffers.input();

        let out = apply_stage(&CrossBlur { size: 3 }, &input, &generate_buckets(8, 8, 3));
        assert!(out.iter().all(|c| (*c - Color::splat(0.3)).length() < 1e-6));
    }

    #[test]
    fn test_cross_blur_averages_neighbours() {
        let buffers = Buffers::ramp(3, 3);
        let input = buffers.input();

        // Center of 0..9 ramp: (4 + 5 + 3 + 7 + 1) / 5
        let c = CrossBlur { size: 1 }.fragment(1, 1, &input);
        assert!((c.x - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_convolve_identity_and_validation() {
        let buffers = Buffers::ramp(5, 4);
        let input = buffers.input();

        let identity = Convolve::new(vec![0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0], 3).unwrap();
        let out = apply_stage(&identity, &input, &generate_buckets(5, 4, 2));
        assert_eq!(out, buffers.image);

        assert!(Convolve::new(vec![1.0; 5], 3).is_err());
        assert!(Convolve::new(vec![], 1).is_err());
        assert!(Convolve::new(vec![1.0], 0).is_err());
        assert_eq!(Convolve::box_filter(3).unwrap().kernel_height(), 3);
    }

    #[test]
    fn test_contrast_clamps_first() {
        let mut buffers = Buffers::ramp(1, 1);
        buffers.image = vec![Color::new(2.0, 0.25, -1.0)];
        let input = buffers.input();

        let c = Contrast { amount: 2.0 }.fragment(0, 0, &input);
        assert!((c - Color::new(1.5, 0.0, -0.5)).length() < 1e-6);
    }

    #[test]
    fn test_depth_view() {
        let mut buffers = Buffers::ramp(2, 2);
        buffers.depth = vec![-1.0, 2.0, 4.0, 0.0];
        let input = buffers.input();
        assert_eq!(input.max_depth, 4.0);

        let out = apply_stage(&DepthView, &input, &generate_buckets(2, 2, 1));
        assert_eq!(out, vec![Color::ZERO, Color::splat(0.5), Color::ZERO, Color::ONE]);
    }

    #[test]
    fn test_normal_view() {
        let buffers = Buffers::ramp(1, 1);
        let c = NormalView.fragment(0, 0, &buffers.input());
        assert_eq!(c, Color::new(0.5, 0.5, 1.0));
    }

    #[test]
    fn test_stage_descriptors() {
        let json = r#"[
            {"stage": "cross_blur", "size": 2},
            {"stage": "convolve", "kernel": [0.5, 0.5], "width": 2},
            {"stage": "brightness", "factor": 1.5},
            {"stage": "depth_view"}
        ]"#;
        let stages: Vec<PostProcessStage> = serde_json::from_str(json).unwrap();
        assert_eq!(stages[0], PostProcessStage::CrossBlur { size: 2 });
        assert_eq!(stages[3], PostProcessStage::DepthView);

        let names: Vec<&str> = stages.iter().map(|s| s.build().unwrap().name()).collect();
        assert_eq!(names, vec!["cross blur", "convolve", "brightness", "depth view"]);

        let bad = PostProcessStage::Convolve {
            kernel: vec![1.0; 3],
            width: 2,
        };
        assert!(bad.build().is_err());
    }
}
