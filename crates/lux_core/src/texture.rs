//! Image textures for surface shading.
//!
//! Textures are decoded once at scene construction and are read-only while
//! rendering, so they can be shared between worker threads behind an `Arc`.

use std::path::Path;

use lux_math::{Color, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while building or loading a texture.
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("texture has zero size ({width}x{height})")]
    ZeroSize { width: u32, height: u32 },

    #[error("texture is {width}x{height} but {actual} pixels were supplied")]
    PixelCountMismatch { width: u32, height: u32, actual: usize },

    #[error("failed to load texture {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

pub type TextureResult<T> = Result<T, TextureError>;

/// How lookups outside the [0, 1] uv square are resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    /// Wrap around, repeating the image
    #[default]
    Tile,
    /// Repeat with every other copy flipped
    Mirror,
    /// Clamp to the border texels
    Extend,
}

impl RepeatMode {
    /// Map an integer texel coordinate into `0..size`.
    pub fn resolve(self, coord: i64, size: u32) -> u32 {
        let size = i64::from(size);
        let resolved = match self {
            RepeatMode::Tile => coord.rem_euclid(size),
            RepeatMode::Extend => coord.clamp(0, size - 1),
            RepeatMode::Mirror => {
                let period = coord.rem_euclid(2 * size);
                if period < size {
                    period
                } else {
                    2 * size - 1 - period
                }
            }
        };
        resolved as u32
    }
}

/// A texture with RGB pixel data in [0, 1].
#[derive(Clone, Debug)]
pub struct Texture {
    width: u32,
    height: u32,
    /// Row-major, top row first
    pixels: Vec<Color>,
    pub repeat_mode: RepeatMode,
}

impl Texture {
    /// Create a new texture from pixel data.
    ///
    /// A zero-sized texture cannot be sampled and is rejected here rather
    /// than while tracing.
    pub fn new(width: u32, height: u32, pixels: Vec<Color>) -> TextureResult<Self> {
        if width == 0 || height == 0 {
            return Err(TextureError::ZeroSize { width, height });
        }
        if pixels.len() != width as usize * height as usize {
            return Err(TextureError::PixelCountMismatch {
                width,
                height,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
            repeat_mode: RepeatMode::default(),
        })
    }

    /// Create a solid color texture (1x1).
    pub fn solid_color(color: Color) -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: vec![color],
            repeat_mode: RepeatMode::default(),
        }
    }

    /// Two-color checkerboard with `cells` squares per side.
    pub fn checker(cells: u32, a: Color, b: Color) -> Self {
        let cells = cells.max(1);
        let pixels = (0..cells * cells)
            .map(|i| if (i % cells + i / cells) % 2 == 0 { a } else { b })
            .collect();
        Self {
            width: cells,
            height: cells,
            pixels,
            repeat_mode: RepeatMode::default(),
        }
    }

    /// Load a texture from an image file.
    pub fn load(path: impl AsRef<Path>) -> TextureResult<Self> {
        let path = path.as_ref();
        let img = image::open(path).map_err(|source| TextureError::Load {
            path: path.display().to_string(),
            source,
        })?;

        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        let pixels = rgb
            .pixels()
            .map(|p| Vec3::new(p[0] as f32, p[1] as f32, p[2] as f32) / 255.0)
            .collect();

        let texture = Self::new(width, height, pixels)?;
        log::debug!("Loaded texture: {} ({}x{})", path.display(), width, height);
        Ok(texture)
    }

    /// Set how out-of-range lookups are resolved.
    pub fn with_repeat_mode(mut self, mode: RepeatMode) -> Self {
        self.repeat_mode = mode;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Sample the texture at uv coordinates with bilinear filtering.
    ///
    /// (0, 0) is the bottom-left corner of the image and (1, 1) the top-right.
    pub fn sample(&self, u: f32, v: f32) -> Color {
        // Texel centers sit at half-integer positions
        let x = u * self.width as f32 - 0.5;
        let y = (1.0 - v) * self.height as f32 - 0.5;

        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let p00 = self.texel(x0, y0);
        let p10 = self.texel(x0 + 1, y0);
        let p01 = self.texel(x0, y0 + 1);
        let p11 = self.texel(x0 + 1, y0 + 1);

        let top = p00.lerp(p10, fx);
        let bottom = p01.lerp(p11, fx);
        top.lerp(bottom, fy)
    }

    /// Texel at integer coordinates, resolved with the repeat mode.
    pub fn texel(&self, x: i64, y: i64) -> Color {
        let x = self.repeat_mode.resolve(x, self.width);
        let y = self.repeat_mode.resolve(y, self.height);
        self.pixels[(y * self.width + x) as usize]
    }
}
