//! Plain-text PPM (`P3`) export and import.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use lux_math::Color;
use thiserror::Error;

/// Maximum channel value written to the header.
pub const MAX_CHANNEL: u32 = 255;

#[derive(Error, Debug)]
pub enum PpmError {
    #[error("Unsupported magic number {0:?}, expected \"P3\"")]
    BadMagic(String),

    #[error("Malformed header: {0}")]
    BadHeader(String),

    #[error("Expected {expected} channel values, found {found}")]
    Truncated { expected: usize, found: usize },

    #[error("Invalid channel value {0:?}")]
    BadValue(String),

    #[error("Pixel count {actual} does not match {width}x{height}")]
    SizeMismatch {
        width: u32,
        height: u32,
        actual: usize,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type PpmResult<T> = Result<T, PpmError>;

/// An 8-bit RGB image as stored in a PPM file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PpmImage {
    pub width: u32,
    pub height: u32,
    /// Row-major, top row first
    pub pixels: Vec<[u8; 3]>,
}

/// Clamp a value to [0, 1] range.
#[inline]
pub fn clamp_01(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

/// Convert a linear colour to 8-bit RGB, clamping each channel.
pub fn color_to_rgb8(color: Color) -> [u8; 3] {
    let r = (255.0 * clamp_01(color.x)) as u8;
    let g = (255.0 * clamp_01(color.y)) as u8;
    let b = (255.0 * clamp_01(color.z)) as u8;
    [r, g, b]
}

/// Write colours as a `P3` image.
pub fn write_ppm<W: Write>(writer: W, width: u32, height: u32, pixels: &[Color]) -> PpmResult<()> {
    if pixels.len() != (width as usize) * (height as usize) {
        return Err(PpmError::SizeMismatch {
            width,
            height,
            actual: pixels.len(),
        });
    }

    let mut out = BufWriter::new(writer);
    writeln!(out, "P3")?;
    writeln!(out, "{} {}", width, height)?;
    writeln!(out, "{}", MAX_CHANNEL)?;

    // One row of the image per line
    for row in pixels.chunks(width.max(1) as usize) {
        let line: Vec<String> = row
            .iter()
            .map(|c| {
                let [r, g, b] = color_to_rgb8(*c);
                format!("{} {} {}", r, g, b)
            })
            .collect();
        writeln!(out, "{}", line.join(" "))?;
    }
    out.flush()?;
    Ok(())
}

/// Write colours to a `P3` file, creating or truncating it.
pub fn save_ppm(path: impl AsRef<Path>, width: u32, height: u32, pixels: &[Color]) -> PpmResult<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    write_ppm(file, width, height, pixels)?;
    log::info!("Wrote {}x{} image to {}", width, height, path.display());
    Ok(())
}

/// Parse a `P3` image. `#` comments are allowed anywhere a token is.
///
/// Channel values above the header's maximum are rejected; images with a
/// maximum other than 255 are rescaled to 8 bits.
pub fn read_ppm<R: BufRead>(mut reader: R) -> PpmResult<PpmImage> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;

    let mut tokens = text
        .lines()
        .map(|line| line.split('#').next().unwrap_or(""))
        .flat_map(str::split_whitespace);

    let magic = tokens.next().unwrap_or_default();
    if magic != "P3" {
        return Err(PpmError::BadMagic(magic.to_string()));
    }

    let mut header_value = |name: &str| -> PpmResult<u32> {
        let token = tokens
            .next()
            .ok_or_else(|| PpmError::BadHeader(format!("missing {}", name)))?;
        token
            .parse()
            .map_err(|_| PpmError::BadHeader(format!("invalid {} {:?}", name, token)))
    };
    let width = header_value("width")?;
    let height = header_value("height")?;
    let max = header_value("maximum value")?;
    if max == 0 || max > u32::from(u16::MAX) {
        return Err(PpmError::BadHeader(format!("maximum value {} out of range", max)));
    }

    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(3))
        .ok_or_else(|| PpmError::BadHeader(format!("image size {}x{} too large", width, height)))?;
    // Grows with the data actually present, not the header's claim
    let mut channels = Vec::new();
    for token in tokens.by_ref().take(expected) {
        let value: u32 = token
            .parse()
            .map_err(|_| PpmError::BadValue(token.to_string()))?;
        if value > max {
            return Err(PpmError::BadValue(token.to_string()));
        }
        channels.push(if max == MAX_CHANNEL {
            value as u8
        } else {
            (value * MAX_CHANNEL / max) as u8
        });
    }
    if channels.len() < expected {
        return Err(PpmError::Truncated {
            expected,
            found: channels.len(),
        });
    }

    let pixels = channels.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect();
    Ok(PpmImage {
        width,
        height,
        pixels,
    })
}

/// Read a `P3` file from disk.
pub fn load_ppm(path: impl AsRef<Path>) -> PpmResult<PpmImage> {
    let file = File::open(path)?;
    read_ppm(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_to_rgb8_clamps() {
        assert_eq!(color_to_rgb8(Color::new(0.0, 0.5, 1.0)), [0, 127, 255]);
        assert_eq!(color_to_rgb8(Color::new(-1.0, 2.0, f32::NAN)), [0, 255, 0]);
    }

    #[test]
    fn test_write_layout() {
        let pixels = [Color::ONE, Color::ZERO, Color::new(1.0, 0.0, 0.0), Color::new(0.0, 0.0, 1.0)];
        let mut out = Vec::new();
        write_ppm(&mut out, 2, 2, &pixels).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "P3\n2 2\n255\n255 255 255 0 0 0\n255 0 0 0 0 255\n");
    }

    #[test]
    fn test_write_rejects_wrong_size() {
        let mut out = Vec::new();
        let err = write_ppm(&mut out, 3, 1, &[Color::ONE]).unwrap_err();
        assert!(matches!(err, PpmError::SizeMismatch { actual: 1, .. }));
    }

    #[test]
    fn test_read_with_comments() {
        let text = "P3\n# made by hand\n2 1 # size\n255\n10 20 30  40 50 60\n";
        let image = read_ppm(text.as_bytes()).unwrap();
        assert_eq!(image.width, 2);
        assert_eq!(image.height, 1);
        assert_eq!(image.pixels, vec![[10, 20, 30], [40, 50, 60]]);
    }

    #[test]
    fn test_read_rescales_other_maximum() {
        let image = read_ppm("P3 1 1 15 15 0 5".as_bytes()).unwrap();
        assert_eq!(image.pixels, vec![[255, 0, 85]]);
    }

    #[test]
    fn test_read_errors() {
        assert!(matches!(read_ppm("P6 1 1 255".as_bytes()), Err(PpmError::BadMagic(_))));
        assert!(matches!(read_ppm("P3 1".as_bytes()), Err(PpmError::BadHeader(_))));
        assert!(matches!(
            read_ppm("P3 1 1 255 1 2".as_bytes()),
            Err(PpmError::Truncated { expected: 3, found: 2 })
        ));
        assert!(matches!(read_ppm("P3 1 1 255 1 2 300".as_bytes()), Err(PpmError::BadValue(_))));
        assert!(matches!(read_ppm("P3 1 1 255 1 x 3".as_bytes()), Err(PpmError::BadValue(_))));
    }

    #[test]
    fn test_read_oversized_header() {
        assert!(matches!(
            read_ppm("P3 100000 100000 255 1 2 3".as_bytes()),
            Err(PpmError::Truncated { expected: 30_000_000_000, found: 3 })
        ));
        assert!(matches!(
            read_ppm("P3 4000000000 4000000000 255 1 2 3".as_bytes()),
            Err(PpmError::BadHeader(_))
        ));
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir().join(format!("lux_ppm_test_{}.ppm", std::process::id()));
        let pixels = vec![Color::new(0.25, 0.5, 0.75); 6];
        save_ppm(&path, 3, 2, &pixels).unwrap();

        let image = load_ppm(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(image.pixels, vec![color_to_rgb8(pixels[0]); 6]);
    }
}
