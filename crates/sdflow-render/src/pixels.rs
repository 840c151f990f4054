//! Rendered images

use crate::error::{Error, Result};
use crate::settings::PixelFormat;
use glam::Vec3;
use sdflow_math::saturate;
use std::path::Path;

/// Bytes per pixel in every supported format
pub const BYTES_PER_PIXEL: usize = 4;

/// An 8-bit, four channel image in row-major order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw pixel data in `format` byte order
    pub fn from_raw(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if data.len() != expected {
            return Err(Error::BufferSize {
                width,
                height,
                expected,
                found: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Raw bytes in [`PixelBuffer::format`] order
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Pixel at (`x`, `y`) in RGBA order
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let px = self.data.get(start..start + BYTES_PER_PIXEL)?;
        Some(self.format.decode([px[0], px[1], px[2], px[3]]))
    }

    /// Convert to an `image` buffer in RGBA order
    pub fn to_rgba_image(&self) -> Result<image::RgbaImage> {
        let rgba = match self.format {
            PixelFormat::Rgba8 => self.data.clone(),
            PixelFormat::Bgra8 => self
                .data
                .chunks_exact(BYTES_PER_PIXEL)
                .flat_map(|px| self.format.decode([px[0], px[1], px[2], px[3]]))
                .collect(),
        };
        image::RgbaImage::from_raw(self.width, self.height, rgba).ok_or(Error::BufferSize {
            width: self.width,
            height: self.height,
            expected: self.width as usize * self.height as usize * BYTES_PER_PIXEL,
            found: self.data.len(),
        })
    }

    /// Write the image as a PNG file
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        self.to_rgba_image()?
            .save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

/// Quantize a linear color to opaque 8-bit RGBA
///
/// Channels are clamped to `[0, 1]` first; NaN maps to 0.
pub fn to_rgba8(color: Vec3) -> [u8; 4] {
    let q = |c: f32| (saturate(c) * 255.0).round() as u8;
    [q(color.x), q(color.y), q(color.z), 255]
}
