//! Error types for sdflow-render

use thiserror::Error;

/// Result type alias using the renderer's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from writing rendered images
#[derive(Error, Debug)]
pub enum Error {
    /// The pixel data does not match the stated dimensions
    #[error("Pixel buffer holds {found} bytes, expected {expected} for {width}x{height}")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        found: usize,
    },

    /// Image encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}
