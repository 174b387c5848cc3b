//! Asset loaders: Wavefront OBJ geometry, decoded images, procedural shapes.
//!
//! Loaders only produce CPU-side data (`lumen_common` vertex records and
//! [`Image`]s). Uploading to the GPU is the renderer's job.

mod obj;
mod picture;
mod primitives;

use std::path::PathBuf;

pub use lumen_common::Image;
pub use obj::{load_obj, parse_obj};
pub use picture::{decode_image, load_image};
pub use primitives::{cube, quad};

/// Errors from asset operations.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("OBJ parse error at line {line}: {message}")]
    Obj { line: usize, message: String },
    #[error("OBJ data contains no faces")]
    EmptyGeometry,
    #[error("image decode error")]
    Decode(#[from] image::ImageError),
    #[error("invalid image")]
    Image(#[from] lumen_common::ImageError),
}

pub fn crate_info() -> &'static str {
    "lumen-assets v0.1.0"
}
