//! Shared types for the lumen renderer.
//!
//! Everything in here is plain data: no GPU handles, no I/O. Both the core
//! renderer and the asset loaders depend on these definitions.

mod types;
pub mod vertex;

pub use types::{Extent, Image, ImageError, Viewport};
pub use vertex::{
    VertexAttribute, VertexFormat, VertexPosCol, VertexPosTex, VertexPosTexNormTan, VertexRecord,
};
