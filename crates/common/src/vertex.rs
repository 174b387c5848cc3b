//! Fixed-layout vertex records.
//!
//! A vertex record describes its own byte layout through [`VertexRecord::ATTRIBUTES`].
//! Each attribute is addressed by the shader location it feeds, so a mesh can match
//! its buffer against a shader's input signature without knowing the shader.

use bytemuck::{Pod, Zeroable};

/// Per-attribute component format. Only 32-bit float vectors are used by the
/// vertex records in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
}

impl VertexFormat {
    /// Size of one attribute of this format in bytes.
    pub fn size(&self) -> u64 {
        match self {
            VertexFormat::Float32 => 4,
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 => 16,
        }
    }
}

/// One field of a vertex record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Shader input location this field feeds.
    pub location: u32,
    pub format: VertexFormat,
    /// Byte offset from the start of the record.
    pub offset: u64,
}

impl VertexAttribute {
    pub const fn new(location: u32, format: VertexFormat, offset: u64) -> Self {
        Self {
            location,
            format,
            offset,
        }
    }
}

/// A plain-old-data vertex type with a known field layout.
pub trait VertexRecord: Pod {
    const ATTRIBUTES: &'static [VertexAttribute];

    /// Distance in bytes between consecutive records.
    fn stride() -> u64 {
        std::mem::size_of::<Self>() as u64
    }

    fn attribute(location: u32) -> Option<VertexAttribute> {
        Self::ATTRIBUTES.iter().copied().find(|a| a.location == location)
    }
}

/// Position + vertex colour.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VertexPosCol {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl VertexRecord for VertexPosCol {
    const ATTRIBUTES: &'static [VertexAttribute] = &[
        VertexAttribute::new(0, VertexFormat::Float32x3, 0),
        VertexAttribute::new(1, VertexFormat::Float32x3, 12),
    ];
}

/// Position + texture coordinate.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VertexPosTex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl VertexRecord for VertexPosTex {
    const ATTRIBUTES: &'static [VertexAttribute] = &[
        VertexAttribute::new(0, VertexFormat::Float32x3, 0),
        VertexAttribute::new(1, VertexFormat::Float32x2, 12),
    ];
}

/// Position, texture coordinate, normal and tangent for normal-mapped shading.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VertexPosTexNormTan {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
}

impl VertexRecord for VertexPosTexNormTan {
    const ATTRIBUTES: &'static [VertexAttribute] = &[
        VertexAttribute::new(0, VertexFormat::Float32x3, 0),
        VertexAttribute::new(1, VertexFormat::Float32x2, 12),
        VertexAttribute::new(2, VertexFormat::Float32x3, 20),
        VertexAttribute::new(3, VertexFormat::Float32x3, 32),
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_packed<V: VertexRecord>() {
        let mut end = 0;
        for attr in V::ATTRIBUTES {
            assert_eq!(attr.offset, end, "attribute {} is not packed", attr.location);
            end = attr.offset + attr.format.size();
        }
        assert_eq!(end, V::stride());
    }

    #[test]
    fn records_are_tightly_packed() {
        assert_packed::<VertexPosCol>();
        assert_packed::<VertexPosTex>();
        assert_packed::<VertexPosTexNormTan>();
    }

    #[test]
    fn attribute_lookup_by_location() {
        let uv = VertexPosTexNormTan::attribute(1).unwrap();
        assert_eq!(uv.format, VertexFormat::Float32x2);
        assert_eq!(uv.offset, 12);
        assert!(VertexPosTex::attribute(2).is_none());
    }
}
