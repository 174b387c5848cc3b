//! Conversions from lumen types to wgpu types.

use lumen_common::VertexFormat;
use lumen_render::shader::VariableKind;
use lumen_render::{BlendMode, CullMode, IndexFormat, PrimitiveTopology, SamplerFilter};

/// Depth-stencil format of the output stage: 24-bit depth, 8-bit stencil.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

/// Colour format used for pipelines built before a surface is configured.
pub const FALLBACK_SURFACE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Bgra8UnormSrgb;

const MAX_ANISOTROPY: u16 = 16;

pub fn convert_vertex_format(format: VertexFormat) -> wgpu::VertexFormat {
    match format {
        VertexFormat::Float32 => wgpu::VertexFormat::Float32,
        VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
        VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
    }
}

pub fn convert_index_format(format: IndexFormat) -> wgpu::IndexFormat {
    match format {
        IndexFormat::Uint16 => wgpu::IndexFormat::Uint16,
        IndexFormat::Uint32 => wgpu::IndexFormat::Uint32,
    }
}

pub fn convert_topology(topology: PrimitiveTopology) -> wgpu::PrimitiveTopology {
    match topology {
        PrimitiveTopology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        PrimitiveTopology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        PrimitiveTopology::LineList => wgpu::PrimitiveTopology::LineList,
    }
}

pub fn convert_blend(blend: BlendMode) -> wgpu::BlendState {
    match blend {
        BlendMode::Opaque => wgpu::BlendState::REPLACE,
        BlendMode::Alpha => wgpu::BlendState::ALPHA_BLENDING,
    }
}

pub fn convert_cull(cull: CullMode) -> Option<wgpu::Face> {
    match cull {
        CullMode::None => None,
        CullMode::Front => Some(wgpu::Face::Front),
        CullMode::Back => Some(wgpu::Face::Back),
    }
}

pub fn convert_clear_color(color: [f32; 4]) -> wgpu::Color {
    wgpu::Color {
        r: color[0] as f64,
        g: color[1] as f64,
        b: color[2] as f64,
        a: color[3] as f64,
    }
}

/// Bind group layout entry type for a reflected variable.
pub fn binding_type(kind: VariableKind) -> wgpu::BindingType {
    match kind {
        VariableKind::Matrix => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(64),
        },
        VariableKind::Texture => wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        VariableKind::Sampler => wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
    }
}

/// Wrapping sampler for a filter mode. Anisotropic filtering requires linear
/// filtering on every axis.
pub fn sampler_descriptor(filter: SamplerFilter) -> wgpu::SamplerDescriptor<'static> {
    let (mode, anisotropy_clamp, label) = match filter {
        SamplerFilter::Point => (wgpu::FilterMode::Nearest, 1, "point sampler"),
        SamplerFilter::Linear => (wgpu::FilterMode::Linear, 1, "linear sampler"),
        SamplerFilter::Anisotropic => (wgpu::FilterMode::Linear, MAX_ANISOTROPY, "anisotropic sampler"),
    };
    wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: mode,
        min_filter: mode,
        mipmap_filter: mode,
        anisotropy_clamp,
        ..Default::default()
    }
}

/// Prefer an sRGB surface format, otherwise the first supported one.
pub fn choose_surface_format(formats: &[wgpu::TextureFormat]) -> Option<wgpu::TextureFormat> {
    formats
        .iter()
        .find(|f| f.is_srgb())
        .or_else(|| formats.first())
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_formats_keep_their_size() {
        for format in [
            VertexFormat::Float32,
            VertexFormat::Float32x2,
            VertexFormat::Float32x3,
            VertexFormat::Float32x4,
        ] {
            assert_eq!(convert_vertex_format(format).size(), format.size());
        }
    }

    #[test]
    fn blend_and_cull() {
        assert_eq!(convert_blend(BlendMode::Opaque), wgpu::BlendState::REPLACE);
        assert_eq!(convert_blend(BlendMode::Alpha), wgpu::BlendState::ALPHA_BLENDING);
        assert_eq!(convert_cull(CullMode::None), None);
        assert_eq!(convert_cull(CullMode::Back), Some(wgpu::Face::Back));
    }

    #[test]
    fn samplers_per_filter() {
        let point = sampler_descriptor(SamplerFilter::Point);
        assert_eq!(point.mag_filter, wgpu::FilterMode::Nearest);
        assert_eq!(point.anisotropy_clamp, 1);

        let aniso = sampler_descriptor(SamplerFilter::Anisotropic);
        assert_eq!(aniso.min_filter, wgpu::FilterMode::Linear);
        assert_eq!(aniso.mipmap_filter, wgpu::FilterMode::Linear);
        assert_eq!(aniso.anisotropy_clamp, MAX_ANISOTROPY);
    }

    #[test]
    fn surface_format_prefers_srgb() {
        let formats = [
            wgpu::TextureFormat::Bgra8Unorm,
            wgpu::TextureFormat::Bgra8UnormSrgb,
        ];
        assert_eq!(
            choose_surface_format(&formats),
            Some(wgpu::TextureFormat::Bgra8UnormSrgb)
        );
        assert_eq!(
            choose_surface_format(&[wgpu::TextureFormat::Rgba8Unorm]),
            Some(wgpu::TextureFormat::Rgba8Unorm)
        );
        assert_eq!(choose_surface_format(&[]), None);
    }

    #[test]
    fn clear_color_widens() {
        let c = convert_clear_color([0.0, 0.0, 0.3, 1.0]);
        assert!((c.b - 0.3).abs() < 1e-6);
        assert_eq!(c.a, 1.0);
    }

    #[test]
    fn matrices_bind_as_uniforms() {
        assert!(matches!(
            binding_type(VariableKind::Matrix),
            wgpu::BindingType::Buffer { ty: wgpu::BufferBindingType::Uniform, .. }
        ));
        assert!(matches!(
            binding_type(VariableKind::Sampler),
            wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
        ));
    }
}
