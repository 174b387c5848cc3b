//! Backend seam: resource creation and command submission.
//!
//! A backend implements [`GraphicsDevice`] for resource creation and
//! [`SubmissionContext`] for recording state and draws. Every resource is an
//! owned value; dropping it releases the underlying GPU object, so owners
//! control release order through field order.

use std::fmt;

use glam::Mat4;
use lumen_common::{Extent, Image, VertexAttribute, Viewport};

use crate::error::DeviceError;
use crate::shader::{CompiledShader, Pass};

/// Something the device can present to.
pub trait WindowSurface {
    /// Drawable size in physical pixels.
    fn size(&self) -> Extent;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Vertex,
    Index,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    #[default]
    TriangleList,
    TriangleStrip,
    LineList,
}

/// Texture filtering applied by a material's sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SamplerFilter {
    #[default]
    Point,
    Linear,
    Anisotropic,
}

impl SamplerFilter {
    pub const ALL: [SamplerFilter; 3] = [
        SamplerFilter::Point,
        SamplerFilter::Linear,
        SamplerFilter::Anisotropic,
    ];

    /// Next mode in the cycle point -> linear -> anisotropic -> point.
    pub fn next(self) -> Self {
        match self {
            SamplerFilter::Point => SamplerFilter::Linear,
            SamplerFilter::Linear => SamplerFilter::Anisotropic,
            SamplerFilter::Anisotropic => SamplerFilter::Point,
        }
    }
}

impl fmt::Display for SamplerFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SamplerFilter::Point => "point",
            SamplerFilter::Linear => "linear",
            SamplerFilter::Anisotropic => "anisotropic",
        };
        f.write_str(name)
    }
}

/// Vertex layout of a mesh, matched against one technique.
#[derive(Debug, Clone)]
pub struct InputLayoutDesc<'a> {
    pub label: &'a str,
    /// Byte distance between consecutive vertices.
    pub stride: u64,
    pub attributes: &'a [VertexAttribute],
    pub topology: PrimitiveTopology,
    /// Passes of the technique the layout is built for, in order.
    pub passes: &'a [Pass],
}

/// A value written into a shader variable when a pass is applied.
pub enum VariableValue<'a, D: GraphicsDevice> {
    Matrix(Mat4),
    Texture(&'a D::Texture),
    Sampler(&'a D::Sampler),
}

pub struct VariableBinding<'a, D: GraphicsDevice> {
    pub binding: u32,
    pub value: VariableValue<'a, D>,
}

impl<'a, D: GraphicsDevice> VariableBinding<'a, D> {
    pub fn matrix(binding: u32, matrix: Mat4) -> Self {
        Self {
            binding,
            value: VariableValue::Matrix(matrix),
        }
    }

    pub fn texture(binding: u32, texture: &'a D::Texture) -> Self {
        Self {
            binding,
            value: VariableValue::Texture(texture),
        }
    }

    pub fn sampler(binding: u32, sampler: &'a D::Sampler) -> Self {
        Self {
            binding,
            value: VariableValue::Sampler(sampler),
        }
    }
}

/// Creates GPU resources. Owned for the lifetime of the renderer and dropped
/// after every resource it created.
pub trait GraphicsDevice: Sized {
    type Window: WindowSurface;
    type Context: SubmissionContext<Self>;
    type SwapChain;
    type DepthStencilBuffer;
    type DepthStencilView;
    type RenderTargetBuffer;
    type RenderTargetView;
    type Buffer;
    type Texture;
    type Sampler;
    type Program;
    type InputLayout;

    /// Create the device and its immediate submission context.
    fn create_device(window: &Self::Window) -> Result<(Self, Self::Context), DeviceError>;

    fn backend_name(&self) -> &'static str;

    fn create_swap_chain(
        &mut self,
        window: &Self::Window,
        size: Extent,
    ) -> Result<Self::SwapChain, DeviceError>;

    /// 24-bit depth + 8-bit stencil target of the given size.
    fn create_depth_stencil_buffer(
        &mut self,
        size: Extent,
    ) -> Result<Self::DepthStencilBuffer, DeviceError>;

    fn create_depth_stencil_view(
        &mut self,
        buffer: &Self::DepthStencilBuffer,
    ) -> Result<Self::DepthStencilView, DeviceError>;

    /// The swap chain's back buffer.
    fn back_buffer(
        &mut self,
        swap_chain: &Self::SwapChain,
    ) -> Result<Self::RenderTargetBuffer, DeviceError>;

    fn create_render_target_view(
        &mut self,
        buffer: &Self::RenderTargetBuffer,
    ) -> Result<Self::RenderTargetView, DeviceError>;

    /// Immutable buffer initialized from `contents`.
    fn create_buffer(
        &mut self,
        usage: BufferUsage,
        label: &str,
        contents: &[u8],
    ) -> Result<Self::Buffer, DeviceError>;

    /// Immutable, sampleable RGBA8 texture.
    fn create_texture(&mut self, image: &Image, label: &str) -> Result<Self::Texture, DeviceError>;

    fn create_sampler(&mut self, filter: SamplerFilter) -> Result<Self::Sampler, DeviceError>;

    fn create_program(&mut self, shader: &CompiledShader) -> Result<Self::Program, DeviceError>;

    fn create_input_layout(
        &mut self,
        program: &Self::Program,
        desc: &InputLayoutDesc<'_>,
    ) -> Result<Self::InputLayout, DeviceError>;
}

/// Immediate-mode command recording, modelled on a single device context.
pub trait SubmissionContext<D: GraphicsDevice> {
    fn set_render_targets(&mut self, target: &D::RenderTargetView, depth: &D::DepthStencilView);
    fn set_viewport(&mut self, viewport: Viewport);
    fn clear_render_target(&mut self, target: &D::RenderTargetView, color: [f32; 4]);
    fn clear_depth_stencil(&mut self, target: &D::DepthStencilView, depth: f32, stencil: u32);
    fn set_primitive_topology(&mut self, topology: PrimitiveTopology);
    fn set_input_layout(&mut self, layout: &D::InputLayout);
    fn set_vertex_buffer(&mut self, buffer: &D::Buffer, stride: u64);
    fn set_index_buffer(&mut self, buffer: &D::Buffer, format: IndexFormat);

    /// Make pass `pass` of the current input layout's technique active and
    /// upload its variables.
    fn apply_pass(&mut self, program: &D::Program, pass: usize, variables: &[VariableBinding<'_, D>]);

    fn draw_indexed(&mut self, index_count: u32);

    /// Show the frame. Transient surface failures are logged and the frame is
    /// dropped.
    fn present(&mut self, swap_chain: &D::SwapChain);

    /// Finish all outstanding work.
    fn flush(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_cycle_has_period_three() {
        for start in SamplerFilter::ALL {
            assert_ne!(start.next(), start);
            assert_eq!(start.next().next().next(), start);
        }
        assert_eq!(SamplerFilter::Point.next(), SamplerFilter::Linear);
        assert_eq!(SamplerFilter::Linear.next(), SamplerFilter::Anisotropic);
        assert_eq!(SamplerFilter::Anisotropic.next(), SamplerFilter::Point);
    }

    #[test]
    fn filter_display() {
        assert_eq!(SamplerFilter::Anisotropic.to_string(), "anisotropic");
    }
}
