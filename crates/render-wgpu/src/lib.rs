//! wgpu backend for the lumen renderer.
//!
//! Implements [`lumen_render::GraphicsDevice`] and
//! [`lumen_render::SubmissionContext`] on wgpu. Resource creation runs inside
//! wgpu error scopes so validation and out-of-memory failures surface as
//! [`lumen_render::DeviceError`]s. Surface acquisition errors at present are
//! logged and the frame skipped.

mod context;
mod conversion;
mod device;

pub use context::WgpuContext;
pub use device::{
    WgpuBackBuffer, WgpuBuffer, WgpuDepthStencilBuffer, WgpuDepthStencilView, WgpuDevice,
    WgpuInputLayout, WgpuProgram, WgpuRenderTargetView, WgpuSampler, WgpuSwapChain, WgpuTexture,
    WgpuWindow,
};

/// Renderer driven by the wgpu backend.
pub type WgpuRenderer<C> = lumen_render::Renderer<WgpuDevice, C>;
