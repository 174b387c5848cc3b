//! Backend-agnostic renderer core.
//!
//! Resources (device, output stage, buffers, textures, samplers, programs) are
//! created through the [`GraphicsDevice`] trait and released by dropping their
//! owners. [`Material`] wraps a reflected WGSL effect, [`Mesh`] pairs immutable
//! geometry with a shared material, and [`Renderer`] owns the device, the
//! [`Scene`] and a [`Camera`] and drives one frame at a time.
//!
//! The [`headless`] backend records every resource and command into a trace so
//! the whole pipeline runs without a GPU.

mod builder;
mod camera;
mod device;
mod error;
pub mod headless;
mod material;
mod mesh;
mod renderer;
mod scene;
pub mod shader;
pub mod shaders;
mod texture;

pub use builder::{SceneError, SceneOptions, build_scene};
pub use camera::{Camera, CameraMotion, FlyCamera};
pub use device::{
    BufferUsage, GraphicsDevice, IndexFormat, InputLayoutDesc, PrimitiveTopology, SamplerFilter,
    SubmissionContext, VariableBinding, VariableValue, WindowSurface,
};
pub use error::{DeviceError, InitError, InitStep, MeshError, ShaderError, TextureError};
pub use material::{FrameTransforms, Material};
pub use mesh::Mesh;
pub use renderer::{Renderer, RendererConfig};
pub use scene::{Animator, Scene, SceneEntry, Spin, Static};
pub use shader::{BlendMode, CompiledShader, CullMode, Pass, PassState, ShaderAsset, TextureSlot};
pub use shaders::BuiltinEffect;
pub use texture::Texture;

pub fn crate_info() -> &'static str {
    "lumen-render v0.1.0"
}
