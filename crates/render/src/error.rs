use std::fmt;
use std::path::PathBuf;

use lumen_common::VertexFormat;

/// Failure reported by a graphics backend while creating a resource.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("no compatible graphics adapter found")]
    NoAdapter,
    #[error("device request failed: {0}")]
    RequestDevice(String),
    #[error("surface error: {0}")]
    Surface(String),
    #[error("out of GPU memory while creating {resource}")]
    OutOfMemory { resource: String },
    #[error("failed to create {resource}: {reason}")]
    CreationFailed { resource: String, reason: String },
}

/// Renderer initialization steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitStep {
    Device,
    SwapChain,
    DepthStencilBuffer,
    DepthStencilView,
    BackBuffer,
    RenderTargetView,
}

impl fmt::Display for InitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InitStep::Device => "device and submission context",
            InitStep::SwapChain => "swap chain",
            InitStep::DepthStencilBuffer => "depth-stencil buffer",
            InitStep::DepthStencilView => "depth-stencil view",
            InitStep::BackBuffer => "back buffer",
            InitStep::RenderTargetView => "render-target view",
        };
        f.write_str(name)
    }
}

/// Initialization failed; carries the step that failed.
#[derive(Debug, thiserror::Error)]
#[error("renderer initialization failed creating the {step}")]
pub struct InitError {
    pub step: InitStep,
    #[source]
    pub source: DeviceError,
}

impl InitError {
    pub(crate) fn at(step: InitStep) -> impl FnOnce(DeviceError) -> InitError {
        move |source| InitError { step, source }
    }
}

/// Errors from loading a shader asset or resolving its variables.
#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid effect manifest")]
    Manifest(#[from] serde_json::Error),
    #[error("effect `{effect}`: WGSL parse error:\n{message}")]
    Parse { effect: String, message: String },
    #[error("effect `{effect}`: validation error: {message}")]
    Validation { effect: String, message: String },
    #[error("effect `{effect}` has no technique named `{technique}`")]
    MissingTechnique { effect: String, technique: String },
    #[error("effect `{effect}`: technique `{technique}` has no passes")]
    EmptyTechnique { effect: String, technique: String },
    #[error("effect `{effect}`: no {stage} entry point named `{entry}`")]
    MissingEntryPoint {
        effect: String,
        stage: &'static str,
        entry: String,
    },
    #[error("effect `{effect}`: entry point `{entry}` input at location {location} has an unsupported type")]
    UnsupportedInput {
        effect: String,
        entry: String,
        location: u32,
    },
    #[error("effect `{effect}`: required variable `{variable}` not found")]
    MissingVariable { effect: String, variable: String },
    #[error("effect `{effect}`: variable `{variable}` must be a {expected}")]
    VariableType {
        effect: String,
        variable: String,
        expected: &'static str,
    },
    #[error("effect `{effect}`: variable `{variable}` is bound but not driven by the material")]
    UnexpectedVariable { effect: String, variable: String },
    #[error("effect `{effect}`: variable `{variable}` has invalid binding: {reason}")]
    InvalidBinding {
        effect: String,
        variable: String,
        reason: String,
    },
    #[error(transparent)]
    Texture(#[from] TextureError),
    #[error("effect program creation failed")]
    Device(#[from] DeviceError),
}

/// Errors from creating a [`Mesh`](crate::Mesh).
#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("mesh has no geometry ({vertices} vertices, {indices} indices)")]
    EmptyGeometry { vertices: usize, indices: usize },
    #[error("index count {0} is not a multiple of 3")]
    IndexCount(usize),
    #[error("index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },
    #[error("pass `{pass}` reads location {location}, which the vertex record does not provide")]
    MissingInput { pass: String, location: u32 },
    #[error("pass `{pass}` reads location {location} as {expected:?}, vertex record provides {found:?}")]
    InputFormat {
        pass: String,
        location: u32,
        expected: VertexFormat,
        found: VertexFormat,
    },
    #[error("mesh resource creation failed")]
    Device(#[from] DeviceError),
}

/// Errors from creating a [`Texture`](crate::Texture).
#[derive(Debug, thiserror::Error)]
#[error("failed to create texture `{label}`")]
pub struct TextureError {
    pub label: String,
    #[source]
    pub source: DeviceError,
}
