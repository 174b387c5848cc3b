//! Headless recording backend.
//!
//! Performs no GPU work. Every resource gets an id and every create, release
//! and context command is appended to a shared [`Trace`], which makes the
//! renderer's behaviour observable without hardware. A [`HeadlessWindow`] can
//! be told to fail creation of one resource kind to exercise error paths.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use glam::Mat4;
use lumen_common::{Extent, Image, Viewport};

use crate::device::{
    BufferUsage, GraphicsDevice, IndexFormat, InputLayoutDesc, PrimitiveTopology, SamplerFilter,
    SubmissionContext, VariableBinding, VariableValue, WindowSurface,
};
use crate::error::DeviceError;
use crate::shader::{BlendMode, CompiledShader, PassState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Device,
    Context,
    SwapChain,
    DepthStencilBuffer,
    DepthStencilView,
    RenderTargetBuffer,
    RenderTargetView,
    VertexBuffer,
    IndexBuffer,
    Texture,
    Sampler,
    Program,
    InputLayout,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Device => "device",
            ResourceKind::Context => "context",
            ResourceKind::SwapChain => "swap-chain",
            ResourceKind::DepthStencilBuffer => "depth-stencil-buffer",
            ResourceKind::DepthStencilView => "depth-stencil-view",
            ResourceKind::RenderTargetBuffer => "render-target-buffer",
            ResourceKind::RenderTargetView => "render-target-view",
            ResourceKind::VertexBuffer => "vertex-buffer",
            ResourceKind::IndexBuffer => "index-buffer",
            ResourceKind::Texture => "texture",
            ResourceKind::Sampler => "sampler",
            ResourceKind::Program => "program",
            ResourceKind::InputLayout => "input-layout",
        };
        f.write_str(name)
    }
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 13] = [
        ResourceKind::Device,
        ResourceKind::Context,
        ResourceKind::SwapChain,
        ResourceKind::DepthStencilBuffer,
        ResourceKind::DepthStencilView,
        ResourceKind::RenderTargetBuffer,
        ResourceKind::RenderTargetView,
        ResourceKind::VertexBuffer,
        ResourceKind::IndexBuffer,
        ResourceKind::Texture,
        ResourceKind::Sampler,
        ResourceKind::Program,
        ResourceKind::InputLayout,
    ];
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.to_string() == s)
            .ok_or_else(|| format!("unknown resource kind `{s}`"))
    }
}

/// Value uploaded to a variable, with resources replaced by their ids.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    Matrix(Mat4),
    Texture(u64),
    Sampler { id: u64, filter: SamplerFilter },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetRenderTargets { target: u64, depth: u64 },
    SetViewport(Viewport),
    ClearRenderTarget { target: u64, color: [f32; 4] },
    ClearDepthStencil { target: u64, depth: f32, stencil: u32 },
    SetTopology(PrimitiveTopology),
    SetInputLayout(u64),
    SetVertexBuffer { buffer: u64, stride: u64 },
    SetIndexBuffer { buffer: u64, format: IndexFormat },
    ApplyPass {
        program: u64,
        pass: usize,
        name: String,
        blend: BlendMode,
        bindings: Vec<(u32, BoundValue)>,
    },
    DrawIndexed { index_count: u32 },
    Present { swap_chain: u64 },
    Flush,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    Created {
        id: u64,
        kind: ResourceKind,
        label: String,
    },
    Released {
        id: u64,
        kind: ResourceKind,
        label: String,
    },
    Command(Command),
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEvent::Created { id, kind, label } => write!(f, "create  #{id:<3} {kind} `{label}`"),
            TraceEvent::Released { id, kind, label } => {
                write!(f, "release #{id:<3} {kind} `{label}`")
            }
            TraceEvent::Command(Command::ApplyPass {
                program,
                pass,
                name,
                blend,
                bindings,
            }) => {
                write!(
                    f,
                    "  apply pass {pass} `{name}` of program #{program} ({blend:?}, {} bindings)",
                    bindings.len()
                )
            }
            TraceEvent::Command(command) => write!(f, "  {command:?}"),
        }
    }
}

#[derive(Debug, Default)]
struct TraceLog {
    next_id: u64,
    events: Vec<TraceEvent>,
}

/// Shared, append-only log of resource lifecycle events and commands.
#[derive(Debug, Clone, Default)]
pub struct Trace(Rc<RefCell<TraceLog>>);

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&self, kind: ResourceKind, label: &str) -> u64 {
        let mut log = self.0.borrow_mut();
        log.next_id += 1;
        let id = log.next_id;
        log.events.push(TraceEvent::Created {
            id,
            kind,
            label: label.to_owned(),
        });
        id
    }

    fn push(&self, event: TraceEvent) {
        self.0.borrow_mut().events.push(event);
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.0.borrow().events.clone()
    }

    pub fn commands(&self) -> Vec<Command> {
        self.0
            .borrow()
            .events
            .iter()
            .filter_map(|e| match e {
                TraceEvent::Command(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    /// Released resources in release order.
    pub fn released(&self) -> Vec<(u64, ResourceKind)> {
        self.0
            .borrow()
            .events
            .iter()
            .filter_map(|e| match e {
                TraceEvent::Released { id, kind, .. } => Some((*id, *kind)),
                _ => None,
            })
            .collect()
    }

    /// Created resources in creation order.
    pub fn created(&self) -> Vec<(u64, ResourceKind)> {
        self.0
            .borrow()
            .events
            .iter()
            .filter_map(|e| match e {
                TraceEvent::Created { id, kind, .. } => Some((*id, *kind)),
                _ => None,
            })
            .collect()
    }

    /// Resources of `kind` created and not yet released.
    pub fn live(&self, kind: ResourceKind) -> usize {
        let created = self.created().iter().filter(|(_, k)| *k == kind).count();
        let released = self.released().iter().filter(|(_, k)| *k == kind).count();
        created - released
    }

    pub fn live_total(&self) -> usize {
        self.created().len() - self.released().len()
    }

    /// Drop recorded commands, keeping lifecycle events.
    pub fn clear_commands(&self) {
        self.0
            .borrow_mut()
            .events
            .retain(|e| !matches!(e, TraceEvent::Command(_)));
    }
}

/// Stand-in window: a size, the trace shared with every resource, and an
/// optional injected creation failure.
#[derive(Debug, Clone)]
pub struct HeadlessWindow {
    size: Extent,
    trace: Trace,
    fail_on: Option<ResourceKind>,
}

impl HeadlessWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: Extent::new(width, height),
            trace: Trace::new(),
            fail_on: None,
        }
    }

    /// Make every creation of `kind` fail.
    pub fn failing_on(mut self, kind: ResourceKind) -> Self {
        self.fail_on = Some(kind);
        self
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }
}

impl WindowSurface for HeadlessWindow {
    fn size(&self) -> Extent {
        self.size
    }
}

/// A traced resource. Dropping it records the release.
#[derive(Debug)]
pub struct Resource {
    id: u64,
    kind: ResourceKind,
    label: String,
    trace: Trace,
}

impl Resource {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for Resource {
    fn drop(&mut self) {
        tracing::trace!(id = self.id, kind = %self.kind, "headless release");
        self.trace.push(TraceEvent::Released {
            id: self.id,
            kind: self.kind,
            label: std::mem::take(&mut self.label),
        });
    }
}

#[derive(Debug)]
pub struct HeadlessBuffer {
    resource: Resource,
    contents: Vec<u8>,
}

impl HeadlessBuffer {
    pub fn id(&self) -> u64 {
        self.resource.id
    }

    /// Bytes the buffer was initialized with.
    pub fn contents(&self) -> &[u8] {
        &self.contents
    }
}

#[derive(Debug)]
pub struct HeadlessTexture {
    resource: Resource,
    extent: Extent,
}

impl HeadlessTexture {
    pub fn id(&self) -> u64 {
        self.resource.id
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }
}

#[derive(Debug)]
pub struct HeadlessSampler {
    resource: Resource,
    filter: SamplerFilter,
}

impl HeadlessSampler {
    pub fn id(&self) -> u64 {
        self.resource.id
    }

    pub fn filter(&self) -> SamplerFilter {
        self.filter
    }
}

#[derive(Debug)]
pub struct HeadlessProgram {
    resource: Resource,
}

impl HeadlessProgram {
    pub fn id(&self) -> u64 {
        self.resource.id
    }
}

#[derive(Debug)]
pub struct HeadlessInputLayout {
    resource: Resource,
    passes: Rc<[(String, PassState)]>,
}

impl HeadlessInputLayout {
    pub fn id(&self) -> u64 {
        self.resource.id
    }
}

#[derive(Debug)]
pub struct HeadlessDevice {
    resource: Resource,
    trace: Trace,
    fail_on: Option<ResourceKind>,
}

impl HeadlessDevice {
    fn allocate(&self, kind: ResourceKind, label: &str) -> Result<Resource, DeviceError> {
        allocate(&self.trace, self.fail_on, kind, label)
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn id(&self) -> u64 {
        self.resource.id
    }
}

fn allocate(
    trace: &Trace,
    fail_on: Option<ResourceKind>,
    kind: ResourceKind,
    label: &str,
) -> Result<Resource, DeviceError> {
    if fail_on == Some(kind) {
        return Err(DeviceError::CreationFailed {
            resource: format!("{kind} `{label}`"),
            reason: "injected fault".into(),
        });
    }
    let id = trace.allocate(kind, label);
    tracing::trace!(id, %kind, label, "headless create");
    Ok(Resource {
        id,
        kind,
        label: label.to_owned(),
        trace: trace.clone(),
    })
}

/// Immediate context that records into the trace.
#[derive(Debug)]
pub struct HeadlessContext {
    resource: Resource,
    trace: Trace,
    passes: Option<Rc<[(String, PassState)]>>,
}

impl HeadlessContext {
    pub fn id(&self) -> u64 {
        self.resource.id
    }

    fn record(&self, command: Command) {
        self.trace.push(TraceEvent::Command(command));
    }
}

impl GraphicsDevice for HeadlessDevice {
    type Window = HeadlessWindow;
    type Context = HeadlessContext;
    type SwapChain = Resource;
    type DepthStencilBuffer = Resource;
    type DepthStencilView = Resource;
    type RenderTargetBuffer = Resource;
    type RenderTargetView = Resource;
    type Buffer = HeadlessBuffer;
    type Texture = HeadlessTexture;
    type Sampler = HeadlessSampler;
    type Program = HeadlessProgram;
    type InputLayout = HeadlessInputLayout;

    fn create_device(window: &HeadlessWindow) -> Result<(Self, HeadlessContext), DeviceError> {
        let trace = window.trace.clone();
        let device = allocate(&trace, window.fail_on, ResourceKind::Device, "headless device")?;
        let context = allocate(
            &trace,
            window.fail_on,
            ResourceKind::Context,
            "immediate context",
        )?;
        Ok((
            Self {
                resource: device,
                trace: trace.clone(),
                fail_on: window.fail_on,
            },
            HeadlessContext {
                resource: context,
                trace,
                passes: None,
            },
        ))
    }

    fn backend_name(&self) -> &'static str {
        "headless"
    }

    fn create_swap_chain(
        &mut self,
        _window: &HeadlessWindow,
        size: Extent,
    ) -> Result<Resource, DeviceError> {
        self.allocate(
            ResourceKind::SwapChain,
            &format!("swap chain {}x{}", size.width, size.height),
        )
    }

    fn create_depth_stencil_buffer(&mut self, size: Extent) -> Result<Resource, DeviceError> {
        self.allocate(
            ResourceKind::DepthStencilBuffer,
            &format!("depth-stencil {}x{}", size.width, size.height),
        )
    }

    fn create_depth_stencil_view(&mut self, buffer: &Resource) -> Result<Resource, DeviceError> {
        self.allocate(
            ResourceKind::DepthStencilView,
            &format!("view of #{}", buffer.id),
        )
    }

    fn back_buffer(&mut self, swap_chain: &Resource) -> Result<Resource, DeviceError> {
        self.allocate(
            ResourceKind::RenderTargetBuffer,
            &format!("back buffer of #{}", swap_chain.id),
        )
    }

    fn create_render_target_view(&mut self, buffer: &Resource) -> Result<Resource, DeviceError> {
        self.allocate(
            ResourceKind::RenderTargetView,
            &format!("view of #{}", buffer.id),
        )
    }

    fn create_buffer(
        &mut self,
        usage: BufferUsage,
        label: &str,
        contents: &[u8],
    ) -> Result<HeadlessBuffer, DeviceError> {
        let kind = match usage {
            BufferUsage::Vertex => ResourceKind::VertexBuffer,
            BufferUsage::Index => ResourceKind::IndexBuffer,
        };
        Ok(HeadlessBuffer {
            resource: self.allocate(kind, label)?,
            contents: contents.to_vec(),
        })
    }

    fn create_texture(&mut self, image: &Image, label: &str) -> Result<HeadlessTexture, DeviceError> {
        Ok(HeadlessTexture {
            resource: self.allocate(ResourceKind::Texture, label)?,
            extent: image.extent(),
        })
    }

    fn create_sampler(&mut self, filter: SamplerFilter) -> Result<HeadlessSampler, DeviceError> {
        Ok(HeadlessSampler {
            resource: self.allocate(ResourceKind::Sampler, &format!("{filter} sampler"))?,
            filter,
        })
    }

    fn create_program(&mut self, shader: &CompiledShader) -> Result<HeadlessProgram, DeviceError> {
        Ok(HeadlessProgram {
            resource: self.allocate(ResourceKind::Program, shader.name())?,
        })
    }

    fn create_input_layout(
        &mut self,
        _program: &HeadlessProgram,
        desc: &InputLayoutDesc<'_>,
    ) -> Result<HeadlessInputLayout, DeviceError> {
        Ok(HeadlessInputLayout {
            resource: self.allocate(ResourceKind::InputLayout, desc.label)?,
            passes: desc
                .passes
                .iter()
                .map(|p| (p.name.clone(), p.state))
                .collect(),
        })
    }
}

impl SubmissionContext<HeadlessDevice> for HeadlessContext {
    fn set_render_targets(&mut self, target: &Resource, depth: &Resource) {
        self.record(Command::SetRenderTargets {
            target: target.id,
            depth: depth.id,
        });
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.record(Command::SetViewport(viewport));
    }

    fn clear_render_target(&mut self, target: &Resource, color: [f32; 4]) {
        self.record(Command::ClearRenderTarget {
            target: target.id,
            color,
        });
    }

    fn clear_depth_stencil(&mut self, target: &Resource, depth: f32, stencil: u32) {
        self.record(Command::ClearDepthStencil {
            target: target.id,
            depth,
            stencil,
        });
    }

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) {
        self.record(Command::SetTopology(topology));
    }

    fn set_input_layout(&mut self, layout: &HeadlessInputLayout) {
        self.passes = Some(layout.passes.clone());
        self.record(Command::SetInputLayout(layout.id()));
    }

    fn set_vertex_buffer(&mut self, buffer: &HeadlessBuffer, stride: u64) {
        self.record(Command::SetVertexBuffer {
            buffer: buffer.id(),
            stride,
        });
    }

    fn set_index_buffer(&mut self, buffer: &HeadlessBuffer, format: IndexFormat) {
        self.record(Command::SetIndexBuffer {
            buffer: buffer.id(),
            format,
        });
    }

    fn apply_pass(
        &mut self,
        program: &HeadlessProgram,
        pass: usize,
        variables: &[VariableBinding<'_, HeadlessDevice>],
    ) {
        let (name, state) = self
            .passes
            .as_ref()
            .and_then(|passes| passes.get(pass).cloned())
            .unwrap_or_else(|| (String::from("?"), PassState::default()));
        let bindings = variables
            .iter()
            .map(|v| {
                let value = match &v.value {
                    VariableValue::Matrix(m) => BoundValue::Matrix(*m),
                    VariableValue::Texture(t) => BoundValue::Texture(t.id()),
                    VariableValue::Sampler(s) => BoundValue::Sampler {
                        id: s.id(),
                        filter: s.filter(),
                    },
                };
                (v.binding, value)
            })
            .collect();
        self.record(Command::ApplyPass {
            program: program.id(),
            pass,
            name,
            blend: state.blend,
            bindings,
        });
    }

    fn draw_indexed(&mut self, index_count: u32) {
        self.record(Command::DrawIndexed { index_count });
    }

    fn present(&mut self, swap_chain: &Resource) {
        self.record(Command::Present {
            swap_chain: swap_chain.id,
        });
    }

    fn flush(&mut self) {
        self.record(Command::Flush);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resources_are_traced() {
        let window = HeadlessWindow::new(32, 32);
        let (mut device, context) = HeadlessDevice::create_device(&window).unwrap();
        let buffer = device
            .create_buffer(BufferUsage::Vertex, "vb", &[1, 2, 3])
            .unwrap();
        assert_eq!(buffer.contents(), &[1, 2, 3]);
        assert_eq!(window.trace().live_total(), 3);

        drop(buffer);
        drop(context);
        drop(device);
        assert_eq!(window.trace().live_total(), 0);
        let kinds: Vec<_> = window.trace().released().into_iter().map(|(_, k)| k).collect();
        assert_eq!(
            kinds,
            [ResourceKind::VertexBuffer, ResourceKind::Context, ResourceKind::Device]
        );
    }

    #[test]
    fn resource_kinds_parse_from_display_names() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.to_string().parse::<ResourceKind>(), Ok(kind));
        }
        assert!("gpu".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn injected_fault_fails_only_that_kind() {
        let window = HeadlessWindow::new(32, 32).failing_on(ResourceKind::Sampler);
        let (mut device, _context) = HeadlessDevice::create_device(&window).unwrap();
        assert!(device.create_sampler(SamplerFilter::Point).is_err());
        assert!(device.create_texture(&Image::white(), "t").is_ok());
    }

    #[test]
    fn device_fault_creates_nothing() {
        let window = HeadlessWindow::new(32, 32).failing_on(ResourceKind::Device);
        assert!(HeadlessDevice::create_device(&window).is_err());
        assert!(window.trace().events().is_empty());
    }

    #[test]
    fn context_records_commands() {
        let window = HeadlessWindow::new(32, 32);
        let (_device, mut context) = HeadlessDevice::create_device(&window).unwrap();
        context.draw_indexed(6);
        context.flush();
        assert_eq!(
            window.trace().commands(),
            vec![Command::DrawIndexed { index_count: 6 }, Command::Flush]
        );
        window.trace().clear_commands();
        assert!(window.trace().commands().is_empty());
        assert_eq!(window.trace().created().len(), 2);
    }
}
