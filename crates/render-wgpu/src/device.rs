use std::rc::Rc;
use std::sync::Arc;

use lumen_common::{Extent, Image};
use lumen_render::shader::ShaderVariable;
use lumen_render::{
    BufferUsage, CompiledShader, DeviceError, GraphicsDevice, InputLayoutDesc, SamplerFilter,
    WindowSurface,
};
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::context::WgpuContext;
use crate::conversion::{
    DEPTH_FORMAT, FALLBACK_SURFACE_FORMAT, binding_type, choose_surface_format, convert_blend,
    convert_cull, convert_topology, convert_vertex_format, sampler_descriptor,
};

/// Window the wgpu backend presents to.
#[derive(Debug, Clone)]
pub struct WgpuWindow {
    window: Arc<Window>,
}

impl WgpuWindow {
    pub fn new(window: Arc<Window>) -> Self {
        Self { window }
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }
}

impl WindowSurface for WgpuWindow {
    fn size(&self) -> Extent {
        let size = self.window.inner_size();
        Extent::new(size.width, size.height)
    }
}

/// Device and queue shared by the device and its submission context.
pub(crate) struct Gpu {
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
}

pub struct WgpuSwapChain {
    pub(crate) surface: wgpu::Surface<'static>,
    pub(crate) config: wgpu::SurfaceConfiguration,
}

impl WgpuSwapChain {
    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }
}

pub struct WgpuDepthStencilBuffer {
    texture: wgpu::Texture,
}

pub struct WgpuDepthStencilView {
    pub(crate) view: Rc<wgpu::TextureView>,
}

/// The swap chain's back buffer. The surface texture itself is acquired
/// each frame at present time.
#[derive(Debug, Clone, Copy)]
pub struct WgpuBackBuffer {
    format: wgpu::TextureFormat,
    extent: Extent,
}

#[derive(Debug, Clone, Copy)]
pub struct WgpuRenderTargetView {
    pub(crate) format: wgpu::TextureFormat,
    pub(crate) extent: Extent,
}

pub struct WgpuBuffer {
    pub(crate) buffer: Rc<wgpu::Buffer>,
}

impl WgpuBuffer {
    pub fn size(&self) -> u64 {
        self.buffer.size()
    }
}

pub struct WgpuTexture {
    pub(crate) id: u64,
    _texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
}

pub struct WgpuSampler {
    pub(crate) id: u64,
    pub(crate) sampler: wgpu::Sampler,
    filter: SamplerFilter,
}

impl WgpuSampler {
    pub fn filter(&self) -> SamplerFilter {
        self.filter
    }
}

/// Shader module plus the bind group layout derived from its reflected
/// variables.
pub struct WgpuProgram {
    pub(crate) id: u64,
    pub(crate) label: String,
    pub(crate) module: wgpu::ShaderModule,
    pub(crate) bind_group_layout: wgpu::BindGroupLayout,
    pub(crate) pipeline_layout: wgpu::PipelineLayout,
}

/// One render pipeline per pass of the technique the layout was built for.
pub struct WgpuInputLayout {
    pub(crate) pipelines: Rc<[wgpu::RenderPipeline]>,
    pub(crate) topology: lumen_render::PrimitiveTopology,
}

pub struct WgpuDevice {
    gpu: Rc<Gpu>,
    adapter: wgpu::Adapter,
    surface: Option<wgpu::Surface<'static>>,
    surface_format: Option<wgpu::TextureFormat>,
    instance: wgpu::Instance,
    next_id: u64,
}

impl WgpuDevice {
    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    fn device(&self) -> &wgpu::Device {
        &self.gpu.device
    }

    /// Run `create` inside validation and out-of-memory error scopes.
    fn scoped<T>(
        &self,
        resource: &str,
        create: impl FnOnce(&wgpu::Device) -> T,
    ) -> Result<T, DeviceError> {
        let device = self.device();
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create(device);
        let validation = pollster::block_on(device.pop_error_scope());
        let out_of_memory = pollster::block_on(device.pop_error_scope());
        if out_of_memory.is_some() {
            return Err(DeviceError::OutOfMemory {
                resource: resource.to_owned(),
            });
        }
        if let Some(err) = validation {
            return Err(DeviceError::CreationFailed {
                resource: resource.to_owned(),
                reason: err.to_string(),
            });
        }
        tracing::debug!(resource, "created");
        Ok(value)
    }

    /// Identity for resources that key the context's bind group cache.
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn color_format(&self) -> wgpu::TextureFormat {
        self.surface_format.unwrap_or(FALLBACK_SURFACE_FORMAT)
    }
}

impl GraphicsDevice for WgpuDevice {
    type Window = WgpuWindow;
    type Context = WgpuContext;
    type SwapChain = WgpuSwapChain;
    type DepthStencilBuffer = WgpuDepthStencilBuffer;
    type DepthStencilView = WgpuDepthStencilView;
    type RenderTargetBuffer = WgpuBackBuffer;
    type RenderTargetView = WgpuRenderTargetView;
    type Buffer = WgpuBuffer;
    type Texture = WgpuTexture;
    type Sampler = WgpuSampler;
    type Program = WgpuProgram;
    type InputLayout = WgpuInputLayout;

    fn create_device(window: &WgpuWindow) -> Result<(Self, WgpuContext), DeviceError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.window.clone())
            .map_err(|e| DeviceError::Surface(e.to_string()))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or(DeviceError::NoAdapter)?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("lumen device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .map_err(|e| DeviceError::RequestDevice(e.to_string()))?;

        device.on_uncaptured_error(Box::new(|err| {
            tracing::error!(error = %err, "uncaptured wgpu error");
        }));

        let info = adapter.get_info();
        tracing::info!(
            adapter = %info.name,
            backend = info.backend.to_str(),
            "wgpu device created"
        );

        let gpu = Rc::new(Gpu { device, queue });
        let context = WgpuContext::new(gpu.clone());
        Ok((
            Self {
                gpu,
                adapter,
                surface: Some(surface),
                surface_format: None,
                instance,
                next_id: 0,
            },
            context,
        ))
    }

    fn backend_name(&self) -> &'static str {
        "wgpu"
    }

    fn create_swap_chain(
        &mut self,
        window: &WgpuWindow,
        size: Extent,
    ) -> Result<WgpuSwapChain, DeviceError> {
        let surface = match self.surface.take() {
            Some(surface) => surface,
            None => self
                .instance
                .create_surface(window.window.clone())
                .map_err(|e| DeviceError::Surface(e.to_string()))?,
        };
        let caps = surface.get_capabilities(&self.adapter);
        let format = choose_surface_format(&caps.formats)
            .ok_or_else(|| DeviceError::Surface("surface reports no formats".into()))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        self.scoped("swap chain", |device| surface.configure(device, &config))?;
        self.surface_format = Some(format);
        tracing::info!(?format, width = config.width, height = config.height, "surface configured");
        Ok(WgpuSwapChain { surface, config })
    }

    fn create_depth_stencil_buffer(
        &mut self,
        size: Extent,
    ) -> Result<WgpuDepthStencilBuffer, DeviceError> {
        let texture = self.scoped("depth-stencil buffer", |device| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("depth-stencil buffer"),
                size: wgpu::Extent3d {
                    width: size.width.max(1),
                    height: size.height.max(1),
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: DEPTH_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
        })?;
        Ok(WgpuDepthStencilBuffer { texture })
    }

    fn create_depth_stencil_view(
        &mut self,
        buffer: &WgpuDepthStencilBuffer,
    ) -> Result<WgpuDepthStencilView, DeviceError> {
        let view = self.scoped("depth-stencil view", |_| {
            buffer
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default())
        })?;
        Ok(WgpuDepthStencilView {
            view: Rc::new(view),
        })
    }

    fn back_buffer(&mut self, swap_chain: &WgpuSwapChain) -> Result<WgpuBackBuffer, DeviceError> {
        Ok(WgpuBackBuffer {
            format: swap_chain.config.format,
            extent: Extent::new(swap_chain.config.width, swap_chain.config.height),
        })
    }

    fn create_render_target_view(
        &mut self,
        buffer: &WgpuBackBuffer,
    ) -> Result<WgpuRenderTargetView, DeviceError> {
        Ok(WgpuRenderTargetView {
            format: buffer.format,
            extent: buffer.extent,
        })
    }

    fn create_buffer(
        &mut self,
        usage: BufferUsage,
        label: &str,
        contents: &[u8],
    ) -> Result<WgpuBuffer, DeviceError> {
        let usage = match usage {
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
            BufferUsage::Index => wgpu::BufferUsages::INDEX,
        };
        let buffer = self.scoped(label, |device| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage,
            })
        })?;
        Ok(WgpuBuffer {
            buffer: Rc::new(buffer),
        })
    }

    fn create_texture(&mut self, image: &Image, label: &str) -> Result<WgpuTexture, DeviceError> {
        let queue = &self.gpu.queue;
        let texture = self.scoped(label, |device| {
            device.create_texture_with_data(
                queue,
                &wgpu::TextureDescriptor {
                    label: Some(label),
                    size: wgpu::Extent3d {
                        width: image.width(),
                        height: image.height(),
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                    view_formats: &[],
                },
                wgpu::util::TextureDataOrder::LayerMajor,
                image.pixels(),
            )
        })?;
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(WgpuTexture {
            id: self.next_id(),
            _texture: texture,
            view,
        })
    }

    fn create_sampler(&mut self, filter: SamplerFilter) -> Result<WgpuSampler, DeviceError> {
        let sampler = self.scoped(&format!("{filter} sampler"), |device| {
            device.create_sampler(&sampler_descriptor(filter))
        })?;
        Ok(WgpuSampler {
            id: self.next_id(),
            sampler,
            filter,
        })
    }

    fn create_program(&mut self, shader: &CompiledShader) -> Result<WgpuProgram, DeviceError> {
        let label = shader.name().to_owned();
        let entries = layout_entries(shader.variables());
        let (module, bind_group_layout, pipeline_layout) = self.scoped(&label, |device| {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&label),
                source: wgpu::ShaderSource::Wgsl(shader.source().into()),
            });
            let bind_group_layout =
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(&label),
                    entries: &entries,
                });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&label),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });
            (module, bind_group_layout, pipeline_layout)
        })?;
        Ok(WgpuProgram {
            id: self.next_id(),
            label,
            module,
            bind_group_layout,
            pipeline_layout,
        })
    }

    fn create_input_layout(
        &mut self,
        program: &WgpuProgram,
        desc: &InputLayoutDesc<'_>,
    ) -> Result<WgpuInputLayout, DeviceError> {
        let attributes: Vec<wgpu::VertexAttribute> = desc
            .attributes
            .iter()
            .map(|a| wgpu::VertexAttribute {
                format: convert_vertex_format(a.format),
                offset: a.offset,
                shader_location: a.location,
            })
            .collect();
        let color_format = self.color_format();

        let pipelines = self.scoped(desc.label, |device| {
            desc.passes
                .iter()
                .map(|pass| {
                    let label = format!("{} {}", program.label, pass.name);
                    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                        label: Some(&label),
                        layout: Some(&program.pipeline_layout),
                        vertex: wgpu::VertexState {
                            module: &program.module,
                            entry_point: Some(&pass.vertex_entry),
                            compilation_options: Default::default(),
                            buffers: &[wgpu::VertexBufferLayout {
                                array_stride: desc.stride,
                                step_mode: wgpu::VertexStepMode::Vertex,
                                attributes: &attributes,
                            }],
                        },
                        fragment: Some(wgpu::FragmentState {
                            module: &program.module,
                            entry_point: Some(&pass.fragment_entry),
                            compilation_options: Default::default(),
                            targets: &[Some(wgpu::ColorTargetState {
                                format: color_format,
                                blend: Some(convert_blend(pass.state.blend)),
                                write_mask: wgpu::ColorWrites::ALL,
                            })],
                        }),
                        primitive: wgpu::PrimitiveState {
                            topology: convert_topology(desc.topology),
                            cull_mode: convert_cull(pass.state.cull),
                            ..Default::default()
                        },
                        depth_stencil: Some(wgpu::DepthStencilState {
                            format: DEPTH_FORMAT,
                            depth_write_enabled: pass.state.depth_write,
                            depth_compare: wgpu::CompareFunction::Less,
                            stencil: Default::default(),
                            bias: Default::default(),
                        }),
                        multisample: Default::default(),
                        multiview: None,
                        cache: None,
                    })
                })
                .collect::<Vec<_>>()
        })?;

        Ok(WgpuInputLayout {
            pipelines: pipelines.into(),
            topology: desc.topology,
        })
    }
}

fn layout_entries(variables: &[ShaderVariable]) -> Vec<wgpu::BindGroupLayoutEntry> {
    variables
        .iter()
        .map(|v| wgpu::BindGroupLayoutEntry {
            binding: v.binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: binding_type(v.kind),
            count: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_render::BuiltinEffect;

    #[test]
    fn layout_entries_follow_reflection() {
        let shader = CompiledShader::compile(&BuiltinEffect::Shaded.asset().unwrap()).unwrap();
        let entries = layout_entries(shader.variables());
        assert_eq!(entries.len(), 8);
        let mut bindings: Vec<_> = entries.iter().map(|e| e.binding).collect();
        bindings.sort_unstable();
        assert_eq!(bindings, (0..8).collect::<Vec<_>>());
        assert!(entries
            .iter()
            .all(|e| e.visibility == wgpu::ShaderStages::VERTEX_FRAGMENT));
    }
}
