//! Immediate-mode submission on top of wgpu.
//!
//! State calls and draws are recorded into a frame list; `present` acquires
//! the surface texture, replays the list inside one render pass that applies
//! the recorded clears, submits and presents.

use std::collections::HashMap;
use std::rc::Rc;

use lumen_common::Viewport;
use lumen_render::{
    IndexFormat, PrimitiveTopology, SubmissionContext, VariableBinding, VariableValue,
};

use crate::conversion::{convert_clear_color, convert_index_format};
use crate::device::{
    Gpu, WgpuBuffer, WgpuDepthStencilView, WgpuDevice, WgpuInputLayout, WgpuProgram,
    WgpuRenderTargetView, WgpuSampler, WgpuSwapChain, WgpuTexture,
};

struct DrawCall {
    pipelines: Rc<[wgpu::RenderPipeline]>,
    pass: usize,
    bind_group: Rc<wgpu::BindGroup>,
    vertex_buffer: Rc<wgpu::Buffer>,
    index_buffer: Rc<wgpu::Buffer>,
    index_format: wgpu::IndexFormat,
    index_count: u32,
}

#[derive(Default)]
struct Frame {
    clear_color: Option<wgpu::Color>,
    clear_depth: Option<(f32, u32)>,
    draws: Vec<DrawCall>,
}

#[derive(Default)]
struct Bound {
    topology: PrimitiveTopology,
    layout: Option<(Rc<[wgpu::RenderPipeline]>, PrimitiveTopology)>,
    vertex_buffer: Option<Rc<wgpu::Buffer>>,
    index_buffer: Option<(Rc<wgpu::Buffer>, wgpu::IndexFormat)>,
    pass: Option<(usize, Rc<wgpu::BindGroup>)>,
}

const MATRIX_SIZE: u64 = std::mem::size_of::<[f32; 16]>() as u64;

/// Slots reused frame to frame: the n-th matrix of a frame always lands in
/// slot n, so steady-state frames allocate nothing.
struct UniformPool<B> {
    buffers: Vec<B>,
    cursor: usize,
}

impl<B> Default for UniformPool<B> {
    fn default() -> Self {
        Self {
            buffers: Vec::new(),
            cursor: 0,
        }
    }
}

impl<B> UniformPool<B> {
    fn next(&mut self, create: impl FnOnce() -> B) -> usize {
        if self.cursor == self.buffers.len() {
            self.buffers.push(create());
        }
        self.cursor += 1;
        self.cursor - 1
    }

    fn rewind(&mut self) {
        self.cursor = 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum BindKeyEntry {
    Uniform(usize),
    Texture(u64),
    Sampler(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BindKey {
    program: u64,
    entries: Vec<(u32, BindKeyEntry)>,
}

/// A pass variable with its matrix already written to a pool slot.
enum Resolved<'a> {
    Uniform(usize),
    Texture(&'a WgpuTexture),
    Sampler(&'a WgpuSampler),
}

impl Resolved<'_> {
    fn key(&self) -> BindKeyEntry {
        match self {
            Resolved::Uniform(slot) => BindKeyEntry::Uniform(*slot),
            Resolved::Texture(texture) => BindKeyEntry::Texture(texture.id),
            Resolved::Sampler(sampler) => BindKeyEntry::Sampler(sampler.id),
        }
    }
}

fn bind_key(program: u64, resolved: &[(u32, Resolved<'_>)]) -> BindKey {
    BindKey {
        program,
        entries: resolved.iter().map(|(b, r)| (*b, r.key())).collect(),
    }
}

pub struct WgpuContext {
    gpu: Rc<Gpu>,
    depth: Option<Rc<wgpu::TextureView>>,
    viewport: Option<Viewport>,
    bound: Bound,
    frame: Frame,
    uniforms: UniformPool<wgpu::Buffer>,
    bind_groups: HashMap<BindKey, Rc<wgpu::BindGroup>>,
}

impl WgpuContext {
    pub(crate) fn new(gpu: Rc<Gpu>) -> Self {
        Self {
            gpu,
            depth: None,
            viewport: None,
            bound: Bound::default(),
            frame: Frame::default(),
            uniforms: UniformPool::default(),
            bind_groups: HashMap::new(),
        }
    }

    /// Draws recorded since the last present.
    pub fn pending_draws(&self) -> usize {
        self.frame.draws.len()
    }

    /// Matrix uniform buffers allocated so far.
    pub fn uniform_buffers(&self) -> usize {
        self.uniforms.buffers.len()
    }

    /// Write each matrix into the next pool slot.
    fn upload<'a>(
        &mut self,
        variables: &[VariableBinding<'a, WgpuDevice>],
    ) -> Vec<(u32, Resolved<'a>)> {
        let gpu = &self.gpu;
        variables
            .iter()
            .map(|v| {
                let resolved = match v.value {
                    VariableValue::Matrix(m) => {
                        let slot = self.uniforms.next(|| {
                            gpu.device.create_buffer(&wgpu::BufferDescriptor {
                                label: Some("matrix uniform"),
                                size: MATRIX_SIZE,
                                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                                mapped_at_creation: false,
                            })
                        });
                        gpu.queue.write_buffer(
                            &self.uniforms.buffers[slot],
                            0,
                            bytemuck::bytes_of(&m.to_cols_array()),
                        );
                        Resolved::Uniform(slot)
                    }
                    VariableValue::Texture(texture) => Resolved::Texture(texture),
                    VariableValue::Sampler(sampler) => Resolved::Sampler(sampler),
                };
                (v.binding, resolved)
            })
            .collect()
    }

    fn create_bind_group(
        &self,
        program: &WgpuProgram,
        resolved: &[(u32, Resolved<'_>)],
    ) -> wgpu::BindGroup {
        let entries: Vec<wgpu::BindGroupEntry<'_>> = resolved
            .iter()
            .map(|(binding, value)| wgpu::BindGroupEntry {
                binding: *binding,
                resource: match value {
                    Resolved::Uniform(slot) => self.uniforms.buffers[*slot].as_entire_binding(),
                    Resolved::Texture(texture) => wgpu::BindingResource::TextureView(&texture.view),
                    Resolved::Sampler(sampler) => wgpu::BindingResource::Sampler(&sampler.sampler),
                },
            })
            .collect();

        self.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&program.label),
            layout: &program.bind_group_layout,
            entries: &entries,
        })
    }
}

impl SubmissionContext<WgpuDevice> for WgpuContext {
    fn set_render_targets(&mut self, target: &WgpuRenderTargetView, depth: &WgpuDepthStencilView) {
        tracing::debug!(
            format = ?target.format,
            width = target.extent.width,
            height = target.extent.height,
            "render targets bound"
        );
        self.depth = Some(depth.view.clone());
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    fn clear_render_target(&mut self, _target: &WgpuRenderTargetView, color: [f32; 4]) {
        self.frame.clear_color = Some(convert_clear_color(color));
    }

    fn clear_depth_stencil(&mut self, _target: &WgpuDepthStencilView, depth: f32, stencil: u32) {
        self.frame.clear_depth = Some((depth, stencil));
    }

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) {
        self.bound.topology = topology;
    }

    fn set_input_layout(&mut self, layout: &WgpuInputLayout) {
        self.bound.layout = Some((layout.pipelines.clone(), layout.topology));
    }

    fn set_vertex_buffer(&mut self, buffer: &WgpuBuffer, _stride: u64) {
        self.bound.vertex_buffer = Some(buffer.buffer.clone());
    }

    fn set_index_buffer(&mut self, buffer: &WgpuBuffer, format: IndexFormat) {
        self.bound.index_buffer = Some((buffer.buffer.clone(), convert_index_format(format)));
    }

    fn apply_pass(
        &mut self,
        program: &WgpuProgram,
        pass: usize,
        variables: &[VariableBinding<'_, WgpuDevice>],
    ) {
        let resolved = self.upload(variables);
        let key = bind_key(program.id, &resolved);
        let bind_group = match self.bind_groups.get(&key) {
            Some(group) => group.clone(),
            None => {
                let group = Rc::new(self.create_bind_group(program, &resolved));
                self.bind_groups.insert(key, group.clone());
                tracing::debug!(
                    program = %program.label,
                    cached = self.bind_groups.len(),
                    "bind group created"
                );
                group
            }
        };
        self.bound.pass = Some((pass, bind_group));
    }

    fn draw_indexed(&mut self, index_count: u32) {
        let bound = &self.bound;
        let (
            Some((pipelines, topology)),
            Some(vertex_buffer),
            Some((index_buffer, index_format)),
            Some((pass, bind_group)),
        ) = (
            &bound.layout,
            &bound.vertex_buffer,
            &bound.index_buffer,
            &bound.pass,
        )
        else {
            tracing::warn!("draw skipped: input layout, buffers or pass not bound");
            return;
        };
        if *topology != bound.topology || *pass >= pipelines.len() {
            tracing::warn!(pass, "draw skipped: topology or pass does not match the input layout");
            return;
        }
        self.frame.draws.push(DrawCall {
            pipelines: pipelines.clone(),
            pass: *pass,
            bind_group: bind_group.clone(),
            vertex_buffer: vertex_buffer.clone(),
            index_buffer: index_buffer.clone(),
            index_format: *index_format,
            index_count,
        });
    }

    fn present(&mut self, swap_chain: &WgpuSwapChain) {
        let frame = std::mem::take(&mut self.frame);
        self.uniforms.rewind();
        let output = match swap_chain.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                tracing::warn!("surface lost or outdated, reconfiguring");
                swap_chain
                    .surface
                    .configure(&self.gpu.device, &swap_chain.config);
                return;
            }
            Err(wgpu::SurfaceError::Timeout) => {
                tracing::warn!("surface timed out, frame skipped");
                return;
            }
            Err(err) => {
                tracing::error!(error = %err, "surface error, frame skipped");
                return;
            }
        };
        let Some(depth) = self.depth.as_ref() else {
            tracing::warn!("no depth-stencil target bound, frame skipped");
            return;
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame"),
            });
        {
            let color_load = frame
                .clear_color
                .map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear);
            let (depth_load, stencil_load) = match frame.clear_depth {
                Some((depth, stencil)) => (wgpu::LoadOp::Clear(depth), wgpu::LoadOp::Clear(stencil)),
                None => (wgpu::LoadOp::Load, wgpu::LoadOp::Load),
            };
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth,
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: stencil_load,
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                ..Default::default()
            });

            if let Some(vp) = self.viewport {
                pass.set_viewport(vp.x, vp.y, vp.width, vp.height, vp.min_depth, vp.max_depth);
            }
            for draw in &frame.draws {
                pass.set_pipeline(&draw.pipelines[draw.pass]);
                pass.set_bind_group(0, draw.bind_group.as_ref(), &[]);
                pass.set_vertex_buffer(0, draw.vertex_buffer.slice(..));
                pass.set_index_buffer(draw.index_buffer.slice(..), draw.index_format);
                pass.draw_indexed(0..draw.index_count, 0, 0..1);
            }
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
    }

    fn flush(&mut self) {
        self.frame = Frame::default();
        self.bound = Bound::default();
        self.uniforms.rewind();
        self.bind_groups.clear();
        let _ = self.gpu.device.poll(wgpu::Maintain::Wait);
        tracing::debug!("submission context flushed");
    }
}
