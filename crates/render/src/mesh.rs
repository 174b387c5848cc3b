use std::rc::Rc;

use glam::Mat4;
use lumen_common::{VertexAttribute, VertexRecord};

use crate::device::{
    BufferUsage, GraphicsDevice, IndexFormat, InputLayoutDesc, PrimitiveTopology,
    SubmissionContext,
};
use crate::error::MeshError;
use crate::material::{FrameTransforms, Material};

/// Indexed triangle geometry drawn with one material.
///
/// Vertex and index buffers are immutable GPU resources created once by
/// [`Mesh::create`]; only the world matrix changes afterwards.
pub struct Mesh<D: GraphicsDevice> {
    vertex_buffer: D::Buffer,
    index_buffer: D::Buffer,
    input_layout: D::InputLayout,
    material: Rc<Material<D>>,
    stride: u64,
    vertex_count: usize,
    index_count: u32,
    world: Mat4,
}

impl<D: GraphicsDevice> Mesh<D> {
    pub fn create<V: VertexRecord>(
        device: &mut D,
        material: Rc<Material<D>>,
        vertices: &[V],
        indices: &[u32],
    ) -> Result<Self, MeshError> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(MeshError::EmptyGeometry {
                vertices: vertices.len(),
                indices: indices.len(),
            });
        }
        if indices.len() % 3 != 0 {
            return Err(MeshError::IndexCount(indices.len()));
        }
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(MeshError::IndexOutOfRange {
                index,
                vertex_count: vertices.len(),
            });
        }

        let attributes = match_signature::<V, D>(&material)?;
        let label = material.name().to_owned();
        let input_layout = device.create_input_layout(
            material.program(),
            &InputLayoutDesc {
                label: &format!("{label} input layout"),
                stride: V::stride(),
                attributes: &attributes,
                topology: PrimitiveTopology::TriangleList,
                passes: &material.technique().passes,
            },
        )?;
        let vertex_buffer = device.create_buffer(
            BufferUsage::Vertex,
            &format!("{label} vertices"),
            bytemuck::cast_slice(vertices),
        )?;
        let index_buffer = device.create_buffer(
            BufferUsage::Index,
            &format!("{label} indices"),
            bytemuck::cast_slice(indices),
        )?;

        tracing::debug!(
            material = %label,
            vertices = vertices.len(),
            triangles = indices.len() / 3,
            "created mesh"
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            input_layout,
            material,
            stride: V::stride(),
            vertex_count: vertices.len(),
            index_count: indices.len() as u32,
            world: Mat4::IDENTITY,
        })
    }

    pub fn world_matrix(&self) -> Mat4 {
        self.world
    }

    pub fn set_world_matrix(&mut self, world: Mat4) {
        self.world = world;
    }

    pub fn material(&self) -> &Rc<Material<D>> {
        &self.material
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Read-only view of the vertex buffer.
    pub fn vertex_buffer(&self) -> &D::Buffer {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &D::Buffer {
        &self.index_buffer
    }

    /// Bind geometry and issue one indexed draw per pass of the material's
    /// technique.
    pub fn render(&self, context: &mut D::Context, transforms: &FrameTransforms) {
        context.set_primitive_topology(PrimitiveTopology::TriangleList);
        context.set_input_layout(&self.input_layout);
        context.set_vertex_buffer(&self.vertex_buffer, self.stride);
        context.set_index_buffer(&self.index_buffer, IndexFormat::Uint32);
        let count = self.index_count;
        self.material
            .bind(context, transforms, |context| context.draw_indexed(count));
    }
}

/// Attributes of `V` consumed by any pass, checked against each pass's input
/// signature.
fn match_signature<V: VertexRecord, D: GraphicsDevice>(
    material: &Material<D>,
) -> Result<Vec<VertexAttribute>, MeshError> {
    let mut used: Vec<VertexAttribute> = Vec::new();
    for pass in &material.technique().passes {
        for input in &pass.inputs {
            let attribute = V::attribute(input.location).ok_or_else(|| MeshError::MissingInput {
                pass: pass.name.clone(),
                location: input.location,
            })?;
            if attribute.format != input.format {
                return Err(MeshError::InputFormat {
                    pass: pass.name.clone(),
                    location: input.location,
                    expected: input.format,
                    found: attribute.format,
                });
            }
            if !used.contains(&attribute) {
                used.push(attribute);
            }
        }
    }
    used.sort_by_key(|a| a.location);
    Ok(used)
}
