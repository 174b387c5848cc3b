//! Wavefront OBJ loader.
//!
//! Supports `v`, `vt`, `vn` and `f` statements; everything else (groups,
//! smoothing, materials) is ignored. Faces are fan-triangulated, identical
//! `position/uv/normal` triples share one vertex, texture V is flipped to the
//! top-left origin used by the GPU, and tangents are generated from the UVs.

use std::collections::HashMap;
use std::path::Path;

use glam::{Vec2, Vec3};
use lumen_common::VertexPosTexNormTan;

use crate::AssetError;

/// Load and triangulate an OBJ file.
pub fn load_obj(
    path: impl AsRef<Path>,
) -> Result<(Vec<VertexPosTexNormTan>, Vec<u32>), AssetError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let (vertices, indices) = parse_obj(&source)?;
    tracing::debug!(
        path = %path.display(),
        vertices = vertices.len(),
        triangles = indices.len() / 3,
        "loaded OBJ"
    );
    Ok((vertices, indices))
}

/// Parse OBJ text already in memory.
pub fn parse_obj(source: &str) -> Result<(Vec<VertexPosTexNormTan>, Vec<u32>), AssetError> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut tex_coords: Vec<[f32; 2]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();

    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    let mut lookup: HashMap<FaceVertex, u32> = HashMap::new();
    let mut missing_normals = false;

    for (number, raw) in source.lines().enumerate() {
        let line = number + 1;
        let content = raw.split('#').next().unwrap_or_default();
        let mut parts = content.split_whitespace();
        let Some(keyword) = parts.next() else {
            continue;
        };

        match keyword {
            "v" => positions.push(parse_floats::<3>(parts, line)?),
            "vt" => {
                let [u, v] = parse_floats::<2>(parts, line)?;
                tex_coords.push([u, 1.0 - v]);
            }
            "vn" => normals.push(parse_floats::<3>(parts, line)?),
            "f" => {
                let mut corners = Vec::new();
                for token in parts {
                    let key = FaceVertex::parse(
                        token,
                        line,
                        positions.len(),
                        tex_coords.len(),
                        normals.len(),
                    )?;
                    let index = match lookup.get(&key) {
                        Some(&index) => index,
                        None => {
                            let index = vertices.len() as u32;
                            vertices.push(VertexPosTexNormTan {
                                position: positions[key.position],
                                uv: key.uv.map_or([0.0, 0.0], |t| tex_coords[t]),
                                normal: key.normal.map_or([0.0; 3], |n| normals[n]),
                                tangent: [0.0; 3],
                            });
                            missing_normals |= key.normal.is_none();
                            lookup.insert(key, index);
                            index
                        }
                    };
                    corners.push(index);
                }
                if corners.len() < 3 {
                    return Err(obj_error(line, "face needs at least three vertices"));
                }
                for i in 1..corners.len() - 1 {
                    indices.extend_from_slice(&[corners[0], corners[i], corners[i + 1]]);
                }
            }
            _ => {}
        }
    }

    if indices.is_empty() {
        return Err(AssetError::EmptyGeometry);
    }
    if missing_normals {
        fill_missing_normals(&mut vertices, &indices);
    }
    compute_tangents(&mut vertices, &indices);
    Ok((vertices, indices))
}

/// Index triple of one face corner, zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FaceVertex {
    position: usize,
    uv: Option<usize>,
    normal: Option<usize>,
}

impl FaceVertex {
    fn parse(
        token: &str,
        line: usize,
        positions: usize,
        tex_coords: usize,
        normals: usize,
    ) -> Result<Self, AssetError> {
        let mut fields = token.split('/');
        let position = match fields.next() {
            Some(field) if !field.is_empty() => resolve_index(field, positions, line)?,
            _ => return Err(obj_error(line, format!("face vertex `{token}` has no position"))),
        };
        let uv = optional_index(fields.next(), tex_coords, line)?;
        let normal = optional_index(fields.next(), normals, line)?;
        Ok(Self {
            position,
            uv,
            normal,
        })
    }
}

fn optional_index(
    field: Option<&str>,
    count: usize,
    line: usize,
) -> Result<Option<usize>, AssetError> {
    match field {
        None | Some("") => Ok(None),
        Some(field) => resolve_index(field, count, line).map(Some),
    }
}

/// OBJ indices are 1-based; negative values count back from the last element.
fn resolve_index(field: &str, count: usize, line: usize) -> Result<usize, AssetError> {
    let value: i64 = field
        .parse()
        .map_err(|_| obj_error(line, format!("invalid index `{field}`")))?;
    let resolved = match value {
        v if v > 0 => v - 1,
        v if v < 0 => count as i64 + v,
        _ => -1,
    };
    if resolved < 0 || resolved as usize >= count {
        return Err(obj_error(
            line,
            format!("index {value} out of range ({count} defined)"),
        ));
    }
    Ok(resolved as usize)
}

fn parse_floats<'a, const N: usize>(
    mut parts: impl Iterator<Item = &'a str>,
    line: usize,
) -> Result<[f32; N], AssetError> {
    let mut out = [0.0; N];
    for slot in out.iter_mut() {
        let field = parts
            .next()
            .ok_or_else(|| obj_error(line, format!("expected {N} components")))?;
        *slot = field
            .parse()
            .map_err(|_| obj_error(line, format!("invalid number `{field}`")))?;
    }
    Ok(out)
}

fn obj_error(line: usize, message: impl Into<String>) -> AssetError {
    AssetError::Obj {
        line,
        message: message.into(),
    }
}

/// Area-weighted face normals for vertices the file gave no normal.
fn fill_missing_normals(vertices: &mut [VertexPosTexNormTan], indices: &[u32]) {
    let mut accum = vec![Vec3::ZERO; vertices.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let p0 = Vec3::from(vertices[a].position);
        let face = (Vec3::from(vertices[b].position) - p0)
            .cross(Vec3::from(vertices[c].position) - p0);
        for i in [a, b, c] {
            accum[i] += face;
        }
    }
    for (vertex, normal) in vertices.iter_mut().zip(accum) {
        if Vec3::from(vertex.normal) == Vec3::ZERO {
            vertex.normal = normal.normalize_or_zero().into();
        }
    }
}

/// Per-vertex tangents from UV gradients, orthogonalized against the normal.
pub(crate) fn compute_tangents(vertices: &mut [VertexPosTexNormTan], indices: &[u32]) {
    let mut accum = vec![Vec3::ZERO; vertices.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let p0 = Vec3::from(vertices[a].position);
        let e1 = Vec3::from(vertices[b].position) - p0;
        let e2 = Vec3::from(vertices[c].position) - p0;
        let t0 = Vec2::from(vertices[a].uv);
        let d1 = Vec2::from(vertices[b].uv) - t0;
        let d2 = Vec2::from(vertices[c].uv) - t0;

        let det = d1.x * d2.y - d2.x * d1.y;
        if det.abs() < f32::EPSILON {
            continue;
        }
        let tangent = (e1 * d2.y - e2 * d1.y) / det;
        for i in [a, b, c] {
            accum[i] += tangent;
        }
    }

    for (vertex, tangent) in vertices.iter_mut().zip(accum) {
        let normal = Vec3::from(vertex.normal);
        let ortho = tangent - normal * normal.dot(tangent);
        let tangent = ortho.try_normalize().unwrap_or_else(|| {
            normal
                .try_normalize()
                .map_or(Vec3::X, |n| n.any_orthonormal_vector())
        });
        vertex.tangent = tangent.into();
    }
}
