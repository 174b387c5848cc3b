//! Procedural shapes used by the viewer and tests.

use glam::Vec3;
use lumen_common::{VertexPosTex, VertexPosTexNormTan};

use crate::obj::compute_tangents;

/// (normal, u axis, v axis) per cube face. V points down the face so that
/// texture rows map top to bottom.
const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
    ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, -1.0, 0.0]),
    ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, -1.0, 0.0]),
    ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, -1.0, 0.0]),
    ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, -1.0, 0.0]),
    ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
];

/// Corner (u, v) in [-1, 1] face space, counter-clockwise seen from outside.
const CORNERS: [[f32; 2]; 4] = [[-1.0, 1.0], [1.0, 1.0], [1.0, -1.0], [-1.0, -1.0]];

fn face_indices(face: u32) -> [u32; 6] {
    let base = face * 4;
    [base, base + 1, base + 2, base + 2, base + 3, base]
}

/// Unit cube centred on the origin: 24 vertices (4 per face), 36 indices.
pub fn cube() -> (Vec<VertexPosTexNormTan>, Vec<u32>) {
    let half = 0.5_f32;
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (face, (normal, u_axis, v_axis)) in FACES.iter().enumerate() {
        let n = Vec3::from(*normal);
        let u = Vec3::from(*u_axis);
        let v = Vec3::from(*v_axis);
        for [cu, cv] in CORNERS {
            let position = (n + u * cu + v * cv) * half;
            vertices.push(VertexPosTexNormTan {
                position: position.into(),
                uv: [(cu + 1.0) * 0.5, (cv + 1.0) * 0.5],
                normal: *normal,
                tangent: [0.0; 3],
            });
        }
        indices.extend_from_slice(&face_indices(face as u32));
    }

    compute_tangents(&mut vertices, &indices);
    (vertices, indices)
}

/// Unit quad in the XY plane facing +Z.
pub fn quad() -> (Vec<VertexPosTex>, Vec<u32>) {
    let vertices = CORNERS
        .iter()
        .map(|&[cu, cv]| VertexPosTex {
            position: [cu * 0.5, -cv * 0.5, 0.0],
            uv: [(cu + 1.0) * 0.5, (cv + 1.0) * 0.5],
        })
        .collect();
    (vertices, face_indices(0).to_vec())
}
