//! Mesh generation for instanced groups
//! Pure functions that produce CPU-side vertex/index data for upload

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Vertex layout consumed by the instanced material
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable, PartialEq)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// CPU-side mesh (single submesh, u32 indices)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Vertex buffer layout matching `MeshVertex`
pub fn mesh_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &ATTRIBUTES,
    }
}

/// Unit cube centered on the origin
/// 24 vertices (6 faces * 4), flat normals
pub fn create_cube_mesh(size: f32) -> MeshData {
    let h = size * 0.5;

    // 8 corners of the cube
    let corners = [
        [-h, -h, -h], // 0: left, bottom, back
        [h, -h, -h],  // 1: right, bottom, back
        [h, h, -h],   // 2: right, top, back
        [-h, h, -h],  // 3: left, top, back
        [-h, -h, h],  // 4: left, bottom, front
        [h, -h, h],   // 5: right, bottom, front
        [h, h, h],    // 6: right, top, front
        [-h, h, h],   // 7: left, top, front
    ];

    // Each face: 4 corner indices (counter-clockwise seen from outside), normal
    let faces = [
        ([1, 2, 6, 5], [1.0, 0.0, 0.0]),
        ([4, 7, 3, 0], [-1.0, 0.0, 0.0]),
        ([3, 7, 6, 2], [0.0, 1.0, 0.0]),
        ([4, 0, 1, 5], [0.0, -1.0, 0.0]),
        ([5, 6, 7, 4], [0.0, 0.0, 1.0]),
        ([0, 3, 2, 1], [0.0, 0.0, -1.0]),
    ];

    let mut mesh = MeshData {
        vertices: Vec::with_capacity(24),
        indices: Vec::with_capacity(36),
    };

    for (corner_indices, normal) in faces.iter() {
        let base = mesh.vertices.len() as u32;
        for &corner in corner_indices {
            mesh.vertices.push(MeshVertex {
                position: corners[corner],
                normal: *normal,
            });
        }
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    mesh
}

/// Eight-faced rock, cheaper than the cube and reads better at a distance
pub fn create_octahedron_mesh(radius: f32) -> MeshData {
    let tips = [
        Vec3::X * radius,
        Vec3::NEG_X * radius,
        Vec3::Y * radius,
        Vec3::NEG_Y * radius,
        Vec3::Z * radius,
        Vec3::NEG_Z * radius,
    ];

    // Triangles as tip indices, counter-clockwise seen from outside
    let triangles: [[usize; 3]; 8] = [
        [0, 2, 4],
        [4, 2, 1],
        [1, 2, 5],
        [5, 2, 0],
        [0, 4, 3],
        [4, 1, 3],
        [1, 5, 3],
        [5, 0, 3],
    ];

    let mut mesh = MeshData {
        vertices: Vec::with_capacity(24),
        indices: Vec::with_capacity(24),
    };

    for triangle in triangles.iter() {
        let [a, b, c] = triangle.map(|i| tips[i]);
        let normal = (b - a).cross(c - a).normalize_or_zero();
        for position in [a, b, c] {
            mesh.indices.push(mesh.vertices.len() as u32);
            mesh.vertices.push(MeshVertex {
                position: position.to_array(),
                normal: normal.to_array(),
            });
        }
    }

    mesh
}
