//! Instance Data - GPU layout records shared with the compute kernel
//!
//! Every vec3 is padded to 16 bytes so the structs match WGSL storage layout.
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use static_assertions::const_assert_eq;

use crate::constants::draw_args;

/// Shared per-frame record. One per instance group.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable, PartialEq)]
pub struct GlobalState {
    /// Object-to-world matrix (column-major)
    pub mat_m: [[f32; 4]; 4],

    /// Projection * view * model (column-major)
    pub mat_mvp: [[f32; 4]; 4],

    /// Camera position in the object's local space (xyz + padding)
    pub camera_local_position: [f32; 4],

    /// Camera forward in the object's local space (xyz + padding)
    pub camera_local_forward: [f32; 4],
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            mat_m: Mat4::IDENTITY.to_cols_array_2d(),
            mat_mvp: Mat4::IDENTITY.to_cols_array_2d(),
            camera_local_position: [0.0; 4],
            camera_local_forward: [0.0, 0.0, -1.0, 0.0],
        }
    }
}

impl GlobalState {
    pub fn new(mat_m: Mat4, mat_mvp: Mat4, camera_local_position: Vec3, camera_local_forward: Vec3) -> Self {
        Self {
            mat_m: mat_m.to_cols_array_2d(),
            mat_mvp: mat_mvp.to_cols_array_2d(),
            camera_local_position: camera_local_position.extend(1.0).to_array(),
            camera_local_forward: camera_local_forward.extend(0.0).to_array(),
        }
    }
}

/// Per-instance transform plus scratch space the kernel writes into.
///
/// The CPU only ever fills position/rotation/scale. The scratch fields exist
/// so the GPU has somewhere to put the transformed result without allocating.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable, PartialEq)]
pub struct InstanceState {
    pub local_position: [f32; 3],
    pub _padding0: f32,

    /// Euler angles in radians, applied Z then X then Y
    pub local_rotation: [f32; 3],
    pub _padding1: f32,

    pub local_scale: [f32; 3],
    pub _padding2: f32,

    /// Kernel output: instance model-view-projection
    pub scratch_mvp: [[f32; 4]; 4],

    /// Kernel output: instance object-to-world
    pub scratch_model: [[f32; 4]; 4],

    /// Kernel output: non-zero when the instance is within display distance
    pub scratch_visible: u32,
    pub _padding3: [u32; 3],
}

impl InstanceState {
    pub fn new(local_position: Vec3, local_rotation: Vec3, local_scale: Vec3) -> Self {
        Self {
            local_position: local_position.to_array(),
            local_rotation: local_rotation.to_array(),
            local_scale: local_scale.to_array(),
            ..Self::zeroed()
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.local_position)
    }

    pub fn rotation(&self) -> Vec3 {
        Vec3::from_array(self.local_rotation)
    }

    pub fn scale(&self) -> Vec3 {
        Vec3::from_array(self.local_scale)
    }
}

/// Indirect draw parameter block.
///
/// Same layout as `wgpu::util::DrawIndexedIndirectArgs`: index count,
/// instance count, then three reserved zeros (first index, base vertex,
/// first instance).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable, PartialEq, Eq)]
pub struct DrawArguments(pub [u32; draw_args::LEN]);

impl DrawArguments {
    pub fn new(index_count: u32, instance_count: u32) -> Self {
        Self([index_count, instance_count, 0, 0, 0])
    }

    pub fn index_count(&self) -> u32 {
        self.0[0]
    }

    pub fn instance_count(&self) -> u32 {
        self.0[1]
    }
}

const_assert_eq!(std::mem::size_of::<GlobalState>(), 160);
const_assert_eq!(std::mem::size_of::<InstanceState>(), 192);
const_assert_eq!(std::mem::size_of::<DrawArguments>(), draw_args::BYTE_SIZE as usize);
const_assert_eq!(
    std::mem::size_of::<DrawArguments>(),
    std::mem::size_of::<wgpu::util::DrawIndexedIndirectArgs>()
);
