//! Host GPU seam
//!
//! The instanced draw loop talks to the graphics host only through this trait.
//! Renderer operations are generic over it, so the per-frame path is
//! statically dispatched.

use crate::error::DisperseResult;
use crate::math::Bounds;
use glam::{Mat4, Vec4};

/// Resolved compute kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelHandle(pub u32);

/// GPU buffer owned by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

/// Mesh geometry uploaded to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u32);

/// Render material (pipeline + bindings) owned by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialHandle(pub u32);

/// What a buffer is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// Structured storage read by kernels and materials
    Structured,
    /// Argument block consumed by an indirect draw
    IndirectArguments,
}

/// Buffer allocation request: `count` elements of `stride` bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    pub label: &'static str,
    pub kind: BufferKind,
    pub count: u32,
    pub stride: u32,
}

impl BufferDesc {
    pub fn structured(label: &'static str, count: u32, stride: usize) -> Self {
        Self {
            label,
            kind: BufferKind::Structured,
            count,
            stride: stride as u32,
        }
    }

    pub fn indirect(label: &'static str, stride: usize) -> Self {
        Self {
            label,
            kind: BufferKind::IndirectArguments,
            count: 1,
            stride: stride as u32,
        }
    }

    pub fn byte_size(&self) -> u64 {
        self.count as u64 * self.stride as u64
    }
}

/// Shadow casting mode of a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowCasting {
    #[default]
    Off,
    On,
}

/// One indirect instanced draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndirectDrawCall {
    pub mesh: MeshHandle,
    pub submesh: u32,
    pub material: MaterialHandle,
    /// World-space culling volume for the whole group
    pub bounds: Bounds,
    pub args_buffer: BufferHandle,
    pub args_offset: u64,
    pub shadow_casting: ShadowCasting,
    pub receive_shadows: bool,
    /// Projection * view of the camera the draw belongs to
    pub view_projection: Mat4,
}

/// Operations the instanced draw loop needs from a graphics host
pub trait GpuBackend {
    /// Resolve a kernel entry point by name.
    ///
    /// The handle owns per-group kernel state until `release_kernel`.
    fn find_kernel(&mut self, name: &str) -> Option<KernelHandle>;

    fn release_kernel(&mut self, kernel: KernelHandle) -> DisperseResult<()>;

    /// Largest instance count one group can hold and dispatch
    fn max_instance_count(&self) -> u32;

    /// Index count of submesh 0, or None for an unknown mesh
    fn mesh_index_count(&self, mesh: MeshHandle) -> Option<u32>;

    fn create_buffer(&mut self, desc: &BufferDesc) -> DisperseResult<BufferHandle>;

    /// Replace the buffer contents. `data` must match the allocated size.
    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]) -> DisperseResult<()>;

    fn release_buffer(&mut self, buffer: BufferHandle) -> DisperseResult<()>;

    fn set_kernel_buffer(
        &mut self,
        kernel: KernelHandle,
        name: &str,
        buffer: BufferHandle,
    ) -> DisperseResult<()>;

    fn set_kernel_vector(&mut self, kernel: KernelHandle, name: &str, value: Vec4) -> DisperseResult<()>;

    fn set_material_buffer(
        &mut self,
        material: MaterialHandle,
        name: &str,
        buffer: BufferHandle,
    ) -> DisperseResult<()>;

    fn set_material_int(&mut self, material: MaterialHandle, name: &str, value: i32) -> DisperseResult<()>;

    fn dispatch(&mut self, kernel: KernelHandle, groups: [u32; 3]) -> DisperseResult<()>;

    fn draw_mesh_instanced_indirect(&mut self, call: &IndirectDrawCall) -> DisperseResult<()>;
}
