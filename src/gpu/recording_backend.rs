//! Headless backend that records every GPU operation
//!
//! Used for tests and for running the update loop without a device. Buffer
//! contents are kept in memory so uploads can be inspected afterwards.

use super::backend::{
    BufferDesc, BufferHandle, GpuBackend, IndirectDrawCall, KernelHandle, MaterialHandle,
    MeshHandle,
};
use crate::error::{DisperseError, DisperseResult};
use glam::Vec4;
use std::collections::{HashMap, HashSet};

/// One recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    CreateBuffer { buffer: BufferHandle, desc: BufferDesc },
    WriteBuffer { buffer: BufferHandle, bytes: usize },
    ReleaseBuffer { buffer: BufferHandle },
    ReleaseKernel { kernel: KernelHandle },
    SetKernelBuffer { kernel: KernelHandle, name: String, buffer: BufferHandle },
    SetKernelVector { kernel: KernelHandle, name: String, value: Vec4 },
    SetMaterialBuffer { material: MaterialHandle, name: String, buffer: BufferHandle },
    SetMaterialInt { material: MaterialHandle, name: String, value: i32 },
    Dispatch { kernel: KernelHandle, groups: [u32; 3] },
    DrawIndirect(IndirectDrawCall),
}

/// Buffer contents kept by the recording backend
#[derive(Debug, Clone)]
pub struct RecordedBuffer {
    pub desc: BufferDesc,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    kernels: HashMap<String, KernelHandle>,
    /// Outstanding find_kernel lookups per kernel
    kernel_leases: HashMap<KernelHandle, u32>,
    meshes: HashMap<MeshHandle, u32>,
    buffers: HashMap<BufferHandle, RecordedBuffer>,
    material_ints: HashMap<(MaterialHandle, String), i32>,
    commands: Vec<GpuCommand>,
    next_buffer: u32,
    /// Remaining successful allocations before create_buffer starts failing
    create_budget: Option<u32>,
    failing_releases: HashSet<BufferHandle>,
    max_instances: Option<u32>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that already knows one kernel and one mesh
    pub fn with_kernel_and_mesh(kernel_name: &str, mesh: MeshHandle, index_count: u32) -> Self {
        let mut backend = Self::new();
        backend.register_kernel(kernel_name);
        backend.register_mesh(mesh, index_count);
        backend
    }

    pub fn register_kernel(&mut self, name: &str) -> KernelHandle {
        let next = KernelHandle(self.kernels.len() as u32);
        *self.kernels.entry(name.to_string()).or_insert(next)
    }

    pub fn register_mesh(&mut self, mesh: MeshHandle, index_count: u32) {
        self.meshes.insert(mesh, index_count);
    }

    /// Let `successes` more allocations through, then fail every create_buffer
    pub fn fail_creates_after(&mut self, successes: u32) {
        self.create_budget = Some(successes);
    }

    /// Make every release of `buffer` fail and leave the buffer live
    pub fn fail_release_of(&mut self, buffer: BufferHandle) {
        self.failing_releases.insert(buffer);
    }

    /// Cap the instance count reported by `max_instance_count`
    pub fn set_max_instance_count(&mut self, limit: u32) {
        self.max_instances = Some(limit);
    }

    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Kernel lookups not yet released
    pub fn live_kernel_count(&self) -> usize {
        self.kernel_leases.values().map(|&n| n as usize).sum()
    }

    pub fn buffer(&self, buffer: BufferHandle) -> Option<&RecordedBuffer> {
        self.buffers.get(&buffer)
    }

    pub fn material_int(&self, material: MaterialHandle, name: &str) -> Option<i32> {
        self.material_ints.get(&(material, name.to_string())).copied()
    }

    pub fn dispatch_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, GpuCommand::Dispatch { .. }))
            .count()
    }

    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, GpuCommand::DrawIndirect(_)))
            .count()
    }

    fn live(&self, buffer: BufferHandle) -> DisperseResult<&RecordedBuffer> {
        self.buffers
            .get(&buffer)
            .ok_or(DisperseError::UnknownBuffer { buffer })
    }
}

impl GpuBackend for RecordingBackend {
    fn find_kernel(&mut self, name: &str) -> Option<KernelHandle> {
        let kernel = self.kernels.get(name).copied()?;
        *self.kernel_leases.entry(kernel).or_insert(0) += 1;
        Some(kernel)
    }

    fn release_kernel(&mut self, kernel: KernelHandle) -> DisperseResult<()> {
        match self.kernel_leases.get_mut(&kernel) {
            Some(leases) if *leases > 0 => *leases -= 1,
            _ => return Err(DisperseError::UnknownKernel { kernel }),
        }
        self.commands.push(GpuCommand::ReleaseKernel { kernel });
        Ok(())
    }

    fn max_instance_count(&self) -> u32 {
        self.max_instances.unwrap_or(u32::MAX)
    }

    fn mesh_index_count(&self, mesh: MeshHandle) -> Option<u32> {
        self.meshes.get(&mesh).copied()
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> DisperseResult<BufferHandle> {
        if let Some(budget) = self.create_budget.as_mut() {
            if *budget == 0 {
                return Err(DisperseError::gpu(
                    format!("create_buffer({})", desc.label),
                    "allocation refused",
                ));
            }
            *budget -= 1;
        }

        let buffer = BufferHandle(self.next_buffer);
        self.next_buffer += 1;
        self.buffers.insert(
            buffer,
            RecordedBuffer {
                desc: *desc,
                data: vec![0; desc.byte_size() as usize],
            },
        );
        self.commands.push(GpuCommand::CreateBuffer { buffer, desc: *desc });
        Ok(buffer)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]) -> DisperseResult<()> {
        let expected = self.live(buffer)?.desc.byte_size();
        if data.len() as u64 != expected {
            return Err(DisperseError::BufferSizeMismatch {
                expected,
                actual: data.len() as u64,
            });
        }

        if let Some(recorded) = self.buffers.get_mut(&buffer) {
            recorded.data.copy_from_slice(data);
        }
        self.commands.push(GpuCommand::WriteBuffer {
            buffer,
            bytes: data.len(),
        });
        Ok(())
    }

    fn release_buffer(&mut self, buffer: BufferHandle) -> DisperseResult<()> {
        if self.failing_releases.contains(&buffer) {
            return Err(DisperseError::gpu(
                format!("release_buffer({:?})", buffer),
                "release refused",
            ));
        }
        self.buffers
            .remove(&buffer)
            .ok_or(DisperseError::UnknownBuffer { buffer })?;
        self.commands.push(GpuCommand::ReleaseBuffer { buffer });
        Ok(())
    }

    fn set_kernel_buffer(
        &mut self,
        kernel: KernelHandle,
        name: &str,
        buffer: BufferHandle,
    ) -> DisperseResult<()> {
        self.live(buffer)?;
        self.commands.push(GpuCommand::SetKernelBuffer {
            kernel,
            name: name.to_string(),
            buffer,
        });
        Ok(())
    }

    fn set_kernel_vector(&mut self, kernel: KernelHandle, name: &str, value: Vec4) -> DisperseResult<()> {
        self.commands.push(GpuCommand::SetKernelVector {
            kernel,
            name: name.to_string(),
            value,
        });
        Ok(())
    }

    fn set_material_buffer(
        &mut self,
        material: MaterialHandle,
        name: &str,
        buffer: BufferHandle,
    ) -> DisperseResult<()> {
        self.live(buffer)?;
        self.commands.push(GpuCommand::SetMaterialBuffer {
            material,
            name: name.to_string(),
            buffer,
        });
        Ok(())
    }

    fn set_material_int(&mut self, material: MaterialHandle, name: &str, value: i32) -> DisperseResult<()> {
        self.material_ints.insert((material, name.to_string()), value);
        self.commands.push(GpuCommand::SetMaterialInt {
            material,
            name: name.to_string(),
            value,
        });
        Ok(())
    }

    fn dispatch(&mut self, kernel: KernelHandle, groups: [u32; 3]) -> DisperseResult<()> {
        self.commands.push(GpuCommand::Dispatch { kernel, groups });
        Ok(())
    }

    fn draw_mesh_instanced_indirect(&mut self, call: &IndirectDrawCall) -> DisperseResult<()> {
        self.live(call.args_buffer)?;
        self.commands.push(GpuCommand::DrawIndirect(*call));
        Ok(())
    }
}
