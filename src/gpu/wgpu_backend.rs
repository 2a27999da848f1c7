//! wgpu implementation of the GPU seam
//!
//! Compute dispatches and indirect draws are recorded into one command encoder
//! per frame: every dispatch lands ahead of the render pass, so the material
//! always reads matrices the kernel wrote this frame. Dispatches issued outside
//! a frame are submitted on their own encoder.

use super::backend::{
    BufferDesc, BufferHandle, BufferKind, GpuBackend, IndirectDrawCall, KernelHandle,
    MaterialHandle, MeshHandle,
};
use super::kernel_source::{compute_entry_points, has_compute_entry_point};
use crate::constants::{bindings, kernel};
use crate::error::{DisperseError, DisperseResult, ErrorContext, OptionExt};
use crate::instance::InstanceState;
use crate::math::{bounds_in_frustum, extract_frustum_planes};
use crate::renderer::mesh::{mesh_vertex_layout, MeshData};
use glam::Vec4;
use std::collections::HashMap;
use std::sync::Arc;
use wgpu::util::DeviceExt;

const TRANSFORM_SHADER: &str = include_str!("../shaders/disperse_transform.wgsl");
const MATERIAL_SHADER: &str = include_str!("../shaders/disperse_instanced.wgsl");

/// Depth format the instanced material renders with
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

struct GpuBuffer {
    desc: BufferDesc,
    buffer: wgpu::Buffer,
}

/// One resolved kernel: shared pipeline, private bindings
struct KernelSlot {
    name: String,
    pipeline: Arc<wgpu::ComputePipeline>,
    global_state: Option<BufferHandle>,
    mesh_states: Option<BufferHandle>,
    param1: wgpu::Buffer,
    bind_group: Option<wgpu::BindGroup>,
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

struct GpuMaterial {
    pipeline: wgpu::RenderPipeline,
    active_index_property: String,
    params: wgpu::Buffer,
    mesh_states: Option<BufferHandle>,
    bind_group: Option<wgpu::BindGroup>,
}

struct FrameRecording {
    encoder: wgpu::CommandEncoder,
    draws: Vec<IndirectDrawCall>,
}

/// Counters for the last submitted frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub dispatches: u32,
    pub draws: u32,
    /// Draws rejected by the CPU frustum test
    pub culled: u32,
}

pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,

    compute_source: String,
    compute_module: wgpu::ShaderModule,
    compute_bind_layout: wgpu::BindGroupLayout,
    compute_pipeline_layout: wgpu::PipelineLayout,

    material_module: wgpu::ShaderModule,
    material_bind_layout: wgpu::BindGroupLayout,
    material_pipeline_layout: wgpu::PipelineLayout,

    pipelines: HashMap<String, Arc<wgpu::ComputePipeline>>,
    /// Released slots are None and get reused by the next lookup
    kernels: Vec<Option<KernelSlot>>,
    buffers: HashMap<BufferHandle, GpuBuffer>,
    next_buffer: u32,
    meshes: Vec<GpuMesh>,
    materials: Vec<GpuMaterial>,

    frame: Option<FrameRecording>,
    stats: FrameStats,
}

/// Request an adapter and device without a surface
pub fn request_headless_device() -> DisperseResult<(Arc<wgpu::Device>, Arc<wgpu::Queue>)> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());

    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::default(),
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .ok_or_disperse(|| DisperseError::gpu("request_adapter", "no compatible adapter found"))?;

    log::info!("[WgpuBackend] Using adapter: {:?}", adapter.get_info().name);

    let (device, queue) = pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("Disperse Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
        },
        None,
    ))
    .gpu_context("request_device")?;

    Ok((Arc::new(device), Arc::new(queue)))
}

fn storage_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    read_only: bool,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl WgpuBackend {
    /// Backend running the bundled transform kernel
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self::with_compute_source(device, queue, TRANSFORM_SHADER)
    }

    /// Backend running a custom WGSL kernel that follows the same binding layout
    pub fn with_compute_source(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        compute_source: impl Into<String>,
    ) -> Self {
        let compute_source = compute_source.into();
        log::debug!(
            "[WgpuBackend] Loading compute source ({} bytes, kernels: {:?})",
            compute_source.len(),
            compute_entry_points(&compute_source)
        );

        let compute_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Disperse Transform Shader"),
            source: wgpu::ShaderSource::Wgsl(compute_source.as_str().into()),
        });

        let compute_bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Disperse Kernel Bind Group Layout"),
            entries: &[
                storage_entry(bindings::GLOBAL_STATE, wgpu::ShaderStages::COMPUTE, true),
                storage_entry(bindings::MESH_STATES, wgpu::ShaderStages::COMPUTE, false),
                uniform_entry(bindings::PARAM1, wgpu::ShaderStages::COMPUTE),
            ],
        });

        let compute_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Disperse Kernel Pipeline Layout"),
            bind_group_layouts: &[&compute_bind_layout],
            push_constant_ranges: &[],
        });

        let material_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Disperse Instanced Shader"),
            source: wgpu::ShaderSource::Wgsl(MATERIAL_SHADER.into()),
        });

        let material_bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Disperse Material Bind Group Layout"),
            entries: &[
                storage_entry(bindings::MATERIAL_MESH_STATES, wgpu::ShaderStages::VERTEX, true),
                uniform_entry(bindings::MATERIAL_ACTIVE_INDEX, wgpu::ShaderStages::VERTEX),
            ],
        });

        let material_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Disperse Material Pipeline Layout"),
            bind_group_layouts: &[&material_bind_layout],
            push_constant_ranges: &[],
        });

        Self {
            device,
            queue,
            compute_source,
            compute_module,
            compute_bind_layout,
            compute_pipeline_layout,
            material_module,
            material_bind_layout,
            material_pipeline_layout,
            pipelines: HashMap::new(),
            kernels: Vec::new(),
            buffers: HashMap::new(),
            next_buffer: 0,
            meshes: Vec::new(),
            materials: Vec::new(),
            frame: None,
            stats: FrameStats::default(),
        }
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    /// Kernel lookups not yet released
    pub fn live_kernel_count(&self) -> usize {
        self.kernels.iter().filter(|slot| slot.is_some()).count()
    }

    /// Upload vertex and index data. Submesh 0 is the whole index buffer.
    pub fn upload_mesh(&mut self, mesh: &MeshData) -> DisperseResult<MeshHandle> {
        if mesh.is_empty() || mesh.vertices.is_empty() {
            return Err(DisperseError::gpu("upload_mesh", "mesh has no geometry"));
        }

        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Disperse Mesh Vertices"),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Disperse Mesh Indices"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let handle = MeshHandle(self.meshes.len() as u32);
        self.meshes.push(GpuMesh {
            vertex_buffer,
            index_buffer,
            index_count: mesh.index_count(),
        });

        log::debug!(
            "[WgpuBackend] Uploaded mesh {:?}: {} vertices, {} indices",
            handle,
            mesh.vertices.len(),
            mesh.index_count()
        );
        Ok(handle)
    }

    /// Create the instanced material for a color target.
    ///
    /// `active_index_property` is the name the highlight index is set through.
    pub fn create_material(
        &mut self,
        color_format: wgpu::TextureFormat,
        active_index_property: &str,
    ) -> MaterialHandle {
        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Disperse Instanced Pipeline"),
            layout: Some(&self.material_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.material_module,
                entry_point: "vs_main",
                buffers: &[mesh_vertex_layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.material_module,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        // No instance highlighted until the first set_material_int
        let params = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Disperse Material Params"),
            contents: bytemuck::cast_slice(&[-1i32, 0, 0, 0]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let handle = MaterialHandle(self.materials.len() as u32);
        self.materials.push(GpuMaterial {
            pipeline,
            active_index_property: active_index_property.to_string(),
            params,
            mesh_states: None,
            bind_group: None,
        });

        log::info!(
            "[WgpuBackend] Created material {:?} ({:?}, index property '{}')",
            handle,
            color_format,
            active_index_property
        );
        handle
    }

    /// Open the frame encoder. Dispatches and draws until `end_frame` land in it.
    pub fn begin_frame(&mut self) {
        if self.frame.is_some() {
            log::warn!("[WgpuBackend] begin_frame called twice; discarding the unfinished frame");
        }

        let encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Disperse Frame Encoder"),
        });
        self.frame = Some(FrameRecording {
            encoder,
            draws: Vec::new(),
        });
        self.stats = FrameStats::default();
    }

    /// Encode the render pass for every queued draw and submit the frame
    pub fn end_frame(
        &mut self,
        color: &wgpu::TextureView,
        depth: &wgpu::TextureView,
        clear: wgpu::Color,
    ) -> DisperseResult<FrameStats> {
        let FrameRecording { mut encoder, draws } = self
            .frame
            .take()
            .ok_or_disperse(|| DisperseError::gpu("end_frame", "no frame in progress"))?;

        for call in &draws {
            self.prepare_material_bind_group(call.material)?;
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Disperse Instanced Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for call in &draws {
                let mesh = self
                    .meshes
                    .get(call.mesh.0 as usize)
                    .ok_or_disperse(|| DisperseError::MeshNotFound { mesh: call.mesh })?;
                let material = self.material(call.material, "end_frame")?;
                let bind_group = material.bind_group.as_ref().ok_or_disperse(|| {
                    DisperseError::UnknownBinding {
                        name: kernel::MESH_STATES_NAME.to_string(),
                    }
                })?;
                let args = self.live(call.args_buffer)?;

                pass.set_pipeline(&material.pipeline);
                pass.set_bind_group(0, bind_group, &[]);
                pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed_indirect(&args.buffer, call.args_offset);
            }
        }

        self.queue.submit(Some(encoder.finish()));
        self.stats.draws = draws.len() as u32;

        log::trace!(
            "[WgpuBackend] Submitted frame: {} dispatches, {} draws, {} culled",
            self.stats.dispatches,
            self.stats.draws,
            self.stats.culled
        );
        Ok(self.stats)
    }

    fn live(&self, buffer: BufferHandle) -> DisperseResult<&GpuBuffer> {
        self.buffers
            .get(&buffer)
            .ok_or(DisperseError::UnknownBuffer { buffer })
    }

    fn kernel_slot(&mut self, kernel: KernelHandle) -> DisperseResult<&mut KernelSlot> {
        self.kernels
            .get_mut(kernel.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(DisperseError::UnknownKernel { kernel })
    }

    fn material(&self, material: MaterialHandle, operation: &str) -> DisperseResult<&GpuMaterial> {
        self.materials
            .get(material.0 as usize)
            .ok_or_disperse(|| DisperseError::gpu(operation, format!("unknown material {:?}", material)))
    }

    fn material_mut(&mut self, material: MaterialHandle, operation: &str) -> DisperseResult<&mut GpuMaterial> {
        self.materials
            .get_mut(material.0 as usize)
            .ok_or_disperse(|| DisperseError::gpu(operation, format!("unknown material {:?}", material)))
    }

    fn prepare_kernel_bind_group(&mut self, kernel: KernelHandle) -> DisperseResult<()> {
        let slot = self
            .kernels
            .get_mut(kernel.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(DisperseError::UnknownKernel { kernel })?;
        if slot.bind_group.is_some() {
            return Ok(());
        }

        let missing = |name: &str| DisperseError::UnknownBinding {
            name: name.to_string(),
        };
        let global_state = slot
            .global_state
            .ok_or_else(|| missing(kernel::GLOBAL_STATE_NAME))?;
        let mesh_states = slot
            .mesh_states
            .ok_or_else(|| missing(kernel::MESH_STATES_NAME))?;

        let global_state = &self
            .buffers
            .get(&global_state)
            .ok_or(DisperseError::UnknownBuffer { buffer: global_state })?
            .buffer;
        let mesh_states = &self
            .buffers
            .get(&mesh_states)
            .ok_or(DisperseError::UnknownBuffer { buffer: mesh_states })?
            .buffer;

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Disperse Kernel Bind Group"),
            layout: &self.compute_bind_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: bindings::GLOBAL_STATE,
                    resource: global_state.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: bindings::MESH_STATES,
                    resource: mesh_states.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: bindings::PARAM1,
                    resource: slot.param1.as_entire_binding(),
                },
            ],
        });
        slot.bind_group = Some(bind_group);
        Ok(())
    }

    fn prepare_material_bind_group(&mut self, material: MaterialHandle) -> DisperseResult<()> {
        let slot = self
            .materials
            .get_mut(material.0 as usize)
            .ok_or_disperse(|| {
                DisperseError::gpu("end_frame", format!("unknown material {:?}", material))
            })?;
        if slot.bind_group.is_some() {
            return Ok(());
        }

        let mesh_states = slot
            .mesh_states
            .ok_or_else(|| DisperseError::UnknownBinding {
                name: kernel::MESH_STATES_NAME.to_string(),
            })?;
        let mesh_states = &self
            .buffers
            .get(&mesh_states)
            .ok_or(DisperseError::UnknownBuffer { buffer: mesh_states })?
            .buffer;

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Disperse Material Bind Group"),
            layout: &self.material_bind_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: bindings::MATERIAL_MESH_STATES,
                    resource: mesh_states.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: bindings::MATERIAL_ACTIVE_INDEX,
                    resource: slot.params.as_entire_binding(),
                },
            ],
        });
        slot.bind_group = Some(bind_group);
        Ok(())
    }
}

impl GpuBackend for WgpuBackend {
    /// Every lookup gets its own binding set; the pipeline is shared per name.
    fn find_kernel(&mut self, name: &str) -> Option<KernelHandle> {
        if !has_compute_entry_point(&self.compute_source, name) {
            log::warn!(
                "[WgpuBackend] Kernel '{}' not found. Available kernels: {}",
                name,
                compute_entry_points(&self.compute_source).join(", ")
            );
            return None;
        }

        let pipeline = match self.pipelines.get(name) {
            Some(pipeline) => pipeline.clone(),
            None => {
                let pipeline = Arc::new(self.device.create_compute_pipeline(
                    &wgpu::ComputePipelineDescriptor {
                        label: Some(name),
                        layout: Some(&self.compute_pipeline_layout),
                        module: &self.compute_module,
                        entry_point: name,
                    },
                ));
                log::info!("[WgpuBackend] Built compute pipeline '{}'", name);
                self.pipelines.insert(name.to_string(), pipeline.clone());
                pipeline
            }
        };

        let param1 = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Disperse Kernel Param1"),
            size: std::mem::size_of::<[f32; 4]>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let slot = KernelSlot {
            name: name.to_string(),
            pipeline,
            global_state: None,
            mesh_states: None,
            param1,
            bind_group: None,
        };
        let handle = match self.kernels.iter().position(Option::is_none) {
            Some(index) => {
                self.kernels[index] = Some(slot);
                KernelHandle(index as u32)
            }
            None => {
                self.kernels.push(Some(slot));
                KernelHandle(self.kernels.len() as u32 - 1)
            }
        };
        log::debug!("[WgpuBackend] Resolved kernel '{}' as {:?}", name, handle);
        Some(handle)
    }

    fn release_kernel(&mut self, kernel: KernelHandle) -> DisperseResult<()> {
        let slot = self
            .kernels
            .get_mut(kernel.0 as usize)
            .and_then(Option::take)
            .ok_or(DisperseError::UnknownKernel { kernel })?;
        slot.param1.destroy();

        log::debug!("[WgpuBackend] Released kernel {:?} '{}'", kernel, slot.name);
        Ok(())
    }

    /// Bounded by the storage binding size and the wrapped dispatch grid
    fn max_instance_count(&self) -> u32 {
        let limits = self.device.limits();
        let stride = std::mem::size_of::<InstanceState>() as u64;
        let by_storage =
            (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size) / stride;

        // Rows only wrap when the device accepts a full row
        let per_dimension = limits.max_compute_workgroups_per_dimension as u64;
        let groups = if per_dimension >= kernel::DISPATCH_ROW_GROUPS as u64 {
            kernel::DISPATCH_ROW_GROUPS as u64 * per_dimension
        } else {
            per_dimension
        };
        let by_dispatch = groups * kernel::GROUP_SIZE[0] as u64;

        by_storage.min(by_dispatch).min(u32::MAX as u64) as u32
    }

    fn mesh_index_count(&self, mesh: MeshHandle) -> Option<u32> {
        self.meshes.get(mesh.0 as usize).map(|m| m.index_count)
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> DisperseResult<BufferHandle> {
        let size = desc.byte_size();
        if size == 0 {
            return Err(DisperseError::gpu(
                format!("create_buffer({})", desc.label),
                "zero-sized buffer",
            ));
        }

        let usage = match desc.kind {
            BufferKind::Structured => wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            BufferKind::IndirectArguments => {
                wgpu::BufferUsages::INDIRECT
                    | wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
            }
        };

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label),
            size,
            usage,
            mapped_at_creation: false,
        });

        let handle = BufferHandle(self.next_buffer);
        self.next_buffer += 1;
        self.buffers.insert(handle, GpuBuffer { desc: *desc, buffer });

        log::debug!(
            "[WgpuBackend] Created buffer {:?} '{}' ({} x {} bytes)",
            handle,
            desc.label,
            desc.count,
            desc.stride
        );
        Ok(handle)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]) -> DisperseResult<()> {
        let target = self.live(buffer)?;
        let expected = target.desc.byte_size();
        if data.len() as u64 != expected {
            return Err(DisperseError::BufferSizeMismatch {
                expected,
                actual: data.len() as u64,
            });
        }

        self.queue.write_buffer(&target.buffer, 0, data);
        Ok(())
    }

    fn release_buffer(&mut self, buffer: BufferHandle) -> DisperseResult<()> {
        let released = self
            .buffers
            .remove(&buffer)
            .ok_or(DisperseError::UnknownBuffer { buffer })?;
        released.buffer.destroy();

        // Bind groups holding the buffer are stale now
        for slot in self.kernels.iter_mut().flatten() {
            if slot.global_state == Some(buffer) || slot.mesh_states == Some(buffer) {
                slot.global_state = slot.global_state.filter(|b| *b != buffer);
                slot.mesh_states = slot.mesh_states.filter(|b| *b != buffer);
                slot.bind_group = None;
            }
        }
        for slot in &mut self.materials {
            if slot.mesh_states == Some(buffer) {
                slot.mesh_states = None;
                slot.bind_group = None;
            }
        }

        log::debug!(
            "[WgpuBackend] Released buffer {:?} '{}'",
            buffer,
            released.desc.label
        );
        Ok(())
    }

    fn set_kernel_buffer(
        &mut self,
        kernel: KernelHandle,
        name: &str,
        buffer: BufferHandle,
    ) -> DisperseResult<()> {
        self.live(buffer)?;
        let slot = self.kernel_slot(kernel)?;
        match name {
            kernel::GLOBAL_STATE_NAME => slot.global_state = Some(buffer),
            kernel::MESH_STATES_NAME => slot.mesh_states = Some(buffer),
            _ => {
                return Err(DisperseError::UnknownBinding {
                    name: name.to_string(),
                })
            }
        }
        slot.bind_group = None;
        Ok(())
    }

    fn set_kernel_vector(&mut self, kernel: KernelHandle, name: &str, value: Vec4) -> DisperseResult<()> {
        if name != kernel::PARAM1_NAME {
            return Err(DisperseError::UnknownBinding {
                name: name.to_string(),
            });
        }

        let queue = self.queue.clone();
        let slot = self.kernel_slot(kernel)?;
        queue.write_buffer(&slot.param1, 0, bytemuck::cast_slice(&value.to_array()));
        Ok(())
    }

    fn set_material_buffer(
        &mut self,
        material: MaterialHandle,
        name: &str,
        buffer: BufferHandle,
    ) -> DisperseResult<()> {
        if name != kernel::MESH_STATES_NAME {
            return Err(DisperseError::UnknownBinding {
                name: name.to_string(),
            });
        }

        self.live(buffer)?;
        let slot = self.material_mut(material, "set_material_buffer")?;
        slot.mesh_states = Some(buffer);
        slot.bind_group = None;
        Ok(())
    }

    fn set_material_int(&mut self, material: MaterialHandle, name: &str, value: i32) -> DisperseResult<()> {
        let slot = self.material(material, "set_material_int")?;
        if name != slot.active_index_property {
            return Err(DisperseError::UnknownBinding {
                name: name.to_string(),
            });
        }

        self.queue.write_buffer(&slot.params, 0, bytemuck::cast_slice(&[value, 0, 0, 0]));
        Ok(())
    }

    fn dispatch(&mut self, kernel: KernelHandle, groups: [u32; 3]) -> DisperseResult<()> {
        self.prepare_kernel_bind_group(kernel)?;

        let slot = self
            .kernels
            .get(kernel.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(DisperseError::UnknownKernel { kernel })?;
        let bind_group = slot.bind_group.as_ref().ok_or_disperse(|| {
            DisperseError::gpu("dispatch", format!("kernel '{}' has no bind group", slot.name))
        })?;

        let record = |encoder: &mut wgpu::CommandEncoder| {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Disperse Transform Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&slot.pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(groups[0], groups[1], groups[2]);
        };

        match self.frame.as_mut() {
            Some(frame) => record(&mut frame.encoder),
            None => {
                let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Disperse Dispatch Encoder"),
                });
                record(&mut encoder);
                self.queue.submit(Some(encoder.finish()));
            }
        }

        self.stats.dispatches += 1;
        log::trace!(
            "[WgpuBackend] Dispatched '{}' with {:?} groups",
            slot.name,
            groups
        );
        Ok(())
    }

    fn draw_mesh_instanced_indirect(&mut self, call: &IndirectDrawCall) -> DisperseResult<()> {
        let args = self.live(call.args_buffer)?;
        if args.desc.kind != BufferKind::IndirectArguments {
            return Err(DisperseError::gpu(
                "draw_mesh_instanced_indirect",
                format!("buffer '{}' is not an argument buffer", args.desc.label),
            ));
        }
        if call.submesh != 0 {
            return Err(DisperseError::gpu(
                "draw_mesh_instanced_indirect",
                format!("submesh {} out of range", call.submesh),
            ));
        }
        if self.meshes.get(call.mesh.0 as usize).is_none() {
            return Err(DisperseError::MeshNotFound { mesh: call.mesh });
        }
        self.material(call.material, "draw_mesh_instanced_indirect")?;

        let planes = extract_frustum_planes(&call.view_projection);
        if !bounds_in_frustum(&call.bounds, &planes) {
            self.stats.culled += 1;
            log::trace!(
                "[WgpuBackend] Culled draw of {:?}: bounds at {:?} outside the frustum",
                call.mesh,
                call.bounds.center
            );
            return Ok(());
        }

        let frame = self.frame.as_mut().ok_or_disperse(|| {
            DisperseError::gpu("draw_mesh_instanced_indirect", "no frame in progress")
        })?;
        frame.draws.push(*call);
        Ok(())
    }
}
