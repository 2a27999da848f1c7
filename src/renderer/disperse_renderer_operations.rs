//! Disperse Renderer Operations - Pure DOP Functions
//!
//! Lifecycle and per-frame functions for one instance group. Every GPU call
//! goes through the `GpuBackend` passed in; the renderer data owns handles only.

use super::disperse_renderer_data::{
    ActiveResources, DisperseRenderer, FrameReport, LifecycleState, RenderView,
};
use crate::camera::{
    build_gpu_projection_matrix, build_view_matrix, build_view_projection_matrix,
    calculate_forward_vector, CameraData,
};
use crate::config::DisperseConfig;
use crate::constants::kernel;
use crate::error::{DisperseError, DisperseResult, OptionExt};
use crate::gpu::{
    BufferDesc, BufferHandle, GpuBackend, IndirectDrawCall, KernelHandle, MaterialHandle,
    MeshHandle, ShadowCasting,
};
use crate::instance::{
    fill_instance_states, frame_hook_for, limit_bounds, placement_name, DrawArguments, FrameHook,
    GlobalState, InstanceState,
};
use crate::math::{
    bounds_recentered, inverse_transform_direction, inverse_transform_point,
    local_to_world_matrix, Transform,
};
use crate::random::rng_from_seed;
use glam::Vec4;
use rand::Rng;

// ============================================================================
// CREATION
// ============================================================================

/// Create an inactive group. Nothing is allocated until `start_rendering`.
pub fn create_disperse_renderer(
    config: DisperseConfig,
    mesh: MeshHandle,
    material: MaterialHandle,
) -> DisperseRenderer {
    DisperseRenderer {
        config,
        mesh,
        material,
        state: LifecycleState::Uninitialized,
    }
}

// ============================================================================
// LIFECYCLE
// ============================================================================

/// Activate the group with an RNG seeded from `config.seed` (entropy when unset)
pub fn start_rendering<B: GpuBackend>(
    renderer: &mut DisperseRenderer,
    backend: &mut B,
    time: f32,
) -> DisperseResult<()> {
    let mut rng = rng_from_seed(renderer.config.seed);
    start_rendering_with_rng(renderer, backend, &mut rng, time)
}

/// Activate the group: validate, fill states, allocate, upload and bind.
///
/// Validation runs before any allocation. If a backend call fails partway,
/// every buffer allocated so far is released before the error is returned.
pub fn start_rendering_with_rng<B: GpuBackend, R: Rng + ?Sized>(
    renderer: &mut DisperseRenderer,
    backend: &mut B,
    rng: &mut R,
    time: f32,
) -> DisperseResult<()> {
    if matches!(renderer.state, LifecycleState::Active(_)) {
        return Err(DisperseError::AlreadyActive);
    }

    let config = &renderer.config;
    config.validate()?;

    let limit = backend.max_instance_count();
    if config.count > limit {
        return Err(DisperseError::InstanceLimitExceeded {
            count: config.count,
            limit,
        });
    }

    let index_count = backend
        .mesh_index_count(renderer.mesh)
        .ok_or_disperse(|| DisperseError::MeshNotFound {
            mesh: renderer.mesh,
        })?;
    if index_count == 0 {
        return Err(DisperseError::EmptyMesh {
            mesh: renderer.mesh,
        });
    }

    let kernel = backend
        .find_kernel(&config.kernel_name)
        .ok_or_disperse(|| DisperseError::KernelNotFound {
            name: config.kernel_name.clone(),
        })?;

    let instance_states = fill_instance_states(&config.placement, config.count, rng);
    let global_state = GlobalState::default();
    let draw_args = DrawArguments::new(index_count, config.count);

    let mut allocated = Vec::with_capacity(3);
    let buffers = allocate_and_bind(
        backend,
        config,
        kernel,
        renderer.material,
        &instance_states,
        &global_state,
        &draw_args,
        &mut allocated,
    );

    let [global_buffer, instance_buffer, args_buffer] = match buffers {
        Ok(buffers) => buffers,
        Err(e) => {
            log::error!(
                "[DisperseRenderer] Activation failed: {}. Releasing {} partially allocated buffers",
                e,
                allocated.len()
            );
            // Release failures are logged; the activation error wins
            let _ = release_resources(backend, kernel, &allocated);
            return Err(e);
        }
    };

    let resources = ActiveResources {
        kernel,
        global_buffer,
        instance_buffer,
        args_buffer,
        instance_states,
        global_state,
        draw_args,
        limit_bounds: limit_bounds(&config.placement, config.bounds),
        last_mvp: None,
        hook: frame_hook_for(&config.placement, time),
    };

    log::info!(
        "[DisperseRenderer] Started {} group: {} instances, kernel '{}', {} indices per instance",
        placement_name(&config.placement),
        config.count,
        config.kernel_name,
        index_count
    );

    renderer.state = LifecycleState::Active(resources);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn allocate_and_bind<B: GpuBackend>(
    backend: &mut B,
    config: &DisperseConfig,
    kernel: KernelHandle,
    material: MaterialHandle,
    instance_states: &[InstanceState],
    global_state: &GlobalState,
    draw_args: &DrawArguments,
    allocated: &mut Vec<BufferHandle>,
) -> DisperseResult<[BufferHandle; 3]> {
    let global_buffer = backend.create_buffer(&BufferDesc::structured(
        "Disperse Global State",
        1,
        std::mem::size_of::<GlobalState>(),
    ))?;
    allocated.push(global_buffer);
    backend.write_buffer(global_buffer, bytemuck::bytes_of(global_state))?;

    let instance_buffer = backend.create_buffer(&BufferDesc::structured(
        "Disperse Mesh States",
        instance_states.len() as u32,
        std::mem::size_of::<InstanceState>(),
    ))?;
    allocated.push(instance_buffer);
    backend.write_buffer(instance_buffer, bytemuck::cast_slice(instance_states))?;

    let args_buffer = backend.create_buffer(&BufferDesc::indirect(
        "Disperse Draw Arguments",
        std::mem::size_of::<DrawArguments>(),
    ))?;
    allocated.push(args_buffer);
    backend.write_buffer(args_buffer, bytemuck::bytes_of(draw_args))?;

    backend.set_kernel_buffer(kernel, kernel::GLOBAL_STATE_NAME, global_buffer)?;
    backend.set_kernel_buffer(kernel, kernel::MESH_STATES_NAME, instance_buffer)?;
    backend.set_kernel_vector(
        kernel,
        kernel::PARAM1_NAME,
        Vec4::new(config.min_display_distance, config.max_display_distance, 0.0, 0.0),
    )?;
    backend.set_material_buffer(material, kernel::MESH_STATES_NAME, instance_buffer)?;

    Ok([global_buffer, instance_buffer, args_buffer])
}

/// Release every buffer, then the kernel lookup, carrying on past failures.
/// Returns the first error.
fn release_resources<B: GpuBackend>(
    backend: &mut B,
    kernel: KernelHandle,
    buffers: &[BufferHandle],
) -> DisperseResult<()> {
    let mut first_error = None;
    for &buffer in buffers {
        if let Err(e) = backend.release_buffer(buffer) {
            log::warn!("[DisperseRenderer] Failed to release {:?}: {}", buffer, e);
            if first_error.is_none() {
                first_error = Some(e);
            }
        }
    }

    if let Err(e) = backend.release_kernel(kernel) {
        log::warn!("[DisperseRenderer] Failed to release {:?}: {}", kernel, e);
        if first_error.is_none() {
            first_error = Some(e);
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Release the group's buffers and kernel lookup. A group that is not active is left untouched.
pub fn stop_rendering<B: GpuBackend>(
    renderer: &mut DisperseRenderer,
    backend: &mut B,
) -> DisperseResult<()> {
    match std::mem::replace(&mut renderer.state, LifecycleState::Released) {
        LifecycleState::Active(resources) => {
            let result = release_resources(
                backend,
                resources.kernel,
                &[
                    resources.global_buffer,
                    resources.instance_buffer,
                    resources.args_buffer,
                ],
            );
            log::info!(
                "[DisperseRenderer] Stopped {} group ({} instances released)",
                placement_name(&renderer.config.placement),
                resources.instance_states.len()
            );
            result
        }
        previous => {
            log::debug!("[DisperseRenderer] stop_rendering on inactive group ignored");
            renderer.state = previous;
            Ok(())
        }
    }
}

/// Full reallocation: stop, then start with the current config
pub fn restart_rendering<B: GpuBackend>(
    renderer: &mut DisperseRenderer,
    backend: &mut B,
    time: f32,
) -> DisperseResult<()> {
    stop_rendering(renderer, backend)?;
    start_rendering(renderer, backend, time)
}

// ============================================================================
// PER FRAME
// ============================================================================

fn active_resources_mut(state: &mut LifecycleState) -> DisperseResult<&mut ActiveResources> {
    match state {
        LifecycleState::Active(resources) => Ok(resources),
        _ => Err(DisperseError::NotActive),
    }
}

/// Workgroup grid covering `count` instances, wrapped into rows
pub fn dispatch_groups(count: u32) -> [u32; 3] {
    let groups = count.div_ceil(kernel::GROUP_SIZE[0]);
    [
        groups.min(kernel::DISPATCH_ROW_GROUPS),
        groups.div_ceil(kernel::DISPATCH_ROW_GROUPS),
        1,
    ]
}

/// Recenter the bounds and dispatch the kernel when the MVP changed.
///
/// Returns true when the kernel was dispatched.
pub fn update<B: GpuBackend>(
    renderer: &mut DisperseRenderer,
    backend: &mut B,
    camera: &CameraData,
    transform: &Transform,
) -> DisperseResult<bool> {
    let config = &renderer.config;
    let resources = active_resources_mut(&mut renderer.state)?;

    resources.limit_bounds = bounds_recentered(&resources.limit_bounds, transform.position);

    let model = local_to_world_matrix(transform);
    let view = build_view_matrix(camera);
    let projection = build_gpu_projection_matrix(camera);
    let mvp = projection * view * model;

    if !config.always_dispatch && resources.last_mvp == Some(mvp) {
        log::trace!("[DisperseRenderer] MVP unchanged, skipping dispatch");
        return Ok(false);
    }
    resources.last_mvp = Some(mvp);

    let forward = calculate_forward_vector(camera.yaw_radians, camera.pitch_radians);
    resources.global_state = GlobalState::new(
        model,
        mvp,
        inverse_transform_point(transform, camera.position),
        inverse_transform_direction(transform, forward),
    );
    backend.write_buffer(
        resources.global_buffer,
        bytemuck::bytes_of(&resources.global_state),
    )?;

    backend.dispatch(resources.kernel, dispatch_groups(config.count))?;

    log::debug!(
        "[DisperseRenderer] Dispatched '{}' for {} instances",
        config.kernel_name,
        config.count
    );
    Ok(true)
}

/// Run the frame hook and issue the indirect draw.
///
/// Returns the highlighted index for groups with a highlight cycle.
pub fn draw<B: GpuBackend>(
    renderer: &mut DisperseRenderer,
    backend: &mut B,
    camera: &CameraData,
    time: f32,
) -> DisperseResult<Option<u32>> {
    let count = renderer.config.count;
    let material = renderer.material;
    let resources = active_resources_mut(&mut renderer.state)?;

    let active_index = match &mut resources.hook {
        FrameHook::None => None,
        FrameHook::Highlight(cycle) => {
            if let Some(index) = cycle.advance(time, count) {
                backend.set_material_int(material, &cycle.property, index as i32)?;
                log::debug!("[DisperseRenderer] Highlight moved to instance {}", index);
            }
            cycle.active_index
        }
    };

    let call = IndirectDrawCall {
        mesh: renderer.mesh,
        submesh: 0,
        material,
        bounds: resources.limit_bounds,
        args_buffer: resources.args_buffer,
        args_offset: 0,
        shadow_casting: ShadowCasting::Off,
        receive_shadows: false,
        view_projection: build_view_projection_matrix(camera),
    };
    backend.draw_mesh_instanced_indirect(&call)?;

    Ok(active_index)
}

/// Update and draw for one view, skipping views that target somewhere else
pub fn render_frame<B: GpuBackend>(
    renderer: &mut DisperseRenderer,
    backend: &mut B,
    view: &RenderView,
    transform: &Transform,
    time: f32,
) -> DisperseResult<FrameReport> {
    if view.target != renderer.config.render_in {
        log::trace!(
            "[DisperseRenderer] Skipping {:?} view, group renders in {:?}",
            view.target,
            renderer.config.render_in
        );
        return Ok(FrameReport::default());
    }

    let dispatched = update(renderer, backend, &view.camera, transform)?;
    let active_index = draw(renderer, backend, &view.camera, time)?;

    Ok(FrameReport {
        rendered: true,
        dispatched,
        active_index,
    })
}

// ============================================================================
// QUERIES
// ============================================================================

pub fn is_active(renderer: &DisperseRenderer) -> bool {
    matches!(renderer.state, LifecycleState::Active(_))
}

pub fn active_resources(renderer: &DisperseRenderer) -> Option<&ActiveResources> {
    match &renderer.state {
        LifecycleState::Active(resources) => Some(resources),
        _ => None,
    }
}

/// CPU copy of the instance states of an active group
pub fn instance_states(renderer: &DisperseRenderer) -> Option<&[InstanceState]> {
    active_resources(renderer).map(|r| r.instance_states.as_slice())
}
