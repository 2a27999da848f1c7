//! Lifecycle and per-frame tests driven by the recording backend

use super::*;
use crate::camera::{build_gpu_projection_matrix, build_view_matrix, init_camera, CameraData};
use crate::config::{DisperseConfig, RenderTarget};
use crate::error::DisperseError;
use crate::gpu::{GpuCommand, MaterialHandle, MeshHandle, RecordingBackend, ShadowCasting};
use crate::instance::{
    BoundsMode, DrawArguments, GlobalState, InstanceState, Placement, RingPlacement,
    ScatterPlacement,
};
use crate::math::{local_to_world_matrix, unlimited_bounds, Transform};
use glam::{Vec3, Vec4};
use rand::rngs::StdRng;
use rand::SeedableRng;

const MESH: MeshHandle = MeshHandle(0);
const MATERIAL: MaterialHandle = MaterialHandle(0);
const INDEX_COUNT: u32 = 36;

fn sphere_config(count: u32) -> DisperseConfig {
    DisperseConfig {
        count,
        min_display_distance: 1.0,
        max_display_distance: 250.0,
        seed: Some(42),
        placement: Placement::Sphere(ScatterPlacement {
            radius: 20.0,
            min_scale: Vec3::splat(0.5),
            max_scale: Vec3::splat(1.5),
            scale_max_offset: 0.2,
        }),
        ..Default::default()
    }
}

fn ring_config(count: u32, interval: f32) -> DisperseConfig {
    DisperseConfig {
        count,
        placement: Placement::Ring(RingPlacement {
            radius: 5.0,
            scale: Vec3::ONE,
            update_interval: interval,
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn setup(config: DisperseConfig) -> (DisperseRenderer, RecordingBackend) {
    let backend = RecordingBackend::with_kernel_and_mesh("CSMain", MESH, INDEX_COUNT);
    let renderer = create_disperse_renderer(config, MESH, MATERIAL);
    (renderer, backend)
}

fn camera() -> CameraData {
    init_camera(Vec3::new(0.0, 0.0, 60.0), -std::f32::consts::FRAC_PI_2, 0.0)
}

fn game_view(camera: CameraData) -> RenderView {
    RenderView {
        camera,
        target: RenderTarget::Game,
    }
}

fn created_buffers(backend: &RecordingBackend) -> usize {
    backend
        .commands()
        .iter()
        .filter(|c| matches!(c, GpuCommand::CreateBuffer { .. }))
        .count()
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[test]
fn test_start_allocates_sized_buffers() {
    let (mut renderer, mut backend) = setup(sphere_config(300));
    start_rendering(&mut renderer, &mut backend, 0.0).unwrap();

    assert!(is_active(&renderer));
    assert_eq!(backend.live_buffer_count(), 3);

    let resources = active_resources(&renderer).unwrap();
    assert_eq!(resources.instance_states.len(), 300);

    let global = backend.buffer(resources.global_buffer).unwrap();
    assert_eq!(global.desc.count, 1);
    assert_eq!(global.desc.stride as usize, std::mem::size_of::<GlobalState>());

    let instances = backend.buffer(resources.instance_buffer).unwrap();
    assert_eq!(instances.desc.count, 300);
    assert_eq!(instances.desc.stride as usize, std::mem::size_of::<InstanceState>());
    assert_eq!(
        instances.data.as_slice(),
        bytemuck::cast_slice::<InstanceState, u8>(&resources.instance_states)
    );

    let args = backend.buffer(resources.args_buffer).unwrap();
    let uploaded: DrawArguments = bytemuck::pod_read_unaligned(&args.data);
    assert_eq!(uploaded, DrawArguments::new(INDEX_COUNT, 300));

    stop_rendering(&mut renderer, &mut backend).unwrap();
}

#[test]
fn test_start_binds_kernel_and_material() {
    let (mut renderer, mut backend) = setup(sphere_config(10));
    start_rendering(&mut renderer, &mut backend, 0.0).unwrap();
    let resources = active_resources(&renderer).unwrap();
    let kernel = resources.kernel;

    let commands = backend.commands();
    assert!(commands.contains(&GpuCommand::SetKernelBuffer {
        kernel,
        name: "_GlobalState".to_string(),
        buffer: resources.global_buffer,
    }));
    assert!(commands.contains(&GpuCommand::SetKernelBuffer {
        kernel,
        name: "_MeshStates".to_string(),
        buffer: resources.instance_buffer,
    }));
    assert!(commands.contains(&GpuCommand::SetKernelVector {
        kernel,
        name: "_Param1".to_string(),
        value: Vec4::new(1.0, 250.0, 0.0, 0.0),
    }));
    assert!(commands.contains(&GpuCommand::SetMaterialBuffer {
        material: MATERIAL,
        name: "_MeshStates".to_string(),
        buffer: resources.instance_buffer,
    }));

    stop_rendering(&mut renderer, &mut backend).unwrap();
}

#[test]
fn test_start_then_stop_leaves_no_buffers() {
    let (mut renderer, mut backend) = setup(sphere_config(64));
    start_rendering(&mut renderer, &mut backend, 0.0).unwrap();
    let resources = active_resources(&renderer).unwrap();
    let expected_order = [
        resources.global_buffer,
        resources.instance_buffer,
        resources.args_buffer,
    ];

    backend.clear_commands();
    stop_rendering(&mut renderer, &mut backend).unwrap();

    assert_eq!(backend.live_buffer_count(), 0);
    assert_eq!(backend.live_kernel_count(), 0);
    assert!(matches!(renderer.state, LifecycleState::Released));

    let released: Vec<_> = backend
        .commands()
        .iter()
        .filter_map(|c| match c {
            GpuCommand::ReleaseBuffer { buffer } => Some(*buffer),
            _ => None,
        })
        .collect();
    assert_eq!(released, expected_order);
}

#[test]
fn test_restart_yields_fresh_buffers() {
    let (mut renderer, mut backend) = setup(sphere_config(100));
    start_rendering(&mut renderer, &mut backend, 0.0).unwrap();
    let old_instances = active_resources(&renderer).unwrap().instance_buffer;

    renderer.config.count = 250;
    restart_rendering(&mut renderer, &mut backend, 1.0).unwrap();

    let resources = active_resources(&renderer).unwrap();
    assert_ne!(resources.instance_buffer, old_instances);
    assert!(backend.buffer(old_instances).is_none());
    assert_eq!(backend.live_buffer_count(), 3);
    assert_eq!(backend.buffer(resources.instance_buffer).unwrap().desc.count, 250);
    assert_eq!(resources.instance_states.len(), 250);
    assert_eq!(resources.draw_args.instance_count(), 250);

    stop_rendering(&mut renderer, &mut backend).unwrap();
}

#[test]
fn test_repeated_restarts_release_kernel_state() {
    let (mut renderer, mut backend) = setup(sphere_config(8));
    start_rendering(&mut renderer, &mut backend, 0.0).unwrap();
    for i in 0..50 {
        restart_rendering(&mut renderer, &mut backend, i as f32).unwrap();
        assert_eq!(backend.live_kernel_count(), 1);
        assert_eq!(backend.live_buffer_count(), 3);
    }

    stop_rendering(&mut renderer, &mut backend).unwrap();
    assert_eq!(backend.live_buffer_count(), 0);
    assert_eq!(backend.live_kernel_count(), 0);
}

#[test]
fn test_failed_release_still_releases_the_rest() {
    let (mut renderer, mut backend) = setup(sphere_config(12));
    start_rendering(&mut renderer, &mut backend, 0.0).unwrap();
    let resources = active_resources(&renderer).unwrap();
    let (global, instances, args) = (
        resources.global_buffer,
        resources.instance_buffer,
        resources.args_buffer,
    );
    backend.fail_release_of(instances);

    let result = stop_rendering(&mut renderer, &mut backend);
    assert!(matches!(result, Err(DisperseError::GpuOperationFailed { .. })));
    assert!(matches!(renderer.state, LifecycleState::Released));

    assert!(backend.buffer(global).is_none());
    assert!(backend.buffer(args).is_none());
    assert!(backend.buffer(instances).is_some());
    assert_eq!(backend.live_buffer_count(), 1);
    assert_eq!(backend.live_kernel_count(), 0);
}

#[test]
fn test_start_twice_is_rejected() {
    let (mut renderer, mut backend) = setup(sphere_config(10));
    start_rendering(&mut renderer, &mut backend, 0.0).unwrap();

    let result = start_rendering(&mut renderer, &mut backend, 0.0);
    assert!(matches!(result, Err(DisperseError::AlreadyActive)));
    assert_eq!(backend.live_buffer_count(), 3);

    stop_rendering(&mut renderer, &mut backend).unwrap();
}

#[test]
fn test_stop_when_inactive_is_noop() {
    let (mut renderer, mut backend) = setup(sphere_config(10));
    assert!(stop_rendering(&mut renderer, &mut backend).is_ok());
    assert!(matches!(renderer.state, LifecycleState::Uninitialized));
    assert!(backend.commands().is_empty());

    start_rendering(&mut renderer, &mut backend, 0.0).unwrap();
    stop_rendering(&mut renderer, &mut backend).unwrap();
    assert!(stop_rendering(&mut renderer, &mut backend).is_ok());
    assert!(matches!(renderer.state, LifecycleState::Released));
}

#[test]
fn test_seeded_start_is_reproducible() {
    let (mut first, mut backend) = setup(sphere_config(50));
    let mut second = create_disperse_renderer(sphere_config(50), MESH, MATERIAL);

    start_rendering(&mut first, &mut backend, 0.0).unwrap();
    start_rendering(&mut second, &mut backend, 0.0).unwrap();
    assert_eq!(instance_states(&first), instance_states(&second));

    stop_rendering(&mut first, &mut backend).unwrap();
    stop_rendering(&mut second, &mut backend).unwrap();
}

// ============================================================================
// VALIDATION
// ============================================================================

#[test]
fn test_invalid_config_allocates_nothing() {
    let (mut renderer, mut backend) = setup(sphere_config(0));
    let result = start_rendering(&mut renderer, &mut backend, 0.0);

    assert!(matches!(result, Err(DisperseError::InvalidConfig { .. })));
    assert_eq!(created_buffers(&backend), 0);
    assert!(matches!(renderer.state, LifecycleState::Uninitialized));
}

#[test]
fn test_unknown_kernel_allocates_nothing() {
    let mut config = sphere_config(10);
    config.kernel_name = "NoSuchKernel".to_string();
    let (mut renderer, mut backend) = setup(config);

    let result = start_rendering(&mut renderer, &mut backend, 0.0);
    assert!(matches!(
        result,
        Err(DisperseError::KernelNotFound { ref name }) if name == "NoSuchKernel"
    ));
    assert_eq!(created_buffers(&backend), 0);
}

#[test]
fn test_missing_or_empty_mesh_is_rejected() {
    let mut backend = RecordingBackend::new();
    backend.register_kernel("CSMain");
    let mut renderer = create_disperse_renderer(sphere_config(10), MESH, MATERIAL);

    let result = start_rendering(&mut renderer, &mut backend, 0.0);
    assert!(matches!(result, Err(DisperseError::MeshNotFound { .. })));

    backend.register_mesh(MESH, 0);
    let result = start_rendering(&mut renderer, &mut backend, 0.0);
    assert!(matches!(result, Err(DisperseError::EmptyMesh { .. })));
    assert_eq!(created_buffers(&backend), 0);
}

#[test]
fn test_count_over_backend_limit_allocates_nothing() {
    let (mut renderer, mut backend) = setup(sphere_config(5_000));
    backend.set_max_instance_count(4_096);

    let result = start_rendering(&mut renderer, &mut backend, 0.0);
    assert!(matches!(
        result,
        Err(DisperseError::InstanceLimitExceeded { count: 5_000, limit: 4_096 })
    ));
    assert_eq!(created_buffers(&backend), 0);
    assert_eq!(backend.live_kernel_count(), 0);
    assert!(!is_active(&renderer));
}

#[test]
fn test_partial_activation_failure_leaks_nothing() {
    for successes in 0..3 {
        let (mut renderer, mut backend) = setup(sphere_config(20));
        backend.fail_creates_after(successes);

        let result = start_rendering(&mut renderer, &mut backend, 0.0);
        assert!(matches!(result, Err(DisperseError::GpuOperationFailed { .. })));
        assert_eq!(backend.live_buffer_count(), 0, "leak after {} successes", successes);
        assert_eq!(backend.live_kernel_count(), 0);
        assert!(!is_active(&renderer));
    }
}

// ============================================================================
// PER FRAME
// ============================================================================

#[test]
fn test_first_update_dispatches_once_per_instance() {
    let (mut renderer, mut backend) = setup(sphere_config(128));
    start_rendering(&mut renderer, &mut backend, 0.0).unwrap();
    backend.clear_commands();

    let dispatched = update(&mut renderer, &mut backend, &camera(), &Transform::default()).unwrap();
    assert!(dispatched);

    let kernel = active_resources(&renderer).unwrap().kernel;
    assert!(backend.commands().contains(&GpuCommand::Dispatch {
        kernel,
        groups: [128, 1, 1],
    }));

    stop_rendering(&mut renderer, &mut backend).unwrap();
}

#[test]
fn test_dispatch_groups_wrap_into_rows() {
    assert_eq!(dispatch_groups(1), [1, 1, 1]);
    assert_eq!(dispatch_groups(65_535), [65_535, 1, 1]);
    assert_eq!(dispatch_groups(65_536), [65_535, 2, 1]);
    assert_eq!(dispatch_groups(200_000), [65_535, 4, 1]);
}

#[test]
fn test_large_group_dispatch_stays_within_row_width() {
    let (mut renderer, mut backend) = setup(sphere_config(100_000));
    start_rendering(&mut renderer, &mut backend, 0.0).unwrap();
    backend.clear_commands();

    update(&mut renderer, &mut backend, &camera(), &Transform::default()).unwrap();

    let groups = backend
        .commands()
        .iter()
        .find_map(|c| match c {
            GpuCommand::Dispatch { groups, .. } => Some(*groups),
            _ => None,
        })
        .unwrap();
    assert_eq!(groups, [65_535, 2, 1]);
    assert!(groups.iter().all(|&g| g <= crate::constants::kernel::DISPATCH_ROW_GROUPS));
    // Every instance index is covered by the grid
    assert!(groups[0] as u64 * groups[1] as u64 >= 100_000);

    stop_rendering(&mut renderer, &mut backend).unwrap();
}

#[test]
fn test_unchanged_mvp_skips_dispatch_and_upload() {
    let (mut renderer, mut backend) = setup(sphere_config(16));
    start_rendering(&mut renderer, &mut backend, 0.0).unwrap();
    let transform = Transform::from_position(Vec3::new(3.0, 0.0, 0.0));

    assert!(update(&mut renderer, &mut backend, &camera(), &transform).unwrap());
    backend.clear_commands();

    assert!(!update(&mut renderer, &mut backend, &camera(), &transform).unwrap());
    assert!(backend.commands().is_empty());

    // Moving the camera dirties the MVP again
    let mut moved = camera();
    moved.position.x += 0.5;
    assert!(update(&mut renderer, &mut backend, &moved, &transform).unwrap());
    assert_eq!(backend.dispatch_count(), 1);

    stop_rendering(&mut renderer, &mut backend).unwrap();
}

#[test]
fn test_always_dispatch_bypasses_dirty_check() {
    let mut config = sphere_config(16);
    config.always_dispatch = true;
    let (mut renderer, mut backend) = setup(config);
    start_rendering(&mut renderer, &mut backend, 0.0).unwrap();

    for _ in 0..3 {
        assert!(update(&mut renderer, &mut backend, &camera(), &Transform::default()).unwrap());
    }
    assert_eq!(backend.dispatch_count(), 3);

    stop_rendering(&mut renderer, &mut backend).unwrap();
}

#[test]
fn test_update_uploads_global_state() {
    let (mut renderer, mut backend) = setup(sphere_config(8));
    start_rendering(&mut renderer, &mut backend, 0.0).unwrap();

    let transform = Transform::from_position(Vec3::new(10.0, 0.0, 0.0));
    let camera = init_camera(Vec3::new(10.0, 0.0, 20.0), -std::f32::consts::FRAC_PI_2, 0.0);
    update(&mut renderer, &mut backend, &camera, &transform).unwrap();

    let resources = active_resources(&renderer).unwrap();
    let uploaded: GlobalState =
        bytemuck::pod_read_unaligned(&backend.buffer(resources.global_buffer).unwrap().data);
    assert_eq!(uploaded, resources.global_state);

    let model = local_to_world_matrix(&transform);
    let mvp = build_gpu_projection_matrix(&camera) * build_view_matrix(&camera) * model;
    assert_eq!(uploaded.mat_m, model.to_cols_array_2d());
    assert_eq!(uploaded.mat_mvp, mvp.to_cols_array_2d());
    assert_eq!(resources.last_mvp, Some(mvp));

    let local_position = Vec3::from_slice(&uploaded.camera_local_position[..3]);
    let local_forward = Vec3::from_slice(&uploaded.camera_local_forward[..3]);
    assert!(local_position.abs_diff_eq(Vec3::new(0.0, 0.0, 20.0), 1e-4));
    assert!(local_forward.abs_diff_eq(Vec3::NEG_Z, 1e-4));

    stop_rendering(&mut renderer, &mut backend).unwrap();
}

#[test]
fn test_update_recenters_bounds() {
    let (mut renderer, mut backend) = setup(sphere_config(8));
    start_rendering(&mut renderer, &mut backend, 0.0).unwrap();

    let position = Vec3::new(-4.0, 2.0, 7.0);
    update(&mut renderer, &mut backend, &camera(), &Transform::from_position(position)).unwrap();

    let bounds = active_resources(&renderer).unwrap().limit_bounds;
    assert_eq!(bounds.center, position);
    assert_eq!(bounds.size, Vec3::splat(40.0));

    stop_rendering(&mut renderer, &mut backend).unwrap();
}

#[test]
fn test_draw_issues_indirect_call() {
    let (mut renderer, mut backend) = setup(sphere_config(8));
    start_rendering(&mut renderer, &mut backend, 0.0).unwrap();
    let report = render_frame(
        &mut renderer,
        &mut backend,
        &game_view(camera()),
        &Transform::default(),
        0.0,
    )
    .unwrap();

    assert_eq!(
        report,
        FrameReport {
            rendered: true,
            dispatched: true,
            active_index: None,
        }
    );

    let resources = active_resources(&renderer).unwrap();
    let call = backend
        .commands()
        .iter()
        .find_map(|c| match c {
            GpuCommand::DrawIndirect(call) => Some(*call),
            _ => None,
        })
        .unwrap();
    assert_eq!(call.mesh, MESH);
    assert_eq!(call.submesh, 0);
    assert_eq!(call.material, MATERIAL);
    assert_eq!(call.args_buffer, resources.args_buffer);
    assert_eq!(call.args_offset, 0);
    assert_eq!(call.shadow_casting, ShadowCasting::Off);
    assert!(!call.receive_shadows);
    assert_eq!(call.bounds, resources.limit_bounds);

    stop_rendering(&mut renderer, &mut backend).unwrap();
}

#[test]
fn test_unlimited_bounds_mode() {
    let mut config = sphere_config(8);
    config.bounds = BoundsMode::Unlimited;
    let (mut renderer, mut backend) = setup(config);
    start_rendering(&mut renderer, &mut backend, 0.0).unwrap();

    assert_eq!(
        active_resources(&renderer).unwrap().limit_bounds.size,
        unlimited_bounds().size
    );

    stop_rendering(&mut renderer, &mut backend).unwrap();
}

#[test]
fn test_render_target_mismatch_skips_frame() {
    let (mut renderer, mut backend) = setup(sphere_config(8));
    start_rendering(&mut renderer, &mut backend, 0.0).unwrap();
    backend.clear_commands();

    let scene_view = RenderView {
        camera: camera(),
        target: RenderTarget::Scene,
    };
    let report =
        render_frame(&mut renderer, &mut backend, &scene_view, &Transform::default(), 0.0).unwrap();

    assert!(!report.rendered);
    assert!(!report.dispatched);
    assert!(backend.commands().is_empty());

    stop_rendering(&mut renderer, &mut backend).unwrap();
}

#[test]
fn test_frame_operations_require_active_group() {
    let (mut renderer, mut backend) = setup(sphere_config(8));
    let camera = camera();

    assert!(matches!(
        update(&mut renderer, &mut backend, &camera, &Transform::default()),
        Err(DisperseError::NotActive)
    ));
    assert!(matches!(
        draw(&mut renderer, &mut backend, &camera, 0.0),
        Err(DisperseError::NotActive)
    ));
}

// ============================================================================
// HIGHLIGHT
// ============================================================================

#[test]
fn test_ring_highlight_cycles_through_instances() {
    let (mut renderer, mut backend) = setup(ring_config(3, 0.5));
    start_rendering(&mut renderer, &mut backend, 0.0).unwrap();
    let view = game_view(camera());
    let transform = Transform::default();

    let mut seen = Vec::new();
    for step in 0..5 {
        let time = step as f32 * 0.5;
        let report = render_frame(&mut renderer, &mut backend, &view, &transform, time).unwrap();
        seen.push(report.active_index);
        assert_eq!(
            backend.material_int(MATERIAL, "_ActiveIndex"),
            report.active_index.map(|i| i as i32)
        );
    }
    assert_eq!(seen, vec![Some(0), Some(1), Some(2), Some(0), Some(1)]);

    stop_rendering(&mut renderer, &mut backend).unwrap();
}

#[test]
fn test_highlight_waits_for_interval() {
    let (mut renderer, mut backend) = setup(ring_config(4, 1.0));
    start_rendering(&mut renderer, &mut backend, 10.0).unwrap();
    let camera = camera();

    assert_eq!(draw(&mut renderer, &mut backend, &camera, 10.0).unwrap(), Some(0));
    backend.clear_commands();

    assert_eq!(draw(&mut renderer, &mut backend, &camera, 10.9).unwrap(), Some(0));
    assert!(!backend
        .commands()
        .iter()
        .any(|c| matches!(c, GpuCommand::SetMaterialInt { .. })));

    assert_eq!(draw(&mut renderer, &mut backend, &camera, 11.0).unwrap(), Some(1));

    stop_rendering(&mut renderer, &mut backend).unwrap();
}

#[test]
fn test_ring_states_use_explicit_rng() {
    let (mut renderer, mut backend) = setup(ring_config(6, 1.0));
    let mut rng = StdRng::seed_from_u64(3);
    start_rendering_with_rng(&mut renderer, &mut backend, &mut rng, 0.0).unwrap();

    let states = instance_states(&renderer).unwrap();
    assert_eq!(states.len(), 6);
    assert!(states[0].position().abs_diff_eq(Vec3::new(5.0, 0.0, 0.0), 1e-5));

    stop_rendering(&mut renderer, &mut backend).unwrap();
}
