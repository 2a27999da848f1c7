//! Headless demo: render a meteorite field and a lantern ring offscreen
//!
//! Usage: cargo run --example headless_field [path/to/field.toml]

use anyhow::{Context, Result};
use disperse_mesh::camera::{
    init_camera_from_config, log_camera_context, look_at, update_aspect_ratio, CameraConfig,
};
use disperse_mesh::constants::material::ACTIVE_INDEX_NAME;
use disperse_mesh::gpu::{request_headless_device, WgpuBackend, DEPTH_FORMAT};
use disperse_mesh::renderer::{
    create_cube_mesh, create_disperse_renderer, create_octahedron_mesh, render_frame,
    start_rendering, stop_rendering,
};
use disperse_mesh::{
    DisperseConfig, DisperseRenderer, Placement, RenderTarget, RenderView, Transform,
};
use glam::{Quat, Vec3};
use serde::Deserialize;

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct DemoFile {
    frames: u32,
    width: u32,
    height: u32,
    camera: CameraConfig,
    field: DisperseConfig,
    ring: DisperseConfig,
}

impl Default for DemoFile {
    fn default() -> Self {
        Self {
            frames: 60,
            width: 1280,
            height: 720,
            camera: CameraConfig::default(),
            field: DisperseConfig::default(),
            ring: DisperseConfig::default(),
        }
    }
}

fn create_target(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

fn run_frames(
    demo: &DemoFile,
    backend: &mut WgpuBackend,
    field: &mut DisperseRenderer,
    ring: &mut DisperseRenderer,
    color: &wgpu::TextureView,
    depth: &wgpu::TextureView,
) -> Result<()> {
    let field_transform = Transform::default();
    let ring_transform = Transform {
        position: Vec3::new(0.0, 20.0, 0.0),
        rotation: Quat::from_rotation_x(0.3),
        ..Default::default()
    };

    let base_camera = update_aspect_ratio(
        &init_camera_from_config(&demo.camera),
        demo.width,
        demo.height,
    );
    let orbit_radius = base_camera.position.length();
    let frame_time = 1.0 / 60.0;

    for frame in 0..demo.frames {
        let time = frame as f32 * frame_time;

        // Orbit the origin at constant height
        let angle = time * 0.25;
        let mut camera = base_camera;
        camera.position = Vec3::new(
            orbit_radius * angle.sin(),
            base_camera.position.y,
            orbit_radius * angle.cos(),
        );
        let view = RenderView {
            camera: look_at(&camera, Vec3::ZERO),
            target: RenderTarget::Game,
        };

        backend.begin_frame();
        let field_report = render_frame(field, backend, &view, &field_transform, time)?;
        let ring_report = render_frame(ring, backend, &view, &ring_transform, time)?;
        let stats = backend.end_frame(color, depth, wgpu::Color::BLACK)?;

        if frame % 30 == 0 {
            log_camera_context(&view.camera);
            log::info!(
                "[Demo] Frame {}: {:?}, field {:?}, ring highlight {:?}",
                frame,
                stats,
                field_report,
                ring_report.active_index
            );
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| concat!(env!("CARGO_MANIFEST_DIR"), "/demos/field.toml").to_string());
    let source = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path))?;
    let demo: DemoFile = toml::from_str(&source).with_context(|| format!("parsing {}", path))?;
    demo.field.validate()?;
    demo.ring.validate()?;

    let (device, queue) = request_headless_device()?;
    let mut backend = WgpuBackend::new(device.clone(), queue);

    let color = create_target(&device, "Demo Color", demo.width, demo.height, COLOR_FORMAT);
    let depth = create_target(&device, "Demo Depth", demo.width, demo.height, DEPTH_FORMAT);

    let rock = backend.upload_mesh(&create_octahedron_mesh(1.0))?;
    let lantern = backend.upload_mesh(&create_cube_mesh(1.0))?;

    let ring_property = match &demo.ring.placement {
        Placement::Ring(ring) => ring.active_index_property.clone(),
        _ => ACTIVE_INDEX_NAME.to_string(),
    };
    let field_material = backend.create_material(COLOR_FORMAT, ACTIVE_INDEX_NAME);
    let ring_material = backend.create_material(COLOR_FORMAT, &ring_property);

    let mut field = create_disperse_renderer(demo.field.clone(), rock, field_material);
    let mut ring = create_disperse_renderer(demo.ring.clone(), lantern, ring_material);

    let result = start_rendering(&mut field, &mut backend, 0.0)
        .and_then(|()| start_rendering(&mut ring, &mut backend, 0.0))
        .map_err(anyhow::Error::from)
        .and_then(|()| run_frames(&demo, &mut backend, &mut field, &mut ring, &color, &depth));

    backend.device().poll(wgpu::Maintain::Wait);

    // Both groups are stopped even when a frame failed; inactive groups are a no-op
    let field_stopped = stop_rendering(&mut field, &mut backend);
    let ring_stopped = stop_rendering(&mut ring, &mut backend);
    result?;
    field_stopped?;
    ring_stopped?;

    log::info!("[Demo] Rendered {} frames", demo.frames);
    Ok(())
}
