//! Renderer Module - instanced draw loop for dispersed mesh groups
//!
//! `disperse_renderer_data` holds the lifecycle state, `disperse_renderer_operations`
//! the functions that move it and drive a `GpuBackend` every frame.

pub mod disperse_renderer_data;
pub mod disperse_renderer_operations;
pub mod mesh;

#[cfg(test)]
mod tests;

pub use disperse_renderer_data::{
    ActiveResources, DisperseRenderer, FrameReport, LifecycleState, RenderView,
};
pub use disperse_renderer_operations::{
    active_resources, create_disperse_renderer, dispatch_groups, draw, instance_states, is_active,
    render_frame, restart_rendering, start_rendering, start_rendering_with_rng, stop_rendering,
    update,
};
pub use mesh::{create_cube_mesh, create_octahedron_mesh, mesh_vertex_layout, MeshData, MeshVertex};
