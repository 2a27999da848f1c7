//! GPU seam for the instanced draw loop
//!
//! `backend` defines what the renderer needs from a graphics host.
//! `recording_backend` runs headless and records every call;
//! `wgpu_backend` drives a real device.

pub mod backend;
pub mod kernel_source;
pub mod recording_backend;
pub mod wgpu_backend;

pub use backend::{
    BufferDesc, BufferHandle, BufferKind, GpuBackend, IndirectDrawCall, KernelHandle,
    MaterialHandle, MeshHandle, ShadowCasting,
};
pub use kernel_source::{compute_entry_points, has_compute_entry_point};
pub use recording_backend::{GpuCommand, RecordedBuffer, RecordingBackend};
pub use wgpu_backend::{request_headless_device, FrameStats, WgpuBackend, DEPTH_FORMAT};
