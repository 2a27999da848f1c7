// Disperse Mesh - GPU-instanced mesh dispersal
//
// Scatters large counts of mesh instances across simple volumes and draws
// them with one indirect instanced call per group. A compute kernel turns the
// per-instance transform state into draw-ready matrices on the GPU.
//
// Data-oriented layout:
// - *_data modules hold plain state
// - *_operations modules are free functions over that state
// - GPU access goes through the `GpuBackend` trait

// Constants module
pub mod constants;

// Core
pub mod config;
pub mod error;

// Supporting modules
pub mod camera;
pub mod math;
pub mod random;

// Instance state and the draw loop
pub mod gpu;
pub mod instance;
pub mod renderer;

pub use camera::{CameraConfig, CameraData};
pub use config::{DisperseConfig, RenderTarget};
pub use error::{DisperseError, DisperseResult, ErrorContext, OptionExt};
pub use gpu::{GpuBackend, RecordingBackend, WgpuBackend};
pub use instance::{
    BoundsMode, DrawArguments, GlobalState, InstanceState, Placement, RingPlacement,
    ScatterPlacement,
};
pub use math::{Bounds, Transform};
pub use renderer::{DisperseRenderer, FrameReport, MeshData, RenderView};

// Re-export wgpu for hosts that build their own device and targets
pub use wgpu;
