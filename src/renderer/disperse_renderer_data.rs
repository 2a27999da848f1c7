//! Disperse Renderer Data - Pure DOP
//!
//! NO METHODS. Just data.
//! All lifecycle transitions happen in disperse_renderer_operations.rs

use crate::camera::CameraData;
use crate::config::{DisperseConfig, RenderTarget};
use crate::gpu::{BufferHandle, KernelHandle, MaterialHandle, MeshHandle};
use crate::instance::{DrawArguments, FrameHook, GlobalState, InstanceState};
use crate::math::Bounds;
use glam::Mat4;

/// Everything an active instance group owns on the CPU and GPU side
#[derive(Debug)]
pub struct ActiveResources {
    pub kernel: KernelHandle,

    /// One `GlobalState` element
    pub global_buffer: BufferHandle,

    /// `count` `InstanceState` elements, shared by kernel and material
    pub instance_buffer: BufferHandle,

    /// One `DrawArguments` block
    pub args_buffer: BufferHandle,

    /// CPU copy of the uploaded instance states
    pub instance_states: Vec<InstanceState>,
    pub global_state: GlobalState,
    pub draw_args: DrawArguments,

    /// Culling volume, recentered on the object every update
    pub limit_bounds: Bounds,

    /// MVP of the last dispatch. None forces the next update to dispatch.
    pub last_mvp: Option<Mat4>,

    pub hook: FrameHook,
}

/// Uninitialized -> Active -> Released, and Released -> Active on restart
#[derive(Debug)]
pub enum LifecycleState {
    Uninitialized,
    Active(ActiveResources),
    Released,
}

/// One dispersed instance group
#[derive(Debug)]
pub struct DisperseRenderer {
    pub config: DisperseConfig,
    pub mesh: MeshHandle,
    pub material: MaterialHandle,
    pub state: LifecycleState,
}

/// A camera plus the target it renders into
#[derive(Debug, Clone, Copy)]
pub struct RenderView {
    pub camera: CameraData,
    pub target: RenderTarget,
}

/// What happened to a group in one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// False when the view's target did not match the group
    pub rendered: bool,
    /// True when the kernel ran this frame
    pub dispatched: bool,
    /// Highlighted instance, if the group has a highlight cycle
    pub active_index: Option<u32>,
}

impl Drop for DisperseRenderer {
    fn drop(&mut self) {
        if let LifecycleState::Active(resources) = &self.state {
            log::error!(
                "[DisperseRenderer] Dropped while active: buffers {:?}, {:?}, {:?} leaked ({} instances). Call stop_rendering first.",
                resources.global_buffer,
                resources.instance_buffer,
                resources.args_buffer,
                resources.instance_states.len()
            );
        }
    }
}
