/// Instance state for dispersed mesh groups
///
/// Data that the GPU consumes (instance_data), how it is generated
/// (placement), and the per-frame hook that rides along with a placement
/// (highlight).

// Data structures
pub mod instance_data;

// Generation
pub mod highlight;
pub mod placement;

pub use highlight::{FrameHook, HighlightCycle};
pub use instance_data::{DrawArguments, GlobalState, InstanceState};
pub use placement::{
    fill_instance_states, frame_hook_for, limit_bounds, placement_name, placement_radius,
    BoundsMode, Placement, RingPlacement, ScatterPlacement,
};
