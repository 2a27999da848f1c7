//! Math helpers for the instanced draw pipeline
//!
//! Pure data plus free functions, same as the rest of the crate.

pub mod bounds;
pub mod transform;

pub use bounds::{
    bounds_contains_point, bounds_from_center_size, bounds_in_frustum, bounds_max, bounds_min,
    bounds_recentered, extract_frustum_planes, unlimited_bounds, Bounds,
};
pub use transform::{
    inverse_transform_direction, inverse_transform_point, local_to_world_matrix, Transform,
};
