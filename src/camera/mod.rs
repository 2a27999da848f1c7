/// Camera Module - Data-Oriented Programming (DOP) style
///
/// - camera_data.rs: Pure data structures with NO methods
/// - camera_operations.rs: Pure functions that operate on data
///
/// The camera here is the host collaborator that supplies view and projection
/// matrices to the instanced draw. Movement and input live outside this crate.

pub mod camera_data;
pub mod camera_operations;

// Re-export data structures
pub use camera_data::{CameraConfig, CameraData};

// Re-export all operations
pub use camera_operations::{
    // Initialization
    init_camera,
    init_camera_from_config,

    // View/projection
    build_gpu_projection_matrix,
    build_view_matrix,
    build_view_projection_matrix,

    // Updates
    update_aspect_ratio,
    look_at,

    // Utilities
    calculate_forward_vector,
    log_camera_context,
};
