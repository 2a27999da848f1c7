//! Camera operations - Pure DOP functions
//!
//! All functions are pure: they take data, return new data, no side effects.

use super::camera_data::{CameraConfig, CameraData};
use glam::{Mat4, Vec3};

// ============================================================================
// INITIALIZATION
// ============================================================================

/// Initialize camera with default lens settings
pub fn init_camera(position: Vec3, yaw: f32, pitch: f32) -> CameraData {
    CameraData {
        position,
        yaw_radians: yaw,
        pitch_radians: pitch,
        ..Default::default()
    }
}

/// Initialize camera from config
pub fn init_camera_from_config(config: &CameraConfig) -> CameraData {
    CameraData {
        position: config.initial_position,
        yaw_radians: config.initial_yaw_degrees.to_radians(),
        pitch_radians: config.initial_pitch_degrees.to_radians(),
        fov_radians: config.fov_degrees.to_radians(),
        aspect_ratio: config.aspect_ratio,
        near_plane: config.near_plane,
        far_plane: config.far_plane,
    }
}

// ============================================================================
// VIEW/PROJECTION MATRICES
// ============================================================================

/// World-to-camera matrix
pub fn build_view_matrix(camera: &CameraData) -> Mat4 {
    let forward = calculate_forward_vector(camera.yaw_radians, camera.pitch_radians);
    Mat4::look_to_rh(camera.position, forward, Vec3::Y)
}

/// Projection in the GPU's clip conventions (right handed, depth 0..1)
pub fn build_gpu_projection_matrix(camera: &CameraData) -> Mat4 {
    Mat4::perspective_rh(
        camera.fov_radians,
        camera.aspect_ratio,
        camera.near_plane,
        camera.far_plane,
    )
}

/// Projection * view
pub fn build_view_projection_matrix(camera: &CameraData) -> Mat4 {
    build_gpu_projection_matrix(camera) * build_view_matrix(camera)
}

// ============================================================================
// UPDATES
// ============================================================================

/// Update aspect ratio (e.g., on target resize)
pub fn update_aspect_ratio(camera: &CameraData, width: u32, height: u32) -> CameraData {
    let mut new_camera = *camera;
    new_camera.aspect_ratio = width as f32 / height.max(1) as f32;
    new_camera
}

/// Point the camera at a world-space target
pub fn look_at(camera: &CameraData, target: Vec3) -> CameraData {
    let direction = (target - camera.position).normalize_or_zero();
    if direction == Vec3::ZERO {
        return *camera;
    }

    // Clamp pitch to avoid gimbal lock
    const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

    let mut new_camera = *camera;
    new_camera.yaw_radians = direction.z.atan2(direction.x);
    new_camera.pitch_radians = direction.y.asin().clamp(-PITCH_LIMIT, PITCH_LIMIT);
    new_camera
}

// ============================================================================
// UTILITIES
// ============================================================================

/// Calculate forward vector from yaw and pitch
pub fn calculate_forward_vector(yaw: f32, pitch: f32) -> Vec3 {
    Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize()
}

/// Log camera context for debugging
pub fn log_camera_context(camera: &CameraData) {
    log::debug!(
        "[Camera] Position: ({:.1}, {:.1}, {:.1}) | Yaw: {:.1}° | Pitch: {:.1}° | FOV: {:.1}°",
        camera.position.x,
        camera.position.y,
        camera.position.z,
        camera.yaw_radians.to_degrees(),
        camera.pitch_radians.to_degrees(),
        camera.fov_radians.to_degrees()
    );
}
