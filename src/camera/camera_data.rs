//! Camera data structures - Pure DOP
//!
//! NO METHODS. Just data.
//! All transformations happen in camera_operations.rs

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Camera data structure - pure data, no methods
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraData {
    /// Camera position in world space
    pub position: Vec3,

    /// Yaw rotation (radians, around Y axis)
    pub yaw_radians: f32,

    /// Pitch rotation (radians, around X axis)
    pub pitch_radians: f32,

    /// Field of view (vertical, radians)
    pub fov_radians: f32,

    /// Aspect ratio (width / height)
    pub aspect_ratio: f32,

    /// Near clipping plane distance
    pub near_plane: f32,

    /// Far clipping plane distance
    pub far_plane: f32,
}

impl Default for CameraData {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            // Looking down -Z
            yaw_radians: -std::f32::consts::FRAC_PI_2,
            pitch_radians: 0.0,
            fov_radians: 60.0_f32.to_radians(),
            aspect_ratio: 16.0 / 9.0,
            near_plane: 0.3,
            far_plane: 1000.0,
        }
    }
}

/// Camera configuration for initialization
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub initial_position: Vec3,
    pub initial_yaw_degrees: f32,
    pub initial_pitch_degrees: f32,
    pub fov_degrees: f32,
    pub aspect_ratio: f32,
    pub near_plane: f32,
    pub far_plane: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            initial_position: Vec3::new(0.0, 0.0, 150.0),
            initial_yaw_degrees: -90.0,
            initial_pitch_degrees: 0.0,
            fov_degrees: 60.0,
            aspect_ratio: 16.0 / 9.0,
            near_plane: 0.3,
            far_plane: 1000.0,
        }
    }
}
