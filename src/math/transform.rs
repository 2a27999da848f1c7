//! Object transform of an instance group.

use glam::{Mat4, Quat, Vec3};

/// Position, rotation and scale of the object that owns the instance group
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }
}

/// Object-to-world matrix
pub fn local_to_world_matrix(transform: &Transform) -> Mat4 {
    Mat4::from_scale_rotation_translation(transform.scale, transform.rotation, transform.position)
}

/// World-space point into the object's local space (scale included)
pub fn inverse_transform_point(transform: &Transform, point: Vec3) -> Vec3 {
    local_to_world_matrix(transform)
        .inverse()
        .transform_point3(point)
}

/// World-space direction into local space. Scale is ignored.
pub fn inverse_transform_direction(transform: &Transform, direction: Vec3) -> Vec3 {
    transform.rotation.inverse() * direction
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverse_transform_point() {
        let transform = Transform {
            position: Vec3::new(10.0, 0.0, 0.0),
            rotation: Quat::IDENTITY,
            scale: Vec3::splat(2.0),
        };
        let local = inverse_transform_point(&transform, Vec3::new(14.0, 2.0, 0.0));
        assert!(local.abs_diff_eq(Vec3::new(2.0, 1.0, 0.0), 1e-5));
    }

    #[test]
    fn test_inverse_transform_direction_ignores_scale() {
        let transform = Transform {
            position: Vec3::new(3.0, 4.0, 5.0),
            rotation: Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            scale: Vec3::splat(7.0),
        };
        let local = inverse_transform_direction(&transform, Vec3::NEG_Z);
        assert!(local.abs_diff_eq(Vec3::X, 1e-5));
    }
}
