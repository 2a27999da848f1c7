/// Data-Oriented Bounding Volume for instance group culling
///
/// Pure functions only. The volume is stored as center + full size, which is
/// how the draw call consumes it, and converted to min/max on demand.
use crate::constants::UNLIMITED_BOUNDS_EXTENT;
use glam::{Mat4, Vec3, Vec4};

/// Axis-aligned bounding volume - pure data structure
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub center: Vec3,
    /// Full edge lengths, not half extents
    pub size: Vec3,
}

/// Create bounds from center point and full size
pub fn bounds_from_center_size(center: Vec3, size: Vec3) -> Bounds {
    Bounds { center, size }
}

/// Effectively infinite bounds for placements with no spatial limit
pub fn unlimited_bounds() -> Bounds {
    Bounds {
        center: Vec3::ZERO,
        size: Vec3::splat(UNLIMITED_BOUNDS_EXTENT),
    }
}

/// Minimum corner
pub fn bounds_min(bounds: &Bounds) -> Vec3 {
    bounds.center - bounds.size * 0.5
}

/// Maximum corner
pub fn bounds_max(bounds: &Bounds) -> Vec3 {
    bounds.center + bounds.size * 0.5
}

/// Copy of the bounds moved to a new center
pub fn bounds_recentered(bounds: &Bounds, center: Vec3) -> Bounds {
    Bounds {
        center,
        size: bounds.size,
    }
}

/// Test if bounds contain a point (inclusive)
pub fn bounds_contains_point(bounds: &Bounds, point: Vec3) -> bool {
    let min = bounds_min(bounds);
    let max = bounds_max(bounds);
    point.cmpge(min).all() && point.cmple(max).all()
}

/// Extract the six clip planes from a view-projection matrix (Gribb-Hartmann).
///
/// Planes point inward: a point p is inside when `dot(plane.xyz, p) + plane.w >= 0`.
/// Assumes a 0..1 depth range, which is what wgpu expects.
pub fn extract_frustum_planes(view_proj: &Mat4) -> [Vec4; 6] {
    let row0 = view_proj.row(0);
    let row1 = view_proj.row(1);
    let row2 = view_proj.row(2);
    let row3 = view_proj.row(3);

    [
        normalize_plane(row3 + row0), // left
        normalize_plane(row3 - row0), // right
        normalize_plane(row3 - row1), // top
        normalize_plane(row3 + row1), // bottom
        normalize_plane(row2),        // near
        normalize_plane(row3 - row2), // far
    ]
}

fn normalize_plane(plane: Vec4) -> Vec4 {
    let length = plane.truncate().length();
    if length > 0.0 {
        plane / length
    } else {
        plane
    }
}

/// Conservative bounds-vs-frustum test.
///
/// Returns false only when the whole volume lies outside one plane.
pub fn bounds_in_frustum(bounds: &Bounds, planes: &[Vec4; 6]) -> bool {
    let half = bounds.size * 0.5;
    planes.iter().all(|plane| {
        let normal = plane.truncate();
        let radius = half.dot(normal.abs());
        normal.dot(bounds.center) + plane.w >= -radius
    })
}
