//! Placement strategies - how an instance group fills its state array
//!
//! A tagged enum instead of a trait object: the strategy is chosen once at
//! activation and never touched by the per-frame path.

use super::highlight::{FrameHook, HighlightCycle};
use super::instance_data::InstanceState;
use crate::constants::material;
use crate::math::{bounds_from_center_size, unlimited_bounds, Bounds};
use crate::random::{random_euler_angles, random_in_circle, random_in_sphere, random_scale};
use glam::{Quat, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Random scatter inside a volume with randomized rotation and scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterPlacement {
    pub radius: f32,
    pub min_scale: Vec3,
    pub max_scale: Vec3,
    /// Largest allowed difference between scale axes. 0 gives uniform scale.
    #[serde(default)]
    pub scale_max_offset: f32,
}

impl Default for ScatterPlacement {
    fn default() -> Self {
        Self {
            radius: 100.0,
            min_scale: Vec3::ONE,
            max_scale: Vec3::ONE,
            scale_max_offset: 0.0,
        }
    }
}

/// Evenly spaced ring with one highlighted instance at a time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingPlacement {
    pub radius: f32,
    pub scale: Vec3,
    /// Seconds between highlight advances
    pub update_interval: f32,
    /// Material property receiving the highlighted index
    #[serde(default = "default_active_index_property")]
    pub active_index_property: String,
}

fn default_active_index_property() -> String {
    material::ACTIVE_INDEX_NAME.to_string()
}

impl Default for RingPlacement {
    fn default() -> Self {
        Self {
            radius: 10.0,
            scale: Vec3::ONE,
            update_interval: 1.0,
            active_index_property: default_active_index_property(),
        }
    }
}

/// Placement strategy for an instance group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Placement {
    /// Uniform inside a sphere
    Sphere(ScatterPlacement),
    /// Uniform inside a disc on the local XZ plane
    Circle(ScatterPlacement),
    /// Fixed radius, fixed angular step around local +Y
    Ring(RingPlacement),
}

impl Default for Placement {
    fn default() -> Self {
        Placement::Sphere(ScatterPlacement::default())
    }
}

/// Which culling volume the group draws with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundsMode {
    /// Cube enclosing the placement radius
    #[default]
    Placement,
    /// Effectively infinite, never culled by the host
    Unlimited,
}

/// Fill a fresh state array of exactly `count` instances
pub fn fill_instance_states<R: Rng + ?Sized>(
    placement: &Placement,
    count: u32,
    rng: &mut R,
) -> Vec<InstanceState> {
    let count = count as usize;
    let mut states = Vec::with_capacity(count);

    match placement {
        Placement::Sphere(scatter) => {
            for _ in 0..count {
                let position = random_in_sphere(rng, scatter.radius);
                states.push(scatter_state(rng, scatter, position));
            }
        }
        Placement::Circle(scatter) => {
            for _ in 0..count {
                let position = random_in_circle(rng, scatter.radius);
                states.push(scatter_state(rng, scatter, position));
            }
        }
        Placement::Ring(ring) => {
            let start = Vec3::new(ring.radius, 0.0, 0.0);
            let step = std::f32::consts::TAU / count.max(1) as f32;
            for index in 0..count {
                let angle = step * index as f32;
                let position = Quat::from_rotation_y(angle) * start;
                states.push(InstanceState::new(position, Vec3::new(0.0, angle, 0.0), ring.scale));
            }
        }
    }

    log::trace!(
        "[Placement] Filled {} instance states ({})",
        states.len(),
        placement_name(placement)
    );
    states
}

fn scatter_state<R: Rng + ?Sized>(rng: &mut R, scatter: &ScatterPlacement, position: Vec3) -> InstanceState {
    let rotation = random_euler_angles(rng) * std::f32::consts::PI / 180.0;
    let scale = random_scale(rng, scatter.min_scale, scatter.max_scale, scatter.scale_max_offset);
    InstanceState::new(position, rotation, scale)
}

/// Radius of the volume the placement covers
pub fn placement_radius(placement: &Placement) -> f32 {
    match placement {
        Placement::Sphere(scatter) | Placement::Circle(scatter) => scatter.radius,
        Placement::Ring(ring) => ring.radius,
    }
}

/// Short name for logs
pub fn placement_name(placement: &Placement) -> &'static str {
    match placement {
        Placement::Sphere(_) => "sphere",
        Placement::Circle(_) => "circle",
        Placement::Ring(_) => "ring",
    }
}

/// Culling volume in local space; the renderer recenters it every frame
pub fn limit_bounds(placement: &Placement, mode: BoundsMode) -> Bounds {
    match mode {
        BoundsMode::Placement => {
            bounds_from_center_size(Vec3::ZERO, Vec3::splat(placement_radius(placement) * 2.0))
        }
        BoundsMode::Unlimited => unlimited_bounds(),
    }
}

/// Per-frame hook that goes with the placement
pub fn frame_hook_for(placement: &Placement, start_time: f32) -> FrameHook {
    match placement {
        Placement::Sphere(_) | Placement::Circle(_) => FrameHook::None,
        Placement::Ring(ring) => FrameHook::Highlight(HighlightCycle::new(
            ring.update_interval,
            start_time,
            ring.active_index_property.clone(),
        )),
    }
}
