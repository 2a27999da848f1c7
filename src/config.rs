//! Instance group configuration
//!
//! Loaded from TOML once at startup. Validation runs again on every
//! activation so a group edited at runtime cannot allocate with bad values.

use crate::constants::kernel;
use crate::error::{DisperseError, DisperseResult};
use crate::instance::{BoundsMode, Placement};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which view the group renders into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderTarget {
    /// The runtime camera
    #[default]
    Game,
    /// A tooling/preview camera
    Scene,
}

/// Configuration for one dispersed instance group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisperseConfig {
    /// Number of instances, fixed for an activation
    pub count: u32,

    /// Compute kernel entry point
    pub kernel_name: String,

    /// Instances closer than this to the camera are pushed away by the kernel
    pub min_display_distance: f32,

    /// Instances farther than this are hidden by the kernel
    pub max_display_distance: f32,

    /// Dispatch every frame, bypassing the MVP dirty check
    pub always_dispatch: bool,

    /// Only views with this target draw the group
    pub render_in: RenderTarget,

    /// Culling volume mode
    pub bounds: BoundsMode,

    /// Fixed seed for reproducible fields
    pub seed: Option<u64>,

    pub placement: Placement,
}

impl Default for DisperseConfig {
    fn default() -> Self {
        Self {
            count: 1000,
            kernel_name: kernel::UPDATE_KERNEL_NAME.to_string(),
            min_display_distance: 0.0,
            max_display_distance: 1000.0,
            always_dispatch: false,
            render_in: RenderTarget::Game,
            bounds: BoundsMode::Placement,
            seed: None,
            placement: Placement::default(),
        }
    }
}

impl DisperseConfig {
    /// Parse from a TOML document
    pub fn from_toml_str(source: &str) -> DisperseResult<Self> {
        let config: DisperseConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: impl AsRef<Path>) -> DisperseResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| DisperseError::ConfigLoad {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        let config = Self::from_toml_str(&source)?;
        log::info!(
            "[DisperseConfig] Loaded {} ({} instances, kernel '{}')",
            path.display(),
            config.count,
            config.kernel_name
        );
        Ok(config)
    }

    /// Serialize back to TOML
    pub fn to_toml_string(&self) -> DisperseResult<String> {
        toml::to_string(self).map_err(|e| DisperseError::ConfigParse {
            error: e.to_string(),
        })
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> DisperseResult<()> {
        if self.count == 0 {
            return Err(DisperseError::invalid_config(
                "count",
                self.count,
                "must be greater than 0",
            ));
        }

        if self.kernel_name.trim().is_empty() {
            return Err(DisperseError::invalid_config(
                "kernel_name",
                "\"\"",
                "cannot be empty",
            ));
        }

        check_non_negative("min_display_distance", self.min_display_distance)?;
        check_non_negative("max_display_distance", self.max_display_distance)?;
        if self.min_display_distance > self.max_display_distance {
            return Err(DisperseError::invalid_config(
                "min_display_distance",
                self.min_display_distance,
                format!(
                    "exceeds max_display_distance {}",
                    self.max_display_distance
                ),
            ));
        }

        match &self.placement {
            Placement::Sphere(scatter) | Placement::Circle(scatter) => {
                check_non_negative("placement.radius", scatter.radius)?;
                check_non_negative("placement.scale_max_offset", scatter.scale_max_offset)?;
                let min = scatter.min_scale.to_array();
                let max = scatter.max_scale.to_array();
                for (axis, (lo, hi)) in ["x", "y", "z"].iter().zip(min.iter().zip(max.iter())) {
                    if !lo.is_finite() || !hi.is_finite() || lo > hi {
                        return Err(DisperseError::invalid_config(
                            format!("placement.min_scale.{}", axis),
                            lo,
                            format!("must be finite and not exceed max_scale.{} = {}", axis, hi),
                        ));
                    }
                }
            }
            Placement::Ring(ring) => {
                check_non_negative("placement.radius", ring.radius)?;
                check_non_negative("placement.update_interval", ring.update_interval)?;
                if ring.active_index_property.trim().is_empty() {
                    return Err(DisperseError::invalid_config(
                        "placement.active_index_property",
                        "\"\"",
                        "cannot be empty",
                    ));
                }
            }
        }

        Ok(())
    }
}

fn check_non_negative(field: &str, value: f32) -> DisperseResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(DisperseError::invalid_config(
            field,
            value,
            "must be a finite, non-negative number",
        ));
    }
    Ok(())
}
