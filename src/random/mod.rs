//! Random distribution helpers for scattering instances.

pub mod distribution;

pub use distribution::{
    random_euler_angles, random_in_circle, random_in_sphere, random_scale, rng_from_seed,
};
