//! Shared names and sizes for the instanced draw pipeline.
//!
//! Binding names mirror the identifiers used by the compute kernel and the
//! render material, so both sides of the contract look the same in logs.

/// Compute kernel contract
pub mod kernel {
    /// Default kernel entry point that transforms instance states
    pub const UPDATE_KERNEL_NAME: &str = "CSMain";

    /// Single-element buffer with the shared per-frame state
    pub const GLOBAL_STATE_NAME: &str = "_GlobalState";

    /// Per-instance state buffer, shared with the material
    pub const MESH_STATES_NAME: &str = "_MeshStates";

    /// vec4(min display distance, max display distance, 0, 0)
    pub const PARAM1_NAME: &str = "_Param1";

    /// Thread groups are one instance wide
    pub const GROUP_SIZE: [u32; 3] = [1, 1, 1];

    /// Workgroups per dispatch row. Larger groups wrap into more rows along y,
    /// and the kernel reads its index as `x + y * DISPATCH_ROW_GROUPS`.
    pub const DISPATCH_ROW_GROUPS: u32 = 65_535;
}

/// Material contract
pub mod material {
    /// Default name of the highlighted instance index property
    pub const ACTIVE_INDEX_NAME: &str = "_ActiveIndex";
}

/// Bind slot layout used by the wgpu backend
pub mod bindings {
    pub const GLOBAL_STATE: u32 = 0;
    pub const MESH_STATES: u32 = 1;
    pub const PARAM1: u32 = 2;

    pub const MATERIAL_MESH_STATES: u32 = 0;
    pub const MATERIAL_ACTIVE_INDEX: u32 = 1;
}

/// Indirect draw argument block
pub mod draw_args {
    /// index count, instance count, first index, base vertex, first instance
    pub const LEN: usize = 5;

    pub const BYTE_SIZE: u32 = (LEN * std::mem::size_of::<u32>()) as u32;
}

/// Culling volume used when the placement has no spatial limit
pub const UNLIMITED_BOUNDS_EXTENT: f32 = 999_999.0;

