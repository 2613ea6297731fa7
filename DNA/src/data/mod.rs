//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: mod.rs | DNA/src/data/mod.rs
//! PURPOSE: Data structures for simulation inputs
//! LAYER: DNA → DATA
//! ═══════════════════════════════════════════════════════════════════════════════

/// Segmented voxel volume with per-voxel labels and densities
pub mod volume;

pub use volume::{Axis, VoxelVolume};
