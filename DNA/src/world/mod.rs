//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: mod.rs | DNA/src/world/mod.rs
//! PURPOSE: The Stage - grid dimensions and voxel indexing
//! LAYER: DNA → WORLD
//! ═══════════════════════════════════════════════════════════════════════════════

/// Uniform voxel grids and flat indexing
pub mod grid;

pub use grid::GridDims;
