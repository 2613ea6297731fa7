//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: lib.rs | DNA/src/lib.rs
//! PURPOSE: Foundation library root - volumes, elastodynamics, math, grids
//! MODIFIED: 2026-07-18
//! LAYER: DNA (foundation)
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! DNA holds everything the acoustic engines share:
//! - world/    - The Stage (grid dimensions, flat indexing)
//! - physics/  - The Rules (elastic moduli, staggered stencil, source wavelets)
//! - math/     - The Language (statistics, spectra)
//! - data/     - Data structures (voxel volumes, transducer layout)
//!
//! ═══════════════════════════════════════════════════════════════════════════════

/// WORLD - The Stage (grid dimensions, indexing)
pub mod world;

/// PHYSICS - The Rules (elastodynamics, wavelets)
pub mod physics;

/// MATH - The Language (statistics, spectra)
pub mod math;

/// DATA - Data Structures (voxel volumes)
pub mod data;

// Re-export core simulation types at crate root for convenience
pub use data::volume::{Axis, VoxelVolume};
pub use physics::elastic::fields::ElasticField3D;
pub use physics::elastic::moduli::ElasticModuli;
pub use physics::elastic::stencil::{update_stresses, update_velocities, StencilParams};
pub use physics::fields::wave::RickerWavelet;
pub use world::grid::GridDims;
