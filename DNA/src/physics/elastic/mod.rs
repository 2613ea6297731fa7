//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: mod.rs | DNA/src/physics/elastic/mod.rs
//! PURPOSE: Linear elastodynamics - moduli, field state, staggered stencil
//! MODIFIED: 2026-07-18
//! LAYER: DNA → PHYSICS → ELASTIC
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │ PDE: velocity-stress form of the isotropic elastic wave equation            │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │   ρ ∂v/∂t = ∇·σ                                                             │
//! │   ∂σ/∂t   = λ (∇·v) I + μ (∇v + ∇vᵀ)                                        │
//! │                                                                             │
//! │ Nine coupled fields on a staggered voxel lattice:                           │
//! │   v  = (vx, vy, vz)            particle velocities                          │
//! │   σ  = (sxx, syy, szz)         normal stresses                              │
//! │        (sxy, sxz, syz)         shear stresses                               │
//! │                                                                             │
//! │ Leapfrogged per step: all stresses first, then all velocities.              │
//! │ Stability (CFL): dt · √((λ+2μ)/ρ_min) ≤ 0.4 · h                             │
//! └─────────────────────────────────────────────────────────────────────────────┘
//!
//! DATA DEFINED:
//!   ElasticModuli  - λ, μ derived from Young's modulus and Poisson's ratio
//!   ElasticField3D - the nine flat field arrays
//!   StencilParams  - precomputed per-step coefficients
//!
//! USED BY:
//!   • SIMULATION/CORE/ACOUSTIC_ENGINE → CpuSolver field passes
//!
//! ═══════════════════════════════════════════════════════════════════════════════

pub mod fields;
pub mod moduli;
pub mod stencil;

pub use fields::ElasticField3D;
pub use moduli::ElasticModuli;
pub use stencil::{update_stresses, update_velocities, StencilParams};
