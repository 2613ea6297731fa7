//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: mod.rs | DNA/src/physics/fields/mod.rs
//! PURPOSE: Field sources - excitation wavelets
//! LAYER: DNA → PHYSICS → FIELDS
//! ═══════════════════════════════════════════════════════════════════════════════

/// Ricker source wavelet
pub mod wave;

pub use wave::RickerWavelet;
