//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: mod.rs | DNA/src/math/mod.rs
//! PURPOSE: The Language - statistics and spectral helpers
//! LAYER: DNA → MATH
//! ═══════════════════════════════════════════════════════════════════════════════

/// Percentiles and simple descriptive statistics
pub mod stats;
pub use stats::*;

/// Naive discrete Fourier transform (diagnostics, tests)
pub mod spectrum;
pub use spectrum::*;
