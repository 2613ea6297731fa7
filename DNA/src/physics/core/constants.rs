//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: constants.rs | DNA/src/physics/core/constants.rs
//! PURPOSE: Reference densities for common rock-forming minerals
//! LAYER: DNA → PHYSICS → CORE
//! ═══════════════════════════════════════════════════════════════════════════════

// Quartz density (kg/m³)
pub const QUARTZ_DENSITY: f64 = 2650.0;

// Pyrite density (kg/m³) - common dense inclusion in CT-scanned cores
pub const PYRITE_DENSITY: f64 = 5010.0;
