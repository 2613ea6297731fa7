//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: mod.rs | DNA/src/physics/core/mod.rs
//! PURPOSE: Physical constants and reference material properties
//! LAYER: DNA → PHYSICS → CORE
//! ═══════════════════════════════════════════════════════════════════════════════

pub mod constants;

pub use constants::*;
