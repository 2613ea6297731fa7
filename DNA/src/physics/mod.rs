//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: mod.rs | DNA/src/physics/mod.rs
//! PURPOSE: Physics root - elastodynamics, source wavelets, constants
//! MODIFIED: 2026-07-18
//! LAYER: DNA (foundation)
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! PHYSICS defines HOW things behave:
//! - core/    - Constants, reference material properties
//! - elastic/ - Lamé moduli, nine-field state, staggered-grid stencil
//! - fields/  - Source wavelets
//!
//! ═══════════════════════════════════════════════════════════════════════════════

pub mod core;
pub mod elastic;
pub mod fields;
