//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: lib.rs | SIMULATION/CORE/ACOUSTIC_ENGINE/src/lib.rs
//! PURPOSE: Acoustic velocity simulation engine (P/S-wave travel-time analysis)
//! MODIFIED: 2026-07-18
//! LAYER: CORE → ACOUSTIC_ENGINE
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! ACOUSTIC_ENGINE simulates elastic wave propagation through a segmented
//! voxel volume (e.g. a CT-scanned core) to measure P- and S-wave velocities
//! between a transmitter and a receiver:
//! - Time-domain staggered-grid solver over nine coupled fields
//! - Receiver-energy auto-stop, progress/snapshot bus, frame cache
//! - Tomographic reconstruction of a per-voxel velocity field
//!
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │ ARCHITECTURE                                                                │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │                                                                             │
//! │   CpuSolver / GpuSolver : SolverBackend                                     │
//! │       │                                                                     │
//! │       ├── StabilityPlan        (CFL time step, Lamé moduli)                 │
//! │       ├── RickerWavelet        (DNA/physics/fields/wave)                    │
//! │       ├── update_stresses/velocities (DNA/physics/elastic/stencil)          │
//! │       ├── AutoStopController   (receiver energy peak/decay)                 │
//! │       ├── ProgressBus          (non-blocking fan-out, f32 snapshots)        │
//! │       └── FrameCacheWriter     (bounded queue → writer thread → disk)       │
//! │                                                                             │
//! │   Post-run:                                                                 │
//! │   - Reconstructor  → per-voxel tomogram + histogram + display window        │
//! │   - SolverCheckpoint → "ACOUSTICSIM" binary with sparse wave fields         │
//! │   - FrameCacheReader → playback of persisted steps                          │
//! │                                                                             │
//! └─────────────────────────────────────────────────────────────────────────────┘
//!
//! DEPENDS ON:
//!   • DNA/data/volume      → VoxelVolume, Axis
//!   • DNA/physics/elastic  → moduli, nine-field state, stencil passes
//!   • DNA/physics/fields   → RickerWavelet
//!
//! USED BY:
//!   • TOOLS/ACOUSTIC_CLI → native runner and cache playback
//!
//! ═══════════════════════════════════════════════════════════════════════════════

// ─────────────────────────────────────────────────────────────────────────────────
// CODE BELOW - Optimized for ML development
// ─────────────────────────────────────────────────────────────────────────────────

pub mod autostop;
pub mod cache;
pub mod error;
pub mod gpu;
pub mod persist;
pub mod progress;
pub mod solver;
pub mod stability;
pub mod tomography;

mod shaders;

pub use autostop::AutoStopController;
pub use cache::{
    default_cache_root, CacheState, FrameCacheReader, FrameCacheWriter, FrameRecord, WaveFrame,
};
pub use error::{SimError, SimResult};
pub use gpu::GpuSolver;
pub use persist::{SolverCheckpoint, SparseField};
pub use progress::{ProgressBus, ProgressEvent, SolverEvent};
pub use solver::{
    CancelToken, CpuSolver, ReceiverTrace, SimulationResults, SolverBackend, SolverConfig,
    WaveMode, TOUCH_THRESHOLD,
};
pub use stability::StabilityPlan;
pub use tomography::{Reconstructor, Tomogram};
