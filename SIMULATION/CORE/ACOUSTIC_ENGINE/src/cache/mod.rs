//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: mod.rs | SIMULATION/CORE/ACOUSTIC_ENGINE/src/cache/mod.rs
//! PURPOSE: Disk-backed frame cache - append-only store of per-step wave fields
//! MODIFIED: 2026-07-18
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │ ARCHITECTURE                                                                │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │                                                                             │
//! │   solver thread ──offer()──▶ bounded queue ──▶ writer thread ──▶ disk       │
//! │                  (500 ms, then drop + warn)    (owns all handles)           │
//! │                                                                             │
//! │   FrameCacheWriter states: Writing ──▶ Flushing ──▶ ReadOnly (one-way)      │
//! │   FrameCacheReader: read-through, ≤10 decoded frames via weak refs          │
//! │                                                                             │
//! │   <cache root>/<simulation>/metadata.dat     "ACSIM" index                  │
//! │   <cache root>/<simulation>/frame_XXXXXXXX.dat   "FRAME" payloads           │
//! │                                                                             │
//! └─────────────────────────────────────────────────────────────────────────────┘
//!
//! ═══════════════════════════════════════════════════════════════════════════════

pub mod format;
pub mod reader;
pub mod writer;

pub use format::{CacheMetadata, FrameRecord, WaveFrame};
pub use reader::FrameCacheReader;
pub use writer::FrameCacheWriter;

use std::path::PathBuf;

/// Lifecycle of a cache directory. Transitions are one-way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheState {
    /// Exclusive producer appending frames
    Writing,
    /// Queue draining on close
    Flushing,
    /// Sealed; any number of readers
    ReadOnly,
}

/// Default cache root: `<local app data>/AcousticSimulator/SimulationCache`.
/// Embedders may point the writer anywhere else.
pub fn default_cache_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("AcousticSimulator")
        .join("SimulationCache")
}
