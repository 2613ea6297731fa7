//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: reader.rs | SIMULATION/CORE/ACOUSTIC_ENGINE/src/cache/reader.rs
//! PURPOSE: Read-through playback over a sealed frame cache
//! MODIFIED: 2026-07-18
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! Memory-light: decoded frames are handed out as `Arc` and tracked through
//! `Weak` references; a small keep-alive ring pins at most 10 frames so
//! scrubbing back and forth does not re-hit the disk. A missing or mis-magic
//! frame file is skipped with a warning and playback continues; a corrupt
//! metadata file is fatal.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use tracing::warn;

use super::format::{read_metadata, CacheMetadata, FrameRecord, WaveFrame};
use crate::error::{SimError, SimResult};

/// Decoded frames pinned against eviction.
const KEEP_ALIVE_FRAMES: usize = 10;

pub struct FrameCacheReader {
    dir: PathBuf,
    metadata: CacheMetadata,
    decoded: HashMap<usize, Weak<WaveFrame>>,
    keep_alive: VecDeque<Arc<WaveFrame>>,
}

impl FrameCacheReader {
    /// Open a sealed cache directory.
    pub fn open(dir: impl Into<PathBuf>) -> SimResult<Self> {
        let dir = dir.into();
        let metadata_path = dir.join("metadata.dat");
        let mut r = BufReader::new(File::open(&metadata_path).map_err(|e| {
            SimError::IoFailure(format!("opening {}: {}", metadata_path.display(), e))
        })?);
        let metadata = read_metadata(&mut r)?;
        Ok(Self {
            dir,
            metadata,
            decoded: HashMap::new(),
            keep_alive: VecDeque::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.metadata.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.frames.is_empty()
    }

    pub fn metadata(&self) -> &CacheMetadata {
        &self.metadata
    }

    pub fn record(&self, index: usize) -> Option<&FrameRecord> {
        self.metadata.frames.get(index)
    }

    /// Load a frame by playback index. `Ok(None)` means the frame file is
    /// missing or unreadable and playback should continue without it.
    pub fn frame(&mut self, index: usize) -> SimResult<Option<Arc<WaveFrame>>> {
        let record = self
            .metadata
            .frames
            .get(index)
            .ok_or_else(|| {
                SimError::InvalidParameters(format!(
                    "frame index {} out of range ({} frames)",
                    index,
                    self.metadata.frames.len()
                ))
            })?
            .clone();

        // Still alive from an earlier read?
        if let Some(weak) = self.decoded.get(&index) {
            if let Some(frame) = weak.upgrade() {
                self.pin(frame.clone());
                return Ok(Some(frame));
            }
        }

        let path = self.dir.join(&record.file_name);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) => {
                warn!(frame = %record.file_name, error = %e, "frame file missing, skipping");
                return Ok(None);
            }
        };
        let frame = match WaveFrame::read_from(&mut BufReader::new(file)) {
            Ok(f) => Arc::new(f),
            // Damage localised to one frame file never stops playback
            Err(SimError::Corrupted(msg)) => {
                warn!(frame = %record.file_name, %msg, "corrupt frame, skipping");
                return Ok(None);
            }
            Err(SimError::IoFailure(msg)) => {
                warn!(frame = %record.file_name, %msg, "unreadable frame, skipping");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        self.decoded.insert(index, Arc::downgrade(&frame));
        self.pin(frame.clone());
        Ok(Some(frame))
    }

    fn pin(&mut self, frame: Arc<WaveFrame>) {
        self.keep_alive.push_back(frame);
        while self.keep_alive.len() > KEEP_ALIVE_FRAMES {
            self.keep_alive.pop_front();
        }
        // Opportunistically shed entries whose frames have been freed
        self.decoded.retain(|_, w| w.strong_count() > 0);
    }
}
