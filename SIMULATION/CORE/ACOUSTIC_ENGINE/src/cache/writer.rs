//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: writer.rs | SIMULATION/CORE/ACOUSTIC_ENGINE/src/cache/writer.rs
//! PURPOSE: Producer side of the frame cache - bounded queue, consumer thread
//! MODIFIED: 2026-07-18
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! The solver thread offers frames; a single consumer thread owns every file
//! handle and performs all disk I/O. The queue is bounded: when a 500 ms
//! offer times out the frame is dropped with a warning - the running solver
//! is never dropped, and never blocks longer than the offer window.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Sender, SendTimeoutError};
use dna::GridDims;
use tracing::{debug, error, warn};

use super::format::{write_metadata_header, FrameRecord, WaveFrame, METADATA_COUNT_OFFSET};
use super::CacheState;
use crate::error::{SimError, SimResult};

/// Frames the queue holds before offers start timing out.
const QUEUE_CAPACITY: usize = 100;

/// How long an offer may wait on a full queue.
const OFFER_TIMEOUT: Duration = Duration::from_millis(500);

/// Exclusive writer for one simulation's cache directory.
pub struct FrameCacheWriter {
    dir: PathBuf,
    tx: Option<Sender<WaveFrame>>,
    worker: Option<JoinHandle<SimResult<u32>>>,
    dropped: Arc<AtomicU32>,
    state: CacheState,
}

impl FrameCacheWriter {
    /// Create the cache directory (and metadata.dat) and start the consumer.
    pub fn create(dir: impl Into<PathBuf>, dims: GridDims) -> SimResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let metadata_path = dir.join("metadata.dat");
        let mut metadata = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&metadata_path)?;
        write_metadata_header(&mut metadata, dims)?;
        metadata.flush()?;

        let (tx, rx) = bounded::<WaveFrame>(QUEUE_CAPACITY);
        let worker_dir = dir.clone();
        let worker = std::thread::Builder::new()
            .name("frame-cache-writer".into())
            .spawn(move || consume(worker_dir, metadata, rx))
            .map_err(|e| SimError::IoFailure(format!("spawning cache writer: {}", e)))?;

        Ok(Self {
            dir,
            tx: Some(tx),
            worker: Some(worker),
            dropped: Arc::new(AtomicU32::new(0)),
            state: CacheState::Writing,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn state(&self) -> CacheState {
        self.state
    }

    /// Dropped-frame count so far.
    pub fn dropped_frames(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Offer a frame to the queue. A queue that stays full for the whole
    /// offer window drops the frame and reports `QueueFull`; the caller is
    /// expected to keep running either way.
    pub fn offer(&self, frame: WaveFrame) -> SimResult<()> {
        let Some(tx) = &self.tx else {
            return Err(SimError::QueueFull);
        };
        match tx.send_timeout(frame, OFFER_TIMEOUT) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(f)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(step = f.step, "frame cache queue full, dropping frame");
                Err(SimError::QueueFull)
            }
            Err(SendTimeoutError::Disconnected(f)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(step = f.step, "frame cache writer is gone, dropping frame");
                Err(SimError::IoFailure("frame cache writer thread is gone".into()))
            }
        }
    }

    /// Drain the queue and seal the cache: Writing → Flushing → ReadOnly.
    /// Returns the cache directory and how many frames reached disk.
    pub fn close(mut self) -> SimResult<(PathBuf, u32)> {
        self.state = CacheState::Flushing;
        drop(self.tx.take());
        let written = match self.worker.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| SimError::IoFailure("cache writer thread panicked".into()))??,
            None => 0,
        };
        self.state = CacheState::ReadOnly;
        debug!(written, dir = %self.dir.display(), "frame cache sealed");
        Ok((self.dir.clone(), written))
    }
}

/// Consumer loop: runs until the producer side hangs up, then drains.
fn consume(
    dir: PathBuf,
    mut metadata: File,
    rx: crossbeam_channel::Receiver<WaveFrame>,
) -> SimResult<u32> {
    let mut written = 0u32;
    while let Ok(frame) = rx.recv() {
        let name = WaveFrame::file_name(frame.step);
        let path = dir.join(&name);

        // One retry per frame write; a frame that fails twice is skipped so
        // the cache (and the solver feeding it) keeps going.
        if let Err(first) = write_frame_file(&path, &frame) {
            warn!(step = frame.step, error = %first, "frame write failed, retrying once");
            if let Err(second) = write_frame_file(&path, &frame) {
                error!(step = frame.step, error = %second, "frame write failed twice, skipping");
                continue;
            }
        }

        let record = FrameRecord {
            step: frame.step,
            file_name: name,
            p_value: frame.p_value,
            s_value: frame.s_value,
            p_progress: frame.p_progress,
            s_progress: frame.s_progress,
        };

        // Record goes to EOF, then the count at its fixed offset is bumped.
        // Metadata failures are fatal: without the index the cache is lost.
        metadata.seek(SeekFrom::End(0))?;
        record.write_to(&mut metadata)?;
        written += 1;
        metadata.seek(SeekFrom::Start(METADATA_COUNT_OFFSET))?;
        metadata.write_all(&written.to_le_bytes())?;
        metadata.flush()?;
    }
    Ok(written)
}

fn write_frame_file(path: &Path, frame: &WaveFrame) -> std::io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    frame.write_to(&mut w)?;
    w.flush()
}
