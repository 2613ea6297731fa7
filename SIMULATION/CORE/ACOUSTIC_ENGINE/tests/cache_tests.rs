//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: cache_tests.rs | SIMULATION/CORE/ACOUSTIC_ENGINE/tests/cache_tests.rs
//! PURPOSE: Frame cache write/read round-trips and damage tolerance
//! MODIFIED: 2026-07-18
//! ═══════════════════════════════════════════════════════════════════════════════

use acoustic_engine::{
    CpuSolver, FrameCacheReader, FrameCacheWriter, SimError, SolverBackend, SolverConfig, WaveFrame,
};
use dna::data::volume::Axis;
use dna::{GridDims, VoxelVolume};
use tempfile::tempdir;

fn synthetic_frame(dims: GridDims, step: u32) -> WaveFrame {
    let n = dims.len();
    let fill = |scale: f32| (0..n).map(|i| i as f32 * scale + step as f32).collect::<Vec<_>>();
    let plane = dims.width * dims.depth;
    WaveFrame {
        step,
        dims,
        plane_dims: (dims.width as u32, dims.depth as u32),
        vx: fill(0.5),
        vy: fill(-0.25),
        vz: fill(2.0),
        tomo_slice: vec![1480.0 + step as f32; plane],
        cross_section: vec![1e-5 * step as f32; plane],
        p_value: 1e-6 * step as f32,
        s_value: 2e-6 * step as f32,
        p_progress: (step as f32 / 100.0).min(1.0),
        s_progress: (step as f32 / 173.0).min(1.0),
        p_series: (0..=step).map(|s| s as f32 * 1e-7).collect(),
        s_series: (0..=step).map(|s| s as f32 * 2e-7).collect(),
    }
}

#[test]
fn test_write_then_read_returns_equal_frames() {
    let root = tempdir().unwrap();
    let dims = GridDims::new(6, 5, 4);
    let writer = FrameCacheWriter::create(root.path().join("sim"), dims).unwrap();

    let frames: Vec<WaveFrame> = (0..12).map(|k| synthetic_frame(dims, k * 10)).collect();
    for f in &frames {
        writer.offer(f.clone()).expect("offer rejected frame");
    }
    assert_eq!(writer.dropped_frames(), 0);
    let (dir, written) = writer.close().unwrap();
    assert_eq!(written, 12);

    let mut reader = FrameCacheReader::open(&dir).unwrap();
    assert_eq!(reader.len(), 12);
    assert_eq!(reader.metadata().dims, dims);

    for (k, expected) in frames.iter().enumerate() {
        let record = reader.record(k).unwrap().clone();
        assert_eq!(record.step, expected.step);
        assert_eq!(record.file_name, WaveFrame::file_name(expected.step));
        assert_eq!(record.p_value, expected.p_value);
        assert_eq!(record.s_progress, expected.s_progress);

        let frame = reader.frame(k).unwrap().expect("frame should load");
        assert_eq!(&*frame, expected, "frame {} differs after round-trip", k);
    }
}

#[test]
fn test_missing_frame_is_skipped_not_fatal() {
    let root = tempdir().unwrap();
    let dims = GridDims::new(4, 4, 4);
    let writer = FrameCacheWriter::create(root.path().join("sim"), dims).unwrap();
    for k in 0..3 {
        writer.offer(synthetic_frame(dims, k)).unwrap();
    }
    let (dir, _) = writer.close().unwrap();

    // Damage the middle frame two ways: delete one, garble another's magic
    std::fs::remove_file(dir.join(WaveFrame::file_name(1))).unwrap();

    let mut reader = FrameCacheReader::open(&dir).unwrap();
    assert_eq!(reader.len(), 3);
    assert!(reader.frame(0).unwrap().is_some());
    assert!(reader.frame(1).unwrap().is_none(), "missing file must skip");
    assert!(reader.frame(2).unwrap().is_some());
}

#[test]
fn test_garbled_frame_magic_is_skipped() {
    let root = tempdir().unwrap();
    let dims = GridDims::new(4, 4, 4);
    let writer = FrameCacheWriter::create(root.path().join("sim"), dims).unwrap();
    writer.offer(synthetic_frame(dims, 0)).unwrap();
    let (dir, _) = writer.close().unwrap();

    let path = dir.join(WaveFrame::file_name(0));
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[0] = b'Z';
    std::fs::write(&path, bytes).unwrap();

    let mut reader = FrameCacheReader::open(&dir).unwrap();
    assert!(reader.frame(0).unwrap().is_none());
}

#[test]
fn test_corrupt_metadata_is_fatal() {
    let root = tempdir().unwrap();
    let dims = GridDims::new(4, 4, 4);
    let writer = FrameCacheWriter::create(root.path().join("sim"), dims).unwrap();
    writer.offer(synthetic_frame(dims, 0)).unwrap();
    let (dir, _) = writer.close().unwrap();

    let path = dir.join("metadata.dat");
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[0] = b'Z';
    std::fs::write(&path, bytes).unwrap();

    match FrameCacheReader::open(&dir) {
        Err(SimError::Corrupted(_)) => {}
        other => panic!("expected Corrupted, got {:?}", other.err()),
    }
}

#[test]
fn test_solver_populates_cache_on_capture_cadence() {
    let root = tempdir().unwrap();
    let dims = GridDims::new(16, 16, 16);
    let volume = VoxelVolume::with_axis(
        dims,
        1e-4,
        vec![1u8; dims.len()],
        vec![2650.0f32; dims.len()],
        1,
        Axis::Z,
    );
    let config = SolverConfig {
        max_steps: 80,
        use_auto_stop: false,
        snapshot_interval: 10,
        ..SolverConfig::default()
    };
    let mut solver = CpuSolver::new(volume, config).unwrap();
    solver.attach_frame_cache(root.path().join("run1")).unwrap();
    let results = solver.run().unwrap();

    let mut reader = FrameCacheReader::open(root.path().join("run1")).unwrap();
    assert!(reader.len() >= 1);
    for k in 0..reader.len() {
        let record = reader.record(k).unwrap();
        assert_eq!(record.step % 10, 0, "capture off cadence at {}", record.step);
        assert!(record.step < results.total_steps);
    }
    // Every persisted frame decodes and matches the grid
    let frame = reader.frame(0).unwrap().unwrap();
    assert_eq!(frame.dims, dims);
    assert_eq!(frame.vx.len(), dims.len());
    // Receiver series in frame k covers exactly the steps executed so far
    let last = reader.len() - 1;
    let record_step = reader.record(last).unwrap().step;
    let frame = reader.frame(last).unwrap().unwrap();
    assert_eq!(frame.p_series.len() as u32, record_step + 1);
}
