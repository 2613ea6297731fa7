//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: tomography_tests.rs | SIMULATION/CORE/ACOUSTIC_ENGINE/tests/tomography_tests.rs
//! PURPOSE: Tomographic reconstruction over real solver output
//! MODIFIED: 2026-07-18
//! ═══════════════════════════════════════════════════════════════════════════════

use acoustic_engine::{CpuSolver, SolverBackend, SolverConfig};
use dna::data::volume::Axis;
use dna::{GridDims, VoxelVolume};

fn uniform_volume(n: usize) -> VoxelVolume {
    let dims = GridDims::new(n, n, n);
    VoxelVolume::with_axis(
        dims,
        1e-4,
        vec![1u8; dims.len()],
        vec![2650.0f32; dims.len()],
        1,
        Axis::Z,
    )
}

#[test]
fn test_tomogram_from_finished_run() {
    let mut solver = CpuSolver::new(
        uniform_volume(24),
        SolverConfig {
            max_steps: 400,
            ..SolverConfig::default()
        },
    )
    .unwrap();

    // Before the run there is nothing to reconstruct
    assert!(solver.tomogram(None).is_none());

    let results = solver.run().unwrap();
    let tomo = solver.tomogram(None).expect("finished run has a tomogram");

    let dims = solver.volume().dims;
    assert_eq!(tomo.velocity.len(), dims.len());

    // Every active voxel lands inside the clamp window around the run's Vp
    let (lo, hi) = tomo.histogram_range;
    assert!((lo - 0.5 * results.vp).abs() < 1e-9);
    assert!((hi - 1.5 * results.vp).abs() < 1e-9);
    for &v in &tomo.velocity {
        assert!(v as f64 >= lo - 1e-3 && v as f64 <= hi + 1e-3, "velocity {v} outside window");
        assert!(v > 0.0, "uniform active cube has no inactive voxels");
    }

    // Histogram accounts for every active voxel exactly once
    let total: u32 = tomo.histogram.iter().sum();
    assert_eq!(total as usize, dims.len());

    // Display window is inside (or at) the observed extremes, padded
    assert!(tomo.observed_min <= tomo.observed_max);
    assert!(tomo.display_window.0 <= tomo.display_window.1);
}

#[test]
fn test_silent_run_uses_density_fallback() {
    // Masked-out transmitter: the field stays zero, amplitudes degenerate
    let n = 16;
    let dims = GridDims::new(n, n, n);
    let mut labels = vec![1u8; dims.len()];
    labels[dims.idx(8, 8, 8)] = 0;
    let mut volume = VoxelVolume::with_axis(
        dims,
        1e-4,
        labels,
        vec![2650.0f32; dims.len()],
        1,
        Axis::Z,
    );
    volume.tx = [8, 8, 8];
    volume.rx = [8, 8, 8];

    let mut solver = CpuSolver::new(
        volume,
        SolverConfig {
            max_steps: 50,
            use_auto_stop: false,
            ..SolverConfig::default()
        },
    )
    .unwrap();
    let results = solver.run().unwrap();
    assert_eq!(results.step_p, 0);

    let tomo = solver.tomogram(None).unwrap();
    // Density-only fallback on a uniform medium: velocity decreases with
    // distance from the volume centre and never exceeds Vp
    let centre = tomo.velocity[dims.idx(8, 8, 8 + 1)];
    let corner = tomo.velocity[dims.idx(1, 1, 1)];
    assert!(centre > corner, "{centre} vs {corner}");
    assert!(centre as f64 <= results.vp + 1e-6);
}
