//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: tomography.rs | SIMULATION/CORE/ACOUSTIC_ENGINE/src/tomography.rs
//! PURPOSE: Per-voxel velocity reconstruction from final wave-field snapshots
//! MODIFIED: 2026-07-18
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! ALGORITHM: Amplitude/proximity/density modulation around the global Vp
//!
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │ Per active voxel:                                                           │
//! │   A        = |vx| + |vy|                                                    │
//! │   mod_amp  = clamp(0.2·log10(A·d_TX / ε), −0.3, 0.3)                        │
//! │   prox     = max(0, 1 − min(1, d_path/10))        (10-voxel ray corridor)   │
//! │   mod_ρ    = 0.15·(ρ/ρ̄ − 1)                                                 │
//! │   V        = Vp·(1 + 0.7·mod_amp·prox + 0.5·mod_ρ·(1 − prox))               │
//! │ clamped to [0.5·Vp, 1.5·Vp].                                                │
//! │                                                                             │
//! │ Degenerate amplitudes fall back to density-only:                            │
//! │   V = Vp·√(ρ/ρ̄)·(1 − 0.1·r_norm)                                            │
//! └─────────────────────────────────────────────────────────────────────────────┘
//!
//! Distances are in voxel units. The ray path defaults to the direct TX→RX
//! segment; callers may pass a refraction polyline instead.

use dna::math::percentile_sorted;
use dna::{GridDims, VoxelVolume};
use glam::DVec3;

/// Reference amplitude for the logarithmic modulation term.
const AMP_REFERENCE: f64 = 1e-9;

/// Below this peak amplitude the wave field carries no usable signal.
const AMP_DEGENERATE: f64 = 1e-12;

/// Histogram resolution over [0.5·Vp, 1.5·Vp].
const HISTOGRAM_BINS: usize = 100;

/// Reconstructed per-voxel velocity field with its histogram and the
/// adaptive display window.
#[derive(Clone, Debug)]
pub struct Tomogram {
    pub dims: GridDims,
    /// Velocity per voxel (m/s); exactly 0 on inactive voxels
    pub velocity: Vec<f32>,
    /// Counts over `histogram_range` in 100 bins
    pub histogram: Vec<u32>,
    pub histogram_range: (f64, f64),
    /// Extremes over active voxels
    pub observed_min: f32,
    pub observed_max: f32,
    /// 5th/95th-percentile window padded by 5% of the spread
    pub display_window: (f32, f32),
}

/// One reconstruction pass bound to a volume and a pair of field snapshots.
pub struct Reconstructor<'a> {
    volume: &'a VoxelVolume,
    vx: &'a [f64],
    vy: &'a [f64],
    global_vp: f64,
    mean_density: f64,
    ray: Vec<DVec3>,
    degenerate: bool,
    centre: DVec3,
    max_radius: f64,
}

impl<'a> Reconstructor<'a> {
    /// `ray_path`: optional refraction polyline in voxel coordinates; the
    /// direct TX→RX segment is used when absent.
    pub fn new(
        volume: &'a VoxelVolume,
        vx: &'a [f64],
        vy: &'a [f64],
        global_vp: f64,
        ray_path: Option<Vec<DVec3>>,
    ) -> Self {
        let ray = ray_path
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| vec![volume.tx_pos(), volume.rx_pos()]);

        // Peak |vx|+|vy| over active voxels decides signal vs fallback
        let mut max_amp = 0.0f64;
        for i in 0..volume.dims.len() {
            if volume.is_active_idx(i) {
                max_amp = max_amp.max(vx[i].abs() + vy[i].abs());
            }
        }

        let dims = volume.dims;
        let centre = DVec3::new(
            dims.width as f64 / 2.0,
            dims.height as f64 / 2.0,
            dims.depth as f64 / 2.0,
        );

        Self {
            volume,
            vx,
            vy,
            global_vp,
            mean_density: volume.mean_active_density(),
            ray,
            degenerate: max_amp < AMP_DEGENERATE,
            centre,
            max_radius: centre.length().max(1e-12),
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }

    /// Reconstructed velocity at one voxel; 0 for inactive voxels.
    pub fn value_at(&self, x: usize, y: usize, z: usize) -> f32 {
        if !self.volume.is_active(x, y, z) {
            return 0.0;
        }
        let i = self.volume.dims.idx(x, y, z);
        let p = DVec3::new(x as f64, y as f64, z as f64);
        let vp = self.global_vp;
        let rho_ratio = self.volume.density[i] as f64 / self.mean_density;

        let v = if self.degenerate {
            let r_norm = p.distance(self.centre) / self.max_radius;
            vp * rho_ratio.sqrt() * (1.0 - 0.1 * r_norm)
        } else {
            let amp = self.vx[i].abs() + self.vy[i].abs();
            let d_tx = p.distance(self.volume.tx_pos());
            let d_path = distance_to_polyline(p, &self.ray);

            let mod_amp = (0.2 * ((amp * d_tx) / AMP_REFERENCE).log10()).clamp(-0.3, 0.3);
            let prox = (1.0 - (d_path / 10.0).min(1.0)).max(0.0);
            let mod_rho = 0.15 * (rho_ratio - 1.0);

            vp * (1.0 + 0.7 * mod_amp * prox + 0.5 * mod_rho * (1.0 - prox))
        };

        v.clamp(0.5 * vp, 1.5 * vp) as f32
    }

    /// Full-volume reconstruction with histogram and display window.
    pub fn reconstruct(&self) -> Tomogram {
        let dims = self.volume.dims;
        let lo = 0.5 * self.global_vp;
        let hi = 1.5 * self.global_vp;
        let bin_width = (hi - lo) / HISTOGRAM_BINS as f64;

        let mut velocity = vec![0.0f32; dims.len()];
        let mut histogram = vec![0u32; HISTOGRAM_BINS];
        let mut active_values = Vec::new();
        let mut observed_min = f32::MAX;
        let mut observed_max = f32::MIN;

        for z in 0..dims.depth {
            for y in 0..dims.height {
                for x in 0..dims.width {
                    let i = dims.idx(x, y, z);
                    if !self.volume.is_active_idx(i) {
                        continue;
                    }
                    let v = self.value_at(x, y, z);
                    velocity[i] = v;
                    active_values.push(v);
                    observed_min = observed_min.min(v);
                    observed_max = observed_max.max(v);

                    let bin = (((v as f64 - lo) / bin_width) as usize).min(HISTOGRAM_BINS - 1);
                    histogram[bin] += 1;
                }
            }
        }

        if active_values.is_empty() {
            observed_min = 0.0;
            observed_max = 0.0;
        }

        active_values.sort_by(f32::total_cmp);
        let p5 = percentile_sorted(&active_values, 5.0);
        let p95 = percentile_sorted(&active_values, 95.0);
        let pad = 0.05 * (p95 - p5);

        Tomogram {
            dims,
            velocity,
            histogram,
            histogram_range: (lo, hi),
            observed_min,
            observed_max,
            display_window: (p5 - pad, p95 + pad),
        }
    }
}

/// Minimum distance from `p` to a polyline (or single point).
fn distance_to_polyline(p: DVec3, path: &[DVec3]) -> f64 {
    match path {
        [] => 0.0,
        [single] => p.distance(*single),
        _ => path
            .windows(2)
            .map(|seg| distance_to_segment(p, seg[0], seg[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

fn distance_to_segment(p: DVec3, a: DVec3, b: DVec3) -> f64 {
    let ab = b - a;
    let len2 = ab.length_squared();
    if len2 == 0.0 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dna::data::volume::Axis;

    fn uniform_volume(n: usize) -> VoxelVolume {
        let dims = GridDims::new(n, n, n);
        VoxelVolume::with_axis(
            dims,
            1e-4,
            vec![1u8; dims.len()],
            vec![2650.0; dims.len()],
            1,
            Axis::Z,
        )
    }

    #[test]
    fn test_segment_distance() {
        let a = DVec3::ZERO;
        let b = DVec3::new(10.0, 0.0, 0.0);
        assert_eq!(distance_to_segment(DVec3::new(5.0, 3.0, 0.0), a, b), 3.0);
        assert_eq!(distance_to_segment(DVec3::new(-4.0, 0.0, 0.0), a, b), 4.0);
        assert_eq!(distance_to_segment(DVec3::new(13.0, 4.0, 0.0), a, b), 5.0);
    }

    #[test]
    fn test_degenerate_fields_use_density_fallback() {
        let vol = uniform_volume(8);
        let zeros = vec![0.0f64; vol.dims.len()];
        let rec = Reconstructor::new(&vol, &zeros, &zeros, 1500.0, None);
        assert!(rec.is_degenerate());

        // Uniform density: fallback reduces to Vp·(1 − 0.1·r_norm)
        let centre_v = rec.value_at(4, 4, 4);
        let corner_v = rec.value_at(1, 1, 1);
        assert!(centre_v > corner_v, "{centre_v} vs {corner_v}");
        assert!(centre_v <= 1500.0);
    }

    #[test]
    fn test_reconstruction_bounds_and_mask() {
        let mut vol = uniform_volume(8);
        // Mask one voxel out
        let off = vol.dims.idx(2, 2, 2);
        vol.labels[off] = 0;

        let mut vx = vec![0.0f64; vol.dims.len()];
        let vy = vec![0.0f64; vol.dims.len()];
        // Strong signal near the ray
        let on_ray = vol.dims.idx(4, 4, 3);
        vx[on_ray] = 1e-3;

        let rec = Reconstructor::new(&vol, &vx, &vy, 1500.0, None);
        assert!(!rec.is_degenerate());
        let tomo = rec.reconstruct();

        assert_eq!(tomo.velocity[off], 0.0, "masked voxel must stay zero");
        for &v in &tomo.velocity {
            assert!(v >= 0.0 && v as f64 <= 1.5 * 1500.0 + 1e-3);
        }
        assert_eq!(tomo.histogram.len(), 100);
        let total: u32 = tomo.histogram.iter().sum();
        assert_eq!(total as usize, vol.active_count());
        assert!(tomo.display_window.0 <= tomo.display_window.1);
    }
}
