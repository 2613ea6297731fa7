//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: fields.rs | DNA/src/physics/elastic/fields.rs
//! PURPOSE: Nine-component elastic wave field state on a voxel grid
//! MODIFIED: 2026-07-18
//! LAYER: DNA (foundation)
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! Memory layout: one flat f64 `Vec` per component in row-major order
//! (`GridDims::idx`) for cache-friendly stencil sweeps. All components start
//! at zero and stay exactly zero on voxels the material mask excludes.

use crate::world::grid::GridDims;

/// The nine coupled field arrays of the velocity-stress formulation.
#[derive(Clone, Debug)]
pub struct ElasticField3D {
    pub dims: GridDims,

    // Particle velocities
    pub vx: Vec<f64>,
    pub vy: Vec<f64>,
    pub vz: Vec<f64>,

    // Normal stresses
    pub sxx: Vec<f64>,
    pub syy: Vec<f64>,
    pub szz: Vec<f64>,

    // Shear stresses
    pub sxy: Vec<f64>,
    pub sxz: Vec<f64>,
    pub syz: Vec<f64>,
}

impl ElasticField3D {
    pub fn new(dims: GridDims) -> Self {
        let n = dims.len();
        Self {
            dims,
            vx: vec![0.0; n],
            vy: vec![0.0; n],
            vz: vec![0.0; n],
            sxx: vec![0.0; n],
            syy: vec![0.0; n],
            szz: vec![0.0; n],
            sxy: vec![0.0; n],
            sxz: vec![0.0; n],
            syz: vec![0.0; n],
        }
    }

    /// Reset every component to zero for a fresh run.
    pub fn clear(&mut self) {
        for buf in [
            &mut self.vx,
            &mut self.vy,
            &mut self.vz,
            &mut self.sxx,
            &mut self.syy,
            &mut self.szz,
            &mut self.sxy,
            &mut self.sxz,
            &mut self.syz,
        ] {
            buf.fill(0.0);
        }
    }

    /// Velocity components at a voxel
    #[inline]
    pub fn velocity_at(&self, p: [usize; 3]) -> (f64, f64, f64) {
        let i = self.dims.idx(p[0], p[1], p[2]);
        (self.vx[i], self.vy[i], self.vz[i])
    }

    /// All nine components at a voxel, velocities first.
    pub fn components_at(&self, p: [usize; 3]) -> [f64; 9] {
        let i = self.dims.idx(p[0], p[1], p[2]);
        [
            self.vx[i], self.vy[i], self.vz[i], self.sxx[i], self.syy[i], self.szz[i],
            self.sxy[i], self.sxz[i], self.syz[i],
        ]
    }

    /// f32 deep copy of a component for snapshot publication.
    pub fn snapshot_f32(component: &[f64]) -> Vec<f32> {
        component.iter().map(|&v| v as f32).collect()
    }

    /// Strided finiteness sweep over all nine components. Used by debug
    /// builds to catch numerical blow-up early; `stride` trades coverage
    /// for cost.
    pub fn is_finite_sampled(&self, stride: usize) -> bool {
        let stride = stride.max(1);
        for buf in [
            &self.vx, &self.vy, &self.vz, &self.sxx, &self.syy, &self.szz, &self.sxy, &self.sxz,
            &self.syz,
        ] {
            if buf.iter().step_by(stride).any(|v| !v.is_finite()) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_resets_all_components() {
        let mut f = ElasticField3D::new(GridDims::new(4, 4, 4));
        f.vx[10] = 1.0;
        f.syz[20] = -2.0;
        f.clear();
        assert!(f.vx.iter().all(|&v| v == 0.0));
        assert!(f.syz.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_finite_sweep_detects_blow_up() {
        let mut f = ElasticField3D::new(GridDims::new(4, 4, 4));
        assert!(f.is_finite_sampled(1));
        f.szz[33] = f64::NAN;
        assert!(!f.is_finite_sampled(1));
    }
}
