//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: stencil.rs | DNA/src/physics/elastic/stencil.rs
//! PURPOSE: Staggered-grid finite-difference passes for the elastic wave equation
//! MODIFIED: 2026-07-18
//! LAYER: DNA (foundation)
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! ALGORITHM: Explicit velocity-stress leapfrog on a staggered voxel lattice
//!
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │ Stress pass (centred differences, pitch h):                                 │
//! │   θ    = ∂vx/∂x + ∂vy/∂y + ∂vz/∂z                                           │
//! │   sxx += dt · (λθ + 2μ ∂vx/∂x)          (syy, szz symmetric)                │
//! │   sxy += dt · μ (∂vx/∂y + ∂vy/∂x)       (sxz, syz symmetric)                │
//! │                                                                             │
//! │ Velocity pass (staggered one-sided differences):                            │
//! │   vx += dt/ρ · (Δ₋sxx + Δ₊sxy + Δ₊sxz) / h                                  │
//! │   normal-stress term: backward along its own axis  Δ₋f = f[i] − f[i−1]      │
//! │   shear terms:        forward along the diff axis  Δ₊f = f[i+1] − f[i]      │
//! │                                                                             │
//! │ Masking: only voxels whose label matches the selected material update.      │
//! │ Faces (index 0 / last on any axis) are never written: zero-velocity,        │
//! │ zero-stress Dirichlet walls giving reflection by omission.                  │
//! └─────────────────────────────────────────────────────────────────────────────┘
//!
//! Both passes are data-parallel over z-planes: a plane writes only its own
//! slab and reads neighbour values written by the *previous* pass, so no
//! cross-slab hazard exists inside a pass. The two passes are barrier
//! separated by construction (rayon joins before returning).
//!
//! USED BY:
//!   • SIMULATION/CORE/ACOUSTIC_ENGINE → CpuSolver per-step update
//!
//! ═══════════════════════════════════════════════════════════════════════════════

use rayon::prelude::*;

use super::fields::ElasticField3D;
use super::moduli::ElasticModuli;

/// Per-step coefficients shared by both passes.
#[derive(Clone, Copy, Debug)]
pub struct StencilParams {
    pub lambda: f64,
    pub mu: f64,
    pub dt: f64,
    /// Voxel pitch h (m)
    pub pitch: f64,
}

impl StencilParams {
    pub fn new(moduli: ElasticModuli, dt: f64, pitch: f64) -> Self {
        Self {
            lambda: moduli.lambda,
            mu: moduli.mu,
            dt,
            pitch,
        }
    }
}

/// Update all six stress components from the current velocity field.
pub fn update_stresses(field: &mut ElasticField3D, labels: &[u8], material_id: u8, p: &StencilParams) {
    let dims = field.dims;
    let (w, h, d) = (dims.width, dims.height, dims.depth);
    if w < 3 || h < 3 || d < 3 {
        return;
    }
    let plane = dims.plane();
    let inv_2h = 1.0 / (2.0 * p.pitch);
    let (lambda, mu, dt) = (p.lambda, p.mu, p.dt);

    let ElasticField3D {
        vx,
        vy,
        vz,
        sxx,
        syy,
        szz,
        sxy,
        sxz,
        syz,
        ..
    } = field;
    let (vx, vy, vz) = (&vx[..], &vy[..], &vz[..]);

    sxx.par_chunks_mut(plane)
        .zip(syy.par_chunks_mut(plane))
        .zip(szz.par_chunks_mut(plane))
        .zip(sxy.par_chunks_mut(plane))
        .zip(sxz.par_chunks_mut(plane))
        .zip(syz.par_chunks_mut(plane))
        .enumerate()
        .for_each(|(z, (((((sxx_p, syy_p), szz_p), sxy_p), sxz_p), syz_p))| {
            if z == 0 || z == d - 1 {
                return;
            }
            let base = z * plane;
            for y in 1..h - 1 {
                for x in 1..w - 1 {
                    let i = y * w + x;
                    let g = base + i;
                    if labels[g] != material_id {
                        continue;
                    }

                    // Centred velocity gradients
                    let dvx_dx = (vx[g + 1] - vx[g - 1]) * inv_2h;
                    let dvy_dy = (vy[g + w] - vy[g - w]) * inv_2h;
                    let dvz_dz = (vz[g + plane] - vz[g - plane]) * inv_2h;

                    let dvx_dy = (vx[g + w] - vx[g - w]) * inv_2h;
                    let dvx_dz = (vx[g + plane] - vx[g - plane]) * inv_2h;
                    let dvy_dx = (vy[g + 1] - vy[g - 1]) * inv_2h;
                    let dvy_dz = (vy[g + plane] - vy[g - plane]) * inv_2h;
                    let dvz_dx = (vz[g + 1] - vz[g - 1]) * inv_2h;
                    let dvz_dy = (vz[g + w] - vz[g - w]) * inv_2h;

                    // Dilatation
                    let theta = dvx_dx + dvy_dy + dvz_dz;

                    sxx_p[i] += dt * (lambda * theta + 2.0 * mu * dvx_dx);
                    syy_p[i] += dt * (lambda * theta + 2.0 * mu * dvy_dy);
                    szz_p[i] += dt * (lambda * theta + 2.0 * mu * dvz_dz);

                    sxy_p[i] += dt * mu * (dvx_dy + dvy_dx);
                    sxz_p[i] += dt * mu * (dvx_dz + dvz_dx);
                    syz_p[i] += dt * mu * (dvy_dz + dvz_dy);
                }
            }
        });
}

/// Update the three velocity components from the current stress field.
pub fn update_velocities(
    field: &mut ElasticField3D,
    labels: &[u8],
    density: &[f32],
    material_id: u8,
    p: &StencilParams,
) {
    let dims = field.dims;
    let (w, h, d) = (dims.width, dims.height, dims.depth);
    if w < 3 || h < 3 || d < 3 {
        return;
    }
    let plane = dims.plane();
    let inv_h = 1.0 / p.pitch;
    let dt = p.dt;

    let ElasticField3D {
        vx,
        vy,
        vz,
        sxx,
        syy,
        szz,
        sxy,
        sxz,
        syz,
        ..
    } = field;
    let (sxx, syy, szz) = (&sxx[..], &syy[..], &szz[..]);
    let (sxy, sxz, syz) = (&sxy[..], &sxz[..], &syz[..]);

    vx.par_chunks_mut(plane)
        .zip(vy.par_chunks_mut(plane))
        .zip(vz.par_chunks_mut(plane))
        .enumerate()
        .for_each(|(z, ((vx_p, vy_p), vz_p))| {
            if z == 0 || z == d - 1 {
                return;
            }
            let base = z * plane;
            for y in 1..h - 1 {
                for x in 1..w - 1 {
                    let i = y * w + x;
                    let g = base + i;
                    if labels[g] != material_id {
                        continue;
                    }

                    // Active voxels carry strictly positive density
                    let scale = dt / density[g] as f64 * inv_h;

                    // vx: ∂sxx/∂x backward, ∂sxy/∂y and ∂sxz/∂z forward
                    vx_p[i] += scale
                        * ((sxx[g] - sxx[g - 1]) + (sxy[g + w] - sxy[g]) + (sxz[g + plane] - sxz[g]));

                    // vy: ∂sxy/∂x forward, ∂syy/∂y backward, ∂syz/∂z forward
                    vy_p[i] += scale
                        * ((sxy[g + 1] - sxy[g]) + (syy[g] - syy[g - w]) + (syz[g + plane] - syz[g]));

                    // vz: ∂sxz/∂x forward, ∂syz/∂y forward, ∂szz/∂z backward
                    vz_p[i] += scale
                        * ((sxz[g + 1] - sxz[g]) + (syz[g + w] - syz[g]) + (szz[g] - szz[g - plane]));
                }
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::grid::GridDims;

    fn params() -> StencilParams {
        StencilParams::new(ElasticModuli::from_young_poisson(50e6, 0.25), 1e-7, 1e-4)
    }

    /// Seed a stress pulse in the middle, step both passes, and verify that
    /// masked and boundary voxels stayed untouched.
    #[test]
    fn test_masked_voxels_stay_zero() {
        let dims = GridDims::new(8, 8, 8);
        let mut labels = vec![1u8; dims.len()];
        let density = vec![2650.0f32; dims.len()];
        // Mask out one interior voxel next to the pulse
        let masked = dims.idx(5, 4, 4);
        labels[masked] = 0;

        let mut field = ElasticField3D::new(dims);
        field.sxx[dims.idx(4, 4, 4)] = 100.0;

        let p = params();
        for _ in 0..5 {
            update_stresses(&mut field, &labels, 1, &p);
            update_velocities(&mut field, &labels, &density, 1, &p);
        }

        assert_eq!(field.vx[masked], 0.0);
        assert_eq!(field.sxx[masked], 0.0);
        assert_eq!(field.syz[masked], 0.0);

        // Faces were never written
        for z in 0..8 {
            for y in 0..8 {
                for x in 0..8 {
                    if dims.is_boundary(x, y, z) && dims.idx(x, y, z) != dims.idx(4, 4, 4) {
                        let g = dims.idx(x, y, z);
                        assert_eq!(field.vx[g], 0.0, "face velocity written at {x},{y},{z}");
                        assert_eq!(field.syy[g], 0.0, "face stress written at {x},{y},{z}");
                    }
                }
            }
        }
    }

    /// A stress pulse must spread: neighbouring velocities become non-zero
    /// after one full step and the field stays finite.
    #[test]
    fn test_pulse_propagates_and_stays_finite() {
        let dims = GridDims::new(9, 9, 9);
        let labels = vec![1u8; dims.len()];
        let density = vec![2650.0f32; dims.len()];
        let mut field = ElasticField3D::new(dims);
        field.sxx[dims.idx(4, 4, 4)] = 100.0;

        let p = params();
        update_stresses(&mut field, &labels, 1, &p);
        update_velocities(&mut field, &labels, &density, 1, &p);

        // Backward x-difference of sxx drives vx at the pulse and its +x neighbour
        assert!(field.vx[dims.idx(4, 4, 4)] != 0.0);
        assert!(field.vx[dims.idx(5, 4, 4)] != 0.0);

        for _ in 0..50 {
            update_stresses(&mut field, &labels, 1, &p);
            update_velocities(&mut field, &labels, &density, 1, &p);
        }
        assert!(field.is_finite_sampled(1));
    }
}
