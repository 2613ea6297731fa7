//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: stability.rs | SIMULATION/CORE/ACOUSTIC_ENGINE/src/stability.rs
//! PURPOSE: CFL-safe time-step planning for the staggered elastic stencil
//! MODIFIED: 2026-07-18
//! ═══════════════════════════════════════════════════════════════════════════════

use dna::ElasticModuli;

use crate::error::{SimError, SimResult};

/// CFL coefficient for the second-order staggered stencil in 3D.
const CFL: f64 = 0.4;

/// Minimum samples per source period.
const SAMPLES_PER_PERIOD: f64 = 20.0;

/// Everything derived once at solver construction: Lamé parameters, the
/// stable time step, and the expected pre-arrival iteration count.
#[derive(Clone, Copy, Debug)]
pub struct StabilityPlan {
    pub moduli: ElasticModuli,
    /// Time step (s), fixed for the whole run
    pub dt: f64,
    /// Upper bound on P-velocity in the volume (m/s)
    pub vp_max: f64,
    /// Steps the P front needs to reach the receiver at `vp_max`
    pub expected_pre_touch_steps: u32,
}

impl StabilityPlan {
    /// Derive the plan from engineering constants.
    ///
    /// `young_mpa` is in MPa, `pitch` in metres, `rho_min` the minimum
    /// density over active voxels (kg/m³), `frequency_hz` the source centre
    /// frequency, `tx_rx_distance_m` the transducer separation.
    pub fn new(
        young_mpa: f64,
        poisson: f64,
        pitch: f64,
        rho_min: f64,
        frequency_hz: f64,
        tx_rx_distance_m: f64,
    ) -> SimResult<Self> {
        if !(0.0..0.5).contains(&poisson) || poisson == 0.0 {
            return Err(SimError::InvalidParameters(format!(
                "Poisson's ratio must be in (0, 0.5), got {}",
                poisson
            )));
        }
        if young_mpa <= 0.0 {
            return Err(SimError::InvalidParameters(format!(
                "Young's modulus must be positive, got {} MPa",
                young_mpa
            )));
        }
        if rho_min <= 0.0 {
            return Err(SimError::InvalidParameters(format!(
                "minimum active density must be positive, got {} kg/m³",
                rho_min
            )));
        }
        if pitch <= 0.0 {
            return Err(SimError::InvalidParameters(format!(
                "voxel pitch must be positive, got {} m",
                pitch
            )));
        }
        if frequency_hz <= 0.0 {
            return Err(SimError::InvalidParameters(format!(
                "source frequency must be positive, got {} Hz",
                frequency_hz
            )));
        }

        let moduli = ElasticModuli::from_young_poisson(young_mpa * 1e6, poisson);
        let vp_max = moduli.vp(rho_min);

        // CFL bound, additionally capped so one source period spans at
        // least 20 samples
        let dt = (CFL * pitch / vp_max).min(1.0 / (SAMPLES_PER_PERIOD * frequency_hz));

        let expected_pre_touch_steps = (tx_rx_distance_m / (dt * vp_max)).ceil().max(1.0) as u32;

        Ok(Self {
            moduli,
            dt,
            vp_max,
            expected_pre_touch_steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cfl_bound_holds() {
        let plan = StabilityPlan::new(50.0, 0.25, 1e-4, 2650.0, 100e3, 63e-4).unwrap();
        assert!(plan.dt * plan.vp_max <= 0.4 * 1e-4 + 1e-18);
        // E = 50 MPa, nu = 0.25 -> lambda = mu = 20 MPa
        assert!((plan.moduli.mu - 20e6).abs() < 1.0);
    }

    #[test]
    fn test_frequency_clause_caps_dt() {
        // Stiff medium: CFL allows a bigger step than 20 samples/period does
        let plan = StabilityPlan::new(50e3, 0.25, 1e-2, 2650.0, 100e3, 0.63).unwrap();
        assert!((plan.dt - 1.0 / (20.0 * 100e3)).abs() < 1e-15);
    }

    #[test]
    fn test_rejects_bad_ranges() {
        assert!(StabilityPlan::new(50.0, 0.5, 1e-4, 2650.0, 100e3, 1e-3).is_err());
        assert!(StabilityPlan::new(50.0, 0.0, 1e-4, 2650.0, 100e3, 1e-3).is_err());
        assert!(StabilityPlan::new(-1.0, 0.25, 1e-4, 2650.0, 100e3, 1e-3).is_err());
        assert!(StabilityPlan::new(50.0, 0.25, 1e-4, 0.0, 100e3, 1e-3).is_err());
        assert!(StabilityPlan::new(50.0, 0.25, 1e-4, 2650.0, 0.0, 1e-3).is_err());
    }
}
