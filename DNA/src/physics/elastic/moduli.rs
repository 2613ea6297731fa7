//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: moduli.rs | DNA/src/physics/elastic/moduli.rs
//! PURPOSE: Lamé parameters and body-wave velocities for isotropic media
//! MODIFIED: 2026-07-18
//! LAYER: DNA (foundation)
//! ═══════════════════════════════════════════════════════════════════════════════

use serde::{Deserialize, Serialize};

/// Lamé parameters of an isotropic linear-elastic material.
///
/// Derived from engineering constants:
///   μ = E / (2(1+ν))
///   λ = Eν / ((1+ν)(1−2ν))
///
/// The conversion divides by (1−2ν), so callers must reject ν outside
/// (0, 0.5) before constructing; this type performs no validation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ElasticModuli {
    /// First Lamé parameter λ (Pa)
    pub lambda: f64,
    /// Shear modulus μ (Pa)
    pub mu: f64,
}

impl ElasticModuli {
    /// From Young's modulus (Pa) and Poisson's ratio.
    pub fn from_young_poisson(young_pa: f64, poisson: f64) -> Self {
        let mu = young_pa / (2.0 * (1.0 + poisson));
        let lambda = young_pa * poisson / ((1.0 + poisson) * (1.0 - 2.0 * poisson));
        Self { lambda, mu }
    }

    /// P-wave modulus λ + 2μ (Pa)
    #[inline]
    pub fn p_wave_modulus(&self) -> f64 {
        self.lambda + 2.0 * self.mu
    }

    /// P-wave velocity in a medium of density ρ (m/s)
    #[inline]
    pub fn vp(&self, density: f64) -> f64 {
        (self.p_wave_modulus() / density).sqrt()
    }

    /// S-wave velocity in a medium of density ρ (m/s)
    #[inline]
    pub fn vs(&self, density: f64) -> f64 {
        (self.mu / density).sqrt()
    }

    /// Theoretical Vp/Vs ratio for Poisson's ratio ν:
    ///   Vp/Vs = √(2(1−ν) / (1−2ν))
    ///
    /// Reduces to √3 for a Poisson solid (ν = 0.25).
    pub fn vp_vs_ratio(poisson: f64) -> f64 {
        (2.0 * (1.0 - poisson) / (1.0 - 2.0 * poisson)).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lame_from_engineering_constants() {
        // E = 50 MPa, ν = 0.25 -> μ = 20 MPa, λ = 20 MPa
        let m = ElasticModuli::from_young_poisson(50e6, 0.25);
        assert!((m.mu - 20e6).abs() < 1.0);
        assert!((m.lambda - 20e6).abs() < 1.0);
        assert!((m.p_wave_modulus() - 60e6).abs() < 1.0);
    }

    #[test]
    fn test_wave_velocities() {
        let m = ElasticModuli::from_young_poisson(50e6, 0.25);
        let rho = 2650.0;
        let vp = m.vp(rho);
        let vs = m.vs(rho);
        assert!((vp - (60e6f64 / rho).sqrt()).abs() < 1e-9);
        // Poisson solid: Vp/Vs = √3
        assert!((vp / vs - 3f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_ratio_grows_with_poisson() {
        let r25 = ElasticModuli::vp_vs_ratio(0.25);
        let r30 = ElasticModuli::vp_vs_ratio(0.30);
        assert!((r25 - 3f64.sqrt()).abs() < 1e-12);
        assert!((r30 - 3.5f64.sqrt()).abs() < 1e-12);
        assert!(r30 > r25);
    }
}
