//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: autostop.rs | SIMULATION/CORE/ACOUSTIC_ENGINE/src/autostop.rs
//! PURPOSE: Receiver-energy auto-stop controller
//! MODIFIED: 2026-07-18
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! Tracks the kinetic + strain energy at the receiver voxel. The run stops
//! once that energy has peaked (fallen below half its maximum) and then
//! decayed below `threshold_ratio` of the maximum: at that point the coda
//! carries no further arrival information.

use dna::ElasticField3D;

/// Local energy density at a voxel:
///   E_kin = ½ ρ |v|²
///   E_str = (sxx² + syy² + szz² + 2(sxy² + sxz² + syz²)) / (4μ)
///
/// The strain term assumes isotropy and small strains (no strain tensors
/// are carried).
pub fn receiver_energy(field: &ElasticField3D, site: [usize; 3], density: f64, mu: f64) -> f64 {
    let [vx, vy, vz, sxx, syy, szz, sxy, sxz, syz] = field.components_at(site);
    let e_kin = 0.5 * density * (vx * vx + vy * vy + vz * vz);
    let e_str =
        (sxx * sxx + syy * syy + szz * szz + 2.0 * (sxy * sxy + sxz * sxz + syz * syz)) / (4.0 * mu);
    e_kin + e_str
}

/// Stateful peak-and-decay detector.
#[derive(Clone, Debug)]
pub struct AutoStopController {
    check_interval: u32,
    min_required_steps: u32,
    threshold_ratio: f64,
    max_energy: f64,
    peaked: bool,
}

impl AutoStopController {
    /// Defaults: check every 5 steps, no checks before
    /// `max(50, max_steps/10)`, stop below 1% of the peak.
    pub fn new(max_steps: u32) -> Self {
        Self::with_params(5, (max_steps / 10).max(50), 0.01)
    }

    pub fn with_params(check_interval: u32, min_required_steps: u32, threshold_ratio: f64) -> Self {
        Self {
            check_interval: check_interval.max(1),
            min_required_steps,
            threshold_ratio,
            max_energy: 0.0,
            peaked: false,
        }
    }

    /// True once the receiver energy has fallen below half of its maximum.
    pub fn peaked(&self) -> bool {
        self.peaked
    }

    pub fn max_energy(&self) -> f64 {
        self.max_energy
    }

    /// Feed one observation. Returns true when the run should stop. Steps
    /// outside the check cadence or before the warm-up window are ignored.
    pub fn observe(&mut self, step: u32, energy: f64) -> bool {
        if step < self.min_required_steps || step % self.check_interval != 0 {
            return false;
        }

        if energy > self.max_energy {
            self.max_energy = energy;
        }
        if self.max_energy <= 0.0 {
            return false;
        }

        if !self.peaked && energy < 0.5 * self.max_energy {
            self.peaked = true;
        }

        self.peaked && energy < self.threshold_ratio * self.max_energy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stops_after_peak_and_decay() {
        let mut ctl = AutoStopController::with_params(1, 0, 0.01);
        // Rising edge
        assert!(!ctl.observe(0, 1.0));
        assert!(!ctl.observe(1, 10.0));
        assert!(!ctl.peaked());
        // Fall below half the max -> peaked
        assert!(!ctl.observe(2, 4.0));
        assert!(ctl.peaked());
        // Still above the stop threshold
        assert!(!ctl.observe(3, 0.2));
        // Below 1% of max
        assert!(ctl.observe(4, 0.05));
    }

    #[test]
    fn test_warm_up_and_cadence_are_ignored() {
        let mut ctl = AutoStopController::with_params(5, 100, 0.01);
        // Before min_required_steps nothing registers
        assert!(!ctl.observe(50, 100.0));
        assert_eq!(ctl.max_energy(), 0.0);
        // Off-cadence steps are skipped
        assert!(!ctl.observe(101, 100.0));
        assert_eq!(ctl.max_energy(), 0.0);
        // On-cadence past warm-up registers
        assert!(!ctl.observe(105, 100.0));
        assert_eq!(ctl.max_energy(), 100.0);
    }

    #[test]
    fn test_silent_receiver_never_stops() {
        let mut ctl = AutoStopController::new(200);
        for step in 0..1000 {
            assert!(!ctl.observe(step, 0.0));
        }
    }
}
