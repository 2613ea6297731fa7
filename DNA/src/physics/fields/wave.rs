//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: wave.rs
//! PATH: DNA/src/physics/fields/wave.rs
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! PURPOSE: Ricker excitation wavelet for elastic sources
//!
//! LAYER: DNA → PHYSICS → FIELDS
//!
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │ PHYSICS                                                                     │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │ Ricker pulse: w(t) = A (1 − 2a²) e^(−a²),  a = π f₀ (t − t₀)                │
//! │                                                                             │
//! │ The amplitude spectrum peaks at the centre frequency f₀. The delay          │
//! │ t₀ = 1.5/f₀ starts the pulse near zero so injection does not step.          │
//! └─────────────────────────────────────────────────────────────────────────────┘
//!
//! ═══════════════════════════════════════════════════════════════════════════════

/// Precomputed finite Ricker wavelet sampled at the solver time step.
#[derive(Clone, Debug)]
pub struct RickerWavelet {
    samples: Vec<f64>,
    /// Centre frequency f₀ (Hz)
    pub centre_frequency: f64,
    /// Sampling interval (s)
    pub dt: f64,
}

impl RickerWavelet {
    /// Sample a Ricker pulse of peak amplitude `amplitude` at interval `dt`.
    ///
    /// Length is `max(100, ⌈10/(f₀·dt)⌉)` samples, enough for the pulse to
    /// rise and decay back to numerical silence.
    pub fn new(amplitude: f64, centre_frequency: f64, dt: f64) -> Self {
        let len = ((10.0 / (centre_frequency * dt)).ceil() as usize).max(100);
        let t0 = 1.5 / centre_frequency;
        let samples = (0..len)
            .map(|i| {
                let a = std::f64::consts::PI * centre_frequency * (i as f64 * dt - t0);
                let a2 = a * a;
                amplitude * (1.0 - 2.0 * a2) * (-a2).exp()
            })
            .collect();
        Self {
            samples,
            centre_frequency,
            dt,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Source term for a step, zero once the pulse has ended.
    #[inline]
    pub fn value_at(&self, step: usize) -> f64 {
        self.samples.get(step).copied().unwrap_or(0.0)
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_amplitude_and_sign() {
        let w = RickerWavelet::new(100.0, 100e3, 2.5e-7);
        // Maximum is A at t = t0 (a = 0)
        let peak = w.samples().iter().cloned().fold(f64::MIN, f64::max);
        assert!((peak - 100.0).abs() < 1.0);
        // Side lobes are negative
        let min = w.samples().iter().cloned().fold(f64::MAX, f64::min);
        assert!(min < 0.0);
    }

    #[test]
    fn test_length_floor() {
        // Very coarse sampling still yields the 100-sample floor
        let w = RickerWavelet::new(1.0, 100e3, 1e-3);
        assert_eq!(w.len(), 100);
        // Fine sampling follows 10/(f0 dt)
        let w = RickerWavelet::new(1.0, 100e3, 1e-7);
        assert_eq!(w.len(), 1000);
    }

    #[test]
    fn test_silent_after_end() {
        let w = RickerWavelet::new(5.0, 50e3, 1e-6);
        assert_eq!(w.value_at(w.len()), 0.0);
        assert_eq!(w.value_at(w.len() + 1234), 0.0);
    }
}
