//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: spectrum.rs | DNA/src/math/spectrum.rs
//! PURPOSE: Naive DFT magnitude spectrum for short diagnostic traces
//! MODIFIED: 2026-07-02
//! LAYER: DNA (foundation)
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! O(N·M) direct evaluation. Traces here are a few hundred samples (source
//! wavelets, receiver traces), so an FFT dependency is not warranted.

use std::f64::consts::TAU;

/// Magnitude spectrum of `samples` zero-padded to `padded_len`, up to the
/// Nyquist frequency. Returns (frequency_hz, magnitude) pairs.
pub fn dft_magnitude(samples: &[f64], dt: f64, padded_len: usize) -> Vec<(f64, f64)> {
    let n = padded_len.max(samples.len());
    let df = 1.0 / (n as f64 * dt);
    let half = n / 2;
    let mut out = Vec::with_capacity(half);
    for k in 0..half {
        let w = TAU * k as f64 / n as f64;
        let mut re = 0.0;
        let mut im = 0.0;
        for (i, &s) in samples.iter().enumerate() {
            let phase = w * i as f64;
            re += s * phase.cos();
            im -= s * phase.sin();
        }
        out.push((k as f64 * df, (re * re + im * im).sqrt()));
    }
    out
}

/// Frequency of the largest spectral magnitude.
pub fn peak_frequency(samples: &[f64], dt: f64, padded_len: usize) -> f64 {
    dft_magnitude(samples, dt, padded_len)
        .into_iter()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(f, _)| f)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pure_tone_peak() {
        let f0 = 1000.0;
        let dt = 1e-5;
        let samples: Vec<f64> = (0..500).map(|i| (TAU * f0 * i as f64 * dt).sin()).collect();
        let peak = peak_frequency(&samples, dt, 2048);
        assert!((peak - f0).abs() < 1.0 / (2048.0 * dt), "peak {peak}");
    }
}
