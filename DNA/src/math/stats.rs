//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: stats.rs | DNA/src/math/stats.rs
//! PURPOSE: Percentiles and descriptive statistics over sample slices
//! MODIFIED: 2026-07-02
//! LAYER: DNA (foundation)
//! ═══════════════════════════════════════════════════════════════════════════════

/// Linear-interpolated percentile of an ascending-sorted slice.
/// `p` in [0, 100]. Returns 0.0 for an empty slice.
pub fn percentile_sorted(sorted: &[f32], p: f64) -> f32 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let t = (rank - lo as f64) as f32;
    sorted[lo] + t * (sorted[hi] - sorted[lo])
}

/// Arithmetic mean. Returns 0.0 for an empty slice.
pub fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolates() {
        let v = [0.0f32, 10.0, 20.0, 30.0, 40.0];
        assert_eq!(percentile_sorted(&v, 0.0), 0.0);
        assert_eq!(percentile_sorted(&v, 100.0), 40.0);
        assert_eq!(percentile_sorted(&v, 50.0), 20.0);
        // Between ranks 1 and 2
        assert!((percentile_sorted(&v, 37.5) - 15.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_slices() {
        assert_eq!(percentile_sorted(&[], 50.0), 0.0);
        assert_eq!(percentile_sorted(&[7.0], 95.0), 7.0);
        assert_eq!(mean(&[]), 0.0);
    }
}
