//! Raw-to-unit-interval normalization.

use risk_index_models::ComponentBaseline;

const ZERO_TOLERANCE: f64 = 1e-12;

/// Maps a raw value into `[0, 1]` against a baseline.
///
/// A degenerate baseline (`max == min`) yields 0 for a zero raw value and
/// 0.5 otherwise. The denominator never drops below 1, so tiny observed
/// ranges do not blow small raw differences up to the full scale.
#[must_use]
pub fn normalize(raw: f64, baseline: &ComponentBaseline) -> f64 {
    if !raw.is_finite() {
        return 0.0;
    }
    if (baseline.max - baseline.min).abs() < ZERO_TOLERANCE {
        return if raw.abs() < ZERO_TOLERANCE { 0.0 } else { 0.5 };
    }
    let span = (baseline.max - baseline.min).max(1.0);
    ((raw - baseline.min) / span).clamp(0.0, 1.0)
}
