//! Response curves and range scaling
//!
//! MIDI values are 0-127 (or 0-16383 for 14-bit pairs), but mapped
//! parameters have arbitrary ranges and may want a non-linear response:
//! exponential for gain-style controls, logarithmic for frequency-style
//! ones. Curves operate on a normalized 0.0-1.0 domain; range mapping is
//! applied after the curve.

use serde::{Deserialize, Serialize};

/// Response curve applied between normalized input and output range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseCurve {
    /// y = x
    #[default]
    Linear,
    /// y = x^3, fine control near the bottom
    Exponential,
    /// y = x^(1/3), fine control near the top
    Logarithmic,
}

impl ResponseCurve {
    /// Apply the curve to a normalized input in [0, 1]
    pub fn apply(&self, x: f64) -> f64 {
        let x = x.clamp(0.0, 1.0);
        match self {
            ResponseCurve::Linear => x,
            ResponseCurve::Exponential => x * x * x,
            ResponseCurve::Logarithmic => x.cbrt(),
        }
    }

    /// Scale a normalized input into [min, max] through the curve
    pub fn scale(&self, x: f64, min: f64, max: f64) -> f64 {
        min + (max - min) * self.apply(x)
    }
}

/// Clamp a value into [min, max] and normalize to [0, 1]
///
/// Used on the feedback path to turn a parameter value back into a
/// protocol-native position. Degenerate ranges normalize to 0.
pub fn normalize_to_range(value: f64, min: f64, max: f64) -> f64 {
    if (max - min).abs() < f64::EPSILON {
        return 0.0;
    }
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}
