//! Fixed-point time utilities for deterministic build progress.
//!
//! Build durations, delta times and progress values are all fixed-point.
//! Floating-point values only appear at the data boundary (RON files,
//! command-line arguments) and are converted once with [`seconds`].

use fixed::types::I32F32;

/// Fixed-point number type for all build timing math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Convert a seconds value from configuration into fixed-point.
///
/// Returns `None` for NaN, infinities and values outside the `Fixed` range.
#[must_use]
pub fn seconds(value: f64) -> Option<Fixed> {
    Fixed::checked_from_num(value)
}

/// Fraction of `duration` covered by `elapsed`, clamped to `[0, 1]`.
///
/// Exactly one once `elapsed` reaches `duration`, so a build split over
/// many ticks completes when its time is up regardless of rounding in the
/// division. A non-positive `duration` completes immediately.
#[must_use]
pub fn progress_fraction(elapsed: Fixed, duration: Fixed) -> Fixed {
    if duration <= Fixed::ZERO || elapsed >= duration {
        return Fixed::ONE;
    }
    elapsed
        .saturating_div(duration)
        .clamp(Fixed::ZERO, Fixed::ONE)
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}
