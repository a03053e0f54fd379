//! Liquidity constraint — participation cap against bar volume.
//!
//! Fills are limited to a fraction of the bar's volume. The unfilled
//! remainder is always dropped: orders never carry to a later bar.

use serde::{Deserialize, Serialize};

/// Participation-rate cap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiquidityPolicy {
    /// Maximum fraction of bar volume one order may consume (0.0, 1.0].
    pub max_participation: f64,
}

impl Default for LiquidityPolicy {
    fn default() -> Self {
        Self {
            max_participation: 0.1,
        }
    }
}

impl LiquidityPolicy {
    pub fn new(max_participation: f64) -> Self {
        Self { max_participation }
    }

    pub fn is_valid(&self) -> bool {
        self.max_participation > 0.0 && self.max_participation <= 1.0
    }

    /// Largest whole-unit quantity fillable against `bar_volume`.
    pub fn max_fill_qty(&self, bar_volume: u64) -> f64 {
        // Tolerance keeps e.g. 0.29 × 100 at 29 instead of 28.999…
        (bar_volume as f64 * self.max_participation + 1e-9).floor()
    }

    /// Apply the cap to a desired quantity.
    ///
    /// Returns `(fill_qty, dropped_qty)`; `dropped_qty` is zero when the cap
    /// does not bind.
    pub fn constrain(&self, desired_qty: f64, bar_volume: u64) -> (f64, f64) {
        let max_qty = self.max_fill_qty(bar_volume);
        if desired_qty <= max_qty {
            (desired_qty, 0.0)
        } else {
            (max_qty, desired_qty - max_qty)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_constraint_binds() {
        let policy = LiquidityPolicy::new(0.10);
        let (fill, dropped) = policy.constrain(100.0, 10_000);
        assert_eq!(fill, 100.0);
        assert_eq!(dropped, 0.0);
    }

    #[test]
    fn constraint_limits_fill() {
        let policy = LiquidityPolicy::new(0.10);
        let (fill, dropped) = policy.constrain(5_000.0, 10_000);
        assert_eq!(fill, 1_000.0);
        assert_eq!(dropped, 4_000.0);
    }

    #[test]
    fn exact_limit_fills_completely() {
        let policy = LiquidityPolicy::new(0.10);
        assert_eq!(policy.constrain(1_000.0, 10_000), (1_000.0, 0.0));
    }

    #[test]
    fn zero_volume_fills_nothing() {
        let policy = LiquidityPolicy::new(0.10);
        assert_eq!(policy.constrain(100.0, 0), (0.0, 100.0));
    }

    #[test]
    fn cap_is_floored_to_whole_units() {
        let policy = LiquidityPolicy::new(0.1);
        assert_eq!(policy.max_fill_qty(15), 1.0);
        assert_eq!(LiquidityPolicy::new(0.29).max_fill_qty(100), 29.0);
    }

    #[test]
    fn validity_range() {
        assert!(LiquidityPolicy::new(1.0).is_valid());
        assert!(!LiquidityPolicy::new(0.0).is_valid());
        assert!(!LiquidityPolicy::new(1.5).is_valid());
    }
}
