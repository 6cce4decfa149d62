//! Trailing simple moving average

use super::PriceSample;

/// Computes the trailing SMA for a new price from the samples before it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovingAverageCalculator {
    period: usize,
}

impl MovingAverageCalculator {
    /// A period of zero is treated as one.
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
        }
    }

    /// Mean of the last `period - 1` prices in `history` plus `price`, or `None`
    /// while fewer than `period` prices are available.
    pub fn next_value(&self, history: &[PriceSample], price: f64) -> Option<f64> {
        let preceding = self.period - 1;
        let window = &history[history.len().saturating_sub(preceding)..];

        if window.len() < preceding {
            return None;
        }

        let sum: f64 = window.iter().map(|s| s.price).sum::<f64>() + price;
        Some(sum / self.period as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn samples(prices: &[f64]) -> Vec<PriceSample> {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, p)| PriceSample::new(t0 + Duration::minutes(i as i64), *p, None))
            .collect()
    }

    #[test]
    fn test_absent_until_period_is_filled() {
        let calc = MovingAverageCalculator::new(3);
        assert_eq!(calc.next_value(&[], 10.0), None);
        assert_eq!(calc.next_value(&samples(&[10.0]), 11.0), None);
        assert_eq!(calc.next_value(&samples(&[10.0, 11.0]), 12.0), Some(11.0));
    }

    #[test]
    fn test_uses_most_recent_prices_only() {
        let calc = MovingAverageCalculator::new(3);
        let history = samples(&[100.0, 1.0, 2.0]);
        assert_eq!(calc.next_value(&history, 3.0), Some(2.0));
    }

    #[test]
    fn test_period_one_is_current_price() {
        let calc = MovingAverageCalculator::new(1);
        assert_eq!(calc.next_value(&[], 42.0), Some(42.0));
        assert_eq!(calc.next_value(&samples(&[1.0, 2.0]), 5.0), Some(5.0));
    }

    #[test]
    fn test_zero_period_treated_as_one() {
        let calc = MovingAverageCalculator::new(0);
        assert_eq!(calc.next_value(&[], 9.0), Some(9.0));
        assert_eq!(calc.next_value(&samples(&[4.0]), 9.0), Some(9.0));
    }
}
