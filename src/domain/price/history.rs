//! In-memory price history

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::{MovingAverageCalculator, PriceSample};

/// Time-ordered sequence of samples; the source of truth for every derived value.
///
/// Timestamps never decrease. `append` is the only way to grow the history and
/// `restore` the only way to replace it.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    sma: MovingAverageCalculator,
    samples: Vec<PriceSample>,
}

impl HistoryStore {
    pub fn new(sma_period: usize) -> Self {
        Self {
            sma: MovingAverageCalculator::new(sma_period),
            samples: Vec::new(),
        }
    }

    /// Record a new price observed at `now`, computing its SMA once
    pub fn append(&mut self, price: f64, now: DateTime<Utc>) -> PriceSample {
        let timestamp = match self.samples.last() {
            Some(last) if now < last.timestamp => {
                debug!(
                    last = %last.timestamp,
                    now = %now,
                    "Clock went backwards, clamping sample timestamp"
                );
                last.timestamp
            }
            _ => now,
        };

        let sma = self.sma.next_value(&self.samples, price);
        let sample = PriceSample::new(timestamp, price, sma);
        self.samples.push(sample);
        sample
    }

    /// Replace the whole history with previously persisted samples
    pub fn restore(&mut self, mut samples: Vec<PriceSample>) {
        let ordered = samples
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp);
        if !ordered {
            warn!("Restored history was out of order, sorting by timestamp");
            samples.sort_by_key(|s| s.timestamp);
        }
        self.samples = samples;
    }

    pub fn samples(&self) -> &[PriceSample] {
        &self.samples
    }

    /// Owned copy of the history in chronological order
    pub fn snapshot(&self) -> Vec<PriceSample> {
        self.samples.clone()
    }

    pub fn last(&self) -> Option<&PriceSample> {
        self.samples.last()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Lowest and highest recorded price
    pub fn price_range(&self) -> Option<(f64, f64)> {
        self.samples.iter().map(|s| s.price).fold(None, |range, p| match range {
            None => Some((p, p)),
            Some((lo, hi)) => Some((lo.min(p), hi.max(p))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_sma_property_over_growing_history() {
        let prices = [10.0, 12.0, 11.0, 15.0, 9.0, 13.0, 14.0];
        for period in 1..=prices.len() {
            let mut store = HistoryStore::new(period);
            for (k, price) in prices.iter().enumerate() {
                let sample = store.append(*price, t0() + Duration::minutes(k as i64));
                if k + 1 < period {
                    assert_eq!(sample.sma, None, "period {} index {}", period, k);
                } else {
                    let window = &prices[k + 1 - period..=k];
                    let expected = window.iter().sum::<f64>() / period as f64;
                    let actual = sample.sma.unwrap();
                    assert!((actual - expected).abs() < 1e-9, "period {} index {}", period, k);
                }
            }
        }
    }

    #[test]
    fn test_sma_never_recomputed() {
        let mut store = HistoryStore::new(2);
        store.append(10.0, t0());
        let second = store.append(20.0, t0() + Duration::minutes(1));
        store.append(40.0, t0() + Duration::minutes(2));

        assert_eq!(store.samples()[1], second);
        assert_eq!(store.samples()[1].sma, Some(15.0));
        assert_eq!(store.samples()[2].sma, Some(30.0));
    }

    #[test]
    fn test_timestamps_never_decrease() {
        let mut store = HistoryStore::new(3);
        store.append(1.0, t0());
        let sample = store.append(2.0, t0() - Duration::seconds(5));
        assert_eq!(sample.timestamp, t0());

        // ties are allowed
        let tie = store.append(3.0, t0());
        assert_eq!(tie.timestamp, t0());
    }

    #[test]
    fn test_snapshot_of_empty_store() {
        let store = HistoryStore::new(10);
        assert!(store.snapshot().is_empty());
        assert!(store.is_empty());
        assert_eq!(store.price_range(), None);
        assert!(store.last().is_none());
    }

    #[test]
    fn test_restore_replaces_and_sorts() {
        let mut store = HistoryStore::new(2);
        store.append(99.0, t0());

        let restored = vec![
            PriceSample::new(t0() + Duration::minutes(2), 3.0, Some(2.5)),
            PriceSample::new(t0() + Duration::minutes(1), 2.0, None),
        ];
        store.restore(restored);

        assert_eq!(store.len(), 2);
        assert_eq!(store.samples()[0].price, 2.0);
        assert_eq!(store.samples()[1].price, 3.0);

        // SMA for the next sample continues from restored prices
        let next = store.append(5.0, t0() + Duration::minutes(3));
        assert_eq!(next.sma, Some(4.0));
    }

    #[test]
    fn test_price_range() {
        let mut store = HistoryStore::new(1);
        for (i, p) in [101.0, 97.5, 103.25].iter().enumerate() {
            store.append(*p, t0() + Duration::minutes(i as i64));
        }
        assert_eq!(store.price_range(), Some((97.5, 103.25)));
    }
}
