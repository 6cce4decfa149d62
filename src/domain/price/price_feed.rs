//! Price feed interface and retrying fetch

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::shared::errors::{FetchError, PriceError};

/// Source of the latest observed price for an instrument.
///
/// Reads must be idempotent so they can be retried freely. `Ok(None)` means the
/// source answered but had no price to give.
#[async_trait]
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &str;

    async fn get_latest_price(&self, ticker: &str) -> Result<Option<f64>, PriceError>;
}

/// Exponential backoff between fetch attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(16),
        }
    }
}

impl BackoffPolicy {
    pub fn next_delay(&self, current: Duration) -> Duration {
        (current * 2).min(self.max)
    }
}

/// Wraps a [`PriceSource`] with bounded retries.
///
/// Retries never carry across calls: every `fetch` starts from attempt one
/// with the initial backoff.
pub struct RetryingFetcher<S> {
    source: S,
    ticker: String,
    max_retries: u32,
    backoff: BackoffPolicy,
}

impl<S: PriceSource> RetryingFetcher<S> {
    pub fn new(source: S, ticker: impl Into<String>, max_retries: u32) -> Self {
        Self {
            source,
            ticker: ticker.into(),
            max_retries: max_retries.max(1),
            backoff: BackoffPolicy::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn fetch(&self) -> Result<f64, FetchError> {
        let mut wait = self.backoff.initial;
        let mut attempt = 0;

        loop {
            attempt += 1;

            let failure = match self.source.get_latest_price(&self.ticker).await {
                Ok(Some(price)) if price.is_finite() && price > 0.0 => {
                    debug!("Price fetched: ${:.2}", price);
                    return Ok(price);
                }
                Ok(Some(price)) => PriceError::InvalidPrice(price),
                Ok(None) => PriceError::EmptyResult,
                Err(e) => e,
            };

            if attempt >= self.max_retries {
                error!(
                    "Failed to fetch price after {} retries: {}",
                    self.max_retries, failure
                );
                return Err(FetchError {
                    attempts: attempt,
                    last_error: failure,
                });
            }

            warn!(
                "Attempt {}/{} failed: {} (retrying in {}s)",
                attempt,
                self.max_retries,
                failure,
                wait.as_secs_f64()
            );
            tokio::time::sleep(wait).await;
            wait = self.backoff.next_delay(wait);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Replays scripted responses, then keeps returning `fallback`
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<Option<f64>, PriceError>>>,
        fallback: Result<Option<f64>, PriceError>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedSource {
        fn new(
            script: Vec<Result<Option<f64>, PriceError>>,
            fallback: Result<Option<f64>, PriceError>,
        ) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PriceSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn get_latest_price(&self, _ticker: &str) -> Result<Option<f64>, PriceError> {
            self.calls.lock().unwrap().push(Instant::now());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone())
        }
    }

    fn gaps(times: &[Instant]) -> Vec<Duration> {
        times.windows(2).map(|w| w[1] - w[0]).collect()
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = BackoffPolicy::default();
        let mut delay = policy.initial;
        let mut seen = vec![delay];
        for _ in 0..6 {
            delay = policy.next_delay(delay);
            seen.push(delay);
        }
        let secs: Vec<u64> = seen.iter().map(|d| d.as_secs()).collect();
        assert_eq!(secs, vec![1, 2, 4, 8, 16, 16, 16]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_source_exhausts_retries() {
        let source = ScriptedSource::new(vec![], Err(PriceError::Unavailable));
        let fetcher = RetryingFetcher::new(source, "BTC-USD", 3);

        let result = fetcher.fetch().await;

        assert_eq!(
            result,
            Err(FetchError {
                attempts: 3,
                last_error: PriceError::Unavailable,
            })
        );
        let calls = fetcher.source().call_times();
        assert_eq!(calls.len(), 3);
        assert_eq!(
            gaps(&calls),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_on_third_attempt() {
        let source = ScriptedSource::new(
            vec![Err(PriceError::Http("503".to_string())), Ok(None)],
            Ok(Some(101.5)),
        );
        let fetcher = RetryingFetcher::new(source, "BTC-USD", 3);
        let started = Instant::now();

        let price = fetcher.fetch().await.unwrap();

        assert_eq!(price, 101.5);
        assert_eq!(fetcher.source().call_times().len(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_positive_price_counts_as_failure() {
        let source = ScriptedSource::new(vec![Ok(Some(0.0)), Ok(Some(f64::NAN))], Ok(Some(7.0)));
        let fetcher = RetryingFetcher::new(source, "BTC-USD", 3);

        assert_eq!(fetcher.fetch().await, Ok(7.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_result_exhausts_with_empty_error() {
        let source = ScriptedSource::new(vec![], Ok(None));
        let fetcher = RetryingFetcher::new(source, "BTC-USD", 2);

        let result = fetcher.fetch().await;
        assert!(matches!(
            result,
            Err(FetchError {
                attempts: 2,
                last_error: PriceError::EmptyResult
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_symbol_is_retried_like_any_failure() {
        let missing = PriceError::UnknownSymbol("NOPE".to_string());
        let source = ScriptedSource::new(vec![], Err(missing.clone()));
        let fetcher = RetryingFetcher::new(source, "NOPE", 3);

        let result = fetcher.fetch().await;
        assert_eq!(
            result,
            Err(FetchError {
                attempts: 3,
                last_error: missing,
            })
        );
        assert_eq!(fetcher.source().call_times().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_symbol_then_recovery() {
        let source = ScriptedSource::new(
            vec![Err(PriceError::UnknownSymbol("ETH-USD".to_string()))],
            Ok(Some(2500.0)),
        );
        let fetcher = RetryingFetcher::new(source, "ETH-USD", 3);

        assert_eq!(fetcher.fetch().await, Ok(2500.0));
        assert_eq!(fetcher.source().call_times().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_do_not_carry_across_fetches() {
        let source = ScriptedSource::new(
            vec![
                Err(PriceError::Unavailable),
                Err(PriceError::Unavailable),
                Err(PriceError::Unavailable),
                Err(PriceError::Unavailable),
            ],
            Ok(Some(10.0)),
        );
        let fetcher = RetryingFetcher::new(source, "BTC-USD", 2);

        assert!(fetcher.fetch().await.is_err());
        assert!(fetcher.fetch().await.is_err());
        assert_eq!(fetcher.fetch().await, Ok(10.0));

        let calls = fetcher.source().call_times();
        assert_eq!(calls.len(), 5);
        // second fetch starts right away and backs off from the initial delay again
        assert_eq!(calls[2] - calls[1], Duration::ZERO);
        assert_eq!(calls[3] - calls[2], Duration::from_secs(1));
        assert_eq!(calls[4] - calls[3], Duration::ZERO);
    }
}
