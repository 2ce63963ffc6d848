use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use futures::stream::StreamExt;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use super::{CircuitBreaker, IsRetryable, MarketData, MarketError};
use crate::config::MarketConfig;
use crate::types::{HistoricalData, StockInfo, StockSearchResult};

fn default_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(3))
        .with_max_times(3)
        .with_jitter()
}

#[derive(Debug, Clone)]
enum MarketCall {
    Search(String),
    Info(String),
    Historical {
        symbol: String,
        period: String,
        interval: String,
    },
}

enum MarketReply {
    Search(Vec<StockSearchResult>),
    Info(Option<StockInfo>),
    Historical(Option<HistoricalData>),
}

struct MarketJob {
    call: MarketCall,
    reply: oneshot::Sender<Result<MarketReply, MarketError>>,
}

impl MarketCall {
    async fn execute(&self, inner: &dyn MarketData) -> Result<MarketReply, MarketError> {
        match self {
            MarketCall::Search(q) => inner.search(q).await.map(MarketReply::Search),
            MarketCall::Info(s) => inner.info(s).await.map(MarketReply::Info),
            MarketCall::Historical {
                symbol,
                period,
                interval,
            } => inner
                .historical(symbol, period, interval)
                .await
                .map(MarketReply::Historical),
        }
    }
}

/// Funnels every upstream call through one pipeline: a per-minute rate
/// limit, bounded concurrency, retries for transient failures and a
/// circuit breaker that backs off when upstream starts throttling.
#[derive(Clone)]
pub struct MarketGateway {
    job_tx: mpsc::Sender<MarketJob>,
    breaker: Arc<CircuitBreaker>,
}

impl MarketGateway {
    /// Must be called inside a tokio runtime; spawns the pipeline worker.
    pub fn new(inner: Arc<dyn MarketData>, cfg: &MarketConfig) -> Self {
        let per_minute = NonZeroU32::new(cfg.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));
        let breaker = Arc::new(CircuitBreaker::new(
            cfg.circuit_breaker_threshold,
            Duration::from_secs(cfg.circuit_breaker_timeout_secs),
        ));
        let concurrency = cfg.max_concurrent.max(1);

        let (job_tx, job_rx) = mpsc::channel::<MarketJob>(1000);
        let worker_breaker = breaker.clone();
        tokio::spawn(async move {
            info!(
                "Market Pipeline Started: Concurrency={}, RateLimit={}/min",
                concurrency, per_minute
            );

            let mut pipeline = ReceiverStream::new(job_rx)
                .map(|job| {
                    let lim = limiter.clone();
                    let breaker = worker_breaker.clone();
                    let inner = inner.clone();
                    async move {
                        lim.until_ready().await;
                        let result = run_guarded(&breaker, inner.as_ref(), &job.call).await;
                        (job, result)
                    }
                })
                .buffer_unordered(concurrency);

            while let Some((job, result)) = pipeline.next().await {
                if job.reply.send(result).is_err() {
                    debug!(call = ?job.call, "caller went away before market reply");
                }
            }
            info!("Market Pipeline Stopped");
        });

        Self { job_tx, breaker }
    }

    pub fn circuit_state(&self) -> super::CircuitState {
        self.breaker.state()
    }

    async fn submit(&self, call: MarketCall) -> Result<MarketReply, MarketError> {
        let (reply, rx) = oneshot::channel();
        self.job_tx
            .send(MarketJob { call, reply })
            .await
            .map_err(|e| MarketError::GatewayClosed(e.to_string()))?;
        rx.await
            .map_err(|e| MarketError::GatewayClosed(e.to_string()))?
    }
}

async fn run_guarded(
    breaker: &CircuitBreaker,
    inner: &dyn MarketData,
    call: &MarketCall,
) -> Result<MarketReply, MarketError> {
    breaker.try_acquire()?;
    let result = (|| async { call.execute(inner).await })
        .retry(default_retry_policy())
        .when(|e: &MarketError| e.is_retryable())
        .notify(|err, dur: Duration| {
            warn!("market call retrying after error {}, sleeping {:?}", err, dur);
        })
        .await;
    match &result {
        Ok(_) => breaker.record_success(),
        Err(MarketError::RateLimited) => breaker.record_rate_limited(),
        Err(_) => breaker.record_other_failure(),
    }
    result
}

#[async_trait]
impl MarketData for MarketGateway {
    async fn search(&self, query: &str) -> Result<Vec<StockSearchResult>, MarketError> {
        match self.submit(MarketCall::Search(query.to_string())).await? {
            MarketReply::Search(v) => Ok(v),
            _ => Err(MarketError::GatewayClosed("mismatched reply".into())),
        }
    }

    async fn info(&self, symbol: &str) -> Result<Option<StockInfo>, MarketError> {
        match self.submit(MarketCall::Info(symbol.to_string())).await? {
            MarketReply::Info(v) => Ok(v),
            _ => Err(MarketError::GatewayClosed("mismatched reply".into())),
        }
    }

    async fn historical(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> Result<Option<HistoricalData>, MarketError> {
        let call = MarketCall::Historical {
            symbol: symbol.to_string(),
            period: period.to_string(),
            interval: interval.to_string(),
        };
        match self.submit(call).await? {
            MarketReply::Historical(v) => Ok(v),
            _ => Err(MarketError::GatewayClosed("mismatched reply".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` calls with `error`, then answers.
    struct Flaky {
        calls: AtomicUsize,
        failures: usize,
        error: fn() -> MarketError,
    }

    #[async_trait]
    impl MarketData for Flaky {
        async fn search(&self, query: &str) -> Result<Vec<StockSearchResult>, MarketError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err((self.error)());
            }
            Ok(vec![StockSearchResult {
                symbol: format!("{}.NS", query.to_uppercase()),
                name: query.to_string(),
                exchange: "NSE".into(),
                kind: "EQUITY".into(),
            }])
        }

        async fn info(&self, _symbol: &str) -> Result<Option<StockInfo>, MarketError> {
            Ok(None)
        }

        async fn historical(
            &self,
            _symbol: &str,
            _period: &str,
            _interval: &str,
        ) -> Result<Option<HistoricalData>, MarketError> {
            Ok(None)
        }
    }

    fn cfg(threshold: u32) -> MarketConfig {
        MarketConfig {
            requests_per_minute: 1000,
            circuit_breaker_threshold: threshold,
            ..MarketConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried() {
        let inner = Arc::new(Flaky {
            calls: AtomicUsize::new(0),
            failures: 2,
            error: || MarketError::UpstreamStatus(StatusCode::BAD_GATEWAY),
        });
        let gateway = MarketGateway::new(inner.clone(), &cfg(5));

        let results = gateway.search("tcs").await.unwrap();
        assert_eq!(results[0].symbol, "TCS.NS");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rate_limits_trip_the_breaker() {
        let inner = Arc::new(Flaky {
            calls: AtomicUsize::new(0),
            failures: usize::MAX,
            error: || MarketError::RateLimited,
        });
        let gateway = MarketGateway::new(inner.clone(), &cfg(2));

        for _ in 0..2 {
            assert!(matches!(gateway.search("x").await, Err(MarketError::RateLimited)));
        }
        assert_eq!(gateway.circuit_state(), crate::market::CircuitState::Open);
        assert!(matches!(gateway.search("x").await, Err(MarketError::CircuitOpen)));
        // rate limits are not retried and the open breaker short-circuits
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn validate_goes_through_info() {
        let inner = Arc::new(Flaky {
            calls: AtomicUsize::new(0),
            failures: 0,
            error: || MarketError::RateLimited,
        });
        let gateway = MarketGateway::new(inner, &cfg(5));
        assert!(!gateway.validate("NOPE.NS").await.unwrap());
    }
}
