//! The `DispatchEngine` fans a notification out to every resolved target
//! and runs the bounded retry loop for each one on its own task.

use crate::{
    config::{Config, DispatchConfig},
    core::{DeliveryOutcome, DispatchReport, TargetRegistry, WebhookSender},
    dispatch::{DispatchError, HttpWebhookSender},
    registry::TargetResolver,
};
use arc_swap::ArcSwap;
use futures::future::join_all;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Dispatches one notification to every enabled, subscribed target.
pub struct DispatchEngine {
    resolver: TargetResolver,
    sender: Arc<dyn WebhookSender>,
    config: Arc<ArcSwap<DispatchConfig>>,
}

impl DispatchEngine {
    /// Creates an engine with an explicit sender, usually a fake in tests.
    pub fn new(
        registry: Arc<dyn TargetRegistry>,
        sender: Arc<dyn WebhookSender>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            resolver: TargetResolver::new(registry),
            sender,
            config: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    /// Creates an engine with the reqwest-backed sender built from `config`.
    pub fn from_config(
        config: &Config,
        registry: Arc<dyn TargetRegistry>,
    ) -> anyhow::Result<Self> {
        let sender = HttpWebhookSender::from_config(&config.http)?;
        Ok(Self::new(registry, Arc::new(sender), config.dispatch.clone()))
    }

    /// Handle for swapping in a new `DispatchConfig` at runtime.
    ///
    /// Each notification captures one snapshot at the start, so a reload
    /// never changes the attempt budget of a notification already in
    /// flight.
    pub fn config_handle(&self) -> Arc<ArcSwap<DispatchConfig>> {
        self.config.clone()
    }

    /// Delivers `payload` to every enabled target subscribed to `hook_id`.
    ///
    /// Blocks until every per-target delivery has finished; the deliveries
    /// themselves run concurrently and never serialize on each other.
    /// Callers that want fire-and-forget semantics wrap this in
    /// `tokio::spawn`.
    ///
    /// The only error is a failed registry lookup, in which case nothing is
    /// delivered. Per-target exhaustion is reported in the
    /// [`DispatchReport`] and logged, never returned as an error.
    #[instrument(skip(self, payload), fields(hook_id = %hook_id))]
    pub async fn notify(
        &self,
        hook_id: &str,
        payload: Vec<u8>,
    ) -> Result<DispatchReport, DispatchError> {
        // One snapshot for the whole notification, not one per attempt.
        let config = self.config.load_full();

        let targets = match self.resolver.lookup(hook_id).await {
            Ok(targets) => targets,
            Err(e) => {
                error!(hook_id, error = %e, "Target lookup failed, abandoning notification");
                return Err(DispatchError::RegistryUnavailable(e));
            }
        };

        if targets.is_empty() {
            debug!(hook_id, "No enabled targets subscribed, nothing to deliver");
            return Ok(DispatchReport::default());
        }

        let payload = Arc::new(payload);
        let handles: Vec<_> = targets
            .into_iter()
            .map(|target| {
                let sender = self.sender.clone();
                let payload = payload.clone();
                let config = config.clone();
                tokio::spawn(async move {
                    let outcome =
                        deliver(sender.as_ref(), &target.url, &payload, &config).await;
                    (target, outcome)
                })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for result in join_all(handles).await {
            match result {
                Ok(pair) => outcomes.push(pair),
                Err(e) => error!(error = %e, "Delivery task panicked"),
            }
        }

        Ok(DispatchReport { outcomes })
    }
}

/// Runs the bounded retry loop for one target.
///
/// A 2xx response ends the loop immediately. Transport failures and non-2xx
/// responses each consume one attempt; with `retry_backoff_ms` unset the
/// next attempt follows immediately, otherwise the delay doubles after each
/// failure. An attempt budget of zero exhausts without any HTTP call.
#[instrument(skip_all, fields(url = %url))]
async fn deliver(
    sender: &dyn WebhookSender,
    url: &str,
    payload: &[u8],
    config: &DispatchConfig,
) -> DeliveryOutcome {
    let attempts = config.attempts;
    let start = Instant::now();

    for attempt in 0..attempts {
        debug!(attempt = attempt + 1, attempts, "Sending webhook request");
        match sender.send(url, payload).await {
            Ok(()) => {
                metrics::counter!("webhook_deliveries_total", "status" => "delivered")
                    .increment(1);
                metrics::histogram!("webhook_delivery_duration_seconds")
                    .record(start.elapsed().as_secs_f64());
                debug!(attempt = attempt + 1, "Webhook delivered");
                return DeliveryOutcome::Delivered {
                    attempts_used: attempt + 1,
                };
            }
            Err(e) => {
                metrics::counter!("webhook_attempts_total", "status" => "failure")
                    .increment(1);
                debug!(attempt = attempt + 1, error = %e, "Webhook attempt failed");

                if attempt + 1 < attempts {
                    if let Some(backoff_ms) = config.retry_backoff_ms {
                        let backoff = backoff_delay_ms(backoff_ms, attempt);
                        debug!(backoff_ms = backoff, "Retrying after backoff");
                        sleep(Duration::from_millis(backoff)).await;
                    }
                }
            }
        }
    }

    metrics::counter!("webhook_deliveries_total", "status" => "exhausted").increment(1);
    warn!(url, attempts, "Sending webhook request failed, retry budget exhausted");
    DeliveryOutcome::Exhausted {
        attempts_used: attempts,
    }
}

/// Exponential backoff for the given zero-based attempt, saturating instead
/// of overflowing for very large attempt budgets.
fn backoff_delay_ms(backoff_ms: u64, attempt: u32) -> u64 {
    backoff_ms.saturating_mul(1u64 << attempt.min(63))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Target;
    use crate::dispatch::DeliveryError;
    use crate::registry::InMemoryTargetRegistry;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    // Fails a fixed number of times, then succeeds; records every payload.
    struct CountingSender {
        failures_before_success: u32,
        calls: AtomicU32,
        payloads: Mutex<Vec<Vec<u8>>>,
    }

    impl CountingSender {
        fn failing(failures_before_success: u32) -> Self {
            Self {
                failures_before_success,
                calls: AtomicU32::new(0),
                payloads: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WebhookSender for CountingSender {
        async fn send(&self, _url: &str, payload: &[u8]) -> Result<(), DeliveryError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.payloads.lock().unwrap().push(payload.to_vec());
            if call < self.failures_before_success {
                Err(DeliveryError::Status(503))
            } else {
                Ok(())
            }
        }
    }

    fn config_with_attempts(attempts: u32) -> DispatchConfig {
        DispatchConfig {
            attempts,
            retry_backoff_ms: None,
        }
    }

    #[tokio::test]
    async fn zero_attempts_makes_no_calls_and_exhausts() {
        let sender = CountingSender::failing(0);
        let outcome = deliver(
            &sender,
            "http://a.test/hook",
            b"{}",
            &config_with_attempts(0),
        )
        .await;

        assert_eq!(outcome, DeliveryOutcome::Exhausted { attempts_used: 0 });
        assert_eq!(sender.calls(), 0);
    }

    #[tokio::test]
    async fn always_failing_target_consumes_exactly_the_budget() {
        let sender = CountingSender::failing(u32::MAX);
        let outcome = deliver(
            &sender,
            "http://a.test/hook",
            b"{}",
            &config_with_attempts(3),
        )
        .await;

        assert_eq!(outcome, DeliveryOutcome::Exhausted { attempts_used: 3 });
        assert_eq!(sender.calls(), 3);
    }

    #[tokio::test]
    async fn success_after_k_failures_stops_at_k_plus_one_calls() {
        let sender = CountingSender::failing(2);
        let outcome = deliver(
            &sender,
            "http://a.test/hook",
            b"{}",
            &config_with_attempts(5),
        )
        .await;

        assert_eq!(outcome, DeliveryOutcome::Delivered { attempts_used: 3 });
        assert_eq!(sender.calls(), 3);
    }

    #[tokio::test]
    async fn first_attempt_success_makes_one_call() {
        let sender = CountingSender::failing(0);
        let outcome = deliver(
            &sender,
            "http://a.test/hook",
            b"{}",
            &config_with_attempts(4),
        )
        .await;

        assert_eq!(outcome, DeliveryOutcome::Delivered { attempts_used: 1 });
        assert_eq!(sender.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_doubles_between_failed_attempts() {
        let sender = CountingSender::failing(u32::MAX);
        let config = DispatchConfig {
            attempts: 3,
            retry_backoff_ms: Some(100),
        };

        let started = tokio::time::Instant::now();
        let outcome = deliver(&sender, "http://a.test/hook", b"{}", &config).await;

        // 100ms after the first failure, 200ms after the second.
        assert_eq!(outcome, DeliveryOutcome::Exhausted { attempts_used: 3 });
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }

    #[test]
    fn backoff_delay_saturates_for_huge_attempt_counts() {
        assert_eq!(backoff_delay_ms(100, 0), 100);
        assert_eq!(backoff_delay_ms(100, 1), 200);
        assert_eq!(backoff_delay_ms(100, 5), 3_200);
        // Past 63 doublings the delay pins at the ceiling instead of
        // overflowing.
        assert_eq!(backoff_delay_ms(100, 63), u64::MAX);
        assert_eq!(backoff_delay_ms(100, 64), u64::MAX);
        assert_eq!(backoff_delay_ms(100, u32::MAX), u64::MAX);
        assert_eq!(backoff_delay_ms(1, 63), 1u64 << 63);
    }

    #[tokio::test]
    async fn registry_failure_aborts_the_whole_notification() {
        struct BrokenRegistry;

        #[async_trait]
        impl TargetRegistry for BrokenRegistry {
            async fn targets_for(
                &self,
                _hook_id: &str,
            ) -> Result<Vec<Target>, crate::registry::RegistryError> {
                Err(crate::registry::RegistryError::Unavailable(
                    "registry down".to_string(),
                ))
            }
        }

        let sender = Arc::new(CountingSender::failing(0));
        let engine = DispatchEngine::new(
            Arc::new(BrokenRegistry),
            sender.clone(),
            config_with_attempts(1),
        );

        let err = engine.notify("review.published", b"{}".to_vec()).await;
        assert!(matches!(err, Err(DispatchError::RegistryUnavailable(_))));
        assert_eq!(sender.calls(), 0);
    }

    #[tokio::test]
    async fn config_snapshot_is_captured_per_notification() {
        let registry = Arc::new(InMemoryTargetRegistry::new(vec![Target::new(
            "http://a.test/hook",
            "review.published",
        )]));
        let sender = Arc::new(CountingSender::failing(u32::MAX));
        let engine = DispatchEngine::new(registry, sender.clone(), config_with_attempts(2));

        let report = engine.notify("review.published", b"{}".to_vec()).await.unwrap();
        assert_eq!(sender.calls(), 2);
        assert_eq!(report.exhausted_count(), 1);

        // A swapped-in budget applies to the next notification only.
        engine
            .config_handle()
            .store(Arc::new(config_with_attempts(4)));
        let report = engine.notify("review.published", b"{}".to_vec()).await.unwrap();
        assert_eq!(sender.calls(), 6);
        assert_eq!(report.exhausted_count(), 1);
    }
}
