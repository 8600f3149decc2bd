//! Cache consumer for executing invalidation plans.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::config::CacheConfig;
use super::events::EventQueue;
use super::planner::InvalidationPlan;
use super::store::{CacheError, CacheStore};

pub(crate) const METRIC_CACHE_INVALIDATE_ERROR: &str = "rapport_cache_invalidate_error_total";
pub(crate) const METRIC_CACHE_CONSUME_MS: &str = "rapport_cache_consume_ms";

/// Drains queued events, plans them and deletes the affected keys.
///
/// Deletes are best effort: a failing backend is logged and counted, and
/// the remaining steps of the plan still run.
pub struct CacheConsumer {
    config: CacheConfig,
    store: Arc<dyn CacheStore>,
    queue: Arc<EventQueue>,
}

/// What one consumption pass removed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsumeReport {
    pub events: usize,
    pub deleted: u64,
    pub failures: usize,
}

impl CacheConsumer {
    pub fn new(config: CacheConfig, store: Arc<dyn CacheStore>, queue: Arc<EventQueue>) -> Self {
        Self {
            config,
            store,
            queue,
        }
    }

    /// Consume pending events; returns `None` when the queue was empty.
    #[instrument(skip(self))]
    pub async fn consume(&self) -> Option<ConsumeReport> {
        let started_at = Instant::now();
        let events = self.queue.drain(self.config.consume_batch_limit.max(1));
        if events.is_empty() {
            return None;
        }

        let event_count = events.len();
        let event_ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
        let plan = InvalidationPlan::from_events(events);

        info!(
            event_count,
            event_ids = ?event_ids,
            plan = %plan,
            "Cache consumption starting"
        );

        let mut report = self.execute(&plan).await;
        report.events = event_count;

        info!(
            event_count,
            deleted = report.deleted,
            failures = report.failures,
            "Cache consumption complete"
        );

        histogram!(METRIC_CACHE_CONSUME_MS)
            .record(started_at.elapsed().as_secs_f64() * 1000.0);

        Some(report)
    }

    async fn execute(&self, plan: &InvalidationPlan) -> ConsumeReport {
        let mut report = ConsumeReport::default();

        let exact = plan.exact_keys();
        if !exact.is_empty() {
            match self.store.delete_exact(&exact).await {
                Ok(deleted) => report.deleted += deleted,
                Err(err) => {
                    report.failures += 1;
                    self.record_failure("delete_exact", &exact.join(","), &err);
                }
            }
        }

        for family in &plan.families {
            let pattern = family.glob();
            match self.store.delete_pattern(&pattern).await {
                Ok(deleted) => report.deleted += deleted,
                Err(err) => {
                    report.failures += 1;
                    self.record_failure("delete_pattern", &pattern, &err);
                }
            }
        }

        report
    }

    fn record_failure(&self, op: &'static str, target: &str, err: &CacheError) {
        counter!(METRIC_CACHE_INVALIDATE_ERROR, "op" => op).increment(1);
        warn!(
            op,
            target,
            backend = self.store.backend_name(),
            error = %err,
            "Cache invalidation failed"
        );
    }
}
