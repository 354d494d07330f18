use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::domain::Verdict;

/// Metrics registry for the application.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Total decision requests processed
    pub decisions_total: AtomicU64,

    /// Decision requests by outcome
    pub decisions_allow: AtomicU64,
    pub decisions_deny: AtomicU64,

    /// Decisions where no rule fired and the default applied
    pub decisions_default: AtomicU64,

    /// Requests rejected before evaluation (malformed input)
    pub requests_rejected: AtomicU64,

    /// Decision latency buckets (microseconds)
    pub latency_under_50us: AtomicU64,
    pub latency_50_250us: AtomicU64,
    pub latency_250us_1ms: AtomicU64,
    pub latency_1_5ms: AtomicU64,
    pub latency_over_5ms: AtomicU64,

    /// Rule evaluation counts
    pub rules_evaluated_total: AtomicU64,
    pub rules_fired_total: AtomicU64,

    /// Policy reloads
    pub policy_reloads_total: AtomicU64,
    pub policy_reload_errors: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        MetricsRegistry::default()
    }

    /// Record a verdict and the rule evaluations that produced it.
    pub fn record_verdict(&self, verdict: &Verdict) {
        self.decisions_total.fetch_add(1, Ordering::Relaxed);

        if verdict.allowed() {
            self.decisions_allow.fetch_add(1, Ordering::Relaxed);
        } else {
            self.decisions_deny.fetch_add(1, Ordering::Relaxed);
        }

        if verdict.is_default() {
            self.decisions_default.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rules_fired_total.fetch_add(1, Ordering::Relaxed);
        }

        self.rules_evaluated_total
            .fetch_add(verdict.rules_evaluated as u64, Ordering::Relaxed);
    }

    /// Record a request rejected before evaluation.
    pub fn record_rejected(&self) {
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record decision latency.
    pub fn record_latency(&self, start: Instant) {
        let micros = start.elapsed().as_micros() as u64;

        if micros < 50 {
            self.latency_under_50us.fetch_add(1, Ordering::Relaxed);
        } else if micros < 250 {
            self.latency_50_250us.fetch_add(1, Ordering::Relaxed);
        } else if micros < 1000 {
            self.latency_250us_1ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 5000 {
            self.latency_1_5ms.fetch_add(1, Ordering::Relaxed);
        } else {
            self.latency_over_5ms.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a policy reload.
    pub fn record_policy_reload(&self, success: bool) {
        self.policy_reloads_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.policy_reload_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        format!(
            r#"# HELP actiongate_decisions_total Total number of decision requests
# TYPE actiongate_decisions_total counter
actiongate_decisions_total {}

# HELP actiongate_decisions Decision requests by outcome
# TYPE actiongate_decisions counter
actiongate_decisions{{outcome="allow"}} {}
actiongate_decisions{{outcome="deny"}} {}

# HELP actiongate_decisions_default_total Decisions where no rule fired
# TYPE actiongate_decisions_default_total counter
actiongate_decisions_default_total {}

# HELP actiongate_requests_rejected_total Requests rejected as malformed
# TYPE actiongate_requests_rejected_total counter
actiongate_requests_rejected_total {}

# HELP actiongate_decision_latency_total Decisions by latency range (ranges do not overlap)
# TYPE actiongate_decision_latency_total counter
actiongate_decision_latency_total{{range="under_50us"}} {}
actiongate_decision_latency_total{{range="50us_250us"}} {}
actiongate_decision_latency_total{{range="250us_1ms"}} {}
actiongate_decision_latency_total{{range="1ms_5ms"}} {}
actiongate_decision_latency_total{{range="over_5ms"}} {}

# HELP actiongate_rules_evaluated_total Total rule evaluations
# TYPE actiongate_rules_evaluated_total counter
actiongate_rules_evaluated_total {}

# HELP actiongate_rules_fired_total Total rules that fired
# TYPE actiongate_rules_fired_total counter
actiongate_rules_fired_total {}

# HELP actiongate_policy_reloads_total Policy reload operations
# TYPE actiongate_policy_reloads_total counter
actiongate_policy_reloads_total {}

# HELP actiongate_policy_reload_errors_total Policy reload errors
# TYPE actiongate_policy_reload_errors_total counter
actiongate_policy_reload_errors_total {}
"#,
            self.decisions_total.load(Ordering::Relaxed),
            self.decisions_allow.load(Ordering::Relaxed),
            self.decisions_deny.load(Ordering::Relaxed),
            self.decisions_default.load(Ordering::Relaxed),
            self.requests_rejected.load(Ordering::Relaxed),
            self.latency_under_50us.load(Ordering::Relaxed),
            self.latency_50_250us.load(Ordering::Relaxed),
            self.latency_250us_1ms.load(Ordering::Relaxed),
            self.latency_1_5ms.load(Ordering::Relaxed),
            self.latency_over_5ms.load(Ordering::Relaxed),
            self.rules_evaluated_total.load(Ordering::Relaxed),
            self.rules_fired_total.load(Ordering::Relaxed),
            self.policy_reloads_total.load(Ordering::Relaxed),
            self.policy_reload_errors.load(Ordering::Relaxed),
        )
    }
}

/// Guard for timing operations.
pub struct TimingGuard<'a> {
    registry: &'a MetricsRegistry,
    start: Instant,
}

impl<'a> TimingGuard<'a> {
    pub fn new(registry: &'a MetricsRegistry) -> Self {
        TimingGuard {
            registry,
            start: Instant::now(),
        }
    }
}

impl<'a> Drop for TimingGuard<'a> {
    fn drop(&mut self) {
        self.registry.record_latency(self.start);
    }
}
