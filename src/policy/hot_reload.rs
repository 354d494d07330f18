use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{info, warn};

use crate::observability::MetricsRegistry;
use crate::rules::{EvaluationSnapshot, RuleSet};

use super::loader::{PolicyError, PolicyLoader};

/// Watch the policy and reference data files and broadcast new snapshots.
pub struct PolicyWatcher {
    loader: PolicyLoader,
    check_interval: Duration,
    metrics: Option<Arc<MetricsRegistry>>,
    last_policy_version: Option<String>,
    last_refdata_version: Option<String>,
}

impl PolicyWatcher {
    /// Create a new policy watcher.
    pub fn new(loader: PolicyLoader, check_interval: Duration) -> Self {
        PolicyWatcher {
            loader,
            check_interval,
            metrics: None,
            last_policy_version: None,
            last_refdata_version: None,
        }
    }

    /// Record reload outcomes in the given registry.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Load the initial snapshot and start watching for changes.
    ///
    /// Fails if the initial load fails: the service must not start serving
    /// with an empty or partial reference data store. Later reload failures
    /// keep the previous snapshot active.
    pub fn start(
        mut self,
    ) -> Result<
        (
            watch::Receiver<Arc<EvaluationSnapshot>>,
            tokio::task::JoinHandle<()>,
        ),
        PolicyError,
    > {
        if self.check_interval.is_zero() {
            return Err(PolicyError::Validation(
                "Policy reload interval must be non-zero".to_string(),
            ));
        }

        let (policy, snapshot) = self.loader.load()?;

        info!(
            policy_version = %policy.version,
            refdata_version = snapshot.refdata_version(),
            rules = snapshot.ruleset.len(),
            refdata_keys = ?snapshot.refdata.keys(),
            "Loaded initial policy"
        );

        self.last_policy_version = Some(policy.version);
        self.last_refdata_version = Some(snapshot.refdata_version().to_string());

        let (tx, rx) = watch::channel(Arc::new(snapshot));

        let handle = tokio::spawn(async move {
            let mut interval = interval(self.check_interval);
            // The first tick completes immediately; the initial load already happened.
            interval.tick().await;

            loop {
                interval.tick().await;

                match self.check_for_updates(&tx) {
                    Ok(true) => {
                        info!("Policy reloaded successfully");
                        self.record_reload(true);
                    }
                    Ok(false) => {} // No changes
                    Err(e) => {
                        warn!(error = %e, "Error checking for policy updates, keeping previous snapshot");
                        self.record_reload(false);
                    }
                }
            }
        });

        Ok((rx, handle))
    }

    fn record_reload(&self, success: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_policy_reload(success);
        }
    }

    /// Check for policy or reference data updates and broadcast if changed.
    fn check_for_updates(
        &mut self,
        tx: &watch::Sender<Arc<EvaluationSnapshot>>,
    ) -> Result<bool, PolicyError> {
        let policy = self.loader.load_policy()?;
        let refdata = self.loader.load_refdata()?;

        let policy_changed = self.last_policy_version.as_ref() != Some(&policy.version);
        let refdata_changed =
            self.last_refdata_version.as_deref() != Some(refdata.version());

        if !policy_changed && !refdata_changed {
            return Ok(false);
        }

        let ruleset = RuleSet::from_policy(&policy)?;

        info!(
            old_policy_version = ?self.last_policy_version,
            new_policy_version = %policy.version,
            old_refdata_version = ?self.last_refdata_version,
            new_refdata_version = refdata.version(),
            "Policy snapshot changed"
        );

        self.last_policy_version = Some(policy.version);
        self.last_refdata_version = Some(refdata.version().to_string());
        let _ = tx.send(Arc::new(EvaluationSnapshot::new(ruleset, refdata)));

        Ok(true)
    }
}
