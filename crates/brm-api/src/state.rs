//! Shared application state

use brm_common::types::{ChangeAction, RuleKind};
use brm_storage::{
    BounceRuleStore, BounceRules, DatabasePool, RuleStore, ThroughputRuleStore, ThroughputRules,
    TracingHook,
};
use std::sync::Arc;

use crate::metrics::Metrics;

/// State handed to every handler
pub struct AppState {
    pub db_pool: DatabasePool,
    pub bounce_rules: BounceRuleStore,
    pub throughput_rules: ThroughputRuleStore,
    /// `None` when metrics are disabled
    pub metrics: Option<Arc<Metrics>>,
}

impl AppState {
    /// Build both rule stores over one pool, with write tracing enabled
    pub fn new(db_pool: DatabasePool, metrics: Option<Arc<Metrics>>) -> Self {
        let bounce_rules =
            RuleStore::new(db_pool.clone(), BounceRules).with_hook(Arc::new(TracingHook));
        let throughput_rules =
            RuleStore::new(db_pool.clone(), ThroughputRules).with_hook(Arc::new(TracingHook));

        Self {
            db_pool,
            bounce_rules,
            throughput_rules,
            metrics,
        }
    }

    /// Count a committed mutation
    pub(crate) fn record_mutation(&self, kind: RuleKind, action: ChangeAction) {
        if let Some(metrics) = &self.metrics {
            metrics.record_mutation(kind, action);
        }
    }
}
