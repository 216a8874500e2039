//! Rule store
//!
//! [`RuleStore`] is the entry point for one rule family. Reads go straight to
//! the pool. Every write runs through the transaction coordinator: the rule
//! row is written, exactly one ledger entry describing the resulting state is
//! appended, and both commit together or not at all.

use crate::db::{db_error, DatabasePool};
use crate::hooks::{HookChain, RuleHook, WriteContext};
use crate::ledger::ChangeLedger;
use crate::models::ThroughputRule;
use crate::repository::ThroughputRules;
use crate::transaction::{ledger_error, RuleTransaction, TransactionCoordinator};
use brm_common::types::{ChangeAction, RuleId, RuleKind};
use brm_common::{Error, Result};
use sqlx::pool::PoolConnection;
use sqlx::Sqlite;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A pending write against one rule table
enum Write<'a, I> {
    Create(&'a I),
    Update(RuleId, &'a I),
    Delete(RuleId),
}

impl<I> Write<'_, I> {
    fn action(&self) -> ChangeAction {
        match self {
            Write::Create(_) => ChangeAction::Created,
            Write::Update(..) => ChangeAction::Updated,
            Write::Delete(_) => ChangeAction::Deleted,
        }
    }

    fn rule_id(&self) -> Option<RuleId> {
        match self {
            Write::Create(_) => None,
            Write::Update(id, _) | Write::Delete(id) => Some(*id),
        }
    }
}

/// Rules of one family together with their change ledger
pub struct RuleStore<F: ChangeLedger> {
    db: DatabasePool,
    family: F,
    coordinator: TransactionCoordinator,
    hooks: HookChain<F::Rule>,
}

impl<F: ChangeLedger> RuleStore<F> {
    pub fn new(db: DatabasePool, family: F) -> Self {
        Self {
            coordinator: TransactionCoordinator::new(db.clone()),
            db,
            family,
            hooks: HookChain::new(),
        }
    }

    /// Register a hook that runs inside every write transaction
    pub fn with_hook(mut self, hook: Arc<dyn RuleHook<F::Rule>>) -> Self {
        self.hooks.push(hook);
        self
    }

    async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        self.db.pool().acquire().await.map_err(db_error)
    }

    /// Get a rule, failing with `NotFound` when the id has no row
    pub async fn get(&self, id: RuleId) -> Result<F::Rule> {
        let mut conn = self.acquire().await?;
        self.family
            .fetch(&mut conn, id)
            .await?
            .ok_or_else(|| not_found(F::KIND, id))
    }

    /// All rules, by id ascending
    pub async fn list(&self) -> Result<Vec<F::Rule>> {
        let mut conn = self.acquire().await?;
        self.family.fetch_all(&mut conn).await
    }

    pub async fn create(&self, input: F::Input) -> Result<F::Rule> {
        self.apply(Write::Create(&input)).await
    }

    /// Replace every mutable field of rule `id`
    pub async fn update(&self, id: RuleId, input: F::Input) -> Result<F::Rule> {
        self.apply(Write::Update(id, &input)).await
    }

    /// Delete rule `id`, returning its state at deletion
    pub async fn delete(&self, id: RuleId) -> Result<F::Rule> {
        self.apply(Write::Delete(id)).await
    }

    /// The family's whole change ledger in insertion order
    pub async fn list_changes(&self) -> Result<Vec<F::Change>> {
        let mut conn = self.acquire().await?;
        self.family.list_all(&mut conn).await
    }

    /// History of one rule in insertion order
    ///
    /// Ids without history, including ids that never existed, yield an
    /// empty list rather than `NotFound`.
    pub async fn list_changes_for_rule(&self, id: RuleId) -> Result<Vec<F::Change>> {
        let mut conn = self.acquire().await?;
        self.family.list_for_rule(&mut conn, id).await
    }

    async fn apply(&self, write: Write<'_, F::Input>) -> Result<F::Rule> {
        let ctx = WriteContext {
            kind: F::KIND,
            action: write.action(),
            rule_id: write.rule_id(),
        };

        let result = self.commit_write(&ctx, write).await;

        match &result {
            Ok(rule) => info!(
                kind = %ctx.kind,
                action = %ctx.action,
                rule_id = F::rule_id(rule),
                "Rule write committed"
            ),
            Err(Error::NotFound(msg)) => warn!(kind = %ctx.kind, action = %ctx.action, "{}", msg),
            Err(e) => error!(
                kind = %ctx.kind,
                action = %ctx.action,
                rule_id = ?ctx.rule_id,
                error = %e,
                "Rule write aborted"
            ),
        }

        result
    }

    /// Stage under the write timeout, then commit outside it
    ///
    /// Once the commit has started its outcome is reported as is; a timeout
    /// can no longer hide a write that landed.
    async fn commit_write(&self, ctx: &WriteContext, write: Write<'_, F::Input>) -> Result<F::Rule> {
        let (tx, rule) = self
            .coordinator
            .bounded(self.begin_and_stage(ctx, write))
            .await?;
        tx.commit().await?;
        Ok(rule)
    }

    async fn begin_and_stage(
        &self,
        ctx: &WriteContext,
        write: Write<'_, F::Input>,
    ) -> Result<(RuleTransaction, F::Rule)> {
        let mut tx = self.coordinator.begin(ctx.kind, ctx.action).await?;

        match self.stage(&mut tx, ctx, write).await {
            Ok(rule) => Ok((tx, rule)),
            Err(e) => {
                tx.abort().await;
                Err(e)
            }
        }
    }

    /// Rule write, ledger append and hooks; nothing is visible until commit
    async fn stage(
        &self,
        tx: &mut RuleTransaction,
        ctx: &WriteContext,
        write: Write<'_, F::Input>,
    ) -> Result<F::Rule> {
        self.hooks.before_write(ctx).await?;

        let written = match write {
            Write::Create(input) => Some(self.family.insert(tx.conn()?, input).await?),
            Write::Update(id, input) => self.family.replace(tx.conn()?, id, input).await?,
            Write::Delete(id) => self.family.remove(tx.conn()?, id).await?,
        };
        let rule = match (written, ctx.rule_id) {
            (Some(rule), _) => rule,
            (None, Some(id)) => return Err(not_found(F::KIND, id)),
            (None, None) => {
                return Err(Error::Internal(format!("{} insert returned no row", F::KIND)))
            }
        };
        tx.mark_rule_written()?;
        debug!(kind = %ctx.kind, rule_id = F::rule_id(&rule), "Rule row written");

        self.family
            .append(tx.conn()?, ctx.action, &rule)
            .await
            .map_err(|e| ledger_error(F::KIND, e))?;
        tx.mark_ledger_appended()?;

        self.hooks.after_write(ctx, &rule).await?;
        Ok(rule)
    }
}

impl RuleStore<ThroughputRules> {
    /// Find the throughput rule for a destination MX domain
    pub async fn find_by_domain(&self, mx_domain: &str) -> Result<Option<ThroughputRule>> {
        let mut conn = self.acquire().await?;
        self.family.fetch_by_domain(&mut conn, mx_domain).await
    }
}

fn not_found(kind: RuleKind, id: RuleId) -> Error {
    Error::NotFound(format!("{} {} not found", kind.label(), id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BounceRule, CreateBounceRule, CreateThroughputRule};
    use crate::repository::BounceRules;
    use crate::{BounceRuleStore, ThroughputRuleStore};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn greylist() -> CreateBounceRule {
        CreateBounceRule {
            response_code: 450,
            enhanced_code: "4.7.1".to_string(),
            regex: "greylist".to_string(),
            priority: 1,
            description: "d1".to_string(),
            bounce_action: "suppress".to_string(),
        }
    }

    fn throughput(mx_domain: &str) -> CreateThroughputRule {
        CreateThroughputRule {
            mx_domain: mx_domain.to_string(),
            max_connections: 5,
            messages_per_connection: 100,
            connection_ttl_millis: 60_000,
        }
    }

    async fn bounce_store() -> (DatabasePool, BounceRuleStore) {
        let db = DatabasePool::in_memory().await.unwrap();
        (db.clone(), RuleStore::new(db, BounceRules))
    }

    async fn throughput_store() -> ThroughputRuleStore {
        let db = DatabasePool::in_memory().await.unwrap();
        RuleStore::new(db, ThroughputRules)
    }

    struct FailAfterWrite;

    #[async_trait]
    impl RuleHook<BounceRule> for FailAfterWrite {
        async fn after_write(&self, _ctx: &WriteContext, _rule: &BounceRule) -> Result<()> {
            Err(Error::Hook("simulated failure before commit".to_string()))
        }
    }

    struct SlowAfterWrite(Duration);

    #[async_trait]
    impl RuleHook<BounceRule> for SlowAfterWrite {
        async fn after_write(&self, _ctx: &WriteContext, _rule: &BounceRule) -> Result<()> {
            tokio::time::sleep(self.0).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_create_records_created_entry() {
        let (_db, store) = bounce_store().await;

        let rule = store.create(greylist()).await.unwrap();
        assert_eq!(rule.id, 1);
        assert_eq!(store.get(1).await.unwrap(), rule);

        let history = store.list_changes_for_rule(1).await.unwrap();
        assert_eq!(history.len(), 1);
        let entry = &history[0];
        assert_eq!(entry.action, ChangeAction::Created);
        assert_eq!(entry.bounce_rule_id, 1);
        assert_eq!(entry.response_code, 450);
        assert_eq!(entry.enhanced_code, "4.7.1");
        assert_eq!(entry.regex, "greylist");
        assert_eq!(entry.priority, 1);
        assert_eq!(entry.description, "d1");
        assert_eq!(entry.bounce_action, "suppress");
    }

    #[tokio::test]
    async fn test_update_appends_second_entry() {
        let (_db, store) = bounce_store().await;
        store.create(greylist()).await.unwrap();

        let updated = store
            .update(
                1,
                CreateBounceRule {
                    priority: 5,
                    ..greylist()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.id, 1);
        assert_eq!(store.get(1).await.unwrap().priority, 5);

        let history = store.list_changes_for_rule(1).await.unwrap();
        let actions: Vec<ChangeAction> = history.iter().map(|c| c.action).collect();
        assert_eq!(actions, vec![ChangeAction::Created, ChangeAction::Updated]);
        assert_eq!(history[0].priority, 1);
        assert_eq!(history[1].priority, 5);
    }

    #[tokio::test]
    async fn test_history_survives_deletion() {
        let (_db, store) = bounce_store().await;
        store.create(greylist()).await.unwrap();
        store
            .update(
                1,
                CreateBounceRule {
                    priority: 5,
                    ..greylist()
                },
            )
            .await
            .unwrap();

        let deleted = store.delete(1).await.unwrap();
        assert_eq!(deleted.priority, 5);

        assert!(matches!(store.get(1).await, Err(Error::NotFound(_))));
        assert!(store.list().await.unwrap().is_empty());

        let history = store.list_changes_for_rule(1).await.unwrap();
        let actions: Vec<ChangeAction> = history.iter().map(|c| c.action).collect();
        assert_eq!(
            actions,
            vec![
                ChangeAction::Created,
                ChangeAction::Updated,
                ChangeAction::Deleted
            ]
        );
        assert_eq!(history[2].priority, 5);

        // A second delete is an error, not a silent no-op.
        assert!(matches!(store.delete(1).await, Err(Error::NotFound(_))));
        assert_eq!(store.list_changes_for_rule(1).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_not_found_symmetry() {
        let (_db, store) = bounce_store().await;
        store.create(greylist()).await.unwrap();

        for id in [0, 2, 999] {
            assert!(matches!(store.get(id).await, Err(Error::NotFound(_))));
            assert!(matches!(
                store.update(id, greylist()).await,
                Err(Error::NotFound(_))
            ));
            assert!(matches!(store.delete(id).await, Err(Error::NotFound(_))));
        }

        // Failed writes leave no trace in the ledger.
        assert_eq!(store.list_changes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ids_are_never_reused() {
        let (_db, store) = bounce_store().await;
        let first = store.create(greylist()).await.unwrap();
        let second = store.create(greylist()).await.unwrap();

        store.delete(second.id).await.unwrap();
        let third = store.create(greylist()).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(third.id, 3);
    }

    #[tokio::test]
    async fn test_duplicate_mx_domain_writes_no_entry() {
        let store = throughput_store().await;
        store.create(throughput("mx.example.com")).await.unwrap();

        let err = store.create(throughput("mx.example.com")).await.unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation(_)), "got {}", err);

        assert_eq!(store.list().await.unwrap().len(), 1);
        let changes = store.list_changes().await.unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].action, ChangeAction::Created);
    }

    #[tokio::test]
    async fn test_failed_ledger_append_rolls_back_rule() {
        let (db, store) = bounce_store().await;
        sqlx::query("DROP TABLE bounce_rule_changes")
            .execute(db.pool())
            .await
            .unwrap();

        let err = store.create(greylist()).await.unwrap_err();
        assert!(matches!(err, Error::Database(_)), "got {}", err);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_before_commit_leaves_no_trace() {
        let db = DatabasePool::in_memory().await.unwrap();
        let plain = RuleStore::new(db.clone(), BounceRules);
        let original = plain.create(greylist()).await.unwrap();

        let failing = RuleStore::new(db, BounceRules).with_hook(Arc::new(FailAfterWrite));

        assert!(matches!(failing.create(greylist()).await, Err(Error::Hook(_))));
        assert!(matches!(
            failing
                .update(
                    original.id,
                    CreateBounceRule {
                        priority: 9,
                        ..greylist()
                    }
                )
                .await,
            Err(Error::Hook(_))
        ));
        assert!(matches!(failing.delete(original.id).await, Err(Error::Hook(_))));

        assert_eq!(plain.list().await.unwrap(), vec![original]);
        assert_eq!(plain.list_changes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_timed_out_write_is_rolled_back() {
        let db = DatabasePool::in_memory()
            .await
            .unwrap()
            .with_transaction_timeout(Duration::from_millis(50));
        let store = RuleStore::new(db, BounceRules)
            .with_hook(Arc::new(SlowAfterWrite(Duration::from_millis(500))));

        let err = store.create(greylist()).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(50)));
        assert!(err.is_storage_fault());

        assert!(store.list().await.unwrap().is_empty());
        assert!(store.list_changes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_staged_within_timeout_is_committed() {
        let db = DatabasePool::in_memory()
            .await
            .unwrap()
            .with_transaction_timeout(Duration::from_millis(400));
        let store = RuleStore::new(db, BounceRules)
            .with_hook(Arc::new(SlowAfterWrite(Duration::from_millis(250))));

        let rule = store.create(greylist()).await.unwrap();

        assert_eq!(store.list().await.unwrap(), vec![rule]);
        assert_eq!(store.list_changes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_throughput_history_survives_deletion() {
        let store = throughput_store().await;
        let created = store.create(throughput("mx-a.example.com")).await.unwrap();

        let updated = store
            .update(
                created.id,
                CreateThroughputRule {
                    max_connections: 9,
                    ..throughput("mx-b.example.com")
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.mx_domain, "mx-b.example.com");
        assert_eq!(store.get(created.id).await.unwrap(), updated);
        assert_eq!(store.find_by_domain("mx-a.example.com").await.unwrap(), None);

        let deleted = store.delete(created.id).await.unwrap();
        assert_eq!(deleted, updated);
        assert!(matches!(store.get(created.id).await, Err(Error::NotFound(_))));

        let history = store.list_changes_for_rule(created.id).await.unwrap();
        let snapshots: Vec<(ChangeAction, &str, i32)> = history
            .iter()
            .map(|c| (c.action, c.mx_domain.as_str(), c.max_connections))
            .collect();
        assert_eq!(
            snapshots,
            vec![
                (ChangeAction::Created, "mx-a.example.com", 5),
                (ChangeAction::Updated, "mx-b.example.com", 9),
                (ChangeAction::Deleted, "mx-b.example.com", 9),
            ]
        );

        assert!(matches!(store.delete(created.id).await, Err(Error::NotFound(_))));
        assert_eq!(store.list_changes().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_creates_each_get_one_entry() {
        let db = DatabasePool::in_memory().await.unwrap();
        let store = Arc::new(RuleStore::new(db, ThroughputRules));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .create(throughput(&format!("mx{}.example.com", i)))
                        .await
                })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 8);

        for id in ids {
            let history = store.list_changes_for_rule(id).await.unwrap();
            assert_eq!(history.len(), 1);
            assert_eq!(history[0].action, ChangeAction::Created);
        }
    }

    #[tokio::test]
    async fn test_find_by_domain() {
        let store = throughput_store().await;
        let rule = store.create(throughput("mx.example.net")).await.unwrap();

        assert_eq!(store.find_by_domain("mx.example.net").await.unwrap(), Some(rule));
        assert_eq!(store.find_by_domain("mx.example.com").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_history_for_unknown_rule_is_empty() {
        let store = throughput_store().await;
        assert!(store.list_changes_for_rule(12).await.unwrap().is_empty());
    }
}
