//! Write hooks
//!
//! Each [`RuleStore`](crate::RuleStore) owns a [`HookChain`] that runs around
//! every write. Hooks run inside the write transaction: a hook returning an
//! error aborts the transaction and neither the rule row nor its ledger entry
//! becomes visible.

use async_trait::async_trait;
use brm_common::types::{ChangeAction, RuleId, RuleKind};
use brm_common::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Describes the write a hook is invoked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteContext {
    pub kind: RuleKind,
    pub action: ChangeAction,
    /// `None` for creates, where the id is not assigned yet
    pub rule_id: Option<RuleId>,
}

/// Callback invoked around rule writes
#[async_trait]
pub trait RuleHook<R>: Send + Sync
where
    R: Send + Sync,
{
    /// Called after the transaction began, before the rule row is written
    async fn before_write(&self, _ctx: &WriteContext) -> Result<()> {
        Ok(())
    }

    /// Called after the ledger append, before commit
    async fn after_write(&self, _ctx: &WriteContext, _rule: &R) -> Result<()> {
        Ok(())
    }
}

/// Ordered list of hooks owned by one store instance
pub struct HookChain<R: Send + Sync> {
    hooks: Vec<Arc<dyn RuleHook<R>>>,
}

impl<R: Send + Sync> Default for HookChain<R> {
    fn default() -> Self {
        Self { hooks: Vec::new() }
    }
}

impl<R: Send + Sync> Clone for HookChain<R> {
    fn clone(&self) -> Self {
        Self {
            hooks: self.hooks.clone(),
        }
    }
}

impl<R: Send + Sync> HookChain<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook; hooks run in registration order
    pub fn push(&mut self, hook: Arc<dyn RuleHook<R>>) {
        self.hooks.push(hook);
    }

    pub(crate) async fn before_write(&self, ctx: &WriteContext) -> Result<()> {
        for hook in &self.hooks {
            hook.before_write(ctx).await?;
        }
        Ok(())
    }

    pub(crate) async fn after_write(&self, ctx: &WriteContext, rule: &R) -> Result<()> {
        for hook in &self.hooks {
            hook.after_write(ctx, rule).await?;
        }
        Ok(())
    }
}

/// Logs every rule mutation
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHook;

#[async_trait]
impl<R> RuleHook<R> for TracingHook
where
    R: serde::Serialize + Send + Sync,
{
    async fn after_write(&self, ctx: &WriteContext, rule: &R) -> Result<()> {
        match serde_json::to_string(rule) {
            Ok(snapshot) => info!(
                kind = %ctx.kind,
                action = %ctx.action,
                rule = %snapshot,
                "Rule mutation staged for commit"
            ),
            Err(e) => warn!(
                kind = %ctx.kind,
                action = %ctx.action,
                error = %e,
                "Rule mutation staged for commit, snapshot not serializable"
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brm_common::Error;
    use std::sync::Mutex;

    struct Recorder {
        name: &'static str,
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl RuleHook<u32> for Recorder {
        async fn before_write(&self, ctx: &WriteContext) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}:before:{}", self.name, ctx.action));
            Ok(())
        }

        async fn after_write(&self, _ctx: &WriteContext, rule: &u32) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}:after:{}", self.name, rule));
            Ok(())
        }
    }

    struct Reject;

    #[async_trait]
    impl RuleHook<u32> for Reject {
        async fn before_write(&self, _ctx: &WriteContext) -> Result<()> {
            Err(Error::Hook("rejected".to_string()))
        }
    }

    fn ctx() -> WriteContext {
        WriteContext {
            kind: RuleKind::BounceRule,
            action: ChangeAction::Created,
            rule_id: None,
        }
    }

    #[tokio::test]
    async fn test_hooks_run_in_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut chain = HookChain::<u32>::new();
        chain.push(Arc::new(Recorder {
            name: "a",
            calls: calls.clone(),
        }));
        chain.push(Arc::new(Recorder {
            name: "b",
            calls: calls.clone(),
        }));

        chain.before_write(&ctx()).await.unwrap();
        chain.after_write(&ctx(), &5).await.unwrap();

        assert_eq!(
            *calls.lock().unwrap(),
            vec!["a:before:created", "b:before:created", "a:after:5", "b:after:5"]
        );
    }

    #[tokio::test]
    async fn test_failing_hook_stops_chain() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut chain = HookChain::<u32>::new();
        chain.push(Arc::new(Reject));
        chain.push(Arc::new(Recorder {
            name: "late",
            calls: calls.clone(),
        }));

        assert!(matches!(chain.before_write(&ctx()).await, Err(Error::Hook(_))));
        assert!(calls.lock().unwrap().is_empty());
    }

    struct Unserializable;

    impl serde::Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> std::result::Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("no snapshot"))
        }
    }

    #[tokio::test]
    async fn test_tracing_hook_tolerates_unserializable_rule() {
        let result = TracingHook.after_write(&ctx(), &Unserializable).await;
        assert!(result.is_ok());

        let result = TracingHook.after_write(&ctx(), &7u32).await;
        assert!(result.is_ok());
    }
}
