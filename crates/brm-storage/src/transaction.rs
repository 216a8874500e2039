//! Transaction coordinator
//!
//! A rule write and its ledger append share one storage transaction. The
//! transaction walks `Begin -> RuleWritten -> LedgerAppended -> Committed`;
//! any failure moves it to `Aborted` and rolls back, so a reader never sees a
//! rule row without its ledger entry or the other way round.

use crate::db::DatabasePool;
use brm_common::types::{ChangeAction, RuleKind};
use brm_common::{Error, Result};
use sqlx::{Sqlite, SqliteConnection, Transaction};
use std::future::Future;
use tracing::{debug, warn};

/// Lifecycle state of a write transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Begin,
    RuleWritten,
    LedgerAppended,
    Committed,
    Aborted,
}

impl TxState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxState::Committed | TxState::Aborted)
    }
}

/// One in-flight rule write
pub struct RuleTransaction {
    tx: Option<Transaction<'static, Sqlite>>,
    state: TxState,
    kind: RuleKind,
    action: ChangeAction,
}

impl RuleTransaction {
    pub fn state(&self) -> TxState {
        self.state
    }

    /// Connection bound to this transaction
    pub fn conn(&mut self) -> Result<&mut SqliteConnection> {
        match self.tx.as_deref_mut() {
            Some(conn) if !self.state.is_terminal() => Ok(conn),
            _ => Err(Error::Internal(format!(
                "{} {} transaction already {:?}",
                self.kind, self.action, self.state
            ))),
        }
    }

    pub fn mark_rule_written(&mut self) -> Result<()> {
        self.advance(TxState::Begin, TxState::RuleWritten)
    }

    pub fn mark_ledger_appended(&mut self) -> Result<()> {
        self.advance(TxState::RuleWritten, TxState::LedgerAppended)
    }

    fn advance(&mut self, from: TxState, to: TxState) -> Result<()> {
        if self.state != from {
            return Err(Error::Internal(format!(
                "{} {} transaction cannot move from {:?} to {:?}",
                self.kind, self.action, self.state, to
            )));
        }
        self.state = to;
        Ok(())
    }

    /// Commit; refused unless the ledger entry has been appended
    pub async fn commit(mut self) -> Result<()> {
        if self.state != TxState::LedgerAppended {
            let state = self.state;
            self.abort().await;
            return Err(Error::Internal(format!(
                "Refusing to commit {} {} transaction in state {:?}",
                self.kind, self.action, state
            )));
        }

        let tx = self
            .tx
            .take()
            .ok_or_else(|| Error::Internal("Transaction already finished".to_string()))?;

        match tx.commit().await {
            Ok(()) => {
                self.state = TxState::Committed;
                debug!(kind = %self.kind, action = %self.action, "Transaction committed");
                Ok(())
            }
            Err(e) => {
                self.state = TxState::Aborted;
                warn!(kind = %self.kind, action = %self.action, error = %e, "Commit failed");
                Err(Error::Database(format!("Commit failed: {}", e)))
            }
        }
    }

    /// Roll back and move to `Aborted`
    pub async fn abort(&mut self) {
        if let Some(tx) = self.tx.take() {
            if let Err(e) = tx.rollback().await {
                // The connection is discarded by the pool; nothing was committed.
                warn!(kind = %self.kind, action = %self.action, error = %e, "Rollback failed");
            }
        }
        if self.state != TxState::Committed {
            self.state = TxState::Aborted;
        }
        debug!(kind = %self.kind, action = %self.action, "Transaction aborted");
    }
}

impl Drop for RuleTransaction {
    fn drop(&mut self) {
        if self.tx.is_some() {
            // sqlx rolls the transaction back when it is dropped unfinished,
            // e.g. when the write was cancelled by its timeout.
            debug!(
                kind = %self.kind,
                action = %self.action,
                state = ?self.state,
                "Transaction dropped before completion, rolling back"
            );
        }
    }
}

/// Opens write transactions and bounds them in time
#[derive(Clone)]
pub struct TransactionCoordinator {
    db: DatabasePool,
}

impl TransactionCoordinator {
    pub fn new(db: DatabasePool) -> Self {
        Self { db }
    }

    pub async fn begin(&self, kind: RuleKind, action: ChangeAction) -> Result<RuleTransaction> {
        let tx = self.db.begin().await?;
        Ok(RuleTransaction {
            tx: Some(tx),
            state: TxState::Begin,
            kind,
            action,
        })
    }

    /// Run a write under the configured timeout
    ///
    /// On timeout the write future is dropped, which drops its open
    /// transaction and rolls it back.
    pub async fn bounded<T, F>(&self, write: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let limit = self.db.transaction_timeout();
        match tokio::time::timeout(limit, write).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = limit.as_millis() as u64, "Write transaction timed out");
                Err(Error::Timeout(limit.as_millis() as u64))
            }
        }
    }
}

/// Map a ledger append failure onto a storage fault
pub(crate) fn ledger_error(kind: RuleKind, e: Error) -> Error {
    match e {
        Error::Database(msg) | Error::ConstraintViolation(msg) => {
            Error::Database(format!("{} ledger append failed: {}", kind, msg))
        }
        other => other,
    }
}
