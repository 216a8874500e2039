//! Repository layer: current-state rule tables
//!
//! A [`RuleTable`] owns the rows of one rule family. It only knows how to read
//! and write those rows on a given connection; pairing writes with the change
//! ledger is the job of [`RuleStore`](crate::RuleStore).

pub mod bounce_rules;
pub mod throughput_rules;

use async_trait::async_trait;
use brm_common::types::{RuleId, RuleKind};
use brm_common::Result;
use serde::Serialize;
use sqlx::SqliteConnection;

pub use bounce_rules::BounceRules;
pub use throughput_rules::ThroughputRules;

/// Current-state table of one rule family
#[async_trait]
pub trait RuleTable: Send + Sync + 'static {
    /// Stored rule
    type Rule: Clone + Serialize + Send + Sync + 'static;
    /// Mutable fields supplied on create and update
    type Input: Send + Sync + 'static;

    const KIND: RuleKind;

    fn rule_id(rule: &Self::Rule) -> RuleId;

    async fn fetch(&self, conn: &mut SqliteConnection, id: RuleId) -> Result<Option<Self::Rule>>;

    /// All rules by id ascending
    async fn fetch_all(&self, conn: &mut SqliteConnection) -> Result<Vec<Self::Rule>>;

    /// Insert a row; the store assigns the id
    async fn insert(&self, conn: &mut SqliteConnection, input: &Self::Input) -> Result<Self::Rule>;

    /// Replace every mutable field; `None` when no row has this id
    async fn replace(
        &self,
        conn: &mut SqliteConnection,
        id: RuleId,
        input: &Self::Input,
    ) -> Result<Option<Self::Rule>>;

    /// Delete the row and return its last state; `None` when no row has this id
    async fn remove(&self, conn: &mut SqliteConnection, id: RuleId) -> Result<Option<Self::Rule>>;
}
