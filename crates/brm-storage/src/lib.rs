//! BRM Storage - Rule store with transactional change ledger
//!
//! Each rule family (bounce rules, throughput rules) has a current-state
//! table and an append-only change ledger. [`RuleStore`] pairs every write to
//! the former with exactly one entry in the latter inside a single SQLite
//! transaction.

pub mod db;
pub mod hooks;
pub mod ledger;
pub mod models;
pub mod repository;
pub mod store;
pub mod transaction;

pub use db::DatabasePool;
pub use hooks::{HookChain, RuleHook, TracingHook, WriteContext};
pub use ledger::ChangeLedger;
pub use models::*;
pub use repository::{BounceRules, RuleTable, ThroughputRules};
pub use store::RuleStore;
pub use transaction::{RuleTransaction, TransactionCoordinator, TxState};

/// Store for bounce rules and their history
pub type BounceRuleStore = RuleStore<BounceRules>;

/// Store for throughput rules and their history
pub type ThroughputRuleStore = RuleStore<ThroughputRules>;
