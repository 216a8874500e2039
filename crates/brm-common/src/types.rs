//! Common types for BRM

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned identifier of a rule row
pub type RuleId = i64;

/// Store-assigned identifier of a change ledger row
pub type ChangeId = i64;

/// Timestamp wrapper
pub type Timestamp = DateTime<Utc>;

/// Kind of mutation recorded in a change ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Created,
    Updated,
    Deleted,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Created => "created",
            ChangeAction::Updated => "updated",
            ChangeAction::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChangeAction {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(ChangeAction::Created),
            "updated" => Ok(ChangeAction::Updated),
            "deleted" => Ok(ChangeAction::Deleted),
            other => Err(crate::Error::Validation(format!(
                "Unknown change action: {}",
                other
            ))),
        }
    }
}

impl TryFrom<String> for ChangeAction {
    type Error = crate::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Rule family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    BounceRule,
    ThroughputRule,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::BounceRule => "bounce_rule",
            RuleKind::ThroughputRule => "throughput_rule",
        }
    }

    /// Human readable label used in error messages
    pub fn label(&self) -> &'static str {
        match self {
            RuleKind::BounceRule => "Bounce rule",
            RuleKind::ThroughputRule => "Throughput rule",
        }
    }
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_action_roundtrip() {
        for action in [
            ChangeAction::Created,
            ChangeAction::Updated,
            ChangeAction::Deleted,
        ] {
            assert_eq!(action.to_string().parse::<ChangeAction>().unwrap(), action);
        }
    }

    #[test]
    fn test_change_action_unknown() {
        assert!("archived".parse::<ChangeAction>().is_err());
        assert!(ChangeAction::try_from("Created".to_string()).is_err());
    }

    #[test]
    fn test_change_action_serde() {
        let json = serde_json::to_string(&ChangeAction::Deleted).unwrap();
        assert_eq!(json, "\"deleted\"");
    }

    #[test]
    fn test_rule_kind_display() {
        assert_eq!(RuleKind::BounceRule.to_string(), "bounce_rule");
        assert_eq!(RuleKind::ThroughputRule.label(), "Throughput rule");
    }
}
