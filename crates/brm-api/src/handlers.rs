//! API request handlers

pub mod bounce_rules;
pub mod health;
pub mod throughput_rules;

use serde::{Deserialize, Serialize};

/// Body returned by successful deletes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub result: String,
}

impl DeleteResponse {
    pub fn success() -> Self {
        Self {
            result: "success".to_string(),
        }
    }
}
