//! Request validation
//!
//! Checks run before a write reaches the store. Stored values are never
//! re-validated on read.

use brm_common::{Error, Result};
use brm_storage::{CreateBounceRule, CreateThroughputRule};
use regex::Regex;

/// Validate a bounce rule create/update payload
pub fn validate_bounce_rule(input: &CreateBounceRule) -> Result<()> {
    if !(200..=599).contains(&input.response_code) {
        return Err(Error::Validation(format!(
            "response_code must be between 200 and 599, got {}",
            input.response_code
        )));
    }

    if !is_enhanced_status_code(&input.enhanced_code) {
        return Err(Error::Validation(format!(
            "enhanced_code must look like class.subject.detail, got '{}'",
            input.enhanced_code
        )));
    }

    if let Err(e) = Regex::new(&input.regex) {
        return Err(Error::Validation(format!("regex does not compile: {}", e)));
    }

    if input.bounce_action.trim().is_empty() {
        return Err(Error::Validation("bounce_action must not be empty".to_string()));
    }

    Ok(())
}

/// Validate a throughput rule create/update payload
pub fn validate_throughput_rule(input: &CreateThroughputRule) -> Result<()> {
    if input.mx_domain.is_empty() || input.mx_domain.chars().any(char::is_whitespace) {
        return Err(Error::Validation(format!(
            "mx_domain must be a non-empty host name, got '{}'",
            input.mx_domain
        )));
    }

    if input.max_connections <= 0 {
        return Err(Error::Validation("max_connections must be positive".to_string()));
    }

    if input.messages_per_connection <= 0 {
        return Err(Error::Validation(
            "messages_per_connection must be positive".to_string(),
        ));
    }

    if input.connection_ttl_millis <= 0 {
        return Err(Error::Validation(
            "connection_ttl_millis must be positive".to_string(),
        ));
    }

    Ok(())
}

/// RFC 3463 enhanced status code: class 2, 4 or 5, then two 1-3 digit parts
fn is_enhanced_status_code(code: &str) -> bool {
    let parts: Vec<&str> = code.split('.').collect();
    let [class, subject, detail] = parts.as_slice() else {
        return false;
    };

    let is_number = |part: &str| {
        (1..=3).contains(&part.len()) && part.chars().all(|c| c.is_ascii_digit())
    };

    matches!(*class, "2" | "4" | "5") && is_number(*subject) && is_number(*detail)
}
