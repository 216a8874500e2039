//! BRM Common - Shared types and utilities
//!
//! This crate provides the error type, configuration and the small set of
//! types shared by the storage, API and server crates.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
