//! Shared identifiers and error helpers used across all maxrelay crates.

pub mod error;
pub mod types;

pub use {
    error::{Error, Result},
    types::{DestinationId, OperatorId},
};
