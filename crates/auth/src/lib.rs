//! Operator authentication for the control plane.
//!
//! This crate provides:
//! - `SessionAuthority`: password check plus sliding-expiry operator sessions
//! - constant-time helpers for comparing secrets

pub mod password;
pub mod session;

pub use {
    password::{safe_equal, sha256_hex, verify_password},
    session::{DEFAULT_SESSION_TTL, SessionAuthority},
};
