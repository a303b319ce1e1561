//! Forwarding engine: watches a source session, drops messages already
//! relayed and delivers the rest to the selected destination.
//!
//! - [`source`]: the driver capability the engine runs against, plus the
//!   candidate-message heuristic
//! - [`dedup`]: fingerprints checked against the persisted history
//! - [`delivery`]: the outbound client capability
//! - [`engine`]: the supervised worker and its state machine
//! - [`control`]: operator commands gated by the session authority

pub mod control;
pub mod dedup;
pub mod delivery;
pub mod engine;
pub mod error;
pub mod source;

pub use {
    control::{CommandOutcome, ControlCommand, Controller},
    dedup::{Classification, Deduplicator, fingerprint},
    delivery::{DeliveryClient, truncate_message},
    engine::{EnginePhase, EngineSettings, EngineStatus, ForwardingEngine},
    error::{EngineError, SourceError},
    source::{SourceDriver, SourceHandle, extract_messages, is_candidate_message},
};
