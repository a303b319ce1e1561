//! Durable relay state: settings, destination registry and processed-message
//! history, each kept in its own JSON document.
//!
//! Every mutation is flushed to disk before it returns (write-through, no
//! batching). Missing or corrupt files load as defaults.

pub mod error;
pub mod history;
pub mod settings;
mod table;

use std::{collections::BTreeMap, path::Path};

use {
    chrono::{SecondsFormat, Utc},
    maxrelay_common::DestinationId,
    maxrelay_config::StoreConfig,
    tracing::info,
};

pub use {
    error::{Result, StoreError},
    history::{Fingerprint, FingerprintLog, ProcessedHistory},
    settings::Settings,
};

use table::JsonTable;

/// Destination ID → human-readable label (`telegram_chats.json`).
pub type DestinationRegistry = BTreeMap<DestinationId, String>;

/// Handle to the three persisted tables. Cheap to share behind an `Arc`.
pub struct Store {
    settings: JsonTable<Settings>,
    registry: JsonTable<DestinationRegistry>,
    history: JsonTable<ProcessedHistory>,
    history_cap: usize,
    history_retain: usize,
}

impl Store {
    /// Load all tables from `dir`. Never fails: unreadable files start empty.
    pub fn open(dir: &Path, config: &StoreConfig) -> Self {
        let store = Self {
            settings: JsonTable::load(dir.join(&config.settings_file)),
            registry: JsonTable::load(dir.join(&config.registry_file)),
            history: JsonTable::load(dir.join(&config.history_file)),
            history_cap: config.history_cap,
            history_retain: config.history_retain,
        };
        info!(
            dir = %dir.display(),
            destinations = store.destination_count(),
            processed = store.total_processed(),
            "state loaded"
        );
        store
    }

    // ── settings ────────────────────────────────────────────────────────

    pub fn settings(&self) -> Settings {
        self.settings.read(Clone::clone)
    }

    pub fn selected_destination(&self) -> Option<DestinationId> {
        self.settings
            .read(|s| s.selected_destination_id.clone())
    }

    pub fn admin_destination(&self) -> Option<DestinationId> {
        self.settings.read(|s| s.admin_operator_id.clone())
    }

    pub fn select_destination(&self, id: DestinationId) -> Result<()> {
        self.settings.update(|s| {
            let changed = s.selected_destination_id.as_ref() != Some(&id);
            s.selected_destination_id = Some(id);
            ((), changed)
        })
    }

    /// Record the admin chat unless one is already set. Returns `true` when
    /// this call set it.
    pub fn set_admin_if_unset(&self, id: DestinationId) -> Result<bool> {
        self.settings.update(|s| {
            if s.admin_operator_id.is_some() {
                return (false, false);
            }
            s.admin_operator_id = Some(id);
            (true, true)
        })
    }

    pub fn set_forwarding_enabled(&self, enabled: bool) -> Result<()> {
        self.settings.update(|s| {
            let changed = s.forwarding_enabled != enabled;
            s.forwarding_enabled = enabled;
            ((), changed)
        })
    }

    /// Persist `message` as the last error, prefixed with the current time.
    pub fn record_error(&self, message: &str) -> Result<()> {
        let stamped = format!(
            "{}: {message}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        self.settings.update(|s| {
            s.last_error = Some(stamped);
            ((), true)
        })
    }

    // ── destination registry ────────────────────────────────────────────

    /// Add or relabel a destination.
    pub fn register_destination(&self, id: DestinationId, label: &str) -> Result<()> {
        self.registry.update(|r| {
            let changed = r.get(&id).map(String::as_str) != Some(label);
            r.insert(id, label.to_string());
            ((), changed)
        })
    }

    pub fn destination_label(&self, id: &DestinationId) -> Option<String> {
        self.registry.read(|r| r.get(id).cloned())
    }

    pub fn destinations(&self) -> Vec<(DestinationId, String)> {
        self.registry
            .read(|r| r.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    pub fn destination_count(&self) -> usize {
        self.registry.read(BTreeMap::len)
    }

    // ── processed-message history ───────────────────────────────────────

    pub fn is_processed(&self, destination: &DestinationId, fingerprint: &Fingerprint) -> bool {
        self.history
            .read(|h| h.get(destination).is_some_and(|log| log.contains(fingerprint)))
    }

    /// Idempotent insert. Returns `true` when the fingerprint was new.
    pub fn mark_processed(
        &self,
        destination: &DestinationId,
        fingerprint: Fingerprint,
    ) -> Result<bool> {
        let (cap, retain) = (self.history_cap, self.history_retain);
        self.history.update(|h| {
            let added = h
                .entry(destination.clone())
                .or_default()
                .insert(fingerprint, cap, retain);
            (added, added)
        })
    }

    pub fn history_len(&self, destination: &DestinationId) -> usize {
        self.history
            .read(|h| h.get(destination).map_or(0, FingerprintLog::len))
    }

    /// Fingerprints held across all destinations.
    pub fn total_processed(&self) -> usize {
        self.history.read(|h| h.values().map(FingerprintLog::len).sum())
    }
}
