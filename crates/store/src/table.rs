//! A single JSON document kept in memory and written through on every change.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use {
    serde::{Serialize, de::DeserializeOwned},
    tracing::{debug, warn},
};

use crate::error::{Result, StoreError};

/// One logical table. The mutex serialises writers and is held across the
/// flush, so a reader never sees a value that differs from the file.
pub(crate) struct JsonTable<T> {
    path: PathBuf,
    value: Mutex<T>,
}

impl<T> JsonTable<T>
where
    T: Serialize + DeserializeOwned + Default + Clone,
{
    /// Load the table, falling back to `T::default()` when the file is
    /// missing or cannot be parsed.
    pub(crate) fn load(path: PathBuf) -> Self {
        let value = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "corrupt state file, using defaults");
                T::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "state file not found, using defaults");
                T::default()
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable state file, using defaults");
                T::default()
            },
        };
        Self {
            path,
            value: Mutex::new(value),
        }
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.value.lock().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }

    /// Apply `f` to a copy, flush it, and only then swap it in. A failed
    /// write leaves the in-memory value untouched.
    /// `f` returns whether anything changed; unchanged tables are not written.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut T) -> (R, bool)) -> Result<R> {
        let mut guard = self.value.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = guard.clone();
        let (result, changed) = f(&mut next);
        if changed {
            write_atomic(&self.path, &next)?;
            *guard = next;
        }
        Ok(result)
    }
}

/// Write to a sibling temp file, then rename over the target.
fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| StoreError::write(parent, e))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json.as_bytes()).map_err(|e| StoreError::write(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| StoreError::write(path, e))?;
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, std::collections::BTreeMap};

    type Doc = BTreeMap<String, u32>;

    #[test]
    fn missing_file_loads_default() {
        let tmp = tempfile::tempdir().unwrap();
        let table: JsonTable<Doc> = JsonTable::load(tmp.path().join("absent.json"));
        assert!(table.read(|d| d.is_empty()));
    }

    #[test]
    fn corrupt_file_loads_default() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("doc.json");
        fs::write(&path, "{ not json").unwrap();
        let table: JsonTable<Doc> = JsonTable::load(path);
        assert!(table.read(|d| d.is_empty()));
    }

    #[test]
    fn update_writes_through() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("doc.json");
        let table: JsonTable<Doc> = JsonTable::load(path.clone());
        table
            .update(|d| (d.insert("a".into(), 1), true))
            .unwrap();

        let reloaded: JsonTable<Doc> = JsonTable::load(path.clone());
        assert_eq!(reloaded.read(|d| d.get("a").copied()), Some(1));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn failed_flush_keeps_previous_value() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let table: JsonTable<Doc> = JsonTable::load(blocker.join("doc.json"));

        let err = table.update(|d| (d.insert("a".into(), 1), true));
        assert!(matches!(err, Err(StoreError::Write { .. })), "{err:?}");
        assert!(table.read(|d| d.is_empty()));
    }

    #[test]
    fn unchanged_update_skips_the_write() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("doc.json");
        let table: JsonTable<Doc> = JsonTable::load(path.clone());
        table.update(|_| ((), false)).unwrap();
        assert!(!path.exists());
    }
}
