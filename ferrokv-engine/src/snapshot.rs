//! # Snapshotter
//!
//! Whole-store `SAVE`/`RESTORE`/`MERGE` to an opaque, self-describing
//! on-disk format. The format is JSON via `serde_json`; it only
//! needs to round-trip within this implementation, not be stable
//! across ports.
//!
//! The TTL index is intentionally not persisted: restored keys are
//! immortal until a command re-attaches a TTL.

use std::path::Path;

use serde::{Deserialize, Serialize};

use ferrokv_common::EngineResult;

use crate::store::Store;
use crate::value::TypedValue;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    entries: Vec<(Vec<u8>, TypedValue)>,
}

impl Store {
    /// Atomically writes the current key-space to `path`: the
    /// serialized snapshot is written to a sibling temp file first,
    /// then renamed into place, so a reader never observes a partial
    /// file.
    pub fn save(&self, path: &Path) -> EngineResult<()> {
        let snapshot = Snapshot {
            entries: self
                .data
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        };
        let bytes = serde_json::to_vec(&snapshot)?;
        let tmp_path = tmp_path_for(path);
        std::fs::write(&tmp_path, &bytes)?;
        std::fs::rename(&tmp_path, path)?;
        tracing::info!(path = %path.display(), keys = snapshot.entries.len(), "snapshot saved");
        Ok(())
    }

    /// Replaces the current store with the one restored from `path`.
    /// Returns `false` without touching the store if the file doesn't
    /// exist.
    pub fn restore(&mut self, path: &Path) -> EngineResult<bool> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "restore requested but snapshot file is missing");
            return Ok(false);
        }
        let snapshot = read_snapshot(path)?;
        let mut data = hashbrown::HashMap::with_hasher(ahash::RandomState::new());
        for (key, value) in snapshot.entries {
            data.insert(key, value);
        }
        let restored = data.len();
        self.data = data;
        self.ttl = crate::ttl::TtlIndex::new();
        tracing::info!(path = %path.display(), keys = restored, "snapshot restored");
        Ok(true)
    }

    /// Merges `path`'s key-space into the current one: keys already
    /// present in memory win on conflict. Returns `false` without
    /// touching the store if the file doesn't exist.
    pub fn merge(&mut self, path: &Path) -> EngineResult<bool> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "merge requested but snapshot file is missing");
            return Ok(false);
        }
        let snapshot = read_snapshot(path)?;
        for (key, value) in snapshot.entries {
            self.data.entry(key).or_insert(value);
        }
        tracing::info!(path = %path.display(), "snapshot merged");
        Ok(true)
    }
}

fn read_snapshot(path: &Path) -> EngineResult<Snapshot> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| std::ffi::OsString::from("snapshot"));
    name.push(".tmp");
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(name),
        _ => std::path::PathBuf::from(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Scalar;

    #[test]
    fn save_then_restore_round_trips_the_keyspace() {
        let dir = std::env::temp_dir().join(format!("ferrokv-test-{}-roundtrip", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("snapshot.json");

        let mut store = Store::new();
        store.set(b"a", b"hello".to_vec()).unwrap();
        store.sadd(b"s", &[b"x".to_vec()]).unwrap();
        store.save(&path).unwrap();

        let mut fresh = Store::new();
        fresh.set(b"unrelated", b"keep-me-gone".to_vec()).unwrap();
        assert!(fresh.restore(&path).unwrap());
        assert_eq!(fresh.get(b"a").unwrap(), Some(Scalar::Bytes(b"hello".to_vec())));
        assert_eq!(fresh.exists(b"unrelated").unwrap(), 0);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn merge_keeps_in_memory_keys_on_conflict() {
        let dir = std::env::temp_dir().join(format!("ferrokv-test-{}-merge", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("snapshot.json");

        let mut on_disk = Store::new();
        on_disk.set(b"a", b"from-disk".to_vec()).unwrap();
        on_disk.set(b"only-disk", b"disk-value".to_vec()).unwrap();
        on_disk.save(&path).unwrap();

        let mut live = Store::new();
        live.set(b"a", b"from-memory".to_vec()).unwrap();
        assert!(live.merge(&path).unwrap());
        assert_eq!(live.get(b"a").unwrap(), Some(Scalar::Bytes(b"from-memory".to_vec())));
        assert_eq!(live.get(b"only-disk").unwrap(), Some(Scalar::Bytes(b"disk-value".to_vec())));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn restore_of_missing_file_returns_false() {
        let mut store = Store::new();
        let missing = std::env::temp_dir().join("ferrokv-definitely-missing.json");
        assert!(!store.restore(&missing).unwrap());
    }
}
