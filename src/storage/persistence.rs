//! Export, import, save and load for [`VectorStore`].

use crate::error::{StoreError, StoreResult};
use crate::storage::snapshot::{SNAPSHOT_VERSION, Snapshot};
use crate::storage::write_json_atomic;
use crate::types::get_utc_timestamp;
use crate::vector::index::SecondaryIndex;
use crate::vector::store::{Stamp, StoreInner, StoreShared};
use crate::vector::{VectorDimension, VectorStore};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of [`VectorStore::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing changed since the last save
    Skipped,
    Saved { count: usize, path: PathBuf },
}

/// Result of [`VectorStore::load`].
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(ImportReport),
    /// No snapshot on disk yet; the store is left empty
    NotLoaded { reason: String },
}

/// Per-record accounting of an import.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: usize,
    pub failed: usize,
    /// Entries with metadata but no vector, or the other way round
    pub skipped: usize,
    /// `(store dimension, snapshot dimension)` when they differ
    pub dimension_mismatch: Option<(usize, usize)>,
    pub errors: Vec<(String, StoreError)>,
}

/// Location of a store's snapshot on disk.
#[derive(Debug, Clone)]
pub(crate) struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn write(&self, snapshot: &Snapshot) -> StoreResult<()> {
        write_json_atomic(&self.path, snapshot).map_err(|source| StoreError::Persistence {
            path: self.path.clone(),
            source,
        })
    }

    /// `Ok(None)` when no snapshot has been written yet.
    pub(crate) fn read(&self) -> StoreResult<Option<Snapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let json = std::fs::read_to_string(&self.path).map_err(|source| {
            StoreError::Persistence {
                path: self.path.clone(),
                source,
            }
        })?;
        let snapshot: Snapshot =
            serde_json::from_str(&json).map_err(|e| StoreError::CorruptSnapshot {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        if !snapshot.is_supported() {
            return Err(StoreError::CorruptSnapshot {
                path: self.path.clone(),
                reason: format!(
                    "unsupported snapshot version {} (this build reads {SNAPSHOT_VERSION})",
                    snapshot.version
                ),
            });
        }
        Ok(Some(snapshot))
    }
}

fn export_locked(inner: &StoreInner, dimension: VectorDimension, include_vectors: bool) -> Snapshot {
    let metadata: BTreeMap<_, _> = inner
        .metadata
        .iter()
        .map(|(id, m)| (id.clone(), m.clone()))
        .collect();
    let vectors = include_vectors.then(|| {
        inner
            .vectors
            .iter()
            .map(|(id, v)| (id.clone(), v.clone()))
            .collect()
    });

    Snapshot {
        version: SNAPSHOT_VERSION.to_string(),
        timestamp: get_utc_timestamp(),
        dimension: dimension.get(),
        count: inner.vectors.len(),
        metadata,
        vectors,
        category_index: inner.categories.to_lists(),
        keyword_index: inner.keywords.to_lists(),
    }
}

impl StoreShared {
    /// Write a snapshot if anything changed since the last one.
    ///
    /// State is copied under the read lock; I/O happens without holding it.
    /// The dirty flag is cleared only if no mutation landed meanwhile.
    pub(crate) fn save(&self) -> StoreResult<SaveOutcome> {
        let file = self.file.as_ref().ok_or(StoreError::PersistenceDisabled)?;
        let _guard = self.save_lock.lock();

        let (snapshot, generation) = {
            let inner = self.inner.read();
            if !inner.dirty {
                return Ok(SaveOutcome::Skipped);
            }
            (export_locked(&inner, self.dimension, true), inner.generation)
        };

        file.write(&snapshot)?;

        {
            let mut inner = self.inner.write();
            if inner.generation == generation {
                inner.dirty = false;
            }
            inner.last_saved = Some(snapshot.timestamp);
        }

        info!(
            "Saved {} vectors to {}",
            snapshot.count,
            file.path().display()
        );
        Ok(SaveOutcome::Saved {
            count: snapshot.count,
            path: file.path().to_path_buf(),
        })
    }

    /// Replace all records with the snapshot's.
    fn import_snapshot(&self, snapshot: Snapshot) -> StoreResult<ImportReport> {
        let Snapshot {
            dimension,
            metadata,
            vectors,
            category_index,
            keyword_index,
            ..
        } = snapshot;
        let mut vectors = vectors.ok_or(StoreError::IncompleteSnapshot)?;

        let mut report = ImportReport::default();
        if dimension != self.dimension.get() {
            warn!(
                "Snapshot dimension {dimension} differs from store dimension {}; mismatched vectors will be rejected",
                self.dimension.get()
            );
            report.dimension_mismatch = Some((self.dimension.get(), dimension));
        }

        let mut inner = self.inner.write();
        inner.clear();

        let mut imported = HashSet::new();
        for (id, record_metadata) in metadata {
            let Some(vector) = vectors.remove(&id) else {
                report.skipped += 1;
                continue;
            };
            match inner.insert(
                &id,
                vector,
                record_metadata,
                self.dimension,
                self.max_vectors,
                Stamp::Preserve,
            ) {
                Ok(()) => {
                    report.imported += 1;
                    imported.insert(id);
                }
                Err(e) => {
                    report.failed += 1;
                    report.errors.push((id, e));
                }
            }
        }
        // Vectors left over had no metadata
        report.skipped += vectors.len();

        // Snapshot lists restricted to live ids, plus whatever the imported
        // metadata itself implies
        let mut categories = SecondaryIndex::from_lists(&category_index, |id| imported.contains(id));
        let mut keywords = SecondaryIndex::from_lists(&keyword_index, |id| imported.contains(id));
        for id in &imported {
            if let Some(record_metadata) = inner.metadata.get(id) {
                if let Some(category) = &record_metadata.category {
                    categories.insert(category, id);
                }
                for keyword in &record_metadata.keywords {
                    keywords.insert(keyword, id);
                }
            }
        }
        inner.categories = categories;
        inner.keywords = keywords;
        inner.touch();

        if report.failed > 0 || report.skipped > 0 {
            warn!(
                "Import: {} records restored, {} failed, {} skipped",
                report.imported, report.failed, report.skipped
            );
        } else {
            debug!("Import: {} records restored", report.imported);
        }
        Ok(report)
    }
}

impl VectorStore {
    /// Copy of the store's records and indexes.
    pub fn export(&self, include_vectors: bool) -> Snapshot {
        let inner = self.shared.inner.read();
        export_locked(&inner, self.shared.dimension, include_vectors)
    }

    /// Replace the store's contents with `snapshot`.
    ///
    /// Individual records that fail validation are counted in the report;
    /// a snapshot without vectors is rejected before anything is cleared.
    pub fn import(&self, snapshot: Snapshot) -> StoreResult<ImportReport> {
        let report = self.shared.import_snapshot(snapshot)?;
        self.schedule_save();
        Ok(report)
    }

    /// Persist now if there are unsaved changes.
    pub fn save(&self) -> StoreResult<SaveOutcome> {
        self.shared.save()
    }

    /// Restore the snapshot at the configured path.
    ///
    /// A missing file is the normal first-run state and yields
    /// [`LoadOutcome::NotLoaded`]. After a load the store is clean.
    pub fn load(&self) -> StoreResult<LoadOutcome> {
        let file = self
            .shared
            .file
            .as_ref()
            .ok_or(StoreError::PersistenceDisabled)?;

        let Some(snapshot) = file.read()? else {
            return Ok(LoadOutcome::NotLoaded {
                reason: format!("no snapshot at {}", file.path().display()),
            });
        };

        let saved_at = snapshot.timestamp;
        let report = self.shared.import_snapshot(snapshot)?;
        {
            let mut inner = self.shared.inner.write();
            inner.dirty = false;
            inner.last_saved = Some(saved_at);
        }

        info!(
            "Loaded {} vectors from {}",
            report.imported,
            file.path().display()
        );
        Ok(LoadOutcome::Loaded(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::types::RecordMetadata;
    use crate::vector::SearchOptions;
    use tempfile::TempDir;

    fn meta(category: &str, keywords: &[&str]) -> RecordMetadata {
        RecordMetadata::default()
            .with_category(category)
            .with_keywords(keywords.iter().copied())
    }

    fn populated(config: StoreConfig) -> VectorStore {
        let store = VectorStore::new(config).unwrap();
        store
            .add("a", vec![1.0, 0.2, 0.0], meta("billing", &["invoice"]))
            .unwrap();
        store
            .add("b", vec![0.1, 1.0, 0.3], meta("account", &["password"]))
            .unwrap();
        store
            .add("c", vec![0.7, 0.7, 0.1], meta("billing", &["refund", "invoice"]))
            .unwrap();
        store
    }

    #[test]
    fn test_export_import_round_trip() {
        let source = populated(StoreConfig::in_memory(3));
        let snapshot = source.export(true);
        assert_eq!(snapshot.count, 3);
        assert_eq!(snapshot.category_index["billing"], vec!["a", "c"]);

        let target = VectorStore::new(StoreConfig::in_memory(3)).unwrap();
        let report = target.import(snapshot).unwrap();
        assert_eq!(report.imported, 3);
        assert_eq!(report.failed, 0);
        assert!(report.dimension_mismatch.is_none());

        let query = [0.9, 0.4, 0.0];
        let options = SearchOptions::new(3);
        let expected = source.search(&query, &options).unwrap();
        let actual = target.search(&query, &options).unwrap();
        assert_eq!(actual, expected);

        // Timestamps survive the trip
        assert_eq!(
            target.get("a").unwrap().metadata.created_at,
            source.get("a").unwrap().metadata.created_at
        );
    }

    #[test]
    fn test_import_filters_indexes_and_counts_failures() {
        let source = populated(StoreConfig::in_memory(3));
        let mut snapshot = source.export(true);
        let vectors = snapshot.vectors.as_mut().unwrap();
        vectors.insert("b".to_string(), vec![1.0, 0.0]);
        vectors.insert("stray".to_string(), vec![1.0, 0.0, 0.0]);
        snapshot
            .category_index
            .entry("billing".to_string())
            .or_default()
            .push("ghost".to_string());

        let target = VectorStore::new(StoreConfig::in_memory(3)).unwrap();
        let report = target.import(snapshot).unwrap();
        assert_eq!(report.imported, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.errors[0].0, "b");

        let inner = target.shared.inner.read();
        assert!(!inner.categories.references("ghost"));
        assert!(!inner.categories.references("b"));
        assert!(inner.keywords.get("password").is_none());
    }

    #[test]
    fn test_import_dimension_mismatch_is_reported() {
        let source = populated(StoreConfig::in_memory(3));
        let target = VectorStore::new(StoreConfig::in_memory(4)).unwrap();

        let report = target.import(source.export(true)).unwrap();
        assert_eq!(report.dimension_mismatch, Some((4, 3)));
        assert_eq!(report.imported, 0);
        assert_eq!(report.failed, 3);
        assert!(target.is_empty());
    }

    #[test]
    fn test_metadata_only_snapshot_rejected() {
        let source = populated(StoreConfig::in_memory(3));
        let target = populated(StoreConfig::in_memory(3));

        let snapshot = source.export(false);
        assert!(snapshot.vectors.is_none());
        assert!(matches!(
            target.import(snapshot),
            Err(StoreError::IncompleteSnapshot)
        ));
        assert_eq!(target.len(), 3);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");

        let store = populated(StoreConfig::persistent(3, &path));
        assert!(store.stats().dirty);

        match store.save().unwrap() {
            SaveOutcome::Saved { count, path: saved } => {
                assert_eq!(count, 3);
                assert_eq!(saved, path);
            }
            SaveOutcome::Skipped => panic!("expected a save"),
        }
        assert!(!store.stats().dirty);
        assert!(store.stats().last_saved.is_some());
        assert_eq!(store.save().unwrap(), SaveOutcome::Skipped);

        let reopened = VectorStore::new(StoreConfig::persistent(3, &path)).unwrap();
        match reopened.load().unwrap() {
            LoadOutcome::Loaded(report) => assert_eq!(report.imported, 3),
            LoadOutcome::NotLoaded { reason } => panic!("not loaded: {reason}"),
        }
        assert!(!reopened.stats().dirty);
        assert_eq!(reopened.get("c"), store.get("c"));
        assert_eq!(reopened.categories(), store.categories());
    }

    #[test]
    fn test_load_missing_and_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");

        let store = VectorStore::new(StoreConfig::persistent(3, &path)).unwrap();
        assert!(matches!(
            store.load().unwrap(),
            LoadOutcome::NotLoaded { .. }
        ));

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            store.load(),
            Err(StoreError::CorruptSnapshot { .. })
        ));

        let in_memory = VectorStore::new(StoreConfig::in_memory(3)).unwrap();
        assert!(matches!(
            in_memory.save(),
            Err(StoreError::PersistenceDisabled)
        ));
    }

    #[test]
    fn test_save_failure_surfaces_io_error() {
        let temp_dir = TempDir::new().unwrap();
        // A regular file where the parent directory should be
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();

        let store = populated(StoreConfig::persistent(3, blocker.join("store.json")));
        assert!(matches!(
            store.save(),
            Err(StoreError::Persistence { .. })
        ));
        assert!(store.stats().dirty);
    }
}
