//! In-memory vector store with category and keyword indexes.
//!
//! All operations take `&self`. Record state lives behind one
//! `parking_lot::RwLock`: mutations hold the write lock for the whole call,
//! lookups and searches share the read lock. Persistence (`save`, `load`,
//! `export`, `import`) is implemented in [`crate::storage`].

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::storage::{AutoSaver, SaveOutcome, SnapshotFile};
use crate::types::{RecordMetadata, VectorRecord, get_utc_timestamp};
use crate::vector::clustering::{ClusterOptions, kmeans_clustering};
use crate::vector::index::SecondaryIndex;
use crate::vector::metric::{DistanceMetric, magnitude, normalize_in_place};
use crate::vector::types::VectorDimension;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Predicate applied to candidate metadata during search.
pub type MetadataFilter = Arc<dyn Fn(&RecordMetadata) -> bool + Send + Sync>;

/// Query parameters for [`VectorStore::search`].
#[derive(Clone)]
pub struct SearchOptions {
    /// Maximum number of hits
    pub k: usize,
    /// Hits scoring below this are dropped
    pub threshold: f32,
    pub metric: DistanceMetric,
    /// Restrict candidates to one category
    pub category: Option<String>,
    pub filter: Option<MetadataFilter>,
}

impl SearchOptions {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            ..Self::default()
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&RecordMetadata) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            k: 5,
            threshold: 0.0,
            metric: DistanceMetric::Cosine,
            category: None,
            filter: None,
        }
    }
}

impl fmt::Debug for SearchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchOptions")
            .field("k", &self.k)
            .field("threshold", &self.threshold)
            .field("metric", &self.metric)
            .field("category", &self.category)
            .field("filter", &self.filter.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// One search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub metadata: RecordMetadata,
}

/// Outcome of [`VectorStore::add_batch`]. Failures do not stop the batch.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub successful: usize,
    pub failed: usize,
    /// Ids added, in input order
    pub results: Vec<String>,
    /// `(input position, error)` for each rejected item
    pub errors: Vec<(usize, StoreError)>,
}

/// A k-means cluster over stored records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    pub centroid: Vec<f32>,
    pub members: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    pub count: usize,
    pub dimension: usize,
    pub max_vectors: usize,
    /// Approximate heap usage of vectors, ids and metadata
    pub memory_bytes: usize,
    pub dirty: bool,
    pub average_magnitude: f32,
    pub categories: usize,
    pub keywords: usize,
    /// Milliseconds since epoch of the last successful save
    pub last_saved: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OptimizeReport {
    pub before: usize,
    pub after: usize,
    pub removed_orphans: usize,
}

/// How [`StoreInner::insert`] treats record timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stamp {
    /// Stamp `updated_at` now; keep an existing `created_at`
    Touch,
    /// Keep whatever the metadata carries (snapshot restore)
    Preserve,
}

/// Records plus the bookkeeping persistence needs.
#[derive(Debug, Default)]
pub(crate) struct StoreInner {
    pub(crate) vectors: HashMap<String, Vec<f32>>,
    pub(crate) metadata: HashMap<String, RecordMetadata>,
    pub(crate) categories: SecondaryIndex,
    pub(crate) keywords: SecondaryIndex,
    pub(crate) dirty: bool,
    /// Bumped on every mutation
    pub(crate) generation: u64,
    pub(crate) last_saved: Option<u64>,
}

impl StoreInner {
    pub(crate) fn touch(&mut self) {
        self.dirty = true;
        self.generation += 1;
    }

    fn contains(&self, id: &str) -> bool {
        self.vectors.contains_key(id) || self.metadata.contains_key(id)
    }

    fn index(&mut self, id: &str, metadata: &RecordMetadata) {
        if let Some(category) = &metadata.category {
            self.categories.insert(category, id);
        }
        for keyword in &metadata.keywords {
            self.keywords.insert(keyword, id);
        }
    }

    fn unindex(&mut self, id: &str, metadata: &RecordMetadata) {
        if let Some(category) = &metadata.category {
            self.categories.remove(category, id);
        }
        for keyword in &metadata.keywords {
            self.keywords.remove(keyword, id);
        }
    }

    /// Validate, normalize and store one record, replacing any previous one.
    pub(crate) fn insert(
        &mut self,
        id: &str,
        mut vector: Vec<f32>,
        mut metadata: RecordMetadata,
        dimension: VectorDimension,
        max_vectors: usize,
        stamp: Stamp,
    ) -> StoreResult<()> {
        if id.is_empty() {
            return Err(StoreError::InvalidId);
        }
        dimension.validate_vector(&vector)?;
        if !self.contains(id) && self.vectors.len() >= max_vectors {
            return Err(StoreError::CapacityExceeded { max: max_vectors });
        }

        normalize_in_place(&mut vector);

        let previous = self.metadata.remove(id);
        if stamp == Stamp::Touch {
            let now = get_utc_timestamp();
            metadata.created_at = previous
                .as_ref()
                .and_then(|m| m.created_at)
                .or(metadata.created_at)
                .or(Some(now));
            metadata.updated_at = Some(now);
        }

        if let Some(previous) = &previous {
            self.unindex(id, previous);
        }
        self.index(id, &metadata);
        self.vectors.insert(id.to_string(), vector);
        self.metadata.insert(id.to_string(), metadata);
        self.touch();
        Ok(())
    }

    fn remove(&mut self, id: &str) -> bool {
        let had_vector = self.vectors.remove(id).is_some();
        let metadata = self.metadata.remove(id);
        if let Some(metadata) = &metadata {
            self.unindex(id, metadata);
        }
        let removed = had_vector || metadata.is_some();
        if removed {
            self.touch();
        }
        removed
    }

    fn record(&self, id: &str) -> Option<VectorRecord> {
        let vector = self.vectors.get(id)?;
        let metadata = self.metadata.get(id)?;
        Some(VectorRecord {
            id: id.to_string(),
            vector: vector.clone(),
            metadata: metadata.clone(),
        })
    }

    fn records_for(&self, ids: Option<&BTreeSet<String>>) -> Vec<VectorRecord> {
        ids.map(|ids| ids.iter().filter_map(|id| self.record(id)).collect())
            .unwrap_or_default()
    }

    /// Rebuild both indexes from metadata alone.
    fn rebuild_indexes(&mut self) {
        let mut categories = SecondaryIndex::new();
        let mut keywords = SecondaryIndex::new();
        for (id, metadata) in &self.metadata {
            if let Some(category) = &metadata.category {
                categories.insert(category, id);
            }
            for keyword in &metadata.keywords {
                keywords.insert(keyword, id);
            }
        }
        self.categories = categories;
        self.keywords = keywords;
    }

    pub(crate) fn clear(&mut self) {
        self.vectors.clear();
        self.metadata.clear();
        self.categories.clear();
        self.keywords.clear();
    }
}

/// State shared between a [`VectorStore`] and its autosave worker.
#[derive(Debug)]
pub(crate) struct StoreShared {
    pub(crate) inner: RwLock<StoreInner>,
    pub(crate) dimension: VectorDimension,
    pub(crate) max_vectors: usize,
    pub(crate) file: Option<SnapshotFile>,
    /// Serializes saves so snapshots hit the disk in generation order
    pub(crate) save_lock: Mutex<()>,
}

/// Thread-safe vector store.
///
/// Share it with `Arc<VectorStore>`. Dropping the last handle stops the
/// autosave worker and flushes pending changes.
#[derive(Debug)]
pub struct VectorStore {
    config: StoreConfig,
    pub(crate) shared: Arc<StoreShared>,
    autosave: Mutex<Option<AutoSaver>>,
}

impl VectorStore {
    /// Create an empty store. Invalid configuration is rejected here.
    ///
    /// Nothing is read from disk; call [`VectorStore::load`] to restore a
    /// previous snapshot.
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let dimension = VectorDimension::new(config.dimension)?;

        let shared = Arc::new(StoreShared {
            inner: RwLock::new(StoreInner::default()),
            dimension,
            max_vectors: config.max_vectors,
            file: config.persistence_path.clone().map(SnapshotFile::new),
            save_lock: Mutex::new(()),
        });

        let autosave = if config.auto_save {
            let saver = AutoSaver::spawn(Arc::clone(&shared), config.save_delay()).map_err(
                |source| StoreError::Persistence {
                    path: config.persistence_path.clone().unwrap_or_default(),
                    source,
                },
            )?;
            Some(saver)
        } else {
            None
        };

        debug!(
            "Created vector store: dimension={}, max_vectors={}, auto_save={}",
            config.dimension, config.max_vectors, config.auto_save
        );

        Ok(Self {
            config,
            shared,
            autosave: Mutex::new(autosave),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn dimension(&self) -> VectorDimension {
        self.shared.dimension
    }

    /// Tell the autosave worker (if any) that state changed.
    pub(crate) fn schedule_save(&self) {
        if let Some(saver) = self.autosave.lock().as_ref() {
            saver.notify();
        }
    }

    /// Insert or replace a record. The vector is stored unit-normalized.
    pub fn add(
        &self,
        id: impl Into<String>,
        vector: Vec<f32>,
        metadata: RecordMetadata,
    ) -> StoreResult<String> {
        let id = id.into();
        self.shared.inner.write().insert(
            &id,
            vector,
            metadata,
            self.shared.dimension,
            self.shared.max_vectors,
            Stamp::Touch,
        )?;
        self.schedule_save();
        Ok(id)
    }

    /// Add many records under one write lock; each item succeeds or fails alone.
    pub fn add_batch<I>(&self, items: I) -> BatchResult
    where
        I: IntoIterator<Item = (String, Vec<f32>, RecordMetadata)>,
    {
        let mut result = BatchResult::default();
        {
            let mut inner = self.shared.inner.write();
            for (position, (id, vector, metadata)) in items.into_iter().enumerate() {
                match inner.insert(
                    &id,
                    vector,
                    metadata,
                    self.shared.dimension,
                    self.shared.max_vectors,
                    Stamp::Touch,
                ) {
                    Ok(()) => {
                        result.successful += 1;
                        result.results.push(id);
                    }
                    Err(e) => {
                        result.failed += 1;
                        result.errors.push((position, e));
                    }
                }
            }
        }

        if result.failed > 0 {
            warn!(
                "Batch insert: {} added, {} rejected",
                result.successful, result.failed
            );
        }
        if result.successful > 0 {
            self.schedule_save();
        }
        result
    }

    pub fn get(&self, id: &str) -> Option<VectorRecord> {
        self.shared.inner.read().record(id)
    }

    /// Replace the vector, the metadata, or both of an existing record.
    pub fn update(
        &self,
        id: &str,
        vector: Option<Vec<f32>>,
        metadata: Option<RecordMetadata>,
    ) -> StoreResult<()> {
        let vector = match vector {
            Some(mut vector) => {
                self.shared.dimension.validate_vector(&vector)?;
                normalize_in_place(&mut vector);
                Some(vector)
            }
            None => None,
        };

        {
            let mut inner = self.shared.inner.write();
            if !inner.vectors.contains_key(id) {
                return Err(StoreError::not_found(id));
            }

            let now = get_utc_timestamp();
            let previous = inner.metadata.remove(id).unwrap_or_default();
            let mut next = match metadata {
                Some(mut next) => {
                    next.created_at = previous.created_at.or(next.created_at);
                    next
                }
                None => previous.clone(),
            };
            next.updated_at = Some(now);

            inner.unindex(id, &previous);
            inner.index(id, &next);
            inner.metadata.insert(id.to_string(), next);
            if let Some(vector) = vector {
                inner.vectors.insert(id.to_string(), vector);
            }
            inner.touch();
        }

        self.schedule_save();
        Ok(())
    }

    /// Remove a record. Returns whether anything was removed.
    pub fn delete(&self, id: &str) -> bool {
        let removed = self.shared.inner.write().remove(id);
        if removed {
            self.schedule_save();
        }
        removed
    }

    /// Rank stored records against `query`.
    ///
    /// The query is validated and unit-normalized like stored vectors.
    /// Results are sorted by score descending, ties by id ascending.
    pub fn search(&self, query: &[f32], options: &SearchOptions) -> StoreResult<Vec<SearchHit>> {
        self.shared.dimension.validate_vector(query)?;
        let mut query = query.to_vec();
        normalize_in_place(&mut query);

        let inner = self.shared.inner.read();
        Ok(Self::rank(&inner, &query, options, None))
    }

    /// Nearest neighbours of a stored record, excluding the record itself.
    pub fn find_similar(&self, id: &str, options: &SearchOptions) -> StoreResult<Vec<SearchHit>> {
        let inner = self.shared.inner.read();
        let query = inner
            .vectors
            .get(id)
            .ok_or_else(|| StoreError::not_found(id))?;
        Ok(Self::rank(&inner, query, options, Some(id)))
    }

    fn rank(
        inner: &StoreInner,
        query: &[f32],
        options: &SearchOptions,
        exclude: Option<&str>,
    ) -> Vec<SearchHit> {
        if options.k == 0 {
            return Vec::new();
        }

        let candidates: Vec<&String> = match &options.category {
            Some(category) => match inner.categories.get(category) {
                Some(ids) => ids.iter().collect(),
                None => return Vec::new(),
            },
            None => inner.vectors.keys().collect(),
        };

        let mut hits: Vec<SearchHit> = candidates
            .into_par_iter()
            .filter(|id| exclude != Some(id.as_str()))
            .filter_map(|id| {
                let vector = inner.vectors.get(id)?;
                // Records without metadata are orphans awaiting optimize()
                let metadata = inner.metadata.get(id)?;
                if let Some(filter) = &options.filter {
                    if !filter(metadata) {
                        return None;
                    }
                }
                let score = options.metric.similarity(query, vector);
                (score >= options.threshold).then(|| SearchHit {
                    id: id.clone(),
                    score,
                    metadata: metadata.clone(),
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(options.k);
        hits
    }

    /// Partition stored records with k-means.
    ///
    /// `num_clusters` is clamped to the record count; an empty store yields
    /// no clusters.
    pub fn cluster(&self, options: ClusterOptions) -> StoreResult<Vec<Cluster>> {
        let (ids, vectors): (Vec<String>, Vec<Vec<f32>>) = {
            let inner = self.shared.inner.read();
            let mut entries: Vec<(&String, &Vec<f32>)> = inner.vectors.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            entries
                .into_iter()
                .map(|(id, vector)| (id.clone(), vector.clone()))
                .unzip()
        };

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let options = ClusterOptions {
            num_clusters: options.num_clusters.min(ids.len()),
            ..options
        };
        let result = kmeans_clustering(&vectors, &options)?;

        let mut clusters: Vec<Cluster> = result
            .centroids
            .into_iter()
            .map(|centroid| Cluster {
                centroid,
                members: BTreeSet::new(),
            })
            .collect();
        for (id, cluster) in ids.into_iter().zip(result.assignments) {
            clusters[cluster].members.insert(id);
        }

        debug!(
            "Clustered {} records into {} groups in {} iterations",
            vectors.len(),
            clusters.len(),
            result.iterations
        );
        Ok(clusters)
    }

    pub fn exists(&self, id: &str) -> bool {
        self.shared.inner.read().vectors.contains_key(id)
    }

    /// Records in `category`, ordered by id.
    pub fn get_by_category(&self, category: &str) -> Vec<VectorRecord> {
        let inner = self.shared.inner.read();
        inner.records_for(inner.categories.get(category))
    }

    /// Records tagged with `keyword`, ordered by id.
    pub fn get_by_keyword(&self, keyword: &str) -> Vec<VectorRecord> {
        let inner = self.shared.inner.read();
        inner.records_for(inner.keywords.get(keyword))
    }

    pub fn categories(&self) -> Vec<String> {
        self.shared.inner.read().categories.keys().cloned().collect()
    }

    pub fn keywords(&self) -> Vec<String> {
        self.shared.inner.read().keywords.keys().cloned().collect()
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.shared.inner.read();
        let count = inner.vectors.len();

        let vector_bytes: usize = inner
            .vectors
            .iter()
            .map(|(id, v)| id.len() + v.len() * std::mem::size_of::<f32>())
            .sum();
        let metadata_bytes: usize = inner
            .metadata
            .iter()
            .map(|(id, m)| id.len() + m.estimated_bytes())
            .sum();

        let average_magnitude = if count == 0 {
            0.0
        } else {
            inner.vectors.values().map(|v| magnitude(v)).sum::<f32>() / count as f32
        };

        StoreStats {
            count,
            dimension: self.shared.dimension.get(),
            max_vectors: self.shared.max_vectors,
            memory_bytes: vector_bytes + metadata_bytes,
            dirty: inner.dirty,
            average_magnitude,
            categories: inner.categories.len(),
            keywords: inner.keywords.len(),
            last_saved: inner.last_saved,
        }
    }

    pub fn len(&self) -> usize {
        self.shared.inner.read().vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.inner.read().vectors.is_empty()
    }

    /// All record ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.shared.inner.read().vectors.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Drop orphaned or malformed records and rebuild both indexes.
    pub fn optimize(&self) -> OptimizeReport {
        let (report, changed) = {
            let mut inner = self.shared.inner.write();
            let before = inner.vectors.len();
            let dimension = self.shared.dimension.get();

            let mut doomed: BTreeSet<String> = inner
                .vectors
                .iter()
                .filter(|(id, v)| v.len() != dimension || !inner.metadata.contains_key(*id))
                .map(|(id, _)| id.clone())
                .collect();
            doomed.extend(
                inner
                    .metadata
                    .keys()
                    .filter(|id| !inner.vectors.contains_key(*id))
                    .cloned(),
            );

            for id in &doomed {
                inner.vectors.remove(id);
                inner.metadata.remove(id);
            }

            let (categories, keywords) = (inner.categories.clone(), inner.keywords.clone());
            inner.rebuild_indexes();
            let changed = !doomed.is_empty()
                || inner.categories != categories
                || inner.keywords != keywords;
            if changed {
                inner.touch();
            }

            (
                OptimizeReport {
                    before,
                    after: inner.vectors.len(),
                    removed_orphans: doomed.len(),
                },
                changed,
            )
        };

        if report.removed_orphans > 0 {
            warn!("Optimize removed {} orphaned records", report.removed_orphans);
        }
        if changed {
            self.schedule_save();
        }
        report
    }

    /// Remove every record and index entry.
    pub fn clear(&self) {
        {
            let mut inner = self.shared.inner.write();
            inner.clear();
            inner.touch();
        }
        self.schedule_save();
    }

    /// Stop the autosave worker and flush the save it had pending.
    ///
    /// Safe to call more than once. Without autosave nothing is written
    /// here; persisting is left to explicit [`VectorStore::save`] calls.
    pub fn close(&self) -> StoreResult<SaveOutcome> {
        let saver = self.autosave.lock().take();
        match saver {
            Some(saver) => {
                saver.shutdown();
                self.shared.save()
            }
            None => Ok(SaveOutcome::Skipped),
        }
    }
}

impl Drop for VectorStore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to flush vector store on shutdown: {e}");
        }
    }
}
