use std::{collections::BTreeMap, collections::HashMap, path::Path};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    entity::{EntityKind, Record},
    error::{Error, Result},
    index_store::IndexStore,
};

/// How many candidates `search` pulls from the whole index per requested
/// result before applying the kind filter.
pub const SEARCH_OVERFETCH: usize = 2;

/// One entity to insert: identity, raw vector and metadata record.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub id: String,
    pub kind: EntityKind,
    pub vector: Vec<f32>,
    pub record: Record,
}

/// Per-position metadata, persisted alongside the vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct EntryMeta {
    pub id: String,
    pub kind: EntityKind,
    pub record: Record,
}

/// A stored entity borrowed from the index.
#[derive(Debug, Clone, Copy)]
pub struct EntryRef<'a> {
    pub position: usize,
    pub id: &'a str,
    pub kind: EntityKind,
    /// Unit-norm stored vector.
    pub vector: &'a [f32],
    pub record: &'a Record,
}

/// A similarity search result.
#[derive(Debug, Clone, Copy)]
pub struct SearchHit<'a> {
    pub position: usize,
    pub id: &'a str,
    pub kind: EntityKind,
    /// Cosine similarity in [-1, 1].
    pub similarity: f32,
    pub record: &'a Record,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub total_vectors: usize,
    pub dimension: usize,
    pub kind_counts: BTreeMap<EntityKind, usize>,
}

/// Exact (brute-force) inner-product index over unit vectors.
///
/// Vectors are stored row-major in one flat buffer: the vector at position
/// `p` is `vectors[p * dimension..(p + 1) * dimension]`.
///
/// Building needs `&mut self`; searching only `&self`, so a built index can
/// be shared across threads for concurrent queries.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    vectors: Vec<f32>,
    entries: Vec<EntryMeta>,
    positions: HashMap<(EntityKind, String), usize>,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
            entries: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Reassemble an index from persisted parts, checking that every part
    /// agrees with the others.
    pub(crate) fn from_parts(
        dimension: usize,
        vectors: Vec<f32>,
        entries: Vec<EntryMeta>,
        positions: HashMap<(EntityKind, String), usize>,
    ) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::CorruptIndex("dimension is zero".into()));
        }
        if vectors.len() != entries.len() * dimension {
            return Err(Error::CorruptIndex(format!(
                "{} vector values for {} entries of dimension {dimension}",
                vectors.len(),
                entries.len()
            )));
        }
        for ((kind, id), &position) in &positions {
            let matches = entries
                .get(position)
                .is_some_and(|meta| meta.kind == *kind && meta.id == *id);
            if !matches {
                return Err(Error::CorruptIndex(format!(
                    "position map entry {kind}:{id} -> {position} does not \
                     match stored metadata"
                )));
            }
        }

        Ok(Self {
            dimension,
            vectors,
            entries,
            positions,
        })
    }

    pub(crate) fn raw_vectors(&self) -> &[f32] {
        &self.vectors
    }

    pub(crate) fn raw_entries(&self) -> &[EntryMeta] {
        &self.entries
    }

    pub(crate) fn raw_positions(
        &self,
    ) -> &HashMap<(EntityKind, String), usize> {
        &self.positions
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors, duplicates included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// An index is built once it holds at least one vector.
    pub fn is_built(&self) -> bool {
        !self.is_empty()
    }

    /// Normalize and append a batch of entries.
    ///
    /// The whole batch is validated before anything is written: a vector of
    /// the wrong length fails with [`Error::DimensionMismatch`] and a
    /// zero-norm or non-finite vector with [`Error::DegenerateVector`], and
    /// in both cases the index is left untouched.
    ///
    /// Ids are insert-only. Adding an existing id appends a new position
    /// and the id lookup moves to it; the old position stays searchable.
    pub fn add(&mut self, entries: Vec<IndexEntry>) -> Result<usize> {
        for entry in &entries {
            if entry.vector.len() != self.dimension {
                return Err(Error::DimensionMismatch {
                    expected: self.dimension,
                    actual: entry.vector.len(),
                });
            }
            let norm = l2_norm(&entry.vector);
            if norm == 0.0 || !norm.is_finite() {
                return Err(Error::DegenerateVector {
                    id: entry.id.clone(),
                });
            }
        }

        let added = entries.len();
        self.vectors.reserve(added * self.dimension);
        self.entries.reserve(added);

        for IndexEntry {
            id,
            kind,
            mut vector,
            record,
        } in entries
        {
            l2_normalize(&mut vector);
            let position = self.entries.len();
            self.vectors.extend_from_slice(&vector);
            self.positions.insert((kind, id.clone()), position);
            self.entries.push(EntryMeta { id, kind, record });
        }

        Ok(added)
    }

    /// Look up the latest stored entry for `id` within `kind`.
    pub fn get(&self, kind: EntityKind, id: &str) -> Option<EntryRef<'_>> {
        let position = *self.positions.get(&(kind, id.to_string()))?;
        Some(self.entry_at(position))
    }

    /// Every live entity of `kind`, in insertion order. Superseded
    /// duplicate positions are skipped.
    pub fn entities(
        &self,
        kind: EntityKind,
    ) -> impl Iterator<Item = EntryRef<'_>> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(move |(position, meta)| {
                meta.kind == kind
                    && self.positions.get(&(meta.kind, meta.id.clone()))
                        == Some(position)
            })
            .map(|(position, _)| self.entry_at(position))
    }

    fn entry_at(&self, position: usize) -> EntryRef<'_> {
        let meta = &self.entries[position];
        EntryRef {
            position,
            id: &meta.id,
            kind: meta.kind,
            vector: self.vector_at(position),
            record: &meta.record,
        }
    }

    fn vector_at(&self, position: usize) -> &[f32] {
        let start = position * self.dimension;
        &self.vectors[start..start + self.dimension]
    }

    /// Exact top-`k` search by cosine similarity.
    ///
    /// 1. Normalize the query
    /// 2. Score every stored vector (inner product of unit vectors)
    /// 3. Keep the best `k * SEARCH_OVERFETCH` positions
    /// 4. Drop positions whose kind is not in `kinds` (when given)
    /// 5. Return at most `k`, similarity descending, ties by position
    ///
    /// When the kind filter removes too much the result is shorter than `k`.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        kinds: Option<&[EntityKind]>,
    ) -> Result<Vec<SearchHit<'_>>> {
        if !self.is_built() {
            return Err(Error::IndexNotBuilt);
        }
        if query.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut query = query.to_vec();
        l2_normalize(&mut query);

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .par_chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, stored)| {
                (position, dot(&query, stored).clamp(-1.0, 1.0))
            })
            .collect();

        // Stable sort keeps insertion order among equal similarities.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k.saturating_mul(SEARCH_OVERFETCH));

        Ok(scored
            .into_iter()
            .filter(|(position, _)| {
                kinds.is_none_or(|kinds| {
                    kinds.contains(&self.entries[*position].kind)
                })
            })
            .take(k)
            .map(|(position, similarity)| {
                let meta = &self.entries[position];
                SearchHit {
                    position,
                    id: &meta.id,
                    kind: meta.kind,
                    similarity,
                    record: &meta.record,
                }
            })
            .collect())
    }

    pub fn stats(&self) -> IndexStats {
        let mut kind_counts = BTreeMap::new();
        for meta in &self.entries {
            *kind_counts.entry(meta.kind).or_insert(0) += 1;
        }
        IndexStats {
            total_vectors: self.len(),
            dimension: self.dimension,
            kind_counts,
        }
    }

    /// Write the index to `path`, replacing any previous file there.
    pub fn persist(&self, path: &Path) -> Result<()> {
        if !self.is_built() {
            return Err(Error::IndexNotBuilt);
        }
        IndexStore::replace(path, self)?;
        tracing::info!(
            path = %path.display(),
            vectors = self.len(),
            dimension = self.dimension,
            "persisted vector index"
        );
        Ok(())
    }

    /// Load an index previously written by [`VectorIndex::persist`].
    pub fn load(path: &Path) -> Result<Self> {
        let index = IndexStore::open(path)?.read_index()?;
        tracing::info!(
            path = %path.display(),
            vectors = index.len(),
            dimension = index.dimension,
            "loaded vector index"
        );
        Ok(index)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale `v` to unit L2 norm in place. Zero vectors are left as they are.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn entry(id: &str, kind: EntityKind, vector: &[f32]) -> IndexEntry {
        IndexEntry {
            id: id.to_string(),
            kind,
            vector: vector.to_vec(),
            record: Record::default(),
        }
    }

    fn sample_index() -> VectorIndex {
        let mut index = VectorIndex::new(3);
        index
            .add(vec![
                entry("alice", EntityKind::Individual, &[1.0, 0.0, 0.0]),
                entry("acme", EntityKind::Organization, &[0.0, 2.0, 0.0]),
                entry("p1", EntityKind::ProjectCall, &[3.0, 1.0, 0.0]),
                entry("p2", EntityKind::ProjectCall, &[0.0, 0.0, 5.0]),
                entry("p3", EntityKind::ProjectCall, &[1.0, 1.0, 1.0]),
            ])
            .unwrap();
        index
    }

    #[test]
    fn stored_vectors_are_unit_norm() {
        let index = sample_index();
        for kind in EntityKind::ALL {
            for e in index.entities(kind) {
                assert!((l2_norm(e.vector) - 1.0).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn search_before_add_is_not_built() {
        let index = VectorIndex::new(3);
        assert!(matches!(
            index.search(&[1.0, 0.0, 0.0], 5, None),
            Err(Error::IndexNotBuilt)
        ));
    }

    #[test]
    fn wrong_dimension_rejects_whole_batch() {
        let mut index = sample_index();
        let err = index
            .add(vec![
                entry("ok", EntityKind::Individual, &[1.0, 1.0, 0.0]),
                entry("bad", EntityKind::Individual, &[1.0, 1.0]),
            ])
            .unwrap_err();

        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(index.len(), 5);
        assert!(index.get(EntityKind::Individual, "ok").is_none());
    }

    #[test]
    fn zero_vector_is_rejected() {
        let mut index = VectorIndex::new(2);
        let err = index
            .add(vec![entry("z", EntityKind::Individual, &[0.0, 0.0])])
            .unwrap_err();
        assert!(matches!(err, Error::DegenerateVector { id } if id == "z"));
        assert!(!index.is_built());
    }

    #[test]
    fn query_dimension_is_checked() {
        let index = sample_index();
        assert!(matches!(
            index.search(&[1.0, 0.0], 1, None),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn search_ranks_by_similarity() {
        let index = sample_index();
        let hits = index.search(&[1.0, 0.0, 0.0], 3, None).unwrap();

        let ids: Vec<_> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["alice", "p1", "p3"]);
        assert!((hits[0].similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn query_is_normalized() {
        let index = sample_index();
        let small = index.search(&[0.5, 0.0, 0.0], 2, None).unwrap();
        let large = index.search(&[50.0, 0.0, 0.0], 2, None).unwrap();
        for (a, b) in small.iter().zip(&large) {
            assert_eq!(a.id, b.id);
            assert!((a.similarity - b.similarity).abs() < 1e-6);
        }
    }

    #[test]
    fn kind_filter_restricts_results() {
        let index = sample_index();
        let hits = index
            .search(&[1.0, 0.0, 0.0], 2, Some(&[EntityKind::ProjectCall]))
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.kind == EntityKind::ProjectCall));
        assert_eq!(hits[0].id, "p1");
    }

    #[test]
    fn kind_filter_can_underfill() {
        let mut index = VectorIndex::new(2);
        index
            .add(vec![
                entry("i1", EntityKind::Individual, &[1.0, 0.0]),
                entry("i2", EntityKind::Individual, &[1.0, 0.01]),
                entry("i3", EntityKind::Individual, &[1.0, 0.02]),
                entry("p1", EntityKind::ProjectCall, &[0.0, 1.0]),
            ])
            .unwrap();

        // The two best positions are individuals, so nothing survives.
        let hits = index
            .search(&[1.0, 0.0], 1, Some(&[EntityKind::ProjectCall]))
            .unwrap();
        assert!(hits.is_empty());

        // A wider window reaches the project.
        let hits = index
            .search(&[1.0, 0.0], 2, Some(&[EntityKind::ProjectCall]))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "p1");
    }

    #[test]
    fn zero_k_returns_nothing() {
        let index = sample_index();
        assert!(index.search(&[1.0, 0.0, 0.0], 0, None).unwrap().is_empty());
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut index = VectorIndex::new(2);
        index
            .add(vec![
                entry("first", EntityKind::ProjectCall, &[1.0, 0.0]),
                entry("second", EntityKind::ProjectCall, &[2.0, 0.0]),
                entry("third", EntityKind::ProjectCall, &[3.0, 0.0]),
            ])
            .unwrap();

        let hits = index.search(&[1.0, 0.0], 3, None).unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn readding_an_id_appends_and_moves_lookup() {
        let mut index = VectorIndex::new(2);
        index
            .add(vec![entry("x", EntityKind::Individual, &[1.0, 0.0])])
            .unwrap();
        index
            .add(vec![entry("x", EntityKind::Individual, &[0.0, 1.0])])
            .unwrap();

        assert_eq!(index.len(), 2);
        let latest = index.get(EntityKind::Individual, "x").unwrap();
        assert_eq!(latest.position, 1);
        assert_eq!(index.entities(EntityKind::Individual).count(), 1);
        assert_eq!(index.search(&[1.0, 0.0], 5, None).unwrap().len(), 2);
    }

    #[test]
    fn ids_are_scoped_by_kind() {
        let mut index = VectorIndex::new(2);
        index
            .add(vec![
                entry("7", EntityKind::Individual, &[1.0, 0.0]),
                entry("7", EntityKind::ProjectCall, &[0.0, 1.0]),
            ])
            .unwrap();

        assert_eq!(index.get(EntityKind::Individual, "7").unwrap().position, 0);
        assert_eq!(index.get(EntityKind::ProjectCall, "7").unwrap().position, 1);
        assert!(index.get(EntityKind::Organization, "7").is_none());
    }

    #[test]
    fn stats_count_per_kind() {
        let stats = sample_index().stats();
        assert_eq!(stats.total_vectors, 5);
        assert_eq!(stats.dimension, 3);
        assert_eq!(stats.kind_counts[&EntityKind::ProjectCall], 3);
        assert_eq!(stats.kind_counts[&EntityKind::Individual], 1);
        assert_eq!(stats.kind_counts[&EntityKind::Organization], 1);
    }

    #[test]
    fn persist_unbuilt_index_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let index = VectorIndex::new(4);
        assert!(matches!(
            index.persist(&tmp.path().join("index.redb")),
            Err(Error::IndexNotBuilt)
        ));
    }

    fn vector_strategy(dim: usize) -> impl Strategy<Value = Vec<f32>> {
        prop::collection::vec(-10.0f32..10.0, dim)
            .prop_filter("non-zero", |v| l2_norm(v) > 1e-3)
    }

    proptest! {
        #[test]
        fn search_results_are_bounded_and_sorted(
            vectors in prop::collection::vec(vector_strategy(4), 1..40),
            query in vector_strategy(4),
            k in 1usize..12,
        ) {
            let mut index = VectorIndex::new(4);
            let entries = vectors
                .iter()
                .enumerate()
                .map(|(i, v)| entry(&i.to_string(), EntityKind::ProjectCall, v))
                .collect();
            index.add(entries).unwrap();

            let hits = index.search(&query, k, None).unwrap();
            prop_assert!(hits.len() <= k);
            prop_assert_eq!(hits.len(), k.min(vectors.len()));
            for hit in &hits {
                prop_assert!((-1.0..=1.0).contains(&hit.similarity));
            }
            for pair in hits.windows(2) {
                prop_assert!(pair[0].similarity >= pair[1].similarity);
            }
        }

        #[test]
        fn inserted_vectors_are_normalized(
            vectors in prop::collection::vec(vector_strategy(6), 1..20),
        ) {
            let mut index = VectorIndex::new(6);
            let entries = vectors
                .iter()
                .enumerate()
                .map(|(i, v)| entry(&i.to_string(), EntityKind::Individual, v))
                .collect();
            index.add(entries).unwrap();

            for e in index.entities(EntityKind::Individual) {
                prop_assert!((l2_norm(e.vector) - 1.0).abs() < 1e-5);
            }
        }
    }
}
