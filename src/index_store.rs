use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::{
    entity::EntityKind,
    error::{Error, Result},
    vector_index::{EntryMeta, VectorIndex},
};

const VECTORS: TableDefinition<u64, &[u8]> = TableDefinition::new("vectors");
const MANIFEST: TableDefinition<&str, &[u8]> =
    TableDefinition::new("manifest");

const MANIFEST_KEY: &str = "manifest";

/// Bumped whenever the on-disk layout changes.
pub const FORMAT_VERSION: u32 = 1;

const F32_SIZE: usize = std::mem::size_of::<f32>();

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    version: u32,
    dimension: usize,
    entries: Vec<EntryMeta>,
    positions: Vec<PositionRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PositionRecord {
    kind: EntityKind,
    id: String,
    position: usize,
}

/// On-disk form of a [`VectorIndex`].
///
/// Two tables in one redb file:
/// - `vectors`: position (u64) -> `dimension` f32 values, native byte order
/// - `manifest`: a single JSON document with the format version, the
///   dimension, per-position metadata and the `(kind, id) -> position` map
pub struct IndexStore {
    db: Database,
}

impl IndexStore {
    /// Write `index` to `path`, replacing any previous store only once the
    /// new one is fully committed.
    ///
    /// The store is built at a sibling `.tmp` path and renamed over
    /// `path`. On failure the temp file is removed and `path` is left as
    /// it was.
    pub fn replace(path: &Path, index: &VectorIndex) -> Result<()> {
        let tmp = temp_path(path);
        if tmp.exists() {
            std::fs::remove_file(&tmp)?;
        }

        let written = Database::create(&tmp)
            .map_err(Error::from)
            .and_then(|db| Self { db }.write_index(index));
        if let Err(e) = written {
            if tmp.is_file() {
                let _ = std::fs::remove_file(&tmp);
            }
            return Err(e);
        }

        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Open an existing store. A missing file is `NotFound`.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound {
                kind: "index",
                name: path.display().to_string(),
            });
        }
        let db = Database::open(path)?;
        Ok(Self { db })
    }

    /// Delete the store at `path`. Returns whether a file was removed.
    pub fn clear(path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(path)?;
        Ok(true)
    }

    /// Write every vector and the manifest in a single transaction.
    pub fn write_index(&self, index: &VectorIndex) -> Result<()> {
        let dimension = index.dimension();
        let mut positions: Vec<PositionRecord> = index
            .raw_positions()
            .iter()
            .map(|((kind, id), &position)| PositionRecord {
                kind: *kind,
                id: id.clone(),
                position,
            })
            .collect();
        positions.sort_by_key(|p| p.position);

        let manifest = Manifest {
            version: FORMAT_VERSION,
            dimension,
            entries: index.raw_entries().to_vec(),
            positions,
        };
        let manifest_bytes = serde_json::to_vec(&manifest)?;

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(VECTORS)?;
            for (position, vector) in
                index.raw_vectors().chunks_exact(dimension).enumerate()
            {
                let mut guard = table.insert_reserve(
                    position as u64,
                    std::mem::size_of_val(vector),
                )?;
                guard.as_mut().copy_from_slice(bytemuck::cast_slice(vector));
            }

            let mut table = txn.open_table(MANIFEST)?;
            table.insert(MANIFEST_KEY, manifest_bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Read the index back, validating the manifest against the vectors.
    pub fn read_index(&self) -> Result<VectorIndex> {
        let txn = self.db.begin_read()?;

        let manifest: Manifest = {
            let table = txn.open_table(MANIFEST)?;
            let Some(guard) = table.get(MANIFEST_KEY)? else {
                return Err(Error::CorruptIndex("missing manifest".into()));
            };
            let manifest = serde_json::from_slice(guard.value()).map_err(|e| {
                Error::CorruptIndex(format!("unreadable manifest: {e}"))
            })?;
            manifest
        };

        if manifest.version != FORMAT_VERSION {
            return Err(Error::CorruptIndex(format!(
                "unsupported format version {} (expected {FORMAT_VERSION})",
                manifest.version
            )));
        }

        let dimension = manifest.dimension;
        let row_bytes = dimension * F32_SIZE;
        let mut vectors = Vec::with_capacity(manifest.entries.len() * dimension);

        let table = txn.open_table(VECTORS)?;
        let mut count: u64 = 0;
        for entry in table.iter()? {
            let (key, value) = entry?;
            if key.value() != count {
                return Err(Error::CorruptIndex(format!(
                    "vector positions are not contiguous at {count}"
                )));
            }
            let bytes = value.value();
            if bytes.len() != row_bytes {
                return Err(Error::CorruptIndex(format!(
                    "vector {count} has {} bytes, expected {row_bytes}",
                    bytes.len()
                )));
            }
            // redb values carry no alignment guarantee.
            vectors.extend(
                bytes
                    .chunks_exact(F32_SIZE)
                    .map(bytemuck::pod_read_unaligned::<f32>),
            );
            count += 1;
        }

        if count as usize != manifest.entries.len() {
            return Err(Error::CorruptIndex(format!(
                "{count} vectors stored but manifest lists {} entries",
                manifest.entries.len()
            )));
        }

        let positions: HashMap<(EntityKind, String), usize> = manifest
            .positions
            .into_iter()
            .map(|p| ((p.kind, p.id), p.position))
            .collect();

        VectorIndex::from_parts(dimension, vectors, manifest.entries, positions)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

impl std::fmt::Debug for IndexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexStore").finish_non_exhaustive()
    }
}
