use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("vector store I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("vector store {path} is corrupted: {source}")]
    Corrupted {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
    #[error("embedding dimension mismatch: collection uses {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub document: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone)]
pub struct QueryMatch {
    pub id: String,
    pub document: String,
    pub metadata: ChunkMetadata,
    pub score: f32,
}

/// Changes made through `add` and `remove_source` are durable only after `flush`.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert records, replacing any existing record with the same id.
    fn add(&mut self, records: Vec<ChunkRecord>) -> Result<(), StoreError>;
    /// Drop every record whose metadata source is `source`. Returns how many were removed.
    fn remove_source(&mut self, source: &str) -> usize;
    fn count(&self) -> usize;
    /// The `n` records most similar to `embedding`, best first.
    fn query(&self, embedding: &[f32], n: usize) -> Vec<QueryMatch>;
    async fn flush(&mut self) -> Result<(), StoreError>;
}

/// A single collection kept in memory and mirrored to `<db_path>/<collection>.json`.
#[derive(Debug)]
pub struct JsonVectorStore {
    path: PathBuf,
    records: BTreeMap<String, ChunkRecord>,
    dirty: bool,
}

#[derive(Serialize, Deserialize)]
struct CollectionFile {
    name: String,
    records: Vec<ChunkRecord>,
}

impl JsonVectorStore {
    /// Open a collection, creating it empty when it does not exist yet.
    pub async fn open(db_path: &Path, collection: &str) -> Result<Self, StoreError> {
        let path = db_path.join(format!("{collection}.json"));
        let records = match fs::read(&path).await {
            Ok(bytes) => {
                let file: CollectionFile =
                    serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupted {
                        path: path.clone(),
                        source,
                    })?;
                file.records
                    .into_iter()
                    .map(|r| (r.id.clone(), r))
                    .collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        tracing::debug!("opened collection {} with {} records", path.display(), records.len());
        Ok(Self {
            path,
            records,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dimension(&self) -> Option<usize> {
        self.records.values().next().map(|r| r.embedding.len())
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let name = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file = CollectionFile {
            name,
            records: self.records.values().cloned().collect(),
        };
        let bytes = serde_json::to_vec(&file)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes).await.map_err(io_err)?;
        fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for JsonVectorStore {
    fn add(&mut self, records: Vec<ChunkRecord>) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let expected = self
            .dimension()
            .unwrap_or_else(|| records[0].embedding.len());
        if let Some(bad) = records.iter().find(|r| r.embedding.len() != expected) {
            return Err(StoreError::DimensionMismatch {
                expected,
                actual: bad.embedding.len(),
            });
        }
        for record in records {
            self.records.insert(record.id.clone(), record);
        }
        self.dirty = true;
        Ok(())
    }

    fn remove_source(&mut self, source: &str) -> usize {
        let before = self.records.len();
        self.records.retain(|_, r| r.metadata.source != source);
        let removed = before - self.records.len();
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    fn count(&self) -> usize {
        self.records.len()
    }

    fn query(&self, embedding: &[f32], n: usize) -> Vec<QueryMatch> {
        let mut scored: Vec<(&ChunkRecord, f32)> = self
            .records
            .values()
            .map(|r| (r, cosine_similarity(embedding, &r.embedding)))
            .collect();
        // BTreeMap iteration is id-ordered and the sort is stable, so ties keep id order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored
            .into_iter()
            .take(n)
            .map(|(r, score)| QueryMatch {
                id: r.id.clone(),
                document: r.document.clone(),
                metadata: r.metadata.clone(),
                score,
            })
            .collect()
    }

    async fn flush(&mut self) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }
        self.persist().await?;
        self.dirty = false;
        Ok(())
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}
