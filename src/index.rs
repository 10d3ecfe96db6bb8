//! Persistent vector index backed by SQLite.
//!
//! Segments and their embeddings are stored as plain rows; retrieval is a
//! brute-force cosine similarity scan. Embeddings are computed once, at
//! insertion time, and never recomputed on read.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use thiserror::Error;

use crate::ingest::Segment;

/// Database file inside the data directory.
const DB_FILE: &str = "index.sqlite3";

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Segment count ({segments}) doesn't match embedding count ({embeddings})")]
    CountMismatch { segments: usize, embeddings: usize },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: u32, actual: u32 },
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// A retrieved segment with its similarity score.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredSegment {
    pub segment_id: String,
    pub source: String,
    pub page: u32,
    pub content: String,
    pub score: f32,
}

/// Index statistics, reported by the status endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub segment_count: u64,
    pub document_count: u64,
    pub dimensions: u32,
}

pub struct VectorIndex {
    conn: Connection,
    dir: PathBuf,
}

impl VectorIndex {
    /// Open an existing index. Returns `None` iff the data directory does not
    /// exist. An existing directory always yields a handle; malformed contents
    /// surface as a storage error on first use, not here.
    pub fn open(dir: &Path) -> Result<Option<Self>> {
        if !dir.exists() {
            return Ok(None);
        }
        let conn = Connection::open(dir.join(DB_FILE))?;
        Ok(Some(Self {
            conn,
            dir: dir.to_path_buf(),
        }))
    }

    /// Create a fresh index, its data directory, and its schema.
    pub fn create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let conn = Connection::open(dir.join(DB_FILE))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS segments (
                id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                page INTEGER NOT NULL,
                segment_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS embeddings (
                segment_id TEXT PRIMARY KEY,
                embedding BLOB NOT NULL,
                dimensions INTEGER NOT NULL,
                FOREIGN KEY (segment_id) REFERENCES segments(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_segments_source ON segments(source);
            "#,
        )?;
        Ok(Self {
            conn,
            dir: dir.to_path_buf(),
        })
    }

    /// Append segments with their embeddings, committing before return. No
    /// deduplication: inserting the same content twice stores it twice.
    pub fn add_segments(
        &mut self,
        segments: &[Segment],
        embeddings: &[Vec<f32>],
    ) -> Result<()> {
        if segments.len() != embeddings.len() {
            return Err(IndexError::CountMismatch {
                segments: segments.len(),
                embeddings: embeddings.len(),
            });
        }

        // The first stored row fixes the index dimension.
        if let Some(stored) = self.dimensions()? {
            for embedding in embeddings {
                if embedding.len() as u32 != stored {
                    return Err(IndexError::DimensionMismatch {
                        expected: stored,
                        actual: embedding.len() as u32,
                    });
                }
            }
        }

        let tx = self.conn.transaction()?;
        for (segment, embedding) in segments.iter().zip(embeddings.iter()) {
            tx.execute(
                "INSERT INTO segments (id, source, page, segment_index, content) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    segment.id.to_string(),
                    segment.source,
                    segment.page,
                    segment.segment_index,
                    segment.content,
                ],
            )?;

            // f32 little-endian blob
            let bytes: Vec<u8> = embedding.iter().flat_map(|f| f.to_le_bytes()).collect();
            tx.execute(
                "INSERT INTO embeddings (segment_id, embedding, dimensions) VALUES (?1, ?2, ?3)",
                params![segment.id.to_string(), bytes, embedding.len() as i64],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Top-k cosine similarity search over all stored segments, best first.
    pub fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<ScoredSegment>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.id, s.source, s.page, s.content, e.embedding \
             FROM segments s JOIN embeddings e ON s.id = e.segment_id",
        )?;

        let rows: Vec<(String, String, u32, String, Vec<u8>)> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut scored: Vec<ScoredSegment> = Vec::with_capacity(rows.len());
        for (segment_id, source, page, content, embedding_bytes) in rows {
            let embedding = deserialize_embedding(&embedding_bytes);
            if embedding.len() != query_embedding.len() {
                return Err(IndexError::DimensionMismatch {
                    expected: embedding.len() as u32,
                    actual: query_embedding.len() as u32,
                });
            }
            let score = cosine_similarity(query_embedding, &embedding);
            scored.push(ScoredSegment {
                segment_id,
                source,
                page,
                content,
                score,
            });
        }

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }

    pub fn stats(&self) -> Result<IndexStats> {
        let segment_count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM segments", [], |row| row.get(0))?;
        let document_count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT source) FROM segments",
            [],
            |row| row.get(0),
        )?;
        Ok(IndexStats {
            segment_count: segment_count as u64,
            document_count: document_count as u64,
            dimensions: self.dimensions()?.unwrap_or(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn dimensions(&self) -> Result<Option<u32>> {
        Ok(self
            .conn
            .query_row("SELECT dimensions FROM embeddings LIMIT 1", [], |row| {
                row.get::<_, i64>(0)
            })
            .optional()?
            .map(|d| d as u32))
    }
}

/// Create the index when absent, append to it otherwise. Either way the given
/// segments are durable once this returns.
pub fn create_or_append(
    existing: Option<VectorIndex>,
    dir: &Path,
    segments: &[Segment],
    embeddings: &[Vec<f32>],
) -> Result<VectorIndex> {
    let mut index = match existing {
        Some(index) => index,
        None => VectorIndex::create(dir)?,
    };
    index.add_segments(segments, embeddings)?;
    Ok(index)
}

fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = (norm_a * norm_b).sqrt();
    if denominator == 0.0 {
        return 0.0;
    }
    dot / denominator
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn segment(content: &str, page: u32, segment_index: u32) -> Segment {
        Segment {
            id: Uuid::new_v4(),
            source: "doc.pdf".to_string(),
            page,
            segment_index,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &[1.0, 0.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&a, &[0.0, 1.0, 0.0]).abs() < 0.001);
        assert!((cosine_similarity(&a, &[-1.0, 0.0, 0.0]) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_deserialize_embedding() {
        let values = vec![1.0f32, 2.0, 3.0];
        let bytes: Vec<u8> = values.iter().flat_map(|f| f.to_le_bytes()).collect();
        assert_eq!(deserialize_embedding(&bytes), values);
    }

    #[test]
    fn test_open_absent_iff_directory_missing() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("db");

        assert!(VectorIndex::open(&data_dir).unwrap().is_none());

        VectorIndex::create(&data_dir).unwrap();
        assert!(VectorIndex::open(&data_dir).unwrap().is_some());
    }

    #[test]
    fn test_existing_dir_with_garbage_opens_but_fails_on_use() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("db");
        std::fs::create_dir_all(&data_dir).unwrap();
        std::fs::write(data_dir.join(DB_FILE), b"this is not sqlite").unwrap();

        let index = VectorIndex::open(&data_dir).unwrap().expect("handle");
        assert!(matches!(
            index.search(&[1.0, 0.0], 4),
            Err(IndexError::Sqlite(_))
        ));
    }

    #[test]
    fn test_create_or_append_twice_stores_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("db");
        let segments = vec![segment("o prazo de entrega é 30 dias", 1, 0)];
        let embeddings = vec![vec![1.0, 0.0]];

        let index = create_or_append(None, &data_dir, &segments, &embeddings).unwrap();
        let index = create_or_append(Some(index), &data_dir, &segments, &embeddings).unwrap();

        let stats = index.stats().unwrap();
        assert_eq!(stats.segment_count, 2);
        assert_eq!(stats.document_count, 1);
        assert_eq!(stats.dimensions, 2);
    }

    #[test]
    fn test_round_trip_search_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("db");
        let segments = vec![
            segment("o gato dorme no sofá", 1, 0),
            segment("o prazo de entrega é 30 dias", 2, 1),
        ];
        let embeddings = vec![vec![1.0, 0.0], vec![0.0, 1.0]];

        let index = create_or_append(None, &data_dir, &segments, &embeddings).unwrap();
        drop(index);

        let index = VectorIndex::open(&data_dir).unwrap().expect("warm start");
        let results = index.search(&[0.1, 0.9], 1).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].content.contains("prazo"));
        assert_eq!(results[0].page, 2);
    }

    #[test]
    fn test_search_orders_by_score_and_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("db");
        let segments = vec![
            segment("a", 1, 0),
            segment("b", 1, 1),
            segment("c", 1, 2),
        ];
        let embeddings = vec![
            vec![1.0, 0.0],
            vec![0.7, 0.7],
            vec![0.0, 1.0],
        ];

        let index = create_or_append(None, &data_dir, &segments, &embeddings).unwrap();
        let results = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "a");
        assert_eq!(results[1].content, "b");
        assert!(results[0].score >= results[1].score);
    }

    #[test]
    fn test_dimension_mismatch_on_insert() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("db");
        let index = create_or_append(None, &data_dir, &[segment("a", 1, 0)], &[vec![1.0, 0.0]])
            .unwrap();

        let result = create_or_append(
            Some(index),
            &data_dir,
            &[segment("b", 1, 1)],
            &[vec![1.0, 0.0, 0.0]],
        );
        assert!(matches!(
            result,
            Err(IndexError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("db");
        let result = create_or_append(None, &data_dir, &[segment("a", 1, 0)], &[]);
        assert!(matches!(result, Err(IndexError::CountMismatch { .. })));
    }
}
