//! Vector store operations over the chunk tables.
//!
//! The metadata row and the vec0 embedding row for a chunk are always written
//! together inside one transaction, so readers either see a note's full chunk
//! set or its previous full set — never a partial one. The embedding pipeline
//! is the only writer.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use super::embedding_to_bytes;

/// One stored chunk: metadata plus its embedding.
#[derive(Debug, Clone)]
pub struct ChunkRow {
    pub chunk_id: String,
    pub entity_id: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub chunk_start: usize,
    pub chunk_end: usize,
    pub chunk_text: String,
    pub embedding: Vec<f32>,
}

impl ChunkRow {
    /// `chunk_id` is always `"{entity_id}#{chunk_index}"`.
    pub fn id_for(entity_id: &str, chunk_index: usize) -> String {
        format!("{entity_id}#{chunk_index}")
    }
}

/// A nearest-neighbour hit.
#[derive(Debug, Clone)]
pub struct NearestChunk {
    pub chunk_id: String,
    pub entity_id: String,
    pub chunk_index: usize,
    pub chunk_text: String,
    pub distance: f64,
}

/// Cosine distance → similarity in [0, 1]. Distances above 1 clamp to 0.
pub fn similarity_from_distance(distance: f64) -> f64 {
    (1.0 - distance).clamp(0.0, 1.0)
}

/// Atomically replace all rows for `entity_id` with `rows`.
///
/// Delete + insert in one transaction; on failure the previous set is intact.
pub fn upsert_chunks(conn: &mut Connection, entity_id: &str, rows: &[ChunkRow]) -> Result<()> {
    let tx = conn.transaction()?;

    delete_entity_rows(&tx, entity_id)?;

    {
        let embedded_at = chrono::Utc::now().to_rfc3339();
        let mut meta_stmt = tx.prepare(
            "INSERT INTO note_chunks \
             (chunk_id, entity_id, chunk_index, total_chunks, chunk_start, chunk_end, chunk_text, embedded_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        let mut vec_stmt =
            tx.prepare("INSERT INTO note_chunks_vec (chunk_id, embedding) VALUES (?1, ?2)")?;

        for row in rows {
            meta_stmt
                .execute(params![
                    row.chunk_id,
                    row.entity_id,
                    row.chunk_index as i64,
                    row.total_chunks as i64,
                    row.chunk_start as i64,
                    row.chunk_end as i64,
                    row.chunk_text,
                    embedded_at,
                ])
                .with_context(|| format!("failed to insert chunk {}", row.chunk_id))?;
            vec_stmt
                .execute(params![row.chunk_id, embedding_to_bytes(&row.embedding)])
                .with_context(|| format!("failed to insert embedding for {}", row.chunk_id))?;
        }
    }

    tx.commit().context("failed to commit chunk upsert")?;
    Ok(())
}

/// Delete all rows for `entity_id`.
pub fn delete_by_entity(conn: &mut Connection, entity_id: &str) -> Result<()> {
    let tx = conn.transaction()?;
    delete_entity_rows(&tx, entity_id)?;
    tx.commit()?;
    Ok(())
}

fn delete_entity_rows(tx: &rusqlite::Transaction, entity_id: &str) -> Result<()> {
    // vec0 rows are deleted by primary key; collect ids from the metadata
    // table first.
    let chunk_ids: Vec<String> = {
        let mut stmt = tx.prepare("SELECT chunk_id FROM note_chunks WHERE entity_id = ?1")?;
        let ids = stmt
            .query_map(params![entity_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        ids
    };

    let mut vec_del = tx.prepare("DELETE FROM note_chunks_vec WHERE chunk_id = ?1")?;
    for chunk_id in &chunk_ids {
        vec_del.execute(params![chunk_id])?;
    }

    tx.execute(
        "DELETE FROM note_chunks WHERE entity_id = ?1",
        params![entity_id],
    )?;
    Ok(())
}

/// Number of distinct notes with at least one chunk.
pub fn count_entities(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(DISTINCT entity_id) FROM note_chunks",
        [],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Total number of chunk rows.
pub fn count_rows(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM note_chunks", [], |row| row.get(0))?;
    Ok(count as usize)
}

/// Number of chunk rows for one note. Zero means unembedded.
pub fn count_rows_for_entity(conn: &Connection, entity_id: &str) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM note_chunks WHERE entity_id = ?1",
        params![entity_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Whether any embeddings exist at all.
pub fn has_any(conn: &Connection) -> Result<bool> {
    Ok(count_rows(conn)? > 0)
}

/// The most recent write timestamp across all chunks, RFC 3339.
pub fn latest_embedded_at(conn: &Connection) -> Result<Option<String>> {
    let ts = conn.query_row("SELECT MAX(embedded_at) FROM note_chunks", [], |row| {
        row.get(0)
    })?;
    Ok(ts)
}

/// All entity ids present in the store.
pub fn distinct_entities(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT DISTINCT entity_id FROM note_chunks ORDER BY entity_id")?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// KNN search: the `k` chunks with smallest cosine distance ≤ `max_distance`,
/// ordered by `(distance, entity_id, chunk_index)` for determinism.
pub fn nearest(
    conn: &Connection,
    query_vec: &[f32],
    k: usize,
    max_distance: f64,
) -> Result<Vec<NearestChunk>> {
    let embedding_bytes = embedding_to_bytes(query_vec);
    let mut stmt = conn.prepare(
        "SELECT v.chunk_id, c.entity_id, c.chunk_index, c.chunk_text, v.distance \
         FROM note_chunks_vec v \
         JOIN note_chunks c ON c.chunk_id = v.chunk_id \
         WHERE v.embedding MATCH ?1 AND k = ?2 \
         ORDER BY v.distance",
    )?;

    let mut hits: Vec<NearestChunk> = stmt
        .query_map(params![embedding_bytes, k as i64], |row| {
            Ok(NearestChunk {
                chunk_id: row.get(0)?,
                entity_id: row.get(1)?,
                chunk_index: row.get::<_, i64>(2)? as usize,
                chunk_text: row.get(3)?,
                distance: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    hits.retain(|h| h.distance <= max_distance);
    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.entity_id.cmp(&b.entity_id))
            .then_with(|| a.chunk_index.cmp(&b.chunk_index))
    });
    Ok(hits)
}
