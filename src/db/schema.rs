//! SQL DDL for the chunk index tables.
//!
//! Defines `note_chunks` (chunk metadata), `note_chunks_vec` (vec0 embeddings),
//! and `schema_meta`. All DDL uses `IF NOT EXISTS` for idempotent
//! initialization. The vec0 table dimension comes from configuration, so its
//! DDL is generated rather than constant.

use rusqlite::Connection;

/// DDL for the plain tables.
const SCHEMA_SQL: &str = r#"
-- One row per chunk; per entity the chunk_index values form a complete
-- contiguous 0-based sequence.
CREATE TABLE IF NOT EXISTS note_chunks (
    chunk_id TEXT PRIMARY KEY,
    entity_id TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    total_chunks INTEGER NOT NULL,
    chunk_start INTEGER NOT NULL,
    chunk_end INTEGER NOT NULL,
    chunk_text TEXT NOT NULL,
    embedded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_note_chunks_entity ON note_chunks(entity_id);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// vec0 virtual table must be created separately (sqlite-vec syntax).
/// `distance_metric=cosine` makes KNN `distance` the cosine distance in [0, 2].
fn vec_table_sql(dimensions: usize) -> String {
    format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS note_chunks_vec USING vec0(\n\
         \tchunk_id TEXT PRIMARY KEY,\n\
         \tembedding FLOAT[{dimensions}] distance_metric=cosine\n\
         );"
    )
}

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection, dimensions: usize) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute_batch(&vec_table_sql(dimensions))?;

    // Set initial schema version and dimensions if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('embedding_dim', ?1)",
        [dimensions.to_string()],
    )?;

    Ok(())
}

/// Drop and recreate both chunk tables. Used when the embedding dimension
/// changes; all rows are lost and the corpus must be re-embedded.
pub fn rebuild_chunk_tables(conn: &Connection, dimensions: usize) -> rusqlite::Result<()> {
    conn.execute_batch(
        "DROP TABLE IF EXISTS note_chunks_vec;\n\
         DELETE FROM note_chunks;",
    )?;
    conn.execute_batch(&vec_table_sql(dimensions))?;
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('embedding_dim', ?1)",
        [dimensions.to_string()],
    )?;
    Ok(())
}
