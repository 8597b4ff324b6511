//! Knowledge-graph memory for AI coding assistants — semantic retrieval over
//! markdown notes, exposed via MCP.
//!
//! Brain turns a directory of markdown notes into a chunked, embedded vector
//! index kept consistent with edits, and answers queries by fusing vector
//! similarity, keyword search, and wiki-link graph traversal.
//!
//! # Architecture
//!
//! - **Storage**: SQLite with [sqlite-vec](https://github.com/asg017/sqlite-vec)
//!   for chunk-level vector search
//! - **Embeddings**: local Ollama-style HTTP backend (batch API, 768 dims by
//!   default) with task-type prefixes for documents vs. queries
//! - **Search**: auto / semantic / keyword / hybrid modes, per-note
//!   deduplication, folder filters, and depth-N `[[wiki-link]]` expansion
//! - **Transport**: MCP over stdio (primary) or Streamable HTTP
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`db`] — SQLite database initialization, schema, and migrations
//! - [`embedding`] — Batch embedding client for the Ollama-style backend
//! - [`index`] — Chunker, vector store, and the embedding pipeline
//! - [`notes`] — Note store port and the markdown-directory implementation
//! - [`search`] — Unified search service with graph expansion
//! - [`tools`] — MCP tool handlers
//! - [`server`] — Transport wiring (stdio, Streamable HTTP)

pub mod cli;
pub mod config;
pub mod db;
pub mod embedding;
pub mod index;
pub mod notes;
pub mod search;
pub mod server;
pub mod tools;
