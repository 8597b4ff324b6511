//! One-shot CLI commands: embed, search, status.
//!
//! These reuse the same shared state as the MCP server and print
//! human-readable output to stdout. The server transports live in
//! [`crate::server`].

pub mod embed;
pub mod search;
pub mod status;
