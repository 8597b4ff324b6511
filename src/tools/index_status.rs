//! MCP `index_status` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `index_status` MCP tool. Takes no arguments today;
/// the struct exists so the schema stays stable if filters are added.
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct IndexStatusParams {}
