//! Knobs for graph checking, evaluation and import.
//!
//! ```toml
//! check_edges = true
//! check_arity = true
//! check_outputs = true
//! max_nodes = 1048576
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IrConfig {
    /// Verify both ends of every edge before building a plan.
    pub check_edges: bool,
    /// Verify node input and output counts against their operators before
    /// building a plan.
    pub check_arity: bool,
    /// Verify the number of values each `eval` returns during a run.
    pub check_outputs: bool,
    /// Largest model the tract importer accepts.
    pub max_nodes: usize,
}

impl Default for IrConfig {
    fn default() -> Self {
        Self {
            check_edges: true,
            check_arity: true,
            check_outputs: true,
            max_nodes: 1 << 20,
        }
    }
}

impl IrConfig {
    pub fn from_file(path: &Path) -> IrResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            IrError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses a TOML document. Missing keys keep their default.
    pub fn from_toml(toml_str: &str) -> IrResult<Self> {
        toml::from_str(toml_str).map_err(|e| IrError::Config(format!("TOML parse error: {e}")))
    }

    pub fn to_toml(&self) -> IrResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| IrError::Config(format!("TOML serialise error: {e}")))
    }
}
