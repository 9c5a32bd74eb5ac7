// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Runtime configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! graph_path = "./graphs/add_scale.json"
//! enable_profiling = true
//!
//! [session]
//! word_size = 8
//! device_id = 0
//!
//! [session.heap]
//! start = 0x2000_0000
//! size = "64K"
//!
//! [session.workspace]
//! start = 0x2001_0000
//! size = "16K"
//! ```

use std::path::{Path, PathBuf};

use device_session::SessionConfig;
use graph_ir::{graph::Validated, ProgramGraph};

use crate::RuntimeError;

/// Configuration for a graph runtime.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RuntimeConfig {
    /// Path to the graph program JSON.
    pub graph_path: PathBuf,
    /// Whether to record per-operator timing.
    #[serde(default = "default_true")]
    pub enable_profiling: bool,
    /// Device section layout.
    #[serde(default)]
    pub session: SessionConfig,
}

fn default_true() -> bool {
    true
}

impl RuntimeConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, RuntimeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RuntimeError::ConfigError(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, RuntimeError> {
        toml::from_str(toml_str)
            .map_err(|e| RuntimeError::ConfigError(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, RuntimeError> {
        toml::to_string_pretty(self)
            .map_err(|e| RuntimeError::ConfigError(format!("TOML serialise error: {e}")))
    }

    /// Loads and validates the configured graph.
    pub fn load_graph(&self) -> Result<ProgramGraph<Validated>, RuntimeError> {
        Ok(ProgramGraph::from_file(&self.graph_path)?.validate()?)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            graph_path: PathBuf::from("./graphs/add_scale.json"),
            enable_profiling: true,
            session: SessionConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let c = RuntimeConfig::default();
        assert!(c.enable_profiling);
        assert_eq!(c.session, SessionConfig::default());
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
graph_path = "/tmp/g.json"
enable_profiling = false

[session]
word_size = 4

[session.heap]
start = 0x1000
size = "2K"

[session.workspace]
start = 0x2000
size = "1K"
"#;
        let c = RuntimeConfig::from_toml(toml).unwrap();
        assert_eq!(c.graph_path, PathBuf::from("/tmp/g.json"));
        assert!(!c.enable_profiling);
        assert_eq!(c.session.word_size, 4);
        assert_eq!(c.session.heap.size.as_bytes(), 2048);
    }

    #[test]
    fn test_session_defaults_when_omitted() {
        let c = RuntimeConfig::from_toml("graph_path = \"g.json\"").unwrap();
        assert!(c.enable_profiling);
        assert_eq!(c.session, SessionConfig::default());
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let c = RuntimeConfig::default();
        let toml = c.to_toml().unwrap();
        let back = RuntimeConfig::from_toml(&toml).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_load_graph_missing_file() {
        let c = RuntimeConfig {
            graph_path: PathBuf::from("/nonexistent/graph.json"),
            ..Default::default()
        };
        assert!(matches!(c.load_graph(), Err(RuntimeError::GraphError(_))));
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            RuntimeConfig::from_toml("graph_path = 3"),
            Err(RuntimeError::ConfigError(_))
        ));
    }
}
