//! Tree configuration.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Which operations advance a tree's version counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionPolicy {
    /// Every public operation counts, lookups included.
    #[default]
    Activity,
    /// Only operations that change the tree count.
    MutationsOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    pub root_id: String,
    pub version_policy: VersionPolicy,
    pub pretty_snapshots: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            root_id: "root".to_string(),
            version_policy: VersionPolicy::default(),
            pretty_snapshots: true,
        }
    }
}

impl TreeConfig {
    /// Reads a JSON config file. Missing keys keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}
