//! Explicit JSON snapshot files.
//!
//! A snapshot wraps the encoded root in an envelope carrying a magic string,
//! a format version, the tree's version counter and a SHA-256 digest of the
//! canonical root JSON. Nothing here runs implicitly.
//!
//! The root is carried as raw JSON so trees of any depth pass through the
//! envelope; the hash is always taken over the canonical compact encoding of
//! the decoded root, so reformatting a file does not invalidate it.

use crate::config::TreeConfig;
use crate::error::{HubtreeError, Result};
use crate::node::Node;
use crate::tree::Tree;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

pub const FILE_MAGIC: &str = "HUBTREE";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct SnapshotFormat {
    magic: Option<String>,
    format_version: Option<u32>,
    #[serde(default)]
    version: u64,
    state_hash: String,
    root: Box<RawValue>,
}

fn digest(canonical: &str) -> [u8; 32] {
    let digest = Sha256::digest(canonical.as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// SHA-256 of the canonical JSON encoding of `root` and its subtree.
///
/// Children and map keys are encoded in sorted order, so equal trees hash
/// equally.
pub fn state_hash(root: &Node) -> Result<[u8; 32]> {
    Ok(digest(&root.to_json()?))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Writes `tree` to `path`, replacing the file atomically.
pub fn save<P: AsRef<Path>>(path: P, tree: &Tree) -> anyhow::Result<()> {
    let path = path.as_ref();
    let version = tree.version();
    let canonical = tree.root().to_json()?;
    let hash = digest(&canonical);
    let root = RawValue::from_string(canonical)?;

    let sf = SnapshotFormat {
        magic: Some(FILE_MAGIC.to_string()),
        format_version: Some(FORMAT_VERSION),
        version,
        state_hash: hex::encode(hash),
        root,
    };

    let data = if tree.config().pretty_snapshots {
        serde_json::to_string_pretty(&sf)?
    } else {
        serde_json::to_string(&sf)?
    };

    let tmp = tmp_path(path);
    fs::write(&tmp, data)
        .with_context(|| format!("Failed to write to file: {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to atomically replace file: {}", path.display()))?;

    tracing::info!(path = %path.display(), version, "saved snapshot");
    Ok(())
}

/// Reads a snapshot written by [`save`] and rebuilds the tree.
///
/// The envelope is validated before the root is decoded. The restored tree's
/// version counter resumes from the saved value.
pub fn load<P: AsRef<Path>>(path: P, config: TreeConfig) -> anyhow::Result<Tree> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    let tree = decode(&data, config).inspect_err(|e| {
        tracing::warn!(path = %path.display(), error = %e, "rejected snapshot");
    })?;

    tracing::info!(path = %path.display(), version = tree.version(), "loaded snapshot");
    Ok(tree)
}

/// Validates and decodes snapshot text.
pub fn decode(data: &str, config: TreeConfig) -> Result<Tree> {
    let mut de = serde_json::Deserializer::from_str(data);
    de.disable_recursion_limit();
    let sf = SnapshotFormat::deserialize(&mut de)?;
    de.end()?;

    match sf.magic.as_deref() {
        Some(FILE_MAGIC) => {}
        _ => return Err(HubtreeError::InvalidFileMagic),
    }
    match sf.format_version {
        None => return Err(HubtreeError::MissingFormatVersion),
        Some(v) if v > FORMAT_VERSION || v == 0 => {
            return Err(HubtreeError::UnsupportedFormatVersion(v));
        }
        Some(_) => {}
    }

    let root = Node::from_json(sf.root.get().as_bytes())?;
    if hex::encode(state_hash(&root)?) != sf.state_hash.to_ascii_lowercase() {
        return Err(HubtreeError::StateHashMismatch);
    }

    let tree = Tree::with_root(root, config);
    tree.restore_version(sf.version);
    Ok(tree)
}

pub fn exists<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().exists()
}
