//! An in-memory, concurrently accessible hierarchy of status-carrying nodes.
//!
//! Nodes are addressed by slash-delimited paths relative to the root of a
//! [`Tree`]. Each node holds an optional typed [`Value`] and a free-form
//! status map. Status updates can fan out to a node's descendants or bubble
//! up to its ancestors, and every tree keeps a monotonic activity counter.

pub mod config;
pub mod error;
pub mod node;
pub mod path;
pub mod snapshot;
pub mod tree;
pub mod value;

pub use config::{TreeConfig, VersionPolicy};
pub use error::{HubtreeError, Result};
pub use node::{Node, StatusMap};
pub use path::Path;
pub use tree::Tree;
pub use value::Value;
