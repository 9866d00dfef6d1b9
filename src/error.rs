use thiserror::Error;

#[derive(Error, Debug)]
pub enum HubtreeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Node not found: {0}")]
    NotFound(String),

    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
    },

    #[error("Unsupported value type: {0}")]
    UnsupportedType(&'static str),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Attaching node '{0}' would create a cycle")]
    Cycle(String),

    #[error("Node is not part of a tree")]
    Detached,

    #[error("Invalid file magic")]
    InvalidFileMagic,

    #[error("Unsupported format version: {0}")]
    UnsupportedFormatVersion(u32),

    #[error("Missing format version")]
    MissingFormatVersion,

    #[error("Snapshot state hash mismatch")]
    StateHashMismatch,
}

pub type Result<T> = std::result::Result<T, HubtreeError>;

pub(crate) fn not_found<S: AsRef<str>>(path: &[S]) -> HubtreeError {
    let joined: Vec<&str> = path.iter().map(|s| s.as_ref()).collect();
    HubtreeError::NotFound(joined.join("/"))
}
