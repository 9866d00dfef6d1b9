use crate::error::{HubtreeError, Result};
use std::fmt;
use std::str::FromStr;

pub const SEPARATOR: char = '/';

/// Trailing segment that addresses the status of a node rather than the node.
pub const STATUS_SEGMENT: &str = "status";

/// A normalized sequence of path segments, relative to the tree root.
///
/// The empty path addresses the root itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    pub fn root() -> Self {
        Self::default()
    }

    /// Normalizes a slash-delimited path string.
    ///
    /// Surrounding whitespace and separators are trimmed, and one trailing
    /// `status` segment is dropped. Empty interior segments (`a//b`) are
    /// rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut trimmed = raw.trim().trim_matches(SEPARATOR);
        if trimmed == STATUS_SEGMENT {
            trimmed = "";
        } else if let Some(rest) = trimmed
            .strip_suffix(STATUS_SEGMENT)
            .and_then(|rest| rest.strip_suffix(SEPARATOR))
        {
            trimmed = rest.trim_end_matches(SEPARATOR);
        }

        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        let segments = trimmed
            .split(SEPARATOR)
            .map(|segment| {
                if segment.is_empty() {
                    Err(HubtreeError::InvalidPath(format!(
                        "empty segment in '{}'",
                        raw.trim()
                    )))
                } else {
                    Ok(segment.to_string())
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn into_segments(self) -> Vec<String> {
        self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl FromStr for Path {
    type Err = HubtreeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<[String]> for Path {
    fn as_ref(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments(raw: &str) -> Vec<String> {
        Path::parse(raw).map(Path::into_segments).unwrap_or_default()
    }

    #[test]
    fn trims_whitespace_and_separators() {
        assert_eq!(segments("  /user1/hub2/  "), vec!["user1", "hub2"]);
    }

    #[test]
    fn strips_trailing_status_segment() {
        assert_eq!(segments("user1/hub2/status"), vec!["user1", "hub2"]);
        assert_eq!(segments("/user1/status/"), vec!["user1"]);
        assert!(segments("status").is_empty());
    }

    #[test]
    fn status_suffix_must_be_a_whole_segment() {
        assert_eq!(segments("user1/mystatus"), vec!["user1", "mystatus"]);
    }

    #[test]
    fn empty_path_is_root() {
        assert!(Path::parse("").map(|p| p.is_root()).unwrap_or(false));
        assert!(Path::parse(" / ").map(|p| p.is_root()).unwrap_or(false));
    }

    #[test]
    fn empty_interior_segment_is_rejected() {
        assert!(matches!(
            Path::parse("user1//hub2"),
            Err(HubtreeError::InvalidPath(_))
        ));
    }

    #[test]
    fn display_is_rooted() {
        assert_eq!(
            Path::parse("user1/hub2").map(|p| p.to_string()).ok(),
            Some("/user1/hub2".to_string())
        );
    }
}
