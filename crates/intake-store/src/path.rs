//! Store paths
//!
//! Provides [`StorePath`] for addressing nodes in the hierarchical store.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Characters a segment may not contain
const RESERVED: [char; 6] = ['/', '.', '#', '$', '[', ']'];

/// Path to a node in the store tree
///
/// Written `/`-separated; leading and trailing slashes are ignored.
///
/// # Examples
/// - `guests/01HV…/evaluation`
/// - `intakeQueue/q-17/guestId`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct StorePath(Vec<String>);

impl StorePath {
    /// Empty path (root)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse and validate a path
    ///
    /// # Errors
    /// See [`PathError`]
    #[inline]
    pub fn parse(s: &str) -> Result<Self, PathError> {
        s.parse()
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Get number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if path is empty (root)
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Get parent path (if not root)
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Get last segment (if not root)
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Append a trusted segment (a generated key or a fixed field name)
    #[inline]
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut new = self.clone();
        new.0.push(segment.into());
        new
    }

    /// Append an untrusted segment, validating it
    ///
    /// # Errors
    /// `PathError::EmptySegment` or `PathError::InvalidSegment`
    pub fn try_child(&self, segment: &str) -> Result<Self, PathError> {
        validate_segment(segment)?;
        Ok(self.child(segment))
    }

    /// Check if this path is a prefix of another (or equal to it)
    #[inline]
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.0.len() <= other.0.len() && self.0 == other.0[..self.0.len()]
    }

    /// Strict prefix
    #[inline]
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        self.0.len() < other.0.len() && self.is_prefix_of(other)
    }

    /// One path is a prefix of the other
    #[inline]
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.is_prefix_of(other) || other.is_prefix_of(self)
    }

    /// Segments of `self` below `ancestor`
    ///
    /// # Errors
    /// `PathError::NotDescendant` if `ancestor` is not a prefix of `self`
    pub fn relative_to(&self, ancestor: &Self) -> Result<Self, PathError> {
        if !ancestor.is_prefix_of(self) {
            return Err(PathError::NotDescendant {
                path: self.to_string(),
                ancestor: ancestor.to_string(),
            });
        }
        Ok(Self(self.0[ancestor.0.len()..].to_vec()))
    }

    /// Iterator over segments from root to leaf
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

fn validate_segment(seg: &str) -> Result<(), PathError> {
    if seg.is_empty() {
        Err(PathError::EmptySegment)
    } else if seg.contains(RESERVED) || seg.chars().any(char::is_control) {
        Err(PathError::InvalidSegment(seg.to_string()))
    } else {
        Ok(())
    }
}

impl Display for StorePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0.join("/"))
    }
}

impl FromStr for StorePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        let segments = trimmed
            .split('/')
            .map(|seg| validate_segment(seg).map(|()| seg.to_string()))
            .collect::<Result<_, _>>()?;

        Ok(Self(segments))
    }
}

/// Errors related to store paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Empty segment in path (`a//b`)
    #[error("path contains empty segment")]
    EmptySegment,

    /// Reserved or control characters in a segment
    #[error("invalid segment: '{0}' (must not contain / . # $ [ ] or control characters)")]
    InvalidSegment(String),

    /// Not a descendant path
    #[error("path '{path}' is not a descendant of '{ancestor}'")]
    NotDescendant {
        /// Path that was expected below `ancestor`
        path: String,
        /// Expected ancestor
        ancestor: String,
    },
}
