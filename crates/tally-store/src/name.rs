//! Artifact names
//!
//! Provides [`ArtifactName`], the only form in which a caller-supplied name
//! reaches the filesystem. A valid name is a single path component made of
//! ASCII alphanumerics, `_`, `-` and `.`, so it cannot leave the store root.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Longest accepted name, in bytes (common filesystem limit)
pub const MAX_NAME_LEN: usize = 255;

/// Validated, traversal-safe artifact file name
///
/// # Examples
/// - `city_sales_1718000000000000000.csv` → valid
/// - `../etc/passwd`, `a/b.csv`, `.partial` → rejected
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArtifactName(String);

impl ArtifactName {
    /// Get the name as a string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take ownership of the inner string
    #[inline]
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }

    /// Wrap a name assembled from already-validated parts
    pub(crate) fn from_generated(name: String) -> Self {
        debug_assert!(name.parse::<Self>().is_ok(), "generated name {name:?} is invalid");
        Self(name)
    }
}

impl Display for ArtifactName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ArtifactName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ArtifactName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(NameError::Empty);
        }
        if s.len() > MAX_NAME_LEN {
            return Err(NameError::TooLong(s.len()));
        }
        if s.contains("..") {
            return Err(NameError::ParentReference);
        }
        if s.starts_with('.') {
            return Err(NameError::Hidden);
        }
        if let Some(c) = s
            .chars()
            .find(|&c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
        {
            return Err(NameError::InvalidCharacter(c));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for ArtifactName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Reasons a name is refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    /// Empty name
    #[error("name is empty")]
    Empty,

    /// Name exceeds [`MAX_NAME_LEN`]
    #[error("name is {0} bytes long (max 255)")]
    TooLong(usize),

    /// Name contains `..`
    #[error("name contains a parent reference")]
    ParentReference,

    /// Name starts with `.`
    #[error("name starts with '.'")]
    Hidden,

    /// Character outside the allowed set (separators included)
    #[error("invalid character {0:?} (must be alphanumeric, '_', '-' or '.')")]
    InvalidCharacter(char),
}
