//! Field path module.
//!
//! Provides the `FieldPath` type, a dotted path of field names from the
//! root of a model down to one field (`my_tag.nbr`). Index keys prefix
//! the path with the [`ROOT`] marker (`__root__.my_tag`).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

/// Marker naming the root of every model in index keys.
pub const ROOT: &str = "__root__";

/// Dotted path of field names, root first.
///
/// Segments share one `Arc` allocation, so cloning a path is cheap.
///
/// # Examples
///
/// ```rust
/// use zztag::FieldPath;
///
/// let path = FieldPath::parse("my_tag.nbr");
/// assert_eq!(path.segments().len(), 2);
/// assert_eq!(path.name(), Some("nbr"));
/// assert_eq!(path.parent_key(), "__root__.my_tag");
///
/// let parsed: FieldPath = "my_tag.nbr".into();
/// assert_eq!(path, parsed);
/// ```
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct FieldPath(Arc<[String]>);

impl FieldPath {
    /// The empty path, addressing the model root.
    pub fn root() -> Self {
        Self(Arc::from(Vec::new()))
    }

    /// Parse a dotted path. A blank string is the root path.
    ///
    /// Empty segments (`a..b`, `a.`) are kept, so the path index rejects them.
    pub fn parse(s: &str) -> Self {
        if s.trim().is_empty() {
            return Self::root();
        }
        let segments: Vec<String> = s.split('.').map(|seg| seg.trim().to_string()).collect();
        Self(Arc::from(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Name of the addressed field, `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Append one segment.
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.0.to_vec();
        segments.push(name.to_string());
        Self(Arc::from(segments))
    }

    /// The path of the enclosing structure (root for top-level fields).
    pub fn parent(&self) -> Self {
        let len = self.0.len().saturating_sub(1);
        Self(Arc::from(self.0[..len].to_vec()))
    }

    /// Same parent, last segment suffixed (`nbr` -> `nbrPlus`).
    pub fn sibling_with_suffix(&self, suffix: &str) -> Self {
        match self.name() {
            Some(name) => self.parent().child(&format!("{name}{suffix}")),
            None => self.clone(),
        }
    }

    /// Index key of this path as a parent: the root marker followed by every segment.
    pub fn key(&self) -> String {
        std::iter::once(ROOT)
            .chain(self.0.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Index key of the enclosing structure.
    pub fn parent_key(&self) -> String {
        self.parent().key()
    }

    /// Dotted form without the root marker.
    pub fn dotted(&self) -> String {
        self.0.join(".")
    }
}

impl Serialize for FieldPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.dotted().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(FieldPath::parse(&s))
    }
}

impl From<&str> for FieldPath {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for FieldPath {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dotted())
    }
}
