//! Per-segment context for field resolution.
//!
//! A `TagContext` carries caller data (for example the values a script
//! field needs) down to the template repository. The core does not
//! interpret this data; it's simply passed through, one context per
//! path segment.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Context information handed to the template repository for one path segment.
///
/// # Examples
///
/// ```rust
/// use zztag::TagContext;
///
/// let mut context = TagContext::new();
/// context.set("a", 100);
/// context.set("title", "Corrupted");
///
/// let a: Option<i64> = context.get("a");
/// assert_eq!(a, Some(100));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagContext {
    data: HashMap<String, serde_json::Value>,
}

impl TagContext {
    /// Create a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a context value.
    ///
    /// The value must be serializable. If serialization fails, the value
    /// is silently not added.
    pub fn set(&mut self, key: impl Into<String>, value: impl Serialize) {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.data.insert(key.into(), json_value);
        }
    }

    /// Builder form of [`TagContext::set`].
    ///
    /// ```rust
    /// use zztag::TagContext;
    ///
    /// let context = TagContext::new().with("a", 100).with("in_battle", true);
    /// assert!(context.contains_key("in_battle"));
    /// ```
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.set(key, value);
        self
    }

    /// Get a context value.
    ///
    /// Returns `None` if the key doesn't exist or if the value
    /// cannot be deserialized to the requested type.
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Borrow the raw JSON value stored under `key`.
    pub fn raw(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Check if a key exists in the context.
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for TagContext {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            data: map.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_set_get() {
        let mut ctx = TagContext::new();
        ctx.set("a", 100);

        let a: Option<i32> = ctx.get("a");
        assert_eq!(a, Some(100));
    }

    #[test]
    fn test_context_missing_key() {
        let ctx = TagContext::new();
        let value: Option<i32> = ctx.get("missing");
        assert_eq!(value, None);
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_context_from_json_map() {
        let json = serde_json::json!({ "a": 100, "title": "Hero" });
        let ctx = match json {
            serde_json::Value::Object(map) => TagContext::from(map),
            _ => unreachable!(),
        };
        assert_eq!(ctx.get::<String>("title").as_deref(), Some("Hero"));
        assert_eq!(ctx.raw("a"), Some(&serde_json::json!(100)));
    }
}
