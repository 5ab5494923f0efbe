//! Schema adapter module.
//!
//! Derives the aggregation schema from an author's model: every `number`
//! and `map` field gains `<field>Plus` and `<field>Rate` siblings, every
//! `string`, `list` and `text` field gains `<field>Plus`, structures are
//! adapted recursively and `code` fields are left alone.

use crate::error::TagError;
use crate::index::{IndexEntry, PathIndex};
use crate::model::{FieldDescriptor, FieldKind, Model};
use crate::path::FieldPath;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

/// Derive the aggregation model of `model`.
///
/// Pure and idempotent: the input is never modified, and an already
/// adapted model (recognised by its marker) is returned unchanged.
///
/// # Examples
///
/// ```rust
/// use zztag::model::{FieldDescriptor, Model};
/// use zztag::schema::adapt;
///
/// let model = Model::new()
///     .field("nbr", FieldDescriptor::number())
///     .field("str", FieldDescriptor::string())
///     .field("script", FieldDescriptor::code());
///
/// let derived = adapt(&model).unwrap();
/// let names: Vec<_> = derived.fields().map(|(name, _)| name).collect();
/// assert_eq!(names, ["nbr", "nbrPlus", "nbrRate", "str", "strPlus", "script"]);
///
/// assert_eq!(adapt(&derived).unwrap(), derived);
/// assert!(!model.is_adapted());
/// ```
pub fn adapt(model: &Model) -> Result<Model, TagError> {
    if model.is_adapted() {
        return Ok(model.clone());
    }
    model.validate("")?;
    Ok(adapt_level(model))
}

fn adapt_level(model: &Model) -> Model {
    let mut fields = Vec::with_capacity(model.len() * 3);
    for (name, desc) in model.fields() {
        match (&desc.fields, desc.kind) {
            (Some(nested), FieldKind::Structure) => {
                let mut adapted = desc.clone();
                adapted.fields = Some(adapt_level(nested));
                fields.push((name.to_string(), adapted));
            }
            (_, kind) => {
                fields.push((name.to_string(), desc.clone()));
                for &channel in kind.channels() {
                    let mut derived = FieldDescriptor::new(kind);
                    derived.channel = Some(channel);
                    fields.push((format!("{name}{}", channel.suffix()), derived));
                }
            }
        }
    }
    Model::adapted_from(fields)
}

/// An adapted model together with its path index.
///
/// Immutable once built and shared between every resolution context
/// that uses the same model.
#[derive(Debug, Clone)]
pub struct DerivedSchema {
    model: Model,
    index: PathIndex,
}

impl DerivedSchema {
    /// Adapt `model` and index the result.
    pub fn build(model: &Model) -> Result<Self, TagError> {
        let model = adapt(model)?;
        let index = PathIndex::build(&model)?;
        tracing::debug!(fields = index.len(), "derived schema built");
        Ok(Self { model, index })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn index(&self) -> &PathIndex {
        &self.index
    }

    /// Validate `path` and return its index entry.
    pub fn entry(&self, path: &FieldPath) -> Result<&IndexEntry, TagError> {
        self.index.entry(path)
    }

    /// Value used when no source contributes a field.
    ///
    /// The explicit default wins; otherwise numbers default to `0`,
    /// textual kinds to `""`, maps to `{}` and structures to a map of
    /// their own fields' defaults.
    ///
    /// ```rust
    /// use zztag::model::{FieldDescriptor, Model};
    /// use zztag::schema::DerivedSchema;
    /// use zztag::FieldPath;
    /// use serde_json::json;
    ///
    /// let model = Model::new().field(
    ///     "my_tag",
    ///     FieldDescriptor::structure(
    ///         Model::new()
    ///             .field("nbr", FieldDescriptor::number().with_default(5))
    ///             .field("obj", FieldDescriptor::map()),
    ///     ),
    /// );
    /// let schema = DerivedSchema::build(&model).unwrap();
    /// let value = schema.default_value(&FieldPath::parse("my_tag")).unwrap();
    /// assert_eq!(value, json!({ "nbr": 5, "obj": {} }));
    /// ```
    pub fn default_value(&self, path: &FieldPath) -> Result<Value, TagError> {
        let entry = self.index.entry(path)?;
        if let Some(default) = &entry.default {
            return Ok(default.clone());
        }
        let value = match entry.kind {
            FieldKind::Number => Value::from(0),
            FieldKind::String | FieldKind::List | FieldKind::Text | FieldKind::Code => {
                Value::String(String::new())
            }
            FieldKind::Map => Value::Object(Map::new()),
            FieldKind::Structure => {
                let mut fields = Map::new();
                for child in self.index.children(path)? {
                    if child.channel.is_none() {
                        fields.insert(child.id.clone(), self.default_value(&child.field_path)?);
                    }
                }
                Value::Object(fields)
            }
        };
        Ok(value)
    }
}

/// Memo of derived schemas keyed by model identity.
///
/// A model shared through one `Arc` is adapted exactly once; entries are
/// dropped once the model itself is gone.
#[derive(Debug, Default)]
pub struct SchemaCache {
    schemas: Mutex<HashMap<usize, (Weak<Model>, Arc<DerivedSchema>)>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the derived schema of `model`, adapting it on first use.
    pub fn get_or_adapt(&self, model: &Arc<Model>) -> Result<Arc<DerivedSchema>, TagError> {
        let key = Arc::as_ptr(model) as usize;
        let mut schemas = self.schemas.lock().unwrap_or_else(|e| e.into_inner());
        schemas.retain(|_, (owner, _)| owner.strong_count() > 0);

        if let Some((_, schema)) = schemas.get(&key) {
            return Ok(schema.clone());
        }

        let schema = Arc::new(DerivedSchema::build(model)?);
        schemas.insert(key, (Arc::downgrade(model), schema.clone()));
        Ok(schema)
    }

    pub fn len(&self) -> usize {
        self.schemas.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Channel;

    fn test_model() -> Model {
        Model::new().field(
            "my_tag",
            FieldDescriptor::structure(
                Model::new()
                    .field("nbr", FieldDescriptor::number())
                    .field("str", FieldDescriptor::string())
                    .field("list", FieldDescriptor::list())
                    .field("obj", FieldDescriptor::map()),
            ),
        )
    }

    #[test]
    fn test_adapt_nested_structure() {
        let derived = adapt(&test_model()).unwrap();
        let nested = derived.get("my_tag").unwrap().fields.as_ref().unwrap();
        let names: Vec<_> = nested.fields().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            ["nbr", "nbrPlus", "nbrRate", "str", "strPlus", "list", "listPlus", "obj", "objPlus", "objRate"]
        );
        assert_eq!(nested.get("objRate").unwrap().kind, FieldKind::Map);
        assert_eq!(nested.get("nbrPlus").unwrap().channel, Some(Channel::Plus));
        assert!(derived.get("my_tagPlus").is_none());
    }

    #[test]
    fn test_adapt_is_idempotent() {
        let once = adapt(&test_model()).unwrap();
        let twice = adapt(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_adapt_does_not_touch_input() {
        let model = test_model();
        let before = model.clone();
        let _ = adapt(&model).unwrap();
        assert_eq!(model, before);
        assert!(!model.is_adapted());
    }

    #[test]
    fn test_adapt_rejects_collision_at_adaptation_time() {
        let model = Model::new()
            .field("str", FieldDescriptor::string())
            .field("strPlus", FieldDescriptor::string());
        assert!(matches!(adapt(&model), Err(TagError::InvalidModel { .. })));
    }

    #[test]
    fn test_schema_cache_by_identity() {
        let cache = SchemaCache::new();
        let model = Arc::new(test_model());

        let first = cache.get_or_adapt(&model).unwrap();
        let second = cache.get_or_adapt(&model).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let other = Arc::new(test_model());
        let third = cache.get_or_adapt(&other).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(cache.len(), 2);

        drop(model);
        let _ = cache.get_or_adapt(&other).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_schema_cache_after_poisoned_lock() {
        let cache = Arc::new(SchemaCache::new());
        let model = Arc::new(test_model());
        let first = cache.get_or_adapt(&model).unwrap();

        let holder = cache.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.schemas.lock().unwrap();
            panic!("panicked while holding the cache lock");
        })
        .join();

        assert!(cache.schemas.is_poisoned());
        assert_eq!(cache.len(), 1);
        assert!(!cache.is_empty());
        assert!(Arc::ptr_eq(&first, &cache.get_or_adapt(&model).unwrap()));
    }

    #[test]
    fn test_default_values_by_kind() {
        let schema = DerivedSchema::build(&test_model()).unwrap();
        let value = schema.default_value(&FieldPath::parse("my_tag")).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "nbr": 0, "str": "", "list": "", "obj": {} })
        );
    }
}
