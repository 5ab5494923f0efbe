//! Author-supplied models.
//!
//! A [`Model`] is an ordered mapping from field name to [`FieldDescriptor`].
//! Models are plain data: build them in code or load them from JSON.
//! They are never mutated by the engine; see [`crate::schema::adapt`].

use crate::error::TagError;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

/// Name reserved for awaitable chaining; never a valid field name.
pub const RESERVED_FIELD: &str = "then";

/// Declared type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Number,
    String,
    List,
    Text,
    Map,
    Structure,
    Code,
}

impl FieldKind {
    /// Modifier channels the schema adapter derives for this kind.
    ///
    /// ```rust
    /// use zztag::model::{Channel, FieldKind};
    ///
    /// assert_eq!(FieldKind::Number.channels(), &[Channel::Plus, Channel::Rate]);
    /// assert_eq!(FieldKind::Text.channels(), &[Channel::Plus]);
    /// assert!(FieldKind::Code.channels().is_empty());
    /// ```
    pub fn channels(self) -> &'static [Channel] {
        match self {
            FieldKind::Number | FieldKind::Map => &[Channel::Plus, Channel::Rate],
            FieldKind::String | FieldKind::List | FieldKind::Text => &[Channel::Plus],
            FieldKind::Structure | FieldKind::Code => &[],
        }
    }

    pub fn is_leaf(self) -> bool {
        self != FieldKind::Structure
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Number => "number",
            FieldKind::String => "string",
            FieldKind::List => "list",
            FieldKind::Text => "text",
            FieldKind::Map => "map",
            FieldKind::Structure => "structure",
            FieldKind::Code => "code",
        };
        f.write_str(name)
    }
}

/// Synthetic modifier channel attached to a base field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Additive channel (`<field>Plus`, written `<field>+:` in notes).
    Plus,
    /// Percentage channel (`<field>Rate`, written `<field>%:` in notes).
    Rate,
}

impl Channel {
    pub fn suffix(self) -> &'static str {
        match self {
            Channel::Plus => "Plus",
            Channel::Rate => "Rate",
        }
    }
}

/// Type, default and nested fields of one model entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    #[serde(rename = "type")]
    pub kind: FieldKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Nested model, structures only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Model>,

    /// Set on fields derived by the schema adapter.
    #[serde(skip)]
    pub channel: Option<Channel>,
}

impl FieldDescriptor {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            default: None,
            fields: None,
            channel: None,
        }
    }

    pub fn number() -> Self {
        Self::new(FieldKind::Number)
    }

    pub fn string() -> Self {
        Self::new(FieldKind::String)
    }

    pub fn list() -> Self {
        Self::new(FieldKind::List)
    }

    pub fn text() -> Self {
        Self::new(FieldKind::Text)
    }

    pub fn map() -> Self {
        Self::new(FieldKind::Map)
    }

    pub fn code() -> Self {
        Self::new(FieldKind::Code)
    }

    pub fn structure(fields: Model) -> Self {
        Self {
            fields: Some(fields),
            ..Self::new(FieldKind::Structure)
        }
    }

    /// Attach an explicit default value.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Ordered mapping from field name to descriptor.
///
/// # Examples
///
/// ```rust
/// use zztag::model::{FieldDescriptor, Model};
///
/// let model = Model::new().field(
///     "my_tag",
///     FieldDescriptor::structure(
///         Model::new()
///             .field("nbr", FieldDescriptor::number())
///             .field("str", FieldDescriptor::string()),
///     ),
/// );
///
/// let loaded = Model::from_json(r#"{
///     "my_tag": { "type": "structure", "fields": {
///         "nbr": { "type": "number" },
///         "str": { "type": "string" }
///     } }
/// }"#).unwrap();
///
/// assert_eq!(model, loaded);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    fields: Vec<(String, FieldDescriptor)>,
    adapted: bool,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field, keeping declaration order.
    pub fn field(mut self, name: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        self.fields.push((name.into(), descriptor));
        self
    }

    /// Parse a model from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, TagError> {
        serde_json::from_str(json).map_err(|e| TagError::invalid_model("<model>", e.to_string()))
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldDescriptor)> {
        self.fields.iter().map(|(name, desc)| (name.as_str(), desc))
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, desc)| desc)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether this model was produced by the schema adapter.
    pub fn is_adapted(&self) -> bool {
        self.adapted
    }

    pub(crate) fn adapted_from(fields: Vec<(String, FieldDescriptor)>) -> Self {
        Self {
            fields,
            adapted: true,
        }
    }

    /// Check every descriptor of this model level and all nested levels.
    pub(crate) fn validate(&self, parent: &str) -> Result<(), TagError> {
        let mut seen = HashSet::new();
        for (name, desc) in &self.fields {
            let qualified = if parent.is_empty() {
                name.clone()
            } else {
                format!("{parent}.{name}")
            };

            if name.is_empty() || name.contains('.') || name.chars().any(char::is_whitespace) {
                return Err(TagError::invalid_model(qualified, "field names must be non-empty, without dots or whitespace"));
            }
            if name == RESERVED_FIELD {
                return Err(TagError::invalid_model(qualified, "`then` is a reserved name"));
            }
            if !seen.insert(name.as_str()) {
                return Err(TagError::invalid_model(qualified, "declared twice"));
            }

            match (desc.kind, &desc.fields) {
                (FieldKind::Structure, None) => {
                    return Err(TagError::invalid_model(qualified, "structure without fields"));
                }
                (FieldKind::Structure, Some(nested)) => nested.validate(&qualified)?,
                (kind, Some(_)) => {
                    return Err(TagError::invalid_model(qualified, format!("a {kind} field cannot declare nested fields")));
                }
                (_, None) => {}
            }

            if let Some(default) = &desc.default {
                let valid = match desc.kind {
                    FieldKind::Number => crate::numeric::to_number(default).is_some(),
                    FieldKind::Map | FieldKind::Structure => default.is_object(),
                    _ => true,
                };
                if !valid {
                    return Err(TagError::invalid_model(qualified, format!("default {default} is not a valid {}", desc.kind)));
                }
            }

            for channel in desc.kind.channels() {
                let derived = format!("{name}{}", channel.suffix());
                if self.get(&derived).is_some() {
                    return Err(TagError::invalid_model(
                        format!("{qualified}{}", channel.suffix()),
                        format!("collides with the {} channel derived from `{name}`", channel.suffix()),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl Serialize for Model {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, desc) in &self.fields {
            map.serialize_entry(name, desc)?;
        }
        map.end()
    }
}

struct ModelVisitor;

impl<'de> Visitor<'de> for ModelVisitor {
    type Value = Model;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of field names to field descriptors")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Model, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut fields = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((name, desc)) = access.next_entry::<String, FieldDescriptor>()? {
            fields.push((name, desc));
        }
        Ok(Model {
            fields,
            adapted: false,
        })
    }
}

impl<'de> Deserialize<'de> for Model {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(ModelVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_keeps_declaration_order() {
        let model = Model::from_json(
            r#"{ "zeta": { "type": "number" }, "alpha": { "type": "string", "default": "x" } }"#,
        )
        .unwrap();
        let names: Vec<_> = model.fields().map(|(name, _)| name).collect();
        assert_eq!(names, ["zeta", "alpha"]);
        assert_eq!(model.get("alpha").unwrap().default, Some(Value::from("x")));
    }

    #[test]
    fn test_unknown_type_is_invalid_model() {
        let err = Model::from_json(r#"{ "nbr": { "type": "float" } }"#).unwrap_err();
        assert!(matches!(err, TagError::InvalidModel { .. }));
    }

    #[test]
    fn test_validate_rejects_structure_without_fields() {
        let model = Model::new().field("tag", FieldDescriptor::new(FieldKind::Structure));
        assert!(matches!(model.validate(""), Err(TagError::InvalidModel { .. })));
    }

    #[test]
    fn test_validate_rejects_channel_collision() {
        let model = Model::new()
            .field("nbr", FieldDescriptor::number())
            .field("nbrRate", FieldDescriptor::number());
        match model.validate("") {
            Err(TagError::InvalidModel { field, .. }) => assert_eq!(field, "nbrRate"),
            other => panic!("expected InvalidModel, got {other:?}"),
        }
    }

    #[test]
    fn test_plus_suffix_allowed_on_code_fields() {
        // code fields derive no channel, so `scriptPlus` is an ordinary field
        let model = Model::new()
            .field("script", FieldDescriptor::code())
            .field("scriptPlus", FieldDescriptor::string());
        assert!(model.validate("").is_ok());
    }

    #[test]
    fn test_validate_rejects_reserved_and_bad_defaults() {
        let reserved = Model::new().field("then", FieldDescriptor::string());
        assert!(reserved.validate("").is_err());

        let bad_default = Model::new().field("nbr", FieldDescriptor::number().with_default("ten"));
        assert!(bad_default.validate("").is_err());

        let nested_leaf = Model::new().field(
            "tag",
            FieldDescriptor::structure(Model::new().field("a.b", FieldDescriptor::number())),
        );
        match nested_leaf.validate("") {
            Err(TagError::InvalidModel { field, .. }) => assert_eq!(field, "tag.a.b"),
            other => panic!("expected InvalidModel, got {other:?}"),
        }
    }
}
