//! Template repository interface.
//!
//! The template repository turns a source's raw note into structured
//! values. It is the only component that knows the note syntax, and the
//! only one allowed to evaluate script-valued fields (through a
//! [`ScriptEngine`] supplied by the host).

use crate::context::TagContext;
use crate::error::TagError;
use crate::model::FieldKind;
use crate::path::FieldPath;
use crate::source::Source;
use async_trait::async_trait;
use serde_json::Value;

/// One field requested from one source.
#[derive(Debug, Clone, Copy)]
pub struct FieldQuery<'a> {
    /// Path of the requested field (derived fields included, e.g. `my_tag.nbrPlus`).
    pub path: &'a FieldPath,
    /// Declared kind of the requested field.
    pub kind: FieldKind,
    /// One context per path segment; may be shorter than the path.
    pub contexts: &'a [TagContext],
}

impl<'a> FieldQuery<'a> {
    pub fn new(path: &'a FieldPath, kind: FieldKind, contexts: &'a [TagContext]) -> Self {
        Self { path, kind, contexts }
    }

    /// Context attached to the segment at `depth`, if any.
    pub fn context(&self, depth: usize) -> Option<&'a TagContext> {
        self.contexts.get(depth)
    }

    /// Context attached to the requested field itself.
    pub fn field_context(&self) -> Option<&'a TagContext> {
        self.path
            .segments()
            .len()
            .checked_sub(1)
            .and_then(|depth| self.context(depth))
    }
}

/// Interprets raw notes into structured values.
///
/// `interpret` is called once per (source, field) pair during a
/// resolution. It returns `Ok(None)` when the source does not define the
/// field, and any value tree shaped like the field's kind otherwise:
/// numbers or numeric strings for `number`, strings for textual kinds,
/// arrays for `list`, objects for `map`.
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    async fn interpret(&self, source: &Source, query: &FieldQuery<'_>) -> Result<Option<Value>, TagError>;

    /// Whether an interpreted value counts as present.
    fn exists(&self, value: &Value) -> bool {
        !value.is_null()
    }
}

/// Evaluates script-valued fields on behalf of a template repository.
#[async_trait]
pub trait ScriptEngine: Send + Sync {
    async fn evaluate(&self, code: &str, context: &TagContext) -> Result<Value, TagError>;
}
