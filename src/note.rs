//! Notetag template repository.
//!
//! Interprets notes written in the notetag syntax:
//!
//! ```text
//! <my_tag>
//! <!nbr>
//! return 500 + context.a;
//! </nbr>
//! nbr+: 65
//! nbr%: 200
//! str: hello
//! obj(b): 20
//! obj(a)+: 100
//! <bio>
//! I am a simple adventurer.
//! </bio>
//! </my_tag>
//! ```
//!
//! * `<name> ... </name>` opens a structure, or holds the body of a text field.
//! * `<!name> ... </name>` holds a script, evaluated by the host's [`ScriptEngine`].
//! * `name: value` sets a number, string, list (comma separated) or code field.
//! * `name(key): value` sets one entry of a map field.
//! * `name+:` and `name%:` address the `Plus` and `Rate` channels.
//!
//! Only entries at the top level of the current block are visible; a
//! field nested in another structure never leaks upward.

use crate::context::TagContext;
use crate::error::TagError;
use crate::model::{Channel, FieldKind};
use crate::numeric::{number_value, split_list, to_number};
use crate::source::Source;
use crate::template::{FieldQuery, ScriptEngine, TemplateRepository};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Template repository for notetag text.
///
/// # Examples
///
/// ```rust
/// use zztag::note::NoteRepository;
/// use zztag::template::{FieldQuery, TemplateRepository};
/// use zztag::model::FieldKind;
/// use zztag::source::Source;
/// use zztag::FieldPath;
///
/// let repo = NoteRepository::new();
/// let source = Source::equipment("Armor", "<my_tag>\nstorage_size+: 20\n</my_tag>");
/// let path = FieldPath::parse("my_tag.storage_sizePlus");
///
/// let value = futures::executor::block_on(
///     repo.interpret(&source, &FieldQuery::new(&path, FieldKind::Number, &[])),
/// )
/// .unwrap();
/// assert_eq!(value, Some(serde_json::json!(20.0)));
/// ```
#[derive(Clone, Default)]
pub struct NoteRepository {
    scripts: Option<Arc<dyn ScriptEngine>>,
}

impl NoteRepository {
    /// A repository without script support; script fields fail to interpret.
    pub fn new() -> Self {
        Self::default()
    }

    /// A repository delegating script fields to `engine`.
    pub fn with_script_engine(engine: Arc<dyn ScriptEngine>) -> Self {
        Self {
            scripts: Some(engine),
        }
    }

    async fn evaluate(&self, name: &str, code: &str, context: Option<&TagContext>) -> Result<Value, TagError> {
        let engine = self
            .scripts
            .as_ref()
            .ok_or_else(|| TagError::template_msg(format!("no script engine to evaluate <!{name}>")))?;
        let empty = TagContext::new();
        engine.evaluate(code, context.unwrap_or(&empty)).await
    }
}

impl std::fmt::Debug for NoteRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoteRepository")
            .field("scripts", &self.scripts.is_some())
            .finish()
    }
}

#[async_trait]
impl TemplateRepository for NoteRepository {
    async fn interpret(&self, source: &Source, query: &FieldQuery<'_>) -> Result<Option<Value>, TagError> {
        let Some((name, parents)) = query.path.segments().split_last() else {
            return Ok(None);
        };

        let mut body = normalize(source.note());
        for parent in parents {
            let found = tokenize(&body)?.into_iter().find_map(|entry| match entry {
                Entry::Block { name: block, script: false, body } if block == *parent => Some(body),
                _ => None,
            });
            match found {
                Some(inner) => body = inner,
                None => return Ok(None),
            }
        }

        let entries = tokenize(&body)?;

        if query.kind == FieldKind::Map {
            let script = entries.iter().find_map(|entry| match entry {
                Entry::Block { name: block, script: true, body } if block == name => Some(body.clone()),
                _ => None,
            });
            if let Some(code) = script {
                return self.evaluate(name, &code, query.field_context()).await.map(Some);
            }

            let mut map = Map::new();
            for entry in &entries {
                if let Entry::Line { name: line, key: Some(key), value } = entry {
                    if line == name && !value.trim().is_empty() {
                        map.insert(key.clone(), scalar(value));
                    }
                }
            }
            return Ok((!map.is_empty()).then_some(Value::Object(map)));
        }

        for entry in entries {
            match entry {
                Entry::Block { name: block, script: true, body } if block == *name => {
                    return self.evaluate(name, &body, query.field_context()).await.map(Some);
                }
                Entry::Block { name: block, script: false, body } if block == *name => {
                    return Ok(Some(match query.kind {
                        FieldKind::Structure => Value::Object(Map::new()),
                        _ => Value::String(body.trim().to_string()),
                    }));
                }
                Entry::Line { name: line, key: None, value } if line == *name => {
                    // an empty line defines nothing; lower sources or the default apply
                    return Ok((!value.trim().is_empty()).then(|| coerce(query.kind, &value)));
                }
                _ => {}
            }
        }
        Ok(None)
    }
}

/// Rewrite modifier lines to their channel names.
///
/// `nbr+: 65` becomes `nbrPlus: 65`, `nbr%: 200` becomes `nbrRate: 200`
/// and `obj(a)+: 100` becomes `objPlus(a): 100`.
///
/// ```rust
/// use zztag::note::normalize;
///
/// assert_eq!(normalize("  nbr+: 65\nnbr%: 200"), "  nbrPlus: 65\nnbrRate: 200");
/// assert_eq!(normalize("obj(a)+: 100"), "objPlus(a): 100");
/// assert_eq!(normalize("str: a+b"), "str: a+b");
/// ```
pub fn normalize(note: &str) -> String {
    note.lines().map(normalize_line).collect::<Vec<_>>().join("\n")
}

fn normalize_line(line: &str) -> String {
    let trimmed = line.trim_start();
    let indent = &line[..line.len() - trimmed.len()];
    let Some(colon) = trimmed.find(':') else {
        return line.to_string();
    };
    let head = &trimmed[..colon];
    if head.len() < 2 || head.chars().any(char::is_whitespace) {
        return line.to_string();
    }

    let channel = match head.chars().last() {
        Some('+') => Channel::Plus,
        Some('%') => Channel::Rate,
        _ => return line.to_string(),
    };
    let word = &head[..head.len() - 1];
    let suffix = channel.suffix();
    let renamed = match split_keyed(word) {
        Some((name, key)) => format!("{name}{suffix}({key})"),
        None => format!("{word}{suffix}"),
    };
    format!("{indent}{renamed}{}", &trimmed[colon..])
}

/// Split `name(key)` into its parts.
fn split_keyed(word: &str) -> Option<(&str, &str)> {
    let open = word.find('(')?;
    let inner = word[open + 1..].strip_suffix(')')?;
    let name = &word[..open];
    (!name.is_empty() && !inner.is_empty()).then_some((name, inner))
}

#[derive(Debug, Clone, PartialEq)]
enum Entry {
    Block { name: String, script: bool, body: String },
    Line { name: String, key: Option<String>, value: String },
}

/// Split a block body into its top-level entries.
fn tokenize(text: &str) -> Result<Vec<Entry>, TagError> {
    let lines: Vec<&str> = text.lines().collect();
    let mut entries = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].trim();
        i += 1;

        if let Some((name, script, rest)) = open_tag(line) {
            let close = format!("</{name}>");
            if let Some(end) = rest.find(&close) {
                entries.push(Entry::Block {
                    name: name.to_string(),
                    script,
                    body: rest[..end].to_string(),
                });
                continue;
            }

            let mut depth = 0usize;
            let mut body: Vec<&str> = if rest.trim().is_empty() { Vec::new() } else { vec![rest] };
            let mut closed = false;
            while i < lines.len() {
                let inner = lines[i];
                i += 1;
                let trimmed = inner.trim();
                if trimmed == close {
                    if depth == 0 {
                        closed = true;
                        break;
                    }
                    depth -= 1;
                } else if matches!(open_tag(trimmed), Some((n, _, r)) if n == name && !r.contains(&close)) {
                    depth += 1;
                }
                body.push(inner);
            }
            if !closed {
                return Err(TagError::template_msg(format!("unclosed block <{name}>")));
            }
            entries.push(Entry::Block {
                name: name.to_string(),
                script,
                body: body.join("\n"),
            });
            continue;
        }

        if let Some(colon) = line.find(':') {
            let head = line[..colon].trim();
            if head.is_empty() || head.chars().any(char::is_whitespace) {
                continue;
            }
            let value = line[colon + 1..].trim().to_string();
            let entry = match split_keyed(head) {
                Some((name, key)) => Entry::Line {
                    name: name.to_string(),
                    key: Some(key.to_string()),
                    value,
                },
                None => Entry::Line {
                    name: head.to_string(),
                    key: None,
                    value,
                },
            };
            entries.push(entry);
        }
    }
    Ok(entries)
}

/// Parse `<name>` or `<!name>` at the start of a line.
fn open_tag(line: &str) -> Option<(&str, bool, &str)> {
    let inner = line.strip_prefix('<')?;
    if inner.starts_with('/') {
        return None;
    }
    let end = inner.find('>')?;
    let tag = &inner[..end];
    let (name, script) = match tag.strip_prefix('!') {
        Some(name) => (name, true),
        None => (tag, false),
    };
    let valid = !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-');
    valid.then_some((name, script, &inner[end + 1..]))
}

fn scalar(value: &str) -> Value {
    match to_number(&Value::String(value.to_string())) {
        Some(n) => number_value(n),
        None => Value::String(value.to_string()),
    }
}

fn coerce(kind: FieldKind, value: &str) -> Value {
    match kind {
        FieldKind::Number => scalar(value),
        FieldKind::List => Value::Array(split_list(value).into_iter().map(Value::String).collect()),
        _ => Value::String(value.to_string()),
    }
}
