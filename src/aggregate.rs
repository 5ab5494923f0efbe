//! Value aggregation module.
//!
//! Pure combination rules, one per field kind. Each rule receives the
//! main value selected from the priority chain and the modifier values
//! collected from the *whole* chain, and produces the resolved value.
//!
//! | kind                   | rule                                              |
//! |------------------------|---------------------------------------------------|
//! | `number`               | `(main + Σplus) * (1 + Σrate * 0.01)`             |
//! | `string` `list` `text` | `join(",", non-empty([main, ...plus]))`           |
//! | `map`                  | per key, see [`aggregate_map`]                    |
//! | `code`                 | main value, untouched                             |

use crate::error::TagError;
use crate::model::FieldKind;
use crate::numeric::{format_number, text_parts, to_number, RATE_SCALE};
use crate::path::FieldPath;
use crate::resolved::{MapEntry, TagValue};
use serde_json::Value;
use std::collections::BTreeMap;

/// Raw values gathered for one field across the priority chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contributions {
    /// Main value of the highest-priority source defining it, or the default.
    pub main: Value,
    /// Every main value in priority order (maps merge all of them).
    pub mains: Vec<Value>,
    pub plus: Vec<Value>,
    pub rate: Vec<Value>,
}

/// Combine the contributions of a leaf field.
///
/// # Examples
///
/// ```rust
/// use zztag::aggregate::{aggregate, Contributions};
/// use zztag::model::FieldKind;
/// use zztag::FieldPath;
/// use serde_json::json;
///
/// let path = FieldPath::parse("my_tag.nbr");
/// let contributions = Contributions {
///     main: json!(600),
///     plus: vec![json!(65)],
///     rate: vec![json!(200)],
///     ..Default::default()
/// };
///
/// let value = aggregate(FieldKind::Number, &path, &contributions).unwrap();
/// assert_eq!(value.as_number(), Some(1995.0));
/// ```
pub fn aggregate(kind: FieldKind, path: &FieldPath, contributions: &Contributions) -> Result<TagValue, TagError> {
    match kind {
        FieldKind::Number => {
            aggregate_number(path, &contributions.main, &contributions.plus, &contributions.rate).map(TagValue::Number)
        }
        FieldKind::String | FieldKind::List | FieldKind::Text => {
            Ok(TagValue::Text(aggregate_text(&contributions.main, &contributions.plus)))
        }
        FieldKind::Map => {
            aggregate_map(path, &contributions.mains, &contributions.plus, &contributions.rate).map(TagValue::Map)
        }
        FieldKind::Code => Ok(TagValue::Code(contributions.main.clone())),
        FieldKind::Structure => Err(TagError::NotALeaf { path: path.dotted() }),
    }
}

/// `(main + Σplus) * (1 + Σrate * 0.01)`.
///
/// Every contribution must be numeric; anything else is reported as
/// `InvalidValue` for the offending field.
pub fn aggregate_number(path: &FieldPath, main: &Value, plus: &[Value], rate: &[Value]) -> Result<f64, TagError> {
    let main = number_of(path, main)?;
    let plus_sum = sum(&path.sibling_with_suffix("Plus"), plus)?;
    let rate_sum = sum(&path.sibling_with_suffix("Rate"), rate)?;
    Ok((main + plus_sum) * (1.0 + rate_sum * RATE_SCALE))
}

fn number_of(path: &FieldPath, value: &Value) -> Result<f64, TagError> {
    to_number(value).ok_or_else(|| TagError::InvalidValue {
        path: path.dotted(),
        value: value.to_string(),
    })
}

fn sum(path: &FieldPath, values: &[Value]) -> Result<f64, TagError> {
    values.iter().try_fold(0.0, |acc, v| Ok(acc + number_of(path, v)?))
}

/// Concatenate the main value and every plus value as a comma list.
///
/// ```rust
/// use zztag::aggregate::aggregate_text;
/// use serde_json::json;
///
/// let joined = aggregate_text(&json!("hello"), &[json!("world"), json!("world")]);
/// assert_eq!(joined, "hello,world,world");
///
/// assert_eq!(aggregate_text(&json!(""), &[json!(["10"])]), "10");
/// ```
pub fn aggregate_text(main: &Value, plus: &[Value]) -> String {
    std::iter::once(main)
        .chain(plus)
        .flat_map(text_parts)
        .collect::<Vec<_>>()
        .join(",")
}

/// Per-key accumulator of a modifier channel.
#[derive(Debug, Clone, PartialEq)]
enum Merged {
    Sum(f64),
    List(Vec<String>),
}

impl Merged {
    fn push(&mut self, value: &Value) {
        let number = to_number(value);
        let promoted = match (&mut *self, number) {
            (Merged::Sum(total), Some(n)) => {
                *total += n;
                None
            }
            (Merged::Sum(total), None) => {
                let mut parts = if *total == 0.0 {
                    Vec::new()
                } else {
                    vec![format_number(*total)]
                };
                parts.extend(text_parts(value));
                Some(parts)
            }
            (Merged::List(parts), Some(n)) => {
                parts.push(format_number(n));
                None
            }
            (Merged::List(parts), None) => {
                parts.extend(text_parts(value));
                None
            }
        };
        if let Some(parts) = promoted {
            *self = Merged::List(parts);
        }
    }

    fn start(value: &Value) -> Self {
        match to_number(value) {
            Some(n) => Merged::Sum(n),
            None => Merged::List(text_parts(value)),
        }
    }

    fn number(&self) -> Option<f64> {
        match self {
            Merged::Sum(n) => Some(*n),
            Merged::List(_) => None,
        }
    }
}

fn objects<'a>(path: &FieldPath, values: &'a [Value]) -> Result<Vec<&'a serde_json::Map<String, Value>>, TagError> {
    values
        .iter()
        .map(|value| {
            value.as_object().ok_or_else(|| TagError::InvalidValue {
                path: path.dotted(),
                value: value.to_string(),
            })
        })
        .collect()
}

fn merge_channel(path: &FieldPath, values: &[Value]) -> Result<BTreeMap<String, Merged>, TagError> {
    let mut merged: BTreeMap<String, Merged> = BTreeMap::new();
    for map in objects(path, values)? {
        for (key, value) in map {
            match merged.get_mut(key) {
                Some(channel) => channel.push(value),
                None => {
                    merged.insert(key.clone(), Merged::start(value));
                }
            }
        }
    }
    Ok(merged)
}

/// Merge the base, plus and rate maps of a map field.
///
/// * base: the first source (highest priority) defining a key wins.
/// * plus / rate: numeric values are summed per key, anything else is
///   concatenated as a comma list.
/// * result: a key with any numeric part resolves to
///   `(base + plus) * (1 + rate * 0.01)` (non-numeric parts count as 0);
///   otherwise base and plus are concatenated.
///
/// ```rust
/// use zztag::aggregate::aggregate_map;
/// use zztag::resolved::MapEntry;
/// use zztag::FieldPath;
/// use serde_json::json;
///
/// let path = FieldPath::parse("my_tag.obj");
/// let merged = aggregate_map(
///     &path,
///     &[json!({ "b": 5 }), json!({ "b": 20 })],
///     &[json!({ "a": 100 })],
///     &[],
/// )
/// .unwrap();
///
/// assert_eq!(merged["a"], MapEntry::Number(100.0));
/// assert_eq!(merged["b"], MapEntry::Number(5.0));
/// ```
pub fn aggregate_map(
    path: &FieldPath,
    bases: &[Value],
    plus: &[Value],
    rate: &[Value],
) -> Result<BTreeMap<String, MapEntry>, TagError> {
    let mut base: BTreeMap<String, Value> = BTreeMap::new();
    for map in objects(path, bases)? {
        for (key, value) in map {
            base.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
    let plus = merge_channel(&path.sibling_with_suffix("Plus"), plus)?;
    let rate = merge_channel(&path.sibling_with_suffix("Rate"), rate)?;

    let mut keys: Vec<&String> = base.keys().chain(plus.keys()).chain(rate.keys()).collect();
    keys.sort();
    keys.dedup();

    let mut resolved = BTreeMap::new();
    for key in keys {
        let b = base.get(key);
        let p = plus.get(key);
        let r = rate.get(key);

        let b_num = b.and_then(to_number);
        let p_num = p.and_then(Merged::number);
        let r_num = r.and_then(Merged::number);

        let entry = if b_num.is_some() || p_num.is_some() || r_num.is_some() {
            if b.is_some() && b_num.is_none() {
                tracing::warn!(field = %path, key = %key, "non-numeric base value counted as 0");
            }
            let value = (b_num.unwrap_or(0.0) + p_num.unwrap_or(0.0)) * (1.0 + r_num.unwrap_or(0.0) * RATE_SCALE);
            MapEntry::Number(value)
        } else {
            let mut parts = b.map(text_parts).unwrap_or_default();
            if let Some(Merged::List(extra)) = p {
                parts.extend(extra.iter().cloned());
            }
            MapEntry::Text(parts.join(","))
        };
        resolved.insert(key.clone(), entry);
    }
    Ok(resolved)
}
