#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use zztag::model::{FieldDescriptor, Model};
use zztag::note::NoteRepository;
use zztag::numeric::{number_value, to_number};
use zztag::source::{Battler, Source};
use zztag::template::ScriptEngine;
use zztag::{TagContext, TagError, TagRegistry, TagResult};

/// Evaluates `return <term> + <term> ...;` where a term is a number or `context.<key>`.
pub struct SumEngine;

#[async_trait]
impl ScriptEngine for SumEngine {
    async fn evaluate(&self, code: &str, context: &TagContext) -> Result<Value, TagError> {
        let expr = code
            .trim()
            .strip_prefix("return")
            .map(|rest| rest.trim().trim_end_matches(';'))
            .ok_or_else(|| TagError::template_msg(format!("unsupported script: {code}")))?;

        let mut total = 0.0;
        for term in expr.split('+').map(str::trim) {
            let value = match term.strip_prefix("context.") {
                Some(key) => context.raw(key).and_then(to_number),
                None => to_number(&Value::String(term.to_string())),
            };
            total += value.ok_or_else(|| TagError::template_msg(format!("cannot evaluate {term}")))?;
        }
        Ok(number_value(total))
    }
}

pub const ACTOR_NOTE: &str = "
  <my_tag>
  <!nbr>
  return 500 + context.a;
  </nbr>
  nbr+: 65
  nbr%: 200
  str: hello
  str+: world
  list+: 10
  obj(b): 20
  obj(a)+: 100
  </my_tag>
  ";

pub const STATE_NOTE: &str = "
    <my_tag>
    str+: world
    obj(b): 5
    </my_tag>
    ";

pub fn test_model() -> Arc<Model> {
    Arc::new(Model::new().field(
        "my_tag",
        FieldDescriptor::structure(
            Model::new()
                .field("nbr", FieldDescriptor::number())
                .field("str", FieldDescriptor::string())
                .field("list", FieldDescriptor::list())
                .field("obj", FieldDescriptor::map()),
        ),
    ))
}

pub fn registry() -> TagRegistry {
    TagRegistry::new(Arc::new(NoteRepository::with_script_engine(Arc::new(SumEngine))))
}

/// The reference actor: one state on top of the actor's own note.
pub fn actor() -> Arc<Battler> {
    let actor = Arc::new(Battler::new("Harold", ACTOR_NOTE));
    actor.add_state(Source::state("Poison", STATE_NOTE));
    actor
}

pub fn overshadowing_state() -> Source {
    Source::state("Stone", "<my_tag>\nnbr: 10\n</my_tag>")
}

pub fn ctx_a() -> TagContext {
    TagContext::new().with("a", 100)
}

pub fn setup() -> (TagRegistry, Arc<Battler>, Arc<TagResult>) {
    let registry = registry();
    let actor = actor();
    let tags = registry.resolve(&actor, &test_model()).unwrap();
    (registry, actor, tags)
}
