//! Observers example: reacting to source changes
//!
//! This example demonstrates:
//! - Watching a field with a per-segment context provider
//! - Combining observables with `observe_any` / `observe_all`
//! - Driving checks from the host's refresh hook
//! - Delegating script fields to a host script engine

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use zztag::model::{FieldDescriptor, Model};
use zztag::note::NoteRepository;
use zztag::numeric::{number_value, to_number};
use zztag::source::{Battler, Source};
use zztag::template::ScriptEngine;
use zztag::*;

/// Understands `return <base> * context.<key>;` and nothing else.
struct ScaleEngine;

#[async_trait]
impl ScriptEngine for ScaleEngine {
    async fn evaluate(&self, code: &str, context: &TagContext) -> Result<Value, TagError> {
        let expr = code.trim().trim_start_matches("return").trim().trim_end_matches(';');
        let (base, key) = expr
            .split_once('*')
            .ok_or_else(|| TagError::template_msg(format!("unsupported script: {expr}")))?;
        let base = to_number(&Value::String(base.to_string()));
        let factor = key
            .trim()
            .strip_prefix("context.")
            .and_then(|key| context.raw(key))
            .and_then(to_number);
        match (base, factor) {
            (Some(base), Some(factor)) => Ok(number_value(base * factor)),
            _ => Err(TagError::template_msg(format!("cannot evaluate {expr}"))),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), TagError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let model = Arc::new(Model::new().field(
        "stats",
        FieldDescriptor::structure(
            Model::new()
                .field("mhp", FieldDescriptor::number())
                .field("speed", FieldDescriptor::number())
                .field("element", FieldDescriptor::string()),
        ),
    ));

    let actor = Arc::new(Battler::new(
        "Therese",
        "<stats>
        <!mhp>
        return 100 * context.level;
        </mhp>
        speed: 12
        element: wind
        </stats>",
    ));

    let repository = NoteRepository::with_script_engine(Arc::new(ScaleEngine));
    let registry = TagRegistry::new(Arc::new(repository));
    let tags = registry.resolve(&actor, &model)?;

    let level = TagContext::new().with("level", 5);
    let initial = tags.value("stats.mhp", &[TagContext::new(), level.clone()]).await?;
    println!("mhp at level 5: {initial}");

    let mhp = tags.observable("stats.mhp", initial)?;
    mhp.on_get_context(move |name| if name == "mhp" { level.clone() } else { TagContext::new() })
        .on_change(|_, before, after| println!("  mhp changed: {before} -> {after}"));

    let speed = tags.observable("stats.speed", tags.value("stats.speed", &[]).await?)?;
    speed.on_change(|_, before, after| println!("  speed changed: {before} -> {after}"));

    let element = tags.observable("stats.element", tags.value("stats.element", &[]).await?)?;
    element.on_change(|_, before, after| println!("  element changed: {before} -> {after}"));

    let any = tags.observe_any(vec![speed as Arc<dyn Observe>, element], |_| {
        println!("  [any] speed or element changed")
    });
    println!("registered observables: {}", tags.observable_count());

    println!("\nEquipping Heavy Armor (mhp +20%, speed -4)...");
    actor.equip(Source::equipment("Heavy Armor", "<stats>\nmhp%: 20\nspeed+: -4\n</stats>"));
    let changed = tags.check_observables().await?;
    println!("{changed} observable(s) reported a change");

    println!("\nAdding state Fire Aura (element +fire)...");
    actor.add_state(Source::state("Fire Aura", "<stats>\nelement+: fire\n</stats>"));
    let changed = tags.check_observables().await?;
    println!("{changed} observable(s) reported a change");

    println!("\nChecking everything once more, nothing moved...");
    let all = tags.observe_all(vec![mhp.clone() as Arc<dyn Observe>], |_| {
        println!("  [all] every child was checked")
    });
    all.check().await?;

    any.dispose();
    all.dispose();
    mhp.dispose();
    println!("\nregistered observables after dispose: {}", tags.observable_count());

    Ok(())
}
