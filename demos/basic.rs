//! Basic example: layered attribute resolution
//!
//! This example demonstrates:
//! - Declaring a model with number, string, list and map fields
//! - Layering notes from states, equipment and the actor itself
//! - Resolving values with `get`, chained access and `collect`

use std::sync::Arc;
use zztag::model::{FieldDescriptor, Model};
use zztag::note::NoteRepository;
use zztag::source::{Battler, Source};
use zztag::*;

#[tokio::main]
async fn main() -> Result<(), TagError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let model = Arc::new(Model::new().field(
        "battle",
        FieldDescriptor::structure(
            Model::new()
                .field("atk", FieldDescriptor::number().with_default(10))
                .field("title", FieldDescriptor::string())
                .field("skills", FieldDescriptor::list())
                .field("resist", FieldDescriptor::map()),
        ),
    ));

    let actor = Arc::new(Battler::new(
        "Harold",
        "<battle>
        atk: 50
        title: Hero
        skills: Slash, Guard
        resist(fire): 10
        </battle>",
    ));
    println!("Actor note: atk 50, skills Slash/Guard, fire resist 10");

    actor.set_class(Some(Source::class(
        "Warrior",
        "<battle>\natk+: 20\nresist(ice)+: 5\n</battle>",
    )));
    println!("  - Class Warrior: atk +20, ice resist +5");

    actor.equip(Source::equipment(
        "Flame Sword",
        "<battle>\natk%: 25\nskills+: Flame Slash\nresist(fire)%: 50\n</battle>",
    ));
    println!("  - Flame Sword: atk +25%, skill Flame Slash, fire resist +50%");

    actor.add_state(Source::state("Cursed", "<battle>\ntitle: Corrupted\n</battle>"));
    println!("  - State Cursed: title Corrupted");

    let registry = TagRegistry::new(Arc::new(NoteRepository::new()));
    let tags = registry.resolve(&actor, &model)?;

    println!("\n=== Resolved Values ===");
    let atk = tags.value("battle.atk", &[]).await?;
    println!("atk: {atk}  ((50 + 20) * (1 + 25%))");

    let battle = tags.getter().scope("battle", TagContext::new())?;
    println!("title: {}", battle.value("title", TagContext::new()).await?);
    println!("skills: {}", battle.value("skills", TagContext::new()).await?);
    println!("resist: {}", battle.value("resist", TagContext::new()).await?);

    println!("\n=== Contributors ===");
    if let Some(titles) = tags.collect("battle.title", &[]).await?.into_values() {
        println!("title, highest priority first: {titles:?}");
    }

    actor.remove_state("Cursed");
    println!("\nCursed removed, title: {}", tags.value("battle.title", &[]).await?);

    match tags.get("battle.gold", &[]).await {
        Err(err) => println!("\nUnknown field: {err}"),
        Ok(_) => println!("\nUnexpected gold field"),
    }

    Ok(())
}
