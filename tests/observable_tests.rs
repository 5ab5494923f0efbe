mod common;

use common::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use zztag::model::{FieldDescriptor, Model};
use zztag::note::NoteRepository;
use zztag::source::{Battler, Source};
use zztag::*;

/// Watching the reference number while a modifier state is added.
#[tokio::test]
async fn test_observable_fires_on_new_modifier() {
    let (_registry, actor, tags) = setup();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();

    let observable = tags.observable("my_tag.nbr", 1995.0).unwrap();
    observable
        .on_get_context(|name| if name == "nbr" { ctx_a() } else { TagContext::new() })
        .on_change(move |_, before, after| {
            sink.lock().unwrap().push((before.clone(), after.clone()));
        });

    assert!(!observable.check().await.unwrap());

    actor.add_state(Source::state("Rage", "<my_tag>\nnbr+: 500\n</my_tag>"));
    assert_eq!(tags.check_observables().await.unwrap(), 1);

    // (600 + 65 + 500) * (1 + 200 * 0.01)
    let seen = seen.lock().unwrap();
    assert_eq!(*seen, vec![(TagValue::from(1995), TagValue::from(3495))]);
}

#[tokio::test]
async fn test_refresh_without_change() {
    let (_registry, _actor, tags) = setup();
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();

    tags.observable("my_tag.str", "hello,world,world")
        .unwrap()
        .on_change(move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

    assert_eq!(tags.check_observables().await.unwrap(), 0);
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failing_observable_counts_as_unchanged() {
    let (_registry, actor, tags) = setup();

    // no context provider: the nbr script cannot evaluate
    tags.observable("my_tag.nbr", 0.0).unwrap();
    tags.observable("my_tag.list", "10").unwrap();

    actor.add_state(Source::state("Gift", "<my_tag>\nlist+: 20\n</my_tag>"));
    assert_eq!(tags.check_observables().await.unwrap(), 1);
}

#[tokio::test]
async fn test_observe_any_still_resolves_when_a_child_fails() {
    let (_registry, actor, tags) = setup();
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();

    let broken = tags.observable("my_tag.nbr", 0.0).unwrap();
    let list = tags.observable("my_tag.list", "10").unwrap();
    let bulk = tags.observe_any(vec![broken as Arc<dyn Observe>, list], move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    // nothing changed, one child failed
    assert!(bulk.check().await.is_err());

    actor.add_state(Source::state("Gift", "<my_tag>\nlist+: 20\n</my_tag>"));
    assert!(bulk.check().await.unwrap());
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_observe_all_fires_after_every_child() {
    let (_registry, _actor, tags) = setup();
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();

    let str = tags.observable("my_tag.str", "hello,world,world").unwrap();
    let list = tags.observable("my_tag.list", "10").unwrap();
    let bulk = tags.observe_all(vec![str.clone() as Arc<dyn Observe>, list.clone()], move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    // no child changed, the bulk observable still reports a change
    assert!(bulk.check().await.unwrap());
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(str.last_value(), TagValue::from("hello,world,world"));
}

#[tokio::test]
async fn test_nested_bulk_observables() {
    let (_registry, actor, tags) = setup();
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();

    let str = tags.observable("my_tag.str", "hello,world,world").unwrap();
    let list = tags.observable("my_tag.list", "10").unwrap();
    let inner = tags.observe_any(vec![str as Arc<dyn Observe>], |_| {});
    let outer = tags.observe_any(vec![inner as Arc<dyn Observe>, list], move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(tags.observable_count(), 1);
    assert!(tags.is_registered(outer.id()));

    actor.add_state(Source::state("Echo", "<my_tag>\nstr+: again\n</my_tag>"));
    assert_eq!(tags.check_observables().await.unwrap(), 1);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_observe_any_from_structure() {
    let model = Arc::new(Model::new().field(
        "stats",
        FieldDescriptor::structure(
            Model::new()
                .field("atk", FieldDescriptor::number())
                .field("def", FieldDescriptor::number())
                .field("tags", FieldDescriptor::list()),
        ),
    ));
    let registry = TagRegistry::new(Arc::new(NoteRepository::new()));
    let actor = Arc::new(Battler::new("Harold", "<stats>\natk: 10\ndef: 5\n</stats>"));
    let tags = registry.resolve(&actor, &model).unwrap();

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    let bulk = tags
        .observe_any_from("stats", |_| TagContext::new(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

    // atk, def and tags; no Plus/Rate channels
    assert_eq!(bulk.children().len(), 3);
    assert!(!bulk.check().await.unwrap());

    actor.equip(Source::equipment("Shield", "<stats>\ndef+: 3\n</stats>"));
    assert!(bulk.check().await.unwrap());
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    assert!(matches!(
        tags.observe_any_from("stats.atk", |_| TagContext::new(), |_| {}).await,
        Err(TagError::NotAStructure { .. })
    ));
}

/// Scripted leaves resolve with the provided per-segment contexts.
#[tokio::test]
async fn test_observe_any_from_with_scripted_leaf() {
    let (_registry, actor, tags) = setup();
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();

    let bulk = tags
        .observe_any_from(
            "my_tag",
            |name| if name == "nbr" { ctx_a() } else { TagContext::new() },
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await
        .unwrap();

    assert_eq!(bulk.children().len(), 4);
    assert_eq!(tags.check_observables().await.unwrap(), 0);

    // (10 + 65) * (1 + 200 * 0.01)
    actor.add_state(overshadowing_state());
    assert_eq!(tags.check_observables().await.unwrap(), 1);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(
        tags.value("my_tag.nbr", &[TagContext::new(), ctx_a()]).await.unwrap(),
        TagValue::from(225)
    );
}

#[tokio::test]
async fn test_dispose_all_and_released_subject() {
    let (registry, actor, tags) = setup();
    let observable = tags.observable("my_tag.list", "10").unwrap();
    assert_eq!(tags.observable_count(), 1);

    tags.dispose_all();
    assert_eq!(tags.observable_count(), 0);
    assert!(observable.is_disposed());

    drop(actor);
    assert!(matches!(tags.check_observables().await, Err(TagError::SubjectReleased)));
    assert_eq!(registry.prune(), 1);
}
