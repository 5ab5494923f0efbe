//! Observable subsystem.
//!
//! An observable watches one leaf field of a resolution context. Nothing
//! is polled: `check` re-resolves the field when the host asks, diffs the
//! result against the last known value and notifies on change. Bulk
//! observables combine children under an `any` or `all` strategy and can
//! be nested.

use crate::context::TagContext;
use crate::error::TagError;
use crate::path::FieldPath;
use crate::resolved::TagValue;
use crate::resolver::TagResult;
use async_trait::async_trait;
use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Identifier of an observable, unique within its resolution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObservableId(pub u64);

impl fmt::Display for ObservableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Supplies the context of each path segment, by field name.
pub type ContextProvider = Arc<dyn Fn(&str) -> TagContext + Send + Sync>;

/// Called with the owning context, the previous value and the new value.
pub type ChangeCallback = Arc<dyn Fn(&Arc<TagResult>, &TagValue, &TagValue) + Send + Sync>;

/// Called with the owning context when a bulk observable fires.
pub type BulkCallback = Arc<dyn Fn(&Arc<TagResult>) + Send + Sync>;

/// Anything that can be checked for change and disposed.
#[async_trait]
pub trait Observe: Send + Sync {
    fn id(&self) -> ObservableId;

    /// Re-evaluate and report whether a change occurred.
    ///
    /// A disposed observable is inert and always reports `false`.
    async fn check(&self) -> Result<bool, TagError>;

    /// Stop observing and leave the owning context's registry.
    fn dispose(&self);

    fn is_disposed(&self) -> bool;
}

struct State {
    last: TagValue,
    context_provider: Option<ContextProvider>,
    on_change: Option<ChangeCallback>,
}

/// Watches one leaf field.
///
/// Created through [`TagResult::observable`].
///
/// # Examples
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use zztag::model::{FieldDescriptor, Model};
/// use zztag::note::NoteRepository;
/// use zztag::observable::Observe;
/// use zztag::source::{Battler, Source};
/// use zztag::{TagRegistry, TagValue};
///
/// let model = Arc::new(Model::new().field("nbr", FieldDescriptor::number()));
/// let registry = TagRegistry::new(Arc::new(NoteRepository::new()));
/// let actor = Arc::new(Battler::new("Harold", "nbr: 10"));
/// let tags = registry.resolve(&actor, &model).unwrap();
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = seen.clone();
/// let observable = tags.observable("nbr", 10.0).unwrap();
/// observable.on_change(move |_, before, after| {
///     sink.lock().unwrap().push((before.clone(), after.clone()));
/// });
///
/// futures::executor::block_on(async {
///     assert!(!observable.check().await.unwrap());
///     actor.add_state(Source::state("Berserk", "nbr+: 5"));
///     assert!(observable.check().await.unwrap());
/// });
/// assert_eq!(*seen.lock().unwrap(), [(TagValue::from(10), TagValue::from(15))]);
/// ```
pub struct Observable {
    id: ObservableId,
    path: FieldPath,
    tags: Weak<TagResult>,
    state: Mutex<State>,
    disposed: AtomicBool,
}

impl Observable {
    pub(crate) fn new(id: ObservableId, path: FieldPath, tags: Weak<TagResult>, initial: TagValue) -> Self {
        Self {
            id,
            path,
            tags,
            state: Mutex::new(State {
                last: initial,
                context_provider: None,
                on_change: None,
            }),
            disposed: AtomicBool::new(false),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    /// Value seen by the last check (or the initial value).
    pub fn last_value(&self) -> TagValue {
        self.state().last.clone()
    }

    /// Set the provider of per-segment contexts used by `check`.
    pub fn on_get_context<F>(&self, provider: F) -> &Self
    where
        F: Fn(&str) -> TagContext + Send + Sync + 'static,
    {
        self.state().context_provider = Some(Arc::new(provider));
        self
    }

    /// Set the change callback.
    pub fn on_change<F>(&self, callback: F) -> &Self
    where
        F: Fn(&Arc<TagResult>, &TagValue, &TagValue) + Send + Sync + 'static,
    {
        self.state().on_change = Some(Arc::new(callback));
        self
    }

    fn contexts(&self) -> Vec<TagContext> {
        let provider = self.state().context_provider.clone();
        match provider {
            Some(provider) => self.path.segments().iter().map(|name| provider(name)).collect(),
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl Observe for Observable {
    fn id(&self) -> ObservableId {
        self.id
    }

    async fn check(&self) -> Result<bool, TagError> {
        if self.is_disposed() {
            return Ok(false);
        }
        let tags = self.tags.upgrade().ok_or(TagError::SubjectReleased)?;
        let contexts = self.contexts();
        let after = tags.value(self.path.clone(), &contexts).await?;

        let (before, callback) = {
            let mut state = self.state();
            if state.last == after {
                return Ok(false);
            }
            let before = std::mem::replace(&mut state.last, after.clone());
            (before, state.on_change.clone())
        };

        tracing::debug!(id = %self.id, field = %self.path, %before, %after, "observable changed");
        if let Some(callback) = callback {
            callback(&tags, &before, &after);
        }
        Ok(true)
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(tags) = self.tags.upgrade() {
            tags.unregister(self.id);
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("last", &self.last_value())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Combination strategy of a bulk observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combine {
    /// Fire as soon as one child reports a change.
    Any,
    /// Fire once every child was checked, whatever the outcome.
    All,
}

/// Checks a set of child observables concurrently.
///
/// Created through [`TagResult::observe_any`], [`TagResult::observe_all`]
/// or [`TagResult::observe_any_from`]. Disposing a bulk observable leaves
/// its children untouched.
pub struct BulkObservable {
    id: ObservableId,
    tags: Weak<TagResult>,
    combine: Combine,
    children: Vec<Arc<dyn Observe>>,
    callback: Mutex<BulkCallback>,
    disposed: AtomicBool,
}

impl BulkObservable {
    pub(crate) fn new(
        id: ObservableId,
        tags: Weak<TagResult>,
        combine: Combine,
        children: Vec<Arc<dyn Observe>>,
        callback: BulkCallback,
    ) -> Self {
        Self {
            id,
            tags,
            combine,
            children,
            callback: Mutex::new(callback),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn combine(&self) -> Combine {
        self.combine
    }

    pub fn children(&self) -> &[Arc<dyn Observe>] {
        &self.children
    }

    /// Replace the callback.
    pub fn on_change<F>(&self, callback: F) -> &Self
    where
        F: Fn(&Arc<TagResult>) + Send + Sync + 'static,
    {
        *self.callback.lock().unwrap_or_else(|e| e.into_inner()) = Arc::new(callback);
        self
    }

    fn fire(&self, tags: &Arc<TagResult>) {
        let callback = self.callback.lock().unwrap_or_else(|e| e.into_inner()).clone();
        tracing::debug!(id = %self.id, combine = ?self.combine, "bulk observable fired");
        callback(tags);
    }

    async fn check_any(&self, tags: &Arc<TagResult>) -> Result<bool, TagError> {
        let mut pending: FuturesUnordered<_> = self.children.iter().map(|child| child.check()).collect();
        let mut changed = false;
        let mut failure = None;

        while let Some(result) = pending.next().await {
            match result {
                Ok(true) if !changed => {
                    changed = true;
                    self.fire(tags);
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(id = %self.id, error = %err, "child observable failed");
                    failure.get_or_insert(err);
                }
            }
        }

        match failure {
            Some(err) if !changed => Err(err),
            _ => Ok(changed),
        }
    }

    async fn check_all(&self, tags: &Arc<TagResult>) -> Result<bool, TagError> {
        let results = join_all(self.children.iter().map(|child| child.check())).await;
        for (child, result) in self.children.iter().zip(results) {
            if let Err(err) = result {
                tracing::warn!(id = %self.id, child = %child.id(), error = %err, "child observable failed");
            }
        }
        self.fire(tags);
        Ok(true)
    }
}

#[async_trait]
impl Observe for BulkObservable {
    fn id(&self) -> ObservableId {
        self.id
    }

    async fn check(&self) -> Result<bool, TagError> {
        if self.is_disposed() {
            return Ok(false);
        }
        let tags = self.tags.upgrade().ok_or(TagError::SubjectReleased)?;
        match self.combine {
            Combine::Any => self.check_any(&tags).await,
            Combine::All => self.check_all(&tags).await,
        }
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(tags) = self.tags.upgrade() {
            tags.unregister(self.id);
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for BulkObservable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkObservable")
            .field("id", &self.id)
            .field("combine", &self.combine)
            .field("children", &self.children.iter().map(|c| c.id()).collect::<Vec<_>>())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldDescriptor, Model};
    use crate::note::NoteRepository;
    use crate::schema::DerivedSchema;
    use crate::source::{Battler, Source, Subject};
    use std::sync::atomic::AtomicUsize;

    fn setup(note: &str) -> (Arc<Battler>, Arc<TagResult>) {
        let model = Model::new()
            .field("nbr", FieldDescriptor::number())
            .field("str", FieldDescriptor::string());
        let actor = Arc::new(Battler::new("Harold", note));
        let subject: Arc<dyn Subject> = actor.clone();
        let schema = Arc::new(DerivedSchema::build(&model).unwrap());
        let tags = TagResult::new(&subject, schema, Arc::new(NoteRepository::new()));
        (actor, tags)
    }

    #[tokio::test]
    async fn test_unchanged_value_does_not_fire() {
        let (_actor, tags) = setup("nbr: 5");
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        let observable = tags.observable("nbr", 5.0).unwrap();
        observable.on_change(move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!observable.check().await.unwrap());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_change_fires_once() {
        let (actor, tags) = setup("nbr: 5");
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        let observable = tags.observable("nbr", 5.0).unwrap();
        observable.on_change(move |_, before, after| {
            assert_eq!(before, &TagValue::from(5));
            assert_eq!(after, &TagValue::from(8));
            counter.fetch_add(1, Ordering::SeqCst);
        });

        actor.add_state(Source::state("Bless", "nbr+: 3"));
        assert!(observable.check().await.unwrap());
        assert!(!observable.check().await.unwrap());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(observable.last_value(), TagValue::from(8));
    }

    #[tokio::test]
    async fn test_disposed_is_inert() {
        let (actor, tags) = setup("nbr: 5");
        let observable = tags.observable("nbr", 5.0).unwrap();
        assert!(tags.is_registered(observable.id()));

        observable.dispose();
        assert!(!tags.is_registered(observable.id()));

        actor.set_note("nbr: 6");
        assert!(!observable.check().await.unwrap());
        assert_eq!(observable.last_value(), TagValue::from(5));
    }

    #[tokio::test]
    async fn test_structure_cannot_be_observed() {
        let model = Model::new().field(
            "my_tag",
            FieldDescriptor::structure(Model::new().field("nbr", FieldDescriptor::number())),
        );
        let subject: Arc<dyn Subject> = Arc::new(Battler::new("Harold", ""));
        let schema = Arc::new(DerivedSchema::build(&model).unwrap());
        let tags = TagResult::new(&subject, schema, Arc::new(NoteRepository::new()));

        assert!(matches!(tags.observable("my_tag", 0.0), Err(TagError::NotALeaf { .. })));
        assert!(matches!(tags.observable("my_tag.gold", 0.0), Err(TagError::PathNotFound { .. })));
    }

    #[tokio::test]
    async fn test_any_reports_first_change() {
        let (actor, tags) = setup("nbr: 5\nstr: a");
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        let nbr = tags.observable("nbr", 5.0).unwrap();
        let text = tags.observable("str", "a").unwrap();
        let children: Vec<Arc<dyn Observe>> = vec![nbr.clone(), text.clone()];
        let bulk = tags.observe_any(children, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(tags.observable_count(), 1);
        assert!(!bulk.check().await.unwrap());

        actor.set_note("nbr: 6\nstr: b");
        assert!(bulk.check().await.unwrap());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        // both children were still checked
        assert_eq!(text.last_value(), TagValue::from("b"));
    }

    #[tokio::test]
    async fn test_all_always_fires() {
        let (_actor, tags) = setup("nbr: 5");
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        let nbr = tags.observable("nbr", 5.0).unwrap();
        let bulk = tags.observe_all(vec![nbr as Arc<dyn Observe>], move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(bulk.check().await.unwrap());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bulk_dispose_keeps_children() {
        let (_actor, tags) = setup("nbr: 5");
        let nbr = tags.observable("nbr", 5.0).unwrap();
        let bulk = tags.observe_any(vec![nbr.clone() as Arc<dyn Observe>], |_| {});

        bulk.dispose();
        assert!(bulk.is_disposed());
        assert!(!nbr.is_disposed());
        assert_eq!(tags.observable_count(), 0);
        assert!(!bulk.check().await.unwrap());
    }
}
