//! Resolution context module.
//!
//! Provides the `TagResult` type, which binds one subject to one derived
//! schema. It is the entry point of the access surface: chained
//! (`getter`, `collector`) and flat (`get`, `collect`) accessors, plus
//! the registry of observables watching the subject.

use crate::aggregate::{aggregate, Contributions};
use crate::context::TagContext;
use crate::error::TagError;
use crate::index::IndexEntry;
use crate::model::{Channel, FieldKind};
use crate::observable::{BulkObservable, Combine, ContextProvider, Observable, ObservableId, Observe};
use crate::path::FieldPath;
use crate::resolved::TagValue;
use crate::schema::DerivedSchema;
use crate::source::{source_chain, Source, Subject};
use crate::template::{FieldQuery, TemplateRepository};
use futures::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Outcome of a `get` access.
///
/// Structure fields open a nested scope; leaf fields resolve to a value.
#[derive(Debug, Clone)]
pub enum Resolved {
    Scope(Scope),
    Value(TagValue),
}

impl Resolved {
    pub fn into_value(self) -> Option<TagValue> {
        match self {
            Resolved::Value(value) => Some(value),
            Resolved::Scope(_) => None,
        }
    }

    pub fn into_scope(self) -> Option<Scope> {
        match self {
            Resolved::Scope(scope) => Some(scope),
            Resolved::Value(_) => None,
        }
    }

    pub fn as_value(&self) -> Option<&TagValue> {
        match self {
            Resolved::Value(value) => Some(value),
            Resolved::Scope(_) => None,
        }
    }
}

/// Outcome of a `collect` access.
///
/// Leaf fields yield every raw value contributed along the chain,
/// highest priority first.
#[derive(Debug, Clone)]
pub enum Collected {
    Scope(CollectScope),
    Values(Vec<Value>),
}

impl Collected {
    pub fn into_values(self) -> Option<Vec<Value>> {
        match self {
            Collected::Values(values) => Some(values),
            Collected::Scope(_) => None,
        }
    }

    pub fn into_scope(self) -> Option<CollectScope> {
        match self {
            Collected::Scope(scope) => Some(scope),
            Collected::Values(_) => None,
        }
    }
}

/// Resolution context of one subject under one derived schema.
///
/// Nothing is cached across calls except the context itself: every
/// resolution rebuilds the priority chain and asks the template
/// repository once per (source, field) pair, visiting sources strictly
/// in priority order.
///
/// The subject is held weakly; once it is dropped every resolution fails
/// with `SubjectReleased`.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use zztag::model::{FieldDescriptor, Model};
/// use zztag::note::NoteRepository;
/// use zztag::source::{Battler, Source};
/// use zztag::{TagRegistry, TagValue};
///
/// let model = Arc::new(Model::new().field(
///     "my_tag",
///     FieldDescriptor::structure(Model::new().field("nbr", FieldDescriptor::number())),
/// ));
/// let registry = TagRegistry::new(Arc::new(NoteRepository::new()));
///
/// let actor = Arc::new(Battler::new("Harold", "<my_tag>\nnbr: 40\nnbr+: 10\n</my_tag>"));
/// actor.add_state(Source::state("Haste", "<my_tag>\nnbr%: 50\n</my_tag>"));
///
/// let tags = registry.resolve(&actor, &model).unwrap();
/// let value = futures::executor::block_on(tags.value("my_tag.nbr", &[])).unwrap();
/// assert_eq!(value, TagValue::Number(75.0));
/// ```
pub struct TagResult {
    subject: Weak<dyn Subject>,
    schema: Arc<DerivedSchema>,
    repository: Arc<dyn TemplateRepository>,
    observables: Mutex<HashMap<ObservableId, Arc<dyn Observe>>>,
    next_id: AtomicU64,
}

impl TagResult {
    /// Bind `subject` to `schema`.
    ///
    /// Most callers go through [`TagRegistry::resolve`](crate::TagRegistry::resolve),
    /// which guarantees one context per subject.
    pub fn new(
        subject: &Arc<dyn Subject>,
        schema: Arc<DerivedSchema>,
        repository: Arc<dyn TemplateRepository>,
    ) -> Arc<Self> {
        Arc::new(Self {
            subject: Arc::downgrade(subject),
            schema,
            repository,
            observables: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn schema(&self) -> &Arc<DerivedSchema> {
        &self.schema
    }

    /// Whether the bound subject still exists.
    pub fn is_alive(&self) -> bool {
        self.subject.strong_count() > 0
    }

    /// Root scope of the chained `get` accessor.
    pub fn getter(self: &Arc<Self>) -> Scope {
        Scope {
            tags: self.clone(),
            path: FieldPath::root(),
            contexts: Vec::new(),
        }
    }

    /// Root scope of the chained `collect` accessor.
    pub fn collector(self: &Arc<Self>) -> CollectScope {
        CollectScope {
            tags: self.clone(),
            path: FieldPath::root(),
            contexts: Vec::new(),
        }
    }

    /// Resolve a dotted path, one context per segment.
    ///
    /// Missing trailing contexts count as empty. Every segment is validated
    /// before any source is read.
    ///
    /// # Errors
    ///
    /// * `PathNotFound` if a segment is absent from the schema
    /// * `SubjectReleased` if the subject was dropped
    /// * any template repository failure, unchanged
    pub async fn get(self: &Arc<Self>, path: impl Into<FieldPath>, contexts: &[TagContext]) -> Result<Resolved, TagError> {
        let path = path.into();
        let entry = self.schema.entry(&path)?;
        if entry.kind == FieldKind::Structure {
            let contexts = segment_contexts(&path, contexts);
            return Ok(Resolved::Scope(Scope {
                tags: self.clone(),
                path,
                contexts,
            }));
        }
        self.resolve_leaf(entry, &path, contexts).await.map(Resolved::Value)
    }

    /// Resolve a leaf field to its value.
    ///
    /// Fails with `NotALeaf` on a structure.
    pub async fn value(&self, path: impl Into<FieldPath>, contexts: &[TagContext]) -> Result<TagValue, TagError> {
        let path = path.into();
        let entry = self.schema.entry(&path)?;
        if entry.kind == FieldKind::Structure {
            return Err(TagError::NotALeaf { path: path.dotted() });
        }
        self.resolve_leaf(entry, &path, contexts).await
    }

    /// Every raw value contributed to a leaf field, highest priority first.
    pub async fn collect(
        self: &Arc<Self>,
        path: impl Into<FieldPath>,
        contexts: &[TagContext],
    ) -> Result<Collected, TagError> {
        let path = path.into();
        let entry = self.schema.entry(&path)?;
        if entry.kind == FieldKind::Structure {
            let contexts = segment_contexts(&path, contexts);
            return Ok(Collected::Scope(CollectScope {
                tags: self.clone(),
                path,
                contexts,
            }));
        }
        let chain = self.chain()?;
        let query = FieldQuery::new(&path, entry.kind, contexts);
        self.contributions(&chain, &query, false).await.map(Collected::Values)
    }

    /// Whether any source of the chain defines the field.
    pub async fn exists(&self, path: impl Into<FieldPath>, contexts: &[TagContext]) -> Result<bool, TagError> {
        let path = path.into();
        let entry = self.schema.entry(&path)?;
        let chain = self.chain()?;
        let query = FieldQuery::new(&path, entry.kind, contexts);
        Ok(!self.contributions(&chain, &query, true).await?.is_empty())
    }

    fn chain(&self) -> Result<Vec<Source>, TagError> {
        let subject = self.subject.upgrade().ok_or(TagError::SubjectReleased)?;
        Ok(source_chain(subject.as_ref()))
    }

    /// Ask every source of `chain` for one field, in order.
    ///
    /// With `first_only` the walk stops at the first source defining it.
    async fn contributions(
        &self,
        chain: &[Source],
        query: &FieldQuery<'_>,
        first_only: bool,
    ) -> Result<Vec<Value>, TagError> {
        let mut values = Vec::new();
        for source in chain {
            if let Some(value) = self.repository.interpret(source, query).await? {
                if self.repository.exists(&value) {
                    tracing::trace!(field = %query.path, source = source.name(), "value found");
                    values.push(value);
                    if first_only {
                        break;
                    }
                }
            }
        }
        Ok(values)
    }

    pub(crate) async fn resolve_leaf(
        &self,
        entry: &IndexEntry,
        path: &FieldPath,
        contexts: &[TagContext],
    ) -> Result<TagValue, TagError> {
        let chain = self.chain()?;
        let query = FieldQuery::new(path, entry.kind, contexts);

        // map bases merge across the chain, every other kind stops at the first match
        let mut mains = self.contributions(&chain, &query, entry.kind != FieldKind::Map).await?;
        if mains.is_empty() {
            mains.push(self.schema.default_value(path)?);
        }

        let mut contributions = Contributions {
            main: mains[0].clone(),
            mains,
            ..Contributions::default()
        };

        if entry.channel.is_none() {
            for &channel in entry.kind.channels() {
                let channel_path = path.sibling_with_suffix(channel.suffix());
                let channel_query = FieldQuery::new(&channel_path, entry.kind, contexts);
                let values = self.contributions(&chain, &channel_query, false).await?;
                match channel {
                    Channel::Plus => contributions.plus = values,
                    Channel::Rate => contributions.rate = values,
                }
            }
        }

        let value = aggregate(entry.kind, path, &contributions)?;
        tracing::debug!(field = %path, value = %value, sources = chain.len(), "field resolved");
        Ok(value)
    }

    fn next_id(&self) -> ObservableId {
        ObservableId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn observables(&self) -> MutexGuard<'_, HashMap<ObservableId, Arc<dyn Observe>>> {
        self.observables.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn register(&self, observable: Arc<dyn Observe>) {
        self.observables().insert(observable.id(), observable);
    }

    pub(crate) fn unregister(&self, id: ObservableId) -> bool {
        self.observables().remove(&id).is_some()
    }

    /// Number of observables registered at the top level.
    pub fn observable_count(&self) -> usize {
        self.observables().len()
    }

    pub fn is_registered(&self, id: ObservableId) -> bool {
        self.observables().contains_key(&id)
    }

    /// Watch a leaf field, starting from `initial`.
    ///
    /// The observable is registered immediately and stays registered until
    /// it is disposed.
    ///
    /// # Errors
    ///
    /// `PathNotFound` for an unknown path, `NotALeaf` for a structure.
    pub fn observable(
        self: &Arc<Self>,
        path: impl Into<FieldPath>,
        initial: impl Into<TagValue>,
    ) -> Result<Arc<Observable>, TagError> {
        let observable = self.build_observable(path.into(), initial.into())?;
        self.register(observable.clone());
        Ok(observable)
    }

    fn build_observable(self: &Arc<Self>, path: FieldPath, initial: TagValue) -> Result<Arc<Observable>, TagError> {
        let entry = self.schema.entry(&path)?;
        if entry.kind == FieldKind::Structure {
            return Err(TagError::NotALeaf { path: path.dotted() });
        }
        Ok(Arc::new(Observable::new(self.next_id(), path, Arc::downgrade(self), initial)))
    }

    /// Combine `children` into one observable firing on the first change.
    ///
    /// Children are adopted: they leave the top-level registry and are only
    /// checked through the returned observable.
    pub fn observe_any<F>(self: &Arc<Self>, children: Vec<Arc<dyn Observe>>, callback: F) -> Arc<BulkObservable>
    where
        F: Fn(&Arc<TagResult>) + Send + Sync + 'static,
    {
        self.bulk(Combine::Any, children, callback)
    }

    /// Combine `children` into one observable firing once all of them were checked.
    pub fn observe_all<F>(self: &Arc<Self>, children: Vec<Arc<dyn Observe>>, callback: F) -> Arc<BulkObservable>
    where
        F: Fn(&Arc<TagResult>) + Send + Sync + 'static,
    {
        self.bulk(Combine::All, children, callback)
    }

    fn bulk<F>(self: &Arc<Self>, combine: Combine, children: Vec<Arc<dyn Observe>>, callback: F) -> Arc<BulkObservable>
    where
        F: Fn(&Arc<TagResult>) + Send + Sync + 'static,
    {
        {
            let mut observables = self.observables();
            for child in &children {
                observables.remove(&child.id());
            }
        }
        let bulk = Arc::new(BulkObservable::new(
            self.next_id(),
            Arc::downgrade(self),
            combine,
            children,
            Arc::new(callback),
        ));
        self.register(bulk.clone());
        bulk
    }

    /// Watch every leaf field beneath a structure, firing on the first change.
    ///
    /// Derived `Plus`/`Rate` fields are not watched on their own; they are
    /// part of their base field's value. `provider` supplies the context of
    /// each path segment, both for the initial values and for every check.
    ///
    /// # Errors
    ///
    /// `NotAStructure` for a leaf path, or the first failure met while
    /// resolving the initial values.
    pub async fn observe_any_from<P, F>(
        self: &Arc<Self>,
        path: impl Into<FieldPath>,
        provider: P,
        callback: F,
    ) -> Result<Arc<BulkObservable>, TagError>
    where
        P: Fn(&str) -> TagContext + Send + Sync + 'static,
        F: Fn(&Arc<TagResult>) + Send + Sync + 'static,
    {
        let provider: ContextProvider = Arc::new(provider);
        let path = path.into();
        let entry = self.schema.entry(&path)?;
        if entry.kind != FieldKind::Structure {
            return Err(TagError::NotAStructure { path: path.dotted() });
        }

        let leaves: Vec<IndexEntry> = self.schema.index().leaves(&path)?.into_iter().cloned().collect();
        let mut children: Vec<Arc<dyn Observe>> = Vec::with_capacity(leaves.len());
        for leaf in leaves {
            let contexts: Vec<TagContext> = leaf.field_path.segments().iter().map(|name| provider(name)).collect();
            let initial = self.resolve_leaf(&leaf, &leaf.field_path, &contexts).await?;
            let child = self.build_observable(leaf.field_path.clone(), initial)?;
            let provider = provider.clone();
            child.on_get_context(move |name| provider(name));
            children.push(child);
        }
        Ok(self.observe_any(children, callback))
    }

    /// Check every registered observable concurrently.
    ///
    /// This is the refresh hook: the host calls it whenever the subject's
    /// sources change. Returns how many observables reported a change;
    /// failing observables are logged and count as unchanged.
    pub async fn check_observables(&self) -> Result<usize, TagError> {
        if !self.is_alive() {
            return Err(TagError::SubjectReleased);
        }
        let observables: Vec<Arc<dyn Observe>> = self.observables().values().cloned().collect();

        let results = join_all(observables.iter().map(|observable| observable.check())).await;
        let mut changed = 0;
        for (observable, result) in observables.iter().zip(results) {
            match result {
                Ok(true) => changed += 1,
                Ok(false) => {}
                Err(err) => tracing::warn!(id = %observable.id(), error = %err, "observable check failed"),
            }
        }
        Ok(changed)
    }

    /// Dispose every registered observable.
    pub fn dispose_all(&self) {
        let observables: Vec<Arc<dyn Observe>> = self.observables().drain().map(|(_, o)| o).collect();
        for observable in observables {
            observable.dispose();
        }
    }
}

impl fmt::Debug for TagResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagResult")
            .field("alive", &self.is_alive())
            .field("fields", &self.schema.index().len())
            .field("observables", &self.observable_count())
            .finish()
    }
}

/// One context per segment of `path`: missing ones are empty, extras dropped.
fn segment_contexts(path: &FieldPath, contexts: &[TagContext]) -> Vec<TagContext> {
    let depth = path.segments().len();
    let mut fitted: Vec<TagContext> = contexts.iter().take(depth).cloned().collect();
    fitted.resize_with(depth, TagContext::new);
    fitted
}

/// One step of the chained `get` accessor.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use zztag::model::{FieldDescriptor, Model};
/// use zztag::note::NoteRepository;
/// use zztag::source::Battler;
/// use zztag::{TagContext, TagRegistry, TagValue};
///
/// let model = Arc::new(Model::new().field(
///     "my_tag",
///     FieldDescriptor::structure(Model::new().field("str", FieldDescriptor::string())),
/// ));
/// let registry = TagRegistry::new(Arc::new(NoteRepository::new()));
/// let actor = Arc::new(Battler::new("Harold", "<my_tag>\nstr: hello\nstr+: world\n</my_tag>"));
/// let tags = registry.resolve(&actor, &model).unwrap();
///
/// let value = futures::executor::block_on(async {
///     let my_tag = tags.getter().scope("my_tag", TagContext::new())?;
///     my_tag.value("str", TagContext::new()).await
/// })
/// .unwrap();
/// assert_eq!(value, TagValue::from("hello,world"));
/// ```
#[derive(Debug, Clone)]
pub struct Scope {
    tags: Arc<TagResult>,
    path: FieldPath,
    contexts: Vec<TagContext>,
}

impl Scope {
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    fn step(&self, name: &str, context: TagContext) -> Result<(&IndexEntry, FieldPath, Vec<TagContext>), TagError> {
        let entry = self.tags.schema.index().resolve(name, &self.path)?;
        let mut contexts = self.contexts.clone();
        contexts.push(context);
        Ok((entry, self.path.child(name), contexts))
    }

    /// Access one field below this scope.
    pub async fn field(&self, name: &str, context: TagContext) -> Result<Resolved, TagError> {
        let (entry, path, contexts) = self.step(name, context)?;
        if entry.kind == FieldKind::Structure {
            return Ok(Resolved::Scope(Scope {
                tags: self.tags.clone(),
                path,
                contexts,
            }));
        }
        self.tags.resolve_leaf(entry, &path, &contexts).await.map(Resolved::Value)
    }

    /// Access a leaf field below this scope.
    pub async fn value(&self, name: &str, context: TagContext) -> Result<TagValue, TagError> {
        let (entry, path, contexts) = self.step(name, context)?;
        if entry.kind == FieldKind::Structure {
            return Err(TagError::NotALeaf { path: path.dotted() });
        }
        self.tags.resolve_leaf(entry, &path, &contexts).await
    }

    /// Enter a nested structure. No source is read.
    pub fn scope(&self, name: &str, context: TagContext) -> Result<Scope, TagError> {
        let (entry, path, contexts) = self.step(name, context)?;
        if entry.kind != FieldKind::Structure {
            return Err(TagError::NotAStructure { path: path.dotted() });
        }
        Ok(Scope {
            tags: self.tags.clone(),
            path,
            contexts,
        })
    }
}

/// One step of the chained `collect` accessor.
#[derive(Debug, Clone)]
pub struct CollectScope {
    tags: Arc<TagResult>,
    path: FieldPath,
    contexts: Vec<TagContext>,
}

impl CollectScope {
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub async fn field(&self, name: &str, context: TagContext) -> Result<Collected, TagError> {
        let entry = self.tags.schema.index().resolve(name, &self.path)?;
        let path = self.path.child(name);
        let mut contexts = self.contexts.clone();
        contexts.push(context);

        if entry.kind == FieldKind::Structure {
            return Ok(Collected::Scope(CollectScope {
                tags: self.tags.clone(),
                path,
                contexts,
            }));
        }
        let chain = self.tags.chain()?;
        let query = FieldQuery::new(&path, entry.kind, &contexts);
        self.tags.contributions(&chain, &query, false).await.map(Collected::Values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldDescriptor, Model};
    use crate::note::NoteRepository;
    use crate::source::Battler;
    use serde_json::json;

    fn model() -> Model {
        Model::new().field(
            "my_tag",
            FieldDescriptor::structure(
                Model::new()
                    .field("nbr", FieldDescriptor::number())
                    .field("list", FieldDescriptor::list())
                    .field("obj", FieldDescriptor::map())
                    .field(
                        "inner",
                        FieldDescriptor::structure(Model::new().field("gold", FieldDescriptor::number().with_default(3))),
                    ),
            ),
        )
    }

    fn context(subject: &Arc<dyn Subject>) -> Arc<TagResult> {
        let schema = Arc::new(DerivedSchema::build(&model()).unwrap());
        TagResult::new(subject, schema, Arc::new(NoteRepository::new()))
    }

    #[tokio::test]
    async fn test_missing_field_uses_default() {
        let subject: Arc<dyn Subject> = Arc::new(Battler::new("Harold", ""));
        let tags = context(&subject);

        assert_eq!(tags.value("my_tag.nbr", &[]).await.unwrap(), TagValue::Number(0.0));
        assert_eq!(tags.value("my_tag.inner.gold", &[]).await.unwrap(), TagValue::Number(3.0));
        assert_eq!(tags.value("my_tag.list", &[]).await.unwrap(), TagValue::from(""));
        assert!(tags.value("my_tag.obj", &[]).await.unwrap().as_map().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_segment_is_rejected() {
        let subject: Arc<dyn Subject> = Arc::new(Battler::new("Harold", ""));
        let tags = context(&subject);

        match tags.get("my_tag.gold", &[]).await {
            Err(TagError::PathNotFound { id, path }) => {
                assert_eq!(id, "gold");
                assert_eq!(path, "__root__.my_tag");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            tags.getter().field("then", TagContext::new()).await,
            Err(TagError::PathNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_segments_are_rejected() {
        let subject: Arc<dyn Subject> = Arc::new(Battler::new("Harold", "<my_tag>\nnbr: 1\n</my_tag>"));
        let tags = context(&subject);

        for path in ["my_tag..nbr", "my_tag.", ".my_tag"] {
            match tags.get(path, &[]).await {
                Err(TagError::PathNotFound { id, .. }) => assert_eq!(id, "", "{path}"),
                other => panic!("{path}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_segment_contexts_match_depth() {
        let path = FieldPath::parse("my_tag.inner");
        let a = TagContext::new().with("a", 1);

        assert_eq!(segment_contexts(&path, &[]), vec![TagContext::new(), TagContext::new()]);
        assert_eq!(
            segment_contexts(&path, &[a.clone(), a.clone(), a.clone()]),
            vec![a.clone(), a.clone()]
        );
        assert_eq!(segment_contexts(&FieldPath::root(), &[a]), Vec::<TagContext>::new());
    }

    #[tokio::test]
    async fn test_structure_opens_scope() {
        let subject: Arc<dyn Subject> = Arc::new(Battler::new("Harold", "<my_tag>\n<inner>\ngold: 7\n</inner>\n</my_tag>"));
        let tags = context(&subject);

        let inner = tags.get("my_tag.inner", &[]).await.unwrap().into_scope().unwrap();
        assert_eq!(inner.path().dotted(), "my_tag.inner");
        assert_eq!(inner.value("gold", TagContext::new()).await.unwrap(), TagValue::Number(7.0));

        assert!(matches!(
            tags.value("my_tag.inner", &[]).await,
            Err(TagError::NotALeaf { .. })
        ));
        assert!(matches!(
            inner.scope("gold", TagContext::new()),
            Err(TagError::NotAStructure { .. })
        ));
    }

    #[tokio::test]
    async fn test_collect_and_exists() {
        let actor = Arc::new(Battler::new("Harold", "<my_tag>\nnbr: 1\n</my_tag>"));
        actor.add_state(crate::source::Source::state("Slow", "<my_tag>\nnbr: 2\n</my_tag>"));
        let subject: Arc<dyn Subject> = actor;
        let tags = context(&subject);

        let values = tags.collect("my_tag.nbr", &[]).await.unwrap().into_values().unwrap();
        assert_eq!(values, vec![json!(2.0), json!(1.0)]);

        assert!(tags.exists("my_tag.nbr", &[]).await.unwrap());
        assert!(!tags.exists("my_tag.list", &[]).await.unwrap());
    }

    #[tokio::test]
    async fn test_released_subject() {
        let subject: Arc<dyn Subject> = Arc::new(Battler::new("Harold", ""));
        let tags = context(&subject);
        drop(subject);

        assert!(!tags.is_alive());
        assert!(matches!(
            tags.value("my_tag.nbr", &[]).await,
            Err(TagError::SubjectReleased)
        ));
        // validation still comes first
        assert!(matches!(
            tags.value("my_tag.nope", &[]).await,
            Err(TagError::PathNotFound { .. })
        ));
    }
}
