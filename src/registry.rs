//! Subject registry module.
//!
//! Associates subjects with their resolution context without taking
//! ownership of them. Contexts are keyed by subject identity and model
//! identity; an entry whose subject has been dropped is pruned on the
//! next access, or explicitly with [`TagRegistry::release`].

use crate::error::TagError;
use crate::model::Model;
use crate::resolver::TagResult;
use crate::schema::SchemaCache;
use crate::source::Subject;
use crate::template::TemplateRepository;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

struct Entry {
    subject: Weak<dyn Subject>,
    context: Arc<TagResult>,
}

type Key = (usize, usize);

/// Process-wide entry point: `resolve(subject, model) -> TagResult`.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use zztag::model::{FieldDescriptor, Model};
/// use zztag::note::NoteRepository;
/// use zztag::source::Battler;
/// use zztag::TagRegistry;
///
/// let registry = TagRegistry::new(Arc::new(NoteRepository::new()));
/// let model = Arc::new(Model::new().field("nbr", FieldDescriptor::number()));
/// let actor = Arc::new(Battler::new("Harold", "nbr: 1"));
///
/// let first = registry.resolve(&actor, &model).unwrap();
/// let second = registry.resolve(&actor, &model).unwrap();
/// assert!(Arc::ptr_eq(&first, &second));
///
/// drop(actor);
/// assert_eq!(registry.prune(), 1);
/// assert!(registry.is_empty());
/// ```
pub struct TagRegistry {
    schemas: SchemaCache,
    contexts: Mutex<HashMap<Key, Entry>>,
    repository: Arc<dyn TemplateRepository>,
}

impl TagRegistry {
    pub fn new(repository: Arc<dyn TemplateRepository>) -> Self {
        Self {
            schemas: SchemaCache::new(),
            contexts: Mutex::new(HashMap::new()),
            repository,
        }
    }

    fn contexts(&self) -> MutexGuard<'_, HashMap<Key, Entry>> {
        self.contexts.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Return the resolution context of `subject` under `model`.
    ///
    /// The model is adapted on first use and shared afterwards; repeated
    /// calls for the same subject and model return the same context.
    ///
    /// # Errors
    ///
    /// Returns `InvalidModel` if `model` cannot be adapted.
    pub fn resolve<S>(&self, subject: &Arc<S>, model: &Arc<Model>) -> Result<Arc<TagResult>, TagError>
    where
        S: Subject + 'static,
    {
        let schema = self.schemas.get_or_adapt(model)?;
        let key = (subject_key(subject), Arc::as_ptr(&schema) as usize);

        let mut contexts = self.contexts();
        prune_dead(&mut contexts);

        if let Some(entry) = contexts.get(&key) {
            return Ok(entry.context.clone());
        }

        let subject: Arc<dyn Subject> = subject.clone();
        let context = TagResult::new(&subject, schema, self.repository.clone());
        tracing::debug!(subject = %subject.name(), "resolution context created");
        contexts.insert(
            key,
            Entry {
                subject: Arc::downgrade(&subject),
                context: context.clone(),
            },
        );
        Ok(context)
    }

    /// Tear down every context of `subject`, disposing its observables.
    ///
    /// Returns how many contexts were dropped.
    pub fn release<S>(&self, subject: &Arc<S>) -> usize
    where
        S: Subject + 'static,
    {
        let key = subject_key(subject);
        let released: Vec<Arc<TagResult>> = {
            let mut contexts = self.contexts();
            let keys: Vec<Key> = contexts.keys().filter(|(s, _)| *s == key).copied().collect();
            keys.iter()
                .filter_map(|k| contexts.remove(k))
                .map(|entry| entry.context)
                .collect()
        };
        for context in &released {
            context.dispose_all();
        }
        released.len()
    }

    /// Drop contexts whose subject no longer exists. Returns how many were dropped.
    pub fn prune(&self) -> usize {
        prune_dead(&mut self.contexts())
    }

    /// Number of live associations.
    pub fn len(&self) -> usize {
        self.contexts().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for TagRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagRegistry")
            .field("schemas", &self.schemas.len())
            .field("contexts", &self.len())
            .finish()
    }
}

fn subject_key<S>(subject: &Arc<S>) -> usize {
    Arc::as_ptr(subject) as *const () as usize
}

fn prune_dead(contexts: &mut HashMap<Key, Entry>) -> usize {
    let before = contexts.len();
    contexts.retain(|_, entry| entry.subject.strong_count() > 0);
    let pruned = before - contexts.len();
    if pruned > 0 {
        tracing::debug!(pruned, "released contexts of dropped subjects");
    }
    pruned
}
