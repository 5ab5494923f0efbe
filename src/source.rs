//! Sources and the priority chain.
//!
//! A source is any entity carrying a raw note: a state, an equipped item,
//! a class, or the subject itself. Main values are taken from the first
//! source of the chain that defines them; modifier channels are read from
//! every source.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// What kind of entity a source is.
///
/// The ordering of variants is the conventional priority order
/// (State > Equipment > Class > Subject); subjects are free to use
/// another order when they list their sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceKind {
    State,
    Equipment,
    Class,
    Subject,
    Other,
}

/// An entity contributing raw field values through its note.
///
/// # Examples
///
/// ```rust
/// use zztag::source::{Source, SourceKind};
///
/// let state = Source::state("Poison", "<my_tag>\nnbr: 10\n</my_tag>");
/// assert_eq!(state.kind(), SourceKind::State);
/// assert!(state.note().contains("nbr: 10"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    kind: SourceKind,
    name: Arc<str>,
    note: Arc<str>,
}

impl Source {
    pub fn new(kind: SourceKind, name: &str, note: &str) -> Self {
        Self {
            kind,
            name: Arc::from(name),
            note: Arc::from(note),
        }
    }

    pub fn state(name: &str, note: &str) -> Self {
        Self::new(SourceKind::State, name, note)
    }

    pub fn equipment(name: &str, note: &str) -> Self {
        Self::new(SourceKind::Equipment, name, note)
    }

    pub fn class(name: &str, note: &str) -> Self {
        Self::new(SourceKind::Class, name, note)
    }

    pub fn subject(name: &str, note: &str) -> Self {
        Self::new(SourceKind::Subject, name, note)
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw note text of this source.
    pub fn note(&self) -> &str {
        &self.note
    }
}

/// The entity whose attributes are resolved.
///
/// Implemented by the host's entity graph. `sources` must list the
/// contributing sources highest priority first, deterministically for a
/// given entity state, and must not include the subject itself.
pub trait Subject: Send + Sync {
    /// Human-readable name, used in logs.
    fn name(&self) -> String;

    /// The subject's own note.
    fn note(&self) -> String;

    /// Contributing sources, highest priority first.
    fn sources(&self) -> Vec<Source> {
        Vec::new()
    }
}

/// Build the priority chain of `subject`: its sources followed by the
/// subject itself as the lowest-priority source.
///
/// The chain is rebuilt on every call; relationships may change between
/// resolutions.
pub fn source_chain(subject: &dyn Subject) -> Vec<Source> {
    let mut chain = subject.sources();
    chain.push(Source::subject(&subject.name(), &subject.note()));
    tracing::trace!(subject = %subject.name(), len = chain.len(), "source chain built");
    chain
}

/// A ready-made subject holding its states, equipment and class.
///
/// Sources are listed states first (in the order they were added), then
/// equipment, then the class.
///
/// # Examples
///
/// ```rust
/// use zztag::source::{source_chain, Battler, Source, SourceKind};
///
/// let actor = Battler::new("Harold", "title: Hero");
/// actor.set_class(Some(Source::class("Warrior", "title: Fighter")));
/// actor.equip(Source::equipment("Shield", "title: Shadow"));
/// actor.add_state(Source::state("Oracle", "title: Oracle"));
///
/// let kinds: Vec<_> = source_chain(&actor).iter().map(|s| s.kind()).collect();
/// assert_eq!(
///     kinds,
///     [SourceKind::State, SourceKind::Equipment, SourceKind::Class, SourceKind::Subject]
/// );
/// ```
#[derive(Debug, Default)]
pub struct Battler {
    name: String,
    note: RwLock<String>,
    states: RwLock<Vec<Source>>,
    equipment: RwLock<Vec<Source>>,
    class: RwLock<Option<Source>>,
}

impl Battler {
    pub fn new(name: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            note: RwLock::new(note.into()),
            ..Self::default()
        }
    }

    pub fn set_note(&self, note: impl Into<String>) {
        *write(&self.note) = note.into();
    }

    pub fn add_state(&self, state: Source) {
        write(&self.states).push(state);
    }

    /// Remove every state with the given name. Returns whether one was removed.
    pub fn remove_state(&self, name: &str) -> bool {
        let mut states = write(&self.states);
        let before = states.len();
        states.retain(|s| s.name() != name);
        states.len() != before
    }

    pub fn equip(&self, item: Source) {
        write(&self.equipment).push(item);
    }

    /// Remove every equipped item with the given name. Returns whether one was removed.
    pub fn unequip(&self, name: &str) -> bool {
        let mut equipment = write(&self.equipment);
        let before = equipment.len();
        equipment.retain(|s| s.name() != name);
        equipment.len() != before
    }

    pub fn set_class(&self, class: Option<Source>) {
        *write(&self.class) = class;
    }
}

impl Subject for Battler {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn note(&self) -> String {
        read(&self.note).clone()
    }

    fn sources(&self) -> Vec<Source> {
        let mut sources = read(&self.states).clone();
        sources.extend(read(&self.equipment).iter().cloned());
        sources.extend(read(&self.class).iter().cloned());
        sources
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}
