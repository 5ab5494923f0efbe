//! # zztag - Schema-Typed, Priority-Layered Notetag Attributes
//!
//! An attribute engine for entities whose values are spread over many
//! overlapping sources (states, equipment, classes, the entity itself):
//! - **Schema-typed** fields (`number`, `string`, `list`, `text`, `map`,
//!   `structure`, `code`) declared once in a [`Model`]
//! - **Priority-layered** resolution: the highest-priority source wins the
//!   main value, every source contributes modifiers
//! - **Derived modifier channels**: each field gains `Plus` (additive) and
//!   `Rate` (percentage) siblings
//! - **Change observation**: observables re-resolve on demand and notify
//!   on change
//!
//! ## Core Concepts
//!
//! ### Resolution Pipeline
//!
//! ```text
//! [Model] → adapt → [DerivedSchema + PathIndex]
//!                              │
//! [Subject] → source_chain → [Source...] → TemplateRepository → aggregate → [TagValue]
//! ```
//!
//! 1. The **schema adapter** derives `<field>Plus` / `<field>Rate` channels
//! 2. The **path index** validates every access against the derived schema
//! 3. The **source chain** lists contributing sources, highest priority first
//! 4. The **template repository** interprets each source's note
//! 5. The **aggregator** combines main value and modifiers per field kind
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use zztag::model::{FieldDescriptor, Model};
//! use zztag::note::NoteRepository;
//! use zztag::source::{Battler, Source};
//! use zztag::{TagRegistry, TagValue};
//!
//! let model = Arc::new(Model::new().field(
//!     "my_tag",
//!     FieldDescriptor::structure(
//!         Model::new()
//!             .field("atk", FieldDescriptor::number())
//!             .field("skills", FieldDescriptor::list()),
//!     ),
//! ));
//!
//! let actor = Arc::new(Battler::new(
//!     "Harold",
//!     "<my_tag>\natk: 100\natk+: 50\nskills: Slash\n</my_tag>",
//! ));
//! actor.equip(Source::equipment(
//!     "Long Sword",
//!     "<my_tag>\natk%: 50\nskills+: Cleave, Parry\n</my_tag>",
//! ));
//!
//! let registry = TagRegistry::new(Arc::new(NoteRepository::new()));
//! let tags = registry.resolve(&actor, &model).unwrap();
//!
//! futures::executor::block_on(async {
//!     // (100 + 50) * (1 + 50 * 0.01)
//!     assert_eq!(tags.value("my_tag.atk", &[]).await.unwrap(), TagValue::from(225));
//!     assert_eq!(
//!         tags.value("my_tag.skills", &[]).await.unwrap(),
//!         TagValue::from("Slash,Cleave,Parry")
//!     );
//! });
//! ```
//!
//! ## Modules
//!
//! - [`model`] - Field descriptors and author models
//! - [`schema`] - Schema adapter and derived schema cache
//! - [`index`] - Path index over a derived schema
//! - [`source`] - Sources, subjects and the priority chain
//! - [`template`] - Template repository interface
//! - [`note`] - Notetag template repository
//! - [`aggregate`] - Per-kind value aggregation
//! - [`resolver`] - Resolution context and chained accessors
//! - [`registry`] - Subject to context association
//! - [`observable`] - Change observation
//! - [`resolved`] - Resolved value types
//! - [`context`] - Per-segment contexts
//! - [`path`] - Field paths
//! - [`error`] - Error types

pub mod aggregate;
pub mod context;
pub mod error;
pub mod index;
pub mod model;
pub mod note;
pub mod numeric;
pub mod observable;
pub mod path;
pub mod registry;
pub mod resolved;
pub mod resolver;
pub mod schema;
pub mod source;
pub mod template;

// Re-export main types for convenience
pub use context::TagContext;
pub use error::TagError;
pub use model::{FieldDescriptor, FieldKind, Model};
pub use observable::{BulkObservable, Observable, ObservableId, Observe};
pub use path::FieldPath;
pub use registry::TagRegistry;
pub use resolved::{MapEntry, TagValue};
pub use resolver::{CollectScope, Collected, Resolved, Scope, TagResult};
pub use source::{Source, SourceKind, Subject};
pub use template::TemplateRepository;
