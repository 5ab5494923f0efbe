//! Error types for attribute resolution.
//!
//! All errors that can occur while adapting a model or resolving a
//! field are represented by the `TagError` enum.

use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during model adaptation and attribute resolution.
///
/// # Examples
///
/// ```rust
/// use zztag::TagError;
///
/// let err = TagError::PathNotFound {
///     id: "gold".into(),
///     path: "__root__.my_tag".into(),
/// };
/// println!("{}", err); // "Can't find gold in the model. Path is __root__.my_tag"
/// ```
#[derive(Debug, Error, Clone)]
pub enum TagError {
    /// A path segment is absent from the derived schema at the given parent path.
    ///
    /// This is the only validation gate of the access surface: it always
    /// reaches the caller.
    #[error("Can't find {id} in the model. Path is {path}")]
    PathNotFound { id: String, path: String },

    /// A field descriptor was malformed when the model was adapted.
    #[error("Invalid model field {field}: {reason}")]
    InvalidModel { field: String, reason: String },

    /// An observable was requested on a structure field.
    ///
    /// Only leaf fields produce comparable values.
    #[error("Field {path} is a structure, not a leaf")]
    NotALeaf { path: String },

    /// A nested scope was requested on a leaf field.
    #[error("Field {path} is a leaf, not a structure")]
    NotAStructure { path: String },

    /// A value contributed by a source cannot be read as the field's type.
    #[error("Invalid value for {path}: {value}")]
    InvalidValue { path: String, value: String },

    /// The subject bound to a resolution context no longer exists.
    #[error("Subject was released before resolution")]
    SubjectReleased,

    /// A failure reported by the template repository, passed through unchanged.
    #[error("{0}")]
    Template(Arc<dyn StdError + Send + Sync>),
}

impl TagError {
    /// Wrap a template repository failure without altering it.
    pub fn template(err: impl StdError + Send + Sync + 'static) -> Self {
        TagError::Template(Arc::new(err))
    }

    /// Wrap a plain message as a template repository failure.
    pub fn template_msg(msg: impl Into<String>) -> Self {
        TagError::Template(Arc::new(TemplateMessage(msg.into())))
    }

    /// Access the original template repository error, if this is one.
    pub fn template_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            TagError::Template(err) => Some(err.as_ref()),
            _ => None,
        }
    }

    pub(crate) fn invalid_model(field: impl Into<String>, reason: impl Into<String>) -> Self {
        TagError::InvalidModel {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Message-only template failure.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TemplateMessage(pub String);
