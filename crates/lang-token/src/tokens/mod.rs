//! Token reconciliation core: flattening nested locale documents and
//! comparing a target language against the reference language.

mod flatten;
mod reconcile;

use indexmap::IndexMap;
use thiserror::Error;

pub use flatten::{PATH_SEPARATOR, flatten, try_unflatten, unflatten};
pub use reconcile::{ROOT_PREFIX, Reconciler, TokenGroup, group_prefix};

/// Dotted path -> translated string, kept in first-insertion order.
pub type FlatTokenMap = IndexMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// A key's path runs through (or lands on) structure created by another key.
    #[error("token '{key}' conflicts with existing structure at '{ancestor}'")]
    ConflictingKey { key: String, ancestor: String },
}
