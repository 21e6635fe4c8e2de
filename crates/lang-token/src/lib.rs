//! Core of the lang-token translation editor: flattening nested locale
//! documents, reconciling a target language against a reference, and the
//! storage, config and HTTP plumbing around it.

pub mod config;
pub mod error;
pub mod paths;
pub mod session;
pub mod store;
pub mod tokens;

pub use config::{EditorConfig, EditorSettings, ServerSettings};
pub use error::CoreError;
pub use paths::{Layout, default_root};
pub use session::{EditorSession, ReferenceOrigin};
pub use store::{DocumentSink, DocumentSource, FsStore, OfflineCache, PictureStore};
pub use tokens::{
    FlatTokenMap, Reconciler, TokenError, TokenGroup, flatten, try_unflatten, unflatten,
};

// CLI 模块
#[path = "cli/i18n.rs"]
pub mod cli_i18n;

// File service entry point
pub mod serve;

// Web / HTTP 模块
pub mod web {
    pub mod http;
}
