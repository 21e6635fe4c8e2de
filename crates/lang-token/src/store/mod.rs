//! Document storage collaborators: where raw locale documents come from and
//! where edited ones go.

mod cache;
mod fs_store;

use std::collections::BTreeMap;

use anyhow::Result;
use serde_json::Value;

pub use cache::OfflineCache;
pub use fs_store::FsStore;

/// File that holds the prefix -> picture reference mapping.
pub const PICTURES_DOCUMENT: &str = "images.json";

/// Supplies parsed documents by name.
pub trait DocumentSource {
    /// Every stored file name, sorted.
    fn list_documents(&self) -> Result<Vec<String>>;

    fn read_document(&self, name: &str) -> Result<Value>;
}

/// Accepts nested documents for persistence.
pub trait DocumentSink {
    fn write_document(&self, name: &str, document: &Value) -> Result<()>;
}

/// Persists picture references keyed by namespace prefix.
pub trait PictureStore {
    fn load_pictures(&self) -> Result<BTreeMap<String, String>>;

    fn save_pictures(&self, pictures: &BTreeMap<String, String>) -> Result<()>;
}

/// Keep only names that look like language documents.
pub fn language_documents<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names
        .into_iter()
        .map(Into::into)
        .filter(|name| {
            has_json_extension(name) && !name.eq_ignore_ascii_case(PICTURES_DOCUMENT)
        })
        .collect()
}

/// Language code of a document: its name without the `.json` suffix.
pub fn language_code(name: &str) -> &str {
    if has_json_extension(name) { &name[..name.len() - ".json".len()] } else { name }
}

fn has_json_extension(name: &str) -> bool {
    name.len() >= ".json".len()
        && name.is_char_boundary(name.len() - ".json".len())
        && name[name.len() - ".json".len()..].eq_ignore_ascii_case(".json")
}
