use anyhow::Result;
use serde_json::Value;

use super::{DocumentSink, DocumentSource, FsStore};
use crate::paths::Layout;

const REFERENCE_ENTRY: &str = "english.json";
const TARGET_ENTRY_PREFIX: &str = "lang-";

/// Local copies of the most recently loaded documents, used when the
/// document source is unreachable.
#[derive(Debug, Clone)]
pub struct OfflineCache {
    store: FsStore,
}

impl OfflineCache {
    pub fn new(layout: &Layout) -> Self {
        Self { store: FsStore::with_dir(layout.cache_dir()) }
    }

    pub fn store_reference(&self, document: &Value) -> Result<()> {
        self.store.write_document(REFERENCE_ENTRY, document)
    }

    pub fn load_reference(&self) -> Result<Option<Value>> {
        self.load(REFERENCE_ENTRY)
    }

    pub fn store_target(&self, lang: &str, document: &Value) -> Result<()> {
        self.store.write_document(&target_entry(lang), document)
    }

    pub fn load_target(&self, lang: &str) -> Result<Option<Value>> {
        self.load(&target_entry(lang))
    }

    fn load(&self, entry: &str) -> Result<Option<Value>> {
        if !self.store.contains(entry) {
            return Ok(None);
        }
        self.store.read_document(entry).map(Some)
    }
}

fn target_entry(lang: &str) -> String {
    format!("{TARGET_ENTRY_PREFIX}{lang}.json")
}
