//! Editing session: feeds documents from a store into the [`Reconciler`] and
//! writes edited target documents back.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    error::CoreError,
    store::{DocumentSink, DocumentSource, OfflineCache, PictureStore, language_code, language_documents},
    tokens::{Reconciler, TokenGroup, flatten, try_unflatten},
};

/// Where the reference document came from when the session was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceOrigin {
    Source,
    OfflineCache,
    Unavailable,
}

pub struct EditorSession<S> {
    store: S,
    cache: Option<OfflineCache>,
    reconciler: Reconciler,
    reference_name: String,
    selected: Option<String>,
    lang: Option<String>,
    pictures_loaded: bool,
    last_error: Option<String>,
}

impl<S> EditorSession<S>
where
    S: DocumentSource + DocumentSink + PictureStore,
{
    pub fn new(store: S, reference_name: impl Into<String>) -> Self {
        Self {
            store,
            cache: None,
            reconciler: Reconciler::new(),
            reference_name: reference_name.into(),
            selected: None,
            lang: None,
            pictures_loaded: false,
            last_error: None,
        }
    }

    /// Keep offline copies of loaded documents and fall back to them when the
    /// reference cannot be read from the store.
    pub fn with_offline_cache(mut self, cache: OfflineCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Load picture metadata and the reference document.
    ///
    /// Failures are recorded in [`EditorSession::last_error`]; only a broken
    /// offline cache is returned as an error.
    pub fn open(&mut self) -> Result<ReferenceOrigin> {
        let _ = self.load_pictures();

        match self.store.read_document(&self.reference_name) {
            Ok(document) => {
                self.ingest_reference(&document, true);
                Ok(ReferenceOrigin::Source)
            }
            Err(err) => {
                self.record_error("failed to load reference document", &err);
                let cached = match &self.cache {
                    Some(cache) => cache.load_reference()?,
                    None => None,
                };
                match cached {
                    Some(document) => {
                        self.ingest_reference(&document, false);
                        info!(
                            tokens = self.reconciler.reference_count(),
                            "loaded reference from offline cache"
                        );
                        Ok(ReferenceOrigin::OfflineCache)
                    }
                    None => Ok(ReferenceOrigin::Unavailable),
                }
            }
        }
    }

    /// Language documents available in the store.
    pub fn files(&self) -> Result<Vec<String>> {
        Ok(language_documents(self.store.list_documents()?))
    }

    /// Load a stored document as the reference (when its name matches the
    /// reference name, case-insensitively) or as the target.
    pub fn load_file(&mut self, name: &str) -> Result<()> {
        let document = match self.store.read_document(name) {
            Ok(document) => document,
            Err(err) => {
                self.record_error(&format!("failed to load file {name}"), &err);
                return Err(err);
            }
        };
        if self.is_reference_name(name) {
            self.ingest_reference(&document, true);
        } else {
            self.load_target_document(name, &document);
        }
        Ok(())
    }

    /// Load picture metadata from the store, replacing the attached pictures.
    pub fn load_pictures(&mut self) -> Result<()> {
        match self.store.load_pictures() {
            Ok(pictures) => {
                self.reconciler.set_pictures(pictures);
                self.pictures_loaded = true;
                Ok(())
            }
            Err(err) => {
                self.record_error("failed to load picture metadata", &err);
                self.pictures_loaded = false;
                Err(CoreError::PicturesUnavailable { reason: format!("{err:#}") }.into())
            }
        }
    }

    /// Ingest an already-parsed reference document.
    pub fn load_reference_document(&mut self, document: &Value) {
        self.ingest_reference(document, true);
    }

    /// Ingest an already-parsed target document and select it for saving.
    pub fn load_target_document(&mut self, name: &str, document: &Value) {
        let lang = language_code(name).to_string();
        self.reconciler.load_target(flatten(document));
        info!(lang = %lang, tokens = self.reconciler.target_count(), "loaded target language");

        if let Some(cache) = &self.cache {
            if let Err(err) = cache.store_target(&lang, document) {
                warn!(lang = %lang, error = ?err, "failed to refresh offline copy");
            }
        }
        self.selected = Some(name.to_string());
        self.lang = Some(lang);
    }

    /// Edit one target token. Call [`EditorSession::refresh`] once a batch of
    /// edits is done.
    pub fn set_token(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.reconciler.set_token(key, value);
    }

    /// Recompute missing tokens and groups after edits.
    pub fn refresh(&mut self) {
        self.reconciler.detect_missing();
    }

    pub fn set_missing_only(&mut self, missing_only: bool) {
        self.reconciler.set_missing_only(missing_only);
    }

    pub fn groups(&mut self) -> &[TokenGroup] {
        self.reconciler.groups()
    }

    /// Nested form of the current target tokens.
    pub fn target_document(&self) -> Result<Value> {
        let document = try_unflatten(self.reconciler.target()).map_err(CoreError::from)?;
        Ok(document)
    }

    /// Write the target tokens back to the selected document.
    pub fn save(&mut self) -> Result<Value> {
        let Some(name) = self.selected.clone() else {
            return Err(CoreError::NoDocumentSelected.into());
        };
        let document = self.target_document()?;
        if let Err(err) = self.store.write_document(&name, &document) {
            self.record_error(&format!("failed to save {name}"), &err);
            return Err(err);
        }
        info!(file = %name, tokens = self.reconciler.target_count(), "saved target language");
        Ok(document)
    }

    /// Write the target tokens to a local file outside the store.
    pub fn export(&self, path: &Path) -> Result<()> {
        let document = self.target_document()?;
        let rendered = serde_json::to_string_pretty(&document)
            .map_err(|source| CoreError::SerialiseJson { source })?;
        fs::write(path, rendered)
            .with_context(|| format!("failed to export tokens to {}", path.display()))?;
        Ok(())
    }

    /// Attach a picture to a namespace and persist the picture metadata.
    ///
    /// Stored metadata is merged in first; when it cannot be read nothing is
    /// written, so existing references are never replaced by a partial map.
    pub fn attach_picture(&mut self, prefix: &str, picture: &str) -> Result<()> {
        if !self.pictures_loaded {
            self.load_pictures()?;
        }
        self.reconciler.attach_picture(prefix, picture);
        self.store.save_pictures(self.reconciler.pictures())
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn reference_name(&self) -> &str {
        &self.reference_name
    }

    /// Target document that [`EditorSession::save`] writes to.
    pub fn selected_file(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn lang(&self) -> Option<&str> {
        self.lang.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether `name` designates the reference document.
    pub fn is_reference_name(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case(&self.reference_name)
    }

    fn ingest_reference(&mut self, document: &Value, refresh_cache: bool) {
        self.reconciler.load_reference(flatten(document));
        info!(
            file = %self.reference_name,
            tokens = self.reconciler.reference_count(),
            "loaded reference language"
        );
        if !refresh_cache {
            return;
        }
        if let Some(cache) = &self.cache {
            if let Err(err) = cache.store_reference(document) {
                warn!(error = ?err, "failed to refresh offline reference copy");
            }
        }
    }

    fn record_error(&mut self, context: &str, err: &anyhow::Error) {
        warn!(error = ?err, "{context}");
        self.last_error = Some(format!("{context}: {err}"));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use anyhow::anyhow;
    use serde_json::json;
    use tempfile::{TempDir, tempdir};

    use super::*;
    use crate::{
        paths::Layout,
        store::{FsStore, PICTURES_DOCUMENT},
    };

    fn workspace() -> (TempDir, Layout, FsStore) {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path().to_path_buf());
        layout.ensure().unwrap();
        let store = FsStore::new(&layout);
        (dir, layout, store)
    }

    fn seed(store: &FsStore) {
        store
            .write_document("en.json", &json!({ "a": { "x": "1", "y": "2" }, "b": { "x": "3" } }))
            .unwrap();
        store.write_document("fr.json", &json!({ "a": { "x": "un" } })).unwrap();
    }

    /// Store whose reads always fail, standing in for an unreachable server.
    struct Offline;

    impl DocumentSource for Offline {
        fn list_documents(&self) -> Result<Vec<String>> {
            Err(anyhow!("server down"))
        }

        fn read_document(&self, _name: &str) -> Result<Value> {
            Err(anyhow!("server down"))
        }
    }

    impl DocumentSink for Offline {
        fn write_document(&self, _name: &str, _document: &Value) -> Result<()> {
            Err(anyhow!("server down"))
        }
    }

    impl PictureStore for Offline {
        fn load_pictures(&self) -> Result<BTreeMap<String, String>> {
            Err(anyhow!("server down"))
        }

        fn save_pictures(&self, _pictures: &BTreeMap<String, String>) -> Result<()> {
            Err(anyhow!("server down"))
        }
    }

    #[test]
    fn opens_reference_and_loads_target() {
        let (_dir, _layout, store) = workspace();
        seed(&store);
        let mut session = EditorSession::new(store, "en.json");

        assert_eq!(session.open().unwrap(), ReferenceOrigin::Source);
        assert_eq!(session.reconciler().reference_count(), 3);

        session.load_file("fr.json").unwrap();
        assert_eq!(session.selected_file(), Some("fr.json"));
        assert_eq!(session.lang(), Some("fr"));
        let missing: Vec<&str> = session.reconciler().missing().collect();
        assert_eq!(missing, ["a.y", "b.x"]);
    }

    #[test]
    fn reference_name_matches_case_insensitively() {
        let (_dir, _layout, store) = workspace();
        seed(&store);
        store.write_document("EN.json", &json!({ "only": "one" })).unwrap();
        let mut session = EditorSession::new(store, "en.json");

        session.load_file("EN.json").unwrap();
        assert_eq!(session.reconciler().reference_count(), 1);
        assert_eq!(session.selected_file(), None);
    }

    #[test]
    fn files_lists_language_documents_only() {
        let (_dir, _layout, store) = workspace();
        seed(&store);
        store.store_upload("logo.png", b"png").unwrap();
        store.save_pictures(&BTreeMap::new()).unwrap();
        let session = EditorSession::new(store, "en.json");
        assert_eq!(session.files().unwrap(), ["en.json", "fr.json"]);
    }

    #[test]
    fn save_writes_nested_target() {
        let (_dir, _layout, store) = workspace();
        seed(&store);
        let mut session = EditorSession::new(store, "en.json");
        session.open().unwrap();
        session.load_file("fr.json").unwrap();

        session.set_token("a.y", "deux");
        session.refresh();
        let saved = session.save().unwrap();

        assert_eq!(saved, json!({ "a": { "x": "un", "y": "deux" } }));
        assert_eq!(session.store().read_document("fr.json").unwrap(), saved);
        let missing: Vec<&str> = session.reconciler().missing().collect();
        assert_eq!(missing, ["b.x"]);
    }

    #[test]
    fn save_without_selection_fails() {
        let (_dir, _layout, store) = workspace();
        seed(&store);
        let mut session = EditorSession::new(store, "en.json");
        session.open().unwrap();

        let err = session.save().unwrap_err();
        assert!(matches!(err.downcast_ref::<CoreError>(), Some(CoreError::NoDocumentSelected)));
    }

    #[test]
    fn save_reports_conflicting_keys() {
        let (_dir, _layout, store) = workspace();
        seed(&store);
        let mut session = EditorSession::new(store, "en.json");
        session.load_file("fr.json").unwrap();
        session.set_token("a.x.deeper", "conflict");

        let err = session.save().unwrap_err();
        assert!(matches!(err.downcast_ref::<CoreError>(), Some(CoreError::Token(_))));
        assert_eq!(
            session.store().read_document("fr.json").unwrap(),
            json!({ "a": { "x": "un" } })
        );
    }

    #[test]
    fn load_failure_is_recorded() {
        let (_dir, _layout, store) = workspace();
        let mut session = EditorSession::new(store, "en.json");
        assert!(session.load_file("de.json").is_err());
        assert!(session.last_error().unwrap().contains("de.json"));
    }

    #[test]
    fn falls_back_to_offline_reference() {
        let (_dir, layout, store) = workspace();
        seed(&store);

        let cache = OfflineCache::new(&layout);
        let mut online = EditorSession::new(store, "en.json").with_offline_cache(cache.clone());
        online.open().unwrap();
        online.load_file("fr.json").unwrap();
        assert_eq!(cache.load_target("fr").unwrap(), Some(json!({ "a": { "x": "un" } })));

        let mut offline = EditorSession::new(Offline, "en.json").with_offline_cache(cache);
        assert_eq!(offline.open().unwrap(), ReferenceOrigin::OfflineCache);
        assert_eq!(offline.reconciler().reference_count(), 3);
        assert!(offline.last_error().unwrap().contains("server down"));
    }

    #[test]
    fn unavailable_reference_without_cache() {
        let mut session = EditorSession::new(Offline, "en.json");
        assert_eq!(session.open().unwrap(), ReferenceOrigin::Unavailable);
        assert_eq!(session.reconciler().reference_count(), 0);
    }

    #[test]
    fn attach_picture_persists_metadata() {
        let (_dir, _layout, store) = workspace();
        seed(&store);
        let mut session = EditorSession::new(store, "en.json");
        session.open().unwrap();
        session.attach_picture("a", "http://server/a.png").unwrap();

        assert_eq!(session.groups()[0].picture.as_deref(), Some("http://server/a.png"));
        let stored = session.store().load_pictures().unwrap();
        assert_eq!(stored.get("a").map(String::as_str), Some("http://server/a.png"));

        let mut reopened = EditorSession::new(session.store().clone(), "en.json");
        reopened.open().unwrap();
        assert_eq!(reopened.groups()[0].picture.as_deref(), Some("http://server/a.png"));
    }

    #[test]
    fn unreadable_pictures_are_never_overwritten() {
        let (_dir, _layout, store) = workspace();
        seed(&store);
        let images = store.root().join(PICTURES_DOCUMENT);
        let existing = r#"{"home":"http://server/home.png","nav":"http://server/nav.png","legacy":null}"#;
        fs::write(&images, existing).unwrap();

        let mut session = EditorSession::new(store, "en.json");
        assert_eq!(session.open().unwrap(), ReferenceOrigin::Source);
        assert!(session.last_error().unwrap().contains("picture metadata"));

        let err = session.attach_picture("a", "http://server/a.png").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CoreError>(),
            Some(CoreError::PicturesUnavailable { .. })
        ));
        assert_eq!(fs::read_to_string(&images).unwrap(), existing);
    }

    #[test]
    fn attach_picture_merges_stored_metadata_without_open() {
        let (_dir, _layout, store) = workspace();
        seed(&store);
        let mut stored = BTreeMap::new();
        stored.insert("b".to_string(), "http://server/b.png".to_string());
        store.save_pictures(&stored).unwrap();

        let mut session = EditorSession::new(store, "en.json");
        session.attach_picture("a", "http://server/a.png").unwrap();

        let pictures = session.store().load_pictures().unwrap();
        assert_eq!(pictures.get("a").map(String::as_str), Some("http://server/a.png"));
        assert_eq!(pictures.get("b").map(String::as_str), Some("http://server/b.png"));
    }

    #[test]
    fn load_reference_document_keeps_target_selection() {
        let (_dir, layout, store) = workspace();
        seed(&store);
        let cache = OfflineCache::new(&layout);
        let mut session = EditorSession::new(store, "en.json").with_offline_cache(cache.clone());
        session.open().unwrap();
        session.load_file("fr.json").unwrap();

        let picked = json!({ "a": { "x": "1" }, "c": "3" });
        session.load_reference_document(&picked);

        assert_eq!(session.reconciler().reference_count(), 2);
        let missing: Vec<&str> = session.reconciler().missing().collect();
        assert_eq!(missing, ["c"]);
        assert_eq!(cache.load_reference().unwrap(), Some(picked));
        assert_eq!(session.selected_file(), Some("fr.json"));
        assert_eq!(session.lang(), Some("fr"));
    }

    #[test]
    fn export_writes_local_copy() {
        let (dir, _layout, store) = workspace();
        seed(&store);
        let mut session = EditorSession::new(store, "en.json");
        session.load_file("fr.json").unwrap();

        let out = dir.path().join("download.json");
        session.export(&out).unwrap();
        let written: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(written, json!({ "a": { "x": "un" } }));
    }
}
