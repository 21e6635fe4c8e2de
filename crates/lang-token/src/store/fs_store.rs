use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Result;
use serde_json::Value;
use tracing::debug;

use super::{DocumentSink, DocumentSource, PICTURES_DOCUMENT, PictureStore};
use crate::{error::CoreError, paths::Layout};

/// Documents stored as plain files in a single directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(layout: &Layout) -> Self {
        Self::with_dir(layout.tokens_dir())
    }

    pub fn with_dir(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure(&self) -> Result<()> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root).map_err(|source| CoreError::CreateDirectory {
                path: self.root.clone(),
                source,
            })?;
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.path_for(name).map(|path| path.is_file()).unwrap_or(false)
    }

    /// Resolve a document name to its path, rejecting anything that is not a
    /// plain file name.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, CoreError> {
        let trimmed = name.trim();
        let plain = !trimmed.is_empty()
            && trimmed == name
            && !matches!(name, "." | "..")
            && !name.contains(['/', '\\', '\0']);
        if !plain {
            return Err(CoreError::InvalidDocumentName { name: name.to_string() });
        }
        Ok(self.root.join(name))
    }

    /// Raw file contents, for serving uploads back unchanged.
    pub fn read_bytes(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path_for(name)?;
        if !path.is_file() {
            return Err(CoreError::DocumentNotFound { name: name.to_string() }.into());
        }
        let bytes =
            fs::read(&path).map_err(|source| CoreError::ReadFile { path: path.clone(), source })?;
        Ok(bytes)
    }

    /// Store an uploaded file verbatim under `name`.
    pub fn store_upload(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(name)?;
        self.ensure()?;
        fs::write(&path, bytes).map_err(|source| CoreError::WriteFile { path: path.clone(), source })?;
        debug!(path = %path.display(), size = bytes.len(), "stored upload");
        Ok(())
    }
}

impl DocumentSource for FsStore {
    fn list_documents(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        if !self.root.exists() {
            return Ok(names);
        }

        for entry in fs::read_dir(&self.root)
            .map_err(|source| CoreError::ReadDirectory { path: self.root.clone(), source })?
        {
            let entry = entry
                .map_err(|source| CoreError::ReadDirectory { path: self.root.clone(), source })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn read_document(&self, name: &str) -> Result<Value> {
        let path = self.path_for(name)?;
        if !path.is_file() {
            return Err(CoreError::DocumentNotFound { name: name.to_string() }.into());
        }
        let content = fs::read_to_string(&path)
            .map_err(|source| CoreError::ReadFile { path: path.clone(), source })?;
        let document = serde_json::from_str(&content)
            .map_err(|source| CoreError::ParseJson { path: path.clone(), source })?;
        Ok(document)
    }
}

impl DocumentSink for FsStore {
    fn write_document(&self, name: &str, document: &Value) -> Result<()> {
        let path = self.path_for(name)?;
        self.ensure()?;
        let rendered = serde_json::to_string_pretty(document)
            .map_err(|source| CoreError::SerialiseJson { source })?;
        fs::write(&path, rendered)
            .map_err(|source| CoreError::WriteFile { path: path.clone(), source })?;
        debug!(path = %path.display(), "document written");
        Ok(())
    }
}

impl PictureStore for FsStore {
    fn load_pictures(&self) -> Result<BTreeMap<String, String>> {
        if !self.contains(PICTURES_DOCUMENT) {
            return Ok(BTreeMap::new());
        }
        let document = self.read_document(PICTURES_DOCUMENT)?;
        let pictures = serde_json::from_value(document).map_err(|source| {
            CoreError::ParseJson { path: self.root.join(PICTURES_DOCUMENT), source }
        })?;
        Ok(pictures)
    }

    fn save_pictures(&self, pictures: &BTreeMap<String, String>) -> Result<()> {
        let document =
            serde_json::to_value(pictures).map_err(|source| CoreError::SerialiseJson { source })?;
        self.write_document(PICTURES_DOCUMENT, &document)
    }
}
