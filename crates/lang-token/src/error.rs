use std::{
    io,
    path::{Path, PathBuf},
};

use serde_json::Error as JsonError;
use thiserror::Error;
use toml_edit::{de::Error as TomlDeError, ser::Error as TomlSerError};
use url::ParseError as UrlParseError;

use crate::tokens::TokenError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid document name '{name}'")]
    InvalidDocumentName { name: String },

    #[error("document '{name}' not found")]
    DocumentNotFound { name: String },

    #[error("no document selected")]
    NoDocumentSelected,

    #[error("reference document '{name}' is not loaded")]
    ReferenceUnavailable { name: String },

    #[error("reference document '{name}' cannot be edited")]
    ReferenceNotEditable { name: String },

    #[error("picture metadata could not be loaded: {reason}")]
    PicturesUnavailable { reason: String },

    #[error("failed to create directory {path}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read directory {path}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {path}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse JSON document at {path}")]
    ParseJson {
        path: PathBuf,
        #[source]
        source: JsonError,
    },

    #[error("failed to serialise JSON document")]
    SerialiseJson {
        #[source]
        source: JsonError,
    },

    #[error("failed to parse config file {path}")]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: TomlDeError,
    },

    #[error("failed to serialise config to TOML")]
    SerialiseConfig {
        #[source]
        source: TomlSerError,
    },

    #[error("invalid public url '{url}'")]
    InvalidPublicUrl {
        url: String,
        #[source]
        source: UrlParseError,
    },

    #[error("reference document name cannot be empty")]
    ReferenceNameEmpty,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("unable to determine user home directory for LANG_TOKEN_ROOT")]
    HomeDirectoryUnknown,
}

impl CoreError {
    pub fn message_key(&self) -> &'static str {
        match self {
            CoreError::InvalidDocumentName { .. } => "core.invalid_document_name",
            CoreError::DocumentNotFound { .. } => "core.document_not_found",
            CoreError::NoDocumentSelected => "core.no_document_selected",
            CoreError::ReferenceUnavailable { .. } => "core.reference_unavailable",
            CoreError::ReferenceNotEditable { .. } => "core.reference_not_editable",
            CoreError::PicturesUnavailable { .. } => "core.pictures_unavailable",
            CoreError::CreateDirectory { .. } => "core.create_dir_failed",
            CoreError::ReadDirectory { .. } => "core.read_dir_failed",
            CoreError::ReadFile { .. } => "core.read_file_failed",
            CoreError::WriteFile { .. } => "core.write_file_failed",
            CoreError::ParseJson { .. } => "core.parse_json_failed",
            CoreError::SerialiseJson { .. } => "core.serialise_json_failed",
            CoreError::ParseConfig { .. } => "core.parse_config_failed",
            CoreError::SerialiseConfig { .. } => "core.serialise_config_failed",
            CoreError::InvalidPublicUrl { .. } => "core.invalid_public_url",
            CoreError::ReferenceNameEmpty => "core.reference_name_empty",
            CoreError::Token(_) => "core.conflicting_key",
            CoreError::HomeDirectoryUnknown => "core.home_dir_unknown",
        }
    }

    pub fn placeholders(&self) -> Vec<(&'static str, String)> {
        match self {
            CoreError::InvalidDocumentName { name }
            | CoreError::DocumentNotFound { name }
            | CoreError::ReferenceUnavailable { name }
            | CoreError::ReferenceNotEditable { name } => vec![("name", name.clone())],
            CoreError::PicturesUnavailable { reason } => vec![("error", reason.clone())],
            CoreError::CreateDirectory { path, source }
            | CoreError::ReadDirectory { path, source }
            | CoreError::ReadFile { path, source }
            | CoreError::WriteFile { path, source } => {
                vec![("path", display_path(path)), ("error", source.to_string())]
            }
            CoreError::ParseJson { path, source } => {
                vec![("path", display_path(path)), ("error", source.to_string())]
            }
            CoreError::ParseConfig { path, source } => {
                vec![("path", display_path(path)), ("error", source.to_string())]
            }
            CoreError::SerialiseJson { source } => vec![("error", source.to_string())],
            CoreError::SerialiseConfig { source } => vec![("error", source.to_string())],
            CoreError::InvalidPublicUrl { url, source } => {
                vec![("url", url.clone()), ("error", source.to_string())]
            }
            CoreError::Token(TokenError::ConflictingKey { key, ancestor }) => {
                vec![("key", key.clone()), ("ancestor", ancestor.clone())]
            }
            CoreError::NoDocumentSelected
            | CoreError::ReferenceNameEmpty
            | CoreError::HomeDirectoryUnknown => Vec::new(),
        }
    }
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}
