use std::{
    fs,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{error::CoreError, paths::Layout};

/// Reference document used when the config does not name one.
pub const DEFAULT_REFERENCE: &str = "en.json";
/// Default port of the file service.
pub const DEFAULT_PORT: u16 = 3033;

/// Settings for the editing session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EditorSettings {
    /// File name of the reference (authoritative) language document.
    #[serde(default = "default_reference")]
    pub reference: String,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self { reference: default_reference() }
    }
}

/// Settings for the HTTP file service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerSettings {
    /// Bind address for `lang-token serve`.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    /// Token clients must present. Unset disables authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// Externally visible base URL, used for picture references.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: default_bind(), auth_token: None, public_url: None }
    }
}

fn default_reference() -> String {
    DEFAULT_REFERENCE.to_string()
}

fn default_bind() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
struct EditorConfigDocument {
    #[serde(default)]
    editor: EditorSettings,
    #[serde(default)]
    server: ServerSettings,
}

/// Editor configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default)]
pub struct EditorConfig {
    document: EditorConfigDocument,
    source: Option<PathBuf>,
}

impl EditorConfig {
    /// Load the workspace config, falling back to defaults when the file is absent.
    pub fn load(layout: &Layout) -> Result<Self> {
        let path = layout.config_path();
        if path.exists() { Self::from_file(&path) } else { Ok(Self::default()) }
    }

    /// Load from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|source| CoreError::ReadFile { path: path.to_path_buf(), source })?;
        let mut document: EditorConfigDocument = toml_edit::de::from_str(&content)
            .map_err(|source| CoreError::ParseConfig { path: path.to_path_buf(), source })?;

        document.editor.reference = document.editor.reference.trim().to_string();
        document.server.auth_token = normalise_optional(document.server.auth_token.take());
        document.server.public_url = normalise_optional(document.server.public_url.take());

        let config = EditorConfig { document, source: Some(path.to_path_buf()) };
        config.validate()?;
        Ok(config)
    }

    /// Persist to TOML format.
    pub fn to_toml_string(&self) -> Result<String> {
        toml_edit::ser::to_string_pretty(&self.document)
            .map_err(|source| CoreError::SerialiseConfig { source }.into())
    }

    pub fn editor(&self) -> &EditorSettings {
        &self.document.editor
    }

    pub fn server(&self) -> &ServerSettings {
        &self.document.server
    }

    pub fn server_mut(&mut self) -> &mut ServerSettings {
        &mut self.document.server
    }

    /// Path on disk, if loaded from file.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// URL under which the file service exposes a stored file.
    pub fn file_url(&self, name: &str) -> Result<Url> {
        let server = &self.document.server;
        let mut base = match server.public_url.as_deref() {
            Some(raw) => Url::parse(raw).map_err(|source| CoreError::InvalidPublicUrl {
                url: raw.to_string(),
                source,
            })?,
            None => {
                let raw = format!("http://{}/", server.bind);
                Url::parse(&raw).map_err(|source| CoreError::InvalidPublicUrl { url: raw, source })?
            }
        };
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let url = base.join(&format!("file/{name}")).map_err(|source| {
            CoreError::InvalidPublicUrl { url: base.to_string(), source }
        })?;
        Ok(url)
    }

    fn validate(&self) -> Result<()> {
        if self.document.editor.reference.is_empty() {
            return Err(CoreError::ReferenceNameEmpty.into());
        }
        if let Some(raw) = self.document.server.public_url.as_deref() {
            Url::parse(raw).map_err(|source| CoreError::InvalidPublicUrl {
                url: raw.to_string(),
                source,
            })?;
        }
        Ok(())
    }
}

fn normalise_optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
