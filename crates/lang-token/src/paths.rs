//! Filesystem layout helpers for lang-token.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::Result;

use crate::error::CoreError;

/// Environment variable that overrides the default root directory.
const ROOT_ENV_KEY: &str = "LANG_TOKEN_ROOT";
const DEFAULT_ROOT_DIRNAME: &str = ".lang-token";
const CONFIG_FILENAME: &str = "config.toml";

/// Descriptor for the on-disk directory structure.
#[derive(Clone, Debug)]
pub struct Layout {
    root: PathBuf,
    tokens_dir: PathBuf,
    cache_dir: PathBuf,
    logs_dir: PathBuf,
}

impl Layout {
    /// Construct a new layout without touching the filesystem.
    pub fn new(root: PathBuf) -> Self {
        let tokens_dir = root.join("i18n");
        let cache_dir = root.join("cache");
        let logs_dir = root.join("logs");

        Self { root, tokens_dir, cache_dir, logs_dir }
    }

    /// Ensure that all directories exist on disk.
    pub fn ensure(&self) -> Result<()> {
        for dir in [self.root(), self.tokens_dir(), self.cache_dir(), self.logs_dir()] {
            if !dir.exists() {
                fs::create_dir_all(dir).map_err(|source| CoreError::CreateDirectory {
                    path: dir.to_path_buf(),
                    source,
                })?;
            }
        }
        Ok(())
    }

    /// Root directory path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the locale documents and uploaded pictures.
    pub fn tokens_dir(&self) -> &Path {
        &self.tokens_dir
    }

    /// Directory for the offline copies of the last loaded documents.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Directory that stores server logs.
    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    /// Path to the editor configuration file.
    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILENAME)
    }

    /// Path to a document inside the tokens directory.
    pub fn document_path(&self, name: &str) -> PathBuf {
        self.tokens_dir.join(name)
    }
}

/// Determine the default root directory for lang-token.
pub fn default_root() -> Result<PathBuf> {
    if let Ok(value) = env::var(ROOT_ENV_KEY) {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value));
        }
    }

    let home = user_home_dir().ok_or(CoreError::HomeDirectoryUnknown)?;
    Ok(home.join(DEFAULT_ROOT_DIRNAME))
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: PathBuf) -> Result<PathBuf> {
    if let Some(str_path) = path.to_str() {
        if let Some(stripped) = str_path.strip_prefix('~') {
            let home = user_home_dir().ok_or(CoreError::HomeDirectoryUnknown)?;
            if stripped.is_empty() {
                return Ok(home);
            }
            let stripped = stripped.strip_prefix('/').unwrap_or(stripped);
            return Ok(home.join(stripped));
        }
    }
    Ok(path)
}

fn user_home_dir() -> Option<PathBuf> {
    if let Ok(home) = env::var("HOME") {
        if !home.is_empty() {
            return Some(PathBuf::from(home));
        }
    }

    if let Ok(profile) = env::var("USERPROFILE") {
        if !profile.is_empty() {
            return Some(PathBuf::from(profile));
        }
    }

    None
}
