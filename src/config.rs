//! Layered settings: built-in defaults, the user's config file, the
//! workspace's `.diffcrypt.toml`, then `DIFFCRYPT_*` environment variables.

use crate::crypto::Algorithm;
use crate::encoding::TextEncoding;
use crate::error::{DiffCryptError, Result};
use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const CONFIG_FILE: &str = ".diffcrypt.toml";
pub const DEFAULT_IGNORE_FILE: &str = ".diffcryptignore";
const ENV_PREFIX: &str = "DIFFCRYPT_";

const DEFAULT_TEXT_EXTENSIONS: &[&str] = &[
    ".txt", ".md", ".json", ".yaml", ".yml", ".toml", ".env", ".ini", ".cfg", ".conf", ".csv",
    ".xml", ".html", ".css", ".js", ".ts", ".py", ".rs", ".sh",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub algorithm: String,
    pub encoding: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub text_file_extensions: Vec<String>,
    pub ignore_file: String,
    pub delete_original: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default().name().to_string(),
            encoding: TextEncoding::default().name().to_string(),
            password: None,
            text_file_extensions: DEFAULT_TEXT_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            ignore_file: DEFAULT_IGNORE_FILE.to_string(),
            delete_original: true,
        }
    }
}

impl Settings {
    /// Load settings for the workspace rooted at `root`.
    pub fn load(root: &Path) -> Result<Self> {
        let user_file = dirs::config_dir().map(|dir| dir.join("diffcrypt").join("config.toml"));
        Self::load_from(user_file.as_deref(), root)
    }

    /// Load settings from an explicit user file (if any) and the workspace.
    pub fn load_from(user_file: Option<&Path>, root: &Path) -> Result<Self> {
        let mut builder = Config::builder();
        let workspace_file = root.join(CONFIG_FILE);
        for path in user_file.into_iter().chain(Some(workspace_file.as_path())) {
            let name = path.to_str().ok_or_else(|| {
                DiffCryptError::Config(format!("Invalid config path: {}", path.display()))
            })?;
            builder = builder.add_source(File::new(name, FileFormat::Toml).required(false));
        }

        let mut settings: Settings = builder
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|err| {
                DiffCryptError::Config(format!("Failed to load config file: {err}"))
            })?;

        // Apply environment variable overrides manually
        if let Ok(password) = env::var(format!("{ENV_PREFIX}PASSWORD")) {
            settings.password = Some(password);
        }
        if let Ok(algorithm) = env::var(format!("{ENV_PREFIX}ALGORITHM")) {
            settings.algorithm = algorithm;
        }
        if let Ok(encoding) = env::var(format!("{ENV_PREFIX}ENCODING")) {
            settings.encoding = encoding;
        }

        Ok(settings)
    }

    pub fn algorithm(&self) -> Result<Algorithm> {
        self.algorithm.parse()
    }

    /// Configured encoding, falling back to UTF-8 when unsupported.
    pub fn encoding(&self) -> TextEncoding {
        self.encoding.parse().unwrap_or_else(|_| {
            warn!(encoding = %self.encoding, "unsupported encoding, using utf-8 instead");
            TextEncoding::Utf8
        })
    }

    pub fn password(&self) -> Result<&str> {
        match self.password.as_deref() {
            Some(password) if !password.is_empty() => Ok(password),
            _ => Err(DiffCryptError::MissingPassword),
        }
    }

    pub fn is_text_file(&self, path: &Path) -> bool {
        let Some(ext) = path.extension() else {
            return false;
        };
        let ext = format!(".{}", ext.to_string_lossy().to_lowercase());
        self.text_file_extensions
            .iter()
            .any(|candidate| candidate.to_lowercase() == ext)
    }

    /// Write the default settings to `<root>/.diffcrypt.toml`.
    ///
    /// Returns `None` when the file already exists.
    pub fn write_default(root: &Path) -> Result<Option<PathBuf>> {
        let path = root.join(CONFIG_FILE);
        if path.exists() {
            return Ok(None);
        }
        let body = toml::to_string_pretty(&Settings::default())
            .map_err(|err| DiffCryptError::Config(err.to_string()))?;
        fs::write(&path, body)?;
        Ok(Some(path))
    }
}
