//! Encrypting and decrypting files and directory trees of a workspace.
//!
//! Text files (by extension) are processed line by line in place, reusing
//! committed ciphertext for unchanged lines. Everything else is encrypted
//! as a whole into a sibling `.enc` file.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::cipher::LineCipher;
use crate::config::{Settings, CONFIG_FILE};
use crate::context::EncryptionContextBuilder;
use crate::crypto::PasswordCipher;
use crate::encoding::TextEncoding;
use crate::error::{DiffCryptError, Result};
use crate::git::VersionControlGateway;
use crate::ignore::IgnoreRules;
use crate::lines::{decode_line, is_blank, split_lines};
use crate::pipeline::{decrypt_text, encrypt_text, plan, EncryptionReport};

const ENCRYPTED_EXTENSION: &str = ".enc";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Encrypt,
    Decrypt,
}

impl Operation {
    fn verb(self) -> &'static str {
        match self {
            Operation::Encrypt => "encrypt",
            Operation::Decrypt => "decrypt",
        }
    }
}

/// Where the result of processing a binary file is written.
pub fn target_path(path: &Path, operation: Operation) -> PathBuf {
    let name = path.as_os_str().to_string_lossy();
    match operation {
        Operation::Encrypt if !name.ends_with(ENCRYPTED_EXTENSION) => {
            PathBuf::from(format!("{name}{ENCRYPTED_EXTENSION}"))
        }
        Operation::Decrypt if name.ends_with(ENCRYPTED_EXTENSION) => {
            PathBuf::from(&name[..name.len() - ENCRYPTED_EXTENSION.len()])
        }
        _ => path.to_path_buf(),
    }
}

/// `path` below `root`, `/`-separated.
fn relative_to(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// The first non-blank line decoded, when it is shaped like an encrypted
/// line. Plaintext almost never passes this.
fn first_payload(content: &str) -> Option<Vec<u8>> {
    split_lines(content)
        .into_iter()
        .find(|line| !is_blank(line))
        .and_then(|line| decode_line(line).ok())
        .filter(|bytes| PasswordCipher::is_payload(bytes))
}

/// Totals for one `process_path` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    pub files: usize,
    pub skipped: usize,
    pub failed: usize,
    pub lines_reused: usize,
    pub lines_encrypted: usize,
}

enum FileOutcome {
    Done(Option<EncryptionReport>),
    Skipped(&'static str),
}

pub struct WorkspaceProcessor {
    root: PathBuf,
    settings: Settings,
    ignore: IgnoreRules,
    encoding: TextEncoding,
    cipher: Arc<PasswordCipher>,
    contexts: EncryptionContextBuilder,
}

impl WorkspaceProcessor {
    pub fn new(
        root: impl Into<PathBuf>,
        settings: Settings,
        cipher: Arc<PasswordCipher>,
    ) -> Result<Self> {
        let root = root.into();
        let gateway = VersionControlGateway::git(root.clone());
        Self::with_gateway(root, settings, cipher, gateway)
    }

    pub fn with_gateway(
        root: impl Into<PathBuf>,
        settings: Settings,
        cipher: Arc<PasswordCipher>,
        gateway: VersionControlGateway,
    ) -> Result<Self> {
        let root = root.into();
        let ignore = IgnoreRules::load(&root.join(&settings.ignore_file))?.with_patterns([
            ".git/**",
            CONFIG_FILE,
            settings.ignore_file.as_str(),
        ]);
        let encoding = settings.encoding();
        Ok(Self {
            root,
            settings,
            ignore,
            encoding,
            cipher,
            contexts: EncryptionContextBuilder::new(gateway),
        })
    }

    pub fn context_builder(&self) -> &EncryptionContextBuilder {
        &self.contexts
    }

    /// Absolute form of `path` with `.` components removed.
    fn resolve(&self, path: &Path) -> PathBuf {
        self.root
            .join(path)
            .components()
            .filter(|component| !matches!(component, Component::CurDir))
            .collect()
    }

    fn relative(&self, path: &Path) -> String {
        relative_to(&self.root, path)
    }

    /// Process a single file, or every non-ignored file below a directory.
    pub async fn process_path(&self, path: &Path, operation: Operation) -> Result<ProcessSummary> {
        let path = self.resolve(path);
        let metadata = tokio::fs::metadata(&path).await?;

        let files = if metadata.is_dir() {
            self.collect_files(&path).await?
        } else {
            vec![path]
        };

        let mut summary = ProcessSummary::default();
        for file in files {
            match self.process_file(&file, operation).await {
                Ok(FileOutcome::Done(report)) => {
                    summary.files += 1;
                    if let Some(report) = report {
                        summary.lines_reused += report.reused;
                        summary.lines_encrypted += report.encrypted;
                    }
                    info!(file = %self.relative(&file), "{}ed", operation.verb());
                }
                Ok(FileOutcome::Skipped(reason)) => {
                    summary.skipped += 1;
                    debug!(file = %self.relative(&file), reason, "skipped");
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    summary.failed += 1;
                    error!(
                        file = %self.relative(&file),
                        error = %err,
                        "failed to {}",
                        operation.verb()
                    );
                }
            }
        }
        Ok(summary)
    }

    async fn collect_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let dir = dir.to_path_buf();
        let root = self.root.clone();
        let ignore = self.ignore.clone();

        tokio::task::spawn_blocking(move || {
            let mut files = Vec::new();
            let walker = WalkDir::new(&dir)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| {
                    entry.depth() == 0 || !ignore.is_ignored(&relative_to(&root, entry.path()))
                });
            for entry in walker {
                let entry = entry.map_err(|err| DiffCryptError::Other(err.to_string()))?;
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
            Ok(files)
        })
        .await
        .map_err(|err| DiffCryptError::Other(err.to_string()))?
    }

    async fn process_file(&self, path: &Path, operation: Operation) -> Result<FileOutcome> {
        let is_text = self.settings.is_text_file(path);
        let is_enc = path.to_string_lossy().ends_with(ENCRYPTED_EXTENSION);

        match operation {
            Operation::Encrypt if is_text => Ok(match self.encrypt_text_file(path).await? {
                Some(report) => FileOutcome::Done(Some(report)),
                None => FileOutcome::Skipped("already encrypted"),
            }),
            Operation::Encrypt if is_enc => Ok(FileOutcome::Skipped("already encrypted")),
            Operation::Encrypt => self.encrypt_binary_file(path).await,
            Operation::Decrypt if is_enc => {
                self.decrypt_binary_file(path).await?;
                Ok(FileOutcome::Done(None))
            }
            Operation::Decrypt if is_text => {
                if self.decrypt_text_file(path).await? {
                    Ok(FileOutcome::Done(None))
                } else {
                    Ok(FileOutcome::Skipped("not encrypted"))
                }
            }
            Operation::Decrypt => Ok(FileOutcome::Skipped("not encrypted")),
        }
    }

    async fn read_plaintext(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        self.encoding.decode(&bytes).map_err(|err| {
            DiffCryptError::Other(format!(
                "{} is not valid {} text: {err}",
                path.display(),
                self.encoding
            ))
        })
    }

    /// Whether the first non-blank line already decrypts with our password.
    async fn looks_encrypted(&self, content: &str) -> Result<bool> {
        let Some(payload) = first_payload(content) else {
            return Ok(false);
        };
        let cipher = self.cipher.clone();
        tokio::task::spawn_blocking(move || cipher.decrypt_bytes(&payload).is_ok())
            .await
            .map_err(|err| DiffCryptError::Other(err.to_string()))
    }

    /// Encrypt a text file in place. `None` when it is already encrypted.
    pub async fn encrypt_text_file(&self, path: &Path) -> Result<Option<EncryptionReport>> {
        let path = self.resolve(path);
        let content = self.read_plaintext(&path).await?;
        if self.looks_encrypted(&content).await? {
            warn!(file = %self.relative(&path), "already encrypted, leaving it alone");
            return Ok(None);
        }

        let line_cipher: Arc<dyn LineCipher> = self.cipher.clone();
        let context = self
            .contexts
            .create_encryption_context(&path, &content, line_cipher, self.encoding)
            .await;

        let cipher = self.cipher.clone();
        let encoding = self.encoding;
        let (encrypted, report) = tokio::task::spawn_blocking(move || {
            encrypt_text(&content, &context, cipher.as_ref(), encoding)
        })
        .await
        .map_err(|err| DiffCryptError::Other(err.to_string()))??;

        tokio::fs::write(&path, encrypted).await?;
        debug!(
            file = %self.relative(&path),
            reused = report.reused,
            encrypted = report.encrypted,
            "text file encrypted"
        );
        Ok(Some(report))
    }

    /// Decrypt a text file in place. `false` when it holds no encrypted
    /// lines and was left alone.
    ///
    /// Only a well-formed first line that fails to authenticate counts as a
    /// wrong password.
    pub async fn decrypt_text_file(&self, path: &Path) -> Result<bool> {
        let path = self.resolve(path);
        let content = match String::from_utf8(tokio::fs::read(&path).await?) {
            Ok(content) if first_payload(&content).is_some() => content,
            _ => {
                debug!(file = %self.relative(&path), "no encrypted lines, not decrypting");
                return Ok(false);
            }
        };

        let cipher = self.cipher.clone();
        let encoding = self.encoding;
        let target = path.clone();
        let plaintext = tokio::task::spawn_blocking(move || {
            decrypt_text(&target, &content, cipher.as_ref(), encoding)
        })
        .await
        .map_err(|err| DiffCryptError::Other(err.to_string()))??;

        tokio::fs::write(&path, encoding.encode(&plaintext)?).await?;
        Ok(true)
    }

    /// Report how many lines of a plaintext file would be reused.
    /// `None` when the file is currently encrypted.
    pub async fn plan_text_file(&self, path: &Path) -> Result<Option<EncryptionReport>> {
        let path = self.resolve(path);
        let content = self.read_plaintext(&path).await?;
        if self.looks_encrypted(&content).await? {
            return Ok(None);
        }
        let line_cipher: Arc<dyn LineCipher> = self.cipher.clone();
        let context = self
            .contexts
            .create_encryption_context(&path, &content, line_cipher, self.encoding)
            .await;
        Ok(Some(plan(&content, &context)))
    }

    async fn encrypt_binary_file(&self, path: &Path) -> Result<FileOutcome> {
        let data = tokio::fs::read(path).await?;
        if data.is_empty() {
            warn!(file = %self.relative(path), "empty file, skipping encryption");
            return Ok(FileOutcome::Skipped("empty"));
        }

        let cipher = self.cipher.clone();
        let encrypted = tokio::task::spawn_blocking(move || cipher.encrypt_file_data(&data))
            .await
            .map_err(|err| DiffCryptError::Other(err.to_string()))??;

        tokio::fs::write(target_path(path, Operation::Encrypt), encrypted).await?;
        if self.settings.delete_original {
            tokio::fs::remove_file(path).await?;
        }
        Ok(FileOutcome::Done(None))
    }

    async fn decrypt_binary_file(&self, path: &Path) -> Result<()> {
        let data = tokio::fs::read(path).await?;

        let cipher = self.cipher.clone();
        let decrypted = tokio::task::spawn_blocking(move || cipher.decrypt_file_data(&data))
            .await
            .map_err(|err| DiffCryptError::Other(err.to_string()))?
            .map_err(|_| DiffCryptError::WrongPassword {
                path: path.to_path_buf(),
            })?;

        tokio::fs::write(target_path(path, Operation::Decrypt), decrypted).await?;
        if self.settings.delete_original {
            tokio::fs::remove_file(path).await?;
        }
        Ok(())
    }
}
