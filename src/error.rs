use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiffCryptError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Failed to decrypt {}: likely wrong password", path.display())]
    WrongPassword { path: PathBuf },

    #[error("`{command}` exited with {status}: {stderr}")]
    GitCommand {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Unsupported text encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("No password configured. Set DIFFCRYPT_PASSWORD or `password` in .diffcrypt.toml")]
    MissingPassword,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not in a git repository")]
    NotInGitRepo,

    #[error("{0}")]
    Other(String),
}

impl DiffCryptError {
    /// Errors that make continuing with the remaining files pointless.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DiffCryptError::WrongPassword { .. } | DiffCryptError::MissingPassword
        )
    }
}

pub type Result<T> = std::result::Result<T, DiffCryptError>;
