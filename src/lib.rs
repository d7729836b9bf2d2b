//! # diffcrypt
//!
//! Line-level encryption for text files kept in git, built so that editing one
//! line of a plaintext file changes one line of the committed ciphertext.
//!
//! ## Features
//!
//! - **Diff-Aware Re-encryption**: Lines unchanged since `HEAD` keep their committed ciphertext byte for byte
//! - **Authenticated Encryption**: AES-256-GCM or ChaCha20-Poly1305 with Argon2id password-derived keys
//! - **Whole-File Mode**: Non-text files are encrypted into a sibling `.enc` file
//! - **Safe Degradation**: Missing git, untracked files and undecryptable history all fall back to re-encrypting
//! - **Simple CLI**: `init`, `encrypt`, `decrypt` and `status`
//!
//! ## Quick Start
//!
//! ```bash
//! cd my-repo
//! diffcrypt init
//! export DIFFCRYPT_PASSWORD='correct horse battery staple'
//!
//! diffcrypt encrypt
//! git add . && git commit -m "Add encrypted notes"
//!
//! diffcrypt decrypt
//! # edit secrets/notes.md ...
//! diffcrypt encrypt
//! git diff   # only the edited lines show up
//! ```
//!
//! ## How It Works
//!
//! Each non-blank line is encrypted on its own with a fresh nonce, so
//! re-encrypting an unchanged line would still produce a different
//! ciphertext. Before encrypting a file, diffcrypt:
//!
//! 1. Asks git whether the file is tracked and reads its content at `HEAD`
//! 2. Decrypts every committed line in parallel
//! 3. Aligns the decrypted lines against the current plaintext
//!    ([longest common subsequence](align), plus a pass for moved lines)
//! 4. Reuses the committed ciphertext for every aligned line and encrypts
//!    the rest
//!
//! ```text
//! HEAD:file → decrypt lines → align with working copy → EncryptionContext
//! EncryptionContext + working copy → keep or encrypt each line → file
//! ```
//!
//! ## Module Overview
//!
//! - [`align`] - Line alignment between committed and current text
//! - [`context`] - Builds the per-file [`EncryptionContext`]
//! - [`policy`] - Keep-or-encrypt decisions for individual lines
//! - [`pipeline`] - Line-by-line encryption and decryption of text
//! - [`git`] - Git queries behind a failure-absorbing gateway
//! - [`crypto`] - Key derivation and authenticated encryption
//! - [`workspace`] - File and directory processing
//! - [`config`] - Layered settings
//! - [`error`] - Error types and unified error handling
//!
//! ## Cryptography Details
//!
//! - **KDF**: Argon2id over the password and a random 16-byte salt, expanded with HKDF-SHA256
//! - **Cipher**: AES-256-GCM (default) or ChaCha20-Poly1305, 96-bit random nonces
//! - **Line format**: base64 of `[version][16-byte salt][12-byte nonce][ciphertext + 16-byte tag]`
//! - **File format**: `[DIFFCRYPT]` magic header followed by the same payload
//!
//! Lines that fail to decrypt while building a context are replaced by
//! unique sentinels, so they can never be matched and are re-encrypted.

pub mod align;
pub mod cipher;
pub mod config;
pub mod context;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod git;
pub mod ignore;
pub mod lines;
pub mod pipeline;
pub mod policy;
pub mod workspace;

pub use cipher::LineCipher;
pub use context::{EncryptionContext, EncryptionContextBuilder, FileTrackingStatus};
pub use crypto::{Algorithm, PasswordCipher};
pub use encoding::TextEncoding;
pub use error::{DiffCryptError, Result};
pub use git::{GitCli, VersionControl, VersionControlGateway};
pub use policy::{original_encrypted_line, should_re_encrypt_line};
pub use workspace::{Operation, ProcessSummary, WorkspaceProcessor};
