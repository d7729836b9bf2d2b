//! # Cryptographic Operations
//!
//! Password-based AEAD encryption for individual lines and whole files.
//!
//! ## Algorithms
//!
//! - **Ciphers**: AES-256-GCM (default) or ChaCha20-Poly1305
//! - **Key size**: 256 bits (32 bytes)
//! - **Nonce size**: 96 bits (12 bytes), random per encryption
//! - **Key derivation**: Argon2id over a 16-byte salt, expanded with
//!   HKDF-SHA256 using the algorithm name as context, so one password never
//!   yields the same key for two ciphers
//!
//! ## Encrypted Data Format
//!
//! A single line (stored base64-encoded, see [`crate::lines`]):
//!
//! ```text
//! [version: 1][16-byte salt][12-byte nonce][ciphertext + 16-byte tag]
//! ```
//!
//! A whole (binary) file prepends a magic header to the same payload:
//!
//! ```text
//! [DIFFCRYPT][version: 1][16-byte salt][12-byte nonce][ciphertext + tag]
//! ```
//!
//! A [`PasswordCipher`] draws one salt per instance for everything it
//! encrypts, so a whole run pays for a single Argon2 derivation. Decryption
//! reads the salt out of each payload and caches one derived key per salt;
//! files mixing lines from several runs stay cheap to read.

use crate::cipher::LineCipher;
use crate::encoding::TextEncoding;
use crate::error::{DiffCryptError, Result};
use aes_gcm::Aes256Gcm;
use argon2::{Argon2, Params, Version};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::ChaCha20Poly1305;
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

pub const KEY_SIZE: usize = 32; // 256 bits
pub const NONCE_SIZE: usize = 12; // 96 bits
pub const SALT_SIZE: usize = 16;
pub const TAG_SIZE: usize = 16;
pub const FORMAT_VERSION: u8 = 1;

// Magic header to identify encrypted files
const MAGIC_HEADER: &[u8] = b"DIFFCRYPT";

const HEADER_SIZE: usize = 1 + SALT_SIZE + NONCE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Algorithm {
    #[default]
    Aes256Gcm,
    ChaCha20Poly1305,
}

impl Algorithm {
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Aes256Gcm => "aes-gcm",
            Algorithm::ChaCha20Poly1305 => "chacha20-poly1305",
        }
    }
}

impl FromStr for Algorithm {
    type Err = DiffCryptError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aes-gcm" | "aes-256-gcm" | "aes256gcm" => Ok(Algorithm::Aes256Gcm),
            "chacha20-poly1305" | "chacha20poly1305" | "chacha20" => {
                Ok(Algorithm::ChaCha20Poly1305)
            }
            _ => Err(DiffCryptError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_cost: 19 * 1024,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    /// Cheap parameters for tests. Never use for real data.
    pub fn insecure_fast() -> Self {
        Self {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }
}

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CryptoKey {
    #[zeroize(skip)]
    algorithm: Algorithm,
    key: [u8; KEY_SIZE],
}

impl fmt::Debug for CryptoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoKey")
            .field("algorithm", &self.algorithm)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl CryptoKey {
    /// Derive a key from a password and salt.
    pub fn derive(
        password: &str,
        salt: &[u8; SALT_SIZE],
        algorithm: Algorithm,
        params: &KdfParams,
    ) -> Result<Self> {
        let argon2_params = Params::new(
            params.memory_cost,
            params.time_cost,
            params.parallelism,
            Some(KEY_SIZE),
        )
        .map_err(|e| DiffCryptError::Crypto(format!("invalid kdf parameters: {e}")))?;
        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, argon2_params);

        let mut master = Zeroizing::new([0u8; KEY_SIZE]);
        argon2
            .hash_password_into(password.as_bytes(), salt, &mut master[..])
            .map_err(|e| DiffCryptError::Crypto(format!("key derivation failed: {e}")))?;

        let info = format!("diffcrypt line key/{}", algorithm.name());
        let mut key = [0u8; KEY_SIZE];
        Hkdf::<Sha256>::new(None, &master[..])
            .expand(info.as_bytes(), &mut key)
            .map_err(|e| DiffCryptError::Crypto(format!("key expansion failed: {e}")))?;

        Ok(Self { algorithm, key })
    }

    /// Encrypt with a fresh random nonce, returning `nonce || ciphertext`.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = match self.algorithm {
            Algorithm::Aes256Gcm => Aes256Gcm::new_from_slice(&self.key)
                .map_err(|e| DiffCryptError::Crypto(e.to_string()))?
                .encrypt(aes_gcm::Nonce::from_slice(&nonce_bytes), plaintext),
            Algorithm::ChaCha20Poly1305 => ChaCha20Poly1305::new_from_slice(&self.key)
                .map_err(|e| DiffCryptError::Crypto(e.to_string()))?
                .encrypt(chacha20poly1305::Nonce::from_slice(&nonce_bytes), plaintext),
        }
        .map_err(|e| DiffCryptError::Crypto(e.to_string()))?;

        let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    /// Decrypt `nonce || ciphertext` produced by [`CryptoKey::seal`].
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(DiffCryptError::Decryption("ciphertext too short".into()));
        }
        let (nonce_bytes, encrypted_data) = sealed.split_at(NONCE_SIZE);

        match self.algorithm {
            Algorithm::Aes256Gcm => Aes256Gcm::new_from_slice(&self.key)
                .map_err(|e| DiffCryptError::Crypto(e.to_string()))?
                .decrypt(aes_gcm::Nonce::from_slice(nonce_bytes), encrypted_data),
            Algorithm::ChaCha20Poly1305 => ChaCha20Poly1305::new_from_slice(&self.key)
                .map_err(|e| DiffCryptError::Crypto(e.to_string()))?
                .decrypt(chacha20poly1305::Nonce::from_slice(nonce_bytes), encrypted_data),
        }
        .map_err(|_| DiffCryptError::Decryption("wrong key or tampered data".into()))
    }
}

/// Password-keyed cipher used for both text lines and binary files.
pub struct PasswordCipher {
    algorithm: Algorithm,
    password: Zeroizing<String>,
    params: KdfParams,
    session_salt: [u8; SALT_SIZE],
    keys: Mutex<HashMap<[u8; SALT_SIZE], CryptoKey>>,
}

impl fmt::Debug for PasswordCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordCipher")
            .field("algorithm", &self.algorithm)
            .field("params", &self.params)
            .field("session_salt", &hex::encode(self.session_salt))
            .finish_non_exhaustive()
    }
}

impl PasswordCipher {
    pub fn new(password: &str, algorithm: Algorithm) -> Self {
        Self::with_params(password, algorithm, KdfParams::default())
    }

    pub fn with_params(password: &str, algorithm: Algorithm, params: KdfParams) -> Self {
        let mut session_salt = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut session_salt);
        Self {
            algorithm,
            password: Zeroizing::new(password.to_string()),
            params,
            session_salt,
            keys: Mutex::new(HashMap::new()),
        }
    }

    // The lock is held across derivation so concurrent callers needing the
    // same salt derive it once.
    fn key_for(&self, salt: &[u8; SALT_SIZE]) -> Result<CryptoKey> {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(key) = keys.get(salt) {
            return Ok(key.clone());
        }
        tracing::debug!(salt = %hex::encode(salt), "deriving key");
        let key = CryptoKey::derive(&self.password, salt, self.algorithm, &self.params)?;
        keys.insert(*salt, key.clone());
        Ok(key)
    }

    /// Encrypt raw bytes into the versioned line payload.
    pub fn encrypt_bytes(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let key = self.key_for(&self.session_salt)?;
        let sealed = key.seal(plaintext)?;

        let mut result = Vec::with_capacity(1 + SALT_SIZE + sealed.len());
        result.push(FORMAT_VERSION);
        result.extend_from_slice(&self.session_salt);
        result.extend_from_slice(&sealed);
        Ok(result)
    }

    /// Decrypt a versioned payload produced by [`PasswordCipher::encrypt_bytes`].
    pub fn decrypt_bytes(&self, payload: &[u8]) -> Result<Vec<u8>> {
        if !Self::is_payload(payload) {
            return Err(DiffCryptError::Decryption(match payload.first() {
                Some(&version) if payload.len() >= HEADER_SIZE + TAG_SIZE => {
                    format!("unsupported format version {version}")
                }
                _ => "ciphertext too short".into(),
            }));
        }
        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&payload[1..=SALT_SIZE]);

        self.key_for(&salt)?.open(&payload[1 + SALT_SIZE..])
    }

    /// Whether `payload` has the shape of [`PasswordCipher::encrypt_bytes`]
    /// output: a known version byte and room for salt, nonce and tag.
    /// Says nothing about whether it authenticates.
    pub fn is_payload(payload: &[u8]) -> bool {
        payload.len() >= HEADER_SIZE + TAG_SIZE && payload[0] == FORMAT_VERSION
    }

    /// Encrypt a whole file.
    pub fn encrypt_file_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        let payload = self.encrypt_bytes(data)?;
        let mut result = Vec::with_capacity(MAGIC_HEADER.len() + payload.len());
        result.extend_from_slice(MAGIC_HEADER);
        result.extend_from_slice(&payload);
        Ok(result)
    }

    /// Decrypt a whole file produced by [`PasswordCipher::encrypt_file_data`].
    pub fn decrypt_file_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        if !Self::is_encrypted_file(data) {
            return Err(DiffCryptError::Decryption(
                "Invalid encrypted data format".into(),
            ));
        }
        self.decrypt_bytes(&data[MAGIC_HEADER.len()..])
    }

    /// Check if data has our magic header
    pub fn is_encrypted_file(data: &[u8]) -> bool {
        data.len() >= MAGIC_HEADER.len() && &data[..MAGIC_HEADER.len()] == MAGIC_HEADER
    }
}

impl LineCipher for PasswordCipher {
    fn encrypt(&self, plaintext: &str, encoding: TextEncoding) -> Result<Vec<u8>> {
        self.encrypt_bytes(&encoding.encode(plaintext)?)
    }

    fn decrypt(&self, ciphertext: &[u8], encoding: TextEncoding) -> Result<String> {
        encoding.decode(&self.decrypt_bytes(ciphertext)?)
    }
}
