//! The cipher capability the diff engine and the line pipeline depend on.

use crate::encoding::TextEncoding;
use crate::error::Result;

/// Encrypts and decrypts single plaintext lines.
///
/// Implementations must be usable from blocking worker threads; the context
/// builder decrypts baseline lines concurrently.
pub trait LineCipher: Send + Sync {
    /// Encrypt one plaintext line into raw ciphertext bytes.
    fn encrypt(&self, plaintext: &str, encoding: TextEncoding) -> Result<Vec<u8>>;

    /// Decrypt raw ciphertext bytes into a plaintext line.
    ///
    /// Fails with [`DiffCryptError::Decryption`](crate::DiffCryptError::Decryption)
    /// on authentication failure, malformed input or a wrong key.
    fn decrypt(&self, ciphertext: &[u8], encoding: TextEncoding) -> Result<String>;
}
