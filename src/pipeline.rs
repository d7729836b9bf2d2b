//! Line-by-line encryption and decryption of text content.

use std::path::Path;

use tracing::warn;

use crate::cipher::LineCipher;
use crate::context::EncryptionContext;
use crate::encoding::TextEncoding;
use crate::error::{DiffCryptError, Result};
use crate::lines::{decode_line, encode_line, is_blank, join_lines, split_lines};
use crate::policy::{original_encrypted_line, should_re_encrypt_line};

/// What happened to each line of one encrypted text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncryptionReport {
    pub total: usize,
    pub blank: usize,
    pub reused: usize,
    pub encrypted: usize,
}

impl EncryptionReport {
    fn record(&mut self, line: &str, line_number: usize, context: &EncryptionContext) {
        self.total += 1;
        if is_blank(line) {
            self.blank += 1;
        } else if should_re_encrypt_line(line_number, context) {
            self.encrypted += 1;
        } else {
            self.reused += 1;
        }
    }
}

/// Count what [`encrypt_text`] would do, without encrypting anything.
pub fn plan(content: &str, context: &EncryptionContext) -> EncryptionReport {
    let mut report = EncryptionReport::default();
    for (idx, line) in split_lines(content).into_iter().enumerate() {
        report.record(line, idx + 1, context);
    }
    report
}

/// Encrypt every non-blank line, reusing committed ciphertext where the
/// context allows it.
pub fn encrypt_text(
    content: &str,
    context: &EncryptionContext,
    cipher: &dyn LineCipher,
    encoding: TextEncoding,
) -> Result<(String, EncryptionReport)> {
    let mut report = EncryptionReport::default();
    let mut out = Vec::new();

    for (idx, line) in split_lines(content).into_iter().enumerate() {
        let line_number = idx + 1;
        report.record(line, line_number, context);

        if is_blank(line) {
            out.push(line.to_string());
        } else if let Some(original) = original_encrypted_line(line_number, context) {
            out.push(original.to_string());
        } else {
            out.push(encode_line(&cipher.encrypt(line, encoding)?));
        }
    }

    Ok((join_lines(&out), report))
}

/// Decrypt every non-blank line.
///
/// If the first non-blank line does not decrypt the whole file is rejected
/// as [`DiffCryptError::WrongPassword`]. Later lines that fail are kept as
/// they are.
pub fn decrypt_text(
    path: &Path,
    content: &str,
    cipher: &dyn LineCipher,
    encoding: TextEncoding,
) -> Result<String> {
    let mut seen_content = false;
    let mut out = Vec::new();

    for (idx, line) in split_lines(content).into_iter().enumerate() {
        if is_blank(line) {
            out.push(line.to_string());
            continue;
        }

        match decode_line(line).and_then(|bytes| cipher.decrypt(&bytes, encoding)) {
            Ok(plaintext) => out.push(plaintext),
            Err(err) if !seen_content => {
                tracing::debug!(error = %err, "first line did not decrypt");
                return Err(DiffCryptError::WrongPassword {
                    path: path.to_path_buf(),
                });
            }
            Err(err) => {
                warn!(path = %path.display(), line = idx + 1, error = %err, "leaving line as-is");
                out.push(line.to_string());
            }
        }
        seen_content = true;
    }

    Ok(join_lines(&out))
}
