//! Line protocol shared by the context builder and the line pipeline.
//!
//! Every non-blank plaintext line is encrypted on its own and stored as one
//! base64 line. Blank lines are kept verbatim and never reach the cipher.
//! Content is split on `\n` with an optional preceding `\r`, so LF and CRLF
//! files compare the same way.

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::{DiffCryptError, Result};

/// Separator used when joining processed lines.
pub const LINE_SEPARATOR: &str = "\n";

/// Split text into lines, tolerating both LF and CRLF endings.
///
/// A trailing newline yields a trailing empty line, so joining the result
/// with [`LINE_SEPARATOR`] restores LF-normalized input exactly.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}

/// Join processed lines back into file content.
pub fn join_lines<S: AsRef<str>>(lines: &[S]) -> String {
    let mut out = String::new();
    for (idx, line) in lines.iter().enumerate() {
        if idx > 0 {
            out.push_str(LINE_SEPARATOR);
        }
        out.push_str(line.as_ref());
    }
    out
}

/// Whitespace-only lines are never encrypted.
pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Render ciphertext bytes as a stored line.
pub fn encode_line(ciphertext: &[u8]) -> String {
    STANDARD.encode(ciphertext)
}

/// Parse a stored line back into ciphertext bytes.
pub fn decode_line(line: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(line.trim())
        .map_err(|e| DiffCryptError::Decryption(format!("invalid base64 line: {e}")))
}
