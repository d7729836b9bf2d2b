//! Per-line re-encryption decisions over an [`EncryptionContext`].
//!
//! Both queries read the same immutable map, so they always agree: a line
//! has a reusable ciphertext exactly when it does not need re-encryption.

use crate::context::EncryptionContext;

/// `true` unless the line can keep its committed ciphertext.
pub fn should_re_encrypt_line(line_number: usize, context: &EncryptionContext) -> bool {
    !context.is_git_repo()
        || context.is_new_file()
        || !context.unchanged_lines().contains_key(&line_number)
}

/// The committed ciphertext to reuse for a 1-based line number.
pub fn original_encrypted_line(line_number: usize, context: &EncryptionContext) -> Option<&str> {
    if should_re_encrypt_line(line_number, context) {
        return None;
    }
    context.unchanged_lines().get(&line_number).map(String::as_str)
}
