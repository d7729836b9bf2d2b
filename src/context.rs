//! Builds the per-file [`EncryptionContext`]: which lines of the current
//! content can reuse their committed ciphertext.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use rand::rngs::OsRng;
use rand::RngCore;
use tokio::task::JoinSet;
use tracing::{debug, instrument};

use crate::align::align_lines;
use crate::cipher::LineCipher;
use crate::encoding::TextEncoding;
use crate::git::VersionControlGateway;
use crate::lines::{decode_line, is_blank, split_lines};

const SENTINEL_PREFIX: &str = "\u{0}diffcrypt-undecryptable:";

/// Outcome of comparing a file against its last committed version.
///
/// Built once per file and never modified afterwards. Keys of the unchanged
/// map are 1-based line numbers of the current content; values are the
/// committed ciphertext lines, exactly as stored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncryptionContext {
    is_new_file: bool,
    is_git_repo: bool,
    unchanged_lines: BTreeMap<usize, String>,
}

impl EncryptionContext {
    fn without_baseline(is_new_file: bool, is_git_repo: bool) -> Self {
        Self {
            is_new_file,
            is_git_repo,
            unchanged_lines: BTreeMap::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        is_new_file: bool,
        is_git_repo: bool,
        unchanged_lines: BTreeMap<usize, String>,
    ) -> Self {
        Self {
            is_new_file,
            is_git_repo,
            unchanged_lines,
        }
    }

    pub fn is_new_file(&self) -> bool {
        self.is_new_file
    }

    pub fn is_git_repo(&self) -> bool {
        self.is_git_repo
    }

    pub fn unchanged_lines(&self) -> &BTreeMap<usize, String> {
        &self.unchanged_lines
    }
}

/// Tracked status of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTrackingStatus {
    pub is_new_file: bool,
}

/// Produces [`EncryptionContext`]s for files of one workspace.
///
/// The builder is meant to live for a whole session: the repository check
/// happens once, and contexts for different files can be built
/// concurrently from the same builder.
pub struct EncryptionContextBuilder {
    gateway: VersionControlGateway,
}

impl EncryptionContextBuilder {
    pub fn new(gateway: VersionControlGateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &VersionControlGateway {
        &self.gateway
    }

    /// Last resolved repository state.
    pub fn is_git_repository(&self) -> bool {
        self.gateway.is_git_repository()
    }

    pub async fn tracking_status(&self, path: &Path) -> FileTrackingStatus {
        FileTrackingStatus {
            is_new_file: !self.gateway.is_file_tracked(path).await,
        }
    }

    /// Compare `current` against the committed version of `path`.
    ///
    /// Never fails: missing git, untracked files, absent history and
    /// undecryptable baseline lines all degrade to re-encrypting more lines.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn create_encryption_context(
        &self,
        path: &Path,
        current: &str,
        cipher: Arc<dyn LineCipher>,
        encoding: TextEncoding,
    ) -> EncryptionContext {
        let is_git_repo = self.gateway.detect_repository().await;
        let status = self.tracking_status(path).await;
        if !is_git_repo || status.is_new_file {
            return EncryptionContext::without_baseline(status.is_new_file, is_git_repo);
        }

        let committed = self.gateway.fetch_committed_content(path).await;
        if committed.is_empty() {
            return EncryptionContext::without_baseline(true, is_git_repo);
        }

        let baseline = decrypt_baseline(&committed, cipher, encoding).await;
        let baseline: Vec<&str> = baseline.iter().map(String::as_str).collect();
        let current: Vec<&str> = split_lines(current)
            .into_iter()
            .map(|line| if is_blank(line) { "" } else { line })
            .collect();

        let unchanged_lines: BTreeMap<usize, String> = align_lines(&baseline, &current)
            .into_iter()
            .map(|(i, j)| (j + 1, committed[i].clone()))
            .collect();

        debug!(
            baseline = committed.len(),
            current = current.len(),
            unchanged = unchanged_lines.len(),
            "aligned against committed content"
        );

        EncryptionContext {
            is_new_file: false,
            is_git_repo,
            unchanged_lines,
        }
    }
}

/// Decrypt every committed line on its own blocking task.
///
/// Results land at their original index. Blank lines skip the cipher and
/// become empty strings; lines that fail (or whose task dies) become unique
/// sentinels.
async fn decrypt_baseline(
    committed: &[String],
    cipher: Arc<dyn LineCipher>,
    encoding: TextEncoding,
) -> Vec<String> {
    let mut decrypted: Vec<Option<String>> = vec![None; committed.len()];
    let mut tasks = JoinSet::new();

    for (idx, line) in committed.iter().enumerate() {
        if is_blank(line) {
            decrypted[idx] = Some(String::new());
            continue;
        }
        let cipher = Arc::clone(&cipher);
        let line = line.clone();
        tasks.spawn_blocking(move || {
            let plaintext = decode_line(&line).and_then(|bytes| cipher.decrypt(&bytes, encoding));
            (idx, plaintext)
        });
    }

    let mut failures = 0usize;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((idx, Ok(plaintext))) => decrypted[idx] = Some(plaintext),
            Ok((idx, Err(err))) => {
                debug!(line = idx + 1, error = %err, "baseline line did not decrypt");
                failures += 1;
            }
            Err(err) => {
                debug!(error = %err, "baseline decryption task failed");
                failures += 1;
            }
        }
    }
    if failures > 0 {
        debug!(failures, total = committed.len(), "baseline lines replaced by sentinels");
    }

    decrypted
        .into_iter()
        .map(|line| line.unwrap_or_else(sentinel))
        .collect()
}

/// A string no real line can equal, fresh for every call.
fn sentinel() -> String {
    let mut token = [0u8; 16];
    OsRng.fill_bytes(&mut token);
    format!("{SENTINEL_PREFIX}{}", hex::encode(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DiffCryptError, Result};
    use crate::git::VersionControl;
    use crate::lines::encode_line;
    use crate::policy::{original_encrypted_line, should_re_encrypt_line};
    use async_trait::async_trait;

    /// "Encrypts" by wrapping in `enc(...)`; anything else fails to decrypt.
    struct MockCipher;

    impl LineCipher for MockCipher {
        fn encrypt(&self, plaintext: &str, _encoding: TextEncoding) -> Result<Vec<u8>> {
            Ok(format!("enc({plaintext})").into_bytes())
        }

        fn decrypt(&self, ciphertext: &[u8], _encoding: TextEncoding) -> Result<String> {
            let text = String::from_utf8_lossy(ciphertext);
            text.strip_prefix("enc(")
                .and_then(|rest| rest.strip_suffix(')'))
                .map(str::to_owned)
                .ok_or_else(|| DiffCryptError::Decryption("Decryption failed for test".into()))
        }
    }

    struct StubRepo {
        is_repo: bool,
        tracked: bool,
        committed: Vec<String>,
    }

    #[async_trait]
    impl VersionControl for StubRepo {
        async fn is_inside_repository(&self) -> Result<bool> {
            Ok(self.is_repo)
        }

        async fn is_tracked(&self, _relative_path: &str) -> Result<bool> {
            if self.tracked {
                Ok(true)
            } else {
                Err(DiffCryptError::Other("not tracked".into()))
            }
        }

        async fn committed_content(&self, _relative_path: &str) -> Result<Option<String>> {
            Ok(Some(self.committed.join("\n")))
        }
    }

    fn enc(plaintext: &str) -> String {
        encode_line(format!("enc({plaintext})").as_bytes())
    }

    fn builder(is_repo: bool, tracked: bool, committed: &[String]) -> EncryptionContextBuilder {
        let backend = StubRepo {
            is_repo,
            tracked,
            committed: committed.to_vec(),
        };
        EncryptionContextBuilder::new(VersionControlGateway::new(Arc::new(backend), "/ws"))
    }

    async fn context_for(builder: &EncryptionContextBuilder, current: &str) -> EncryptionContext {
        builder
            .create_encryption_context(
                Path::new("/ws/file.txt"),
                current,
                Arc::new(MockCipher),
                TextEncoding::default(),
            )
            .await
    }

    #[tokio::test]
    async fn test_outside_git_reencrypts_everything() {
        let builder = builder(false, true, &[enc("a")]);
        let ctx = context_for(&builder, "a\nb").await;

        assert!(!ctx.is_git_repo());
        assert!(ctx.unchanged_lines().is_empty());
        assert!(should_re_encrypt_line(1, &ctx));
        assert!(should_re_encrypt_line(2, &ctx));
        assert!(!builder.is_git_repository());
    }

    #[tokio::test]
    async fn test_untracked_file_is_new() {
        let builder = builder(true, false, &[enc("a")]);
        let ctx = context_for(&builder, "a\nb").await;

        assert!(ctx.is_new_file());
        assert!(ctx.is_git_repo());
        assert!(ctx.unchanged_lines().is_empty());
        assert!(should_re_encrypt_line(1, &ctx));
        assert!(builder.is_git_repository());
    }

    #[tokio::test]
    async fn test_empty_baseline_means_new_file() {
        let builder = builder(true, true, &[]);
        let ctx = context_for(&builder, "a").await;

        assert!(ctx.is_new_file());
        assert!(ctx.unchanged_lines().is_empty());
    }

    #[tokio::test]
    async fn test_unchanged_file_reuses_every_line() {
        let original = vec![enc("a"), enc("b"), enc("c")];
        let ctx = context_for(&builder(true, true, &original), "a\nb\nc").await;

        assert_eq!(ctx.unchanged_lines().len(), 3);
        for (n, line) in original.iter().enumerate() {
            assert_eq!(original_encrypted_line(n + 1, &ctx), Some(line.as_str()));
        }
    }

    #[tokio::test]
    async fn test_modified_line_is_reencrypted() {
        let original = vec![enc("a"), enc("b"), enc("c")];
        let ctx = context_for(&builder(true, true, &original), "a\nB\nc").await;

        assert_eq!(ctx.unchanged_lines().len(), 2);
        assert!(!should_re_encrypt_line(1, &ctx));
        assert!(should_re_encrypt_line(2, &ctx));
        assert!(!should_re_encrypt_line(3, &ctx));
        assert_eq!(original_encrypted_line(2, &ctx), None);
        assert_eq!(original_encrypted_line(3, &ctx), Some(original[2].as_str()));
    }

    #[tokio::test]
    async fn test_inserted_line() {
        let original = vec![enc("a"), enc("c")];
        let ctx = context_for(&builder(true, true, &original), "a\nb\nc").await;

        assert_eq!(ctx.unchanged_lines().len(), 2);
        assert_eq!(original_encrypted_line(1, &ctx), Some(original[0].as_str()));
        assert!(should_re_encrypt_line(2, &ctx));
        assert_eq!(original_encrypted_line(3, &ctx), Some(original[1].as_str()));
    }

    #[tokio::test]
    async fn test_deleted_line() {
        let original = vec![enc("a"), enc("b"), enc("c")];
        let ctx = context_for(&builder(true, true, &original), "a\nc").await;

        assert_eq!(ctx.unchanged_lines().len(), 2);
        assert_eq!(original_encrypted_line(1, &ctx), Some(original[0].as_str()));
        assert_eq!(original_encrypted_line(2, &ctx), Some(original[2].as_str()));
    }

    #[tokio::test]
    async fn test_reordered_lines_all_reused() {
        let original = vec![enc("common1"), enc("common2"), enc("common3")];
        let ctx = context_for(
            &builder(true, true, &original),
            "common3\ncommon1\ncommon2",
        )
        .await;

        assert_eq!(ctx.unchanged_lines().len(), 3);
        assert_eq!(original_encrypted_line(1, &ctx), Some(original[2].as_str()));
        assert_eq!(original_encrypted_line(2, &ctx), Some(original[0].as_str()));
        assert_eq!(original_encrypted_line(3, &ctx), Some(original[1].as_str()));
    }

    #[tokio::test]
    async fn test_mixed_additions_deletions_and_edits() {
        let original = vec![
            enc("common header"),
            enc("line to be deleted"),
            enc("same line"),
            enc("line to be modified"),
            enc("common footer"),
        ];
        let current = [
            "line to be added",
            "common header",
            "same line",
            "this line was modified",
            "common footer",
            "another added line",
        ]
        .join("\n");
        let ctx = context_for(&builder(true, true, &original), &current).await;

        assert_eq!(ctx.unchanged_lines().len(), 3);
        assert!(should_re_encrypt_line(1, &ctx));
        assert!(should_re_encrypt_line(4, &ctx));
        assert!(should_re_encrypt_line(6, &ctx));
        assert_eq!(original_encrypted_line(2, &ctx), Some(original[0].as_str()));
        assert_eq!(original_encrypted_line(3, &ctx), Some(original[2].as_str()));
        assert_eq!(original_encrypted_line(5, &ctx), Some(original[4].as_str()));
    }

    #[tokio::test]
    async fn test_corrupted_line_never_matches() {
        // Decrypting "enc(" fails, and even its literal text must not match.
        let corrupted = encode_line(b"enc(");
        let original = vec![enc("a"), corrupted.clone(), enc("c")];
        let ctx = context_for(&builder(true, true, &original), "a\nenc(\nc").await;

        assert!(should_re_encrypt_line(2, &ctx));
        assert!(!ctx.unchanged_lines().values().any(|line| *line == corrupted));
        assert_eq!(ctx.unchanged_lines().len(), 2);
    }

    #[tokio::test]
    async fn test_corrupted_line_never_matches_its_stored_text() {
        let corrupted = encode_line(b"enc(");
        let original = vec![enc("a"), corrupted.clone(), enc("c")];
        let current = format!("a\n{corrupted}\nc");
        let ctx = context_for(&builder(true, true, &original), &current).await;

        assert!(should_re_encrypt_line(2, &ctx));
        assert_eq!(original_encrypted_line(2, &ctx), None);
        assert_eq!(ctx.unchanged_lines().keys().copied().collect::<Vec<_>>(), [1, 3]);
    }

    #[tokio::test]
    async fn test_fully_corrupted_baseline_degrades_to_full_reencryption() {
        let original = vec!["!!!".to_string(), encode_line(b"garbage")];
        let ctx = context_for(&builder(true, true, &original), "!!!\ngarbage").await;

        assert!(!ctx.is_new_file());
        assert!(ctx.unchanged_lines().is_empty());
        assert!(should_re_encrypt_line(1, &ctx));
        assert!(should_re_encrypt_line(2, &ctx));
    }

    #[tokio::test]
    async fn test_blank_lines_align_and_crlf_is_tolerated() {
        let original = vec![enc("a"), String::new(), enc("b")];
        let ctx = context_for(&builder(true, true, &original), "a\r\n\r\nb").await;

        assert_eq!(ctx.unchanged_lines().len(), 3);
        assert_eq!(original_encrypted_line(2, &ctx), Some(""));
    }

    #[tokio::test]
    async fn test_identical_inputs_give_identical_maps() {
        let original = vec![enc("x"), enc("y"), enc("x"), enc("z")];
        let builder = builder(true, true, &original);

        let first = context_for(&builder, "y\nx\nq\nx").await;
        let second = context_for(&builder, "y\nx\nq\nx").await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_keys_stay_within_current_line_range() {
        let original: Vec<String> = (0..20).map(|n| enc(&format!("line {n}"))).collect();
        let current = "line 3\nline 1\nline 19";
        let ctx = context_for(&builder(true, true, &original), current).await;

        assert!(ctx.unchanged_lines().keys().all(|&n| (1..=3).contains(&n)));
    }

    #[test]
    fn test_sentinels_are_unique() {
        let a = sentinel();
        assert!(a.starts_with(SENTINEL_PREFIX));
        assert_ne!(a, sentinel());
    }
}
