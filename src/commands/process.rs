use super::open_workspace;
use diffcrypt::error::{DiffCryptError, Result};
use diffcrypt::workspace::{Operation, ProcessSummary};
use std::path::Path;

/// Encrypt a file or directory, reusing committed ciphertext where possible
pub async fn encrypt(root: &Path, target: &Path) -> Result<()> {
    println!("Encrypting {}...", target.display());
    let summary = run(root, target, Operation::Encrypt).await?;

    println!(
        "Encrypted {} file(s): {} line(s) kept, {} line(s) re-encrypted",
        summary.files, summary.lines_reused, summary.lines_encrypted
    );
    finish(summary)
}

/// Decrypt a file or directory
pub async fn decrypt(root: &Path, target: &Path) -> Result<()> {
    println!("Decrypting {}...", target.display());
    let summary = run(root, target, Operation::Decrypt).await?;

    println!("Decrypted {} file(s)", summary.files);
    finish(summary)
}

async fn run(root: &Path, target: &Path, operation: Operation) -> Result<ProcessSummary> {
    let (_, processor) = open_workspace(root)?;

    if operation == Operation::Encrypt
        && !processor.context_builder().gateway().detect_repository().await
    {
        println!("Not inside a git repository: every line will be re-encrypted");
    }

    processor.process_path(target, operation).await
}

fn finish(summary: ProcessSummary) -> Result<()> {
    if summary.skipped > 0 {
        println!("Skipped {} file(s)", summary.skipped);
    }
    if summary.failed > 0 {
        return Err(DiffCryptError::Other(format!(
            "{} file(s) could not be processed",
            summary.failed
        )));
    }
    Ok(())
}
