use super::open_workspace;
use diffcrypt::error::Result;
use std::path::Path;

/// Show how much of a file's committed ciphertext the next encryption keeps
pub async fn status(root: &Path, file: &Path) -> Result<()> {
    let (settings, processor) = open_workspace(root)?;
    let builder = processor.context_builder();

    let in_repo = builder.gateway().detect_repository().await;
    let tracked = in_repo && !builder.tracking_status(file).await.is_new_file;

    println!("File: {}", file.display());
    println!("Git repository: {}", if in_repo { "yes" } else { "no" });
    println!("Tracked: {}", if tracked { "yes" } else { "no" });

    if !settings.is_text_file(file) {
        println!("Mode: whole-file (.enc)");
        return Ok(());
    }

    match processor.plan_text_file(file).await? {
        None => println!("State: encrypted"),
        Some(report) => {
            println!("State: plaintext");
            println!(
                "Lines: {} total, {} blank, {} kept from HEAD, {} to encrypt",
                report.total, report.blank, report.reused, report.encrypted
            );
        }
    }

    Ok(())
}
