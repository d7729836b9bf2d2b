pub mod init;
pub mod process;
pub mod status;

pub use init::init;
pub use process::{decrypt, encrypt};
pub use status::status;

use diffcrypt::config::Settings;
use diffcrypt::crypto::PasswordCipher;
use diffcrypt::error::Result;
use diffcrypt::git::GitRepo;
use diffcrypt::workspace::WorkspaceProcessor;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The enclosing git work tree of `dir`, or `dir` itself outside git.
pub fn workspace_root(dir: &Path) -> Result<PathBuf> {
    let dir = fs::canonicalize(dir)?;
    match GitRepo::open(&dir) {
        Ok(repo) => Ok(fs::canonicalize(repo.workdir()?)?),
        Err(_) => Ok(dir),
    }
}

/// Load settings and build a processor for the workspace at `root`.
fn open_workspace(root: &Path) -> Result<(Settings, WorkspaceProcessor)> {
    let settings = Settings::load(root)?;
    let cipher = Arc::new(PasswordCipher::new(
        settings.password()?,
        settings.algorithm()?,
    ));
    let processor = WorkspaceProcessor::new(root, settings.clone(), cipher)?;
    Ok((settings, processor))
}
