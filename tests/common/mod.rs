use assert_cmd::{cargo::cargo_bin_cmd, Command};
use std::path::Path;
use std::process::Command as StdCommand;
use tempfile::TempDir;

#[allow(dead_code)]
pub const PASSWORD: &str = "integration-test-password";

/// Create a new temporary git repository with user config set.
pub fn create_git_repo() -> TempDir {
    let temp = TempDir::new().expect("failed to create temp dir");

    git(temp.path(), &["init"]);
    git(temp.path(), &["config", "user.email", "test@example.com"]);
    git(temp.path(), &["config", "user.name", "Test User"]);
    git(temp.path(), &["config", "commit.gpgsign", "false"]);

    temp
}

/// Run git in `dir`, panicking when it fails.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = StdCommand::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Stage everything and commit.
#[allow(dead_code)]
pub fn commit_all(dir: &Path, message: &str) {
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "-q", "-m", message]);
}

/// The diffcrypt binary, isolated from the user's config and environment.
#[allow(dead_code)]
pub fn diffcrypt_cmd(dir: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("diffcrypt");
    cmd.current_dir(dir)
        .env("XDG_CONFIG_HOME", dir.join(".no-user-config"))
        .env("HOME", dir.join(".no-home"))
        .env_remove("DIFFCRYPT_ALGORITHM")
        .env_remove("DIFFCRYPT_ENCODING")
        .env_remove("DIFFCRYPT_LOG")
        .env("DIFFCRYPT_PASSWORD", PASSWORD);
    cmd
}
