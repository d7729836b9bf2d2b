use diffcrypt::config::{Settings, CONFIG_FILE, DEFAULT_IGNORE_FILE};
use diffcrypt::error::Result;
use diffcrypt::ignore::IgnoreRules;
use std::fs;
use std::path::Path;

/// Write default settings and ignore rules into the workspace
pub fn init(root: &Path) -> Result<()> {
    println!("Initializing diffcrypt in {}...", root.display());

    match Settings::write_default(root)? {
        Some(_) => println!("Created {CONFIG_FILE}"),
        None => println!("{CONFIG_FILE} already exists, leaving it untouched"),
    }

    let ignore_file = root.join(DEFAULT_IGNORE_FILE);
    if ignore_file.exists() {
        println!("{DEFAULT_IGNORE_FILE} already exists, leaving it untouched");
    } else {
        fs::write(&ignore_file, IgnoreRules::default_file_contents())?;
        println!("Created {DEFAULT_IGNORE_FILE}");
    }

    println!("\nInitialization complete!");
    println!("\nNext steps:");
    println!("1. Export DIFFCRYPT_PASSWORD (keep it out of {CONFIG_FILE} in shared repositories)");
    println!("2. Run 'diffcrypt encrypt' before committing");
    println!("3. Run 'diffcrypt decrypt' to get your plaintext back");

    Ok(())
}
