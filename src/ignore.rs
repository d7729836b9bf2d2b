//! Ignore rules for workspace traversal.
//!
//! The pattern language is deliberately small:
//!
//! - `dir/**` ignores every path starting with `dir/`
//! - `**/*.ext` ignores every path ending with `.ext`
//! - any other pattern containing `*` is a glob matched against the file
//!   name
//! - anything else ignores paths containing it

use glob::Pattern;
use std::fs;
use std::path::Path;

use crate::error::Result;

const DEFAULT_PATTERNS: &[&str] = &[
    ".git/**",
    "target/**",
    "node_modules/**",
    ".diffcrypt.toml",
    ".diffcryptignore",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreRules {
    patterns: Vec<String>,
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self::new(DEFAULT_PATTERNS.iter().map(|p| p.to_string()).collect())
    }
}

impl IgnoreRules {
    pub fn new(patterns: Vec<String>) -> Self {
        Self { patterns }
    }

    /// Read rules from an ignore file; defaults apply when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Self::parse(&text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn parse(text: &str) -> Self {
        let patterns = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_owned)
            .collect();
        Self::new(patterns)
    }

    /// Add patterns on top of whatever was loaded.
    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for pattern in patterns {
            let pattern = pattern.into();
            if !self.patterns.contains(&pattern) {
                self.patterns.push(pattern);
            }
        }
        self
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// `relative_path` uses `/` separators.
    pub fn is_ignored(&self, relative_path: &str) -> bool {
        self.patterns
            .iter()
            .any(|pattern| matches_pattern(pattern, relative_path))
    }

    /// Default contents written by `diffcrypt init`.
    pub fn default_file_contents() -> String {
        let mut out = String::from("# Paths diffcrypt never touches\n");
        for pattern in DEFAULT_PATTERNS {
            out.push_str(pattern);
            out.push('\n');
        }
        out
    }
}

fn matches_pattern(pattern: &str, path: &str) -> bool {
    if let Some(dir) = pattern.strip_suffix("/**") {
        return path == dir || path.starts_with(&format!("{dir}/"));
    }
    if let Some(suffix) = pattern.strip_prefix("**/*") {
        return path.ends_with(suffix);
    }
    if pattern.contains('*') {
        let name = path.rsplit('/').next().unwrap_or(path);
        return Pattern::new(pattern).is_ok_and(|glob| glob.matches(name));
    }
    path.contains(pattern)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rules() -> IgnoreRules {
        IgnoreRules::new(
            ["node_modules/**", ".git/**", "*.log", "**/*.enc"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
        )
    }

    #[test]
    fn test_patterns_match() {
        let rules = rules();
        assert!(rules.is_ignored("node_modules/package.json"));
        assert!(rules.is_ignored(".git/config"));
        assert!(rules.is_ignored("logs/app.log"));
        assert!(rules.is_ignored("images/photo.png.enc"));
        assert!(!rules.is_ignored("src/code.js"));
    }

    #[test]
    fn test_directory_pattern_needs_separator() {
        let rules = rules();
        assert!(rules.is_ignored(".git"));
        assert!(!rules.is_ignored(".github/workflows/ci.yml"));
    }

    #[test]
    fn test_wildcards_match_file_names() {
        assert!(matches_pattern("*.log", "logs/app.log"));
        assert!(!matches_pattern("*.log", "app.log.txt"));
        assert!(matches_pattern("secret*.txt", "config/secret-prod.txt"));
        assert!(!matches_pattern("secret*.txt", "secret/notes.txt"));
        assert!(matches_pattern("a*b*c", "abc"));
        assert!(!matches_pattern("a*b*c", "acb"));
    }

    #[test]
    fn test_invalid_glob_ignores_nothing() {
        assert!(!matches_pattern("[*", "[x"));
    }

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let rules = IgnoreRules::parse("# comment\n\n  dist/**  \n*.tmp\n");
        assert_eq!(rules.patterns(), ["dist/**", "*.tmp"]);
    }

    #[test]
    fn test_with_patterns_skips_duplicates() {
        let rules = IgnoreRules::parse("dist/**\n").with_patterns([".git/**", "dist/**"]);
        assert_eq!(rules.patterns(), ["dist/**", ".git/**"]);
        assert!(rules.is_ignored(".git/HEAD"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let rules = IgnoreRules::load(&temp.path().join(".diffcryptignore")).unwrap();
        assert_eq!(rules, IgnoreRules::default());
        assert!(rules.is_ignored("target/debug/app"));
    }

    #[test]
    fn test_default_file_parses_back_to_defaults() {
        assert_eq!(
            IgnoreRules::parse(&IgnoreRules::default_file_contents()),
            IgnoreRules::default()
        );
    }
}
