//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles:
//! - The core crate stays headless (no terminal or CLI dependencies)
//! - No sleep() calls in production code; waiting is done on I/O and timers
//! - The core never prints; output belongs to the front-end
//! - No unwrap()/expect() in core production code
//!
//! The helpers below are shared by the tests in `tests/`.

use std::fs;
use std::path::{Path, PathBuf};

/// Root of the workspace this package lives in
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

/// All `.rs` files under `dir` (relative to the workspace root)
#[must_use]
pub fn rust_files(dir: &str) -> Vec<PathBuf> {
    let path = workspace_root().join(dir);
    assert!(path.exists(), "{} does not exist", path.display());

    walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// A production source line: 1-based line number and the code before any
/// `//` comment
#[derive(Debug, Clone)]
pub struct CodeLine {
    /// 1-based line number
    pub number: usize,
    /// Code part of the line
    pub code: String,
}

/// Lines of `path` that belong to production code.
///
/// Everything from the first `#[cfg(test)]` on is test code and skipped;
/// comment text is stripped.
#[must_use]
pub fn production_lines(path: &Path) -> Vec<CodeLine> {
    let Ok(content) = fs::read_to_string(path) else {
        return Vec::new();
    };

    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| !line.trim_start().starts_with("#[cfg(test)]"))
        .map(|(idx, line)| CodeLine {
            number: idx + 1,
            code: line.split("//").next().unwrap_or(line).to_string(),
        })
        .filter(|line| !line.code.trim().is_empty())
        .collect()
}

/// Production lines under `dir` that contain any of `patterns`, formatted as
/// `path:line - code`
#[must_use]
pub fn find_violations(dir: &str, patterns: &[&str]) -> Vec<String> {
    let mut violations = Vec::new();
    for file in rust_files(dir) {
        for line in production_lines(&file) {
            if patterns.iter().any(|p| line.code.contains(p)) {
                violations.push(format!(
                    "{}:{} - {}",
                    file.display(),
                    line.number,
                    line.code.trim()
                ));
            }
        }
    }
    violations
}

/// Names of the crates in the `[dependencies]` table of a Cargo.toml
#[must_use]
pub fn dependency_names(manifest: &str) -> Vec<String> {
    let content = fs::read_to_string(workspace_root().join(manifest)).unwrap_or_default();
    let mut in_dependencies = false;
    let mut names = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_dependencies = line == "[dependencies]";
            continue;
        }
        if !in_dependencies || line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((name, _)) = line.split_once('=') {
            names.push(name.trim().to_string());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_lines_stop_at_test_module() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("sample.rs");
        fs::write(
            &file,
            "fn a() {} // trailing\n\n// only a comment\n#[cfg(test)]\nmod tests { fn b() {} }\n",
        )
        .unwrap();

        let lines = production_lines(&file);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].number, 1);
        assert_eq!(lines[0].code.trim(), "fn a() {}");
    }

    #[test]
    fn test_dependency_names_read_only_main_table() {
        let names = dependency_names("chat/core/Cargo.toml");
        assert!(names.iter().any(|n| n == "tokio"));
        assert!(!names.iter().any(|n| n == "pretty_assertions"));
    }
}
