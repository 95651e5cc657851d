//! Architectural Enforcement
//!
//! Source-level checks that keep the bridge's structure honest:
//! - No sleeping in production code (the relay only ever waits on I/O)
//! - Inline assembly and `unsafe` confined to the platform modules
//! - No `unwrap()`/`expect()` outside tests
//!
//! The helpers here find the workspace's production sources; the checks live
//! in `tests/`.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Production source trees, relative to the workspace root
pub const PRODUCTION_DIRS: [&str; 2] = ["bridge/core/src", "bridge/daemon/src"];

/// A production source file with its test-only tail removed
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the workspace root, `/`-separated
    pub relative: String,
    /// Production lines as `(line number, text)`
    pub lines: Vec<(usize, String)>,
}

impl SourceFile {
    /// Code lines (comments stripped) containing `needle`
    pub fn find(&self, needle: &str) -> Vec<String> {
        self.lines
            .iter()
            .filter(|(_, text)| code_part(text).contains(needle))
            .map(|(number, text)| format!("{}:{} - {}", self.relative, number, text.trim()))
            .collect()
    }
}

/// Workspace root (two levels above this package)
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .canonicalize()
        .unwrap_or_else(|_| PathBuf::from("../.."))
}

/// Every production `.rs` file under [`PRODUCTION_DIRS`]
///
/// Files declared only under `#[cfg(test)]` are skipped, and each file is cut
/// where its inline `#[cfg(test)] mod tests { ... }` block starts.
pub fn production_sources() -> Vec<SourceFile> {
    let root = workspace_root();
    let mut files = Vec::new();

    for dir in PRODUCTION_DIRS {
        let base = root.join(dir);
        let test_only = test_only_files(&base);

        for entry in WalkDir::new(&base).into_iter().filter_map(Result::ok) {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("rs")
                || test_only.contains(path)
            {
                continue;
            }
            let Ok(content) = fs::read_to_string(path) else {
                continue;
            };
            let relative = path
                .strip_prefix(&root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");
            files.push(SourceFile {
                relative,
                lines: production_lines(&content),
            });
        }
    }

    files
}

fn is_test_cfg(line: &str) -> bool {
    let line = line.trim();
    line.starts_with("#[cfg(test)]") || line.starts_with("#[cfg(all(test")
}

fn opens_inline_module(line: &str) -> bool {
    declared_module_prefix(line).is_some_and(|rest| rest.trim_end().ends_with('{'))
}

fn production_lines(content: &str) -> Vec<(usize, String)> {
    let lines: Vec<&str> = content.lines().collect();
    let end = lines
        .windows(2)
        .position(|pair| is_test_cfg(pair[0]) && opens_inline_module(pair[1]))
        .unwrap_or(lines.len());
    lines[..end]
        .iter()
        .enumerate()
        .map(|(idx, line)| (idx + 1, (*line).to_string()))
        .collect()
}

/// Module files whose `mod` declaration is gated on `cfg(test)`
fn test_only_files(base: &Path) -> HashSet<PathBuf> {
    let mut found = HashSet::new();

    for entry in WalkDir::new(base).into_iter().filter_map(Result::ok) {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("rs") {
            continue;
        }
        let Ok(content) = fs::read_to_string(path) else {
            continue;
        };
        let dir = match path.file_name().and_then(|s| s.to_str()) {
            Some("mod.rs" | "lib.rs" | "main.rs") => path.parent().map(Path::to_path_buf),
            _ => path.parent().map(|p| p.join(path.file_stem().unwrap_or_default())),
        };
        let Some(dir) = dir else { continue };

        let lines: Vec<&str> = content.lines().collect();
        for pair in lines.windows(2) {
            if !is_test_cfg(pair[0]) {
                continue;
            }
            if let Some(name) = declared_module(pair[1]) {
                found.insert(dir.join(format!("{name}.rs")));
            }
        }
    }

    found
}

/// Text after `mod `, `pub mod `, or `pub(crate) mod `
fn declared_module_prefix(line: &str) -> Option<&str> {
    let line = line.trim();
    line.strip_prefix("pub(crate) mod ")
        .or_else(|| line.strip_prefix("pub mod "))
        .or_else(|| line.strip_prefix("mod "))
}

/// `foo` from `mod foo;`, `pub mod foo;`, or `pub(crate) mod foo;`
fn declared_module(line: &str) -> Option<&str> {
    declared_module_prefix(line)?.strip_suffix(';')
}

/// Line with any trailing `//` comment removed
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_module() {
        assert_eq!(declared_module("pub(crate) mod fake;"), Some("fake"));
        assert_eq!(declared_module("    mod mock;"), Some("mock"));
        assert_eq!(declared_module("pub mod abi;"), Some("abi"));
        assert_eq!(declared_module("pub mod tests {"), None);
    }

    #[test]
    fn test_production_lines_stop_at_tests() {
        let content = "#[cfg(test)]\nmod fake;\nfn a() {}\n#[cfg(test)]\nmod tests {\n    fn b() { x.unwrap(); }\n}\n";
        let lines = production_lines(content);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], (3, "fn a() {}".to_string()));
    }

    #[test]
    fn test_code_part_strips_comments() {
        assert_eq!(code_part("let x = 1; // sleep(5)"), "let x = 1; ");
        assert_eq!(code_part("/// docs"), "");
    }

    #[test]
    fn test_finds_workspace_sources() {
        let files = production_sources();
        assert!(files
            .iter()
            .any(|f| f.relative == "bridge/core/src/relay.rs"));
        assert!(files
            .iter()
            .all(|f| !f.relative.ends_with("syscall/fake.rs")));
    }
}
