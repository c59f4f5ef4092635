//! Directory discovery for the indexer (spec.md §4.6): a default ignore list
//! merged with `.gitignore` patterns found while walking, grounded in
//! `examples/codeprysm-codeprysm`'s `builder.rs` (`ignore::WalkBuilder`
//! configured with `follow_links(false)`/`git_ignore(true)`/`git_global(true)`/
//! `git_exclude(true)`). That builder also layers a custom ignore filename and
//! a `globset`-based exclude list on top; this port only needs the fixed
//! default list spec.md §4.6 names, so a plain substring/suffix check stands
//! in for the glob matcher rather than pulling in `globset`.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

/// Directory names skipped outright regardless of `.gitignore` content.
const DEFAULT_IGNORED_DIRS: &[&str] =
    &[".git", "node_modules", "__pycache__", "venv", ".venv", "env", ".env"];

/// File suffixes/prefixes skipped outright.
fn is_default_ignored_file(name: &str) -> bool {
    name.ends_with(".pyc") || (name.starts_with(".env") && name != ".env.example")
}

/// Walk `root`, respecting `.gitignore`/global gitignore/`.git/info/exclude`
/// plus the fixed default list above, returning file paths in a stable,
/// sorted order for deterministic indexing runs.
pub fn discover_files(root: &Path) -> Vec<PathBuf> {
    let walker = WalkBuilder::new(root)
        .follow_links(false)
        .hidden(false)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
                !DEFAULT_IGNORED_DIRS.contains(&name.as_ref())
            } else {
                !is_default_ignored_file(&name)
            }
        })
        .build();

    let mut files: Vec<PathBuf> = walker
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn skips_default_ignored_directories_and_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("node_modules/pkg.js"), "// vendored").unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();
        fs::write(dir.path().join("cache.pyc"), "binary").unwrap();

        let found = discover_files(dir.path());
        assert!(found.iter().any(|p| p.ends_with("src/main.rs")));
        assert!(!found.iter().any(|p| p.to_string_lossy().contains("node_modules")));
        assert!(!found.iter().any(|p| p.ends_with("cache.pyc")));
    }

    #[test]
    fn respects_gitignore_patterns_found_en_route() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "ignored_dir/\n").unwrap();
        fs::create_dir_all(dir.path().join("ignored_dir")).unwrap();
        fs::write(dir.path().join("ignored_dir/file.py"), "x = 1").unwrap();
        fs::write(dir.path().join("kept.py"), "y = 2").unwrap();

        let found = discover_files(dir.path());
        assert!(found.iter().any(|p| p.ends_with("kept.py")));
        assert!(!found.iter().any(|p| p.to_string_lossy().contains("ignored_dir")));
    }
}
