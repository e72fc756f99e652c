// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Expansion of import arguments into candidate files

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Check if a file should be offered to the importer
pub fn should_import(path: &Path) -> bool {
    let filename = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return false,
    };

    // Skip hidden files
    if filename.starts_with('.') {
        return false;
    }

    // Skip temporary files
    let temp_extensions = [".tmp", ".part", ".crdownload", ".partial", ".download"];
    if temp_extensions.iter().any(|ext| filename.ends_with(ext)) {
        return false;
    }

    // Skip system files
    let skip_names = ["desktop.ini", "thumbs.db", ".ds_store", "library.db"];
    if skip_names.iter().any(|n| filename.eq_ignore_ascii_case(n)) {
        return false;
    }

    true
}

fn has_glob_meta(raw: &str) -> bool {
    raw.contains(['*', '?', '['])
}

fn walk(dir: &Path, recursive: bool, exclude: Option<&Path>, out: &mut Vec<PathBuf>) {
    if exclude.map(|ex| dir.starts_with(ex)).unwrap_or(false) {
        debug!(?dir, "Skipping library tree during scan");
        return;
    }

    let mut entries: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(rd) => rd.flatten().map(|e| e.path()).collect(),
        Err(e) => {
            warn!(?dir, "Cannot read directory: {}", e);
            return;
        }
    };
    entries.sort();

    for path in entries {
        if path.is_dir() {
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with('.'))
                .unwrap_or(false);
            if recursive && !hidden {
                walk(&path, recursive, exclude, out);
            }
        } else if path.is_file() && should_import(&path) {
            out.push(path);
        }
    }
}

/// Expand files, directories and glob patterns into a de-duplicated list of
/// files in argument order. Paths that do not exist are passed through so the
/// importer can report them individually. Anything under `exclude` (the
/// library root) is skipped.
pub fn scan_sources(sources: &[PathBuf], recursive: bool, exclude: Option<&Path>) -> Vec<PathBuf> {
    let mut expanded = Vec::new();

    for source in sources {
        if source.is_dir() {
            walk(source, recursive, exclude, &mut expanded);
        } else if source.exists() {
            if exclude.map(|ex| source.starts_with(ex)).unwrap_or(false) {
                debug!(?source, "Skipping file inside library");
            } else {
                expanded.push(source.clone());
            }
        } else if has_glob_meta(&source.to_string_lossy()) {
            match glob::glob(&source.to_string_lossy()) {
                Ok(matches) => {
                    let mut hits: Vec<PathBuf> = matches.flatten().collect();
                    hits.sort();
                    for hit in hits {
                        if hit.is_dir() {
                            walk(&hit, recursive, exclude, &mut expanded);
                        } else if should_import(&hit)
                            && !exclude.map(|ex| hit.starts_with(ex)).unwrap_or(false)
                        {
                            expanded.push(hit);
                        }
                    }
                }
                Err(e) => {
                    warn!("Invalid pattern {:?}: {}", source, e);
                    expanded.push(source.clone());
                }
            }
        } else {
            expanded.push(source.clone());
        }
    }

    let mut seen = HashSet::new();
    expanded.retain(|p| seen.insert(p.clone()));
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_should_import() {
        assert!(should_import(Path::new("/photos/IMG_0001.JPG")));
        assert!(!should_import(Path::new("/photos/.hidden.jpg")));
        assert!(!should_import(Path::new("/photos/download.jpg.crdownload")));
        assert!(!should_import(Path::new("/photos/Thumbs.db")));
        assert!(!should_import(Path::new("/photos/.DS_Store")));
    }

    #[test]
    fn test_directory_expansion_respects_recursion_and_hidden() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.jpg"), b"b").unwrap();
        fs::write(dir.path().join("a.jpg"), b"a").unwrap();
        fs::write(dir.path().join(".secret.jpg"), b"s").unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/c.jpg"), b"c").unwrap();
        fs::create_dir_all(dir.path().join(".cache")).unwrap();
        fs::write(dir.path().join(".cache/d.jpg"), b"d").unwrap();

        let flat = scan_sources(&[dir.path().to_path_buf()], false, None);
        assert_eq!(flat, vec![dir.path().join("a.jpg"), dir.path().join("b.jpg")]);

        let deep = scan_sources(&[dir.path().to_path_buf()], true, None);
        assert_eq!(deep.len(), 3);
        assert!(deep.contains(&dir.path().join("nested/c.jpg")));
    }

    #[test]
    fn test_library_tree_is_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let library = dir.path().join("library");
        fs::create_dir_all(library.join("2020/01/01")).unwrap();
        fs::write(library.join("2020/01/01/x.jpg"), b"x").unwrap();
        fs::write(dir.path().join("y.jpg"), b"y").unwrap();

        let found = scan_sources(&[dir.path().to_path_buf()], true, Some(&library));
        assert_eq!(found, vec![dir.path().join("y.jpg")]);
    }

    #[test]
    fn test_glob_and_duplicates_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("one.jpg"), b"1").unwrap();
        fs::write(dir.path().join("two.png"), b"2").unwrap();
        let missing = dir.path().join("gone.jpg");

        let sources = vec![
            dir.path().join("*.jpg"),
            dir.path().join("one.jpg"),
            missing.clone(),
        ];
        let found = scan_sources(&sources, true, None);
        assert_eq!(found, vec![dir.path().join("one.jpg"), missing]);
    }
}
