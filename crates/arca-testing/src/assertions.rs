//! Assertion helpers for archive tests

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use walkdir::WalkDir;

/// Collect every regular file below `root` as (relative path, contents).
pub fn collect_files(root: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut files = BTreeMap::new();
    for entry in WalkDir::new(root).into_iter().flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        files.insert(relative, fs::read(entry.path()).unwrap_or_default());
    }
    files
}

/// Assert two directory trees hold the same relative file set with
/// byte-identical contents.
pub fn assert_same_files(expected: &Path, actual: &Path) {
    let expected_files = collect_files(expected);
    let actual_files = collect_files(actual);

    let expected_names: Vec<&String> = expected_files.keys().collect();
    let actual_names: Vec<&String> = actual_files.keys().collect();
    assert_eq!(
        expected_names, actual_names,
        "file sets differ between {:?} and {:?}",
        expected, actual
    );

    for (name, contents) in &expected_files {
        assert_eq!(
            contents, &actual_files[name],
            "contents differ for {}",
            name
        );
    }
}

/// Assert a directory exists but contains nothing at all.
pub fn assert_dir_empty(dir: &Path) {
    let entries: Vec<_> = fs::read_dir(dir)
        .map(|iter| iter.flatten().collect())
        .unwrap_or_default();
    assert!(
        entries.is_empty(),
        "expected {:?} to be empty, found {:?}",
        dir,
        entries.iter().map(|e| e.file_name()).collect::<Vec<_>>()
    );
}
