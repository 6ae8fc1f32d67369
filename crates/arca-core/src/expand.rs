//! Input path expansion for compression

use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

/// A regular file staged for archiving, paired with the name it will carry
/// inside the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedEntry {
    /// Absolute path of the file on disk
    pub source: PathBuf,
    /// Archive-relative name, `/`-separated
    pub name: String,
}

/// Flatten a list of input paths into the regular files they contain.
///
/// Files are appended verbatim; directories are walked recursively with no
/// depth bound and contribute every regular file found, in traversal order.
/// Ordering across filesystem backends is not deterministic and callers
/// must not rely on it for correctness.
///
/// Paths that do not exist are skipped with a warning rather than failing
/// the whole operation.
pub fn expand(inputs: &[PathBuf]) -> Vec<PathBuf> {
    expand_entries(inputs)
        .into_iter()
        .map(|entry| entry.source)
        .collect()
}

/// Like [`expand`], but pairs each file with its archive-relative name.
///
/// A file input keeps its file name; a directory input contributes entries
/// named `<dir-name>/<path-inside-dir>` so the directory itself survives
/// the round trip.
pub fn expand_entries(inputs: &[PathBuf]) -> Vec<StagedEntry> {
    let mut staged = Vec::new();

    for input in inputs {
        if input.is_file() {
            let name = match input.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => continue,
            };
            staged.push(StagedEntry {
                source: input.clone(),
                name,
            });
        } else if input.is_dir() {
            collect_directory(input, &mut staged);
        } else {
            warn!("skipping missing input path: {:?}", input);
        }
    }

    staged
}

fn collect_directory(dir: &Path, staged: &mut Vec<StagedEntry>) {
    // The entry name is rooted at the directory's own name so extraction
    // reproduces the directory, not just its contents.
    let base = dir.parent().unwrap_or(Path::new(""));

    for entry in WalkDir::new(dir) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping unreadable entry under {:?}: {}", dir, e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(base).unwrap_or(entry.path());
        let name = relative.to_string_lossy().replace('\\', "/");
        staged.push(StagedEntry {
            source: entry.path().to_path_buf(),
            name,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_expand_keeps_files_verbatim() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.txt");
        fs::write(&file, b"a").unwrap();

        let expanded = expand(&[file.clone()]);
        assert_eq!(expanded, vec![file]);
    }

    #[test]
    fn test_expand_recurses_directories() {
        let temp = TempDir::new().unwrap();
        let sub = temp.path().join("sub");
        let deep = sub.join("deeper/nested");
        fs::create_dir_all(&deep).unwrap();
        fs::write(sub.join("b.txt"), b"b").unwrap();
        fs::write(deep.join("c.txt"), b"c").unwrap();

        let mut expanded = expand(&[sub.clone()]);
        expanded.sort();
        assert_eq!(
            expanded,
            vec![deep.join("c.txt"), sub.join("b.txt")]
        );
    }

    #[test]
    fn test_expand_returns_only_regular_files() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("only/dirs/here")).unwrap();

        let expanded = expand(&[temp.path().to_path_buf()]);
        assert!(expanded.is_empty());
    }

    #[test]
    fn test_missing_inputs_are_skipped_silently() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("real.txt");
        fs::write(&file, b"x").unwrap();

        let expanded = expand(&[
            temp.path().join("does-not-exist"),
            file.clone(),
        ]);
        assert_eq!(expanded, vec![file]);
    }

    #[test]
    fn test_entry_names_are_rooted_at_input() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.txt");
        fs::write(&file, b"aaaaaaaaaa").unwrap();
        let sub = temp.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("b.txt"), b"b").unwrap();

        let entries = expand_entries(&[file, sub]);
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "sub/b.txt"]);
    }
}
