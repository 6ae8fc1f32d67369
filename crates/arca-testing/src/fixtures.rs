//! Common test fixtures

use anyhow::Result;

use crate::TestDir;

/// The standard mixed input set: a loose file plus a directory with one
/// nested file, the smallest shape that exercises both expansion branches.
pub fn create_mixed_inputs(test_dir: &TestDir) -> Result<()> {
    test_dir.create_file("a.txt", b"0123456789")?;
    test_dir.create_dir("sub")?;
    test_dir.create_file("sub/b.txt", b"01234567890123456789")?;
    Ok(())
}

/// A deeper directory tree for recursion tests.
pub fn create_nested_tree(test_dir: &TestDir) -> Result<()> {
    test_dir.create_file("root.txt", b"root file")?;
    test_dir.create_file("docs/readme.md", b"# readme")?;
    test_dir.create_file("docs/guides/install.md", b"install steps")?;
    test_dir.create_file("src/main.rs", b"fn main() {}")?;

    // An empty directory; directory-only trees must expand to nothing.
    test_dir.create_dir("empty")?;
    Ok(())
}
