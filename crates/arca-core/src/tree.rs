//! Hierarchical listing view of archive entries

use std::collections::BTreeMap;

use serde::Serialize;

use crate::codec::ArchiveEntry;

/// One node in the listing forest.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveItem {
    /// Last path segment
    pub name: String,
    /// Full path within the archive
    pub path: String,
    /// Uncompressed size; 0 for directories
    pub size: u64,
    pub is_dir: bool,
    pub children: Vec<ArchiveItem>,
}

impl ArchiveItem {
    /// Sum of file sizes in this subtree.
    pub fn total_size(&self) -> u64 {
        self.size + self.children.iter().map(ArchiveItem::total_size).sum::<u64>()
    }
}

#[derive(Default)]
struct Node {
    size: u64,
    is_dir: bool,
    children: BTreeMap<String, Node>,
}

/// Build the listing forest for a set of entries.
///
/// Entry paths are split on `/`; directory nodes not present as explicit
/// entries are synthesized with size 0. The forest is rebuilt from scratch
/// on every call, it is never maintained incrementally.
pub fn build_tree(entries: &[ArchiveEntry]) -> Vec<ArchiveItem> {
    let mut root: BTreeMap<String, Node> = BTreeMap::new();

    for entry in entries {
        let segments: Vec<&str> = entry
            .path
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        if segments.is_empty() {
            continue;
        }

        let mut cursor = &mut root;
        for (depth, segment) in segments.iter().enumerate() {
            let node = cursor.entry(segment.to_string()).or_insert_with(|| Node {
                size: 0,
                is_dir: true,
                children: BTreeMap::new(),
            });
            if depth == segments.len() - 1 {
                node.is_dir = entry.is_dir;
                if !entry.is_dir {
                    node.size = entry.size;
                }
            }
            cursor = &mut node.children;
        }
    }

    into_items(root, "")
}

fn into_items(nodes: BTreeMap<String, Node>, prefix: &str) -> Vec<ArchiveItem> {
    nodes
        .into_iter()
        .map(|(name, node)| {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", prefix, name)
            };
            let children = into_items(node.children, &path);
            ArchiveItem {
                name,
                path,
                size: node.size,
                is_dir: node.is_dir,
                children,
            }
        })
        .collect()
}
