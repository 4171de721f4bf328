//! Snapshot comparison.

use std::collections::BTreeMap;

use p4kit_archive::{P4kArchive, P4kEntry};
use p4kit_common::path;

use crate::node::{ComparisonNode, ComparisonStatus};

/// Compare two archives by central directory metadata.
///
/// Paths are matched by their lowercased, `/`-normalized form. Content is
/// fingerprinted by uncompressed size and CRC-32, so nothing is decoded.
/// Nested containers are single files here; compare their indexes
/// separately to look inside them.
pub fn compare(previous: &P4kArchive, current: &P4kArchive) -> ComparisonNode {
    compare_entries(previous.entries(), current.entries())
}

/// Compare two entry lists. See [`compare`].
pub fn compare_entries<'a, P, C>(previous: P, current: C) -> ComparisonNode
where
    P: IntoIterator<Item = &'a P4kEntry>,
    C: IntoIterator<Item = &'a P4kEntry>,
{
    let mut paths: BTreeMap<String, (Option<&P4kEntry>, Option<&P4kEntry>)> = BTreeMap::new();
    for entry in previous.into_iter().filter(|e| !e.is_dir()) {
        paths.entry(entry.key()).or_default().0 = Some(entry);
    }
    for entry in current.into_iter().filter(|e| !e.is_dir()) {
        paths.entry(entry.key()).or_default().1 = Some(entry);
    }

    let mut root = DirBuilder::default();
    for (left, right) in paths.into_values() {
        let display = match (left, right) {
            (Some(l), Some(r)) => path::to_display(l.name()).min(path::to_display(r.name())),
            (Some(e), None) | (None, Some(e)) => path::to_display(e.name()),
            (None, None) => continue,
        };
        root.insert(&display, file_node(&display, left, right));
    }

    root.build(String::new(), String::new())
}

fn file_node(display: &str, left: Option<&P4kEntry>, right: Option<&P4kEntry>) -> ComparisonNode {
    let status = match (left, right) {
        (Some(_), None) => ComparisonStatus::Removed,
        (None, Some(_)) => ComparisonStatus::Added,
        (Some(l), Some(r)) if fingerprint(l) != fingerprint(r) => ComparisonStatus::Modified,
        _ => ComparisonStatus::Unchanged,
    };

    ComparisonNode {
        name: path::file_name(display).to_string(),
        path: display.to_string(),
        status,
        left: left.cloned(),
        right: right.cloned(),
        children: Vec::new(),
    }
}

#[inline]
fn fingerprint(entry: &P4kEntry) -> (u64, u32) {
    (entry.uncompressed_size(), entry.crc32())
}

#[derive(Default)]
struct DirBuilder {
    name: String,
    dirs: BTreeMap<String, DirBuilder>,
    files: BTreeMap<String, ComparisonNode>,
}

impl DirBuilder {
    fn insert(&mut self, display: &str, node: ComparisonNode) {
        let components: Vec<&str> = path::components(display).collect();
        let Some((_, parents)) = components.split_last() else {
            return;
        };

        let mut dir = self;
        for &component in parents {
            let next = dir
                .dirs
                .entry(path::normalize_component(component))
                .or_insert_with(|| DirBuilder {
                    name: component.to_string(),
                    ..Default::default()
                });
            // Keep the smallest spelling so both comparison directions agree.
            if component < next.name.as_str() {
                next.name = component.to_string();
            }
            dir = next;
        }

        dir.files.insert(path::normalize_component(&node.name), node);
    }

    fn build(self, name: String, path: String) -> ComparisonNode {
        // Siblings sort by lowercased name, a file before a directory of the
        // same name.
        let mut ordered: BTreeMap<(String, bool), ComparisonNode> = BTreeMap::new();
        for (key, node) in self.files {
            ordered.insert((key, false), node);
        }
        for (key, dir) in self.dirs {
            let child_path = if path.is_empty() {
                dir.name.clone()
            } else {
                format!("{path}/{}", dir.name)
            };
            let child_name = dir.name.clone();
            ordered.insert((key, true), dir.build(child_name, child_path));
        }

        let children: Vec<ComparisonNode> = ordered.into_values().collect();
        ComparisonNode {
            name,
            path,
            status: aggregate(&children),
            left: None,
            right: None,
            children,
        }
    }
}

fn aggregate(children: &[ComparisonNode]) -> ComparisonStatus {
    let mut statuses = children.iter().map(|child| child.status);
    match statuses.next() {
        None => ComparisonStatus::Unchanged,
        Some(first) if statuses.all(|status| status == first) => first,
        Some(_) => ComparisonStatus::Modified,
    }
}
