//! Comparison tree nodes.

use p4kit_archive::P4kEntry;
use serde::Serialize;

/// Classification of one path across two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonStatus {
    Unchanged,
    Modified,
    /// Only in the current snapshot.
    Added,
    /// Only in the previous snapshot.
    Removed,
}

impl ComparisonStatus {
    /// Status with previous and current swapped.
    pub fn reversed(self) -> Self {
        match self {
            Self::Added => Self::Removed,
            Self::Removed => Self::Added,
            other => other,
        }
    }

    /// Whether the path's current content differs from the previous one.
    pub fn is_change(self) -> bool {
        self != Self::Unchanged
    }
}

impl std::fmt::Display for ComparisonStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Unchanged => "unchanged",
            Self::Modified => "modified",
            Self::Added => "added",
            Self::Removed => "removed",
        })
    }
}

/// A file or directory in the comparison tree.
///
/// Files carry the entry from each side that has one; directories carry
/// neither and aggregate their children's status: uniform children give
/// their status, mixed children give [`ComparisonStatus::Modified`].
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonNode {
    pub name: String,
    /// `/`-separated display path; empty for the root.
    pub path: String,
    pub status: ComparisonStatus,
    /// Entry in the previous snapshot.
    #[serde(skip)]
    pub left: Option<P4kEntry>,
    /// Entry in the current snapshot.
    #[serde(skip)]
    pub right: Option<P4kEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ComparisonNode>,
}

/// Number of files per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
    pub unchanged: usize,
}

impl DiffSummary {
    pub fn total(&self) -> usize {
        self.added + self.removed + self.modified + self.unchanged
    }

    /// Files that are not unchanged.
    pub fn changed(&self) -> usize {
        self.added + self.removed + self.modified
    }
}

impl ComparisonNode {
    /// Whether this node stands for a file (an entry exists on some side).
    pub fn is_file(&self) -> bool {
        self.left.is_some() || self.right.is_some()
    }

    /// Every file node below (or at) this node, depth-first with siblings in
    /// lowercased name order.
    pub fn all_files(&self) -> Vec<&ComparisonNode> {
        let mut files = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.is_file() {
                files.push(node);
            }
            stack.extend(node.children.iter().rev());
        }
        files
    }

    /// Count files per status.
    pub fn summary(&self) -> DiffSummary {
        self.all_files()
            .into_iter()
            .fold(DiffSummary::default(), |mut summary, node| {
                match node.status {
                    ComparisonStatus::Added => summary.added += 1,
                    ComparisonStatus::Removed => summary.removed += 1,
                    ComparisonStatus::Modified => summary.modified += 1,
                    ComparisonStatus::Unchanged => summary.unchanged += 1,
                }
                summary
            })
    }

    /// Find a node by path, ignoring case and separator style.
    pub fn find(&self, path: &str) -> Option<&ComparisonNode> {
        let mut node = self;
        for component in p4kit_common::path::components(path) {
            node = node
                .children
                .iter()
                .find(|child| child.name.eq_ignore_ascii_case(component))?;
        }
        Some(node)
    }
}

/// Current-side entries of added or modified files whose display path
/// satisfies `predicate`, in [`ComparisonNode::all_files`] order.
pub fn changed_entries<F>(root: &ComparisonNode, mut predicate: F) -> Vec<&P4kEntry>
where
    F: FnMut(&str) -> bool,
{
    root.all_files()
        .into_iter()
        .filter(|node| matches!(node.status, ComparisonStatus::Added | ComparisonStatus::Modified))
        .filter(|node| predicate(&node.path))
        .filter_map(|node| node.right.as_ref())
        .collect()
}
