//! Comparison of two P4K snapshots.
//!
//! [`compare`] classifies every path found in either archive as added,
//! removed, modified or unchanged and arranges the result as a directory
//! tree. The order of [`ComparisonNode::all_files`] depends only on the two
//! inputs, so selective extraction driven by a comparison is reproducible.
//!
//! ```no_run
//! use p4kit_archive::P4kArchive;
//! use p4kit_diff::{changed_entries, compare};
//!
//! let previous = P4kArchive::open("old/Data.p4k")?;
//! let current = P4kArchive::open("new/Data.p4k")?;
//!
//! let root = compare(&previous, &current);
//! println!("{:?}", root.summary());
//! for entry in changed_entries(&root, |path| path.ends_with(".xml")) {
//!     println!("{}", entry.name());
//! }
//! # Ok::<(), p4kit_archive::Error>(())
//! ```

mod compare;
mod node;

pub use compare::{compare, compare_entries};
pub use node::{changed_entries, ComparisonNode, ComparisonStatus, DiffSummary};

#[cfg(test)]
mod tests {
    use super::*;
    use p4kit_archive::{CompressionMethod, OpenOptions, P4kArchive, P4kWriteEntry, P4kWriteOptions, P4kWriter};

    fn archive(entries: Vec<P4kWriteEntry>) -> P4kArchive {
        let mut writer = P4kWriter::new(Vec::new(), P4kWriteOptions::default());
        for entry in entries {
            writer.add(entry).unwrap();
        }
        P4kArchive::from_bytes("snapshot.p4k", writer.finish().unwrap(), OpenOptions::default()).unwrap()
    }

    fn previous() -> P4kArchive {
        archive(vec![
            P4kWriteEntry::new(r"a\b.xml", b"<b/>".to_vec()),
            P4kWriteEntry::new(r"a\c.dds", vec![7; 300]).with_method(CompressionMethod::Zstd),
            P4kWriteEntry::new(r"a\old.txt", b"old".to_vec()),
            P4kWriteEntry::new(r"z\same.bin", vec![1, 2, 3]),
        ])
    }

    fn current() -> P4kArchive {
        archive(vec![
            P4kWriteEntry::new(r"a\b.xml", b"<b/>".to_vec()).with_recorded_crc(0xDEAD_BEEF),
            P4kWriteEntry::new(r"A\C.DDS", vec![7; 300]),
            P4kWriteEntry::new(r"a\new\fresh.txt", b"new".to_vec()),
            P4kWriteEntry::new(r"z\same.bin", vec![1, 2, 3]),
        ])
    }

    fn statuses(root: &ComparisonNode) -> Vec<(String, ComparisonStatus)> {
        root.all_files()
            .into_iter()
            .map(|node| (node.path.clone(), node.status))
            .collect()
    }

    #[test]
    fn test_compare_with_itself_is_unchanged() {
        let a = previous();
        let root = compare(&a, &a);

        assert_eq!(root.status, ComparisonStatus::Unchanged);
        assert!(root.all_files().iter().all(|n| n.status == ComparisonStatus::Unchanged));
        assert_eq!(root.summary().unchanged, 4);
    }

    #[test]
    fn test_classification_and_order() {
        let root = compare(&previous(), &current());

        assert_eq!(
            statuses(&root),
            vec![
                ("a/b.xml".to_string(), ComparisonStatus::Modified),
                ("A/C.DDS".to_string(), ComparisonStatus::Unchanged),
                ("a/new/fresh.txt".to_string(), ComparisonStatus::Added),
                ("a/old.txt".to_string(), ComparisonStatus::Removed),
                ("z/same.bin".to_string(), ComparisonStatus::Unchanged),
            ]
        );

        let summary = root.summary();
        assert_eq!((summary.added, summary.removed, summary.modified, summary.unchanged), (1, 1, 1, 2));
        assert_eq!(summary.total(), 5);
    }

    #[test]
    fn test_only_crc_change_is_single_modified_node() {
        let prev = archive(vec![
            P4kWriteEntry::new(r"a\b.xml", b"<b/>".to_vec()),
            P4kWriteEntry::new(r"a\c.dds", vec![0; 64]),
        ]);
        let curr = archive(vec![
            P4kWriteEntry::new(r"a\b.xml", b"<b/>".to_vec()).with_recorded_crc(1),
            P4kWriteEntry::new(r"a\c.dds", vec![0; 64]),
        ]);

        let root = compare(&prev, &curr);
        let changed: Vec<&ComparisonNode> = root.all_files().into_iter().filter(|n| n.status.is_change()).collect();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].path, "a/b.xml");
        assert_eq!(changed[0].status, ComparisonStatus::Modified);
    }

    #[test]
    fn test_comparison_is_symmetric() {
        let (prev, curr) = (previous(), current());
        let forward = compare(&prev, &curr);
        let backward = compare(&curr, &prev);

        let reversed: Vec<(String, ComparisonStatus)> = statuses(&backward)
            .into_iter()
            .map(|(path, status)| (path, status.reversed()))
            .collect();
        assert_eq!(statuses(&forward), reversed);
    }

    #[test]
    fn test_directory_status_is_aggregated() {
        let root = compare(&previous(), &current());

        assert_eq!(root.find("a").unwrap().status, ComparisonStatus::Modified);
        assert_eq!(root.find("A/new").unwrap().status, ComparisonStatus::Added);
        assert_eq!(root.find("z").unwrap().status, ComparisonStatus::Unchanged);
        assert!(!root.find("a").unwrap().is_file());
        assert!(root.find("a/old.txt").unwrap().right.is_none());
    }

    #[test]
    fn test_changed_entries_filters_by_path() {
        let root = compare(&previous(), &current());

        let all: Vec<&str> = changed_entries(&root, |_| true).iter().map(|e| e.name()).collect();
        assert_eq!(all, [r"a\b.xml", r"a\new\fresh.txt"]);

        let xml: Vec<&str> = changed_entries(&root, |p| p.ends_with(".xml")).iter().map(|e| e.name()).collect();
        assert_eq!(xml, [r"a\b.xml"]);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let root = compare(&previous(), &current());
        let json = serde_json::to_value(root.find("a/b.xml").unwrap()).unwrap();
        assert_eq!(json["status"], "modified");
        assert_eq!(json["path"], "a/b.xml");
    }
}
