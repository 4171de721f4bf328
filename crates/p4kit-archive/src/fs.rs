//! Path-addressable view over an archive.
//!
//! [`P4kFileSystem`] turns the flat entry list into a directory tree keyed by
//! lowercased components, so lookups ignore case and accept either
//! separator. A path may continue through a nested container: in
//! `Data/level.socpak/inner/level.xml` the `level.socpak` entry is opened as a
//! container and `inner/level.xml` is resolved inside it.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use p4kit_common::path;

use crate::archive::{NestedProbe, P4kArchive};
use crate::reader::EntryReader;
use crate::{Error, P4kEntry, Result};

/// One item of a directory listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirEntry<'a> {
    /// A sub-directory, with the spelling of the first entry that created it.
    Directory(&'a str),
    /// A file entry.
    File(&'a P4kEntry),
}

impl DirEntry<'_> {
    /// Display name of the item.
    pub fn name(&self) -> &str {
        match self {
            Self::Directory(name) => name,
            Self::File(entry) => entry.file_name(),
        }
    }
}

#[derive(Debug, Default)]
struct DirNode {
    name: String,
    dirs: BTreeMap<String, DirNode>,
    files: BTreeMap<String, usize>,
}

impl DirNode {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

enum Lookup<'a> {
    File(&'a P4kEntry),
    Dir(&'a DirNode),
    /// The path continues inside a nested container.
    Nested(P4kFileSystem, String),
    Missing,
}

/// Case- and separator-insensitive filesystem over a [`P4kArchive`].
///
/// The tree is built on first use and never changes afterwards. Nothing else
/// is cached: nested containers are re-opened and entries decoded again on
/// every call.
pub struct P4kFileSystem {
    archive: P4kArchive,
    tree: OnceLock<DirNode>,
}

impl P4kFileSystem {
    /// Wrap an archive.
    pub fn new(archive: P4kArchive) -> Self {
        Self {
            archive,
            tree: OnceLock::new(),
        }
    }

    /// The underlying archive.
    #[inline]
    pub fn archive(&self) -> &P4kArchive {
        &self.archive
    }

    fn tree(&self) -> &DirNode {
        self.tree.get_or_init(|| build_tree(&self.archive))
    }

    /// Whether `path` names a file, possibly inside nested containers.
    pub fn file_exists(&self, path: &str) -> bool {
        match self.lookup(path) {
            Ok(Lookup::File(_)) => true,
            Ok(Lookup::Nested(fs, rest)) => fs.file_exists(&rest),
            _ => false,
        }
    }

    /// Whether `path` names a directory, possibly inside nested containers.
    /// The empty path is the root.
    pub fn directory_exists(&self, path: &str) -> bool {
        match self.lookup(path) {
            Ok(Lookup::Dir(_)) => true,
            Ok(Lookup::Nested(fs, rest)) => fs.directory_exists(&rest),
            _ => false,
        }
    }

    /// Entry of this container at `path`. Does not descend into nested
    /// containers; the returned entry belongs to [`archive`](Self::archive).
    pub fn entry(&self, path: &str) -> Option<&P4kEntry> {
        match self.lookup_local(path) {
            Lookup::File(entry) => Some(entry),
            _ => None,
        }
    }

    /// Open a verifying reader for the file at `path`.
    pub fn open_read(&self, path: &str) -> Result<EntryReader> {
        match self.lookup(path)? {
            Lookup::File(entry) => self.archive.open_entry(entry),
            Lookup::Nested(fs, rest) => fs.open_read(&rest),
            Lookup::Dir(_) | Lookup::Missing => Err(Error::NotFound(path.to_string())),
        }
    }

    /// Read and verify the file at `path`.
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.open_read(path)?.read_all()
    }

    /// Probe the file at `path` as a nested container.
    pub fn open_nested(&self, path: &str) -> Result<NestedProbe> {
        match self.lookup(path)? {
            Lookup::File(entry) => self.archive.open_nested(entry),
            Lookup::Nested(fs, rest) => fs.open_nested(&rest),
            Lookup::Dir(_) | Lookup::Missing => Err(Error::NotFound(path.to_string())),
        }
    }

    /// List a directory of this container: sub-directories first, then
    /// files, each sorted by lowercased name.
    pub fn read_dir(&self, path: &str) -> Result<Vec<DirEntry<'_>>> {
        let Lookup::Dir(node) = self.lookup_local(path) else {
            return Err(Error::NotFound(path.to_string()));
        };

        let dirs = node.dirs.values().map(|dir| DirEntry::Directory(dir.name.as_str()));
        let files = self.files_of(node).map(DirEntry::File);
        Ok(dirs.chain(files).collect())
    }

    /// Files directly inside `dir`, sorted by lowercased name. Empty when the
    /// directory does not exist.
    pub fn files_in(&self, dir: &str) -> Vec<&P4kEntry> {
        match self.lookup_local(dir) {
            Lookup::Dir(node) => self.files_of(node).collect(),
            _ => Vec::new(),
        }
    }

    /// Entries of this container matching `predicate`, in archive order.
    pub fn find<'a, F>(&'a self, mut predicate: F) -> impl Iterator<Item = &'a P4kEntry> + 'a
    where
        F: FnMut(&P4kEntry) -> bool + 'a,
    {
        self.archive.iter().filter(move |entry| predicate(entry))
    }

    fn files_of<'a>(&'a self, node: &'a DirNode) -> impl Iterator<Item = &'a P4kEntry> + 'a {
        node.files
            .values()
            .filter_map(move |&index| self.archive.get(index))
    }

    fn lookup_local(&self, path: &str) -> Lookup<'_> {
        self.walk(path, false).unwrap_or(Lookup::Missing)
    }

    fn lookup(&self, path: &str) -> Result<Lookup<'_>> {
        self.walk(path, true)
    }

    fn walk(&self, path: &str, descend: bool) -> Result<Lookup<'_>> {
        let components: Vec<&str> = path::components(path).collect();
        let mut node = self.tree();

        for (i, component) in components.iter().enumerate() {
            let key = path::normalize_component(component);
            let is_last = i + 1 == components.len();

            if is_last {
                if let Some(&index) = node.files.get(&key) {
                    return Ok(self.archive.get(index).map_or(Lookup::Missing, Lookup::File));
                }
            }

            if let Some(child) = node.dirs.get(&key) {
                node = child;
                continue;
            }

            if !descend {
                return Ok(Lookup::Missing);
            }
            let Some(entry) = node.files.get(&key).and_then(|&index| self.archive.get(index)) else {
                return Ok(Lookup::Missing);
            };

            return Ok(match self.archive.open_nested(entry)? {
                NestedProbe::Container(nested) => {
                    Lookup::Nested(P4kFileSystem::new(nested), components[i + 1..].join("/"))
                }
                NestedProbe::NotContainer(_) => Lookup::Missing,
            });
        }

        Ok(Lookup::Dir(node))
    }
}

impl From<P4kArchive> for P4kFileSystem {
    fn from(archive: P4kArchive) -> Self {
        Self::new(archive)
    }
}

impl std::fmt::Debug for P4kFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("P4kFileSystem")
            .field("archive", &self.archive)
            .field("tree_built", &self.tree.get().is_some())
            .finish()
    }
}

fn build_tree(archive: &P4kArchive) -> DirNode {
    let mut root = DirNode::default();

    for (index, entry) in archive.iter().enumerate() {
        let components: Vec<&str> = path::components(entry.name()).collect();
        let Some((last, parents)) = components.split_last() else {
            continue;
        };

        let mut node = &mut root;
        for component in parents {
            node = node
                .dirs
                .entry(path::normalize_component(component))
                .or_insert_with(|| DirNode::named(component));
        }

        let key = path::normalize_component(last);
        if entry.is_dir() {
            node.dirs.entry(key).or_insert_with(|| DirNode::named(last));
            continue;
        }

        if let Some(previous) = node.files.insert(key, index) {
            log::warn!(
                "{}: duplicate path (entry #{previous} shadowed by #{index})",
                entry.name()
            );
        }
    }

    root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{P4kWriteEntry, P4kWriteOptions, P4kWriter};
    use crate::zip::CompressionMethod;
    use crate::OpenOptions;

    fn archive(entries: Vec<P4kWriteEntry>) -> P4kArchive {
        let mut writer = P4kWriter::new(Vec::new(), P4kWriteOptions::default());
        for entry in entries {
            writer.add(entry).unwrap();
        }
        P4kArchive::from_bytes("test.p4k", writer.finish().unwrap(), OpenOptions::default()).unwrap()
    }

    fn fixture() -> P4kFileSystem {
        let inner = {
            let mut writer = P4kWriter::new(Vec::new(), P4kWriteOptions::default());
            writer
                .add(P4kWriteEntry::new(r"Inner\Level.xml", b"<level/>".to_vec()))
                .unwrap();
            writer.finish().unwrap()
        };

        P4kFileSystem::new(archive(vec![
            P4kWriteEntry::new(r"Data\Foo.xml", b"<foo/>".to_vec()),
            P4kWriteEntry::new(r"Data\Textures\a.dds", vec![1; 10]).with_method(CompressionMethod::Zstd),
            P4kWriteEntry::new(r"Data\Textures\B.dds", vec![2; 10]),
            P4kWriteEntry::new(r"Data\level.socpak", inner),
            P4kWriteEntry::new(r"Data\broken.socpak", b"nope".to_vec()),
        ]))
    }

    #[test]
    fn test_lookup_ignores_case_and_separator() {
        let fs = fixture();
        assert!(fs.file_exists("Data/Foo.xml"));
        assert!(fs.file_exists(r"Data\foo.XML"));
        assert!(fs.file_exists("data/foo.xml"));
        assert!(fs.file_exists("/data//FOO.xml"));
        assert!(!fs.file_exists("data/bar.xml"));

        assert_eq!(fs.read("DATA/FOO.XML").unwrap(), b"<foo/>");
        assert_eq!(fs.entry("data/foo.xml").unwrap().name(), r"Data\Foo.xml");
    }

    #[test]
    fn test_directories() {
        let fs = fixture();
        assert!(fs.directory_exists(""));
        assert!(fs.directory_exists("data"));
        assert!(fs.directory_exists("Data/TEXTURES"));
        assert!(!fs.directory_exists("Data/Foo.xml"));
        assert!(!fs.file_exists("Data/Textures"));
    }

    #[test]
    fn test_read_dir_is_sorted() {
        let fs = fixture();
        let names: Vec<String> = fs
            .read_dir("data")
            .unwrap()
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(names, ["Textures", "broken.socpak", "Foo.xml", "level.socpak"]);

        let textures: Vec<&str> = fs.files_in("data/textures").iter().map(|e| e.file_name()).collect();
        assert_eq!(textures, ["a.dds", "B.dds"]);

        assert!(matches!(fs.read_dir("nowhere"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let fs = fixture();
        assert!(matches!(fs.read("Data/missing.xml"), Err(Error::NotFound(_))));
        assert!(matches!(fs.read("Data/Textures"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_path_crosses_nested_container() {
        let fs = fixture();
        assert!(fs.file_exists("data/level.socpak/inner/level.xml"));
        assert!(fs.directory_exists(r"Data\level.socpak\Inner"));
        assert_eq!(fs.read("Data/Level.socpak/INNER/level.xml").unwrap(), b"<level/>");

        // Resolution does not descend for entry().
        assert!(fs.entry("data/level.socpak/inner/level.xml").is_none());

        assert!(!fs.file_exists("data/broken.socpak/anything.xml"));
        assert!(matches!(
            fs.read("data/broken.socpak/anything.xml"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_open_nested_by_path() {
        let fs = fixture();
        assert!(matches!(
            fs.open_nested("data/level.socpak").unwrap(),
            NestedProbe::Container(_)
        ));
        assert!(matches!(
            fs.open_nested("data/foo.xml").unwrap(),
            NestedProbe::NotContainer(_)
        ));
    }

    #[test]
    fn test_duplicate_paths_keep_last_entry() {
        let fs = P4kFileSystem::new(archive(vec![
            P4kWriteEntry::new(r"a\x.txt", b"first".to_vec()),
            P4kWriteEntry::new("A/X.TXT", b"second".to_vec()),
        ]));
        assert_eq!(fs.read("a/x.txt").unwrap(), b"second");
    }

    #[test]
    fn test_find_matches_predicate() {
        let fs = fixture();
        let dds: Vec<&str> = fs
            .find(|e| e.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("dds")))
            .map(|e| e.file_name())
            .collect();
        assert_eq!(dds, ["a.dds", "B.dds"]);
    }

    #[test]
    fn test_filesystem_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<P4kFileSystem>();
    }
}
