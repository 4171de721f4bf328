//! Archive path normalization.
//!
//! Entry names inside P4K archives mix `/` and `\` and are compared without
//! regard to case. Everything that keys on a path goes through these helpers
//! so that `Data\Foo.xml`, `data/foo.XML` and `/Data//foo.xml` all agree.

use std::path::PathBuf;

/// Split a path into its non-empty components, accepting both separators.
#[inline]
pub fn components(path: &str) -> impl Iterator<Item = &str> + '_ {
    path.split(['/', '\\']).filter(|c| !c.is_empty())
}

/// Lookup key for a path: `/`-separated, ASCII-lowercased, no empty components.
pub fn normalize_key(path: &str) -> String {
    let mut key = String::with_capacity(path.len());
    for component in components(path) {
        if !key.is_empty() {
            key.push('/');
        }
        key.extend(component.chars().map(|c| c.to_ascii_lowercase()));
    }
    key
}

/// Lookup key for a single path component.
#[inline]
pub fn normalize_component(component: &str) -> String {
    component.to_ascii_lowercase()
}

/// Display form of a path: `/`-separated, case preserved.
pub fn to_display(path: &str) -> String {
    components(path).collect::<Vec<_>>().join("/")
}

/// Stored form of a path as the game writes it: `\`-separated.
pub fn to_archive_name(path: &str) -> String {
    components(path).collect::<Vec<_>>().join("\\")
}

/// Final component of a path, or the empty string.
pub fn file_name(path: &str) -> &str {
    components(path).last().unwrap_or("")
}

/// Everything before the final component, with the original separators.
pub fn parent(path: &str) -> &str {
    let trimmed = path.trim_end_matches(['/', '\\']);
    match trimmed.rfind(['/', '\\']) {
        Some(idx) => &trimmed[..idx],
        None => "",
    }
}

/// Relative on-disk path for an entry name.
///
/// Root markers, drive prefixes, `.` and `..` components are dropped so that
/// extraction can never escape the output directory.
pub fn relative_output_path(name: &str) -> PathBuf {
    components(name)
        .filter(|c| *c != "." && *c != ".." && !c.ends_with(':'))
        .collect()
}

/// Case-insensitive path equality under separator normalization.
pub fn paths_equal(a: &str, b: &str) -> bool {
    let mut left = components(a);
    let mut right = components(b);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return true,
            (Some(l), Some(r)) if l.eq_ignore_ascii_case(r) => continue,
            _ => return false,
        }
    }
}
