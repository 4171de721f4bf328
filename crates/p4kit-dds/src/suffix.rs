//! Mip sibling naming.
//!
//! A texture `tex.dds` may be accompanied by `tex.dds.1`, `tex.dds.2`, ...
//! holding its larger mip levels. The suffix after the base name decides
//! whether an entry belongs to the chain and at which position.

use std::ops::RangeInclusive;

use p4kit_common::path;

/// How a candidate's suffix relates to a base name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuffixMatch {
    /// Separator followed by an index without leading zeros.
    Exact(u32),
    /// Digits without the separator, or with leading zeros.
    Ambiguous(u32),
}

impl SuffixMatch {
    /// The chain index.
    pub fn index(self) -> u32 {
        match self {
            Self::Exact(index) | Self::Ambiguous(index) => index,
        }
    }

    pub fn is_ambiguous(self) -> bool {
        matches!(self, Self::Ambiguous(_))
    }
}

/// Rule for recognizing mip sibling suffixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MipSuffixRule {
    /// Character between the base name and the index.
    pub separator: char,
    /// Accepted number of index digits.
    pub digits: RangeInclusive<usize>,
    /// Drop ambiguous matches instead of including them with a warning.
    pub strict: bool,
}

impl Default for MipSuffixRule {
    fn default() -> Self {
        Self {
            separator: '.',
            digits: 1..=2,
            strict: false,
        }
    }
}

impl MipSuffixRule {
    /// Classify `candidate` against `base`. Both are file names; the prefix
    /// comparison ignores ASCII case. Returns `None` for the base itself and
    /// for names that are not siblings.
    pub fn classify(&self, base: &str, candidate: &str) -> Option<SuffixMatch> {
        let prefix = candidate.get(..base.len())?;
        if !prefix.eq_ignore_ascii_case(base) {
            return None;
        }
        let rest = &candidate[base.len()..];

        let (digits, separated) = match rest.strip_prefix(self.separator) {
            Some(digits) => (digits, true),
            None => (rest, false),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if !self.digits.contains(&digits.len()) {
            return None;
        }

        let index: u32 = digits.parse().ok()?;
        let leading_zero = digits.len() > 1 && digits.starts_with('0');
        if separated && !leading_zero {
            Some(SuffixMatch::Exact(index))
        } else {
            Some(SuffixMatch::Ambiguous(index))
        }
    }

    /// Split a sibling name into its base name and suffix.
    pub fn split<'a>(&self, name: &'a str) -> Option<(&'a str, SuffixMatch)> {
        let trimmed = name.trim_end_matches(|c: char| c.is_ascii_digit());
        if trimmed.len() == name.len() {
            return None;
        }
        let base = trimmed.strip_suffix(self.separator).unwrap_or(trimmed);
        self.classify(base, name).map(|suffix| (base, suffix))
    }
}

/// Whether `name` looks like a split mip level rather than a base texture.
///
/// Used when enumerating textures so that `tex.dds.1` is not treated as a
/// texture of its own. Ambiguous suffixes count as siblings unless the rule
/// is strict.
pub fn is_mip_sibling(name: &str, rule: &MipSuffixRule) -> bool {
    match rule.split(path::file_name(name)) {
        Some((_, SuffixMatch::Exact(_))) => true,
        Some((_, SuffixMatch::Ambiguous(_))) => !rule.strict,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_default_rule() {
        let rule = MipSuffixRule::default();
        assert_eq!(rule.classify("tex.dds", "tex.dds.1"), Some(SuffixMatch::Exact(1)));
        assert_eq!(rule.classify("tex.dds", "TEX.DDS.12"), Some(SuffixMatch::Exact(12)));
        assert_eq!(rule.classify("tex.dds", "tex.dds.05"), Some(SuffixMatch::Ambiguous(5)));
        assert_eq!(rule.classify("tex.dds", "tex.dds7"), Some(SuffixMatch::Ambiguous(7)));

        assert_eq!(rule.classify("tex.dds", "tex.dds"), None);
        assert_eq!(rule.classify("tex.dds", "tex.dds.a"), None);
        assert_eq!(rule.classify("tex.dds", "tex.dds.123"), None);
        assert_eq!(rule.classify("tex.dds", "tex.dds.1a"), None);
        assert_eq!(rule.classify("tex.dds", "other.dds.1"), None);
        assert_eq!(rule.classify("tex.dds", "tex.ddsa.1"), None);
    }

    #[test]
    fn test_custom_rule() {
        let rule = MipSuffixRule {
            separator: '_',
            digits: 1..=3,
            strict: true,
        };
        assert_eq!(rule.classify("tex.dds", "tex.dds_100"), Some(SuffixMatch::Exact(100)));
        assert_eq!(rule.classify("tex.dds", "tex.dds.1"), None);
    }

    #[test]
    fn test_is_mip_sibling() {
        let rule = MipSuffixRule::default();
        assert!(is_mip_sibling(r"Data\Textures\tex.dds.1", &rule));
        assert!(is_mip_sibling("tex.dds.10", &rule));
        assert!(is_mip_sibling("tex.dds3", &rule));
        assert!(!is_mip_sibling("tex.dds", &rule));
        assert!(!is_mip_sibling("tex.dds.a", &rule));

        let strict = MipSuffixRule {
            strict: true,
            ..Default::default()
        };
        assert!(is_mip_sibling("tex.dds.1", &strict));
        assert!(!is_mip_sibling("tex.dds3", &strict));
    }

    #[test]
    fn test_split() {
        let rule = MipSuffixRule::default();
        assert_eq!(rule.split("tex.dds.4"), Some(("tex.dds", SuffixMatch::Exact(4))));
        assert_eq!(rule.split("tex.dds"), None);
    }
}
