use sha2::{Digest, Sha256};

use super::canonicalize;

/// Number of hex characters kept from the digest.
const DIGEST_PREFIX_LEN: usize = 8;

/// Short, stable identifier for a set of PR numbers, used to name aggregate
/// artifacts. Only meant for naming: never compare selections by tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionTag {
    pub digest_prefix: String,
    pub count: usize,
}

impl std::fmt::Display for SelectionTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.count, self.digest_prefix)
    }
}

/// Derive the tag for `numbers` (sorted, deduplicated) by hashing their
/// canonical rendering with SHA-256.
pub fn tag(numbers: &[u64]) -> SelectionTag {
    let mut hasher = Sha256::new();
    hasher.update(canonicalize(numbers).as_bytes());
    let digest = format!("{:x}", hasher.finalize());

    SelectionTag {
        digest_prefix: digest[..DIGEST_PREFIX_LEN].to_string(),
        count: numbers.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::parse;

    #[test]
    fn test_tag_is_deterministic() {
        let a = tag(&[1, 2, 3, 7]);
        let b = tag(&[1, 2, 3, 7]);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_tag_shape() {
        let t = tag(&[4, 5, 6]);
        assert_eq!(t.count, 3);
        assert_eq!(t.digest_prefix.len(), 8);
        assert!(t.digest_prefix.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(t.to_string().starts_with("3-"));
    }

    #[test]
    fn test_equivalent_expressions_share_tag() {
        let a = parse("1-3,5").unwrap();
        let b = parse("#5, 3, 2, 1, 1-2").unwrap();
        assert_eq!(a.tag(), b.tag());
    }

    #[test]
    fn test_changing_one_number_changes_tag() {
        let base = tag(&[10, 11, 12, 13]);
        for changed in [[10, 11, 12, 14], [9, 11, 12, 13], [10, 11, 20, 13]] {
            let mut sorted = changed.to_vec();
            sorted.sort_unstable();
            assert_ne!(tag(&sorted).digest_prefix, base.digest_prefix);
        }
    }
}
