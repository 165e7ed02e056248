//! Hex Path addressing for render-tree nodes.
//!
//! A hex path is a dot-separated list of hex segments (`"1"`, `"1.2"`, `"1.2.a"`).
//! One `HexPathAllocator` is created per component compilation; it must never be
//! shared between components.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};

use crate::error::PathError;

/// Multiplier applied to root-level counters before encoding.
pub const ROOT_GAP: u64 = 0x1000_0000;

/// Minimum numeric distance between two sibling segments before
/// `generate_path_between` can be relied on.
pub const MIN_PATH_GAP: u64 = 2;

lazy_static! {
    static ref HEX_PATH_RE: Regex = Regex::new(r"^[0-9a-f]+(\.[0-9a-f]+)*$").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// ALLOCATOR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct HexPathAllocator {
    counters: HashMap<String, u64>,
    issued: HashMap<String, HashSet<String>>,
}

impl HexPathAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a segment not yet handed out (or reserved) under `parent_path`.
    pub fn next(&mut self, parent_path: &str) -> String {
        let is_root = parent_path.is_empty();
        loop {
            let counter = self.counters.entry(parent_path.to_string()).or_insert(0);
            *counter += 1;
            let value = if is_root {
                counter.saturating_mul(ROOT_GAP)
            } else {
                *counter
            };
            let code = encode_segment(value);
            let issued = self.issued.entry(parent_path.to_string()).or_default();
            // Trimming can fold two counters onto one code ("10" -> "1"); skip taken codes.
            if issued.insert(code.clone()) {
                return code;
            }
        }
    }

    /// Marks `segment` as taken under `parent_path` so `next` never returns it.
    pub fn reserve(&mut self, parent_path: &str, segment: &str) {
        self.issued
            .entry(parent_path.to_string())
            .or_default()
            .insert(segment.to_string());
    }

    pub fn is_issued(&self, parent_path: &str, segment: &str) -> bool {
        self.issued
            .get(parent_path)
            .map(|set| set.contains(segment))
            .unwrap_or(false)
    }
}

fn encode_segment(value: u64) -> String {
    let hex = format!("{:x}", value);
    let trimmed = hex.trim_end_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PATH OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

pub fn build_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{}.{}", parent, child)
    }
}

pub fn parse_path(path: &str) -> Vec<String> {
    if path.is_empty() {
        return vec![];
    }
    path.split('.').map(|s| s.to_string()).collect()
}

pub fn get_parent_path(path: &str) -> String {
    match path.rfind('.') {
        Some(idx) => path[..idx].to_string(),
        None => String::new(),
    }
}

pub fn get_depth(path: &str) -> usize {
    parse_path(path).len()
}

/// Strict dotted-prefix check: `"1.2"` is an ancestor of `"1.2.3"` but not of `"1.2"` or `"1.23"`.
pub fn is_ancestor_of(ancestor: &str, descendant: &str) -> bool {
    if ancestor.is_empty() {
        return !descendant.is_empty();
    }
    descendant.len() > ancestor.len()
        && descendant.starts_with(ancestor)
        && descendant.as_bytes()[ancestor.len()] == b'.'
}

pub fn is_valid_path(path: &str) -> bool {
    HEX_PATH_RE.is_match(path)
}

pub fn last_segment(path: &str) -> &str {
    match path.rfind('.') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

fn parse_segment(segment: &str) -> Result<u64, PathError> {
    u64::from_str_radix(segment, 16).map_err(|_| PathError::InvalidSegment(segment.to_string()))
}

/// Produces an address between `a` and `b` sharing their longest common prefix.
///
/// Fails with `PathError::GapExhausted` when no integer lies strictly between the
/// first differing segments; re-leveling the addresses is left to the caller.
pub fn generate_path_between(a: &str, b: &str) -> Result<String, PathError> {
    let a_segments = parse_path(a);
    let b_segments = parse_path(b);

    let common = a_segments
        .iter()
        .zip(b_segments.iter())
        .take_while(|(x, y)| x == y)
        .count();

    let low = match a_segments.get(common) {
        Some(seg) => parse_segment(seg)?,
        None => 0,
    };
    let high = match b_segments.get(common) {
        Some(seg) => parse_segment(seg)?,
        None => return Err(PathError::Unordered(a.to_string(), b.to_string())),
    };
    if low >= high {
        return Err(PathError::Unordered(a.to_string(), b.to_string()));
    }

    let mid = low + (high - low) / 2;
    if mid == low {
        return Err(PathError::GapExhausted(a.to_string(), b.to_string()));
    }

    let prefix = a_segments[..common].join(".");
    Ok(build_path(&prefix, &format!("{:x}", mid)))
}

pub fn has_sufficient_gap(a: &str, b: &str) -> bool {
    match (parse_segment(last_segment(a)), parse_segment(last_segment(b))) {
        (Ok(x), Ok(y)) => x.abs_diff(y) >= MIN_PATH_GAP,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn test_root_codes_trim_gap_zeros() {
        let mut alloc = HexPathAllocator::new();
        assert_eq!(alloc.next(""), "1");
        assert_eq!(alloc.next(""), "2");
        assert_eq!(alloc.next("1"), "1");
        assert_eq!(alloc.next("1"), "2");
        assert_eq!(alloc.next("1.1"), "1");
    }

    #[test]
    fn test_counters_never_repeat_past_sixteen() {
        let mut alloc = HexPathAllocator::new();
        let mut seen = HashSet::new();
        for _ in 0..300 {
            assert!(seen.insert(alloc.next("1")));
        }
        let mut seen_root = HashSet::new();
        for _ in 0..300 {
            assert!(seen_root.insert(alloc.next("")));
        }
    }

    #[test]
    fn test_reserved_segment_is_skipped() {
        let mut alloc = HexPathAllocator::new();
        alloc.reserve("1", "1");
        assert_eq!(alloc.next("1"), "2");
        assert!(alloc.is_issued("1", "1"));
    }

    #[rstest]
    #[case("", "1", "1")]
    #[case("1", "2", "1.2")]
    #[case("1.a", "3", "1.a.3")]
    fn test_build_path(#[case] parent: &str, #[case] child: &str, #[case] expected: &str) {
        assert_eq!(build_path(parent, child), expected);
    }

    #[rstest]
    #[case("1", "1.2", true)]
    #[case("1.2", "1.2", false)]
    #[case("1.2", "1.23", false)]
    #[case("1", "2.1", false)]
    #[case("", "1", true)]
    fn test_is_ancestor_of(#[case] a: &str, #[case] b: &str, #[case] expected: bool) {
        assert_eq!(is_ancestor_of(a, b), expected);
    }

    #[test]
    fn test_generate_between_siblings() {
        assert_eq!(generate_path_between("1.2", "1.6").unwrap(), "1.4");
        assert_eq!(generate_path_between("1.2.1", "1.4").unwrap(), "1.3");
        assert!(matches!(
            generate_path_between("1.1", "1.2"),
            Err(PathError::GapExhausted(_, _))
        ));
        assert!(!has_sufficient_gap("1.1", "1.2"));
        assert!(has_sufficient_gap("1.2", "1.6"));
    }

    #[test]
    fn test_depth_and_parent() {
        assert_eq!(get_depth(""), 0);
        assert_eq!(get_depth("1.2.3"), 3);
        assert_eq!(get_parent_path("1.2.3"), "1.2");
        assert_eq!(get_parent_path("1"), "");
        assert!(is_valid_path("1.a.10"));
        assert!(!is_valid_path("1..2"));
        assert!(!is_valid_path("G"));
    }

    fn segment() -> impl Strategy<Value = String> {
        (1u64..0xffff).prop_map(|v| format!("{:x}", v))
    }

    fn path() -> impl Strategy<Value = String> {
        proptest::collection::vec(segment(), 0..5).prop_map(|s| s.join("."))
    }

    proptest! {
        #[test]
        fn prop_build_parse_round_trip(parent in path(), child in segment()) {
            let built = build_path(&parent, &child);
            let mut expected = parse_path(&parent);
            expected.push(child.clone());
            prop_assert_eq!(parse_path(&built), expected);
            prop_assert_eq!(get_parent_path(&built), parent.clone());
            prop_assert!(is_ancestor_of(&parent, &built));
            prop_assert!(!is_ancestor_of(&built, &built));
        }

        #[test]
        fn prop_between_lies_strictly_inside(parent in path(), x in 1u64..0xffff, y in 1u64..0xffff) {
            let (low, high) = if x < y { (x, y) } else { (y, x) };
            let a = build_path(&parent, &format!("{:x}", low));
            let b = build_path(&parent, &format!("{:x}", high));
            if has_sufficient_gap(&a, &b) {
                let mid = generate_path_between(&a, &b).unwrap();
                prop_assert_eq!(get_parent_path(&mid), parent.clone());
                let value = u64::from_str_radix(last_segment(&mid), 16).unwrap();
                prop_assert!(value > low && value < high);
            }
        }

        #[test]
        fn prop_allocator_unique(parent in path(), n in 1usize..200) {
            let mut alloc = HexPathAllocator::new();
            let mut seen = HashSet::new();
            for _ in 0..n {
                prop_assert!(seen.insert(alloc.next(&parent)));
            }
        }
    }
}
