//! Line normalization and hashing.
//!
//! Every comparison in this crate goes through the normalized form of a line:
//! trailing spaces, tabs and carriage returns are stripped. Hashes are 64-bit
//! FNV-1a over the normalized bytes. A line that normalizes to the empty
//! string hashes to [`BLANK_HASH`], which never matches any other hash
//! (including another blank line).

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// Reserved hash of a blank line. Never matches.
pub const BLANK_HASH: u64 = 0;

/// Strip trailing whitespace that terminals pad lines with.
pub fn normalize_line(line: &str) -> &str {
    line.trim_end_matches([' ', '\t', '\r'])
}

/// Normalize every line of a snapshot. Length preserving and idempotent.
pub fn normalize<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    lines
        .iter()
        .map(|l| normalize_line(l.as_ref()).to_string())
        .collect()
}

/// FNV-1a hash of the normalized line; blank lines map to [`BLANK_HASH`].
pub fn hash_line(line: &str) -> u64 {
    let trimmed = normalize_line(line);
    if trimmed.is_empty() {
        return BLANK_HASH;
    }
    let mut h = FNV_OFFSET_BASIS;
    for b in trimmed.bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(FNV_PRIME);
    }
    // Non-blank lines never take the sentinel.
    if h == BLANK_HASH { 1 } else { h }
}

pub fn hash_lines<S: AsRef<str>>(lines: &[S]) -> Vec<u64> {
    lines.iter().map(|l| hash_line(l.as_ref())).collect()
}

/// Equality on line hashes where the blank sentinel matches nothing.
#[inline]
pub fn hashes_match(a: u64, b: u64) -> bool {
    a != BLANK_HASH && a == b
}

/// Positional comparison: indices whose normalized lines differ, including
/// indices present in only one of the two snapshots.
pub fn find_changed_lines<S: AsRef<str>, T: AsRef<str>>(prev: &[S], next: &[T]) -> Vec<usize> {
    let max = prev.len().max(next.len());
    (0..max)
        .filter(|&i| match (prev.get(i), next.get(i)) {
            (Some(p), Some(n)) => normalize_line(p.as_ref()) != normalize_line(n.as_ref()),
            _ => true,
        })
        .collect()
}
