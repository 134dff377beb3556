//! Deletion-set enumeration for the symmetric-delete candidate scheme.
//!
//! Every word within edit distance 2 of an input either appears among the
//! input's 0/1/2-deletion variants or is reachable from one of them by one
//! or two single-character insertions. These helpers produce the deletion
//! side; the engine drives the insertion side, pruned by the bloom cache.

/// All strings obtained by deleting exactly one character. Empty results
/// are dropped so single-character words do not contribute empty keys.
pub fn deletions1(word: &[char]) -> Vec<Vec<char>> {
    if word.len() < 2 {
        return Vec::new();
    }
    let mut results = Vec::with_capacity(word.len());
    for i in 0..word.len() {
        let mut shorter = Vec::with_capacity(word.len() - 1);
        shorter.extend_from_slice(&word[..i]);
        shorter.extend_from_slice(&word[i + 1..]);
        results.push(shorter);
    }
    results
}

/// The grouped two-level deletion walk: one group per 1-deletion of `word`,
/// holding that variant's own 1-deletions followed by the variant itself as
/// the final element. Cache construction inserts the final element into the
/// first-level filter and the rest into the second-level filter.
pub fn grouped_deletions2(word: &[char]) -> Vec<Vec<Vec<char>>> {
    deletions1(word)
        .into_iter()
        .map(|variant| {
            let mut group = deletions1(&variant);
            group.push(variant);
            group
        })
        .collect()
}

/// UTF-8 rendering of a char-buffer word, the key form the bloom filters
/// operate on.
pub fn utf8_key(word: &[char]) -> String {
    word.iter().collect()
}
