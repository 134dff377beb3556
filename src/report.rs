use serde::{Deserialize, Serialize};

/// Misspelling report over a text fragment: one entry per token whose
/// top-ranked candidate differs from the token itself.
#[derive(Debug, Serialize, Deserialize)]
pub struct MisspellingReport {
    pub results: Vec<MisspellingEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MisspellingEntry {
    /// Character offset of the token in the lowercased input.
    pub pos_from: usize,
    /// Token length in characters.
    pub len: usize,
    pub original: String,
    /// Up to seven candidates in descending score order.
    pub candidates: Vec<ReportCandidate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportCandidate {
    pub candidate: String,
    pub score: f64,
}
