use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::core::model::{LanguageModel, NGramModel};
use crate::core::types::{fold_lower, fold_upper, ScoredCandidate};
use crate::error::Result;
use crate::fuzzy::bloom::BloomFilter;
use crate::fuzzy::edits::{grouped_deletions2, utf8_key};
use crate::persistence;
use crate::report::{MisspellingEntry, MisspellingReport, ReportCandidate};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_KNOWN_WORDS_PENALTY: f64 = 20.0;
const DEFAULT_UNKNOWN_WORDS_PENALTY: f64 = 5.0;
const DEFAULT_MAX_CANDIDATES_TO_CHECK: usize = 14;

/// Probability-domain boost applied when the original word is known but
/// only the widened edit-distance-2 search produced alternatives. If the
/// search had to widen, the first level was empty and the model score alone
/// discriminates, so the surviving alternatives are boosted rather than
/// penalized.
const SECOND_LEVEL_BOOST: f64 = 50.0;

/// Target false-positive rate for the deletion filters.
const FALSE_POSITIVE_RATE: f64 = 0.001;

/// How many vocabulary words to sample when estimating mean word length
/// for filter sizing.
const SIZING_SAMPLE: u64 = 3000;

/// Up to this many candidates are shown per entry in the JSON report.
const REPORT_CANDIDATE_LIMIT: usize = 7;

#[derive(Debug, Clone)]
struct Scored {
    word: Vec<char>,
    score: f64,
}

/// Contextual spelling corrector: generates dictionary candidates within
/// edit distance 2 of each token, ranks them by language-model score over
/// a ±2 token window, and splices the winners back into the original text
/// preserving case, whitespace, and punctuation.
///
/// Once a model is installed the engine is read-only per correction call;
/// the setters are for setup time only.
pub struct SpellCorrector<M: LanguageModel = NGramModel> {
    model: M,
    deletes1: Option<BloomFilter>,
    deletes2: Option<BloomFilter>,
    known_words_penalty: f64,
    unknown_words_penalty: f64,
    max_candidates_to_check: usize,
}

impl SpellCorrector<NGramModel> {
    pub fn new() -> Self {
        Self::with_model(NGramModel::new())
    }

    /// Loads a trained model and its deletion cache. A missing or stale
    /// cache (bad magic, version, or checksum) is rebuilt from the model
    /// and re-saved best-effort.
    pub fn load_lang_model(&mut self, model_path: &Path) -> Result<()> {
        info!(version = VERSION, path = %model_path.display(), "loading language model");
        self.model = persistence::load_model(model_path)?;

        let cache_path = persistence::cache_path_for(model_path);
        match persistence::load_cache(&cache_path, self.model.checksum()) {
            Ok((deletes1, deletes2)) => {
                self.deletes1 = Some(deletes1);
                self.deletes2 = Some(deletes2);
            }
            Err(err) => {
                debug!(error = %err, "spell cache unusable, rebuilding");
                self.prepare_cache();
                if let (Some(d1), Some(d2)) = (&self.deletes1, &self.deletes2) {
                    if let Err(err) =
                        persistence::save_cache(&cache_path, self.model.checksum(), d1, d2)
                    {
                        warn!(error = %err, "could not save rebuilt spell cache");
                    }
                }
            }
        }
        Ok(())
    }

    /// Trains a model from a corpus and alphabet file, builds the deletion
    /// cache, and writes both the model and the cache next to `model_out`.
    pub fn train_lang_model(
        &mut self,
        corpus_path: &Path,
        alphabet_path: &Path,
        model_out: &Path,
    ) -> Result<()> {
        self.model = NGramModel::train(corpus_path, alphabet_path)?;
        self.prepare_cache();
        persistence::save_model(&self.model, model_out)?;
        if let (Some(d1), Some(d2)) = (&self.deletes1, &self.deletes2) {
            let cache_path = persistence::cache_path_for(model_out);
            persistence::save_cache(&cache_path, self.model.checksum(), d1, d2)?;
        }
        Ok(())
    }
}

impl Default for SpellCorrector<NGramModel> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: LanguageModel> SpellCorrector<M> {
    /// Wraps an already-built model. The deletion cache is not built; call
    /// [`prepare_cache`](Self::prepare_cache) to enable the fast second
    /// level, otherwise the engine falls back to direct enumeration.
    pub fn with_model(model: M) -> Self {
        Self {
            model,
            deletes1: None,
            deletes2: None,
            known_words_penalty: DEFAULT_KNOWN_WORDS_PENALTY,
            unknown_words_penalty: DEFAULT_UNKNOWN_WORDS_PENALTY,
            max_candidates_to_check: DEFAULT_MAX_CANDIDATES_TO_CHECK,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn set_penalty(&mut self, known_words_penalty: f64, unknown_words_penalty: f64) {
        self.known_words_penalty = known_words_penalty;
        self.unknown_words_penalty = unknown_words_penalty;
    }

    pub fn set_max_candidates_to_check(&mut self, max_candidates: usize) {
        self.max_candidates_to_check = max_candidates;
    }

    /// Populates the two deletion filters from the model vocabulary:
    /// every 1-deletion of every word into the first filter, every
    /// 2-deletion into the second.
    pub fn prepare_cache(&mut self) {
        info!("preparing deletion cache");

        let mut sampled = 0u64;
        let mut length_sum = 0u64;
        for (word, _) in self.model.vocabulary() {
            sampled += 1;
            length_sum += word.len() as u64;
            if sampled >= SIZING_SAMPLE {
                break;
            }
        }
        let mean_len = if sampled == 0 {
            1
        } else {
            (length_sum / sampled) + 1
        };
        let mean_len_minus_one = mean_len.saturating_sub(1).max(1);

        let vocab_len = self.model.vocabulary_len() as u64;
        let deletes1_capacity = (vocab_len * mean_len).max(1000);
        let deletes2_capacity = (vocab_len * mean_len * mean_len_minus_one).max(1000);
        debug!(mean_len, deletes1_capacity, deletes2_capacity, "sizing deletion filters");

        let mut deletes1 = BloomFilter::with_capacity(deletes1_capacity, FALSE_POSITIVE_RATE);
        let mut deletes2 = BloomFilter::with_capacity(deletes2_capacity, FALSE_POSITIVE_RATE);

        for (word, _) in self.model.vocabulary() {
            for group in grouped_deletions2(word) {
                let Some((first_level, second_level)) = group.split_last() else {
                    continue;
                };
                deletes1.insert(&utf8_key(first_level));
                for variant in second_level {
                    deletes2.insert(&utf8_key(variant));
                }
            }
        }
        info!(
            deletes1 = deletes1.len(),
            deletes2 = deletes2.len(),
            "deletion cache populated"
        );

        self.deletes1 = Some(deletes1);
        self.deletes2 = Some(deletes2);
    }

    /// Corrects a text fragment, preserving inter-token characters
    /// verbatim and mapping the original per-character capitalization onto
    /// each correction.
    pub fn fix_fragment(&self, text: &str) -> String {
        let orig_text: Vec<char> = text.chars().collect();
        let orig_sentences = self.model.tokenize(&orig_text);
        let lowered_text: Vec<char> = orig_text.iter().map(|&c| fold_lower(c)).collect();
        let sentences = self.model.tokenize(&lowered_text);

        let mut result = String::with_capacity(text.len());
        let mut orig_pos = 0usize;

        for (si, sentence) in sentences.iter().enumerate() {
            let orig_words = &orig_sentences[si];
            let mut working: Vec<Vec<char>> =
                sentence.iter().map(|t| t.text.to_vec()).collect();

            for j in 0..working.len() {
                let orig_tok = orig_words[j];
                let lowered_tok = working[j].clone();

                if let Some(top) = self.candidates_scored_raw(&working, j).into_iter().next() {
                    working[j] = top.word;
                }

                while orig_pos < orig_tok.offset {
                    result.push(orig_text[orig_pos]);
                    orig_pos += 1;
                }

                let new_word = &working[j];
                if new_word.as_slice() != lowered_tok.as_slice() {
                    for (k, &c) in new_word.iter().enumerate() {
                        let n = k.min(orig_tok.len() - 1);
                        if orig_tok.text[n].is_uppercase() {
                            result.push(fold_upper(c));
                        } else {
                            result.push(c);
                        }
                    }
                } else {
                    result.extend(orig_tok.text.iter());
                }
                orig_pos = orig_tok.offset + orig_tok.len();
            }
        }

        while orig_pos < orig_text.len() {
            result.push(orig_text[orig_pos]);
            orig_pos += 1;
        }
        result
    }

    /// Corrects a fragment and reformats it as `"w1 w2 … wN. "` per
    /// sentence, discarding the original layout. Evaluation aid.
    pub fn fix_fragment_normalized(&self, text: &str) -> String {
        let lowered: Vec<char> = text.chars().map(fold_lower).collect();
        let sentences = self.model.tokenize(&lowered);

        let mut result = String::with_capacity(text.len());
        for sentence in &sentences {
            let mut working: Vec<Vec<char>> =
                sentence.iter().map(|t| t.text.to_vec()).collect();
            for j in 0..working.len() {
                if let Some(top) = self.candidates_scored_raw(&working, j).into_iter().next() {
                    working[j] = top.word;
                }
                result.extend(working[j].iter());
                result.push(' ');
            }
            if !working.is_empty() {
                result.pop();
                result.push_str(". ");
            }
        }
        if !result.is_empty() {
            result.pop();
        }
        result
    }

    /// Ranked candidate words for `sentence[position]`.
    pub fn get_candidates(&self, sentence: &[&str], position: usize) -> Vec<String> {
        self.get_candidates_scored(sentence, position)
            .into_iter()
            .map(|c| c.word)
            .collect()
    }

    /// Ranked `(word, score)` candidates for `sentence[position]`.
    pub fn get_candidates_scored(
        &self,
        sentence: &[&str],
        position: usize,
    ) -> Vec<ScoredCandidate> {
        let owned: Vec<Vec<char>> = sentence.iter().map(|w| w.chars().collect()).collect();
        self.candidates_scored_raw(&owned, position)
            .into_iter()
            .map(|s| ScoredCandidate {
                word: s.word.iter().collect(),
                score: s.score,
            })
            .collect()
    }

    /// JSON report of every token whose top candidate differs from the
    /// token itself: position, length, original, and up to seven scored
    /// candidates in rank order.
    pub fn misspelling_report_json(&self, text: &str) -> Result<String> {
        let lowered: Vec<char> = text.chars().map(fold_lower).collect();
        let sentences = self.model.tokenize(&lowered);

        let mut results = Vec::new();
        for sentence in &sentences {
            let owned: Vec<Vec<char>> = sentence.iter().map(|t| t.text.to_vec()).collect();
            for (j, token) in sentence.iter().enumerate() {
                let candidates = self.candidates_scored_raw(&owned, j);
                let Some(top) = candidates.first() else {
                    continue;
                };
                if top.word.as_slice() == token.text {
                    continue;
                }
                results.push(MisspellingEntry {
                    pos_from: token.offset,
                    len: token.len(),
                    original: token.to_string(),
                    candidates: candidates
                        .iter()
                        .take(REPORT_CANDIDATE_LIMIT)
                        .map(|s| ReportCandidate {
                            candidate: s.word.iter().collect(),
                            score: s.score,
                        })
                        .collect(),
                });
            }
        }

        let report = MisspellingReport { results };
        Ok(serde_json::to_string_pretty(&report)?)
    }

    fn candidates_scored_raw(&self, sentence: &[Vec<char>], position: usize) -> Vec<Scored> {
        if position >= sentence.len() {
            return Vec::new();
        }
        let word = sentence[position].as_slice();

        let mut candidates = self.first_level_edits(word);
        let mut first_level = true;
        if candidates.is_empty() {
            candidates = if self.deletes1.is_some() && self.deletes2.is_some() {
                self.cached_edits(word)
            } else {
                self.legacy_edits(word)
            };
            first_level = false;
        }
        if candidates.is_empty() {
            return Vec::new();
        }

        let (original, known_word) = match self.model.get_word(word) {
            Some(canonical) => (canonical.to_vec(), true),
            None => (word.to_vec(), false),
        };
        candidates.push(original.clone());

        let mut seen: HashSet<Vec<char>> = HashSet::with_capacity(candidates.len());
        let mut unique: Vec<Vec<char>> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if seen.insert(candidate.clone()) {
                unique.push(candidate);
            }
        }

        let unique = self.filter_candidates_by_frequency(unique, &original);

        let window_start = position.saturating_sub(2);
        let window_end = sentence.len().min(position + 3);

        let mut scored: Vec<Scored> = Vec::with_capacity(unique.len());
        for candidate in unique {
            let raw = {
                let mut window: Vec<&[char]> = Vec::with_capacity(window_end - window_start);
                for i in window_start..window_end {
                    if i == position {
                        window.push(candidate.as_slice());
                    } else {
                        window.push(sentence[i].as_slice());
                    }
                }
                self.model.score(&window)
            };
            let score = self.adjusted_score(raw, candidate != original, known_word, first_level);
            scored.push(Scored {
                word: candidate,
                score,
            });
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored
    }

    /// Penalty policy over the raw log score. Candidates equal to the
    /// (canonical) original are never adjusted, so the engine can always
    /// decide "no change".
    fn adjusted_score(
        &self,
        raw: f64,
        candidate_differs: bool,
        known_word: bool,
        first_level: bool,
    ) -> f64 {
        if !candidate_differs {
            return raw;
        }
        if known_word {
            if first_level {
                raw - self.known_words_penalty
            } else {
                raw + SECOND_LEVEL_BOOST.ln()
            }
        } else {
            raw - self.unknown_words_penalty
        }
    }

    /// Direct delete/transpose/replace/insert enumeration at edit
    /// distance 1, keeping only dictionary hits (canonical forms).
    fn first_level_edits(&self, word: &[char]) -> Vec<Vec<char>> {
        let mut result = Vec::new();
        for variant in self.enumerate_edit_strings(word) {
            if let Some(canonical) = self.model.get_word(&variant) {
                result.push(canonical.to_vec());
            }
        }
        result
    }

    /// Edit-distance-2 lookup through the deletion filters: walk the
    /// 0/1/2-deletion set of `word`; dictionary members are candidates
    /// outright, and the filters prove which members are worth expanding
    /// by insertion.
    fn cached_edits(&self, word: &[char]) -> Vec<Vec<char>> {
        let (Some(deletes1), Some(deletes2)) = (&self.deletes1, &self.deletes2) else {
            return Vec::new();
        };

        let mut variants: Vec<Vec<char>> = grouped_deletions2(word)
            .into_iter()
            .flatten()
            .collect();
        variants.push(word.to_vec());

        let mut result = Vec::new();
        for variant in &variants {
            if let Some(canonical) = self.model.get_word(variant) {
                result.push(canonical.to_vec());
            }
            let key = utf8_key(variant);
            if deletes1.contains(&key) {
                self.inserts_into(variant, &mut result);
            }
            if deletes2.contains(&key) {
                self.inserts2_into(variant, deletes1, &mut result);
            }
        }
        result
    }

    /// Fallback when no cache is loaded: two explicit levels of edit
    /// enumeration, equivalent to the cached path on any dictionary.
    fn legacy_edits(&self, word: &[char]) -> Vec<Vec<char>> {
        let mut result = Vec::new();
        let mut expanded: HashSet<Vec<char>> = HashSet::new();

        for variant in self.enumerate_edit_strings(word) {
            if let Some(canonical) = self.model.get_word(&variant) {
                result.push(canonical.to_vec());
            }
            if !expanded.insert(variant.clone()) {
                continue;
            }
            for second in self.enumerate_edit_strings(&variant) {
                if let Some(canonical) = self.model.get_word(&second) {
                    result.push(canonical.to_vec());
                }
            }
        }
        result
    }

    /// All strings one edit away from `word`: deletions, adjacent
    /// transpositions, alphabet replacements, and alphabet insertions.
    fn enumerate_edit_strings(&self, word: &[char]) -> Vec<Vec<char>> {
        let alphabet = self.model.alphabet();
        let mut variants =
            Vec::with_capacity(word.len() * (2 + alphabet.len()) + alphabet.len());

        for i in 0..=word.len() {
            // delete
            if i < word.len() && word.len() > 1 {
                let mut v = Vec::with_capacity(word.len() - 1);
                v.extend_from_slice(&word[..i]);
                v.extend_from_slice(&word[i + 1..]);
                variants.push(v);
            }

            // transpose
            if i + 1 < word.len() {
                let mut v = word.to_vec();
                v.swap(i, i + 1);
                variants.push(v);
            }

            // replace
            if i < word.len() {
                for &c in alphabet {
                    let mut v = word.to_vec();
                    v[i] = c;
                    variants.push(v);
                }
            }

            // insert
            for &c in alphabet {
                let mut v = Vec::with_capacity(word.len() + 1);
                v.extend_from_slice(&word[..i]);
                v.push(c);
                v.extend_from_slice(&word[i..]);
                variants.push(v);
            }
        }
        variants
    }

    /// Every dictionary word reachable from `word` by one insertion.
    fn inserts_into(&self, word: &[char], result: &mut Vec<Vec<char>>) {
        for i in 0..=word.len() {
            for &c in self.model.alphabet() {
                let mut v = Vec::with_capacity(word.len() + 1);
                v.extend_from_slice(&word[..i]);
                v.push(c);
                v.extend_from_slice(&word[i..]);
                if let Some(canonical) = self.model.get_word(&v) {
                    result.push(canonical.to_vec());
                }
            }
        }
    }

    /// Two insertion rounds, pruned between rounds by the first-level
    /// filter: a miss there proves no dictionary word needs the second
    /// insertion down that branch.
    fn inserts2_into(
        &self,
        word: &[char],
        deletes1: &BloomFilter,
        result: &mut Vec<Vec<char>>,
    ) {
        for i in 0..=word.len() {
            for &c in self.model.alphabet() {
                let mut v = Vec::with_capacity(word.len() + 1);
                v.extend_from_slice(&word[..i]);
                v.push(c);
                v.extend_from_slice(&word[i..]);
                if deletes1.contains(&utf8_key(&v)) {
                    self.inserts_into(&v, result);
                }
            }
        }
    }

    /// Bounds scorer cost on highly ambiguous inputs: keep the
    /// `max_candidates_to_check` most frequent candidates (stable order on
    /// ties), then re-insert the original so "no change" always survives.
    fn filter_candidates_by_frequency(
        &self,
        candidates: Vec<Vec<char>>,
        original: &[char],
    ) -> Vec<Vec<char>> {
        if candidates.len() <= self.max_candidates_to_check {
            return candidates;
        }

        let mut counted: Vec<(u64, Vec<char>)> = candidates
            .into_iter()
            .map(|candidate| {
                let count = self
                    .model
                    .word_id(&candidate)
                    .map(|id| self.model.word_count(id))
                    .unwrap_or(0);
                (count, candidate)
            })
            .collect();
        counted.sort_by(|a, b| b.0.cmp(&a.0));

        let mut kept: Vec<Vec<char>> = counted
            .into_iter()
            .take(self.max_candidates_to_check)
            .map(|(_, candidate)| candidate)
            .collect();
        if !kept.iter().any(|c| c.as_slice() == original) {
            kept.push(original.to_vec());
        }
        kept
    }
}
