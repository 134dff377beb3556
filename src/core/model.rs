use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;
use xxhash_rust::xxh3::Xxh3;

use crate::core::types::{fold_lower, Sentence, Token, WordId};
use crate::error::{Result, SpellError};

/// Stupid-backoff discount applied once per backoff level.
const BACKOFF: f64 = 0.4;

/// The narrow interface the correction engine consumes. The engine never
/// looks inside the model: candidate generation needs `get_word` and
/// `alphabet`, ranking needs `score` and the unigram counts, cache
/// construction needs the vocabulary walk and `checksum`.
///
/// All methods are read-only; a loaded model may be shared across
/// concurrent correction calls.
pub trait LanguageModel {
    /// Split `text` into sentences of token views pointing into `text`.
    fn tokenize<'a>(&self, text: &'a [char]) -> Vec<Sentence<'a>>;

    /// Canonical vocabulary entry for `word`, or `None` when unknown.
    fn get_word(&self, word: &[char]) -> Option<&[char]>;

    /// Log-probability of a short word sequence (higher is better).
    fn score(&self, words: &[&[char]]) -> f64;

    /// Characters used for substitution and insertion edits.
    fn alphabet(&self) -> &[char];

    fn word_id(&self, word: &[char]) -> Option<WordId>;

    fn word_count(&self, id: WordId) -> u64;

    /// Walk the vocabulary in id order.
    fn vocabulary(&self) -> impl Iterator<Item = (&[char], WordId)> + '_;

    fn vocabulary_len(&self) -> usize;

    /// 64-bit fingerprint over vocabulary and counts, used to gate the
    /// deletion cache.
    fn checksum(&self) -> u64;
}

/// Trigram language model with stupid backoff, scored in the log domain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NGramModel {
    vocab: Vec<Box<[char]>>,
    word_ids: HashMap<Box<[char]>, WordId>,
    unigrams: Vec<u64>,
    bigrams: HashMap<(WordId, WordId), u64>,
    trigrams: HashMap<(WordId, WordId, WordId), u64>,
    total_words: u64,
    alphabet: Vec<char>,
    checksum: u64,
}

impl NGramModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Train from in-memory text. `alphabet` lists the word characters;
    /// everything else is a token separator, with `.`/`!`/`?` also ending
    /// the sentence.
    pub fn train_from_text(corpus: &str, alphabet: &str) -> Self {
        let mut model = Self {
            alphabet: normalize_alphabet(alphabet),
            ..Self::default()
        };

        let lowered: Vec<char> = corpus.chars().map(fold_lower).collect();
        let sentences = model.tokenize(&lowered);
        for sentence in &sentences {
            let ids: Vec<WordId> = sentence
                .iter()
                .map(|token| model.intern(token.text))
                .collect();
            for (i, &id) in ids.iter().enumerate() {
                model.unigrams[id] += 1;
                model.total_words += 1;
                if i >= 1 {
                    *model.bigrams.entry((ids[i - 1], id)).or_insert(0) += 1;
                }
                if i >= 2 {
                    *model.trigrams.entry((ids[i - 2], ids[i - 1], id)).or_insert(0) += 1;
                }
            }
        }

        model.checksum = model.compute_checksum();
        info!(
            words = model.vocab.len(),
            total = model.total_words,
            "language model trained"
        );
        model
    }

    /// Train from a corpus file and an alphabet file.
    pub fn train(corpus_path: &Path, alphabet_path: &Path) -> Result<Self> {
        let alphabet = fs::read_to_string(alphabet_path)?;
        if normalize_alphabet(&alphabet).is_empty() {
            return Err(SpellError::EmptyAlphabet(alphabet_path.to_path_buf()));
        }
        let corpus = fs::read_to_string(corpus_path)?;
        let model = Self::train_from_text(&corpus, &alphabet);
        if model.vocab.is_empty() {
            return Err(SpellError::EmptyCorpus(corpus_path.to_path_buf()));
        }
        Ok(model)
    }

    fn intern(&mut self, word: &[char]) -> WordId {
        if let Some(&id) = self.word_ids.get(word) {
            return id;
        }
        let id = self.vocab.len();
        let stored: Box<[char]> = word.into();
        self.vocab.push(stored.clone());
        self.word_ids.insert(stored, id);
        self.unigrams.push(0);
        id
    }

    fn is_word_char(&self, c: char) -> bool {
        self.alphabet.contains(&fold_lower(c))
    }

    fn conditional_log_prob(
        &self,
        c2: Option<WordId>,
        c1: Option<WordId>,
        word: Option<WordId>,
    ) -> f64 {
        let floor = 1.0 / (self.total_words as f64 + self.vocab.len() as f64 + 1.0);
        let Some(w) = word else {
            return (BACKOFF * BACKOFF * floor).ln();
        };

        if let (Some(c2), Some(c1)) = (c2, c1) {
            if let Some(&tri) = self.trigrams.get(&(c2, c1, w)) {
                let ctx = self.bigrams.get(&(c2, c1)).copied().unwrap_or(tri).max(tri);
                return (tri as f64 / ctx as f64).ln();
            }
        }
        if let Some(c1) = c1 {
            if let Some(&bi) = self.bigrams.get(&(c1, w)) {
                let ctx = self.unigrams[c1].max(bi);
                return (BACKOFF * bi as f64 / ctx as f64).ln();
            }
        }
        let uni = self.unigrams[w] as f64;
        (BACKOFF * BACKOFF * uni.max(1.0) / self.total_words.max(1) as f64).ln()
    }

    fn compute_checksum(&self) -> u64 {
        let mut hasher = Xxh3::new();
        hasher.update(&(self.vocab.len() as u64).to_le_bytes());
        for (id, word) in self.vocab.iter().enumerate() {
            let utf8: String = word.iter().collect();
            hasher.update(utf8.as_bytes());
            hasher.update(&[0]);
            hasher.update(&self.unigrams[id].to_le_bytes());
        }
        for &c in &self.alphabet {
            hasher.update(&(c as u32).to_le_bytes());
        }
        hasher.digest()
    }
}

impl LanguageModel for NGramModel {
    fn tokenize<'a>(&self, text: &'a [char]) -> Vec<Sentence<'a>> {
        let mut sentences = Vec::new();
        let mut sentence: Sentence<'a> = Vec::new();
        let mut token_start: Option<usize> = None;

        for (i, &c) in text.iter().enumerate() {
            if self.is_word_char(c) {
                token_start.get_or_insert(i);
                continue;
            }
            if let Some(start) = token_start.take() {
                sentence.push(Token::new(&text[start..i], start));
            }
            if matches!(c, '.' | '!' | '?') && !sentence.is_empty() {
                sentences.push(std::mem::take(&mut sentence));
            }
        }
        if let Some(start) = token_start {
            sentence.push(Token::new(&text[start..], start));
        }
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        sentences
    }

    fn get_word(&self, word: &[char]) -> Option<&[char]> {
        self.word_ids.get(word).map(|&id| &*self.vocab[id])
    }

    fn score(&self, words: &[&[char]]) -> f64 {
        let ids: Vec<Option<WordId>> = words.iter().map(|w| self.word_id(w)).collect();
        let mut total = 0.0;
        for i in 0..ids.len() {
            let c1 = if i >= 1 { ids[i - 1] } else { None };
            let c2 = if i >= 2 { ids[i - 2] } else { None };
            total += self.conditional_log_prob(c2, c1, ids[i]);
        }
        total
    }

    fn alphabet(&self) -> &[char] {
        &self.alphabet
    }

    fn word_id(&self, word: &[char]) -> Option<WordId> {
        self.word_ids.get(word).copied()
    }

    fn word_count(&self, id: WordId) -> u64 {
        self.unigrams.get(id).copied().unwrap_or(0)
    }

    fn vocabulary(&self) -> impl Iterator<Item = (&[char], WordId)> + '_ {
        self.vocab.iter().enumerate().map(|(id, word)| (&**word, id))
    }

    fn vocabulary_len(&self) -> usize {
        self.vocab.len()
    }

    fn checksum(&self) -> u64 {
        self.checksum
    }
}

fn normalize_alphabet(raw: &str) -> Vec<char> {
    let mut chars: Vec<char> = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(fold_lower)
        .collect();
    chars.sort_unstable();
    chars.dedup();
    chars
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz";

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn tiny_model() -> NGramModel {
        NGramModel::train_from_text(
            "the quick brown fox. the quick brown fox. the lazy dog.",
            ALPHABET,
        )
    }

    #[test]
    fn tokenize_splits_sentences_on_terminators() {
        let model = tiny_model();
        let text = chars("hello there. how are you");
        let sentences = model.tokenize(&text);
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].len(), 2);
        assert_eq!(sentences[1].len(), 3);
        assert_eq!(sentences[0][1].to_string(), "there");
        assert_eq!(sentences[0][1].offset, 6);
    }

    #[test]
    fn tokenize_handles_mixed_case_and_punctuation() {
        let model = tiny_model();
        let text = chars("The Quick, brown-fox!");
        let sentences = model.tokenize(&text);
        assert_eq!(sentences.len(), 1);
        let words: Vec<String> = sentences[0].iter().map(|t| t.to_string()).collect();
        assert_eq!(words, vec!["The", "Quick", "brown", "fox"]);
    }

    #[test]
    fn known_words_resolve_to_canonical_form() {
        let model = tiny_model();
        assert_eq!(model.get_word(&chars("fox")), Some(chars("fox").as_slice()));
        assert_eq!(model.get_word(&chars("fix")), None);
    }

    #[test]
    fn word_counts_reflect_training_frequency() {
        let model = tiny_model();
        let the = model.word_id(&chars("the")).unwrap();
        let dog = model.word_id(&chars("dog")).unwrap();
        assert_eq!(model.word_count(the), 3);
        assert_eq!(model.word_count(dog), 1);
    }

    #[test]
    fn in_context_word_outscores_out_of_context_word() {
        let model = tiny_model();
        let seen = [
            chars("the"),
            chars("quick"),
            chars("brown"),
            chars("fox"),
        ];
        let unseen = [
            chars("the"),
            chars("quick"),
            chars("brown"),
            chars("dog"),
        ];
        let seen_refs: Vec<&[char]> = seen.iter().map(|w| w.as_slice()).collect();
        let unseen_refs: Vec<&[char]> = unseen.iter().map(|w| w.as_slice()).collect();
        assert!(model.score(&seen_refs) > model.score(&unseen_refs));
    }

    #[test]
    fn unknown_word_scores_below_any_known_word() {
        let model = tiny_model();
        let known = [chars("fox")];
        let unknown = [chars("fxo")];
        let known_refs: Vec<&[char]> = known.iter().map(|w| w.as_slice()).collect();
        let unknown_refs: Vec<&[char]> = unknown.iter().map(|w| w.as_slice()).collect();
        assert!(model.score(&known_refs) > model.score(&unknown_refs));
    }

    #[test]
    fn scores_are_finite_log_probabilities() {
        let model = tiny_model();
        let words = [chars("the"), chars("zzz")];
        let refs: Vec<&[char]> = words.iter().map(|w| w.as_slice()).collect();
        let score = model.score(&refs);
        assert!(score.is_finite());
        assert!(score < 0.0);
    }

    #[test]
    fn checksum_depends_on_training_data() {
        let a = NGramModel::train_from_text("one two three.", ALPHABET);
        let b = NGramModel::train_from_text("four five six.", ALPHABET);
        let a_again = NGramModel::train_from_text("one two three.", ALPHABET);
        assert_ne!(a.checksum(), b.checksum());
        assert_eq!(a.checksum(), a_again.checksum());
    }

    #[test]
    fn empty_alphabet_yields_no_tokens() {
        let model = NGramModel::new();
        let text = chars("anything at all.");
        assert!(model.tokenize(&text).is_empty());
    }
}
