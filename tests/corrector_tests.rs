use std::fs;

use contextspell::persistence;
use contextspell::{LanguageModel, NGramModel, SpellCorrector};

const ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz";

/// A small English corpus with enough mass that out-of-vocabulary tokens
/// score well below common words.
fn corpus() -> String {
    "i am the best spell checker. \
     the quick brown fox jumps over the lazy dog. \
     hello world. \
     i love music. "
        .repeat(100)
}

fn corrector() -> SpellCorrector<NGramModel> {
    let mut corrector =
        SpellCorrector::with_model(NGramModel::train_from_text(&corpus(), ALPHABET));
    corrector.prepare_cache();
    corrector
}

#[test]
fn fixes_misspellings_in_context() {
    let corrector = corrector();
    assert_eq!(
        corrector.fix_fragment("I am the begt spell cherken."),
        "I am the best spell checker."
    );
}

#[test]
fn resolves_real_word_by_context() {
    let corrector = corrector();
    assert_eq!(
        corrector.fix_fragment("the quick brown fix"),
        "the quick brown fox"
    );
}

#[test]
fn preserves_leading_capital() {
    let corrector = corrector();
    assert_eq!(corrector.fix_fragment("Helo world"), "Hello world");
}

#[test]
fn maps_all_caps_onto_longer_correction() {
    let corrector = corrector();
    assert_eq!(corrector.fix_fragment("HELO world"), "HELLO world");
}

#[test]
fn fixes_single_insertion_typo() {
    let corrector = corrector();
    assert_eq!(corrector.fix_fragment("I love mussic"), "I love music");
}

#[test]
fn known_text_is_a_fixed_point() {
    let corrector = corrector();
    for text in [
        "hello",
        "i am the best spell checker.",
        "I am the best spell checker.",
        "the quick brown fox jumps over the lazy dog.",
    ] {
        assert_eq!(corrector.fix_fragment(text), text);
    }
}

#[test]
fn gibberish_far_from_vocabulary_is_unchanged() {
    let corrector = corrector();
    assert_eq!(corrector.fix_fragment("xzqvbn"), "xzqvbn");
}

#[test]
fn whitespace_and_punctuation_survive_verbatim() {
    let corrector = corrector();
    assert_eq!(
        corrector.fix_fragment("  Helo ,  world !"),
        "  Hello ,  world !"
    );
    assert_eq!(
        corrector.fix_fragment("\thello\n\nworld\t"),
        "\thello\n\nworld\t"
    );
}

#[test]
fn normalized_output_reflows_sentences() {
    let corrector = corrector();
    assert_eq!(
        corrector.fix_fragment_normalized("the quick brown fix.   helo world"),
        "the quick brown fox. hello world."
    );
}

#[test]
fn scored_candidates_are_sorted_descending() {
    let corrector = corrector();
    let scored = corrector.get_candidates_scored(&["the", "quick", "brown", "fix"], 3);
    assert!(!scored.is_empty());
    for pair in scored.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    assert_eq!(scored[0].word, "fox");
}

#[test]
fn candidate_list_always_offers_no_change() {
    let corrector = corrector();
    let candidates = corrector.get_candidates(&["the", "quick", "brown", "fix"], 3);
    assert!(candidates.iter().any(|c| c == "fix"));
}

#[test]
fn json_report_flags_each_misspelled_token() {
    let corrector = corrector();
    let json = corrector
        .misspelling_report_json("I am the begt spell cherken.")
        .unwrap();
    let report: serde_json::Value = serde_json::from_str(&json).unwrap();
    let results = report["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);

    let begt = &results[0];
    assert_eq!(begt["pos_from"], 9);
    assert_eq!(begt["len"], 4);
    assert_eq!(begt["original"], "begt");
    let begt_words: Vec<&str> = begt["candidates"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["candidate"].as_str().unwrap())
        .collect();
    assert!(begt_words.contains(&"best"));
    assert!(begt_words.len() <= 7);

    let cherken = &results[1];
    assert_eq!(cherken["pos_from"], 20);
    assert_eq!(cherken["len"], 7);
    assert_eq!(cherken["original"], "cherken");
    let cherken_words: Vec<&str> = cherken["candidates"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["candidate"].as_str().unwrap())
        .collect();
    assert!(cherken_words.contains(&"checker"));
    assert!(cherken_words.len() <= 7);
}

#[test]
fn json_report_is_empty_for_clean_text() {
    let corrector = corrector();
    let json = corrector
        .misspelling_report_json("i am the best spell checker.")
        .unwrap();
    let report: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(report["results"].as_array().unwrap().len(), 0);
}

#[test]
fn train_then_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let corpus_path = dir.path().join("corpus.txt");
    let alphabet_path = dir.path().join("alphabet.txt");
    let model_path = dir.path().join("model.bin");

    fs::write(&corpus_path, corpus()).unwrap();
    fs::write(&alphabet_path, ALPHABET).unwrap();

    let mut trainer = SpellCorrector::new();
    trainer
        .train_lang_model(&corpus_path, &alphabet_path, &model_path)
        .unwrap();
    assert!(model_path.exists());
    let cache_path = persistence::cache_path_for(&model_path);
    assert!(cache_path.exists());

    let mut corrector = SpellCorrector::new();
    corrector.load_lang_model(&model_path).unwrap();
    assert_eq!(
        corrector.fix_fragment("I am the begt spell cherken."),
        "I am the best spell checker."
    );
}

#[test]
fn stale_cache_is_rebuilt_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let corpus_path = dir.path().join("corpus.txt");
    let alphabet_path = dir.path().join("alphabet.txt");
    let model_path = dir.path().join("model.bin");

    fs::write(&corpus_path, corpus()).unwrap();
    fs::write(&alphabet_path, ALPHABET).unwrap();

    let mut trainer = SpellCorrector::new();
    trainer
        .train_lang_model(&corpus_path, &alphabet_path, &model_path)
        .unwrap();

    // Corrupt the stored checksum field; the framing stays intact but the
    // cache no longer matches the model.
    let cache_path = persistence::cache_path_for(&model_path);
    let mut bytes = fs::read(&cache_path).unwrap();
    bytes[10] ^= 0xFF;
    fs::write(&cache_path, &bytes).unwrap();

    let mut corrector = SpellCorrector::new();
    corrector.load_lang_model(&model_path).unwrap();
    assert_eq!(corrector.fix_fragment("Helo world"), "Hello world");

    // The rebuilt cache on disk is valid for the current model again.
    let checksum = corrector.model().checksum();
    assert!(persistence::load_cache(&cache_path, checksum).is_ok());
}

#[test]
fn missing_model_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut corrector = SpellCorrector::new();
    assert!(corrector
        .load_lang_model(&dir.path().join("does-not-exist.bin"))
        .is_err());
}

#[test]
fn corrections_work_without_a_cache() {
    // Legacy two-level enumeration path: same corrections, no filters.
    let corrector =
        SpellCorrector::with_model(NGramModel::train_from_text(&corpus(), ALPHABET));
    assert_eq!(
        corrector.fix_fragment("I am the begt spell cherken."),
        "I am the best spell checker."
    );
}
