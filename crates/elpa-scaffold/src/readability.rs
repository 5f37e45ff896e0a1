//! Deterministic text readability scoring.
//!
//! Pure functions, no I/O, no randomness — this is the one part of the
//! engine whose output is exercised directly by property tests.

use serde::{Deserialize, Serialize};

/// Result of scoring a piece of text for readability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadabilityReport {
    pub total_words: usize,
    pub total_sentences: usize,
    pub average_sentence_length: f64,
    pub average_word_length: f64,
    pub complex_word_count: usize,
    pub flesch_kincaid: f64,
    pub flesch_reading_ease: f64,
    pub suggested_elpa_level: u8,
}

fn tokenize_words(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Split on runs of `.`, `!`, `?`. An empty/whitespace-only text yields
/// the sentinel count of 1, avoiding division by zero downstream.
fn count_sentences(text: &str) -> usize {
    if text.trim().is_empty() {
        return 1;
    }
    let count = text
        .split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count();
    count.max(1)
}

/// Vowel-group heuristic: count runs of `aeiouy`, drop a trailing silent
/// `e`, floor at one syllable per word.
fn count_syllables(word: &str) -> usize {
    let lower = word.to_ascii_lowercase();
    let is_vowel = |c: char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');

    let mut count = 0usize;
    let mut in_group = false;
    for c in lower.chars() {
        if is_vowel(c) {
            if !in_group {
                count += 1;
            }
            in_group = true;
        } else {
            in_group = false;
        }
    }

    if count > 1 && lower.ends_with('e') && !lower.ends_with("le") {
        count -= 1;
    }

    count.max(1)
}

/// Score `text` for readability using the standard Flesch family of
/// formulas, clamped to a sane 0-100/0+ range, and map the result onto a
/// suggested ELPA proficiency band.
pub fn analyze_readability(text: &str) -> ReadabilityReport {
    let words = tokenize_words(text);
    let total_words = words.len();
    let total_sentences = count_sentences(text);

    if total_words == 0 {
        return ReadabilityReport {
            total_words: 0,
            total_sentences,
            average_sentence_length: 0.0,
            average_word_length: 0.0,
            complex_word_count: 0,
            flesch_kincaid: 0.0,
            flesch_reading_ease: 100.0,
            suggested_elpa_level: 1,
        };
    }

    let total_chars: usize = words.iter().map(|w| w.chars().count()).sum();
    let total_syllables: usize = words.iter().map(|w| count_syllables(w)).sum();
    let complex_word_count = words.iter().filter(|w| count_syllables(w) >= 3).count();

    let average_sentence_length = total_words as f64 / total_sentences as f64;
    let average_word_length = total_chars as f64 / total_words as f64;
    let syllables_per_word = total_syllables as f64 / total_words as f64;

    let flesch_reading_ease =
        (206.835 - 1.015 * average_sentence_length - 84.6 * syllables_per_word).clamp(0.0, 100.0);
    let flesch_kincaid =
        (0.39 * average_sentence_length + 11.8 * syllables_per_word - 15.59).max(0.0);

    let complex_density = complex_word_count as f64 / total_words as f64;
    let suggested_elpa_level = suggest_level(flesch_reading_ease, complex_density);

    ReadabilityReport {
        total_words,
        total_sentences,
        average_sentence_length,
        average_word_length,
        complex_word_count,
        flesch_kincaid,
        flesch_reading_ease,
        suggested_elpa_level,
    }
}

/// Map reading ease into one of five bands, nudged up a level when more
/// than a third of the words are complex.
fn suggest_level(reading_ease: f64, complex_density: f64) -> u8 {
    let base = if reading_ease > 85.0 {
        1
    } else if reading_ease > 70.0 {
        2
    } else if reading_ease > 50.0 {
        3
    } else if reading_ease > 30.0 {
        4
    } else {
        5
    };

    let adjusted = if complex_density > 0.33 { base + 1 } else { base };
    adjusted.clamp(1, 5)
}
