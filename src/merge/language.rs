//! Guess the language of a book's vocabulary.
//!
//! The guess is a heuristic: French words carry diacritics often enough that
//! a sample of looked-up terms tells the two supported languages apart. Above
//! [`SAMPLE_SIZE`] terms the result depends on the random sample drawn.

use rand::seq::SliceRandom;
use rand::Rng;

/// Maximum number of terms inspected
pub const SAMPLE_SIZE: usize = 50;

/// Terms shorter than this (in characters) are ignored
pub const MIN_TERM_CHARS: usize = 3;

/// Share of accented terms at which French is assumed
pub const FRENCH_THRESHOLD: f64 = 0.30;

pub const ENGLISH: &str = "en";
pub const FRENCH: &str = "fr";

const FRENCH_DIACRITICS: &[char] = &[
    'à', 'â', 'ä', 'æ', 'ç', 'é', 'è', 'ê', 'ë', 'î', 'ï', 'ô', 'œ', 'ù', 'û', 'ü', 'ÿ',
];

/// Detect the language using the thread-local RNG for sampling
pub fn detect_language_default(terms: &[String]) -> &'static str {
    detect_language(terms, &mut rand::thread_rng())
}

/// Detect the language, drawing the sample from `rng`
pub fn detect_language<R: Rng + ?Sized>(terms: &[String], rng: &mut R) -> &'static str {
    let sample: Vec<&String> = if terms.len() > SAMPLE_SIZE {
        terms.choose_multiple(rng, SAMPLE_SIZE).collect()
    } else {
        terms.iter().collect()
    };

    let mut qualifying = 0usize;
    let mut accented = 0usize;

    for term in sample {
        if term.chars().count() < MIN_TERM_CHARS {
            continue;
        }
        qualifying += 1;
        if has_french_diacritic(term) {
            accented += 1;
        }
    }

    if qualifying == 0 {
        return ENGLISH;
    }

    if accented as f64 / qualifying as f64 >= FRENCH_THRESHOLD {
        FRENCH
    } else {
        ENGLISH
    }
}

fn has_french_diacritic(term: &str) -> bool {
    term.chars()
        .flat_map(char::to_lowercase)
        .any(|c| FRENCH_DIACRITICS.contains(&c))
}
