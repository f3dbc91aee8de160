//! Grapheme to phoneme maps and the transliteration over them.

use std::collections::HashMap;
use std::path::Path;

use recite_core::{RecitationError, RecitationResult};

const HEB_HEBR: &str = include_str!("../data/heb-Hebr.csv");

const DAGESH: char = '\u{05BC}';
const RAFE: char = '\u{05BF}';
const SHIN_DOT: char = '\u{05C1}';
const SIN_DOT: char = '\u{05C2}';
const MAQAF: char = '\u{05BE}';

/// Why a text could not be transliterated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no mapping for {grapheme:?} at char {position}")]
pub struct Unmapped {
    pub grapheme: char,
    pub position: usize,
}

/// Cantillation (te'amim) and other marks that never change the reading.
fn is_cantillation(c: char) -> bool {
    matches!(c, '\u{0591}'..='\u{05AF}' | '\u{05BD}' | '\u{05C4}' | '\u{05C5}')
}

/// Points that attach to the preceding letter.
fn is_point(c: char) -> bool {
    matches!(c, '\u{05B0}'..='\u{05BC}' | RAFE | SHIN_DOT | SIN_DOT | '\u{05C7}')
}

/// Letter modifiers sort before vowel points so map keys match however the
/// marks were typed.
fn mark_rank(c: char) -> u8 {
    match c {
        DAGESH => 0,
        SHIN_DOT | SIN_DOT => 1,
        RAFE => 2,
        _ => 3,
    }
}

/// Reorder the marks of every cluster into canonical order and drop
/// cantillation.
fn normalize(text: &str) -> Vec<char> {
    let mut out: Vec<char> = Vec::with_capacity(text.len());
    let mut marks_from = 0;
    for c in text.chars() {
        if is_cantillation(c) {
            continue;
        }
        out.push(c);
        if is_point(c) {
            out[marks_from..].sort_by_key(|m| mark_rank(*m));
        } else {
            marks_from = out.len();
        }
    }
    out
}

/// Grapheme to phoneme table for one writing system.
#[derive(Debug, Clone)]
pub struct OrthographyMap {
    scheme: String,
    entries: HashMap<String, String>,
    longest: usize,
}

impl OrthographyMap {
    /// Built-in map for `scheme`, if one ships with the crate.
    pub fn builtin(scheme: &str) -> Option<Self> {
        match scheme {
            "heb-Hebr" => Self::from_csv(scheme, HEB_HEBR).ok(),
            _ => None,
        }
    }

    /// Load a `grapheme,phoneme` CSV file. `#` starts a comment line.
    pub fn from_file(scheme: &str, path: impl AsRef<Path>) -> RecitationResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| {
            RecitationError::Config(format!("cannot read orthography map {}: {e}", path.display()))
        })?;
        Self::from_csv(scheme, &data)
    }

    pub fn from_csv(scheme: &str, data: &str) -> RecitationResult<Self> {
        let mut entries = HashMap::new();
        for (lineno, raw) in data.lines().enumerate() {
            let line = raw.trim_end_matches('\r');
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                continue;
            }
            let (grapheme, phoneme) = line.split_once(',').ok_or_else(|| {
                RecitationError::Config(format!("orthography map line {}: missing comma", lineno + 1))
            })?;
            let key: String = normalize(grapheme.trim_matches(' ')).into_iter().collect();
            if key.is_empty() {
                return Err(RecitationError::Config(format!(
                    "orthography map line {}: empty grapheme",
                    lineno + 1
                )));
            }
            entries.insert(key, phoneme.trim().to_string());
        }
        if entries.is_empty() {
            return Err(RecitationError::Config("orthography map is empty".into()));
        }
        let longest = entries.keys().map(|k| k.chars().count()).max().unwrap_or(1);
        Ok(Self {
            scheme: scheme.to_string(),
            entries,
            longest,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Longest entry starting at `chars[pos]`, as `(phoneme, chars consumed)`.
    fn longest_match(&self, chars: &[char], pos: usize) -> Option<(&str, usize)> {
        let max = self.longest.min(chars.len() - pos);
        let mut key = String::new();
        let mut best = None;
        for (i, c) in chars[pos..pos + max].iter().enumerate() {
            key.push(*c);
            if let Some(phoneme) = self.entries.get(&key) {
                best = Some((phoneme.as_str(), i + 1));
            }
        }
        best
    }

    /// Transliterate `text`.
    ///
    /// Cantillation is ignored, punctuation dropped, whitespace (and maqaf)
    /// collapses to one space. Points the map does not know are skipped; a
    /// letter or digit it does not know fails the whole input.
    pub fn transliterate(&self, text: &str) -> Result<String, Unmapped> {
        let chars = normalize(text);
        let mut out = String::with_capacity(chars.len() * 2);
        let mut pending_space = false;
        let mut pos = 0;

        while pos < chars.len() {
            let c = chars[pos];
            if c.is_whitespace() || c == MAQAF {
                pending_space = !out.is_empty();
                pos += 1;
                continue;
            }

            match self.longest_match(&chars, pos) {
                Some((phoneme, used)) => {
                    if pending_space {
                        out.push(' ');
                        pending_space = false;
                    }
                    out.push_str(phoneme);
                    pos += used;
                }
                None if is_point(c) => pos += 1,
                None if c.is_alphanumeric() => {
                    return Err(Unmapped {
                        grapheme: c,
                        position: pos,
                    })
                }
                // punctuation
                None => pos += 1,
            }
        }
        Ok(out.trim_end().to_string())
    }
}
