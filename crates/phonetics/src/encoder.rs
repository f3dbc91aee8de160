use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use recite_core::{DegradeReason, RecitationConfig, RecitationResult};

use crate::orthography::OrthographyMap;

/// Phonetic encoding of one transcript, tagged with how it was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "encoding", rename_all = "snake_case")]
pub enum PhonemeString {
    /// IPA from the orthography map.
    Primary { phonemes: String, scheme: String },
    /// Letters only, see [`Phonetics::fallback`].
    Fallback {
        phonemes: String,
        reason: DegradeReason,
    },
}

impl PhonemeString {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Primary { phonemes, .. } | Self::Fallback { phonemes, .. } => phonemes,
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, Self::Primary { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Primary { .. } => "primary",
            Self::Fallback { .. } => "fallback",
        }
    }

    pub fn degrade_reason(&self) -> Option<&DegradeReason> {
        match self {
            Self::Primary { .. } => None,
            Self::Fallback { reason, .. } => Some(reason),
        }
    }
}

/// Text to phoneme encoder for one writing system.
///
/// Built once and shared; encoding never fails; inputs the map cannot
/// handle come back as [`PhonemeString::Fallback`].
#[derive(Debug, Clone)]
pub struct Phonetics {
    scheme: String,
    map: Option<OrthographyMap>,
}

impl Phonetics {
    /// Use the built-in map for `scheme`, or run fallback-only without one.
    pub fn new(scheme: &str) -> Self {
        let map = OrthographyMap::builtin(scheme);
        if map.is_none() {
            warn!("no orthography map for {scheme}, phonetic scores use the letter fallback");
        }
        Self {
            scheme: scheme.to_string(),
            map,
        }
    }

    /// Use a CSV map from disk.
    pub fn with_map_file(scheme: &str, path: impl AsRef<Path>) -> RecitationResult<Self> {
        let map = OrthographyMap::from_file(scheme, path.as_ref())?;
        debug!("loaded {} graphemes for {scheme} from {}", map.len(), path.as_ref().display());
        Ok(Self {
            scheme: scheme.to_string(),
            map: Some(map),
        })
    }

    pub fn from_config(config: &RecitationConfig) -> RecitationResult<Self> {
        match &config.phonetic_map {
            Some(path) => Self::with_map_file(&config.phonetic_scheme, path),
            None => Ok(Self::new(&config.phonetic_scheme)),
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn has_map(&self) -> bool {
        self.map.is_some()
    }

    pub fn to_phonemes(&self, text: &str) -> PhonemeString {
        let Some(map) = &self.map else {
            return PhonemeString::Fallback {
                phonemes: Self::fallback(text),
                reason: DegradeReason::ResourceUnavailable(self.scheme.clone()),
            };
        };

        match map.transliterate(text) {
            Ok(phonemes) => PhonemeString::Primary {
                phonemes,
                scheme: self.scheme.clone(),
            },
            Err(unmapped) => {
                warn!("phonetic encoding degraded for {text:?}: {unmapped}");
                PhonemeString::Fallback {
                    phonemes: Self::fallback(text),
                    reason: DegradeReason::TransliterationFailed(unmapped.to_string()),
                }
            }
        }
    }

    /// Letter-only encoding: lowercase, keep word characters and Hebrew-block
    /// characters, remove all whitespace.
    pub fn fallback(text: &str) -> String {
        text.to_lowercase()
            .chars()
            .filter(|c| is_word_char(*c) || ('\u{0590}'..='\u{05FF}').contains(c))
            .collect()
    }
}

/// `\w`: letters, digits and underscore.
fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_encoding() {
        let phonetics = Phonetics::new("heb-Hebr");
        assert!(phonetics.has_map());
        let encoded = phonetics.to_phonemes("בראשית ברא");
        assert!(encoded.is_primary());
        assert_eq!(encoded.as_str(), "vʁʔʃjt vʁʔ");
        assert!(encoded.degrade_reason().is_none());
    }

    #[test]
    fn test_unknown_scheme_is_fallback_only() {
        let phonetics = Phonetics::new("klingon");
        assert!(!phonetics.has_map());
        let encoded = phonetics.to_phonemes("Hello, World");
        assert_eq!(encoded.as_str(), "helloworld");
        assert!(matches!(
            encoded.degrade_reason(),
            Some(DegradeReason::ResourceUnavailable(_))
        ));
    }

    #[test]
    fn test_unmapped_input_degrades_per_input() {
        let phonetics = Phonetics::new("heb-Hebr");
        let encoded = phonetics.to_phonemes("פרק 3, פסוק א");
        assert_eq!(encoded.kind(), "fallback");
        assert_eq!(encoded.as_str(), "פרק3פסוקא");
        assert!(matches!(
            encoded.degrade_reason(),
            Some(DegradeReason::TransliterationFailed(_))
        ));
        // the next input is unaffected
        assert!(phonetics.to_phonemes("שלום").is_primary());
    }

    #[test]
    fn test_digits_and_punctuation_only() {
        let phonetics = Phonetics::new("heb-Hebr");

        let punct = phonetics.to_phonemes("?!.,");
        assert!(punct.is_primary());
        assert_eq!(punct.as_str(), "");

        let digits = phonetics.to_phonemes("123, 456!");
        assert_eq!(digits.kind(), "fallback");
        assert_eq!(digits.as_str(), "123456");
        assert!(matches!(
            digits.degrade_reason(),
            Some(DegradeReason::TransliterationFailed(_))
        ));

        assert_eq!(phonetics.to_phonemes("3:16").as_str(), "316");
    }

    #[test]
    fn test_fallback_keeps_points_and_drops_punctuation() {
        assert_eq!(Phonetics::fallback("שָׁלוֹם, עוֹלָם!"), "שָׁלוֹםעוֹלָם");
        assert_eq!(Phonetics::fallback("  A_b\tC  "), "a_bc");
        assert_eq!(Phonetics::fallback(""), "");
    }

    #[test]
    fn test_custom_map_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mini.csv");
        std::fs::write(&path, "ש,s\nל,l\nו,o\nם,m\n").unwrap();
        let phonetics = Phonetics::with_map_file("mini", &path).unwrap();
        assert_eq!(phonetics.to_phonemes("שלום").as_str(), "slom");
    }

    #[test]
    fn test_from_config_default() {
        let phonetics = Phonetics::from_config(&RecitationConfig::default()).unwrap();
        assert_eq!(phonetics.scheme(), "heb-Hebr");
        assert!(phonetics.has_map());
    }
}
