use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse trust label assigned to a transcription result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Excellent,
    Good,
    Poor,
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Poor => "poor",
        };
        f.write_str(s)
    }
}

/// The classifier's decision for one attempt.
#[derive(Debug, Clone)]
pub struct QualityVerdict {
    pub tier: QualityTier,
    pub acceptable: bool,
    pub reason: Option<String>,
}

impl QualityVerdict {
    fn rejected(reason: &str) -> Self {
        Self {
            tier: QualityTier::Poor,
            acceptable: false,
            reason: Some(reason.to_string()),
        }
    }
}

/// Tokens that indicate the engine classified the recording as music or
/// other non-speech audio instead of transcribing it. Matched
/// case-insensitively as substrings, per the failure mode observed in the
/// field; the list is per-engine configuration, not a global constant.
pub const DEFAULT_NON_SPEECH_MARKERS: &[&str] =
    &["[música]", "[music]", "(music)", "música", "music"];

/// Transcripts shorter than this skip the repetition check; tiny clips
/// legitimately repeat words.
const MIN_WORDS_FOR_REPETITION_CHECK: usize = 20;

/// Reject when at least this fraction of words are duplicates: a decoding
/// failure loop, not speech.
const MAX_DUPLICATE_FRACTION: f64 = 0.7;

/// Score a raw transcription text.
///
/// Pure function of the text; `trusted` only selects the tier label for an
/// acceptable result (`Excellent` for higher-trust engines, `Good`
/// otherwise).
pub fn assess(text: &str, non_speech_markers: &[String], trusted: bool) -> QualityVerdict {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return QualityVerdict::rejected("empty transcript");
    }

    let lowered = trimmed.to_lowercase();
    if non_speech_markers
        .iter()
        .any(|marker| !marker.is_empty() && lowered.contains(&marker.to_lowercase()))
    {
        return QualityVerdict::rejected("non-speech classification");
    }

    let words: Vec<&str> = trimmed.split_whitespace().collect();
    if words.len() > MIN_WORDS_FOR_REPETITION_CHECK {
        let unique: HashSet<String> = words.iter().map(|w| w.to_lowercase()).collect();
        let duplicates = words.len() - unique.len();
        let fraction = duplicates as f64 / words.len() as f64;
        if fraction >= MAX_DUPLICATE_FRACTION {
            return QualityVerdict::rejected("degenerate repetition");
        }
    }

    QualityVerdict {
        tier: if trusted {
            QualityTier::Excellent
        } else {
            QualityTier::Good
        },
        acceptable: true,
        reason: None,
    }
}
