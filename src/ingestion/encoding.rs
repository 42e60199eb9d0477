//! Encoding Resolver - Finds a text encoding that decodes a raw file
//!
//! Resolution is prioritized, not confidence-ranked: the first candidate that
//! decodes every byte wins, even when a later one would read extended
//! characters differently. ISO-8859-1 accepts any byte sequence, so with the
//! default list the statistical fallback only runs for custom candidate lists.

use std::collections::HashMap;

use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Bytes CP1252 leaves undefined.
const CP1252_UNDEFINED: [u8; 5] = [0x81, 0x8D, 0x8F, 0x90, 0x9D];

/// An encoding tried in order before falling back to detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateEncoding {
    Utf8,
    Latin1,
    Cp1252,
    Windows1252,
}

impl CandidateEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            CandidateEncoding::Utf8 => "utf-8",
            CandidateEncoding::Latin1 => "iso-8859-1",
            CandidateEncoding::Cp1252 => "cp1252",
            CandidateEncoding::Windows1252 => "windows-1252",
        }
    }

    /// Strict decode of the full content. `None` on the first undecodable byte.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            CandidateEncoding::Utf8 => {
                let text = std::str::from_utf8(bytes).ok()?;
                Some(text.strip_prefix('\u{FEFF}').unwrap_or(text).to_string())
            }
            CandidateEncoding::Latin1 => Some(bytes.iter().map(|&b| b as char).collect()),
            CandidateEncoding::Cp1252 | CandidateEncoding::Windows1252 => {
                if bytes.iter().any(|b| CP1252_UNDEFINED.contains(b)) {
                    return None;
                }
                let (text, had_errors) =
                    encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes);
                if had_errors {
                    None
                } else {
                    Some(text.into_owned())
                }
            }
        }
    }
}

/// How an encoding was chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionMethod {
    Candidate,
    Detected,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEncoding {
    pub name: String,
    /// In [0, 1]. Candidate decodes always report 1.0.
    pub confidence: f64,
    pub method: ResolutionMethod,
}

/// Decoded file content together with the encoding that produced it.
#[derive(Clone, Debug)]
pub struct DecodedText {
    pub encoding: ResolvedEncoding,
    pub text: String,
}

pub struct EncodingResolver {
    candidates: Vec<CandidateEncoding>,
    detectors: Vec<&'static Encoding>,
}

impl EncodingResolver {
    pub fn new() -> Self {
        Self {
            candidates: vec![
                CandidateEncoding::Utf8,
                CandidateEncoding::Latin1,
                CandidateEncoding::Cp1252,
                CandidateEncoding::Windows1252,
            ],
            detectors: vec![
                encoding_rs::WINDOWS_1252,
                encoding_rs::WINDOWS_1251,
                encoding_rs::WINDOWS_1250,
                encoding_rs::ISO_8859_2,
                encoding_rs::SHIFT_JIS,
                encoding_rs::EUC_JP,
                encoding_rs::GBK,
                encoding_rs::EUC_KR,
                encoding_rs::BIG5,
            ],
        }
    }

    pub fn with_candidates(mut self, candidates: Vec<CandidateEncoding>) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn with_detectors(mut self, detectors: Vec<&'static Encoding>) -> Self {
        self.detectors = detectors;
        self
    }

    pub fn candidates(&self) -> &[CandidateEncoding] {
        &self.candidates
    }

    /// Resolve an encoding for `bytes`, returning the decoded text.
    pub fn resolve(&self, bytes: &[u8]) -> Option<DecodedText> {
        for candidate in &self.candidates {
            debug!(encoding = candidate.name(), "trying candidate encoding");
            if let Some(text) = candidate.decode(bytes) {
                return Some(DecodedText {
                    encoding: ResolvedEncoding {
                        name: candidate.name().to_string(),
                        confidence: 1.0,
                        method: ResolutionMethod::Candidate,
                    },
                    text,
                });
            }
        }

        self.detect(bytes)
    }

    /// Statistical fallback over the detector encodings.
    ///
    /// The highest score wins and ties keep the earlier detector. A best
    /// score of zero means nothing decoded to plausible text.
    pub fn detect(&self, bytes: &[u8]) -> Option<DecodedText> {
        if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
            let (text, had_errors) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
            if !had_errors {
                return Some(DecodedText {
                    encoding: ResolvedEncoding {
                        name: encoding.name().to_string(),
                        confidence: 1.0,
                        method: ResolutionMethod::Detected,
                    },
                    text: text.into_owned(),
                });
            }
        }

        let mut best: Option<(&'static Encoding, f64, String)> = None;
        for &encoding in &self.detectors {
            let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
            if had_errors {
                continue;
            }
            let score = plausibility_score(&text);
            debug!(encoding = encoding.name(), score, "detector score");
            if best.as_ref().map_or(true, |(_, s, _)| score > *s) {
                best = Some((encoding, score, text.into_owned()));
            }
        }

        let (encoding, confidence, text) = best?;
        if confidence <= 0.0 {
            return None;
        }

        Some(DecodedText {
            encoding: ResolvedEncoding {
                name: encoding.name().to_string(),
                confidence,
                method: ResolutionMethod::Detected,
            },
            text,
        })
    }
}

impl Default for EncodingResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Score decoded text in [0, 1] from its non-ASCII characters: the share that
/// are plausible text, times the share that fall in the most common 128
/// code point block.
fn plausibility_score(text: &str) -> f64 {
    let mut total = 0usize;
    let mut plausible = 0usize;
    let mut blocks: HashMap<u32, usize> = HashMap::new();

    for ch in text.chars().filter(|c| !c.is_ascii()) {
        total += 1;
        if is_plausible(ch) {
            plausible += 1;
            *blocks.entry(ch as u32 >> 7).or_insert(0) += 1;
        }
    }

    if total == 0 {
        // Pure ASCII reads the same in every detector encoding.
        return 1.0;
    }

    let dominant = blocks.values().copied().max().unwrap_or(0);
    (plausible as f64 / total as f64) * (dominant as f64 / total as f64)
}

fn is_plausible(ch: char) -> bool {
    let cp = ch as u32;
    !(ch.is_control()
        || ch == '\u{FFFD}'
        || (0xE000..=0xF8FF).contains(&cp)
        || (0xFDD0..=0xFDEF).contains(&cp))
}
