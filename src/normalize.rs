pub mod charmap;

use tracing::trace;

use crate::config::{Field, LengthBounds};
use crate::consensus::NormalizedCandidate;
use crate::ocr::Candidate;
use crate::vin::{self, VIN_LENGTH};

/// Plate lengths: three-digit region code first, then two-digit.
const PLATE_LENGTHS: [usize; 2] = [9, 8];

/// Body/chassis numbers always carry at least this many digits.
const MIN_BODY_DIGITS: usize = 3;

/// Per-field canonicalisation of raw OCR text.
///
/// Never fails: malformed text simply yields `None` and the strategy that
/// produced it casts no vote.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    body_length: LengthBounds,
}

impl Normalizer {
    pub fn new(body_length: LengthBounds) -> Self {
        Self { body_length }
    }

    pub fn normalize(&self, field: Field, raw: &str) -> Option<String> {
        match field {
            Field::RegNumber => normalize_plate(raw),
            Field::Vin => normalize_vin(raw),
            Field::BodyNumber => normalize_body(raw, self.body_length),
        }
    }

    /// Normalise every candidate, dropping the rejected ones.
    pub fn normalize_all(&self, field: Field, candidates: &[Candidate]) -> Vec<NormalizedCandidate> {
        candidates
            .iter()
            .filter_map(|c| match self.normalize(field, &c.text) {
                Some(value) => Some(NormalizedCandidate {
                    value,
                    strategy: c.strategy,
                }),
                None => {
                    trace!(%field, strategy = c.strategy, raw = ?c.text, "rejected");
                    None
                }
            })
            .collect()
    }
}

// ── Registration plate ───────────────────────────────────────────────────────

/// Find a plate of the form `L DDD LL DD[D]` in Cyrillic.
///
/// Each line is upper-cased and stripped to alphanumerics, Latin
/// look-alikes become Cyrillic, then windows are tried from the left
/// (longer region code first). Letter slots read `0` as `О` and digit
/// slots read `О` as `0`. A third region digit only counts when it is
/// written in the same word as the other two.
pub fn normalize_plate(raw: &str) -> Option<String> {
    raw.lines().find_map(|line| {
        let (chars, words): (Vec<char>, Vec<usize>) = line
            .split_whitespace()
            .enumerate()
            .flat_map(|(word, token)| {
                token
                    .chars()
                    .flat_map(char::to_uppercase)
                    .filter(|c| c.is_alphanumeric())
                    .map(move |c| (charmap::to_cyrillic(c), word))
            })
            .unzip();
        find_plate(&chars, &words)
    })
}

fn find_plate(chars: &[char], words: &[usize]) -> Option<String> {
    for start in 0..chars.len() {
        for len in PLATE_LENGTHS {
            let end = start + len;
            if end > chars.len() || (len == 9 && words[end - 1] != words[end - 2]) {
                continue;
            }
            if let Some(plate) = match_plate(&chars[start..end]) {
                return Some(plate);
            }
        }
    }
    None
}

fn match_plate(window: &[char]) -> Option<String> {
    let mut plate = String::with_capacity(window.len() * 2);
    for (i, &c) in window.iter().enumerate() {
        let c = if matches!(i, 0 | 4 | 5) {
            let c = charmap::as_plate_letter(c);
            if !charmap::is_plate_letter(c) {
                return None;
            }
            c
        } else {
            let c = charmap::as_plate_digit(c);
            if !c.is_ascii_digit() {
                return None;
            }
            c
        };
        plate.push(c);
    }
    Some(plate)
}

// ── VIN ──────────────────────────────────────────────────────────────────────

/// Upper-case, map Cyrillic look-alikes to Latin, drop punctuation and
/// replace I/O/Q. `None` when the token holds letters with no Latin twin.
fn clean_latin(token: &str) -> Option<String> {
    let mut out = String::with_capacity(token.len());
    for c in token.chars().flat_map(char::to_uppercase) {
        if !c.is_alphanumeric() {
            continue;
        }
        let c = charmap::vin_substitute(charmap::to_latin(c));
        if !c.is_ascii_alphanumeric() {
            return None;
        }
        out.push(c);
    }
    (!out.is_empty()).then_some(out)
}

fn clean_lines(raw: &str) -> Vec<Vec<String>> {
    raw.lines()
        .map(|line| line.split_whitespace().filter_map(clean_latin).collect())
        .collect()
}

/// Extract a 17-character VIN.
///
/// Preference order: a single token of exactly 17, a whole line of exactly
/// 17, then the best-scoring 17-character window of a longer line.
pub fn normalize_vin(raw: &str) -> Option<String> {
    let lines = clean_lines(raw);

    let found = lines
        .iter()
        .flatten()
        .find(|t| t.len() == VIN_LENGTH)
        .cloned()
        .or_else(|| {
            lines
                .iter()
                .map(|tokens| tokens.concat())
                .find(|joined| joined.len() == VIN_LENGTH)
        })
        .or_else(|| best_window(&lines));

    found.filter(|v| vin::is_well_formed(v))
}

fn best_window(lines: &[Vec<String>]) -> Option<String> {
    let mut best: Option<(u32, String)> = None;
    for tokens in lines {
        let joined = tokens.concat();
        if joined.len() <= VIN_LENGTH {
            continue;
        }
        // `joined` is ASCII, so byte windows are char windows.
        for window in joined.as_bytes().windows(VIN_LENGTH) {
            let Ok(candidate) = std::str::from_utf8(window) else {
                continue;
            };
            let score = vin::structural_score(candidate);
            if best.as_ref().map_or(true, |(s, _)| score > *s) {
                best = Some((score, candidate.to_string()));
            }
        }
    }
    best.map(|(_, v)| v)
}

// ── Body / chassis number ────────────────────────────────────────────────────

/// Extract a body number: VIN cleaning, no fixed length.
///
/// A plausible body number holds at least three digits and fits `bounds`.
/// Single words are preferred; a whole line is glued together only when no
/// word qualifies. Among equals the longest wins, the leftmost on ties.
pub fn normalize_body(raw: &str, bounds: LengthBounds) -> Option<String> {
    let lines = clean_lines(raw);
    let plausible = |candidate: &str| {
        let digits = candidate.chars().filter(char::is_ascii_digit).count();
        bounds.contains(candidate.len()) && digits >= MIN_BODY_DIGITS
    };

    let words = lines.iter().flatten().cloned();
    let joined = lines.iter().map(|tokens| tokens.concat());
    longest(words.filter(|w| plausible(w.as_str())))
        .or_else(|| longest(joined.filter(|l| plausible(l.as_str()))))
}

/// Longest string, the first one on ties.
fn longest(candidates: impl Iterator<Item = String>) -> Option<String> {
    candidates.fold(None, |best: Option<String>, c| match best {
        Some(b) if b.len() >= c.len() => Some(b),
        _ => Some(c),
    })
}
