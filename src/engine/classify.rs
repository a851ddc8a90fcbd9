//! Positional token classifier.
//!
//! Buckets a page's raw tokens into entrants, score runs, winner labels and
//! walkover markers via an ordered rule table: the first rule that accepts a
//! token wins, so precedence is explicit and new document families extend
//! the table instead of patching regexes in place. Tokens no rule accepts
//! are dropped but counted; the validator turns a high drop rate into a
//! format-mismatch diagnostic.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::model::Token;

use super::score_codec;
use super::types::{Entrant, HintResolution, ScoreToken, WalkoverMarker, WinnerHint};

/// Left edge of the score/label region; entrant rows start left of it.
pub(crate) const ENTRANT_COLUMN_MAX_X0: f64 = 200.0;

/// Winner labels are short "Surname I." forms; anything longer is a club
/// name or stray artifact.
const WINNER_LABEL_MAX_CHARS: usize = 15;

/// Leading draw markers such as "3>" or "2)" printed before entrant rows.
static DRAW_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+\s*[>.)\-]\s*").expect("draw prefix pattern"));

/// "046 Wang Tom (2), IFK Täby BTK" — optional code, name, optional
/// parenthesised suffix, mandatory club after the comma.
static ENTRANT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:(\d{1,3})\s+)?([^,(]+?)\s*(?:\(([^)]+)\))?\s*,\s*(.+?)\s*$")
        .expect("entrant pattern")
});

/// A score run immediately followed by a winner label inside one token,
/// e.g. "5, 8, 6, 11 169 Augustsson A".
static COMBINED_SCORE_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((?:-?\d+\s*,\s*)+-?\d+)\s+(.+)$").expect("combined score label pattern")
});

/// At least two comma-separated signed integers; a lone integer right of
/// the entrant column is usually a code or artifact, never a score.
static SCORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(?:\s*,\s*-?\d+)+$").expect("score pattern"));

/// Optional 1-3 digit code, then word characters (letters, dots, hyphens).
static WINNER_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d{1,3})\s+)?([\p{L}.\-']+(?:\s+[\p{L}.\-']+)*)$")
        .expect("winner label pattern")
});

static WO_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^wo\s+(.+)$").expect("wo prefix pattern"));

/// Sheet phrases that must never be read as winner labels: printing
/// instructions, licence boilerplate, section headers.
const HEADING_PHRASES: &[&str] = &[
    "segraren är understruken",
    "segraren ar understruken",
    "winner is underlined",
    "software license",
    "tt coordinator",
    "knock-out stage",
    "kvalifikation",
    "kvalificering",
    "qualification",
    "qualifying",
    "slutspel",
    "höstpool",
    "program",
];

#[derive(Debug, Default)]
pub(crate) struct ClassifiedTokens {
    pub entrants: Vec<Entrant>,
    pub scores: Vec<ScoreToken>,
    pub hints: Vec<WinnerHint>,
    pub markers: Vec<WalkoverMarker>,
    pub dropped_count: usize,
    pub dropped_samples: Vec<String>,
    pub total: usize,
}

/// What a single rule made of one token. `Heading` is recognised-and-ignored
/// rather than dropped so boilerplate does not inflate the mismatch signal.
#[derive(Debug)]
enum RuleOutcome {
    Entrant {
        raw_code: Option<String>,
        full_name: String,
        suffix: Option<String>,
        club: String,
    },
    Score {
        values: Vec<i32>,
    },
    ScoreWithLabel {
        values: Vec<i32>,
        label: String,
        raw_code: Option<String>,
    },
    Hint {
        label: String,
        raw_code: Option<String>,
        is_double_wo: bool,
    },
    WalkoverMarker,
    Heading,
}

type Rule = fn(&Token) -> Option<RuleOutcome>;

/// Evaluation order matters: entrants before anything else (their text can
/// contain digits and commas), markers and headings before the hint rule,
/// combined blobs before plain scores.
const RULES: &[(&str, Rule)] = &[
    ("entrant", rule_entrant),
    ("walkover_marker", rule_walkover_marker),
    ("heading", rule_heading),
    ("combined_score_label", rule_combined_score_label),
    ("score", rule_score),
    ("winner_hint", rule_winner_hint),
];

const MAX_DROPPED_SAMPLES: usize = 8;

/// Classify one page. `next_id` seeds token ids so that ids stay unique
/// across pages of the same document.
pub(crate) fn classify_page(tokens: &[Token], next_id: &mut usize) -> ClassifiedTokens {
    let mut classified = ClassifiedTokens {
        total: tokens.len(),
        ..ClassifiedTokens::default()
    };

    for token in tokens {
        if token.text.trim().is_empty() {
            continue;
        }

        let outcome = RULES
            .iter()
            .find_map(|(_, rule)| rule(token));

        match outcome {
            Some(RuleOutcome::Entrant {
                raw_code,
                full_name,
                suffix,
                club,
            }) => {
                let short_name = make_short_name(&full_name);
                classified.entrants.push(Entrant {
                    raw_code,
                    full_name,
                    club,
                    suffix,
                    short_name,
                    y_center: token.y_center(),
                });
            }
            Some(RuleOutcome::Score { values }) => {
                classified.scores.push(ScoreToken {
                    id: take_id(next_id),
                    values,
                    y_center: token.y_center(),
                    x0: token.x0,
                    round: 0,
                    raw_text: token.text.clone(),
                });
            }
            Some(RuleOutcome::ScoreWithLabel {
                values,
                label,
                raw_code,
            }) => {
                classified.scores.push(ScoreToken {
                    id: take_id(next_id),
                    values,
                    y_center: token.y_center(),
                    x0: token.x0,
                    round: 0,
                    raw_text: token.text.clone(),
                });
                classified.hints.push(WinnerHint {
                    id: take_id(next_id),
                    label,
                    raw_code,
                    y_center: token.y_center(),
                    x0: token.x0,
                    round: 0,
                    is_double_wo: false,
                    raw_text: token.text.clone(),
                });
            }
            Some(RuleOutcome::Hint {
                label,
                raw_code,
                is_double_wo,
            }) => {
                classified.hints.push(WinnerHint {
                    id: take_id(next_id),
                    label,
                    raw_code,
                    y_center: token.y_center(),
                    x0: token.x0,
                    round: 0,
                    is_double_wo,
                    raw_text: token.text.clone(),
                });
            }
            Some(RuleOutcome::WalkoverMarker) => {
                classified.markers.push(WalkoverMarker {
                    y_center: token.y_center(),
                    x0: token.x0,
                    round: 0,
                });
            }
            Some(RuleOutcome::Heading) => {}
            None => {
                classified.dropped_count += 1;
                if classified.dropped_samples.len() < MAX_DROPPED_SAMPLES {
                    classified.dropped_samples.push(token.text.clone());
                }
            }
        }
    }

    // Entrant order drives round-1 pairing; keep it top-down.
    classified
        .entrants
        .sort_by(|a, b| a.y_center.total_cmp(&b.y_center));

    debug!(
        entrants = classified.entrants.len(),
        scores = classified.scores.len(),
        hints = classified.hints.len(),
        markers = classified.markers.len(),
        dropped = classified.dropped_count,
        "classified page"
    );

    classified
}

fn take_id(next_id: &mut usize) -> usize {
    let id = *next_id;
    *next_id += 1;
    id
}

pub(crate) fn strip_draw_prefix(text: &str) -> &str {
    match DRAW_PREFIX_RE.find(text) {
        Some(found) => &text[found.end()..],
        None => text.trim(),
    }
}

fn normalize_minus(text: &str) -> String {
    text.replace('\u{2212}', "-").replace('\u{2013}', "-")
}

fn rule_entrant(token: &Token) -> Option<RuleOutcome> {
    if token.x0 >= ENTRANT_COLUMN_MAX_X0 || !token.text.contains(',') {
        return None;
    }
    let cleaned = strip_draw_prefix(token.text.trim());
    let captures = ENTRANT_RE.captures(cleaned)?;

    let full_name = captures.get(2)?.as_str().trim().to_string();
    if !full_name.chars().any(char::is_alphabetic) {
        return None;
    }

    Some(RuleOutcome::Entrant {
        raw_code: captures.get(1).map(|code| code.as_str().to_string()),
        full_name,
        suffix: captures.get(3).map(|suffix| suffix.as_str().trim().to_string()),
        club: captures.get(4)?.as_str().trim().to_string(),
    })
}

fn rule_walkover_marker(token: &Token) -> Option<RuleOutcome> {
    if token.x0 < ENTRANT_COLUMN_MAX_X0 {
        return None;
    }
    score_codec::is_walkover_text(token.text.trim()).then_some(RuleOutcome::WalkoverMarker)
}

fn rule_heading(token: &Token) -> Option<RuleOutcome> {
    let lowered = token.text.to_lowercase();
    HEADING_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
        .then_some(RuleOutcome::Heading)
}

fn rule_combined_score_label(token: &Token) -> Option<RuleOutcome> {
    if token.x0 < ENTRANT_COLUMN_MAX_X0 {
        return None;
    }
    let cleaned = normalize_minus(strip_draw_prefix(token.text.trim()));
    let captures = COMBINED_SCORE_LABEL_RE.captures(&cleaned)?;

    let values = score_codec::parse_signed_values(captures.get(1)?.as_str())?;
    let (label, raw_code) = parse_label(captures.get(2)?.as_str())?;

    Some(RuleOutcome::ScoreWithLabel {
        values,
        label,
        raw_code,
    })
}

fn rule_score(token: &Token) -> Option<RuleOutcome> {
    if token.x0 < ENTRANT_COLUMN_MAX_X0 {
        return None;
    }
    let cleaned = normalize_minus(strip_draw_prefix(token.text.trim()));
    if !SCORE_RE.is_match(&cleaned) {
        return None;
    }
    score_codec::parse_signed_values(&cleaned).map(|values| RuleOutcome::Score { values })
}

fn rule_winner_hint(token: &Token) -> Option<RuleOutcome> {
    if token.x0 < ENTRANT_COLUMN_MAX_X0 {
        return None;
    }
    let trimmed = strip_draw_prefix(token.text.trim());
    if trimmed.contains(',') {
        return None;
    }

    // "wo Wang T" means the labelled entrant advanced by walkover.
    let candidate = match WO_PREFIX_RE.captures(trimmed) {
        Some(captures) => captures.get(1).map(|rest| rest.as_str().trim()).unwrap_or(trimmed),
        None => trimmed,
    };

    if is_double_wo_label(candidate) {
        return Some(RuleOutcome::Hint {
            label: candidate.to_string(),
            raw_code: None,
            is_double_wo: true,
        });
    }

    let (label, raw_code) = parse_label(candidate)?;
    Some(RuleOutcome::Hint {
        label,
        raw_code,
        is_double_wo: false,
    })
}

/// Split an optional leading code off a winner label and vet the remainder:
/// short, digit-free, and either multi-word or code-qualified.
fn parse_label(text: &str) -> Option<(String, Option<String>)> {
    let captures = WINNER_LABEL_RE.captures(text.trim())?;
    let raw_code = captures.get(1).map(|code| code.as_str().to_string());
    let label = captures.get(2)?.as_str().trim().to_string();

    if label.chars().count() > WINNER_LABEL_MAX_CHARS {
        return None;
    }
    if label.chars().any(|character| character.is_ascii_digit()) {
        return None;
    }
    if !label.contains(' ') && raw_code.is_none() {
        return None;
    }

    Some((label, raw_code))
}

pub(crate) fn is_double_wo_label(text: &str) -> bool {
    let collapsed = text
        .chars()
        .filter(|character| character.is_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    collapsed == "dubbelwo" || collapsed == "doublewo"
}

/// "Wang Tom" -> "Wang T": sheets print surname first, so the short form is
/// the surname plus the given name's initial.
pub(crate) fn make_short_name(full_name: &str) -> String {
    let mut parts = full_name.split_whitespace();
    let surname = match parts.next() {
        Some(surname) => surname,
        None => return full_name.to_string(),
    };
    match parts.next().and_then(|given| given.chars().next()) {
        Some(initial) => format!("{surname} {initial}"),
        None => full_name.to_string(),
    }
}

/// Resolve a winner label against candidate entrants, most reliable signal
/// first: raw code, exact short name, shortened label, full-name prefix,
/// then surname + given-initial. A tie at any level is reported as
/// ambiguous, never broken arbitrarily.
pub(crate) fn resolve_hint(
    label: &str,
    raw_code: Option<&str>,
    candidates: &[&Entrant],
) -> HintResolution {
    if let Some(code) = raw_code {
        let matched = candidates
            .iter()
            .filter(|entrant| entrant.raw_code.as_deref() == Some(code))
            .collect::<Vec<_>>();
        if let Some(resolution) = settle(&matched) {
            return resolution;
        }
    }

    let label = label.trim();

    let exact = candidates
        .iter()
        .filter(|entrant| entrant.short_name == label)
        .collect::<Vec<_>>();
    if let Some(resolution) = settle(&exact) {
        return resolution;
    }

    let shortened = make_short_name(label);
    if shortened != label {
        let matched = candidates
            .iter()
            .filter(|entrant| entrant.short_name == shortened)
            .collect::<Vec<_>>();
        if let Some(resolution) = settle(&matched) {
            return resolution;
        }
    }

    let prefixed = candidates
        .iter()
        .filter(|entrant| entrant.full_name.starts_with(label))
        .collect::<Vec<_>>();
    if let Some(resolution) = settle(&prefixed) {
        return resolution;
    }

    let fuzzy = candidates
        .iter()
        .filter(|entrant| fuzzy_short_match(label, entrant))
        .collect::<Vec<_>>();
    if let Some(resolution) = settle(&fuzzy) {
        return resolution;
    }

    HintResolution::NoMatch
}

fn settle(matched: &[&&Entrant]) -> Option<HintResolution> {
    match matched.len() {
        0 => None,
        1 => Some(HintResolution::Unique((*matched[0]).clone())),
        _ => Some(HintResolution::Ambiguous(
            matched.iter().map(|entrant| (**entrant).clone()).collect(),
        )),
    }
}

/// Same surname token and same given-name initial, ignoring case and a
/// trailing abbreviation dot ("Ohlsén V." vs "Ohlsén Viktor").
fn fuzzy_short_match(label: &str, entrant: &Entrant) -> bool {
    let mut label_parts = label.split_whitespace();
    let mut name_parts = entrant.full_name.split_whitespace();

    let (Some(label_surname), Some(name_surname)) = (label_parts.next(), name_parts.next()) else {
        return false;
    };
    if !label_surname.eq_ignore_ascii_case(name_surname) {
        return false;
    }

    let label_initial = label_parts
        .next()
        .map(|part| part.trim_end_matches('.'))
        .and_then(|part| part.chars().next());
    let name_initial = name_parts.next().and_then(|part| part.chars().next());

    match (label_initial, name_initial) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(&b),
        (None, _) => true,
        (Some(_), None) => false,
    }
}
