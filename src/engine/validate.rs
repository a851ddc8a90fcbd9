//! Structural audit of an assembled result.
//!
//! The validator only reports; it never repairs and never panics. Every
//! check appends a diagnostic, so a batch caller sees all defects of a bad
//! sheet at once instead of the first one per run.

use std::collections::BTreeMap;

use tracing::debug;

use crate::model::{Diagnostic, MatchRecord, Severity};

use super::ReconstructOptions;
use super::types::{BuiltMatch, ScoreToken, WinnerHint};

/// Everything the bracket checks need, borrowed from the assembler.
pub(crate) struct BracketAudit<'a> {
    pub rounds: &'a [Vec<BuiltMatch>],
    pub entrant_count: usize,
    pub orphan_scores: &'a [ScoreToken],
    pub orphan_hints: &'a [WinnerHint],
    pub dropped_count: usize,
    pub total_tokens: usize,
    pub dropped_samples: &'a [String],
}

pub(crate) fn validate_bracket(
    audit: &BracketAudit,
    options: &ReconstructOptions,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    check_drop_ratio(audit, options, &mut diagnostics);
    check_unresolved_winners(audit, options, &mut diagnostics);
    check_duplicate_entrants(audit, &mut diagnostics);
    check_walkover_scores(audit, &mut diagnostics);
    check_round_sizes(audit, &mut diagnostics);
    report_orphans(audit, &mut diagnostics);

    debug!(
        rounds = audit.rounds.len(),
        entrants = audit.entrant_count,
        diagnostics = diagnostics.len(),
        "bracket audit complete"
    );
    diagnostics
}

/// A high classifier drop rate means the page is not laid out like a
/// bracket sheet at all; everything downstream is then noise.
fn check_drop_ratio(
    audit: &BracketAudit,
    options: &ReconstructOptions,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if audit.total_tokens == 0 {
        diagnostics.push(Diagnostic::new(Severity::Fatal, "document contains no tokens"));
        return;
    }
    let ratio = audit.dropped_count as f64 / audit.total_tokens as f64;
    if ratio > options.max_dropped_token_ratio {
        diagnostics.push(
            Diagnostic::new(Severity::Fatal, "token drop rate suggests a different layout")
                .with("dropped", audit.dropped_count.to_string())
                .with("total", audit.total_tokens.to_string())
                .with("samples", audit.dropped_samples.join(" | ")),
        );
    }
}

fn check_unresolved_winners(
    audit: &BracketAudit,
    options: &ReconstructOptions,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for round in audit.rounds {
        let contested = round.iter().filter(|built| !built.is_bye).count();
        if contested == 0 {
            continue;
        }
        let unresolved = round
            .iter()
            .filter(|built| !built.is_bye && built.winner.is_none())
            .count();
        if unresolved == 0 {
            continue;
        }

        let round_number = round.first().map(|built| built.round).unwrap_or(0);
        let ratio = unresolved as f64 / contested as f64;
        let severity = if ratio > options.max_unresolved_winner_ratio {
            Severity::Fatal
        } else {
            Severity::Info
        };
        diagnostics.push(
            Diagnostic::new(severity, "matches without a resolved winner")
                .with("round", round_number.to_string())
                .with("unresolved", unresolved.to_string())
                .with("contested", contested.to_string()),
        );
    }
}

/// The same entrant appearing twice in one round means pairing went wrong
/// somewhere upstream; the bracket cannot be trusted.
fn check_duplicate_entrants(audit: &BracketAudit, diagnostics: &mut Vec<Diagnostic>) {
    for round in audit.rounds {
        let mut seen: BTreeMap<String, usize> = BTreeMap::new();
        for built in round {
            for participant in &built.participants {
                let key = participant
                    .raw_code
                    .clone()
                    .unwrap_or_else(|| format!("{}/{}", participant.full_name, participant.club));
                *seen.entry(key).or_insert(0) += 1;
            }
        }
        for (key, count) in seen {
            if count > 1 {
                let round_number = round.first().map(|built| built.round).unwrap_or(0);
                diagnostics.push(
                    Diagnostic::new(Severity::Fatal, "entrant appears twice in one round")
                        .with("round", round_number.to_string())
                        .with("entrant", key)
                        .with("count", count.to_string()),
                );
            }
        }
    }
}

fn check_walkover_scores(audit: &BracketAudit, diagnostics: &mut Vec<Diagnostic>) {
    for round in audit.rounds {
        for built in round {
            if built.is_walkover && built.score.is_some() {
                diagnostics.push(
                    Diagnostic::new(Severity::Fatal, "walkover match carried a score")
                        .with("round", built.round.to_string())
                        .with("slot", built.slot.to_string()),
                );
            }
        }
    }
}

/// Every round should hold half the previous round's matches, rounded up.
/// A larger-than-expected leading gap usually means the sheet prepends a
/// qualification stage rather than a parsing fault.
fn check_round_sizes(audit: &BracketAudit, diagnostics: &mut Vec<Diagnostic>) {
    for pair in audit.rounds.windows(2) {
        let previous = pair[0].len();
        let actual = pair[1].len();
        let expected = previous.div_ceil(2);
        if actual == expected || previous == 0 {
            continue;
        }

        let round_number = pair[1].first().map(|built| built.round).unwrap_or(0);
        let mut diagnostic = Diagnostic::new(Severity::Warning, "round does not halve its predecessor")
            .with("round", round_number.to_string())
            .with("expected", expected.to_string())
            .with("actual", actual.to_string());
        if round_number == 2 && actual > expected {
            diagnostic = diagnostic.with("possible_qualifier", "true");
        }
        diagnostics.push(diagnostic);
    }
}

/// Tokens nothing consumed. Each one is evidence of a missed match or a
/// misplaced column band, so they are reported individually with enough
/// context to find them on the page.
fn report_orphans(audit: &BracketAudit, diagnostics: &mut Vec<Diagnostic>) {
    for score in audit.orphan_scores {
        diagnostics.push(
            Diagnostic::new(Severity::Warning, "score row not attached to any match")
                .with("round", score.round.to_string())
                .with("text", score.raw_text.clone())
                .with("y", format!("{:.1}", score.y_center)),
        );
    }
    for hint in audit.orphan_hints {
        diagnostics.push(
            Diagnostic::new(Severity::Warning, "winner label not attached to any match")
                .with("round", hint.round.to_string())
                .with("text", hint.raw_text.clone())
                .with("y", format!("{:.1}", hint.y_center)),
        );
    }
}

pub(crate) fn validate_pools(
    pools: &BTreeMap<String, Vec<MatchRecord>>,
    _options: &ReconstructOptions,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for (name, matches) in pools {
        if matches.is_empty() {
            diagnostics.push(
                Diagnostic::new(Severity::Info, "pool header with no matches")
                    .with("pool", name.clone()),
            );
            continue;
        }

        let mut entrants: BTreeMap<String, ()> = BTreeMap::new();
        let mut pairs: BTreeMap<(String, String), usize> = BTreeMap::new();
        for record in matches {
            if record.is_walkover && record.scores.is_some() {
                diagnostics.push(
                    Diagnostic::new(Severity::Fatal, "walkover match carried a score")
                        .with("pool", name.clone()),
                );
            }
            let keys = record
                .participants
                .iter()
                .map(|participant| {
                    participant
                        .raw_code
                        .clone()
                        .unwrap_or_else(|| {
                            format!("{}/{}", participant.full_name, participant.club)
                        })
                })
                .collect::<Vec<String>>();
            for key in &keys {
                entrants.insert(key.clone(), ());
            }
            if keys.len() == 2 {
                let mut pair = [keys[0].clone(), keys[1].clone()];
                pair.sort();
                *pairs.entry((pair[0].clone(), pair[1].clone())).or_insert(0) += 1;
            }
        }

        for ((side1, side2), count) in &pairs {
            if *count > 1 {
                diagnostics.push(
                    Diagnostic::new(Severity::Fatal, "pair listed more than once in a pool")
                        .with("pool", name.clone())
                        .with("side1", side1.clone())
                        .with("side2", side2.clone())
                        .with("count", count.to_string()),
                );
            }
        }

        // A pool of n entrants plays at most n*(n-1)/2 matches.
        let entrant_count = entrants.len();
        let max_pairs = entrant_count * entrant_count.saturating_sub(1) / 2;
        if matches.len() > max_pairs {
            diagnostics.push(
                Diagnostic::new(Severity::Warning, "more matches than a full round robin")
                    .with("pool", name.clone())
                    .with("matches", matches.len().to_string())
                    .with("entrants", entrant_count.to_string()),
            );
        }
    }

    diagnostics
}
