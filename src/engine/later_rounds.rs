//! Later-round match builder.
//!
//! From round 2 on, participants never come from the entrant column: slot
//! `s` of round `r` is fed by slots `2s` and `2s+1` of round `r-1`. A
//! feeder with a known winner contributes that entrant as a participant; an
//! unresolved feeder contributes its whole pool as candidates, so a winner
//! label can still identify who actually advanced.
//!
//! Later-round columns print farther from their matches than round 1 does,
//! so both attachment tolerances widen with the round number.

use crate::model::{Diagnostic, Severity};

use super::classify::resolve_hint;
use super::geometry::nearest_within;
use super::score_codec::normalize_sign_tokens;
use super::types::{BuiltMatch, Entrant, HintResolution, ScoreToken, WalkoverMarker, WinnerHint};

const BASE_HINT_TOLERANCE: f64 = 24.0;
const BASE_SCORE_TOLERANCE: f64 = 28.0;
/// Extra vertical slack per round past round 2.
const TOLERANCE_GROWTH: f64 = 4.0;

/// `(hint_tolerance, score_tolerance)` for attaching tokens to matches of
/// the given round.
pub(crate) fn tolerances_for_round(round: usize) -> (f64, f64) {
    let step = round.saturating_sub(2) as f64;
    (
        BASE_HINT_TOLERANCE + TOLERANCE_GROWTH * step,
        BASE_SCORE_TOLERANCE + TOLERANCE_GROWTH * step,
    )
}

#[derive(Debug, Default)]
pub(crate) struct NextRoundOutcome {
    pub matches: Vec<BuiltMatch>,
    pub leftover_scores: Vec<ScoreToken>,
    pub leftover_hints: Vec<WinnerHint>,
    pub diagnostics: Vec<Diagnostic>,
}

pub(crate) fn build_next_round(
    previous: &[BuiltMatch],
    round: usize,
    scores: Vec<ScoreToken>,
    hints: Vec<WinnerHint>,
    markers: &[WalkoverMarker],
) -> NextRoundOutcome {
    let (hint_tolerance, score_tolerance) = tolerances_for_round(round);
    let mut outcome = NextRoundOutcome::default();

    let mut score_pool = scores;
    score_pool.sort_by(|a, b| a.y_center.total_cmp(&b.y_center));
    let mut score_used = vec![false; score_pool.len()];

    let mut hint_pool = hints;
    hint_pool.sort_by(|a, b| a.y_center.total_cmp(&b.y_center));
    let mut hint_used = vec![false; hint_pool.len()];

    let marker_centers = markers.iter().map(|marker| marker.y_center).collect::<Vec<f64>>();

    for (slot, feeders) in previous.chunks(2).enumerate() {
        let mut built = seed_from_feeders(feeders, round, slot);

        if feeders.len() < 2 {
            // Odd feeder count; the lone survivor passes through and the
            // round-size check reports the structural gap.
            if built.participants.len() == 1 && built.candidates.is_empty() {
                built.winner = Some(built.participants[0].clone());
                built.is_bye = true;
            }
            outcome.matches.push(built);
            continue;
        }

        attach_winner_hint(
            &mut built,
            &mut hint_pool,
            &mut hint_used,
            hint_tolerance,
            &mut outcome.diagnostics,
        );

        let walkover_here = nearest_within(&marker_centers, built.y_center, hint_tolerance)
            .is_some()
            || consume_double_wo_hint(&mut hint_pool, &mut hint_used, built.y_center, hint_tolerance);

        let score_index = {
            let centers = score_pool
                .iter()
                .enumerate()
                .map(|(index, score)| {
                    if score_used[index] { f64::INFINITY } else { score.y_center }
                })
                .collect::<Vec<f64>>();
            nearest_within(&centers, built.y_center, score_tolerance)
        };

        if let Some(index) = score_index {
            score_used[index] = true;
            let score = score_pool[index].clone();
            if walkover_here {
                outcome.diagnostics.push(
                    Diagnostic::new(
                        Severity::Fatal,
                        "walkover marker beside a scored match",
                    )
                    .with("round", round.to_string())
                    .with("slot", slot.to_string())
                    .with("score_values", normalize_sign_tokens(&score.values)),
                );
                outcome.leftover_scores.push(score);
                built.is_walkover = true;
            } else {
                built.score = Some(score);
            }
        } else if walkover_here {
            built.is_walkover = true;
        }

        outcome.matches.push(built);
    }

    for (index, score) in score_pool.into_iter().enumerate() {
        if !score_used[index] {
            outcome.leftover_scores.push(score);
        }
    }
    for (index, hint) in hint_pool.into_iter().enumerate() {
        if !hint_used[index] {
            outcome.leftover_hints.push(hint);
        }
    }

    outcome
}

/// Build the participant and candidate sets for one slot from its feeder
/// matches, centered between them.
fn seed_from_feeders(feeders: &[BuiltMatch], round: usize, slot: usize) -> BuiltMatch {
    let mut participants: Vec<Entrant> = Vec::new();
    let mut candidates: Vec<Entrant> = Vec::new();

    for feeder in feeders {
        match &feeder.winner {
            Some(winner) => participants.push(winner.clone()),
            None => {
                candidates.extend(feeder.resolution_pool().into_iter().cloned());
            }
        }
    }

    let center = feeders.iter().map(|feeder| feeder.y_center).sum::<f64>()
        / feeders.len().max(1) as f64;

    BuiltMatch {
        round,
        slot,
        participants,
        candidates,
        winner: None,
        score: None,
        y_center: center,
        is_bye: false,
        is_walkover: false,
    }
}

/// Resolve the nearest unused winner label against the slot's pool. A
/// uniquely matched candidate is promoted to participant; ambiguity is
/// reported and the winner left unset.
fn attach_winner_hint(
    built: &mut BuiltMatch,
    hint_pool: &mut [WinnerHint],
    hint_used: &mut [bool],
    tolerance: f64,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let index = {
        let centers = hint_pool
            .iter()
            .enumerate()
            .map(|(index, hint)| {
                if hint_used[index] || hint.is_double_wo {
                    f64::INFINITY
                } else {
                    hint.y_center
                }
            })
            .collect::<Vec<f64>>();
        nearest_within(&centers, built.y_center, tolerance)
    };
    let Some(index) = index else { return };

    let hint = &hint_pool[index];
    let pool = built.resolution_pool();
    match resolve_hint(&hint.label, hint.raw_code.as_deref(), &pool) {
        HintResolution::Unique(winner) => {
            hint_used[index] = true;
            if !built.participants.iter().any(|p| p.key() == winner.key()) {
                built.candidates.retain(|c| c.key() != winner.key());
                built.participants.push(winner.clone());
            }
            built.winner = Some(winner);
        }
        HintResolution::Ambiguous(matched) => {
            hint_used[index] = true;
            let codes = matched
                .iter()
                .map(|entrant| {
                    entrant.raw_code.clone().unwrap_or_else(|| entrant.full_name.clone())
                })
                .collect::<Vec<String>>()
                .join(", ");
            diagnostics.push(
                Diagnostic::new(Severity::Warning, "winner label matches multiple entrants")
                    .with("round", built.round.to_string())
                    .with("label", hint.label.clone())
                    .with("candidates", codes),
            );
        }
        HintResolution::NoMatch => {}
    }
}

fn consume_double_wo_hint(
    hint_pool: &mut [WinnerHint],
    hint_used: &mut [bool],
    center: f64,
    tolerance: f64,
) -> bool {
    let centers = hint_pool
        .iter()
        .enumerate()
        .map(|(index, hint)| {
            if hint_used[index] || !hint.is_double_wo {
                f64::INFINITY
            } else {
                hint.y_center
            }
        })
        .collect::<Vec<f64>>();
    match nearest_within(&centers, center, tolerance) {
        Some(index) => {
            hint_used[index] = true;
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::classify::make_short_name;

    fn entrant(code: &str, name: &str, y: f64) -> Entrant {
        Entrant {
            raw_code: Some(code.to_string()),
            full_name: name.to_string(),
            club: "Klubb".to_string(),
            suffix: None,
            short_name: make_short_name(name),
            y_center: y,
        }
    }

    fn feeder(slot: usize, winner: Option<Entrant>, participants: Vec<Entrant>, y: f64) -> BuiltMatch {
        BuiltMatch {
            round: 1,
            slot,
            participants,
            candidates: Vec::new(),
            winner,
            score: None,
            y_center: y,
            is_bye: false,
            is_walkover: false,
        }
    }

    fn score(id: usize, values: &[i32], y: f64) -> ScoreToken {
        ScoreToken {
            id,
            values: values.to_vec(),
            y_center: y,
            x0: 340.0,
            round: 2,
            raw_text: String::new(),
        }
    }

    fn hint(id: usize, label: &str, y: f64) -> WinnerHint {
        WinnerHint {
            id,
            label: label.to_string(),
            raw_code: None,
            y_center: y,
            x0: 380.0,
            round: 2,
            is_double_wo: false,
            raw_text: label.to_string(),
        }
    }

    #[test]
    fn resolved_feeders_contribute_their_winners() {
        let a = entrant("001", "Ahl Bo", 100.0);
        let d = entrant("004", "Dahl Erik", 180.0);
        let previous = vec![
            feeder(0, Some(a.clone()), vec![a.clone()], 110.0),
            feeder(1, Some(d.clone()), vec![d.clone()], 170.0),
        ];
        let scores = vec![score(0, &[9, 8, 7], 140.0)];
        let hints = vec![hint(1, "Ahl B", 140.0)];

        let outcome = build_next_round(&previous, 2, scores, hints, &[]);
        assert_eq!(outcome.matches.len(), 1);
        let built = &outcome.matches[0];
        assert_eq!(built.participants.len(), 2);
        assert_eq!(built.winner.as_ref().unwrap().full_name, "Ahl Bo");
        assert!(built.score.is_some());
        assert!(outcome.leftover_scores.is_empty());
    }

    #[test]
    fn unresolved_feeder_candidates_resolve_through_the_label() {
        let a = entrant("001", "Ahl Bo", 100.0);
        let b = entrant("002", "Berg Casper", 120.0);
        let d = entrant("004", "Dahl Erik", 180.0);
        let previous = vec![
            // Round-1 winner unknown; both sides carry forward as candidates.
            feeder(0, None, vec![a.clone(), b.clone()], 110.0),
            feeder(1, Some(d.clone()), vec![d.clone()], 170.0),
        ];
        let hints = vec![hint(0, "Berg C", 140.0)];

        let outcome = build_next_round(&previous, 2, vec![], hints, &[]);
        let built = &outcome.matches[0];
        assert_eq!(built.winner.as_ref().unwrap().full_name, "Berg Casper");
        // The matched candidate was promoted to a participant.
        assert!(built.participants.iter().any(|p| p.full_name == "Berg Casper"));
        assert!(built.candidates.iter().all(|c| c.full_name != "Berg Casper"));
    }

    #[test]
    fn score_outside_tolerance_stays_unconsumed() {
        let a = entrant("001", "Ahl Bo", 100.0);
        let d = entrant("004", "Dahl Erik", 180.0);
        let previous = vec![
            feeder(0, Some(a.clone()), vec![a], 110.0),
            feeder(1, Some(d.clone()), vec![d], 170.0),
        ];
        // Center is 140; round-2 score tolerance is 28.
        let scores = vec![score(3, &[9, 8, 7], 240.0)];

        let outcome = build_next_round(&previous, 2, scores, vec![], &[]);
        assert!(outcome.matches[0].score.is_none());
        assert_eq!(outcome.leftover_scores.len(), 1);
        assert_eq!(outcome.leftover_scores[0].id, 3);
    }

    #[test]
    fn walkover_marker_marks_unscored_match() {
        let a = entrant("001", "Ahl Bo", 100.0);
        let d = entrant("004", "Dahl Erik", 180.0);
        let previous = vec![
            feeder(0, Some(a.clone()), vec![a], 110.0),
            feeder(1, Some(d.clone()), vec![d], 170.0),
        ];
        let markers = vec![WalkoverMarker { y_center: 142.0, x0: 340.0, round: 2 }];

        let outcome = build_next_round(&previous, 2, vec![], vec![], &markers);
        assert!(outcome.matches[0].is_walkover);
        assert!(outcome.matches[0].score.is_none());
    }

    #[test]
    fn tolerances_widen_with_round() {
        assert_eq!(tolerances_for_round(2), (24.0, 28.0));
        assert_eq!(tolerances_for_round(3), (28.0, 32.0));
        assert_eq!(tolerances_for_round(5), (36.0, 40.0));
    }

    #[test]
    fn lone_feeder_passes_through() {
        let a = entrant("001", "Ahl Bo", 100.0);
        let previous = vec![feeder(0, Some(a.clone()), vec![a], 110.0)];

        let outcome = build_next_round(&previous, 2, vec![], vec![], &[]);
        assert_eq!(outcome.matches.len(), 1);
        assert!(outcome.matches[0].is_bye);
        assert_eq!(outcome.matches[0].winner.as_ref().unwrap().full_name, "Ahl Bo");
    }
}
