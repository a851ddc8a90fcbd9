//! Round-1 match builder.
//!
//! Round 1 is the only round where participants come straight from the
//! entrant column: each round-1 score row pulls in its two vertically
//! nearest unconsumed entrants. Entrants left over afterwards are byes,
//! except adjacent leftover pairs at match pitch, which are double
//! walkovers (a scheduled match neither side played) and must not be
//! conflated with byes.

use crate::model::{Diagnostic, Severity};

use super::classify::resolve_hint;
use super::geometry::{k_nearest, median, nearest_within};
use super::score_codec::normalize_sign_tokens;
use super::types::{
    BuiltMatch, Entrant, HintResolution, ScoreToken, WalkoverMarker, WinnerHint,
};

/// How far a winner label may sit from its score row's center.
pub(crate) const FIRST_ROUND_HINT_TOLERANCE: f64 = 24.0;

/// How far a bare WO marker may sit from a match center.
pub(crate) const WALKOVER_MARKER_TOLERANCE: f64 = 24.0;

/// Fallback pitch when no scored pair exists to measure against.
const DEFAULT_PAIR_GAP_LIMIT: f64 = 28.0;

#[derive(Debug, Default)]
pub(crate) struct FirstRoundOutcome {
    pub matches: Vec<BuiltMatch>,
    pub leftover_scores: Vec<ScoreToken>,
    pub leftover_hints: Vec<WinnerHint>,
    pub diagnostics: Vec<Diagnostic>,
}

pub(crate) fn build_first_round(
    entrants: &[Entrant],
    scores: Vec<ScoreToken>,
    hints: Vec<WinnerHint>,
    markers: &[WalkoverMarker],
) -> FirstRoundOutcome {
    let mut outcome = FirstRoundOutcome::default();

    let mut sorted_entrants = entrants.to_vec();
    sorted_entrants.sort_by(|a, b| a.y_center.total_cmp(&b.y_center));
    let mut entrant_used = vec![false; sorted_entrants.len()];

    let mut sorted_scores = scores;
    sorted_scores.sort_by(|a, b| a.y_center.total_cmp(&b.y_center));

    let mut hint_pool = hints;
    hint_pool.sort_by(|a, b| a.y_center.total_cmp(&b.y_center));
    let mut hint_used = vec![false; hint_pool.len()];

    let marker_centers = markers.iter().map(|marker| marker.y_center).collect::<Vec<f64>>();

    let mut pair_gaps: Vec<f64> = Vec::new();

    for score in sorted_scores {
        let available = sorted_entrants
            .iter()
            .enumerate()
            .filter(|(index, _)| !entrant_used[*index])
            .collect::<Vec<(usize, &Entrant)>>();

        if available.len() < 2 {
            outcome.leftover_scores.push(score);
            continue;
        }

        let centers = available
            .iter()
            .map(|(_, entrant)| entrant.y_center)
            .collect::<Vec<f64>>();
        let nearest = k_nearest(&centers, score.y_center, 2);

        let mut pair = vec![
            available[nearest[0]].0,
            available[nearest[1]].0,
        ];
        pair.sort_unstable();
        let (first_index, second_index) = (pair[0], pair[1]);
        entrant_used[first_index] = true;
        entrant_used[second_index] = true;

        let side1 = sorted_entrants[first_index].clone();
        let side2 = sorted_entrants[second_index].clone();
        pair_gaps.push(side2.y_center - side1.y_center);

        let (winner, hint_diagnostics) = resolve_pair_winner(
            &side1,
            &side2,
            score.y_center,
            &mut hint_pool,
            &mut hint_used,
        );
        outcome.diagnostics.extend(hint_diagnostics);

        let center = (side1.y_center + side2.y_center) / 2.0;

        // A WO marker beside a score row is a contradictory source signal:
        // report it, keep the walkover, and free the score token for the
        // orphan audit.
        let marker_nearby =
            nearest_within(&marker_centers, score.y_center, WALKOVER_MARKER_TOLERANCE).is_some();
        if marker_nearby {
            outcome.diagnostics.push(
                Diagnostic::new(
                    Severity::Fatal,
                    "walkover marker beside a scored round-1 match",
                )
                .with("side1", side1.full_name.clone())
                .with("side2", side2.full_name.clone())
                .with("score_values", normalize_sign_tokens(&score.values)),
            );
            outcome.leftover_scores.push(score);
            outcome.matches.push(BuiltMatch {
                round: 1,
                slot: 0,
                participants: vec![side1, side2],
                candidates: Vec::new(),
                winner,
                score: None,
                y_center: center,
                is_bye: false,
                is_walkover: true,
            });
            continue;
        }

        outcome.matches.push(BuiltMatch {
            round: 1,
            slot: 0,
            participants: vec![side1, side2],
            candidates: Vec::new(),
            winner,
            score: Some(score),
            y_center: center,
            is_bye: false,
            is_walkover: false,
        });
    }

    pair_leftover_entrants(
        &sorted_entrants,
        &mut entrant_used,
        &mut hint_pool,
        &mut hint_used,
        &marker_centers,
        &mut pair_gaps,
        &mut outcome,
    );

    for (index, hint) in hint_pool.into_iter().enumerate() {
        if !hint_used[index] {
            outcome.leftover_hints.push(hint);
        }
    }

    outcome
        .matches
        .sort_by(|a, b| a.y_center.total_cmp(&b.y_center));
    for (slot, built) in outcome.matches.iter_mut().enumerate() {
        built.slot = slot;
    }

    outcome
}

/// Attach the nearest unused winner label to a scored pair and resolve it.
/// Ambiguity is reported, never tie-broken; a label that matches neither
/// side stays in the pool for the orphan audit.
fn resolve_pair_winner(
    side1: &Entrant,
    side2: &Entrant,
    score_center: f64,
    hint_pool: &mut [WinnerHint],
    hint_used: &mut [bool],
) -> (Option<Entrant>, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();

    let candidate_index = {
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
        nearest_within(&centers, score_center, FIRST_ROUND_HINT_TOLERANCE)
    };

    let Some(index) = candidate_index else {
        return (None, diagnostics);
    };

    let hint = &hint_pool[index];
    let candidates = [side1, side2];
    match resolve_hint(&hint.label, hint.raw_code.as_deref(), &candidates) {
        HintResolution::Unique(winner) => {
            hint_used[index] = true;
            (Some(winner), diagnostics)
        }
        HintResolution::Ambiguous(matched) => {
            hint_used[index] = true;
            let codes = matched
                .iter()
                .map(|entrant| entrant.raw_code.clone().unwrap_or_else(|| entrant.full_name.clone()))
                .collect::<Vec<String>>()
                .join(", ");
            diagnostics.push(
                Diagnostic::new(Severity::Warning, "winner label matches multiple entrants")
                    .with("label", hint.label.clone())
                    .with("candidates", codes),
            );
            (None, diagnostics)
        }
        HintResolution::NoMatch => (None, diagnostics),
    }
}

/// Entrants no score row consumed: adjacent pairs at match pitch are double
/// walkovers, isolated entrants advance on a bye.
fn pair_leftover_entrants(
    sorted_entrants: &[Entrant],
    entrant_used: &mut [bool],
    hint_pool: &mut [WinnerHint],
    hint_used: &mut [bool],
    marker_centers: &[f64],
    pair_gaps: &mut [f64],
    outcome: &mut FirstRoundOutcome,
) {
    let pair_gap_limit = median(pair_gaps)
        .map(|pitch| pitch * 1.5)
        .unwrap_or(DEFAULT_PAIR_GAP_LIMIT);

    let leftover = sorted_entrants
        .iter()
        .enumerate()
        .filter(|(index, _)| !entrant_used[*index])
        .map(|(index, _)| index)
        .collect::<Vec<usize>>();

    let mut cursor = 0usize;
    while cursor < leftover.len() {
        let first = &sorted_entrants[leftover[cursor]];

        let paired = cursor + 1 < leftover.len() && {
            let second = &sorted_entrants[leftover[cursor + 1]];
            second.y_center - first.y_center <= pair_gap_limit
        };

        if paired {
            let second = &sorted_entrants[leftover[cursor + 1]];
            let center = (first.y_center + second.y_center) / 2.0;

            // Consume a Dubbel-WO label or bare WO marker sitting on the
            // pair, when the sheet printed one.
            let double_wo_centers = hint_pool
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
            if let Some(index) =
                nearest_within(&double_wo_centers, center, WALKOVER_MARKER_TOLERANCE)
            {
                hint_used[index] = true;
            } else {
                let _ = nearest_within(marker_centers, center, WALKOVER_MARKER_TOLERANCE);
            }

            outcome.diagnostics.push(
                Diagnostic::new(
                    Severity::Warning,
                    "round-1 pair with no score and no winner label treated as double walkover",
                )
                .with("side1", first.full_name.clone())
                .with("side2", second.full_name.clone()),
            );
            outcome.matches.push(BuiltMatch {
                round: 1,
                slot: 0,
                participants: vec![first.clone(), second.clone()],
                candidates: Vec::new(),
                winner: None,
                score: None,
                y_center: center,
                is_bye: false,
                is_walkover: true,
            });
            entrant_used[leftover[cursor]] = true;
            entrant_used[leftover[cursor + 1]] = true;
            cursor += 2;
        } else {
            outcome.matches.push(BuiltMatch {
                round: 1,
                slot: 0,
                participants: vec![first.clone()],
                candidates: Vec::new(),
                winner: Some(first.clone()),
                score: None,
                y_center: first.y_center,
                is_bye: true,
                is_walkover: false,
            });
            entrant_used[leftover[cursor]] = true;
            cursor += 1;
        }
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

    fn score(id: usize, values: &[i32], y: f64) -> ScoreToken {
        ScoreToken {
            id,
            values: values.to_vec(),
            y_center: y,
            x0: 260.0,
            round: 1,
            raw_text: values
                .iter()
                .map(|value| value.to_string())
                .collect::<Vec<String>>()
                .join(", "),
        }
    }

    fn hint(id: usize, label: &str, y: f64) -> WinnerHint {
        WinnerHint {
            id,
            label: label.to_string(),
            raw_code: None,
            y_center: y,
            x0: 300.0,
            round: 1,
            is_double_wo: false,
            raw_text: label.to_string(),
        }
    }

    #[test]
    fn scored_pairs_consume_their_two_nearest_entrants() {
        let entrants = vec![
            entrant("001", "Ahl Bo", 100.0),
            entrant("002", "Berg Casper", 120.0),
            entrant("003", "Carl Dan", 160.0),
            entrant("004", "Dahl Erik", 180.0),
        ];
        let scores = vec![score(0, &[9, 8, 7], 110.0), score(1, &[-5, -6, -7], 170.0)];
        let hints = vec![hint(2, "Ahl B", 110.0), hint(3, "Dahl E", 170.0)];

        let outcome = build_first_round(&entrants, scores, hints, &[]);
        assert_eq!(outcome.matches.len(), 2);
        assert!(outcome.leftover_scores.is_empty());
        assert!(outcome.leftover_hints.is_empty());

        let first = &outcome.matches[0];
        assert_eq!(first.participants[0].full_name, "Ahl Bo");
        assert_eq!(first.participants[1].full_name, "Berg Casper");
        assert_eq!(first.winner.as_ref().unwrap().full_name, "Ahl Bo");

        let second = &outcome.matches[1];
        assert_eq!(second.winner.as_ref().unwrap().full_name, "Dahl Erik");
    }

    #[test]
    fn unconsumed_entrant_becomes_bye_advancing_itself() {
        let entrants = vec![
            entrant("001", "Ahl Bo", 100.0),
            entrant("002", "Berg Casper", 120.0),
            entrant("003", "Carl Dan", 240.0),
        ];
        let scores = vec![score(0, &[9, 8, 7], 110.0)];

        let outcome = build_first_round(&entrants, scores, vec![], &[]);
        assert_eq!(outcome.matches.len(), 2);
        let bye = outcome
            .matches
            .iter()
            .find(|built| built.is_bye)
            .expect("bye match");
        assert_eq!(bye.participants.len(), 1);
        assert_eq!(bye.winner.as_ref().unwrap().full_name, "Carl Dan");
    }

    #[test]
    fn adjacent_leftover_pair_is_double_walkover_not_two_byes() {
        let entrants = vec![
            entrant("001", "Ahl Bo", 100.0),
            entrant("002", "Berg Casper", 120.0),
            entrant("003", "Carl Dan", 160.0),
            entrant("004", "Dahl Erik", 180.0),
        ];
        // Only the first pair has a score row.
        let scores = vec![score(0, &[9, 8, 7], 110.0)];

        let outcome = build_first_round(&entrants, scores, vec![], &[]);
        assert_eq!(outcome.matches.len(), 2);
        let walkover = &outcome.matches[1];
        assert!(walkover.is_walkover);
        assert!(!walkover.is_bye);
        assert_eq!(walkover.participants.len(), 2);
        assert!(walkover.winner.is_none());

        let warning = outcome
            .diagnostics
            .iter()
            .find(|diagnostic| diagnostic.severity == Severity::Warning)
            .expect("double walkover warning");
        assert_eq!(warning.context.get("side1").unwrap(), "Carl Dan");
        assert_eq!(warning.context.get("side2").unwrap(), "Dahl Erik");
    }

    #[test]
    fn ambiguous_winner_label_leaves_winner_unset() {
        let entrants = vec![
            entrant("001", "Ohlsén Viktor", 100.0),
            entrant("002", "Ohlsén Vilgot", 120.0),
        ];
        let scores = vec![score(0, &[9, 8, 7], 110.0)];
        let hints = vec![hint(1, "Ohlsén V", 110.0)];

        let outcome = build_first_round(&entrants, scores, hints, &[]);
        assert_eq!(outcome.matches.len(), 1);
        assert!(outcome.matches[0].winner.is_none());
        assert!(outcome.diagnostics.iter().any(|diagnostic| {
            diagnostic.severity == Severity::Warning
                && diagnostic.message.contains("multiple entrants")
        }));
    }

    #[test]
    fn marker_beside_scored_pair_is_contradiction_and_frees_the_score() {
        let entrants = vec![
            entrant("001", "Ahl Bo", 100.0),
            entrant("002", "Berg Casper", 120.0),
        ];
        let scores = vec![score(7, &[9, 8, 7], 110.0)];
        let markers = vec![WalkoverMarker {
            y_center: 112.0,
            x0: 260.0,
            round: 1,
        }];

        let outcome = build_first_round(&entrants, scores, vec![], &markers);
        assert_eq!(outcome.matches.len(), 1);
        assert!(outcome.matches[0].is_walkover);
        assert!(outcome.matches[0].score.is_none());
        assert_eq!(outcome.leftover_scores.len(), 1);
        assert_eq!(outcome.leftover_scores[0].id, 7);
        assert!(outcome.diagnostics.iter().any(|diagnostic| diagnostic.severity == Severity::Fatal));
    }

    #[test]
    fn bye_conservation_holds_for_odd_field() {
        // 5 entrants, 2 scored pairs: byes + 2 * paired == entrants.
        let entrants = vec![
            entrant("001", "Ahl Bo", 100.0),
            entrant("002", "Berg Casper", 120.0),
            entrant("003", "Carl Dan", 160.0),
            entrant("004", "Dahl Erik", 180.0),
            entrant("005", "Elm Filip", 260.0),
        ];
        let scores = vec![score(0, &[9, 8, 7], 110.0), score(1, &[9, 8, 7], 170.0)];

        let outcome = build_first_round(&entrants, scores, vec![], &[]);
        let byes = outcome.matches.iter().filter(|built| built.is_bye).count();
        let paired = outcome
            .matches
            .iter()
            .filter(|built| built.participants.len() == 2)
            .count();
        assert_eq!(byes + 2 * paired, 5);
        assert_eq!(byes, 1);
    }
}
