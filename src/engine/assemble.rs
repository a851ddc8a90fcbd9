//! Bracket assembly pipeline.
//!
//! Each page is a self-contained sub-bracket (large draws print one half
//! per page), so classification, round banding and match building all run
//! per page; the per-round match lists are then concatenated in page order.
//! Winner backfill from later rounds is the one inference step applied on
//! top of the builders, after which everything funnels into the validator.

use tracing::debug;

use crate::model::{
    Diagnostic, MatchRecord, Mode, Page, ReconstructionResult, Severity,
};

use super::ReconstructOptions;
use super::classify::classify_page;
use super::columns::{RoundBands, assign_rounds};
use super::first_round::build_first_round;
use super::later_rounds::build_next_round;
use super::score_codec::{decode_match_scores, infer_best_of, normalize_sign_tokens};
use super::types::{BuiltMatch, ScoreToken, WalkoverMarker, WinnerHint};
use super::validate::{BracketAudit, validate_bracket};

/// Everything one page contributed, before cross-page merging.
#[derive(Debug, Default)]
struct PageOutcome {
    rounds: Vec<Vec<BuiltMatch>>,
    orphan_scores: Vec<ScoreToken>,
    orphan_hints: Vec<WinnerHint>,
    diagnostics: Vec<Diagnostic>,
    entrant_count: usize,
}

pub(crate) fn assemble_bracket(
    pages: &[Page],
    options: &ReconstructOptions,
) -> ReconstructionResult {
    let mut result = ReconstructionResult::empty(Mode::Bracket);

    let mut next_id = 0usize;
    let mut page_outcomes: Vec<PageOutcome> = Vec::with_capacity(pages.len());
    let mut dropped_count = 0usize;
    let mut dropped_samples: Vec<String> = Vec::new();
    let mut total_tokens = 0usize;

    for (page_index, page) in pages.iter().enumerate() {
        let classified = classify_page(&page.tokens, &mut next_id);
        dropped_count += classified.dropped_count;
        dropped_samples.extend(classified.dropped_samples.iter().cloned());
        total_tokens += classified.total;

        let outcome = build_page(page_index, classified, options);
        page_outcomes.push(outcome);
    }

    let mut rounds = merge_pages(&mut page_outcomes);
    for outcome in &mut page_outcomes {
        result.diagnostics.append(&mut outcome.diagnostics);
    }

    let mut orphan_scores: Vec<ScoreToken> = Vec::new();
    let mut orphan_hints: Vec<WinnerHint> = Vec::new();
    for outcome in &mut page_outcomes {
        orphan_scores.append(&mut outcome.orphan_scores);
        orphan_hints.append(&mut outcome.orphan_hints);
    }

    strip_walkover_scores(&mut rounds, &mut orphan_scores, &mut result.diagnostics);

    let entrant_count = page_outcomes.iter().map(|outcome| outcome.entrant_count).sum();
    let audit = BracketAudit {
        rounds: &rounds,
        entrant_count,
        orphan_scores: &orphan_scores,
        orphan_hints: &orphan_hints,
        dropped_count,
        total_tokens,
        dropped_samples: &dropped_samples,
    };
    result.diagnostics.extend(validate_bracket(&audit, options));

    result.rounds = rounds
        .iter()
        .map(|round| round.iter().map(to_record).collect())
        .collect();
    result
}

/// Run classification output through the round builders for one page.
fn build_page(
    page_index: usize,
    classified: super::classify::ClassifiedTokens,
    options: &ReconstructOptions,
) -> PageOutcome {
    let mut outcome = PageOutcome {
        entrant_count: classified.entrants.len(),
        ..PageOutcome::default()
    };

    let score_xs = classified.scores.iter().map(|score| score.x0).collect::<Vec<f64>>();
    let hint_xs = classified.hints.iter().map(|hint| hint.x0).collect::<Vec<f64>>();
    let bands = RoundBands::for_page(options.bracket_size, &score_xs, &hint_xs);
    if !bands.is_monotonic() {
        outcome.diagnostics.push(
            Diagnostic::new(Severity::Fatal, "round bands do not ascend left to right")
                .with("page", page_index.to_string()),
        );
        return outcome;
    }

    let mut scores = classified.scores;
    let mut hints = classified.hints;
    let mut markers = classified.markers;
    assign_rounds(&bands, &mut scores, &mut hints, &mut markers);

    let last_round = bands
        .round_count()
        .max(scores.iter().map(|score| score.round).max().unwrap_or(0))
        .max(hints.iter().map(|hint| hint.round).max().unwrap_or(0));

    let take_scores = |pool: &mut Vec<ScoreToken>, round: usize| {
        let (taken, rest): (Vec<ScoreToken>, Vec<ScoreToken>) =
            pool.drain(..).partition(|score| score.round == round);
        *pool = rest;
        taken
    };
    let take_hints = |pool: &mut Vec<WinnerHint>, round: usize| {
        let (taken, rest): (Vec<WinnerHint>, Vec<WinnerHint>) =
            pool.drain(..).partition(|hint| hint.round == round);
        *pool = rest;
        taken
    };
    let markers_for = |markers: &[WalkoverMarker], round: usize| {
        markers
            .iter()
            .filter(|marker| marker.round == round)
            .cloned()
            .collect::<Vec<WalkoverMarker>>()
    };

    let first = build_first_round(
        &classified.entrants,
        take_scores(&mut scores, 1),
        take_hints(&mut hints, 1),
        &markers_for(&markers, 1),
    );
    outcome.diagnostics.extend(first.diagnostics);
    outcome.orphan_scores.extend(first.leftover_scores);
    outcome.orphan_hints.extend(first.leftover_hints);
    outcome.rounds.push(first.matches);

    for round in 2..=last_round {
        let round_scores = take_scores(&mut scores, round);
        let round_hints = take_hints(&mut hints, round);

        let previous = outcome.rounds.last().map(Vec::as_slice).unwrap_or(&[]);
        if previous.len() < 2 {
            // Nothing left to pair; tokens stamped for this round have no
            // home and go to the orphan audit.
            outcome.orphan_scores.extend(round_scores);
            outcome.orphan_hints.extend(round_hints);
            continue;
        }

        let next = build_next_round(
            previous,
            round,
            round_scores,
            round_hints,
            &markers_for(&markers, round),
        );
        outcome.diagnostics.extend(next.diagnostics);
        outcome.orphan_scores.extend(next.leftover_scores);
        outcome.orphan_hints.extend(next.leftover_hints);
        outcome.rounds.push(next.matches);
    }

    // Anything still stamped round 0 never got a band; orphan it.
    outcome.orphan_scores.extend(scores);
    outcome.orphan_hints.extend(hints);

    fill_missing_winners(&mut outcome.rounds);
    debug!(
        page = page_index,
        rounds = outcome.rounds.len(),
        entrants = outcome.entrant_count,
        "built page bracket"
    );
    outcome
}

/// Concatenate per-page round lists in page order and re-slot.
fn merge_pages(page_outcomes: &mut [PageOutcome]) -> Vec<Vec<BuiltMatch>> {
    let round_count = page_outcomes
        .iter()
        .map(|outcome| outcome.rounds.len())
        .max()
        .unwrap_or(0);

    let mut merged: Vec<Vec<BuiltMatch>> = vec![Vec::new(); round_count];
    for outcome in page_outcomes {
        for (round_index, round) in outcome.rounds.drain(..).enumerate() {
            merged[round_index].extend(round);
        }
    }
    for round in &mut merged {
        for (slot, built) in round.iter_mut().enumerate() {
            built.slot = slot;
        }
    }
    merged
}

/// Backfill feeder winners from later-round participants. An entrant seen in
/// round `r+1` must have won its round-`r` match, so this is deduction from
/// observed tokens, not guessing.
fn fill_missing_winners(rounds: &mut [Vec<BuiltMatch>]) {
    for round_index in (1..rounds.len()).rev() {
        let (earlier, later) = rounds.split_at_mut(round_index);
        let previous = match earlier.last_mut() {
            Some(previous) => previous,
            None => continue,
        };
        let current = &later[0];

        for built in current {
            for feeder_offset in 0..2usize {
                let feeder_index = 2 * built.slot + feeder_offset;
                let Some(feeder) = previous.get_mut(feeder_index) else {
                    continue;
                };
                if feeder.winner.is_some() {
                    continue;
                }

                let advanced = built.participants.iter().find(|participant| {
                    feeder
                        .resolution_pool()
                        .iter()
                        .any(|candidate| candidate.key() == participant.key())
                });
                if let Some(advanced) = advanced {
                    let advanced = advanced.clone();
                    debug!(
                        round = feeder.round,
                        slot = feeder.slot,
                        winner = %advanced.full_name,
                        "backfilled winner from later round"
                    );
                    if !feeder
                        .participants
                        .iter()
                        .any(|participant| participant.key() == advanced.key())
                    {
                        feeder.candidates.retain(|candidate| candidate.key() != advanced.key());
                        feeder.participants.push(advanced.clone());
                    }
                    feeder.winner = Some(advanced);
                }
            }
        }
    }
}

/// A walkover was never played, so a score attached to one is contradictory:
/// report it and free the token for the orphan audit.
fn strip_walkover_scores(
    rounds: &mut [Vec<BuiltMatch>],
    orphan_scores: &mut Vec<ScoreToken>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for round in rounds.iter_mut() {
        for built in round.iter_mut() {
            if built.is_walkover
                && let Some(score) = built.score.take()
            {
                diagnostics.push(
                    Diagnostic::new(Severity::Fatal, "walkover match carried a score")
                        .with("round", built.round.to_string())
                        .with("slot", built.slot.to_string())
                        .with("score_values", normalize_sign_tokens(&score.values)),
                );
                orphan_scores.push(score);
            }
        }
    }
}

/// Convert an arena entry to the output record, winner first: when side 2
/// won, the sides swap and the game signs flip so the encoding still reads
/// from side 1's perspective.
fn to_record(built: &BuiltMatch) -> MatchRecord {
    let mut participants = built.participants.clone();
    let mut values = built.score.as_ref().map(|score| score.values.clone());

    if let Some(winner) = &built.winner
        && participants.len() == 2
        && participants[1].key() == winner.key()
    {
        participants.swap(0, 1);
        if let Some(values) = values.as_mut() {
            for value in values.iter_mut() {
                *value = -*value;
            }
        }
    }

    MatchRecord {
        participants: participants.iter().map(|participant| participant.to_ref()).collect(),
        winner: built.winner.as_ref().map(|winner| winner.to_ref()),
        scores: values.as_deref().map(decode_match_scores),
        best_of: values.as_deref().and_then(infer_best_of),
        is_bye: built.is_bye,
        is_walkover: built.is_walkover,
    }
}
