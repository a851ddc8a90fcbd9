//! Round-robin pool sheet parser.
//!
//! Pool sheets are line-oriented rather than positional: tokens sharing a
//! baseline form one text row, a `Pool N` header opens a section, and every
//! match is a single row `mid code1 Name, Club - code2 Name, Club games`.
//! The games cell uses the same sign encoding as bracket score rows, which
//! also identifies the winner since the row fixes which side is side 1.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::model::{
    Diagnostic, EntrantRef, MatchRecord, Mode, Page, ReconstructionResult, Severity, Token,
};

use super::ReconstructOptions;
use super::score_codec::{
    decode_match_scores, infer_best_of, is_walkover_text, parse_signed_values, winning_side,
};
use super::validate::validate_pools;

/// Rows whose baselines differ by no more than this belong to one text row.
const ROW_TOP_TOLERANCE: f64 = 3.0;

static POOL_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bPool\s+\d+\b").expect("pool header pattern"));

/// `17 101 Ahl Bo, Klubb - 104 Dahl Erik, Klubb 9, -8, 11`
static MATCH_WITH_CODES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?P<mid>\d{1,4})\s+(?P<p1code>\d{1,3})\s+(?P<p1>.+?)\s*[-–]\s*(?P<p2code>\d{1,3})\s+(?P<p2>.+?)(?:\s+(?P<rest>(?:[\d,\s:+-]+|WO)))?$",
    )
    .expect("match-with-codes pattern")
});

static MATCH_NO_CODES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?P<mid>\d{1,4})\s+(?P<p1>.+?)\s*[-–]\s*(?P<p2>.+?)(?:\s+(?P<rest>(?:[\d,\s:+-]+|WO)))?$",
    )
    .expect("match-no-codes pattern")
});

/// Same shapes without the leading match number.
static REMAINDER_WITH_CODES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?P<p1code>\d{1,3})\s+(?P<p1>.+?)\s*[-–]\s*(?P<p2code>\d{1,3})\s+(?P<p2>.+?)(?:\s+(?P<rest>(?:[\d,\s:+-]+|WO)))?$",
    )
    .expect("remainder-with-codes pattern")
});

static REMAINDER_NO_CODES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?P<p1>.+?)\s*[-–]\s*(?P<p2>.+?)(?:\s+(?P<rest>(?:[\d,\s:+-]+|WO)))?$",
    )
    .expect("remainder-no-codes pattern")
});

static LEADING_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d{1,3}\s+").expect("leading code pattern"));

/// Footer and licence lines the row grammar would otherwise half-match.
const BOILERPLATE_PHRASES: &[&str] = &["tt coordinator", "programlicens", "http://", "https://"];

pub(crate) fn assemble_pools(
    pages: &[Page],
    options: &ReconstructOptions,
) -> ReconstructionResult {
    let mut result = ReconstructionResult::empty(Mode::Pool);

    let mut current_pool: Option<String> = None;
    let mut row_count = 0usize;
    for page in pages {
        for row_text in rows_from_tokens(&page.tokens) {
            row_count += 1;
            let lowered = row_text.to_lowercase();
            if BOILERPLATE_PHRASES.iter().any(|phrase| lowered.contains(phrase)) {
                continue;
            }

            if let Some(found) = POOL_HEADER_RE.find(&row_text) {
                let name = found.as_str().to_string();
                result.pools.entry(name.clone()).or_default();
                current_pool = Some(name);
                continue;
            }

            let Some(parsed) = parse_match_row(&row_text) else {
                if looks_like_match_row(&row_text) {
                    result.diagnostics.push(
                        Diagnostic::new(Severity::Warning, "unparsed pool row")
                            .with("row_text", row_text.clone()),
                    );
                }
                continue;
            };

            let Some(pool_name) = current_pool.clone() else {
                result.diagnostics.push(
                    Diagnostic::new(Severity::Warning, "match row before any pool header")
                        .with("row_text", row_text.clone()),
                );
                continue;
            };

            result
                .pools
                .get_mut(&pool_name)
                .expect("current pool entry exists")
                .push(to_record(parsed));
        }
    }

    backfill_walkover_best_of(&mut result);

    debug!(
        pools = result.pools.len(),
        rows = row_count,
        matches = result.pools.values().map(Vec::len).sum::<usize>(),
        "assembled pools"
    );

    result.diagnostics.extend(validate_pools(&result.pools, options));
    result
}

/// Group tokens into baseline rows and join each row left to right.
fn rows_from_tokens(tokens: &[Token]) -> Vec<String> {
    let mut ordered = tokens.to_vec();
    ordered.sort_by(|a, b| a.top.total_cmp(&b.top).then(a.x0.total_cmp(&b.x0)));

    let mut rows: Vec<Vec<Token>> = Vec::new();
    let mut row_top: Option<f64> = None;
    for token in ordered {
        match row_top {
            Some(top) if (token.top - top).abs() <= ROW_TOP_TOLERANCE => {
                rows.last_mut().expect("open row").push(token);
            }
            _ => {
                row_top = Some(token.top);
                rows.push(vec![token]);
            }
        }
    }

    rows.into_iter()
        .map(|mut row| {
            row.sort_by(|a, b| a.x0.total_cmp(&b.x0));
            row.iter()
                .map(|token| token.text.as_str())
                .collect::<Vec<&str>>()
                .join(" ")
                .trim()
                .to_string()
        })
        .filter(|text| !text.is_empty())
        .collect()
}

#[derive(Debug)]
struct ParsedRow {
    side1: EntrantRef,
    side2: EntrantRef,
    rest: String,
}

/// Try the row grammars most specific first. Both sides must carry a club
/// (`name, club`); rows without one are headings or standings lines.
fn parse_match_row(text: &str) -> Option<ParsedRow> {
    let grammars: [&Regex; 4] = [
        &MATCH_WITH_CODES_RE,
        &MATCH_NO_CODES_RE,
        &REMAINDER_WITH_CODES_RE,
        &REMAINDER_NO_CODES_RE,
    ];

    for grammar in grammars {
        let Some(captures) = grammar.captures(text) else {
            continue;
        };
        let p1 = captures.name("p1")?.as_str().trim();
        let p2 = captures.name("p2")?.as_str().trim();
        if !p1.contains(',') || !p2.contains(',') {
            continue;
        }

        let side1 = split_name_club(
            p1,
            captures.name("p1code").map(|code| code.as_str().to_string()),
        );
        let side2 = split_name_club(
            p2,
            captures.name("p2code").map(|code| code.as_str().to_string()),
        );
        let rest = captures
            .name("rest")
            .map(|rest| rest.as_str().trim().to_string())
            .unwrap_or_default();

        return Some(ParsedRow { side1, side2, rest });
    }
    None
}

fn split_name_club(raw: &str, raw_code: Option<String>) -> EntrantRef {
    let stripped = LEADING_CODE_RE.replace(raw.trim(), "");
    let (name, club) = match stripped.split_once(',') {
        Some((name, club)) => (name.trim(), club.trim()),
        None => (stripped.trim(), ""),
    };
    EntrantRef {
        raw_code,
        full_name: name.to_string(),
        club: club.to_string(),
    }
}

/// Side-swap note: the games cell is written from side 1's perspective, so
/// when side 2 took the match the sides swap and every sign flips to keep
/// the winner first.
fn to_record(parsed: ParsedRow) -> MatchRecord {
    if is_walkover_text(&parsed.rest) {
        return MatchRecord {
            participants: vec![parsed.side1, parsed.side2],
            winner: None,
            scores: None,
            is_bye: false,
            is_walkover: true,
            best_of: None,
        };
    }

    let mut values = parse_signed_values(&parsed.rest).unwrap_or_default();
    let mut participants = vec![parsed.side1, parsed.side2];
    let winner_index = winning_side(&values);

    if winner_index == Some(1) {
        participants.swap(0, 1);
        for value in values.iter_mut() {
            *value = -*value;
        }
    }

    MatchRecord {
        winner: winner_index.map(|_| participants[0].clone()),
        scores: (!values.is_empty()).then(|| decode_match_scores(&values)),
        best_of: infer_best_of(&values),
        participants,
        is_bye: false,
        is_walkover: false,
    }
}

fn looks_like_match_row(text: &str) -> bool {
    text.contains(" - ") || text.contains(" – ")
}

/// A walkover row says nothing about format; borrow the best-of every played
/// match in the same pool exhibits.
fn backfill_walkover_best_of(result: &mut ReconstructionResult) {
    for matches in result.pools.values_mut() {
        let pool_best_of = matches.iter().find_map(|record| record.best_of);
        let Some(best_of) = pool_best_of else {
            continue;
        };
        for record in matches.iter_mut() {
            if record.is_walkover && record.best_of.is_none() {
                record.best_of = Some(best_of);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(text: &str, x0: f64, top: f64) -> Token {
        Token {
            text: text.to_string(),
            x0,
            x1: x0 + 40.0,
            top,
            bottom: top + 10.0,
        }
    }

    fn page(rows: &[&str]) -> Page {
        Page {
            tokens: rows
                .iter()
                .enumerate()
                .map(|(index, row)| token(row, 40.0, 100.0 + 20.0 * index as f64))
                .collect(),
        }
    }

    fn options() -> ReconstructOptions {
        ReconstructOptions {
            mode: Mode::Pool,
            ..ReconstructOptions::default()
        }
    }

    #[test]
    fn rows_join_tokens_on_shared_baseline() {
        let tokens = vec![
            token("101 Ahl Bo,", 40.0, 100.0),
            token("Klubb A", 120.0, 101.5),
            token("Pool 2", 40.0, 140.0),
        ];
        let rows = rows_from_tokens(&tokens);
        assert_eq!(rows, vec!["101 Ahl Bo, Klubb A".to_string(), "Pool 2".to_string()]);
    }

    #[test]
    fn match_row_with_codes_is_parsed_under_its_header() {
        let result = reconstruct_rows(&[
            "Pool 1",
            "17 101 Ahl Bo, Klubb A - 104 Dahl Erik, Klubb B 9, -8, 11",
        ]);
        let matches = result.pools.get("Pool 1").expect("pool present");
        assert_eq!(matches.len(), 1);
        let record = &matches[0];
        assert_eq!(record.participants[0].raw_code.as_deref(), Some("101"));
        assert_eq!(record.winner.as_ref().unwrap().full_name, "Ahl Bo");
        assert_eq!(record.scores.as_deref(), Some(&[(11, 9), (8, 11), (13, 11)][..]));
        assert_eq!(record.best_of, Some(3));
    }

    #[test]
    fn side_two_win_swaps_participants_and_signs() {
        let result = reconstruct_rows(&[
            "Pool 1",
            "18 101 Ahl Bo, Klubb A - 104 Dahl Erik, Klubb B -9, 8, -11, -7",
        ]);
        let record = &result.pools.get("Pool 1").unwrap()[0];
        assert_eq!(record.participants[0].full_name, "Dahl Erik");
        assert_eq!(record.winner.as_ref().unwrap().full_name, "Dahl Erik");
        // Signs flipped: winner-first decoding starts with an 11-9 game win.
        assert_eq!(record.scores.as_ref().unwrap()[0], (11, 9));
        assert_eq!(record.best_of, Some(5));
    }

    #[test]
    fn walkover_row_has_no_scores_and_borrows_pool_best_of() {
        let result = reconstruct_rows(&[
            "Pool 1",
            "17 101 Ahl Bo, Klubb A - 104 Dahl Erik, Klubb B 9, 8, 11",
            "18 101 Ahl Bo, Klubb A - 108 Elm Filip, Klubb C WO",
        ]);
        let matches = result.pools.get("Pool 1").unwrap();
        let walkover = &matches[1];
        assert!(walkover.is_walkover);
        assert!(walkover.scores.is_none());
        assert!(walkover.winner.is_none());
        assert_eq!(walkover.best_of, Some(3));
    }

    #[test]
    fn boilerplate_and_standings_rows_are_skipped() {
        let result = reconstruct_rows(&[
            "Pool 1",
            "Programlicens: TT Coordinator",
            "1. Ahl Bo 2 0 4-1",
            "17 101 Ahl Bo, Klubb A - 104 Dahl Erik, Klubb B 9, 8, 11",
        ]);
        assert_eq!(result.pools.get("Pool 1").unwrap().len(), 1);
    }

    #[test]
    fn match_row_before_any_header_is_reported() {
        let result =
            reconstruct_rows(&["17 101 Ahl Bo, Klubb A - 104 Dahl Erik, Klubb B 9, 8, 11"]);
        assert!(result.pools.is_empty());
        assert!(result.diagnostics.iter().any(|diagnostic| {
            diagnostic.message.contains("before any pool header")
        }));
    }

    #[test]
    fn drawn_game_counts_leave_winner_unset() {
        let result = reconstruct_rows(&[
            "Pool 1",
            "17 101 Ahl Bo, Klubb A - 104 Dahl Erik, Klubb B 9, -8",
        ]);
        let record = &result.pools.get("Pool 1").unwrap()[0];
        assert!(record.winner.is_none());
        assert_eq!(record.participants[0].full_name, "Ahl Bo");
    }

    fn reconstruct_rows(rows: &[&str]) -> ReconstructionResult {
        assemble_pools(&[page(rows)], &options())
    }
}
