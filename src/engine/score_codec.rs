//! Codec for the sheet's sign-encoded game tokens.
//!
//! A result row like `9, -8, 11` lists one integer per game: the loser's
//! points, with the sign marking which side lost. Positive means side 1 won
//! the game (the value is side 2's points); negative means side 2 won it.
//! The convention is ambiguous on the page itself, so every consumer goes
//! through this module rather than re-deriving the sign logic.

use std::sync::LazyLock;

use regex::Regex;

static SIGNED_INT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[+-]?\d+").expect("signed int pattern"));

static WO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*wo\s*$").expect("wo pattern"));

/// Points needed to win one game; the loser's score plus two when the game
/// went past deuce.
const GAME_TARGET: u16 = 11;

/// `true` when the text is a bare walkover marker.
pub(crate) fn is_walkover_text(text: &str) -> bool {
    WO_RE.is_match(text)
}

/// Parse a run of signed integers. Returns `None` when no integer appears.
pub(crate) fn parse_signed_values(text: &str) -> Option<Vec<i32>> {
    let values = SIGNED_INT_RE
        .find_iter(text)
        .filter_map(|found| found.as_str().parse::<i32>().ok())
        .collect::<Vec<i32>>();
    if values.is_empty() { None } else { Some(values) }
}

/// Decode one signed game token into `(side1_points, side2_points)`.
pub fn decode_signed_game_token(value: i32) -> (u16, u16) {
    let loser_points = value.unsigned_abs().min(u32::from(u16::MAX)) as u16;
    let winner_points = GAME_TARGET.max(loser_points.saturating_add(2));
    if value >= 0 {
        (winner_points, loser_points)
    } else {
        (loser_points, winner_points)
    }
}

pub(crate) fn decode_match_scores(values: &[i32]) -> Vec<(u16, u16)> {
    values.iter().map(|value| decode_signed_game_token(*value)).collect()
}

/// Infer best-of from the winning side's game count: `2*max(wins) - 1`.
///
/// This is the sheet's only available signal and is knowingly wrong for
/// matches that ended early (walkover mid-match, abandonment); callers must
/// treat it as observed, not declared, format.
pub(crate) fn infer_best_of(values: &[i32]) -> Option<u8> {
    if values.is_empty() {
        return None;
    }
    let side1_wins = values.iter().filter(|value| **value >= 0).count();
    let side2_wins = values.len() - side1_wins;
    let winner_games = side1_wins.max(side2_wins);
    u8::try_from(2 * winner_games - 1).ok()
}

/// Which side took more games; `None` on a tie or empty token run.
pub(crate) fn winning_side(values: &[i32]) -> Option<usize> {
    let side1_wins = values.iter().filter(|value| **value >= 0).count();
    let side2_wins = values.len() - side1_wins;
    if side1_wins > side2_wins {
        Some(0)
    } else if side2_wins > side1_wins {
        Some(1)
    } else {
        None
    }
}

/// Render tokens back to the sheet's canonical comma form, dropping an
/// explicit `+`: `["+9", "-8", "11"]` -> `"9, -8, 11"`.
pub(crate) fn normalize_sign_tokens(values: &[i32]) -> String {
    values
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<String>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_positive_token_gives_side_one_the_game() {
        assert_eq!(decode_signed_game_token(9), (11, 9));
        assert_eq!(decode_signed_game_token(0), (11, 0));
    }

    #[test]
    fn decode_negative_token_gives_side_two_the_game() {
        assert_eq!(decode_signed_game_token(-8), (8, 11));
    }

    #[test]
    fn decode_deuce_game_extends_past_eleven() {
        assert_eq!(decode_signed_game_token(12), (14, 12));
        assert_eq!(decode_signed_game_token(-10), (10, 12));
    }

    #[test]
    fn best_of_uses_winner_game_count() {
        assert_eq!(infer_best_of(&[9, -8, 11, 7]), Some(5));
        assert_eq!(infer_best_of(&[5, 8, 6]), Some(5));
        assert_eq!(infer_best_of(&[]), None);
    }

    #[test]
    fn winning_side_follows_game_majority() {
        assert_eq!(winning_side(&[9, -8, 11]), Some(0));
        assert_eq!(winning_side(&[-9, 8, -11]), Some(1));
        assert_eq!(winning_side(&[9, -8]), None);
    }

    #[test]
    fn walkover_text_is_case_insensitive() {
        assert!(is_walkover_text("WO"));
        assert!(is_walkover_text("wo"));
        assert!(!is_walkover_text("WO:S1"));
        assert!(!is_walkover_text("Wong"));
    }

    #[test]
    fn parse_signed_values_reads_mixed_separators() {
        assert_eq!(parse_signed_values("9, -8 11"), Some(vec![9, -8, 11]));
        assert_eq!(parse_signed_values("+7,-5"), Some(vec![7, -5]));
        assert_eq!(parse_signed_values("no digits"), None);
    }

    #[test]
    fn normalize_drops_explicit_plus() {
        assert_eq!(normalize_sign_tokens(&[9, -8, 11]), "9, -8, 11");
    }
}
