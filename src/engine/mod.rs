use tracing::info;

use crate::model::{Mode, Page, ReconstructionResult};

mod assemble;
mod classify;
mod columns;
mod first_round;
mod geometry;
mod later_rounds;
mod pool;
mod score_codec;
mod types;
mod validate;

pub use score_codec::decode_signed_game_token;

use assemble::assemble_bracket;
use pool::assemble_pools;

/// Caller-supplied context for one reconstruction. Everything else the
/// engine needs is derived from the token stream itself.
#[derive(Debug, Clone)]
pub struct ReconstructOptions {
    pub mode: Mode,
    /// Entrant count of the bracket when the caller knows it; selects the
    /// calibrated column bands for small single-page layouts.
    pub bracket_size: Option<usize>,
    /// Unresolved-winner fraction per round above which the result is
    /// flagged fatal instead of merely informational.
    pub max_unresolved_winner_ratio: f64,
    /// Classifier drop fraction above which the layout is treated as a
    /// format mismatch.
    pub max_dropped_token_ratio: f64,
}

impl Default for ReconstructOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Bracket,
            bracket_size: None,
            max_unresolved_winner_ratio: 0.5,
            max_dropped_token_ratio: 0.5,
        }
    }
}

/// Reconstruct one document. Never fails: malformed input yields a partial
/// result with diagnostics attached, so a batch caller can isolate bad
/// documents without unwinding.
pub fn reconstruct(pages: &[Page], options: &ReconstructOptions) -> ReconstructionResult {
    let token_count = pages.iter().map(|page| page.tokens.len()).sum::<usize>();
    info!(
        pages = pages.len(),
        tokens = token_count,
        mode = ?options.mode,
        "starting reconstruction"
    );

    match options.mode {
        Mode::Bracket => assemble_bracket(pages, options),
        Mode::Pool => assemble_pools(pages, options),
    }
}
