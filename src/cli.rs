use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use bracketsheet::Mode;

#[derive(Parser, Debug)]
#[command(
    name = "bracketsheet",
    version,
    about = "Reconstruct a knockout bracket or round-robin pool from positioned sheet tokens"
)]
pub struct Cli {
    /// JSON file holding the extracted pages: [{"tokens": [{text, x0, x1, top, bottom}, ...]}, ...]
    pub tokens_path: PathBuf,

    #[arg(long, value_enum, default_value_t = SheetMode::Bracket)]
    pub mode: SheetMode,

    /// Entrant count of the bracket, when known; selects column calibration.
    #[arg(long)]
    pub bracket_size: Option<usize>,

    /// Where to write the reconstruction result JSON. Defaults to stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Where to write the run manifest JSON (skipped when absent).
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Fraction of matches per round allowed to finish without a winner
    /// before the result is flagged fatal.
    #[arg(long, default_value_t = 0.5)]
    pub max_unresolved_winner_ratio: f64,

    /// Fraction of page tokens the classifier may drop before the layout is
    /// considered a format mismatch.
    #[arg(long, default_value_t = 0.5)]
    pub max_dropped_token_ratio: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum SheetMode {
    Bracket,
    Pool,
}

impl From<SheetMode> for Mode {
    fn from(mode: SheetMode) -> Self {
        match mode {
            SheetMode::Bracket => Mode::Bracket,
            SheetMode::Pool => Mode::Pool,
        }
    }
}
