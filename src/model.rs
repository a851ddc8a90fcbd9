use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One positioned word as delivered by the upstream PDF extraction layer.
/// Coordinates are page points; `top` grows downwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub x0: f64,
    pub x1: f64,
    pub top: f64,
    pub bottom: f64,
}

impl Token {
    pub fn y_center(&self) -> f64 {
        (self.top + self.bottom) / 2.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub tokens: Vec<Token>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Bracket,
    Pool,
}

/// An entrant as printed on the sheet, prior to identity resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrantRef {
    pub raw_code: Option<String>,
    pub full_name: String,
    pub club: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Length 1 for a bye, otherwise 2. Winner, when known, is first.
    pub participants: Vec<EntrantRef>,
    pub winner: Option<EntrantRef>,
    /// Decoded per-game points, side-1 first. `None` for walkovers and
    /// matches whose score row was missing on the sheet.
    pub scores: Option<Vec<(u16, u16)>>,
    pub is_bye: bool,
    pub is_walkover: bool,
    pub best_of: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Fatal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// Sorted key/value context so serialized output is deterministic.
    pub context: BTreeMap<String, String>,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            context: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconstructionResult {
    pub mode: Mode,
    /// Bracket mode: rounds in play order, round 1 first. Empty in pool mode.
    pub rounds: Vec<Vec<MatchRecord>>,
    /// Pool mode: pool name -> matches. Empty in bracket mode.
    pub pools: BTreeMap<String, Vec<MatchRecord>>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ReconstructionResult {
    pub fn empty(mode: Mode) -> Self {
        Self {
            mode,
            rounds: Vec::new(),
            pools: BTreeMap::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn has_fatal(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diagnostic| diagnostic.severity == Severity::Fatal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_center_is_vertical_midpoint() {
        let token = Token {
            text: "x".to_string(),
            x0: 0.0,
            x1: 5.0,
            top: 10.0,
            bottom: 20.0,
        };
        assert_eq!(token.y_center(), 15.0);
    }

    #[test]
    fn diagnostic_context_keys_are_sorted() {
        let diagnostic = Diagnostic::new(Severity::Warning, "w")
            .with("zeta", "1")
            .with("alpha", "2");
        let keys = diagnostic.context.keys().cloned().collect::<Vec<String>>();
        assert_eq!(keys, vec!["alpha".to_string(), "zeta".to_string()]);
    }
}
