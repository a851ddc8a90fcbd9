use crate::model::EntrantRef;

/// One entrant row from the left column of a bracket sheet. Immutable after
/// classification; cross-round joins prefer `raw_code` because short names
/// may collide.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Entrant {
    pub raw_code: Option<String>,
    pub full_name: String,
    pub club: String,
    /// Parenthesised disambiguator printed after the name when two entrants
    /// share one ("Wang Tom (2)").
    pub suffix: Option<String>,
    /// "Surname G" form used to resolve winner labels.
    pub short_name: String,
    pub y_center: f64,
}

impl Entrant {
    pub fn to_ref(&self) -> EntrantRef {
        EntrantRef {
            raw_code: self.raw_code.clone(),
            full_name: self.full_name.clone(),
            club: self.club.clone(),
        }
    }

    /// Identity key for consumed-set bookkeeping and progression checks.
    pub fn key(&self) -> EntrantKey {
        (
            self.raw_code.clone(),
            self.full_name.clone(),
            self.suffix.clone(),
            self.club.clone(),
        )
    }
}

pub(crate) type EntrantKey = (Option<String>, String, Option<String>, String);

/// A run of signed game points to the right of the entrant column.
/// Positive values are games won by side 1 (value = side 2's points),
/// negative values the reverse. Consumed by at most one match.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScoreToken {
    pub id: usize,
    pub values: Vec<i32>,
    pub y_center: f64,
    pub x0: f64,
    pub round: usize,
    pub raw_text: String,
}

/// A short "Surname I." label printed beside a bracket line to mark the
/// advancing entrant. Consumed by at most one match.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WinnerHint {
    pub id: usize,
    pub label: String,
    pub raw_code: Option<String>,
    pub y_center: f64,
    pub x0: f64,
    pub round: usize,
    pub is_double_wo: bool,
    pub raw_text: String,
}

/// A bare "WO" marker printed where a score row would be.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WalkoverMarker {
    pub y_center: f64,
    pub x0: f64,
    pub round: usize,
}

/// Arena entry for one assembled match. Rounds index into a flat list by
/// `(round, slot)` rather than holding back-pointers.
#[derive(Debug, Clone)]
pub(crate) struct BuiltMatch {
    pub round: usize,
    pub slot: usize,
    /// Resolved participants, vertical order. Length 1 for a bye.
    pub participants: Vec<Entrant>,
    /// Possible participants carried from unresolved feeder matches; used
    /// only for hint resolution, never emitted.
    pub candidates: Vec<Entrant>,
    pub winner: Option<Entrant>,
    /// The consumed score token, kept whole for conservation accounting.
    pub score: Option<ScoreToken>,
    pub y_center: f64,
    pub is_bye: bool,
    pub is_walkover: bool,
}

impl BuiltMatch {
    pub fn resolution_pool(&self) -> Vec<&Entrant> {
        self.participants.iter().chain(self.candidates.iter()).collect()
    }
}

/// Outcome of resolving a winner label against a candidate set.
#[derive(Debug, Clone)]
pub(crate) enum HintResolution {
    Unique(Entrant),
    Ambiguous(Vec<Entrant>),
    NoMatch,
}
