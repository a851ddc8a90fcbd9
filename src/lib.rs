pub mod engine;
pub mod model;
pub mod util;

pub use engine::{ReconstructOptions, reconstruct};
pub use model::{
    Diagnostic, EntrantRef, MatchRecord, Mode, Page, ReconstructionResult, Severity, Token,
};
