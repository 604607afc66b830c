//! Domain error types.
//!
//! Trade rejections are not errors: `Portfolio::buy`/`sell` report them as
//! `bool` so a strategy can react without aborting the replay.

use crate::domain::store::Id;

/// Top-level error type for tapesim.
#[derive(Debug, thiserror::Error)]
pub enum TapesimError {
    #[error("malformed tape: {reason}")]
    Format { reason: String },

    #[error("unsupported tape version {found} (this build reads version {expected})")]
    Version { found: u16, expected: u16 },

    #[error("corrupt tape: {kind} index {index} out of range ({len} entries)")]
    IndexOutOfRange {
        kind: &'static str,
        index: u32,
        len: usize,
    },

    #[error("dangling reference: no {kind} with id {id}")]
    Dangling { kind: &'static str, id: Id },

    #[error("no entity named {name:?}")]
    UnknownName { name: String },

    #[error("name {name:?} is already registered")]
    DuplicateName { name: String },

    #[error("string field {field:?} is {len} bytes, limit is 255")]
    StringTooLong { field: &'static str, len: usize },

    #[error("tape has no companies to replay")]
    EmptyTape,

    #[error("no datapoints recorded for {company}")]
    NoData { company: String },

    #[error("insufficient data for {company}: {points} points inside replay window, need {minimum}")]
    InsufficientData {
        company: String,
        points: usize,
        minimum: usize,
    },

    #[error("cannot interpolate {company} at time {time}: no bracketing points")]
    NoBrackets { company: String, time: u64 },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("quote provider error: {reason}")]
    Provider { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&TapesimError> for std::process::ExitCode {
    fn from(err: &TapesimError) -> Self {
        let code: u8 = match err {
            TapesimError::Io(_) => 1,
            TapesimError::ConfigParse { .. } | TapesimError::ConfigMissing { .. } => 2,
            TapesimError::Format { .. }
            | TapesimError::Version { .. }
            | TapesimError::IndexOutOfRange { .. }
            | TapesimError::Dangling { .. }
            | TapesimError::UnknownName { .. }
            | TapesimError::DuplicateName { .. }
            | TapesimError::StringTooLong { .. } => 3,
            TapesimError::Provider { .. } => 4,
            TapesimError::EmptyTape
            | TapesimError::NoData { .. }
            | TapesimError::InsufficientData { .. }
            | TapesimError::NoBrackets { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
