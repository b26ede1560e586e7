//! Error taxonomy for the sync engine.
//!
//! Parse-level errors are recovered where they occur (the offending quote is
//! skipped), source errors drop one collaborator for one cycle, and only
//! `CycleAborted` ends a cycle early. None of them stop the scheduler.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("odd id `{odd_id}` has {found} segments, expected 5")]
    TooFewSegments { odd_id: String, found: usize },

    #[error("odd id `{odd_id}` has an empty segment at position {position}")]
    EmptySegment { odd_id: String, position: usize },

    #[error("unrecognized side `{0}`")]
    UnknownSide(String),

    #[error("invalid timestamp `{0}`")]
    Timestamp(String),

    #[error("outcome name `{0}` is not `<player> <over|under> <line>`")]
    OutcomeName(String),

    #[error("market `{0}` is not a player prop")]
    NotPlayerProp(String),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("source `{source_name}` unavailable for {target}: {reason}")]
    SourceUnavailable {
        source_name: String,
        target: String,
        reason: String,
    },

    #[error("no usable legs for market {market_id}")]
    InsufficientData { market_id: String },

    #[error("invalid odds value `{0}`")]
    InvalidOdds(String),

    #[error("sync cycle aborted: {0}")]
    CycleAborted(String),
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
