//! Client-facing errors raised while turning a query document into a term tree.
//!
//! Every variant carries the [`BacktraceId`] of the position that caused it, or
//! [`BacktraceId::EMPTY`] when the failure happened before any term existed (for
//! instance when the top-level query is not an array). Callers resolve the id
//! against the tree's [`BacktraceRegistry`](crate::backtrace::BacktraceRegistry)
//! when producing the error response.
//!
//! Corruption of persisted bytes is reported separately by
//! [`CorruptionError`](crate::encoding::CorruptionError); broken internal
//! contracts panic.
use strum::EnumIs;
use thiserror::Error;

use crate::backtrace::BacktraceId;

#[derive(Debug, Clone, PartialEq, EnumIs, Error)]
pub enum Error {
    /// The query bytes are not a well-formed document.
    #[error("Failed to parse the query document: {message}")]
    Parse { message: String },

    #[error("Expected a query to be an array, but found {found}.")]
    QueryNotArray { found: &'static str },

    #[error("Expected 1 to 3 elements in the top-level query, but found {found}.")]
    QuerySize { found: usize },

    #[error("Expected a query type as a number, but found {found}.")]
    QueryKindNotNumber { found: &'static str },

    #[error("Unrecognized query type `{found}`.")]
    UnknownQueryKind { found: f64 },

    #[error("Expected global optargs as an object, but found {found}.")]
    GlobalOptargsNotObject { found: &'static str },

    /// A query kind that requires a root term was submitted without one.
    #[error("A {kind} query must carry a term to evaluate, but none was found.")]
    MissingRootTerm { kind: &'static str },

    #[error("Expected an array of 1, 2, or 3 elements, but found {found}.")]
    TermSize { found: usize, bt: BacktraceId },

    #[error("Expected a term type as a NUMBER but found {found}.")]
    OpcodeNotNumber { found: &'static str, bt: BacktraceId },

    #[error("Unrecognized term type `{found}`.")]
    UnknownTermKind { found: f64, bt: BacktraceId },

    /// `[1, ...]`: literals are written as plain values, never through the DATUM opcode.
    #[error("DATUM terms cannot be written in term form.  Write the value itself instead.")]
    ExplicitDatum { bt: BacktraceId },

    /// A function term is not `[FUNC, [[MAKE_ARRAY, [params...]], body]]`.
    #[error("Malformed function: {reason}.")]
    MalformedFunction { reason: &'static str, bt: BacktraceId },

    #[error(
        "Expected an ARRAY or arguments or an OBJECT of optional arguments, but found a {found}."
    )]
    ExpectedArgsOrOptargs { found: &'static str, bt: BacktraceId },

    #[error("Found two sets of optional arguments.")]
    TwoOptargSets { bt: BacktraceId },

    #[error("Expected {expected} but found {found}.")]
    ExpectedType {
        expected: &'static str,
        found: &'static str,
        bt: BacktraceId,
    },

    /// An object handled by the builder repeats one of its keys.
    #[error("Duplicate key \"{key}\" in object.  (got {key} twice)")]
    DuplicateKey { key: String, bt: BacktraceId },

    #[error("Duplicate global optarg: {key}.")]
    DuplicateOptarg { key: String, bt: BacktraceId },

    #[error("Unrecognized optional argument `{key}`.")]
    UnrecognizedOptarg { key: String, bt: BacktraceId },

    /// A write or meta operation appears inside the function argument of a stream operation.
    #[error("Cannot nest writes or meta ops in stream operations.  Use FOR_EACH instead.")]
    NestedWrite { bt: BacktraceId },

    #[error("{kind} may only be used as an argument to ORDER_BY.")]
    MisplacedOrdering { kind: &'static str, bt: BacktraceId },

    #[error("Query is nested too deeply: terms may be at most {max} levels deep.")]
    TermTooDeep { max: usize, bt: BacktraceId },
}

impl Error {
    /// Position of the offending term, or [`BacktraceId::EMPTY`] for query-level failures.
    pub fn backtrace(&self) -> BacktraceId {
        match self {
            Error::Parse { .. }
            | Error::QueryNotArray { .. }
            | Error::QuerySize { .. }
            | Error::QueryKindNotNumber { .. }
            | Error::UnknownQueryKind { .. }
            | Error::GlobalOptargsNotObject { .. }
            | Error::MissingRootTerm { .. } => BacktraceId::EMPTY,
            Error::TermSize { bt, .. }
            | Error::OpcodeNotNumber { bt, .. }
            | Error::UnknownTermKind { bt, .. }
            | Error::ExplicitDatum { bt }
            | Error::MalformedFunction { bt, .. }
            | Error::ExpectedArgsOrOptargs { bt, .. }
            | Error::TwoOptargSets { bt }
            | Error::ExpectedType { bt, .. }
            | Error::DuplicateKey { bt, .. }
            | Error::DuplicateOptarg { bt, .. }
            | Error::UnrecognizedOptarg { bt, .. }
            | Error::NestedWrite { bt }
            | Error::MisplacedOrdering { bt, .. }
            | Error::TermTooDeep { bt, .. } => *bt,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
