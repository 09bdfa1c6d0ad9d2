//! Qlterm: the term trees behind a declarative document-database query language.
//!
//! A client sends a query as a JSON document. This crate turns it into a validated term
//! tree the evaluation engine can run, and moves finished trees to and from the binary
//! form storage keeps.
//!
//! Pipeline
//!  - [`datum::Document`] parses the request in place; strings stay borrowed from it.
//!  - [`term::builder`] turns document nodes into *view* terms, registering each node's
//!    position in the [`backtrace::BacktraceRegistry`].
//!  - [`walker::validate`] checks where writes and orderings may appear and normalizes the
//!    few implicit shapes the builder leaves behind.
//!  - [`optargs::GlobalOptargs`] resolves the query's named arguments, and
//!    [`minidriver::Minidriver`] synthesizes *generated* terms such as their wrappers.
//!  - [`encoding`] writes a tree in the current binary format and reads every format ever
//!    written.
//!
//! Memory
//!  - All nodes of a tree live in arenas owned by its [`term::TermTree`] and are addressed
//!    by small integer handles. Sharing a subtree between parents stores a reference slot,
//!    never a copy.
//!
//! Example
//! ```
//! use qlterm::prelude::*;
//!
//! let config = FrontendConfig::default();
//! let query = Query::parse(1, br#"[1, [15, [[14, ["blog"]], "posts"]], {"noreply": true}]"#, &config)
//!     .unwrap();
//! assert_eq!(query.root().unwrap().kind(), TermKind::Table);
//! assert!(query.noreply());
//!
//! // Nothing asked for a database, so the default one was filled in.
//! let db = query.global_optarg("db").unwrap();
//! assert_eq!(db.kind(), TermKind::Db);
//!
//! let bytes = encode(query.root().unwrap());
//! let stored = decode(&bytes, FormatVersion::CURRENT).unwrap();
//! assert!(compare_terms(query.root().unwrap(), stored.root().unwrap()));
//! ```

/// Positions of terms within the client's query, for error reporting.
pub mod backtrace;
/// Frontend settings loaded from TOML.
pub mod config;
/// Parsed JSON documents and the literal values terms hold.
pub mod datum;
/// Versioned binary encoding of term trees.
pub mod encoding;
pub mod error;
/// Builder API for synthesized terms.
pub mod minidriver;
pub mod optargs;
/// Client queries and their ordering ids.
pub mod query;
pub mod sindex;
/// Term trees, term kinds and the document builder.
pub mod term;
/// Tree walkers and the placement validator.
pub mod walker;

pub mod prelude {
    //! Convenient re-exports for end users.
    pub use crate::backtrace::{BacktraceId, BacktraceRegistry, Frame};
    pub use crate::config::FrontendConfig;
    pub use crate::datum::{DatumId, DatumRef, Document};
    pub use crate::encoding::{CorruptionError, FormatVersion, decode, decode_or_crash, encode};
    pub use crate::error::Error;
    pub use crate::minidriver::{Minidriver, Reql, VarId};
    pub use crate::optargs::GlobalOptargs;
    pub use crate::query::{Query, QueryId, QueryIdGenerator, QueryKind};
    pub use crate::term::{Term, TermKind, TermSource, TermTree};
    pub use crate::walker::{WalkerHandle, compare_terms, validate, walk, walk_no_input};
}
