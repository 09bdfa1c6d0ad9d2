//! Query-level named arguments.
//!
//! Each accepted optarg is built like any other term, validated, and wrapped in a
//! zero-parameter function so evaluation can treat all of them lazily and uniformly.
//! Names outside the allow-list are rejected: the built-in set below plus whatever
//! [`FrontendConfig::extra_optargs`] adds.
use log::debug;
use phf::phf_set;

use crate::{
    backtrace::BacktraceId,
    config::FrontendConfig,
    datum::DatumId,
    error::{Error, Result},
    minidriver::{Minidriver, Reql},
    term::{Term, TermKind, TermSource, TermTree},
    walker,
};

/// Name of the optarg selecting the default database.
pub const DATABASE_OPTARG: &str = "db";

static RECOGNIZED_OPTARGS: phf::Set<&'static str> = phf_set! {
    "_EVAL_FLAGS_",
    "_NO_RECURSE_",
    "_SHORTCUT_",
    "array_limit",
    "attempts",
    "auth",
    "base",
    "binary_format",
    "conflict",
    "data",
    "db",
    "default",
    "default_timezone",
    "dry_run",
    "durability",
    "fill",
    "first_batch_scaledown_factor",
    "float",
    "geo",
    "geo_system",
    "group_format",
    "header",
    "identifier_format",
    "include_states",
    "index",
    "left_bound",
    "max_batch_bytes",
    "max_batch_rows",
    "max_batch_seconds",
    "max_dist",
    "max_results",
    "method",
    "min_batch_rows",
    "multi",
    "non_atomic",
    "noreply",
    "num_vertices",
    "overwrite",
    "page",
    "page_limit",
    "params",
    "primary_key",
    "primary_replica_tag",
    "profile",
    "redirects",
    "replicas",
    "result_format",
    "return_changes",
    "return_vals",
    "right_bound",
    "shards",
    "squash",
    "time_format",
    "timeout",
    "unit",
    "use_outdated",
    "verify",
    "wait_for",
};

/// Whether `name` may be used as a global optarg under `config`.
pub fn is_recognized(name: &str, config: &FrontendConfig) -> bool {
    RECOGNIZED_OPTARGS.contains(name) || config.allows_extra_optarg(name)
}

/// Resolved global optargs, in the order they were added.
///
/// Every value is a `FUNC` node with no parameters whose body is the optarg's term.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalOptargs {
    entries: Vec<(String, TermSource)>,
}

impl GlobalOptargs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build, validate, wrap and store the optarg `name` whose value is document node `value`.
    pub fn add(
        &mut self,
        tree: &mut TermTree<'_>,
        config: &FrontendConfig,
        name: &str,
        value: DatumId,
    ) -> Result<()> {
        if self.contains(name) {
            return Err(Error::DuplicateOptarg {
                key: name.to_string(),
                bt: BacktraceId::EMPTY,
            });
        }
        if !is_recognized(name, config) {
            return Err(Error::UnrecognizedOptarg {
                key: name.to_string(),
                bt: BacktraceId::EMPTY,
            });
        }

        let body = tree.build_detached(value, config)?;
        walker::validate(tree, body)?;
        self.insert_wrapped(tree, name, body);
        Ok(())
    }

    /// Add a `db` optarg naming `config.default_database` unless one is already present.
    ///
    /// Returns `true` when the default was synthesized.
    pub fn ensure_default_database(
        &mut self,
        tree: &mut TermTree<'_>,
        config: &FrontendConfig,
    ) -> bool {
        if self.contains(DATABASE_OPTARG) {
            return false;
        }

        let mut r = Minidriver::new(tree, BacktraceId::EMPTY);
        let db = r.db(config.default_database.as_str());
        let wrapped = r.fun(db);
        self.entries
            .push((DATABASE_OPTARG.to_string(), wrapped.source()));

        debug!(
            "No `{DATABASE_OPTARG}` optarg supplied, defaulting to `{}`",
            config.default_database
        );
        true
    }

    fn insert_wrapped(&mut self, tree: &mut TermTree<'_>, name: &str, body: TermSource) {
        let mut r = Minidriver::new(tree, BacktraceId::EMPTY);
        let body: Reql = r.existing(body);
        let wrapped = r.fun(body);
        self.entries.push((name.to_string(), wrapped.source()));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(key, _)| key == name)
    }

    /// The wrapper function stored for `name`.
    pub fn get<'t, 'a>(&self, tree: &'t TermTree<'a>, name: &str) -> Option<Term<'t, 'a>> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, source)| tree.term(*source))
    }

    /// The optarg's own term, with the wrapper function peeled off.
    pub fn get_body<'t, 'a>(&self, tree: &'t TermTree<'a>, name: &str) -> Option<Term<'t, 'a>> {
        self.get(tree, name).map(unwrap_function)
    }

    /// Read a boolean optarg without evaluating anything.
    ///
    /// Succeeds only when the stored term is a literal boolean (directly, or as the body of
    /// a wrapper function); anything else yields `default`.
    pub fn static_bool(&self, tree: &TermTree<'_>, name: &str, default: bool) -> bool {
        self.get_body(tree, name)
            .and_then(|body| body.literal())
            .and_then(|literal| literal.as_bool())
            .unwrap_or(default)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, TermSource)> {
        self.entries
            .iter()
            .map(|(name, source)| (name.as_str(), *source))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn unwrap_function<'t, 'a>(term: Term<'t, 'a>) -> Term<'t, 'a> {
    if term.kind() == TermKind::Func && term.num_args() == 2 {
        term.arg(1)
    } else {
        term
    }
}
