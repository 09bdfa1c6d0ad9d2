//! Client queries: the top-level document, its root term and its global optargs.
//!
//! A query document is `[kind]`, `[kind, term]` or `[kind, term, optargs]`. Only
//! [`QueryKind::Start`] evaluates anything: its term is built and validated at
//! [`BacktraceId::HEAD`], its optargs go through [`GlobalOptargs`], and a `db` optarg is
//! synthesized when the client gave none. The other kinds only steer an existing query
//! or the connection, so whatever else they carry is ignored.
use log::debug;
use strum::{EnumIs, FromRepr, IntoStaticStr};

use crate::{
    backtrace::BacktraceId,
    config::FrontendConfig,
    datum::{DatumId, DatumNode, Document},
    error::{Error, Result},
    optargs::GlobalOptargs,
    term::{Term, TermSource, TermTree},
    walker,
};

pub mod ids;

pub use ids::{QueryId, QueryIdGenerator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, IntoStaticStr, EnumIs)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(i32)]
pub enum QueryKind {
    Start = 1,
    Continue = 2,
    Stop = 3,
    NoreplyWait = 4,
    ServerInfo = 5,
}

impl QueryKind {
    pub fn from_number(value: f64) -> Option<Self> {
        if value.fract() != 0.0 || value < i32::MIN as f64 || value > i32::MAX as f64 {
            return None;
        }
        Self::from_repr(value as i32)
    }

    #[inline]
    pub const fn code(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// A parsed client query.
#[derive(Debug)]
pub struct Query<'a> {
    token: i64,
    kind: QueryKind,
    tree: TermTree<'a>,
    optargs: GlobalOptargs,
    id: Option<QueryId>,
}

impl<'a> Query<'a> {
    /// Parse the query document `bytes` sent under `token`.
    ///
    /// The term tree borrows its strings from `bytes`.
    pub fn parse(token: i64, bytes: &'a [u8], config: &FrontendConfig) -> Result<Self> {
        let (document, top) = Document::parse(bytes)?;
        let (kind, root, optargs) = Self::check_shape(&document, top)?;

        let mut query = Query {
            token,
            kind,
            tree: TermTree::from_document(document),
            optargs: GlobalOptargs::new(),
            id: None,
        };
        if kind.is_start() {
            let root = root.ok_or(Error::MissingRootTerm { kind: kind.name() })?;
            query.build_start(root, optargs, config)?;
        }

        debug!(
            "Parsed {} query for token {token} ({} term nodes, {} global optargs)",
            kind.name(),
            query.tree.len(),
            query.optargs.len()
        );
        Ok(query)
    }

    fn check_shape(
        document: &Document<'_>,
        top: DatumId,
    ) -> Result<(QueryKind, Option<DatumId>, Option<DatumId>)> {
        let top = document.get(top);
        let DatumNode::Array(items) = top.node() else {
            return Err(Error::QueryNotArray {
                found: top.type_name(),
            });
        };
        if !(1..=3).contains(&items.len()) {
            return Err(Error::QuerySize { found: items.len() });
        }

        let code = document.get(items[0]);
        let number = code.as_number().ok_or(Error::QueryKindNotNumber {
            found: code.type_name(),
        })?;
        let kind = QueryKind::from_number(number).ok_or(Error::UnknownQueryKind { found: number })?;

        let optargs = match items.get(2) {
            Some(&optargs) if document.object_len(optargs).is_none() => {
                return Err(Error::GlobalOptargsNotObject {
                    found: document.type_name(optargs),
                });
            }
            other => other.copied(),
        };
        Ok((kind, items.get(1).copied(), optargs))
    }

    fn build_start(
        &mut self,
        root: DatumId,
        optargs: Option<DatumId>,
        config: &FrontendConfig,
    ) -> Result<()> {
        let tree = &mut self.tree;
        let root = tree.build(root, BacktraceId::HEAD, config)?;
        walker::validate(tree, root)?;
        tree.set_root(root);

        if let Some(object) = optargs {
            let count = tree.document().object_len(object).unwrap_or(0);
            for member in 0..count {
                let (name, value) = tree.document().object_member(object, member);
                let name = name.to_owned();
                self.optargs.add(tree, config, &name, value)?;
            }
        }
        self.optargs.ensure_default_database(tree, config);
        Ok(())
    }

    pub fn token(&self) -> i64 {
        self.token
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn tree(&self) -> &TermTree<'a> {
        &self.tree
    }

    /// The term to evaluate; only `START` queries have one.
    pub fn root(&self) -> Option<Term<'_, 'a>> {
        self.tree.root()
    }

    pub fn root_source(&self) -> Option<TermSource> {
        self.tree.root_source()
    }

    pub fn optargs(&self) -> &GlobalOptargs {
        &self.optargs
    }

    /// The term given for global optarg `name`, without its wrapper function.
    pub fn global_optarg(&self, name: &str) -> Option<Term<'_, 'a>> {
        self.optargs.get_body(&self.tree, name)
    }

    /// Whether the client asked for no response; known without evaluating anything.
    pub fn noreply(&self) -> bool {
        self.optargs.static_bool(&self.tree, "noreply", false)
    }

    pub fn profile(&self) -> bool {
        self.optargs.static_bool(&self.tree, "profile", false)
    }

    pub fn id(&self) -> Option<QueryId> {
        self.id
    }

    /// Take the next ordering id from `ids`. The caller releases it when the query retires.
    ///
    /// # Panics
    /// If an id was already assigned.
    pub fn assign_id(&mut self, ids: &mut QueryIdGenerator) -> QueryId {
        assert!(self.id.is_none(), "query {} already has an id", self.token);
        let id = ids.acquire();
        self.id = Some(id);
        id
    }
}
