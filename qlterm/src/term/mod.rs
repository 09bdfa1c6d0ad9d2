//! Term trees with two physical node backings behind one handle.
//!
//! Role
//! - A [`TermTree`] owns everything a query's terms need: the parsed [`Document`], the
//!   [`BacktraceRegistry`], and two node arenas.
//! - *View* nodes are built from the client document. They keep only indices into it
//!   (the literal value, the optarg names) plus a contiguous run of child links, so the
//!   strings of the request are never copied.
//! - *Generated* nodes are synthesized (default optargs, wrapper functions, decoded
//!   persisted bodies). They own their child lists. A generated slot may also be a bare
//!   reference to another node: that is how one subtree gets several structural parents
//!   without being copied.
//!
//! Every stored child is a [`TermSource`], a tagged index saying which arena to look in.
//! Consumers never branch on the backing: they go through [`Term`], which answers
//! `kind()`, `args()`, `optargs()` and `literal()` the same way for both.
//!
//! Invariants
//! - A literal node ([`TermKind::Datum`]) has no args and no optargs. Asking a literal
//!   for its children, or asking any node for an argument past [`Term::num_args`], is a
//!   programming error and panics.
//! - Nodes are only appended. The single permitted in-place change is the validator
//!   turning an implicit bare-object shape into a canonical `MAKE_OBJ`.
use std::{borrow::Cow, fmt, ops::Range};

use chrono::Utc;
use either::Either;
use log::debug;
use serde::{
    Serialize, Serializer,
    ser::{SerializeMap, SerializeSeq},
};

use crate::{
    backtrace::{BacktraceId, BacktraceRegistry},
    config::FrontendConfig,
    datum::{DatumId, DatumNode, DatumRef, Document, serialize_number},
    error::{Error, Result},
    walker,
};

pub mod builder;
mod kind;

pub use kind::TermKind;

use builder::Builder;

/// Index of a view node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(u32);

/// Index of a generated slot (a node, or a reference to another node).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeneratedId(u32);

/// Tagged child reference: which arena the child lives in, and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TermSource {
    View(ViewId),
    Generated(GeneratedId),
}

#[derive(Debug, Clone)]
struct ViewTerm {
    kind: TermKind,
    bt: BacktraceId,
    literal: Option<DatumId>,
    /// Child links of positional arguments, as a range of `TermTree::links`.
    args: Range<u32>,
    /// Child links of optargs; entry `j` is named by member `j` of `optargs_object`.
    optargs: Range<u32>,
    optargs_object: DatumId,
    /// Built from a bare object and not yet normalized by the validator.
    implicit: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct GeneratedTerm {
    pub(crate) kind: TermKind,
    pub(crate) bt: BacktraceId,
    pub(crate) literal: Option<DatumId>,
    pub(crate) args: Vec<TermSource>,
    pub(crate) optargs: Vec<(String, TermSource)>,
}

impl GeneratedTerm {
    pub(crate) fn literal(datum: DatumId, bt: BacktraceId) -> Self {
        Self {
            kind: TermKind::Datum,
            bt,
            literal: Some(datum),
            args: Vec::new(),
            optargs: Vec::new(),
        }
    }

    pub(crate) fn node(kind: TermKind, bt: BacktraceId) -> Self {
        Self {
            kind,
            bt,
            literal: None,
            args: Vec::new(),
            optargs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
enum Generated {
    Node(GeneratedTerm),
    Reference(TermSource),
}

enum Entry<'t> {
    View(&'t ViewTerm),
    Generated(&'t GeneratedTerm),
}

/// First variable number handed out by [`TermTree::fresh_var`].
///
/// Clients number their own variables from small integers, so synthesized ones start
/// far above them. Every number in the range is still exact as an `f64`.
pub const SYNTHETIC_VAR_BASE: u64 = 1 << 52;

/// Container owning one query's (or one stored function's) terms.
#[derive(Debug, Clone)]
pub struct TermTree<'a> {
    datums: Document<'a>,
    views: Vec<ViewTerm>,
    links: Vec<TermSource>,
    generated: Vec<Generated>,
    backtraces: BacktraceRegistry,
    root: Option<TermSource>,
    start_time: Option<DatumId>,
    next_var: u64,
}

impl Default for TermTree<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> TermTree<'a> {
    /// An empty tree, for synthesized or decoded terms.
    pub fn new() -> Self {
        Self::from_document(Document::new())
    }

    /// A tree whose view nodes will be built from `datums`.
    pub fn from_document(datums: Document<'a>) -> Self {
        Self {
            datums,
            views: Vec::new(),
            links: Vec::new(),
            generated: Vec::new(),
            backtraces: BacktraceRegistry::new(),
            root: None,
            start_time: None,
            next_var: SYNTHETIC_VAR_BASE,
        }
    }

    /// Parse, build and validate a client term document. The root sits at [`BacktraceId::HEAD`].
    pub fn parse(bytes: &'a [u8], config: &FrontendConfig) -> Result<Self> {
        let (document, datum) = Document::parse(bytes)?;
        let mut tree = Self::from_document(document);
        let root = tree.build(datum, BacktraceId::HEAD, config)?;
        walker::validate(&mut tree, root)?;
        tree.root = Some(root);

        debug!(
            "Built term tree with {} view and {} generated nodes",
            tree.views.len(),
            tree.generated.len()
        );
        Ok(tree)
    }

    /// Parse a standalone function body, such as a stored index function.
    ///
    /// No client backtraces are recorded, and the root must be a `FUNC` term.
    pub fn parse_function(bytes: &'a [u8], config: &FrontendConfig) -> Result<Self> {
        let (document, datum) = Document::parse(bytes)?;
        let mut tree = Self::from_document(document);
        let root = tree.build_detached(datum, config)?;

        let kind = tree.term(root).kind();
        if kind != TermKind::Func {
            return Err(Error::ExpectedType {
                expected: "FUNC",
                found: kind.name(),
                bt: BacktraceId::EMPTY,
            });
        }
        tree.term(root).check_function()?;

        walker::validate(&mut tree, root)?;
        tree.root = Some(root);
        Ok(tree)
    }

    /// Build the term rooted at document node `datum`, positioned at `bt`.
    ///
    /// The result has not been validated yet; see [`walker::validate`].
    pub fn build(
        &mut self,
        datum: DatumId,
        bt: BacktraceId,
        config: &FrontendConfig,
    ) -> Result<TermSource> {
        Builder::new(self, config).build(datum, bt)
    }

    /// Like [`build`](Self::build), but every node gets [`BacktraceId::EMPTY`].
    pub fn build_detached(&mut self, datum: DatumId, config: &FrontendConfig) -> Result<TermSource> {
        Builder::new(self, config)
            .without_backtraces()
            .build(datum, BacktraceId::EMPTY)
    }

    pub fn document(&self) -> &Document<'a> {
        &self.datums
    }

    pub fn document_mut(&mut self) -> &mut Document<'a> {
        &mut self.datums
    }

    pub fn backtraces(&self) -> &BacktraceRegistry {
        &self.backtraces
    }

    pub fn backtraces_mut(&mut self) -> &mut BacktraceRegistry {
        &mut self.backtraces
    }

    pub fn root(&self) -> Option<Term<'_, 'a>> {
        self.root.map(|source| self.term(source))
    }

    pub fn root_source(&self) -> Option<TermSource> {
        self.root
    }

    pub fn set_root(&mut self, source: TermSource) {
        self.check_source(source);
        self.root = Some(source);
    }

    /// Handle on the node at `source`.
    pub fn term(&self, source: TermSource) -> Term<'_, 'a> {
        self.check_source(source);
        Term {
            tree: self,
            source,
            optarg_name: None,
        }
    }

    /// The time every folded `NOW` of this tree evaluates to, computed on first use.
    pub fn start_time(&mut self) -> DatumId {
        if let Some(time) = self.start_time {
            return time;
        }

        let epoch_time = Utc::now().timestamp_millis() as f64 / 1000.0;
        let reql_type = self.datums.push(DatumNode::String(Cow::Borrowed("TIME")));
        let epoch = self.datums.push(DatumNode::Number(epoch_time));
        let timezone = self.datums.push(DatumNode::String(Cow::Borrowed("+00:00")));
        let time = self.datums.push(DatumNode::Object(vec![
            (Cow::Borrowed("$reql_type$"), reql_type),
            (Cow::Borrowed("epoch_time"), epoch),
            (Cow::Borrowed("timezone"), timezone),
        ]));

        self.start_time = Some(time);
        time
    }

    /// A variable number unused by any function synthesized in this tree, taken from the
    /// range starting at [`SYNTHETIC_VAR_BASE`].
    pub fn fresh_var(&mut self) -> u64 {
        let var = self.next_var;
        self.next_var += 1;
        var
    }

    /// Number of view nodes and generated slots.
    pub fn len(&self) -> usize {
        self.views.len() + self.generated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty() && self.generated.is_empty()
    }

    pub(crate) fn push_generated(&mut self, node: GeneratedTerm) -> TermSource {
        self.push_generated_slot(Generated::Node(node))
    }

    /// Add a slot pointing at an existing node. Nothing is copied.
    pub(crate) fn push_reference(&mut self, target: TermSource) -> TermSource {
        self.check_source(target);
        self.push_generated_slot(Generated::Reference(target))
    }

    fn push_generated_slot(&mut self, slot: Generated) -> TermSource {
        let next = self.generated.len();
        assert!(next < u32::MAX as usize, "generated arena exhausted its id space");
        self.generated.push(slot);
        TermSource::Generated(GeneratedId(next as u32))
    }

    fn push_view(&mut self, view: ViewTerm) -> TermSource {
        let next = self.views.len();
        assert!(next < u32::MAX as usize, "view arena exhausted its id space");
        self.views.push(view);
        TermSource::View(ViewId(next as u32))
    }

    /// Store `children` contiguously; the first `num_args` are positional.
    fn append_links(&mut self, children: &[TermSource], num_args: usize) -> (Range<u32>, Range<u32>) {
        let start = self.links.len() as u32;
        self.links.extend_from_slice(children);
        let middle = start + num_args as u32;
        let end = self.links.len() as u32;
        (start..middle, middle..end)
    }

    /// Rewrite an implicit bare-object node into its canonical form.
    ///
    /// Returns `true` when something changed.
    pub(crate) fn normalize(&mut self, source: TermSource) -> bool {
        match self.resolve(source) {
            TermSource::View(ViewId(index)) => {
                let view = &mut self.views[index as usize];
                std::mem::replace(&mut view.implicit, false)
            }
            TermSource::Generated(_) => false,
        }
    }

    /// Follow reference slots until a concrete node.
    pub(crate) fn resolve(&self, mut source: TermSource) -> TermSource {
        while let TermSource::Generated(GeneratedId(index)) = source {
            match &self.generated[index as usize] {
                Generated::Reference(target) => source = *target,
                Generated::Node(_) => break,
            }
        }
        source
    }

    fn entry(&self, source: TermSource) -> Entry<'_> {
        match self.resolve(source) {
            TermSource::View(ViewId(index)) => Entry::View(&self.views[index as usize]),
            TermSource::Generated(GeneratedId(index)) => match &self.generated[index as usize] {
                Generated::Node(node) => Entry::Generated(node),
                Generated::Reference(_) => unreachable!("references are resolved above"),
            },
        }
    }

    fn check_source(&self, source: TermSource) {
        let in_range = match source {
            TermSource::View(ViewId(index)) => (index as usize) < self.views.len(),
            TermSource::Generated(GeneratedId(index)) => (index as usize) < self.generated.len(),
        };
        assert!(in_range, "{source:?} does not belong to this term tree");
    }
}

/// Read-only handle on one node of a [`TermTree`].
///
/// `Term` is `Copy`; iterating children yields more handles on the same tree.
#[derive(Clone, Copy)]
pub struct Term<'t, 'a> {
    tree: &'t TermTree<'a>,
    source: TermSource,
    optarg_name: Option<&'t str>,
}

impl<'t, 'a> Term<'t, 'a> {
    #[inline]
    pub fn tree(&self) -> &'t TermTree<'a> {
        self.tree
    }

    /// The slot this handle was obtained through (a reference slot stays a reference).
    #[inline]
    pub fn source(&self) -> TermSource {
        self.source
    }

    /// The concrete node behind this handle, references followed.
    #[inline]
    pub fn resolved_source(&self) -> TermSource {
        self.tree.resolve(self.source)
    }

    pub fn kind(&self) -> TermKind {
        match self.tree.entry(self.source) {
            Entry::View(view) => view.kind,
            Entry::Generated(node) => node.kind,
        }
    }

    pub fn backtrace(&self) -> BacktraceId {
        match self.tree.entry(self.source) {
            Entry::View(view) => view.bt,
            Entry::Generated(node) => node.bt,
        }
    }

    /// Name under which the parent holds this node, when reached as an optarg.
    #[inline]
    pub fn optarg_name(&self) -> Option<&'t str> {
        self.optarg_name
    }

    #[inline]
    pub fn is_literal(&self) -> bool {
        self.kind() == TermKind::Datum
    }

    /// Whether this node still has the raw bare-object shape the validator rewrites.
    pub fn is_implicit(&self) -> bool {
        match self.tree.entry(self.source) {
            Entry::View(view) => view.implicit,
            Entry::Generated(_) => false,
        }
    }

    /// The value of a literal node; `None` for every other kind.
    pub fn literal(&self) -> Option<DatumRef<'t, 'a>> {
        let datum = match self.tree.entry(self.source) {
            Entry::View(view) => view.literal,
            Entry::Generated(node) => node.literal,
        };
        datum.map(|datum| self.tree.datums.get(datum))
    }

    fn arg_links(&self) -> &'t [TermSource] {
        assert!(
            !self.is_literal(),
            "literal terms have no arguments (term {:?})",
            self.source
        );
        let tree = self.tree;
        match tree.entry(self.source) {
            Entry::View(view) => &tree.links[view.args.start as usize..view.args.end as usize],
            Entry::Generated(node) => &node.args,
        }
    }

    pub fn num_args(&self) -> usize {
        if self.is_literal() {
            return 0;
        }
        self.arg_links().len()
    }

    /// Positional argument `index`. Panics past [`num_args`](Self::num_args).
    pub fn arg(&self, index: usize) -> Term<'t, 'a> {
        let links = self.arg_links();
        assert!(
            index < links.len(),
            "argument {index} requested from a {} term with {} arguments",
            self.kind().name(),
            links.len()
        );
        self.child(links[index], None)
    }

    /// Positional arguments in evaluation order.
    pub fn args(self) -> impl ExactSizeIterator<Item = Term<'t, 'a>> {
        self.arg_links()
            .iter()
            .map(move |&source| self.child(source, None))
    }

    pub fn num_optargs(&self) -> usize {
        if self.is_literal() {
            return 0;
        }
        match self.tree.entry(self.source) {
            Entry::View(view) => view.optargs.len(),
            Entry::Generated(node) => node.optargs.len(),
        }
    }

    /// Named arguments in stored order.
    pub fn optargs(self) -> impl Iterator<Item = (&'t str, Term<'t, 'a>)> {
        assert!(
            !self.is_literal(),
            "literal terms have no optargs (term {:?})",
            self.source
        );
        let tree = self.tree;
        match tree.entry(self.source) {
            Entry::View(view) => {
                let object = view.optargs_object;
                let links = &tree.links[view.optargs.start as usize..view.optargs.end as usize];
                Either::Left(links.iter().enumerate().map(move |(member, &source)| {
                    let (name, _) = tree.datums.object_member(object, member);
                    (name, self.child(source, Some(name)))
                }))
            }
            Entry::Generated(node) => Either::Right(
                node.optargs
                    .iter()
                    .map(move |(name, source)| (name.as_str(), self.child(*source, Some(name.as_str())))),
            ),
        }
    }

    pub fn optarg(&self, name: &str) -> Option<Term<'t, 'a>> {
        self.optargs()
            .find_map(|(key, term)| (key == name).then_some(term))
    }

    /// Number of nodes in this subtree, counting each occurrence of a shared node.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        walker::walk_no_input(*self, |node| {
            count += 1;
            node.schedule_children();
        });
        count
    }

    /// Check the `[FUNC, [[MAKE_ARRAY, [params...]], body]]` shape, params being numbers.
    ///
    /// Only the shape is checked; the body is left to [`walker::validate`].
    pub fn check_function(&self) -> Result<()> {
        let malformed = |reason| Error::MalformedFunction {
            reason,
            bt: self.backtrace(),
        };
        if self.kind() != TermKind::Func {
            return Err(malformed("not a FUNC term"));
        }
        if self.num_args() != 2 {
            return Err(malformed("expected a parameter list and a body"));
        }
        let params = self.arg(0);
        if params.kind() != TermKind::MakeArray {
            return Err(malformed("parameters must be a MAKE_ARRAY"));
        }
        let numeric = params
            .args()
            .all(|param| param.literal().and_then(|v| v.as_number()).is_some());
        if !numeric {
            return Err(malformed("parameters must be numbers"));
        }
        Ok(())
    }

    fn child(&self, source: TermSource, optarg_name: Option<&'t str>) -> Term<'t, 'a> {
        Term {
            tree: self.tree,
            source,
            optarg_name,
        }
    }
}

impl fmt::Debug for Term<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Term");
        s.field("kind", &self.kind())
            .field("source", &self.source)
            .field("bt", &self.backtrace());
        if let Some(name) = self.optarg_name {
            s.field("optarg_name", &name);
        }
        if let Some(literal) = self.literal() {
            s.field("literal", &literal);
        }
        s.finish()
    }
}

/// Writes the wire shape: a bare value for literals, `[kind, [args], {optargs}]` otherwise.
impl Serialize for Term<'_, '_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if let Some(literal) = self.literal() {
            return WireDatum(literal).serialize(serializer);
        }

        let with_optargs = self.num_optargs() > 0;
        let mut seq = serializer.serialize_seq(Some(if with_optargs { 3 } else { 2 }))?;
        seq.serialize_element(&self.kind().code())?;
        seq.serialize_element(&WireArgs(*self))?;
        if with_optargs {
            seq.serialize_element(&WireOptargs(*self))?;
        }
        seq.end()
    }
}

struct WireArgs<'t, 'a>(Term<'t, 'a>);

impl Serialize for WireArgs<'_, '_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.num_args()))?;
        for arg in self.0.args() {
            seq.serialize_element(&arg)?;
        }
        seq.end()
    }
}

struct WireOptargs<'t, 'a>(Term<'t, 'a>);

impl Serialize for WireOptargs<'_, '_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.num_optargs()))?;
        for (name, value) in self.0.optargs() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

/// Literal values on the wire: arrays are term syntax there, so array values are
/// written as `MAKE_ARRAY` terms.
struct WireDatum<'d, 'a>(DatumRef<'d, 'a>);

impl Serialize for WireDatum<'_, '_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0.node() {
            DatumNode::Null => serializer.serialize_unit(),
            DatumNode::Bool(b) => serializer.serialize_bool(*b),
            DatumNode::Number(n) => serialize_number(*n, serializer),
            DatumNode::String(s) => serializer.serialize_str(s),
            DatumNode::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(&TermKind::MakeArray.code())?;
                seq.serialize_element(&WireElements(self.0, items.len()))?;
                seq.end()
            }
            DatumNode::Object(members) => {
                let mut map = serializer.serialize_map(Some(members.len()))?;
                for (key, value) in self.0.members() {
                    map.serialize_entry(key, &WireDatum(value))?;
                }
                map.end()
            }
        }
    }
}

struct WireElements<'d, 'a>(DatumRef<'d, 'a>, usize);

impl Serialize for WireElements<'_, '_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.1))?;
        for item in self.0.elements() {
            seq.serialize_element(&WireDatum(item))?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::backtrace::Frame;

    fn parse(text: &str) -> TermTree<'_> {
        TermTree::parse(text.as_bytes(), &FrontendConfig::default()).unwrap()
    }

    #[test]
    fn view_nodes_expose_args_and_optargs() {
        let tree = parse(r#"[41, [[15, ["users"]], [73, ["age"]]], {"index": "name"}]"#);
        let root = tree.root().unwrap();

        assert_eq!(root.kind(), TermKind::OrderBy);
        assert_eq!(root.num_args(), 2);
        assert_eq!(root.arg(0).kind(), TermKind::Table);
        assert_eq!(root.arg(1).kind(), TermKind::Asc);
        assert_eq!(root.arg(1).arg(0).literal().unwrap().as_str(), Some("age"));

        let index = root.optarg("index").unwrap();
        assert_eq!(index.optarg_name(), Some("index"));
        assert_eq!(index.literal().unwrap().as_str(), Some("name"));
        assert!(root.optarg("missing").is_none());
    }

    #[test]
    fn children_carry_their_positions() {
        let tree = parse(r#"[24, [1, [25, [2, 3]]], {"x": 4}]"#);
        let root = tree.root().unwrap();
        let inner = root.arg(1).arg(0);

        assert_eq!(root.backtrace(), BacktraceId::HEAD);
        assert_eq!(
            tree.backtraces().resolve(inner.backtrace()),
            vec![Frame::Arg(1), Frame::Arg(0)]
        );
        let x = root.optarg("x").unwrap();
        assert_eq!(
            tree.backtraces().resolve(x.backtrace()),
            vec![Frame::Optarg("x".to_string())]
        );
    }

    #[test]
    #[should_panic(expected = "argument 2 requested")]
    fn reading_past_the_last_argument_panics() {
        let tree = parse("[24, [1, 2]]");
        tree.root().unwrap().arg(2);
    }

    #[test]
    #[should_panic(expected = "literal terms have no optargs")]
    fn literals_have_no_optargs() {
        let tree = parse(r#""just a string""#);
        let _ = tree.root().unwrap().optargs().count();
    }

    #[test]
    fn references_share_without_copying() {
        let mut tree = parse("[24, [1, 2]]");
        let root = tree.root_source().unwrap();
        let reference = tree.push_reference(root);
        let views_before = tree.views.len();

        let shared = tree.term(reference);
        assert_eq!(shared.kind(), TermKind::Add);
        assert_eq!(shared.resolved_source(), root);
        assert_eq!(tree.views.len(), views_before);
    }

    #[test]
    fn writes_back_the_wire_shape() {
        let tree = parse(r#"[39, [[15, ["t"]], {"a": [2, [1, 2]]}], {"default": true}]"#);
        let root = tree.root().unwrap();
        assert_eq!(
            serde_json::to_value(root).unwrap(),
            json!([39, [[15, ["t"]], [3, [], {"a": [2, [1, 2]]}]], {"default": true}])
        );
    }

    #[test]
    fn negative_zero_literals_round_trip_through_the_wire() {
        let tree = parse("[24, [-0.0, 1]]");
        let written = serde_json::to_string(&tree.root().unwrap()).unwrap();
        assert_eq!(written, "[24,[-0.0,1]]");

        let reparsed = parse(&written);
        let zero = reparsed.root().unwrap().arg(0).literal().unwrap().as_number().unwrap();
        assert!(zero.is_sign_negative());
    }

    #[test]
    fn function_shape_is_checked() {
        let config = FrontendConfig::default();
        let tree = TermTree::parse_function(br#"[69, [[2, [1, 2]], [10, [2]]]]"#, &config).unwrap();
        tree.root().unwrap().check_function().unwrap();

        for text in ["[69]", "[69, [[2, []]]]", r#"[69, [[2, [null]], 1]]"#, "[69, [[24, [1]], 1]]"] {
            let err = TermTree::parse_function(text.as_bytes(), &config).unwrap_err();
            assert!(err.is_malformed_function(), "{text}: {err:?}");
        }

        let tree = parse("[24, [1, 2]]");
        let err = tree.root().unwrap().check_function().unwrap_err();
        assert_eq!(err.to_string(), "Malformed function: not a FUNC term.");
    }

    #[test]
    fn synthesized_vars_come_from_the_reserved_range() {
        let mut tree = parse("[69, [[2, [1]], [10, [1]]]]");
        let first = tree.fresh_var();
        assert_eq!(first, SYNTHETIC_VAR_BASE);
        assert_eq!(tree.fresh_var(), first + 1);
        assert_eq!((first as f64) as u64, first);
    }

    #[test]
    fn start_time_is_computed_once() {
        let mut tree = TermTree::new();
        let first = tree.start_time();
        let second = tree.start_time();
        assert_eq!(first, second);

        let time = tree.document().get(first);
        assert_eq!(time.field("$reql_type$").and_then(|v| v.as_str()), Some("TIME"));
        assert_eq!(time.field("timezone").and_then(|v| v.as_str()), Some("+00:00"));
    }
}
