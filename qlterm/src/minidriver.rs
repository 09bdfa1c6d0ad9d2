//! Programmatic construction of term fragments.
//!
//! A [`Minidriver`] appends generated nodes to a [`TermTree`] and hands back [`Reql`]
//! handles that can be combined into larger terms. Every node it creates carries the
//! backtrace given at construction, usually [`BacktraceId::EMPTY`] for fragments the
//! client never wrote.
//!
//! Existing nodes (views from the client document, or earlier generated nodes) are
//! brought in with [`Minidriver::existing`], which adds a reference slot instead of
//! copying the subtree.
//!
//! ```
//! use qlterm::{minidriver::Minidriver, term::{TermKind, TermTree}, backtrace::BacktraceId};
//!
//! let mut tree = TermTree::new();
//! let mut r = Minidriver::new(&mut tree, BacktraceId::EMPTY);
//! let x = r.fresh_var();
//! let row = r.var(x);
//! let age = r.get_field(row, "age");
//! let limit = r.number(18.0);
//! let body = r.ge(age, limit);
//! let predicate = r.fun1(x, body);
//! let root = predicate.source();
//! tree.set_root(root);
//!
//! assert_eq!(tree.root().unwrap().kind(), TermKind::Func);
//! ```
use std::borrow::Cow;

use crate::{
    backtrace::BacktraceId,
    datum::{DatumNode, Document},
    term::{GeneratedTerm, Term, TermKind, TermSource, TermTree},
};

/// Handle on a node created (or referenced) through a [`Minidriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reql(TermSource);

impl Reql {
    #[inline]
    pub fn source(self) -> TermSource {
        self.0
    }
}

/// Identifier of a function parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(pub u64);

pub struct Minidriver<'m, 'a> {
    tree: &'m mut TermTree<'a>,
    bt: BacktraceId,
}

impl<'m, 'a> Minidriver<'m, 'a> {
    pub fn new(tree: &'m mut TermTree<'a>, bt: BacktraceId) -> Self {
        Self { tree, bt }
    }

    pub fn tree(&self) -> &TermTree<'a> {
        self.tree
    }

    pub fn term(&self, r: Reql) -> Term<'_, 'a> {
        self.tree.term(r.0)
    }

    /// Reference an existing node. The node itself is not copied.
    pub fn existing(&mut self, source: TermSource) -> Reql {
        Reql(self.tree.push_reference(source))
    }

    pub fn fresh_var(&mut self) -> VarId {
        VarId(self.tree.fresh_var())
    }

    fn literal_node(&mut self, node: DatumNode<'a>) -> Reql {
        let datum = self.tree.document_mut().push(node);
        Reql(self.tree.push_generated(GeneratedTerm::literal(datum, self.bt)))
    }

    pub fn boolean(&mut self, value: bool) -> Reql {
        self.literal_node(DatumNode::Bool(value))
    }

    pub fn number(&mut self, value: f64) -> Reql {
        self.literal_node(DatumNode::Number(value))
    }

    pub fn string(&mut self, value: impl Into<String>) -> Reql {
        self.literal_node(DatumNode::String(Cow::Owned(value.into())))
    }

    pub fn null(&mut self) -> Reql {
        self.literal_node(DatumNode::Null)
    }

    /// A literal holding an arbitrary value.
    pub fn datum(&mut self, value: &serde_json::Value) -> Reql {
        let datum = self.tree.document_mut().push_json(value);
        Reql(self.tree.push_generated(GeneratedTerm::literal(datum, self.bt)))
    }

    /// A literal copied from a datum of another document.
    pub fn datum_from(&mut self, value: crate::datum::DatumRef<'_, '_>) -> Reql {
        let datum = Document::import(self.tree.document_mut(), value);
        Reql(self.tree.push_generated(GeneratedTerm::literal(datum, self.bt)))
    }

    /// A term of any kind with the given children.
    pub fn call<N: Into<String>>(
        &mut self,
        kind: TermKind,
        args: impl IntoIterator<Item = Reql>,
        optargs: impl IntoIterator<Item = (N, Reql)>,
    ) -> Reql {
        assert!(
            kind != TermKind::Datum,
            "literal terms are built with the literal constructors"
        );
        let mut node = GeneratedTerm::node(kind, self.bt);
        node.args = args.into_iter().map(Reql::source).collect();
        node.optargs = optargs
            .into_iter()
            .map(|(name, value)| (name.into(), value.source()))
            .collect();
        Reql(self.tree.push_generated(node))
    }

    fn op(&mut self, kind: TermKind, args: impl IntoIterator<Item = Reql>) -> Reql {
        self.call(kind, args, std::iter::empty::<(String, Reql)>())
    }

    pub fn array(&mut self, items: impl IntoIterator<Item = Reql>) -> Reql {
        self.op(TermKind::MakeArray, items)
    }

    pub fn object<N: Into<String>>(&mut self, members: impl IntoIterator<Item = (N, Reql)>) -> Reql {
        self.call(TermKind::MakeObj, std::iter::empty::<Reql>(), members)
    }

    /// A function of the given parameters: `FUNC [MAKE_ARRAY [ids...], body]`.
    pub fn fun_of(&mut self, params: &[VarId], body: Reql) -> Reql {
        let ids: Vec<Reql> = params.iter().map(|var| self.number(var.0 as f64)).collect();
        let params = self.array(ids);
        self.op(TermKind::Func, [params, body])
    }

    /// A zero-parameter function.
    pub fn fun(&mut self, body: Reql) -> Reql {
        self.fun_of(&[], body)
    }

    pub fn fun1(&mut self, a: VarId, body: Reql) -> Reql {
        self.fun_of(&[a], body)
    }

    pub fn fun2(&mut self, a: VarId, b: VarId, body: Reql) -> Reql {
        self.fun_of(&[a, b], body)
    }

    pub fn var(&mut self, var: VarId) -> Reql {
        let id = self.number(var.0 as f64);
        self.op(TermKind::Var, [id])
    }

    pub fn db(&mut self, name: impl Into<String>) -> Reql {
        let name = self.string(name);
        self.op(TermKind::Db, [name])
    }

    pub fn table(&mut self, db: Reql, name: impl Into<String>) -> Reql {
        let name = self.string(name);
        self.op(TermKind::Table, [db, name])
    }

    pub fn branch(&mut self, condition: Reql, then_branch: Reql, else_branch: Reql) -> Reql {
        self.op(TermKind::Branch, [condition, then_branch, else_branch])
    }

    pub fn error(&mut self, message: impl Into<String>) -> Reql {
        let message = self.string(message);
        self.op(TermKind::Error, [message])
    }

    pub fn eq(&mut self, a: Reql, b: Reql) -> Reql {
        self.op(TermKind::Eq, [a, b])
    }

    pub fn ne(&mut self, a: Reql, b: Reql) -> Reql {
        self.op(TermKind::Ne, [a, b])
    }

    pub fn lt(&mut self, a: Reql, b: Reql) -> Reql {
        self.op(TermKind::Lt, [a, b])
    }

    pub fn le(&mut self, a: Reql, b: Reql) -> Reql {
        self.op(TermKind::Le, [a, b])
    }

    pub fn gt(&mut self, a: Reql, b: Reql) -> Reql {
        self.op(TermKind::Gt, [a, b])
    }

    pub fn ge(&mut self, a: Reql, b: Reql) -> Reql {
        self.op(TermKind::Ge, [a, b])
    }

    pub fn add(&mut self, a: Reql, b: Reql) -> Reql {
        self.op(TermKind::Add, [a, b])
    }

    pub fn sub(&mut self, a: Reql, b: Reql) -> Reql {
        self.op(TermKind::Sub, [a, b])
    }

    pub fn mul(&mut self, a: Reql, b: Reql) -> Reql {
        self.op(TermKind::Mul, [a, b])
    }

    pub fn div(&mut self, a: Reql, b: Reql) -> Reql {
        self.op(TermKind::Div, [a, b])
    }

    pub fn and(&mut self, a: Reql, b: Reql) -> Reql {
        self.op(TermKind::And, [a, b])
    }

    pub fn or(&mut self, a: Reql, b: Reql) -> Reql {
        self.op(TermKind::Or, [a, b])
    }

    pub fn not(&mut self, a: Reql) -> Reql {
        self.op(TermKind::Not, [a])
    }

    pub fn get_field(&mut self, object: Reql, field: impl Into<String>) -> Reql {
        let field = self.string(field);
        self.op(TermKind::GetField, [object, field])
    }

    /// Call `function` with `args`: `FUNCALL [function, args...]`.
    pub fn funcall(&mut self, function: Reql, args: impl IntoIterator<Item = Reql>) -> Reql {
        let all: Vec<Reql> = std::iter::once(function).chain(args).collect();
        self.op(TermKind::Funcall, all)
    }

    /// Bind `value` to `var` inside `body`.
    pub fn do_(&mut self, var: VarId, value: Reql, body: Reql) -> Reql {
        let function = self.fun1(var, body);
        self.funcall(function, [value])
    }

    /// References to the arguments of `term` from index `start` on.
    pub fn copy_args_from(&mut self, term: TermSource, start: usize) -> Vec<Reql> {
        let sources: Vec<TermSource> = self
            .tree
            .term(term)
            .args()
            .skip(start)
            .map(|arg| arg.source())
            .collect();
        sources.into_iter().map(|source| self.existing(source)).collect()
    }

    /// References to the optargs of `term`, with their names.
    pub fn copy_optargs_from(&mut self, term: TermSource) -> Vec<(String, Reql)> {
        let sources: Vec<(String, TermSource)> = self
            .tree
            .term(term)
            .optargs()
            .map(|(name, value)| (name.to_owned(), value.source()))
            .collect();
        sources
            .into_iter()
            .map(|(name, source)| (name, self.existing(source)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{config::FrontendConfig, term::SYNTHETIC_VAR_BASE, walker::compare_terms};

    #[test]
    fn builds_the_same_tree_as_the_wire_form() {
        let mut tree = TermTree::new();
        let mut r = Minidriver::new(&mut tree, BacktraceId::EMPTY);
        let x = r.fresh_var();
        let row = r.var(x);
        let field = r.get_field(row, "age");
        let eighteen = r.number(18.0);
        let body = r.ge(field, eighteen);
        let function = r.fun1(x, body);
        tree.set_root(function.source());

        let wire = serde_json::to_string(&tree.root().unwrap()).unwrap();
        let parsed = TermTree::parse(wire.as_bytes(), &FrontendConfig::default()).unwrap();
        assert!(compare_terms(tree.root().unwrap(), parsed.root().unwrap()));
        assert_eq!(
            serde_json::to_value(parsed.root().unwrap()).unwrap(),
            json!([69, [[2, [x.0]], [22, [[31, [[10, [x.0]], "age"]], 18]]]])
        );
    }

    #[test]
    fn existing_nodes_are_shared_not_copied() {
        let config = FrontendConfig::default();
        let mut tree = TermTree::parse(br#"[15, ["users"]]"#, &config).unwrap();
        let table = tree.root_source().unwrap();
        let nodes_before = tree.len();

        let mut r = Minidriver::new(&mut tree, BacktraceId::EMPTY);
        let left = r.existing(table);
        let right = r.existing(table);
        let both = r.array([left, right]);
        tree.set_root(both.source());

        // Two reference slots and one MAKE_ARRAY; the table itself was not duplicated.
        assert_eq!(tree.len(), nodes_before + 3);
        let root = tree.root().unwrap();
        assert_eq!(root.arg(0).resolved_source(), table);
        assert_eq!(root.arg(1).resolved_source(), table);
        assert_eq!(root.node_count(), 5);
    }

    #[test]
    fn copies_args_and_optargs_by_reference() {
        let config = FrontendConfig::default();
        let mut tree =
            TermTree::parse(br#"[78, [[15, ["t"]], 1, 2, 3], {"index": "id"}]"#, &config).unwrap();
        let get_all = tree.root_source().unwrap();

        let mut r = Minidriver::new(&mut tree, BacktraceId::EMPTY);
        let keys = r.copy_args_from(get_all, 1);
        let optargs = r.copy_optargs_from(get_all);
        let rebuilt = r.call(TermKind::GetAll, keys, optargs);
        let term = r.term(rebuilt);

        assert_eq!(term.num_args(), 3);
        assert_eq!(term.arg(2).literal().and_then(|v| v.as_number()), Some(3.0));
        assert_eq!(
            term.optarg("index").and_then(|t| t.literal()).and_then(|v| v.as_str()),
            Some("id")
        );
    }

    #[test]
    fn synthesized_vars_stay_clear_of_client_vars() {
        let config = FrontendConfig::default();
        let mut tree = TermTree::parse(br#"[69, [[2, [1]], [10, [1]]]]"#, &config).unwrap();
        let client = tree.root_source().unwrap();

        let mut r = Minidriver::new(&mut tree, BacktraceId::EMPTY);
        let outer = r.fresh_var();
        let inner = r.fresh_var();
        assert!(outer.0 >= SYNTHETIC_VAR_BASE);
        assert_eq!(inner.0, outer.0 + 1);

        // Wrapping the client function keeps both bindings apart.
        let function = r.existing(client);
        let row = r.var(outer);
        let call = r.funcall(function, [row]);
        let wrapper = r.fun1(outer, call);
        let term = r.term(wrapper);
        let param = term.arg(0).arg(0).literal().and_then(|v| v.as_number());
        assert_eq!(param, Some(SYNTHETIC_VAR_BASE as f64));
        assert_ne!(param, Some(1.0));
    }

    #[test]
    fn do_binds_through_funcall() {
        let mut tree = TermTree::new();
        let mut r = Minidriver::new(&mut tree, BacktraceId::EMPTY);
        let v = r.fresh_var();
        let value = r.number(2.0);
        let var = r.var(v);
        let doubled = r.add(var, var);
        let bound = r.do_(v, value, doubled);
        let term = r.term(bound);

        assert_eq!(term.kind(), TermKind::Funcall);
        assert_eq!(term.arg(0).kind(), TermKind::Func);
        assert_eq!(term.arg(1).literal().and_then(|d| d.as_number()), Some(2.0));
        assert!(term.backtrace().is_empty());
    }
}
