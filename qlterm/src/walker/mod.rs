//! Iterative walkers over term trees, and the placement validator built on them.
//!
//! - [`walk`] / [`walk_no_input`]: user-scheduled depth-first traversal. The visitor
//!   decides which children to enter and what state each one receives.
//! - [`validate`]: the single pass every client tree goes through before evaluation. It
//!   enforces where writes and `ASC`/`DESC` may appear and normalizes implicit
//!   bare-object nodes into `MAKE_OBJ`.
//! - [`compare_terms`]: structural equality across trees and backings.
//!
//! Write placement
//! - Writes are legal at the root.
//! - Under a kind that [forbids writes](TermKind::forbids_writes), every child except
//!   argument 0 loses write legality (optargs included).
//! - Once lost, legality never comes back further down the path.
//!
//! Example: count the `GET_FIELD` terms of a tree
//! ```
//! use qlterm::{config::FrontendConfig, term::{TermKind, TermTree}, walker::walk_no_input};
//!
//! let tree = TermTree::parse(
//!     br#"[24, [[31, [[13], "a"]], [31, [[13], "b"]]]]"#,
//!     &FrontendConfig::default(),
//! )
//! .unwrap();
//! let mut fields = 0;
//! walk_no_input(tree.root().unwrap(), |node| {
//!     if node.kind() == TermKind::GetField {
//!         fields += 1;
//!     }
//!     node.schedule_children();
//! });
//! assert_eq!(fields, 2);
//! ```
mod visit;

pub use visit::*;

use log::trace;
use smallvec::SmallVec;

use crate::{
    error::{Error, Result},
    term::{Term, TermKind, TermSource, TermTree},
};

/// Check placement rules over the tree rooted at `root`, then normalize implicit nodes.
///
/// The first violation found in pre-order is returned and nothing is rewritten.
pub fn validate(tree: &mut TermTree<'_>, root: TermSource) -> Result<()> {
    let mut failure = None;
    let mut implicit: SmallVec<[TermSource; 8]> = SmallVec::new();

    walk(tree.term(root), true, |writes_legal, node| {
        if node.is_implicit() {
            implicit.push(node.resolved_source());
        }

        let kind = node.kind();
        if kind.is_ordering() && node.parent().map(|p| p.kind()) != Some(TermKind::OrderBy) {
            failure = Some(Error::MisplacedOrdering {
                kind: kind.name(),
                bt: node.backtrace(),
            });
            node.break_();
            return;
        }
        if kind.is_write_or_meta() && !writes_legal {
            failure = Some(Error::NestedWrite {
                bt: node.backtrace(),
            });
            node.break_();
            return;
        }
        if node.is_literal() {
            return;
        }

        let forbids = kind.forbids_writes();
        for (i, arg) in node.args().enumerate() {
            node.schedule_visit(arg, writes_legal && (i == 0 || !forbids));
        }
        for (_, optarg) in node.optargs() {
            node.schedule_visit(optarg, writes_legal && !forbids);
        }
    });

    if let Some(err) = failure {
        return Err(err);
    }

    for source in implicit {
        if tree.normalize(source) {
            trace!("Rewrote implicit object {source:?} into MAKE_OBJ");
        }
    }
    Ok(())
}

/// Compare two terms for structural equality.
///
/// Kinds, literal values, arguments and optargs (names and order) must match.
/// Backtraces, backings and whether a child is reached through a reference are ignored.
pub fn compare_terms(a: Term<'_, '_>, b: Term<'_, '_>) -> bool {
    if a.kind() != b.kind() {
        return false;
    }

    if a.is_literal() {
        return match (a.literal(), b.literal()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        };
    }

    a.num_args() == b.num_args()
        && a.num_optargs() == b.num_optargs()
        && a.args().zip(b.args()).all(|(x, y)| compare_terms(x, y))
        && a
            .optargs()
            .zip(b.optargs())
            .all(|((name_a, x), (name_b, y))| name_a == name_b && compare_terms(x, y))
}
