use std::{cell::RefCell, ops::Deref};

use smallvec::SmallVec;

use crate::term::Term;

struct Visit<'t, 'a, I> {
    term: Term<'t, 'a>,
    parent: Option<Term<'t, 'a>>,
    input: I,
}

struct WalkState<'t, 'a, I> {
    stack: Vec<Visit<'t, 'a, I>>,
    /// Children scheduled by the node being visited, in scheduling order.
    pending: SmallVec<[Visit<'t, 'a, I>; 8]>,
    stopped: bool,
}

/// Handle passed to the visitor for the current node.
///
/// Derefs to the node's [`Term`]. Children are only visited when scheduled through
/// this handle, which makes pruned or guided traversals straightforward.
pub struct WalkerHandle<'w, 't, 'a, I> {
    state: &'w RefCell<WalkState<'t, 'a, I>>,
    term: Term<'t, 'a>,
    parent: Option<Term<'t, 'a>>,
}

impl<'w, 't, 'a, I> WalkerHandle<'w, 't, 'a, I> {
    #[inline]
    pub fn term(&self) -> Term<'t, 'a> {
        self.term
    }

    /// The node this one was scheduled from; `None` at the root.
    #[inline]
    pub fn parent(&self) -> Option<Term<'t, 'a>> {
        self.parent
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Schedule `child` for a depth-first visit with `input`.
    ///
    /// Children scheduled from one node are visited in the order they were scheduled,
    /// before any sibling of the current node.
    pub fn schedule_visit(&self, child: Term<'t, 'a>, input: I) {
        self.state.borrow_mut().pending.push(Visit {
            term: child,
            parent: Some(self.term),
            input,
        });
    }

    /// Stop the traversal once the visitor returns. Nothing else is visited.
    pub fn break_(&self) {
        self.state.borrow_mut().stopped = true;
    }

    /// Schedule every argument then every optarg, all with a clone of `input`.
    pub fn schedule_children_with(&self, input: I)
    where
        I: Clone,
    {
        if self.term.is_literal() {
            return;
        }
        for arg in self.term.args() {
            self.schedule_visit(arg, input.clone());
        }
        for (_, optarg) in self.term.optargs() {
            self.schedule_visit(optarg, input.clone());
        }
    }
}

impl WalkerHandle<'_, '_, '_, ()> {
    #[inline]
    pub fn schedule_children(&self) {
        self.schedule_children_with(());
    }
}

impl<'t, 'a, I> Deref for WalkerHandle<'_, 't, 'a, I> {
    type Target = Term<'t, 'a>;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.term
    }
}

/// Walk a term tree depth-first, visiting only the nodes the visitor schedules.
///
/// Uses an explicit stack, so the depth of the tree never grows the call stack.
/// Nodes reachable through several references are visited once per occurrence.
pub fn walk<'t, 'a, I, F>(root: Term<'t, 'a>, input: I, mut visitor: F)
where
    F: FnMut(I, WalkerHandle<'_, 't, 'a, I>),
{
    let state = RefCell::new(WalkState {
        stack: vec![Visit {
            term: root,
            parent: None,
            input,
        }],
        pending: SmallVec::new(),
        stopped: false,
    });

    loop {
        // Pop with a short-lived borrow; the visitor borrows the state again to schedule.
        let next = state.borrow_mut().stack.pop();
        let Some(Visit {
            term,
            parent,
            input,
        }) = next
        else {
            break;
        };

        visitor(
            input,
            WalkerHandle {
                state: &state,
                term,
                parent,
            },
        );

        let mut guard = state.borrow_mut();
        if guard.stopped {
            break;
        }
        let WalkState { stack, pending, .. } = &mut *guard;
        while let Some(visit) = pending.pop() {
            stack.push(visit);
        }
    }
}

/// Convenience when no input/state needs to be threaded.
#[inline]
pub fn walk_no_input<'t, 'a, F>(root: Term<'t, 'a>, mut visitor: F)
where
    F: FnMut(WalkerHandle<'_, 't, 'a, ()>),
{
    walk(root, (), |(), node| visitor(node));
}
