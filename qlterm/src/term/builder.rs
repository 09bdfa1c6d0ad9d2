//! Conversion of document nodes into view terms.
//!
//! Shapes accepted at every position:
//! - an array `[kind]`, `[kind, args]`, `[kind, optargs]` or `[kind, args, optargs]`,
//!   where `args` is an array of terms and `optargs` an object of terms;
//! - any scalar, which becomes a literal;
//! - an object. When no array appears anywhere inside it, it is pure data and becomes a
//!   literal as a whole. Otherwise its values are terms and it becomes an implicit
//!   `MAKE_OBJ` whose optargs are the members; the validator normalizes it later.
//!
//! A `NOW` with no arguments is folded into a literal holding the tree's start time, so
//! every such `NOW` in one query yields the exact same value.
use std::collections::HashSet;

use smallvec::SmallVec;

use crate::{
    backtrace::{BacktraceId, Frame},
    config::FrontendConfig,
    datum::{DatumId, DatumNode},
    error::{Error, Result},
    term::{TermKind, TermSource, TermTree, ViewTerm},
};

pub(crate) struct Builder<'t, 'a> {
    tree: &'t mut TermTree<'a>,
    max_depth: usize,
    track_backtraces: bool,
}

impl<'t, 'a> Builder<'t, 'a> {
    pub(crate) fn new(tree: &'t mut TermTree<'a>, config: &FrontendConfig) -> Self {
        Self {
            tree,
            max_depth: config.max_term_depth,
            track_backtraces: true,
        }
    }

    /// Give every built node [`BacktraceId::EMPTY`] instead of registering positions.
    pub(crate) fn without_backtraces(mut self) -> Self {
        self.track_backtraces = false;
        self
    }

    pub(crate) fn build(&mut self, datum: DatumId, bt: BacktraceId) -> Result<TermSource> {
        self.build_at(datum, bt, 0)
    }

    fn build_at(&mut self, datum: DatumId, bt: BacktraceId, depth: usize) -> Result<TermSource> {
        if depth > self.max_depth {
            return Err(Error::TermTooDeep {
                max: self.max_depth,
                bt,
            });
        }

        match self.tree.datums.node(datum) {
            DatumNode::Array(_) => self.build_term(datum, bt, depth),
            DatumNode::Object(_) => self.build_object(datum, bt, depth),
            _ => Ok(self.literal(datum, datum, bt)),
        }
    }

    fn literal(&mut self, source: DatumId, value: DatumId, bt: BacktraceId) -> TermSource {
        self.tree.push_view(ViewTerm {
            kind: TermKind::Datum,
            bt,
            literal: Some(value),
            args: 0..0,
            optargs: 0..0,
            optargs_object: source,
            implicit: false,
        })
    }

    fn build_term(&mut self, datum: DatumId, bt: BacktraceId, depth: usize) -> Result<TermSource> {
        let doc = &self.tree.datums;
        let size = doc.array_len(datum).unwrap_or(0);
        if !(1..=3).contains(&size) {
            return Err(Error::TermSize { found: size, bt });
        }
        let items: SmallVec<[DatumId; 3]> = (0..size).map(|i| doc.array_item(datum, i)).collect();

        let opcode = match doc.node(items[0]) {
            DatumNode::Number(n) => *n,
            other => {
                return Err(Error::OpcodeNotNumber {
                    found: other.type_name(),
                    bt,
                });
            }
        };
        let kind =
            TermKind::from_number(opcode).ok_or(Error::UnknownTermKind { found: opcode, bt })?;
        if kind == TermKind::Datum {
            return Err(Error::ExplicitDatum { bt });
        }

        let mut args = None;
        let mut optargs = None;
        if size >= 2 {
            match doc.node(items[1]) {
                DatumNode::Array(_) => args = Some(items[1]),
                DatumNode::Object(_) => optargs = Some(items[1]),
                other => {
                    return Err(Error::ExpectedArgsOrOptargs {
                        found: other.type_name(),
                        bt,
                    });
                }
            }
        }
        if size == 3 {
            if optargs.is_some() {
                return Err(Error::TwoOptargSets { bt });
            }
            match doc.node(items[2]) {
                DatumNode::Object(_) => optargs = Some(items[2]),
                other => {
                    return Err(Error::ExpectedType {
                        expected: "OBJECT",
                        found: other.type_name(),
                        bt,
                    });
                }
            }
        }

        let num_args = args.and_then(|a| doc.array_len(a)).unwrap_or(0);
        let num_optargs = optargs.and_then(|o| doc.object_len(o)).unwrap_or(0);

        if kind == TermKind::Now && num_args == 0 && num_optargs == 0 {
            let time = self.tree.start_time();
            return Ok(self.literal(datum, time, bt));
        }

        let mut children: SmallVec<[TermSource; 8]> = SmallVec::new();
        if let Some(args) = args {
            for i in 0..num_args {
                let child = self.tree.datums.array_item(args, i);
                let child_bt = self.arg_backtrace(bt, i);
                children.push(self.build_at(child, child_bt, depth + 1)?);
            }
        }
        if let Some(optargs) = optargs {
            self.check_duplicate_keys(optargs, bt)?;
            self.build_members(optargs, bt, depth, &mut children)?;
        }

        let (args, optargs_range) = self.tree.append_links(&children, num_args);
        Ok(self.tree.push_view(ViewTerm {
            kind,
            bt,
            literal: None,
            args,
            optargs: optargs_range,
            optargs_object: optargs.unwrap_or(datum),
            implicit: false,
        }))
    }

    fn build_object(&mut self, datum: DatumId, bt: BacktraceId, depth: usize) -> Result<TermSource> {
        if self.tree.datums.get(datum).is_array_free() {
            self.check_literal_keys(datum, bt)?;
            return Ok(self.literal(datum, datum, bt));
        }

        self.check_duplicate_keys(datum, bt)?;
        let mut children: SmallVec<[TermSource; 8]> = SmallVec::new();
        self.build_members(datum, bt, depth, &mut children)?;

        let (args, optargs) = self.tree.append_links(&children, 0);
        Ok(self.tree.push_view(ViewTerm {
            kind: TermKind::MakeObj,
            bt,
            literal: None,
            args,
            optargs,
            optargs_object: datum,
            implicit: true,
        }))
    }

    fn build_members(
        &mut self,
        object: DatumId,
        bt: BacktraceId,
        depth: usize,
        out: &mut SmallVec<[TermSource; 8]>,
    ) -> Result<()> {
        let count = self.tree.datums.object_len(object).unwrap_or(0);
        for member in 0..count {
            let (name, value) = self.tree.datums.object_member(object, member);
            let child_bt = if self.track_backtraces {
                let frame = Frame::Optarg(name.to_owned());
                self.tree.backtraces.new_frame(bt, frame)
            } else {
                BacktraceId::EMPTY
            };
            out.push(self.build_at(value, child_bt, depth + 1)?);
        }
        Ok(())
    }

    fn arg_backtrace(&mut self, parent: BacktraceId, index: usize) -> BacktraceId {
        if self.track_backtraces {
            self.tree.backtraces.new_frame(parent, Frame::Arg(index))
        } else {
            BacktraceId::EMPTY
        }
    }

    fn check_duplicate_keys(&self, object: DatumId, bt: BacktraceId) -> Result<()> {
        let doc = &self.tree.datums;
        let count = doc.object_len(object).unwrap_or(0);
        let mut seen = HashSet::with_capacity(count);
        for member in 0..count {
            let (name, _) = doc.object_member(object, member);
            if !seen.insert(name) {
                return Err(Error::DuplicateKey {
                    key: name.to_owned(),
                    bt,
                });
            }
        }
        Ok(())
    }

    /// Duplicate-key check over a whole pure-data object, nested objects included.
    fn check_literal_keys(&self, object: DatumId, bt: BacktraceId) -> Result<()> {
        let mut stack: SmallVec<[DatumId; 8]> = SmallVec::new();
        stack.push(object);
        while let Some(current) = stack.pop() {
            self.check_duplicate_keys(current, bt)?;
            let doc = &self.tree.datums;
            for member in 0..doc.object_len(current).unwrap_or(0) {
                let (_, value) = doc.object_member(current, member);
                if doc.object_len(value).is_some() {
                    stack.push(value);
                }
            }
        }
        Ok(())
    }
}
