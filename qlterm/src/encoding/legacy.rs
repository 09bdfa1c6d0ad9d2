//! Layouts persisted before v2.2. Decode only.
//!
//! Each node is `kind: i32` followed by a datum for literals, or by `u32` argument count,
//! arguments, `u32` optarg count and `(u32 name length, name bytes, node)` per optarg.
//! No backtraces were stored, so every decoded node is positionless.
use crate::{
    backtrace::BacktraceId,
    term::{GeneratedTerm, TermKind, TermSource, TermTree},
};

use super::{CorruptionError, FormatVersion, Reader, check_depth};

pub(super) fn decode(
    bytes: &[u8],
    version: FormatVersion,
) -> Result<TermTree<'static>, CorruptionError> {
    let mut reader = Reader::new(bytes, version);
    let mut tree = TermTree::new();
    let root = decode_node(&mut reader, &mut tree, 0)?;
    reader.finish()?;

    tree.set_root(root);
    Ok(tree)
}

fn decode_node(
    reader: &mut Reader<'_>,
    tree: &mut TermTree<'static>,
    depth: usize,
) -> Result<TermSource, CorruptionError> {
    check_depth(depth)?;

    let offset = reader.offset();
    let code = reader.i32()?;
    let kind = TermKind::from_code(code).ok_or(CorruptionError::UnknownTermKind { code, offset })?;

    if kind == TermKind::Datum {
        let datum = reader.datum(tree.document_mut(), depth + 1)?;
        return Ok(tree.push_generated(GeneratedTerm::literal(datum, BacktraceId::EMPTY)));
    }

    let mut node = GeneratedTerm::node(kind, BacktraceId::EMPTY);
    let num_args = reader.count()?;
    for _ in 0..num_args {
        node.args.push(decode_node(reader, tree, depth + 1)?);
    }
    let num_optargs = reader.count()?;
    for _ in 0..num_optargs {
        let name = reader.str()?.to_owned();
        node.optargs.push((name, decode_node(reader, tree, depth + 1)?));
    }

    Ok(tree.push_generated(node))
}
