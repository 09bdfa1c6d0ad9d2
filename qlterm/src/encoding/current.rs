//! The current binary layout: length envelope, per-node backtraces, varint lengths.
use crate::{
    backtrace::{BacktraceId, Frame},
    datum::{DatumNode, DatumRef},
    term::{GeneratedTerm, Term, TermKind, TermSource, TermTree},
};

use super::{
    CorruptionError, FormatVersion, Reader, check_depth, integer,
    magic::{D_ARRAY, D_BOOL, D_NULL, D_NUMBER, D_OBJECT, D_STRING, ENVELOPE_SIZE},
};

pub(super) fn encode(term: Term<'_, '_>) -> Vec<u8> {
    let mut out = vec![0u8; ENVELOPE_SIZE];
    encode_node(term, &mut out);

    let len = out.len() - ENVELOPE_SIZE;
    assert!(len <= i32::MAX as usize, "encoded term tree exceeds the i32 envelope");
    out[..ENVELOPE_SIZE].copy_from_slice(&(len as i32).to_le_bytes());
    out
}

fn encode_node(term: Term<'_, '_>, out: &mut Vec<u8>) {
    out.extend_from_slice(&term.kind().code().to_le_bytes());
    out.extend_from_slice(&(term.backtrace().raw() as i32).to_le_bytes());

    if let Some(literal) = term.literal() {
        encode_datum(literal, out);
        return;
    }

    write_len(term.num_args(), out);
    for arg in term.args() {
        encode_node(arg, out);
    }
    write_len(term.num_optargs(), out);
    for (name, value) in term.optargs() {
        write_str(name, out);
        encode_node(value, out);
    }
}

fn encode_datum(datum: DatumRef<'_, '_>, out: &mut Vec<u8>) {
    match datum.node() {
        DatumNode::Null => out.push(D_NULL),
        DatumNode::Bool(b) => out.extend_from_slice(&[D_BOOL, u8::from(*b)]),
        DatumNode::Number(n) => {
            out.push(D_NUMBER);
            out.extend_from_slice(&n.to_le_bytes());
        }
        DatumNode::String(s) => {
            out.push(D_STRING);
            write_str(s, out);
        }
        DatumNode::Array(items) => {
            out.push(D_ARRAY);
            write_len(items.len(), out);
            for item in datum.elements() {
                encode_datum(item, out);
            }
        }
        DatumNode::Object(members) => {
            out.push(D_OBJECT);
            write_len(members.len(), out);
            for (key, value) in datum.members() {
                write_str(key, out);
                encode_datum(value, out);
            }
        }
    }
}

#[inline]
fn write_len(len: usize, out: &mut Vec<u8>) {
    integer::encode_u64(len as u64, &mut |b| out.extend_from_slice(b));
}

#[inline]
fn write_str(s: &str, out: &mut Vec<u8>) {
    write_len(s.len(), out);
    out.extend_from_slice(s.as_bytes());
}

pub(super) fn decode(
    bytes: &[u8],
    version: FormatVersion,
) -> Result<TermTree<'static>, CorruptionError> {
    let mut reader = Reader::new(bytes, version);
    let declared = reader.i32()?;
    if declared < 0 || declared as usize != reader.remaining() {
        return Err(CorruptionError::EnvelopeMismatch {
            declared: i64::from(declared),
            actual: reader.remaining(),
        });
    }

    let mut tree = TermTree::new();
    let root = Decoder {
        reader: &mut reader,
        tree: &mut tree,
    }
    .node(BacktraceId::EMPTY, None, 0)?;
    reader.finish()?;

    tree.set_root(root);
    Ok(tree)
}

struct Decoder<'r, 'b, 't> {
    reader: &'r mut Reader<'b>,
    tree: &'t mut TermTree<'static>,
}

impl Decoder<'_, '_, '_> {
    /// Decode one node. A stored backtrace of 0 means the node had no client position;
    /// any other value is re-registered as `frame` under `parent` in the new tree.
    fn node(
        &mut self,
        parent: BacktraceId,
        frame: Option<Frame>,
        depth: usize,
    ) -> Result<TermSource, CorruptionError> {
        check_depth(depth)?;

        let offset = self.reader.offset();
        let code = self.reader.i32()?;
        let kind =
            TermKind::from_code(code).ok_or(CorruptionError::UnknownTermKind { code, offset })?;
        let bt = match (self.reader.i32()?, frame) {
            (0, _) => BacktraceId::EMPTY,
            (_, None) => BacktraceId::HEAD,
            (_, Some(frame)) => self.tree.backtraces_mut().new_frame(parent, frame),
        };

        if kind == TermKind::Datum {
            let datum = self.reader.datum(self.tree.document_mut(), depth + 1)?;
            return Ok(self.tree.push_generated(GeneratedTerm::literal(datum, bt)));
        }

        let mut node = GeneratedTerm::node(kind, bt);
        let num_args = self.reader.count()?;
        node.args.reserve(num_args);
        for i in 0..num_args {
            node.args.push(self.node(bt, Some(Frame::Arg(i)), depth + 1)?);
        }

        let num_optargs = self.reader.count()?;
        node.optargs.reserve(num_optargs);
        for _ in 0..num_optargs {
            let name = self.reader.str()?.to_owned();
            let value = self.node(bt, Some(Frame::Optarg(name.clone())), depth + 1)?;
            node.optargs.push((name, value));
        }

        Ok(self.tree.push_generated(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::FrontendConfig, walker::compare_terms};

    fn parse(text: &str) -> TermTree<'_> {
        TermTree::parse(text.as_bytes(), &FrontendConfig::default()).unwrap()
    }

    #[test]
    fn byte_layout_of_a_small_tree() {
        let tree = parse(r#"[24, [1, "a"]]"#);
        let root = tree.root().unwrap();
        let bt = |term: Term<'_, '_>| (term.backtrace().raw() as i32).to_le_bytes();

        let mut expected = Vec::new();
        expected.extend_from_slice(&24i32.to_le_bytes());
        expected.extend_from_slice(&bt(root));
        expected.push(2);
        expected.extend_from_slice(&1i32.to_le_bytes());
        expected.extend_from_slice(&bt(root.arg(0)));
        expected.push(D_NUMBER);
        expected.extend_from_slice(&1.0f64.to_le_bytes());
        expected.extend_from_slice(&1i32.to_le_bytes());
        expected.extend_from_slice(&bt(root.arg(1)));
        expected.extend_from_slice(&[D_STRING, 1, b'a']);
        expected.push(0);

        let bytes = encode(root);
        assert_eq!(&bytes[..4], &(expected.len() as i32).to_le_bytes());
        assert_eq!(&bytes[4..], &expected[..]);
    }

    #[test]
    fn round_trip_keeps_structure_and_positions() {
        let tree = parse(
            r#"[41, [[15, [[14, ["blog"]], "posts"]], [73, ["date"]]], {"index": {"a": [2, [null, true]]}}]"#,
        );
        let bytes = encode(tree.root().unwrap());
        let decoded = decode(&bytes, FormatVersion::V2_2).unwrap();

        let (left, right) = (tree.root().unwrap(), decoded.root().unwrap());
        assert!(compare_terms(left, right));
        assert_eq!(right.backtrace(), BacktraceId::HEAD);

        let deep = right.arg(0).arg(0).arg(0);
        assert_eq!(
            decoded.backtraces().resolve(deep.backtrace()),
            tree.backtraces().resolve(left.arg(0).arg(0).arg(0).backtrace())
        );
        let index = right.optarg("index").unwrap();
        assert_eq!(
            decoded.backtraces().resolve(index.backtrace()),
            vec![Frame::Optarg("index".to_string())]
        );
    }

    #[test]
    fn detached_trees_stay_detached() {
        let (document, root) = crate::datum::Document::parse(br#"[69, [[2, [1]], [10, [1]]]]"#).unwrap();
        let mut tree = TermTree::from_document(document);
        let source = tree.build_detached(root, &FrontendConfig::default()).unwrap();

        let decoded = decode(&encode(tree.term(source)), FormatVersion::V2_2).unwrap();
        let mut all_empty = true;
        crate::walker::walk_no_input(decoded.root().unwrap(), |node| {
            all_empty &= node.backtrace().is_empty();
            node.schedule_children();
        });
        assert!(all_empty);
        assert_eq!(decoded.backtraces().len(), 2);
    }

    #[test]
    fn envelope_must_match() {
        let tree = parse("[24, [1, 2]]");
        let mut bytes = encode(tree.root().unwrap());

        bytes.push(0);
        let err = decode(&bytes, FormatVersion::V2_2).unwrap_err();
        assert!(err.is_envelope_mismatch(), "{err:?}");

        // A consistent envelope around an extra byte is a trailing-bytes error instead.
        let len = (bytes.len() - ENVELOPE_SIZE) as i32;
        bytes[..ENVELOPE_SIZE].copy_from_slice(&len.to_le_bytes());
        assert_eq!(
            decode(&bytes, FormatVersion::V2_2).unwrap_err(),
            CorruptionError::TrailingBytes { remaining: 1 }
        );
    }

    #[test]
    fn damaged_bytes_are_reported() {
        let tree = parse("[24, [1, 2]]");
        let bytes = encode(tree.root().unwrap());

        let mut truncated = bytes[..bytes.len() - 3].to_vec();
        let len = (truncated.len() - ENVELOPE_SIZE) as i32;
        truncated[..ENVELOPE_SIZE].copy_from_slice(&len.to_le_bytes());
        assert!(decode(&truncated, FormatVersion::V2_2).unwrap_err().is_truncated());

        let mut unknown = bytes.clone();
        unknown[ENVELOPE_SIZE..ENVELOPE_SIZE + 4].copy_from_slice(&47i32.to_le_bytes());
        assert_eq!(
            decode(&unknown, FormatVersion::V2_2).unwrap_err(),
            CorruptionError::UnknownTermKind {
                code: 47,
                offset: ENVELOPE_SIZE
            }
        );
    }

    #[test]
    fn nesting_is_bounded() {
        // MAKE_ARRAY nodes, each holding the next as its single argument.
        let levels = super::super::MAX_DECODE_DEPTH + 1;
        let mut body = Vec::new();
        for _ in 0..levels {
            body.extend_from_slice(&2i32.to_le_bytes());
            body.extend_from_slice(&0i32.to_le_bytes());
            body.push(1);
        }
        body.extend_from_slice(&2i32.to_le_bytes());
        body.extend_from_slice(&0i32.to_le_bytes());
        body.extend_from_slice(&[0, 0]);
        body.extend(std::iter::repeat_n(0u8, levels));

        let mut bytes = (body.len() as i32).to_le_bytes().to_vec();
        bytes.extend(body);
        assert!(decode(&bytes, FormatVersion::V2_2).unwrap_err().is_too_deep());
    }
}
