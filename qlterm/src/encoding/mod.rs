//! Binary encoding of finished term trees, for persistence and RPC.
//!
//! Layout (current format, [`FormatVersion::V2_2`])
//! - An `i32` little-endian envelope holding the byte length of the root node.
//! - Each node: `kind: i32`, `backtrace: i32`, then a payload. Literal payloads are an
//!   encoded datum (see [`magic`]); every other kind stores a varint argument count, the
//!   arguments, a varint optarg count and `(varint name length, name bytes, node)` per optarg.
//!
//! Legacy formats ([`FormatVersion::V1_14`] to [`FormatVersion::V2_1`]) have no envelope and
//! no per-node backtrace, and use fixed-width `u32` lengths. They are decoded only.
//!
//! The version is never stored in the bytes: whoever persisted them keeps the tag alongside
//! and hands it back to [`decode`]. A decoding failure means the stored bytes are damaged,
//! which is why [`CorruptionError`] is kept apart from the client [`Error`](crate::error::Error).
use std::{borrow::Cow, fmt};

use log::{debug, trace, warn};
use strum::{EnumIs, EnumIter, IntoStaticStr};
use thiserror::Error;

use crate::{
    datum::{DatumId, DatumNode, Document},
    term::{Term, TermTree},
};

mod current;
pub mod integer;
mod legacy;
pub mod magic;

use magic::*;

/// Nodes and datums nested deeper than this are rejected while decoding.
pub const MAX_DECODE_DEPTH: usize = 1024;

/// Every binary layout a term tree has ever been persisted with.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, IntoStaticStr,
)]
pub enum FormatVersion {
    #[strum(serialize = "v1.14")]
    V1_14,
    #[strum(serialize = "v1.15")]
    V1_15,
    #[strum(serialize = "v1.16")]
    V1_16,
    #[strum(serialize = "v2.0")]
    V2_0,
    #[strum(serialize = "v2.1")]
    V2_1,
    #[strum(serialize = "v2.2")]
    V2_2,
}

impl FormatVersion {
    /// The only version [`encode`] produces.
    pub const CURRENT: FormatVersion = FormatVersion::V2_2;

    pub fn name(self) -> &'static str {
        self.into()
    }

    pub const fn is_current(self) -> bool {
        matches!(self, FormatVersion::V2_2)
    }

    /// Whether legacy datum tag [`D_JSON`] may appear.
    pub const fn allows_json_datum(self) -> bool {
        matches!(
            self,
            FormatVersion::V1_16 | FormatVersion::V2_0 | FormatVersion::V2_1
        )
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Persisted or transmitted bytes that do not describe a term tree.
#[derive(Debug, Clone, PartialEq, Eq, EnumIs, Error)]
pub enum CorruptionError {
    #[error("Unexpected end of input at byte {offset}: {needed} more bytes needed.")]
    Truncated { offset: usize, needed: usize },

    #[error("Envelope announces {declared} bytes but {actual} follow it.")]
    EnvelopeMismatch { declared: i64, actual: usize },

    #[error("Malformed length or count at byte {offset}.")]
    BadLength { offset: usize },

    #[error("Unknown term type {code} at byte {offset}.")]
    UnknownTermKind { code: i32, offset: usize },

    #[error("Unknown datum tag {tag:#04x} at byte {offset}.")]
    UnknownDatumTag { tag: u8, offset: usize },

    #[error("Datum tag {tag:#04x} at byte {offset} is not valid in format {version}.")]
    UnsupportedDatumTag {
        tag: u8,
        offset: usize,
        version: &'static str,
    },

    #[error("String at byte {offset} is not valid UTF-8.")]
    InvalidUtf8 { offset: usize },

    #[error("Embedded JSON datum at byte {offset} is invalid: {message}")]
    InvalidJson { offset: usize, message: String },

    #[error("Nesting deeper than {max} levels.")]
    TooDeep { max: usize },

    #[error("{remaining} trailing bytes after the root term.")]
    TrailingBytes { remaining: usize },
}

type DecodeFn = fn(&[u8], FormatVersion) -> Result<TermTree<'static>, CorruptionError>;

fn decoder_for(version: FormatVersion) -> DecodeFn {
    match version {
        FormatVersion::V1_14
        | FormatVersion::V1_15
        | FormatVersion::V1_16
        | FormatVersion::V2_0
        | FormatVersion::V2_1 => legacy::decode,
        FormatVersion::V2_2 => current::decode,
    }
}

/// Encode the subtree rooted at `term` in the [current](FormatVersion::CURRENT) format.
pub fn encode(term: Term<'_, '_>) -> Vec<u8> {
    current::encode(term)
}

/// Decode a tree persisted with `version`. The decoded root is the tree's root.
pub fn decode(bytes: &[u8], version: FormatVersion) -> Result<TermTree<'static>, CorruptionError> {
    if !version.is_current() {
        debug!("Decoding {} bytes of legacy {version} term tree", bytes.len());
    }

    let tree = decoder_for(version)(bytes, version)?;
    trace!("Decoded {version} term tree with {} nodes", tree.len());
    Ok(tree)
}

/// [`decode`] for bytes that were written by this system and must be intact.
///
/// # Panics
/// On any [`CorruptionError`]. Damaged persisted data is never silently replaced.
pub fn decode_or_crash(bytes: &[u8], version: FormatVersion) -> TermTree<'static> {
    decode(bytes, version).unwrap_or_else(|err| {
        warn!(
            "Stored {version} term tree of {} bytes is corrupted: {err}",
            bytes.len()
        );
        panic!("corrupted {version} term tree: {err}")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LengthPrefix {
    Varint,
    U32,
}

/// Forward cursor over encoded bytes; every read reports its offset on failure.
pub(crate) struct Reader<'b> {
    bytes: &'b [u8],
    pos: usize,
    lengths: LengthPrefix,
    version: FormatVersion,
}

impl<'b> Reader<'b> {
    pub(crate) fn new(bytes: &'b [u8], version: FormatVersion) -> Self {
        Self {
            bytes,
            pos: 0,
            lengths: if version.is_current() {
                LengthPrefix::Varint
            } else {
                LengthPrefix::U32
            },
            version,
        }
    }

    #[inline]
    pub(crate) fn offset(&self) -> usize {
        self.pos
    }

    #[inline]
    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'b [u8], CorruptionError> {
        let remaining = self.remaining();
        if remaining < n {
            return Err(CorruptionError::Truncated {
                offset: self.pos,
                needed: n - remaining,
            });
        }
        let out = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CorruptionError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, CorruptionError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn i32(&mut self) -> Result<i32, CorruptionError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    pub(crate) fn f64(&mut self) -> Result<f64, CorruptionError> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    /// A byte length, in the prefix width of this reader's format.
    pub(crate) fn length(&mut self) -> Result<usize, CorruptionError> {
        let offset = self.pos;
        let value = match self.lengths {
            LengthPrefix::Varint => {
                let mut rest = &self.bytes[self.pos..];
                let before = rest.len();
                let value = integer::decode_u64(&mut rest)
                    .ok_or(CorruptionError::BadLength { offset })?;
                self.pos += before - rest.len();
                value
            }
            LengthPrefix::U32 => u64::from(u32::from_le_bytes(self.array()?)),
        };
        usize::try_from(value).map_err(|_| CorruptionError::BadLength { offset })
    }

    /// An item count. Every item takes at least one byte, which bounds what may follow.
    pub(crate) fn count(&mut self) -> Result<usize, CorruptionError> {
        let offset = self.pos;
        let count = self.length()?;
        if count > self.remaining() {
            return Err(CorruptionError::BadLength { offset });
        }
        Ok(count)
    }

    pub(crate) fn str(&mut self) -> Result<&'b str, CorruptionError> {
        let len = self.length()?;
        let offset = self.pos;
        std::str::from_utf8(self.take(len)?).map_err(|_| CorruptionError::InvalidUtf8 { offset })
    }

    pub(crate) fn finish(&self) -> Result<(), CorruptionError> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(CorruptionError::TrailingBytes { remaining }),
        }
    }

    /// Decode one datum into `document`.
    pub(crate) fn datum(
        &mut self,
        document: &mut Document<'static>,
        depth: usize,
    ) -> Result<DatumId, CorruptionError> {
        check_depth(depth)?;

        let offset = self.pos;
        let node = match self.u8()? {
            D_NULL => DatumNode::Null,
            D_BOOL => DatumNode::Bool(self.u8()? != 0),
            D_NUMBER => DatumNode::Number(self.f64()?),
            D_STRING => DatumNode::String(Cow::Owned(self.str()?.to_owned())),
            D_ARRAY => {
                let count = self.count()?;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.datum(document, depth + 1)?);
                }
                DatumNode::Array(items)
            }
            D_OBJECT => {
                let count = self.count()?;
                let mut members = Vec::with_capacity(count);
                for _ in 0..count {
                    let key = self.str()?.to_owned();
                    members.push((Cow::Owned(key), self.datum(document, depth + 1)?));
                }
                DatumNode::Object(members)
            }
            D_JSON if self.version.allows_json_datum() => {
                let text = self.str()?;
                return document
                    .parse_owned_into(text.as_bytes())
                    .map_err(|err| CorruptionError::InvalidJson {
                        offset,
                        message: err.to_string(),
                    });
            }
            D_JSON => {
                return Err(CorruptionError::UnsupportedDatumTag {
                    tag: D_JSON,
                    offset,
                    version: self.version.name(),
                });
            }
            tag => return Err(CorruptionError::UnknownDatumTag { tag, offset }),
        };
        Ok(document.push(node))
    }
}

#[inline]
pub(crate) fn check_depth(depth: usize) -> Result<(), CorruptionError> {
    if depth > MAX_DECODE_DEPTH {
        return Err(CorruptionError::TooDeep {
            max: MAX_DECODE_DEPTH,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn only_the_last_version_is_current() {
        let current: Vec<_> = FormatVersion::iter().filter(|v| v.is_current()).collect();
        assert_eq!(current, vec![FormatVersion::CURRENT]);
        assert_eq!(FormatVersion::iter().max(), Some(FormatVersion::CURRENT));
        assert_eq!(FormatVersion::V1_16.to_string(), "v1.16");
    }

    #[test]
    fn reader_reports_offsets() {
        let mut reader = Reader::new(&[1, 0, 0], FormatVersion::V2_0);
        assert_eq!(reader.u8(), Ok(1));
        assert_eq!(
            reader.i32(),
            Err(CorruptionError::Truncated {
                offset: 1,
                needed: 2
            })
        );

        // A count can never exceed the bytes left after it.
        let mut reader = Reader::new(&[0x05, 0x00], FormatVersion::V2_2);
        assert_eq!(reader.count(), Err(CorruptionError::BadLength { offset: 0 }));
    }

    #[test]
    fn json_datum_tag_depends_on_version() {
        let bytes = [&[D_JSON][..], &7u32.to_le_bytes(), br#"[1,"a"]"#].concat();

        let mut document = Document::new();
        let mut reader = Reader::new(&bytes, FormatVersion::V1_16);
        let id = reader.datum(&mut document, 0).unwrap();
        reader.finish().unwrap();
        assert_eq!(document.get(id).to_json(), serde_json::json!([1, "a"]));

        let mut reader = Reader::new(&bytes, FormatVersion::V1_15);
        let err = reader.datum(&mut document, 0).unwrap_err();
        assert!(err.is_unsupported_datum_tag(), "{err:?}");
    }

    #[test]
    fn unknown_tags_are_corruption() {
        let mut document = Document::new();
        let mut reader = Reader::new(&[0x42], FormatVersion::V2_2);
        assert_eq!(
            reader.datum(&mut document, 0),
            Err(CorruptionError::UnknownDatumTag {
                tag: 0x42,
                offset: 0
            })
        );
    }
}
