//! Generic document tree produced from a query buffer.
//!
//! Role
//! - [`Document`] is an arena of [`DatumNode`]s addressed by [`DatumId`]. It is the
//!   wire document the term builder reads from, and also the store for every literal
//!   value a tree owns (folded times, synthesized literals, decoded datums).
//! - Parsing is zero-copy for strings: a string without escapes borrows straight from
//!   the caller's buffer (`Cow::Borrowed`), so the buffer must outlive the document.
//!
//! Objects keep their members in document order and keep duplicate keys; rejecting
//! duplicates is the builder's job since only it knows the backtrace to report.
use std::{borrow::Cow, fmt};

use either::Either;
use serde::{
    Deserializer, Serialize, Serializer,
    de::{self, DeserializeSeed, MapAccess, SeqAccess, Visitor},
    ser::{SerializeMap, SerializeSeq},
};

use crate::error::Result;

/// Handle to a node of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatumId(u32);

impl DatumId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DatumNode<'a> {
    Null,
    Bool(bool),
    Number(f64),
    String(Cow<'a, str>),
    Array(Vec<DatumId>),
    Object(Vec<(Cow<'a, str>, DatumId)>),
}

impl DatumNode<'_> {
    /// Type name as reported in client error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            DatumNode::Null => "NULL",
            DatumNode::Bool(_) => "BOOL",
            DatumNode::Number(_) => "NUMBER",
            DatumNode::String(_) => "STRING",
            DatumNode::Array(_) => "ARRAY",
            DatumNode::Object(_) => "OBJECT",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Document<'a> {
    nodes: Vec<DatumNode<'a>>,
}

impl<'a> Document<'a> {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Parse `bytes` into a fresh document and return it with its root node.
    pub fn parse(bytes: &'a [u8]) -> Result<(Self, DatumId)> {
        let mut document = Self::new();
        let root = document.parse_into(bytes)?;
        Ok((document, root))
    }

    /// Parse `bytes` into this document, appending after existing nodes.
    ///
    /// On failure nothing is kept: the document is rolled back to its previous size.
    pub fn parse_into(&mut self, bytes: &'a [u8]) -> Result<DatumId> {
        Ok(self.parse_with(serde_json::Deserializer::from_slice(bytes))?)
    }

    /// Like [`parse_into`](Self::parse_into), but every string is copied, so `bytes`
    /// need not outlive the document. Member order and repeated keys are kept.
    pub(crate) fn parse_owned_into(&mut self, bytes: &[u8]) -> serde_json::Result<DatumId> {
        // A reader source never lends strings out, so nothing borrows from `bytes`.
        self.parse_with(serde_json::Deserializer::from_reader(bytes))
    }

    fn parse_with<R>(&mut self, mut de: serde_json::Deserializer<R>) -> serde_json::Result<DatumId>
    where
        R: serde_json::de::Read<'a>,
    {
        let mark = self.nodes.len();
        let parsed = NodeSeed { doc: self }
            .deserialize(&mut de)
            .and_then(|root| de.end().map(|()| root));
        if parsed.is_err() {
            self.nodes.truncate(mark);
        }
        parsed
    }

    pub fn push(&mut self, node: DatumNode<'a>) -> DatumId {
        let next = self.nodes.len();
        assert!(next < u32::MAX as usize, "document exhausted its id space");
        self.nodes.push(node);
        DatumId(next as u32)
    }

    /// Copy a `serde_json` value into the document as owned nodes.
    pub fn push_json(&mut self, value: &serde_json::Value) -> DatumId {
        let node = match value {
            serde_json::Value::Null => DatumNode::Null,
            serde_json::Value::Bool(b) => DatumNode::Bool(*b),
            serde_json::Value::Number(n) => DatumNode::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => DatumNode::String(Cow::Owned(s.clone())),
            serde_json::Value::Array(items) => {
                let items = items.iter().map(|item| self.push_json(item)).collect();
                DatumNode::Array(items)
            }
            serde_json::Value::Object(members) => {
                let members = members
                    .iter()
                    .map(|(key, item)| (Cow::Owned(key.clone()), self.push_json(item)))
                    .collect();
                DatumNode::Object(members)
            }
        };
        self.push(node)
    }

    /// Deep-copy a datum from any document into this one.
    pub fn import(&mut self, datum: DatumRef<'_, '_>) -> DatumId {
        let node = match datum.node() {
            DatumNode::Null => DatumNode::Null,
            DatumNode::Bool(b) => DatumNode::Bool(*b),
            DatumNode::Number(n) => DatumNode::Number(*n),
            DatumNode::String(s) => DatumNode::String(Cow::Owned(s.to_string())),
            DatumNode::Array(_) => {
                DatumNode::Array(datum.elements().map(|item| self.import(item)).collect())
            }
            DatumNode::Object(_) => DatumNode::Object(
                datum
                    .members()
                    .map(|(key, item)| (Cow::Owned(key.to_string()), self.import(item)))
                    .collect(),
            ),
        };
        self.push(node)
    }

    #[inline]
    pub fn node(&self, id: DatumId) -> &DatumNode<'a> {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn get(&self, id: DatumId) -> DatumRef<'_, 'a> {
        assert!(id.index() < self.nodes.len(), "datum {id:?} out of range");
        DatumRef { doc: self, id }
    }

    #[inline]
    pub fn type_name(&self, id: DatumId) -> &'static str {
        self.node(id).type_name()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn array_len(&self, id: DatumId) -> Option<usize> {
        match self.node(id) {
            DatumNode::Array(items) => Some(items.len()),
            _ => None,
        }
    }

    pub(crate) fn array_item(&self, id: DatumId, index: usize) -> DatumId {
        match self.node(id) {
            DatumNode::Array(items) => items[index],
            other => panic!("expected an array datum, found {}", other.type_name()),
        }
    }

    pub(crate) fn object_len(&self, id: DatumId) -> Option<usize> {
        match self.node(id) {
            DatumNode::Object(members) => Some(members.len()),
            _ => None,
        }
    }

    pub(crate) fn object_member(&self, id: DatumId, index: usize) -> (&str, DatumId) {
        match self.node(id) {
            DatumNode::Object(members) => {
                let (key, value) = &members[index];
                (key.as_ref(), *value)
            }
            other => panic!("expected an object datum, found {}", other.type_name()),
        }
    }
}

/// Borrowed view of one datum and its descendants.
#[derive(Clone, Copy)]
pub struct DatumRef<'d, 'a> {
    doc: &'d Document<'a>,
    id: DatumId,
}

impl<'d, 'a> DatumRef<'d, 'a> {
    #[inline]
    pub fn id(&self) -> DatumId {
        self.id
    }

    #[inline]
    pub fn node(&self) -> &'d DatumNode<'a> {
        self.doc.node(self.id)
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.node().type_name()
    }

    pub fn is_null(&self) -> bool {
        matches!(self.node(), DatumNode::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.node() {
            DatumNode::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self.node() {
            DatumNode::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&'d str> {
        match self.node() {
            DatumNode::String(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    /// Elements of an array datum; empty for any other type.
    pub fn elements(self) -> impl Iterator<Item = DatumRef<'d, 'a>> {
        let doc = self.doc;
        match self.node() {
            DatumNode::Array(items) => {
                Either::Left(items.iter().map(move |&id| DatumRef { doc, id }))
            }
            _ => Either::Right(std::iter::empty()),
        }
    }

    /// Members of an object datum in document order; empty for any other type.
    pub fn members(self) -> impl Iterator<Item = (&'d str, DatumRef<'d, 'a>)> {
        let doc = self.doc;
        match self.node() {
            DatumNode::Object(members) => Either::Left(
                members
                    .iter()
                    .map(move |(key, id)| (key.as_ref(), DatumRef { doc, id: *id })),
            ),
            _ => Either::Right(std::iter::empty()),
        }
    }

    /// First member named `name` of an object datum.
    pub fn field(&self, name: &str) -> Option<DatumRef<'d, 'a>> {
        self.members()
            .find_map(|(key, value)| (key == name).then_some(value))
    }

    /// `true` when no array appears anywhere in this datum.
    pub fn is_array_free(&self) -> bool {
        match self.node() {
            DatumNode::Array(_) => false,
            DatumNode::Object(_) => self.members().all(|(_, value)| value.is_array_free()),
            _ => true,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self.node() {
            DatumNode::Null => serde_json::Value::Null,
            DatumNode::Bool(b) => serde_json::Value::Bool(*b),
            DatumNode::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            DatumNode::String(s) => serde_json::Value::String(s.to_string()),
            DatumNode::Array(_) => {
                serde_json::Value::Array(self.elements().map(|item| item.to_json()).collect())
            }
            DatumNode::Object(_) => serde_json::Value::Object(
                self.members()
                    .map(|(key, value)| (key.to_string(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

/// Structural equality: same shape, same scalars, same member order.
impl PartialEq for DatumRef<'_, '_> {
    fn eq(&self, other: &Self) -> bool {
        match (self.node(), other.node()) {
            (DatumNode::Null, DatumNode::Null) => true,
            (DatumNode::Bool(a), DatumNode::Bool(b)) => a == b,
            (DatumNode::Number(a), DatumNode::Number(b)) => a.to_bits() == b.to_bits() || a == b,
            (DatumNode::String(a), DatumNode::String(b)) => a == b,
            (DatumNode::Array(a), DatumNode::Array(b)) => {
                a.len() == b.len() && self.elements().zip(other.elements()).all(|(x, y)| x == y)
            }
            (DatumNode::Object(a), DatumNode::Object(b)) => {
                a.len() == b.len()
                    && self
                        .members()
                        .zip(other.members())
                        .all(|((ka, va), (kb, vb))| ka == kb && va == vb)
            }
            _ => false,
        }
    }
}

impl fmt::Debug for DatumRef<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for DatumRef<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

impl Serialize for DatumRef<'_, '_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.node() {
            DatumNode::Null => serializer.serialize_unit(),
            DatumNode::Bool(b) => serializer.serialize_bool(*b),
            DatumNode::Number(n) => serialize_number(*n, serializer),
            DatumNode::String(s) => serializer.serialize_str(s),
            DatumNode::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in self.elements() {
                    seq.serialize_element(&item)?;
                }
                seq.end()
            }
            DatumNode::Object(members) => {
                let mut map = serializer.serialize_map(Some(members.len()))?;
                for (key, value) in self.members() {
                    map.serialize_entry(key, &value)?;
                }
                map.end()
            }
        }
    }
}

/// Integral values are written without a fractional part, matching what clients send.
/// Negative zero keeps its sign.
pub(crate) fn serialize_number<S: Serializer>(
    n: f64,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let negative_zero = n == 0.0 && n.is_sign_negative();
    if n.fract() == 0.0 && n.abs() < (1u64 << 53) as f64 && !negative_zero {
        serializer.serialize_i64(n as i64)
    } else {
        serializer.serialize_f64(n)
    }
}

struct NodeSeed<'d, 'a> {
    doc: &'d mut Document<'a>,
}

impl<'de> DeserializeSeed<'de> for NodeSeed<'_, 'de> {
    type Value = DatumId;

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for NodeSeed<'_, 'de> {
    type Value = DatumId;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<DatumId, E> {
        Ok(self.doc.push(DatumNode::Null))
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<DatumId, E> {
        Ok(self.doc.push(DatumNode::Null))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<DatumId, E> {
        Ok(self.doc.push(DatumNode::Bool(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<DatumId, E> {
        Ok(self.doc.push(DatumNode::Number(v as f64)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<DatumId, E> {
        Ok(self.doc.push(DatumNode::Number(v as f64)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<DatumId, E> {
        Ok(self.doc.push(DatumNode::Number(v)))
    }

    fn visit_borrowed_str<E: de::Error>(self, v: &'de str) -> std::result::Result<DatumId, E> {
        Ok(self.doc.push(DatumNode::String(Cow::Borrowed(v))))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<DatumId, E> {
        Ok(self.doc.push(DatumNode::String(Cow::Owned(v.to_owned()))))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<DatumId, E> {
        Ok(self.doc.push(DatumNode::String(Cow::Owned(v))))
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<DatumId, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let doc = self.doc;
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element_seed(NodeSeed { doc: &mut *doc })? {
            items.push(item);
        }
        Ok(doc.push(DatumNode::Array(items)))
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<DatumId, A::Error>
    where
        A: MapAccess<'de>,
    {
        let doc = self.doc;
        let mut members = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some(key) = map.next_key_seed(KeySeed)? {
            let value = map.next_value_seed(NodeSeed { doc: &mut *doc })?;
            members.push((key, value));
        }
        Ok(doc.push(DatumNode::Object(members)))
    }
}

struct KeySeed;

impl<'de> DeserializeSeed<'de> for KeySeed {
    type Value = Cow<'de, str>;

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(self)
    }
}

impl<'de> Visitor<'de> for KeySeed {
    type Value = Cow<'de, str>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object key")
    }

    fn visit_borrowed_str<E: de::Error>(self, v: &'de str) -> std::result::Result<Self::Value, E> {
        Ok(Cow::Borrowed(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Self::Value, E> {
        Ok(Cow::Owned(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Self::Value, E> {
        Ok(Cow::Owned(v))
    }
}
