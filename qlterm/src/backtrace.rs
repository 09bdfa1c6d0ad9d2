//! Compact positions for error reporting.
//!
//! Every term built from a client document is tagged with a [`BacktraceId`]: an
//! index into an append-only [`BacktraceRegistry`] where each entry records the
//! parent position and a single step ([`Frame`]) from that parent. The full path
//! from the query root is rebuilt on demand by walking parents, so no term ever
//! stores a path string.
//!
//! Two ids are reserved:
//! - [`BacktraceId::EMPTY`] marks synthesized terms the client never wrote. Frames
//!   derived from it stay empty.
//! - [`BacktraceId::HEAD`] is the root term of a client query.
use std::fmt;

/// Opaque handle into a [`BacktraceRegistry`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BacktraceId(u32);

impl BacktraceId {
    pub const EMPTY: BacktraceId = BacktraceId(0);
    pub const HEAD: BacktraceId = BacktraceId(1);

    #[inline]
    pub const fn empty() -> Self {
        Self::EMPTY
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Raw integer value, as written by the binary codec.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for BacktraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bt#{}", self.0)
    }
}

/// One step from a parent position to a child position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Frame {
    /// The root of a query.
    Head,
    /// Positional argument `i` of the parent term.
    Arg(usize),
    /// Named argument of the parent term.
    Optarg(String),
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Head => write!(f, "<root>"),
            Frame::Arg(i) => write!(f, "{i}"),
            Frame::Optarg(name) => write!(f, "{name:?}"),
        }
    }
}

/// Append-only table of `(parent, step)` entries.
///
/// Ids are indices into the table and are never reused during the registry's lifetime.
#[derive(Debug, Clone)]
pub struct BacktraceRegistry {
    entries: Vec<(BacktraceId, Frame)>,
}

impl Default for BacktraceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BacktraceRegistry {
    pub fn new() -> Self {
        Self {
            // Slot 0 backs EMPTY, slot 1 backs HEAD.
            entries: vec![
                (BacktraceId::EMPTY, Frame::Head),
                (BacktraceId::EMPTY, Frame::Head),
            ],
        }
    }

    /// Register a child position of `parent`.
    ///
    /// Children of [`BacktraceId::EMPTY`] are themselves empty: a synthesized subtree
    /// has no client-visible position anywhere inside it.
    pub fn new_frame(&mut self, parent: BacktraceId, frame: Frame) -> BacktraceId {
        assert!(
            (parent.0 as usize) < self.entries.len(),
            "backtrace {parent} does not belong to this registry"
        );
        if parent.is_empty() {
            return BacktraceId::EMPTY;
        }

        let next = self.entries.len();
        assert!(next < u32::MAX as usize, "backtrace registry exhausted its id space");
        let id = BacktraceId(next as u32);
        self.entries.push((parent, frame));
        id
    }

    /// Rebuild the path from the query root down to `id`.
    ///
    /// The root itself is implied and not part of the returned path; [`BacktraceId::EMPTY`]
    /// and [`BacktraceId::HEAD`] both resolve to an empty path.
    pub fn resolve(&self, id: BacktraceId) -> Vec<Frame> {
        assert!(
            (id.0 as usize) < self.entries.len(),
            "backtrace {id} does not belong to this registry"
        );

        let mut path = Vec::new();
        let mut current = id;
        while current.0 > BacktraceId::HEAD.0 {
            let (parent, frame) = &self.entries[current.0 as usize];
            path.push(frame.clone());
            current = *parent;
        }
        path.reverse();
        path
    }

    /// Parent position of `id`, if it has one.
    pub fn parent(&self, id: BacktraceId) -> Option<BacktraceId> {
        if id.0 <= BacktraceId::HEAD.0 {
            return None;
        }
        self.entries.get(id.0 as usize).map(|(parent, _)| *parent)
    }

    /// Number of registered positions, reserved slots included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 2
    }
}
