//! Stored secondary-index functions.
//!
//! A client's index function is parsed as a standalone function body, encoded in the
//! current format and handed to storage. Storage later gives the bytes back together with
//! the version they were written in; [`SindexCache`] decodes each index once and shares
//! the result. Bytes that no longer decode are corruption and crash the process.
use std::{collections::HashMap, sync::Arc};

use log::warn;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::{
    config::FrontendConfig,
    encoding::{self, FormatVersion},
    error::Result,
    term::{Term, TermKind, TermSource, TermTree},
    walker,
};

/// A decoded, validated index function.
#[derive(Debug)]
pub struct SindexFunction {
    tree: TermTree<'static>,
    root: TermSource,
    version: FormatVersion,
}

impl SindexFunction {
    /// Turn the wire form of an index function into the bytes storage keeps.
    ///
    /// Those bytes are in [`FormatVersion::CURRENT`].
    pub fn prepare(wire: &[u8], config: &FrontendConfig) -> Result<Vec<u8>> {
        let tree = TermTree::parse_function(wire, config)?;
        let root = tree.root().map(encoding::encode).unwrap_or_default();
        Ok(root)
    }

    /// Decode persisted bytes.
    ///
    /// # Panics
    /// When the bytes do not decode, or do not hold a valid function.
    pub fn decode(bytes: &[u8], version: FormatVersion) -> Self {
        let mut tree = encoding::decode_or_crash(bytes, version);
        let root = match tree.root_source() {
            Some(root) => root,
            None => unreachable!("decoded trees always have a root"),
        };

        let kind = tree.term(root).kind();
        if kind != TermKind::Func {
            warn!("Stored index function decoded to a {} term", kind.name());
            panic!("stored index function is a {} term, not FUNC", kind.name());
        }
        if let Err(err) = tree.term(root).check_function() {
            warn!("Stored index function has a broken shape: {err}");
            panic!("stored index function is malformed: {err}");
        }
        if let Err(err) = walker::validate(&mut tree, root) {
            warn!("Stored index function no longer validates: {err}");
            panic!("stored index function is invalid: {err}");
        }

        Self {
            tree,
            root,
            version,
        }
    }

    pub fn tree(&self) -> &TermTree<'static> {
        &self.tree
    }

    /// The `FUNC` term.
    pub fn function(&self) -> Term<'_, 'static> {
        self.tree.term(self.root)
    }

    /// The function body, evaluated once per document.
    pub fn body(&self) -> Term<'_, 'static> {
        self.function().arg(1)
    }

    /// Number of parameters the function declares.
    pub fn arity(&self) -> usize {
        self.function().arg(0).num_args()
    }

    /// Version the bytes were written in. Anything older than current should be rewritten.
    pub fn version(&self) -> FormatVersion {
        self.version
    }

    /// Re-encode in the current format.
    pub fn encode(&self) -> Vec<u8> {
        encoding::encode(self.function())
    }
}

/// Decoded index functions keyed by index id, shared between threads.
#[derive(Debug, Default)]
pub struct SindexCache {
    entries: Mutex<HashMap<Uuid, Arc<SindexFunction>>>,
}

impl SindexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The function of index `id`, decoding `bytes` on first use.
    ///
    /// # Panics
    /// See [`SindexFunction::decode`].
    pub fn get_or_decode(&self, id: Uuid, bytes: &[u8], version: FormatVersion) -> Arc<SindexFunction> {
        let mut entries = self.entries.lock();
        entries
            .entry(id)
            .or_insert_with(|| Arc::new(SindexFunction::decode(bytes, version)))
            .clone()
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<SindexFunction>> {
        self.entries.lock().get(id).cloned()
    }

    /// Forget index `id`, for instance after it was dropped or rewritten.
    pub fn invalidate(&self, id: &Uuid) -> bool {
        self.entries.lock().remove(id).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // fun(x) { x("age") }
    const AGE: &[u8] = br#"[69, [[2, [1]], [31, [[10, [1]], "age"]]]]"#;

    fn prepared() -> Vec<u8> {
        SindexFunction::prepare(AGE, &FrontendConfig::default()).unwrap()
    }

    #[test]
    fn prepared_bytes_decode_back() {
        let function = SindexFunction::decode(&prepared(), FormatVersion::CURRENT);
        assert_eq!(function.arity(), 1);
        assert_eq!(function.body().kind(), TermKind::GetField);
        assert!(function.function().backtrace().is_empty());
        assert_eq!(function.encode(), prepared());
    }

    #[test]
    fn only_functions_can_be_prepared() {
        let err = SindexFunction::prepare(br#"[31, [[10, [1]], "age"]]"#, &FrontendConfig::default())
            .unwrap_err();
        assert!(err.is_expected_type(), "{err:?}");
    }

    #[test]
    fn cache_decodes_once() {
        let cache = SindexCache::new();
        let id = Uuid::new_v4();
        let bytes = prepared();

        let first = cache.get_or_decode(id, &bytes, FormatVersion::CURRENT);
        // Garbage is never looked at once the entry exists.
        let second = cache.get_or_decode(id, b"garbage", FormatVersion::CURRENT);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        assert!(cache.invalidate(&id));
        assert!(!cache.invalidate(&id));
        assert!(cache.get(&id).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn cache_is_shared_between_threads() {
        let cache = Arc::new(SindexCache::new());
        let id = Uuid::new_v4();
        let bytes = Arc::new(prepared());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let bytes = Arc::clone(&bytes);
                std::thread::spawn(move || cache.get_or_decode(id, &bytes, FormatVersion::CURRENT).arity())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 1);
        }
        assert_eq!(cache.len(), 1);
    }

    #[test]
    #[should_panic(expected = "corrupted v2.2 term tree")]
    fn corrupt_bytes_crash() {
        let mut bytes = prepared();
        bytes.truncate(bytes.len() - 1);
        SindexCache::new().get_or_decode(Uuid::new_v4(), &bytes, FormatVersion::CURRENT);
    }

    #[test]
    fn functions_need_parameters_and_a_body() {
        let config = FrontendConfig::default();
        for wire in [
            &b"[69]"[..],
            b"[69, [[2, [1]]]]",
            b"[69, [1, [10, [1]]]]",
            br#"[69, [[2, ["x"]], [10, [1]]]]"#,
        ] {
            let err = SindexFunction::prepare(wire, &config).unwrap_err();
            assert!(err.is_malformed_function(), "{err:?}");
        }
    }

    #[test]
    #[should_panic(expected = "stored index function is malformed")]
    fn bodiless_functions_crash() {
        let tree = TermTree::parse(b"[69]", &FrontendConfig::default()).unwrap();
        let bytes = encoding::encode(tree.root().unwrap());
        SindexFunction::decode(&bytes, FormatVersion::CURRENT);
    }

    #[test]
    #[should_panic(expected = "not FUNC")]
    fn non_function_bodies_crash() {
        let tree = TermTree::parse(b"[24, [1, 2]]", &FrontendConfig::default()).unwrap();
        let bytes = encoding::encode(tree.root().unwrap());
        SindexFunction::decode(&bytes, FormatVersion::CURRENT);
    }
}
