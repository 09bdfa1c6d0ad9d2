use qlterm::backtrace::Frame;
use qlterm::prelude::*;

fn start(text: &str) -> Result<Query<'_>, Error> {
    Query::parse(1, text.as_bytes(), &FrontendConfig::default())
}

#[test]
fn two_optarg_blocks_are_rejected() {
    let err = start(r#"[1, [24, {"a": 1}, {"b": 2}]]"#).unwrap_err();
    assert!(err.is_two_optarg_sets(), "{err:?}");
    assert_eq!(err.to_string(), "Found two sets of optional arguments.");
    assert_eq!(err.backtrace(), BacktraceId::HEAD);
}

#[test]
fn duplicate_keys_name_the_key() {
    let err = start(r#"[1, [24, [1, 2], {"a": 1, "a": 2}]]"#).unwrap_err();
    assert_eq!(err.to_string(), r#"Duplicate key "a" in object.  (got a twice)"#);

    // Pure data objects are checked too.
    let err = start(r#"[1, [2, [{"k": 1, "k": 1}]]]"#).unwrap_err();
    assert!(matches!(err, Error::DuplicateKey { ref key, .. } if key == "k"), "{err:?}");
}

#[test]
fn unrecognized_global_optarg() {
    let err = start(r#"[1, 1, {"bogus_key": true}]"#).unwrap_err();
    assert_eq!(
        err,
        Error::UnrecognizedOptarg {
            key: "bogus_key".to_string(),
            bt: BacktraceId::EMPTY,
        }
    );
}

#[test]
fn now_is_identical_within_a_query() {
    let query = start("[1, [2, [[103], [24, [[103], 0]]]]]").unwrap();
    let root = query.root().unwrap();
    let first = root.arg(0);
    let second = root.arg(1).arg(0);

    assert!(first.is_literal() && second.is_literal());
    assert_eq!(first.literal().unwrap().id(), second.literal().unwrap().id());
    let epoch = first.literal().unwrap().field("epoch_time").unwrap().as_number().unwrap();
    assert_eq!(
        epoch.to_bits(),
        second.literal().unwrap().field("epoch_time").unwrap().as_number().unwrap().to_bits()
    );
}

#[test]
fn now_with_arguments_is_not_folded() {
    let query = start(r#"[1, [103, [], {"x": 1}]]"#).unwrap();
    assert_eq!(query.root().unwrap().kind(), TermKind::Now);
}

#[test]
fn update_placement() {
    let update = r#"[53, [[15, ["t"]], {"done": true}]]"#;
    start(&format!("[1, {update}]")).unwrap();

    let in_map = format!(r#"[1, [38, [[15, ["t"]], [69, [[2, [1]], {update}]]]]]"#);
    let err = start(&in_map).unwrap_err();
    assert!(err.is_nested_write(), "{err:?}");
    assert_eq!(
        err.to_string(),
        "Cannot nest writes or meta ops in stream operations.  Use FOR_EACH instead."
    );
}

#[test]
fn writes_cannot_hide_behind_a_datum_opcode() {
    let update = r#"[53, [[15, ["t"]], {}]]"#;
    let hidden = format!(r#"[1, [38, [[15, ["t"]], [69, [[2, [1]], [1, [{update}]]]]]]]"#);
    let err = start(&hidden).unwrap_err();
    assert!(err.is_explicit_datum(), "{err:?}");

    let query = start(r#"[1, [2, [[1, [true]]]]]"#);
    let err = query.unwrap_err();
    assert_eq!(
        err.to_string(),
        "DATUM terms cannot be written in term form.  Write the value itself instead."
    );
}

#[test]
fn error_positions_resolve_to_paths() {
    let text = r#"[38, [[15, ["t"]], [69, [[2, [1]], [53, [[15, ["t"]], {}]]]]]]"#;
    let (document, root) = Document::parse(text.as_bytes()).unwrap();
    let mut tree = TermTree::from_document(document);
    let source = tree.build(root, BacktraceId::HEAD, &FrontendConfig::default()).unwrap();
    let err = validate(&mut tree, source).unwrap_err();
    assert_eq!(
        tree.backtraces().resolve(err.backtrace()),
        vec![Frame::Arg(1), Frame::Arg(1)]
    );
}

#[test]
fn asc_placement() {
    start(r#"[1, [41, [[15, ["t"]], [73, ["age"]]]]]"#).unwrap();

    let err = start(r#"[1, [39, [[15, ["t"]], [73, ["age"]]]]]"#).unwrap_err();
    assert!(err.is_misplaced_ordering(), "{err:?}");
    let err = start(r#"[1, [41, [[15, ["t"]], [24, [[74, ["age"]], 1]]]]]"#).unwrap_err();
    assert_eq!(err.to_string(), "DESC may only be used as an argument to ORDER_BY.");
}

#[test]
fn default_database_is_synthesized_once() {
    let query = start("[1, [15, [\"t\"]]]").unwrap();
    let db = query.global_optarg("db").unwrap();
    assert_eq!(db.arg(0).literal().unwrap().as_str(), Some("test"));
    assert!(db.backtrace().is_empty());

    let query = start(r#"[1, [15, ["t"]], {"db": [14, ["prod"]]}]"#).unwrap();
    let db = query.global_optarg("db").unwrap();
    assert_eq!(db.arg(0).literal().unwrap().as_str(), Some("prod"));
    assert_eq!(query.optargs().len(), 1);

    let config = FrontendConfig {
        default_database: "analytics".to_string(),
        ..FrontendConfig::default()
    };
    let query = Query::parse(2, b"[1, 1]", &config).unwrap();
    let db = query.global_optarg("db").unwrap();
    assert_eq!(db.arg(0).literal().unwrap().as_str(), Some("analytics"));
}

#[test]
fn optargs_are_zero_parameter_functions() {
    let query = start(r#"[1, 1, {"profile": true, "array_limit": [24, [1, 2]]}]"#).unwrap();
    assert!(query.profile());
    assert!(!query.noreply());

    for (name, source) in query.optargs().iter() {
        let wrapper = query.tree().term(source);
        assert_eq!(wrapper.kind(), TermKind::Func, "{name}");
        assert_eq!(wrapper.arg(0).num_args(), 0, "{name}");
    }
    let limit = query.global_optarg("array_limit").unwrap();
    assert_eq!(limit.kind(), TermKind::Add);
    // Optarg values are not part of the client term, so they carry no position.
    assert!(limit.backtrace().is_empty());
}

#[test]
fn writes_are_not_allowed_in_functional_optargs() {
    let query = r#"[1, [38, [[15, ["t"]]], {"default": [54, [[15, ["t"]]]]}]]"#;
    assert!(start(query).unwrap_err().is_nested_write());
}

#[test]
fn noreply_queries_are_ordered() {
    let mut ids = QueryIdGenerator::new();
    let mut first = start(r#"[1, 1, {"noreply": true}]"#).unwrap();
    let mut second = start(r#"[1, 2, {"noreply": true}]"#).unwrap();
    let a = first.assign_id(&mut ids);
    let b = second.assign_id(&mut ids);

    let wait = start("[4]").unwrap();
    assert!(wait.kind().is_noreply_wait());
    let barrier = ids.wait_for(ids.next_id());

    ids.release(a);
    assert_eq!(ids.lowest_outstanding(), b.value());
    assert!(barrier.try_recv().is_err());
    ids.release(b);
    assert_eq!(ids.lowest_outstanding(), ids.next_id());
    assert!(barrier.try_recv().is_ok());
}

#[test]
fn too_deep_terms_are_rejected() {
    let config = FrontendConfig {
        max_term_depth: 4,
        ..FrontendConfig::default()
    };
    let deep = "[1, [23, [[23, [[23, [[23, [[23, [true]]]]]]]]]]]";
    let err = Query::parse(3, deep.as_bytes(), &config).unwrap_err();
    assert!(matches!(err, Error::TermTooDeep { max: 4, .. }), "{err:?}");

    let shallow = "[1, [23, [[23, [true]]]]]";
    Query::parse(3, shallow.as_bytes(), &config).unwrap();
}
