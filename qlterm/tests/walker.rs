use qlterm::prelude::*;

fn parse(text: &str) -> TermTree<'_> {
    TermTree::parse(text.as_bytes(), &FrontendConfig::default()).unwrap()
}

#[test]
fn visits_in_pre_order() {
    let tree = parse(r#"[24, [[25, [1, 2]], 3], {"z": 4}]"#);
    let mut seen = Vec::new();
    walk_no_input(tree.root().unwrap(), |node| {
        seen.push(match node.literal() {
            Some(value) => value.to_string(),
            None => node.kind().name().to_string(),
        });
        node.schedule_children();
    });
    assert_eq!(seen, ["ADD", "SUB", "1", "2", "3", "4"]);
}

#[test]
fn input_is_threaded_per_child() {
    let tree = parse("[24, [[25, [[26, [1, 2]], 3]], 4]]");
    let mut max_depth = 0;
    let mut literal_depths = Vec::new();
    walk(tree.root().unwrap(), 0usize, |depth, node| {
        max_depth = max_depth.max(depth);
        if node.is_literal() {
            literal_depths.push(depth);
        }
        node.schedule_children_with(depth + 1);
    });
    assert_eq!(max_depth, 3);
    assert_eq!(literal_depths, [3, 3, 2, 1]);
}

#[test]
fn handles_know_their_parent_and_name() {
    let tree = parse(r#"[41, [[15, ["t"]]], {"index": [74, ["id"]]}]"#);
    let mut checked = false;
    walk_no_input(tree.root().unwrap(), |node| {
        if node.is_root() {
            assert!(node.parent().is_none());
        }
        if node.kind() == TermKind::Desc {
            assert_eq!(node.optarg_name(), Some("index"));
            assert_eq!(node.parent().map(|p| p.kind()), Some(TermKind::OrderBy));
            checked = true;
        }
        node.schedule_children();
    });
    assert!(checked);
}

#[test]
fn unscheduled_children_are_skipped() {
    // Only descend into the first argument of each node.
    let tree = parse("[24, [[25, [1, 2]], [26, [3, 4]]]]");
    let mut literals = Vec::new();
    walk_no_input(tree.root().unwrap(), |node| {
        if let Some(value) = node.literal() {
            literals.push(value.as_number().unwrap());
        } else if node.num_args() > 0 {
            node.schedule_visit(node.arg(0), ());
        }
    });
    assert_eq!(literals, [1.0]);
}

#[test]
fn synthesized_terms_are_walked_like_parsed_ones() {
    let mut tree = TermTree::new();
    let mut r = Minidriver::new(&mut tree, BacktraceId::EMPTY);
    let x = r.fresh_var();
    let row = r.var(x);
    let age = r.get_field(row, "age");
    let limit = r.number(18.0);
    let body = r.ge(age, limit);
    let function = r.fun1(x, body).source();

    validate(&mut tree, function).unwrap();
    let root = tree.term(function);

    let mut kinds = Vec::new();
    walk_no_input(root, |node| {
        kinds.push(node.kind());
        node.schedule_children();
    });
    assert_eq!(
        kinds,
        [
            TermKind::Func,
            TermKind::MakeArray,
            TermKind::Datum,
            TermKind::Ge,
            TermKind::GetField,
            TermKind::Var,
            TermKind::Datum,
            TermKind::Datum,
            TermKind::Datum,
        ]
    );
}
