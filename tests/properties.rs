use abfc::{
    expand::Rules,
    ir::{Node, Tag},
    pattern::Pattern,
    sugar::*,
};

use proptest::prelude::*;

const NAMES: &[&str] = &["a", "b", "c", "tmp"];

fn cell() -> impl Strategy<Value = &'static str> {
    prop::sample::select(NAMES)
}

fn statement() -> impl Strategy<Value = Node> {
    let leaf = prop_oneof![
        cell().prop_map(local),
        (0i64..256, cell()).prop_map(|(n, dst)| constant_add(n, dst)),
        (cell(), cell()).prop_map(|(src, dst)| copy(src, dst)),
        cell().prop_map(|dst| call("user", vec![dst.into()])),
    ];

    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            (cell(), prop::collection::vec(inner.clone(), 0..4))
                .prop_map(|(cond, body)| if_(cond, body)),
            (cell(), prop::collection::vec(inner, 0..4))
                .prop_map(|(cond, body)| while_(cond, body)),
        ]
    })
}

fn body() -> impl Strategy<Value = Vec<Node>> {
    prop::collection::vec(statement(), 0..8)
}

fn patterns() -> Vec<Pattern> {
    vec![
        Pattern::Bind("any"),
        Pattern::expr(Tag::Local, vec![Pattern::Bind("name")]),
        Pattern::expr(
            Tag::If,
            vec![
                Pattern::expr(Tag::Arguments, vec![Pattern::Bind("cond")]),
                Pattern::cons(Pattern::tag(Tag::Body), Pattern::Bind("body")),
            ],
        ),
        Pattern::cons(Pattern::Discard, Pattern::Bind("children")),
        Pattern::Seq(vec![Pattern::tag(Tag::While), Pattern::Discard]),
    ]
}

proptest! {
    #[test]
    fn matching_is_deterministic(node in statement()) {
        let copy = node.clone();
        for pattern in patterns() {
            prop_assert_eq!(pattern.matches(&node), pattern.matches(&node));
            prop_assert_eq!(pattern.matches(&node), pattern.matches(&copy));
        }
    }

    #[test]
    fn fixed_point_is_idempotent(body in body()) {
        let rules = Rules::standard().unwrap();
        let (expanded, rounds) = rules.fixed_point(body, 256).unwrap().unwrap();
        prop_assert!(rounds >= 1);

        let (again, changed) = rules.round(expanded.clone()).unwrap();
        prop_assert!(!changed);
        prop_assert_eq!(&again, &expanded);

        let sugared = [Tag::Local, Tag::If, Tag::While];
        prop_assert!(!expanded
            .iter()
            .any(|node| sugared.iter().any(|&tag| node.is(tag))));
    }
}
