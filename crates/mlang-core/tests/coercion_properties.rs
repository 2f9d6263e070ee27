//! Preorder properties of structural coercion over generated type trees.

use mlang_core::{TypeError, TypeTree, coerce, is_subtype};
use proptest::prelude::*;

/// `a <= b`, with pairings no rule covers counted as unrelated.
fn le(a: &TypeTree, b: &TypeTree) -> bool {
    match is_subtype(a, b) {
        Ok(related) => related,
        Err(TypeError::UnhandledPairing { .. }) => false,
        Err(err) => panic!("{a} <= {b}: {err}"),
    }
}

fn arb_leaf() -> impl Strategy<Value = TypeTree> {
    prop_oneof![
        Just(TypeTree::Int),
        Just(TypeTree::Real),
        Just(TypeTree::Bool),
        Just(TypeTree::Char),
        (-3i64..3, 0i64..4).prop_map(|(l, d)| TypeTree::bounded(l, l + d).unwrap()),
        prop_oneof![Just("Color"), Just("Shape")].prop_map(|alias| TypeTree::enumeration(alias)),
    ]
}

fn arb_type() -> impl Strategy<Value = TypeTree> {
    arb_leaf().prop_recursive(3, 24, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(TypeTree::tuple),
            prop::collection::vec(inner.clone(), 0..3).prop_map(TypeTree::union),
            (0usize..3, inner.clone()).prop_map(|(n, e)| TypeTree::array(n, e).unwrap()),
            inner.clone().prop_map(TypeTree::list),
            (inner.clone(), inner.clone()).prop_map(|(k, v)| TypeTree::map(k, v)),
            prop::collection::vec((any::<bool>(), inner), 3).prop_map(|slots| {
                let fields = ["a", "b", "c"]
                    .into_iter()
                    .zip(slots)
                    .filter(|(_, (keep, _))| *keep)
                    .map(|(name, (_, ty))| (name, ty));
                TypeTree::structure(fields).unwrap()
            }),
        ]
    })
}

proptest! {
    #[test]
    fn coercion_is_reflexive(t in arb_type()) {
        prop_assert!(is_subtype(&t, &t).unwrap(), "{} is not a subtype of itself", t);
    }

    #[test]
    fn coercion_is_transitive(a in arb_type(), b in arb_type(), c in arb_type()) {
        if le(&a, &b) && le(&b, &c) {
            prop_assert!(le(&a, &c), "{} <= {} <= {} but not {} <= {}", a, b, c, a, c);
        }
    }

    #[test]
    fn transitive_through_widening(a in arb_type()) {
        // a <= union(a) <= union(char, union(a))
        let b = TypeTree::union(vec![a.clone()]);
        let c = TypeTree::union(vec![TypeTree::Char, b.clone()]);
        prop_assert!(le(&a, &b));
        prop_assert!(le(&b, &c));
        prop_assert!(le(&a, &c));
    }

    #[test]
    fn resolved_types_fail_only_on_uncovered_pairings(a in arb_type(), b in arb_type()) {
        if let Err(err) = coerce(&a, &b) {
            prop_assert!(matches!(err, TypeError::UnhandledPairing { .. }), "{} to {}: {}", a, b, err);
            prop_assert!(a.to_string().contains("array"), "{} has no array but {} is uncovered", a, err);
        }
    }

    #[test]
    fn coercion_is_deterministic(a in arb_type(), b in arb_type()) {
        let first = coerce(&a, &b);
        for _ in 0..3 {
            prop_assert_eq!(&coerce(&a, &b), &first);
        }
    }
}
