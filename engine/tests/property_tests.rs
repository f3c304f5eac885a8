// Property-based tests for engine invariants.
//
// Three categories:
// 1. Value-type algebra: compatibility reflexivity, union/void laws,
//    generic specialization identities
// 2. Stream chains: depth monotonicity and order-consistency over
//    generated nesting depths
// 3. Definition round-trips: typedef JSON conversion stability
//
// Uses proptest with explicit configuration to prevent CI flakiness.

use proptest::prelude::*;

use bpe::compat::types_compatible;
use bpe::graph::BlueprintGraph;
use bpe::port::Direction;
use bpe::typedef::TypeDef;
use bpe::types::ValueType;

// ── Generators ──────────────────────────────────────────────────────────────

fn arb_value_type() -> impl Strategy<Value = ValueType> {
    let leaf = prop_oneof![
        Just(ValueType::Number),
        Just(ValueType::Binary),
        Just(ValueType::Boolean),
        Just(ValueType::String),
        Just(ValueType::Trigger),
        Just(ValueType::Primitive),
        "[a-z][a-z0-9]{0,3}".prop_map(ValueType::Generic),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            inner.clone().prop_map(ValueType::stream),
            prop::collection::btree_map("[a-z][a-z0-9]{0,3}", inner, 1..4).prop_map(|entries| {
                let mut map = ValueType::map();
                for (name, sub) in entries {
                    map.add_map_sub(name, sub).expect("names unique by construction");
                }
                map
            }),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    // ── Value-type algebra ──

    #[test]
    fn compatibility_is_reflexive(ty in arb_value_type()) {
        prop_assert!(types_compatible(&ty, &ty));
    }

    #[test]
    fn union_with_itself_preserves_compatibility(ty in arb_value_type()) {
        if let Ok(merged) = ty.union(&ty) {
            // The merge may drop void entries but never breaks feeding
            // the original shape's remaining entries.
            prop_assert!(types_compatible(&ty, &merged));
            prop_assert_eq!(merged.is_void(), ty.is_void());
        }
    }

    #[test]
    fn union_is_commutative_for_maps(a in arb_value_type(), b in arb_value_type()) {
        let left = a.union(&b);
        let right = b.union(&a);
        prop_assert_eq!(left.is_ok(), right.is_ok());
        if let (Ok(left), Ok(right)) = (left, right) {
            prop_assert_eq!(left.is_void(), right.is_void());
        }
    }

    #[test]
    fn empty_specialization_is_identity(ty in arb_value_type()) {
        let specified = ty.specify_generics(&std::collections::HashMap::new());
        prop_assert_eq!(specified, ty);
    }

    #[test]
    fn trigger_accepts_everything(ty in arb_value_type()) {
        prop_assert!(types_compatible(&ty, &ValueType::Trigger));
    }

    // ── Stream chains ──

    #[test]
    fn depth_decreases_by_one_toward_the_root(levels in 1u32..12) {
        let mut ty = ValueType::Number;
        for _ in 0..levels {
            ty = ValueType::stream(ty);
        }
        let mut g = BlueprintGraph::new("prop");
        let op = g.add_operator("op", false);
        let root = g.create_port(op, "in", &ty, Direction::In);
        g.initialize_owner(op).unwrap();

        let mut port = root;
        let mut expected = 1;
        loop {
            prop_assert_eq!(g.stream_depth_of(port), expected);
            match g.port(port).stream_child() {
                Some(child) => {
                    port = child;
                    expected += 1;
                }
                None => break,
            }
        }
        prop_assert_eq!(expected, levels + 1);
    }

    // ── Definition round-trips ──

    #[test]
    fn typedef_round_trip_is_stable(ty in arb_value_type()) {
        let def = TypeDef::from_value_type(&ty);
        let back = def.to_value_type().unwrap();
        prop_assert_eq!(&back, &ty);
        // Canonical JSON is stable across a second round trip.
        let def2 = TypeDef::from_value_type(&back);
        prop_assert_eq!(def.canonical_json(), def2.canonical_json());
    }
}
