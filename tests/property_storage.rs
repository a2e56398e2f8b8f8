//! Property-based storage tests (proptest): tries against a set model,
//! iterator monotonicity against the sorted key list.

use proptest::prelude::*;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use deltaleap::{Atom, IteratorFactory, RelationTrie, Tuple};

fn pair(a: u8, b: u8) -> Tuple {
    Tuple::new(vec![Atom::Int(a as i64), Atom::Int(b as i64)])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// A trie under random inserts and removes behaves like a set of
    /// tuples, and its level enumerations match the model's projections.
    #[test]
    fn prop_trie_matches_set_model(
        ops in prop::collection::vec((any::<bool>(), 0u8..5, 0u8..5), 0..64),
    ) {
        let mut trie = RelationTrie::new(2);
        let mut model: BTreeSet<(u8, u8)> = BTreeSet::new();

        for (insert, a, b) in ops {
            let tuple = pair(a, b);
            if insert {
                prop_assert_eq!(trie.insert(&tuple), model.insert((a, b)));
            } else {
                prop_assert_eq!(trie.remove(&tuple), model.remove(&(a, b)));
            }

            prop_assert_eq!(trie.len(), model.len());
            for x in 0..5u8 {
                for y in 0..5u8 {
                    prop_assert_eq!(trie.contains(&pair(x, y)), model.contains(&(x, y)));
                }
            }

            // Level 0: distinct first coordinates, ascending.
            let firsts: Vec<Atom> = model
                .iter()
                .map(|(a, _)| Atom::Int(*a as i64))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            prop_assert_eq!(trie.sorted_atoms(&Tuple::empty()), firsts);

            // Level 1 below every bound prefix.
            for x in 0..5u8 {
                let seconds: Vec<Atom> = model
                    .iter()
                    .filter(|(a, _)| *a == x)
                    .map(|(_, b)| Atom::Int(*b as i64))
                    .collect();
                let prefix = Tuple::new(vec![Atom::Int(x as i64)]);
                prop_assert_eq!(trie.sorted_atoms(&prefix), seconds);
            }
        }
    }

    /// From a rewind, interleaved `seek_ge` calls with non-decreasing keys
    /// and `next` calls visit a strictly increasing subsequence of the
    /// level's atoms.
    #[test]
    fn prop_iterator_visits_increasing_subsequence(
        keys in prop::collection::btree_set(0i64..64, 1..32),
        mut seeks in prop::collection::vec(0i64..64, 0..24),
        advance in any::<bool>(),
    ) {
        let mut trie = RelationTrie::new(1);
        for k in &keys {
            trie.insert(&Tuple::new(vec![Atom::Int(*k)]));
        }
        let mut factory = IteratorFactory::new();
        factory.register_trie("r", Rc::new(RefCell::new(trie)));
        let mut iter = factory.level_iter("r", 0, &Tuple::empty()).unwrap();

        seeks.sort_unstable();
        iter.seek_ge(None);

        let mut visited: Vec<i64> = Vec::new();
        for target in seeks {
            iter.seek_ge(Some(&Atom::Int(target)));
            if let Some(Atom::Int(k)) = iter.current().cloned() {
                prop_assert!(k >= target, "seek_ge landed below the target");
                if visited.last() != Some(&k) {
                    visited.push(k);
                }
                if advance {
                    iter.next();
                }
            }
        }

        // Strictly increasing, and every visited atom is a stored key.
        for w in visited.windows(2) {
            prop_assert!(w[0] < w[1]);
        }
        for k in &visited {
            prop_assert!(keys.contains(k));
        }
    }
}
