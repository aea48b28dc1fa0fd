//! Keyed diff: sort the keys of two maps into four buckets.
//!
//! Keys only in the reference map go to `only_in_reference`, keys only in the
//! new map to `only_in_new`, shared keys to `different` or `identical`
//! depending on the supplied equality. Every bucket is ordered by key.

use std::collections::{BTreeMap, BTreeSet};

use tpmig_types::{DiffResult, Different, OnlyInNew, OnlyInReference};

/// Fill the four buckets of `result` from two keyed maps.
pub fn classify<V: Clone>(
    result: &mut DiffResult<V>,
    reference: &BTreeMap<String, V>,
    new: &BTreeMap<String, V>,
    same: impl Fn(&V, &V) -> bool,
) {
    let keys: BTreeSet<&String> = reference.keys().chain(new.keys()).collect();

    for key in keys {
        match (reference.get(key), new.get(key)) {
            (Some(ref_value), None) => result.only_in_reference.push(OnlyInReference {
                key: key.clone(),
                ref_value: ref_value.clone(),
            }),
            (None, Some(new_value)) => result.only_in_new.push(OnlyInNew {
                key: key.clone(),
                new_value: new_value.clone(),
            }),
            (Some(ref_value), Some(new_value)) if !same(ref_value, new_value) => {
                result.different.push(Different {
                    key: key.clone(),
                    ref_value: ref_value.clone(),
                    new_value: new_value.clone(),
                })
            }
            (Some(_), Some(_)) => result.identical.push(key.clone()),
            (None, None) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::values_equal;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    fn make_map(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn run(reference: &BTreeMap<String, Value>, new: &BTreeMap<String, Value>) -> DiffResult {
        let mut result = DiffResult::new("ref", "new");
        classify(&mut result, reference, new, values_equal);
        result
    }

    #[test]
    fn identical_maps_no_changes() {
        let map = make_map(&[("a", json!(1)), ("b", json!("hello"))]);
        let result = run(&map, &map);
        assert!(result.is_clean());
        assert_eq!(result.identical, vec!["a", "b"]);
    }

    #[test]
    fn mixed_changes() {
        let reference = make_map(&[("A", json!(1)), ("B", json!(2))]);
        let new = make_map(&[("B", json!(3)), ("C", json!(4))]);
        let result = run(&reference, &new);

        assert_eq!(result.only_in_reference.len(), 1);
        assert_eq!(result.only_in_reference[0].key, "A");
        assert_eq!(result.only_in_new[0].key, "C");
        assert_eq!(result.different[0].ref_value, json!(2));
        assert_eq!(result.different[0].new_value, json!(3));
        assert!(result.identical.is_empty());
    }

    #[test]
    fn nested_key_order_is_not_a_difference() {
        let reference = make_map(&[("cfg", serde_json::from_str(r#"{"x": 1, "y": 2}"#).unwrap())]);
        let new = make_map(&[("cfg", serde_json::from_str(r#"{"y": 2, "x": 1}"#).unwrap())]);
        assert_eq!(run(&reference, &new).identical, vec!["cfg"]);
    }

    fn arb_map() -> impl Strategy<Value = BTreeMap<String, Value>> {
        prop::collection::btree_map("[a-e]{1,2}", (0i64..4).prop_map(Value::from), 0..12)
    }

    proptest! {
        #[test]
        fn buckets_partition_the_key_union(reference in arb_map(), new in arb_map()) {
            let result = run(&reference, &new);

            let only_ref: BTreeSet<String> =
                result.only_in_reference.iter().map(|e| e.key.clone()).collect();
            let only_new: BTreeSet<String> =
                result.only_in_new.iter().map(|e| e.key.clone()).collect();
            let different: BTreeSet<String> =
                result.different.iter().map(|e| e.key.clone()).collect();
            let identical: BTreeSet<String> = result.identical.iter().cloned().collect();

            let ref_keys: BTreeSet<String> = reference.keys().cloned().collect();
            let new_keys: BTreeSet<String> = new.keys().cloned().collect();

            let expected_only_ref: BTreeSet<String> =
                ref_keys.difference(&new_keys).cloned().collect();
            let expected_only_new: BTreeSet<String> =
                new_keys.difference(&ref_keys).cloned().collect();
            prop_assert_eq!(only_ref, expected_only_ref);
            prop_assert_eq!(only_new, expected_only_new);

            let shared: BTreeSet<String> = ref_keys.intersection(&new_keys).cloned().collect();
            let classified: BTreeSet<String> = different.union(&identical).cloned().collect();
            prop_assert_eq!(classified, shared);
            prop_assert!(different.is_disjoint(&identical));

            for key in &identical {
                prop_assert_eq!(&reference[key], &new[key]);
            }
            for key in &different {
                prop_assert_ne!(&reference[key], &new[key]);
            }
        }
    }
}
