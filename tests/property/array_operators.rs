// Copyright (c) 2025 - Cowboy AI, Inc.
//! Properties of the array operators against a plain `Vec` model

use powerapp_sdk::storage::{apply_operation, StorageOperation};
use proptest::prelude::*;
use serde_json::{json, Value};

fn list(values: &[i64]) -> Value {
    json!({ "list": values })
}

fn applied(values: &[i64], operation: StorageOperation) -> Vec<i64> {
    let mut storage = list(values);
    apply_operation(&mut storage, &operation).unwrap();
    serde_json::from_value(storage["list"].clone()).unwrap()
}

fn model_slice(values: &[i64], size: i64) -> Vec<i64> {
    let len = values.len();
    let keep = size.unsigned_abs() as usize;
    if size == 0 {
        Vec::new()
    } else if size > 0 {
        values[..keep.min(len)].to_vec()
    } else {
        values[len.saturating_sub(keep)..].to_vec()
    }
}

proptest! {
    #[test]
    fn slice_matches_model(
        values in prop::collection::vec(any::<i64>(), 0..20),
        size in -25i64..25,
    ) {
        prop_assert_eq!(
            applied(&values, StorageOperation::slice("list", size)),
            model_slice(&values, size)
        );
    }

    #[test]
    fn unshift_then_shift_restores(
        values in prop::collection::vec(any::<i64>(), 0..20),
        head in any::<i64>(),
    ) {
        let mut storage = list(&values);
        apply_operation(&mut storage, &StorageOperation::unshift("list", head)).unwrap();
        prop_assert_eq!(&storage["list"][0], &json!(head));

        apply_operation(&mut storage, &StorageOperation::shift("list")).unwrap();
        prop_assert_eq!(storage, list(&values));
    }

    #[test]
    fn push_appends_in_order(
        values in prop::collection::vec(any::<i64>(), 0..20),
        pushed in prop::collection::vec(any::<i64>(), 0..5),
    ) {
        let mut expected = values.clone();
        expected.extend(&pushed);

        prop_assert_eq!(
            applied(&values, StorageOperation::push("list", pushed.iter().copied())),
            expected
        );
    }

    #[test]
    fn pop_removes_last(values in prop::collection::vec(any::<i64>(), 0..20)) {
        let mut expected = values.clone();
        expected.pop();

        prop_assert_eq!(applied(&values, StorageOperation::pop("list")), expected);
    }
}
