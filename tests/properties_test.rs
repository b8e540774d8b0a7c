//! Property tests for issue ordering and completeness.

use proptest::prelude::*;
use valschema::{array, int, object, string, IssueCode, TypedSchema, Value};

proptest! {
    #[test]
    fn array_issues_follow_element_order(items in prop::collection::vec(-50i64..50, 0..40)) {
        let result = array(int().min(0)).parse(items.clone());
        let expected: Vec<String> = items
            .iter()
            .enumerate()
            .filter(|(_, n)| **n < 0)
            .map(|(index, _)| format!("/{}", index))
            .collect();

        match result {
            Ok(out) => {
                prop_assert!(expected.is_empty());
                prop_assert_eq!(out, items);
            }
            Err(err) => {
                let pointers: Vec<String> = err.issues.iter().map(|i| i.pointer()).collect();
                prop_assert_eq!(pointers, expected);
            }
        }
    }

    #[test]
    fn every_failing_check_is_reported(s in "[a-z]{0,12}", min in 0usize..10, max in 0usize..10) {
        let len = s.chars().count();
        let mut expected = Vec::new();
        if len < min {
            expected.push(IssueCode::TooSmall);
        }
        if len > max {
            expected.push(IssueCode::TooBig);
        }

        let codes = match string().min(min).max(max).parse(s.as_str()) {
            Ok(_) => Vec::new(),
            Err(err) => err.codes(),
        };
        prop_assert_eq!(codes, expected);
    }

    #[test]
    fn object_fields_report_in_declaration_order(
        a in prop::option::of(0i64..10),
        b in prop::option::of(0i64..10),
    ) {
        let schema = object().field("b", string()).field("a", string());
        let mut input = valschema::Map::new();
        if let Some(a) = a {
            input.insert("a".into(), Value::Int(a));
        }
        if let Some(b) = b {
            input.insert("b".into(), Value::Int(b));
        }

        let err = schema.parse(input);
        prop_assert!(err.is_err());
        let pointers: Vec<String> = err
            .unwrap_err()
            .issues
            .iter()
            .map(|i| i.pointer())
            .collect();
        prop_assert_eq!(pointers, vec!["/b".to_string(), "/a".to_string()]);
    }
}
