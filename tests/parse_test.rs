//! Integration tests for the parse contract and message resolution.

use serde_json::json;
use valschema::{
    array, boolean, checks, coerce, enumeration, int, object, string, Check, Config, IssueCode,
    Kind, MessageCatalog, ParseContext, PathSegment, RawIssue, Schema, Shared, TypedSchema, Value,
};

// === Parse Contract ===

mod contract {
    use super::*;

    #[test]
    fn typed_output() {
        let name: String = string().parse("ada").unwrap();
        assert_eq!(name, "ada");
        let count: i64 = int().parse(3i64).unwrap();
        assert_eq!(count, 3);
        let flag: bool = boolean().parse(true).unwrap();
        assert!(flag);
    }

    #[test]
    fn invalid_type_reports_expected_and_received() {
        let err = int().parse("3").unwrap_err();
        assert_eq!(err.codes(), vec![IssueCode::InvalidType]);
        assert_eq!(err.issues[0].properties["expected"], "int");
        assert_eq!(err.issues[0].properties["received"], "string");
        assert_eq!(err.issues[0].pointer(), "/");
    }

    #[test]
    fn absent_input_is_rejected_by_default() {
        let err = string().parse(()).unwrap_err();
        assert_eq!(
            err.issues[0].message,
            "Invalid input: expected string, received null"
        );
    }

    #[test]
    fn completeness_min_and_max() {
        let err = string().min(5).max(3).parse("abcd").unwrap_err();
        assert_eq!(err.codes(), vec![IssueCode::TooSmall, IssueCode::TooBig]);
    }

    #[test]
    fn enumeration_round_trip() {
        let colors = enumeration(["red", "green", "blue"]);
        assert_eq!(colors.parse("red").unwrap(), "red");
        assert_eq!(
            colors.parse("purple").unwrap_err().codes(),
            vec![IssueCode::InvalidValue]
        );
    }

    #[test]
    fn reference_identity_preserved() {
        let shared = Shared::new(json!({ "name": "ada", "tags": ["a", "b"] }));
        let schema = object()
            .field("name", string())
            .field("tags", array(string()));

        let out = schema
            .parse_value(&Value::Ref(shared.clone()), &ParseContext::new())
            .unwrap();
        assert!(out.as_shared().unwrap().ptr_eq(&shared));
    }

    #[test]
    fn converted_reference_is_fresh_and_input_untouched() {
        let shared = Shared::new(json!({ "n": "7" }));
        let schema = object().field("n", coerce::int());

        let out = schema
            .parse_value(&Value::Ref(shared.clone()), &ParseContext::new())
            .unwrap();
        let fresh = out.as_shared().unwrap();
        assert!(!fresh.ptr_eq(&shared));
        assert_eq!(fresh.get().to_json(), json!({ "n": 7 }));
        assert_eq!(shared.get().to_json(), json!({ "n": "7" }));
    }

    #[test]
    fn sibling_fields_are_all_checked() {
        let schema = object()
            .field("a", int())
            .field("b", int().min(5))
            .field("c", string());
        let err = schema.parse(json!({ "a": "x", "b": 1, "c": 2 })).unwrap_err();
        let pointers: Vec<String> = err.issues.iter().map(|i| i.pointer()).collect();
        assert_eq!(pointers, vec!["/a", "/b", "/c"]);
    }

    #[test]
    #[should_panic(expected = "validation failed with 1 issue(s)")]
    fn must_parse_panics() {
        int().must_parse("nope");
    }

    #[test]
    fn must_parse_returns_output() {
        assert_eq!(int().must_parse(4i64), 4);
    }

    #[test]
    fn flatten_groups_by_pointer() {
        let schema = object().field("name", string().min(3).starts_with("x"));
        let err = schema.parse(json!({ "name": "ab" })).unwrap_err();
        let flat = err.flatten();
        assert_eq!(flat["/name"].len(), 2);
    }

    #[test]
    fn errors_serialize() {
        let err = int().parse("x").unwrap_err();
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["issues"][0]["code"], "invalid_type");
        assert_eq!(json["issues"][0]["path"], json!([]));
    }
}

// === Checks ===

mod check_pipeline {
    use super::*;

    fn failing(name: &'static str) -> Check {
        Check::new(name, |_, ctx| ctx.custom("failed"))
    }

    #[test]
    fn failing_checks_accumulate() {
        let schema = int().check(failing("a")).check(failing("b"));
        assert_eq!(schema.parse(1i64).unwrap_err().issues.len(), 2);
    }

    #[test]
    fn abort_stops_the_value_pipeline() {
        let schema = int().check(failing("a").abort()).check(failing("b"));
        assert_eq!(schema.parse(1i64).unwrap_err().issues.len(), 1);
    }

    #[test]
    fn abort_is_per_value() {
        let schema = array(int().check(failing("a").abort()).check(failing("b")));
        let err = schema.parse(json!([1, 2])).unwrap_err();
        assert_eq!(err.issues.len(), 2);
        assert_eq!(err.issues[1].pointer(), "/1");
    }

    #[test]
    fn checks_do_not_run_after_type_failure() {
        let schema = int().check(failing("a"));
        assert_eq!(
            schema.parse("x").unwrap_err().codes(),
            vec![IssueCode::InvalidType]
        );
    }

    #[test]
    fn refine_and_super_refine() {
        let even = int().refine(|n| n % 2 == 0, "must be even");
        assert!(even.parse(4i64).is_ok());
        let err = even.parse(3i64).unwrap_err();
        assert_eq!(err.issues[0].code, IssueCode::Custom);
        assert_eq!(err.issues[0].message, "must be even");

        let password = object()
            .field("password", string())
            .field("confirm", string())
            .super_refine(|map, ctx| {
                if map.get("password") != map.get("confirm") {
                    ctx.add_issue(
                        RawIssue::custom("passwords differ").at([PathSegment::from("confirm")]),
                    );
                }
            });
        let err = password
            .parse(json!({ "password": "a", "confirm": "b" }))
            .unwrap_err();
        assert_eq!(err.issues[0].pointer(), "/confirm");
    }

    #[test]
    fn checks_module_attaches_to_any_schema() {
        let schema = array(int()).check(checks::max_length(1));
        assert_eq!(
            schema.parse(json!([1, 2])).unwrap_err().codes(),
            vec![IssueCode::TooBig]
        );
    }

    #[test]
    fn invalid_pattern_fails_construction() {
        assert!(string().pattern("[").is_err());
        let hex = string().pattern("^[0-9a-f]+$").unwrap();
        assert!(hex.parse("c0ffee").is_ok());
        assert_eq!(
            hex.parse("xyz").unwrap_err().codes(),
            vec![IssueCode::InvalidFormat]
        );
    }

    #[test]
    fn check_list_is_introspectable() {
        let schema = string().min(2).max(8);
        let checks = schema.internals().checks();
        assert_eq!(checks.len(), 2);
        assert_eq!(checks[0].name(), "min_length");
        assert_eq!(checks[1].params()["maximum"], 8);
        assert_eq!(schema.kind(), Kind::String);
    }
}

// === Message Resolution ===

mod messages {
    use super::*;

    #[test]
    fn check_override_beats_context_resolver() {
        let schema = int().refine(|n| *n > 0, "must be positive");
        let ctx = ParseContext::new().with_resolver(|_| Some("context".to_string()));
        let err = schema.parse_with(-1i64, &ctx).unwrap_err();
        assert_eq!(err.issues[0].message, "must be positive");
    }

    #[test]
    fn context_resolver_beats_schema_resolver() {
        let schema = int().error(|_| Some("schema".to_string()));
        assert_eq!(schema.parse("x").unwrap_err().issues[0].message, "schema");

        let ctx = ParseContext::new().with_resolver(|_| Some("context".to_string()));
        assert_eq!(
            schema.parse_with("x", &ctx).unwrap_err().issues[0].message,
            "context"
        );
    }

    #[test]
    fn resolvers_may_defer() {
        let ctx = ParseContext::new().with_resolver(|issue| {
            (issue.code == IssueCode::TooSmall).then(|| "too short".to_string())
        });
        let schema = string().min(3);
        assert_eq!(
            schema.parse_with("a", &ctx).unwrap_err().issues[0].message,
            "too short"
        );
        assert_eq!(
            schema.parse_with(1i64, &ctx).unwrap_err().issues[0].message,
            "Invalid input: expected string, received int"
        );
    }

    #[test]
    fn transform_errors_reach_resolvers() {
        let schema =
            string().transform(|s, _| s.parse::<i64>().map_err(|_| "not a number".to_string()));
        assert_eq!(
            schema.parse("x").unwrap_err().issues[0].message,
            "not a number"
        );

        let ctx = ParseContext::new()
            .with_resolver(|issue| (issue.code == IssueCode::Custom).then(|| "keine Zahl".to_string()));
        assert_eq!(
            schema.parse_with("x", &ctx).unwrap_err().issues[0].message,
            "keine Zahl"
        );
    }

    #[test]
    fn schema_resolver_applies_to_its_own_issues_only() {
        let schema = object()
            .field("name", string())
            .error(|_| Some("bad object".to_string()));
        let err = schema.parse(json!({ "name": 1 })).unwrap_err();
        assert_eq!(
            err.issues[0].message,
            "Invalid input: expected string, received int"
        );
        assert_eq!(schema.parse(1i64).unwrap_err().issues[0].message, "bad object");
    }

    #[test]
    fn custom_catalog() {
        struct Codes;

        impl MessageCatalog for Codes {
            fn name(&self) -> &str {
                "codes"
            }

            fn message(&self, issue: &RawIssue) -> Option<String> {
                Some(issue.code.to_string())
            }
        }

        let ctx = ParseContext::new().with_config(Config::new(Codes));
        let err = int().parse_with("x", &ctx).unwrap_err();
        assert_eq!(err.issues[0].message, "invalid_type");
    }

    #[test]
    fn catalog_may_defer_to_fallback() {
        struct Silent;

        impl MessageCatalog for Silent {
            fn name(&self) -> &str {
                "silent"
            }

            fn message(&self, _: &RawIssue) -> Option<String> {
                None
            }
        }

        let ctx = ParseContext::new().with_config(Config::new(Silent));
        let err = int().parse_with("x", &ctx).unwrap_err();
        assert_eq!(err.issues[0].message, valschema::FALLBACK_MESSAGE);
    }

    #[test]
    fn input_is_echoed_only_on_request() {
        let err = int().parse("x").unwrap_err();
        assert_eq!(err.issues[0].input, None);

        let ctx = ParseContext::new().report_input(true);
        let err = int().parse_with("x", &ctx).unwrap_err();
        assert_eq!(err.issues[0].input, Some(json!("x")));
    }
}

// === Coercion ===

mod coercion {
    use super::*;

    #[test]
    fn coerced_values_are_checked() {
        assert_eq!(coerce::int().min(1).parse("5").unwrap(), 5);
        assert_eq!(
            coerce::int().min(10).parse("5").unwrap_err().codes(),
            vec![IssueCode::TooSmall]
        );
    }

    #[test]
    fn unconvertible_input_is_a_type_error() {
        let err = coerce::int().parse("five").unwrap_err();
        assert_eq!(err.codes(), vec![IssueCode::InvalidType]);
    }

    #[test]
    fn coercion_flag_is_metadata() {
        assert!(coerce::float().internals().coerces());
        assert!(!valschema::float().internals().coerces());
        assert_eq!(coerce::float().parse("2.5").unwrap(), 2.5);
    }
}
