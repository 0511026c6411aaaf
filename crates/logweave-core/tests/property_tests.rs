//! Property-based tests for normalization, routing and trace colors
//!
//! Uses proptest to verify the bounds the normalizer promises and the
//! determinism of routing and color assignment.

use std::collections::BTreeMap;

use logweave_core::normalize::{reduce_field, truncate_with_ellipsis, MAX_DENYLISTED_LEN, MAX_FIELD_LEN};
use logweave_core::trace::color_index;
use logweave_core::{
    file_message, normalize, ChannelTargets, ErrorValue, LogPart, NormalizeOptions, Normalized,
    RoutingTable, Severity,
};
use proptest::prelude::*;
use serde_json::{json, Value};

// ============================================================================
// Strategy Generators
// ============================================================================

/// Arbitrary JSON values a few levels deep
fn json_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        ".{0,400}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,8}", inner, 0..8)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn severity_strategy() -> impl Strategy<Value = Severity> {
    (0u8..7).prop_map(|rank| Severity::from_rank(rank).unwrap())
}

fn channel_map_strategy() -> impl Strategy<Value = BTreeMap<String, ChannelTargets>> {
    prop::collection::btree_map(
        severity_strategy().prop_map(|s| s.as_str().to_string()),
        prop::collection::vec(prop::sample::select(vec!["info", "error", "audit", "net"]), 1..4)
            .prop_map(|names| ChannelTargets::Many(names.into_iter().map(String::from).collect())),
        0..7,
    )
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    /// Truncation never exceeds the limit and keeps short strings intact
    #[test]
    fn truncation_is_bounded(s in ".{0,600}", max in 4usize..400) {
        let out = truncate_with_ellipsis(&s, max);
        prop_assert!(out.chars().count() <= max);
        if s.chars().count() <= max {
            prop_assert_eq!(out, s);
        } else {
            prop_assert!(out.ends_with(" ..."));
        }
    }

    /// Every reduced error field fits its bound unless it is kept verbatim
    #[test]
    fn error_fields_are_bounded(
        key in prop::sample::select(vec!["config", "request", "response", "details", "body"]),
        value in json_strategy(),
    ) {
        let err = ErrorValue::new("Boom", "it broke").with_property(key, &value);
        let Normalized::Object(fields) = normalize(&LogPart::Error(err), NormalizeOptions::object()) else {
            panic!("errors normalize to objects");
        };
        prop_assert_eq!(fields["name"].as_str(), Some("Boom"));
        prop_assert_eq!(fields["message"].as_str(), Some("it broke"));
        if let Some(reduced) = fields.get(key) {
            let len = match reduced {
                Value::String(s) => s.chars().count(),
                other => serde_json::to_string(other).unwrap().chars().count(),
            };
            let bound = if ["config", "request", "response"].contains(&key) {
                match reduced {
                    Value::String(_) if !value.is_string() => MAX_DENYLISTED_LEN,
                    _ => MAX_FIELD_LEN,
                }
            } else {
                MAX_FIELD_LEN
            };
            prop_assert!(len <= bound, "{} has {} chars", key, len);
        }
    }

    /// Null or missing values are always dropped by the field reducer
    #[test]
    fn reducer_drops_null(key in "[a-z]{1,10}") {
        prop_assert_eq!(reduce_field(&key, None), None);
        prop_assert_eq!(reduce_field(&key, Some(&Value::Null)), None);
    }

    /// File messages are always a single line
    #[test]
    fn file_message_is_single_line(text in "[^\n\r]{0,50}", value in json_strategy()) {
        let message = file_message(&[LogPart::from(text), LogPart::Value(value)]);
        prop_assert!(!message.contains('\n'));
    }

    /// A severity reaches a channel exactly when the map names that pair
    #[test]
    fn routing_matches_map(map in channel_map_strategy()) {
        let table = RoutingTable::from_map(&map);
        for severity in Severity::ALL {
            let expected: Vec<&str> = map
                .get(severity.as_str())
                .map(|targets| targets.names())
                .unwrap_or_default();
            for channel in ["info", "error", "audit", "net"] {
                prop_assert_eq!(
                    table.mask_for(channel).contains(severity),
                    expected.contains(&channel)
                );
            }
        }
    }

    /// The same trace id always gets the same non-gray, non-red color
    #[test]
    fn trace_colors_are_deterministic(id in ".{0,64}") {
        let color = color_index(&id);
        prop_assert_eq!(color, color_index(&id));
        prop_assert!((18..=228).contains(&color));
        prop_assert_ne!(color, 196);
    }
}
