use bytes::Bytes;
use graphwire::{fieldmap::FieldMap, value::JsonValue};
use proptest::prelude::*;

/// arbitrary text for use with proptest, biased towards the characters the text codec
/// escapes and towards multi-byte UTF-8
pub fn arb_wire_string() -> impl Strategy<Value = String> {
    let special = prop_oneof![
        Just('\t'),
        Just('\r'),
        Just('\n'),
        Just('"'),
        Just('\''),
        Just('\\'),
        Just('/'),
        Just('\u{e9}'),
        Just('\u{1F600}'),
    ];
    let ch = prop_oneof![3 => any::<char>(), 1 => special];
    prop::collection::vec(ch, 0..32).prop_map(|cs| cs.into_iter().collect())
}

/// arbitrary Bytes for use with proptest
pub fn arb_bytes() -> impl Strategy<Value = Bytes> {
    prop::collection::vec(any::<u8>(), 0..64).prop_map(Bytes::from)
}

/// arbitrary finite number whose shortest form survives a text round trip
pub fn arb_number() -> impl Strategy<Value = f64> {
    prop_oneof![
        any::<i32>().prop_map(f64::from),
        any::<f64>().prop_filter("finite", |n| n.is_finite()),
    ]
}

/// arbitrary value tree for use with proptest
pub fn arb_json_value() -> impl Strategy<Value = JsonValue> {
    let leaf = prop_oneof![
        Just(JsonValue::Null),
        any::<bool>().prop_map(JsonValue::Bool),
        arb_number().prop_map(JsonValue::Number),
        arb_wire_string().prop_map(JsonValue::String),
    ];
    leaf.prop_recursive(
        8,  // max depth
        64, // max nodes
        10, // max items per collection
        |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..10).prop_map(JsonValue::Array),
                prop::collection::vec((arb_wire_string(), inner), 0..10)
                    .prop_map(|members| JsonValue::Object(members.into_iter().collect::<FieldMap<_, _>>()))
            ]
        },
    )
}
