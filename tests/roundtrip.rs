//! Property tests: encoded values decode back unchanged

use std::sync::Arc;

use proptest::prelude::*;
use rust_decimal::Decimal;
use xsdbind::{
    ComplexBuilder, Config, InterfaceBuilder, Overrides, Primitive, Record, TypeId,
    ValidationMode, Value, XmlCodec,
};

fn codec(mode: ValidationMode) -> (XmlCodec, TypeId) {
    let mut builder =
        InterfaceBuilder::new("urn:rt").with_config(Config::default().with_validation(mode));
    let registry = builder.registry();
    let string = registry.builtin(Primitive::String);
    let integer = registry.builtin(Primitive::Integer);
    let boolean = registry.builtin(Primitive::Boolean);
    let decimal = registry.builtin(Primitive::Decimal);
    let name = registry
        .derive(string, &Overrides::new().with_min_occurs(1))
        .unwrap();
    let tags = registry
        .derive(string, &Overrides::new().unbounded())
        .unwrap();
    let color = registry
        .enumeration("Color", None, ["red", "green", "blue"])
        .unwrap();
    let scores = registry.array_of(integer).unwrap();
    let person = ComplexBuilder::new(registry, "Person")
        .field("name", name)
        .field("age", integer)
        .attribute_of("unit", string, "age")
        .field("tags", tags)
        .attribute_of("lang", string, "tags")
        .field("active", boolean)
        .field("balance", decimal)
        .field("color", color)
        .field("scores", scores)
        .self_field("friend")
        .finish()
        .unwrap();
    builder.add_type(person);
    (XmlCodec::new(Arc::new(builder.build().unwrap())), person)
}

fn decimal() -> impl Strategy<Value = Decimal> {
    (-1_000_000_000i64..1_000_000_000, 0u32..4).prop_map(|(mantissa, scale)| Decimal::new(mantissa, scale))
}

fn fields() -> impl Strategy<Value = Record> {
    (
        "[a-zA-Z0-9 &<>]{0,16}",
        proptest::option::of(any::<i32>()),
        proptest::option::of("[a-z]{1,4}"),
        proptest::collection::vec(("[a-z]{1,8}", proptest::option::of("[a-z]{2}")), 0..4),
        any::<bool>(),
        decimal(),
        prop::sample::select(vec!["red", "green", "blue"]),
        proptest::option::of(proptest::collection::vec(any::<i64>(), 0..5)),
    )
        .prop_map(|(name, age, unit, tags, active, balance, color, scores)| {
            // Attribute values decode as null when no occurrence carries one
            let lang = if tags.iter().all(|(_, lang)| lang.is_none()) {
                Value::Null
            } else {
                Value::List(tags.iter().map(|(_, lang)| Value::from(lang.clone())).collect())
            };
            let tags = if tags.is_empty() {
                Value::Null
            } else {
                Value::List(tags.into_iter().map(|(tag, _)| Value::String(tag)).collect())
            };
            Record::new()
                .with("name", name)
                .with("age", age.map(i64::from))
                .with("unit", unit)
                .with("tags", tags)
                .with("lang", lang)
                .with("active", active)
                .with("balance", balance)
                .with("color", color)
                .with(
                    "scores",
                    scores.map(|s| Value::List(s.into_iter().map(Value::Integer).collect())),
                )
        })
}

fn person() -> impl Strategy<Value = Value> {
    (fields(), proptest::option::of(fields())).prop_map(|(record, friend)| {
        record.with("friend", friend).into()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_soft_roundtrip(value in person()) {
        let (codec, person) = codec(ValidationMode::Soft);
        let xml = codec.to_string(person, &value).unwrap();
        let decoded = codec.decode_str(person, &xml).unwrap();
        prop_assert_eq!(decoded, value);
    }

    #[test]
    fn prop_schema_roundtrip(value in person()) {
        let (codec, person) = codec(ValidationMode::Schema);
        let xml = codec.to_string(person, &value).unwrap();
        let (ty, decoded) = codec.decode_document(&xml).unwrap();
        prop_assert_eq!(ty, person);
        prop_assert_eq!(decoded, value);
    }

    #[test]
    fn prop_encoding_is_stable(value in person()) {
        let (codec, person) = codec(ValidationMode::Skip);
        let first = codec.to_string(person, &value).unwrap();
        let second = codec.to_string(person, &value).unwrap();
        prop_assert_eq!(first, second);
    }
}
