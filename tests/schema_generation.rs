//! Emitting schema documents and loading them back

use std::sync::Arc;

use pretty_assertions::assert_eq;
use xsdbind::model::{Field, Overrides};
use xsdbind::schema::{NamespaceFiles, SchemaSource};
use xsdbind::{
    ComplexBuilder, Interface, InterfaceBuilder, Primitive, Record, SchemaBuilder, SchemaParser,
    ValidationMode, ValidationSchema, Value, XmlCodec,
};

fn person_interface() -> Interface {
    let mut builder = InterfaceBuilder::new("urn:x");
    let registry = builder.registry();
    let string = registry.builtin(Primitive::String);
    let integer = registry.builtin(Primitive::Integer);
    let age = registry
        .derive(integer, &Overrides::new().with_min_occurs(1).with_nillable(false))
        .unwrap();
    let person = ComplexBuilder::new(registry, "Person")
        .field("name", string)
        .field("age", age)
        .finish()
        .unwrap();
    builder.add_type(person);
    builder.build().unwrap()
}

/// A in the target namespace, B in `urn:b`, each holding the other
fn mutual_interface() -> Interface {
    let mut builder = InterfaceBuilder::new("urn:x");
    let registry = builder.registry();
    let string = registry.builtin(Primitive::String);
    let b = ComplexBuilder::new(registry, "B")
        .namespace("urn:b")
        .field("label", string)
        .finish()
        .unwrap();
    let a = ComplexBuilder::new(registry, "A")
        .field("b", b)
        .finish()
        .unwrap();
    registry
        .get_mut(b)
        .fields
        .insert("back".to_string(), Field::new("back", a));
    builder.add_type(a);
    builder.build().unwrap()
}

// ============================================================================
// Document text
// ============================================================================

#[test]
fn test_person_document() {
    let interface = person_interface();
    let xml = SchemaBuilder::new(&interface)
        .build()
        .unwrap()
        .to_xml("urn:x")
        .unwrap();

    let expected = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:tns="urn:x" targetNamespace="urn:x" elementFormDefault="qualified">
  <xs:complexType name="Person">
    <xs:sequence>
      <xs:element name="name" type="xs:string" minOccurs="0" nillable="true"/>
      <xs:element name="age" type="xs:integer"/>
    </xs:sequence>
  </xs:complexType>
  <xs:element name="Person" type="tns:Person"/>
</xs:schema>"#;
    assert_eq!(xml, expected);
}

#[test]
fn test_emission_repeats_exactly() {
    let interface = person_interface();
    let first = SchemaBuilder::new(&interface).build().unwrap();
    let second = SchemaBuilder::new(&interface).build().unwrap();
    assert_eq!(first.to_strings().unwrap(), second.to_strings().unwrap());

    let rebuilt = SchemaBuilder::new(&person_interface()).build().unwrap();
    assert_eq!(first.to_strings().unwrap(), rebuilt.to_strings().unwrap());
}

// ============================================================================
// Mutual namespaces
// ============================================================================

#[test]
fn test_mutual_namespaces_import_each_other() {
    let interface = mutual_interface();
    let set = SchemaBuilder::new(&interface).build().unwrap();
    assert_eq!(set.len(), 2);

    let main = set.to_xml("urn:x").unwrap();
    let other = set.to_xml("urn:b").unwrap();
    assert!(main.contains(r#"<xs:import namespace="urn:b"/>"#));
    assert!(other.contains(r#"<xs:import namespace="urn:x"/>"#));
    assert!(main.contains(r#"type="s0:B""#));
    assert!(other.contains(r#"type="tns:A""#));
}

#[test]
fn test_mutual_namespaces_parse_back() {
    let interface = mutual_interface();
    let set = SchemaBuilder::new(&interface).build().unwrap();
    let main = set.to_xml("urn:x").unwrap();
    let other = set.to_xml("urn:b").unwrap();

    let parsed = SchemaParser::new()
        .with_resolver(NamespaceFiles::new().with("urn:b", other))
        .parse_sources(vec![SchemaSource::inline("tns.xsd", main)])
        .unwrap();
    assert!(parsed.passes() <= 2);

    let a = parsed.lookup("urn:x", "A").unwrap();
    let b = parsed.lookup("urn:b", "B").unwrap();
    let registry = parsed.registry();
    assert_eq!(registry.wire_type(registry.field_type(a, &registry.get(a).fields["b"]).unwrap()), b);
    assert_eq!(registry.wire_type(registry.field_type(b, &registry.get(b).fields["back"]).unwrap()), a);
}

#[test]
fn test_mutual_namespaces_validate() {
    let interface = mutual_interface();
    assert!(ValidationSchema::from_interface(&interface).is_ok());
}

// ============================================================================
// Inheritance
// ============================================================================

fn leaf_codec() -> (XmlCodec, xsdbind::TypeId) {
    let mut builder = InterfaceBuilder::new("urn:x")
        .with_config(xsdbind::Config::default().with_validation(ValidationMode::Schema));
    let registry = builder.registry();
    let string = registry.builtin(Primitive::String);
    let hidden = ComplexBuilder::new(registry, "Hidden")
        .private()
        .field("a", string)
        .finish()
        .unwrap();
    let middle = ComplexBuilder::new(registry, "Middle")
        .extends(hidden)
        .field("b", string)
        .finish()
        .unwrap();
    let leaf = ComplexBuilder::new(registry, "Leaf")
        .extends(middle)
        .field("c", string)
        .finish()
        .unwrap();
    builder.add_type(leaf);
    (XmlCodec::new(Arc::new(builder.build().unwrap())), leaf)
}

#[test]
fn test_private_parent_inlined_before_extension() {
    let (codec, _) = leaf_codec();
    let xml = SchemaBuilder::new(codec.interface())
        .build()
        .unwrap()
        .to_xml("urn:x")
        .unwrap();
    assert!(xml.contains(r#"<xs:extension base="tns:Middle">"#));
    assert!(!xml.contains(r#"base="tns:Hidden""#));
}

#[test]
fn test_inherited_fields_written_parent_first() {
    let (codec, leaf) = leaf_codec();
    let value: Value = Record::new()
        .with("c", "3")
        .with("a", "1")
        .with("b", "2")
        .into();
    let xml = codec.to_string(leaf, &value).unwrap();
    assert_eq!(
        xml,
        r#"<tns:Leaf xmlns:tns="urn:x"><tns:a>1</tns:a><tns:b>2</tns:b><tns:c>3</tns:c></tns:Leaf>"#
    );

    let (ty, decoded) = codec.decode_document(&xml).unwrap();
    assert_eq!(ty, leaf);
    assert_eq!(decoded, value);
}
