//! Whole-document validation against emitted schemas
//!
//! The emitted documents are serialized and parsed back, so a document is
//! checked against what a peer reading the published schema would see,
//! not against the in-memory registry.

use crate::codec::{layout, Slot};
use crate::documents::{Document, Element};
use crate::error::{Result, SchemaValidationError};
use crate::interface::Interface;
use crate::limits::Limits;
use crate::model::{TypeDescriptor, TypeId, TypeKind, TypeRegistry};
use crate::namespaces::{QName, XMLNS_NAMESPACE, XSI_NAMESPACE};
use crate::schema::builder::{SchemaBuilder, SchemaSet};
use crate::schema::parser::{NamespaceFiles, SchemaParser, SchemaSource};
use indexmap::IndexMap;

type Checked = std::result::Result<(), SchemaValidationError>;

/// Parsed form of a [`SchemaSet`] used to validate instance documents
#[derive(Debug, Clone)]
pub struct ValidationSchema {
    registry: TypeRegistry,
    elements: IndexMap<QName, TypeId>,
    limits: Limits,
}

impl ValidationSchema {
    /// Emit the schemas of `interface` and load them back
    pub fn from_interface(interface: &Interface) -> Result<Self> {
        let set = SchemaBuilder::new(interface).build()?;
        Self::from_schema_set(&set, &interface.config().limits)
    }

    /// Load serialized schema documents
    pub fn from_schema_set(set: &SchemaSet, limits: &Limits) -> Result<Self> {
        let mut files = NamespaceFiles::new();
        let mut sources = Vec::with_capacity(set.len());
        for document in set.iter() {
            let xml = document.to_xml()?;
            files.insert(document.file_name(), xml.as_str());
            files.insert(document.namespace(), xml.as_str());
            sources.push(SchemaSource::inline(document.file_name(), xml));
        }
        let parsed = SchemaParser::new()
            .with_resolver(files)
            .with_limits(limits.clone())
            .parse_sources(sources)?;
        tracing::debug!(
            elements = parsed.elements().len(),
            passes = parsed.passes(),
            "built validation schema"
        );
        Ok(Self {
            elements: parsed.elements().clone(),
            registry: parsed.registry().clone(),
            limits: limits.clone(),
        })
    }

    /// Whether `qname` is a global element
    pub fn has_element(&self, qname: &QName) -> bool {
        self.elements.contains_key(qname)
    }

    /// Validate serialized XML
    pub fn validate_str(&self, xml: &str) -> Result<()> {
        let document = Document::parse_with_limits(xml.as_bytes(), &self.limits)?;
        let root = document.into_root()?;
        self.validate(&root)?;
        Ok(())
    }

    /// Validate a document rooted at a global element
    pub fn validate(&self, root: &Element) -> Checked {
        let path = format!("/{}", root.local_name());
        let ty = self.elements.get(&root.qname).copied().ok_or_else(|| {
            fail(root, &path, format!("{} is not a global element of the schema", root.qname))
        })?;
        self.check_element(root, ty, &[], &path)
    }

    fn check_element(&self, element: &Element, ty: TypeId, carried: &[&Slot<'_>], path: &str) -> Checked {
        let attributes = &self.registry.get(ty).attributes;
        let wire = self.registry.content_type(ty);
        let descriptor = self.registry.get(wire);

        if element.is_nil() {
            if !attributes.nillable {
                return Err(fail(element, path, "element is not nillable"));
            }
            if !element.children.is_empty() || has_text(element) {
                return Err(fail(element, path, "nil element must be empty"));
            }
            if descriptor.kind.is_simple() {
                self.check_attributes(element, carried, path)?;
            }
            return Ok(());
        }

        if descriptor.kind.is_simple() {
            self.check_attributes(element, carried, path)?;
            if let Some(child) = element.children.first() {
                return Err(fail(child, path, "simple content cannot have child elements"));
            }
            return self.check_text(element, descriptor, path);
        }

        if descriptor.kind == TypeKind::Alias {
            return Err(fail(element, path, "unresolved alias"));
        }
        self.check_complex(element, wire, path)
    }

    fn check_text(&self, element: &Element, descriptor: &TypeDescriptor, path: &str) -> Checked {
        let primitive = match descriptor.primitive {
            Some(primitive) => primitive,
            None => return Ok(()),
        };
        let text = element.text.as_deref().unwrap_or("");
        let value = primitive
            .parse(text)
            .map_err(|e| fail(element, path, e.to_string()))?;
        descriptor
            .attributes
            .facets
            .check(primitive, &value)
            .map_err(|reason| fail(element, path, reason))
    }

    fn check_attributes(&self, element: &Element, allowed: &[&Slot<'_>], path: &str) -> Checked {
        for (qname, value) in &element.attributes {
            if matches!(qname.namespace(), Some(XSI_NAMESPACE) | Some(XMLNS_NAMESPACE)) {
                continue;
            }
            let slot = allowed
                .iter()
                .find(|s| s.field.wire_name() == qname.local_name && qname.namespace().is_none())
                .ok_or_else(|| fail(element, path, format!("unexpected attribute '{}'", qname)))?;
            let descriptor = self.registry.get(self.registry.content_type(slot.ty));
            if let Some(primitive) = descriptor.primitive {
                let parsed = primitive
                    .parse(value)
                    .map_err(|e| fail(element, path, format!("attribute '{}': {}", qname, e)))?;
                descriptor
                    .attributes
                    .facets
                    .check(primitive, &parsed)
                    .map_err(|reason| fail(element, path, format!("attribute '{}': {}", qname, reason)))?;
            }
        }
        for slot in allowed {
            let required = self.registry.get(slot.ty).attributes.occurs.min > 0;
            if required && element.get_attribute(slot.field.wire_name()).is_none() {
                return Err(fail(
                    element,
                    path,
                    format!("missing required attribute '{}'", slot.field.wire_name()),
                ));
            }
        }
        Ok(())
    }

    /// Element-only content, matched against the same wire layout the
    /// codec writes: inherited elements keep their declaring namespace
    fn check_complex(&self, element: &Element, owner: TypeId, path: &str) -> Checked {
        if has_text(element) {
            return Err(fail(element, path, "text is not allowed in element-only content"));
        }
        let slots = layout(&self.registry, owner).map_err(|e| fail(element, path, e.to_string()))?;
        let attributes: Vec<&Slot<'_>> = slots.iter().filter(|s| s.field.options.attribute).collect();
        self.check_attributes(element, &attributes, path)?;

        let elements: Vec<&Slot<'_>> = slots.iter().filter(|s| !s.field.options.is_attribute()).collect();
        let mut counts = vec![0u32; elements.len()];
        let mut position = 0;

        for child in &element.children {
            let child_path = format!("{}/{}", path, child.local_name());
            let index = elements
                .iter()
                .position(|s| s.field.wire_name() == child.local_name() && child.namespace() == s.namespace.as_deref())
                .ok_or_else(|| fail(child, &child_path, format!("unexpected element {}", child.qname)))?;
            if index < position {
                return Err(fail(child, &child_path, "element is out of order"));
            }
            position = index;
            counts[index] += 1;

            let slot = elements[index];
            let carried: Vec<&Slot<'_>> = slots
                .iter()
                .filter(|s| s.field.options.attribute_of.as_deref() == Some(slot.field.name.as_str()))
                .collect();
            self.check_element(child, slot.ty, &carried, &child_path)?;
        }

        for (slot, count) in elements.iter().zip(counts) {
            let occurs = self.registry.get(slot.ty).attributes.occurs;
            if occurs.is_missing(count) {
                return Err(fail(
                    element,
                    path,
                    format!("missing element '{}' (expected at least {})", slot.field.wire_name(), occurs.min),
                ));
            }
            if occurs.is_exceeded(count) {
                return Err(fail(
                    element,
                    path,
                    format!(
                        "element '{}' occurs {} times (at most {})",
                        slot.field.wire_name(),
                        count,
                        occurs.max_lexical()
                    ),
                ));
            }
        }
        Ok(())
    }
}

fn has_text(element: &Element) -> bool {
    element
        .text
        .as_deref()
        .map(|t| !t.trim().is_empty())
        .unwrap_or(false)
}

fn fail(element: &Element, path: &str, message: impl Into<String>) -> SchemaValidationError {
    SchemaValidationError::new(message)
        .with_path(path)
        .with_position(element.position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::interface::InterfaceBuilder;
    use crate::model::{ComplexBuilder, Overrides, Primitive};

    fn schema() -> ValidationSchema {
        let mut builder = InterfaceBuilder::new("urn:v");
        let registry = builder.registry();
        let string = registry.builtin(Primitive::String);
        let integer = registry.builtin(Primitive::Integer);
        let short = registry.derive(string, &Overrides::new().with_max_len(3)).unwrap();
        let age = registry
            .derive(integer, &Overrides::new().with_min_occurs(1).with_nillable(false))
            .unwrap();
        let person = ComplexBuilder::new(registry, "Person")
            .field("name", short)
            .field("age", age)
            .attribute("id", string)
            .finish()
            .unwrap();
        builder.add_type(person);
        ValidationSchema::from_interface(&builder.build().unwrap()).unwrap()
    }

    #[test]
    fn test_valid_document() {
        let schema = schema();
        schema
            .validate_str(r#"<Person xmlns="urn:v" id="x"><name>Ann</name><age>3</age></Person>"#)
            .unwrap();
        assert!(schema.has_element(&QName::namespaced("urn:v", "Person")));
    }

    #[test]
    fn test_facet_violation_has_position() {
        let schema = schema();
        let err = schema
            .validate_str("<Person xmlns=\"urn:v\">\n<name>Annabel</name><age>3</age></Person>")
            .unwrap_err();
        match err {
            Error::SchemaValidation(e) => {
                assert_eq!(e.path.as_deref(), Some("/Person/name"));
                assert_eq!(e.position.map(|p| p.line), Some(2));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_structure_violations() {
        let schema = schema();
        let cases = [
            r#"<Person xmlns="urn:v"><name>A</name></Person>"#,
            r#"<Person xmlns="urn:v"><age>1</age><name>A</name></Person>"#,
            r#"<Person xmlns="urn:v"><age>1</age><extra/></Person>"#,
            r#"<Person xmlns="urn:v" bogus="1"><age>1</age></Person>"#,
            r#"<Person xmlns="urn:v"><age>old</age></Person>"#,
            r#"<Other xmlns="urn:v"/>"#,
        ];
        for xml in cases {
            assert!(
                matches!(schema.validate_str(xml), Err(Error::SchemaValidation(_))),
                "accepted {}",
                xml
            );
        }
    }

    #[test]
    fn test_nil_rules() {
        let schema = schema();
        let xsi = r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance""#;
        let ok = format!(r#"<Person xmlns="urn:v" {}><name xsi:nil="true"/><age>1</age></Person>"#, xsi);
        schema.validate_str(&ok).unwrap();
        let bad = format!(r#"<Person xmlns="urn:v" {}><age xsi:nil="true"/></Person>"#, xsi);
        assert!(schema.validate_str(&bad).is_err());
    }
}
