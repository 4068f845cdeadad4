//! Schema document emission
//!
//! One `xs:schema` per namespace of a resolved [`Interface`]. Output is
//! deterministic: the same interface always yields byte-identical text.

use crate::error::{Error, Result};
use crate::interface::Interface;
use crate::model::{Facets, Field, TypeId, TypeKind};
use crate::namespaces::{QName, XSD_NAMESPACE};
use crate::documents::{Element, XmlWriter};
use indexmap::IndexMap;

/// Emitted schema of one namespace
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDocument {
    namespace: String,
    prefix: String,
    root: Element,
}

impl SchemaDocument {
    /// Target namespace
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Prefix allocated to the namespace
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The `xs:schema` element
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// File name used for `schemaLocation` hints and exports
    pub fn file_name(&self) -> String {
        format!("{}.xsd", self.prefix)
    }

    /// Serialize with a declaration and two-space indentation
    pub fn to_xml(&self) -> Result<String> {
        XmlWriter::new()
            .with_indent(2)
            .with_declaration(true)
            .write(&self.root)
    }
}

/// Schema documents keyed by namespace
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaSet {
    documents: IndexMap<String, SchemaDocument>,
}

impl SchemaSet {
    /// Document of a namespace
    pub fn get(&self, namespace: &str) -> Option<&SchemaDocument> {
        self.documents.get(namespace)
    }

    /// Documents sorted by namespace
    pub fn iter(&self) -> impl Iterator<Item = &SchemaDocument> {
        self.documents.values()
    }

    /// Namespaces with a document
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(|k| k.as_str())
    }

    /// Number of documents
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether no document was emitted
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Serialized document of a namespace
    pub fn to_xml(&self, namespace: &str) -> Result<String> {
        self.get(namespace)
            .ok_or_else(|| Error::Namespace(format!("no schema for namespace '{}'", namespace)))?
            .to_xml()
    }

    /// Every document serialized, keyed by namespace
    pub fn to_strings(&self) -> Result<IndexMap<String, String>> {
        self.documents
            .iter()
            .map(|(ns, doc)| Ok((ns.clone(), doc.to_xml()?)))
            .collect()
    }
}

fn xs(local_name: &str) -> Element {
    Element::new(QName::namespaced(XSD_NAMESPACE, local_name))
}

/// Builds [`SchemaSet`]s from a resolved interface
#[derive(Debug, Clone, Copy)]
pub struct SchemaBuilder<'a> {
    interface: &'a Interface,
    schema_locations: bool,
}

impl<'a> SchemaBuilder<'a> {
    /// Create a builder over `interface`
    pub fn new(interface: &'a Interface) -> Self {
        Self {
            interface,
            schema_locations: interface.config().schema.schema_locations,
        }
    }

    /// Override whether imports carry `schemaLocation` hints
    pub fn with_schema_locations(mut self, schema_locations: bool) -> Self {
        self.schema_locations = schema_locations;
        self
    }

    /// Emit every namespace of the interface
    pub fn build(&self) -> Result<SchemaSet> {
        let mut set = SchemaSet::default();
        for namespace in self.interface.namespaces().schemas().keys() {
            let document = self.build_namespace(namespace)?;
            set.documents.insert(namespace.clone(), document);
        }
        tracing::debug!(documents = set.len(), "built schema documents");
        Ok(set)
    }

    /// Emit the document of a single namespace
    pub fn build_namespace(&self, namespace: &str) -> Result<SchemaDocument> {
        let namespaces = self.interface.namespaces();
        let schema = namespaces
            .schema(namespace)
            .ok_or_else(|| Error::Namespace(format!("unknown namespace '{}'", namespace)))?;
        let prefix = self.prefix(namespace)?.to_string();

        let mut root = xs("schema").with_prefix("xs", XSD_NAMESPACE);
        root = root.with_prefix(&prefix, namespace);
        let imports: Vec<&str> = namespaces.imports(namespace).collect();
        for other in &imports {
            let other_prefix = self.prefix(other)?;
            if other_prefix != "xs" {
                root = root.with_prefix(other_prefix, other);
            }
        }
        root = root
            .with_attribute("targetNamespace", namespace)
            .with_attribute("elementFormDefault", "qualified");

        for other in imports {
            let mut import = xs("import").with_attribute("namespace", other);
            if self.schema_locations && namespaces.schema(other).is_some() {
                import = import.with_attribute("schemaLocation", format!("{}.xsd", self.prefix(other)?));
            }
            root.add_child(import);
        }

        for id in schema.types.values() {
            if let Some(element) = self.type_definition(*id)? {
                root.add_child(element);
            }
        }
        for (name, id) in &schema.elements {
            let target = self.schema_type(*id)?;
            root.add_child(
                xs("element")
                    .with_attribute("name", name.as_str())
                    .with_attribute("type", self.type_ref(target)?),
            );
        }

        tracing::debug!(
            namespace,
            types = schema.types.len(),
            elements = schema.elements.len(),
            "emitted schema"
        );
        Ok(SchemaDocument {
            namespace: namespace.to_string(),
            prefix,
            root,
        })
    }

    fn prefix(&self, namespace: &str) -> Result<&str> {
        self.interface
            .namespaces()
            .prefix(namespace)
            .ok_or_else(|| Error::Namespace(format!("no prefix for namespace '{}'", namespace)))
    }

    /// `prefix:name` of the wire type of `id`
    fn type_ref(&self, id: TypeId) -> Result<String> {
        let registry = self.interface.registry();
        let qname = registry.type_qname(id).ok_or_else(|| Error::UnresolvedType {
            owner: registry.get(id).display_name(),
            member: "name".to_string(),
        })?;
        let namespace = qname.namespace().unwrap_or_default();
        Ok(format!("{}:{}", self.prefix(namespace)?, qname.local_name))
    }

    /// Type written in `type=` attributes; aliases stand for their target
    fn schema_type(&self, id: TypeId) -> Result<TypeId> {
        let registry = self.interface.registry();
        let mut current = registry.wire_type(id);
        while registry.get(current).kind == TypeKind::Alias {
            current = registry.wire_type(registry.item_type(current)?);
        }
        Ok(current)
    }

    fn annotation(&self, documentation: &Option<String>) -> Option<Element> {
        let text = documentation.as_ref()?;
        if !self.interface.config().schema.documentation {
            return None;
        }
        Some(xs("annotation").with_child(xs("documentation").with_text(text.as_str())))
    }

    fn type_definition(&self, id: TypeId) -> Result<Option<Element>> {
        let registry = self.interface.registry();
        let descriptor = registry.get(id);
        let name = match &descriptor.type_name {
            Some(name) => name.as_str(),
            None => return Ok(None),
        };

        let mut element = match descriptor.kind {
            TypeKind::Simple | TypeKind::Enum => xs("simpleType"),
            TypeKind::Complex | TypeKind::Fault | TypeKind::Array => xs("complexType"),
            TypeKind::Alias => return Ok(None),
        }
        .with_attribute("name", name);
        if let Some(annotation) = self.annotation(&descriptor.documentation) {
            element.add_child(annotation);
        }

        match descriptor.kind {
            TypeKind::Simple | TypeKind::Enum => {
                let (base, inherited) = match descriptor.extends.as_ref().and_then(|r| r.id()) {
                    Some(base) => (self.type_ref(base)?, registry.get(base).attributes.facets.clone()),
                    None => {
                        let primitive = descriptor.primitive.ok_or_else(|| {
                            Error::Type(format!("{} has no primitive", descriptor.display_name()))
                        })?;
                        (format!("xs:{}", primitive.xsd_name()), Facets::default())
                    }
                };
                let mut restriction = xs("restriction").with_attribute("base", base);
                for facet in facet_elements(&descriptor.attributes.facets.beyond(&inherited)) {
                    restriction.add_child(facet);
                }
                element.add_child(restriction);
            }
            TypeKind::Array => {
                let member = registry.item_type(id)?;
                let member_type = self.schema_type(member)?;
                let member_descriptor = registry.get(member_type);
                let member_name = member_descriptor
                    .element_name
                    .as_deref()
                    .or(member_descriptor.type_name.as_deref())
                    .unwrap_or("item");
                let mut item = xs("element")
                    .with_attribute("name", member_name)
                    .with_attribute("type", self.type_ref(member_type)?);
                item = occurrence_attributes(item, registry.get(member));
                element.add_child(xs("sequence").with_child(item));
            }
            TypeKind::Complex | TypeKind::Fault => {
                let (base, fields) = self.content_fields(id);
                let body = self.complex_body(id, &fields)?;
                match base {
                    Some(base) => {
                        let mut extension = xs("extension").with_attribute("base", self.type_ref(base)?);
                        extension.children = body;
                        element.add_child(xs("complexContent").with_child(extension));
                    }
                    None => element.children.extend(body),
                }
            }
            TypeKind::Alias => {}
        }
        Ok(Some(element))
    }

    /// Extension base and the fields written inside the definition.
    /// Faults carry only their own fields; private ancestors are inlined.
    fn content_fields(&self, id: TypeId) -> (Option<TypeId>, Vec<&'a Field>) {
        let registry = self.interface.registry();
        let descriptor = registry.get(id);
        let mut fields: Vec<&Field> = descriptor.fields.values().collect();
        if descriptor.kind == TypeKind::Fault {
            return (None, fields);
        }
        let mut parent = registry.parent(id).map(|p| registry.wire_type(p));
        while let Some(p) = parent {
            let ancestor = registry.get(p);
            if !ancestor.private {
                break;
            }
            let mut inlined: Vec<&Field> = ancestor
                .fields
                .values()
                .filter(|f| !fields.iter().any(|own| own.name == f.name))
                .collect();
            inlined.extend(fields);
            fields = inlined;
            parent = registry.parent(p).map(|p| registry.wire_type(p));
        }
        (parent, fields)
    }

    fn complex_body(&self, owner: TypeId, fields: &[&Field]) -> Result<Vec<Element>> {
        let registry = self.interface.registry();
        let owner_ns = registry.get(owner).namespace.clone();
        let mut sequence = xs("sequence");
        let mut attributes = Vec::new();

        for field in fields {
            let field_id = registry.field_type(owner, field)?;
            let attrs = registry.get(field_id);
            if field.options.attribute {
                attributes.push(self.attribute(field, field_id)?);
                continue;
            }
            if field.options.attribute_of.is_some() {
                continue;
            }

            let target = self.schema_type(field_id)?;
            let mut element = match &field.options.sub_ns {
                Some(sub_ns) if Some(sub_ns) != owner_ns.as_ref() => xs("element")
                    .with_attribute("ref", format!("{}:{}", self.prefix(sub_ns)?, field.wire_name())),
                _ => xs("element").with_attribute("name", field.wire_name()),
            };
            let is_ref = element.get_attribute("ref").is_some();

            let carried: Vec<&Field> = fields
                .iter()
                .copied()
                .filter(|f| f.options.attribute_of.as_deref() == Some(field.name.as_str()))
                .collect();

            if carried.is_empty() || is_ref {
                if !is_ref {
                    element = element.with_attribute("type", self.type_ref(target)?);
                }
            } else {
                // Attributes of a sibling element need an inline extension of its type
                let content = if registry.get(target).kind.is_simple() {
                    "simpleContent"
                } else {
                    "complexContent"
                };
                let mut extension = xs("extension").with_attribute("base", self.type_ref(target)?);
                for attribute in carried {
                    let attribute_id = registry.field_type(owner, attribute)?;
                    extension.add_child(self.attribute(attribute, attribute_id)?);
                }
                element.add_child(xs("complexType").with_child(xs(content).with_child(extension)));
            }

            element = occurrence_attributes(element, attrs);
            if is_ref {
                element.attributes.shift_remove(&QName::local("nillable"));
            }
            if let Some(default) = &attrs.attributes.default {
                if !is_ref {
                    element = element.with_attribute("default", default.as_str());
                }
            }
            sequence.add_child(element);
        }

        let mut body = vec![sequence];
        body.extend(attributes);
        Ok(body)
    }

    fn attribute(&self, field: &Field, field_id: TypeId) -> Result<Element> {
        let registry = self.interface.registry();
        let attrs = &registry.get(field_id).attributes;
        let mut element = xs("attribute")
            .with_attribute("name", field.wire_name())
            .with_attribute("type", self.type_ref(self.schema_type(field_id)?)?);
        if attrs.occurs.min >= 1 {
            element = element.with_attribute("use", "required");
        }
        if let Some(default) = &attrs.default {
            element = element.with_attribute("default", default.as_str());
        }
        Ok(element)
    }
}

/// minOccurs/maxOccurs only when not 1, nillable only when true
fn occurrence_attributes(mut element: Element, descriptor: &crate::model::TypeDescriptor) -> Element {
    let attrs = &descriptor.attributes;
    if attrs.occurs.min != 1 {
        element = element.with_attribute("minOccurs", attrs.occurs.min_lexical());
    }
    if attrs.occurs.max != Some(1) {
        element = element.with_attribute("maxOccurs", attrs.occurs.max_lexical());
    }
    if attrs.nillable {
        element = element.with_attribute("nillable", "true");
    }
    element
}

fn facet(name: &str, value: impl Into<String>) -> Element {
    xs(name).with_attribute("value", value)
}

fn facet_elements(facets: &Facets) -> Vec<Element> {
    let mut elements = Vec::new();
    match (facets.min_len, facets.max_len) {
        (Some(min), Some(max)) if min == max => elements.push(facet("length", min.to_string())),
        (min, max) => {
            if let Some(min) = min {
                elements.push(facet("minLength", min.to_string()));
            }
            if let Some(max) = max {
                elements.push(facet("maxLength", max.to_string()));
            }
        }
    }
    if let Some(pattern) = &facets.pattern {
        elements.push(facet("pattern", pattern.as_str()));
    }
    for value in &facets.values {
        elements.push(facet("enumeration", value.as_str()));
    }
    if let Some(ge) = facets.ge {
        elements.push(facet("minInclusive", ge.to_string()));
    }
    if let Some(gt) = facets.gt {
        elements.push(facet("minExclusive", gt.to_string()));
    }
    if let Some(le) = facets.le {
        elements.push(facet("maxInclusive", le.to_string()));
    }
    if let Some(lt) = facets.lt {
        elements.push(facet("maxExclusive", lt.to_string()));
    }
    elements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::interface::{InterfaceBuilder, OperationSpec};
    use crate::model::{ComplexBuilder, Overrides, Primitive};

    fn person_interface(config: Config) -> Interface {
        let mut builder = InterfaceBuilder::new("urn:people").with_config(config);
        let registry = builder.registry();
        let string = registry.builtin(Primitive::String);
        let integer = registry.builtin(Primitive::Integer);
        let code = registry
            .derive(string, &Overrides::new().with_max_len(5))
            .unwrap();
        let required = registry
            .derive(integer, &Overrides::new().with_min_occurs(1).with_nillable(false))
            .unwrap();
        let numbers = registry.array_of(integer).unwrap();
        let person = ComplexBuilder::new(registry, "Person")
            .documentation("A person")
            .field("name", string)
            .field("code", code)
            .field("age", required)
            .field("lucky", numbers)
            .attribute("id", string)
            .finish()
            .unwrap();
        builder
            .add_operation(OperationSpec::rpc("getPerson").returns(person))
            .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_person_schema() {
        let interface = person_interface(Config::default());
        let set = SchemaBuilder::new(&interface).build().unwrap();
        assert_eq!(set.len(), 1);
        let xml = set.to_xml("urn:people").unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains(r#"targetNamespace="urn:people""#));
        assert!(xml.contains(r#"<xs:complexType name="Person">"#));
        assert!(xml.contains(r#"<xs:documentation>A person</xs:documentation>"#));
        assert!(xml.contains(
            r#"<xs:element name="name" type="xs:string" minOccurs="0" nillable="true"/>"#
        ));
        assert!(xml.contains(r#"<xs:element name="age" type="xs:integer"/>"#));
        assert!(xml.contains(r#"<xs:element name="code" type="tns:Person_codeType" minOccurs="0" nillable="true"/>"#));
        assert!(xml.contains(r#"<xs:simpleType name="Person_codeType">"#));
        assert!(xml.contains(r#"<xs:maxLength value="5"/>"#));
        assert!(xml.contains(r#"<xs:complexType name="integerArray">"#));
        assert!(xml.contains(
            r#"<xs:element name="integer" type="xs:integer" minOccurs="0" maxOccurs="unbounded" nillable="true"/>"#
        ));
        assert!(xml.contains(r#"<xs:attribute name="id" type="xs:string"/>"#));
        assert!(xml.contains(r#"<xs:element name="Person" type="tns:Person"/>"#));
        assert!(xml.contains(r#"<xs:element name="getPersonResponse" type="tns:getPersonResponse"/>"#));
        assert!(!xml.contains("xs:import"));
    }

    #[test]
    fn test_restriction_states_only_new_facets() {
        let mut builder = InterfaceBuilder::new("urn:codes");
        let registry = builder.registry();
        let string = registry.builtin(Primitive::String);
        let short = registry
            .derive(string, &Overrides::new().with_type_name("Short").with_max_len(8))
            .unwrap();
        let code = registry
            .derive(short, &Overrides::new().with_type_name("Code").with_pattern("[A-Z]+"))
            .unwrap();
        let holder = ComplexBuilder::new(registry, "Holder")
            .field("code", code)
            .finish()
            .unwrap();
        builder.add_type(holder);
        let interface = builder.build().unwrap();
        let xml = SchemaBuilder::new(&interface)
            .build()
            .unwrap()
            .to_xml("urn:codes")
            .unwrap();

        let start = xml.find(r#"<xs:simpleType name="Code">"#).unwrap();
        let end = start + xml[start..].find("</xs:simpleType>").unwrap();
        let code = &xml[start..end];
        assert!(code.contains(r#"<xs:restriction base="tns:Short">"#));
        assert!(code.contains(r#"<xs:pattern value="[A-Z]+"/>"#));
        assert!(!code.contains("maxLength"));

        let start = xml.find(r#"<xs:simpleType name="Short">"#).unwrap();
        assert!(xml[start..].contains(r#"<xs:maxLength value="8"/>"#));
    }

    #[test]
    fn test_emission_is_deterministic() {
        let first = SchemaBuilder::new(&person_interface(Config::default()))
            .build()
            .unwrap()
            .to_strings()
            .unwrap();
        let second = SchemaBuilder::new(&person_interface(Config::default()))
            .build()
            .unwrap()
            .to_strings()
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_documentation_can_be_disabled() {
        let mut config = Config::default();
        config.schema.documentation = false;
        let interface = person_interface(config);
        let xml = SchemaBuilder::new(&interface)
            .build()
            .unwrap()
            .to_xml("urn:people")
            .unwrap();
        assert!(!xml.contains("xs:annotation"));
    }

    #[test]
    fn test_cross_namespace_import_and_location() {
        let mut config = Config::default();
        config.schema.schema_locations = true;
        let mut builder = InterfaceBuilder::new("urn:main").with_config(config);
        let registry = builder.registry();
        let string = registry.builtin(Primitive::String);
        let address = ComplexBuilder::new(registry, "Address")
            .namespace("urn:geo")
            .field("city", string)
            .finish()
            .unwrap();
        let customer = ComplexBuilder::new(registry, "Customer")
            .field("address", address)
            .finish()
            .unwrap();
        builder.add_type(customer);
        let interface = builder.build().unwrap();
        let set = SchemaBuilder::new(&interface).build().unwrap();

        let main = set.to_xml("urn:main").unwrap();
        assert!(main.contains(r#"xmlns:s0="urn:geo""#));
        assert!(main.contains(r#"<xs:import namespace="urn:geo" schemaLocation="s0.xsd"/>"#));
        assert!(main.contains(r#"type="s0:Address""#));
        let geo = set.to_xml("urn:geo").unwrap();
        assert!(geo.contains(r#"<xs:element name="Address" type="s0:Address"/>"#));
    }

    #[test]
    fn test_attribute_of_sibling_and_extension() {
        let mut builder = InterfaceBuilder::new("urn:x");
        let registry = builder.registry();
        let string = registry.builtin(Primitive::String);
        let base = ComplexBuilder::new(registry, "Base")
            .field("id", string)
            .finish()
            .unwrap();
        let label = ComplexBuilder::new(registry, "Label")
            .extends(base)
            .field("text", string)
            .attribute_of("lang", string, "text")
            .finish()
            .unwrap();
        builder.add_type(label);
        let interface = builder.build().unwrap();
        let xml = SchemaBuilder::new(&interface)
            .build()
            .unwrap()
            .to_xml("urn:x")
            .unwrap();

        assert!(xml.contains(r#"<xs:extension base="tns:Base">"#));
        assert!(xml.contains(r#"<xs:element name="text" minOccurs="0" nillable="true">"#));
        assert!(xml.contains(r#"<xs:simpleContent>"#));
        assert!(xml.contains(r#"<xs:extension base="xs:string">"#));
        assert!(xml.contains(r#"<xs:attribute name="lang" type="xs:string"/>"#));
    }

    #[test]
    fn test_private_parent_inlined() {
        let mut builder = InterfaceBuilder::new("urn:x");
        let registry = builder.registry();
        let string = registry.builtin(Primitive::String);
        let hidden = ComplexBuilder::new(registry, "Hidden")
            .private()
            .field("secret", string)
            .finish()
            .unwrap();
        let shown = ComplexBuilder::new(registry, "Shown")
            .extends(hidden)
            .field("open", string)
            .finish()
            .unwrap();
        builder.add_type(shown);
        let interface = builder.build().unwrap();
        let xml = SchemaBuilder::new(&interface)
            .build()
            .unwrap()
            .to_xml("urn:x")
            .unwrap();
        assert!(!xml.contains("complexContent"));
        let secret = xml.find(r#"name="secret""#).unwrap();
        let open = xml.find(r#"name="open""#).unwrap();
        assert!(secret < open);
    }
}
