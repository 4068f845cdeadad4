//! Type descriptors
//!
//! Descriptors live in a [`crate::model::TypeRegistry`] arena and refer
//! to each other through [`TypeId`] handles, so recursive shapes never
//! form pointer cycles.

use crate::model::facets::Attributes;
use crate::model::primitive::Primitive;
use crate::namespaces::QName;
use indexmap::IndexMap;
use std::fmt;

/// Stable handle of a descriptor inside its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    /// Arena index
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shape category; the codec and schema builder dispatch on it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Built-in or restricted simple type
    Simple,
    /// Record with ordered fields
    Complex,
    /// String restricted to enumerated literals
    Enum,
    /// Wrapper around a repeated member
    Array,
    /// Fault detail record
    Fault,
    /// Element name bound to another type
    Alias,
}

impl TypeKind {
    /// Whether values are records with fields
    pub fn has_fields(&self) -> bool {
        matches!(self, TypeKind::Complex | TypeKind::Fault)
    }

    /// Whether values are written as element text
    pub fn is_simple(&self) -> bool {
        matches!(self, TypeKind::Simple | TypeKind::Enum)
    }
}

/// Reference from a field (or parent, or array member) to a type
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    /// Points at a registered descriptor
    Resolved(TypeId),
    /// The descriptor being built; replaced by its own id on finish
    SelfRef,
    /// Named type not yet known (schema parsing)
    Pending(QName),
}

impl TypeRef {
    /// Resolved id, if any
    pub fn id(&self) -> Option<TypeId> {
        match self {
            TypeRef::Resolved(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<TypeId> for TypeRef {
    fn from(id: TypeId) -> Self {
        TypeRef::Resolved(id)
    }
}

/// Wire-level options of a field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldOptions {
    /// Element or attribute name on the wire, if different from the field name
    pub sub_name: Option<String>,
    /// Namespace of the element, if different from the owner's
    pub sub_ns: Option<String>,
    /// Written as an XML attribute of the owning element
    pub attribute: bool,
    /// Written as an attribute of this sibling field's element
    pub attribute_of: Option<String>,
}

impl FieldOptions {
    /// Whether the field is any kind of XML attribute
    pub fn is_attribute(&self) -> bool {
        self.attribute || self.attribute_of.is_some()
    }
}

/// A named field of a complex descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Field name
    pub name: String,
    /// Field type; occurrence bounds come from the referenced descriptor
    pub ty: TypeRef,
    /// Wire options
    pub options: FieldOptions,
}

impl Field {
    /// Create an element field
    pub fn new(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            options: FieldOptions::default(),
        }
    }

    /// Name used on the wire
    pub fn wire_name(&self) -> &str {
        self.options.sub_name.as_deref().unwrap_or(&self.name)
    }
}

/// Schema-level description of one data shape
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    /// Shape category
    pub kind: TypeKind,
    /// Target namespace; assigned by the resolver when None
    pub namespace: Option<String>,
    /// Type name; synthesized by the resolver when None
    pub type_name: Option<String>,
    /// Native representation of simple and enum types
    pub primitive: Option<Primitive>,
    /// Nillable, occurrence bounds, default and facets
    pub attributes: Attributes,
    /// Ordered fields of complex and fault types
    pub fields: IndexMap<String, Field>,
    /// Array member or alias target
    pub item: Option<TypeRef>,
    /// Parent type (complex extension or simple restriction base)
    pub extends: Option<TypeRef>,
    /// Set on occurrence-only customizations: the type whose wire identity this shares
    pub variant_of: Option<TypeId>,
    /// Parent fields are inlined into subtypes instead of extended
    pub private: bool,
    /// Global element name, when different from the type name
    pub element_name: Option<String>,
    /// Documentation emitted as an annotation
    pub documentation: Option<String>,
}

impl TypeDescriptor {
    /// Empty descriptor of the given kind with default attributes
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            namespace: None,
            type_name: None,
            primitive: None,
            attributes: Attributes::default(),
            fields: IndexMap::new(),
            item: None,
            extends: None,
            variant_of: None,
            private: false,
            element_name: None,
            documentation: None,
        }
    }

    /// Simple descriptor of a primitive
    pub fn simple(primitive: Primitive) -> Self {
        let mut descriptor = Self::new(TypeKind::Simple);
        descriptor.primitive = Some(primitive);
        descriptor
    }

    /// Set namespace and name
    pub fn named(mut self, namespace: Option<&str>, type_name: &str) -> Self {
        self.namespace = namespace.map(str::to_string);
        self.type_name = Some(type_name.to_string());
        self
    }

    /// Qualified name when both parts are known
    pub fn qname(&self) -> Option<QName> {
        match (&self.namespace, &self.type_name) {
            (Some(ns), Some(name)) => Some(QName::namespaced(ns.as_str(), name.as_str())),
            _ => None,
        }
    }

    /// Display name for diagnostics
    pub fn display_name(&self) -> String {
        match (&self.namespace, &self.type_name) {
            (Some(ns), Some(name)) => format!("{{{}}}{}", ns, name),
            (None, Some(name)) => name.clone(),
            _ => format!("<anonymous {:?}>", self.kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_wire_name() {
        let mut field = Field::new("name", TypeId(0));
        assert_eq!(field.wire_name(), "name");
        field.options.sub_name = Some("Name".to_string());
        assert_eq!(field.wire_name(), "Name");
        assert!(!field.options.is_attribute());
    }

    #[test]
    fn test_descriptor_names() {
        let descriptor = TypeDescriptor::simple(Primitive::String).named(Some("urn:a"), "Code");
        assert_eq!(descriptor.qname(), Some(QName::namespaced("urn:a", "Code")));
        assert_eq!(descriptor.display_name(), "{urn:a}Code");
        assert!(TypeDescriptor::new(TypeKind::Complex).qname().is_none());
    }

    #[test]
    fn test_kind_predicates() {
        assert!(TypeKind::Fault.has_fields());
        assert!(TypeKind::Enum.is_simple());
        assert!(!TypeKind::Array.has_fields());
    }
}
