//! Two-phase construction of descriptors
//!
//! Fields are declared first; [`ComplexBuilder::finish`] then resolves
//! self-references, checks inheritance and registers the result.

use crate::error::{Error, Result};
use crate::model::descriptor::{Field, FieldOptions, TypeDescriptor, TypeId, TypeKind, TypeRef};
use crate::model::facets::Overrides;
use crate::model::primitive::Primitive;
use crate::model::registry::TypeRegistry;
use crate::names::validate_ncname;

/// Declares a complex or fault type field by field
#[derive(Debug)]
pub struct ComplexBuilder<'r> {
    registry: &'r mut TypeRegistry,
    descriptor: TypeDescriptor,
    parents: usize,
    problems: Vec<String>,
}

impl<'r> ComplexBuilder<'r> {
    /// Start a named complex type
    pub fn new(registry: &'r mut TypeRegistry, name: impl Into<String>) -> Self {
        let mut builder = Self::anonymous(registry);
        builder.descriptor.type_name = Some(name.into());
        builder
    }

    /// Start a complex type whose name the resolver synthesizes
    pub fn anonymous(registry: &'r mut TypeRegistry) -> Self {
        Self {
            registry,
            descriptor: TypeDescriptor::new(TypeKind::Complex),
            parents: 0,
            problems: Vec::new(),
        }
    }

    /// Start a fault detail type
    pub fn fault(registry: &'r mut TypeRegistry, name: impl Into<String>) -> Self {
        let mut builder = Self::new(registry, name);
        builder.descriptor.kind = TypeKind::Fault;
        builder
    }

    /// Registry being built into
    pub fn registry(&mut self) -> &mut TypeRegistry {
        &mut *self.registry
    }

    /// Set the target namespace
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.descriptor.namespace = Some(namespace.into());
        self
    }

    /// Add an element field
    pub fn field(self, name: impl Into<String>, ty: TypeId) -> Self {
        self.field_with(name, ty, FieldOptions::default())
    }

    /// Add an element field with wire options
    pub fn field_with(mut self, name: impl Into<String>, ty: TypeId, options: FieldOptions) -> Self {
        self.push(name.into(), TypeRef::Resolved(ty), options);
        self
    }

    /// Add a field typed as the type being built
    pub fn self_field(mut self, name: impl Into<String>) -> Self {
        self.push(name.into(), TypeRef::SelfRef, FieldOptions::default());
        self
    }

    /// Add an array field whose members are the type being built
    pub fn self_array(mut self, name: impl Into<String>) -> Self {
        let mut array = TypeDescriptor::new(TypeKind::Array);
        array.item = Some(TypeRef::SelfRef);
        let id = self.registry.add(array);
        self.push(name.into(), TypeRef::Resolved(id), FieldOptions::default());
        self
    }

    /// Add a field written as an attribute of this type's element
    pub fn attribute(mut self, name: impl Into<String>, ty: TypeId) -> Self {
        let options = FieldOptions {
            attribute: true,
            ..FieldOptions::default()
        };
        self.push(name.into(), TypeRef::Resolved(ty), options);
        self
    }

    /// Add a field written as an attribute of the `sibling` field's element
    pub fn attribute_of(
        mut self,
        name: impl Into<String>,
        ty: TypeId,
        sibling: impl Into<String>,
    ) -> Self {
        let options = FieldOptions {
            attribute_of: Some(sibling.into()),
            ..FieldOptions::default()
        };
        self.push(name.into(), TypeRef::Resolved(ty), options);
        self
    }

    /// Set the parent type
    pub fn extends(mut self, parent: TypeId) -> Self {
        self.parents += 1;
        self.descriptor.extends = Some(TypeRef::Resolved(parent));
        self
    }

    /// Inline this type's fields into subtypes instead of being extended
    pub fn private(mut self) -> Self {
        self.descriptor.private = true;
        self
    }

    /// Set nillable
    pub fn nillable(mut self, nillable: bool) -> Self {
        self.descriptor.attributes.nillable = nillable;
        self
    }

    /// Set minOccurs used when the type appears as a field
    pub fn min_occurs(mut self, min: u32) -> Self {
        self.descriptor.attributes.occurs.min = min;
        self
    }

    /// Name of the global element, when different from the type name
    pub fn element_name(mut self, name: impl Into<String>) -> Self {
        self.descriptor.element_name = Some(name.into());
        self
    }

    /// Attach documentation
    pub fn documentation(mut self, text: impl Into<String>) -> Self {
        self.descriptor.documentation = Some(text.into());
        self
    }

    fn push(&mut self, name: String, ty: TypeRef, options: FieldOptions) {
        if self.descriptor.fields.contains_key(&name) {
            self.problems.push(format!("field '{}' is declared twice", name));
            return;
        }
        let field = Field {
            name: name.clone(),
            ty,
            options,
        };
        self.descriptor.fields.insert(name, field);
    }

    fn validate(&self) -> Result<()> {
        if let Some(problem) = self.problems.first() {
            return Err(Error::Name(format!(
                "{}: {}",
                self.descriptor.display_name(),
                problem
            )));
        }
        if self.parents > 1 {
            return Err(Error::Type(format!(
                "{} declares {} parents; only single inheritance is supported",
                self.descriptor.display_name(),
                self.parents
            )));
        }
        if let Some(name) = &self.descriptor.type_name {
            validate_ncname(name)?;
        }
        for field in self.descriptor.fields.values() {
            validate_ncname(field.wire_name())?;
            if let Some(sibling) = &field.options.attribute_of {
                let target = self.descriptor.fields.get(sibling);
                if !matches!(target, Some(t) if !t.options.is_attribute()) {
                    return Err(Error::Name(format!(
                        "attribute '{}' of {} refers to unknown element field '{}'",
                        field.name,
                        self.descriptor.display_name(),
                        sibling
                    )));
                }
            }
        }
        Ok(())
    }

    /// Store, resolve self-references and register the type
    pub fn finish(self) -> Result<TypeId> {
        self.validate()?;
        let registry = self.registry;
        let id = registry.add(self.descriptor);
        registry.resolve_self_references(id)?;
        registry.check_inheritance(id)?;
        registry.register_or_redirect(id)
    }
}

impl TypeRegistry {
    /// Register a string enumeration
    pub fn enumeration<I, S>(&mut self, name: &str, namespace: Option<&str>, values: I) -> Result<TypeId>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        validate_ncname(name)?;
        let mut descriptor = TypeDescriptor::new(TypeKind::Enum).named(namespace, name);
        descriptor.primitive = Some(Primitive::String);
        descriptor.attributes.facets.values = values.into_iter().map(Into::into).collect();
        if descriptor.attributes.facets.values.is_empty() {
            return Err(Error::Value(format!("enumeration {} has no values", name)));
        }
        let id = self.add(descriptor);
        self.register_or_redirect(id)
    }

    /// Register a named restriction of a simple type
    pub fn restriction(&mut self, name: &str, namespace: Option<&str>, base: TypeId, facets: &Overrides) -> Result<TypeId> {
        let overrides = facets.clone().with_type_name(name);
        let id = self.derive(base, &overrides)?;
        self.get_mut(id).namespace = namespace.map(str::to_string);
        self.register_or_redirect(id)
    }

    /// Register an element name bound to `target`
    pub fn alias(&mut self, name: &str, namespace: Option<&str>, target: TypeId) -> Result<TypeId> {
        validate_ncname(name)?;
        let mut descriptor = TypeDescriptor::new(TypeKind::Alias).named(namespace, name);
        descriptor.item = Some(TypeRef::Resolved(target));
        let id = self.add(descriptor);
        self.register_or_redirect(id)
    }

    /// Register a named array of `member`
    pub fn named_array(&mut self, name: &str, namespace: Option<&str>, member: TypeId) -> Result<TypeId> {
        let id = self.array_of(member)?;
        let descriptor = self.get_mut(id);
        descriptor.type_name = Some(name.to_string());
        descriptor.namespace = namespace.map(str::to_string);
        self.register_or_redirect(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces::QName;

    #[test]
    fn test_builder_registers() {
        let mut registry = TypeRegistry::new();
        let string = registry.builtin(Primitive::String);
        let id = ComplexBuilder::new(&mut registry, "Person")
            .namespace("urn:a")
            .field("name", string)
            .finish()
            .unwrap();
        assert_eq!(registry.lookup("urn:a", "Person"), Some(id));
        assert_eq!(registry.get(id).fields.len(), 1);
    }

    #[test]
    fn test_self_field_points_at_owner() {
        let mut registry = TypeRegistry::new();
        let string = registry.builtin(Primitive::String);
        let id = ComplexBuilder::new(&mut registry, "Category")
            .field("name", string)
            .self_field("self")
            .self_array("children")
            .finish()
            .unwrap();
        let descriptor = registry.get(id);
        assert_eq!(descriptor.fields["self"].ty, TypeRef::Resolved(id));

        let array = registry.field_type(id, &descriptor.fields["children"]).unwrap();
        let member = registry.item_type(array).unwrap();
        assert_eq!(registry.wire_type(member), id);
        assert_eq!(registry.get(member).attributes.occurs.max, None);
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let mut registry = TypeRegistry::new();
        let string = registry.builtin(Primitive::String);
        let result = ComplexBuilder::new(&mut registry, "Dup")
            .field("a", string)
            .field("a", string)
            .finish();
        assert!(matches!(result, Err(Error::Name(_))));
    }

    #[test]
    fn test_single_inheritance_enforced() {
        let mut registry = TypeRegistry::new();
        let a = ComplexBuilder::new(&mut registry, "A").namespace("urn:a").finish().unwrap();
        let b = ComplexBuilder::new(&mut registry, "B").namespace("urn:a").finish().unwrap();
        let result = ComplexBuilder::new(&mut registry, "C").extends(a).extends(b).finish();
        assert!(matches!(result, Err(Error::Type(_))));
    }

    #[test]
    fn test_attribute_of_requires_element_sibling() {
        let mut registry = TypeRegistry::new();
        let string = registry.builtin(Primitive::String);
        let result = ComplexBuilder::new(&mut registry, "Label")
            .attribute_of("lang", string, "text")
            .finish();
        assert!(matches!(result, Err(Error::Name(_))));

        let ok = ComplexBuilder::new(&mut registry, "Label")
            .field("text", string)
            .attribute_of("lang", string, "text")
            .finish();
        assert!(ok.is_ok());
    }

    #[test]
    fn test_enumeration_and_alias() {
        let mut registry = TypeRegistry::new();
        let color = registry
            .enumeration("Color", Some("urn:a"), ["red", "green"])
            .unwrap();
        assert_eq!(registry.get(color).kind, TypeKind::Enum);
        assert_eq!(registry.get(color).attributes.facets.values, vec!["red", "green"]);

        let alias = registry.alias("Favorite", Some("urn:a"), color).unwrap();
        assert_eq!(registry.item_type(alias).unwrap(), color);
        assert_eq!(
            registry.type_qname(alias),
            Some(QName::namespaced("urn:a", "Favorite"))
        );
        assert!(registry.enumeration("Empty", None, Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_named_restriction() {
        let mut registry = TypeRegistry::new();
        let string = registry.builtin(Primitive::String);
        let code = registry
            .restriction("Code", Some("urn:a"), string, &Overrides::new().with_length(3))
            .unwrap();
        assert_eq!(registry.lookup("urn:a", "Code"), Some(code));
        assert_eq!(registry.parent(code), Some(string));
    }
}
