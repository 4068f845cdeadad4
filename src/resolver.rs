//! Namespace resolution
//!
//! Finalizes the registry for everything reachable from a set of root
//! types: namespaces for types that lack one, synthesized names for
//! anonymous types and arrays, prefixes and the cross-namespace import
//! graph. Running it again over a resolved registry changes nothing.

use crate::config::NamingConfig;
use crate::error::{Error, Result};
use crate::model::{TypeId, TypeKind, TypeRef, TypeRegistry};
use crate::names::{anonymous_type_name, array_type_name, numbered};
use crate::namespaces::{is_builtin_namespace, QName, WELL_KNOWN_PREFIXES};
use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Prefix reserved for the target namespace
pub const TARGET_NAMESPACE_PREFIX: &str = "tns";

/// Types and global elements of one namespace
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamespaceSchema {
    /// Named types in discovery order
    pub types: IndexMap<String, TypeId>,
    /// Global elements in discovery order
    pub elements: IndexMap<String, TypeId>,
}

/// Output of resolution: prefixes, per-namespace contents and imports
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamespaceRegistry {
    prefixes: IndexMap<String, String>,
    namespaces: IndexMap<String, String>,
    schemas: IndexMap<String, NamespaceSchema>,
    imports: BTreeMap<String, BTreeSet<String>>,
}

impl NamespaceRegistry {
    /// Prefix of a namespace
    pub fn prefix(&self, namespace: &str) -> Option<&str> {
        self.prefixes.get(namespace).map(|s| s.as_str())
    }

    /// Namespace bound to a prefix
    pub fn namespace(&self, prefix: &str) -> Option<&str> {
        self.namespaces.get(prefix).map(|s| s.as_str())
    }

    /// namespace → prefix map in allocation order
    pub fn prefixes(&self) -> &IndexMap<String, String> {
        &self.prefixes
    }

    /// Per-namespace contents, sorted by namespace
    pub fn schemas(&self) -> &IndexMap<String, NamespaceSchema> {
        &self.schemas
    }

    /// Contents of one namespace
    pub fn schema(&self, namespace: &str) -> Option<&NamespaceSchema> {
        self.schemas.get(namespace)
    }

    /// Namespaces referenced from `namespace`
    pub fn imports(&self, namespace: &str) -> impl Iterator<Item = &str> {
        self.imports
            .get(namespace)
            .into_iter()
            .flat_map(|set| set.iter().map(|s| s.as_str()))
    }

    /// Type of a global element
    pub fn element(&self, qname: &QName) -> Option<TypeId> {
        let schema = self.schemas.get(qname.namespace()?)?;
        schema.elements.get(&qname.local_name).copied()
    }
}

/// Assigns namespaces, names and prefixes
#[derive(Debug, Clone)]
pub struct NamespaceResolver<'c> {
    naming: &'c NamingConfig,
    import_base_namespaces: bool,
}

impl<'c> NamespaceResolver<'c> {
    /// Create a resolver with the given naming suffixes
    pub fn new(naming: &'c NamingConfig) -> Self {
        Self {
            naming,
            import_base_namespaces: false,
        }
    }

    /// Also record imports of the built-in namespaces
    pub fn with_import_base_namespaces(mut self, import: bool) -> Self {
        self.import_base_namespaces = import;
        self
    }

    /// Finalize everything reachable from `roots`
    pub fn resolve(
        &self,
        registry: &mut TypeRegistry,
        target_namespace: &str,
        roots: &[TypeId],
    ) -> Result<NamespaceRegistry> {
        let reachable = collect(registry, roots);
        self.assign_namespaces(registry, target_namespace, &reachable)?;

        // Declared names claim their slots before synthesized ones
        for id in &reachable {
            if registry.get(*id).type_name.is_some() {
                registry.register_or_redirect(*id)?;
            }
        }
        self.assign_names(registry, &reachable)?;

        let reachable = collect(registry, roots);
        verify(registry, &reachable)?;
        Ok(self.build(registry, target_namespace, &reachable))
    }

    fn assign_namespaces(
        &self,
        registry: &mut TypeRegistry,
        target_namespace: &str,
        reachable: &[TypeId],
    ) -> Result<()> {
        let mut arrays = Vec::new();
        for id in reachable {
            let descriptor = registry.get_mut(*id);
            if descriptor.namespace.is_some() {
                continue;
            }
            if descriptor.kind == TypeKind::Array {
                arrays.push(*id);
            } else {
                descriptor.namespace = Some(target_namespace.to_string());
            }
        }

        // Arrays live in their member's namespace; members may be arrays too
        let bound = arrays.len() + 1;
        let mut passes = 0;
        while !arrays.is_empty() {
            passes += 1;
            if passes > bound {
                return Err(Error::NamespaceCycleExceeded(format!(
                    "{} array types still lack a namespace after {} passes",
                    arrays.len(),
                    bound
                )));
            }
            let mut left = Vec::new();
            for id in &arrays {
                let member = registry.wire_type(registry.item_type(*id)?);
                match registry.get(member).namespace.clone() {
                    Some(ns) => {
                        let ns = if is_builtin_namespace(&ns) {
                            target_namespace.to_string()
                        } else {
                            ns
                        };
                        registry.get_mut(*id).namespace = Some(ns);
                    }
                    None => left.push(*id),
                }
            }
            if left.len() == arrays.len() {
                return Err(Error::NamespaceCycleExceeded(format!(
                    "array member namespaces form a cycle through {}",
                    registry.get(left[0]).display_name()
                )));
            }
            arrays = left;
        }
        Ok(())
    }

    fn assign_names(&self, registry: &mut TypeRegistry, reachable: &[TypeId]) -> Result<()> {
        loop {
            let mut changed = false;

            for owner in reachable {
                let owner = registry.wire_type(*owner);
                let owner_descriptor = registry.get(owner);
                if !owner_descriptor.kind.has_fields() {
                    continue;
                }
                let owner_name = match &owner_descriptor.type_name {
                    Some(name) => name.clone(),
                    None => continue,
                };
                let field_types: Vec<(String, TypeId)> = owner_descriptor
                    .fields
                    .values()
                    .filter_map(|f| f.ty.id().map(|id| (f.name.clone(), registry.wire_type(id))))
                    .collect();

                for (field_name, ty) in field_types {
                    let inner = if registry.get(ty).kind == TypeKind::Array {
                        registry.wire_type(registry.item_type(ty)?)
                    } else {
                        ty
                    };
                    if registry.get(inner).type_name.is_none() {
                        let name =
                            anonymous_type_name(&owner_name, &field_name, &self.naming.type_suffix);
                        self.synthesize(registry, inner, &name)?;
                        changed = true;
                    }
                }
            }

            for id in reachable {
                let id = registry.wire_type(*id);
                let descriptor = registry.get(id);
                if descriptor.kind != TypeKind::Array || descriptor.type_name.is_some() {
                    continue;
                }
                let member = registry.wire_type(registry.item_type(id)?);
                if let Some(member_name) = registry.get(member).type_name.clone() {
                    let name = array_type_name(&member_name, &self.naming.array_suffix);
                    self.synthesize(registry, id, &name)?;
                    changed = true;
                }
            }

            if !changed {
                break;
            }
        }

        for id in reachable {
            let id = registry.wire_type(*id);
            if registry.get(id).type_name.is_none() {
                return Err(Error::Name(format!(
                    "cannot synthesize a name for {}; name it or use it as a field",
                    registry.get(id).display_name()
                )));
            }
        }
        Ok(())
    }

    /// Name `id` after `base`, adding a counter while a different type holds the name
    fn synthesize(&self, registry: &mut TypeRegistry, id: TypeId, base: &str) -> Result<()> {
        let mut n = 0;
        loop {
            let candidate = if n == 0 {
                base.to_string()
            } else {
                numbered(base, n)
            };
            registry.get_mut(id).type_name = Some(candidate.clone());
            match registry.register_or_redirect(id) {
                Ok(_) => {
                    tracing::debug!(name = %candidate, %id, "synthesized type name");
                    return Ok(());
                }
                Err(Error::DuplicateType { .. }) => n += 1,
                Err(e) => return Err(e),
            }
        }
    }

    fn build(
        &self,
        registry: &TypeRegistry,
        target_namespace: &str,
        reachable: &[TypeId],
    ) -> NamespaceRegistry {
        let mut result = NamespaceRegistry::default();

        for (prefix, ns) in WELL_KNOWN_PREFIXES {
            result.bind(ns, prefix);
        }
        result.bind(target_namespace, TARGET_NAMESPACE_PREFIX);

        let mut sorted: Vec<(String, String, TypeId)> = reachable
            .iter()
            .filter_map(|id| {
                let d = registry.get(*id);
                Some((d.namespace.clone()?, d.type_name.clone()?, *id))
            })
            .collect();
        sorted.sort();

        let mut counter = 0;
        let mut namespaces: Vec<String> = sorted.iter().map(|(ns, _, _)| ns.clone()).collect();
        for id in reachable {
            for field in registry.get(*id).fields.values() {
                if let Some(ns) = &field.options.sub_ns {
                    namespaces.push(ns.clone());
                }
            }
        }
        for ns in namespaces {
            if result.prefix(&ns).is_none() {
                result.bind(&ns, &format!("s{}", counter));
                counter += 1;
            }
        }

        let mut keys: Vec<&String> = result.prefixes.keys().collect();
        keys.sort();
        let owned: Vec<String> = keys
            .into_iter()
            .filter(|ns| !is_builtin_namespace(ns))
            .cloned()
            .collect();
        for ns in owned {
            result.schemas.insert(ns, NamespaceSchema::default());
        }

        for id in reachable {
            let descriptor = registry.get(*id);
            let (ns, name) = match (&descriptor.namespace, &descriptor.type_name) {
                (Some(ns), Some(name)) => (ns.clone(), name.clone()),
                _ => continue,
            };
            if is_builtin_namespace(&ns) {
                continue;
            }
            let schema = result.schemas.entry(ns.clone()).or_default();
            if descriptor.kind != TypeKind::Alias {
                schema.types.insert(name.clone(), *id);
            }
            if matches!(
                descriptor.kind,
                TypeKind::Complex | TypeKind::Fault | TypeKind::Alias
            ) {
                let element = descriptor.element_name.clone().unwrap_or(name);
                schema.elements.entry(element).or_insert(*id);
            }

            let mut referenced = Vec::new();
            for field in descriptor.fields.values() {
                if let Some(target) = field.ty.id() {
                    let target = registry.wire_type(target);
                    match &field.options.sub_ns {
                        Some(sub_ns) if *sub_ns != ns => {
                            referenced.push(sub_ns.clone());
                            let other = result.schemas.entry(sub_ns.clone()).or_default();
                            other
                                .elements
                                .entry(field.wire_name().to_string())
                                .or_insert(target);
                            if let Some(target_ns) = &registry.get(target).namespace {
                                if target_ns != sub_ns {
                                    self.add_import(&mut result, sub_ns, target_ns);
                                }
                            }
                        }
                        _ => {
                            if let Some(target_ns) = &registry.get(target).namespace {
                                referenced.push(target_ns.clone());
                            }
                        }
                    }
                }
            }
            for reference in [&descriptor.item, &descriptor.extends].into_iter().flatten() {
                if let TypeRef::Resolved(target) = reference {
                    let target = registry.wire_type(*target);
                    if let Some(target_ns) = &registry.get(target).namespace {
                        referenced.push(target_ns.clone());
                    }
                }
            }
            for other in referenced {
                if other != ns {
                    self.add_import(&mut result, &ns, &other);
                }
            }
        }

        tracing::debug!(
            namespaces = result.schemas.len(),
            prefixes = result.prefixes.len(),
            "resolved namespaces"
        );
        result
    }

    fn add_import(&self, result: &mut NamespaceRegistry, from: &str, to: &str) {
        if is_builtin_namespace(to) && !self.import_base_namespaces {
            return;
        }
        result
            .imports
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
    }
}

impl NamespaceRegistry {
    fn bind(&mut self, namespace: &str, prefix: &str) {
        if self.prefixes.contains_key(namespace) {
            return;
        }
        self.prefixes.insert(namespace.to_string(), prefix.to_string());
        self.namespaces.insert(prefix.to_string(), namespace.to_string());
    }
}

/// Wire types reachable from `roots`, depth-first in declaration order
fn collect(registry: &TypeRegistry, roots: &[TypeId]) -> Vec<TypeId> {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    let mut stack: Vec<TypeId> = roots.iter().rev().map(|id| registry.wire_type(*id)).collect();

    while let Some(id) = stack.pop() {
        let id = registry.wire_type(id);
        if !seen.insert(id) {
            continue;
        }
        order.push(id);
        let descriptor = registry.get(id);
        let mut children: Vec<TypeId> = Vec::new();
        if let Some(TypeRef::Resolved(parent)) = &descriptor.extends {
            children.push(*parent);
        }
        children.extend(descriptor.fields.values().filter_map(|f| f.ty.id()));
        if let Some(TypeRef::Resolved(item)) = &descriptor.item {
            children.push(*item);
        }
        stack.extend(children.into_iter().rev().map(|c| registry.wire_type(c)));
    }
    order
}

/// Every reference must be resolved before the registry is shared
fn verify(registry: &TypeRegistry, reachable: &[TypeId]) -> Result<()> {
    for id in reachable {
        let descriptor = registry.get(*id);
        for field in descriptor.fields.values() {
            registry.field_type(*id, field)?;
        }
        if let Some(item) = &descriptor.item {
            registry.target(*id, "item", item)?;
        }
        if let Some(extends) = &descriptor.extends {
            registry.target(*id, "base", extends)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ComplexBuilder, Overrides, Primitive};
    use crate::namespaces::XSD_NAMESPACE;

    fn resolve(registry: &mut TypeRegistry, roots: &[TypeId]) -> NamespaceRegistry {
        let naming = NamingConfig::default();
        NamespaceResolver::new(&naming)
            .resolve(registry, "urn:tns", roots)
            .unwrap()
    }

    #[test]
    fn test_default_namespace_and_array_names() {
        let mut registry = TypeRegistry::new();
        let integer = registry.builtin(Primitive::Integer);
        let numbers = registry.array_of(integer).unwrap();
        let holder = ComplexBuilder::new(&mut registry, "Holder")
            .field("numbers", numbers)
            .finish()
            .unwrap();

        let namespaces = resolve(&mut registry, &[holder]);
        assert_eq!(registry.get(holder).namespace.as_deref(), Some("urn:tns"));
        assert_eq!(
            registry.type_qname(numbers),
            Some(QName::namespaced("urn:tns", "integerArray"))
        );
        assert_eq!(namespaces.prefix("urn:tns"), Some("tns"));
        assert_eq!(namespaces.prefix(XSD_NAMESPACE), Some("xs"));
        let schema = namespaces.schema("urn:tns").unwrap();
        assert!(schema.types.contains_key("integerArray"));
        assert!(schema.elements.contains_key("Holder"));
        assert_eq!(namespaces.imports("urn:tns").count(), 0);
    }

    #[test]
    fn test_anonymous_inner_type_name() {
        let mut registry = TypeRegistry::new();
        let string = registry.builtin(Primitive::String);
        let code = registry.derive(string, &Overrides::new().with_max_len(4)).unwrap();
        let address = ComplexBuilder::anonymous(&mut registry)
            .field("city", string)
            .finish()
            .unwrap();
        let person = ComplexBuilder::new(&mut registry, "Person")
            .field("code", code)
            .field("address", address)
            .finish()
            .unwrap();

        resolve(&mut registry, &[person]);
        assert_eq!(registry.get(code).type_name.as_deref(), Some("Person_codeType"));
        assert_eq!(registry.get(address).type_name.as_deref(), Some("Person_addressType"));
    }

    #[test]
    fn test_array_name_collision_renamed() {
        let mut registry = TypeRegistry::new();
        let integer = registry.builtin(Primitive::Integer);
        // Occupies the synthesized name with a different shape
        let taken = ComplexBuilder::new(&mut registry, "integerArray")
            .namespace("urn:tns")
            .finish()
            .unwrap();
        let numbers = registry.array_of(integer).unwrap();
        let holder = ComplexBuilder::new(&mut registry, "Holder")
            .field("taken", taken)
            .field("numbers", numbers)
            .finish()
            .unwrap();

        resolve(&mut registry, &[holder]);
        assert_eq!(registry.get(numbers).type_name.as_deref(), Some("integerArray1"));
    }

    #[test]
    fn test_identical_arrays_share_name() {
        let mut registry = TypeRegistry::new();
        let integer = registry.builtin(Primitive::Integer);
        let first = registry.array_of(integer).unwrap();
        let second = registry.array_of(integer).unwrap();
        let holder = ComplexBuilder::new(&mut registry, "Holder")
            .field("a", first)
            .field("b", second)
            .finish()
            .unwrap();

        resolve(&mut registry, &[holder]);
        assert_eq!(registry.wire_type(second), registry.wire_type(first));
    }

    #[test]
    fn test_imports_and_counter_prefixes() {
        let mut registry = TypeRegistry::new();
        let string = registry.builtin(Primitive::String);
        let b = ComplexBuilder::new(&mut registry, "B")
            .namespace("urn:zeta")
            .field("x", string)
            .finish()
            .unwrap();
        let c = ComplexBuilder::new(&mut registry, "C")
            .namespace("urn:alpha")
            .field("y", string)
            .finish()
            .unwrap();
        let a = ComplexBuilder::new(&mut registry, "A")
            .field("b", b)
            .field("c", c)
            .finish()
            .unwrap();

        let namespaces = resolve(&mut registry, &[a]);
        // Sorted by namespace: urn:alpha before urn:zeta
        assert_eq!(namespaces.prefix("urn:alpha"), Some("s0"));
        assert_eq!(namespaces.prefix("urn:zeta"), Some("s1"));
        let imports: Vec<&str> = namespaces.imports("urn:tns").collect();
        assert_eq!(imports, vec!["urn:alpha", "urn:zeta"]);
        assert_eq!(namespaces.imports("urn:alpha").count(), 0);
    }

    #[test]
    fn test_resolution_is_idempotent_and_deterministic() {
        let build = || {
            let mut registry = TypeRegistry::new();
            let integer = registry.builtin(Primitive::Integer);
            let numbers = registry.array_of(integer).unwrap();
            let root = ComplexBuilder::new(&mut registry, "Root")
                .field("numbers", numbers)
                .self_field("next")
                .finish()
                .unwrap();
            (registry, root)
        };
        let (mut left, root) = build();
        let first = resolve(&mut left, &[root]);
        let second = resolve(&mut left, &[root]);
        assert_eq!(first, second);

        let (mut right, root) = build();
        assert_eq!(resolve(&mut right, &[root]), first);
    }

    #[test]
    fn test_unresolved_reference_reported() {
        let mut registry = TypeRegistry::new();
        let id = ComplexBuilder::new(&mut registry, "Broken").finish().unwrap();
        registry.get_mut(id).fields.insert(
            "ghost".to_string(),
            crate::model::Field::new("ghost", TypeRef::Pending(QName::namespaced("urn:x", "Ghost"))),
        );
        let naming = NamingConfig::default();
        let err = NamespaceResolver::new(&naming)
            .resolve(&mut registry, "urn:tns", &[id])
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvedType { ref member, .. } if member == "ghost"));
    }
}
