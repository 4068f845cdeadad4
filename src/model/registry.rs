//! The type registry
//!
//! An arena of [`TypeDescriptor`]s with a (namespace, name) index. The
//! XSD built-in types are preloaded. Registration is idempotent for
//! structurally identical definitions and fails with
//! [`Error::DuplicateType`] for conflicting ones.

use crate::error::{Error, Result};
use crate::model::descriptor::{Field, TypeDescriptor, TypeId, TypeKind, TypeRef};
use crate::model::facets::Overrides;
use crate::model::primitive::{Primitive, BUILTIN_TYPES};
use crate::names::validate_ncname;
use crate::namespaces::{QName, XSD_NAMESPACE};
use indexmap::IndexMap;
use std::collections::HashSet;

/// Arena of descriptors indexed by qualified name
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: Vec<TypeDescriptor>,
    index: IndexMap<(String, String), TypeId>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Registry holding the built-in XSD types
    pub fn new() -> Self {
        let mut registry = Self {
            types: Vec::with_capacity(BUILTIN_TYPES.len() * 2),
            index: IndexMap::new(),
        };
        for (name, primitive) in BUILTIN_TYPES {
            let descriptor = TypeDescriptor::simple(*primitive).named(Some(XSD_NAMESPACE), name);
            let id = registry.add(descriptor);
            registry
                .index
                .insert((XSD_NAMESPACE.to_string(), name.to_string()), id);
        }
        registry
    }

    /// Built-in type of a primitive under its canonical XSD name
    pub fn builtin(&self, primitive: Primitive) -> TypeId {
        // Canonical entries lead BUILTIN_TYPES in declaration order
        TypeId(primitive as u32)
    }

    /// Whether `id` is one of the preloaded built-in types
    pub fn is_builtin(&self, id: TypeId) -> bool {
        id.index() < BUILTIN_TYPES.len()
    }

    /// Number of descriptors, built-ins included
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the registry holds only built-ins
    pub fn is_empty(&self) -> bool {
        self.types.len() == BUILTIN_TYPES.len()
    }

    /// Descriptor of `id`. Ids are only valid for the registry that issued them.
    pub fn get(&self, id: TypeId) -> &TypeDescriptor {
        &self.types[id.index()]
    }

    /// Mutable descriptor of `id`
    pub fn get_mut(&mut self, id: TypeId) -> &mut TypeDescriptor {
        &mut self.types[id.index()]
    }

    /// Iterate over all descriptors in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &TypeDescriptor)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, d)| (TypeId(i as u32), d))
    }

    /// Store a descriptor without indexing it
    pub fn add(&mut self, descriptor: TypeDescriptor) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(descriptor);
        id
    }

    /// Look up a registered type
    pub fn lookup(&self, namespace: &str, name: &str) -> Option<TypeId> {
        self.index
            .get(&(namespace.to_string(), name.to_string()))
            .copied()
    }

    /// Look up a registered type by qualified name
    pub fn lookup_qname(&self, qname: &QName) -> Option<TypeId> {
        self.lookup(qname.namespace().unwrap_or(""), &qname.local_name)
    }

    /// Registered qualified names in registration order
    pub fn names(&self) -> impl Iterator<Item = (QName, TypeId)> + '_ {
        self.index
            .iter()
            .map(|((ns, name), id)| (QName::namespaced(ns.as_str(), name.as_str()), *id))
    }

    /// Index a named, namespaced descriptor.
    ///
    /// Returns the id now bound to its name: `id` itself, or an existing
    /// structurally identical descriptor. Descriptors without a name or
    /// namespace yet, and occurrence variants, are left unindexed.
    pub fn register(&mut self, id: TypeId) -> Result<TypeId> {
        let descriptor = self.get(id);
        if descriptor.variant_of.is_some() {
            return Ok(id);
        }
        let (namespace, name) = match (&descriptor.namespace, &descriptor.type_name) {
            (Some(ns), Some(name)) => (ns.clone(), name.clone()),
            _ => return Ok(id),
        };
        validate_ncname(&name)?;
        self.check_inheritance(id)?;

        let key = (namespace, name);
        match self.index.get(&key).copied() {
            Some(existing) if existing == id => Ok(id),
            Some(existing) => {
                if self.signature(existing) == self.signature(id) {
                    tracing::debug!(namespace = %key.0, name = %key.1, "identical type already registered");
                    Ok(existing)
                } else {
                    Err(Error::DuplicateType {
                        namespace: key.0,
                        name: key.1,
                        reason: "a structurally different type is already registered".to_string(),
                    })
                }
            }
            None => {
                tracing::debug!(namespace = %key.0, name = %key.1, %id, "registered type");
                self.index.insert(key, id);
                Ok(id)
            }
        }
    }

    /// Register, turning `id` into a redirect when an identical type exists
    pub fn register_or_redirect(&mut self, id: TypeId) -> Result<TypeId> {
        let canonical = self.register(id)?;
        if canonical != id {
            self.get_mut(id).variant_of = Some(canonical);
        }
        Ok(canonical)
    }

    /// Customized copy of `id`.
    ///
    /// Facet changes produce a new restriction of `id` whose name is left
    /// for the resolver to synthesize unless given. Occurrence, nillable
    /// and default changes produce a variant sharing the wire identity of `id`.
    pub fn derive(&mut self, id: TypeId, overrides: &Overrides) -> Result<TypeId> {
        let base_id = self.wire_type(id);
        let base = self.get(id);
        let attributes = overrides.apply(&base.attributes)?;

        let descriptor = if overrides.touches_facets() {
            let wire = self.get(base_id);
            if !wire.kind.is_simple() {
                return Err(Error::Type(format!(
                    "facets cannot restrict non-simple type {}",
                    wire.display_name()
                )));
            }
            let mut restricted = TypeDescriptor::new(wire.kind);
            restricted.primitive = wire.primitive;
            restricted.attributes = attributes;
            restricted.extends = Some(TypeRef::Resolved(base_id));
            restricted.type_name = overrides.type_name.clone();
            restricted
        } else {
            let mut variant = base.clone();
            variant.attributes = attributes;
            variant.variant_of = Some(base_id);
            variant
        };
        Ok(self.add(descriptor))
    }

    /// New anonymous array of `member`; the member repeats without bound
    pub fn array_of(&mut self, member: TypeId) -> Result<TypeId> {
        let member = self.derive(member, &Overrides::new().unbounded())?;
        let mut array = TypeDescriptor::new(TypeKind::Array);
        array.item = Some(TypeRef::Resolved(member));
        Ok(self.add(array))
    }

    /// Replace every self-reference placeholder reachable from `root` with `root`.
    ///
    /// The walk keeps a visited set, so it terminates on any cyclic graph.
    pub fn resolve_self_references(&mut self, root: TypeId) -> Result<()> {
        let mut visited = HashSet::new();
        let mut stack = vec![root];
        let mut field_patches: Vec<(TypeId, String)> = Vec::new();
        let mut item_patches: Vec<TypeId> = Vec::new();

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let descriptor = self.get(id);
            for (key, field) in &descriptor.fields {
                match &field.ty {
                    TypeRef::SelfRef => field_patches.push((id, key.clone())),
                    TypeRef::Resolved(target) => stack.push(*target),
                    TypeRef::Pending(_) => {}
                }
            }
            match &descriptor.item {
                Some(TypeRef::SelfRef) => item_patches.push(id),
                Some(TypeRef::Resolved(target)) => stack.push(*target),
                _ => {}
            }
            if let Some(TypeRef::Resolved(parent)) = &descriptor.extends {
                stack.push(*parent);
            }
            if let Some(original) = descriptor.variant_of {
                stack.push(original);
            }
        }

        for (id, key) in field_patches {
            if let Some(field) = self.get_mut(id).fields.get_mut(&key) {
                field.ty = TypeRef::Resolved(root);
            }
        }
        for id in item_patches {
            let member = self.derive(root, &Overrides::new().unbounded())?;
            self.get_mut(id).item = Some(TypeRef::Resolved(member));
        }
        Ok(())
    }

    /// Descriptor that carries the wire identity of `id`
    pub fn wire_type(&self, id: TypeId) -> TypeId {
        let mut current = id;
        for _ in 0..self.types.len() {
            match self.get(current).variant_of {
                Some(next) => current = next,
                None => break,
            }
        }
        current
    }

    /// Resolved target of a reference, or [`Error::UnresolvedType`]
    pub fn target(&self, owner: TypeId, member: &str, reference: &TypeRef) -> Result<TypeId> {
        match reference {
            TypeRef::Resolved(id) => Ok(*id),
            _ => Err(Error::UnresolvedType {
                owner: self.get(owner).display_name(),
                member: member.to_string(),
            }),
        }
    }

    /// Resolved type of a field
    pub fn field_type(&self, owner: TypeId, field: &Field) -> Result<TypeId> {
        self.target(owner, &field.name, &field.ty)
    }

    /// Array member or alias target
    pub fn item_type(&self, id: TypeId) -> Result<TypeId> {
        let wire = self.wire_type(id);
        match &self.get(wire).item {
            Some(reference) => self.target(wire, "item", reference),
            None => Err(Error::Type(format!(
                "{} has no member type",
                self.get(wire).display_name()
            ))),
        }
    }

    /// Type defining the content of `id`: variants and aliases are followed
    /// to the descriptor that is actually written
    pub fn content_type(&self, id: TypeId) -> TypeId {
        let mut current = self.wire_type(id);
        for _ in 0..self.types.len() {
            let descriptor = self.get(current);
            if descriptor.kind != TypeKind::Alias {
                break;
            }
            match descriptor.item.as_ref().and_then(TypeRef::id) {
                Some(item) => current = self.wire_type(item),
                None => break,
            }
        }
        current
    }

    /// Resolved parent of a type
    pub fn parent(&self, id: TypeId) -> Option<TypeId> {
        self.get(self.wire_type(id))
            .extends
            .as_ref()
            .and_then(TypeRef::id)
    }

    /// Inheritance chain of `id`, root ancestor first, ending with `id`'s wire type
    pub fn lineage(&self, id: TypeId) -> Vec<TypeId> {
        let mut chain = vec![self.wire_type(id)];
        let mut seen: HashSet<TypeId> = chain.iter().copied().collect();
        while let Some(parent) = chain.last().and_then(|last| self.parent(*last)) {
            let parent = self.wire_type(parent);
            if !seen.insert(parent) {
                break;
            }
            chain.push(parent);
        }
        chain.reverse();
        chain
    }

    /// Fields of `id` and its ancestors, parent fields first.
    /// A field redeclared by a subtype keeps its parent's position.
    pub fn flat_fields(&self, id: TypeId) -> Vec<&Field> {
        let mut merged: IndexMap<&str, &Field> = IndexMap::new();
        for ancestor in self.lineage(id) {
            for (key, field) in &self.get(ancestor).fields {
                merged.insert(key.as_str(), field);
            }
        }
        merged.into_values().collect()
    }

    /// Reject inheritance cycles and kind-changing extension
    pub fn check_inheritance(&self, id: TypeId) -> Result<()> {
        let mut seen = HashSet::new();
        let mut current = self.wire_type(id);
        seen.insert(current);
        while let Some(parent) = self.parent(current) {
            let parent = self.wire_type(parent);
            if !seen.insert(parent) {
                return Err(Error::Type(format!(
                    "inheritance cycle through {}",
                    self.get(parent).display_name()
                )));
            }
            let child_kind = self.get(current).kind;
            let parent_kind = self.get(parent).kind;
            let compatible = (child_kind.has_fields() && parent_kind.has_fields())
                || (child_kind.is_simple() && parent_kind.is_simple());
            if !compatible {
                return Err(Error::Type(format!(
                    "{} cannot extend {}",
                    self.get(current).display_name(),
                    self.get(parent).display_name()
                )));
            }
            current = parent;
        }
        Ok(())
    }

    /// Qualified name of the wire type of `id`, if assigned
    pub fn type_qname(&self, id: TypeId) -> Option<QName> {
        self.get(self.wire_type(id)).qname()
    }

    /// Structural fingerprint used to tell identical re-registrations from conflicts
    pub fn signature(&self, id: TypeId) -> String {
        let mut visited = HashSet::new();
        self.signature_inner(self.wire_type(id), &mut visited)
    }

    fn signature_inner(&self, id: TypeId, visited: &mut HashSet<TypeId>) -> String {
        if !visited.insert(id) {
            return "@cycle".to_string();
        }
        let d = self.get(id);
        let mut parts = vec![
            format!("{:?}", d.kind),
            format!("{:?}", d.primitive),
            format!("{:?}", d.attributes),
            format!("private={}", d.private),
        ];
        if let Some(extends) = &d.extends {
            parts.push(format!("extends={}", self.reference_label(extends, visited)));
        }
        if let Some(item) = &d.item {
            parts.push(format!("item={}", self.reference_label(item, visited)));
        }
        for (key, field) in &d.fields {
            parts.push(format!(
                "{}:{}:{:?}",
                key,
                self.reference_label(&field.ty, visited),
                field.options
            ));
        }
        visited.remove(&id);
        parts.join("|")
    }

    fn reference_label(&self, reference: &TypeRef, visited: &mut HashSet<TypeId>) -> String {
        match reference {
            TypeRef::SelfRef => "@self".to_string(),
            TypeRef::Pending(qname) => format!("@pending{}", qname),
            TypeRef::Resolved(id) => {
                let wire = self.wire_type(*id);
                let occurs = &self.get(*id).attributes;
                match self.get(wire).qname() {
                    Some(qname) => format!("{}{:?}", qname, occurs),
                    None => format!("({}){:?}", self.signature_inner(wire, visited), occurs),
                }
            }
        }
    }

    /// Move every non-built-in descriptor of `other` into this registry.
    ///
    /// Returns the new id of each of `other`'s ids. Types identical to
    /// already registered ones become redirects to them. On a conflict the
    /// registry is left as it was.
    pub fn merge(&mut self, other: TypeRegistry) -> Result<Vec<TypeId>> {
        let before = self.types.len();
        let offset = self.types.len() as u32 - BUILTIN_TYPES.len() as u32;
        let remap = |id: TypeId| -> TypeId {
            if id.index() < BUILTIN_TYPES.len() {
                id
            } else {
                TypeId(id.0 + offset)
            }
        };
        let remap_ref = |reference: &mut TypeRef| {
            if let TypeRef::Resolved(id) = reference {
                *id = remap(*id);
            }
        };

        let mut mapping = Vec::with_capacity(other.types.len());
        let mut added = Vec::new();
        for (index, mut descriptor) in other.types.into_iter().enumerate() {
            if index < BUILTIN_TYPES.len() {
                mapping.push(TypeId(index as u32));
                continue;
            }
            for field in descriptor.fields.values_mut() {
                remap_ref(&mut field.ty);
            }
            if let Some(item) = descriptor.item.as_mut() {
                remap_ref(item);
            }
            if let Some(extends) = descriptor.extends.as_mut() {
                remap_ref(extends);
            }
            descriptor.variant_of = descriptor.variant_of.map(remap);
            let id = self.add(descriptor);
            mapping.push(id);
            added.push(id);
        }

        for id in added {
            if let Err(e) = self.register_or_redirect(id) {
                self.types.truncate(before);
                self.index.retain(|_, registered| registered.index() < before);
                return Err(e);
            }
        }
        Ok(mapping)
    }
}
