//! Service interfaces
//!
//! An [`InterfaceBuilder`] collects the types an external service layer
//! exposes (operation arguments and results, headers, faults, parsed
//! schemas), then freezes them into an [`Interface`]: a resolved,
//! immutable registry that the schema builder and the codec share.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{ComplexBuilder, TypeId, TypeKind, TypeRegistry};
use crate::namespaces::QName;
use crate::resolver::{NamespaceRegistry, NamespaceResolver};
use crate::schema::ParsedSchemas;
use indexmap::IndexMap;

/// Declaration of an operation before wrappers are synthesized
#[derive(Debug, Clone, PartialEq)]
pub struct OperationSpec {
    name: String,
    params: Vec<(String, TypeId)>,
    results: Vec<(Option<String>, TypeId)>,
    headers: Vec<TypeId>,
    faults: Vec<TypeId>,
    documentation: Option<String>,
}

impl OperationSpec {
    /// Start a remote procedure
    pub fn rpc(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            results: Vec::new(),
            headers: Vec::new(),
            faults: Vec::new(),
            documentation: None,
        }
    }

    /// Add an argument
    pub fn param(mut self, name: impl Into<String>, ty: TypeId) -> Self {
        self.params.push((name.into(), ty));
        self
    }

    /// Add the result, named `<Operation><ResultSuffix>`
    pub fn returns(mut self, ty: TypeId) -> Self {
        self.results.push((None, ty));
        self
    }

    /// Add a named result
    pub fn returns_named(mut self, name: impl Into<String>, ty: TypeId) -> Self {
        self.results.push((Some(name.into()), ty));
        self
    }

    /// Add a header type
    pub fn header(mut self, ty: TypeId) -> Self {
        self.headers.push(ty);
        self
    }

    /// Add a fault detail type
    pub fn fault(mut self, ty: TypeId) -> Self {
        self.faults.push(ty);
        self
    }

    /// Attach documentation to the input wrapper
    pub fn documentation(mut self, text: impl Into<String>) -> Self {
        self.documentation = Some(text.into());
        self
    }

    /// Operation name
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An operation with its synthesized wrappers
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Operation name
    pub name: String,
    /// Input wrapper `<Operation>`
    pub input: TypeId,
    /// Output wrapper `<Operation><ResponseSuffix>`
    pub output: TypeId,
    /// Header types
    pub headers: Vec<TypeId>,
    /// Fault detail types
    pub faults: Vec<TypeId>,
}

/// Collects types and operations before resolution
#[derive(Debug)]
pub struct InterfaceBuilder {
    registry: TypeRegistry,
    target_namespace: String,
    config: Config,
    operations: IndexMap<String, Operation>,
    roots: Vec<TypeId>,
}

impl InterfaceBuilder {
    /// Builder for the given target namespace
    pub fn new(target_namespace: impl Into<String>) -> Self {
        Self {
            registry: TypeRegistry::new(),
            target_namespace: target_namespace.into(),
            config: Config::default(),
            operations: IndexMap::new(),
            roots: Vec::new(),
        }
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Start from an existing registry
    pub fn with_registry(mut self, registry: TypeRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Registry that types are declared into
    pub fn registry(&mut self) -> &mut TypeRegistry {
        &mut self.registry
    }

    /// Target namespace
    pub fn target_namespace(&self) -> &str {
        &self.target_namespace
    }

    /// Expose a type directly, with its own global element
    pub fn add_type(&mut self, id: TypeId) -> &mut Self {
        if !self.roots.contains(&id) {
            self.roots.push(id);
        }
        self
    }

    /// Synthesize the wrappers of an operation and expose them
    pub fn add_operation(&mut self, spec: OperationSpec) -> Result<&Operation> {
        if self.operations.contains_key(&spec.name) {
            return Err(Error::DuplicateType {
                namespace: self.target_namespace.clone(),
                name: spec.name,
                reason: "operation declared twice".to_string(),
            });
        }
        let naming = self.config.naming.clone();

        let mut input = ComplexBuilder::new(&mut self.registry, spec.name.as_str())
            .namespace(self.target_namespace.as_str());
        for (name, ty) in &spec.params {
            input = input.field(name.as_str(), *ty);
        }
        if let Some(text) = &spec.documentation {
            input = input.documentation(text.as_str());
        }
        let input = input.finish()?;

        let response = format!("{}{}", spec.name, naming.response_suffix);
        let mut output = ComplexBuilder::new(&mut self.registry, response)
            .namespace(self.target_namespace.as_str());
        for (name, ty) in &spec.results {
            let name = match name {
                Some(name) => name.clone(),
                None => format!("{}{}", spec.name, naming.result_suffix),
            };
            output = output.field(name, *ty);
        }
        let output = output.finish()?;

        for id in [input, output]
            .into_iter()
            .chain(spec.headers.iter().copied())
            .chain(spec.faults.iter().copied())
        {
            self.add_type(id);
        }
        tracing::debug!(operation = %spec.name, %input, %output, "added operation");

        let operation = Operation {
            name: spec.name.clone(),
            input,
            output,
            headers: spec.headers,
            faults: spec.faults,
        };
        Ok(self.operations.entry(spec.name).or_insert(operation))
    }

    /// Absorb parsed schemas; their global elements become exposed types.
    ///
    /// Returns the global elements with ids valid in this builder's registry.
    pub fn import_parsed(&mut self, parsed: ParsedSchemas) -> Result<IndexMap<QName, TypeId>> {
        let elements = parsed.merge_into(&mut self.registry)?;
        for id in elements.values() {
            self.add_type(*id);
        }
        Ok(elements)
    }

    /// Resolve names and namespaces and freeze the result
    pub fn build(mut self) -> Result<Interface> {
        let namespaces = NamespaceResolver::new(&self.config.naming)
            .with_import_base_namespaces(self.config.schema.import_base_namespaces)
            .resolve(&mut self.registry, &self.target_namespace, &self.roots)?;
        tracing::debug!(
            target_namespace = %self.target_namespace,
            operations = self.operations.len(),
            types = self.registry.len(),
            "built interface"
        );
        Ok(Interface {
            registry: self.registry,
            namespaces,
            target_namespace: self.target_namespace,
            config: self.config,
            operations: self.operations,
            roots: self.roots,
        })
    }
}

/// A resolved, immutable set of types and operations
#[derive(Debug, Clone)]
pub struct Interface {
    registry: TypeRegistry,
    namespaces: NamespaceRegistry,
    target_namespace: String,
    config: Config,
    operations: IndexMap<String, Operation>,
    roots: Vec<TypeId>,
}

impl Interface {
    /// Resolved registry
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Prefixes, namespace contents and imports
    pub fn namespaces(&self) -> &NamespaceRegistry {
        &self.namespaces
    }

    /// Target namespace
    pub fn target_namespace(&self) -> &str {
        &self.target_namespace
    }

    /// Configuration the interface was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Operation by name
    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.operations.get(name)
    }

    /// Operations in declaration order
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.operations.values()
    }

    /// Directly exposed types
    pub fn roots(&self) -> &[TypeId] {
        &self.roots
    }

    /// Registered type by namespace and name
    pub fn lookup(&self, namespace: &str, name: &str) -> Option<TypeId> {
        self.registry.lookup(namespace, name)
    }

    /// Type of a global element
    pub fn element(&self, qname: &QName) -> Option<TypeId> {
        self.namespaces.element(qname)
    }

    /// Global element name of a complex, fault or alias type
    pub fn element_qname(&self, id: TypeId) -> Option<QName> {
        let wire = self.registry.wire_type(id);
        let descriptor = self.registry.get(wire);
        if !matches!(
            descriptor.kind,
            TypeKind::Complex | TypeKind::Fault | TypeKind::Alias
        ) {
            return None;
        }
        let namespace = descriptor.namespace.as_deref()?;
        let name = descriptor
            .element_name
            .as_deref()
            .or(descriptor.type_name.as_deref())?;
        Some(QName::namespaced(namespace, name))
    }
}
