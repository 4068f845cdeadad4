//! Schema ingestion
//!
//! Turns foreign schema documents into descriptors of the same shape the
//! registry builds from native declarations. Parsing runs in three steps:
//!
//! 1. load every document reachable through `xs:include`/`xs:import`,
//! 2. declare an empty shell for every named top-level type,
//! 3. fill in bodies, deferring components whose dependencies (a simple
//!    base type, a referenced global element) are not complete yet, until
//!    a pass completes nothing.
//!
//! The parser itself is immutable; all state lives in a per-call context.

use crate::config::NamingConfig;
use crate::documents::{Document, Element};
use crate::error::{Error, ParseError, Result};
use crate::limits::Limits;
use crate::loaders::Loader;
use crate::locations::Location;
use crate::model::{
    parse_occurs, Field, FieldOptions, Occurs, Overrides, TypeDescriptor, TypeId, TypeKind,
    TypeRef, TypeRegistry,
};
use crate::names::{anonymous_type_name, is_valid_qname, validate_ncname};
use crate::namespaces::{is_builtin_namespace, QName, XSD_NAMESPACE};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// XSD element local names
mod xsd_elements {
    pub const SCHEMA: &str = "schema";
    pub const ELEMENT: &str = "element";
    pub const COMPLEX_TYPE: &str = "complexType";
    pub const SIMPLE_TYPE: &str = "simpleType";
    pub const ATTRIBUTE: &str = "attribute";
    pub const ATTRIBUTE_GROUP: &str = "attributeGroup";
    pub const ANY_ATTRIBUTE: &str = "anyAttribute";
    pub const GROUP: &str = "group";
    pub const SEQUENCE: &str = "sequence";
    pub const CHOICE: &str = "choice";
    pub const ALL: &str = "all";
    pub const ANY: &str = "any";
    pub const ANNOTATION: &str = "annotation";
    pub const DOCUMENTATION: &str = "documentation";
    pub const IMPORT: &str = "import";
    pub const INCLUDE: &str = "include";
    pub const REDEFINE: &str = "redefine";
    pub const RESTRICTION: &str = "restriction";
    pub const EXTENSION: &str = "extension";
    pub const LIST: &str = "list";
    pub const UNION: &str = "union";
    pub const COMPLEX_CONTENT: &str = "complexContent";
    pub const SIMPLE_CONTENT: &str = "simpleContent";
}

/// XSD attribute names
mod xsd_attrs {
    pub const NAME: &str = "name";
    pub const TYPE: &str = "type";
    pub const REF: &str = "ref";
    pub const TARGET_NAMESPACE: &str = "targetNamespace";
    pub const NILLABLE: &str = "nillable";
    pub const DEFAULT: &str = "default";
    pub const BASE: &str = "base";
    pub const VALUE: &str = "value";
    pub const NAMESPACE: &str = "namespace";
    pub const SCHEMA_LOCATION: &str = "schemaLocation";
    pub const MIN_OCCURS: &str = "minOccurs";
    pub const MAX_OCCURS: &str = "maxOccurs";
    pub const USE: &str = "use";
}

use xsd_attrs as attrs;
use xsd_elements as elems;

/// A request to locate an included or imported document
#[derive(Debug, Clone, Copy)]
pub struct ImportRequest<'a> {
    /// Namespace of an `xs:import`
    pub namespace: Option<&'a str>,
    /// `schemaLocation` hint
    pub location: Option<&'a str>,
    /// Location of the document holding the directive
    pub base: Option<&'a Location>,
}

/// A loaded schema document
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaSource {
    /// Where the text came from
    pub location: Location,
    /// Document text
    pub text: String,
}

impl SchemaSource {
    /// In-memory source
    pub fn inline(name: impl Into<String>, text: impl Into<String>) -> Self {
        let name = name.into();
        let text = text.into();
        Self {
            location: Location::inline(name, text.clone()),
            text,
        }
    }
}

/// Locates the documents behind `xs:include` and `xs:import`
pub trait SchemaResolver: fmt::Debug + Send + Sync {
    /// The document for `request`, or None when it cannot be found
    fn resolve(&self, request: &ImportRequest<'_>) -> Result<Option<SchemaSource>>;
}

/// In-memory documents keyed by file name or namespace
#[derive(Debug, Clone, Default)]
pub struct NamespaceFiles {
    files: IndexMap<String, String>,
}

impl NamespaceFiles {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document under a file name or namespace
    pub fn with(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(key, text);
        self
    }

    /// Add a document under a file name or namespace
    pub fn insert(&mut self, key: impl Into<String>, text: impl Into<String>) {
        self.files.insert(key.into(), text.into());
    }
}

impl SchemaResolver for NamespaceFiles {
    fn resolve(&self, request: &ImportRequest<'_>) -> Result<Option<SchemaSource>> {
        for key in [request.location, request.namespace].into_iter().flatten() {
            if let Some(text) = self.files.get(key) {
                return Ok(Some(SchemaSource::inline(key, text.as_str())));
            }
        }
        Ok(None)
    }
}

/// Resolves `schemaLocation` hints against the including document
#[derive(Debug, Clone, Default)]
pub struct RelativeResolver {
    loader: Loader,
}

impl RelativeResolver {
    /// Resolver reading through `loader`
    pub fn new(loader: Loader) -> Self {
        Self { loader }
    }
}

impl SchemaResolver for RelativeResolver {
    fn resolve(&self, request: &ImportRequest<'_>) -> Result<Option<SchemaSource>> {
        let hint = match request.location {
            Some(hint) => hint,
            None => return Ok(None),
        };
        let location = match request.base {
            Some(base) => base.join(hint)?,
            None => Location::from_str(hint)?,
        };
        let text = self.loader.load(&location)?;
        Ok(Some(SchemaSource { location, text }))
    }
}

/// Descriptors produced by one parse
#[derive(Debug, Clone)]
pub struct ParsedSchemas {
    registry: TypeRegistry,
    elements: IndexMap<QName, TypeId>,
    namespaces: Vec<String>,
    passes: usize,
}

impl ParsedSchemas {
    /// Registry holding the parsed types
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Global elements in document order
    pub fn elements(&self) -> &IndexMap<QName, TypeId> {
        &self.elements
    }

    /// Type of a global element
    pub fn element(&self, qname: &QName) -> Option<TypeId> {
        self.elements.get(qname).copied()
    }

    /// Parsed type by namespace and name
    pub fn lookup(&self, namespace: &str, name: &str) -> Option<TypeId> {
        self.registry.lookup(namespace, name)
    }

    /// Target namespaces of the loaded documents
    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    /// Resolution passes needed to complete every component
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Move the descriptors into `registry`; returns the global elements
    /// with ids valid in `registry`
    pub fn merge_into(self, registry: &mut TypeRegistry) -> Result<IndexMap<QName, TypeId>> {
        let mapping = registry.merge(self.registry)?;
        Ok(self
            .elements
            .into_iter()
            .map(|(qname, id)| (qname, mapping[id.index()]))
            .collect())
    }
}

/// Parses schema documents into descriptors
#[derive(Debug, Clone)]
pub struct SchemaParser {
    resolver: Arc<dyn SchemaResolver>,
    limits: Limits,
    naming: NamingConfig,
}

impl Default for SchemaParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaParser {
    /// Parser resolving locations relative to the including document
    pub fn new() -> Self {
        Self {
            resolver: Arc::new(RelativeResolver::default()),
            limits: Limits::default(),
            naming: NamingConfig::default(),
        }
    }

    /// Use a different resolver for includes and imports
    pub fn with_resolver<R: SchemaResolver + 'static>(mut self, resolver: R) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the suffix used for anonymous type names
    pub fn with_naming(mut self, naming: NamingConfig) -> Self {
        self.naming = naming;
        self
    }

    /// Parse a document held in memory
    pub fn parse_str(&self, text: &str) -> Result<ParsedSchemas> {
        self.parse_sources(vec![SchemaSource::inline("schema.xsd", text)])
    }

    /// Parse a document from disk
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<ParsedSchemas> {
        self.parse_location(&Location::Path(path.as_ref().to_path_buf()))
    }

    /// Parse the document at `location`
    pub fn parse_location(&self, location: &Location) -> Result<ParsedSchemas> {
        let text = Loader::new()
            .with_limits(self.limits.clone())
            .load(location)?;
        self.parse_sources(vec![SchemaSource {
            location: location.clone(),
            text,
        }])
    }

    /// Parse several documents into one result
    pub fn parse_sources(&self, sources: Vec<SchemaSource>) -> Result<ParsedSchemas> {
        let mut context = ParseContext::new(self);
        for source in sources {
            context.queue.push_back((source, None, 0));
        }
        context.load()?;
        context.declare()?;
        context.complete()?;
        context.finish()
    }
}

struct SchemaDoc {
    location: Location,
    root: Element,
    namespace: Option<String>,
    chameleon: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ComponentKind {
    SimpleType,
    ComplexType,
    Element,
}

struct Component {
    doc: usize,
    node: usize,
    kind: ComponentKind,
    qname: QName,
    shell: Option<TypeId>,
}

struct ParseContext<'p> {
    parser: &'p SchemaParser,
    /// Documents to load: source, chameleon namespace, include/import depth
    queue: VecDeque<(SchemaSource, Option<String>, usize)>,
    seen: HashSet<(Option<String>, String)>,
    documents: Vec<SchemaDoc>,
    components: Vec<Component>,
    passes: usize,
    state: Assembly<'p>,
}

/// Mutable build state, kept apart from the documents it reads
struct Assembly<'p> {
    naming: &'p NamingConfig,
    registry: TypeRegistry,
    shells: HashMap<QName, TypeId>,
    elements: IndexMap<QName, TypeId>,
    complete: HashSet<TypeId>,
}

fn xsd_children(node: &Element) -> impl Iterator<Item = &Element> {
    node.children
        .iter()
        .filter(|c| c.namespace() == Some(XSD_NAMESPACE))
}

fn located(doc: &SchemaDoc, component: &str, message: impl Into<String>) -> Error {
    Error::Parse(
        ParseError::new(message)
            .with_location(doc.location.to_string())
            .with_component(component),
    )
}

fn required<'e>(node: &'e Element, doc: &SchemaDoc, name: &str) -> Result<&'e str> {
    node.get_attribute(name).ok_or_else(|| {
        located(
            doc,
            node.local_name(),
            format!("missing required attribute '{}'", name),
        )
    })
}

fn documentation(node: &Element) -> Option<String> {
    let annotation = xsd_children(node).find(|c| c.local_name() == elems::ANNOTATION)?;
    let text = xsd_children(annotation)
        .filter(|c| c.local_name() == elems::DOCUMENTATION)
        .filter_map(|c| c.text.as_deref())
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

impl<'p> ParseContext<'p> {
    fn new(parser: &'p SchemaParser) -> Self {
        Self {
            parser,
            queue: VecDeque::new(),
            seen: HashSet::new(),
            documents: Vec::new(),
            components: Vec::new(),
            passes: 0,
            state: Assembly {
                naming: &parser.naming,
                registry: TypeRegistry::new(),
                shells: HashMap::new(),
                elements: IndexMap::new(),
                complete: HashSet::new(),
            },
        }
    }

    /// Load every reachable document, breadth first
    fn load(&mut self) -> Result<()> {
        while let Some((source, chameleon, depth)) = self.queue.pop_front() {
            if !self.seen.insert((chameleon.clone(), source.text.clone())) {
                continue;
            }
            self.parser.limits.check_schema_depth(depth)?;
            let document =
                Document::parse_with_limits(source.text.as_bytes(), &self.parser.limits)?;
            let root = document.into_root()?;
            if !root.qname.is(XSD_NAMESPACE, elems::SCHEMA) {
                return Err(Error::Parse(
                    ParseError::new(format!("expected xs:schema root, found {}", root.qname))
                        .with_location(source.location.to_string()),
                ));
            }

            let declared = root.get_attribute(attrs::TARGET_NAMESPACE).map(str::to_string);
            let chameleon_adopted = declared.is_none() && chameleon.is_some();
            let namespace = declared.or(chameleon);
            tracing::debug!(
                location = %source.location,
                namespace = namespace.as_deref().unwrap_or(""),
                "loaded schema document"
            );

            for child in xsd_children(&root) {
                match child.local_name() {
                    elems::INCLUDE => {
                        let hint = child.get_attribute(attrs::SCHEMA_LOCATION);
                        let request = ImportRequest {
                            namespace: None,
                            location: hint,
                            base: Some(&source.location),
                        };
                        match self.parser.resolver.resolve(&request)? {
                            Some(included) => self.queue.push_back((included, namespace.clone(), depth + 1)),
                            None => {
                                return Err(Error::Parse(
                                    ParseError::new(format!(
                                        "cannot resolve include '{}'",
                                        hint.unwrap_or("")
                                    ))
                                    .with_location(source.location.to_string()),
                                ))
                            }
                        }
                    }
                    elems::IMPORT => {
                        let imported = child.get_attribute(attrs::NAMESPACE);
                        if imported.map(is_builtin_namespace).unwrap_or(false) {
                            continue;
                        }
                        let request = ImportRequest {
                            namespace: imported,
                            location: child.get_attribute(attrs::SCHEMA_LOCATION),
                            base: Some(&source.location),
                        };
                        match self.parser.resolver.resolve(&request)? {
                            Some(found) => self.queue.push_back((found, None, depth + 1)),
                            None => tracing::warn!(
                                namespace = imported.unwrap_or(""),
                                "import not resolved; references into it will fail"
                            ),
                        }
                    }
                    elems::REDEFINE => tracing::warn!(
                        location = %source.location,
                        "xs:redefine is not supported and was skipped"
                    ),
                    _ => {}
                }
            }

            self.documents.push(SchemaDoc {
                location: source.location,
                root,
                namespace,
                chameleon: chameleon_adopted,
            });
        }
        Ok(())
    }

    /// Create shells for named types, then for global elements
    fn declare(&mut self) -> Result<()> {
        for element_sweep in [false, true] {
            for (d, doc) in self.documents.iter().enumerate() {
                for (n, node) in doc.root.children.iter().enumerate() {
                    if node.namespace() != Some(XSD_NAMESPACE) {
                        continue;
                    }
                    let kind = match node.local_name() {
                        elems::SIMPLE_TYPE => ComponentKind::SimpleType,
                        elems::COMPLEX_TYPE => ComponentKind::ComplexType,
                        elems::ELEMENT => ComponentKind::Element,
                        _ => continue,
                    };
                    if (kind == ComponentKind::Element) != element_sweep {
                        continue;
                    }
                    let name = required(node, doc, attrs::NAME)?;
                    validate_ncname(name)?;
                    let qname = QName::new(doc.namespace.clone(), name);

                    let shell = match kind {
                        ComponentKind::Element => {
                            if self.state.elements.contains_key(&qname)
                                || self.components.iter().any(|c| {
                                    c.kind == ComponentKind::Element && c.qname == qname
                                })
                            {
                                return Err(located(doc, name, "global element declared twice"));
                            }
                            self.state.element_shell(node, doc, name)?
                        }
                        _ => {
                            if self.state.shells.contains_key(&qname) {
                                return Err(Error::DuplicateType {
                                    namespace: doc.namespace.clone().unwrap_or_default(),
                                    name: name.to_string(),
                                    reason: format!("defined twice (second in {})", doc.location),
                                });
                            }
                            let shell_kind = if kind == ComponentKind::SimpleType
                                || xsd_children(node).any(|c| c.local_name() == elems::SIMPLE_CONTENT)
                            {
                                TypeKind::Simple
                            } else {
                                TypeKind::Complex
                            };
                            let id = self.state.registry.add(
                                TypeDescriptor::new(shell_kind).named(doc.namespace.as_deref(), name),
                            );
                            self.state.shells.insert(qname.clone(), id);
                            Some(id)
                        }
                    };
                    self.components.push(Component {
                        doc: d,
                        node: n,
                        kind,
                        qname,
                        shell,
                    });
                    self.parser
                        .limits
                        .check_schema_components(self.components.len())?;
                }
            }
        }
        Ok(())
    }

    /// Fill in bodies until every component is complete or no pass makes progress
    fn complete(&mut self) -> Result<()> {
        let mut remaining: Vec<usize> = (0..self.components.len()).collect();
        while !remaining.is_empty() {
            self.passes += 1;
            self.parser.limits.check_resolution_passes(self.passes)?;

            let before = remaining.len();
            let mut waiting = Vec::new();
            let mut blocker: Option<(QName, QName)> = None;
            for index in remaining {
                let component = &self.components[index];
                let doc = &self.documents[component.doc];
                let node = &doc.root.children[component.node];
                match self.state.missing(node, doc)? {
                    Some(dependency) => {
                        waiting.push(index);
                        blocker.get_or_insert_with(|| (component.qname.clone(), dependency));
                    }
                    None => self.state.build(component, node, doc)?,
                }
            }
            tracing::debug!(
                pass = self.passes,
                pending = waiting.len(),
                "schema resolution pass"
            );

            if waiting.len() == before {
                if let Some((owner, dependency)) = blocker {
                    return Err(Error::UnresolvedType {
                        owner: owner.to_string(),
                        member: dependency.to_string(),
                    });
                }
            }
            remaining = waiting;
        }
        Ok(())
    }

    fn finish(self) -> Result<ParsedSchemas> {
        let ParseContext {
            documents,
            passes,
            state,
            ..
        } = self;
        let Assembly {
            mut registry,
            elements,
            ..
        } = state;

        let named: Vec<TypeId> = registry
            .iter()
            .skip_while(|(id, _)| registry.is_builtin(*id))
            .filter(|(_, d)| d.variant_of.is_none() && d.namespace.is_some() && d.type_name.is_some())
            .map(|(id, _)| id)
            .collect();
        for id in named {
            registry.register_or_redirect(id)?;
        }

        let mut namespaces: Vec<String> = Vec::new();
        for doc in &documents {
            if let Some(ns) = &doc.namespace {
                if !namespaces.contains(ns) {
                    namespaces.push(ns.clone());
                }
            }
        }
        tracing::debug!(
            documents = documents.len(),
            elements = elements.len(),
            passes,
            "parsed schemas"
        );
        Ok(ParsedSchemas {
            registry,
            elements,
            namespaces,
            passes,
        })
    }
}

impl<'p> Assembly<'p> {
    /// Resolve a `prefix:name` reference in `node`'s scope
    fn qualify(&self, node: &Element, value: &str, doc: &SchemaDoc) -> Result<QName> {
        let value = value.trim();
        if !is_valid_qname(value) {
            return Err(located(
                doc,
                node.local_name(),
                format!("'{}' is not a valid QName", value),
            ));
        }
        let qname = node.resolve_qname(value)?;
        if qname.namespace().is_none() && doc.chameleon {
            return Ok(QName::new(doc.namespace.clone(), qname.local_name));
        }
        Ok(qname)
    }

    /// Type named by `qname`; unknown XSD built-ins read as strings
    fn lookup_type(&self, qname: &QName) -> Option<TypeId> {
        if qname.namespace() == Some(XSD_NAMESPACE) {
            return self
                .registry
                .lookup(XSD_NAMESPACE, &qname.local_name)
                .or_else(|| {
                    tracing::debug!(name = %qname.local_name, "unsupported built-in read as string");
                    self.registry.lookup(XSD_NAMESPACE, "string")
                });
        }
        self.shells.get(qname).copied()
    }

    fn resolve_type(&self, node: &Element, value: &str, doc: &SchemaDoc) -> Result<TypeId> {
        let qname = self.qualify(node, value, doc)?;
        self.lookup_type(&qname).ok_or_else(|| Error::UnresolvedType {
            owner: doc.location.to_string(),
            member: qname.to_string(),
        })
    }

    fn any_type(&self) -> TypeId {
        self.registry
            .lookup(XSD_NAMESPACE, "anyType")
            .unwrap_or_else(|| self.registry.builtin(crate::model::Primitive::String))
    }

    /// A reference that is not usable yet, if any.
    /// Simple types must be complete; complex types only need to exist.
    /// Recursion follows the document tree, already bounded by
    /// `max_xml_depth` when the document was read.
    fn missing(&self, node: &Element, doc: &SchemaDoc) -> Result<Option<QName>> {
        if node.namespace() != Some(XSD_NAMESPACE) {
            return Ok(None);
        }
        let references: &[&str] = match node.local_name() {
            elems::ELEMENT => &[attrs::REF, attrs::TYPE],
            elems::ATTRIBUTE => &[attrs::TYPE],
            elems::RESTRICTION | elems::EXTENSION => &[attrs::BASE],
            elems::LIST | elems::UNION => return Ok(None),
            _ => &[],
        };
        for attribute in references {
            let value = match node.get_attribute(attribute) {
                Some(value) => value,
                None => continue,
            };
            let qname = self.qualify(node, value, doc)?;
            if *attribute == attrs::REF {
                if !self.elements.contains_key(&qname) {
                    return Ok(Some(qname));
                }
                continue;
            }
            match self.lookup_type(&qname) {
                None => return Ok(Some(qname)),
                Some(id) => {
                    if self.registry.get(id).kind.is_simple()
                        && !self.registry.is_builtin(id)
                        && !self.complete.contains(&id)
                    {
                        return Ok(Some(qname));
                    }
                }
            }
        }
        for child in &node.children {
            if let Some(qname) = self.missing(child, doc)? {
                return Ok(Some(qname));
            }
        }
        Ok(None)
    }

    /// Shell of a global element's inline type, named after the element
    fn element_shell(&mut self, node: &Element, doc: &SchemaDoc, name: &str) -> Result<Option<TypeId>> {
        let inline = xsd_children(node)
            .find(|c| matches!(c.local_name(), elems::COMPLEX_TYPE | elems::SIMPLE_TYPE));
        let inline = match inline {
            Some(inline) => inline,
            None => return Ok(None),
        };
        let kind = if inline.local_name() == elems::SIMPLE_TYPE
            || xsd_children(inline).any(|c| c.local_name() == elems::SIMPLE_CONTENT)
        {
            TypeKind::Simple
        } else {
            TypeKind::Complex
        };
        let mut type_name = name.to_string();
        if self.shells.contains_key(&QName::new(doc.namespace.clone(), name)) {
            type_name = format!("{}{}", name, self.naming.type_suffix);
        }
        let id = self
            .registry
            .add(TypeDescriptor::new(kind).named(doc.namespace.as_deref(), &type_name));
        Ok(Some(id))
    }

    fn build(&mut self, component: &Component, node: &Element, doc: &SchemaDoc) -> Result<()> {
        match (component.kind, component.shell) {
            (ComponentKind::SimpleType, Some(id)) => {
                self.fill_simple(id, node, doc)?;
                self.complete.insert(id);
            }
            (ComponentKind::ComplexType, Some(id)) => {
                self.fill_type(id, node, doc)?;
                self.complete.insert(id);
            }
            (ComponentKind::Element, shell) => {
                let id = self.global_element(shell, node, doc)?;
                self.elements.insert(component.qname.clone(), id);
            }
            _ => {}
        }
        Ok(())
    }

    /// Fill a shell from a complexType or simpleType definition
    fn fill_type(&mut self, id: TypeId, node: &Element, doc: &SchemaDoc) -> Result<()> {
        if node.local_name() == elems::SIMPLE_TYPE {
            return self.fill_simple(id, node, doc);
        }
        if let Some(content) = xsd_children(node).find(|c| c.local_name() == elems::SIMPLE_CONTENT) {
            return self.fill_simple_content(id, content, doc);
        }
        let owner = self
            .registry
            .get(id)
            .type_name
            .clone()
            .unwrap_or_default();
        self.fill_complex(id, node, doc, &owner)
    }

    fn global_element(&mut self, shell: Option<TypeId>, node: &Element, doc: &SchemaDoc) -> Result<TypeId> {
        let name = required(node, doc, attrs::NAME)?;
        if let Some(id) = shell {
            if let Some(inline) = xsd_children(node)
                .find(|c| matches!(c.local_name(), elems::COMPLEX_TYPE | elems::SIMPLE_TYPE))
            {
                self.fill_type(id, inline, doc)?;
            }
            if self.registry.get(id).documentation.is_none() {
                self.registry.get_mut(id).documentation = documentation(node);
            }
            self.complete.insert(id);
            return Ok(id);
        }

        let target = match node.get_attribute(attrs::TYPE) {
            Some(value) => self.resolve_type(node, value, doc)?,
            None => self.any_type(),
        };
        let target = self.registry.wire_type(target);
        let descriptor = self.registry.get(target);
        if descriptor.kind.has_fields()
            && descriptor.type_name.as_deref() == Some(name)
            && descriptor.namespace == doc.namespace
        {
            return Ok(target);
        }

        let mut alias = TypeDescriptor::new(TypeKind::Alias).named(doc.namespace.as_deref(), name);
        alias.item = Some(TypeRef::Resolved(target));
        alias.documentation = documentation(node);
        Ok(self.registry.add(alias))
    }

    fn fill_simple(&mut self, id: TypeId, node: &Element, doc: &SchemaDoc) -> Result<()> {
        let component = self.registry.get(id).display_name();
        let doc_text = documentation(node);
        for child in xsd_children(node) {
            match child.local_name() {
                elems::RESTRICTION => {
                    let base = match child.get_attribute(attrs::BASE) {
                        Some(value) => self.resolve_type(child, value, doc)?,
                        None => {
                            tracing::debug!(%component, "restriction of an inline type read as string");
                            self.registry.builtin(crate::model::Primitive::String)
                        }
                    };
                    let overrides = facet_overrides(child, doc, &component)?;
                    self.restrict(id, base, &overrides)?;
                }
                elems::LIST | elems::UNION => {
                    tracing::debug!(%component, kind = child.local_name(), "degraded to string");
                    let descriptor = self.registry.get_mut(id);
                    descriptor.kind = TypeKind::Simple;
                    descriptor.primitive = Some(crate::model::Primitive::String);
                    descriptor.extends = None;
                }
                _ => {}
            }
        }
        if self.registry.get(id).primitive.is_none() {
            return Err(located(doc, &component, "simple type has no restriction, list or union"));
        }
        self.registry.get_mut(id).documentation = doc_text;
        Ok(())
    }

    /// Make `id` a restriction of `base`; inherited facets carry over
    fn restrict(&mut self, id: TypeId, base: TypeId, overrides: &Overrides) -> Result<()> {
        let base = self.registry.wire_type(base);
        let base_descriptor = self.registry.get(base);
        let primitive = base_descriptor.primitive.ok_or_else(|| {
            Error::Type(format!("{} is not a simple type", base_descriptor.display_name()))
        })?;
        let restricted = overrides.apply(&base_descriptor.attributes)?;
        let enumeration_only = overrides.values.is_some()
            && !Overrides {
                values: None,
                ..overrides.clone()
            }
            .touches_facets()
            && primitive.is_textual();
        let kind = if enumeration_only || base_descriptor.kind == TypeKind::Enum {
            TypeKind::Enum
        } else {
            TypeKind::Simple
        };

        let descriptor = self.registry.get_mut(id);
        descriptor.kind = kind;
        descriptor.primitive = Some(primitive);
        descriptor.attributes.facets = restricted.facets;
        descriptor.extends = Some(TypeRef::Resolved(base));
        Ok(())
    }

    /// A complexType with simple content reads as its simple base; attributes are dropped
    fn fill_simple_content(&mut self, id: TypeId, content: &Element, doc: &SchemaDoc) -> Result<()> {
        let component = self.registry.get(id).display_name();
        let derivation = xsd_children(content)
            .find(|c| matches!(c.local_name(), elems::EXTENSION | elems::RESTRICTION))
            .ok_or_else(|| located(doc, &component, "simpleContent without derivation"))?;
        let base = self.resolve_type(derivation, required(derivation, doc, attrs::BASE)?, doc)?;
        if xsd_children(derivation).any(|c| c.local_name() == elems::ATTRIBUTE) {
            tracing::warn!(%component, "attributes of a simple-content type are not kept");
        }
        let overrides = facet_overrides(derivation, doc, &component)?;
        self.restrict(id, base, &overrides)
    }

    fn fill_complex(&mut self, id: TypeId, node: &Element, doc: &SchemaDoc, owner: &str) -> Result<()> {
        let mut fields: IndexMap<String, Field> = IndexMap::new();
        let mut extends = None;
        for child in xsd_children(node) {
            match child.local_name() {
                elems::SEQUENCE | elems::CHOICE | elems::ALL => {
                    self.particles(child, doc, owner, false, &mut fields)?
                }
                elems::ATTRIBUTE => {
                    if let Some(field) = self.attribute_field(child, doc, owner)? {
                        insert_field(&mut fields, field, doc, owner)?;
                    }
                }
                elems::COMPLEX_CONTENT => {
                    for derivation in xsd_children(child) {
                        match derivation.local_name() {
                            elems::EXTENSION => {
                                let base = required(derivation, doc, attrs::BASE)?;
                                extends = Some(TypeRef::Resolved(self.resolve_type(derivation, base, doc)?));
                            }
                            elems::RESTRICTION => {
                                tracing::warn!(%owner, "complexContent restriction read as a plain content model")
                            }
                            _ => continue,
                        }
                        for part in xsd_children(derivation) {
                            match part.local_name() {
                                elems::SEQUENCE | elems::CHOICE | elems::ALL => {
                                    self.particles(part, doc, owner, false, &mut fields)?
                                }
                                elems::ATTRIBUTE => {
                                    if let Some(field) = self.attribute_field(part, doc, owner)? {
                                        insert_field(&mut fields, field, doc, owner)?;
                                    }
                                }
                                _ => {}
                            }
                        }
                    }
                }
                elems::ATTRIBUTE_GROUP | elems::ANY_ATTRIBUTE | elems::GROUP => {
                    tracing::warn!(%owner, kind = child.local_name(), "unsupported particle skipped")
                }
                _ => {}
            }
        }

        let doc_text = documentation(node);
        let descriptor = self.registry.get_mut(id);
        descriptor.kind = TypeKind::Complex;
        descriptor.fields = fields;
        descriptor.extends = extends;
        if doc_text.is_some() {
            descriptor.documentation = doc_text;
        }
        self.registry.check_inheritance(id)
    }

    fn particles(
        &mut self,
        node: &Element,
        doc: &SchemaDoc,
        owner: &str,
        in_choice: bool,
        fields: &mut IndexMap<String, Field>,
    ) -> Result<()> {
        let in_choice = in_choice || node.local_name() == elems::CHOICE;
        for child in xsd_children(node) {
            match child.local_name() {
                elems::ELEMENT => self.element_field(child, doc, owner, in_choice, fields)?,
                elems::SEQUENCE | elems::CHOICE | elems::ALL => {
                    self.particles(child, doc, owner, in_choice, fields)?
                }
                elems::ANY | elems::GROUP => {
                    tracing::debug!(%owner, kind = child.local_name(), "particle skipped")
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn element_field(
        &mut self,
        node: &Element,
        doc: &SchemaDoc,
        owner: &str,
        in_choice: bool,
        fields: &mut IndexMap<String, Field>,
    ) -> Result<()> {
        let mut occurs = parse_occurs(
            node.get_attribute(attrs::MIN_OCCURS),
            node.get_attribute(attrs::MAX_OCCURS),
        )
        .map_err(|e| located(doc, owner, e.to_string()))?;
        if in_choice {
            occurs.min = 0;
        }
        let nillable = matches!(node.get_attribute(attrs::NILLABLE), Some("true") | Some("1"));
        let mut options = FieldOptions::default();
        let mut carried = Vec::new();

        let (name, base) = match node.get_attribute(attrs::REF) {
            Some(reference) => {
                let qname = self.qualify(node, reference, doc)?;
                let id = self.elements.get(&qname).copied().ok_or_else(|| Error::UnresolvedType {
                    owner: owner.to_string(),
                    member: qname.to_string(),
                })?;
                if qname.namespace() != doc.namespace.as_deref() {
                    options.sub_ns = qname.namespace().map(str::to_string);
                }
                (qname.local_name.clone(), id)
            }
            None => {
                let name = required(node, doc, attrs::NAME)?.to_string();
                let base = self.element_type(node, doc, owner, &name, &mut carried)?;
                (name, base)
            }
        };

        let mut overrides = Overrides::new().with_occurs(occurs).with_nillable(nillable);
        if let Some(default) = node.get_attribute(attrs::DEFAULT) {
            overrides = overrides.with_default(default);
        }
        let ty = self.registry.derive(base, &overrides)?;
        insert_field(
            fields,
            Field {
                name: name.clone(),
                ty: TypeRef::Resolved(ty),
                options,
            },
            doc,
            owner,
        )?;
        for mut attribute in carried {
            attribute.options.attribute = false;
            attribute.options.attribute_of = Some(name.clone());
            insert_field(fields, attribute, doc, owner)?;
        }
        Ok(())
    }

    /// Type of a local element; attributes of an inline simple-content
    /// extension are returned through `carried`
    fn element_type(
        &mut self,
        node: &Element,
        doc: &SchemaDoc,
        owner: &str,
        name: &str,
        carried: &mut Vec<Field>,
    ) -> Result<TypeId> {
        if let Some(value) = node.get_attribute(attrs::TYPE) {
            return self.resolve_type(node, value, doc);
        }
        let anonymous = anonymous_type_name(owner, name, &self.naming.type_suffix);
        for child in xsd_children(node) {
            match child.local_name() {
                elems::COMPLEX_TYPE => {
                    let simple_content = xsd_children(child)
                        .find(|c| c.local_name() == elems::SIMPLE_CONTENT)
                        .and_then(|c| xsd_children(c).find(|d| d.local_name() == elems::EXTENSION));
                    if let Some(extension) = simple_content {
                        let base = required(extension, doc, attrs::BASE)?;
                        let base = self.resolve_type(extension, base, doc)?;
                        for attribute in xsd_children(extension).filter(|c| c.local_name() == elems::ATTRIBUTE) {
                            if let Some(field) = self.attribute_field(attribute, doc, owner)? {
                                carried.push(field);
                            }
                        }
                        return Ok(base);
                    }
                    let id = self
                        .registry
                        .add(TypeDescriptor::new(TypeKind::Complex).named(doc.namespace.as_deref(), &anonymous));
                    self.fill_type(id, child, doc)?;
                    self.complete.insert(id);
                    return Ok(id);
                }
                elems::SIMPLE_TYPE => {
                    let id = self
                        .registry
                        .add(TypeDescriptor::new(TypeKind::Simple).named(doc.namespace.as_deref(), &anonymous));
                    self.fill_simple(id, child, doc)?;
                    self.complete.insert(id);
                    return Ok(id);
                }
                _ => {}
            }
        }
        Ok(self.any_type())
    }

    fn attribute_field(&mut self, node: &Element, doc: &SchemaDoc, owner: &str) -> Result<Option<Field>> {
        if node.get_attribute(attrs::REF).is_some() {
            tracing::warn!(%owner, "attribute references are not supported and were skipped");
            return Ok(None);
        }
        let name = required(node, doc, attrs::NAME)?.to_string();
        let min = match node.get_attribute(attrs::USE) {
            Some("prohibited") => return Ok(None),
            Some("required") => 1,
            _ => 0,
        };
        let base = match node.get_attribute(attrs::TYPE) {
            Some(value) => self.resolve_type(node, value, doc)?,
            None => match xsd_children(node).find(|c| c.local_name() == elems::SIMPLE_TYPE) {
                Some(inline) => {
                    let anonymous = anonymous_type_name(owner, &name, &self.naming.type_suffix);
                    let id = self
                        .registry
                        .add(TypeDescriptor::new(TypeKind::Simple).named(doc.namespace.as_deref(), &anonymous));
                    self.fill_simple(id, inline, doc)?;
                    self.complete.insert(id);
                    id
                }
                None => self.registry.builtin(crate::model::Primitive::String),
            },
        };
        let mut overrides = Overrides::new()
            .with_occurs(Occurs::new(min, Some(1)))
            .with_nillable(false);
        if let Some(default) = node.get_attribute(attrs::DEFAULT) {
            overrides = overrides.with_default(default);
        }
        let ty = self.registry.derive(base, &overrides)?;
        Ok(Some(Field {
            name,
            ty: TypeRef::Resolved(ty),
            options: FieldOptions {
                attribute: true,
                ..FieldOptions::default()
            },
        }))
    }
}

fn insert_field(fields: &mut IndexMap<String, Field>, field: Field, doc: &SchemaDoc, owner: &str) -> Result<()> {
    if fields.contains_key(&field.name) {
        return Err(located(doc, owner, format!("field '{}' declared twice", field.name)));
    }
    fields.insert(field.name.clone(), field);
    Ok(())
}

/// Facets of a restriction; multiple patterns are alternatives
fn facet_overrides(node: &Element, doc: &SchemaDoc, component: &str) -> Result<Overrides> {
    let mut overrides = Overrides::new();
    let mut values = Vec::new();
    let mut patterns = Vec::new();

    let length = |value: &str| -> Result<usize> {
        value
            .trim()
            .parse::<usize>()
            .map_err(|_| located(doc, component, format!("invalid length facet '{}'", value)))
    };

    for facet in xsd_children(node) {
        let value = match facet.get_attribute(attrs::VALUE) {
            Some(value) => value,
            None => continue,
        };
        let bound = || match Decimal::from_str(value.trim()) {
            Ok(bound) => Some(bound),
            Err(_) => {
                tracing::warn!(%component, value, "non-numeric bound ignored");
                None
            }
        };
        match facet.local_name() {
            "enumeration" => values.push(value.to_string()),
            "length" => overrides = overrides.with_length(length(value)?),
            "minLength" => overrides = overrides.with_min_len(length(value)?),
            "maxLength" => overrides = overrides.with_max_len(length(value)?),
            "pattern" => patterns.push(value.to_string()),
            "minInclusive" => {
                if let Some(b) = bound() {
                    overrides = overrides.with_ge(b);
                }
            }
            "minExclusive" => {
                if let Some(b) = bound() {
                    overrides = overrides.with_gt(b);
                }
            }
            "maxInclusive" => {
                if let Some(b) = bound() {
                    overrides = overrides.with_le(b);
                }
            }
            "maxExclusive" => {
                if let Some(b) = bound() {
                    overrides = overrides.with_lt(b);
                }
            }
            other => tracing::debug!(%component, facet = other, "facet ignored"),
        }
    }

    if !values.is_empty() {
        overrides = overrides.with_values(values);
    }
    match patterns.len() {
        0 => {}
        1 => overrides = overrides.with_pattern(patterns.remove(0)),
        _ => {
            let joined = patterns
                .iter()
                .map(|p| format!("(?:{})", p))
                .collect::<Vec<_>>()
                .join("|");
            overrides = overrides.with_pattern(joined);
        }
    }
    Ok(overrides)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Primitive;

    const PEOPLE: &str = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:tns="urn:people" targetNamespace="urn:people"
           elementFormDefault="qualified">
  <xs:simpleType name="Code">
    <xs:restriction base="tns:Short"><xs:maxLength value="3"/></xs:restriction>
  </xs:simpleType>
  <xs:simpleType name="Short">
    <xs:restriction base="xs:string"><xs:maxLength value="8"/></xs:restriction>
  </xs:simpleType>
  <xs:simpleType name="Color">
    <xs:restriction base="xs:string">
      <xs:enumeration value="red"/>
      <xs:enumeration value="green"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:complexType name="Person">
    <xs:annotation><xs:documentation>Someone</xs:documentation></xs:annotation>
    <xs:sequence>
      <xs:element name="name" type="xs:string"/>
      <xs:element name="code" type="tns:Code" minOccurs="0"/>
      <xs:element name="tags" type="xs:string" minOccurs="0" maxOccurs="unbounded" nillable="true"/>
      <xs:element name="address">
        <xs:complexType>
          <xs:sequence><xs:element name="city" type="xs:token"/></xs:sequence>
        </xs:complexType>
      </xs:element>
      <xs:element name="label">
        <xs:complexType>
          <xs:simpleContent>
            <xs:extension base="xs:string">
              <xs:attribute name="lang" type="xs:language" use="required"/>
            </xs:extension>
          </xs:simpleContent>
        </xs:complexType>
      </xs:element>
      <xs:choice>
        <xs:element name="email" type="xs:string"/>
        <xs:element name="phone" type="xs:string"/>
      </xs:choice>
    </xs:sequence>
    <xs:attribute name="id" type="xs:int" use="required"/>
  </xs:complexType>
  <xs:complexType name="Employee">
    <xs:complexContent>
      <xs:extension base="tns:Person">
        <xs:sequence><xs:element name="salary" type="xs:decimal"/></xs:sequence>
      </xs:extension>
    </xs:complexContent>
  </xs:complexType>
  <xs:element name="Person" type="tns:Person"/>
  <xs:element name="boss" type="tns:Employee"/>
</xs:schema>"#;

    #[test]
    fn test_parse_people() {
        let parsed = SchemaParser::new().parse_str(PEOPLE).unwrap();
        let registry = parsed.registry();
        assert_eq!(parsed.namespaces(), ["urn:people".to_string()]);

        let person = parsed.lookup("urn:people", "Person").unwrap();
        let descriptor = registry.get(person);
        assert_eq!(descriptor.documentation.as_deref(), Some("Someone"));
        let names: Vec<&str> = descriptor.fields.keys().map(|k| k.as_str()).collect();
        assert_eq!(
            names,
            vec!["name", "code", "tags", "address", "label", "lang", "email", "phone", "id"]
        );

        let name = registry.field_type(person, &descriptor.fields["name"]).unwrap();
        assert_eq!(registry.get(name).attributes.occurs, Occurs::once());
        assert!(!registry.get(name).attributes.nillable);

        let tags = registry.field_type(person, &descriptor.fields["tags"]).unwrap();
        assert_eq!(registry.get(tags).attributes.occurs, Occurs::zero_or_more());
        assert!(registry.get(tags).attributes.nillable);

        let address = registry.field_type(person, &descriptor.fields["address"]).unwrap();
        assert_eq!(
            registry.get(registry.wire_type(address)).type_name.as_deref(),
            Some("Person_addressType")
        );

        let lang = &descriptor.fields["lang"];
        assert_eq!(lang.options.attribute_of.as_deref(), Some("label"));
        let email = registry.field_type(person, &descriptor.fields["email"]).unwrap();
        assert_eq!(registry.get(email).attributes.occurs.min, 0);
        assert!(descriptor.fields["id"].options.attribute);
    }

    #[test]
    fn test_forward_simple_base_needs_second_pass() {
        let parsed = SchemaParser::new().parse_str(PEOPLE).unwrap();
        assert!(parsed.passes() >= 2);
        let code = parsed.lookup("urn:people", "Code").unwrap();
        let facets = &parsed.registry().get(code).attributes.facets;
        assert_eq!(facets.max_len, Some(3));
        assert_eq!(parsed.registry().get(code).primitive, Some(Primitive::String));
    }

    #[test]
    fn test_enumeration_and_extension() {
        let parsed = SchemaParser::new().parse_str(PEOPLE).unwrap();
        let registry = parsed.registry();
        let color = parsed.lookup("urn:people", "Color").unwrap();
        assert_eq!(registry.get(color).kind, TypeKind::Enum);

        let employee = parsed.lookup("urn:people", "Employee").unwrap();
        let person = parsed.lookup("urn:people", "Person").unwrap();
        assert_eq!(registry.parent(employee), Some(person));
        assert_eq!(registry.flat_fields(employee).last().unwrap().name, "salary");
    }

    #[test]
    fn test_global_elements() {
        let parsed = SchemaParser::new().parse_str(PEOPLE).unwrap();
        let person = parsed.lookup("urn:people", "Person").unwrap();
        assert_eq!(
            parsed.element(&QName::namespaced("urn:people", "Person")),
            Some(person)
        );
        let boss = parsed
            .element(&QName::namespaced("urn:people", "boss"))
            .unwrap();
        assert_eq!(parsed.registry().get(boss).kind, TypeKind::Alias);
    }

    #[test]
    fn test_unresolved_reference() {
        let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
            xmlns:tns="urn:x" targetNamespace="urn:x">
          <xs:complexType name="A">
            <xs:sequence><xs:element name="b" type="tns:Missing"/></xs:sequence>
          </xs:complexType>
        </xs:schema>"#;
        let err = SchemaParser::new().parse_str(xsd).unwrap_err();
        assert!(matches!(err, Error::UnresolvedType { ref member, .. } if member.contains("Missing")));
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:x">
          <xs:complexType name="A"/>
          <xs:complexType name="A"/>
        </xs:schema>"#;
        assert!(matches!(
            SchemaParser::new().parse_str(xsd),
            Err(Error::DuplicateType { .. })
        ));
    }

    #[test]
    fn test_include_adopts_namespace_and_mutual_imports() {
        let main = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
            xmlns:a="urn:a" xmlns:b="urn:b" targetNamespace="urn:a">
          <xs:import namespace="urn:b" schemaLocation="b.xsd"/>
          <xs:include schemaLocation="common.xsd"/>
          <xs:complexType name="Order">
            <xs:sequence>
              <xs:element name="item" type="b:Item"/>
              <xs:element name="note" type="a:Note"/>
            </xs:sequence>
          </xs:complexType>
        </xs:schema>"#;
        let common = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
          <xs:simpleType name="Note">
            <xs:restriction base="xs:string"><xs:maxLength value="10"/></xs:restriction>
          </xs:simpleType>
        </xs:schema>"#;
        let b = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
            xmlns:a="urn:a" xmlns:b="urn:b" targetNamespace="urn:b">
          <xs:import namespace="urn:a" schemaLocation="a.xsd"/>
          <xs:complexType name="Item">
            <xs:sequence><xs:element name="order" type="a:Order" minOccurs="0"/></xs:sequence>
          </xs:complexType>
        </xs:schema>"#;
        let files = NamespaceFiles::new()
            .with("a.xsd", main)
            .with("b.xsd", b)
            .with("common.xsd", common);
        let parsed = SchemaParser::new()
            .with_resolver(files)
            .parse_sources(vec![SchemaSource::inline("a.xsd", main)])
            .unwrap();

        assert!(parsed.lookup("urn:a", "Note").is_some());
        assert!(parsed.lookup("urn:a", "Order").is_some());
        assert!(parsed.lookup("urn:b", "Item").is_some());
        assert_eq!(parsed.namespaces().len(), 2);
    }

    #[test]
    fn test_merge_into_remaps_elements() {
        let parsed = SchemaParser::new().parse_str(PEOPLE).unwrap();
        let mut registry = TypeRegistry::new();
        let string = registry.builtin(Primitive::String);
        let before = registry.len();
        let elements = parsed.merge_into(&mut registry).unwrap();
        assert!(registry.len() > before);
        let person = elements[&QName::namespaced("urn:people", "Person")];
        assert_eq!(registry.lookup("urn:people", "Person"), Some(person));
        assert_eq!(registry.builtin(Primitive::String), string);
    }

    /// `s0.xsd` includes `s1.xsd`, which includes `s2.xsd`, and so on
    fn include_chain(length: usize) -> (NamespaceFiles, String) {
        let mut files = NamespaceFiles::new();
        let mut first = String::new();
        for n in 0..=length {
            let include = if n < length {
                format!(r#"<xs:include schemaLocation="s{}.xsd"/>"#, n + 1)
            } else {
                String::new()
            };
            let text = format!(
                r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:c">{}<xs:simpleType name="T{}"><xs:restriction base="xs:string"/></xs:simpleType></xs:schema>"#,
                include, n
            );
            if n == 0 {
                first = text.clone();
            }
            files = files.with(format!("s{}.xsd", n), text);
        }
        (files, first)
    }

    #[test]
    fn test_include_chain_depth_limited() {
        let parse = |max_depth: usize| {
            let (files, first) = include_chain(3);
            SchemaParser::new()
                .with_limits(Limits::default().with_max_schema_depth(max_depth))
                .with_resolver(files)
                .parse_sources(vec![SchemaSource::inline("s0.xsd", first)])
        };

        let parsed = parse(3).unwrap();
        assert!(parsed.lookup("urn:c", "T3").is_some());
        assert!(matches!(parse(2), Err(Error::LimitExceeded(_))));
    }

    #[test]
    fn test_schema_nesting_bounded_by_xml_depth() {
        let mut inner = r#"<xs:element name="leaf" type="xs:string"/>"#.to_string();
        for n in 0..4 {
            inner = format!(
                r#"<xs:element name="e{}"><xs:complexType><xs:sequence>{}</xs:sequence></xs:complexType></xs:element>"#,
                n, inner
            );
        }
        let text = format!(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:n">{}</xs:schema>"#,
            inner
        );

        assert!(SchemaParser::new().parse_str(&text).is_ok());
        let shallow = SchemaParser::new().with_limits(Limits::default().with_max_xml_depth(6));
        assert!(matches!(shallow.parse_str(&text), Err(Error::LimitExceeded(_))));
    }

    #[test]
    fn test_malformed_reference_rejected() {
        let text = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:tns="urn:q" targetNamespace="urn:q">
          <xs:complexType name="A">
            <xs:sequence><xs:element name="b" type="tns:B:C"/></xs:sequence>
          </xs:complexType>
        </xs:schema>"#;
        match SchemaParser::new().parse_str(text) {
            Err(Error::Parse(e)) => assert!(e.to_string().contains("tns:B:C")),
            other => panic!("expected a parse error, got {:?}", other.map(|_| ())),
        }
    }
}
