//! XML element trees
//!
//! [`Document::parse`] builds a namespace-resolved element tree with
//! source positions, and [`XmlWriter`] serializes trees back to text,
//! declaring prefixes on first use.

use crate::error::{Error, Result, TextPosition};
use crate::limits::Limits;
use crate::namespaces::{well_known_prefix, NamespaceContext, QName, XML_NAMESPACE, XSI_NAMESPACE};
use indexmap::IndexMap;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// XML Element in the document tree
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Element qualified name
    pub qname: QName,
    /// Element attributes, in document order
    pub attributes: IndexMap<QName, String>,
    /// Text content (if any)
    pub text: Option<String>,
    /// Child elements
    pub children: Vec<Element>,
    /// Prefix bindings in scope for this element
    pub namespaces: NamespaceContext,
    /// Position of the start tag when parsed from text
    pub position: Option<TextPosition>,
}

impl Element {
    /// Create a new element
    pub fn new(qname: QName) -> Self {
        Self {
            qname,
            attributes: IndexMap::new(),
            text: None,
            children: Vec::new(),
            namespaces: NamespaceContext::new(),
            position: None,
        }
    }

    /// Get the local name of the element
    pub fn local_name(&self) -> &str {
        &self.qname.local_name
    }

    /// Get the namespace of the element
    pub fn namespace(&self) -> Option<&str> {
        self.qname.namespace.as_deref()
    }

    /// Get an unqualified attribute value by name
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(qname, _)| qname.namespace.is_none() && qname.local_name == name)
            .map(|(_, value)| value.as_str())
    }

    /// Get an attribute value by qualified name
    pub fn get_attribute_qname(&self, qname: &QName) -> Option<&str> {
        self.attributes.get(qname).map(|s| s.as_str())
    }

    /// Set an attribute
    pub fn set_attribute(&mut self, qname: QName, value: impl Into<String>) {
        self.attributes.insert(qname, value.into());
    }

    /// Builder form of [`Element::set_attribute`] for unqualified attributes
    pub fn with_attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attribute(QName::local(name), value);
        self
    }

    /// Add a child element
    pub fn add_child(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Builder form of [`Element::add_child`]
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Set text content
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    /// Builder form of [`Element::set_text`]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Bind a prefix on this element
    pub fn with_prefix(mut self, prefix: &str, namespace: &str) -> Self {
        self.namespaces.add_prefix(prefix, namespace);
        self
    }

    /// Find child elements by local name
    pub fn find_children(&self, local_name: &str) -> Vec<&Element> {
        self.children
            .iter()
            .filter(|e| e.local_name() == local_name)
            .collect()
    }

    /// First child with the given local name
    pub fn child(&self, local_name: &str) -> Option<&Element> {
        self.children.iter().find(|e| e.local_name() == local_name)
    }

    /// Whether the element carries `xsi:nil="true"`
    pub fn is_nil(&self) -> bool {
        matches!(
            self.get_attribute_qname(&QName::namespaced(XSI_NAMESPACE, "nil")),
            Some("true") | Some("1")
        )
    }

    /// Resolve a `prefix:name` value (such as a `type` attribute) in this element's scope
    pub fn resolve_qname(&self, value: &str) -> Result<QName> {
        self.namespaces.resolve(value.trim())
    }
}

/// XML Document representation
#[derive(Debug, Default)]
pub struct Document {
    /// Root element of the document
    pub root: Option<Element>,
}

impl Document {
    /// Create a new empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an XML document from a string
    pub fn from_string(xml: &str) -> Result<Self> {
        Self::parse(xml.as_bytes())
    }

    /// Parse an XML document from bytes with default limits
    pub fn parse(xml: &[u8]) -> Result<Self> {
        Self::parse_with_limits(xml, &Limits::default())
    }

    /// Parse an XML document from bytes, enforcing size and depth limits
    pub fn parse_with_limits(xml: &[u8], limits: &Limits) -> Result<Self> {
        limits.check_xml_size(xml.len())?;

        let mut reader = Reader::from_reader(xml);
        reader.trim_text(false);

        let mut doc = Document::new();
        let mut stack: Vec<(Element, String)> = Vec::new();
        let mut buf = Vec::new();

        loop {
            let offset = reader.buffer_position();
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    limits.check_xml_depth(stack.len() + 1)?;
                    let scope = stack.last().map(|(parent, _)| &parent.namespaces);
                    let mut element = Self::parse_element(&e, scope, limits)?;
                    element.position = Some(TextPosition::from_offset(xml, offset));
                    stack.push((element, String::new()));
                }
                Ok(Event::End(_)) => {
                    if let Some((mut current, text)) = stack.pop() {
                        current.text = Self::finish_text(text, !current.children.is_empty());
                        Self::attach(&mut doc, &mut stack, current);
                    }
                }
                Ok(Event::Empty(e)) => {
                    limits.check_xml_depth(stack.len() + 1)?;
                    let scope = stack.last().map(|(parent, _)| &parent.namespaces);
                    let mut element = Self::parse_element(&e, scope, limits)?;
                    element.position = Some(TextPosition::from_offset(xml, offset));
                    Self::attach(&mut doc, &mut stack, element);
                }
                Ok(Event::Text(e)) => {
                    if let Some((_, text)) = stack.last_mut() {
                        let chunk = e
                            .unescape()
                            .map_err(|e| Error::Xml(format!("Failed to unescape text: {}", e)))?;
                        text.push_str(&chunk);
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some((_, text)) = stack.last_mut() {
                        let raw = e.into_inner();
                        let chunk = std::str::from_utf8(&raw)
                            .map_err(|e| Error::Xml(format!("Invalid CDATA section: {}", e)))?;
                        text.push_str(chunk);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::Xml(format!(
                        "Error parsing XML at {}: {}",
                        TextPosition::from_offset(xml, reader.buffer_position()),
                        e
                    )))
                }
                _ => {} // Comments, processing instructions, doctype
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(Error::Xml("Unexpected end of document".to_string()));
        }
        if doc.root.is_none() {
            return Err(Error::Xml("Document has no root element".to_string()));
        }
        Ok(doc)
    }

    fn attach(doc: &mut Document, stack: &mut [(Element, String)], element: Element) {
        match stack.last_mut() {
            Some((parent, _)) => parent.add_child(element),
            None => doc.root = Some(element),
        }
    }

    fn finish_text(text: String, has_children: bool) -> Option<String> {
        if text.is_empty() || (has_children && text.trim().is_empty()) {
            None
        } else {
            Some(text)
        }
    }

    /// Parse element from BytesStart event, resolving names against `scope`
    fn parse_element(
        start: &BytesStart,
        scope: Option<&NamespaceContext>,
        limits: &Limits,
    ) -> Result<Element> {
        let name_bytes = start.name();
        let name = std::str::from_utf8(name_bytes.as_ref())
            .map_err(|e| Error::Xml(format!("Invalid element name: {}", e)))?;

        let mut declared = NamespaceContext::new();
        let mut raw_attributes = Vec::new();

        for attr_result in start.attributes() {
            let attr = attr_result
                .map_err(|e| Error::Xml(format!("Failed to parse attribute: {}", e)))?;

            let attr_name = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| Error::Xml(format!("Invalid attribute name: {}", e)))?
                .to_string();

            let attr_value = attr
                .unescape_value()
                .map_err(|e| Error::Xml(format!("Failed to unescape attribute value: {}", e)))?
                .to_string();

            if attr_name == "xmlns" {
                declared.set_default_namespace(attr_value);
            } else if let Some(prefix) = attr_name.strip_prefix("xmlns:") {
                declared.add_prefix(prefix, attr_value);
            } else {
                raw_attributes.push((attr_name, attr_value));
            }
        }
        limits.check_attributes(raw_attributes.len())?;

        let namespaces = match scope {
            Some(outer) => outer.extended(&declared),
            None => declared,
        };

        let qname = namespaces.resolve(name)?;
        let mut element = Element::new(qname);

        for (attr_name, attr_value) in raw_attributes {
            // Unprefixed attributes are never in the default namespace
            let attr_qname = if attr_name.contains(':') {
                namespaces.resolve(&attr_name)?
            } else {
                QName::local(attr_name)
            };
            element.attributes.insert(attr_qname, attr_value);
        }
        element.namespaces = namespaces;

        Ok(element)
    }

    /// Get the root element
    pub fn root(&self) -> Option<&Element> {
        self.root.as_ref()
    }

    /// Take the root element out of the document
    pub fn into_root(self) -> Result<Element> {
        self.root
            .ok_or_else(|| Error::Xml("Document has no root element".to_string()))
    }
}

/// Serializes element trees.
///
/// Prefixes already bound by an enclosing scope are reused. A namespace
/// with no binding is declared on the element that first needs it, using
/// the hinted prefix, the well-known prefix, or `nsN`.
#[derive(Debug, Clone, Default)]
pub struct XmlWriter {
    indent: Option<usize>,
    declaration: bool,
    hints: IndexMap<String, String>,
    scope: NamespaceContext,
}

impl XmlWriter {
    /// Create a compact writer without an XML declaration
    pub fn new() -> Self {
        Self::default()
    }

    /// Indent nested elements by `width` spaces
    pub fn with_indent(mut self, width: usize) -> Self {
        self.indent = Some(width);
        self
    }

    /// Emit an `<?xml ...?>` declaration first
    pub fn with_declaration(mut self, declaration: bool) -> Self {
        self.declaration = declaration;
        self
    }

    /// Preferred prefixes keyed by namespace
    pub fn with_prefix_hints(mut self, hints: IndexMap<String, String>) -> Self {
        self.hints = hints;
        self
    }

    /// Bindings assumed to be declared by an enclosing element
    pub fn with_scope(mut self, scope: NamespaceContext) -> Self {
        self.scope = scope;
        self
    }

    /// Serialize `element` and its subtree
    pub fn write(&self, element: &Element) -> Result<String> {
        let mut writer = self.writer();
        if self.declaration {
            writer
                .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
                .map_err(xml_error)?;
        }
        self.write_element(&mut writer, element, &self.scope)?;
        into_string(writer)
    }

    /// Serialize only the start tag of `element`, returning the tag, its
    /// qualified name and the scope its children are written in
    pub fn write_start(&self, element: &Element) -> Result<(String, String, NamespaceContext)> {
        let mut writer = Writer::new(Vec::new());
        let (name, attributes, inner) = self.prepare(element, &self.scope);
        let mut start = BytesStart::new(name.as_str());
        for (key, value) in &attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        writer.write_event(Event::Start(start)).map_err(xml_error)?;
        Ok((into_string(writer)?, name, inner))
    }

    /// Serialize the end tag matching [`XmlWriter::write_start`]
    pub fn write_end(&self, name: &str) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_error)?;
        into_string(writer)
    }

    fn writer(&self) -> Writer<Vec<u8>> {
        match self.indent {
            Some(width) => Writer::new_with_indent(Vec::new(), b' ', width),
            None => Writer::new(Vec::new()),
        }
    }

    fn write_element(
        &self,
        writer: &mut Writer<Vec<u8>>,
        element: &Element,
        scope: &NamespaceContext,
    ) -> Result<()> {
        let (name, attributes, inner) = self.prepare(element, scope);
        let mut start = BytesStart::new(name.as_str());
        for (key, value) in &attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if element.children.is_empty() && element.text.is_none() {
            writer.write_event(Event::Empty(start)).map_err(xml_error)?;
            return Ok(());
        }

        writer.write_event(Event::Start(start)).map_err(xml_error)?;
        if let Some(text) = &element.text {
            writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(xml_error)?;
        }
        for child in &element.children {
            self.write_element(writer, child, &inner)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(name.as_str())))
            .map_err(xml_error)?;
        Ok(())
    }

    /// Qualified name, serialized attributes (declarations first) and the child scope
    fn prepare(
        &self,
        element: &Element,
        scope: &NamespaceContext,
    ) -> (String, Vec<(String, String)>, NamespaceContext) {
        let mut inner = scope.clone();
        let mut declared = NamespaceContext::new();

        for (prefix, ns) in element.namespaces.iter() {
            if prefix == "xml" {
                continue;
            }
            if inner.get_namespace(prefix) != Some(ns) {
                declared.add_prefix(prefix, ns);
                inner.add_prefix(prefix, ns);
            }
        }

        let name = self.qualify(&element.qname, true, &mut inner, &mut declared);
        let mut attributes: Vec<(String, String)> = Vec::new();
        let mut plain = Vec::with_capacity(element.attributes.len());
        for (qname, value) in &element.attributes {
            let key = self.qualify(qname, false, &mut inner, &mut declared);
            plain.push((key, value.clone()));
        }

        for (prefix, ns) in declared.iter() {
            let key = if prefix.is_empty() {
                "xmlns".to_string()
            } else {
                format!("xmlns:{}", prefix)
            };
            attributes.push((key, ns.to_string()));
        }
        attributes.extend(plain);
        (name, attributes, inner)
    }

    fn qualify(
        &self,
        qname: &QName,
        is_element: bool,
        inner: &mut NamespaceContext,
        declared: &mut NamespaceContext,
    ) -> String {
        let ns = match qname.namespace() {
            None => return qname.local_name.clone(),
            Some(ns) => ns,
        };
        if ns == XML_NAMESPACE {
            return format!("xml:{}", qname.local_name);
        }
        if is_element && inner.get_default_namespace() == Some(ns) {
            return qname.local_name.clone();
        }
        if let Some(prefix) = inner.get_prefix(ns) {
            return format!("{}:{}", prefix, qname.local_name);
        }

        let prefix = self.allocate_prefix(ns, inner);
        declared.add_prefix(prefix.as_str(), ns);
        inner.add_prefix(prefix.as_str(), ns);
        format!("{}:{}", prefix, qname.local_name)
    }

    fn allocate_prefix(&self, ns: &str, inner: &NamespaceContext) -> String {
        let preferred = self
            .hints
            .get(ns)
            .map(|p| p.as_str())
            .or_else(|| well_known_prefix(ns));
        if let Some(prefix) = preferred {
            if !prefix.is_empty() && inner.get_namespace(prefix).is_none() {
                return prefix.to_string();
            }
        }
        let mut n = 0;
        loop {
            let candidate = format!("ns{}", n);
            if inner.get_namespace(&candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }
}

fn xml_error(e: quick_xml::Error) -> Error {
    Error::Xml(e.to_string())
}

fn into_string(writer: Writer<Vec<u8>>) -> Result<String> {
    String::from_utf8(writer.into_inner())
        .map_err(|e| Error::Xml(format!("Serialized XML is not UTF-8: {}", e)))
}
