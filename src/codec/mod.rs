//! Schema-aware XML codec
//!
//! [`XmlCodec`] turns native [`Value`]s into element trees and back,
//! driven by the descriptors of a resolved [`Interface`]. Decoding checks
//! values according to the [`ValidationMode`]:
//!
//! - `skip`: no checks
//! - `soft`: facets of the decoded values, nil rules and occurrence counts
//! - `schema`: the whole document is first validated against the emitted
//!   schemas, then decoded as in `soft`
//!
//! Per-message failures are reported on an [`Exchange`] as a [`Fault`]
//! instead of aborting the caller.

mod decode;
mod encode;
mod stream;

pub use stream::FragmentStream;

use crate::config::ValidationMode;
use crate::documents::{Document, Element, XmlWriter};
use crate::error::{Error, Fault, Result, ValidationError};
use crate::interface::Interface;
use crate::limits::Limits;
use crate::model::{Field, TypeId, TypeKind, TypeRegistry, Value};
use crate::namespaces::QName;
use crate::schema::ValidationSchema;
use decode::Decoder;
use encode::Encoder;
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;

/// Outcome of decoding one incoming message
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    /// Root element of the message, when it could be read
    pub element: Option<QName>,
    /// Type bound to the root element
    pub ty: Option<TypeId>,
    /// Decoded value; None when a fault is attached
    pub value: Option<Value>,
    /// Fault to answer with
    pub fault: Option<Fault>,
}

impl Exchange {
    fn failed(element: Option<QName>, ty: Option<TypeId>, err: &Error) -> Self {
        Self {
            element,
            ty,
            value: None,
            fault: Some(Fault::from(err)),
        }
    }

    /// Whether decoding failed
    pub fn is_fault(&self) -> bool {
        self.fault.is_some()
    }

    /// Decoded value or the attached fault
    pub fn into_result(self) -> std::result::Result<Value, Fault> {
        match (self.value, self.fault) {
            (_, Some(fault)) => Err(fault),
            (Some(value), None) => Ok(value),
            (None, None) => Err(Fault::server("exchange carries neither value nor fault")),
        }
    }
}

/// Encoder and decoder bound to one interface.
///
/// The codec only reads the interface; one instance can serve concurrent
/// calls. The validation schema used in `schema` mode is built on first
/// use and shared afterwards.
pub struct XmlCodec {
    interface: Arc<Interface>,
    mode: ValidationMode,
    limits: Limits,
    schema: OnceCell<Arc<ValidationSchema>>,
}

impl fmt::Debug for XmlCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlCodec")
            .field("target_namespace", &self.interface.target_namespace())
            .field("mode", &self.mode)
            .field("schema_built", &self.schema.get().is_some())
            .finish()
    }
}

impl XmlCodec {
    /// Codec using the interface's validation mode and limits
    pub fn new(interface: Arc<Interface>) -> Self {
        let mode = interface.config().validation;
        let limits = interface.config().limits.clone();
        Self {
            interface,
            mode,
            limits,
            schema: OnceCell::new(),
        }
    }

    /// Override the validation mode
    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Override the limits applied to incoming documents
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Interface the codec reads
    pub fn interface(&self) -> &Arc<Interface> {
        &self.interface
    }

    /// Validation mode
    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Schema used in `schema` mode, built once
    pub fn validation_schema(&self) -> Result<Arc<ValidationSchema>> {
        self.schema
            .get_or_try_init(|| {
                tracing::debug!(target_namespace = %self.interface.target_namespace(), "building validation schema");
                ValidationSchema::from_interface(&self.interface).map(Arc::new)
            })
            .map(Arc::clone)
    }

    fn registry(&self) -> &TypeRegistry {
        self.interface.registry()
    }

    fn writer(&self) -> XmlWriter {
        XmlWriter::new().with_prefix_hints(self.interface.namespaces().prefixes().clone())
    }

    fn root_name(&self, ty: TypeId) -> Result<QName> {
        self.interface.element_qname(ty).ok_or_else(|| {
            Error::Type(format!(
                "{} has no global element; use encode_as",
                self.registry().get(ty).display_name()
            ))
        })
    }

    /// Encode `value` as the global element of `ty`
    pub fn encode(&self, ty: TypeId, value: &Value) -> Result<Element> {
        let name = self.root_name(ty)?;
        self.encode_as(name, ty, value)
    }

    /// Encode `value` as an element named `name`
    pub fn encode_as(&self, name: QName, ty: TypeId, value: &Value) -> Result<Element> {
        let mut path = Path::root(&name.local_name);
        Encoder::new(self.registry()).element(name, ty, value, &mut path)
    }

    /// Encode and serialize `value` as the global element of `ty`
    pub fn to_string(&self, ty: TypeId, value: &Value) -> Result<String> {
        let element = self.encode(ty, value)?;
        self.writer().write(&element)
    }

    /// Encode an outgoing message; failures become faults
    pub fn encode_message(&self, ty: TypeId, value: &Value) -> std::result::Result<String, Fault> {
        self.to_string(ty, value).map_err(|e| {
            tracing::warn!(error = %e, "encoding failed");
            Fault::from(&e)
        })
    }

    /// Decode `element` as `ty`
    pub fn decode(&self, ty: TypeId, element: &Element) -> Result<Value> {
        if self.mode == ValidationMode::Schema {
            let schema = self.validation_schema()?;
            if schema.has_element(&element.qname) {
                schema.validate(element)?;
            }
        }
        let mut path = Path::root(element.local_name());
        Decoder::new(self.registry(), self.mode).element(element, ty, &mut path)
    }

    /// Parse and decode a document whose root is of type `ty`
    pub fn decode_str(&self, ty: TypeId, xml: &str) -> Result<Value> {
        let root = self.parse(xml)?;
        self.decode(ty, &root)
    }

    /// Decode a document rooted at any global element of the interface
    pub fn decode_document(&self, xml: &str) -> Result<(TypeId, Value)> {
        let root = self.parse(xml)?;
        let ty = self.root_type(&root)?;
        Ok((ty, self.decode(ty, &root)?))
    }

    /// Decode an incoming message, attaching failures as a fault
    pub fn decode_message(&self, xml: &str) -> Exchange {
        let root = match self.parse(xml) {
            Ok(root) => root,
            Err(e) => {
                tracing::debug!(error = %e, "unreadable message");
                return Exchange::failed(None, None, &e);
            }
        };
        let element = Some(root.qname.clone());
        let ty = match self.root_type(&root) {
            Ok(ty) => ty,
            Err(e) => return Exchange::failed(element, None, &e),
        };
        match self.decode(ty, &root) {
            Ok(value) => Exchange {
                element,
                ty: Some(ty),
                value: Some(value),
                fault: None,
            },
            Err(e) => {
                tracing::debug!(error = %e, element = %root.qname, "message rejected");
                Exchange::failed(element, Some(ty), &e)
            }
        }
    }

    /// Stream an array as fragments: the wrapper start tag, one fragment
    /// per item, then the end tag. Items are encoded as they are pulled.
    pub fn stream<I>(&self, name: QName, array: TypeId, items: I) -> Result<FragmentStream<'_, I::IntoIter>>
    where
        I: IntoIterator<Item = Value>,
    {
        let registry = self.registry();
        let wire = registry.content_type(array);
        if registry.get(wire).kind != TypeKind::Array {
            return Err(Error::Type(format!(
                "{} is not an array",
                registry.get(wire).display_name()
            )));
        }
        FragmentStream::new(registry, self.writer(), name, wire, items.into_iter())
    }

    fn parse(&self, xml: &str) -> Result<Element> {
        Document::parse_with_limits(xml.as_bytes(), &self.limits)?.into_root()
    }

    fn root_type(&self, root: &Element) -> Result<TypeId> {
        self.interface.element(&root.qname).ok_or_else(|| {
            ValidationError::new(format!("{} is not a message element", root.qname))
                .with_path(format!("/{}", root.local_name()))
                .into()
        })
    }
}

/// Element path of the node being processed
#[derive(Debug, Clone, Default)]
pub(crate) struct Path(Vec<String>);

impl Path {
    pub(crate) fn root(name: &str) -> Self {
        Path(vec![name.to_string()])
    }

    pub(crate) fn push(&mut self, name: &str) {
        self.0.push(name.to_string());
    }

    pub(crate) fn pop(&mut self) {
        self.0.pop();
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.0 {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

/// A field of a record as it appears on the wire
#[derive(Debug, Clone)]
pub(crate) struct Slot<'r> {
    pub field: &'r Field,
    /// Resolved field type; occurrence bounds and nillable come from it
    pub ty: TypeId,
    /// Element namespace; None for attributes
    pub namespace: Option<String>,
}

impl Slot<'_> {
    pub(crate) fn qname(&self) -> QName {
        QName::new(self.namespace.as_deref(), self.field.wire_name())
    }
}

/// Wire fields of a record type, parent fields first.
///
/// Faults carry only their own fields. Elements take the namespace of the
/// schema that declares them: a private ancestor's fields belong to the
/// nearest public descendant, which inlines them.
pub(crate) fn layout(registry: &TypeRegistry, ty: TypeId) -> Result<Vec<Slot<'_>>> {
    let wire = registry.content_type(ty);
    let descriptor = registry.get(wire);
    let lineage = if descriptor.kind == TypeKind::Fault {
        vec![wire]
    } else {
        registry.lineage(wire)
    };

    let mut slots: IndexMap<&str, Slot<'_>> = IndexMap::new();
    for (i, ancestor) in lineage.iter().enumerate() {
        let declaring = lineage[i..]
            .iter()
            .find(|id| !registry.get(**id).private)
            .or_else(|| lineage.last())
            .copied()
            .unwrap_or(wire);
        let schema_ns = registry.get(declaring).namespace.clone();
        for (key, field) in &registry.get(*ancestor).fields {
            let namespace = if field.options.is_attribute() {
                None
            } else {
                field.options.sub_ns.clone().or_else(|| schema_ns.clone())
            };
            let slot = Slot {
                field,
                ty: registry.field_type(*ancestor, field)?,
                namespace,
            };
            slots.insert(key.as_str(), slot);
        }
    }
    Ok(slots.into_values().collect())
}

/// Element name of an array member
pub(crate) fn member_name(registry: &TypeRegistry, array: TypeId) -> Result<(TypeId, QName)> {
    let wire = registry.content_type(array);
    let member = registry.item_type(wire)?;
    let target = registry.get(registry.content_type(member));
    let local = target
        .element_name
        .as_deref()
        .or(target.type_name.as_deref())
        .unwrap_or("item");
    Ok((member, QName::new(registry.get(wire).namespace.as_deref(), local)))
}
