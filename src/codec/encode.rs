//! Values to element trees

use crate::codec::{layout, member_name, Path, Slot};
use crate::documents::Element;
use crate::error::{Error, Result};
use crate::model::{Record, TypeId, TypeKind, TypeRegistry, Value};
use crate::namespaces::{QName, XSI_NAMESPACE};
use std::borrow::Cow;

pub(crate) struct Encoder<'r> {
    registry: &'r TypeRegistry,
}

impl<'r> Encoder<'r> {
    pub(crate) fn new(registry: &'r TypeRegistry) -> Self {
        Self { registry }
    }

    /// Element `name` holding `value` as type `ty`.
    ///
    /// A null value becomes the type's default when it has one, and an
    /// empty nil element otherwise.
    pub(crate) fn element(&self, name: QName, ty: TypeId, value: &Value, path: &mut Path) -> Result<Element> {
        let value = materialize(value, path)?;
        let mut element = Element::new(name);
        let content = self.registry.content_type(ty);
        let descriptor = self.registry.get(content);

        if value.is_null() {
            match &self.registry.get(ty).attributes.default {
                Some(default) if descriptor.kind.is_simple() => element.set_text(default.as_str()),
                _ => element.set_attribute(QName::namespaced(XSI_NAMESPACE, "nil"), "true"),
            }
            return Ok(element);
        }

        match descriptor.kind {
            TypeKind::Simple | TypeKind::Enum => {
                element.set_text(self.lexical(content, &value, path)?);
            }
            TypeKind::Complex | TypeKind::Fault => {
                let record = value.as_record().ok_or_else(|| mismatch("record", &value, path))?;
                self.record(&mut element, content, record, path)?;
            }
            TypeKind::Array => {
                let items = value.as_list().ok_or_else(|| mismatch("list", &value, path))?;
                let (member, member_qname) = member_name(self.registry, content)?;
                for item in items {
                    path.push(&member_qname.local_name);
                    let child = self.element(member_qname.clone(), member, item, path)?;
                    path.pop();
                    element.add_child(child);
                }
            }
            TypeKind::Alias => {
                return Err(Error::Type(format!("{}: alias without target", path)));
            }
        }
        Ok(element)
    }

    fn lexical(&self, content: TypeId, value: &Value, path: &Path) -> Result<String> {
        let descriptor = self.registry.get(content);
        let primitive = descriptor
            .primitive
            .ok_or_else(|| Error::Type(format!("{}: {} has no primitive", path, descriptor.display_name())))?;
        primitive
            .format(value)
            .map_err(|e| Error::Type(format!("{}: {}", path, e)))
    }

    fn record(&self, element: &mut Element, ty: TypeId, record: &Record, path: &mut Path) -> Result<()> {
        let slots = layout(self.registry, ty)?;
        for slot in slots.iter().filter(|s| s.field.options.attribute) {
            let value = materialize(record.get_or_null(&slot.field.name), path)?;
            if let Some(text) = self.attribute_text(slot, &value, path)? {
                element.set_attribute(QName::local(slot.field.wire_name()), text);
            }
        }

        for slot in slots.iter().filter(|s| !s.field.options.is_attribute()) {
            let value = materialize(record.get_or_null(&slot.field.name), path)?;
            let attributes = self.registry.get(slot.ty).attributes.clone();
            let first = element.children.len();

            path.push(slot.field.wire_name());
            match (value.as_ref(), attributes.occurs.is_multiple()) {
                (Value::Null, true) => {}
                (Value::List(items), true) => {
                    for item in items {
                        let child = self.element(slot.qname(), slot.ty, item, path)?;
                        element.add_child(child);
                    }
                }
                (Value::Null, false) if attributes.occurs.min == 0 && attributes.default.is_none() => {}
                (value, _) => {
                    let child = self.element(slot.qname(), slot.ty, value, path)?;
                    element.add_child(child);
                }
            }

            let carried: Vec<&Slot<'_>> = slots
                .iter()
                .filter(|s| s.field.options.attribute_of.as_deref() == Some(slot.field.name.as_str()))
                .collect();
            if !carried.is_empty() {
                self.carry(element, first, slot, &carried, record, path)?;
            }
            path.pop();
        }
        Ok(())
    }

    /// Set attribute-of values on the sibling's occurrences, written from
    /// index `first`.
    ///
    /// A repeated sibling takes one value per written occurrence; values
    /// past the last occurrence are dropped. An absent single sibling is
    /// written as a nil element so the attributes have a carrier.
    fn carry(
        &self,
        element: &mut Element,
        first: usize,
        sibling: &Slot<'_>,
        carried: &[&Slot<'_>],
        record: &Record,
        path: &Path,
    ) -> Result<()> {
        let attributes = &self.registry.get(sibling.ty).attributes;
        let repeated = attributes.occurs.is_multiple();
        for slot in carried {
            let value = materialize(record.get_or_null(&slot.field.name), path)?;
            let values: Vec<&Value> = match value.as_ref() {
                Value::List(items) if repeated => items.iter().collect(),
                Value::Null => continue,
                single => vec![single],
            };
            for (i, value) in values.into_iter().enumerate() {
                let value = materialize(value, path)?;
                let text = match self.attribute_text(slot, &value, path)? {
                    Some(text) => text,
                    None => continue,
                };
                if element.children.len() <= first + i {
                    if repeated {
                        tracing::debug!(
                            %path,
                            attribute = slot.field.wire_name(),
                            occurrences = i,
                            "attribute values outnumber occurrences"
                        );
                        break;
                    }
                    if !attributes.nillable {
                        return Err(Error::Type(format!(
                            "{}: attribute '{}' needs a value for '{}', which is not nillable",
                            path,
                            slot.field.wire_name(),
                            sibling.field.name
                        )));
                    }
                    let mut nil = Element::new(sibling.qname());
                    nil.set_attribute(QName::namespaced(XSI_NAMESPACE, "nil"), "true");
                    element.add_child(nil);
                }
                if let Some(child) = element.children.get_mut(first + i) {
                    child.set_attribute(QName::local(slot.field.wire_name()), text);
                }
            }
        }
        Ok(())
    }

    fn attribute_text(&self, slot: &Slot<'_>, value: &Value, path: &Path) -> Result<Option<String>> {
        let content = self.registry.content_type(slot.ty);
        if !self.registry.get(content).kind.is_simple() {
            return Err(Error::Type(format!(
                "{}: attribute '{}' must have a simple type",
                path,
                slot.field.wire_name()
            )));
        }
        if value.is_null() {
            return Ok(self.registry.get(slot.ty).attributes.default.clone());
        }
        self.lexical(content, value, path).map(Some)
    }
}

/// Evaluate deferred values; a failing computation is an internal error
fn materialize<'v>(value: &'v Value, path: &Path) -> Result<Cow<'v, Value>> {
    let mut current = Cow::Borrowed(value);
    while let Value::Lazy(lazy) = current.as_ref() {
        let evaluated = lazy.evaluate().map_err(|reason| {
            tracing::error!(%path, %reason, "deferred value failed");
            Error::Internal(format!("reading {} failed: {}", path, reason))
        })?;
        current = Cow::Owned(evaluated);
    }
    Ok(current)
}

fn mismatch(expected: &str, value: &Value, path: &Path) -> Error {
    Error::Type(format!(
        "{}: expected a {} value, got {}",
        path,
        expected,
        value.kind_name()
    ))
}
