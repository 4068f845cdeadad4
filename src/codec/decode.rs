//! Element trees to values

use crate::codec::{layout, member_name, Path, Slot};
use crate::config::ValidationMode;
use crate::documents::Element;
use crate::error::{Error, FrequencyError, Result, ValidationError};
use crate::model::{Occurs, Record, TypeId, TypeKind, TypeRegistry, Value};

pub(crate) struct Decoder<'r> {
    registry: &'r TypeRegistry,
    checks: bool,
}

impl<'r> Decoder<'r> {
    pub(crate) fn new(registry: &'r TypeRegistry, mode: ValidationMode) -> Self {
        Self {
            registry,
            checks: mode.checks_values(),
        }
    }

    pub(crate) fn element(&self, element: &Element, ty: TypeId, path: &mut Path) -> Result<Value> {
        if element.is_nil() {
            if self.checks && !self.registry.get(ty).attributes.nillable {
                return Err(invalid(path, element.local_name(), "element is not nillable").into());
            }
            return Ok(Value::Null);
        }

        let content = self.registry.content_type(ty);
        let descriptor = self.registry.get(content);
        match descriptor.kind {
            TypeKind::Simple | TypeKind::Enum => {
                let text = match element.text.as_deref() {
                    Some(text) => text,
                    None => self.registry.get(ty).attributes.default.as_deref().unwrap_or(""),
                };
                self.simple(content, text, element.local_name(), path)
            }
            TypeKind::Complex | TypeKind::Fault => self.record(element, content, path),
            TypeKind::Array => {
                let (member, member_qname) = member_name(self.registry, content)?;
                let mut items = Vec::new();
                for child in element.children.iter().filter(|c| c.qname == member_qname) {
                    path.push(child.local_name());
                    items.push(self.element(child, member, path)?);
                    path.pop();
                }
                let occurs = self.registry.get(member).attributes.occurs;
                self.check_frequency(&member_qname.local_name, occurs, items.len(), path)?;
                Ok(Value::List(items))
            }
            TypeKind::Alias => Err(Error::Type(format!("{}: alias without target", path))),
        }
    }

    fn simple(&self, content: TypeId, text: &str, field: &str, path: &Path) -> Result<Value> {
        let descriptor = self.registry.get(content);
        let primitive = descriptor
            .primitive
            .ok_or_else(|| Error::Type(format!("{}: {} has no primitive", path, descriptor.display_name())))?;
        let value = primitive.parse(text).map_err(|e| {
            invalid(path, field, format!("cannot read '{}'", field))
                .with_reason(e.to_string())
                .with_instance(text)
        })?;
        if self.checks {
            descriptor
                .attributes
                .facets
                .check(primitive, &value)
                .map_err(|reason| {
                    invalid(path, field, format!("invalid value for '{}'", field))
                        .with_reason(reason)
                        .with_instance(text)
                })?;
        }
        Ok(value)
    }

    fn record(&self, element: &Element, ty: TypeId, path: &mut Path) -> Result<Value> {
        let slots = layout(self.registry, ty)?;
        let elements: Vec<&Slot<'_>> = slots.iter().filter(|s| !s.field.options.is_attribute()).collect();

        let mut occurrences: Vec<Vec<&Element>> = vec![Vec::new(); elements.len()];
        for child in &element.children {
            let index = elements
                .iter()
                .position(|s| s.field.wire_name() == child.local_name() && s.namespace.as_deref() == child.namespace());
            match index {
                Some(index) => occurrences[index].push(child),
                None => tracing::debug!(%path, element = %child.qname, "ignoring unknown element"),
            }
        }

        let mut record = Record::new();
        for slot in slots.iter().filter(|s| s.field.options.attribute) {
            let value = self.attribute(slot, element.get_attribute(slot.field.wire_name()), path)?;
            record.set(slot.field.name.as_str(), value);
        }

        for (slot, found) in elements.iter().zip(&occurrences) {
            let attributes = &self.registry.get(slot.ty).attributes;
            path.push(slot.field.wire_name());
            self.check_frequency(slot.field.wire_name(), attributes.occurs, found.len(), path)?;

            let mut values = Vec::with_capacity(found.len());
            for child in found {
                values.push(self.element(child, slot.ty, path)?);
            }
            let value = if attributes.occurs.is_multiple() {
                if values.is_empty() {
                    Value::Null
                } else {
                    Value::List(values)
                }
            } else {
                match values.into_iter().next() {
                    Some(value) => value,
                    None => match &attributes.default {
                        Some(default) => {
                            let content = self.registry.content_type(slot.ty);
                            self.simple(content, default, slot.field.wire_name(), path)?
                        }
                        None => Value::Null,
                    },
                }
            };
            record.set(slot.field.name.as_str(), value);

            for carried in slots
                .iter()
                .filter(|s| s.field.options.attribute_of.as_deref() == Some(slot.field.name.as_str()))
            {
                let mut carried_values = Vec::with_capacity(found.len());
                for child in found {
                    carried_values.push(self.attribute(carried, child.get_attribute(carried.field.wire_name()), path)?);
                }
                let value = if attributes.occurs.is_multiple() {
                    if carried_values.iter().all(Value::is_null) {
                        Value::Null
                    } else {
                        Value::List(carried_values)
                    }
                } else {
                    carried_values.into_iter().next().unwrap_or(Value::Null)
                };
                record.set(carried.field.name.as_str(), value);
            }
            path.pop();
        }
        Ok(Value::Record(record))
    }

    fn attribute(&self, slot: &Slot<'_>, text: Option<&str>, path: &Path) -> Result<Value> {
        let attributes = &self.registry.get(slot.ty).attributes;
        let name = slot.field.wire_name();
        let text = match text.or(attributes.default.as_deref()) {
            Some(text) => text,
            None if self.checks && attributes.occurs.min > 0 => {
                return Err(invalid(path, name, format!("missing required attribute '{}'", name)).into());
            }
            None => return Ok(Value::Null),
        };
        self.simple(self.registry.content_type(slot.ty), text, name, path)
    }

    /// Below the minimum is a missing field; above the maximum a frequency error
    fn check_frequency(&self, field: &str, occurs: Occurs, count: usize, path: &Path) -> Result<()> {
        if !self.checks {
            return Ok(());
        }
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        if occurs.is_missing(count) {
            return Err(invalid(
                path,
                field,
                format!("mandatory field '{}' occurs {} times, at least {} expected", field, count, occurs.min),
            )
            .into());
        }
        if occurs.is_exceeded(count) {
            return Err(FrequencyError {
                field: field.to_string(),
                path: path.to_string(),
                count,
                min_occurs: occurs.min,
                max_occurs: occurs.max,
            }
            .into());
        }
        Ok(())
    }
}

fn invalid(path: &Path, field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError::new(message)
        .with_path(path.to_string())
        .with_field(field)
}
