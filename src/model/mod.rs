//! The type model
//!
//! Descriptors, the registry that owns them, the values they describe,
//! and the builders that declare them.

pub mod builder;
pub mod descriptor;
pub mod facets;
pub mod primitive;
pub mod registry;
pub mod value;

pub use builder::ComplexBuilder;
pub use descriptor::{Field, FieldOptions, TypeDescriptor, TypeId, TypeKind, TypeRef};
pub use facets::{parse_occurs, Attributes, Facets, Occurs, Overrides, Pattern};
pub use primitive::{builtin_primitive, Primitive, BUILTIN_TYPES};
pub use registry::TypeRegistry;
pub use value::{LazyValue, Record, Value};
