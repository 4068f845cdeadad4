//! # xsdbind
//!
//! Type descriptors, XML Schema generation and parsing, and a schema-aware
//! XML codec for services that exchange XML messages.
//!
//! ## Features
//!
//! - Type descriptors in an arena registry, with inheritance, arrays,
//!   aliases, enumerations and self-referencing records
//! - Namespace resolution: synthesized names, prefixes and imports
//! - One XML Schema document per namespace, byte-for-byte deterministic
//! - Schema parsing with includes, imports and mutual references
//! - Encoding and decoding with soft or whole-document validation
//! - Incremental encoding of large arrays
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use xsdbind::{ComplexBuilder, InterfaceBuilder, Primitive, Record, XmlCodec};
//!
//! let mut builder = InterfaceBuilder::new("urn:people");
//! let string = builder.registry().builtin(Primitive::String);
//! let person = ComplexBuilder::new(builder.registry(), "Person")
//!     .field("name", string)
//!     .finish()?;
//! builder.add_type(person);
//!
//! let codec = XmlCodec::new(Arc::new(builder.build()?));
//! let xml = codec.to_string(person, &Record::new().with("name", "Ann").into())?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod config;
pub mod error;
pub mod limits;

// Utilities
pub mod names;
pub mod namespaces;
pub mod locations;

// Resource loading
pub mod documents;
pub mod loaders;

// Type model and resolution
pub mod interface;
pub mod model;
pub mod resolver;

// Schemas and messages
pub mod codec;
pub mod exports;
pub mod schema;

// Re-exports for convenience
pub use codec::{Exchange, FragmentStream, XmlCodec};
pub use config::{Config, NamingConfig, SchemaConfig, ValidationMode};
pub use error::{Error, Fault, FaultCategory, Result};
pub use interface::{Interface, InterfaceBuilder, Operation, OperationSpec};
pub use model::{
    ComplexBuilder, LazyValue, Overrides, Primitive, Record, TypeDescriptor, TypeId, TypeKind,
    TypeRegistry, Value,
};
pub use namespaces::QName;
pub use resolver::{NamespaceRegistry, NamespaceResolver};
pub use schema::{SchemaBuilder, SchemaEndpoint, SchemaParser, SchemaSet, ValidationSchema};

/// Version of the xsdbind library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
