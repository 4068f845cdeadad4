//! Schema emission, ingestion and validation
//!
//! - [`SchemaBuilder`] writes one `xs:schema` per namespace of an [`Interface`]
//! - [`SchemaParser`] reads schema documents back into descriptors
//! - [`ValidationSchema`] checks instance documents against emitted schemas
//! - [`SchemaEndpoint`] serves the emitted documents, built once

pub mod builder;
pub mod parser;
pub mod validation;

pub use builder::{SchemaBuilder, SchemaDocument, SchemaSet};
pub use parser::{
    ImportRequest, NamespaceFiles, ParsedSchemas, RelativeResolver, SchemaParser, SchemaResolver,
    SchemaSource,
};
pub use validation::ValidationSchema;

use crate::error::{Fault, Result};
use crate::interface::Interface;
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;

type BuildFn = dyn Fn(&Interface) -> Result<SchemaSet> + Send + Sync;

/// Serves the schema documents of an interface.
///
/// Documents are rendered on first request and cached. A failed build is
/// reported as a server fault and retried on the next request.
pub struct SchemaEndpoint {
    interface: Arc<Interface>,
    build: Arc<BuildFn>,
    documents: OnceCell<Arc<IndexMap<String, String>>>,
}

impl fmt::Debug for SchemaEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaEndpoint")
            .field("target_namespace", &self.interface.target_namespace())
            .field("cached", &self.documents.get().is_some())
            .finish()
    }
}

impl SchemaEndpoint {
    /// Endpoint rendering with [`SchemaBuilder`]
    pub fn new(interface: Arc<Interface>) -> Self {
        Self::with_builder(interface, |interface| SchemaBuilder::new(interface).build())
    }

    /// Endpoint rendering with a custom build step
    pub fn with_builder<F>(interface: Arc<Interface>, build: F) -> Self
    where
        F: Fn(&Interface) -> Result<SchemaSet> + Send + Sync + 'static,
    {
        Self {
            interface,
            build: Arc::new(build),
            documents: OnceCell::new(),
        }
    }

    /// Interface being served
    pub fn interface(&self) -> &Arc<Interface> {
        &self.interface
    }

    /// Every document keyed by namespace
    pub fn documents(&self) -> std::result::Result<Arc<IndexMap<String, String>>, Fault> {
        self.documents
            .get_or_try_init(|| {
                let set = (self.build)(&self.interface)?;
                Ok(Arc::new(set.to_strings()?))
            })
            .map(Arc::clone)
            .map_err(|e: crate::error::Error| {
                tracing::warn!(error = %e, "schema rendering failed");
                Fault::server(format!("schema rendering failed: {}", e))
            })
    }

    /// Document of one namespace; None when the interface has no such namespace
    pub fn document(&self, namespace: &str) -> std::result::Result<Option<String>, Fault> {
        Ok(self.documents()?.get(namespace).cloned())
    }

    /// Whether documents have been rendered
    pub fn is_cached(&self) -> bool {
        self.documents.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, FaultCategory};
    use crate::interface::{InterfaceBuilder, OperationSpec};
    use crate::model::Primitive;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn interface() -> Arc<Interface> {
        let mut builder = InterfaceBuilder::new("urn:svc");
        let string = builder.registry().builtin(Primitive::String);
        builder
            .add_operation(OperationSpec::rpc("hello").param("name", string).returns(string))
            .unwrap();
        Arc::new(builder.build().unwrap())
    }

    #[test]
    fn test_documents_are_cached() {
        let endpoint = SchemaEndpoint::new(interface());
        assert!(!endpoint.is_cached());
        let first = endpoint.documents().unwrap();
        let second = endpoint.documents().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        let xml = endpoint.document("urn:svc").unwrap().unwrap();
        assert!(xml.contains(r#"<xs:complexType name="hello">"#));
        assert_eq!(endpoint.document("urn:none").unwrap(), None);
    }

    #[test]
    fn test_failure_is_server_fault_and_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let endpoint = SchemaEndpoint::with_builder(interface(), move |interface| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(Error::Internal("boom".to_string()))
            } else {
                SchemaBuilder::new(interface).build()
            }
        });

        let fault = endpoint.documents().unwrap_err();
        assert_eq!(fault.category, FaultCategory::Server);
        assert!(!endpoint.is_cached());

        assert!(endpoint.documents().is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_concurrent_readers() {
        let endpoint = Arc::new(SchemaEndpoint::new(interface()));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let endpoint = endpoint.clone();
                std::thread::spawn(move || endpoint.document("urn:svc").unwrap().unwrap())
            })
            .collect();
        let texts: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(texts.windows(2).all(|w| w[0] == w[1]));
    }
}
