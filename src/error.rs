//! Error types for xsdbind
//!
//! Configuration-time failures (registration, resolution, schema parsing)
//! and per-message failures (validation, occurrence counts) share one
//! [`Error`] enum. Per-message errors are turned into a [`Fault`] at the
//! message boundary so a transport can answer with a protocol fault.

use std::fmt;
use thiserror::Error;

/// Result type alias using the xsdbind [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for xsdbind operations
#[derive(Error, Debug)]
pub enum Error {
    /// A (namespace, type name) pair is already bound to a different shape
    #[error("duplicate type {{{namespace}}}{name}: {reason}")]
    DuplicateType {
        /// Namespace of the colliding type
        namespace: String,
        /// Local name of the colliding type
        name: String,
        /// What differs between the two definitions
        reason: String,
    },

    /// A reference could not be resolved to a registered type
    #[error("unresolved type reference '{member}' in '{owner}'")]
    UnresolvedType {
        /// Type (or element) holding the reference
        owner: String,
        /// Name of the member that could not be resolved
        member: String,
    },

    /// Namespace assignment did not converge
    #[error("namespace resolution did not converge: {0}")]
    NamespaceCycleExceeded(String),

    /// Native value failed a field-level predicate
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Document failed validation against a generated schema
    #[error("schema validation error: {0}")]
    SchemaValidation(#[from] SchemaValidationError),

    /// A field occurred more often than its declared maximum
    #[error("frequency error: {0}")]
    DecodeFrequency(#[from] FrequencyError),

    /// XML Schema parsing error
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Type error in a descriptor or value
    #[error("type error: {0}")]
    Type(String),

    /// Value error (invalid lexical or native value)
    #[error("value error: {0}")]
    Value(String),

    /// Resource loading error
    #[error("resource error: {0}")]
    Resource(String),

    /// Namespace error
    #[error("namespace error: {0}")]
    Namespace(String),

    /// Name error (invalid XML name)
    #[error("name error: {0}")]
    Name(String),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML reading or writing error
    #[error("XML error: {0}")]
    Xml(String),

    /// URL parsing error
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration could not be read
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    /// Unexpected failure while reading a native value
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Machine-readable fault code, prefixed with the fault category
    pub fn code(&self) -> &'static str {
        match self {
            Error::DuplicateType { .. } => "Server.DuplicateType",
            Error::UnresolvedType { .. } => "Server.UnresolvedType",
            Error::NamespaceCycleExceeded(_) => "Server.NamespaceCycleExceeded",
            Error::Validation(_) => "Client.ValidationError",
            Error::SchemaValidation(_) => "Client.SchemaValidationError",
            Error::DecodeFrequency(_) => "Client.ValidationError.FrequencyError",
            Error::Parse(_) => "Server.ParseError",
            Error::Type(_) => "Server.TypeError",
            Error::Value(_) => "Client.ValueError",
            Error::Resource(_) => "Server.ResourceError",
            Error::Namespace(_) => "Server.NamespaceError",
            Error::Name(_) => "Server.NameError",
            Error::LimitExceeded(_) => "Client.LimitExceeded",
            Error::Io(_) => "Server.IoError",
            Error::Xml(_) => "Client.XmlError",
            Error::Url(_) => "Server.UrlError",
            Error::Config(_) => "Server.ConfigError",
            Error::Internal(_) => "Server",
        }
    }

    /// Whether the error was caused by the incoming message
    pub fn is_client_error(&self) -> bool {
        self.code().starts_with("Client")
    }

    /// Field path carried by the error, if any
    pub fn path(&self) -> Option<&str> {
        match self {
            Error::Validation(e) => e.path.as_deref(),
            Error::SchemaValidation(e) => e.path.as_deref(),
            Error::DecodeFrequency(e) => Some(e.path.as_str()),
            _ => None,
        }
    }
}

/// Native value validation error with context
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Error message
    pub message: String,
    /// Path to the field that failed validation
    pub path: Option<String>,
    /// Field name the error is about
    pub field: Option<String>,
    /// Offending lexical value
    pub instance: Option<String>,
    /// Original reason
    pub reason: Option<String>,
}

impl ValidationError {
    /// Create a new validation error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
            field: None,
            instance: None,
            reason: None,
        }
    }

    /// Set the path where validation failed
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the field name
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Set the offending value
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Set the reason
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref reason) = self.reason {
            write!(f, "\n\nReason: {}", reason)?;
        }

        if let Some(ref path) = self.path {
            write!(f, "\n\nPath: {}", path)?;
        }

        if let Some(ref instance) = self.instance {
            write!(f, "\n\nInstance: {:?}", instance)?;
        }

        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Line and column of a node in a parsed document (both 1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextPosition {
    /// Line number
    pub line: usize,
    /// Column number
    pub column: usize,
}

impl TextPosition {
    /// Compute the position of a byte offset inside `source`
    pub fn from_offset(source: &[u8], offset: usize) -> Self {
        let end = offset.min(source.len());
        let mut line = 1;
        let mut column = 1;
        for &byte in &source[..end] {
            if byte == b'\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        Self { line, column }
    }
}

impl fmt::Display for TextPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// First error reported by the schema validation tier
#[derive(Debug, Clone)]
pub struct SchemaValidationError {
    /// Error message
    pub message: String,
    /// Path of the offending element
    pub path: Option<String>,
    /// Position of the offending element in the source document
    pub position: Option<TextPosition>,
}

impl SchemaValidationError {
    /// Create a new schema validation error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
            position: None,
        }
    }

    /// Set the element path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the document position
    pub fn with_position(mut self, position: Option<TextPosition>) -> Self {
        self.position = position;
        self
    }
}

impl fmt::Display for SchemaValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref path) = self.path {
            write!(f, " (path {})", path)?;
        }
        if let Some(position) = self.position {
            write!(f, " at line {}, column {}", position.line, position.column)?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaValidationError {}

/// Occurrence count outside the declared bounds of a field
#[derive(Debug, Clone)]
pub struct FrequencyError {
    /// Field name
    pub field: String,
    /// Path of the owning element
    pub path: String,
    /// Number of occurrences seen
    pub count: u32,
    /// Declared minimum
    pub min_occurs: u32,
    /// Declared maximum (None means unbounded)
    pub max_occurs: Option<u32>,
}

impl fmt::Display for FrequencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let max = match self.max_occurs {
            Some(max) => max.to_string(),
            None => "unbounded".to_string(),
        };
        write!(
            f,
            "field '{}' occurs {} times at {}, expected between {} and {}",
            self.field, self.count, self.path, self.min_occurs, max
        )
    }
}

impl std::error::Error for FrequencyError {}

/// XML Schema parsing error
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Error message
    pub message: String,
    /// Location in the schema file
    pub location: Option<String>,
    /// Schema component that caused the error
    pub component: Option<String>,
}

impl ParseError {
    /// Create a new parse error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
            component: None,
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the component name
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref component) = self.component {
            write!(f, " in '{}'", component)?;
        }

        if let Some(ref loc) = self.location {
            write!(f, " ({})", loc)?;
        }

        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Category of a fault returned to a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCategory {
    /// The incoming message was at fault
    Client,
    /// The service failed to process a valid message
    Server,
}

/// Transport-neutral fault built from an [`Error`]
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    /// Client or server
    pub category: FaultCategory,
    /// Machine-readable code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Field path, for validation failures
    pub path: Option<String>,
}

impl Fault {
    /// Create a server fault with the generic `Server` code
    pub fn server(message: impl Into<String>) -> Self {
        Self {
            category: FaultCategory::Server,
            code: "Server".to_string(),
            message: message.into(),
            path: None,
        }
    }
}

impl From<&Error> for Fault {
    fn from(err: &Error) -> Self {
        let category = if err.is_client_error() {
            FaultCategory::Client
        } else {
            FaultCategory::Server
        };
        Self {
            category,
            code: err.code().to_string(),
            message: err.to_string(),
            path: err.path().map(str::to_string),
        }
    }
}

impl From<Error> for Fault {
    fn from(err: Error) -> Self {
        Fault::from(&err)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new("value too long")
            .with_reason("max_len is 5")
            .with_path("/Person/name")
            .with_instance("Annabelle");

        let msg = format!("{}", err);
        assert!(msg.contains("value too long"));
        assert!(msg.contains("Reason:"));
        assert!(msg.contains("Path: /Person/name"));
        assert!(msg.contains("Instance:"));
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new("unknown simple type derivation")
            .with_location("types.xsd")
            .with_component("Color");

        let msg = format!("{}", err);
        assert!(msg.contains("unknown simple type derivation"));
        assert!(msg.contains("'Color'"));
        assert!(msg.contains("types.xsd"));
    }

    #[test]
    fn test_error_conversion() {
        let val_err = ValidationError::new("test");
        let err: Error = val_err.into();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_text_position_from_offset() {
        let source = b"<a>\n  <b/>\n</a>";
        assert_eq!(TextPosition::from_offset(source, 0), TextPosition { line: 1, column: 1 });
        assert_eq!(TextPosition::from_offset(source, 6), TextPosition { line: 2, column: 3 });
        assert_eq!(TextPosition::from_offset(source, 999).line, 3);
    }

    #[test]
    fn test_fault_categories() {
        let err = Error::Validation(ValidationError::new("bad").with_path("/a/b"));
        let fault = Fault::from(&err);
        assert_eq!(fault.category, FaultCategory::Client);
        assert_eq!(fault.code, "Client.ValidationError");
        assert_eq!(fault.path.as_deref(), Some("/a/b"));

        let fault = Fault::from(Error::Internal("boom".to_string()));
        assert_eq!(fault.category, FaultCategory::Server);
        assert_eq!(fault.code, "Server");
    }

    #[test]
    fn test_frequency_error_names_field() {
        let err = FrequencyError {
            field: "tag".to_string(),
            path: "/Post".to_string(),
            count: 3,
            min_occurs: 0,
            max_occurs: Some(2),
        };
        let msg = err.to_string();
        assert!(msg.contains("'tag'"));
        assert!(msg.contains("3 times"));
        assert_eq!(Error::from(err).code(), "Client.ValidationError.FrequencyError");
    }
}
