//! Configuration
//!
//! Naming suffixes, schema emission switches, the decode validation mode
//! and resource limits. Values are passed to constructors explicitly;
//! the defaults are plain constants.

use crate::error::{Error, Result};
use crate::limits::Limits;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default suffix of array wrapper types
pub const DEFAULT_ARRAY_SUFFIX: &str = "Array";
/// Default suffix of operation output wrappers
pub const DEFAULT_RESPONSE_SUFFIX: &str = "Response";
/// Default suffix of the single result field of an output wrapper
pub const DEFAULT_RESULT_SUFFIX: &str = "Result";
/// Default suffix of synthesized anonymous type names
pub const DEFAULT_TYPE_SUFFIX: &str = "Type";

/// Suffixes used when names are synthesized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// `<Member><array_suffix>`
    pub array_suffix: String,
    /// `<Operation><response_suffix>`
    pub response_suffix: String,
    /// `<Operation><result_suffix>`
    pub result_suffix: String,
    /// `<Owner>_<field><type_suffix>`
    pub type_suffix: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            array_suffix: DEFAULT_ARRAY_SUFFIX.to_string(),
            response_suffix: DEFAULT_RESPONSE_SUFFIX.to_string(),
            result_suffix: DEFAULT_RESULT_SUFFIX.to_string(),
            type_suffix: DEFAULT_TYPE_SUFFIX.to_string(),
        }
    }
}

/// Schema emission switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Emit `xs:import` for the XSD/XSI/XML namespaces as well
    pub import_base_namespaces: bool,
    /// Emit `xs:annotation/xs:documentation` for documented types
    pub documentation: bool,
    /// Add `schemaLocation="<prefix>.xsd"` to imports
    pub schema_locations: bool,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            import_base_namespaces: false,
            documentation: true,
            schema_locations: false,
        }
    }
}

/// Validation applied while decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// No validation
    Skip,
    /// Native value predicates and occurrence counts
    #[default]
    Soft,
    /// Whole-document validation against the generated schema first
    Schema,
}

impl ValidationMode {
    /// Parse validation mode from string
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "skip" => Ok(ValidationMode::Skip),
            "soft" => Ok(ValidationMode::Soft),
            "schema" => Ok(ValidationMode::Schema),
            _ => Err(Error::Value(format!("Invalid validation mode: {}", s))),
        }
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationMode::Skip => "skip",
            ValidationMode::Soft => "soft",
            ValidationMode::Schema => "schema",
        }
    }

    /// Whether field-level predicates run
    pub fn checks_values(&self) -> bool {
        !matches!(self, ValidationMode::Skip)
    }
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Synthesized names
    pub naming: NamingConfig,
    /// Schema emission
    pub schema: SchemaConfig,
    /// Decode validation
    pub validation: ValidationMode,
    /// Resource limits
    pub limits: Limits,
}

impl Config {
    /// Read a configuration from JSON; missing keys keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the validation mode
    pub fn with_validation(mut self, mode: ValidationMode) -> Self {
        self.validation = mode;
        self
    }

    /// Set the naming suffixes
    pub fn with_naming(mut self, naming: NamingConfig) -> Self {
        self.naming = naming;
        self
    }

    /// Set the schema switches
    pub fn with_schema(mut self, schema: SchemaConfig) -> Self {
        self.schema = schema;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.naming.array_suffix, "Array");
        assert_eq!(config.naming.response_suffix, "Response");
        assert_eq!(config.naming.result_suffix, "Result");
        assert_eq!(config.validation, ValidationMode::Soft);
        assert!(!config.schema.import_base_namespaces);
    }

    #[test]
    fn test_from_json() {
        let config = Config::from_json(
            r#"{"naming": {"array_suffix": "List"}, "validation": "schema", "limits": {"max_xml_depth": 10}}"#,
        )
        .unwrap();
        assert_eq!(config.naming.array_suffix, "List");
        assert_eq!(config.naming.response_suffix, "Response");
        assert_eq!(config.validation, ValidationMode::Schema);
        assert_eq!(config.limits.max_xml_depth, 10);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            Config::from_json(r#"{"validation": "strictest"}"#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_validation_mode_strings() {
        assert_eq!(ValidationMode::from_str("soft").unwrap(), ValidationMode::Soft);
        assert_eq!(ValidationMode::Schema.to_string(), "schema");
        assert!(ValidationMode::from_str("lax").is_err());
        assert!(!ValidationMode::Skip.checks_values());
    }
}
