//! Limits on document and schema processing
//!
//! Decoding walks untrusted input recursively and schema parsing follows
//! imports across files, so both are bounded here.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Resource limits shared by the codec and the schema parser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum element nesting depth of a decoded document
    pub max_xml_depth: usize,

    /// Maximum XML input size in bytes
    pub max_xml_size: usize,

    /// Maximum number of attributes per element
    pub max_attributes: usize,

    /// Maximum include/import chain length when loading schemas.
    /// Nesting inside one schema document is bounded by `max_xml_depth`.
    pub max_schema_depth: usize,

    /// Maximum number of named components in a parsed schema set
    pub max_schema_components: usize,

    /// Optional hard bound on parser resolution passes.
    /// Without it, parsing stops as soon as a pass makes no progress.
    pub max_resolution_passes: Option<usize>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_xml_depth: 1000,
            max_xml_size: 100 * 1024 * 1024, // 100 MB
            max_attributes: 1000,
            max_schema_depth: 100,
            max_schema_components: 100_000,
            max_resolution_passes: None,
        }
    }
}

impl Limits {
    /// Create a new Limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (more restrictive)
    pub fn strict() -> Self {
        Self {
            max_xml_depth: 100,
            max_xml_size: 10 * 1024 * 1024, // 10 MB
            max_attributes: 100,
            max_schema_depth: 20,
            max_schema_components: 10_000,
            max_resolution_passes: Some(16),
        }
    }

    /// Create permissive limits (less restrictive, use with caution)
    pub fn permissive() -> Self {
        Self {
            max_xml_depth: 10_000,
            max_xml_size: 1024 * 1024 * 1024, // 1 GB
            max_attributes: 10_000,
            max_schema_depth: 1000,
            max_schema_components: 1_000_000,
            max_resolution_passes: None,
        }
    }

    /// Set the maximum nesting depth
    pub fn with_max_xml_depth(mut self, depth: usize) -> Self {
        self.max_xml_depth = depth;
        self
    }

    /// Set the maximum include/import chain length
    pub fn with_max_schema_depth(mut self, depth: usize) -> Self {
        self.max_schema_depth = depth;
        self
    }

    /// Set a hard bound on resolution passes
    pub fn with_max_resolution_passes(mut self, passes: usize) -> Self {
        self.max_resolution_passes = Some(passes);
        self
    }

    /// Check if XML depth is within limits
    pub fn check_xml_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_xml_depth {
            Err(Error::LimitExceeded(format!(
                "XML depth {} exceeds maximum {}",
                depth, self.max_xml_depth
            )))
        } else {
            Ok(())
        }
    }

    /// Check if XML size is within limits
    pub fn check_xml_size(&self, size: usize) -> Result<()> {
        if size > self.max_xml_size {
            Err(Error::LimitExceeded(format!(
                "XML size {} bytes exceeds maximum {} bytes",
                size, self.max_xml_size
            )))
        } else {
            Ok(())
        }
    }

    /// Check if number of attributes is within limits
    pub fn check_attributes(&self, count: usize) -> Result<()> {
        if count > self.max_attributes {
            Err(Error::LimitExceeded(format!(
                "Attribute count {} exceeds maximum {}",
                count, self.max_attributes
            )))
        } else {
            Ok(())
        }
    }

    /// Check if schema include/import depth is within limits
    pub fn check_schema_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_schema_depth {
            Err(Error::LimitExceeded(format!(
                "Schema include/import depth {} exceeds maximum {}",
                depth, self.max_schema_depth
            )))
        } else {
            Ok(())
        }
    }

    /// Check if number of schema components is within limits
    pub fn check_schema_components(&self, count: usize) -> Result<()> {
        if count > self.max_schema_components {
            Err(Error::LimitExceeded(format!(
                "Schema component count {} exceeds maximum {}",
                count, self.max_schema_components
            )))
        } else {
            Ok(())
        }
    }

    /// Check the number of resolution passes already run
    pub fn check_resolution_passes(&self, passes: usize) -> Result<()> {
        match self.max_resolution_passes {
            Some(max) if passes > max => Err(Error::LimitExceeded(format!(
                "Resolution passes {} exceed maximum {}",
                passes, max
            ))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.max_xml_depth, 1000);
        assert!(limits.check_xml_depth(500).is_ok());
        assert!(limits.check_xml_depth(1500).is_err());
        assert!(limits.check_resolution_passes(10_000).is_ok());
    }

    #[test]
    fn test_strict_limits() {
        let limits = Limits::strict();
        assert!(limits.max_xml_depth < Limits::default().max_xml_depth);
        assert!(limits.check_xml_depth(150).is_err());
        assert!(limits.check_resolution_passes(17).is_err());
    }

    #[test]
    fn test_permissive_limits() {
        let limits = Limits::permissive();
        assert!(limits.max_xml_depth > Limits::default().max_xml_depth);
        assert!(limits.check_xml_depth(5000).is_ok());
    }

    #[test]
    fn test_partial_json() {
        let limits: Limits = serde_json::from_str(r#"{"max_xml_depth": 3}"#).unwrap();
        assert_eq!(limits.max_xml_depth, 3);
        assert_eq!(limits.max_schema_depth, Limits::default().max_schema_depth);
        assert!(matches!(
            limits.check_xml_depth(4),
            Err(Error::LimitExceeded(_))
        ));
    }
}
