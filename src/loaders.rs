//! Schema document loading
//!
//! Reads a [`Location`] into text under the configured size limit.
//! Remote locations are refused; imports that point at URLs must be
//! mapped to local files or inline documents by a resolver.

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::locations::Location;
use std::fs;

/// Resource loader for schema documents
#[derive(Debug, Clone, Default)]
pub struct Loader {
    limits: Limits,
}

impl Loader {
    /// Create a new loader with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Load a resource as a string
    pub fn load(&self, location: &Location) -> Result<String> {
        let content = match location {
            Location::Path(path) => fs::read_to_string(path).map_err(|e| {
                Error::Resource(format!("Failed to read file '{}': {}", path.display(), e))
            })?,
            Location::Url(url) => {
                return Err(Error::Resource(format!(
                    "Remote schema locations are not loaded: {}",
                    url
                )))
            }
            Location::Inline { text, .. } => text.clone(),
        };

        self.limits.check_xml_size(content.len())?;
        tracing::debug!(location = %location, bytes = content.len(), "loaded schema document");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "<root>test</root>").unwrap();

        let location = Location::Path(file.path().to_path_buf());
        let content = Loader::new().load(&location).unwrap();

        assert!(content.contains("<root>test</root>"));
    }

    #[test]
    fn test_load_inline() {
        let location = Location::inline("mem", "<root>test</root>");
        assert_eq!(Loader::new().load(&location).unwrap(), "<root>test</root>");
    }

    #[test]
    fn test_remote_refused() {
        let location = Location::from_str("http://example.com/a.xsd").unwrap();
        assert!(matches!(
            Loader::new().load(&location),
            Err(Error::Resource(_))
        ));
    }

    #[test]
    fn test_size_limit() {
        let mut file = NamedTempFile::new().unwrap();
        let large_content = "x".repeat(11 * 1024 * 1024); // 11 MB
        write!(file, "{}", large_content).unwrap();

        let location = Location::Path(file.path().to_path_buf());
        let result = Loader::new().with_limits(Limits::strict()).load(&location);

        assert!(matches!(result, Err(Error::LimitExceeded(_))));
    }
}
