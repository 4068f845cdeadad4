//! Resource locations for schema documents
//!
//! A location is a file path, a URL, or an in-memory document. Relative
//! `schemaLocation` hints are resolved against the location of the
//! document that contains them.

use crate::error::{Error, Result};
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Where a schema document comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// File system path
    Path(PathBuf),
    /// URL (http, https, ...)
    Url(Url),
    /// In-memory document with a display name
    Inline {
        /// Name used in diagnostics
        name: String,
        /// Document text
        text: String,
    },
}

impl Location {
    /// Create a location from a string: a non-file URL or a path
    pub fn from_str(s: &str) -> Result<Self> {
        if let Ok(url) = Url::parse(s) {
            return match url.scheme() {
                "file" => url
                    .to_file_path()
                    .map(Location::Path)
                    .map_err(|_| Error::Resource(format!("Invalid file URL: {}", s))),
                // Single letters are Windows drive prefixes, not schemes
                scheme if scheme.len() > 1 => Ok(Location::Url(url)),
                _ => Ok(Location::Path(PathBuf::from(s))),
            };
        }
        Ok(Location::Path(PathBuf::from(s)))
    }

    /// In-memory document
    pub fn inline(name: impl Into<String>, text: impl Into<String>) -> Self {
        Location::Inline {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Resolve `relative` against this location
    pub fn join(&self, relative: &str) -> Result<Location> {
        if Url::parse(relative).is_ok() || relative.starts_with('/') {
            return Location::from_str(relative);
        }
        match self {
            Location::Path(path) => {
                let base = path.parent().map(|p| p.to_path_buf()).unwrap_or_default();
                Ok(Location::Path(base.join(relative)))
            }
            Location::Url(url) => Ok(Location::Url(url.join(relative)?)),
            Location::Inline { .. } => Location::from_str(relative),
        }
    }

    /// Check if this is a remote location (URL)
    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Url(_))
    }

    /// Check if this is a local file
    pub fn is_file(&self) -> bool {
        matches!(self, Location::Path(_))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Path(p) => write!(f, "{}", p.display()),
            Location::Url(u) => write!(f, "{}", u),
            Location::Inline { name, .. } => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_from_url() {
        let loc = Location::from_str("http://example.com/schema.xsd").unwrap();
        assert!(matches!(loc, Location::Url(_)));
        assert!(loc.is_remote());
    }

    #[test]
    fn test_location_from_path() {
        let loc = Location::from_str("/tmp/schema.xsd").unwrap();
        assert_eq!(loc, Location::Path(PathBuf::from("/tmp/schema.xsd")));
        assert!(loc.is_file());
        assert!(Location::from_str("types.xsd").unwrap().is_file());
    }

    #[test]
    fn test_join_relative() {
        let base = Location::Path(PathBuf::from("/schemas/main.xsd"));
        assert_eq!(
            base.join("tns.xsd").unwrap(),
            Location::Path(PathBuf::from("/schemas/tns.xsd"))
        );

        let base = Location::from_str("http://example.com/a/main.xsd").unwrap();
        assert_eq!(
            base.join("b.xsd").unwrap().to_string(),
            "http://example.com/a/b.xsd"
        );
    }

    #[test]
    fn test_inline_display() {
        let loc = Location::inline("memory:a", "<schema/>");
        assert_eq!(loc.to_string(), "memory:a");
        assert!(!loc.is_file());
    }
}
