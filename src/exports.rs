//! Schema Export Utilities
//!
//! Writes the schemas of an interface to a directory, one `<prefix>.xsd`
//! file per namespace, with imports pointing at the sibling files so the
//! directory can be loaded back on its own.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::interface::Interface;
use crate::schema::{SchemaBuilder, SchemaSet};

/// Configuration for schema export
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Target directory for export
    pub target_dir: PathBuf,
    /// Whether existing files may be replaced
    pub overwrite: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            target_dir: PathBuf::from("."),
            overwrite: true,
        }
    }
}

impl ExportConfig {
    /// Create a new export configuration
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            ..Default::default()
        }
    }

    /// Set whether existing files may be replaced
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// Schema exporter
///
/// Exports the schemas of an interface to a directory structure.
#[derive(Debug)]
pub struct SchemaExporter {
    config: ExportConfig,
}

impl SchemaExporter {
    /// Create a new schema exporter
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    /// Get the export configuration
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Emit and write every namespace of `interface`
    pub fn export(&self, interface: &Interface) -> Result<ExportResult> {
        let set = SchemaBuilder::new(interface)
            .with_schema_locations(true)
            .build()?;
        self.export_set(&set)
    }

    /// Write already emitted documents
    pub fn export_set(&self, set: &SchemaSet) -> Result<ExportResult> {
        let target_dir = &self.config.target_dir;
        std::fs::create_dir_all(target_dir)?;

        let mut exported_files = Vec::with_capacity(set.len());
        let mut replaced_count = 0;
        for document in set.iter() {
            let target_path = target_dir.join(document.file_name());
            if target_path.exists() {
                if !self.config.overwrite {
                    return Err(Error::Resource(format!(
                        "refusing to replace {}",
                        target_path.display()
                    )));
                }
                replaced_count += 1;
            }
            std::fs::write(&target_path, document.to_xml()?)?;
            tracing::debug!(namespace = document.namespace(), path = %target_path.display(), "exported schema");
            exported_files.push(target_path);
        }

        Ok(ExportResult {
            exported_files,
            replaced_count,
        })
    }
}

/// Result of a schema export operation
#[derive(Debug)]
pub struct ExportResult {
    /// List of exported file paths, sorted by namespace
    pub exported_files: Vec<PathBuf>,
    /// Number of files that already existed
    pub replaced_count: usize,
}

impl ExportResult {
    /// Get the number of exported files
    pub fn file_count(&self) -> usize {
        self.exported_files.len()
    }

    /// Check if any existing file was replaced
    pub fn has_replacements(&self) -> bool {
        self.replaced_count > 0
    }

    /// Exported file of the given prefix
    pub fn file(&self, prefix: &str) -> Option<&Path> {
        let name = format!("{}.xsd", prefix);
        self.exported_files
            .iter()
            .map(PathBuf::as_path)
            .find(|path| path.file_name().and_then(|n| n.to_str()) == Some(name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::InterfaceBuilder;
    use crate::model::{ComplexBuilder, Primitive};
    use crate::schema::SchemaParser;

    fn interface() -> Interface {
        let mut builder = InterfaceBuilder::new("urn:main");
        let registry = builder.registry();
        let string = registry.builtin(Primitive::String);
        let address = ComplexBuilder::new(registry, "Address")
            .namespace("urn:geo")
            .field("city", string)
            .finish()
            .unwrap();
        let customer = ComplexBuilder::new(registry, "Customer")
            .field("name", string)
            .field("address", address)
            .finish()
            .unwrap();
        builder.add_type(customer);
        builder.build().unwrap()
    }

    #[test]
    fn test_export_config_default() {
        let config = ExportConfig::default();
        assert_eq!(config.target_dir, PathBuf::from("."));
        assert!(config.overwrite);
    }

    #[test]
    fn test_export_writes_one_file_per_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = SchemaExporter::new(ExportConfig::new(dir.path()));
        let result = exporter.export(&interface()).unwrap();

        assert_eq!(result.file_count(), 2);
        assert!(!result.has_replacements());
        let main = std::fs::read_to_string(result.file("tns").unwrap()).unwrap();
        assert!(main.contains(r#"schemaLocation="s0.xsd""#));
        assert!(result.file("s0").unwrap().exists());
    }

    #[test]
    fn test_exported_directory_parses_back() {
        let dir = tempfile::tempdir().unwrap();
        let result = SchemaExporter::new(ExportConfig::new(dir.path()))
            .export(&interface())
            .unwrap();

        let parsed = SchemaParser::new()
            .parse_file(result.file("tns").unwrap())
            .unwrap();
        assert!(parsed.lookup("urn:main", "Customer").is_some());
        assert!(parsed.lookup("urn:geo", "Address").is_some());
    }

    #[test]
    fn test_overwrite_refused() {
        let dir = tempfile::tempdir().unwrap();
        let interface = interface();
        SchemaExporter::new(ExportConfig::new(dir.path()))
            .export(&interface)
            .unwrap();

        let again = SchemaExporter::new(ExportConfig::new(dir.path()))
            .export(&interface)
            .unwrap();
        assert!(again.has_replacements());

        let refused = SchemaExporter::new(ExportConfig::new(dir.path()).with_overwrite(false))
            .export(&interface);
        assert!(matches!(refused, Err(Error::Resource(_))));
    }
}
