//! Catalog loader
//!
//! Loads host type catalogs and software-type registries from YAML.

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::types::{FunctionKind, HostTypeCatalog, SoftwareTypeRegistry};

/// Environment variable naming a catalog file or directory
pub const SCHEMA_DIR_ENV: &str = "DCL_SCHEMA_DIR";

pub struct CatalogLoader {
    schema_path: PathBuf,
}

impl CatalogLoader {
    pub fn new(schema_path: impl Into<PathBuf>) -> Self {
        Self {
            schema_path: schema_path.into(),
        }
    }

    /// Create loader from DCL_SCHEMA_DIR, or default to the bundled schemas
    ///
    /// Path resolution order:
    /// 1. DCL_SCHEMA_DIR environment variable (explicit override)
    /// 2. Relative "schemas" path (running from the crate directory)
    /// 3. The crate's own schemas directory, fixed at compile time
    pub fn from_env() -> Self {
        if let Ok(path) = std::env::var(SCHEMA_DIR_ENV) {
            return Self::new(path);
        }

        if Path::new("schemas").is_dir() {
            return Self::new("schemas");
        }

        Self::new(concat!(env!("CARGO_MANIFEST_DIR"), "/schemas"))
    }

    pub fn schema_path(&self) -> &Path {
        &self.schema_path
    }

    /// Load the host type catalog
    ///
    /// Supports two modes:
    /// 1. Single file: the path names one YAML file
    /// 2. Directory: every `.yaml`/`.yml` file below it, merged in path order
    ///
    /// Files whose name starts with `_` are skipped.
    pub fn load_catalog(&self) -> Result<HostTypeCatalog> {
        let mut catalog = HostTypeCatalog::default();
        for (path, partial) in self.read_documents::<HostTypeCatalog>()? {
            debug!(
                "{}: {} types, {} functions",
                path.display(),
                partial.types.len(),
                partial.functions.len()
            );
            catalog.merge(partial);
        }

        validate_catalog(&catalog)?;

        info!(
            "Loaded {} types, {} functions, {} objects from {}",
            catalog.types.len(),
            catalog.functions.len(),
            catalog.objects.len(),
            self.schema_path.display()
        );

        Ok(catalog)
    }

    /// Load software types declared in the same files as the catalog
    pub fn load_registry(&self) -> Result<SoftwareTypeRegistry> {
        let mut registry = SoftwareTypeRegistry::default();
        for (_, partial) in self.read_documents::<SoftwareTypeRegistry>()? {
            registry.merge(partial);
        }

        validate_registry(&registry)?;

        info!(
            "Loaded {} software types from {}",
            registry.software_types.len(),
            self.schema_path.display()
        );

        Ok(registry)
    }

    fn read_documents<T: DeserializeOwned>(&self) -> Result<Vec<(PathBuf, T)>> {
        let files = if self.schema_path.is_dir() {
            find_yaml_files(&self.schema_path)?
        } else {
            vec![self.schema_path.clone()]
        };

        let mut documents = Vec::with_capacity(files.len());
        for path in files {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;

            let document: T = serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;

            documents.push((path, document));
        }

        Ok(documents)
    }
}

/// Recursively find all YAML files in a directory, skipping `_`-prefixed ones
fn find_yaml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        let skipped = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('_'))
            .unwrap_or(false);
        if skipped {
            continue;
        }

        if path.is_dir() {
            files.extend(find_yaml_files(&path)?);
        } else if path
            .extension()
            .map(|e| e == "yaml" || e == "yml")
            .unwrap_or(false)
        {
            files.push(path);
        }
    }

    // Sort for deterministic loading order
    files.sort();
    Ok(files)
}

fn validate_catalog(catalog: &HostTypeCatalog) -> Result<()> {
    let mut names = HashSet::new();

    for type_descriptor in &catalog.types {
        if !names.insert(type_descriptor.name.as_str()) {
            return Err(anyhow!("Duplicate type: {}", type_descriptor.name));
        }

        for function in &type_descriptor.functions {
            let full_name = format!("{}.{}", type_descriptor.name, function.name);

            if function.kind != FunctionKind::Configuring
                && (function.configures.is_some() || function.accessor.is_some())
            {
                return Err(anyhow!(
                    "{}: only configuring functions name a configured property or accessor",
                    full_name
                ));
            }

            if function.configures.is_some() && function.accessor.is_some() {
                return Err(anyhow!(
                    "{}: 'configures' and 'accessor' are mutually exclusive",
                    full_name
                ));
            }
        }
    }

    Ok(())
}

fn validate_registry(registry: &SoftwareTypeRegistry) -> Result<()> {
    let mut names = HashSet::new();

    for software_type in &registry.software_types {
        if software_type.name.is_empty() {
            return Err(anyhow!(
                "Software type for model {} has an empty name",
                software_type.model
            ));
        }
        if !names.insert(software_type.name.as_str()) {
            return Err(anyhow!("Duplicate software type: {}", software_type.name));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const TYPES_A: &str = r#"
types:
  - name: a.Top
    properties:
      - { name: x, type: Int }
default_imports: [a.make]
"#;

    const TYPES_B: &str = r#"
types:
  - name: a.Other
functions:
  - { package: a, name: make, returns: a.Other }
software_types:
  - name: library
    model: a.Library
    types:
      - name: a.Library
"#;

    #[test]
    fn test_loader_creation() {
        let loader = CatalogLoader::new("schemas");
        assert_eq!(loader.schema_path(), Path::new("schemas"));
    }

    #[test]
    fn test_load_directory_merges_sorted_and_skips_underscore() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.yaml"), TYPES_B).unwrap();
        fs::write(dir.path().join("a.yaml"), TYPES_A).unwrap();
        fs::write(dir.path().join("_draft.yaml"), "types: [ {name: a.Top} ]").unwrap();
        fs::write(dir.path().join("notes.txt"), "not yaml").unwrap();

        let loader = CatalogLoader::new(dir.path());
        let catalog = loader.load_catalog().unwrap();

        let names: Vec<&str> = catalog.types.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a.Top", "a.Other"]);
        assert_eq!(catalog.functions.len(), 1);
        assert_eq!(catalog.default_imports, vec!["a.make"]);

        let registry = loader.load_registry().unwrap();
        assert_eq!(registry.software_types.len(), 1);
        assert_eq!(registry.software_types[0].model, "a.Library");
    }

    #[test]
    fn test_load_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("a.yml"), TYPES_A).unwrap();

        let catalog = CatalogLoader::new(dir.path()).load_catalog().unwrap();
        assert_eq!(catalog.types.len(), 1);
    }

    #[test]
    fn test_load_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.yaml");
        fs::write(&path, TYPES_A).unwrap();

        let catalog = CatalogLoader::new(&path).load_catalog().unwrap();
        assert_eq!(catalog.types[0].name, "a.Top");
        assert!(CatalogLoader::new(&path).load_registry().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_type_across_files_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("one.yaml"), TYPES_A).unwrap();
        fs::write(dir.path().join("two.yaml"), TYPES_A).unwrap();

        let err = CatalogLoader::new(dir.path()).load_catalog().unwrap_err();
        assert!(err.to_string().contains("Duplicate type: a.Top"));
    }

    #[test]
    fn test_accessor_on_pure_function_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(
            &path,
            "types:\n  - name: a.T\n    functions:\n      - { name: f, kind: pure, accessor: x }\n",
        )
        .unwrap();

        let err = CatalogLoader::new(&path).load_catalog().unwrap_err();
        assert!(err.to_string().contains("a.T.f"));
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        fs::write(&path, "types: [ {name: ").unwrap();

        let err = CatalogLoader::new(&path).load_catalog().unwrap_err();
        assert!(err.to_string().contains("broken.yaml"));
    }

    #[test]
    fn test_missing_path_fails_with_context() {
        let err = CatalogLoader::new("/nonexistent/catalog.yaml")
            .load_catalog()
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_bundled_schemas_load() {
        let loader = CatalogLoader::new(concat!(env!("CARGO_MANIFEST_DIR"), "/schemas"));
        let catalog = loader.load_catalog().unwrap();
        assert!(catalog.type_named("build.plugins.PluginsBlock").is_some());
        assert!(catalog.type_named("build.settings.Settings").is_some());
        assert!(catalog.type_named("build.project.Project").is_some());
    }
}
