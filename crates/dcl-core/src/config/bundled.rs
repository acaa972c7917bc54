//! Catalogs compiled into the crate for the settings and project contexts

use anyhow::{Context, Result};

use super::types::HostTypeCatalog;

pub const PLUGINS_RECEIVER: &str = "build.plugins.PluginsTopLevelReceiver";
pub const SETTINGS_PLUGINS_RECEIVER: &str = "build.plugins.SettingsPluginsReceiver";
pub const SETTINGS_RECEIVER: &str = "build.settings.Settings";
pub const PROJECT_RECEIVER: &str = "build.project.Project";
/// Settings type that receives software-type convention blocks
pub const CONVENTIONS_TYPE: &str = "build.settings.Conventions";

const SOURCES: &[(&str, &str)] = &[
    ("plugins.yaml", include_str!("../../schemas/plugins.yaml")),
    ("settings.yaml", include_str!("../../schemas/settings.yaml")),
    ("project.yaml", include_str!("../../schemas/project.yaml")),
];

/// The merged bundled catalog
pub fn host_type_catalog() -> Result<HostTypeCatalog> {
    let mut catalog = HostTypeCatalog::default();
    for (name, source) in SOURCES {
        let partial: HostTypeCatalog = serde_yaml::from_str(source)
            .with_context(|| format!("Failed to parse bundled catalog {}", name))?;
        catalog.merge(partial);
    }
    Ok(catalog)
}
