//! Context selector
//!
//! Picks the schemas a script is interpreted with, based on what kind of
//! script it is. Settings and project scripts are interpreted in two steps:
//! their plugin blocks first, then everything else. Any other script is not
//! declarative and is left to the general-purpose interpreter.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::bundled::{
    self, CONVENTIONS_TYPE, PROJECT_RECEIVER, SETTINGS_PLUGINS_RECEIVER, SETTINGS_RECEIVER,
};
use crate::config::types::{
    FunctionDescriptor, FunctionKind, HostTypeCatalog, ParameterDescriptor, SoftwareTypeRegistry,
};
use crate::resolver::StatementFilter;
use crate::schema::{AnalysisSchema, ConfigureLambdaStyle, SchemaBuildError, SchemaBuilder};

/// Top-level blocks interpreted before the rest of a settings script
const SETTINGS_PLUGIN_BLOCKS: [&str; 2] = ["pluginManagement", "plugins"];
/// Top-level blocks interpreted before the rest of a project script
const PROJECT_PLUGIN_BLOCKS: [&str; 1] = ["plugins"];

// =============================================================================
// SCRIPT CONTEXT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptKind {
    Unknown,
    Settings,
    Project,
}

impl ScriptKind {
    fn payload_name(self) -> &'static str {
        match self {
            ScriptKind::Unknown => "no",
            ScriptKind::Settings => "settings",
            ScriptKind::Project => "project",
        }
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptKind::Unknown => f.write_str("unknown"),
            ScriptKind::Settings => f.write_str("settings"),
            ScriptKind::Project => f.write_str("project"),
        }
    }
}

/// The settings object a settings script configures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsObject {
    pub root_dir: PathBuf,
}

/// Where the operations of a script are applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetScope {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSource {
    pub display_name: String,
}

/// Applies software-type blocks of a project script to the project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftwareFeatureApplicator {
    pub project_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSettingsScript {
    pub settings: SettingsObject,
    pub target_scope: TargetScope,
    pub script_source: ScriptSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedProjectScript {
    pub software_feature_applicator: SoftwareFeatureApplicator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextPayload {
    Settings(LoadedSettingsScript),
    Project(LoadedProjectScript),
}

impl ContextPayload {
    fn name(&self) -> &'static str {
        match self {
            ContextPayload::Settings(_) => "a settings payload",
            ContextPayload::Project(_) => "a project payload",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptContext {
    pub kind: ScriptKind,
    pub payload: Option<ContextPayload>,
}

impl ScriptContext {
    pub fn unknown() -> Self {
        Self {
            kind: ScriptKind::Unknown,
            payload: None,
        }
    }

    pub fn settings(script: LoadedSettingsScript) -> Self {
        Self {
            kind: ScriptKind::Settings,
            payload: Some(ContextPayload::Settings(script)),
        }
    }

    pub fn project(script: LoadedProjectScript) -> Self {
        Self {
            kind: ScriptKind::Project,
            payload: Some(ContextPayload::Project(script)),
        }
    }
}

// =============================================================================
// INTERPRETATION SEQUENCE
// =============================================================================

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("{kind} script requires a {expected} payload, found {found}")]
    ContractViolation {
        kind: ScriptKind,
        expected: &'static str,
        found: &'static str,
    },

    #[error("failed to build interpretation schema: {0}")]
    SchemaBuild(#[from] SchemaBuildError),

    #[error(transparent)]
    Catalog(#[from] anyhow::Error),
}

/// One interpretation pass over a script
#[derive(Debug, Clone)]
pub struct InterpretationStep {
    pub step_identifier: String,
    pub schema: Arc<AnalysisSchema>,
    /// Top-level statements this step interprets
    pub filter: StatementFilter,
}

#[derive(Debug, Clone)]
pub struct InterpretationSequence {
    pub steps: Vec<InterpretationStep>,
    pub target: ScriptKind,
}

#[derive(Debug, Clone)]
pub enum SchemaBuildingResult {
    /// Not a declarative script
    SchemaNotBuilt,
    InterpretationSequenceAvailable(InterpretationSequence),
}

/// Builds and caches the interpretation schemas of each script kind
pub struct InterpretationSchemaBuilder {
    catalog: HostTypeCatalog,
    settings_steps: OnceCell<Vec<InterpretationStep>>,
    project_steps: OnceCell<Vec<InterpretationStep>>,
}

impl InterpretationSchemaBuilder {
    /// Bundled catalogs extended with `registry`
    pub fn new(registry: &SoftwareTypeRegistry) -> Result<Self, ContextError> {
        Self::from_catalog(bundled::host_type_catalog()?, registry)
    }

    /// `catalog` must declare the settings, project and plugin receivers
    pub fn from_catalog(
        mut catalog: HostTypeCatalog,
        registry: &SoftwareTypeRegistry,
    ) -> Result<Self, ContextError> {
        add_software_types(&mut catalog, registry)?;
        Ok(Self {
            catalog,
            settings_steps: OnceCell::new(),
            project_steps: OnceCell::new(),
        })
    }

    pub fn schema_for_script(
        &self,
        context: &ScriptContext,
    ) -> Result<SchemaBuildingResult, ContextError> {
        let steps = match (context.kind, &context.payload) {
            (ScriptKind::Unknown, _) => {
                debug!("script is not declarative, no schema built");
                return Ok(SchemaBuildingResult::SchemaNotBuilt);
            }
            (ScriptKind::Settings, Some(ContextPayload::Settings(_))) => {
                self.settings_steps.get_or_try_init(|| {
                    Ok::<_, ContextError>(vec![
                        self.step(
                            "settingsPlugins",
                            SETTINGS_PLUGINS_RECEIVER,
                            StatementFilter::TopLevelCallsNamed(names(&SETTINGS_PLUGIN_BLOCKS)),
                        )?,
                        self.step(
                            "settings",
                            SETTINGS_RECEIVER,
                            StatementFilter::ExcludeTopLevelCallsNamed(names(&SETTINGS_PLUGIN_BLOCKS)),
                        )?,
                    ])
                })?
            }
            (ScriptKind::Project, Some(ContextPayload::Project(_))) => {
                self.project_steps.get_or_try_init(|| {
                    Ok::<_, ContextError>(vec![
                        self.step(
                            "plugins",
                            bundled::PLUGINS_RECEIVER,
                            StatementFilter::TopLevelCallsNamed(names(&PROJECT_PLUGIN_BLOCKS)),
                        )?,
                        self.step(
                            "project",
                            PROJECT_RECEIVER,
                            StatementFilter::ExcludeTopLevelCallsNamed(names(&PROJECT_PLUGIN_BLOCKS)),
                        )?,
                    ])
                })?
            }
            (kind, payload) => {
                return Err(ContextError::ContractViolation {
                    kind,
                    expected: kind.payload_name(),
                    found: payload.as_ref().map_or("no payload", ContextPayload::name),
                })
            }
        };

        Ok(SchemaBuildingResult::InterpretationSequenceAvailable(
            InterpretationSequence {
                steps: steps.clone(),
                target: context.kind,
            },
        ))
    }

    fn step(
        &self,
        identifier: &str,
        receiver: &str,
        filter: StatementFilter,
    ) -> Result<InterpretationStep, ContextError> {
        let schema = SchemaBuilder::new(&self.catalog).build(receiver)?;
        info!(
            step = identifier,
            receiver,
            classes = schema.data_classes.len(),
            fingerprint = %schema.fingerprint(),
            "built interpretation schema"
        );
        Ok(InterpretationStep {
            step_identifier: identifier.to_string(),
            schema: Arc::new(schema),
            filter,
        })
    }
}

fn names(blocks: &[&str]) -> Vec<String> {
    blocks.iter().map(|b| b.to_string()).collect()
}

/// Expose every software type as a configuring block on the project receiver
/// and in settings conventions
fn add_software_types(
    catalog: &mut HostTypeCatalog,
    registry: &SoftwareTypeRegistry,
) -> anyhow::Result<()> {
    let style = ConfigureLambdaStyle::default();
    let mut seen = Vec::new();

    for software_type in &registry.software_types {
        if seen.contains(&software_type.name) {
            return Err(anyhow!("Duplicate software type: {}", software_type.name));
        }
        seen.push(software_type.name.clone());

        let block = FunctionDescriptor {
            name: software_type.name.clone(),
            kind: FunctionKind::Configuring,
            parameters: vec![ParameterDescriptor {
                name: "configure".to_string(),
                type_name: style.spell(&software_type.model),
                default: false,
                stores: None,
            }],
            returns: None,
            configures: None,
            accessor: Some(format!("softwareType:{}", software_type.name)),
        };

        for owner in [PROJECT_RECEIVER, CONVENTIONS_TYPE] {
            catalog
                .type_named_mut(owner)
                .ok_or_else(|| anyhow!("Catalog does not declare {}", owner))?
                .functions
                .push(block.clone());
        }
        catalog.types.extend(software_type.types.iter().cloned());

        debug!(name = %software_type.name, model = %software_type.model, "registered software type");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::SoftwareType;
    use crate::schema::{ConfigureAccessor, FqName, FunctionSemantics};

    fn settings_context() -> ScriptContext {
        ScriptContext::settings(LoadedSettingsScript {
            settings: SettingsObject {
                root_dir: PathBuf::from("/work"),
            },
            target_scope: TargetScope {
                name: "settings".to_string(),
            },
            script_source: ScriptSource {
                display_name: "settings.dcl".to_string(),
            },
        })
    }

    fn project_context() -> ScriptContext {
        ScriptContext::project(LoadedProjectScript {
            software_feature_applicator: SoftwareFeatureApplicator {
                project_path: ":app".to_string(),
            },
        })
    }

    fn sequence(result: SchemaBuildingResult) -> InterpretationSequence {
        match result {
            SchemaBuildingResult::InterpretationSequenceAvailable(sequence) => sequence,
            other => panic!("Expected interpretation sequence, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_script_is_not_declarative() {
        let builder = InterpretationSchemaBuilder::new(&SoftwareTypeRegistry::default()).unwrap();
        let result = builder.schema_for_script(&ScriptContext::unknown()).unwrap();
        assert!(matches!(result, SchemaBuildingResult::SchemaNotBuilt));
    }

    #[test]
    fn test_missing_or_wrong_payload_is_contract_violation() {
        let builder = InterpretationSchemaBuilder::new(&SoftwareTypeRegistry::default()).unwrap();

        let bare = ScriptContext {
            kind: ScriptKind::Settings,
            payload: None,
        };
        let err = builder.schema_for_script(&bare).unwrap_err();
        assert!(matches!(err, ContextError::ContractViolation { found: "no payload", .. }));

        let mismatched = ScriptContext {
            kind: ScriptKind::Project,
            payload: settings_context().payload,
        };
        let err = builder.schema_for_script(&mismatched).unwrap_err();
        assert_eq!(
            err.to_string(),
            "project script requires a project payload, found a settings payload"
        );
    }

    #[test]
    fn test_settings_steps_are_cached() {
        let builder = InterpretationSchemaBuilder::new(&SoftwareTypeRegistry::default()).unwrap();

        let first = sequence(builder.schema_for_script(&settings_context()).unwrap());
        assert_eq!(first.target, ScriptKind::Settings);
        let ids: Vec<&str> = first.steps.iter().map(|s| s.step_identifier.as_str()).collect();
        assert_eq!(ids, vec!["settingsPlugins", "settings"]);
        assert_eq!(
            first.steps[0].schema.top_level_receiver.as_str(),
            SETTINGS_PLUGINS_RECEIVER
        );

        let second = sequence(builder.schema_for_script(&settings_context()).unwrap());
        assert!(Arc::ptr_eq(&first.steps[1].schema, &second.steps[1].schema));
    }

    #[test]
    fn test_project_steps() {
        let builder = InterpretationSchemaBuilder::new(&SoftwareTypeRegistry::default()).unwrap();
        let sequence = sequence(builder.schema_for_script(&project_context()).unwrap());

        let ids: Vec<&str> = sequence.steps.iter().map(|s| s.step_identifier.as_str()).collect();
        assert_eq!(ids, vec!["plugins", "project"]);
        assert_eq!(
            sequence.steps[1].filter,
            StatementFilter::ExcludeTopLevelCallsNamed(vec!["plugins".to_string()])
        );
    }

    #[test]
    fn test_software_types_become_configuring_blocks() {
        let registry: SoftwareTypeRegistry = serde_yaml::from_str(
            r#"
software_types:
  - name: javaLibrary
    model: ext.JavaLibrary
    types:
      - name: ext.JavaLibrary
        properties:
          - { name: javaVersion, type: Int }
"#,
        )
        .unwrap();
        let builder = InterpretationSchemaBuilder::new(&registry).unwrap();
        let sequence = sequence(builder.schema_for_script(&project_context()).unwrap());

        let project = sequence.steps[1].schema.top_level_class().unwrap();
        let block = project.functions_named("javaLibrary").next().unwrap();
        match &block.semantics {
            FunctionSemantics::AccessAndConfigure {
                accessor: ConfigureAccessor::Custom { object_type, accessor_id },
                ..
            } => {
                assert_eq!(accessor_id, "softwareType:javaLibrary");
                assert_eq!(object_type.class_name(), Some(&FqName::parse("ext.JavaLibrary").unwrap()));
            }
            other => panic!("Expected custom accessor, got {:?}", other),
        }

        let settings = sequence_for(&builder, &settings_context());
        let conventions = settings.steps[1]
            .schema
            .data_class(&FqName::parse(CONVENTIONS_TYPE).unwrap())
            .unwrap();
        assert!(conventions.has_function("javaLibrary"));
    }

    fn sequence_for(builder: &InterpretationSchemaBuilder, context: &ScriptContext) -> InterpretationSequence {
        sequence(builder.schema_for_script(context).unwrap())
    }

    #[test]
    fn test_duplicate_software_type_rejected() {
        let software_type = SoftwareType {
            name: "app".to_string(),
            model: "ext.App".to_string(),
            types: vec![],
        };
        let registry = SoftwareTypeRegistry {
            software_types: vec![software_type.clone(), software_type],
        };
        let err = InterpretationSchemaBuilder::new(&registry).err().unwrap();
        assert!(err.to_string().contains("Duplicate software type: app"));
    }
}
