//! Script evaluation pipeline
//!
//! Chooses the interpretation steps for a script context, parses the script
//! once and resolves it against the schema of every step. Operations are
//! returned for the host to apply; nothing here touches host objects.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use dcl_core::context::{ContextPayload, SchemaBuildingResult};
use dcl_core::{
    parse_script, undeclared_imports, AnalysisSchema, Diagnostic, InterpretationSchemaBuilder,
    ResolutionResult, Resolver, ScriptContext, SoftwareTypeRegistry,
};

use crate::error::EvaluationError;

/// Resolution of one interpretation step
#[derive(Debug, Clone, Serialize)]
pub struct StepResolution {
    pub step_identifier: String,
    /// Fingerprint of the schema the step resolved against
    pub schema_fingerprint: String,
    pub result: ResolutionResult,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", content = "steps", rename_all = "snake_case")]
pub enum EvaluationOutcome {
    /// Left to the general-purpose interpreter
    NotDeclarative,
    Resolved(Vec<StepResolution>),
}

impl EvaluationOutcome {
    pub fn steps(&self) -> &[StepResolution] {
        match self {
            EvaluationOutcome::NotDeclarative => &[],
            EvaluationOutcome::Resolved(steps) => steps,
        }
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.steps().iter().flat_map(|s| s.result.diagnostics.iter())
    }

    /// Only a fully resolved script may be applied
    pub fn is_usable(&self) -> bool {
        self.steps().iter().all(|s| s.result.is_usable())
    }
}

pub struct ScriptEvaluator {
    schemas: InterpretationSchemaBuilder,
}

impl ScriptEvaluator {
    /// Evaluator over the bundled catalogs extended with `registry`
    pub fn new(registry: &SoftwareTypeRegistry) -> Result<Self, EvaluationError> {
        Ok(Self::with_schemas(InterpretationSchemaBuilder::new(registry)?))
    }

    pub fn with_schemas(schemas: InterpretationSchemaBuilder) -> Self {
        Self { schemas }
    }

    pub fn evaluate(
        &self,
        source: &str,
        context: &ScriptContext,
    ) -> Result<EvaluationOutcome, EvaluationError> {
        let sequence = match self.schemas.schema_for_script(context)? {
            SchemaBuildingResult::SchemaNotBuilt => {
                debug!("script context is not declarative");
                return Ok(EvaluationOutcome::NotDeclarative);
            }
            SchemaBuildingResult::InterpretationSequenceAvailable(sequence) => sequence,
        };

        let label = script_label(context);
        let block = parse_script(source, &label)?;

        // each step sees only the classes reachable from its own receiver
        let schemas: Vec<&AnalysisSchema> =
            sequence.steps.iter().map(|s| s.schema.as_ref()).collect();
        let unresolved_imports = undeclared_imports(&block, &schemas);

        let mut steps = Vec::with_capacity(sequence.steps.len());
        for step in &sequence.steps {
            let result = Resolver::new(&step.schema)
                .ignoring_undeclared_imports()
                .resolve_filtered(&block, &step.filter);
            steps.push(StepResolution {
                step_identifier: step.step_identifier.clone(),
                schema_fingerprint: step.schema.fingerprint(),
                result,
            });
        }
        if let Some(last) = steps.last_mut() {
            last.result.diagnostics.extend(unresolved_imports);
        }

        for step in steps.iter().filter(|s| !s.result.is_usable()) {
            warn!(
                script = %label,
                step = %step.step_identifier,
                diagnostics = step.result.diagnostics.len(),
                "step has unresolved statements"
            );
        }

        info!(
            script = %label,
            target = %sequence.target,
            steps = steps.len(),
            "evaluated script"
        );
        Ok(EvaluationOutcome::Resolved(steps))
    }

    pub fn evaluate_file(
        &self,
        path: &Path,
        context: &ScriptContext,
    ) -> Result<EvaluationOutcome, EvaluationError> {
        let source = std::fs::read_to_string(path).map_err(|source| EvaluationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.evaluate(&source, context)
    }
}

/// Label used in structural failures
fn script_label(context: &ScriptContext) -> String {
    match &context.payload {
        Some(ContextPayload::Settings(script)) => script.script_source.display_name.clone(),
        Some(ContextPayload::Project(script)) => {
            format!("project '{}'", script.software_feature_applicator.project_path)
        }
        None => context.kind.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcl_core::context::{LoadedProjectScript, SoftwareFeatureApplicator};

    fn project() -> ScriptContext {
        ScriptContext::project(LoadedProjectScript {
            software_feature_applicator: SoftwareFeatureApplicator {
                project_path: ":lib".to_string(),
            },
        })
    }

    #[test]
    fn test_label_names_project() {
        assert_eq!(script_label(&project()), "project ':lib'");
    }

    #[test]
    fn test_parse_failure_stops_evaluation() {
        let evaluator = ScriptEvaluator::new(&SoftwareTypeRegistry::default()).unwrap();
        let err = evaluator.evaluate("val p =", &project()).unwrap_err();
        match err {
            EvaluationError::Parse(failures) => {
                assert_eq!(failures.label, "project ':lib'");
                assert!(!failures.failures.is_empty());
            }
            other => panic!("Expected parse failure, got {:?}", other),
        }
    }

    #[test]
    fn test_outcome_json_shape() {
        let evaluator = ScriptEvaluator::new(&SoftwareTypeRegistry::default()).unwrap();
        let outcome = evaluator.evaluate("group = \"org.example\"", &project()).unwrap();
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "resolved");
        assert_eq!(json["steps"][1]["step_identifier"], "project");
    }
}
