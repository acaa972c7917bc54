//! Script evaluation across interpretation steps

use std::io::Write;
use std::path::PathBuf;

use declarative_dsl::dcl_core::context::{
    LoadedProjectScript, LoadedSettingsScript, ScriptSource, SettingsObject,
    SoftwareFeatureApplicator, TargetScope,
};
use declarative_dsl::dcl_core::DiagnosticCode;
use declarative_dsl::{
    EvaluationError, EvaluationOutcome, ScriptContext, ScriptEvaluator, ScriptKind,
    SoftwareTypeRegistry,
};
use pretty_assertions::assert_eq;

fn settings() -> ScriptContext {
    ScriptContext::settings(LoadedSettingsScript {
        settings: SettingsObject {
            root_dir: PathBuf::from("/work/demo"),
        },
        target_scope: TargetScope {
            name: "settings".to_string(),
        },
        script_source: ScriptSource {
            display_name: "settings.dcl".to_string(),
        },
    })
}

fn project() -> ScriptContext {
    ScriptContext::project(LoadedProjectScript {
        software_feature_applicator: SoftwareFeatureApplicator {
            project_path: ":app".to_string(),
        },
    })
}

fn registry() -> SoftwareTypeRegistry {
    SoftwareTypeRegistry {
        software_types: vec![declarative_dsl::dcl_core::SoftwareType {
            name: "javaLibrary".to_string(),
            model: "ext.JavaLibrary".to_string(),
            types: vec![declarative_dsl::dcl_core::config::types::TypeDescriptor {
                name: "ext.JavaLibrary".to_string(),
                supertypes: vec![],
                properties: vec![declarative_dsl::dcl_core::config::types::PropertyDescriptor {
                    name: "javaVersion".to_string(),
                    type_name: "Int".to_string(),
                    read_only: false,
                    has_default: true,
                }],
                functions: vec![],
                constructors: vec![],
            }],
        }],
    }
}

fn steps(outcome: &EvaluationOutcome) -> Vec<(&str, usize)> {
    outcome
        .steps()
        .iter()
        .map(|s| (s.step_identifier.as_str(), s.result.operations.len()))
        .collect()
}

const SETTINGS_SCRIPT: &str = r#"
pluginManagement {
    includeBuild("build-logic")
}

plugins {
    id("org.example.settings").version("1.0")
}

rootProject.name = "demo"
include(":app")
include(":lib")
"#;

#[test]
fn test_settings_script_split_across_steps() {
    let evaluator = ScriptEvaluator::new(&SoftwareTypeRegistry::default()).unwrap();
    let outcome = evaluator.evaluate(SETTINGS_SCRIPT, &settings()).unwrap();

    assert!(outcome.is_usable(), "{:?}", outcome.diagnostics().collect::<Vec<_>>());
    assert_eq!(steps(&outcome), vec![("settingsPlugins", 2), ("settings", 3)]);
}

#[test]
fn test_import_used_by_later_step() {
    let evaluator = ScriptEvaluator::new(&SoftwareTypeRegistry::default()).unwrap();
    let source = "import build.settings.ProjectDescriptor\n\nrootProject.name = \"demo\"";
    let outcome = evaluator.evaluate(source, &settings()).unwrap();

    assert!(outcome.is_usable(), "{:?}", outcome.diagnostics().collect::<Vec<_>>());
    assert_eq!(steps(&outcome), vec![("settingsPlugins", 0), ("settings", 1)]);
}

#[test]
fn test_import_unknown_to_every_step_reported_once() {
    let evaluator = ScriptEvaluator::new(&SoftwareTypeRegistry::default()).unwrap();
    let source = "import build.settings.Missing\n\nrootProject.name = \"demo\"";
    let outcome = evaluator.evaluate(source, &settings()).unwrap();

    assert!(!outcome.is_usable());
    let codes: Vec<DiagnosticCode> = outcome.diagnostics().map(|d| d.code).collect();
    assert_eq!(codes, vec![DiagnosticCode::UnresolvedImport]);
    assert!(outcome.steps()[0].result.is_usable());
}

#[test]
fn test_project_script_with_software_type() {
    let evaluator = ScriptEvaluator::new(&registry()).unwrap();
    let source = r#"
plugins {
    id("java-library")
}

group = "org.example"
javaLibrary {
    javaVersion = 17
}
"#;
    let outcome = evaluator.evaluate(source, &project()).unwrap();

    assert!(outcome.is_usable(), "{:?}", outcome.diagnostics().collect::<Vec<_>>());
    assert_eq!(steps(&outcome), vec![("plugins", 1), ("project", 2)]);
}

#[test]
fn test_settings_calls_are_unknown_in_project_scripts() {
    let evaluator = ScriptEvaluator::new(&SoftwareTypeRegistry::default()).unwrap();
    let outcome = evaluator
        .evaluate("include(\":app\")\nversion = \"1.0\"", &project())
        .unwrap();

    assert!(!outcome.is_usable());
    let codes: Vec<DiagnosticCode> = outcome.diagnostics().map(|d| d.code).collect();
    assert_eq!(codes, vec![DiagnosticCode::UnresolvedCall]);
    assert_eq!(steps(&outcome), vec![("plugins", 0), ("project", 1)]);
}

#[test]
fn test_unknown_script_is_not_declarative() {
    let evaluator = ScriptEvaluator::new(&SoftwareTypeRegistry::default()).unwrap();
    // not even parsed
    let outcome = evaluator
        .evaluate("for (i in 1..3) println(i)", &ScriptContext::unknown())
        .unwrap();
    assert!(matches!(outcome, EvaluationOutcome::NotDeclarative));
}

#[test]
fn test_missing_payload_is_contract_violation() {
    let evaluator = ScriptEvaluator::new(&SoftwareTypeRegistry::default()).unwrap();
    let context = ScriptContext {
        kind: ScriptKind::Project,
        payload: None,
    };
    let err = evaluator.evaluate("group = \"x\"", &context).unwrap_err();
    assert!(err.is_contract_violation());
}

#[test]
fn test_evaluate_file() {
    let evaluator = ScriptEvaluator::new(&SoftwareTypeRegistry::default()).unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "description = \"from a file\"").unwrap();
    let outcome = evaluator.evaluate_file(file.path(), &project()).unwrap();
    assert!(outcome.is_usable());

    let missing = file.path().with_extension("missing");
    let err = evaluator.evaluate_file(&missing, &project()).unwrap_err();
    assert!(matches!(err, EvaluationError::Io { .. }));
}
