//! Declarative DSL Command Line Interface
//!
//! Parses scripts, shows interpretation schemas and resolves scripts
//! against them without applying anything.
//!
//! # Usage
//!
//! ```bash
//! # Parse a script to its syntax tree
//! echo 'plugins { id("java") }' | dcl_cli parse
//!
//! # Show the schemas a settings script is interpreted with
//! dcl_cli schema --kind settings
//!
//! # Resolve a project script, with software types from a registry
//! dcl_cli resolve --kind project --registry types.yaml --file build.dcl
//!
//! # Only report diagnostics; exits non-zero if there are any
//! dcl_cli check --kind project --file build.dcl
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use declarative_dsl::dcl_core::context::{
    LoadedProjectScript, LoadedSettingsScript, ScriptSource, SettingsObject,
    SoftwareFeatureApplicator, TargetScope,
};
use declarative_dsl::dcl_core::resolver::{ConstantValue, ResolvedExpr};
use declarative_dsl::dcl_core::{
    parse_script, CatalogLoader, Diagnostic, InterpretationSchemaBuilder, ResolvedOperation,
    SchemaBuildingResult, ScriptContext, SoftwareTypeRegistry,
};
use declarative_dsl::{EvaluationOutcome, ScriptEvaluator};

#[derive(Parser)]
#[command(name = "dcl_cli")]
#[command(version = "0.1.0")]
#[command(about = "Parse, inspect and resolve declarative configuration scripts")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: json, text, or pretty (default)
    #[arg(long, short = 'o', global = true, default_value = "pretty", value_enum)]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
    Pretty,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Settings,
    Project,
}

#[derive(Args)]
struct SchemaArgs {
    /// Script kind
    #[arg(long, value_enum)]
    kind: KindArg,

    /// Host type catalog file or directory (bundled catalogs if not provided)
    #[arg(long, env = "DCL_SCHEMA_DIR")]
    catalog: Option<PathBuf>,

    /// Software type registry file or directory
    #[arg(long)]
    registry: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a script into its syntax tree (no resolution)
    Parse {
        /// Input file (reads stdin if not provided)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Show the interpretation steps and schemas of a script kind
    Schema {
        #[command(flatten)]
        schema: SchemaArgs,

        /// Print the full schema of every step
        #[arg(long)]
        verbose: bool,
    },

    /// Resolve a script and print its operations and diagnostics
    Resolve {
        /// Input file (reads stdin if not provided)
        #[arg(short, long)]
        file: Option<PathBuf>,

        #[command(flatten)]
        schema: SchemaArgs,
    },

    /// Resolve a script and report diagnostics only
    Check {
        /// Input file (reads stdin if not provided)
        #[arg(short, long)]
        file: Option<PathBuf>,

        #[command(flatten)]
        schema: SchemaArgs,
    },
}

// =============================================================================
// MAIN
// =============================================================================

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse { file } => cmd_parse(file, cli.format),
        Commands::Schema { schema, verbose } => cmd_schema(&schema, verbose, cli.format),
        Commands::Resolve { file, schema } => cmd_resolve(file, &schema, cli.format),
        Commands::Check { file, schema } => cmd_check(file, &schema, cli.format),
    };

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.format == OutputFormat::Json {
                println!("{}", serde_json::json!({ "error": e }));
            } else {
                eprintln!("{}: {}", "error".red().bold(), e);
            }
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

fn cmd_parse(file: Option<PathBuf>, format: OutputFormat) -> Result<(), String> {
    let (label, source) = read_input(file)?;
    let block = parse_script(&source, &label).map_err(|e| e.to_string())?;

    match format {
        OutputFormat::Json => print_json(&block)?,
        OutputFormat::Text => print!("{}", block.to_source()),
        OutputFormat::Pretty => {
            println!(
                "{} Parsed {} statement(s)",
                "OK".green(),
                block.statements.len()
            );
            for (i, statement) in block.statements.iter().enumerate() {
                println!(
                    "  [{}] {}",
                    i,
                    statement.to_source().trim_end().replace('\n', "\n      ")
                );
            }
        }
    }

    Ok(())
}

fn cmd_schema(args: &SchemaArgs, verbose: bool, format: OutputFormat) -> Result<(), String> {
    let schemas = schema_builder(args)?;
    let context = script_context(args.kind, Path::new("script"));

    let sequence = match schemas.schema_for_script(&context).map_err(|e| e.to_string())? {
        SchemaBuildingResult::SchemaNotBuilt => return Err("Script kind has no schema".to_string()),
        SchemaBuildingResult::InterpretationSequenceAvailable(sequence) => sequence,
    };

    match format {
        OutputFormat::Json => {
            let steps: Vec<_> = sequence
                .steps
                .iter()
                .map(|step| {
                    let schema = if verbose {
                        serde_json::to_value(step.schema.as_ref()).ok()
                    } else {
                        None
                    };
                    serde_json::json!({
                        "step": step.step_identifier,
                        "filter": step.filter,
                        "fingerprint": step.schema.fingerprint(),
                        "schema": schema,
                    })
                })
                .collect();
            print_json(&steps)?;
        }
        OutputFormat::Text | OutputFormat::Pretty => {
            for step in &sequence.steps {
                println!(
                    "{} {} ({})",
                    "Step:".cyan().bold(),
                    step.step_identifier,
                    step.schema.top_level_receiver
                );
                println!("  fingerprint: {}", step.schema.fingerprint());
                for (name, class) in &step.schema.data_classes {
                    println!("  {}", name.as_str().yellow());
                    if !verbose {
                        continue;
                    }
                    for property in &class.properties {
                        let access = if property.is_read_only { "val" } else { "var" };
                        println!("    {} {}: {}", access, property.name, property.type_ref);
                    }
                    for function in &class.member_functions {
                        let parameters: Vec<String> = function
                            .parameters
                            .iter()
                            .map(|p| format!("{}: {}", p.name, p.type_ref))
                            .collect();
                        println!(
                            "    fun {}({}): {}  [{}]",
                            function.name,
                            parameters.join(", "),
                            function.semantics.return_type(),
                            function.semantics.kind_name()
                        );
                    }
                }
            }
        }
    }

    Ok(())
}

fn cmd_resolve(file: Option<PathBuf>, args: &SchemaArgs, format: OutputFormat) -> Result<(), String> {
    let (label, outcome) = evaluate(file, args)?;

    match format {
        OutputFormat::Json => print_json(&outcome)?,
        OutputFormat::Text | OutputFormat::Pretty => {
            for step in outcome.steps() {
                println!("{} {}", "Step:".cyan().bold(), step.step_identifier);
                print_operations(&step.result.operations, 1);
            }
            print_diagnostics(&label, outcome.diagnostics(), format);
        }
    }

    if outcome.is_usable() {
        Ok(())
    } else {
        Err(format!("{} has unresolved statements", label))
    }
}

fn cmd_check(file: Option<PathBuf>, args: &SchemaArgs, format: OutputFormat) -> Result<(), String> {
    let (label, outcome) = evaluate(file, args)?;
    let diagnostics: Vec<&Diagnostic> = outcome.diagnostics().collect();

    match format {
        OutputFormat::Json => print_json(&diagnostics)?,
        OutputFormat::Text | OutputFormat::Pretty => {
            print_diagnostics(&label, diagnostics.iter().copied(), format);
            if diagnostics.is_empty() && format == OutputFormat::Pretty {
                println!("{} {}", "OK".green(), label);
            }
        }
    }

    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(format!("{} diagnostic(s) in {}", diagnostics.len(), label))
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn evaluate(file: Option<PathBuf>, args: &SchemaArgs) -> Result<(String, EvaluationOutcome), String> {
    let path = file.clone().unwrap_or_else(|| PathBuf::from("<stdin>"));
    let (label, source) = read_input(file)?;

    let evaluator = ScriptEvaluator::with_schemas(schema_builder(args)?);
    let outcome = evaluator
        .evaluate(&source, &script_context(args.kind, &path))
        .map_err(|e| e.to_string())?;
    Ok((label, outcome))
}

fn schema_builder(args: &SchemaArgs) -> Result<InterpretationSchemaBuilder, String> {
    let registry = match &args.registry {
        Some(path) => CatalogLoader::new(path)
            .load_registry()
            .map_err(|e| format!("{:#}", e))?,
        None => SoftwareTypeRegistry::default(),
    };

    let schemas = match &args.catalog {
        Some(path) => {
            let catalog = CatalogLoader::new(path)
                .load_catalog()
                .map_err(|e| format!("{:#}", e))?;
            InterpretationSchemaBuilder::from_catalog(catalog, &registry)
        }
        None => InterpretationSchemaBuilder::new(&registry),
    };
    schemas.map_err(|e| e.to_string())
}

fn script_context(kind: KindArg, path: &Path) -> ScriptContext {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    match kind {
        KindArg::Settings => ScriptContext::settings(LoadedSettingsScript {
            settings: SettingsObject {
                root_dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            },
            target_scope: TargetScope { name },
            script_source: ScriptSource {
                display_name: path.display().to_string(),
            },
        }),
        KindArg::Project => ScriptContext::project(LoadedProjectScript {
            software_feature_applicator: SoftwareFeatureApplicator {
                project_path: format!(":{}", name),
            },
        }),
    }
}

fn print_operations(operations: &[ResolvedOperation], depth: usize) {
    let pad = "  ".repeat(depth);
    for operation in operations {
        match operation {
            ResolvedOperation::PropertyWrite(write) => {
                println!("{}{} = {}", pad, write.property.name.yellow(), describe(&write.value));
            }
            ResolvedOperation::LocalValue(local) => {
                println!("{}val {} = {}", pad, local.name, describe(&local.value));
            }
            ResolvedOperation::Invocation(invocation) => {
                let arguments: Vec<String> = invocation
                    .arguments
                    .iter()
                    .map(|a| format!("{} = {}", a.parameter.name, describe(&a.value)))
                    .collect();
                println!(
                    "{}{}({}) -> {}  [{}]",
                    pad,
                    invocation.callee.name().green(),
                    arguments.join(", "),
                    invocation.result_type,
                    invocation.semantics.kind_name()
                );
                if let Some(nested) = &invocation.configure_block {
                    print_operations(nested, depth + 1);
                }
            }
            ResolvedOperation::Expression(expr) => println!("{}{}", pad, describe(expr)),
        }
    }
}

fn describe(expr: &ResolvedExpr) -> String {
    match expr {
        ResolvedExpr::Constant { value, .. } => match value {
            ConstantValue::String(s) => format!("{:?}", s),
            ConstantValue::Int(i) => i.to_string(),
            ConstantValue::Long(l) => format!("{}L", l),
            ConstantValue::Boolean(b) => b.to_string(),
        },
        ResolvedExpr::Null(_) => "null".to_string(),
        ResolvedExpr::LocalValue { name, .. } => name.clone(),
        ResolvedExpr::ExternalObject { name, .. } => name.to_string(),
        ResolvedExpr::Invocation(invocation) => format!("{}(..)", invocation.callee.name()),
        other => format!("<{}>", other.type_ref()),
    }
}

fn print_diagnostics<'d>(
    label: &str,
    diagnostics: impl Iterator<Item = &'d Diagnostic>,
    format: OutputFormat,
) {
    for diagnostic in diagnostics {
        if format == OutputFormat::Pretty {
            println!("{}:{}", label.bold(), diagnostic.to_string().red());
            for related in &diagnostic.related {
                println!(
                    "    {} {}:{}: {}",
                    "note:".blue(),
                    related.span.line,
                    related.span.column,
                    related.message
                );
            }
        } else {
            println!("{}:{}", label, diagnostic);
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), String> {
    println!(
        "{}",
        serde_json::to_string_pretty(value)
            .map_err(|e| format!("JSON serialization failed: {}", e))?
    );
    Ok(())
}

fn read_input(file: Option<PathBuf>) -> Result<(String, String), String> {
    match file {
        Some(path) => std::fs::read_to_string(&path)
            .map(|source| (path.display().to_string(), source))
            .map_err(|e| format!("Failed to read '{}': {}", path.display(), e)),
        None => {
            if atty::is(atty::Stream::Stdin) {
                return Err("No input provided. Use --file or pipe input via stdin.".to_string());
            }
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| format!("Failed to read stdin: {}", e))?;
            Ok(("<stdin>".to_string(), buffer))
        }
    }
}
