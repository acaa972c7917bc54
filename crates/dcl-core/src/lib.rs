//! dcl-core: parser, syntax tree, schema model and resolver of the
//! declarative configuration language
//!
//! This crate has no host dependencies. It never executes a script:
//! - AST types (Block, Statement, Expr, FunctionCall, etc.)
//! - Nom-based parser with batched structural failures
//! - Schema model built from YAML host type catalogs
//! - Context selector choosing the schemas of a script kind
//! - Resolver producing typed operations and diagnostics
//!
//! Applying resolved operations to live host objects is the caller's job.

pub mod ast;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod parser;
pub mod resolver;
pub mod schema;

// Re-export commonly used types
pub use ast::{Block, Expr, FunctionArgument, FunctionCall, Literal, Span, Statement};
pub use config::loader::CatalogLoader;
pub use config::types::{HostTypeCatalog, SoftwareType, SoftwareTypeRegistry};
pub use context::{
    ContextError, InterpretationSchemaBuilder, InterpretationSequence, InterpretationStep,
    SchemaBuildingResult, ScriptContext, ScriptKind,
};
pub use diagnostics::{Diagnostic, DiagnosticCode};
pub use parser::{parse_expression, parse_script, ParseFailures, StructuralFailure};
pub use resolver::{
    undeclared_imports, ResolutionResult, ResolvedOperation, Resolver, StatementFilter,
};
pub use schema::{AnalysisSchema, DataTypeRef, FqName, SchemaBuildError, SchemaBuilder};
