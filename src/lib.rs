//! declarative-dsl: evaluation pipeline for declarative configuration scripts
//!
//! Ties the pieces of [`dcl_core`] together: a script context selects the
//! interpretation steps, the script is parsed once, and every step resolves
//! it against its own schema.
//!
//! ```ignore
//! let evaluator = ScriptEvaluator::new(&SoftwareTypeRegistry::default())?;
//! match evaluator.evaluate(source, &context)? {
//!     EvaluationOutcome::NotDeclarative => { /* general-purpose interpreter */ }
//!     EvaluationOutcome::Resolved(steps) => { /* apply operations of usable steps */ }
//! }
//! ```

pub mod error;
pub mod evaluator;

pub use dcl_core;

pub use dcl_core::{ScriptContext, ScriptKind, SoftwareTypeRegistry};
pub use error::EvaluationError;
pub use evaluator::{EvaluationOutcome, ScriptEvaluator, StepResolution};
