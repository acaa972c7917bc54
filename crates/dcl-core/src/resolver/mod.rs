//! Resolver: walks a syntax tree against an [`AnalysisSchema`]
//!
//! Resolution never executes host code. It produces the list of operations a
//! script would perform, each typed against the schema, plus diagnostics for
//! every statement it could not resolve. A failing statement never stops
//! its siblings from resolving.
//!
//! Name lookup, innermost first:
//! - unqualified names: locals, then receiver properties, then imported
//!   external objects
//! - unqualified calls: member functions of the nearest receiver that has
//!   one of that name, then imported external functions, then constructors
//!   of imported classes

mod calls;
mod operations;
mod scope;

pub use operations::{
    BoundArgument, CalleeRef, ConstantValue, PropertyWrite, ResolvedExpr, ResolvedInvocation,
    ResolvedLocalValue, ResolvedOperation,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ast::*;
use crate::diagnostics::{self, Diagnostic, DiagnosticCode};
use crate::schema::{AnalysisSchema, DataProperty, DataTypeRef, FqName};

use calls::{bind_arguments, BindingMismatch, Candidate, TypedArgument};
use scope::{ImportConflict, ImportTable, LocalBinding, ScopeStack};

// =============================================================================
// PUBLIC API
// =============================================================================

/// Which top-level statements a resolution pass looks at
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StatementFilter {
    #[default]
    All,
    /// Only receiver-less calls with one of these names
    TopLevelCallsNamed(Vec<String>),
    /// Everything except receiver-less calls with one of these names
    ExcludeTopLevelCallsNamed(Vec<String>),
}

impl StatementFilter {
    pub fn accepts(&self, statement: &Statement) -> bool {
        let top_level_call = statement
            .as_call()
            .filter(|call| call.receiver.is_none())
            .map(|call| call.name.as_str());

        match self {
            StatementFilter::All => true,
            StatementFilter::TopLevelCallsNamed(names) => {
                top_level_call.map_or(false, |name| names.iter().any(|n| n == name))
            }
            StatementFilter::ExcludeTopLevelCallsNamed(names) => {
                top_level_call.map_or(true, |name| !names.iter().any(|n| n == name))
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub operations: Vec<ResolvedOperation>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ResolutionResult {
    /// The operations describe the whole script only when nothing failed
    pub fn is_usable(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn into_operations(self) -> Result<Vec<ResolvedOperation>, Vec<Diagnostic>> {
        if self.diagnostics.is_empty() {
            Ok(self.operations)
        } else {
            Err(self.diagnostics)
        }
    }
}

pub struct Resolver<'s> {
    schema: &'s AnalysisSchema,
    report_undeclared_imports: bool,
}

impl<'s> Resolver<'s> {
    pub fn new(schema: &'s AnalysisSchema) -> Self {
        Self {
            schema,
            report_undeclared_imports: true,
        }
    }

    /// Skip imports this schema does not declare instead of reporting them.
    /// The caller checks those with [`undeclared_imports`] across all the
    /// schemas the script is resolved against.
    pub fn ignoring_undeclared_imports(mut self) -> Self {
        self.report_undeclared_imports = false;
        self
    }

    pub fn resolve(&self, block: &Block) -> ResolutionResult {
        self.resolve_filtered(block, &StatementFilter::All)
    }

    pub fn resolve_filtered(&self, block: &Block, filter: &StatementFilter) -> ResolutionResult {
        let mut resolution = Resolution::new(self.schema);
        resolution
            .scopes
            .push(Some(self.schema.top_level_receiver.clone()));

        for import in block.imports() {
            resolution.register_import(import, self.report_undeclared_imports);
        }

        let mut operations = Vec::new();
        for statement in &block.statements {
            if matches!(statement, Statement::Import(_)) || !filter.accepts(statement) {
                continue;
            }
            if let Ok(operation) = resolution.statement(statement) {
                operations.push(operation);
            }
        }

        debug!(
            receiver = %self.schema.top_level_receiver,
            operations = operations.len(),
            diagnostics = resolution.diagnostics.len(),
            "resolved block"
        );

        ResolutionResult {
            operations,
            diagnostics: resolution.diagnostics,
        }
    }

    /// Resolve an expression on its own: no receiver in scope, default
    /// imports only
    pub fn resolve_expression(&self, expr: &Expr) -> Result<ResolvedExpr, Vec<Diagnostic>> {
        let mut resolution = Resolution::new(self.schema);
        resolution.scopes.push(None);

        match resolution.expression(expr) {
            Ok(resolved) if resolution.diagnostics.is_empty() => Ok(resolved),
            _ => Err(resolution.diagnostics),
        }
    }
}

/// Imports of `block` that none of `schemas` declares
pub fn undeclared_imports(block: &Block, schemas: &[&AnalysisSchema]) -> Vec<Diagnostic> {
    block
        .imports()
        .filter(|import| match FqName::from_parts(&import.name.parts) {
            Ok(name) => !schemas.iter().any(|schema| schema.declares(&name)),
            Err(_) => true,
        })
        .map(unresolved_import)
        .collect()
}

fn unresolved_import(import: &Import) -> Diagnostic {
    Diagnostic::new(
        DiagnosticCode::UnresolvedImport,
        import.span,
        format!("unresolved import '{}'", import.name),
    )
}

// =============================================================================
// RESOLUTION STATE
// =============================================================================

/// The failure has been diagnosed already, or needs no diagnostic
struct Reported;

type Resolved<T> = Result<T, Reported>;

struct Resolution<'s> {
    schema: &'s AnalysisSchema,
    scopes: ScopeStack,
    imports: ImportTable,
    diagnostics: Vec<Diagnostic>,
}

impl<'s> Resolution<'s> {
    fn new(schema: &'s AnalysisSchema) -> Self {
        Self {
            schema,
            scopes: ScopeStack::default(),
            imports: ImportTable::with_defaults(&schema.default_imports),
            diagnostics: Vec::new(),
        }
    }

    fn report(&mut self, diagnostic: Diagnostic) -> Reported {
        debug!(code = %diagnostic.code, line = diagnostic.span.line, "{}", diagnostic.message);
        self.diagnostics.push(diagnostic);
        Reported
    }

    fn register_import(&mut self, import: &Import, report_undeclared: bool) {
        let name = match FqName::from_parts(&import.name.parts) {
            Ok(name) if self.schema.declares(&name) => name,
            _ => {
                if report_undeclared {
                    self.report(unresolved_import(import));
                }
                return;
            }
        };

        if let Err(ImportConflict::Ambiguous(existing)) = self.imports.add(name) {
            self.report(Diagnostic::new(
                DiagnosticCode::AmbiguousImport,
                import.span,
                format!("import '{}' conflicts with import '{}'", import.name, existing),
            ));
        }
    }

    // =========================================================================
    // STATEMENTS
    // =========================================================================

    fn statement(&mut self, statement: &Statement) -> Resolved<ResolvedOperation> {
        match statement {
            Statement::Import(_) => Err(Reported),
            Statement::Assignment(assignment) => {
                self.assignment(assignment).map(ResolvedOperation::PropertyWrite)
            }
            Statement::LocalValue(local) => self.local_value(local).map(ResolvedOperation::LocalValue),
            Statement::Expr(Expr::FunctionCall(call)) => {
                self.call(call).map(ResolvedOperation::Invocation)
            }
            Statement::Expr(expr) => self.expression(expr).map(ResolvedOperation::Expression),
        }
    }

    /// Resolve a configure block in the scope of `receiver`
    fn block_operations(&mut self, block: &Block, receiver: FqName) -> Vec<ResolvedOperation> {
        self.scopes.push(Some(receiver));
        let operations = block
            .statements
            .iter()
            .filter_map(|statement| self.statement(statement).ok())
            .collect();
        self.scopes.pop();
        operations
    }

    fn assignment(&mut self, assignment: &Assignment) -> Resolved<PropertyWrite> {
        let lhs = &assignment.lhs;

        let (receiver, property) = match &lhs.receiver {
            None => {
                match self.scopes.lookup_local(&lhs.name) {
                    Some(LocalBinding::Poisoned { .. }) => return Err(Reported),
                    Some(LocalBinding::Value { .. }) => {
                        return Err(self.report(Diagnostic::new(
                            DiagnosticCode::ReadOnlyProperty,
                            lhs.span,
                            format!("'{}' is a val and cannot be reassigned", lhs.name),
                        )))
                    }
                    None => {}
                }
                match self.receiver_property(&lhs.name, lhs.span) {
                    Some(found) => found,
                    None => {
                        return Err(self.report(diagnostics::unresolved_property(
                            &lhs.name,
                            "any receiver in scope",
                            lhs.span,
                        )))
                    }
                }
            }
            Some(receiver_expr) => {
                let receiver = self.expression(receiver_expr)?;
                let owner = self.member_owner(&receiver, lhs.span)?;
                let property = self.class_property(&owner, &lhs.name, lhs.span)?;
                (receiver, property)
            }
        };

        if property.is_read_only {
            return Err(self.report(diagnostics::read_only_property(&property.name, lhs.span)));
        }

        let value = self.expression(&assignment.rhs)?;
        let found = value.type_ref();
        if !self.schema.is_assignable(&property.type_ref, &found) {
            return Err(self.report(diagnostics::type_mismatch(
                &property.type_ref,
                &found,
                assignment.rhs.span(),
            )));
        }

        Ok(PropertyWrite {
            receiver,
            property,
            value,
            span: assignment.span,
        })
    }

    fn local_value(&mut self, local: &LocalValue) -> Resolved<ResolvedLocalValue> {
        if let Some(first) = self.scopes.declared_in_current(&local.name).map(LocalBinding::span) {
            return Err(self.report(
                Diagnostic::new(
                    DiagnosticCode::DuplicateBinding,
                    local.span,
                    format!("'{}' is already declared in this block", local.name),
                )
                .with_related("first declared here", first),
            ));
        }

        match self.expression(&local.rhs) {
            Ok(value) => {
                let binding = LocalBinding::Value {
                    type_ref: value.type_ref(),
                    span: local.span,
                };
                let _ = self.scopes.declare(&local.name, binding);
                Ok(ResolvedLocalValue {
                    name: local.name.clone(),
                    value,
                    span: local.span,
                })
            }
            Err(reported) => {
                let _ = self
                    .scopes
                    .declare(&local.name, LocalBinding::Poisoned { span: local.span });
                Err(reported)
            }
        }
    }

    // =========================================================================
    // EXPRESSIONS
    // =========================================================================

    fn expression(&mut self, expr: &Expr) -> Resolved<ResolvedExpr> {
        match expr {
            Expr::Literal(literal) => Ok(ResolvedExpr::Constant {
                value: ConstantValue::from(literal),
                span: literal.span(),
            }),
            Expr::Null(span) => Ok(ResolvedExpr::Null(*span)),
            Expr::This(span) => match self.scopes.innermost_receiver() {
                Some((depth, type_name)) => Ok(ResolvedExpr::Receiver {
                    type_name: type_name.clone(),
                    depth,
                    span: *span,
                }),
                None => Err(self.report(Diagnostic::new(
                    DiagnosticCode::UnresolvedReceiver,
                    *span,
                    "'this' has no receiver here",
                ))),
            },
            Expr::PropertyAccess(access) => self.property_read(access),
            Expr::FunctionCall(call) => self
                .call(call)
                .map(|invocation| ResolvedExpr::Invocation(Box::new(invocation))),
        }
    }

    fn property_read(&mut self, access: &PropertyAccess) -> Resolved<ResolvedExpr> {
        let Some(receiver_expr) = &access.receiver else {
            return self.unqualified_name(&access.name, access.span);
        };

        let receiver = self.expression(receiver_expr)?;
        let owner = self.member_owner(&receiver, access.span)?;
        let property = self.class_property(&owner, &access.name, access.span)?;

        Ok(ResolvedExpr::PropertyRead {
            receiver: Box::new(receiver),
            property,
            span: access.span,
        })
    }

    fn unqualified_name(&mut self, name: &str, span: Span) -> Resolved<ResolvedExpr> {
        match self.scopes.lookup_local(name) {
            Some(LocalBinding::Value { type_ref, .. }) => {
                return Ok(ResolvedExpr::LocalValue {
                    name: name.to_string(),
                    type_ref: type_ref.clone(),
                    span,
                })
            }
            Some(LocalBinding::Poisoned { .. }) => return Err(Reported),
            None => {}
        }

        if let Some((receiver, property)) = self.receiver_property(name, span) {
            return Ok(ResolvedExpr::PropertyRead {
                receiver: Box::new(receiver),
                property,
                span,
            });
        }

        let object = self.imports.lookup(name).and_then(|fq| {
            self.schema
                .external_objects
                .get(fq)
                .map(|type_ref| (fq.clone(), type_ref.clone()))
        });
        if let Some((fq_name, type_ref)) = object {
            return Ok(ResolvedExpr::ExternalObject {
                name: fq_name,
                type_ref,
                span,
            });
        }

        Err(self.report(Diagnostic::new(
            DiagnosticCode::UnresolvedProperty,
            span,
            format!("unresolved reference '{}'", name),
        )))
    }

    /// Nearest receiver declaring property `name`
    fn receiver_property(&self, name: &str, span: Span) -> Option<(ResolvedExpr, DataProperty)> {
        let schema = self.schema;
        self.scopes.receivers().find_map(|(depth, class)| {
            let property = schema.data_class(class)?.property(name)?;
            Some((
                ResolvedExpr::Receiver {
                    type_name: class.clone(),
                    depth,
                    span,
                },
                property.clone(),
            ))
        })
    }

    /// Type whose members a qualified access looks up; `null` has none
    fn member_owner(&mut self, receiver: &ResolvedExpr, span: Span) -> Resolved<DataTypeRef> {
        match receiver.type_ref() {
            DataTypeRef::Null => Err(self.report(Diagnostic::new(
                DiagnosticCode::UnresolvedReceiver,
                span,
                "'null' has no members",
            ))),
            owner => Ok(owner),
        }
    }

    fn class_property(&mut self, owner: &DataTypeRef, name: &str, span: Span) -> Resolved<DataProperty> {
        let property = owner
            .class_name()
            .and_then(|class| self.schema.data_class(class))
            .and_then(|class| class.property(name))
            .cloned();

        match property {
            Some(property) => Ok(property),
            None => Err(self.report(diagnostics::unresolved_property(
                name,
                &owner.to_string(),
                span,
            ))),
        }
    }

    // =========================================================================
    // CALLS
    // =========================================================================

    fn call(&mut self, call: &FunctionCall) -> Resolved<ResolvedInvocation> {
        let (receiver, candidates) = match &call.receiver {
            Some(receiver_expr) => {
                let receiver = self.expression(receiver_expr)?;
                let owner = self.member_owner(&receiver, call.span)?;
                let candidates = owner
                    .class_name()
                    .map(|class| Candidate::members(self.schema, class, &call.name))
                    .unwrap_or_default();
                (Some(receiver), candidates)
            }
            None => self.unqualified_candidates(&call.name, call.span),
        };

        if candidates.is_empty() {
            return Err(self.report(Diagnostic::new(
                DiagnosticCode::UnresolvedCall,
                call.span,
                format!("unresolved function '{}'", call.name),
            )));
        }

        let mut values = Vec::new();
        let mut typed = Vec::new();
        let mut failed = false;
        for argument in call.value_args() {
            let (name, expr) = match argument {
                FunctionArgument::Positional { expr, .. } => (None, expr),
                FunctionArgument::Named { name, expr, .. } => (Some(name.clone()), expr),
                FunctionArgument::Lambda { .. } => continue,
            };
            match self.expression(expr) {
                Ok(value) => {
                    typed.push(TypedArgument {
                        name,
                        type_ref: value.type_ref(),
                    });
                    values.push(Some(value));
                }
                Err(Reported) => failed = true,
            }
        }
        if failed {
            return Err(Reported);
        }

        let lambda = call.lambda();
        let outcomes: Vec<(Candidate<'s>, Result<Vec<Option<usize>>, BindingMismatch>)> = candidates
            .into_iter()
            .map(|candidate| {
                let outcome = bind_arguments(self.schema, &candidate, &typed, lambda.is_some());
                (candidate, outcome)
            })
            .collect();

        let applicable = outcomes.iter().filter(|(_, outcome)| outcome.is_ok()).count();
        if applicable != 1 {
            return Err(self.report_inapplicable(call, &outcomes, applicable));
        }

        let Some((candidate, Ok(bound))) = outcomes.into_iter().find(|(_, outcome)| outcome.is_ok())
        else {
            return Err(Reported);
        };

        let arguments = candidate
            .parameters
            .iter()
            .zip(bound)
            .filter_map(|(parameter, slot)| {
                let value = values.get_mut(slot?)?.take()?;
                Some(BoundArgument {
                    parameter: parameter.clone(),
                    value,
                })
            })
            .collect();

        let configure_block = match (lambda, candidate.semantics.configured_type()) {
            (Some(block), Some(configured)) => configured
                .class_name()
                .map(|class| self.block_operations(block, class.clone())),
            _ => None,
        };

        Ok(ResolvedInvocation {
            callee: candidate.callee,
            receiver,
            result_type: candidate.semantics.return_type(),
            semantics: candidate.semantics,
            arguments,
            configure_block,
            span: call.span,
        })
    }

    fn unqualified_candidates(
        &self,
        name: &str,
        span: Span,
    ) -> (Option<ResolvedExpr>, Vec<Candidate<'s>>) {
        let schema = self.schema;

        let member_owner = self
            .scopes
            .receivers()
            .find(|(_, class)| schema.data_class(class).map_or(false, |c| c.has_function(name)));
        if let Some((depth, class)) = member_owner {
            let receiver = ResolvedExpr::Receiver {
                type_name: class.clone(),
                depth,
                span,
            };
            return (Some(receiver), Candidate::members(schema, class, name));
        }

        if let Some(fq_name) = self.imports.lookup(name) {
            let external = Candidate::external(schema, fq_name);
            if !external.is_empty() {
                return (None, external);
            }
            return (None, Candidate::constructors(schema, fq_name));
        }

        (None, Vec::new())
    }

    fn report_inapplicable(
        &mut self,
        call: &FunctionCall,
        outcomes: &[(Candidate<'s>, Result<Vec<Option<usize>>, BindingMismatch>)],
        applicable: usize,
    ) -> Reported {
        let diagnostic = if applicable > 1 {
            Diagnostic::new(
                DiagnosticCode::AmbiguousCall,
                call.span,
                format!("call to '{}' matches {} functions", call.name, applicable),
            )
        } else if outcomes
            .iter()
            .all(|(_, o)| matches!(o, Err(BindingMismatch::UnexpectedConfigureBlock)))
        {
            Diagnostic::new(
                DiagnosticCode::UnexpectedConfigureBlock,
                call.span,
                format!("'{}' does not take a configure block", call.name),
            )
        } else {
            match outcomes {
                [(_, Err(mismatch))] => Diagnostic::new(
                    DiagnosticCode::UnresolvedCall,
                    call.span,
                    format!("cannot call '{}': {}", call.name, mismatch),
                ),
                _ => diagnostics::unresolved_call(&call.name, call.span),
            }
        };

        self.report(diagnostic)
    }
}
