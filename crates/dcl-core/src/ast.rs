//! Syntax tree for declarative scripts
//!
//! The tree is plain data produced by the parser and consumed by the
//! resolver. It carries no schema knowledge: whether `id("x")` is a call
//! that adds a plugin or a pure function is decided later, against a schema.
//!
//! ```text
//! Source → Parser → Block (this module)
//!                     ↓
//!          Resolver + AnalysisSchema
//!                     ↓
//!          ResolvedOperation list + Diagnostics
//! ```

use serde::{Deserialize, Serialize};

use crate::schema::types::ConstantType;

// =============================================================================
// SOURCE SPAN
// =============================================================================

/// Location of a node in its source text.
///
/// Spans are informational: two trees that differ only in spans still
/// describe different parses, but nothing downstream relies on them beyond
/// reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset of start
    pub start: usize,
    /// Byte offset of end
    pub end: usize,
    /// 1-based line of start
    pub line: u32,
    /// 1-based column of start (in characters)
    pub column: u32,
}

impl Span {
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }
}

// =============================================================================
// BLOCKS AND STATEMENTS
// =============================================================================

/// An ordered list of statements: a whole script, or the body of a lambda
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub span: Span,
}

impl Block {
    pub fn imports(&self) -> impl Iterator<Item = &Import> {
        self.statements.iter().filter_map(Statement::as_import)
    }

    /// Render the block back to script source, one statement per line
    pub fn to_source(&self) -> String {
        self.render(0)
    }

    fn render(&self, indent: usize) -> String {
        let pad = "    ".repeat(indent);
        self.statements
            .iter()
            .map(|s| format!("{}{}", pad, s.render(indent)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Import(Import),
    Assignment(Assignment),
    LocalValue(LocalValue),
    Expr(Expr),
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::Import(import) => import.span,
            Statement::Assignment(assignment) => assignment.span,
            Statement::LocalValue(local) => local.span,
            Statement::Expr(expr) => expr.span(),
        }
    }

    pub fn as_import(&self) -> Option<&Import> {
        match self {
            Statement::Import(import) => Some(import),
            _ => None,
        }
    }

    pub fn as_call(&self) -> Option<&FunctionCall> {
        match self {
            Statement::Expr(Expr::FunctionCall(call)) => Some(call),
            _ => None,
        }
    }

    pub fn to_source(&self) -> String {
        self.render(0)
    }

    fn render(&self, indent: usize) -> String {
        match self {
            Statement::Import(import) => format!("import {}", import.name),
            Statement::Assignment(assignment) => format!(
                "{} = {}",
                assignment.lhs.render(indent),
                assignment.rhs.render(indent)
            ),
            Statement::LocalValue(local) => {
                format!("val {} = {}", local.name, local.rhs.render(indent))
            }
            Statement::Expr(expr) => expr.render(indent),
        }
    }
}

/// Dotted name as written in an import: `com.example.newD`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessChain {
    pub parts: Vec<String>,
}

impl AccessChain {
    pub fn last(&self) -> Option<&str> {
        self.parts.last().map(String::as_str)
    }
}

impl std::fmt::Display for AccessChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.parts.join("."))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Import {
    pub name: AccessChain,
    pub span: Span,
}

/// `lhs = rhs` where `lhs` names a property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub lhs: PropertyAccess,
    pub rhs: Expr,
    pub span: Span,
}

/// `val name = rhs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalValue {
    pub name: String,
    pub rhs: Expr,
    pub span: Span,
}

// =============================================================================
// EXPRESSIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    PropertyAccess(PropertyAccess),
    FunctionCall(FunctionCall),
    Literal(Literal),
    Null(Span),
    This(Span),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::PropertyAccess(access) => access.span,
            Expr::FunctionCall(call) => call.span,
            Expr::Literal(literal) => literal.span(),
            Expr::Null(span) | Expr::This(span) => *span,
        }
    }

    pub fn as_property_access(&self) -> Option<&PropertyAccess> {
        match self {
            Expr::PropertyAccess(access) => Some(access),
            _ => None,
        }
    }

    pub fn as_call(&self) -> Option<&FunctionCall> {
        match self {
            Expr::FunctionCall(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Expr::Literal(literal) => Some(literal),
            _ => None,
        }
    }

    pub fn to_source(&self) -> String {
        self.render(0)
    }

    fn render(&self, indent: usize) -> String {
        match self {
            Expr::PropertyAccess(access) => access.render(indent),
            Expr::FunctionCall(call) => call.render(indent),
            Expr::Literal(literal) => literal.to_source(),
            Expr::Null(_) => "null".to_string(),
            Expr::This(_) => "this".to_string(),
        }
    }
}

/// `name` or `receiver.name`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyAccess {
    pub receiver: Option<Box<Expr>>,
    pub name: String,
    pub span: Span,
}

impl PropertyAccess {
    fn render(&self, indent: usize) -> String {
        match &self.receiver {
            Some(receiver) => format!("{}.{}", receiver.render(indent), self.name),
            None => self.name.clone(),
        }
    }
}

/// `name(args) { ... }`, optionally on a receiver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub receiver: Option<Box<Expr>>,
    pub name: String,
    pub args: Vec<FunctionArgument>,
    pub span: Span,
}

impl FunctionCall {
    /// The trailing lambda, if the call has one
    pub fn lambda(&self) -> Option<&Block> {
        self.args.iter().find_map(|arg| match arg {
            FunctionArgument::Lambda { block, .. } => Some(block),
            _ => None,
        })
    }

    /// Positional and named arguments, in source order
    pub fn value_args(&self) -> impl Iterator<Item = &FunctionArgument> {
        self.args
            .iter()
            .filter(|arg| !matches!(arg, FunctionArgument::Lambda { .. }))
    }

    fn render(&self, indent: usize) -> String {
        let mut out = match &self.receiver {
            Some(receiver) => format!("{}.{}", receiver.render(indent), self.name),
            None => self.name.clone(),
        };

        let values: Vec<String> = self.value_args().map(|a| a.render(indent)).collect();
        let lambda = self.lambda();
        if !values.is_empty() || lambda.is_none() {
            out.push_str(&format!("({})", values.join(", ")));
        }

        if let Some(block) = lambda {
            if block.statements.is_empty() {
                out.push_str(" { }");
            } else {
                let pad = "    ".repeat(indent);
                out.push_str(&format!(" {{\n{}\n{}}}", block.render(indent + 1), pad));
            }
        }

        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FunctionArgument {
    Positional { expr: Expr, span: Span },
    Named { name: String, expr: Expr, span: Span },
    /// A trailing `{ ... }` block, configuring the call's result
    Lambda { block: Block, span: Span },
}

impl FunctionArgument {
    pub fn span(&self) -> Span {
        match self {
            FunctionArgument::Positional { span, .. }
            | FunctionArgument::Named { span, .. }
            | FunctionArgument::Lambda { span, .. } => *span,
        }
    }

    fn render(&self, indent: usize) -> String {
        match self {
            FunctionArgument::Positional { expr, .. } => expr.render(indent),
            FunctionArgument::Named { name, expr, .. } => {
                format!("{} = {}", name, expr.render(indent))
            }
            FunctionArgument::Lambda { block, .. } => format!("{{ {} }}", block.render(0)),
        }
    }
}

// =============================================================================
// LITERALS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    String { value: String, span: Span },
    Int { value: i32, span: Span },
    Long { value: i64, span: Span },
    Boolean { value: bool, span: Span },
}

impl Literal {
    pub fn span(&self) -> Span {
        match self {
            Literal::String { span, .. }
            | Literal::Int { span, .. }
            | Literal::Long { span, .. }
            | Literal::Boolean { span, .. } => *span,
        }
    }

    pub fn constant_type(&self) -> ConstantType {
        match self {
            Literal::String { .. } => ConstantType::String,
            Literal::Int { .. } => ConstantType::Int,
            Literal::Long { .. } => ConstantType::Long,
            Literal::Boolean { .. } => ConstantType::Boolean,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Literal::String { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn to_source(&self) -> String {
        match self {
            Literal::String { value, .. } => format!("\"{}\"", escape(value)),
            Literal::Int { value, .. } => value.to_string(),
            Literal::Long { value, .. } => format!("{}L", value),
            Literal::Boolean { value, .. } => value.to_string(),
        }
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '$' => out.push_str("\\$"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn string(value: &str) -> Expr {
        Expr::Literal(Literal::String {
            value: value.to_string(),
            span: Span::default(),
        })
    }

    fn call(name: &str, args: Vec<FunctionArgument>) -> FunctionCall {
        FunctionCall {
            receiver: None,
            name: name.to_string(),
            args,
            span: Span::default(),
        }
    }

    #[test]
    fn test_literal_constant_types() {
        let long = Literal::Long {
            value: 1,
            span: Span::default(),
        };
        assert_eq!(long.constant_type(), ConstantType::Long);
        assert_eq!(long.to_source(), "1L");

        let s = Literal::String {
            value: "a\"b$".to_string(),
            span: Span::default(),
        };
        assert_eq!(s.constant_type(), ConstantType::String);
        assert_eq!(s.to_source(), r#""a\"b\$""#);
    }

    #[test]
    fn test_render_call_with_lambda() {
        let inner = Statement::Expr(Expr::FunctionCall(call(
            "id",
            vec![FunctionArgument::Positional {
                expr: string("java"),
                span: Span::default(),
            }],
        )));
        let plugins = call(
            "plugins",
            vec![FunctionArgument::Lambda {
                block: Block {
                    statements: vec![inner],
                    span: Span::default(),
                },
                span: Span::default(),
            }],
        );

        assert_eq!(
            Statement::Expr(Expr::FunctionCall(plugins)).to_source(),
            "plugins {\n    id(\"java\")\n}"
        );
    }

    #[test]
    fn test_render_chain_and_assignment() {
        let receiver = Expr::FunctionCall(call(
            "id",
            vec![FunctionArgument::Positional {
                expr: string("x"),
                span: Span::default(),
            }],
        ));
        let chained = FunctionCall {
            receiver: Some(Box::new(receiver)),
            name: "version".to_string(),
            args: vec![FunctionArgument::Positional {
                expr: string("1.0"),
                span: Span::default(),
            }],
            span: Span::default(),
        };
        assert_eq!(
            Expr::FunctionCall(chained).to_source(),
            "id(\"x\").version(\"1.0\")"
        );

        let assignment = Statement::Assignment(Assignment {
            lhs: PropertyAccess {
                receiver: None,
                name: "x".to_string(),
                span: Span::default(),
            },
            rhs: Expr::Null(Span::default()),
            span: Span::default(),
        });
        assert_eq!(assignment.to_source(), "x = null");
    }
}
