//! Semantic diagnostics
//!
//! Single diagnostic type produced by resolution. Diagnostics accumulate:
//! the resolver keeps going after reporting one, so a script gets every
//! semantic problem in one pass.

use serde::{Deserialize, Serialize};

use crate::ast::Span;

/// Diagnostic codes for categorizing issues
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // =========================================================================
    // Names
    // =========================================================================
    UnresolvedReceiver,
    UnresolvedProperty,
    UnresolvedCall,
    AmbiguousCall,
    UnresolvedImport,
    AmbiguousImport,

    // =========================================================================
    // Effects
    // =========================================================================
    UnexpectedConfigureBlock,
    ReadOnlyProperty,
    TypeMismatch,
    DuplicateBinding,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::UnresolvedReceiver => "unresolved-receiver",
            DiagnosticCode::UnresolvedProperty => "unresolved-property",
            DiagnosticCode::UnresolvedCall => "unresolved-call",
            DiagnosticCode::AmbiguousCall => "ambiguous-call",
            DiagnosticCode::UnresolvedImport => "unresolved-import",
            DiagnosticCode::AmbiguousImport => "ambiguous-import",
            DiagnosticCode::UnexpectedConfigureBlock => "unexpected-configure-block",
            DiagnosticCode::ReadOnlyProperty => "read-only-property",
            DiagnosticCode::TypeMismatch => "type-mismatch",
            DiagnosticCode::DuplicateBinding => "duplicate-binding",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Related information for multi-location diagnostics
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedInfo {
    pub message: String,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub message: String,
    pub span: Span,
    pub related: Vec<RelatedInfo>,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, span: Span, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            span,
            related: vec![],
        }
    }

    /// Add related information
    pub fn with_related(mut self, message: impl Into<String>, span: Span) -> Self {
        self.related.push(RelatedInfo {
            message: message.into(),
            span,
        });
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}: [{}] {}",
            self.span.line, self.span.column, self.code, self.message
        )
    }
}

// =============================================================================
// Convenience Builders
// =============================================================================

pub fn unresolved_property(name: &str, receiver: &str, span: Span) -> Diagnostic {
    Diagnostic::new(
        DiagnosticCode::UnresolvedProperty,
        span,
        format!("unresolved property '{}' on {}", name, receiver),
    )
}

pub fn unresolved_call(name: &str, span: Span) -> Diagnostic {
    Diagnostic::new(
        DiagnosticCode::UnresolvedCall,
        span,
        format!("no applicable function '{}'", name),
    )
}

pub fn read_only_property(name: &str, span: Span) -> Diagnostic {
    Diagnostic::new(
        DiagnosticCode::ReadOnlyProperty,
        span,
        format!("'{}' is read-only and cannot be assigned", name),
    )
}

pub fn type_mismatch(expected: impl std::fmt::Display, found: impl std::fmt::Display, span: Span) -> Diagnostic {
    Diagnostic::new(
        DiagnosticCode::TypeMismatch,
        span,
        format!("type mismatch: expected {}, found {}", expected, found),
    )
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_position_and_code() {
        let diag = read_only_property("id", Span::new(10, 12, 3, 5));
        assert_eq!(
            diag.to_string(),
            "3:5: [read-only-property] 'id' is read-only and cannot be assigned"
        );
    }

    #[test]
    fn test_with_related() {
        let first = Span::new(0, 8, 1, 1);
        let diag = Diagnostic::new(DiagnosticCode::DuplicateBinding, Span::new(9, 17, 2, 1), "x")
            .with_related("first declared here", first);
        assert_eq!(diag.related.len(), 1);
        assert_eq!(diag.related[0].span, first);
    }

    #[test]
    fn test_code_serializes_as_variant_name() {
        let json = serde_json::to_string(&DiagnosticCode::UnexpectedConfigureBlock).unwrap();
        assert_eq!(json, "\"UnexpectedConfigureBlock\"");
    }
}
