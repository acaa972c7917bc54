//! Resolved program: what a script would do, typed against its schema

use serde::{Deserialize, Serialize};

use crate::ast::{Literal, Span};
use crate::schema::{DataParameter, DataProperty, DataTypeRef, FqName, FunctionSemantics};

/// One top-level effect of a statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResolvedOperation {
    PropertyWrite(PropertyWrite),
    LocalValue(ResolvedLocalValue),
    Invocation(ResolvedInvocation),
    /// A statement that is an expression but not a call, e.g. a bare read
    Expression(ResolvedExpr),
}

impl ResolvedOperation {
    pub fn span(&self) -> Span {
        match self {
            ResolvedOperation::PropertyWrite(write) => write.span,
            ResolvedOperation::LocalValue(local) => local.span,
            ResolvedOperation::Invocation(invocation) => invocation.span,
            ResolvedOperation::Expression(expr) => expr.span(),
        }
    }

    pub fn as_invocation(&self) -> Option<&ResolvedInvocation> {
        match self {
            ResolvedOperation::Invocation(invocation) => Some(invocation),
            _ => None,
        }
    }

    pub fn as_property_write(&self) -> Option<&PropertyWrite> {
        match self {
            ResolvedOperation::PropertyWrite(write) => Some(write),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyWrite {
    pub receiver: ResolvedExpr,
    pub property: DataProperty,
    pub value: ResolvedExpr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocalValue {
    pub name: String,
    pub value: ResolvedExpr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstantValue {
    String(String),
    Int(i32),
    Long(i64),
    Boolean(bool),
}

impl From<&Literal> for ConstantValue {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::String { value, .. } => ConstantValue::String(value.clone()),
            Literal::Int { value, .. } => ConstantValue::Int(*value),
            Literal::Long { value, .. } => ConstantValue::Long(*value),
            Literal::Boolean { value, .. } => ConstantValue::Boolean(*value),
        }
    }
}

impl ConstantValue {
    pub fn type_ref(&self) -> DataTypeRef {
        match self {
            ConstantValue::String(_) => DataTypeRef::STRING,
            ConstantValue::Int(_) => DataTypeRef::INT,
            ConstantValue::Long(_) => DataTypeRef::LONG,
            ConstantValue::Boolean(_) => DataTypeRef::BOOLEAN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResolvedExpr {
    Constant {
        value: ConstantValue,
        span: Span,
    },
    Null(Span),
    /// An implicit or `this` receiver; `depth` 0 is the top-level receiver
    Receiver {
        type_name: FqName,
        depth: usize,
        span: Span,
    },
    LocalValue {
        name: String,
        type_ref: DataTypeRef,
        span: Span,
    },
    PropertyRead {
        receiver: Box<ResolvedExpr>,
        property: DataProperty,
        span: Span,
    },
    ExternalObject {
        name: FqName,
        type_ref: DataTypeRef,
        span: Span,
    },
    Invocation(Box<ResolvedInvocation>),
}

impl ResolvedExpr {
    pub fn type_ref(&self) -> DataTypeRef {
        match self {
            ResolvedExpr::Constant { value, .. } => value.type_ref(),
            ResolvedExpr::Null(_) => DataTypeRef::Null,
            ResolvedExpr::Receiver { type_name, .. } => DataTypeRef::Name(type_name.clone()),
            ResolvedExpr::LocalValue { type_ref, .. }
            | ResolvedExpr::ExternalObject { type_ref, .. } => type_ref.clone(),
            ResolvedExpr::PropertyRead { property, .. } => property.type_ref.clone(),
            ResolvedExpr::Invocation(invocation) => invocation.result_type.clone(),
        }
    }

    pub fn span(&self) -> Span {
        match self {
            ResolvedExpr::Constant { span, .. }
            | ResolvedExpr::Receiver { span, .. }
            | ResolvedExpr::LocalValue { span, .. }
            | ResolvedExpr::PropertyRead { span, .. }
            | ResolvedExpr::ExternalObject { span, .. } => *span,
            ResolvedExpr::Null(span) => *span,
            ResolvedExpr::Invocation(invocation) => invocation.span,
        }
    }

    pub fn as_invocation(&self) -> Option<&ResolvedInvocation> {
        match self {
            ResolvedExpr::Invocation(invocation) => Some(invocation),
            _ => None,
        }
    }
}

/// What a call resolved to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalleeRef {
    Member { owner: FqName, name: String },
    External(FqName),
    Constructor(FqName),
}

impl CalleeRef {
    pub fn name(&self) -> &str {
        match self {
            CalleeRef::Member { name, .. } => name,
            CalleeRef::External(fq) | CalleeRef::Constructor(fq) => fq.simple_name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundArgument {
    pub parameter: DataParameter,
    pub value: ResolvedExpr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedInvocation {
    pub callee: CalleeRef,
    /// `None` for external functions and constructors
    pub receiver: Option<ResolvedExpr>,
    pub semantics: FunctionSemantics,
    /// Bound arguments, in parameter order
    pub arguments: Vec<BoundArgument>,
    /// Operations of the configure block, resolved against the configured type
    pub configure_block: Option<Vec<ResolvedOperation>>,
    pub result_type: DataTypeRef,
    pub span: Span,
}

impl ResolvedInvocation {
    pub fn argument(&self, parameter: &str) -> Option<&ResolvedExpr> {
        self.arguments
            .iter()
            .find(|a| a.parameter.name == parameter)
            .map(|a| &a.value)
    }

    /// The receiver, when it is itself a call (`a().b()`)
    pub fn receiver_invocation(&self) -> Option<&ResolvedInvocation> {
        self.receiver.as_ref().and_then(ResolvedExpr::as_invocation)
    }
}
