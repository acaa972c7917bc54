//! Lexical environment of a resolution: block scopes and imports

use std::collections::BTreeMap;

use crate::ast::Span;
use crate::schema::{DataTypeRef, FqName};

#[derive(Debug, Clone)]
pub(crate) enum LocalBinding {
    Value { type_ref: DataTypeRef, span: Span },
    /// The initializer failed; references resolve to nothing, silently
    Poisoned { span: Span },
}

impl LocalBinding {
    pub(crate) fn span(&self) -> Span {
        match self {
            LocalBinding::Value { span, .. } | LocalBinding::Poisoned { span } => *span,
        }
    }
}

#[derive(Debug)]
struct Scope {
    receiver: Option<FqName>,
    locals: BTreeMap<String, LocalBinding>,
}

/// Stack of block scopes, innermost last
#[derive(Debug, Default)]
pub(crate) struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    pub(crate) fn push(&mut self, receiver: Option<FqName>) {
        self.scopes.push(Scope {
            receiver,
            locals: BTreeMap::new(),
        });
    }

    pub(crate) fn pop(&mut self) {
        self.scopes.pop();
    }

    pub(crate) fn lookup_local(&self, name: &str) -> Option<&LocalBinding> {
        self.scopes.iter().rev().find_map(|s| s.locals.get(name))
    }

    /// Bind `name` in the innermost scope; on redeclaration returns the
    /// existing binding
    pub(crate) fn declare(&mut self, name: &str, binding: LocalBinding) -> Result<(), &LocalBinding> {
        let Some(scope) = self.scopes.last_mut() else {
            return Ok(());
        };
        if scope.locals.contains_key(name) {
            return Err(&scope.locals[name]);
        }
        scope.locals.insert(name.to_string(), binding);
        Ok(())
    }

    pub(crate) fn declared_in_current(&self, name: &str) -> Option<&LocalBinding> {
        self.scopes.last().and_then(|s| s.locals.get(name))
    }

    /// Receivers with their scope depth, innermost first
    pub(crate) fn receivers(&self) -> impl Iterator<Item = (usize, &FqName)> {
        self.scopes
            .iter()
            .enumerate()
            .rev()
            .filter_map(|(depth, s)| s.receiver.as_ref().map(|r| (depth, r)))
    }

    pub(crate) fn innermost_receiver(&self) -> Option<(usize, &FqName)> {
        self.receivers().next()
    }
}

/// Short names made visible by imports
#[derive(Debug, Default)]
pub(crate) struct ImportTable {
    explicit: BTreeMap<String, FqName>,
    defaults: BTreeMap<String, FqName>,
}

pub(crate) enum ImportConflict {
    /// Another explicit import already claims the short name
    Ambiguous(FqName),
}

impl ImportTable {
    pub(crate) fn with_defaults<'a>(defaults: impl IntoIterator<Item = &'a FqName>) -> Self {
        let mut table = Self::default();
        for name in defaults {
            table
                .defaults
                .entry(name.simple_name().to_string())
                .or_insert_with(|| name.clone());
        }
        table
    }

    pub(crate) fn add(&mut self, name: FqName) -> Result<(), ImportConflict> {
        let simple = name.simple_name().to_string();
        match self.explicit.get(&simple) {
            Some(existing) if *existing != name => Err(ImportConflict::Ambiguous(existing.clone())),
            Some(_) => Ok(()),
            None => {
                self.explicit.insert(simple, name);
                Ok(())
            }
        }
    }

    /// Explicit imports shadow default imports
    pub(crate) fn lookup(&self, simple_name: &str) -> Option<&FqName> {
        self.explicit
            .get(simple_name)
            .or_else(|| self.defaults.get(simple_name))
    }
}
