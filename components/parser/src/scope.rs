//! Compile-time scope tracking

use crate::error::syntax_error;
use core_types::{Diagnostic, Span};
use std::collections::HashMap;

/// Names every module can see without declaring them.
pub const BUILTINS: &[&str] = &[
    "println",
    "print",
    "type_of",
    "instance_of",
    "Int",
    "Float",
    "String",
    "Bool",
    "List",
    "Nil",
    "Future",
];

/// A declared name
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Name
    pub name: String,
    /// Declaration site
    pub span: Span,
    /// True for module globals, false for frame locals
    pub is_global: bool,
}

/// Stack of lexical scopes. The outermost scope holds module globals.
#[derive(Debug, Clone)]
pub struct Scopes {
    scopes: Vec<HashMap<String, Variable>>,
}

impl Default for Scopes {
    fn default() -> Self {
        Self::new()
    }
}

impl Scopes {
    /// Create a scope stack holding only the global scope with the builtins
    pub fn new() -> Self {
        let mut scopes = Scopes {
            scopes: vec![HashMap::new()],
        };
        for name in BUILTINS {
            scopes.declare_global(name);
        }
        scopes
    }

    /// Number of open scopes (1 at module level)
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// True while only the global scope is open
    pub fn is_global_scope(&self) -> bool {
        self.scopes.len() == 1
    }

    /// Open a nested scope
    pub fn new_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Close the innermost scope. The global scope is never closed.
    pub fn end_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Declare `name` in the innermost scope.
    ///
    /// Locals may shadow globals, but a name already visible in the current
    /// scope or an enclosing local scope cannot be declared again.
    pub fn declare(&mut self, name: &str, span: Span) -> Result<Variable, Diagnostic> {
        let is_global = self.is_global_scope();
        let conflict = if is_global {
            self.scopes[0].contains_key(name)
        } else {
            self.scopes[1..].iter().any(|s| s.contains_key(name))
        };
        if conflict {
            return Err(syntax_error(
                format!("Variable {} is already declared in this scope", name),
                span,
            ));
        }
        let variable = Variable {
            name: name.to_string(),
            span,
            is_global,
        };
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), variable.clone());
        }
        Ok(variable)
    }

    /// Declare a global unconditionally (host-provided names).
    pub fn declare_global(&mut self, name: &str) {
        self.scopes[0].insert(
            name.to_string(),
            Variable {
                name: name.to_string(),
                span: Span::default(),
                is_global: true,
            },
        );
    }

    /// Resolve `name`, innermost scope first
    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    /// True when `name` is a global
    pub fn is_global(&self, name: &str) -> bool {
        self.scopes[0].contains_key(name)
    }

    /// Names of every global, sorted
    pub fn globals(&self) -> Vec<String> {
        let mut names: Vec<String> = self.scopes[0].keys().cloned().collect();
        names.sort();
        names
    }
}
