//! Source-to-bytecode driver

use crate::bytecode_gen::{BytecodeGenerator, ImportResolver};
use crate::parser::Parser;
use crate::scope::Scopes;
use bytecode_system::{Code, SourceCompiler};
use core_types::Diagnostic;
use tracing::debug;

/// Compiles Bond source into [`Code`].
///
/// The global scope persists across [`Compiler::compile`] calls, so a REPL
/// can feed it one line at a time. A failed compile leaves the scope exactly
/// as it was before the call.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    scopes: Scopes,
    repl: bool,
}

impl Compiler {
    /// Compiler for whole modules
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiler for interactive sessions: the value of a trailing expression
    /// statement becomes the module's return value.
    pub fn repl() -> Self {
        Compiler {
            scopes: Scopes::new(),
            repl: true,
        }
    }

    /// Make a host-defined global visible to later compiles
    pub fn declare_global(&mut self, name: &str) {
        self.scopes.declare_global(name);
    }

    /// Globals declared so far, sorted
    pub fn globals(&self) -> Vec<String> {
        self.scopes.globals()
    }

    /// Compile `source` as module `module_id`
    pub fn compile(&mut self, source: &str, module_id: u32) -> Result<Code, Vec<Diagnostic>> {
        self.compile_inner(source, module_id, None)
    }

    /// Compile `source`, asking `resolver` whether each import was compiled
    /// ahead of time
    pub fn compile_with_resolver(
        &mut self,
        source: &str,
        module_id: u32,
        resolver: &mut dyn ImportResolver,
    ) -> Result<Code, Vec<Diagnostic>> {
        self.compile_inner(source, module_id, Some(resolver))
    }

    fn compile_inner(
        &mut self,
        source: &str,
        module_id: u32,
        resolver: Option<&mut dyn ImportResolver>,
    ) -> Result<Code, Vec<Diagnostic>> {
        let program = Parser::new(source, module_id).parse()?;
        let snapshot = self.scopes.clone();

        let mut generator = BytecodeGenerator::new(&mut self.scopes).with_repl(self.repl);
        if let Some(resolver) = resolver {
            generator = generator.with_resolver(resolver);
        }
        match generator.generate(&program) {
            Ok(code) => {
                debug!(
                    module_id,
                    words = code.instructions.len(),
                    constants = code.constants.len(),
                    "compiled module"
                );
                Ok(code)
            }
            Err(diagnostics) => {
                self.scopes = snapshot;
                Err(diagnostics)
            }
        }
    }
}

impl SourceCompiler for Compiler {
    /// Modules always compile against a fresh global scope.
    fn compile_module(&self, source: &str, module_id: u32) -> Result<Code, Vec<Diagnostic>> {
        Compiler::new().compile(source, module_id)
    }
}
