//! Runtime wrapper that drives the compiler and the VM for the CLI

use crate::error::{CliError, CliResult};
use bytecode_system::{disassemble, Archive, Code};
use core_types::Diagnostic;
use interpreter::{Context, ContextConfig, EventLoop, Value, Vm};
use memory_manager::GcStats;
use parser::Compiler;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info};

/// Extension of precompiled archives
pub const ARCHIVE_EXTENSION: &str = "bar";

/// Module path under which the session globals are kept alive.
const SESSION_MODULE: &str = "<main>";

/// Owns a [`Context`] plus the state an interactive session keeps between
/// lines: the REPL compiler's scopes and the globals map.
pub struct Runtime {
    ctx: Context,
    compiler: Compiler,
    globals: Value,
    session_id: u32,
}

impl Runtime {
    /// Create a runtime with the given configuration.
    pub fn new(config: ContextConfig) -> Self {
        let mut ctx = Context::with_config(config);
        ctx.set_compiler(Compiler::new());
        let globals = ctx.string_map(HashMap::new());
        let session = ctx.module(SESSION_MODULE, SESSION_MODULE, globals);
        ctx.add_module(SESSION_MODULE, session);
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let session_id = ctx.register_source(cwd.join("<repl>"));
        Runtime {
            ctx,
            compiler: Compiler::repl(),
            globals,
            session_id,
        }
    }

    /// Redirect `print`/`println` output.
    pub fn with_output(mut self, output: Box<dyn Write>) -> Self {
        self.ctx.set_output(output);
        self
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }

    /// Run a `.bd` script or a `.bar` archive.
    pub fn run_file(&mut self, path: &Path) -> CliResult<()> {
        if is_archive(path) {
            return self.run_archive(path);
        }
        let source = fs::read_to_string(path).map_err(|e| CliError::io(path, e))?;
        let canonical = path.canonicalize().map_err(|e| CliError::io(path, e))?;
        let module_id = self.ctx.register_source(canonical);
        let code = Compiler::new()
            .compile(&source, module_id)
            .map_err(|d| compile_error(Some(path), d))?;
        info!(path = %path.display(), "running script");
        self.execute(Rc::new(code), None)?;
        Ok(())
    }

    /// Load an archive and run its entry module.
    pub fn run_archive(&mut self, path: &Path) -> CliResult<()> {
        let archive = Archive::load(path)?;
        let (id, entry) = archive.entry().ok_or_else(|| CliError::io(path, empty_archive()))?;
        let entry = Rc::new(entry.clone());
        self.ctx.load_archive(&archive);
        info!(path = %path.display(), entry = id, modules = archive.len(), "running archive");
        self.execute(entry, None)?;
        Ok(())
    }

    /// Evaluate a standalone program; returns the printed form of a non-nil
    /// result.
    pub fn eval(&mut self, source: &str) -> CliResult<Option<String>> {
        let code = Compiler::repl()
            .compile(source, self.session_id)
            .map_err(|d| compile_error(None, d))?;
        let value = self.execute(Rc::new(code), None)?;
        Ok(self.printable(value))
    }

    /// Evaluate one REPL entry against the session's globals.
    pub fn eval_line(&mut self, source: &str) -> CliResult<Option<String>> {
        let code = self
            .compiler
            .compile(source, self.session_id)
            .map_err(|d| compile_error(None, d))?;
        let value = self.execute(Rc::new(code), Some(self.globals))?;
        Ok(self.printable(value))
    }

    /// Disassembly of a script, or of every module of an archive.
    pub fn disassemble_file(&mut self, path: &Path) -> CliResult<String> {
        if is_archive(path) {
            let archive = Archive::load(path)?;
            let mut out = String::new();
            for (id, code) in archive.modules() {
                out.push_str(&format!("== module {} ==\n", id));
                out.push_str(&disassemble(code));
            }
            return Ok(out);
        }
        let source = fs::read_to_string(path).map_err(|e| CliError::io(path, e))?;
        let code = Compiler::new()
            .compile(&source, 0)
            .map_err(|d| compile_error(Some(path), d))?;
        Ok(disassemble(&code))
    }

    /// Heap statistics for `.gc`.
    pub fn gc_stats(&mut self) -> GcStats {
        self.ctx.gc_stats()
    }

    /// Run `code` in a fresh VM, then drain pending futures. A failed run
    /// leaves the context usable for the next one.
    fn execute(&mut self, code: Rc<Code>, globals: Option<Value>) -> CliResult<Value> {
        let mut vm = Vm::new(&mut self.ctx);
        let result = match globals {
            Some(globals) => vm.run_with_globals(code, globals),
            None => vm.run(code),
        };
        let value = match result {
            Ok(value) => value,
            Err(e) => {
                vm.reset_error();
                return Err(CliError::Runtime(e));
            }
        };
        vm.pin(value);
        let drained = EventLoop::run_until_idle(&mut vm);
        vm.unpin(value);
        let delivered = drained.map_err(CliError::Runtime)?;
        if delivered > 0 {
            debug!(delivered, "event loop drained");
        }
        Ok(value)
    }

    fn printable(&self, value: Value) -> Option<String> {
        if value == self.ctx.nil() {
            None
        } else {
            Some(self.ctx.repr(value))
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(ContextConfig::new())
    }
}

fn is_archive(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ARCHIVE_EXTENSION)
}

fn compile_error(path: Option<&Path>, diagnostics: Vec<Diagnostic>) -> CliError {
    CliError::Compile {
        path: path.map(Path::to_path_buf),
        diagnostics,
    }
}

fn empty_archive() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, "archive has no modules")
}

#[cfg(test)]
mod tests {
    use super::*;
    use interpreter::SharedOutput;

    fn runtime() -> (Runtime, SharedOutput) {
        let out = SharedOutput::new();
        let runtime = Runtime::default().with_output(Box::new(out.clone()));
        (runtime, out)
    }

    #[test]
    fn test_eval_line_keeps_globals() {
        let (mut runtime, _) = runtime();
        assert_eq!(runtime.eval_line("var x = 40;").unwrap(), None);
        assert_eq!(runtime.eval_line("x + 2;").unwrap(), Some("42".to_string()));
    }

    #[test]
    fn test_runtime_error_does_not_poison_session() {
        let (mut runtime, _) = runtime();
        let err = runtime.eval_line("1 / 0;").unwrap_err();
        assert!(matches!(err, CliError::Runtime(_)));
        assert_eq!(runtime.eval_line("1 + 1;").unwrap(), Some("2".to_string()));
    }

    #[test]
    fn test_compile_error_is_reported() {
        let (mut runtime, _) = runtime();
        let err = runtime.eval("var = ;").unwrap_err();
        assert!(matches!(err, CliError::Compile { path: None, .. }));
    }
}
