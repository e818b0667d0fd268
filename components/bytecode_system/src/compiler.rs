//! The seam between the front end and the runtime

use crate::code::Code;
use core_types::Diagnostic;

/// Turns Bond source text into a [`Code`] object.
///
/// The import runtime compiles script modules through this trait, so the
/// interpreter does not depend on a concrete front end.
pub trait SourceCompiler {
    /// Compile a whole module. `module_id` is stamped into every span.
    fn compile_module(&self, source: &str, module_id: u32) -> Result<Code, Vec<Diagnostic>>;
}
