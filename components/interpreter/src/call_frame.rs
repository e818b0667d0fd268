//! Activation records

use crate::object::Value;
use bytecode_system::Code;
use core_types::{Span, StackFrame};
use memory_manager::Tracer;
use std::collections::HashMap;
use std::rc::Rc;

/// One function activation.
#[derive(Debug, Clone)]
pub struct Frame {
    /// The callee (Function or Closure) being executed
    pub function: Value,
    pub code: Rc<Code>,
    /// Next instruction word
    pub ip: usize,
    /// Start of the instruction being executed, for spans
    pub op_start: usize,
    pub locals: HashMap<String, Value>,
    /// The defining module's globals (a `StringMap`)
    pub globals: Value,
    /// Operand stack height when the frame was entered
    pub stack_base: usize,
    pub name: String,
    /// Top-level frame of a module run; `try` on an error is fatal here
    pub is_module: bool,
}

impl Frame {
    pub fn new(
        function: Value,
        code: Rc<Code>,
        name: impl Into<String>,
        locals: HashMap<String, Value>,
        globals: Value,
        stack_base: usize,
    ) -> Self {
        Frame {
            function,
            code,
            ip: 0,
            op_start: 0,
            locals,
            globals,
            stack_base,
            name: name.into(),
            is_module: false,
        }
    }

    /// Span of the instruction currently executing.
    pub fn current_span(&self) -> Span {
        self.code.span_at(self.op_start)
    }

    pub fn stack_frame(&self) -> StackFrame {
        let span = self.current_span();
        StackFrame::new(self.name.clone(), span.module_id, span.line)
    }

    pub(crate) fn trace_roots(&self, tracer: &mut Tracer<'_>) {
        tracer.mark(self.function);
        tracer.mark(self.globals);
        tracer.mark_all(self.locals.values().copied());
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = Value> + '_ {
        [self.function, self.globals]
            .into_iter()
            .chain(self.locals.values().copied())
    }
}
