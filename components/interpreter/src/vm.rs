//! Virtual Machine for bytecode execution
//!
//! A [`Vm`] borrows the thread's [`Context`] and owns an operand stack plus
//! a call stack of [`Frame`]s. Execution is a non-preemptive loop over the
//! current frame's instructions (see `dispatch.rs`); each iteration starts
//! at a GC safepoint.

use crate::call_frame::Frame;
use crate::context::Context;
use crate::gc_integration::VmRoots;
use crate::object::{Function, Object, Value};
use bytecode_system::{Code, FunctionProto};
use core_types::{BondError, BondResult, ErrorKind, StackFrame};
use memory_manager::CollectStats;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

/// Maximum number of live frames.
pub const MAX_FRAMES: usize = 1024;

/// Maximum nesting of [`Vm::call_value`] re-entries. Each one runs a nested
/// dispatch loop on the host stack, so it is capped well below
/// [`MAX_FRAMES`].
pub const MAX_REENTRY_DEPTH: usize = 256;

/// Lifecycle of a VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    Idle,
    Running,
    /// The outermost frame returned normally
    Returned,
    /// Stopped by a runtime error; needs [`Vm::reset_error`]
    Halted,
}

/// Bytecode interpreter bound to a [`Context`].
///
/// # Examples
///
/// ```
/// use bytecode_system::{Code, Constant, Opcode};
/// use core_types::Span;
/// use interpreter::{Context, ContextConfig, Vm};
/// use std::rc::Rc;
///
/// let mut code = Code::new();
/// let one = code.add_constant(Constant::Int(1));
/// let two = code.add_constant(Constant::Int(2));
/// code.add_ins_operand(Opcode::LoadConst, one, Span::default());
/// code.add_ins_operand(Opcode::LoadConst, two, Span::default());
/// code.add_ins(Opcode::BinAdd, Span::default());
/// code.add_ins(Opcode::Return, Span::default());
///
/// let mut ctx = Context::with_config(ContextConfig::new());
/// let mut vm = Vm::new(&mut ctx);
/// let result = vm.run(Rc::new(code)).unwrap();
/// assert_eq!(vm.ctx().expect_int(result).unwrap(), 3);
/// ```
pub struct Vm<'ctx> {
    pub(crate) ctx: &'ctx mut Context,
    pub(crate) stack: Vec<Value>,
    pub(crate) frames: Vec<Frame>,
    pub(crate) pinned: Vec<Value>,
    reentry_depth: usize,
    state: VmState,
    error: Option<BondError>,
}

impl<'ctx> Vm<'ctx> {
    pub fn new(ctx: &'ctx mut Context) -> Self {
        Vm {
            ctx,
            stack: Vec::with_capacity(256),
            frames: Vec::with_capacity(64),
            pinned: Vec::new(),
            reentry_depth: 0,
            state: VmState::Idle,
            error: None,
        }
    }

    pub fn ctx(&self) -> &Context {
        &*self.ctx
    }

    pub fn ctx_mut(&mut self) -> &mut Context {
        &mut *self.ctx
    }

    pub fn state(&self) -> VmState {
        self.state
    }

    /// The error that halted the VM, if any.
    pub fn last_error(&self) -> Option<&BondError> {
        self.error.as_ref()
    }

    /// Clear the halted state so the VM can run again.
    pub fn reset_error(&mut self) {
        self.error = None;
        self.stack.clear();
        self.frames.clear();
        self.reentry_depth = 0;
        self.state = VmState::Idle;
    }

    /// Run a module with fresh globals.
    pub fn run(&mut self, code: Rc<Code>) -> BondResult<Value> {
        let globals = self.ctx.string_map(HashMap::new());
        self.run_with_globals(code, globals)
    }

    /// Run a module against an existing globals map (REPL sessions keep one
    /// map across lines). The caller keeps `globals` reachable.
    pub fn run_with_globals(&mut self, code: Rc<Code>, globals: Value) -> BondResult<Value> {
        if self.state == VmState::Halted {
            return Err(BondError::new(
                ErrorKind::GenericError,
                "vm is halted after a runtime error",
            ));
        }
        let proto = Rc::new(FunctionProto {
            name: "<module>".to_string(),
            params: Vec::new(),
            code: code.clone(),
        });
        let function = self.ctx.alloc(Object::Function(Function { proto, globals }));
        let depth = self.frames.len();
        let mut frame = Frame::new(
            function,
            code,
            "<module>",
            HashMap::new(),
            globals,
            self.stack.len(),
        );
        frame.is_module = true;
        self.push_frame(frame)?;
        self.execute(depth)
    }

    /// Call any callable value with `args`. Reentrant: natives and future
    /// callbacks use it to call back into script code.
    pub fn call_value(&mut self, callee: Value, args: &[Value]) -> BondResult<Value> {
        if self.reentry_depth >= MAX_REENTRY_DEPTH {
            return Err(BondError::new(
                ErrorKind::StackOverflow,
                format!("maximum re-entry depth of {} exceeded", MAX_REENTRY_DEPTH),
            ));
        }
        self.reentry_depth += 1;
        let base = self.stack.len();
        let depth = self.frames.len();
        self.stack.push(callee);
        self.stack.extend_from_slice(args);
        let result = match self.invoke(args.len()) {
            Ok(true) => self.execute(depth),
            Ok(false) => self.pop(),
            Err(e) => Err(e),
        };
        self.reentry_depth -= 1;
        if result.is_err() {
            self.stack.truncate(base);
            self.frames.truncate(depth);
        }
        result
    }

    /// Look `name` up on `receiver` and call it.
    pub fn call_method(&mut self, receiver: Value, name: &str, args: &[Value]) -> BondResult<Value> {
        let (method, bind) = self.resolve_method(receiver, name)?;
        if bind {
            let mut full = Vec::with_capacity(args.len() + 1);
            full.push(receiver);
            full.extend_from_slice(args);
            self.call_value(method, &full)
        } else {
            self.call_value(method, args)
        }
    }

    // =========================================================================
    // Roots
    // =========================================================================

    /// Keep `value` alive until [`Vm::unpin`].
    pub fn pin(&mut self, value: Value) {
        self.pinned.push(value);
    }

    pub fn unpin(&mut self, value: Value) {
        if let Some(index) = self.pinned.iter().rposition(|v| *v == value) {
            self.pinned.remove(index);
        }
    }

    /// Collect now, with this VM's roots.
    pub fn collect_garbage(&mut self) -> Option<CollectStats> {
        let Vm {
            ctx,
            stack,
            frames,
            pinned,
            ..
        } = self;
        let roots = VmRoots {
            stack: stack.as_slice(),
            frames: frames.as_slice(),
            pinned: pinned.as_slice(),
        };
        ctx.collect_with(&[&roots])
    }

    /// Every value this VM holds, for parking while another VM runs.
    pub(crate) fn root_values(&self) -> Vec<Value> {
        let mut values = self.stack.clone();
        values.extend_from_slice(&self.pinned);
        for frame in &self.frames {
            values.extend(frame.values());
        }
        values
    }

    // =========================================================================
    // Frames and stack
    // =========================================================================

    /// Live frames, innermost first.
    pub fn stack_trace(&self) -> Vec<StackFrame> {
        self.frames.iter().rev().map(Frame::stack_frame).collect()
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn push_frame(&mut self, frame: Frame) -> BondResult<()> {
        if self.frames.len() >= MAX_FRAMES {
            return Err(BondError::new(
                ErrorKind::StackOverflow,
                format!("maximum call depth of {} exceeded", MAX_FRAMES),
            ));
        }
        self.frames.push(frame);
        Ok(())
    }

    pub(crate) fn frame(&self) -> BondResult<&Frame> {
        self.frames
            .last()
            .ok_or_else(|| BondError::internal("no active frame"))
    }

    pub(crate) fn frame_mut(&mut self) -> BondResult<&mut Frame> {
        self.frames
            .last_mut()
            .ok_or_else(|| BondError::internal("no active frame"))
    }

    pub(crate) fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub(crate) fn pop(&mut self) -> BondResult<Value> {
        self.stack
            .pop()
            .ok_or_else(|| BondError::internal("operand stack underflow"))
    }

    /// Value `depth` slots below the top (0 is the top).
    pub(crate) fn peek(&self, depth: usize) -> BondResult<Value> {
        self.stack
            .len()
            .checked_sub(depth + 1)
            .map(|index| self.stack[index])
            .ok_or_else(|| BondError::internal("operand stack underflow"))
    }

    /// Replace the top `count` values with `value`.
    pub(crate) fn replace_top(&mut self, count: usize, value: Value) -> BondResult<()> {
        let len = self
            .stack
            .len()
            .checked_sub(count)
            .ok_or_else(|| BondError::internal("operand stack underflow"))?;
        self.stack.truncate(len);
        self.stack.push(value);
        Ok(())
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Run until the frame at index `stop_depth` returns.
    pub(crate) fn execute(&mut self, stop_depth: usize) -> BondResult<Value> {
        if stop_depth == 0 {
            self.state = VmState::Running;
        }
        loop {
            if self.ctx.heap.should_collect() {
                self.collect_garbage();
            }
            match self.step(stop_depth) {
                Ok(Some(value)) => {
                    if stop_depth == 0 {
                        self.state = VmState::Returned;
                    }
                    return Ok(value);
                }
                Ok(None) => {}
                Err(e) => return Err(self.fail(e, stop_depth)),
            }
        }
    }

    /// Attach the location and stack trace to `error`, emit one diagnostic
    /// per live frame the first time the error is seen, and unwind to
    /// `stop_depth`.
    fn fail(&mut self, mut error: BondError, stop_depth: usize) -> BondError {
        if error.stack.is_empty() {
            if let Some(frame) = self.frames.last() {
                if error.span.is_none() {
                    error.span = Some(frame.current_span());
                }
            }
            error.stack = self.stack_trace();
            let spans: Vec<_> = self
                .frames
                .iter()
                .rev()
                .map(|frame| (frame.current_span(), frame.name.clone()))
                .collect();
            for (index, (span, name)) in spans.into_iter().enumerate() {
                let message = if index == 0 {
                    error.to_string()
                } else {
                    format!("called from {}", name)
                };
                self.ctx.error(span, message);
            }
        }
        let base = self
            .frames
            .get(stop_depth)
            .map(|frame| frame.stack_base)
            .unwrap_or(self.stack.len());
        self.frames.truncate(stop_depth);
        self.stack.truncate(base);
        if stop_depth == 0 {
            debug!(error = %error, "vm halted");
            let value = self.ctx.error_message(error.message.clone());
            self.stack.push(value);
            self.state = VmState::Halted;
            self.error = Some(error.clone());
        }
        error
    }

    /// Human-readable name of a callable.
    pub fn callable_name(&self, value: Value) -> BondResult<String> {
        Ok(match self.ctx.get(value)? {
            Object::Function(f) => f.proto.name.clone(),
            Object::NativeFunction(f) => f.name.clone(),
            Object::Struct(s) => s.name.clone(),
            Object::NativeStruct(s) => s.name.clone(),
            Object::Closure(c) => return self.callable_name(c.function),
            Object::BoundMethod(b) => return self.callable_name(b.method),
            other => {
                return Err(BondError::type_error(format!(
                    "{} is not callable",
                    other.kind_name()
                )))
            }
        })
    }
}
