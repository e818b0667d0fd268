//! Bond interpreter
//!
//! This crate provides the runtime half of Bond:
//! - Heap object model ([`Object`], [`Value`]) on a mark-sweep [`memory_manager::Heap`]
//! - Builtin types with name-based operator slots
//! - A stack-based [`Vm`] with explicit frames, Result/`try` and iteration
//! - Module imports (scripts, native libraries, packages, `core:` modules, archives)
//! - Futures completed from host threads through the [`EventLoop`]
//! - A builder API for native extension modules
//!
//! # Example
//!
//! ```
//! use interpreter::{Context, Vm};
//! use bytecode_system::{Code, Constant, Opcode};
//! use core_types::Span;
//! use std::rc::Rc;
//!
//! let mut code = Code::new();
//! let idx = code.add_constant(Constant::Int(42));
//! code.add_ins_operand(Opcode::LoadConst, idx, Span::default());
//! code.add_ins(Opcode::Return, Span::default());
//!
//! let mut ctx = Context::new();
//! let mut vm = Vm::new(&mut ctx);
//! let result = vm.run(Rc::new(code)).unwrap();
//! assert_eq!(vm.ctx().expect_int(result).unwrap(), 42);
//! ```

#![warn(clippy::all)]

pub mod builtins;
pub mod call_frame;
pub mod context;
pub mod dispatch;
pub mod event_loop;
pub mod future;
pub mod gc_integration;
pub mod hashmap;
pub mod import;
pub mod native;
pub mod object;
pub mod operators;
pub mod runtime;
pub mod vm;

// Re-export main types at crate root
pub use call_frame::Frame;
pub use context::{Context, ContextConfig, SharedOutput, GC_LIMIT_ENV, LIB_PATH_ENV};
pub use event_loop::{Completer, EventLoop, HostValue};
pub use future::FutureSignal;
pub use gc_integration::gc_module_init;
pub use hashmap::BondMap;
pub use import::{resolve_import, ModuleKind, ResolvedModule, SOURCE_EXTENSION};
pub use native::{LoadError, ModuleInitFn, NativeModuleBuilder, NativeStructBuilder};
pub use object::{NativeData, NativeFn, Object, Value};
pub use runtime::{BuiltinTypes, Runtime};
pub use vm::{Vm, VmState, MAX_FRAMES, MAX_REENTRY_DEPTH};
