//! Root sets handed to the collector, and the `core:gc` module.
//!
//! The collector only sees what a [`RootSource`] reports. A context reports
//! its interned strings, memoised modules, precompiled code, futures awaiting
//! host completion and the roots of any VM parked while a nested import VM
//! runs. A VM reports its operand stack, pinned values and every frame.

use crate::call_frame::Frame;
use crate::context::Context;
use crate::event_loop::EventLoop;
use crate::native::NativeModuleBuilder;
use crate::object::Value;
use crate::vm::Vm;
use memory_manager::{RootSource, Tracer};
use std::collections::HashMap;
use tracing::warn;

pub(crate) struct ContextRoots<'a> {
    pub interned: &'a HashMap<String, Value>,
    pub modules: &'a HashMap<String, Value>,
    pub precompiled: &'a HashMap<u32, Value>,
    pub precompiled_modules: &'a HashMap<u32, Value>,
    pub parked: &'a Vec<Vec<Value>>,
    pub event_loop: &'a EventLoop,
}

impl RootSource for ContextRoots<'_> {
    fn trace_roots(&self, tracer: &mut Tracer<'_>) {
        tracer.mark_all(self.interned.values().copied());
        tracer.mark_all(self.modules.values().copied());
        tracer.mark_all(self.precompiled.values().copied());
        tracer.mark_all(self.precompiled_modules.values().copied());
        for roots in self.parked {
            tracer.mark_all(roots.iter().copied());
        }
        tracer.mark_all(self.event_loop.pending_futures());
    }
}

pub(crate) struct VmRoots<'a> {
    pub stack: &'a [Value],
    pub frames: &'a [Frame],
    pub pinned: &'a [Value],
}

impl RootSource for VmRoots<'_> {
    fn trace_roots(&self, tracer: &mut Tracer<'_>) {
        tracer.mark_all(self.stack.iter().copied());
        tracer.mark_all(self.pinned.iter().copied());
        for frame in self.frames {
            frame.trace_roots(tracer);
        }
    }
}

impl RootSource for Vm<'_> {
    fn trace_roots(&self, tracer: &mut Tracer<'_>) {
        VmRoots {
            stack: &self.stack,
            frames: &self.frames,
            pinned: &self.pinned,
        }
        .trace_roots(tracer);
    }
}

/// Initialiser of the builtin `core:gc` module.
pub fn gc_module_init(ctx: &mut Context, path: &str) {
    let module = NativeModuleBuilder::new("gc")
        .function("collect", "collect() -> Int", |vm, args| {
            crate::builtins::expect_args("collect", args, 0)?;
            let freed = vm.collect_garbage().map(|stats| stats.freed).unwrap_or(0);
            Ok(vm.ctx_mut().int(freed as i64))
        })
        .function("stop_gc", "stop_gc()", |vm, args| {
            crate::builtins::expect_args("stop_gc", args, 0)?;
            vm.ctx_mut().heap_mut().pause();
            Ok(vm.ctx().nil())
        })
        .function("resume_gc", "resume_gc()", |vm, args| {
            crate::builtins::expect_args("resume_gc", args, 0)?;
            let heap = vm.ctx_mut().heap_mut();
            if heap.is_paused() {
                heap.resume();
            } else {
                warn!("resume_gc called while collection was not paused");
            }
            Ok(vm.ctx().nil())
        })
        .function(
            "get_allocation_count",
            "get_allocation_count() -> Int",
            |vm, args| {
                crate::builtins::expect_args("get_allocation_count", args, 0)?;
                let count = vm.ctx_mut().heap_mut().allocation_count();
                Ok(vm.ctx_mut().int(count as i64))
            },
        )
        .function(
            "get_allocation_limit",
            "get_allocation_limit() -> Int",
            |vm, args| {
                crate::builtins::expect_args("get_allocation_limit", args, 0)?;
                let limit = vm.ctx_mut().heap_mut().allocation_limit();
                Ok(vm.ctx_mut().int(limit as i64))
            },
        )
        .function(
            "set_allocation_limit",
            "set_allocation_limit(limit: Int)",
            |vm, args| {
                crate::builtins::expect_args("set_allocation_limit", args, 1)?;
                let limit = vm.ctx().expect_int(args[0])?.max(1);
                vm.ctx_mut().heap_mut().set_allocation_limit(limit as usize);
                Ok(vm.ctx().nil())
            },
        )
        .function(
            "get_immortal_count",
            "get_immortal_count() -> Int",
            |vm, args| {
                crate::builtins::expect_args("get_immortal_count", args, 0)?;
                let count = vm.ctx().heap().immortal_count();
                Ok(vm.ctx_mut().int(count as i64))
            },
        )
        .build(ctx, path);
    ctx.add_module(path, module);
}
