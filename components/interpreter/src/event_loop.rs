//! Host event loop
//!
//! Values cannot leave the VM thread, so IO threads deliver plain
//! [`HostValue`]s through a [`Completer`]. The VM thread drains the channel
//! and completes the matching futures, which runs their continuations.

use crate::context::Context;
use crate::object::Value;
use crate::vm::Vm;
use core_types::{BondError, BondResult};
use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use std::collections::HashMap;
use std::thread;
use tracing::debug;

/// A thread-safe value delivered to a future.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<HostValue>),
    /// Delivered as an Error result carrying the message
    Error(String),
}

impl HostValue {
    fn into_value(self, ctx: &mut Context) -> Value {
        match self {
            HostValue::Nil => ctx.nil(),
            HostValue::Bool(b) => ctx.boolean(b),
            HostValue::Int(i) => ctx.int(i),
            HostValue::Float(x) => ctx.float(x),
            HostValue::String(s) => ctx.string(s),
            HostValue::List(items) => {
                let items = items.into_iter().map(|item| item.into_value(ctx)).collect();
                ctx.list(items)
            }
            HostValue::Error(message) => ctx.error_message(message),
        }
    }
}

#[derive(Debug)]
struct Completion {
    id: u64,
    value: HostValue,
}

/// Message delivered when a completer is dropped unused.
pub const DROPPED_COMPLETER_MESSAGE: &str = "host task ended without completing its future";

/// Sending half handed to the host; completes exactly one future.
///
/// Dropping a completer without calling [`Completer::complete`] (including
/// by unwinding out of a panicking host thread) completes the future with
/// an Error result.
#[derive(Debug)]
pub struct Completer {
    id: u64,
    sender: Option<Sender<Completion>>,
}

impl Completer {
    /// Deliver the value. Returns false if the event loop is gone.
    pub fn complete(mut self, value: HostValue) -> bool {
        self.send(value)
    }

    fn send(&mut self, value: HostValue) -> bool {
        match self.sender.take() {
            Some(sender) => sender.send(Completion { id: self.id, value }).is_ok(),
            None => false,
        }
    }
}

impl Drop for Completer {
    fn drop(&mut self) {
        if self.sender.is_some() {
            debug!(id = self.id, "completer dropped without a value");
            self.send(HostValue::Error(DROPPED_COMPLETER_MESSAGE.to_string()));
        }
    }
}

/// Futures waiting on host completions.
pub struct EventLoop {
    sender: Sender<Completion>,
    receiver: Receiver<Completion>,
    pending: HashMap<u64, Value>,
    next_id: u64,
}

impl EventLoop {
    pub fn new() -> Self {
        let (sender, receiver) = channel::unbounded();
        EventLoop {
            sender,
            receiver,
            pending: HashMap::new(),
            next_id: 0,
        }
    }

    /// Track `future` until the host completes it.
    pub fn register(&mut self, future: Value) -> Completer {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert(id, future);
        Completer {
            id,
            sender: Some(self.sender.clone()),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn pending_futures(&self) -> impl Iterator<Item = Value> + '_ {
        self.pending.values().copied()
    }

    /// Deliver every completion already received, without blocking.
    pub fn poll(vm: &mut Vm<'_>) -> BondResult<usize> {
        let receiver = vm.ctx().event_loop().receiver.clone();
        let mut delivered = 0;
        loop {
            match receiver.try_recv() {
                Ok(completion) => {
                    Self::deliver(vm, completion)?;
                    delivered += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        Ok(delivered)
    }

    /// Block until no future is pending, delivering completions as they
    /// arrive.
    pub fn run_until_idle(vm: &mut Vm<'_>) -> BondResult<usize> {
        let receiver = vm.ctx().event_loop().receiver.clone();
        let mut delivered = 0;
        while vm.ctx().event_loop().pending_count() > 0 {
            let completion = receiver
                .recv()
                .map_err(|e| BondError::internal(format!("event loop channel closed: {}", e)))?;
            Self::deliver(vm, completion)?;
            delivered += 1;
        }
        Ok(delivered)
    }

    fn deliver(vm: &mut Vm<'_>, completion: Completion) -> BondResult<()> {
        let future = match vm.ctx().event_loop().pending.get(&completion.id) {
            Some(future) => *future,
            None => return Ok(()),
        };
        debug!(id = completion.id, "delivering host completion");
        let value = completion.value.into_value(vm.ctx_mut());
        // The future stays registered, and so rooted, while callbacks run.
        let result = vm.complete_future(future, value);
        vm.ctx_mut().event_loop_mut().pending.remove(&completion.id);
        result
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl<'ctx> Vm<'ctx> {
    /// Run `work` on a host thread and return a future completed with its
    /// result once the event loop is polled.
    pub fn spawn_host<F>(&mut self, work: F) -> Value
    where
        F: FnOnce() -> HostValue + Send + 'static,
    {
        let future = self.ctx.future();
        let completer = self.ctx.event_loop_mut().register(future);
        thread::spawn(move || {
            completer.complete(work());
        });
        future
    }
}
