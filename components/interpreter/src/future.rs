//! Futures: values delivered later, with `then` continuations.
//!
//! Completion stores the value, wakes anything blocked on the future's
//! [`FutureSignal`] and re-enters the VM to run each registered callback.

use crate::object::{Object, Value};
use crate::vm::Vm;
use core_types::{BondError, BondResult, ErrorKind};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Completion flag that host threads can wait on.
#[derive(Clone, Default)]
pub struct FutureSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl FutureSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark as complete and wake every waiter.
    pub fn notify(&self) {
        let (done, condvar) = &*self.inner;
        *done.lock() = true;
        condvar.notify_all();
    }

    pub fn is_set(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Block until notified.
    pub fn wait(&self) {
        let (done, condvar) = &*self.inner;
        let mut done = done.lock();
        while !*done {
            condvar.wait(&mut done);
        }
    }

    /// Block until notified or `timeout` elapses; true if notified.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (done, condvar) = &*self.inner;
        let mut done = done.lock();
        if !*done {
            condvar.wait_for(&mut done, timeout);
        }
        *done
    }
}

impl fmt::Debug for FutureSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FutureSignal")
            .field("set", &self.is_set())
            .finish()
    }
}

fn not_a_future(object: &Object) -> BondError {
    BondError::type_error(format!("expected Future, got {}", object.kind_name()))
}

impl<'ctx> Vm<'ctx> {
    /// Complete `future` with `value` and run its continuations in order.
    pub fn complete_future(&mut self, future: Value, value: Value) -> BondResult<()> {
        let count = match self.ctx.get_mut(future)? {
            Object::Future(f) => {
                if f.value.is_some() {
                    return Err(BondError::new(
                        ErrorKind::GenericError,
                        "future already completed",
                    ));
                }
                f.value = Some(value);
                f.signal.notify();
                f.callbacks.len()
            }
            other => return Err(not_a_future(other)),
        };
        self.pin(future);
        let result = self.run_callbacks(future, value, count);
        self.unpin(future);
        result
    }

    fn run_callbacks(&mut self, future: Value, value: Value, count: usize) -> BondResult<()> {
        // Callbacks stay in the future (and so stay traced) until all have run.
        for index in 0..count {
            let callback = match self.ctx.get(future)? {
                Object::Future(f) => f.callbacks.get(index).copied(),
                _ => None,
            };
            if let Some(callback) = callback {
                self.call_value(callback, &[value])?;
            }
        }
        if let Object::Future(f) = self.ctx.get_mut(future)? {
            f.callbacks.clear();
        }
        Ok(())
    }

    /// Register a continuation; runs immediately if already complete.
    pub fn future_then(&mut self, future: Value, callback: Value) -> BondResult<()> {
        let ready = match self.ctx.get_mut(future)? {
            Object::Future(f) => match f.value {
                Some(value) => Some(value),
                None => {
                    f.callbacks.push(callback);
                    None
                }
            },
            other => return Err(not_a_future(other)),
        };
        if let Some(value) = ready {
            self.call_value(callback, &[value])?;
        }
        Ok(())
    }

    /// The delivered value, if any.
    pub fn future_result(&self, future: Value) -> BondResult<Option<Value>> {
        match self.ctx.get(future)? {
            Object::Future(f) => Ok(f.value),
            other => Err(not_a_future(other)),
        }
    }

    /// A handle host threads can block on until `future` completes.
    pub fn future_signal(&self, future: Value) -> BondResult<FutureSignal> {
        match self.ctx.get(future)? {
            Object::Future(f) => Ok(f.signal.clone()),
            other => Err(not_a_future(other)),
        }
    }
}
