//! Heap object model
//!
//! Every Bond value is a [`Value`] handle into the context's
//! `Heap<Object>`. [`Object`] is a tagged enum over the builtin kinds plus
//! the generic [`Instance`] and [`NativeInstance`] variants whose behaviour
//! is looked up by name in their struct's method table.

use crate::future::FutureSignal;
use crate::hashmap::BondMap;
use crate::vm::Vm;
use bytecode_system::{Code, FunctionProto};
use core_types::BondResult;
use memory_manager::{GcRef, Trace, Tracer};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Handle to a heap object.
pub type Value = GcRef;

/// Host function callable from Bond. Methods receive their receiver as
/// `args[0]`.
pub type NativeFn = Rc<dyn Fn(&mut Vm<'_>, &[Value]) -> BondResult<Value>>;

/// Constructor of a native struct; receives the struct value itself.
pub type NativeConstructor = Rc<dyn Fn(&mut Vm<'_>, Value, &[Value]) -> BondResult<Value>>;

/// Property getter of a native struct.
pub type NativeGetter = Rc<dyn Fn(&mut Vm<'_>, Value) -> BondResult<Value>>;

/// Property setter of a native struct.
pub type NativeSetter = Rc<dyn Fn(&mut Vm<'_>, Value, Value) -> BondResult<()>>;

/// Host data carried by a [`NativeInstance`].
///
/// Implementors that hold [`Value`]s must report them from `trace`.
pub trait NativeData: Any {
    /// Upcast for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;
    /// Mutable upcast for downcasting to the concrete type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Mark every value held by the data.
    fn trace(&self, _tracer: &mut Tracer<'_>) {}
}

/// A script function closed over its module's globals.
#[derive(Debug, Clone)]
pub struct Function {
    pub proto: Rc<FunctionProto>,
    /// The defining module's globals (a `StringMap`)
    pub globals: Value,
}

/// A host function.
#[derive(Clone)]
pub struct NativeFunction {
    pub name: String,
    pub doc: String,
    pub func: NativeFn,
}

/// A user-defined struct type.
#[derive(Debug, Clone)]
pub struct StructType {
    pub name: String,
    /// Field names in constructor order
    pub fields: Vec<String>,
    /// Method name to `Function`
    pub methods: HashMap<String, Value>,
}

/// An instance of a user-defined struct.
#[derive(Debug, Clone)]
pub struct Instance {
    /// The `Struct` this instance was built from
    pub ty: Value,
    pub fields: HashMap<String, Value>,
}

/// A struct type implemented by the host.
#[derive(Clone)]
pub struct NativeStruct {
    pub name: String,
    pub doc: String,
    pub constructor: Option<NativeConstructor>,
    /// Method name to `NativeFunction` (or any callable)
    pub methods: HashMap<String, Value>,
    pub getters: HashMap<String, NativeGetter>,
    pub setters: HashMap<String, NativeSetter>,
}

/// An instance of a [`NativeStruct`].
pub struct NativeInstance {
    pub ty: Value,
    pub data: Box<dyn NativeData>,
}

/// A loaded module; its exports live in a `StringMap`.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub path: String,
    pub exports: Value,
}

/// A function plus a snapshot of the locals visible where it was created.
#[derive(Debug, Clone)]
pub struct Closure {
    /// The underlying `Function`
    pub function: Value,
    pub upvalues: HashMap<String, Value>,
}

/// Ok or Error tagged value.
#[derive(Debug, Clone, Copy)]
pub struct ResultValue {
    pub is_ok: bool,
    pub value: Value,
}

/// A value that will be delivered later.
#[derive(Debug, Clone, Default)]
pub struct Future {
    pub value: Option<Value>,
    /// Continuations registered with `then`
    pub callbacks: Vec<Value>,
    pub signal: FutureSignal,
}

/// A callable paired with the receiver it was looked up on.
#[derive(Debug, Clone, Copy)]
pub struct BoundMethod {
    pub receiver: Value,
    pub method: Value,
}

/// A heap object.
pub enum Object {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    StringMap(HashMap<String, Value>),
    HashMap(BondMap),
    Function(Function),
    NativeFunction(NativeFunction),
    Struct(StructType),
    Instance(Instance),
    NativeStruct(NativeStruct),
    NativeInstance(NativeInstance),
    Module(Module),
    Closure(Closure),
    Result(ResultValue),
    Future(Future),
    Code(Rc<Code>),
    BoundMethod(BoundMethod),
}

impl Object {
    /// Name of the builtin kind, as reported in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Object::Nil => "Nil",
            Object::Bool(_) => "Bool",
            Object::Int(_) => "Int",
            Object::Float(_) => "Float",
            Object::String(_) => "String",
            Object::List(_) => "List",
            Object::StringMap(_) => "StringMap",
            Object::HashMap(_) => "HashMap",
            Object::Function(_) => "Function",
            Object::NativeFunction(_) => "NativeFunction",
            Object::Struct(_) => "Struct",
            Object::Instance(_) => "Instance",
            Object::NativeStruct(_) => "NativeStruct",
            Object::NativeInstance(_) => "NativeInstance",
            Object::Module(_) => "Module",
            Object::Closure(_) => "Closure",
            Object::Result(_) => "Result",
            Object::Future(_) => "Future",
            Object::Code(_) => "Code",
            Object::BoundMethod(_) => "BoundMethod",
        }
    }

    /// `nil` and `false` are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Object::Nil | Object::Bool(false))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Object::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// True for values that can be called with `CALL`.
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Object::Function(_)
                | Object::NativeFunction(_)
                | Object::Struct(_)
                | Object::NativeStruct(_)
                | Object::Closure(_)
                | Object::BoundMethod(_)
        )
    }
}

impl Trace for Object {
    fn trace(&self, tracer: &mut Tracer<'_>) {
        match self {
            Object::Nil
            | Object::Bool(_)
            | Object::Int(_)
            | Object::Float(_)
            | Object::String(_)
            | Object::NativeFunction(_)
            | Object::Code(_) => {}
            Object::List(items) => items.trace(tracer),
            Object::StringMap(map) => tracer.mark_all(map.values().copied()),
            Object::HashMap(map) => map.trace(tracer),
            Object::Function(f) => tracer.mark(f.globals),
            Object::Struct(s) => tracer.mark_all(s.methods.values().copied()),
            Object::Instance(i) => {
                tracer.mark(i.ty);
                tracer.mark_all(i.fields.values().copied());
            }
            Object::NativeStruct(s) => tracer.mark_all(s.methods.values().copied()),
            Object::NativeInstance(i) => {
                tracer.mark(i.ty);
                i.data.trace(tracer);
            }
            Object::Module(m) => tracer.mark(m.exports),
            Object::Closure(c) => {
                tracer.mark(c.function);
                tracer.mark_all(c.upvalues.values().copied());
            }
            Object::Result(r) => tracer.mark(r.value),
            Object::Future(f) => {
                f.value.trace(tracer);
                f.callbacks.trace(tracer);
            }
            Object::BoundMethod(b) => {
                tracer.mark(b.receiver);
                tracer.mark(b.method);
            }
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Nil => write!(f, "Nil"),
            Object::Bool(b) => write!(f, "Bool({})", b),
            Object::Int(i) => write!(f, "Int({})", i),
            Object::Float(x) => write!(f, "Float({})", x),
            Object::String(s) => write!(f, "String({:?})", s),
            Object::List(items) => f.debug_tuple("List").field(items).finish(),
            Object::Function(func) => write!(f, "Function({})", func.proto.name),
            Object::NativeFunction(func) => write!(f, "NativeFunction({})", func.name),
            Object::Struct(s) => write!(f, "Struct({})", s.name),
            Object::NativeStruct(s) => write!(f, "NativeStruct({})", s.name),
            Object::Module(m) => write!(f, "Module({})", m.name),
            other => write!(f, "{}", other.kind_name()),
        }
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .finish()
    }
}
