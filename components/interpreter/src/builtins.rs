//! Builtin global functions, constructors and per-kind methods.
//!
//! Methods receive their receiver as `args[0]`; the method tables are
//! installed on the immortal type descriptors by [`crate::runtime`].

use crate::object::{NativeConstructor, NativeData, NativeFn, Object, Value};
use crate::vm::Vm;
use core_types::{BondError, BondResult, ErrorKind};
use memory_manager::Tracer;
use std::any::Any;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// `(name, doc, function)` entry of a method table.
pub type MethodDef = (&'static str, &'static str, NativeFn);

fn native(f: impl Fn(&mut Vm<'_>, &[Value]) -> BondResult<Value> + 'static) -> NativeFn {
    Rc::new(f)
}

fn constructor(
    f: impl Fn(&mut Vm<'_>, Value, &[Value]) -> BondResult<Value> + 'static,
) -> NativeConstructor {
    Rc::new(f)
}

/// Check a plain function's argument count.
pub fn expect_args(name: &str, args: &[Value], count: usize) -> BondResult<()> {
    if args.len() != count {
        return Err(BondError::argument_error(format!(
            "{}() takes {} argument{}, got {}",
            name,
            count,
            if count == 1 { "" } else { "s" },
            args.len()
        )));
    }
    Ok(())
}

/// Split a method's arguments into receiver and the rest, checking the count.
pub fn method_args<'a>(
    name: &str,
    args: &'a [Value],
    count: usize,
) -> BondResult<(Value, &'a [Value])> {
    let (receiver, rest) = args
        .split_first()
        .ok_or_else(|| BondError::argument_error(format!("{}() called without a receiver", name)))?;
    expect_args(name, rest, count)?;
    Ok((*receiver, rest))
}

/// Hash of a string key, shared by `String.__hash__` and map hashing.
pub fn hash_str(value: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn generic(message: impl Into<String>) -> BondError {
    BondError::new(ErrorKind::GenericError, message)
}

// =============================================================================
// Global functions
// =============================================================================

pub(crate) fn global_functions() -> Vec<MethodDef> {
    vec![
        ("println", "println(...)", native(|vm, args| write_values(vm, args, "\n"))),
        ("print", "print(...)", native(|vm, args| write_values(vm, args, ""))),
        (
            "type_of",
            "type_of(obj)",
            native(|vm, args| {
                expect_args("type_of", args, 1)?;
                vm.ctx().type_of(args[0])
            }),
        ),
        (
            "instance_of",
            "instance_of(obj, type)",
            native(|vm, args| {
                expect_args("instance_of", args, 2)?;
                let ctx = vm.ctx();
                if !matches!(ctx.get(args[1])?, Object::Struct(_) | Object::NativeStruct(_)) {
                    return Err(BondError::type_error("expected a Type as the second argument"));
                }
                let ty = ctx.type_of(args[0])?;
                Ok(ctx.boolean(ty == args[1]))
            }),
        ),
    ]
}

fn write_values(vm: &mut Vm<'_>, args: &[Value], end: &str) -> BondResult<Value> {
    let ctx = vm.ctx_mut();
    let mut text = args
        .iter()
        .map(|v| ctx.display(*v))
        .collect::<Vec<_>>()
        .join(" ");
    text.push_str(end);
    ctx.write_output(&text)?;
    Ok(ctx.nil())
}

// =============================================================================
// Constructors
// =============================================================================

pub(crate) fn int_new() -> NativeConstructor {
    constructor(|vm, _, args| {
        expect_args("Int", args, 1)?;
        let ctx = vm.ctx_mut();
        let value = match ctx.get(args[0])? {
            Object::Int(i) => *i,
            Object::Float(x) => *x as i64,
            Object::Bool(b) => *b as i64,
            Object::String(s) => s
                .trim()
                .parse()
                .map_err(|_| generic(format!("cannot convert {:?} to Int", s)))?,
            other => {
                return Err(BondError::type_error(format!(
                    "cannot convert {} to Int",
                    other.kind_name()
                )))
            }
        };
        Ok(ctx.int(value))
    })
}

pub(crate) fn float_new() -> NativeConstructor {
    constructor(|vm, _, args| {
        expect_args("Float", args, 1)?;
        let ctx = vm.ctx_mut();
        let value = match ctx.get(args[0])? {
            Object::Int(i) => *i as f64,
            Object::Float(x) => *x,
            Object::String(s) => s
                .trim()
                .parse()
                .map_err(|_| generic(format!("cannot convert {:?} to Float", s)))?,
            other => {
                return Err(BondError::type_error(format!(
                    "cannot convert {} to Float",
                    other.kind_name()
                )))
            }
        };
        Ok(ctx.float(value))
    })
}

pub(crate) fn string_new() -> NativeConstructor {
    constructor(|vm, _, args| {
        expect_args("String", args, 1)?;
        let ctx = vm.ctx_mut();
        let text = ctx.display(args[0]);
        Ok(ctx.string(text))
    })
}

pub(crate) fn bool_new() -> NativeConstructor {
    constructor(|vm, _, args| {
        expect_args("Bool", args, 1)?;
        let ctx = vm.ctx();
        Ok(ctx.boolean(ctx.is_truthy(args[0])))
    })
}

pub(crate) fn list_new() -> NativeConstructor {
    constructor(|vm, _, args| Ok(vm.ctx_mut().list(args.to_vec())))
}

pub(crate) fn nil_new() -> NativeConstructor {
    constructor(|vm, _, args| {
        expect_args("Nil", args, 0)?;
        Ok(vm.ctx().nil())
    })
}

pub(crate) fn hash_map_new() -> NativeConstructor {
    constructor(|vm, _, args| {
        expect_args("HashMap", args, 0)?;
        Ok(vm.ctx_mut().hash_map())
    })
}

pub(crate) fn result_new() -> NativeConstructor {
    constructor(|vm, _, args| {
        expect_args("Result", args, 2)?;
        let ctx = vm.ctx_mut();
        let is_error = match ctx.get(args[1])? {
            Object::Bool(b) => *b,
            other => {
                return Err(BondError::type_error(format!(
                    "Result() expects a Bool error flag, got {}",
                    other.kind_name()
                )))
            }
        };
        Ok(if is_error {
            ctx.error_value(args[0])
        } else {
            ctx.ok(args[0])
        })
    })
}

pub(crate) fn future_new() -> NativeConstructor {
    constructor(|vm, _, args| {
        expect_args("Future", args, 0)?;
        Ok(vm.ctx_mut().future())
    })
}

// =============================================================================
// Scalars and strings
// =============================================================================

pub(crate) fn scalar_methods() -> Vec<MethodDef> {
    vec![
        (
            "__hash__",
            "__hash__() -> Int",
            native(|vm, args| {
                let (receiver, _) = method_args("__hash__", args, 0)?;
                let hash = vm.hash_value(receiver)?;
                Ok(vm.ctx_mut().int(hash as i64))
            }),
        ),
        (
            "__eq__",
            "__eq__(other) -> Bool",
            native(|vm, args| {
                let (receiver, rest) = method_args("__eq__", args, 1)?;
                let equal = vm.values_equal(receiver, rest[0])?;
                Ok(vm.ctx().boolean(equal))
            }),
        ),
    ]
}

pub(crate) fn string_methods() -> Vec<MethodDef> {
    let mut methods = scalar_methods();
    methods.push((
        "size",
        "size() -> Int",
        native(|vm, args| {
            let (receiver, _) = method_args("size", args, 0)?;
            let ctx = vm.ctx_mut();
            let size = ctx.expect_str(receiver)?.chars().count();
            Ok(ctx.int(size as i64))
        }),
    ));
    methods.push((
        "contains",
        "contains(substring: String) -> Bool",
        native(|vm, args| {
            let (receiver, rest) = method_args("contains", args, 1)?;
            let ctx = vm.ctx();
            let found = ctx.expect_str(receiver)?.contains(ctx.expect_str(rest[0])?);
            Ok(ctx.boolean(found))
        }),
    ));
    methods
}

// =============================================================================
// Lists
// =============================================================================

fn list_mut<'a>(vm: &'a mut Vm<'_>, list: Value) -> BondResult<&'a mut Vec<Value>> {
    match vm.ctx_mut().get_mut(list)? {
        Object::List(items) => Ok(items),
        other => Err(BondError::type_error(format!(
            "expected List, got {}",
            other.kind_name()
        ))),
    }
}

pub(crate) fn list_methods() -> Vec<MethodDef> {
    vec![
        (
            "append",
            "append(value)",
            native(|vm, args| {
                let (receiver, rest) = method_args("append", args, 1)?;
                list_mut(vm, receiver)?.push(rest[0]);
                Ok(vm.ctx().nil())
            }),
        ),
        (
            "prepend",
            "prepend(value)",
            native(|vm, args| {
                let (receiver, rest) = method_args("prepend", args, 1)?;
                list_mut(vm, receiver)?.insert(0, rest[0]);
                Ok(vm.ctx().nil())
            }),
        ),
        (
            "pop",
            "pop() -> Any",
            native(|vm, args| {
                let (receiver, _) = method_args("pop", args, 0)?;
                list_mut(vm, receiver)?.pop().ok_or_else(|| {
                    BondError::new(ErrorKind::IndexOutOfBounds, "pop from empty list")
                })
            }),
        ),
        (
            "remove",
            "remove(value)",
            native(|vm, args| {
                let (receiver, rest) = method_args("remove", args, 1)?;
                let items = list_mut(vm, receiver)?.clone();
                for (index, item) in items.into_iter().enumerate() {
                    if vm.values_equal(item, rest[0])? {
                        let items = list_mut(vm, receiver)?;
                        if index < items.len() {
                            items.remove(index);
                        }
                        return Ok(vm.ctx().nil());
                    }
                }
                Err(generic("unable to remove element"))
            }),
        ),
        (
            "clear",
            "clear()",
            native(|vm, args| {
                let (receiver, _) = method_args("clear", args, 0)?;
                list_mut(vm, receiver)?.clear();
                Ok(vm.ctx().nil())
            }),
        ),
        (
            "size",
            "size() -> Int",
            native(|vm, args| {
                let (receiver, _) = method_args("size", args, 0)?;
                let size = list_mut(vm, receiver)?.len();
                Ok(vm.ctx_mut().int(size as i64))
            }),
        ),
        (
            "__iter__",
            "__iter__() -> ListIterator",
            native(|vm, args| {
                let (receiver, _) = method_args("__iter__", args, 0)?;
                list_mut(vm, receiver)?;
                let ctx = vm.ctx_mut();
                let ty = ctx.runtime().types.list_iterator;
                Ok(ctx.native_instance(
                    ty,
                    ListIter {
                        list: receiver,
                        index: 0,
                    },
                ))
            }),
        ),
    ]
}

/// Cursor over a live list.
pub struct ListIter {
    list: Value,
    index: usize,
}

impl NativeData for ListIter {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn trace(&self, tracer: &mut Tracer<'_>) {
        tracer.mark(self.list);
    }
}

pub(crate) fn list_iterator_methods() -> Vec<MethodDef> {
    vec![
        (
            "__has_next__",
            "__has_next__() -> Bool",
            native(|vm, args| {
                let (receiver, _) = method_args("__has_next__", args, 0)?;
                let ctx = vm.ctx();
                let iter = ctx.native_data::<ListIter>(receiver)?;
                let len = match ctx.get(iter.list)? {
                    Object::List(items) => items.len(),
                    _ => 0,
                };
                Ok(ctx.boolean(iter.index < len))
            }),
        ),
        (
            "__next__",
            "__next__() -> Any",
            native(|vm, args| {
                let (receiver, _) = method_args("__next__", args, 0)?;
                let ctx = vm.ctx_mut();
                let (list, index) = {
                    let iter = ctx.native_data_mut::<ListIter>(receiver)?;
                    iter.index += 1;
                    (iter.list, iter.index - 1)
                };
                match ctx.get(list)? {
                    Object::List(items) => items.get(index).copied().ok_or_else(|| {
                        BondError::new(ErrorKind::IndexOutOfBounds, "iterator exhausted")
                    }),
                    other => Err(BondError::type_error(format!(
                        "expected List, got {}",
                        other.kind_name()
                    ))),
                }
            }),
        ),
    ]
}

// =============================================================================
// Maps
// =============================================================================

pub(crate) fn hash_map_methods() -> Vec<MethodDef> {
    vec![
        (
            "size",
            "size() -> Int",
            native(|vm, args| {
                let (receiver, _) = method_args("size", args, 0)?;
                let ctx = vm.ctx_mut();
                let size = match ctx.get(receiver)? {
                    Object::HashMap(map) => map.len(),
                    other => {
                        return Err(BondError::type_error(format!(
                            "expected HashMap, got {}",
                            other.kind_name()
                        )))
                    }
                };
                Ok(ctx.int(size as i64))
            }),
        ),
        (
            "get",
            "get(key) -> Result",
            native(|vm, args| {
                let (receiver, rest) = method_args("get", args, 1)?;
                match vm.map_get(receiver, rest[0])? {
                    Some(value) => Ok(vm.ctx_mut().ok(value)),
                    None => Ok(vm.ctx_mut().error_message("key not found")),
                }
            }),
        ),
        (
            "set",
            "set(key, value)",
            native(|vm, args| {
                let (receiver, rest) = method_args("set", args, 2)?;
                vm.map_set(receiver, rest[0], rest[1])?;
                Ok(vm.ctx().nil())
            }),
        ),
        (
            "contains",
            "contains(key) -> Bool",
            native(|vm, args| {
                let (receiver, rest) = method_args("contains", args, 1)?;
                let found = vm.map_get(receiver, rest[0])?.is_some();
                Ok(vm.ctx().boolean(found))
            }),
        ),
        (
            "remove",
            "remove(key) -> Result",
            native(|vm, args| {
                let (receiver, rest) = method_args("remove", args, 1)?;
                match vm.map_remove(receiver, rest[0])? {
                    Some(value) => Ok(vm.ctx_mut().ok(value)),
                    None => Ok(vm.ctx_mut().error_message("key not found")),
                }
            }),
        ),
        (
            "__iter__",
            "__iter__() -> HashMapIterator",
            native(|vm, args| {
                let (receiver, _) = method_args("__iter__", args, 0)?;
                let ctx = vm.ctx_mut();
                if !matches!(ctx.get(receiver)?, Object::HashMap(_)) {
                    return Err(BondError::type_error("expected HashMap"));
                }
                let ty = ctx.runtime().types.map_iterator;
                Ok(ctx.native_instance(
                    ty,
                    MapIter {
                        map: receiver,
                        slot: 0,
                    },
                ))
            }),
        ),
    ]
}

/// Cursor over the slots of a live `HashMap`; yields `[key, value]` pairs.
pub struct MapIter {
    map: Value,
    slot: usize,
}

impl NativeData for MapIter {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn trace(&self, tracer: &mut Tracer<'_>) {
        tracer.mark(self.map);
    }
}

fn map_next_entry(vm: &Vm<'_>, iter: Value) -> BondResult<Option<(usize, Value, Value)>> {
    let ctx = vm.ctx();
    let cursor = ctx.native_data::<MapIter>(iter)?;
    match ctx.get(cursor.map)? {
        Object::HashMap(map) => Ok(map.next_entry(cursor.slot)),
        _ => Ok(None),
    }
}

pub(crate) fn map_iterator_methods() -> Vec<MethodDef> {
    vec![
        (
            "__has_next__",
            "__has_next__() -> Bool",
            native(|vm, args| {
                let (receiver, _) = method_args("__has_next__", args, 0)?;
                let has_next = map_next_entry(vm, receiver)?.is_some();
                Ok(vm.ctx().boolean(has_next))
            }),
        ),
        (
            "__next__",
            "__next__() -> [key, value]",
            native(|vm, args| {
                let (receiver, _) = method_args("__next__", args, 0)?;
                let (slot, key, value) = map_next_entry(vm, receiver)?.ok_or_else(|| {
                    BondError::new(ErrorKind::IndexOutOfBounds, "iterator exhausted")
                })?;
                let ctx = vm.ctx_mut();
                ctx.native_data_mut::<MapIter>(receiver)?.slot = slot + 1;
                Ok(ctx.list(vec![key, value]))
            }),
        ),
    ]
}

pub(crate) fn string_map_methods() -> Vec<MethodDef> {
    fn entries<'a>(vm: &'a Vm<'_>, map: Value) -> BondResult<&'a HashMap<String, Value>> {
        match vm.ctx().get(map)? {
            Object::StringMap(entries) => Ok(entries),
            other => Err(BondError::type_error(format!(
                "expected StringMap, got {}",
                other.kind_name()
            ))),
        }
    }
    vec![
        (
            "size",
            "size() -> Int",
            native(|vm, args| {
                let (receiver, _) = method_args("size", args, 0)?;
                let size = entries(vm, receiver)?.len();
                Ok(vm.ctx_mut().int(size as i64))
            }),
        ),
        (
            "contains",
            "contains(name: String) -> Bool",
            native(|vm, args| {
                let (receiver, rest) = method_args("contains", args, 1)?;
                let name = vm.ctx().expect_str(rest[0])?.to_string();
                let found = entries(vm, receiver)?.contains_key(&name);
                Ok(vm.ctx().boolean(found))
            }),
        ),
        (
            "get",
            "get(name: String) -> Result",
            native(|vm, args| {
                let (receiver, rest) = method_args("get", args, 1)?;
                let name = vm.ctx().expect_str(rest[0])?.to_string();
                match entries(vm, receiver)?.get(&name).copied() {
                    Some(value) => Ok(vm.ctx_mut().ok(value)),
                    None => Ok(vm.ctx_mut().error_message("key not found")),
                }
            }),
        ),
    ]
}

// =============================================================================
// Results, modules, callables, futures
// =============================================================================

fn result_parts(vm: &Vm<'_>, value: Value) -> BondResult<(bool, Value)> {
    match vm.ctx().get(value)? {
        Object::Result(r) => Ok((r.is_ok, r.value)),
        other => Err(BondError::type_error(format!(
            "expected Result, got {}",
            other.kind_name()
        ))),
    }
}

pub(crate) fn result_methods() -> Vec<MethodDef> {
    vec![
        (
            "is_ok",
            "is_ok() -> Bool",
            native(|vm, args| {
                let (receiver, _) = method_args("is_ok", args, 0)?;
                let (is_ok, _) = result_parts(vm, receiver)?;
                Ok(vm.ctx().boolean(is_ok))
            }),
        ),
        (
            "is_error",
            "is_error() -> Bool",
            native(|vm, args| {
                let (receiver, _) = method_args("is_error", args, 0)?;
                let (is_ok, _) = result_parts(vm, receiver)?;
                Ok(vm.ctx().boolean(!is_ok))
            }),
        ),
        (
            "value",
            "value() -> Any",
            native(|vm, args| {
                let (receiver, _) = method_args("value", args, 0)?;
                match result_parts(vm, receiver)? {
                    (true, value) => Ok(value),
                    (false, _) => Err(generic("Attempted to get value of error Result")),
                }
            }),
        ),
        (
            "error",
            "error() -> Any",
            native(|vm, args| {
                let (receiver, _) = method_args("error", args, 0)?;
                match result_parts(vm, receiver)? {
                    (false, value) => Ok(value),
                    (true, _) => Err(generic("Attempted to get error of value Result")),
                }
            }),
        ),
        (
            "or_else",
            "or_else(else_value: Any) -> Any",
            native(|vm, args| {
                let (receiver, rest) = method_args("or_else", args, 1)?;
                match result_parts(vm, receiver)? {
                    (true, value) => Ok(value),
                    (false, _) => Ok(rest[0]),
                }
            }),
        ),
    ]
}

fn module_exports(vm: &Vm<'_>, module: Value) -> BondResult<Value> {
    match vm.ctx().get(module)? {
        Object::Module(m) => Ok(m.exports),
        other => Err(BondError::type_error(format!(
            "expected Module, got {}",
            other.kind_name()
        ))),
    }
}

pub(crate) fn module_methods() -> Vec<MethodDef> {
    vec![
        (
            "__getattr__",
            "__getattr__(name: String) -> Any",
            native(|vm, args| {
                let (receiver, rest) = method_args("__getattr__", args, 1)?;
                let exports = module_exports(vm, receiver)?;
                let ctx = vm.ctx();
                let name = ctx.expect_str(rest[0])?;
                ctx.map_lookup(exports, name)?.ok_or_else(|| {
                    BondError::attribute_not_found(format!("module has no attribute {}", name))
                })
            }),
        ),
        (
            "get_exports",
            "get_exports() -> StringMap",
            native(|vm, args| {
                let (receiver, _) = method_args("get_exports", args, 0)?;
                module_exports(vm, receiver)
            }),
        ),
    ]
}

pub(crate) fn callable_methods() -> Vec<MethodDef> {
    vec![(
        "__name__",
        "__name__() -> String",
        native(|vm, args| {
            let (receiver, _) = method_args("__name__", args, 0)?;
            let name = vm.callable_name(receiver)?;
            Ok(vm.ctx_mut().string(name))
        }),
    )]
}

pub(crate) fn future_methods() -> Vec<MethodDef> {
    vec![
        (
            "then",
            "then(callback: fn(value))",
            native(|vm, args| {
                let (receiver, rest) = method_args("then", args, 1)?;
                vm.future_then(receiver, rest[0])?;
                Ok(vm.ctx().nil())
            }),
        ),
        (
            "complete",
            "complete(value)",
            native(|vm, args| {
                let (receiver, rest) = method_args("complete", args, 1)?;
                vm.complete_future(receiver, rest[0])?;
                Ok(vm.ctx().nil())
            }),
        ),
        (
            "has_result",
            "has_result() -> Bool",
            native(|vm, args| {
                let (receiver, _) = method_args("has_result", args, 0)?;
                let done = vm.future_result(receiver)?.is_some();
                Ok(vm.ctx().boolean(done))
            }),
        ),
        (
            "get_result",
            "get_result() -> Any",
            native(|vm, args| {
                let (receiver, _) = method_args("get_result", args, 0)?;
                vm.future_result(receiver)?
                    .ok_or_else(|| generic("future has no result yet"))
            }),
        ),
    ]
}
