//! Runtime singletons
//!
//! Everything here is immortal: `nil`, the booleans, the small-int cache,
//! one native struct descriptor per builtin kind (carrying that kind's
//! methods) and the builtin global functions. Immortals are never traced,
//! so they only ever reference other immortals.

use crate::builtins::{self, MethodDef};
use crate::object::{NativeConstructor, NativeFunction, NativeStruct, Object, Value};
use memory_manager::Heap;
use std::collections::HashMap;

/// Largest integer served from the small-int cache.
pub const SMALL_INT_MAX: i64 = 255;

/// Native struct descriptors of the builtin kinds.
#[derive(Debug, Clone)]
pub struct BuiltinTypes {
    pub nil: Value,
    pub bool: Value,
    pub int: Value,
    pub float: Value,
    pub string: Value,
    pub list: Value,
    pub string_map: Value,
    pub hash_map: Value,
    pub function: Value,
    pub native_function: Value,
    pub struct_type: Value,
    pub module: Value,
    pub closure: Value,
    pub result: Value,
    pub future: Value,
    pub code: Value,
    pub bound_method: Value,
    pub list_iterator: Value,
    pub map_iterator: Value,
}

impl BuiltinTypes {
    /// Descriptor for a builtin object. Instances and struct types are
    /// resolved by the caller.
    pub fn descriptor_for(&self, object: &Object) -> Value {
        match object {
            Object::Nil => self.nil,
            Object::Bool(_) => self.bool,
            Object::Int(_) => self.int,
            Object::Float(_) => self.float,
            Object::String(_) => self.string,
            Object::List(_) => self.list,
            Object::StringMap(_) => self.string_map,
            Object::HashMap(_) => self.hash_map,
            Object::Function(_) => self.function,
            Object::NativeFunction(_) => self.native_function,
            Object::Struct(_) | Object::Instance(_) | Object::NativeStruct(_) => self.struct_type,
            Object::NativeInstance(_) => self.struct_type,
            Object::Module(_) => self.module,
            Object::Closure(_) => self.closure,
            Object::Result(_) => self.result,
            Object::Future(_) => self.future,
            Object::Code(_) => self.code,
            Object::BoundMethod(_) => self.bound_method,
        }
    }
}

/// Immortal singletons shared by every VM of a context.
pub struct Runtime {
    pub nil: Value,
    pub true_value: Value,
    pub false_value: Value,
    small_ints: Vec<Value>,
    pub types: BuiltinTypes,
    /// Names visible from every module without a declaration
    pub globals: HashMap<String, Value>,
}

fn descriptor(
    heap: &mut Heap<Object>,
    name: &str,
    constructor: Option<NativeConstructor>,
    methods: Vec<MethodDef>,
) -> Value {
    let methods = methods
        .into_iter()
        .map(|(method, doc, func)| {
            let value = heap.alloc_immortal(Object::NativeFunction(NativeFunction {
                name: method.to_string(),
                doc: doc.to_string(),
                func,
            }));
            (method.to_string(), value)
        })
        .collect();
    heap.alloc_immortal(Object::NativeStruct(NativeStruct {
        name: name.to_string(),
        doc: String::new(),
        constructor,
        methods,
        getters: HashMap::new(),
        setters: HashMap::new(),
    }))
}

impl Runtime {
    pub(crate) fn new(heap: &mut Heap<Object>) -> Self {
        let nil = heap.alloc_immortal(Object::Nil);
        let true_value = heap.alloc_immortal(Object::Bool(true));
        let false_value = heap.alloc_immortal(Object::Bool(false));
        let small_ints = (0..=SMALL_INT_MAX)
            .map(|i| heap.alloc_immortal(Object::Int(i)))
            .collect();

        let types = BuiltinTypes {
            nil: descriptor(heap, "Nil", Some(builtins::nil_new()), builtins::scalar_methods()),
            bool: descriptor(heap, "Bool", Some(builtins::bool_new()), builtins::scalar_methods()),
            int: descriptor(heap, "Int", Some(builtins::int_new()), builtins::scalar_methods()),
            float: descriptor(heap, "Float", Some(builtins::float_new()), builtins::scalar_methods()),
            string: descriptor(heap, "String", Some(builtins::string_new()), builtins::string_methods()),
            list: descriptor(heap, "List", Some(builtins::list_new()), builtins::list_methods()),
            string_map: descriptor(heap, "StringMap", None, builtins::string_map_methods()),
            hash_map: descriptor(heap, "HashMap", Some(builtins::hash_map_new()), builtins::hash_map_methods()),
            function: descriptor(heap, "Function", None, builtins::callable_methods()),
            native_function: descriptor(heap, "NativeFunction", None, builtins::callable_methods()),
            struct_type: descriptor(heap, "Struct", None, Vec::new()),
            module: descriptor(heap, "Module", None, builtins::module_methods()),
            closure: descriptor(heap, "Closure", None, builtins::callable_methods()),
            result: descriptor(heap, "Result", Some(builtins::result_new()), builtins::result_methods()),
            future: descriptor(heap, "Future", Some(builtins::future_new()), builtins::future_methods()),
            code: descriptor(heap, "Code", None, Vec::new()),
            bound_method: descriptor(heap, "BoundMethod", None, builtins::callable_methods()),
            list_iterator: descriptor(heap, "ListIterator", None, builtins::list_iterator_methods()),
            map_iterator: descriptor(heap, "HashMapIterator", None, builtins::map_iterator_methods()),
        };

        let mut globals = HashMap::new();
        for (name, doc, func) in builtins::global_functions() {
            let value = heap.alloc_immortal(Object::NativeFunction(NativeFunction {
                name: name.to_string(),
                doc: doc.to_string(),
                func,
            }));
            globals.insert(name.to_string(), value);
        }
        for (name, ty) in [
            ("Int", types.int),
            ("Float", types.float),
            ("String", types.string),
            ("Bool", types.bool),
            ("List", types.list),
            ("Nil", types.nil),
            ("Future", types.future),
        ] {
            globals.insert(name.to_string(), ty);
        }

        Runtime {
            nil,
            true_value,
            false_value,
            small_ints,
            types,
            globals,
        }
    }

    /// Cached handle for `value` if it is in `0..=SMALL_INT_MAX`.
    pub fn small_int(&self, value: i64) -> Option<Value> {
        if (0..=SMALL_INT_MAX).contains(&value) {
            self.small_ints.get(value as usize).copied()
        } else {
            None
        }
    }

    /// A builtin global by name.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.get(name).copied()
    }
}
