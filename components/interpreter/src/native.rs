//! Native extension API
//!
//! A native module is a shared library exporting
//!
//! ```text
//! #[no_mangle]
//! pub fn bond_module_init(ctx: &mut Context, path: &str)
//! ```
//!
//! which builds a module with [`NativeModuleBuilder`] and registers it with
//! [`Context::add_module`] under `path`. Builtin `core:` modules use the same
//! [`ModuleInitFn`] signature without a library.

use crate::context::Context;
use crate::object::{
    NativeConstructor, NativeFn, NativeGetter, NativeSetter, NativeStruct, Object, Value,
};
use crate::vm::Vm;
use core_types::{BondError, BondResult};
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, warn};

/// Entry point of a native module.
pub type ModuleInitFn = fn(&mut Context, &str);

/// Symbol every native library must export.
pub const MODULE_INIT_SYMBOL: &[u8] = b"bond_module_init";

/// Failure to load a native library.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unable to open native library {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: libloading::Error,
    },
    #[error("native library {path} does not export bond_module_init: {source}")]
    MissingEntryPoint {
        path: String,
        #[source]
        source: libloading::Error,
    },
    #[error("native library {path} did not register a module")]
    NoModule { path: String },
}

impl From<LoadError> for BondError {
    fn from(e: LoadError) -> Self {
        BondError::import_error(e.to_string())
    }
}

pub(crate) fn load_library(ctx: &mut Context, path: &Path, alias: &str) -> BondResult<Value> {
    let key = path.to_string_lossy().into_owned();
    // SAFETY: loading runs the library's initialisers; native modules are
    // trusted code by contract.
    let library = unsafe { libloading::Library::new(path) }.map_err(|source| LoadError::Open {
        path: key.clone(),
        source,
    })?;
    let init: ModuleInitFn = unsafe {
        *library
            .get::<ModuleInitFn>(MODULE_INIT_SYMBOL)
            .map_err(|source| LoadError::MissingEntryPoint {
                path: key.clone(),
                source,
            })?
    };
    init(ctx, &key);
    ctx.libraries.push(library);
    match ctx.get_module(&key) {
        Some(module) => {
            debug!(path = %key, alias, "loaded native library");
            Ok(module)
        }
        None => {
            warn!(path = %key, "native library registered no module");
            Err(LoadError::NoModule { path: key }.into())
        }
    }
}

/// Builds the exports of a native module.
///
/// # Examples
///
/// ```
/// use interpreter::{Context, ContextConfig, NativeModuleBuilder};
///
/// fn init(ctx: &mut Context, path: &str) {
///     let module = NativeModuleBuilder::new("math")
///         .function("double", "double(x: Int) -> Int", |vm, args| {
///             let x = vm.ctx().expect_int(args[0])?;
///             Ok(vm.ctx_mut().int(x * 2))
///         })
///         .build(ctx, path);
///     ctx.add_module(path, module);
/// }
///
/// let mut ctx = Context::with_config(ContextConfig::new());
/// ctx.register_native_module("core:math", init);
/// ```
pub struct NativeModuleBuilder {
    name: String,
    functions: Vec<(String, String, NativeFn)>,
    values: Vec<(String, Value)>,
    structs: Vec<NativeStructBuilder>,
}

impl NativeModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        NativeModuleBuilder {
            name: name.into(),
            functions: Vec::new(),
            values: Vec::new(),
            structs: Vec::new(),
        }
    }

    /// Export a host function.
    pub fn function(
        mut self,
        name: &str,
        doc: &str,
        func: impl Fn(&mut Vm<'_>, &[Value]) -> BondResult<Value> + 'static,
    ) -> Self {
        self.functions
            .push((name.to_string(), doc.to_string(), Rc::new(func)));
        self
    }

    /// Export an existing value. It must stay reachable until `build`.
    pub fn value(mut self, name: &str, value: Value) -> Self {
        self.values.push((name.to_string(), value));
        self
    }

    /// Export a native struct.
    pub fn native_struct(mut self, builder: NativeStructBuilder) -> Self {
        self.structs.push(builder);
        self
    }

    /// Allocate the exports and the Module value.
    pub fn build(self, ctx: &mut Context, path: &str) -> Value {
        let mut exports = HashMap::new();
        for (name, doc, func) in self.functions {
            let value = ctx.native_function(name.clone(), doc, func);
            exports.insert(name, value);
        }
        for builder in self.structs {
            let name = builder.name.clone();
            let value = builder.build(ctx);
            exports.insert(name, value);
        }
        for (name, value) in self.values {
            exports.insert(name, value);
        }
        let exports = ctx.string_map(exports);
        ctx.module(&self.name, path, exports)
    }
}

/// Builds a [`NativeStruct`] type.
pub struct NativeStructBuilder {
    name: String,
    doc: String,
    constructor: Option<NativeConstructor>,
    methods: Vec<(String, String, NativeFn)>,
    getters: HashMap<String, NativeGetter>,
    setters: HashMap<String, NativeSetter>,
}

impl NativeStructBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        NativeStructBuilder {
            name: name.into(),
            doc: String::new(),
            constructor: None,
            methods: Vec::new(),
            getters: HashMap::new(),
            setters: HashMap::new(),
        }
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    /// Called with the struct value and the call arguments.
    pub fn constructor(
        mut self,
        func: impl Fn(&mut Vm<'_>, Value, &[Value]) -> BondResult<Value> + 'static,
    ) -> Self {
        self.constructor = Some(Rc::new(func));
        self
    }

    /// A method; the receiver arrives as `args[0]`.
    pub fn method(
        mut self,
        name: &str,
        doc: &str,
        func: impl Fn(&mut Vm<'_>, &[Value]) -> BondResult<Value> + 'static,
    ) -> Self {
        self.methods
            .push((name.to_string(), doc.to_string(), Rc::new(func)));
        self
    }

    pub fn getter(
        mut self,
        name: &str,
        func: impl Fn(&mut Vm<'_>, Value) -> BondResult<Value> + 'static,
    ) -> Self {
        self.getters.insert(name.to_string(), Rc::new(func));
        self
    }

    pub fn setter(
        mut self,
        name: &str,
        func: impl Fn(&mut Vm<'_>, Value, Value) -> BondResult<()> + 'static,
    ) -> Self {
        self.setters.insert(name.to_string(), Rc::new(func));
        self
    }

    /// Allocate the struct type.
    pub fn build(self, ctx: &mut Context) -> Value {
        let methods = self
            .methods
            .into_iter()
            .map(|(name, doc, func)| {
                let value = ctx.native_function(name.clone(), doc, func);
                (name, value)
            })
            .collect();
        ctx.alloc(Object::NativeStruct(NativeStruct {
            name: self.name,
            doc: self.doc,
            constructor: self.constructor,
            methods,
            getters: self.getters,
            setters: self.setters,
        }))
    }
}
