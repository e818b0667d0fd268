//! Per-thread execution context
//!
//! A [`Context`] owns everything a group of VMs on one thread share: the
//! garbage-collected heap, the runtime singletons, the import tables, the
//! diagnostics sink and the output sink. [`ContextConfig`] carries the
//! tunables and reads its defaults from the environment.

use crate::event_loop::EventLoop;
use crate::gc_integration::ContextRoots;
use crate::hashmap::BondMap;
use crate::native::{self, ModuleInitFn};
use crate::object::{
    Future, Module, NativeData, NativeFn, NativeFunction, NativeInstance, Object, ResultValue,
    Value,
};
use crate::runtime::Runtime;
use bytecode_system::{format_float, Archive, Code, SourceCompiler};
use core_types::{BondError, BondResult, Diagnostic, ErrorKind, Span};
use memory_manager::{CollectStats, GcStats, Heap, RootSource, Tracer, DEFAULT_ALLOCATION_LIMIT};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

/// Environment variable overriding the library search directory.
pub const LIB_PATH_ENV: &str = "BOND_LIB_PATH";

/// Environment variable overriding the initial allocation limit.
pub const GC_LIMIT_ENV: &str = "BOND_GC_LIMIT";

/// Tunables of a [`Context`].
///
/// # Examples
///
/// ```
/// use interpreter::ContextConfig;
///
/// let config = ContextConfig::new()
///     .with_lib_path("/opt/bond/libraries")
///     .with_allocation_limit(4096)
///     .with_trace_execution(false);
/// assert_eq!(config.allocation_limit, 4096);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ContextConfig {
    /// Directory searched first for imports
    pub lib_path: PathBuf,
    /// Initial allocation threshold of each thread storage
    pub allocation_limit: usize,
    /// Emit a `trace!` event per dispatched instruction
    pub trace_execution: bool,
}

impl ContextConfig {
    /// Defaults, overridden by `BOND_LIB_PATH` and `BOND_GC_LIMIT`.
    pub fn new() -> Self {
        let lib_path = std::env::var_os(LIB_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_lib_path);
        let allocation_limit = std::env::var(GC_LIMIT_ENV)
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_ALLOCATION_LIMIT);
        ContextConfig {
            lib_path,
            allocation_limit,
            trace_execution: false,
        }
    }

    /// Set the library search directory.
    pub fn with_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.lib_path = path.into();
        self
    }

    /// Set the initial allocation threshold.
    pub fn with_allocation_limit(mut self, limit: usize) -> Self {
        self.allocation_limit = limit.max(1);
        self
    }

    /// Enable per-instruction tracing.
    pub fn with_trace_execution(mut self, enabled: bool) -> Self {
        self.trace_execution = enabled;
        self
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// `<directory of the running executable>/libraries`
fn default_lib_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("libraries")))
        .unwrap_or_else(|| PathBuf::from("libraries"))
}

/// Clonable in-memory output sink, mainly for capturing `println` in tests.
#[derive(Debug, Clone, Default)]
pub struct SharedOutput(Rc<RefCell<Vec<u8>>>);

impl SharedOutput {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    /// Discard the buffered output.
    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Shared state of every VM running on one thread.
pub struct Context {
    pub(crate) heap: Heap<Object>,
    pub(crate) runtime: Runtime,
    config: ContextConfig,
    pub(crate) interned: HashMap<String, Value>,
    sources: HashMap<u32, PathBuf>,
    next_module_id: u32,
    /// Canonical path (or `core:` name) to Module
    pub(crate) modules: HashMap<String, Value>,
    pub(crate) loading: HashSet<String>,
    /// Precompiled module id to Code value
    pub(crate) precompiled: HashMap<u32, Value>,
    /// Precompiled module id to the Module it produced
    pub(crate) precompiled_modules: HashMap<u32, Value>,
    pub(crate) native_modules: HashMap<String, ModuleInitFn>,
    diagnostics: Vec<Diagnostic>,
    output: Box<dyn Write>,
    compiler: Option<Rc<dyn SourceCompiler>>,
    pub(crate) parked: Vec<Vec<Value>>,
    pub(crate) event_loop: EventLoop,
    // Objects created by a native library must be dropped before it unloads.
    pub(crate) libraries: Vec<libloading::Library>,
}

impl Context {
    /// Create a context with [`ContextConfig::new`].
    pub fn new() -> Self {
        Self::with_config(ContextConfig::new())
    }

    /// Create a context from an explicit configuration.
    pub fn with_config(config: ContextConfig) -> Self {
        let mut heap = Heap::with_allocation_limit(config.allocation_limit);
        let runtime = Runtime::new(&mut heap);
        let mut native_modules: HashMap<String, ModuleInitFn> = HashMap::new();
        native_modules.insert("core:gc".to_string(), crate::gc_integration::gc_module_init);
        debug!(
            lib_path = %config.lib_path.display(),
            allocation_limit = config.allocation_limit,
            "created context"
        );
        Context {
            heap,
            runtime,
            config,
            interned: HashMap::new(),
            sources: HashMap::new(),
            next_module_id: 1,
            modules: HashMap::new(),
            loading: HashSet::new(),
            precompiled: HashMap::new(),
            precompiled_modules: HashMap::new(),
            native_modules,
            diagnostics: Vec::new(),
            output: Box::new(io::stdout()),
            compiler: None,
            parked: Vec::new(),
            event_loop: EventLoop::new(),
            libraries: Vec::new(),
        }
    }

    /// The configuration this context was built with.
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Library search directory.
    pub fn lib_path(&self) -> &Path {
        &self.config.lib_path
    }

    /// Runtime singletons and builtin globals.
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// The heap, for statistics and host-side rooting.
    pub fn heap(&self) -> &Heap<Object> {
        &self.heap
    }

    /// Mutable heap access.
    pub fn heap_mut(&mut self) -> &mut Heap<Object> {
        &mut self.heap
    }

    /// Host event loop delivering values to futures.
    pub fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }

    /// Mutable event loop access.
    pub fn event_loop_mut(&mut self) -> &mut EventLoop {
        &mut self.event_loop
    }

    // =========================================================================
    // Objects
    // =========================================================================

    /// Allocate a collectable object.
    pub fn alloc(&mut self, object: Object) -> Value {
        self.heap.alloc(object)
    }

    /// Resolve a handle.
    pub fn get(&self, value: Value) -> BondResult<&Object> {
        self.heap
            .get(value)
            .ok_or_else(|| BondError::internal(format!("dangling object handle {:?}", value)))
    }

    /// Resolve a handle mutably.
    pub fn get_mut(&mut self, value: Value) -> BondResult<&mut Object> {
        self.heap
            .get_mut(value)
            .ok_or_else(|| BondError::internal(format!("dangling object handle {:?}", value)))
    }

    /// Name of the value's kind (`Int`, `List`, ...).
    pub fn kind_name(&self, value: Value) -> &'static str {
        self.heap
            .get(value)
            .map(Object::kind_name)
            .unwrap_or("<freed>")
    }

    pub fn is_truthy(&self, value: Value) -> bool {
        self.heap.get(value).map(Object::is_truthy).unwrap_or(false)
    }

    pub fn nil(&self) -> Value {
        self.runtime.nil
    }

    pub fn boolean(&self, value: bool) -> Value {
        if value {
            self.runtime.true_value
        } else {
            self.runtime.false_value
        }
    }

    /// Integers 0..=255 come from an immortal cache.
    pub fn int(&mut self, value: i64) -> Value {
        match self.runtime.small_int(value) {
            Some(cached) => cached,
            None => self.alloc(Object::Int(value)),
        }
    }

    pub fn float(&mut self, value: f64) -> Value {
        self.alloc(Object::Float(value))
    }

    /// Allocate a fresh (non-interned) string.
    pub fn string(&mut self, value: impl Into<String>) -> Value {
        self.alloc(Object::String(value.into()))
    }

    /// Return the interned string for `value`, creating it on first use.
    pub fn intern(&mut self, value: &str) -> Value {
        if let Some(found) = self.interned.get(value) {
            return *found;
        }
        let interned = &mut self.interned;
        self.heap.paused(|heap| {
            let string = heap.alloc(Object::String(value.to_string()));
            interned.insert(value.to_string(), string);
            string
        })
    }

    pub fn list(&mut self, items: Vec<Value>) -> Value {
        self.alloc(Object::List(items))
    }

    pub fn string_map(&mut self, entries: HashMap<String, Value>) -> Value {
        self.alloc(Object::StringMap(entries))
    }

    pub fn hash_map(&mut self) -> Value {
        self.alloc(Object::HashMap(BondMap::new()))
    }

    /// An Ok result.
    pub fn ok(&mut self, value: Value) -> Value {
        self.alloc(Object::Result(ResultValue { is_ok: true, value }))
    }

    /// An Error result.
    pub fn error_value(&mut self, value: Value) -> Value {
        self.alloc(Object::Result(ResultValue {
            is_ok: false,
            value,
        }))
    }

    /// An Error result carrying a string message.
    pub fn error_message(&mut self, message: impl Into<String>) -> Value {
        let message = self.string(message);
        self.error_value(message)
    }

    /// A pending future.
    pub fn future(&mut self) -> Value {
        self.alloc(Object::Future(Future::default()))
    }

    pub fn native_function(
        &mut self,
        name: impl Into<String>,
        doc: impl Into<String>,
        func: NativeFn,
    ) -> Value {
        self.alloc(Object::NativeFunction(NativeFunction {
            name: name.into(),
            doc: doc.into(),
            func,
        }))
    }

    /// Wrap host data in an instance of the native struct `ty`.
    pub fn native_instance(&mut self, ty: Value, data: impl NativeData) -> Value {
        self.alloc(Object::NativeInstance(NativeInstance {
            ty,
            data: Box::new(data),
        }))
    }

    /// Host data of a native instance.
    pub fn native_data<T: NativeData>(&self, value: Value) -> BondResult<&T> {
        match self.get(value)? {
            Object::NativeInstance(instance) => instance
                .data
                .as_any()
                .downcast_ref::<T>()
                .ok_or_else(|| BondError::type_error("native instance has unexpected data")),
            other => Err(BondError::type_error(format!(
                "expected a native instance, got {}",
                other.kind_name()
            ))),
        }
    }

    /// Mutable host data of a native instance.
    pub fn native_data_mut<T: NativeData>(&mut self, value: Value) -> BondResult<&mut T> {
        match self.get_mut(value)? {
            Object::NativeInstance(instance) => instance
                .data
                .as_any_mut()
                .downcast_mut::<T>()
                .ok_or_else(|| BondError::type_error("native instance has unexpected data")),
            other => Err(BondError::type_error(format!(
                "expected a native instance, got {}",
                other.kind_name()
            ))),
        }
    }

    /// The Int payload of `value`.
    pub fn expect_int(&self, value: Value) -> BondResult<i64> {
        match self.get(value)? {
            Object::Int(i) => Ok(*i),
            other => Err(BondError::type_error(format!(
                "expected Int, got {}",
                other.kind_name()
            ))),
        }
    }

    /// The String payload of `value`.
    pub fn expect_str(&self, value: Value) -> BondResult<&str> {
        match self.get(value)? {
            Object::String(s) => Ok(s),
            other => Err(BondError::type_error(format!(
                "expected String, got {}",
                other.kind_name()
            ))),
        }
    }

    /// Look a name up in a `StringMap`.
    pub fn map_lookup(&self, map: Value, name: &str) -> BondResult<Option<Value>> {
        match self.get(map)? {
            Object::StringMap(entries) => Ok(entries.get(name).copied()),
            other => Err(BondError::type_error(format!(
                "expected StringMap, got {}",
                other.kind_name()
            ))),
        }
    }

    /// Insert into a `StringMap`.
    pub fn map_insert(&mut self, map: Value, name: &str, value: Value) -> BondResult<()> {
        match self.get_mut(map)? {
            Object::StringMap(entries) => {
                entries.insert(name.to_string(), value);
                Ok(())
            }
            other => Err(BondError::type_error(format!(
                "expected StringMap, got {}",
                other.kind_name()
            ))),
        }
    }

    /// Type descriptor of a value: the struct of an instance, the value
    /// itself for struct types, the builtin descriptor otherwise.
    pub fn type_of(&self, value: Value) -> BondResult<Value> {
        let object = self.get(value)?;
        Ok(match object {
            Object::Instance(instance) => instance.ty,
            Object::NativeInstance(instance) => instance.ty,
            Object::Struct(_) | Object::NativeStruct(_) => value,
            other => self.runtime.types.descriptor_for(other),
        })
    }

    // =========================================================================
    // Printing
    // =========================================================================

    /// Text printed by `println`: strings raw, everything else as [`Context::repr`].
    pub fn display(&self, value: Value) -> String {
        match self.heap.get(value) {
            Some(Object::String(s)) => s.clone(),
            _ => self.repr(value),
        }
    }

    /// Source-like rendering; strings are quoted.
    pub fn repr(&self, value: Value) -> String {
        let mut out = String::new();
        let mut seen = Vec::new();
        self.write_repr(value, &mut out, &mut seen);
        out
    }

    fn write_repr(&self, value: Value, out: &mut String, seen: &mut Vec<Value>) {
        let object = match self.heap.get(value) {
            Some(object) => object,
            None => {
                out.push_str("<freed>");
                return;
            }
        };
        let container = matches!(
            object,
            Object::List(_) | Object::HashMap(_) | Object::StringMap(_) | Object::Instance(_)
        );
        if container {
            if seen.contains(&value) {
                out.push_str("...");
                return;
            }
            seen.push(value);
        }
        match object {
            Object::Nil => out.push_str("nil"),
            Object::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Object::Int(i) => out.push_str(&i.to_string()),
            Object::Float(x) => out.push_str(&format_float(*x)),
            Object::String(s) => out.push_str(&format!("{:?}", s)),
            Object::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_repr(*item, out, seen);
                }
                out.push(']');
            }
            Object::HashMap(map) => {
                out.push('{');
                for (i, (key, item)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_repr(key, out, seen);
                    out.push_str(": ");
                    self.write_repr(item, out, seen);
                }
                out.push('}');
            }
            Object::StringMap(entries) => {
                let mut keys: Vec<&String> = entries.keys().collect();
                keys.sort();
                out.push('{');
                for (i, key) in keys.into_iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&format!("{:?}: ", key));
                    self.write_repr(entries[key], out, seen);
                }
                out.push('}');
            }
            Object::Function(f) => out.push_str(&format!("<function {}>", f.proto.name)),
            Object::NativeFunction(f) => out.push_str(&format!("<native function {}>", f.name)),
            Object::Struct(s) => out.push_str(&format!("<struct {}>", s.name)),
            Object::Instance(instance) => {
                let (name, fields) = match self.heap.get(instance.ty) {
                    Some(Object::Struct(ty)) => (ty.name.as_str(), ty.fields.clone()),
                    _ => ("<struct>", Vec::new()),
                };
                out.push_str(name);
                out.push_str(" {");
                for (i, field) in fields.iter().enumerate() {
                    out.push_str(if i > 0 { ", " } else { " " });
                    out.push_str(field);
                    out.push_str(": ");
                    match instance.fields.get(field) {
                        Some(item) => self.write_repr(*item, out, seen),
                        None => out.push_str("nil"),
                    }
                }
                out.push_str(if fields.is_empty() { "}" } else { " }" });
            }
            Object::NativeStruct(s) => out.push_str(&format!("<native struct {}>", s.name)),
            Object::NativeInstance(instance) => {
                let name = match self.heap.get(instance.ty) {
                    Some(Object::NativeStruct(ty)) => ty.name.as_str(),
                    _ => "native",
                };
                out.push_str(&format!("<{} object>", name));
            }
            Object::Module(m) => out.push_str(&format!("<module {}>", m.name)),
            Object::Closure(c) => {
                let name = match self.heap.get(c.function) {
                    Some(Object::Function(f)) => f.proto.name.as_str(),
                    _ => "<lambda>",
                };
                out.push_str(&format!("<closure {}>", name));
            }
            Object::Result(r) => {
                out.push_str(if r.is_ok { "Ok(" } else { "Error(" });
                self.write_repr(r.value, out, seen);
                out.push(')');
            }
            Object::Future(f) => out.push_str(if f.value.is_some() {
                "<future complete>"
            } else {
                "<future pending>"
            }),
            Object::Code(_) => out.push_str("<code>"),
            Object::BoundMethod(_) => out.push_str("<bound method>"),
        }
        if container {
            seen.pop();
        }
    }

    /// Write to the output sink.
    pub fn write_output(&mut self, text: &str) -> BondResult<()> {
        self.output
            .write_all(text.as_bytes())
            .and_then(|_| self.output.flush())
            .map_err(|e| BondError::new(ErrorKind::GenericError, format!("output error: {}", e)))
    }

    /// Redirect `print`/`println` output.
    pub fn set_output(&mut self, output: Box<dyn Write>) {
        self.output = output;
    }

    // =========================================================================
    // Diagnostics and sources
    // =========================================================================

    /// Record a runtime diagnostic.
    pub fn error(&mut self, span: Span, message: impl Into<String>) {
        let message = message.into();
        debug!(module = span.module_id, line = span.line, "{}", message);
        self.diagnostics.push(Diagnostic::new(span, message));
    }

    /// Diagnostics recorded so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Drain the recorded diagnostics.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Assign a module id to a source file.
    pub fn register_source(&mut self, path: impl Into<PathBuf>) -> u32 {
        let id = self.next_module_id;
        self.next_module_id += 1;
        self.sources.insert(id, path.into());
        id
    }

    /// Source file of a module id, if it came from disk.
    pub fn source_path(&self, module_id: u32) -> Option<&Path> {
        self.sources.get(&module_id).map(PathBuf::as_path)
    }

    /// Install the compiler used for script imports.
    pub fn set_compiler(&mut self, compiler: impl SourceCompiler + 'static) {
        self.compiler = Some(Rc::new(compiler));
    }

    pub(crate) fn compiler(&self) -> Option<Rc<dyn SourceCompiler>> {
        self.compiler.clone()
    }

    // =========================================================================
    // Modules
    // =========================================================================

    /// Register a loaded module under `path` (called by native module init).
    pub fn add_module(&mut self, path: &str, module: Value) {
        self.modules.insert(path.to_string(), module);
    }

    pub fn has_module(&self, path: &str) -> bool {
        self.modules.contains_key(path)
    }

    pub fn get_module(&self, path: &str) -> Option<Value> {
        self.modules.get(path).copied()
    }

    /// Make a native module importable under `name` without a shared library.
    pub fn register_native_module(&mut self, name: impl Into<String>, init: ModuleInitFn) {
        self.native_modules.insert(name.into(), init);
    }

    /// Make every module of `archive` available to `IMPORT_PRE_COMPILED`.
    pub fn load_archive(&mut self, archive: &Archive) {
        for (id, code) in archive.modules() {
            let value = self.alloc(Object::Code(Rc::new(code.clone())));
            self.precompiled.insert(*id, value);
        }
        debug!(modules = archive.len(), "registered precompiled modules");
    }

    pub(crate) fn precompiled_code(&self, id: u32) -> Option<Rc<Code>> {
        let value = self.precompiled.get(&id)?;
        match self.heap.get(*value) {
            Some(Object::Code(code)) => Some(code.clone()),
            _ => None,
        }
    }

    /// Build a Module value.
    pub fn module(&mut self, name: &str, path: &str, exports: Value) -> Value {
        self.alloc(Object::Module(Module {
            name: name.to_string(),
            path: path.to_string(),
            exports,
        }))
    }

    pub(crate) fn load_library(&mut self, path: &Path, alias: &str) -> BondResult<Value> {
        native::load_library(self, path, alias)
    }

    // =========================================================================
    // Collection
    // =========================================================================

    /// Keep the values of a suspended VM alive while another VM runs.
    pub(crate) fn park(&mut self, roots: Vec<Value>) {
        self.parked.push(roots);
    }

    pub(crate) fn unpark(&mut self) {
        self.parked.pop();
    }

    /// Collect with the context's own roots plus `extra`.
    pub fn collect_with(&mut self, extra: &[&dyn RootSource]) -> Option<CollectStats> {
        let Context {
            heap,
            interned,
            modules,
            precompiled,
            precompiled_modules,
            parked,
            event_loop,
            ..
        } = self;
        let roots = ContextRoots {
            interned,
            modules,
            precompiled,
            precompiled_modules,
            parked,
            event_loop,
        };
        let mut sources: Vec<&dyn RootSource> = extra.to_vec();
        sources.push(&roots);
        heap.collect(&sources)
    }

    /// Collect with only the context's roots.
    pub fn collect(&mut self) -> Option<CollectStats> {
        self.collect_with(&[])
    }

    /// Heap statistics.
    pub fn gc_stats(&mut self) -> GcStats {
        self.heap.stats()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl RootSource for Context {
    fn trace_roots(&self, tracer: &mut Tracer<'_>) {
        ContextRoots {
            interned: &self.interned,
            modules: &self.modules,
            precompiled: &self.precompiled,
            precompiled_modules: &self.precompiled_modules,
            parked: &self.parked,
            event_loop: &self.event_loop,
        }
        .trace_roots(tracer);
    }
}
