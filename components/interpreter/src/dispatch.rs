//! Dispatch loop for bytecode execution
//!
//! Handles individual opcode execution, the call protocol and attribute and
//! item access. Operator semantics live in `operators.rs`.

use crate::call_frame::Frame;
use crate::object::{BoundMethod, Closure, Function, Instance, Object, StructType, Value};
use crate::vm::Vm;
use bytecode_system::{Code, Constant, FunctionProto, Opcode};
use core_types::{BondError, BondResult, ErrorKind};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::trace;

fn arity_error(name: &str, expected: usize, got: usize) -> BondError {
    BondError::argument_error(format!(
        "{} takes {} argument{}, got {}",
        name,
        expected,
        if expected == 1 { "" } else { "s" },
        got
    ))
}

impl<'ctx> Vm<'ctx> {
    /// Execute one instruction. Returns the result once the frame at
    /// `stop_depth` returns.
    pub(crate) fn step(&mut self, stop_depth: usize) -> BondResult<Option<Value>> {
        let (code, op, operand) = {
            let frame = self.frame_mut()?;
            let code = frame.code.clone();
            let offset = frame.ip;
            let word = *code
                .instructions
                .get(offset)
                .ok_or_else(|| BondError::internal("instruction pointer out of range"))?;
            let op = Opcode::from_u32(word)
                .ok_or_else(|| BondError::internal(format!("unknown opcode {}", word)))?;
            frame.op_start = offset;
            frame.ip = offset + 1;
            let mut operand = 0;
            if op.has_operand() {
                operand = *code
                    .instructions
                    .get(offset + 1)
                    .ok_or_else(|| BondError::internal("truncated instruction"))?;
                frame.ip += 1;
            }
            (code, op, operand)
        };
        if self.ctx.config().trace_execution {
            trace!(
                depth = self.frames.len(),
                offset = self.frame()?.op_start,
                op = op.name(),
                operand,
                stack = self.stack.len(),
                "dispatch"
            );
        }

        match op {
            Opcode::LoadConst => {
                let value = self.constant_value(&code, operand)?;
                self.push(value);
            }
            Opcode::PushTrue => self.push(self.ctx.runtime().true_value),
            Opcode::PushFalse => self.push(self.ctx.runtime().false_value),
            Opcode::PushNil => self.push(self.ctx.nil()),
            Opcode::PopTop => {
                self.pop()?;
            }

            // Variables
            Opcode::LoadGlobal => {
                let name = identifier(&code, operand)?;
                let globals = self.frame()?.globals;
                let value = match self.ctx.map_lookup(globals, name)? {
                    Some(value) => value,
                    None => self.ctx.runtime().global(name).ok_or_else(|| {
                        BondError::name_error(format!("Global variable {} does not exist", name))
                    })?,
                };
                self.push(value);
            }
            Opcode::StoreGlobal => {
                let name = identifier(&code, operand)?;
                let value = self.peek(0)?;
                let globals = self.frame()?.globals;
                if self.ctx.map_lookup(globals, name)?.is_none() {
                    return Err(BondError::name_error(format!(
                        "Global variable {} does not exist",
                        name
                    )));
                }
                self.ctx.map_insert(globals, name, value)?;
            }
            Opcode::CreateGlobal => {
                let name = identifier(&code, operand)?;
                let value = self.pop()?;
                let globals = self.frame()?.globals;
                self.ctx.map_insert(globals, name, value)?;
            }
            Opcode::LoadFast => {
                let name = identifier(&code, operand)?;
                let value = self.frame()?.locals.get(name).copied().ok_or_else(|| {
                    BondError::name_error(format!("Local variable {} does not exist", name))
                })?;
                self.push(value);
            }
            Opcode::StoreFast => {
                let name = identifier(&code, operand)?;
                let value = self.peek(0)?;
                match self.frame_mut()?.locals.get_mut(name) {
                    Some(slot) => *slot = value,
                    None => {
                        return Err(BondError::name_error(format!(
                            "Local variable {} does not exist",
                            name
                        )))
                    }
                }
            }
            Opcode::CreateLocal => {
                let name = identifier(&code, operand)?;
                let value = self.pop()?;
                self.frame_mut()?.locals.insert(name.to_string(), value);
            }

            // Operators
            Opcode::BinAdd
            | Opcode::BinSub
            | Opcode::BinMul
            | Opcode::BinDiv
            | Opcode::BinMod
            | Opcode::BitOr
            | Opcode::BitXor
            | Opcode::BitAnd
            | Opcode::Lt
            | Opcode::Le
            | Opcode::Gt
            | Opcode::Ge
            | Opcode::Eq
            | Opcode::Ne => {
                let right = self.peek(0)?;
                let left = self.peek(1)?;
                let result = self.binary_op(op, left, right)?;
                self.replace_top(2, result)?;
            }
            Opcode::Or | Opcode::And => {
                let right = self.ctx.is_truthy(self.peek(0)?);
                let left = self.ctx.is_truthy(self.peek(1)?);
                let result = if op == Opcode::Or {
                    left || right
                } else {
                    left && right
                };
                let value = self.ctx.boolean(result);
                self.replace_top(2, value)?;
            }
            Opcode::Not => {
                let truthy = self.ctx.is_truthy(self.peek(0)?);
                let value = self.ctx.boolean(!truthy);
                self.replace_top(1, value)?;
            }
            Opcode::UnarySub => {
                let value = self.negate(self.peek(0)?)?;
                self.replace_top(1, value)?;
            }

            // Containers
            Opcode::BuildList => {
                let count = operand as usize;
                let start = self.stack_start(count)?;
                let items = self.stack[start..].to_vec();
                let list = self.ctx.list(items);
                self.stack.truncate(start);
                self.push(list);
            }
            Opcode::BuildDict => {
                let count = operand as usize;
                let start = self.stack_start(count * 2)?;
                let map = self.ctx.hash_map();
                self.pin(map);
                let pairs = self.stack[start..].to_vec();
                let result = pairs
                    .chunks(2)
                    .try_for_each(|pair| self.map_set(map, pair[0], pair[1]));
                self.unpin(map);
                result?;
                self.stack.truncate(start);
                self.push(map);
            }
            Opcode::GetItem => {
                let index = self.peek(0)?;
                let target = self.peek(1)?;
                let value = self.get_item(target, index)?;
                self.replace_top(2, value)?;
            }
            Opcode::SetItem => {
                let value = self.peek(0)?;
                let index = self.peek(1)?;
                let target = self.peek(2)?;
                self.set_item(target, index, value)?;
                self.replace_top(3, value)?;
            }
            Opcode::GetAttribute => {
                let name = identifier(&code, operand)?;
                let target = self.peek(0)?;
                let value = self.get_attribute(target, name)?;
                self.replace_top(1, value)?;
            }
            Opcode::SetAttribute => {
                let name = identifier(&code, operand)?;
                let value = self.peek(0)?;
                let target = self.peek(1)?;
                self.set_attribute(target, name, value)?;
                self.replace_top(2, value)?;
            }
            Opcode::UnpackSeq => {
                let count = operand as usize;
                let items = match self.ctx.get(self.peek(0)?)? {
                    Object::List(items) if items.len() == count => items.clone(),
                    Object::List(items) => {
                        return Err(BondError::type_error(format!(
                            "expected {} values to unpack, got {}",
                            count,
                            items.len()
                        )))
                    }
                    other => {
                        return Err(BondError::type_error(format!(
                            "cannot unpack {}",
                            other.kind_name()
                        )))
                    }
                };
                self.pop()?;
                self.stack.extend(items);
            }

            // Control flow
            Opcode::Jump | Opcode::Break | Opcode::Continue => {
                self.jump(operand)?;
            }
            Opcode::JumpIfFalse => {
                let cond = self.pop()?;
                if !self.ctx.is_truthy(cond) {
                    self.jump(operand)?;
                }
            }
            Opcode::Iter => {
                let iterable = self.peek(0)?;
                let iterator = self.call_method(iterable, "__iter__", &[])?;
                self.replace_top(1, iterator)?;
            }
            Opcode::IterEnd => {
                let iterator = self.peek(0)?;
                let has_next = self.call_method(iterator, "__has_next__", &[])?;
                if !self.ctx.is_truthy(has_next) {
                    self.jump(operand)?;
                }
            }
            Opcode::IterNext => {
                let name = identifier(&code, operand)?;
                let iterator = self.peek(0)?;
                let value = self.call_method(iterator, "__next__", &[])?;
                self.frame_mut()?.locals.insert(name.to_string(), value);
            }
            Opcode::Return => {
                let value = self.pop()?;
                let frame = self
                    .frames
                    .pop()
                    .ok_or_else(|| BondError::internal("return without a frame"))?;
                self.stack.truncate(frame.stack_base);
                if self.frames.len() <= stop_depth {
                    return Ok(Some(value));
                }
                self.push(value);
            }

            // Calls and definitions
            Opcode::Call => {
                self.invoke(operand as usize)?;
            }
            Opcode::CallMethod => {
                let argc = operand as usize;
                let receiver = self.peek(argc + 1)?;
                let name_value = self.peek(argc)?;
                let name = self.ctx.expect_str(name_value)?.to_string();
                let (method, bind) = self.resolve_method(receiver, &name)?;
                let receiver_index = self.stack.len() - argc - 2;
                if bind {
                    self.stack[receiver_index] = method;
                    self.stack[receiver_index + 1] = receiver;
                    self.invoke(argc + 1)?;
                } else {
                    self.stack[receiver_index] = method;
                    self.stack.remove(receiver_index + 1);
                    self.invoke(argc)?;
                }
            }
            Opcode::CreateFunction => {
                let proto = function_constant(&code, operand)?;
                let globals = self.frame()?.globals;
                let function = self.ctx.alloc(Object::Function(Function { proto, globals }));
                self.push(function);
            }
            Opcode::CreateClosure => {
                let proto = function_constant(&code, operand)?;
                let name = proto.name.clone();
                let closure = self.make_closure(proto)?;
                if let Object::Closure(c) = self.ctx.get_mut(closure)? {
                    c.upvalues.insert(name.clone(), closure);
                }
                self.frame_mut()?.locals.insert(name, closure);
            }
            Opcode::CreateClosureEx => {
                let proto = function_constant(&code, operand)?;
                let closure = self.make_closure(proto)?;
                self.push(closure);
            }
            Opcode::CreateStruct => {
                let value = match code.constants.get(operand as usize) {
                    Some(Constant::Struct(proto)) => {
                        let globals = self.frame()?.globals;
                        self.make_struct(proto.name.clone(), proto.fields.clone(), &proto.methods, globals)
                    }
                    _ => return Err(BondError::internal("CREATE_STRUCT expects a struct constant")),
                };
                self.push(value);
            }

            // Results
            Opcode::MakeOk | Opcode::MakeError => {
                let inner = self.peek(0)?;
                let result = if op == Opcode::MakeOk {
                    self.ctx.ok(inner)
                } else {
                    self.ctx.error_value(inner)
                };
                self.replace_top(1, result)?;
            }
            Opcode::Try => {
                let value = self.peek(0)?;
                let (is_ok, inner) = match self.ctx.get(value)? {
                    Object::Result(r) => (r.is_ok, r.value),
                    other => {
                        return Err(BondError::type_error(format!(
                            "try expects a Result, got {}",
                            other.kind_name()
                        )))
                    }
                };
                if is_ok {
                    self.replace_top(1, inner)?;
                    self.jump(operand)?;
                } else if self.frame()?.is_module {
                    return Err(BondError::new(
                        ErrorKind::GenericError,
                        self.ctx.display(inner),
                    ));
                }
                // An Error stays on the stack for the RETURN that follows.
            }

            // Modules
            Opcode::Import => {
                let alias = identifier(&code, operand)?;
                let path = self.ctx.expect_str(self.peek(0)?)?.to_string();
                let module = self.import(&path)?;
                let globals = self.frame()?.globals;
                self.ctx.map_insert(globals, alias, module)?;
                self.pop()?;
            }
            Opcode::ImportPreCompiled => {
                let alias = self.ctx.expect_str(self.peek(0)?)?.to_string();
                let module = self.import_precompiled(operand)?;
                let globals = self.frame()?.globals;
                self.ctx.map_insert(globals, &alias, module)?;
                self.pop()?;
            }
        }
        Ok(None)
    }

    fn jump(&mut self, target: u32) -> BondResult<()> {
        self.frame_mut()?.ip = target as usize;
        Ok(())
    }

    fn stack_start(&self, count: usize) -> BondResult<usize> {
        self.stack
            .len()
            .checked_sub(count)
            .ok_or_else(|| BondError::internal("operand stack underflow"))
    }

    fn constant_value(&mut self, code: &Code, index: u32) -> BondResult<Value> {
        let constant = code
            .constants
            .get(index as usize)
            .ok_or_else(|| BondError::internal(format!("constant {} out of range", index)))?;
        Ok(match constant {
            Constant::Int(i) => self.ctx.int(*i),
            Constant::Float(x) => self.ctx.float(*x),
            Constant::String(s) => self.ctx.intern(s),
            Constant::Function(proto) => {
                let globals = self.frame()?.globals;
                self.ctx.alloc(Object::Function(Function {
                    proto: proto.clone(),
                    globals,
                }))
            }
            Constant::Struct(proto) => {
                let globals = self.frame()?.globals;
                self.make_struct(proto.name.clone(), proto.fields.clone(), &proto.methods, globals)
            }
        })
    }

    fn make_struct(
        &mut self,
        name: String,
        fields: Vec<String>,
        methods: &[(String, Rc<FunctionProto>)],
        globals: Value,
    ) -> Value {
        let methods = methods
            .iter()
            .map(|(method, proto)| {
                let function = self.ctx.alloc(Object::Function(Function {
                    proto: proto.clone(),
                    globals,
                }));
                (method.clone(), function)
            })
            .collect();
        self.ctx.alloc(Object::Struct(StructType {
            name,
            fields,
            methods,
        }))
    }

    /// A closure over a snapshot of the current frame's locals.
    fn make_closure(&mut self, proto: Rc<FunctionProto>) -> BondResult<Value> {
        let (globals, upvalues) = {
            let frame = self.frame()?;
            (frame.globals, frame.locals.clone())
        };
        let function = self.ctx.alloc(Object::Function(Function { proto, globals }));
        Ok(self.ctx.alloc(Object::Closure(Closure { function, upvalues })))
    }

    // =========================================================================
    // Call protocol
    // =========================================================================

    /// Call the callee sitting below `argc` arguments on the stack.
    ///
    /// Script callees get a new frame (and `true` is returned); everything
    /// else runs to completion and leaves its result in place of the callee
    /// and arguments.
    pub(crate) fn invoke(&mut self, argc: usize) -> BondResult<bool> {
        let callee_index = self.stack_start(argc + 1)?;
        let callee = self.stack[callee_index];
        let args = self.stack[callee_index + 1..].to_vec();
        let (function, mut locals) = match self.ctx.get(callee)? {
            Object::Function(_) => (callee, HashMap::new()),
            Object::Closure(c) => (c.function, c.upvalues.clone()),
            Object::NativeFunction(native) => {
                let func = native.func.clone();
                let result = func(self, &args)?;
                self.stack.truncate(callee_index);
                self.push(result);
                return Ok(false);
            }
            Object::Struct(ty) => {
                if ty.fields.len() != argc {
                    return Err(arity_error(&ty.name, ty.fields.len(), argc));
                }
                let fields = ty.fields.iter().cloned().zip(args).collect();
                let instance = self.ctx.alloc(Object::Instance(Instance {
                    ty: callee,
                    fields,
                }));
                self.stack.truncate(callee_index);
                self.push(instance);
                return Ok(false);
            }
            Object::NativeStruct(ty) => {
                let constructor = ty.constructor.clone().ok_or_else(|| {
                    BondError::type_error(format!("{} cannot be constructed", ty.name))
                })?;
                let result = constructor(self, callee, &args)?;
                self.stack.truncate(callee_index);
                self.push(result);
                return Ok(false);
            }
            Object::BoundMethod(BoundMethod { receiver, method }) => {
                let (receiver, method) = (*receiver, *method);
                self.stack[callee_index] = method;
                self.stack.insert(callee_index + 1, receiver);
                return self.invoke(argc + 1);
            }
            other => {
                return Err(BondError::type_error(format!(
                    "{} is not callable",
                    other.kind_name()
                )))
            }
        };

        let (proto, globals) = match self.ctx.get(function)? {
            Object::Function(f) => (f.proto.clone(), f.globals),
            other => {
                return Err(BondError::internal(format!(
                    "closure wraps {}",
                    other.kind_name()
                )))
            }
        };
        if proto.arity() != argc {
            return Err(arity_error(&proto.name, proto.arity(), argc));
        }
        for (param, arg) in proto.params.iter().zip(args) {
            locals.insert(param.name.clone(), arg);
        }
        self.stack.truncate(callee_index);
        let frame = Frame::new(
            callee,
            proto.code.clone(),
            proto.name.clone(),
            locals,
            globals,
            callee_index,
        );
        self.push_frame(frame)?;
        Ok(true)
    }

    /// Find `name` on `receiver` for a method call. The flag says whether
    /// the receiver must be passed as the first argument.
    pub(crate) fn resolve_method(&mut self, receiver: Value, name: &str) -> BondResult<(Value, bool)> {
        let object = self.ctx.get(receiver)?;
        match object {
            Object::Instance(instance) => {
                if let Some(field) = instance.fields.get(name) {
                    return Ok((*field, false));
                }
                if let Some(method) = self.struct_method(instance.ty, name)? {
                    return Ok((method, true));
                }
            }
            Object::NativeInstance(instance) => {
                if let Some(method) = self.struct_method(instance.ty, name)? {
                    return Ok((method, true));
                }
            }
            Object::Module(module) => {
                if let Some(export) = self.ctx.map_lookup(module.exports, name)? {
                    return Ok((export, false));
                }
            }
            Object::Struct(_) | Object::NativeStruct(_) => {
                if let Some(method) = self.struct_method(receiver, name)? {
                    return Ok((method, false));
                }
            }
            _ => {}
        }
        if let Some(method) = self.builtin_method(receiver, name)? {
            return Ok((method, true));
        }
        if self.find_slot(receiver, "__getattr__")?.is_some() {
            let value = self.get_attribute(receiver, name)?;
            return Ok((value, false));
        }
        Err(self.missing_attribute(receiver, name))
    }

    /// Method `name` declared by a Struct or NativeStruct.
    pub(crate) fn struct_method(&self, ty: Value, name: &str) -> BondResult<Option<Value>> {
        Ok(match self.ctx.get(ty)? {
            Object::Struct(s) => s.methods.get(name).copied(),
            Object::NativeStruct(s) => s.methods.get(name).copied(),
            _ => None,
        })
    }

    /// Method `name` of a builtin kind's descriptor.
    fn builtin_method(&self, value: Value, name: &str) -> BondResult<Option<Value>> {
        let object = self.ctx.get(value)?;
        if matches!(
            object,
            Object::Instance(_) | Object::NativeInstance(_) | Object::Struct(_) | Object::NativeStruct(_)
        ) {
            return Ok(None);
        }
        let descriptor = self.ctx.runtime().types.descriptor_for(object);
        self.struct_method(descriptor, name)
    }

    /// Operator slot `name` of an instance's type.
    pub(crate) fn find_slot(&self, value: Value, name: &str) -> BondResult<Option<Value>> {
        match self.ctx.get(value)? {
            Object::Instance(instance) => self.struct_method(instance.ty, name),
            Object::NativeInstance(instance) => self.struct_method(instance.ty, name),
            _ => Ok(None),
        }
    }

    fn type_name(&self, value: Value) -> String {
        match self.ctx.type_of(value).and_then(|ty| self.callable_name(ty)) {
            Ok(name) => name,
            Err(_) => self.ctx.kind_name(value).to_string(),
        }
    }

    fn missing_attribute(&self, target: Value, name: &str) -> BondError {
        BondError::attribute_not_found(format!(
            "{} has no attribute {}",
            self.type_name(target),
            name
        ))
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    /// `target.name`
    pub fn get_attribute(&mut self, target: Value, name: &str) -> BondResult<Value> {
        let object = self.ctx.get(target)?;
        match object {
            Object::Instance(instance) => {
                if let Some(field) = instance.fields.get(name) {
                    return Ok(*field);
                }
                let ty = instance.ty;
                if let Some(method) = self.struct_method(ty, name)? {
                    return Ok(self.bind(target, method));
                }
                if let Some(getattr) = self.struct_method(ty, "__getattr__")? {
                    let name = self.ctx.intern(name);
                    return self.call_value(getattr, &[target, name]);
                }
            }
            Object::NativeInstance(instance) => {
                let ty = instance.ty;
                let getter = match self.ctx.get(ty)? {
                    Object::NativeStruct(s) => s.getters.get(name).cloned(),
                    _ => None,
                };
                if let Some(getter) = getter {
                    return getter(self, target);
                }
                if let Some(method) = self.struct_method(ty, name)? {
                    return Ok(self.bind(target, method));
                }
            }
            Object::Module(module) => {
                if let Some(export) = self.ctx.map_lookup(module.exports, name)? {
                    return Ok(export);
                }
            }
            Object::Struct(_) | Object::NativeStruct(_) => {
                if let Some(method) = self.struct_method(target, name)? {
                    return Ok(method);
                }
            }
            _ => {}
        }
        if let Some(method) = self.builtin_method(target, name)? {
            return Ok(self.bind(target, method));
        }
        Err(self.missing_attribute(target, name))
    }

    /// `target.name = value`
    pub fn set_attribute(&mut self, target: Value, name: &str, value: Value) -> BondResult<()> {
        match self.ctx.get(target)? {
            Object::Instance(instance) => {
                let ty = instance.ty;
                let declared = match self.ctx.get(ty)? {
                    Object::Struct(s) => s.fields.iter().any(|f| f == name),
                    _ => false,
                };
                if declared {
                    if let Object::Instance(instance) = self.ctx.get_mut(target)? {
                        instance.fields.insert(name.to_string(), value);
                    }
                    return Ok(());
                }
                if let Some(setattr) = self.struct_method(ty, "__setattr__")? {
                    let name = self.ctx.intern(name);
                    self.call_value(setattr, &[target, name, value])?;
                    return Ok(());
                }
            }
            Object::NativeInstance(instance) => {
                let setter = match self.ctx.get(instance.ty)? {
                    Object::NativeStruct(s) => s.setters.get(name).cloned(),
                    _ => None,
                };
                if let Some(setter) = setter {
                    return setter(self, target, value);
                }
            }
            _ => {}
        }
        Err(BondError::attribute_not_found(format!(
            "cannot set attribute {} on {}",
            name,
            self.type_name(target)
        )))
    }

    fn bind(&mut self, receiver: Value, method: Value) -> Value {
        self.ctx
            .alloc(Object::BoundMethod(BoundMethod { receiver, method }))
    }

    // =========================================================================
    // Items
    // =========================================================================

    /// `target[index]`
    pub fn get_item(&mut self, target: Value, index: Value) -> BondResult<Value> {
        match self.ctx.get(target)? {
            Object::List(items) => {
                let i = self.ctx.expect_int(index)?;
                usize::try_from(i)
                    .ok()
                    .and_then(|i| items.get(i).copied())
                    .ok_or_else(|| out_of_bounds(i, items.len()))
            }
            Object::String(s) => {
                let i = self.ctx.expect_int(index)?;
                let c = usize::try_from(i)
                    .ok()
                    .and_then(|i| s.chars().nth(i))
                    .ok_or_else(|| out_of_bounds(i, s.chars().count()))?;
                Ok(self.ctx.string(c.to_string()))
            }
            Object::HashMap(_) => match self.map_get(target, index)? {
                Some(value) => Ok(value),
                None => Err(BondError::new(
                    ErrorKind::KeyNotFound,
                    format!("key {} not found", self.ctx.repr(index)),
                )),
            },
            Object::StringMap(entries) => {
                let key = self.ctx.expect_str(index)?;
                entries.get(key).copied().ok_or_else(|| {
                    BondError::new(ErrorKind::KeyNotFound, format!("key {:?} not found", key))
                })
            }
            Object::Instance(_) | Object::NativeInstance(_) => {
                match self.find_slot(target, "__getitem__")? {
                    Some(slot) => self.call_value(slot, &[target, index]),
                    None => Err(not_subscriptable(&self.type_name(target))),
                }
            }
            other => Err(not_subscriptable(other.kind_name())),
        }
    }

    /// `target[index] = value`
    pub fn set_item(&mut self, target: Value, index: Value, value: Value) -> BondResult<()> {
        match self.ctx.get(target)? {
            Object::List(_) => {
                let i = self.ctx.expect_int(index)?;
                if let Object::List(items) = self.ctx.get_mut(target)? {
                    let len = items.len();
                    let slot = usize::try_from(i)
                        .ok()
                        .and_then(|i| items.get_mut(i))
                        .ok_or_else(|| out_of_bounds(i, len))?;
                    *slot = value;
                }
                Ok(())
            }
            Object::HashMap(_) => self.map_set(target, index, value),
            Object::StringMap(_) => {
                let key = self.ctx.expect_str(index)?.to_string();
                self.ctx.map_insert(target, &key, value)
            }
            Object::Instance(_) | Object::NativeInstance(_) => {
                match self.find_slot(target, "__setitem__")? {
                    Some(slot) => {
                        self.call_value(slot, &[target, index, value])?;
                        Ok(())
                    }
                    None => Err(not_subscriptable(&self.type_name(target))),
                }
            }
            other => Err(not_subscriptable(other.kind_name())),
        }
    }
}

fn identifier(code: &Code, index: u32) -> BondResult<&str> {
    code.identifier(index)
        .ok_or_else(|| BondError::internal(format!("constant {} is not an identifier", index)))
}

fn function_constant(code: &Code, index: u32) -> BondResult<Rc<FunctionProto>> {
    match code.constants.get(index as usize) {
        Some(Constant::Function(proto)) => Ok(proto.clone()),
        _ => Err(BondError::internal(format!(
            "constant {} is not a function",
            index
        ))),
    }
}

fn out_of_bounds(index: i64, len: usize) -> BondError {
    BondError::new(
        ErrorKind::IndexOutOfBounds,
        format!("index {} out of range for length {}", index, len),
    )
}

fn not_subscriptable(kind: &str) -> BondError {
    BondError::type_error(format!("{} is not subscriptable", kind))
}
