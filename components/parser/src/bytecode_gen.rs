//! Bytecode generation from AST

use crate::ast::*;
use crate::error::syntax_error;
use crate::scope::Scopes;
use bytecode_system::{Code, Constant, FunctionProto, Opcode, Param, StructProto};
use core_types::{Diagnostic, Span};
use std::rc::Rc;

/// Supplies module ids for imports that were compiled ahead of time.
///
/// When a resolver returns `Some(id)` for an import path, the generator emits
/// `IMPORT_PRE_COMPILED id` instead of a run-time `IMPORT`.
pub trait ImportResolver {
    /// Module id for `path`, or `None` to import it at run time.
    fn resolve_import(&mut self, path: &str, span: Span) -> Option<u32>;
}

#[derive(Default)]
struct LoopLabels {
    breaks: Vec<u32>,
    continues: Vec<u32>,
}

/// Bytecode generator that converts AST to bytecode
pub struct BytecodeGenerator<'a> {
    scopes: &'a mut Scopes,
    resolver: Option<&'a mut dyn ImportResolver>,
    code: Code,
    loops: Vec<LoopLabels>,
    fallible: bool,
    repl: bool,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> BytecodeGenerator<'a> {
    /// Create a generator resolving names against `scopes`
    pub fn new(scopes: &'a mut Scopes) -> Self {
        Self {
            scopes,
            resolver: None,
            code: Code::new(),
            loops: Vec::new(),
            fallible: false,
            repl: false,
            diagnostics: Vec::new(),
        }
    }

    /// Keep the value of a trailing expression statement as the module result
    pub fn with_repl(mut self, repl: bool) -> Self {
        self.repl = repl;
        self
    }

    /// Route imports through `resolver`
    pub fn with_resolver(mut self, resolver: &'a mut dyn ImportResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Generate the code of a whole module
    pub fn generate(mut self, program: &Program) -> Result<Code, Vec<Diagnostic>> {
        self.hoist(&program.statements);

        let last = program.statements.len().saturating_sub(1);
        for (i, stmt) in program.statements.iter().enumerate() {
            match stmt {
                Stmt::Expr(expr) if self.repl && i == last => {
                    self.expr(expr);
                    self.code.add_ins(Opcode::Return, expr.span);
                }
                _ => self.stmt(stmt),
            }
        }
        let end = program
            .statements
            .last()
            .map(|s| s.span())
            .unwrap_or_default();
        self.code.add_ins(Opcode::PushNil, end);
        self.code.add_ins(Opcode::Return, end);

        if self.diagnostics.is_empty() {
            Ok(self.code)
        } else {
            Err(self.diagnostics)
        }
    }

    /// Declare every top-level name up front so functions can refer to
    /// globals defined further down the module.
    fn hoist(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            let names: Vec<&Ident> = match stmt {
                Stmt::Var { name, .. } => vec![name],
                Stmt::VarUnpack { names, .. } => names.iter().collect(),
                Stmt::Function(decl) => vec![&decl.name],
                Stmt::Struct(decl) => vec![&decl.name],
                Stmt::Import { alias, .. } => vec![alias],
                _ => continue,
            };
            for ident in names {
                if let Err(diag) = self.scopes.declare(&ident.name, ident.span) {
                    self.diagnostics.push(diag);
                }
            }
        }
    }

    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.diagnostics.push(syntax_error(message, span));
    }

    fn name_constant(&mut self, name: &str) -> u32 {
        self.code.add_constant(Constant::String(name.to_string()))
    }

    fn emit_jump(&mut self, op: Opcode, span: Span) -> u32 {
        self.code.add_ins_operand(op, 0, span);
        self.code.current_index() - 1
    }

    fn patch_here(&mut self, operand_index: u32) {
        let target = self.code.current_index();
        self.code.patch(operand_index, target);
    }

    /// Declare a block-level name. At module level the name was hoisted.
    fn declare(&mut self, ident: &Ident) -> bool {
        if self.scopes.is_global_scope() {
            return true;
        }
        match self.scopes.declare(&ident.name, ident.span) {
            Ok(variable) => variable.is_global,
            Err(diag) => {
                self.diagnostics.push(diag);
                false
            }
        }
    }

    fn emit_create(&mut self, ident: &Ident, is_global: bool) {
        let idx = self.name_constant(&ident.name);
        let op = if is_global {
            Opcode::CreateGlobal
        } else {
            Opcode::CreateLocal
        };
        self.code.add_ins_operand(op, idx, ident.span);
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Var { name, init, span } => {
                match init {
                    Some(init) => self.expr(init),
                    None => self.code.add_ins(Opcode::PushNil, *span),
                }
                let is_global = self.declare(name);
                self.emit_create(name, is_global);
            }
            Stmt::VarUnpack { names, init, span } => {
                self.expr(init);
                self.code
                    .add_ins_operand(Opcode::UnpackSeq, names.len() as u32, *span);
                let globals: Vec<bool> = names.iter().map(|n| self.declare(n)).collect();
                for (name, is_global) in names.iter().zip(globals).rev() {
                    self.emit_create(name, is_global);
                }
            }
            Stmt::Function(decl) => {
                let proto = self.function(decl);
                let idx = self.code.add_constant(Constant::Function(proto));
                self.code
                    .add_ins_operand(Opcode::CreateFunction, idx, decl.span);
                let is_global = self.declare(&decl.name);
                self.emit_create(&decl.name, is_global);
            }
            Stmt::Closure(decl) => {
                // Declared before the body so the closure can call itself.
                self.declare(&decl.name);
                let proto = self.function(decl);
                let idx = self.code.add_constant(Constant::Function(proto));
                self.code.add_ins_operand(Opcode::CreateClosure, idx, decl.span);
            }
            Stmt::Struct(decl) => self.struct_decl(decl),
            Stmt::Import { path, alias, span } => {
                let precompiled = match self.resolver.as_mut() {
                    Some(resolver) => resolver.resolve_import(path, *span),
                    None => None,
                };
                match precompiled {
                    Some(id) => {
                        let idx = self.name_constant(&alias.name);
                        self.code.add_ins_operand(Opcode::LoadConst, idx, *span);
                        self.code
                            .add_ins_operand(Opcode::ImportPreCompiled, id, *span);
                    }
                    None => {
                        let path_idx = self.name_constant(path);
                        self.code.add_ins_operand(Opcode::LoadConst, path_idx, *span);
                        let alias_idx = self.name_constant(&alias.name);
                        self.code.add_ins_operand(Opcode::Import, alias_idx, *span);
                    }
                }
            }
            Stmt::If {
                cond,
                then,
                otherwise,
                span,
            } => {
                self.expr(cond);
                let skip_then = self.emit_jump(Opcode::JumpIfFalse, *span);
                self.scoped_stmt(then);
                match otherwise {
                    Some(otherwise) => {
                        let skip_else = self.emit_jump(Opcode::Jump, *span);
                        self.patch_here(skip_then);
                        self.scoped_stmt(otherwise);
                        self.patch_here(skip_else);
                    }
                    None => self.patch_here(skip_then),
                }
            }
            Stmt::While { cond, body, span } => {
                let start = self.code.current_index();
                self.expr(cond);
                let exit = self.emit_jump(Opcode::JumpIfFalse, *span);
                self.loops.push(LoopLabels::default());
                self.scoped_stmt(body);
                self.code.add_ins_operand(Opcode::Jump, start, *span);
                self.patch_here(exit);
                self.finish_loop(start);
            }
            Stmt::For {
                var,
                iterable,
                body,
                span,
            } => {
                self.scopes.new_scope();
                self.code.add_ins(Opcode::PushNil, var.span);
                self.declare(var);
                let var_idx = self.name_constant(&var.name);
                self.code.add_ins_operand(Opcode::CreateLocal, var_idx, var.span);

                self.expr(iterable);
                self.code.add_ins(Opcode::Iter, iterable.span);
                let start = self.code.current_index();
                let exit = self.emit_jump(Opcode::IterEnd, *span);
                self.code.add_ins_operand(Opcode::IterNext, var_idx, var.span);

                self.loops.push(LoopLabels::default());
                self.scoped_stmt(body);
                self.code.add_ins_operand(Opcode::Jump, start, *span);
                self.patch_here(exit);
                self.finish_loop(start);
                self.code.add_ins(Opcode::PopTop, *span);
                self.scopes.end_scope();
            }
            Stmt::Block(stmts, _) => {
                self.scopes.new_scope();
                for stmt in stmts {
                    self.stmt(stmt);
                }
                self.scopes.end_scope();
            }
            Stmt::Return { value, span } => {
                match value {
                    Some(value) => self.expr(value),
                    None => self.code.add_ins(Opcode::PushNil, *span),
                }
                self.code.add_ins(Opcode::Return, *span);
            }
            Stmt::Break(span) => {
                let at = self.emit_jump(Opcode::Break, *span);
                match self.loops.last_mut() {
                    Some(labels) => labels.breaks.push(at),
                    None => self.error("'break' outside of a loop", *span),
                }
            }
            Stmt::Continue(span) => {
                let at = self.emit_jump(Opcode::Continue, *span);
                match self.loops.last_mut() {
                    Some(labels) => labels.continues.push(at),
                    None => self.error("'continue' outside of a loop", *span),
                }
            }
            Stmt::Result {
                is_error,
                value,
                span,
            } => {
                self.expr(value);
                let op = if *is_error {
                    Opcode::MakeError
                } else {
                    Opcode::MakeOk
                };
                self.code.add_ins(op, *span);
                self.code.add_ins(Opcode::Return, *span);
            }
            Stmt::Expr(expr) => {
                self.expr(expr);
                self.code.add_ins(Opcode::PopTop, expr.span);
            }
        }
    }

    /// Branch and loop bodies get their own scope even when they are not blocks.
    fn scoped_stmt(&mut self, stmt: &Stmt) {
        self.scopes.new_scope();
        self.stmt(stmt);
        self.scopes.end_scope();
    }

    fn finish_loop(&mut self, start: u32) {
        let end = self.code.current_index();
        if let Some(labels) = self.loops.pop() {
            for at in labels.breaks {
                self.code.patch(at, end);
            }
            for at in labels.continues {
                self.code.patch(at, start);
            }
        }
    }

    fn struct_decl(&mut self, decl: &StructDecl) {
        let methods = decl
            .methods
            .iter()
            .map(|m| (m.name.name.clone(), self.function(m)))
            .collect();
        let proto = StructProto {
            name: decl.name.name.clone(),
            fields: decl.fields.iter().map(|f| f.name.clone()).collect(),
            methods,
        };
        let idx = self.code.add_constant(Constant::Struct(Rc::new(proto)));
        self.code.add_ins_operand(Opcode::CreateStruct, idx, decl.span);
        let is_global = self.declare(&decl.name);
        self.emit_create(&decl.name, is_global);
    }

    /// Compile a function body into its own [`Code`].
    fn function(&mut self, decl: &FunctionDecl) -> Rc<FunctionProto> {
        let outer_code = std::mem::take(&mut self.code);
        let outer_loops = std::mem::take(&mut self.loops);
        let outer_fallible = std::mem::replace(&mut self.fallible, decl.fallible);

        self.scopes.new_scope();
        for param in &decl.params {
            if let Err(diag) = self.scopes.declare(&param.name, param.span) {
                self.diagnostics.push(diag);
            }
        }

        match &decl.body {
            FunctionBody::Block(stmts) => {
                for stmt in stmts {
                    self.stmt(stmt);
                }
                self.code.add_ins(Opcode::PushNil, decl.span);
                if decl.fallible {
                    self.code.add_ins(Opcode::MakeOk, decl.span);
                }
                self.code.add_ins(Opcode::Return, decl.span);
            }
            FunctionBody::Expr(expr) => {
                self.expr(expr);
                if decl.fallible {
                    self.code.add_ins(Opcode::MakeOk, expr.span);
                }
                self.code.add_ins(Opcode::Return, expr.span);
            }
        }
        self.scopes.end_scope();

        let body = std::mem::replace(&mut self.code, outer_code);
        self.loops = outer_loops;
        self.fallible = outer_fallible;

        Rc::new(FunctionProto {
            name: decl.name.name.clone(),
            params: decl
                .params
                .iter()
                .map(|p| Param::new(p.name.clone(), p.span))
                .collect(),
            code: Rc::new(body),
        })
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn expr(&mut self, expr: &Expr) {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Int(value) => {
                let idx = self.code.add_constant(Constant::Int(*value));
                self.code.add_ins_operand(Opcode::LoadConst, idx, span);
            }
            ExprKind::Float(value) => {
                let idx = self.code.add_constant(Constant::Float(*value));
                self.code.add_ins_operand(Opcode::LoadConst, idx, span);
            }
            ExprKind::Str(value) => {
                let idx = self.name_constant(value);
                self.code.add_ins_operand(Opcode::LoadConst, idx, span);
            }
            ExprKind::True => self.code.add_ins(Opcode::PushTrue, span),
            ExprKind::False => self.code.add_ins(Opcode::PushFalse, span),
            ExprKind::Nil => self.code.add_ins(Opcode::PushNil, span),
            ExprKind::Identifier(name) => {
                let op = match self.scopes.get(name) {
                    Some(v) if v.is_global => Opcode::LoadGlobal,
                    Some(_) => Opcode::LoadFast,
                    None => {
                        self.error(format!("Undefined variable {}", name), span);
                        Opcode::LoadGlobal
                    }
                };
                let idx = self.name_constant(name);
                self.code.add_ins_operand(op, idx, span);
            }
            ExprKind::Binary { op, left, right } => {
                self.expr(left);
                self.expr(right);
                self.code.add_ins(binary_opcode(*op), span);
            }
            ExprKind::Unary { op, expr } => {
                self.expr(expr);
                let opcode = match op {
                    UnaryOp::Neg => Opcode::UnarySub,
                    UnaryOp::Not => Opcode::Not,
                };
                self.code.add_ins(opcode, span);
            }
            ExprKind::Assign { name, value } => {
                self.expr(value);
                let op = match self.scopes.get(&name.name) {
                    Some(v) if v.is_global => Opcode::StoreGlobal,
                    Some(_) => Opcode::StoreFast,
                    None => {
                        self.error(
                            format!("Cannot assign to undeclared variable {}", name.name),
                            name.span,
                        );
                        Opcode::StoreGlobal
                    }
                };
                let idx = self.name_constant(&name.name);
                self.code.add_ins_operand(op, idx, span);
            }
            ExprKind::Unpack { targets, value } => {
                self.expr(value);
                self.code
                    .add_ins_operand(Opcode::UnpackSeq, targets.len() as u32, span);
                for target in targets.iter().rev() {
                    let is_global = match self.scopes.get(&target.name) {
                        Some(v) => v.is_global,
                        None => {
                            self.error(
                                format!("Cannot assign to undeclared variable {}", target.name),
                                target.span,
                            );
                            true
                        }
                    };
                    self.emit_create(target, is_global);
                }
                self.code.add_ins(Opcode::PushNil, span);
            }
            ExprKind::GetItem { target, index } => {
                self.expr(target);
                self.expr(index);
                self.code.add_ins(Opcode::GetItem, span);
            }
            ExprKind::SetItem {
                target,
                index,
                value,
            } => {
                self.expr(target);
                self.expr(index);
                self.expr(value);
                self.code.add_ins(Opcode::SetItem, span);
            }
            ExprKind::GetAttribute { target, name } => {
                self.expr(target);
                let idx = self.name_constant(&name.name);
                self.code.add_ins_operand(Opcode::GetAttribute, idx, span);
            }
            ExprKind::SetAttribute {
                target,
                name,
                value,
            } => {
                self.expr(target);
                self.expr(value);
                let idx = self.name_constant(&name.name);
                self.code.add_ins_operand(Opcode::SetAttribute, idx, span);
            }
            ExprKind::Call { callee, args } => {
                self.expr(callee);
                for arg in args {
                    self.expr(arg);
                }
                self.code
                    .add_ins_operand(Opcode::Call, args.len() as u32, span);
            }
            ExprKind::CallMethod {
                receiver,
                name,
                args,
            } => {
                self.expr(receiver);
                let idx = self.name_constant(&name.name);
                self.code.add_ins_operand(Opcode::LoadConst, idx, name.span);
                for arg in args {
                    self.expr(arg);
                }
                self.code
                    .add_ins_operand(Opcode::CallMethod, args.len() as u32, span);
            }
            ExprKind::List(items) => {
                for item in items {
                    self.expr(item);
                }
                self.code
                    .add_ins_operand(Opcode::BuildList, items.len() as u32, span);
            }
            ExprKind::Dict(pairs) => {
                for (key, value) in pairs {
                    self.expr(key);
                    self.expr(value);
                }
                self.code
                    .add_ins_operand(Opcode::BuildDict, pairs.len() as u32, span);
            }
            ExprKind::Closure(decl) => {
                let proto = self.function(decl);
                let idx = self.code.add_constant(Constant::Function(proto));
                self.code.add_ins_operand(Opcode::CreateClosureEx, idx, span);
            }
            ExprKind::Try(inner) => {
                self.expr(inner);
                let target = self.code.current_index() + 3;
                self.code.add_ins_operand(Opcode::Try, target, span);
                self.code.add_ins(Opcode::Return, span);
            }
        }
    }
}

fn binary_opcode(op: BinaryOp) -> Opcode {
    match op {
        BinaryOp::Add => Opcode::BinAdd,
        BinaryOp::Sub => Opcode::BinSub,
        BinaryOp::Mul => Opcode::BinMul,
        BinaryOp::Div => Opcode::BinDiv,
        BinaryOp::Mod => Opcode::BinMod,
        BinaryOp::Eq => Opcode::Eq,
        BinaryOp::Ne => Opcode::Ne,
        BinaryOp::Lt => Opcode::Lt,
        BinaryOp::Le => Opcode::Le,
        BinaryOp::Gt => Opcode::Gt,
        BinaryOp::Ge => Opcode::Ge,
        BinaryOp::And => Opcode::And,
        BinaryOp::Or => Opcode::Or,
        BinaryOp::BitOr => Opcode::BitOr,
        BinaryOp::BitXor => Opcode::BitXor,
        BinaryOp::BitAnd => Opcode::BitAnd,
    }
}
