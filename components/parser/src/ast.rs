//! Abstract Syntax Tree node definitions for Bond

use core_types::Span;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `and`
    And,
    /// `or`
    Or,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `&`
    BitAnd,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `!x`
    Not,
}

/// An identifier together with where it appeared
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    /// Identifier text
    pub name: String,
    /// Location
    pub span: Span,
}

impl Ident {
    /// Create an identifier
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Ident {
            name: name.into(),
            span,
        }
    }
}

/// Expression node
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    /// Expression kind
    pub kind: ExprKind,
    /// Location of the whole expression
    pub span: Span,
}

impl Expr {
    /// Create an expression node
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }
}

/// Expression kinds
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Integer literal
    Int(i64),
    /// Float literal
    Float(f64),
    /// String literal
    Str(String),
    /// `true`
    True,
    /// `false`
    False,
    /// `nil`
    Nil,
    /// Variable reference
    Identifier(String),
    /// `left op right`
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// `op expr`
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        expr: Box<Expr>,
    },
    /// `name = value`
    Assign {
        /// Target variable
        name: Ident,
        /// Assigned value
        value: Box<Expr>,
    },
    /// `[a, b] = value`
    Unpack {
        /// Target variables in order
        targets: Vec<Ident>,
        /// Sequence being unpacked
        value: Box<Expr>,
    },
    /// `target[index]`
    GetItem {
        /// Container
        target: Box<Expr>,
        /// Index or key
        index: Box<Expr>,
    },
    /// `target[index] = value`
    SetItem {
        /// Container
        target: Box<Expr>,
        /// Index or key
        index: Box<Expr>,
        /// Assigned value
        value: Box<Expr>,
    },
    /// `target.name`
    GetAttribute {
        /// Object
        target: Box<Expr>,
        /// Attribute name
        name: Ident,
    },
    /// `target.name = value`
    SetAttribute {
        /// Object
        target: Box<Expr>,
        /// Attribute name
        name: Ident,
        /// Assigned value
        value: Box<Expr>,
    },
    /// `callee(args)`
    Call {
        /// Called value
        callee: Box<Expr>,
        /// Arguments
        args: Vec<Expr>,
    },
    /// `receiver.name(args)`
    CallMethod {
        /// Receiver object
        receiver: Box<Expr>,
        /// Method name
        name: Ident,
        /// Arguments
        args: Vec<Expr>,
    },
    /// `[a, b, c]`
    List(Vec<Expr>),
    /// `{k: v, ...}`
    Dict(Vec<(Expr, Expr)>),
    /// Anonymous `fn (...) ...` expression
    Closure(Box<FunctionDecl>),
    /// `expr.?` or `try expr`
    Try(Box<Expr>),
}

/// Body of a function
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    /// `{ statements }`
    Block(Vec<Stmt>),
    /// A single expression whose value is returned
    Expr(Expr),
}

/// Function declaration (named, method or anonymous)
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    /// Function name (`<lambda>` for anonymous functions)
    pub name: Ident,
    /// Parameters
    pub params: Vec<Ident>,
    /// True when declared with `!`; such functions return Results
    pub fallible: bool,
    /// Body
    pub body: FunctionBody,
    /// Location of the declaration
    pub span: Span,
}

/// Struct declaration
#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    /// Struct name
    pub name: Ident,
    /// Instance variables in declaration order
    pub fields: Vec<Ident>,
    /// Methods in declaration order
    pub methods: Vec<FunctionDecl>,
    /// Location of the declaration
    pub span: Span,
}

/// Statement node
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `var name [= init];`
    Var {
        /// Variable
        name: Ident,
        /// Initializer (nil when absent)
        init: Option<Expr>,
        /// Location
        span: Span,
    },
    /// `var [a, b] = init;`
    VarUnpack {
        /// Variables
        names: Vec<Ident>,
        /// Sequence being unpacked
        init: Expr,
        /// Location
        span: Span,
    },
    /// Top-level `fn`
    Function(FunctionDecl),
    /// `fn` inside a block: a closure bound to a local
    Closure(FunctionDecl),
    /// `struct`
    Struct(StructDecl),
    /// `import "path" [as alias];`
    Import {
        /// Import path as written
        path: String,
        /// Name the module is bound to
        alias: Ident,
        /// Location
        span: Span,
    },
    /// `if cond { } else ...`
    If {
        /// Condition
        cond: Expr,
        /// Then branch
        then: Box<Stmt>,
        /// Else branch
        otherwise: Option<Box<Stmt>>,
        /// Location
        span: Span,
    },
    /// `while cond { }`
    While {
        /// Condition
        cond: Expr,
        /// Body
        body: Box<Stmt>,
        /// Location
        span: Span,
    },
    /// `for name in iterable { }`
    For {
        /// Loop variable
        var: Ident,
        /// Iterated value
        iterable: Expr,
        /// Body
        body: Box<Stmt>,
        /// Location
        span: Span,
    },
    /// `{ statements }`
    Block(Vec<Stmt>, Span),
    /// `return [value];`
    Return {
        /// Returned value (nil when absent)
        value: Option<Expr>,
        /// Location
        span: Span,
    },
    /// `break;`
    Break(Span),
    /// `continue;`
    Continue(Span),
    /// `ok expr;` or `err expr;`
    Result {
        /// True for `err`
        is_error: bool,
        /// Wrapped value
        value: Expr,
        /// Location
        span: Span,
    },
    /// Expression followed by `;`
    Expr(Expr),
}

impl Stmt {
    /// Location of the statement
    pub fn span(&self) -> Span {
        match self {
            Stmt::Var { span, .. }
            | Stmt::VarUnpack { span, .. }
            | Stmt::Import { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::For { span, .. }
            | Stmt::Block(_, span)
            | Stmt::Return { span, .. }
            | Stmt::Break(span)
            | Stmt::Continue(span)
            | Stmt::Result { span, .. } => *span,
            Stmt::Function(decl) | Stmt::Closure(decl) => decl.span,
            Stmt::Struct(decl) => decl.span,
            Stmt::Expr(expr) => expr.span,
        }
    }
}

/// A parsed module
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    /// Top-level statements
    pub statements: Vec<Stmt>,
}
