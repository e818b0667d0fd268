//! Bond bytecode opcodes
//!
//! Instructions are 32-bit words. An opcode word is followed by at most one
//! operand word: a constant-pool index, a plain count, or an absolute jump
//! target.

/// How the operand word of an opcode is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// No operand
    Simple,
    /// Operand indexes the constant pool (or identifier table)
    Constant,
    /// Operand is a count, module id or absolute instruction offset
    Operand,
}

macro_rules! opcodes {
    ($( $(#[$doc:meta])* $variant:ident = $value:literal, $name:literal, $kind:ident; )*) => {
        /// Bytecode opcodes of the Bond VM
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u32)]
        pub enum Opcode {
            $( $(#[$doc])* $variant = $value, )*
        }

        impl Opcode {
            /// Every opcode, in numeric order.
            pub const ALL: &'static [Opcode] = &[ $( Opcode::$variant, )* ];

            /// Decode an instruction word.
            pub fn from_u32(word: u32) -> Option<Opcode> {
                match word {
                    $( $value => Some(Opcode::$variant), )*
                    _ => None,
                }
            }

            /// Mnemonic used by the disassembler.
            pub fn name(&self) -> &'static str {
                match self {
                    $( Opcode::$variant => $name, )*
                }
            }

            /// Operand interpretation.
            pub fn operand_kind(&self) -> OperandKind {
                match self {
                    $( Opcode::$variant => OperandKind::$kind, )*
                }
            }
        }
    };
}

opcodes! {
    /// Push constant `operand`
    LoadConst = 0, "LOAD_CONST", Constant;
    /// Pop b, a; push a + b
    BinAdd = 1, "BIN_ADD", Simple;
    /// Pop b, a; push a - b
    BinSub = 2, "BIN_SUB", Simple;
    /// Pop b, a; push a * b
    BinMul = 3, "BIN_MUL", Simple;
    /// Pop b, a; push a / b
    BinDiv = 4, "BIN_DIV", Simple;
    /// Return top of stack from the current frame
    Return = 5, "RETURN", Simple;
    /// Push true
    PushTrue = 6, "PUSH_TRUE", Simple;
    /// Push false
    PushFalse = 7, "PUSH_FALSE", Simple;
    /// Push nil
    PushNil = 8, "PUSH_NIL", Simple;
    /// Push the global named by constant `operand`
    LoadGlobal = 9, "LOAD_GLOBAL", Constant;
    /// Assign top of stack (kept) to an existing global
    StoreGlobal = 10, "STORE_GLOBAL", Constant;
    /// Push the local named by constant `operand`
    LoadFast = 11, "LOAD_FAST", Constant;
    /// Assign top of stack (kept) to an existing local
    StoreFast = 12, "STORE_FAST", Constant;
    /// Pop b, a; push a != b
    Ne = 13, "NE", Simple;
    /// Pop b, a; push a == b
    Eq = 14, "EQ", Simple;
    /// Pop b, a; push a <= b
    Le = 15, "LE", Simple;
    /// Pop b, a; push a > b
    Gt = 16, "GT", Simple;
    /// Pop b, a; push a >= b
    Ge = 17, "GE", Simple;
    /// Pop b, a; push a < b
    Lt = 18, "LT", Simple;
    /// Pop b, a; push truthy(a) || truthy(b)
    Or = 19, "OR", Simple;
    /// Pop b, a; push truthy(a) && truthy(b)
    And = 20, "AND", Simple;
    /// Discard top of stack
    PopTop = 21, "POP_TOP", Simple;
    /// Pop a value and define a new global with it
    CreateGlobal = 22, "CREATE_GLOBAL", Constant;
    /// Pop a value and define a new local with it
    CreateLocal = 23, "CREATE_LOCAL", Constant;
    /// Pop `operand` values and push a list of them
    BuildList = 24, "BUILD_LIST", Operand;
    /// Pop `operand` key/value pairs and push a map
    BuildDict = 25, "BUILD_DICT", Operand;
    /// Pop index, container; push container[index]
    GetItem = 26, "GET_ITEM", Simple;
    /// Pop value, index, container; container[index] = value; push value
    SetItem = 27, "SET_ITEM", Simple;
    /// Pop a condition; jump to `operand` when falsy
    JumpIfFalse = 28, "JUMP_IF_FALSE", Operand;
    /// Jump to `operand`
    Jump = 29, "JUMP", Operand;
    /// Pop `operand` arguments and a callee; call it
    Call = 30, "CALL", Operand;
    /// Replace top of stack with its iterator
    Iter = 31, "ITER", Simple;
    /// Advance the iterator on top of stack into the named local
    IterNext = 32, "ITER_NEXT", Constant;
    /// Jump to `operand` when the iterator on top of stack is exhausted
    IterEnd = 33, "ITER_END", Operand;
    /// Pop b, a; push a % b
    BinMod = 34, "BIN_MOD", Simple;
    /// Pop b, a; push a | b
    BitOr = 35, "BIT_OR", Simple;
    /// Pop b, a; push a ^ b
    BitXor = 36, "BIT_XOR", Simple;
    /// Pop b, a; push a & b
    BitAnd = 37, "BIT_AND", Simple;
    /// Negate top of stack
    UnarySub = 38, "UNARY_SUB", Simple;
    /// Replace top of stack with its logical negation
    Not = 39, "NOT", Simple;
    /// Materialize the Function constant `operand` bound to module globals
    CreateFunction = 40, "CREATE_FUNCTION", Operand;
    /// Materialize the Struct constant `operand`
    CreateStruct = 41, "CREATE_STRUCT", Operand;
    /// Pop an object; push its attribute named by constant `operand`
    GetAttribute = 42, "GET_ATTRIBUTE", Constant;
    /// Pop value, object; set the named attribute; push value
    SetAttribute = 43, "SET_ATTRIBUTE", Constant;
    /// Pop a path; import it and bind the module to the named global or local
    Import = 44, "IMPORT", Constant;
    /// Pop a Result; push the Ok value and jump to `operand`, or return the Error
    Try = 45, "TRY", Operand;
    /// Jump to `operand` out of the innermost loop
    Break = 46, "BREAK", Operand;
    /// Jump to `operand`, the start of the innermost loop
    Continue = 47, "CONTINUE", Operand;
    /// Close the Function constant `operand` over the current locals and bind
    /// it to a local of the same name
    CreateClosure = 48, "CREATE_CLOSURE", Constant;
    /// Push the Function constant `operand` closed over the current locals
    CreateClosureEx = 49, "CREATE_CLOSURE_EX", Constant;
    /// Pop `operand` arguments, a method name and a receiver; call the method
    CallMethod = 50, "CALL_METHOD", Operand;
    /// Pop a sequence; push its `operand` elements in order
    UnpackSeq = 51, "UNPACK_SEQ", Operand;
    /// Wrap top of stack in an Ok result
    MakeOk = 52, "MAKE_OK", Simple;
    /// Wrap top of stack in an Error result
    MakeError = 53, "MAKE_ERROR", Simple;
    /// Pop an alias name; bind precompiled module `operand` to it
    ImportPreCompiled = 54, "IMPORT_PRE_COMPILED", Operand;
}

impl Opcode {
    /// True for opcodes that take an operand word.
    pub fn has_operand(&self) -> bool {
        self.operand_kind() != OperandKind::Simple
    }

    /// Number of words the instruction occupies.
    pub fn width(&self) -> usize {
        if self.has_operand() {
            2
        } else {
            1
        }
    }

    /// True for opcodes whose operand is an absolute jump target.
    pub fn is_jump(&self) -> bool {
        matches!(
            self,
            Opcode::Jump
                | Opcode::JumpIfFalse
                | Opcode::IterEnd
                | Opcode::Try
                | Opcode::Break
                | Opcode::Continue
        )
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
