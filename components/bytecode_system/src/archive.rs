//! `.bar` bytecode archives
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! archive     = u32 magic, u32 version, u32 module_count, { u32 module_id, code }
//! code        = u32 const_count, u32 instr_count, u32 span_count,
//!               constant*, u32 instr*, span*
//! span        = u32 module_id, u32 start, u32 end, u32 line
//! constant    = u8 kind, payload
//!   0 Int      i64
//!   1 String   NUL-terminated bytes
//!   2 Float    f64
//!   3 Function function
//!   4 Struct   NUL name, u32 field_count, u32 method_count,
//!              NUL field*, { NUL method_name, function }
//! function    = NUL name, u32 param_count, code, { NUL param_name, span }
//! ```

use crate::code::{Code, Constant, FunctionProto, Param, StructProto};
use core_types::{BondError, ErrorKind, Span};
use std::path::Path;
use std::rc::Rc;
use thiserror::Error;
use tracing::debug;

/// Archive magic number (`BOND`).
pub const BOND_MAGIC: u32 = 0x424F_4E44;

/// Archive format version.
pub const BOND_VERSION: u32 = 0x0000_0001;

const KIND_INT: u8 = 0;
const KIND_STRING: u8 = 1;
const KIND_FLOAT: u8 = 2;
const KIND_FUNCTION: u8 = 3;
const KIND_STRUCT: u8 = 4;

/// Errors raised while reading or writing archives.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Filesystem failure
    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Magic number mismatch
    #[error("invalid magic number, expected {expected:#010x} got {found:#010x}")]
    BadMagic {
        /// Magic this reader understands
        expected: u32,
        /// Magic found in the file
        found: u32,
    },
    /// Version mismatch
    #[error("invalid version, expected {expected}, got {found}")]
    UnsupportedVersion {
        /// Version this reader understands
        expected: u32,
        /// Version found in the file
        found: u32,
    },
    /// The data ended inside a record
    #[error("unexpected end of archive at offset {offset}")]
    UnexpectedEof {
        /// Byte offset of the failed read
        offset: usize,
    },
    /// Unknown constant tag
    #[error("unknown constant kind {kind} at offset {offset}")]
    InvalidConstantKind {
        /// The tag byte
        kind: u8,
        /// Byte offset of the tag
        offset: usize,
    },
    /// A string was not valid UTF-8
    #[error("invalid UTF-8 string at offset {offset}")]
    InvalidUtf8 {
        /// Byte offset of the string
        offset: usize,
    },
    /// Lookup of a module the archive does not contain
    #[error("archive has no module {id}")]
    UnknownModule {
        /// Requested module id
        id: u32,
    },
    /// A module had inconsistent instruction/span counts
    #[error("malformed code object: {0}")]
    Malformed(String),
    /// A string to be written holds a NUL byte, which terminates strings on disk
    #[error("string {value:?} contains a NUL byte and cannot be archived")]
    NulInString {
        /// The offending string
        value: String,
    },
}

impl From<ArchiveError> for BondError {
    fn from(error: ArchiveError) -> Self {
        BondError::new(ErrorKind::ArchiveError, error.to_string())
    }
}

/// A set of compiled modules keyed by module id.
///
/// The first module is the entry point.
///
/// # Examples
///
/// ```
/// use bytecode_system::{Archive, Code, Constant, Opcode};
/// use core_types::Span;
///
/// let mut code = Code::new();
/// let idx = code.add_constant(Constant::String("hello".into()));
/// code.add_ins_operand(Opcode::LoadConst, idx, Span::default());
/// code.add_ins(Opcode::Return, Span::default());
///
/// let mut archive = Archive::new();
/// archive.add_module(0, code.clone());
///
/// let bytes = archive.to_bytes().unwrap();
/// let restored = Archive::from_bytes(&bytes).unwrap();
/// assert_eq!(restored.get(0), Some(&code));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Archive {
    modules: Vec<(u32, Code)>,
}

impl Archive {
    /// Create an empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) module `id`.
    pub fn add_module(&mut self, id: u32, code: Code) {
        match self.modules.iter_mut().find(|(m, _)| *m == id) {
            Some(entry) => entry.1 = code,
            None => self.modules.push((id, code)),
        }
    }

    /// All modules in archive order.
    pub fn modules(&self) -> &[(u32, Code)] {
        &self.modules
    }

    /// Module `id`.
    pub fn get(&self, id: u32) -> Option<&Code> {
        self.modules.iter().find(|(m, _)| *m == id).map(|(_, c)| c)
    }

    /// Module `id`, or [`ArchiveError::UnknownModule`].
    pub fn require(&self, id: u32) -> Result<&Code, ArchiveError> {
        self.get(id).ok_or(ArchiveError::UnknownModule { id })
    }

    /// The entry module (the first one written).
    pub fn entry(&self) -> Option<(u32, &Code)> {
        self.modules.first().map(|(id, code)| (*id, code))
    }

    /// Number of modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// True when the archive holds no module.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Serialize to bytes.
    ///
    /// Fails with [`ArchiveError::NulInString`] when a name or string
    /// constant contains a NUL byte.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ArchiveError> {
        let mut writer = Writer::default();
        writer.u32(BOND_MAGIC);
        writer.u32(BOND_VERSION);
        writer.u32(self.modules.len() as u32);
        for (id, code) in &self.modules {
            writer.u32(*id);
            writer.code(code)?;
        }
        Ok(writer.bytes)
    }

    /// Parse bytes produced by [`Archive::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArchiveError> {
        let mut reader = Reader::new(bytes);
        let magic = reader.u32()?;
        if magic != BOND_MAGIC {
            return Err(ArchiveError::BadMagic {
                expected: BOND_MAGIC,
                found: magic,
            });
        }
        let version = reader.u32()?;
        if version != BOND_VERSION {
            return Err(ArchiveError::UnsupportedVersion {
                expected: BOND_VERSION,
                found: version,
            });
        }
        let count = reader.u32()?;
        let mut modules = Vec::new();
        for _ in 0..count {
            let id = reader.u32()?;
            modules.push((id, reader.code()?));
        }
        Ok(Archive { modules })
    }

    /// Write the archive to `path`.
    pub fn save(&self, path: &Path) -> Result<(), ArchiveError> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, &bytes)?;
        debug!(path = %path.display(), modules = self.modules.len(), bytes = bytes.len(), "wrote archive");
        Ok(())
    }

    /// Read an archive from `path`.
    pub fn load(path: &Path) -> Result<Self, ArchiveError> {
        let bytes = std::fs::read(path)?;
        let archive = Self::from_bytes(&bytes)?;
        debug!(path = %path.display(), modules = archive.modules.len(), "read archive");
        Ok(archive)
    }
}

#[derive(Default)]
struct Writer {
    bytes: Vec<u8>,
}

impl Writer {
    fn u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    fn u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn str(&mut self, value: &str) -> Result<(), ArchiveError> {
        if value.contains('\0') {
            return Err(ArchiveError::NulInString {
                value: value.to_string(),
            });
        }
        self.bytes.extend_from_slice(value.as_bytes());
        self.bytes.push(0);
        Ok(())
    }

    fn span(&mut self, span: &Span) {
        self.u32(span.module_id);
        self.u32(span.start);
        self.u32(span.end);
        self.u32(span.line);
    }

    fn function(&mut self, function: &FunctionProto) -> Result<(), ArchiveError> {
        self.str(&function.name)?;
        self.u32(function.params.len() as u32);
        self.code(&function.code)?;
        for param in &function.params {
            self.str(&param.name)?;
            self.span(&param.span);
        }
        Ok(())
    }

    fn code(&mut self, code: &Code) -> Result<(), ArchiveError> {
        self.u32(code.constants.len() as u32);
        self.u32(code.instructions.len() as u32);
        self.u32(code.spans.len() as u32);
        for constant in &code.constants {
            match constant {
                Constant::Int(value) => {
                    self.u8(KIND_INT);
                    self.bytes.extend_from_slice(&value.to_le_bytes());
                }
                Constant::String(value) => {
                    self.u8(KIND_STRING);
                    self.str(value)?;
                }
                Constant::Float(value) => {
                    self.u8(KIND_FLOAT);
                    self.bytes.extend_from_slice(&value.to_le_bytes());
                }
                Constant::Function(function) => {
                    self.u8(KIND_FUNCTION);
                    self.function(function)?;
                }
                Constant::Struct(st) => {
                    self.u8(KIND_STRUCT);
                    self.str(&st.name)?;
                    self.u32(st.fields.len() as u32);
                    self.u32(st.methods.len() as u32);
                    for field in &st.fields {
                        self.str(field)?;
                    }
                    for (name, method) in &st.methods {
                        self.str(name)?;
                        self.function(method)?;
                    }
                }
            }
        }
        for word in &code.instructions {
            self.u32(*word);
        }
        for span in &code.spans {
            self.span(span);
        }
        Ok(())
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, offset: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], ArchiveError> {
        let end = self.offset + N;
        let slice = self
            .bytes
            .get(self.offset..end)
            .ok_or(ArchiveError::UnexpectedEof { offset: self.offset })?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        self.offset = end;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, ArchiveError> {
        Ok(self.take::<1>()?[0])
    }

    fn u32(&mut self) -> Result<u32, ArchiveError> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    fn i64(&mut self) -> Result<i64, ArchiveError> {
        Ok(i64::from_le_bytes(self.take()?))
    }

    fn f64(&mut self) -> Result<f64, ArchiveError> {
        Ok(f64::from_le_bytes(self.take()?))
    }

    fn str(&mut self) -> Result<String, ArchiveError> {
        let start = self.offset;
        let rest = &self.bytes[start..];
        let len = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or(ArchiveError::UnexpectedEof { offset: self.bytes.len() })?;
        let text = std::str::from_utf8(&rest[..len])
            .map_err(|_| ArchiveError::InvalidUtf8 { offset: start })?;
        self.offset += len + 1;
        Ok(text.to_string())
    }

    fn span(&mut self) -> Result<Span, ArchiveError> {
        Ok(Span {
            module_id: self.u32()?,
            start: self.u32()?,
            end: self.u32()?,
            line: self.u32()?,
        })
    }

    fn function(&mut self) -> Result<FunctionProto, ArchiveError> {
        let name = self.str()?;
        let param_count = self.u32()?;
        let code = self.code()?;
        let mut params = Vec::new();
        for _ in 0..param_count {
            let name = self.str()?;
            let span = self.span()?;
            params.push(Param { name, span });
        }
        Ok(FunctionProto {
            name,
            params,
            code: Rc::new(code),
        })
    }

    fn code(&mut self) -> Result<Code, ArchiveError> {
        let const_count = self.u32()?;
        let instr_count = self.u32()?;
        let span_count = self.u32()?;
        if instr_count != span_count {
            return Err(ArchiveError::Malformed(format!(
                "{} instructions but {} spans",
                instr_count, span_count
            )));
        }

        let mut constants = Vec::new();
        for _ in 0..const_count {
            let at = self.offset;
            let constant = match self.u8()? {
                KIND_INT => Constant::Int(self.i64()?),
                KIND_STRING => Constant::String(self.str()?),
                KIND_FLOAT => Constant::Float(self.f64()?),
                KIND_FUNCTION => Constant::Function(Rc::new(self.function()?)),
                KIND_STRUCT => {
                    let name = self.str()?;
                    let field_count = self.u32()?;
                    let method_count = self.u32()?;
                    let mut fields = Vec::new();
                    for _ in 0..field_count {
                        fields.push(self.str()?);
                    }
                    let mut methods = Vec::new();
                    for _ in 0..method_count {
                        let method_name = self.str()?;
                        methods.push((method_name, Rc::new(self.function()?)));
                    }
                    Constant::Struct(Rc::new(StructProto {
                        name,
                        fields,
                        methods,
                    }))
                }
                kind => return Err(ArchiveError::InvalidConstantKind { kind, offset: at }),
            };
            constants.push(constant);
        }

        let mut instructions = Vec::new();
        for _ in 0..instr_count {
            instructions.push(self.u32()?);
        }
        let mut spans = Vec::new();
        for _ in 0..span_count {
            spans.push(self.span()?);
        }
        Ok(Code::from_parts(instructions, constants, spans))
    }
}
