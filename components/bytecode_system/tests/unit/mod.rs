//! Unit tests for bytecode_system

mod test_archive;
mod test_code;
mod test_disassemble;
