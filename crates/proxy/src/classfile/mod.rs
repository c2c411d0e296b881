//! Generator-side helpers on top of `ristretto_classfile`: an interning
//! constant pool, member and attribute construction, and a bytecode
//! assembler that resolves labels and stack map frames.

pub mod attribute;
pub mod class;
pub mod code;
pub mod pool;

pub use class::{ClassWriter, read_class};
pub use code::{CodeBuilder, Label, VType, prepend_static_call};
pub use pool::Pool;
pub use ristretto_classfile::attributes::{Attribute, Instruction};

/// Access and property flags shared by classes, fields and methods. Some bits
/// mean different things depending on where they appear.
pub mod access {
    pub const PUBLIC: u16 = 0x0001;
    pub const PRIVATE: u16 = 0x0002;
    pub const PROTECTED: u16 = 0x0004;
    pub const STATIC: u16 = 0x0008;
    pub const FINAL: u16 = 0x0010;
    pub const SUPER: u16 = 0x0020;
    pub const SYNCHRONIZED: u16 = 0x0020;
    pub const VOLATILE: u16 = 0x0040;
    pub const BRIDGE: u16 = 0x0040;
    pub const TRANSIENT: u16 = 0x0080;
    pub const VARARGS: u16 = 0x0080;
    pub const NATIVE: u16 = 0x0100;
    pub const INTERFACE: u16 = 0x0200;
    pub const ABSTRACT: u16 = 0x0400;
    pub const STRICT: u16 = 0x0800;
    pub const SYNTHETIC: u16 = 0x1000;
    pub const ANNOTATION: u16 = 0x2000;
    pub const ENUM: u16 = 0x4000;
    pub const MODULE: u16 = 0x8000;

    pub fn is(flags: u16, flag: u16) -> bool {
        flags & flag != 0
    }
}
