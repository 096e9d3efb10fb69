//! Opcode definitions for the Neo Virtual Machine.
//!
//! The byte values and operand layouts form the binary contract of the
//! bytecode format and must not change.

pub mod operand_size;

pub use operand_size::OperandSize;

use crate::error::{VmError, VmResult};
use std::fmt;

macro_rules! define_opcodes {
    ($( $(#[$meta:meta])* $name:ident = $value:literal $(=> $size:expr)? ),* $(,)?) => {
        /// An instruction opcode.
        #[repr(u8)]
        #[allow(non_camel_case_types)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum OpCode {
            $( $(#[$meta])* $name = $value, )*
        }

        impl OpCode {
            /// Every defined opcode in byte order.
            pub const ALL: &'static [OpCode] = &[ $( OpCode::$name, )* ];

            /// Decodes an opcode byte, returning `None` for undefined values.
            pub fn from_byte(byte: u8) -> Option<Self> {
                match byte {
                    $( $value => Some(OpCode::$name), )*
                    _ => None,
                }
            }

            /// Returns the operand layout of this opcode.
            pub fn operand_size(self) -> OperandSize {
                match self {
                    $( OpCode::$name => define_opcodes!(@size $($size)?), )*
                }
            }

            /// Returns the mnemonic.
            pub fn name(self) -> &'static str {
                match self {
                    $( OpCode::$name => stringify!($name), )*
                }
            }
        }
    };
    (@size) => { OperandSize::NONE };
    (@size $size:expr) => { $size };
}

define_opcodes! {
    // Constants
    /// Pushes a 1-byte signed integer.
    PUSHINT8 = 0x00 => OperandSize::fixed(1),
    /// Pushes a 2-byte signed integer.
    PUSHINT16 = 0x01 => OperandSize::fixed(2),
    /// Pushes a 4-byte signed integer.
    PUSHINT32 = 0x02 => OperandSize::fixed(4),
    /// Pushes an 8-byte signed integer.
    PUSHINT64 = 0x03 => OperandSize::fixed(8),
    /// Pushes a 16-byte signed integer.
    PUSHINT128 = 0x04 => OperandSize::fixed(16),
    /// Pushes a 32-byte signed integer.
    PUSHINT256 = 0x05 => OperandSize::fixed(32),
    PUSHT = 0x08,
    PUSHF = 0x09,
    /// Pushes a pointer relative to the current instruction.
    PUSHA = 0x0A => OperandSize::fixed(4),
    PUSHNULL = 0x0B,
    /// Pushes data whose length is given by a 1-byte prefix.
    PUSHDATA1 = 0x0C => OperandSize::prefix(1),
    /// Pushes data whose length is given by a 2-byte prefix.
    PUSHDATA2 = 0x0D => OperandSize::prefix(2),
    /// Pushes data whose length is given by a 4-byte prefix.
    PUSHDATA4 = 0x0E => OperandSize::prefix(4),
    PUSHM1 = 0x0F,
    PUSH0 = 0x10,
    PUSH1 = 0x11,
    PUSH2 = 0x12,
    PUSH3 = 0x13,
    PUSH4 = 0x14,
    PUSH5 = 0x15,
    PUSH6 = 0x16,
    PUSH7 = 0x17,
    PUSH8 = 0x18,
    PUSH9 = 0x19,
    PUSH10 = 0x1A,
    PUSH11 = 0x1B,
    PUSH12 = 0x1C,
    PUSH13 = 0x1D,
    PUSH14 = 0x1E,
    PUSH15 = 0x1F,
    PUSH16 = 0x20,

    // Flow control
    NOP = 0x21,
    JMP = 0x22 => OperandSize::fixed(1),
    JMP_L = 0x23 => OperandSize::fixed(4),
    JMPIF = 0x24 => OperandSize::fixed(1),
    JMPIF_L = 0x25 => OperandSize::fixed(4),
    JMPIFNOT = 0x26 => OperandSize::fixed(1),
    JMPIFNOT_L = 0x27 => OperandSize::fixed(4),
    JMPEQ = 0x28 => OperandSize::fixed(1),
    JMPEQ_L = 0x29 => OperandSize::fixed(4),
    JMPNE = 0x2A => OperandSize::fixed(1),
    JMPNE_L = 0x2B => OperandSize::fixed(4),
    JMPGT = 0x2C => OperandSize::fixed(1),
    JMPGT_L = 0x2D => OperandSize::fixed(4),
    JMPGE = 0x2E => OperandSize::fixed(1),
    JMPGE_L = 0x2F => OperandSize::fixed(4),
    JMPLT = 0x30 => OperandSize::fixed(1),
    JMPLT_L = 0x31 => OperandSize::fixed(4),
    JMPLE = 0x32 => OperandSize::fixed(1),
    JMPLE_L = 0x33 => OperandSize::fixed(4),
    CALL = 0x34 => OperandSize::fixed(1),
    CALL_L = 0x35 => OperandSize::fixed(4),
    /// Calls the function a pointer on the stack refers to.
    CALLA = 0x36,
    /// Calls a function through a method token.
    CALLT = 0x37 => OperandSize::fixed(2),
    ABORT = 0x38,
    ASSERT = 0x39,
    THROW = 0x3A,
    /// Opens a try block; the operand holds the catch and finally offsets.
    TRY = 0x3B => OperandSize::fixed(2),
    TRY_L = 0x3C => OperandSize::fixed(8),
    ENDTRY = 0x3D => OperandSize::fixed(1),
    ENDTRY_L = 0x3E => OperandSize::fixed(4),
    ENDFINALLY = 0x3F,
    RET = 0x40,
    SYSCALL = 0x41 => OperandSize::fixed(4),

    // Stack
    DEPTH = 0x43,
    DROP = 0x45,
    NIP = 0x46,
    XDROP = 0x48,
    CLEAR = 0x49,
    DUP = 0x4A,
    OVER = 0x4B,
    PICK = 0x4D,
    TUCK = 0x4E,
    SWAP = 0x50,
    ROT = 0x51,
    ROLL = 0x52,
    REVERSE3 = 0x53,
    REVERSE4 = 0x54,
    REVERSEN = 0x55,

    // Slot
    INITSSLOT = 0x56 => OperandSize::fixed(1),
    INITSLOT = 0x57 => OperandSize::fixed(2),
    LDSFLD0 = 0x58,
    LDSFLD1 = 0x59,
    LDSFLD2 = 0x5A,
    LDSFLD3 = 0x5B,
    LDSFLD4 = 0x5C,
    LDSFLD5 = 0x5D,
    LDSFLD6 = 0x5E,
    LDSFLD = 0x5F => OperandSize::fixed(1),
    STSFLD0 = 0x60,
    STSFLD1 = 0x61,
    STSFLD2 = 0x62,
    STSFLD3 = 0x63,
    STSFLD4 = 0x64,
    STSFLD5 = 0x65,
    STSFLD6 = 0x66,
    STSFLD = 0x67 => OperandSize::fixed(1),
    LDLOC0 = 0x68,
    LDLOC1 = 0x69,
    LDLOC2 = 0x6A,
    LDLOC3 = 0x6B,
    LDLOC4 = 0x6C,
    LDLOC5 = 0x6D,
    LDLOC6 = 0x6E,
    LDLOC = 0x6F => OperandSize::fixed(1),
    STLOC0 = 0x70,
    STLOC1 = 0x71,
    STLOC2 = 0x72,
    STLOC3 = 0x73,
    STLOC4 = 0x74,
    STLOC5 = 0x75,
    STLOC6 = 0x76,
    STLOC = 0x77 => OperandSize::fixed(1),
    LDARG0 = 0x78,
    LDARG1 = 0x79,
    LDARG2 = 0x7A,
    LDARG3 = 0x7B,
    LDARG4 = 0x7C,
    LDARG5 = 0x7D,
    LDARG6 = 0x7E,
    LDARG = 0x7F => OperandSize::fixed(1),
    STARG0 = 0x80,
    STARG1 = 0x81,
    STARG2 = 0x82,
    STARG3 = 0x83,
    STARG4 = 0x84,
    STARG5 = 0x85,
    STARG6 = 0x86,
    STARG = 0x87 => OperandSize::fixed(1),

    // Splice
    NEWBUFFER = 0x88,
    MEMCPY = 0x89,
    CAT = 0x8B,
    SUBSTR = 0x8C,
    LEFT = 0x8D,
    RIGHT = 0x8E,

    // Bitwise logic
    INVERT = 0x90,
    AND = 0x91,
    OR = 0x92,
    XOR = 0x93,
    EQUAL = 0x97,
    NOTEQUAL = 0x98,

    // Arithmetic
    SIGN = 0x99,
    ABS = 0x9A,
    NEGATE = 0x9B,
    INC = 0x9C,
    DEC = 0x9D,
    ADD = 0x9E,
    SUB = 0x9F,
    MUL = 0xA0,
    DIV = 0xA1,
    MOD = 0xA2,
    POW = 0xA3,
    SQRT = 0xA4,
    MODMUL = 0xA5,
    /// Modular exponentiation; an exponent of -1 computes the modular inverse.
    MODPOW = 0xA6,
    SHL = 0xA8,
    SHR = 0xA9,
    NOT = 0xAA,
    BOOLAND = 0xAB,
    BOOLOR = 0xAC,
    NZ = 0xB1,
    NUMEQUAL = 0xB3,
    NUMNOTEQUAL = 0xB4,
    LT = 0xB5,
    LE = 0xB6,
    GT = 0xB7,
    GE = 0xB8,
    MIN = 0xB9,
    MAX = 0xBA,
    WITHIN = 0xBB,

    // Compound types
    PACKMAP = 0xBE,
    PACKSTRUCT = 0xBF,
    PACK = 0xC0,
    UNPACK = 0xC1,
    NEWARRAY0 = 0xC2,
    NEWARRAY = 0xC3,
    NEWARRAY_T = 0xC4 => OperandSize::fixed(1),
    NEWSTRUCT0 = 0xC5,
    NEWSTRUCT = 0xC6,
    NEWMAP = 0xC8,
    SIZE = 0xCA,
    HASKEY = 0xCB,
    KEYS = 0xCC,
    VALUES = 0xCD,
    PICKITEM = 0xCE,
    APPEND = 0xCF,
    SETITEM = 0xD0,
    REVERSEITEMS = 0xD1,
    REMOVE = 0xD2,
    CLEARITEMS = 0xD3,
    POPITEM = 0xD4,

    // Types
    ISNULL = 0xD8,
    ISTYPE = 0xD9 => OperandSize::fixed(1),
    CONVERT = 0xDB => OperandSize::fixed(1),

    // Extensions
    ABORTMSG = 0xE0,
    ASSERTMSG = 0xE1,
}

impl OpCode {
    /// Returns the opcode byte.
    #[inline]
    pub fn byte(self) -> u8 {
        self as u8
    }

    /// Returns `true` for the relative jump family `JMP` through `JMPLE_L`.
    pub fn is_jump(self) -> bool {
        (OpCode::JMP.byte()..=OpCode::JMPLE_L.byte()).contains(&self.byte())
    }
}

impl TryFrom<u8> for OpCode {
    type Error = VmError;

    fn try_from(byte: u8) -> VmResult<Self> {
        OpCode::from_byte(byte).ok_or(VmError::InvalidOpCode(byte))
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> Self {
        op as u8
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
