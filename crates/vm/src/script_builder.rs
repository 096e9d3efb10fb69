//! Script builder module for the Neo Virtual Machine.
//!
//! This module provides a way to programmatically construct scripts for the Neo VM.

use crate::error::{VmError, VmResult};
use crate::op_code::OpCode;
use crate::script::Script;
use crate::stack_item::integer;
use num_bigint::BigInt;

/// Helps construct VM scripts programmatically.
#[derive(Debug, Clone, Default)]
pub struct ScriptBuilder {
    /// The script being built
    script: Vec<u8>,
}

impl ScriptBuilder {
    /// Creates a new script builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of bytes emitted so far.
    pub fn len(&self) -> usize {
        self.script.len()
    }

    pub fn is_empty(&self) -> bool {
        self.script.is_empty()
    }

    /// Emits an opcode without an operand.
    pub fn emit(&mut self, opcode: OpCode) -> &mut Self {
        self.script.push(opcode as u8);
        self
    }

    /// Emits an opcode followed by `operand`.
    pub fn emit_with_operand(&mut self, opcode: OpCode, operand: &[u8]) -> &mut Self {
        self.script.push(opcode as u8);
        self.script.extend_from_slice(operand);
        self
    }

    /// Emits raw bytes to the script.
    pub fn emit_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.script.extend_from_slice(bytes);
        self
    }

    /// Emits an integer push with the shortest encoding.
    pub fn emit_push_int(&mut self, value: i64) -> &mut Self {
        if (-1..=16).contains(&value) {
            self.script.push((OpCode::PUSH0 as i64 + value) as u8);
            return self;
        }
        let bytes = integer::to_bytes(&BigInt::from(value));
        let (opcode, width) = match bytes.len() {
            1 => (OpCode::PUSHINT8, 1),
            2 => (OpCode::PUSHINT16, 2),
            3..=4 => (OpCode::PUSHINT32, 4),
            _ => (OpCode::PUSHINT64, 8),
        };
        self.emit_with_operand(opcode, &pad(bytes, width, value < 0))
    }

    /// Emits an integer push with the shortest encoding.
    ///
    /// Fails for values that need more than 32 bytes.
    pub fn emit_push_big_int(&mut self, value: &BigInt) -> VmResult<&mut Self> {
        if let Ok(small) = i64::try_from(value) {
            return Ok(self.emit_push_int(small));
        }
        let bytes = integer::to_bytes(value);
        let (opcode, width) = match bytes.len() {
            0..=8 => (OpCode::PUSHINT64, 8),
            9..=16 => (OpCode::PUSHINT128, 16),
            17..=32 => (OpCode::PUSHINT256, 32),
            _ => {
                return Err(VmError::invalid_operation_msg(
                    "Invalid value: BigInteger is too large",
                ))
            }
        };
        let negative = value.sign() == num_bigint::Sign::Minus;
        Ok(self.emit_with_operand(opcode, &pad(bytes, width, negative)))
    }

    /// Emits a push operation for a boolean.
    pub fn emit_push_bool(&mut self, value: bool) -> &mut Self {
        if value {
            self.emit(OpCode::PUSHT)
        } else {
            self.emit(OpCode::PUSHF)
        }
    }

    /// Emits a data push using the smallest `PUSHDATA` form.
    pub fn emit_push_bytes(&mut self, data: &[u8]) -> &mut Self {
        let len = data.len();
        if len < 0x100 {
            self.emit_with_operand(OpCode::PUSHDATA1, &[len as u8]);
        } else if len < 0x10000 {
            self.emit_with_operand(OpCode::PUSHDATA2, &(len as u16).to_le_bytes());
        } else {
            self.emit_with_operand(OpCode::PUSHDATA4, &(len as u32).to_le_bytes());
        }
        self.emit_raw(data)
    }

    /// Emits a push operation for a string, as UTF-8.
    pub fn emit_push_string(&mut self, value: &str) -> &mut Self {
        self.emit_push_bytes(value.as_bytes())
    }

    /// Emits a call with a relative offset, using `CALL_L` when it does not fit in a byte.
    pub fn emit_call(&mut self, offset: i32) -> &mut Self {
        match i8::try_from(offset) {
            Ok(short) => self.emit_with_operand(OpCode::CALL, &[short as u8]),
            Err(_) => self.emit_with_operand(OpCode::CALL_L, &offset.to_le_bytes()),
        }
    }

    /// Emits a jump with a relative offset.
    ///
    /// A short form is widened to its `_L` form when the offset does not fit in a byte.
    pub fn emit_jump(&mut self, opcode: OpCode, offset: i32) -> VmResult<&mut Self> {
        if !opcode.is_jump() {
            return Err(VmError::invalid_operation_msg(format!(
                "Invalid jump opcode: {opcode}"
            )));
        }
        let is_short = (opcode.byte() - OpCode::JMP.byte()) % 2 == 0;
        match (is_short, i8::try_from(offset)) {
            (true, Ok(short)) => Ok(self.emit_with_operand(opcode, &[short as u8])),
            (true, Err(_)) => {
                let long = OpCode::from_byte(opcode.byte() + 1).ok_or_else(|| {
                    VmError::invalid_operation_msg(format!("Invalid jump opcode: {opcode}"))
                })?;
                Ok(self.emit_with_operand(long, &offset.to_le_bytes()))
            }
            (false, _) => Ok(self.emit_with_operand(opcode, &offset.to_le_bytes())),
        }
    }

    /// Emits a system call by its method hash.
    pub fn emit_syscall(&mut self, api: u32) -> &mut Self {
        self.emit_with_operand(OpCode::SYSCALL, &api.to_le_bytes())
    }

    /// Returns a copy of the bytecode.
    pub fn to_array(&self) -> Vec<u8> {
        self.script.clone()
    }

    /// Builds a non-strict script from the bytecode.
    pub fn to_script(&self) -> Script {
        Script::new(self.script.clone())
    }
}

/// Sign-extends little-endian `bytes` to `width`.
fn pad(mut bytes: Vec<u8>, width: usize, negative: bool) -> Vec<u8> {
    let fill = if negative { 0xFF } else { 0x00 };
    bytes.resize(width, fill);
    bytes
}
