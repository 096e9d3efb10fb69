//! Instruction module for the Neo Virtual Machine.
//!
//! An [`Instruction`] is one decoded opcode together with its operand bytes.

use crate::error::{VmError, VmResult};
use crate::op_code::OpCode;
use std::fmt;

/// A decoded instruction.
#[derive(Clone, PartialEq, Eq)]
pub struct Instruction {
    opcode: OpCode,
    operand: Vec<u8>,
}

impl Instruction {
    /// Creates an instruction from an opcode and its raw operand.
    pub fn new(opcode: OpCode, operand: Vec<u8>) -> Self {
        Self { opcode, operand }
    }

    /// The instruction executed when the instruction pointer reaches the end of a script.
    pub fn ret() -> Self {
        Self::new(OpCode::RET, Vec::new())
    }

    /// Decodes the instruction starting at `ip`.
    pub fn parse(script: &[u8], ip: usize) -> VmResult<Self> {
        let byte = *script.get(ip).ok_or_else(|| {
            VmError::bad_script_msg(format!(
                "Instruction out of bounds. InstructionPointer: {ip}, length: {}",
                script.len()
            ))
        })?;
        let opcode = OpCode::try_from(byte)?;
        let layout = opcode.operand_size();

        let mut start = ip + 1;
        let size = if layout.has_size_prefix() {
            let prefix = layout.size_prefix();
            let bytes = script.get(start..start + prefix).ok_or_else(|| {
                VmError::bad_script_msg(format!(
                    "Instruction out of bounds. InstructionPointer: {ip}, prefixSize: {prefix}, length: {}",
                    script.len()
                ))
            })?;
            start += prefix;
            let mut buf = [0u8; 4];
            buf[..prefix].copy_from_slice(bytes);
            let size = u32::from_le_bytes(buf);
            if size > i32::MAX as u32 {
                return Err(VmError::bad_script_msg(format!(
                    "Invalid operand size {size} at {ip}"
                )));
            }
            size as usize
        } else {
            layout.size()
        };

        let operand = script.get(start..start + size).ok_or_else(|| {
            VmError::bad_script_msg(format!(
                "Instruction out of bounds. InstructionPointer: {ip}, operandSize: {size}, length: {}",
                script.len()
            ))
        })?;

        Ok(Self::new(opcode, operand.to_vec()))
    }

    /// Returns the opcode.
    #[inline]
    pub fn opcode(&self) -> OpCode {
        self.opcode
    }

    /// Returns the operand bytes, excluding any length prefix.
    #[inline]
    pub fn operand(&self) -> &[u8] {
        &self.operand
    }

    /// Encoded size in bytes, including the opcode and any length prefix.
    pub fn size(&self) -> usize {
        let layout = self.opcode.operand_size();
        if layout.has_size_prefix() {
            1 + layout.size_prefix() + self.operand.len()
        } else {
            1 + layout.size()
        }
    }

    fn operand_bytes<const N: usize>(&self, offset: usize) -> [u8; N] {
        let mut buf = [0u8; N];
        if let Some(tail) = self.operand.get(offset..) {
            let n = tail.len().min(N);
            buf[..n].copy_from_slice(&tail[..n]);
        }
        buf
    }

    pub fn token_i8(&self) -> i8 {
        i8::from_le_bytes(self.operand_bytes::<1>(0))
    }

    /// The second signed byte of the operand, used by `TRY`.
    pub fn token_i8_1(&self) -> i8 {
        i8::from_le_bytes(self.operand_bytes::<1>(1))
    }

    pub fn token_i16(&self) -> i16 {
        i16::from_le_bytes(self.operand_bytes::<2>(0))
    }

    pub fn token_i32(&self) -> i32 {
        i32::from_le_bytes(self.operand_bytes::<4>(0))
    }

    /// The second 32-bit signed integer of the operand, used by `TRY_L`.
    pub fn token_i32_1(&self) -> i32 {
        i32::from_le_bytes(self.operand_bytes::<4>(4))
    }

    pub fn token_u8(&self) -> u8 {
        self.operand_bytes::<1>(0)[0]
    }

    pub fn token_u8_1(&self) -> u8 {
        self.operand_bytes::<1>(1)[0]
    }

    pub fn token_u16(&self) -> u16 {
        u16::from_le_bytes(self.operand_bytes::<2>(0))
    }

    pub fn token_u32(&self) -> u32 {
        u32::from_le_bytes(self.operand_bytes::<4>(0))
    }

    /// The operand interpreted as text.
    pub fn token_string(&self) -> String {
        String::from_utf8_lossy(&self.operand).into_owned()
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operand.is_empty() {
            write!(f, "{}", self.opcode)
        } else {
            write!(f, "{} 0x", self.opcode)?;
            for b in &self.operand {
                write!(f, "{b:02x}")?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fixed_operand() {
        let script = [OpCode::PUSHINT16 as u8, 0x34, 0x12, OpCode::RET as u8];
        let instr = Instruction::parse(&script, 0).unwrap();
        assert_eq!(instr.opcode(), OpCode::PUSHINT16);
        assert_eq!(instr.size(), 3);
        assert_eq!(instr.token_i16(), 0x1234);

        let ret = Instruction::parse(&script, 3).unwrap();
        assert_eq!(ret, Instruction::ret());
    }

    #[test]
    fn test_parse_prefixed_operand() {
        let script = [OpCode::PUSHDATA1 as u8, 3, b'a', b'b', b'c'];
        let instr = Instruction::parse(&script, 0).unwrap();
        assert_eq!(instr.operand(), b"abc");
        assert_eq!(instr.size(), 5);
        assert_eq!(instr.token_string(), "abc");
    }

    #[test]
    fn test_truncated_operand_is_bad_script() {
        let script = [OpCode::PUSHINT32 as u8, 0x01, 0x02];
        assert!(matches!(
            Instruction::parse(&script, 0),
            Err(VmError::BadScript(_))
        ));

        let script = [OpCode::PUSHDATA2 as u8, 0x05];
        assert!(matches!(
            Instruction::parse(&script, 0),
            Err(VmError::BadScript(_))
        ));
    }

    #[test]
    fn test_undefined_opcode() {
        assert_eq!(
            Instruction::parse(&[0xFF], 0),
            Err(VmError::InvalidOpCode(0xFF))
        );
    }

    #[test]
    fn test_try_tokens() {
        let instr = Instruction::new(OpCode::TRY, vec![0x05, 0xFE]);
        assert_eq!(instr.token_i8(), 5);
        assert_eq!(instr.token_i8_1(), -2);

        let instr = Instruction::new(
            OpCode::TRY_L,
            vec![0x10, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF],
        );
        assert_eq!(instr.token_i32(), 16);
        assert_eq!(instr.token_i32_1(), -1);
    }
}
