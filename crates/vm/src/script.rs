//! Script module for the Neo Virtual Machine.
//!
//! A [`Script`] owns the raw bytecode of a contract and caches every
//! instruction decoded from it. Scripts are cheap to clone and compare by
//! identity: two clones of the same `Script` are the same script, two scripts
//! built from equal bytes are not.

use crate::error::{VmError, VmResult};
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::StackItemType;
use hashbrown::HashMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

struct ScriptInner {
    value: Vec<u8>,
    strict: bool,
    instructions: RwLock<HashMap<usize, Arc<Instruction>>>,
}

/// Bytecode plus its decoded instruction cache.
#[derive(Clone)]
pub struct Script {
    inner: Arc<ScriptInner>,
}

impl Script {
    /// Creates a script without validation. Malformed bytes only fault when executed.
    pub fn new(script: impl Into<Vec<u8>>) -> Self {
        Self {
            inner: Arc::new(ScriptInner {
                value: script.into(),
                strict: false,
                instructions: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Creates a script and validates every instruction and branch target up front.
    pub fn new_strict(script: impl Into<Vec<u8>>) -> VmResult<Self> {
        let value = script.into();
        let mut instructions = HashMap::new();

        let mut ip = 0;
        while ip < value.len() {
            let instruction = Instruction::parse(&value, ip)?;
            let size = instruction.size();
            instructions.insert(ip, Arc::new(instruction));
            ip += size;
        }

        for (&ip, instruction) in &instructions {
            Self::validate(&instructions, ip, instruction)?;
        }

        Ok(Self {
            inner: Arc::new(ScriptInner {
                value,
                strict: true,
                instructions: RwLock::new(instructions),
            }),
        })
    }

    fn validate(
        instructions: &HashMap<usize, Arc<Instruction>>,
        ip: usize,
        instruction: &Instruction,
    ) -> VmResult<()> {
        let check = |offset: i64| -> VmResult<()> {
            let target = ip as i64 + offset;
            if target < 0 || !instructions.contains_key(&(target as usize)) {
                return Err(VmError::bad_script_msg(format!(
                    "ip: {ip}, opcode: {}",
                    instruction.opcode()
                )));
            }
            Ok(())
        };

        match instruction.opcode() {
            OpCode::JMP
            | OpCode::JMPIF
            | OpCode::JMPIFNOT
            | OpCode::JMPEQ
            | OpCode::JMPNE
            | OpCode::JMPGT
            | OpCode::JMPGE
            | OpCode::JMPLT
            | OpCode::JMPLE
            | OpCode::CALL
            | OpCode::ENDTRY => check(instruction.token_i8() as i64),
            OpCode::PUSHA
            | OpCode::JMP_L
            | OpCode::JMPIF_L
            | OpCode::JMPIFNOT_L
            | OpCode::JMPEQ_L
            | OpCode::JMPNE_L
            | OpCode::JMPGT_L
            | OpCode::JMPGE_L
            | OpCode::JMPLT_L
            | OpCode::JMPLE_L
            | OpCode::CALL_L
            | OpCode::ENDTRY_L => check(instruction.token_i32() as i64),
            OpCode::TRY => {
                check(instruction.token_i8() as i64)?;
                check(instruction.token_i8_1() as i64)
            }
            OpCode::TRY_L => {
                check(instruction.token_i32() as i64)?;
                check(instruction.token_i32_1() as i64)
            }
            OpCode::NEWARRAY_T | OpCode::ISTYPE | OpCode::CONVERT => {
                let byte = instruction.token_u8();
                let item_type = StackItemType::from_byte(byte).ok_or_else(|| {
                    VmError::bad_script_msg(format!("Invalid type {byte:#04x} at {ip}"))
                })?;
                if instruction.opcode() != OpCode::NEWARRAY_T && item_type == StackItemType::Any {
                    return Err(VmError::bad_script_msg(format!(
                        "ip: {ip}, opcode: {}, type: Any",
                        instruction.opcode()
                    )));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Returns the raw bytecode.
    pub fn as_bytes(&self) -> &[u8] {
        &self.inner.value
    }

    pub fn len(&self) -> usize {
        self.inner.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.value.is_empty()
    }

    /// Returns `true` when the script was validated by [`Script::new_strict`].
    pub fn is_strict(&self) -> bool {
        self.inner.strict
    }

    /// Returns the instruction at `ip`, decoding and caching it on first access.
    ///
    /// Strict scripts only answer for instruction boundaries found during validation.
    pub fn get_instruction(&self, ip: usize) -> VmResult<Arc<Instruction>> {
        if ip >= self.len() {
            return Err(VmError::index_out_of_range_msg(format!(
                "Instruction pointer {ip} is out of range of script length {}",
                self.len()
            )));
        }

        if let Some(instruction) = self.inner.instructions.read().get(&ip) {
            return Ok(Arc::clone(instruction));
        }

        if self.inner.strict {
            return Err(VmError::invalid_operation_msg(format!(
                "ip {ip} not found or is not a valid instruction"
            )));
        }

        let instruction = Arc::new(Instruction::parse(&self.inner.value, ip)?);
        self.inner
            .instructions
            .write()
            .insert(ip, Arc::clone(&instruction));
        Ok(instruction)
    }

    /// Returns `true` if both handles refer to the same script.
    pub fn ptr_eq(&self, other: &Script) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl From<Vec<u8>> for Script {
    fn from(value: Vec<u8>) -> Self {
        Script::new(value)
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Script")
            .field("length", &self.len())
            .field("strict", &self.inner.strict)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instructions_are_cached() {
        let script = Script::new(vec![OpCode::PUSH1 as u8, OpCode::RET as u8]);
        let a = script.get_instruction(0).unwrap();
        let b = script.get_instruction(0).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(script.get_instruction(1).unwrap().opcode(), OpCode::RET);
        assert!(script.get_instruction(2).is_err());
    }

    #[test]
    fn test_non_strict_tolerates_trailing_garbage() {
        let script = Script::new(vec![OpCode::RET as u8, 0xFF]);
        assert!(script.get_instruction(0).is_ok());
        assert_eq!(
            script.get_instruction(1).unwrap_err(),
            VmError::InvalidOpCode(0xFF)
        );
    }

    #[test]
    fn test_strict_rejects_bad_jump_target() {
        // JMP +1 lands inside its own operand.
        let bytes = vec![OpCode::JMP as u8, 0x01, OpCode::RET as u8];
        assert!(matches!(Script::new_strict(bytes), Err(VmError::BadScript(_))));

        let bytes = vec![OpCode::JMP as u8, 0x02, OpCode::RET as u8];
        assert!(Script::new_strict(bytes).is_ok());
    }

    #[test]
    fn test_strict_rejects_undefined_opcode_and_bad_type() {
        assert!(Script::new_strict(vec![0xFF]).is_err());
        assert!(Script::new_strict(vec![OpCode::ISTYPE as u8, 0x00]).is_err());
        assert!(Script::new_strict(vec![OpCode::CONVERT as u8, 0x22]).is_err());
        assert!(Script::new_strict(vec![OpCode::NEWARRAY_T as u8, 0x00]).is_ok());
    }

    #[test]
    fn test_strict_only_answers_boundaries() {
        let script =
            Script::new_strict(vec![OpCode::PUSHINT8 as u8, 0x05, OpCode::RET as u8]).unwrap();
        assert!(script.get_instruction(0).is_ok());
        assert!(script.get_instruction(1).is_err());
        assert!(script.get_instruction(2).is_ok());
    }

    #[test]
    fn test_identity() {
        let a = Script::new(vec![0x40]);
        let b = a.clone();
        let c = Script::new(vec![0x40]);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
    }
}
