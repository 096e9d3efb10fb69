//! Jump table module for the Neo Virtual Machine.
//!
//! The jump table maps every opcode byte to the function that executes it.
//! Hosts may copy the default table and replace individual handlers before
//! handing it to [`ExecutionEngine::new`].

pub mod bitwise;
pub mod compound;
pub mod control;
pub mod numeric;
pub mod push;
pub mod slot;
pub mod splice;
pub mod stack;
pub mod types;

use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use once_cell::sync::Lazy;
use std::fmt;

/// A handler for a VM instruction.
pub type InstructionHandler = fn(&mut ExecutionEngine, &Instruction) -> VmResult<()>;

static DEFAULT: Lazy<JumpTable> = Lazy::new(JumpTable::new);

/// Represents a jump table for the VM.
#[derive(Clone, Copy)]
pub struct JumpTable {
    /// One entry per opcode byte
    handlers: [Option<InstructionHandler>; 256],
}

impl Default for JumpTable {
    /// Returns a copy of the shared default table.
    fn default() -> Self {
        *DEFAULT
    }
}

impl JumpTable {
    /// Creates a table with every standard handler registered.
    pub fn new() -> Self {
        let mut jump_table = Self::empty();
        jump_table.register_default_handlers();
        jump_table
    }

    /// Creates a table with no handlers at all.
    pub fn empty() -> Self {
        Self {
            handlers: [None; 256],
        }
    }

    /// Registers a handler for an opcode, replacing any existing one.
    pub fn register(&mut self, opcode: OpCode, handler: InstructionHandler) {
        self.handlers[opcode as u8 as usize] = Some(handler);
    }

    /// Gets the handler for an opcode.
    pub fn get(&self, opcode: OpCode) -> Option<InstructionHandler> {
        self.handlers[opcode as u8 as usize]
    }

    /// Removes the handler for an opcode. Executing it afterwards faults.
    pub fn remove(&mut self, opcode: OpCode) {
        self.handlers[opcode as u8 as usize] = None;
    }

    /// Executes an instruction.
    pub fn execute(&self, engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
        match self.get(instruction.opcode()) {
            Some(handler) => handler(engine, instruction),
            None => Err(VmError::invalid_operation_msg(format!(
                "No handler registered for {}",
                instruction.opcode()
            ))),
        }
    }

    /// The number of opcodes with a handler.
    pub fn len(&self) -> usize {
        self.handlers.iter().filter(|h| h.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn register_default_handlers(&mut self) {
        push::register_handlers(self);
        control::register_handlers(self);
        stack::register_handlers(self);
        slot::register_handlers(self);
        splice::register_handlers(self);
        bitwise::register_handlers(self);
        numeric::register_handlers(self);
        compound::register_handlers(self);
        types::register_handlers(self);
    }
}

impl fmt::Debug for JumpTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JumpTable")
            .field("handlers", &self.len())
            .finish()
    }
}

/// Rejects negative counts and indices taken from the stack.
pub(crate) fn non_negative(value: i32, opcode: OpCode) -> VmResult<usize> {
    usize::try_from(value).map_err(|_| {
        VmError::invalid_operation_msg(format!(
            "The negative value {value} is invalid for OpCode.{opcode}."
        ))
    })
}

/// The error raised when a value from the stack falls outside its valid range.
pub(crate) fn out_of_range(value: impl fmt::Display) -> VmError {
    VmError::invalid_operation_msg(format!("The value {value} is out of range."))
}

/// Adds a signed offset to an instruction pointer.
pub(crate) fn offset_position(ip: usize, offset: i32) -> i64 {
    ip as i64 + i64::from(offset)
}
