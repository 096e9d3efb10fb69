//! Diagnostic hooks for observing an [`ExecutionEngine`].
//!
//! A diagnostic is attached with [`ExecutionEngine::set_diagnostic`] and is
//! told about context switches and every executed instruction. It cannot
//! alter execution.

use crate::execution_context::ExecutionContext;
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;

/// Observer of engine events. Every method defaults to a no-op.
pub trait Diagnostic {
    /// Called once when the diagnostic is attached to an engine.
    fn initialized(&mut self, _engine: &ExecutionEngine) {}

    /// Called when the engine is dropped.
    fn disposed(&mut self) {}

    /// Called after a context is pushed onto the invocation stack.
    fn context_loaded(&mut self, _context: &ExecutionContext) {}

    /// Called after a context is popped and its slots are released.
    fn context_unloaded(&mut self, _context: &ExecutionContext) {}

    fn pre_execute_instruction(&mut self, _instruction: &Instruction) {}

    fn post_execute_instruction(&mut self, _instruction: &Instruction) {}
}
