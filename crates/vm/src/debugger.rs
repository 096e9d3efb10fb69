//! Debugger for the Neo Virtual Machine.
//!
//! This module provides debugging functionality for the Neo VM: breakpoints
//! keyed by script identity, and single stepping into, over and out of calls.

use crate::execution_engine::ExecutionEngine;
use crate::script::Script;
use crate::vm_state::VMState;
use std::collections::HashSet;

/// Represents a debugger for the VM.
///
/// The debugger owns the engine it drives. A breakpoint pauses execution in
/// the `BREAK` state once the current context's instruction pointer reaches
/// it, after the instruction before it has run.
#[derive(Debug)]
pub struct Debugger {
    /// The execution engine.
    engine: ExecutionEngine,

    /// The breakpoints, per script.
    breakpoints: Vec<(Script, HashSet<usize>)>,
}

impl Debugger {
    /// Creates a new debugger with the specified execution engine.
    pub fn new(engine: ExecutionEngine) -> Self {
        Self {
            engine,
            breakpoints: Vec::new(),
        }
    }

    /// Gets the execution engine.
    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    /// Gets a mutable reference to the execution engine.
    pub fn engine_mut(&mut self) -> &mut ExecutionEngine {
        &mut self.engine
    }

    /// Consumes the debugger and returns the engine.
    pub fn into_engine(self) -> ExecutionEngine {
        self.engine
    }

    /// Adds a breakpoint at `position` in `script`.
    pub fn add_breakpoint(&mut self, script: &Script, position: usize) {
        match self.positions_mut(script) {
            Some(positions) => {
                positions.insert(position);
            }
            None => self
                .breakpoints
                .push((script.clone(), HashSet::from([position]))),
        }
    }

    /// Removes a breakpoint. Returns `false` if there was none at that position.
    pub fn remove_breakpoint(&mut self, script: &Script, position: usize) -> bool {
        let Some(index) = self.breakpoints.iter().position(|(s, _)| s.ptr_eq(script)) else {
            return false;
        };
        if !self.breakpoints[index].1.remove(&position) {
            return false;
        }
        if self.breakpoints[index].1.is_empty() {
            self.breakpoints.swap_remove(index);
        }
        true
    }

    fn positions_mut(&mut self, script: &Script) -> Option<&mut HashSet<usize>> {
        self.breakpoints
            .iter_mut()
            .find(|(s, _)| s.ptr_eq(script))
            .map(|(_, positions)| positions)
    }

    fn is_breakpoint(&self) -> bool {
        let Some(context) = self.engine.current_context() else {
            return false;
        };
        self.breakpoints.iter().any(|(script, positions)| {
            script.ptr_eq(context.script()) && positions.contains(&context.instruction_pointer())
        })
    }

    /// Executes the VM until a breakpoint is hit or the VM halts or faults.
    pub fn execute(&mut self) -> VMState {
        if self.engine.state() == VMState::BREAK {
            self.engine.set_state(VMState::NONE);
        }
        while self.engine.state() == VMState::NONE {
            self.execute_and_check_breakpoints();
        }
        self.engine.state()
    }

    fn execute_and_check_breakpoints(&mut self) {
        self.engine.execute_next();
        if self.engine.state() == VMState::NONE
            && !self.breakpoints.is_empty()
            && self.is_breakpoint()
        {
            self.engine.set_state(VMState::BREAK);
        }
    }

    /// Executes one instruction, following calls into the callee.
    pub fn step_into(&mut self) -> VMState {
        if self.is_finished() {
            return self.engine.state();
        }
        self.execute_and_check_breakpoints();
        self.pause_if_running()
    }

    /// Executes one instruction. A call runs to completion before pausing.
    pub fn step_over(&mut self) -> VMState {
        if self.is_finished() {
            return self.engine.state();
        }
        self.engine.set_state(VMState::NONE);
        let depth = self.engine.invocation_stack().len();
        loop {
            self.execute_and_check_breakpoints();
            if self.engine.state() != VMState::NONE
                || self.engine.invocation_stack().len() <= depth
            {
                break;
            }
        }
        self.pause_if_running()
    }

    /// Runs until the current context returns.
    pub fn step_out(&mut self) -> VMState {
        if self.engine.state() == VMState::BREAK {
            self.engine.set_state(VMState::NONE);
        }
        let depth = self.engine.invocation_stack().len();
        while self.engine.state() == VMState::NONE
            && self.engine.invocation_stack().len() >= depth
        {
            self.execute_and_check_breakpoints();
        }
        self.pause_if_running()
    }

    fn is_finished(&self) -> bool {
        matches!(self.engine.state(), VMState::HALT | VMState::FAULT)
    }

    fn pause_if_running(&mut self) -> VMState {
        if self.engine.state() == VMState::NONE {
            self.engine.set_state(VMState::BREAK);
        }
        self.engine.state()
    }
}
