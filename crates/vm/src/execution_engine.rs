//! Execution engine module for the Neo Virtual Machine.
//!
//! The engine owns the invocation stack, the result stack and the reference
//! counter. It fetches one instruction at a time from the current context,
//! dispatches it through the [`JumpTable`] and turns any fatal error into the
//! `FAULT` state.

use crate::diagnostic::Diagnostic;
use crate::error::{VmError, VmResult};
use crate::evaluation_stack::EvaluationStack;
use crate::execution_context::ExecutionContext;
use crate::execution_engine_limits::ExecutionEngineLimits;
use crate::instruction::Instruction;
use crate::interop_service::InteropHost;
use crate::jump_table::{control, JumpTable};
use crate::reference_counter::ReferenceCounter;
use crate::script::Script;
use crate::stack_item::{integer, StackItem};
use crate::vm_state::VMState;
use num_bigint::BigInt;
use std::fmt;
use std::sync::Arc;

/// The execution engine for the Neo VM.
pub struct ExecutionEngine {
    /// The current state of the VM
    state: VMState,

    /// Set by handlers that moved the instruction pointer themselves
    pub(crate) is_jumping: bool,

    /// The jump table used to execute instructions
    jump_table: JumpTable,

    /// Restrictions on the VM
    limits: ExecutionEngineLimits,

    /// Used for reference counting of objects in the VM
    reference_counter: ReferenceCounter,

    /// The invocation stack of the VM
    pub(crate) invocation_stack: Vec<ExecutionContext>,

    /// The stack to store the return values
    pub(crate) result_stack: EvaluationStack,

    /// The exception currently propagating through `FINALLY` blocks
    pub(crate) uncaught_exception: Option<StackItem>,

    /// The error that moved the engine into `FAULT`
    fault_exception: Option<VmError>,

    diagnostic: Option<Box<dyn Diagnostic>>,

    interop_host: Option<Box<dyn InteropHost>>,
}

impl ExecutionEngine {
    /// Creates a new execution engine with the specified jump table.
    pub fn new(jump_table: Option<JumpTable>) -> Self {
        Self::new_with_limits(
            jump_table,
            ReferenceCounter::new(),
            ExecutionEngineLimits::default(),
        )
    }

    /// Creates a new execution engine with the specified reference counter and limits.
    pub fn new_with_limits(
        jump_table: Option<JumpTable>,
        reference_counter: ReferenceCounter,
        limits: ExecutionEngineLimits,
    ) -> Self {
        Self {
            state: VMState::NONE,
            is_jumping: false,
            jump_table: jump_table.unwrap_or_default(),
            limits,
            reference_counter: reference_counter.clone(),
            invocation_stack: Vec::new(),
            result_stack: EvaluationStack::new(reference_counter),
            uncaught_exception: None,
            fault_exception: None,
            diagnostic: None,
            interop_host: None,
        }
    }

    /// Attaches a diagnostic and notifies it that it has been initialised.
    pub fn set_diagnostic(&mut self, mut diagnostic: Box<dyn Diagnostic>) {
        diagnostic.initialized(self);
        self.diagnostic = Some(diagnostic);
    }

    /// Installs the host that services `SYSCALL` and `CALLT`.
    pub fn set_interop_host(&mut self, host: Box<dyn InteropHost>) {
        self.interop_host = Some(host);
    }

    /// Removes the interop host, handing it back to the caller.
    pub fn take_interop_host(&mut self) -> Option<Box<dyn InteropHost>> {
        self.interop_host.take()
    }

    /// Returns the current state of the VM.
    pub fn state(&self) -> VMState {
        self.state
    }

    /// Sets the state of the VM.
    pub fn set_state(&mut self, state: VMState) {
        if self.state != state {
            log::debug!("vm state {} -> {}", self.state, state);
            self.state = state;
        }
    }

    /// Returns the restrictions this engine enforces.
    pub fn limits(&self) -> &ExecutionEngineLimits {
        &self.limits
    }

    /// Returns the reference counter.
    pub fn reference_counter(&self) -> &ReferenceCounter {
        &self.reference_counter
    }

    /// Returns the jump table instructions are dispatched through.
    pub fn jump_table(&self) -> &JumpTable {
        &self.jump_table
    }

    /// Returns the invocation stack, entry context first.
    pub fn invocation_stack(&self) -> &[ExecutionContext] {
        &self.invocation_stack
    }

    /// Returns the current context, if any.
    pub fn current_context(&self) -> Option<&ExecutionContext> {
        self.invocation_stack.last()
    }

    /// Returns the current context (mutable), if any.
    pub fn current_context_mut(&mut self) -> Option<&mut ExecutionContext> {
        self.invocation_stack.last_mut()
    }

    /// Returns the entry context, if any.
    pub fn entry_context(&self) -> Option<&ExecutionContext> {
        self.invocation_stack.first()
    }

    /// Returns the result stack.
    pub fn result_stack(&self) -> &EvaluationStack {
        &self.result_stack
    }

    /// Returns the exception propagating through `FINALLY` blocks, if any.
    pub fn uncaught_exception(&self) -> Option<&StackItem> {
        self.uncaught_exception.as_ref()
    }

    /// Returns the error that faulted the engine, if any.
    pub fn fault_exception(&self) -> Option<&VmError> {
        self.fault_exception.as_ref()
    }

    /// The gas charged so far by the interop host, or zero without one.
    pub fn gas_consumed(&self) -> i64 {
        self.interop_host
            .as_ref()
            .map_or(0, |host| host.gas_consumed())
    }

    /// Makes the engine skip advancing the instruction pointer after the
    /// current instruction. Interop handlers that jump call this.
    pub fn set_jumping(&mut self) {
        self.is_jumping = true;
    }

    /// Starts execution of the VM and runs until it halts or faults.
    pub fn execute(&mut self) -> VMState {
        if self.state == VMState::BREAK {
            self.set_state(VMState::NONE);
        }
        while self.state != VMState::HALT && self.state != VMState::FAULT {
            self.execute_next();
        }
        self.state
    }

    /// Executes the next instruction.
    ///
    /// An empty invocation stack halts the engine. Fatal errors fault it.
    pub fn execute_next(&mut self) {
        if self.invocation_stack.is_empty() {
            self.set_state(VMState::HALT);
            return;
        }
        if let Err(err) = self.execute_instruction() {
            self.on_fault(err);
        }
    }

    fn execute_instruction(&mut self) -> VmResult<()> {
        let index = self.invocation_stack.len() - 1;
        let instruction = self.invocation_stack[index]
            .current_instruction()?
            .unwrap_or_else(|| Arc::new(Instruction::ret()));

        self.pre_execute_instruction(&instruction)?;

        let opcode = instruction.opcode();
        let handler = self.jump_table.get(opcode).ok_or_else(|| {
            VmError::invalid_operation_msg(format!("No handler registered for {opcode}"))
        })?;
        log::trace!("execute {} at {}", opcode, self.invocation_stack[index].instruction_pointer());

        match handler(self, &instruction) {
            Err(err) if err.is_catchable() && self.limits.catch_engine_exceptions => {
                control::execute_throw(self, StackItem::from_byte_string(err.message()))?;
            }
            result => result?,
        }

        self.post_execute_instruction(&instruction)?;

        if !self.is_jumping {
            if let Some(context) = self.invocation_stack.get_mut(index) {
                context.move_next()?;
            }
        }
        self.is_jumping = false;
        Ok(())
    }

    fn pre_execute_instruction(&mut self, instruction: &Instruction) -> VmResult<()> {
        if let Some(diagnostic) = self.diagnostic.as_mut() {
            diagnostic.pre_execute_instruction(instruction);
        }
        self.with_interop_host(|host, engine| host.pre_execute_instruction(engine, instruction))
            .unwrap_or(Ok(()))
    }

    fn post_execute_instruction(&mut self, instruction: &Instruction) -> VmResult<()> {
        if let Some(diagnostic) = self.diagnostic.as_mut() {
            diagnostic.post_execute_instruction(instruction);
        }
        let max_stack_size = self.limits.max_stack_size;
        if self.reference_counter.count() < max_stack_size {
            return Ok(());
        }
        let count = self.reference_counter.check_zero_referred();
        if count > max_stack_size {
            return Err(VmError::invalid_operation_msg(format!(
                "MaxStackSize exceed: {count}"
            )));
        }
        Ok(())
    }

    /// Called when an error causes the VM to enter the FAULT state.
    fn on_fault(&mut self, err: VmError) {
        log::warn!("vm fault: {err}");
        self.fault_exception = Some(err);
        self.set_state(VMState::FAULT);
    }

    /// Runs `f` with the interop host temporarily taken out of the engine.
    /// Returns `None` when no host is installed.
    pub(crate) fn with_interop_host<R>(
        &mut self,
        f: impl FnOnce(&mut dyn InteropHost, &mut ExecutionEngine) -> VmResult<R>,
    ) -> Option<VmResult<R>> {
        let mut host = self.interop_host.take()?;
        let result = f(host.as_mut(), self);
        if self.interop_host.is_none() {
            self.interop_host = Some(host);
        }
        Some(result)
    }

    /// Loads a context into the invocation stack.
    pub fn load_context(&mut self, context: ExecutionContext) -> VmResult<()> {
        if self.invocation_stack.len() >= self.limits.max_invocation_stack_size {
            return Err(VmError::invalid_operation_msg(format!(
                "MaxInvocationStackSize exceed: {}",
                self.invocation_stack.len()
            )));
        }
        log::trace!(
            "load context at {} (depth {})",
            context.instruction_pointer(),
            self.invocation_stack.len() + 1
        );
        if let Some(diagnostic) = self.diagnostic.as_mut() {
            diagnostic.context_loaded(&context);
        }
        self.invocation_stack.push(context);
        Ok(())
    }

    /// Releases the slots of a context that has already been popped.
    ///
    /// Static fields are kept when the new current context shares them.
    pub(crate) fn unload_context(&mut self, mut context: ExecutionContext) {
        let shares_static_fields = self
            .invocation_stack
            .last()
            .is_some_and(|current| current.shares_state_with(&context));
        context.clear_slot_references(!shares_static_fields);
        log::trace!("unload context (depth {})", self.invocation_stack.len());
        if let Some(diagnostic) = self.diagnostic.as_mut() {
            diagnostic.context_unloaded(&context);
        }
    }

    /// Creates a new context for `script` starting at `initial_position`.
    pub fn create_context(
        &self,
        script: Script,
        rvcount: i32,
        initial_position: usize,
    ) -> ExecutionContext {
        let mut context = ExecutionContext::new(script, rvcount, &self.reference_counter);
        context.set_instruction_pointer(initial_position);
        context
    }

    /// Loads a script and creates a new context.
    pub fn load_script(
        &mut self,
        script: Script,
        rvcount: i32,
        initial_position: usize,
    ) -> VmResult<()> {
        let context = self.create_context(script, rvcount, initial_position);
        self.load_context(context)
    }

    fn no_context() -> VmError {
        VmError::invalid_operation_msg("No current context")
    }

    /// Returns a handle to the item `index` positions below the top of the current stack.
    pub fn peek(&self, index: isize) -> VmResult<StackItem> {
        let context = self.current_context().ok_or_else(Self::no_context)?;
        let stack = context.evaluation_stack();
        stack.peek(index).cloned()
    }

    /// Removes and returns the item at the top of the current stack.
    pub fn pop(&mut self) -> VmResult<StackItem> {
        let context = self.current_context().ok_or_else(Self::no_context)?;
        let item = context.evaluation_stack_mut().pop();
        item
    }

    /// Pushes an item onto the top of the current stack.
    pub fn push(&mut self, item: StackItem) -> VmResult<()> {
        let context = self.current_context().ok_or_else(Self::no_context)?;
        context.evaluation_stack_mut().push(item);
        Ok(())
    }

    /// Pushes an integer after checking that it fits the integer size limit.
    pub fn push_integer(&mut self, value: BigInt) -> VmResult<()> {
        integer::check_size(&value)?;
        self.push(StackItem::Integer(value))
    }

    /// Pushes a boolean onto the current stack.
    pub fn push_bool(&mut self, value: bool) -> VmResult<()> {
        self.push(StackItem::Boolean(value))
    }

    /// Pops an item and converts it to an integer.
    pub fn pop_int(&mut self) -> VmResult<BigInt> {
        self.pop()?.as_int()
    }

    /// Pops an integer that must fit in an `i32`.
    pub fn pop_i32(&mut self) -> VmResult<i32> {
        let value = self.pop_int()?;
        i32::try_from(&value).map_err(|_| {
            VmError::invalid_operation_msg(format!("Value {value} is out of range for Int32"))
        })
    }

    /// Pops an integer that must fit in an `i64`.
    pub fn pop_i64(&mut self) -> VmResult<i64> {
        let value = self.pop_int()?;
        i64::try_from(&value).map_err(|_| {
            VmError::invalid_operation_msg(format!("Value {value} is out of range for Int64"))
        })
    }

    /// Pops an item and converts it to a boolean.
    pub fn pop_bool(&mut self) -> VmResult<bool> {
        self.pop()?.as_bool()
    }

    /// Pops a primitive item or buffer and returns its bytes.
    pub fn pop_bytes(&mut self) -> VmResult<Vec<u8>> {
        self.pop()?.as_bytes()
    }
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new(None)
    }
}

impl fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("state", &self.state)
            .field("invocation_depth", &self.invocation_stack.len())
            .field("result_stack", &self.result_stack)
            .field("references", &self.reference_counter.count())
            .finish()
    }
}

impl Drop for ExecutionEngine {
    fn drop(&mut self) {
        self.invocation_stack.clear();
        self.uncaught_exception = None;
        self.result_stack.clear();
        if let Some(diagnostic) = self.diagnostic.as_mut() {
            diagnostic.disposed();
        }
        // Compound items that still reference each other would otherwise
        // keep their storage alive forever. Items the host kept are spared.
        self.reference_counter.release_cycles();
    }
}
