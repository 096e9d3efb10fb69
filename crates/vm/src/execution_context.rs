//! Execution context module for the Neo Virtual Machine.
//!
//! An [`ExecutionContext`] is one frame of the invocation stack. Frames
//! created by `CALL` share the script, the evaluation stack, the static
//! fields and the state bag of the frame they were cloned from; each frame
//! keeps its own instruction pointer, local variables, arguments and try
//! stack.

use crate::error::VmResult;
use crate::evaluation_stack::EvaluationStack;
use crate::exception_handling::ExceptionHandlingContext;
use crate::instruction::Instruction;
use crate::reference_counter::ReferenceCounter;
use crate::script::Script;
use crate::slot::Slot;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use std::any::{Any, TypeId};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// State shared by a context and every clone made from it.
struct SharedStates {
    script: Script,
    evaluation_stack: RefCell<EvaluationStack>,
    static_fields: RefCell<Option<Slot>>,
    states: RefCell<HashMap<TypeId, Box<dyn Any>>>,
}

/// Represents an execution context in the Neo Virtual Machine.
pub struct ExecutionContext {
    /// The shared states (script, evaluation stack, static fields, state bag)
    shared_states: Rc<SharedStates>,

    /// The current instruction pointer
    instruction_pointer: usize,

    /// The number of values to return when the context is unloaded (-1 for all)
    rvcount: i32,

    /// The local variables for this context
    local_variables: Option<Slot>,

    /// The arguments for this context
    arguments: Option<Slot>,

    /// The stack containing nested exception handling contexts
    try_stack: Option<Vec<ExceptionHandlingContext>>,
}

impl ExecutionContext {
    /// Creates a new execution context for `script`.
    ///
    /// `rvcount` is the number of values the caller expects back, or -1 to
    /// accept any number.
    pub fn new(script: Script, rvcount: i32, reference_counter: &ReferenceCounter) -> Self {
        Self {
            shared_states: Rc::new(SharedStates {
                script,
                evaluation_stack: RefCell::new(EvaluationStack::new(reference_counter.clone())),
                static_fields: RefCell::new(None),
                states: RefCell::new(HashMap::new()),
            }),
            instruction_pointer: 0,
            rvcount,
            local_variables: None,
            arguments: None,
            try_stack: None,
        }
    }

    /// Clones the context so that it starts executing at `initial_position`.
    ///
    /// The clone shares the script, the evaluation stack, the static fields
    /// and the state bag. It expects no return values.
    pub fn clone_at(&self, initial_position: usize) -> Self {
        Self {
            shared_states: Rc::clone(&self.shared_states),
            instruction_pointer: initial_position,
            rvcount: 0,
            local_variables: None,
            arguments: None,
            try_stack: None,
        }
    }

    /// Returns `true` if both contexts share one evaluation stack.
    pub fn shares_state_with(&self, other: &ExecutionContext) -> bool {
        Rc::ptr_eq(&self.shared_states, &other.shared_states)
    }

    /// Returns the script for this context.
    pub fn script(&self) -> &Script {
        &self.shared_states.script
    }

    /// Returns the script hash for this context as a 20-byte array.
    ///
    /// The hash is RIPEMD-160 over SHA-256 of the script bytes.
    pub fn script_hash(&self) -> [u8; 20] {
        let sha256 = Sha256::digest(self.script().as_bytes());
        let ripemd = Ripemd160::digest(sha256);
        let mut result = [0u8; 20];
        result.copy_from_slice(&ripemd);
        result
    }

    /// Returns the current instruction pointer.
    pub fn instruction_pointer(&self) -> usize {
        self.instruction_pointer
    }

    /// Sets the instruction pointer.
    pub fn set_instruction_pointer(&mut self, position: usize) {
        self.instruction_pointer = position;
    }

    /// Returns the instruction at the instruction pointer, or `None` once
    /// the pointer has run off the end of the script.
    pub fn current_instruction(&self) -> VmResult<Option<Arc<Instruction>>> {
        self.instruction_at(self.instruction_pointer)
    }

    /// Returns the instruction following the current one.
    pub fn next_instruction(&self) -> VmResult<Option<Arc<Instruction>>> {
        match self.current_instruction()? {
            Some(current) => self.instruction_at(self.instruction_pointer + current.size()),
            None => Ok(None),
        }
    }

    fn instruction_at(&self, ip: usize) -> VmResult<Option<Arc<Instruction>>> {
        if ip >= self.script().len() {
            return Ok(None);
        }
        self.script().get_instruction(ip).map(Some)
    }

    /// Advances past the current instruction. Returns `false` once the
    /// pointer reaches the end of the script.
    pub fn move_next(&mut self) -> VmResult<bool> {
        let Some(current) = self.current_instruction()? else {
            return Ok(false);
        };
        self.instruction_pointer += current.size();
        Ok(self.instruction_pointer < self.script().len())
    }

    /// Returns the number of values to return when the context is unloaded (-1 for all).
    pub fn rvcount(&self) -> i32 {
        self.rvcount
    }

    /// Returns the evaluation stack for this context.
    pub fn evaluation_stack(&self) -> Ref<'_, EvaluationStack> {
        self.shared_states.evaluation_stack.borrow()
    }

    /// Returns the evaluation stack for this context (mutable).
    pub fn evaluation_stack_mut(&self) -> RefMut<'_, EvaluationStack> {
        self.shared_states.evaluation_stack.borrow_mut()
    }

    /// Returns the static fields for this context.
    pub fn static_fields(&self) -> Ref<'_, Option<Slot>> {
        self.shared_states.static_fields.borrow()
    }

    /// Returns the static fields for this context (mutable).
    pub fn static_fields_mut(&self) -> RefMut<'_, Option<Slot>> {
        self.shared_states.static_fields.borrow_mut()
    }

    /// Returns the local variables for this context.
    pub fn local_variables(&self) -> Option<&Slot> {
        self.local_variables.as_ref()
    }

    pub fn local_variables_mut(&mut self) -> Option<&mut Slot> {
        self.local_variables.as_mut()
    }

    pub fn set_local_variables(&mut self, local_variables: Option<Slot>) {
        self.local_variables = local_variables;
    }

    /// Returns the arguments for this context.
    pub fn arguments(&self) -> Option<&Slot> {
        self.arguments.as_ref()
    }

    pub fn arguments_mut(&mut self) -> Option<&mut Slot> {
        self.arguments.as_mut()
    }

    pub fn set_arguments(&mut self, arguments: Option<Slot>) {
        self.arguments = arguments;
    }

    /// Returns the try stack for this context.
    pub fn try_stack(&self) -> Option<&Vec<ExceptionHandlingContext>> {
        self.try_stack.as_ref()
    }

    /// Returns the try stack for this context (mutable).
    pub fn try_stack_mut(&mut self) -> Option<&mut Vec<ExceptionHandlingContext>> {
        self.try_stack.as_mut()
    }

    /// Returns the try stack, creating it on first use.
    pub fn try_stack_or_default(&mut self) -> &mut Vec<ExceptionHandlingContext> {
        self.try_stack.get_or_insert_with(Vec::new)
    }

    /// Gets custom data of type `T`, creating it with `T::default()` on first use.
    ///
    /// The state bag is shared with every clone of this context.
    pub fn get_state<T: Default + 'static>(&self) -> Rc<RefCell<T>> {
        self.get_state_with_factory(T::default)
    }

    /// Gets custom data of type `T`, creating it with `factory` on first use.
    pub fn get_state_with_factory<T: 'static, F: FnOnce() -> T>(&self, factory: F) -> Rc<RefCell<T>> {
        let mut states = self.shared_states.states.borrow_mut();
        let id = TypeId::of::<T>();
        if let Some(state) = states
            .get(&id)
            .and_then(|entry| entry.downcast_ref::<Rc<RefCell<T>>>())
        {
            return Rc::clone(state);
        }
        let state = Rc::new(RefCell::new(factory()));
        states.insert(id, Box::new(Rc::clone(&state)));
        state
    }

    /// Releases the references held by this frame's slots. The static
    /// fields are released only when `release_static_fields` is set.
    pub(crate) fn clear_slot_references(&mut self, release_static_fields: bool) {
        if release_static_fields {
            if let Some(static_fields) = self.static_fields_mut().as_mut() {
                static_fields.clear_references();
            }
        }
        if let Some(local_variables) = self.local_variables.as_mut() {
            local_variables.clear_references();
        }
        if let Some(arguments) = self.arguments.as_mut() {
            arguments.clear_references();
        }
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("instruction_pointer", &self.instruction_pointer)
            .field("rvcount", &self.rvcount)
            .field("script_len", &self.script().len())
            .field("try_depth", &self.try_stack.as_ref().map_or(0, Vec::len))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op_code::OpCode;
    use crate::stack_item::StackItem;

    fn context(bytes: Vec<u8>) -> ExecutionContext {
        ExecutionContext::new(Script::new(bytes), -1, &ReferenceCounter::new())
    }

    #[test]
    fn test_instruction_walk() {
        let mut ctx = context(vec![OpCode::PUSHINT8 as u8, 7, OpCode::NOP as u8]);
        let first = ctx.current_instruction().unwrap().unwrap();
        assert_eq!(first.opcode(), OpCode::PUSHINT8);
        assert_eq!(
            ctx.next_instruction().unwrap().unwrap().opcode(),
            OpCode::NOP
        );
        assert!(ctx.move_next().unwrap());
        assert_eq!(ctx.instruction_pointer(), 2);
        assert!(!ctx.move_next().unwrap());
        assert!(ctx.current_instruction().unwrap().is_none());
    }

    #[test]
    fn test_clone_shares_stack_and_states() {
        let ctx = context(vec![OpCode::RET as u8]);
        let clone = ctx.clone_at(0);
        assert!(ctx.shares_state_with(&clone));
        assert_eq!(clone.rvcount(), 0);

        clone.evaluation_stack_mut().push(StackItem::from_int(1));
        assert_eq!(ctx.evaluation_stack().len(), 1);

        ctx.get_state::<Vec<u32>>().borrow_mut().push(9);
        assert_eq!(*clone.get_state::<Vec<u32>>().borrow(), vec![9]);

        let other = context(vec![OpCode::RET as u8]);
        assert!(!ctx.shares_state_with(&other));
    }

    #[test]
    fn test_script_hash_is_hash160() {
        let ctx = context(vec![OpCode::RET as u8]);
        let hash = ctx.script_hash();
        assert_eq!(hash.len(), 20);
        assert_eq!(hash, context(vec![OpCode::RET as u8]).script_hash());
        assert_ne!(hash, context(vec![OpCode::NOP as u8]).script_hash());
    }
}
