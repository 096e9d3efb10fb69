//! # Neo Virtual Machine (NeoVM)
//!
//! A deterministic implementation of the Neo Virtual Machine in Rust.
//!
//! The NeoVM is a stack-based virtual machine that executes smart contract
//! bytecode. Given the same script, limits and host, every run produces the
//! same state, the same result stack and the same fault.
//!
//! ## Features
//!
//! - **Complete OpCode Support**: every NeoVM opcode, dispatched through a replaceable jump table
//! - **Arbitrary precision integers** bounded to 32 bytes
//! - **Exception Handling**: `TRY`/`CATCH`/`FINALLY` across call frames
//! - **Reference Counting**: stack and compound references, with cycle collection
//! - **Interop Services**: `SYSCALL` and `CALLT` forwarded to a host, with GAS accounting
//! - **Debugging Support**: breakpoints and stepping into, over and out of calls
//! - **Script Building**: programmatic bytecode generation
//!
//! ## Architecture
//!
//! - **ExecutionEngine**: fetch, dispatch and fault loop over the invocation stack
//! - **ExecutionContext**: one frame: script, instruction pointer, stack and slots
//! - **JumpTable**: one handler per opcode, grouped by category
//! - **StackItem**: the value model shared by every handler
//! - **ReferenceCounter**: enforces `max_stack_size` over everything reachable
//!
//! ## Example
//!
//! ```rust
//! use neovm_engine::{ExecutionEngine, OpCode, ScriptBuilder, VMState};
//!
//! let mut builder = ScriptBuilder::new();
//! builder.emit_push_int(1).emit_push_int(2).emit(OpCode::ADD);
//!
//! let mut engine = ExecutionEngine::new(None);
//! engine.load_script(builder.to_script(), -1, 0).unwrap();
//! assert_eq!(engine.execute(), VMState::HALT);
//!
//! let result = engine.result_stack().peek(0).unwrap();
//! assert_eq!(result.as_int().unwrap(), 3.into());
//! ```
//!
//! ## Interop Services
//!
//! System calls reach the host installed on the engine:
//!
//! ```rust
//! use neovm_engine::{interop_hash, ExecutionEngine, InteropService, ScriptBuilder, VMState};
//!
//! let mut builder = ScriptBuilder::new();
//! builder.emit_syscall(interop_hash("System.Runtime.Platform"));
//!
//! let mut engine = ExecutionEngine::new(None);
//! engine.set_interop_host(Box::new(InteropService::with_standard_methods()));
//! engine.load_script(builder.to_script(), -1, 0).unwrap();
//! assert_eq!(engine.execute(), VMState::HALT);
//! assert_eq!(engine.result_stack().peek(0).unwrap().as_bytes().unwrap(), b"NEO");
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

/// Debugging support with breakpoints and step execution
pub mod debugger;
/// Hooks observing engine execution
pub mod diagnostic;
/// VM error types and result handling
pub mod error;
/// The stack of values a context operates on
pub mod evaluation_stack;
/// Try/catch/finally frame state
pub mod exception_handling;
/// Script execution context and local variables
pub mod execution_context;
/// Low-level VM execution engine
pub mod execution_engine;
/// Restrictions on the VM
pub mod execution_engine_limits;
/// VM instruction representation
pub mod instruction;
/// Interop service registry and native calls
pub mod interop_service;
/// OpCode implementation and instruction dispatch
pub mod jump_table;
/// VM opcode definitions and utilities
pub mod op_code;
/// Memory management for complex data structures
pub mod reference_counter;
/// VM script representation and validation
pub mod script;
/// Utility for constructing VM bytecode
pub mod script_builder;
/// Fixed-size variable storage
pub mod slot;
/// Polymorphic data types for VM values
pub mod stack_item;
/// Graph algorithms for garbage collection
pub mod strongly_connected_components;
/// Execution state of the VM
pub mod vm_state;

pub use debugger::Debugger;
pub use diagnostic::Diagnostic;
pub use error::{VmError, VmResult};
pub use evaluation_stack::EvaluationStack;
pub use exception_handling::{ExceptionHandlingContext, ExceptionHandlingState};
pub use execution_context::ExecutionContext;
pub use execution_engine::ExecutionEngine;
pub use execution_engine_limits::ExecutionEngineLimits;
pub use instruction::Instruction;
pub use interop_service::{
    interop_hash, InteropDescriptor, InteropHost, InteropMethod, InteropService,
};
pub use jump_table::{InstructionHandler, JumpTable};
pub use op_code::OpCode;
pub use reference_counter::ReferenceCounter;
pub use script::Script;
pub use script_builder::ScriptBuilder;
pub use slot::Slot;
pub use stack_item::{Array, Buffer, Map, PrimitiveType, StackItem, StackItemType, Struct};
pub use strongly_connected_components::Tarjan;
pub use vm_state::VMState;
