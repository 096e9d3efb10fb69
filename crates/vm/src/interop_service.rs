//! Interop service module for the Neo Virtual Machine.
//!
//! The engine does not know any system calls of its own. `SYSCALL` and
//! `CALLT` are forwarded to an [`InteropHost`] installed with
//! [`ExecutionEngine::set_interop_host`]. [`InteropService`] is the stock
//! host: a registry of named methods, each identified on the wire by the
//! first four bytes of the SHA-256 of its name, with a gas price charged per
//! call.

use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::stack_item::StackItem;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

/// A function that provides interoperability with external services.
pub type InteropMethod = fn(engine: &mut ExecutionEngine) -> VmResult<()>;

/// The host side of `SYSCALL` and `CALLT`.
pub trait InteropHost {
    /// Services `SYSCALL` with the 32-bit method identifier.
    fn on_syscall(&mut self, engine: &mut ExecutionEngine, method: u32) -> VmResult<()>;

    /// Services `CALLT` with the 16-bit method token.
    fn on_call_token(&mut self, _engine: &mut ExecutionEngine, token: u16) -> VmResult<()> {
        Err(VmError::invalid_operation_msg(format!(
            "Token not found: {token}"
        )))
    }

    /// Runs before every instruction. Returning an error faults the engine.
    fn pre_execute_instruction(
        &mut self,
        _engine: &mut ExecutionEngine,
        _instruction: &Instruction,
    ) -> VmResult<()> {
        Ok(())
    }

    /// The gas charged so far.
    fn gas_consumed(&self) -> i64 {
        0
    }
}

/// Represents an interop descriptor.
#[derive(Clone)]
pub struct InteropDescriptor {
    /// The name of the interop method
    pub name: String,

    /// The identifier used by `SYSCALL`
    pub hash: u32,

    /// The handler function
    pub handler: InteropMethod,

    /// The fee to be charged for using this interop service
    pub price: i64,
}

impl InteropDescriptor {
    pub fn new(name: impl Into<String>, handler: InteropMethod, price: i64) -> Self {
        let name = name.into();
        Self {
            hash: interop_hash(&name),
            name,
            handler,
            price,
        }
    }
}

impl fmt::Debug for InteropDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteropDescriptor")
            .field("name", &self.name)
            .field("hash", &format_args!("{:#010x}", self.hash))
            .field("price", &self.price)
            .finish()
    }
}

/// Computes the `SYSCALL` identifier of a method name.
pub fn interop_hash(name: &str) -> u32 {
    let digest = Sha256::digest(name.as_bytes());
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Provides interoperability between the Neo VM and external services.
#[derive(Debug, Default)]
pub struct InteropService {
    /// The registry of interop functions, keyed by hash
    methods: HashMap<u32, InteropDescriptor>,

    /// Fee charged before every instruction
    instruction_price: i64,

    gas_consumed: i64,

    gas_limit: Option<i64>,
}

impl InteropService {
    /// Creates an empty interop service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a service with the runtime methods every host provides.
    pub fn with_standard_methods() -> Self {
        let mut service = Self::new();
        service.register(InteropDescriptor::new(
            "System.Runtime.Platform",
            runtime_platform,
            1 << 3,
        ));
        service.register(InteropDescriptor::new(
            "System.Runtime.Log",
            runtime_log,
            1 << 15,
        ));
        service
    }

    /// Registers a method, replacing any method with the same hash.
    pub fn register(&mut self, descriptor: InteropDescriptor) {
        log::debug!(
            "register interop {} ({:#010x})",
            descriptor.name,
            descriptor.hash
        );
        self.methods.insert(descriptor.hash, descriptor);
    }

    pub fn get(&self, hash: u32) -> Option<&InteropDescriptor> {
        self.methods.get(&hash)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&InteropDescriptor> {
        self.get(interop_hash(name))
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Sets the fee charged before every instruction.
    pub fn set_instruction_price(&mut self, price: i64) {
        self.instruction_price = price;
    }

    /// Caps the gas this service may charge. `None` removes the cap.
    pub fn set_gas_limit(&mut self, gas_limit: Option<i64>) {
        self.gas_limit = gas_limit;
    }

    /// Adds `gas` to the consumed total, failing once the limit is passed.
    pub fn add_gas(&mut self, gas: i64) -> VmResult<()> {
        self.gas_consumed = self.gas_consumed.saturating_add(gas);
        match self.gas_limit {
            Some(limit) if self.gas_consumed > limit => Err(VmError::invalid_operation_msg(
                format!("Insufficient GAS: {}/{limit}", self.gas_consumed),
            )),
            _ => Ok(()),
        }
    }
}

impl InteropHost for InteropService {
    fn on_syscall(&mut self, engine: &mut ExecutionEngine, method: u32) -> VmResult<()> {
        let (handler, price) = match self.methods.get(&method) {
            Some(descriptor) => {
                log::trace!("syscall {}", descriptor.name);
                (descriptor.handler, descriptor.price)
            }
            None => {
                return Err(VmError::invalid_operation_msg(format!(
                    "Syscall not found: {method}"
                )))
            }
        };
        self.add_gas(price)?;
        handler(engine)
    }

    fn pre_execute_instruction(
        &mut self,
        _engine: &mut ExecutionEngine,
        _instruction: &Instruction,
    ) -> VmResult<()> {
        if self.instruction_price == 0 {
            return Ok(());
        }
        self.add_gas(self.instruction_price)
    }

    fn gas_consumed(&self) -> i64 {
        self.gas_consumed
    }
}

fn runtime_platform(engine: &mut ExecutionEngine) -> VmResult<()> {
    engine.push(StackItem::from_byte_string(b"NEO".to_vec()))
}

fn runtime_log(engine: &mut ExecutionEngine) -> VmResult<()> {
    let message = engine.pop_bytes()?;
    let message = String::from_utf8(message)
        .map_err(|_| VmError::invalid_operation_msg("Log message is not valid UTF-8"))?;
    log::info!("script log: {message}");
    Ok(())
}
