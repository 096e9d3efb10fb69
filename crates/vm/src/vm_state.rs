//! Execution state of the virtual machine.

use std::fmt;

/// Status of an [`ExecutionEngine`](crate::ExecutionEngine).
///
/// `NONE` is the running (or not yet started) state, `HALT` and `FAULT` are
/// terminal, `BREAK` is a resumable debugger pause.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VMState {
    /// Execution is in progress or has not yet begun.
    #[default]
    NONE = 0,

    /// Execution completed successfully.
    HALT = 1 << 0,

    /// Execution ended with an error that cannot be caught.
    FAULT = 1 << 1,

    /// A breakpoint or single step paused execution.
    BREAK = 1 << 2,
}

impl VMState {
    #[inline]
    pub fn is_none(self) -> bool {
        self == VMState::NONE
    }

    #[inline]
    pub fn is_halt(self) -> bool {
        self == VMState::HALT
    }

    #[inline]
    pub fn is_fault(self) -> bool {
        self == VMState::FAULT
    }

    #[inline]
    pub fn is_break(self) -> bool {
        self == VMState::BREAK
    }

    /// Returns `true` for `HALT` and `FAULT`.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, VMState::HALT | VMState::FAULT)
    }
}

impl fmt::Display for VMState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VMState::NONE => "NONE",
            VMState::HALT => "HALT",
            VMState::FAULT => "FAULT",
            VMState::BREAK => "BREAK",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(VMState::HALT.is_terminal());
        assert!(VMState::FAULT.is_terminal());
        assert!(!VMState::BREAK.is_terminal());
        assert!(!VMState::default().is_terminal());
        assert_eq!(VMState::FAULT as u8, 2);
        assert_eq!(VMState::BREAK.to_string(), "BREAK");
    }
}
