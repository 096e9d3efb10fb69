//! Pointer stack item.

use crate::script::Script;
use std::fmt;

/// A position inside a particular script, produced by `PUSHA` and consumed by `CALLA`.
#[derive(Clone)]
pub struct Pointer {
    script: Script,
    position: usize,
}

impl Pointer {
    pub fn new(script: Script, position: usize) -> Self {
        Self { script, position }
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Pointers are equal when they target the same position of the same script.
    pub fn equals(&self, other: &Pointer) -> bool {
        self.position == other.position && self.script.ptr_eq(&other.script)
    }
}

impl fmt::Debug for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pointer({})", self.position)
    }
}
