//! Operand layout of an opcode.

/// Describes how the operand of an opcode is encoded.
///
/// An opcode either carries a fixed number of operand bytes (`size`) or a
/// little-endian length prefix of `size_prefix` bytes followed by that many
/// operand bytes. Opcodes without operands have both fields set to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OperandSize {
    size: usize,
    size_prefix: usize,
}

impl OperandSize {
    /// No operand at all.
    pub const NONE: Self = Self {
        size: 0,
        size_prefix: 0,
    };

    /// An operand of exactly `size` bytes.
    pub const fn fixed(size: usize) -> Self {
        Self {
            size,
            size_prefix: 0,
        }
    }

    /// An operand whose length is given by a `size_prefix`-byte prefix.
    pub const fn prefix(size_prefix: usize) -> Self {
        Self {
            size: 0,
            size_prefix,
        }
    }

    /// The fixed operand size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The width of the length prefix in bytes.
    pub fn size_prefix(&self) -> usize {
        self.size_prefix
    }

    pub fn has_size_prefix(&self) -> bool {
        self.size_prefix > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_and_prefixed_layouts() {
        let fixed = OperandSize::fixed(4);
        assert_eq!(fixed.size(), 4);
        assert!(!fixed.has_size_prefix());

        let prefixed = OperandSize::prefix(2);
        assert_eq!(prefixed.size(), 0);
        assert_eq!(prefixed.size_prefix(), 2);
        assert!(prefixed.has_size_prefix());

        assert_eq!(OperandSize::default(), OperandSize::NONE);
    }
}
