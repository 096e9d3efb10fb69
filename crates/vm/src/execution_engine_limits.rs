//! Execution limits for the Neo Virtual Machine.
//!
//! Limits can be kept in a TOML file; missing keys take their default value.
//!
//! ```toml
//! max_stack_size = 1024
//! catch_engine_exceptions = false
//! ```

use crate::error::{VmError, VmResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Restrictions on the VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionEngineLimits {
    /// The maximum number of bits that `SHL` and `SHR` can shift.
    pub max_shift: usize,

    /// The maximum number of items that can be referenced at once.
    pub max_stack_size: usize,

    /// The maximum size of an item in bytes.
    pub max_item_size: usize,

    /// The largest comparable size. Byte strings above it cannot be compared.
    pub max_comparable_size: usize,

    /// The maximum number of frames in the invocation stack.
    pub max_invocation_stack_size: usize,

    /// The maximum nesting depth of `TRY` blocks.
    pub max_try_nesting_depth: usize,

    /// Whether catchable engine errors are routed to script exception handlers.
    pub catch_engine_exceptions: bool,
}

impl ExecutionEngineLimits {
    /// The default execution engine limits.
    pub const DEFAULT: Self = Self {
        max_shift: 256,
        max_stack_size: 2 * 1024,
        max_item_size: u16::MAX as usize * 2,
        max_comparable_size: 65536,
        max_invocation_stack_size: 1024,
        max_try_nesting_depth: 16,
        catch_engine_exceptions: true,
    };

    /// Fails if `size` is negative or exceeds `max_item_size`.
    pub fn assert_max_item_size(&self, size: i64) -> VmResult<()> {
        if size < 0 || size as u64 > self.max_item_size as u64 {
            return Err(VmError::invalid_operation_msg(format!(
                "MaxItemSize exceed: {size}/{}",
                self.max_item_size
            )));
        }
        Ok(())
    }

    /// Fails if `shift` is negative or exceeds `max_shift`.
    pub fn assert_shift(&self, shift: i64) -> VmResult<()> {
        if shift < 0 || shift as u64 > self.max_shift as u64 {
            return Err(VmError::invalid_operation_msg(format!(
                "Invalid shift value: {shift}/{}",
                self.max_shift
            )));
        }
        Ok(())
    }

    /// Parses limits from TOML.
    pub fn from_toml_str(content: &str) -> VmResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Serialises the limits as TOML.
    pub fn to_toml_string(&self) -> VmResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load limits from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> VmResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Save limits to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> VmResult<()> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl Default for ExecutionEngineLimits {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let limits = ExecutionEngineLimits::default();
        assert_eq!(limits.max_shift, 256);
        assert_eq!(limits.max_stack_size, 2048);
        assert_eq!(limits.max_item_size, 131070);
        assert_eq!(limits.max_invocation_stack_size, 1024);
        assert_eq!(limits.max_try_nesting_depth, 16);
        assert!(limits.catch_engine_exceptions);
    }

    #[test]
    fn test_assertions() {
        let limits = ExecutionEngineLimits::default();
        assert!(limits.assert_shift(256).is_ok());
        assert_eq!(
            limits.assert_shift(257).unwrap_err().message(),
            "Invalid shift value: 257/256"
        );
        assert!(limits.assert_shift(-1).is_err());
        assert!(limits.assert_max_item_size(-1).is_err());
        assert!(limits
            .assert_max_item_size(limits.max_item_size as i64)
            .is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let limits = ExecutionEngineLimits::from_toml_str("max_stack_size = 16\n").unwrap();
        assert_eq!(limits.max_stack_size, 16);
        assert_eq!(limits.max_shift, 256);

        let text = limits.to_toml_string().unwrap();
        assert_eq!(ExecutionEngineLimits::from_toml_str(&text).unwrap(), limits);
        assert!(matches!(
            ExecutionEngineLimits::from_toml_str("max_shift = \"wide\""),
            Err(VmError::Config(_))
        ));
    }
}
