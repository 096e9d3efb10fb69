//! Two's-complement integer encoding shared by the integer stack item and the push opcodes.

use crate::error::{VmError, VmResult};
use num_bigint::BigInt;
use num_traits::Zero;

/// The largest integer, in bytes of two's-complement encoding.
pub const MAX_SIZE: usize = 32;

/// Encodes `value` as minimal little-endian two's complement. Zero encodes as no bytes.
pub fn to_bytes(value: &BigInt) -> Vec<u8> {
    if value.is_zero() {
        Vec::new()
    } else {
        value.to_signed_bytes_le()
    }
}

/// Decodes little-endian two's complement. No bytes decode as zero.
pub fn from_bytes(bytes: &[u8]) -> BigInt {
    if bytes.is_empty() {
        BigInt::zero()
    } else {
        BigInt::from_signed_bytes_le(bytes)
    }
}

/// The encoded size of `value` in bytes.
pub fn byte_len(value: &BigInt) -> usize {
    if value.is_zero() {
        0
    } else {
        value.to_signed_bytes_le().len()
    }
}

/// Fails when `value` does not fit in [`MAX_SIZE`] bytes.
pub fn check_size(value: &BigInt) -> VmResult<()> {
    let size = byte_len(value);
    if size > MAX_SIZE {
        return Err(VmError::invalid_operation_msg(format!(
            "MaxSize exceed: {size}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_encoding() {
        assert!(to_bytes(&BigInt::from(0)).is_empty());
        assert_eq!(to_bytes(&BigInt::from(1)), vec![0x01]);
        assert_eq!(to_bytes(&BigInt::from(-1)), vec![0xFF]);
        assert_eq!(to_bytes(&BigInt::from(128)), vec![0x80, 0x00]);
        assert_eq!(to_bytes(&BigInt::from(-129)), vec![0x7F, 0xFF]);
    }

    #[test]
    fn test_decoding() {
        assert_eq!(from_bytes(&[]), BigInt::from(0));
        assert_eq!(from_bytes(&[0xFF, 0xFF]), BigInt::from(-1));
        assert_eq!(from_bytes(&[0x00, 0x01]), BigInt::from(256));
    }

    #[test]
    fn test_size_limit() {
        let max = (BigInt::from(1) << 255) - 1;
        assert!(check_size(&max).is_ok());
        assert!(check_size(&(max + 1)).is_err());
        assert!(check_size(&-(BigInt::from(1) << 255usize)).is_ok());
    }
}
