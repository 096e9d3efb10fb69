//! Numeric operations for the Neo Virtual Machine.
//!
//! This module provides the numeric operation handlers for the Neo VM.
//! All arithmetic is on arbitrary precision integers; every result must fit
//! the 32-byte integer limit.

use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::jump_table::JumpTable;
use crate::op_code::OpCode;
use crate::stack_item::StackItem;
use num_bigint::{BigInt, Sign};
use num_traits::{One, Signed, Zero};

/// Registers the numeric operation handlers.
pub fn register_handlers(jump_table: &mut JumpTable) {
    jump_table.register(OpCode::SIGN, sign);
    jump_table.register(OpCode::ABS, abs);
    jump_table.register(OpCode::NEGATE, negate);
    jump_table.register(OpCode::INC, inc);
    jump_table.register(OpCode::DEC, dec);
    jump_table.register(OpCode::ADD, add);
    jump_table.register(OpCode::SUB, sub);
    jump_table.register(OpCode::MUL, mul);
    jump_table.register(OpCode::DIV, div);
    jump_table.register(OpCode::MOD, modulo);
    jump_table.register(OpCode::POW, pow);
    jump_table.register(OpCode::SQRT, sqrt);
    jump_table.register(OpCode::MODMUL, modmul);
    jump_table.register(OpCode::MODPOW, modpow);
    jump_table.register(OpCode::SHL, shl);
    jump_table.register(OpCode::SHR, shr);

    // Logical operations
    jump_table.register(OpCode::NOT, not);
    jump_table.register(OpCode::BOOLAND, booland);
    jump_table.register(OpCode::BOOLOR, boolor);
    jump_table.register(OpCode::NZ, nz);

    // Comparison operations
    jump_table.register(OpCode::NUMEQUAL, numequal);
    jump_table.register(OpCode::NUMNOTEQUAL, numnotequal);
    jump_table.register(OpCode::LT, lt);
    jump_table.register(OpCode::LE, le);
    jump_table.register(OpCode::GT, gt);
    jump_table.register(OpCode::GE, ge);
    jump_table.register(OpCode::MIN, min);
    jump_table.register(OpCode::MAX, max);
    jump_table.register(OpCode::WITHIN, within);
}

fn pop_pair(engine: &mut ExecutionEngine) -> VmResult<(BigInt, BigInt)> {
    let x2 = engine.pop_int()?;
    let x1 = engine.pop_int()?;
    Ok((x1, x2))
}

fn sign(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let x = engine.pop_int()?;
    let sign = match x.sign() {
        Sign::Minus => -1,
        Sign::NoSign => 0,
        Sign::Plus => 1,
    };
    engine.push(StackItem::from_int(sign))
}

fn abs(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let x = engine.pop_int()?;
    engine.push_integer(x.abs())
}

fn negate(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let x = engine.pop_int()?;
    engine.push_integer(-x)
}

fn inc(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let x = engine.pop_int()?;
    engine.push_integer(x + 1)
}

fn dec(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let x = engine.pop_int()?;
    engine.push_integer(x - 1)
}

fn add(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let (x1, x2) = pop_pair(engine)?;
    engine.push_integer(x1 + x2)
}

fn sub(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let (x1, x2) = pop_pair(engine)?;
    engine.push_integer(x1 - x2)
}

fn mul(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let (x1, x2) = pop_pair(engine)?;
    engine.push_integer(x1 * x2)
}

fn division_by_zero() -> VmError {
    VmError::invalid_operation_msg("Attempted to divide by zero.")
}

/// Truncating division.
fn div(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let (x1, x2) = pop_pair(engine)?;
    if x2.is_zero() {
        return Err(division_by_zero());
    }
    engine.push_integer(x1 / x2)
}

/// Remainder with the sign of the dividend.
fn modulo(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let (x1, x2) = pop_pair(engine)?;
    if x2.is_zero() {
        return Err(division_by_zero());
    }
    engine.push_integer(x1 % x2)
}

fn pow(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let exponent = engine.pop_i32()?;
    engine.limits().assert_shift(i64::from(exponent))?;
    let value = engine.pop_int()?;
    engine.push_integer(num_traits::pow(value, exponent as usize))
}

/// Integer square root, rounded down.
fn sqrt(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let x = engine.pop_int()?;
    if x.is_negative() {
        return Err(VmError::invalid_operation_msg("value can not be negative"));
    }
    engine.push_integer(x.sqrt())
}

fn modmul(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let modulus = engine.pop_int()?;
    let (x1, x2) = pop_pair(engine)?;
    if modulus.is_zero() {
        return Err(division_by_zero());
    }
    engine.push_integer(x1 * x2 % modulus)
}

/// Modular exponentiation. An exponent of -1 asks for the modular inverse.
fn modpow(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let modulus = engine.pop_int()?;
    let exponent = engine.pop_int()?;
    let value = engine.pop_int()?;
    let result = if exponent == -BigInt::one() {
        mod_inverse(&value, &modulus)?
    } else {
        signed_mod_pow(&value, &exponent, &modulus)?
    };
    engine.push_integer(result)
}

/// `value ^ exponent mod modulus`, where the result takes the sign of the
/// power as truncating remainder does.
fn signed_mod_pow(value: &BigInt, exponent: &BigInt, modulus: &BigInt) -> VmResult<BigInt> {
    if exponent.is_negative() {
        return Err(VmError::invalid_operation_msg(format!(
            "The exponent {exponent} is out of range."
        )));
    }
    if modulus.is_zero() {
        return Err(division_by_zero());
    }
    let magnitude = BigInt::from_biguint(
        Sign::Plus,
        value
            .magnitude()
            .modpow(exponent.magnitude(), modulus.magnitude()),
    );
    let odd = exponent.magnitude().bit(0);
    if value.is_negative() && odd {
        Ok(-magnitude)
    } else {
        Ok(magnitude)
    }
}

/// The inverse of `value` modulo `modulus`, by the extended Euclidean algorithm.
fn mod_inverse(value: &BigInt, modulus: &BigInt) -> VmResult<BigInt> {
    if !value.is_positive() {
        return Err(VmError::invalid_operation_msg(format!(
            "The value {value} is out of range."
        )));
    }
    if *modulus < BigInt::from(2) {
        return Err(VmError::invalid_operation_msg(format!(
            "The value {modulus} is out of range."
        )));
    }
    let (mut r, mut old_r) = (value.clone(), modulus.clone());
    let (mut s, mut old_s) = (BigInt::one(), BigInt::zero());
    while r.is_positive() {
        let q = &old_r / &r;
        let next_r = &old_r % &r;
        old_r = std::mem::replace(&mut r, next_r);
        let next_s = &old_s - &q * &s;
        old_s = std::mem::replace(&mut s, next_s);
    }
    let mut result = old_s % modulus;
    if result.is_negative() {
        result += modulus;
    }
    if !(value * &result % modulus).is_one() {
        return Err(VmError::invalid_operation_msg(
            "No modular inverse exists for the given inputs.",
        ));
    }
    Ok(result)
}

fn shl(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let shift = engine.pop_i32()?;
    engine.limits().assert_shift(i64::from(shift))?;
    if shift == 0 {
        return Ok(());
    }
    let x = engine.pop_int()?;
    engine.push_integer(x << shift as usize)
}

/// Arithmetic right shift, rounding toward negative infinity.
fn shr(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let shift = engine.pop_i32()?;
    engine.limits().assert_shift(i64::from(shift))?;
    if shift == 0 {
        return Ok(());
    }
    let x = engine.pop_int()?;
    engine.push_integer(x >> shift as usize)
}

fn not(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let x = engine.pop_bool()?;
    engine.push_bool(!x)
}

fn booland(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let x2 = engine.pop_bool()?;
    let x1 = engine.pop_bool()?;
    engine.push_bool(x1 && x2)
}

fn boolor(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let x2 = engine.pop_bool()?;
    let x1 = engine.pop_bool()?;
    engine.push_bool(x1 || x2)
}

fn nz(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let x = engine.pop_int()?;
    engine.push_bool(!x.is_zero())
}

fn numequal(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let (x1, x2) = pop_pair(engine)?;
    engine.push_bool(x1 == x2)
}

fn numnotequal(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let (x1, x2) = pop_pair(engine)?;
    engine.push_bool(x1 != x2)
}

/// Shared body of LT, LE, GT and GE. A null operand compares as false.
fn compare(
    engine: &mut ExecutionEngine,
    predicate: fn(&BigInt, &BigInt) -> bool,
) -> VmResult<()> {
    let x2 = engine.pop()?;
    let x1 = engine.pop()?;
    if x1.is_null() || x2.is_null() {
        return engine.push_bool(false);
    }
    let result = predicate(&x1.as_int()?, &x2.as_int()?);
    engine.push_bool(result)
}

fn lt(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    compare(engine, |a, b| a < b)
}

fn le(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    compare(engine, |a, b| a <= b)
}

fn gt(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    compare(engine, |a, b| a > b)
}

fn ge(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    compare(engine, |a, b| a >= b)
}

fn min(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let (x1, x2) = pop_pair(engine)?;
    engine.push_integer(x1.min(x2))
}

fn max(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let (x1, x2) = pop_pair(engine)?;
    engine.push_integer(x1.max(x2))
}

/// Pushes whether `a <= x < b`.
fn within(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let b = engine.pop_int()?;
    let a = engine.pop_int()?;
    let x = engine.pop_int()?;
    engine.push_bool(a <= x && x < b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Script;
    use crate::vm_state::VMState;

    fn run(bytes: Vec<u8>) -> ExecutionEngine {
        let mut engine = ExecutionEngine::new(None);
        engine.load_script(Script::new(bytes), -1, 0).unwrap();
        engine.execute();
        engine
    }

    fn eval(bytes: Vec<u8>) -> BigInt {
        let engine = run(bytes);
        assert_eq!(engine.state(), VMState::HALT, "{:?}", engine.fault_exception());
        engine.result_stack().peek(0).unwrap().as_int().unwrap()
    }

    fn int8(value: i8) -> [u8; 2] {
        [OpCode::PUSHINT8 as u8, value as u8]
    }

    fn binary(x1: i8, x2: i8, op: OpCode) -> Vec<u8> {
        let mut script = int8(x1).to_vec();
        script.extend(int8(x2));
        script.push(op as u8);
        script
    }

    #[test]
    fn test_division_truncates() {
        assert_eq!(eval(binary(-7, 2, OpCode::DIV)), BigInt::from(-3));
        assert_eq!(eval(binary(-7, 2, OpCode::MOD)), BigInt::from(-1));
        assert_eq!(eval(binary(7, -2, OpCode::MOD)), BigInt::from(1));
        assert_eq!(run(binary(1, 0, OpCode::DIV)).state(), VMState::FAULT);
    }

    #[test]
    fn test_pow_and_sqrt() {
        assert_eq!(eval(binary(-3, 3, OpCode::POW)), BigInt::from(-27));
        assert_eq!(eval(binary(2, 0, OpCode::POW)), BigInt::from(1));
        assert_eq!(run(binary(2, -1, OpCode::POW)).state(), VMState::FAULT);

        let mut script = int8(17).to_vec();
        script.push(OpCode::SQRT as u8);
        assert_eq!(eval(script), BigInt::from(4));
        let mut script = int8(-1).to_vec();
        script.push(OpCode::SQRT as u8);
        assert_eq!(run(script).state(), VMState::FAULT);
    }

    #[test]
    fn test_shifts() {
        assert_eq!(eval(binary(3, 4, OpCode::SHL)), BigInt::from(48));
        assert_eq!(eval(binary(-5, 1, OpCode::SHR)), BigInt::from(-3));
        // A zero shift leaves the value on the stack untouched.
        assert_eq!(eval(binary(9, 0, OpCode::SHL)), BigInt::from(9));
        assert_eq!(run(binary(1, -1, OpCode::SHL)).state(), VMState::FAULT);
    }

    #[test]
    fn test_modpow_and_inverse() {
        let mut script = int8(3).to_vec();
        script.extend(int8(4));
        script.extend(int8(5));
        script.push(OpCode::MODPOW as u8);
        assert_eq!(eval(script), BigInt::from(1));

        let mut script = int8(-2).to_vec();
        script.extend(int8(3));
        script.extend(int8(5));
        script.push(OpCode::MODPOW as u8);
        assert_eq!(eval(script), BigInt::from(-3));

        let mut script = int8(3).to_vec();
        script.extend(int8(-1));
        script.extend(int8(11));
        script.push(OpCode::MODPOW as u8);
        assert_eq!(eval(script), BigInt::from(4));

        assert!(mod_inverse(&BigInt::from(2), &BigInt::from(4)).is_err());
        assert!(mod_inverse(&BigInt::from(0), &BigInt::from(7)).is_err());
    }

    #[test]
    fn test_modmul() {
        let mut script = int8(7).to_vec();
        script.extend(int8(8));
        script.extend(int8(5));
        script.push(OpCode::MODMUL as u8);
        assert_eq!(eval(script), BigInt::from(1));
    }

    #[test]
    fn test_comparisons_with_null() {
        let engine = run(vec![
            OpCode::PUSHNULL as u8,
            OpCode::PUSH1 as u8,
            OpCode::LT as u8,
        ]);
        assert!(!engine.result_stack().peek(0).unwrap().as_bool().unwrap());
        assert_eq!(eval(binary(1, 2, OpCode::LT)), BigInt::from(1));
        assert_eq!(eval(binary(2, 2, OpCode::GE)), BigInt::from(1));
        assert_eq!(eval(binary(-4, 3, OpCode::MIN)), BigInt::from(-4));
    }

    #[test]
    fn test_within() {
        let mut script = int8(5).to_vec();
        script.extend(int8(5));
        script.extend(int8(6));
        script.push(OpCode::WITHIN as u8);
        assert_eq!(eval(script), BigInt::from(1));

        let mut script = int8(6).to_vec();
        script.extend(int8(5));
        script.extend(int8(6));
        script.push(OpCode::WITHIN as u8);
        assert_eq!(eval(script), BigInt::from(0));
    }

    #[test]
    fn test_integer_overflow_faults() {
        // 2^255 fits in 32 bytes only as a negative number; 2^255 itself overflows.
        let engine = run(vec![
            OpCode::PUSH2 as u8,
            OpCode::PUSHINT16 as u8,
            0xFF,
            0x00,
            OpCode::POW as u8,
        ]);
        assert_eq!(engine.state(), VMState::FAULT);
        assert!(engine
            .fault_exception()
            .unwrap()
            .message()
            .starts_with("MaxSize exceed"));
    }
}
