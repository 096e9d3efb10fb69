//! Property tests comparing script arithmetic with `BigInt`.

use neovm_engine::op_code::OpCode;
use neovm_engine::{ExecutionEngine, ScriptBuilder, VMState};
use num_bigint::BigInt;
use proptest::prelude::*;

fn eval(builder: &ScriptBuilder) -> (VMState, Vec<BigInt>) {
    let mut engine = ExecutionEngine::new(None);
    engine.load_script(builder.to_script(), -1, 0).unwrap();
    let state = engine.execute();
    let values = engine
        .result_stack()
        .as_slice()
        .iter()
        .map(|item| item.as_int().unwrap())
        .collect();
    (state, values)
}

fn binary(a: i64, b: i64, opcode: OpCode) -> (VMState, Vec<BigInt>) {
    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(a).emit_push_int(b).emit(opcode);
    eval(&builder)
}

proptest! {
    #[test]
    fn push_int_round_trips(value in any::<i64>()) {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(value);
        prop_assert_eq!(eval(&builder), (VMState::HALT, vec![BigInt::from(value)]));
    }

    #[test]
    fn add_sub_mul_match_bigint(a in any::<i64>(), b in any::<i64>()) {
        let (x, y) = (BigInt::from(a), BigInt::from(b));
        prop_assert_eq!(binary(a, b, OpCode::ADD), (VMState::HALT, vec![&x + &y]));
        prop_assert_eq!(binary(a, b, OpCode::SUB), (VMState::HALT, vec![&x - &y]));
        prop_assert_eq!(binary(a, b, OpCode::MUL), (VMState::HALT, vec![&x * &y]));
    }

    #[test]
    fn div_and_mod_truncate(a in any::<i64>(), b in any::<i64>().prop_filter("non-zero", |b| *b != 0)) {
        let (x, y) = (BigInt::from(a), BigInt::from(b));
        prop_assert_eq!(binary(a, b, OpCode::DIV), (VMState::HALT, vec![&x / &y]));
        prop_assert_eq!(binary(a, b, OpCode::MOD), (VMState::HALT, vec![&x % &y]));
    }

    #[test]
    fn comparisons_match_ordering(a in any::<i64>(), b in any::<i64>()) {
        let flag = |value: bool| BigInt::from(u8::from(value));
        prop_assert_eq!(binary(a, b, OpCode::LT), (VMState::HALT, vec![flag(a < b)]));
        prop_assert_eq!(binary(a, b, OpCode::GE), (VMState::HALT, vec![flag(a >= b)]));
        prop_assert_eq!(binary(a, b, OpCode::MAX), (VMState::HALT, vec![BigInt::from(a.max(b))]));
    }

    #[test]
    fn pack_unpack_preserves_order(values in prop::collection::vec(any::<i32>(), 0..32)) {
        let mut builder = ScriptBuilder::new();
        for value in &values {
            builder.emit_push_int(i64::from(*value));
        }
        builder
            .emit_push_int(values.len() as i64)
            .emit(OpCode::PACK)
            .emit(OpCode::UNPACK);

        let (state, stack) = eval(&builder);
        prop_assert_eq!(state, VMState::HALT);

        let mut expected: Vec<BigInt> = values.iter().map(|v| BigInt::from(*v)).collect();
        expected.push(BigInt::from(values.len()));
        prop_assert_eq!(stack, expected);
    }
}
