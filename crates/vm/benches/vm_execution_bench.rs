//! VM execution benchmarks.
//!
//! Measures the dispatch loop, compound item handling and bytecode
//! generation on representative scripts.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use neovm_engine::{ExecutionEngine, OpCode, Script, ScriptBuilder, VMState};

/// Counts a local down from `iterations` to zero.
fn create_loop_script(iterations: i64) -> Script {
    let mut builder = ScriptBuilder::new();
    builder
        .emit_with_operand(OpCode::INITSLOT, &[1, 0])
        .emit_push_int(iterations)
        .emit(OpCode::STLOC0);
    let loop_start = builder.len();
    builder
        .emit(OpCode::LDLOC0)
        .emit(OpCode::DEC)
        .emit(OpCode::STLOC0)
        .emit(OpCode::LDLOC0);
    let offset = loop_start as i32 - builder.len() as i32;
    builder.emit_jump(OpCode::JMPIF, offset).unwrap();
    builder.emit(OpCode::RET);
    builder.to_script()
}

fn create_arithmetic_script(iterations: usize) -> Script {
    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(1);
    for _ in 0..iterations {
        builder
            .emit(OpCode::DUP)
            .emit_push_int(3)
            .emit(OpCode::MUL)
            .emit_push_int(7)
            .emit(OpCode::MOD)
            .emit(OpCode::ADD);
    }
    builder.to_script()
}

/// Packs `size` integers into an array and unpacks them again.
fn create_pack_script(size: usize) -> Script {
    let mut builder = ScriptBuilder::new();
    for i in 0..size {
        builder.emit_push_int(i as i64);
    }
    builder
        .emit_push_int(size as i64)
        .emit(OpCode::PACK)
        .emit(OpCode::UNPACK)
        .emit(OpCode::CLEAR);
    builder.to_script()
}

fn execute(script: &Script) -> VMState {
    let mut engine = ExecutionEngine::new(None);
    engine.load_script(script.clone(), -1, 0).unwrap();
    engine.execute()
}

fn bench_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("vm_loop");

    for iterations in [100i64, 1_000, 10_000].iter() {
        let script = create_loop_script(*iterations);
        group.throughput(Throughput::Elements(*iterations as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(iterations),
            &script,
            |b, script| b.iter(|| black_box(execute(script))),
        );
    }

    group.finish();
}

fn bench_arithmetic(c: &mut Criterion) {
    let mut group = c.benchmark_group("vm_arithmetic");

    for iterations in [10usize, 100, 500].iter() {
        let script = create_arithmetic_script(*iterations);
        group.throughput(Throughput::Elements(*iterations as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(iterations),
            &script,
            |b, script| b.iter(|| black_box(execute(script))),
        );
    }

    group.finish();
}

fn bench_pack_unpack(c: &mut Criterion) {
    let mut group = c.benchmark_group("vm_pack_unpack");

    for size in [16usize, 256, 1024].iter() {
        let script = create_pack_script(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &script, |b, script| {
            b.iter(|| black_box(execute(script)))
        });
    }

    group.finish();
}

fn bench_script_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("vm_script_creation");

    group.bench_function("strict_validation", |b| {
        let bytes = create_loop_script(1_000).as_bytes().to_vec();
        b.iter(|| black_box(Script::new_strict(bytes.clone()).unwrap()))
    });

    group.bench_function("script_builder", |b| {
        b.iter(|| {
            let mut builder = ScriptBuilder::new();
            for i in 0..64 {
                builder.emit_push_int(black_box(i * 1_000));
                builder.emit_push_string("benchmark");
                builder.emit(OpCode::DROP);
            }
            black_box(builder.to_array())
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_loop,
    bench_arithmetic,
    bench_pack_unpack,
    bench_script_creation
);
criterion_main!(benches);
