//! Assembler benchmarks.
//!
//! Measures the PHF code lookups, symbol table operations and the full
//! two-pass pipeline.
//!
//! Run with:
//! ```bash
//! cargo bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use hack_assembler::{assemble_lines, code, SymbolTable};

fn bench_code_lookups(c: &mut Criterion) {
    let mut group = c.benchmark_group("code_lookups");
    group.throughput(Throughput::Elements(4));

    group.bench_function("dest_lookup_hot", |b| {
        b.iter(|| {
            black_box(code::dest("AMD").unwrap());
            black_box(code::dest("D").unwrap());
            black_box(code::dest("M").unwrap());
            black_box(code::dest("").unwrap());
        });
    });

    group.bench_function("comp_lookup_hot", |b| {
        b.iter(|| {
            black_box(code::comp("D+1").unwrap());
            black_box(code::comp("D&M").unwrap());
            black_box(code::comp("M-D").unwrap());
            black_box(code::comp("0").unwrap());
        });
    });

    group.bench_function("encode_c_instruction_hot", |b| {
        b.iter(|| {
            black_box(code::encode_c_instruction("D", "D+1", "JMP").unwrap());
        });
    });

    group.finish();
}

fn bench_symbol_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("symbol_table");

    group.throughput(Throughput::Elements(3));
    group.bench_function("lookup_predefined_hot", |b| {
        let table = SymbolTable::new();
        b.iter(|| {
            black_box(table.resolve("SP"));
            black_box(table.resolve("R15"));
            black_box(table.resolve("SCREEN"));
        });
    });

    group.bench_function("get_or_insert_existing", |b| {
        let mut table = SymbolTable::new();
        table.define_label("LOOP", 100).unwrap();
        let mut ram_address = 16;
        b.iter(|| {
            black_box(table.get_or_insert("LOOP", &mut ram_address));
        });
    });

    group.finish();
}

fn bench_full_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_assembly");

    let loop_program: Vec<String> = [
        "@100", "D=A", "@i", "M=D", "(LOOP)", "@i", "D=M", "@END", "D;JEQ", "@i", "M=M-1",
        "@LOOP", "0;JMP", "(END)", "@END", "0;JMP",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect();

    group.throughput(Throughput::Elements(loop_program.len() as u64));
    group.bench_function("pipeline_loop_16_lines", |b| {
        b.iter(|| assemble_lines(black_box(&loop_program)).unwrap());
    });

    // Label-free body repeated 20 times: stresses variable resolution.
    let large_program: Vec<String> = ["@i", "M=M+1", "@sum", "D=M", "@100", "D=D+A"]
        .iter()
        .cycle()
        .take(6 * 20)
        .map(|s| (*s).to_string())
        .collect();

    group.throughput(Throughput::Elements(large_program.len() as u64));
    group.bench_function("pipeline_large_120_lines", |b| {
        b.iter(|| assemble_lines(black_box(&large_program)).unwrap());
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_code_lookups,
    bench_symbol_table,
    bench_full_assembly,
);

criterion_main!(benches);
