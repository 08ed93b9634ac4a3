#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
#[cfg(not(target_arch = "wasm32"))]
use tgsi::full::FullToken;
#[cfg(not(target_arch = "wasm32"))]
use tgsi::test_utils::{build_program, simple_instruction};
#[cfg(not(target_arch = "wasm32"))]
use tgsi::token::{ProcessorType, RegisterFile, Semantic};
#[cfg(not(target_arch = "wasm32"))]
use tgsi::{FullDeclaration, FullImmediate, Opcode};

/// A fragment program with `n` arithmetic instructions over a handful of declared registers.
#[cfg(not(target_arch = "wasm32"))]
fn synthetic_program(n: usize) -> Vec<u32> {
    let mut records = vec![
        FullToken::Declaration(
            FullDeclaration::new(RegisterFile::Input, 0, 3).with_semantic(Semantic::Generic, 0),
        ),
        FullToken::Declaration(FullDeclaration::new(RegisterFile::Temporary, 0, 7)),
        FullToken::Declaration(
            FullDeclaration::new(RegisterFile::Output, 0, 0).with_semantic(Semantic::Color, 0),
        ),
        FullToken::Immediate(FullImmediate::float32(&[0.0, 0.5, 1.0, 2.0])),
    ];
    let ops = [Opcode::Mad, Opcode::Mul, Opcode::Add, Opcode::Dp4];
    for i in 0..n {
        let opcode = ops[i % ops.len()];
        let info = opcode.info();
        let t = (i % 8) as i16;
        let src: Vec<_> = (0..info.num_src)
            .map(|s| {
                if s == 0 {
                    (RegisterFile::Input, (i % 4) as i16)
                } else {
                    (RegisterFile::Temporary, (t + s as i16) % 8)
                }
            })
            .collect();
        records.push(FullToken::Instruction(simple_instruction(
            opcode,
            &[(RegisterFile::Temporary, t)],
            &src,
        )));
    }
    records.push(FullToken::Instruction(simple_instruction(
        Opcode::Mov,
        &[(RegisterFile::Output, 0)],
        &[(RegisterFile::Temporary, 0)],
    )));
    records.push(FullToken::Instruction(simple_instruction(Opcode::End, &[], &[])));
    build_program(ProcessorType::Fragment, &records)
}

#[cfg(not(target_arch = "wasm32"))]
fn bench_token_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("tgsi");

    for n in [16usize, 256, 2048] {
        let tokens = synthetic_program(n);

        group.bench_with_input(BenchmarkId::new("parse", n), &tokens, |b, tokens| {
            b.iter(|| {
                let records = tgsi::parse_all(black_box(tokens)).unwrap();
                black_box(records.len());
            })
        });

        group.bench_with_input(BenchmarkId::new("sanity", n), &tokens, |b, tokens| {
            b.iter(|| black_box(tgsi::sanity_check(black_box(tokens))))
        });

        group.bench_with_input(BenchmarkId::new("dump", n), &tokens, |b, tokens| {
            b.iter(|| {
                let text = tgsi::dump(black_box(tokens), tgsi::DumpFlags::empty()).unwrap();
                black_box(text.len());
            })
        });
    }

    group.finish();
}

#[cfg(not(target_arch = "wasm32"))]
criterion_group!(benches, bench_token_stream);
#[cfg(not(target_arch = "wasm32"))]
criterion_main!(benches);
