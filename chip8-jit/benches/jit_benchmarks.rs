//! JIT compilation benchmarks

use chip8_core::constants::INSTRUCTION_WIDTH;
use chip8_core::{decode, Cpu, HeadlessPeripheral, Memory};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use chip8_jit::{BlockCompiler, JitConfig};

const START: u16 = 0x300;

fn memory_with(words: &[u16]) -> Memory {
    let mut memory = Memory::new();
    memory.load_font();
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
    memory.load(START, &bytes).unwrap();
    memory
}

fn test_cases() -> Vec<(&'static str, Vec<u16>)> {
    vec![
        ("straight_line", vec![0x6005, 0x8004, 0x61ff, 0x7101, 0x8014, 0x8125, 0x00ee]),
        ("bcd_store", vec![0x65fe, 0xa500, 0xf533, 0xf265, 0xf255, 0x00ee]),
        // count V0 up to 0xff
        ("counting_loop", vec![0x7001, 0x30ff, 0x1300, 0x00ee]),
    ]
}

fn benchmark_compilation(c: &mut Criterion) {
    let mut group = c.benchmark_group("jit_compilation");
    let compiler = BlockCompiler::new(&JitConfig::default()).unwrap();

    for (name, words) in test_cases() {
        let memory = memory_with(&words);
        group.bench_with_input(BenchmarkId::new("compile", name), &memory, |b, memory| {
            b.iter(|| black_box(compiler.compile(memory.bytes(), START).unwrap()));
        });
    }

    group.finish();
}

fn benchmark_interpreted_vs_native(c: &mut Criterion) {
    let mut group = c.benchmark_group("execution");
    let compiler = BlockCompiler::new(&JitConfig::default()).unwrap();

    for (name, words) in test_cases() {
        let memory = memory_with(&words);
        let block = compiler.compile(memory.bytes(), START).unwrap().unwrap();
        let stop = START + block.instruction_count() as u16 * INSTRUCTION_WIDTH;

        group.bench_with_input(BenchmarkId::new("interpreter", name), &memory, |b, memory| {
            let mut peripheral = HeadlessPeripheral::new();
            b.iter(|| {
                let mut cpu = Cpu::new();
                let mut memory = memory.clone();
                cpu.pc = START;
                while cpu.pc >= START && cpu.pc < stop {
                    let instruction = decode(memory.fetch_instruction_word(cpu.pc).unwrap());
                    cpu.pc += INSTRUCTION_WIDTH;
                    instruction.execute(&mut cpu, &mut memory, &mut peripheral).unwrap();
                }
                black_box(cpu)
            });
        });

        group.bench_with_input(BenchmarkId::new("native", name), &memory, |b, memory| {
            b.iter(|| {
                let mut cpu = Cpu::new();
                let mut memory = memory.clone();
                cpu.pc = START;
                block.invoke(&mut cpu, &mut memory);
                black_box(cpu)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_compilation, benchmark_interpreted_vs_native);
criterion_main!(benches);
