//! Hotness tracing, caching and invalidation

use chip8_core::{Cpu, Memory, RegId};
use chip8_jit::{JitConfig, JitEngine, JitError};
use std::time::{Duration, Instant};

const TARGET: u16 = 0x300;

fn engine(hot_threshold: u16) -> Option<JitEngine> {
    // Skip on non-x86_64 platforms due to Cranelift PLT limitations
    if cfg!(not(target_arch = "x86_64")) {
        eprintln!("Skipping JIT test on non-x86_64 platform");
        return None;
    }
    let config = JitConfig {
        hot_threshold,
        ..JitConfig::default()
    };
    Some(JitEngine::new(config).unwrap())
}

fn memory_with(words: &[u16]) -> Memory {
    let mut memory = Memory::new();
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
    memory.load(TARGET, &bytes).unwrap();
    memory
}

#[test]
fn test_threshold_triggers_exactly_one_request() {
    let Some(mut jit) = engine(10) else { return };
    let mut memory = memory_with(&[0x6001, 0x7002, 0x00ee]);

    for _ in 0..9 {
        assert!(jit.trace_call(TARGET, &mut memory).unwrap().is_none());
    }
    jit.wait_idle();
    assert_eq!(jit.stats().compile_requests, 0);
    assert!(!jit.is_cached(TARGET));

    // the tenth call requests; it may or may not already find the block
    let _ = jit.trace_call(TARGET, &mut memory).unwrap();
    assert_eq!(jit.stats().compile_requests, 1);

    jit.wait_idle();
    for _ in 0..5 {
        assert!(jit.trace_call(TARGET, &mut memory).unwrap().is_some());
    }
    let stats = jit.stats();
    assert_eq!(stats.compile_requests, 1);
    assert_eq!(stats.blocks_compiled, 1);
    assert_eq!(stats.cached_blocks, 1);
}

#[test]
fn test_cold_targets_are_independent() {
    let Some(mut jit) = engine(3) else { return };
    let mut memory = memory_with(&[0x6001, 0x7002, 0x00ee]);

    for _ in 0..2 {
        jit.trace_call(TARGET, &mut memory).unwrap();
        jit.trace_call(0x400, &mut memory).unwrap();
    }
    assert_eq!(jit.stats().compile_requests, 0);
}

#[test]
fn test_compiled_block_runs() {
    let Some(mut jit) = engine(1) else { return };
    let mut memory = memory_with(&[0x6001, 0x7002, 0x00ee]);

    jit.trace_call(TARGET, &mut memory).unwrap();
    jit.wait_idle();
    let block = jit.trace_call(TARGET, &mut memory).unwrap().unwrap();

    let mut cpu = Cpu::new();
    cpu.pc = TARGET;
    block.invoke(&mut cpu, &mut memory);
    assert_eq!(cpu.reg(RegId::V0), 3);
    assert_eq!(cpu.pc, 0x304);
}

#[test]
fn test_write_into_block_invalidates() {
    let Some(mut jit) = engine(1) else { return };
    let mut memory = memory_with(&[0x6001, 0x7002, 0x00ee]);

    jit.trace_call(TARGET, &mut memory).unwrap();
    jit.wait_idle();
    assert!(jit.trace_call(TARGET, &mut memory).unwrap().is_some());

    // LD V0, 0x01 -> LD V0, 0x07
    memory.write::<u8>(TARGET + 1, 0x07).unwrap();

    assert!(jit.trace_call(TARGET, &mut memory).unwrap().is_none());
    let stats = jit.stats();
    assert_eq!(stats.invalidations, 1);
    assert_eq!(stats.compile_requests, 2);
    assert!(!memory.is_dirty(TARGET, 4));

    jit.wait_idle();
    let block = jit.trace_call(TARGET, &mut memory).unwrap().unwrap();
    let mut cpu = Cpu::new();
    cpu.pc = TARGET;
    block.invoke(&mut cpu, &mut memory);
    assert_eq!(cpu.reg(RegId::V0), 9);
    assert_eq!(jit.stats().blocks_compiled, 2);
}

#[test]
fn test_write_outside_block_keeps_it() {
    let Some(mut jit) = engine(1) else { return };
    let mut memory = memory_with(&[0x6001, 0x7002, 0x00ee]);

    jit.trace_call(TARGET, &mut memory).unwrap();
    jit.wait_idle();

    memory.write::<u8>(0x310, 0xff).unwrap();
    assert!(jit.trace_call(TARGET, &mut memory).unwrap().is_some());
    assert_eq!(jit.stats().invalidations, 0);
}

#[test]
fn test_short_block_is_discarded() {
    let Some(mut jit) = engine(1) else { return };
    let mut memory = memory_with(&[0x00e0, 0x6001, 0x00ee]);

    jit.trace_call(TARGET, &mut memory).unwrap();
    jit.wait_idle();
    assert!(jit.trace_call(TARGET, &mut memory).unwrap().is_none());

    let stats = jit.stats();
    assert_eq!(stats.blocks_discarded, 1);
    assert_eq!(stats.cached_blocks, 0);
    // no implicit re-request on a miss
    assert_eq!(stats.compile_requests, 1);
}

#[test]
fn test_compile_failure_is_reported() {
    let Some(mut jit) = engine(1) else { return };
    let mut memory = memory_with(&[0x6001, 0x0123, 0x00ee]);

    jit.trace_call(TARGET, &mut memory).unwrap();
    jit.wait_idle();

    match jit.trace_call(TARGET, &mut memory) {
        Err(JitError::Core(chip8_core::Error::SystemCall { addr })) => assert_eq!(addr, 0x123),
        other => panic!("expected a system call fault, got {:?}", other),
    }
    assert_eq!(jit.stats().compile_failures, 1);
}

#[test]
fn test_shutdown_is_prompt() {
    let Some(mut jit) = engine(1) else { return };
    let started = Instant::now();
    jit.shutdown();
    jit.shutdown();
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_reset_forgets_compiled_blocks() {
    let Some(mut jit) = engine(1) else { return };
    let mut memory = memory_with(&[0x6001, 0x7002, 0x00ee]);

    jit.trace_call(TARGET, &mut memory).unwrap();
    jit.wait_idle();
    assert!(jit.is_cached(TARGET));

    // replace the subroutine without touching the dirty bitmap
    memory = memory_with(&[0x6005, 0x7005, 0x00ee]);
    jit.reset();
    assert!(!jit.is_cached(TARGET));
    assert_eq!(jit.stats().cached_blocks, 0);

    // hotness starts over: the next call requests a fresh compile
    let _ = jit.trace_call(TARGET, &mut memory).unwrap();
    assert_eq!(jit.stats().compile_requests, 2);

    jit.wait_idle();
    let block = jit.trace_call(TARGET, &mut memory).unwrap().unwrap();
    let mut cpu = Cpu::new();
    cpu.pc = TARGET;
    block.invoke(&mut cpu, &mut memory);
    assert_eq!(cpu.reg(RegId::V0), 10);
}
