//! End-to-end machine behaviour, interpreted and with the JIT

use chip8_core::constants::{MAX_PROGRAM_SIZE, PROGRAM_START};
use chip8_core::{Error, HeadlessPeripheral, RegId};
use chip8_jit::JitConfig;
use chip8_vm::{Machine, MachineBuilder, RunLimits, RunOutcome, VmConfig, VmError};
use std::time::{Duration, Instant};

fn image(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_be_bytes()).collect()
}

fn interpreted(words: &[u16]) -> Machine<HeadlessPeripheral> {
    MachineBuilder::new()
        .without_jit()
        .unpaced()
        .with_program(image(words))
        .build()
        .unwrap()
}

fn jitted(words: &[u16], hot_threshold: u16) -> Option<Machine<HeadlessPeripheral>> {
    // Skip on non-x86_64 platforms due to Cranelift PLT limitations
    if cfg!(not(target_arch = "x86_64")) {
        eprintln!("Skipping JIT test on non-x86_64 platform");
        return None;
    }
    let machine = MachineBuilder::new()
        .with_jit(JitConfig {
            hot_threshold,
            ..JitConfig::default()
        })
        .unpaced()
        .with_program(image(words))
        .build()
        .unwrap();
    assert!(machine.jit().is_some());
    Some(machine)
}

/// Step until `pc` reaches `halt`, letting the JIT worker drain after each
/// cycle so compiled blocks appear at deterministic points.
fn run_to(machine: &mut Machine<HeadlessPeripheral>, halt: u16) {
    for _ in 0..10_000 {
        if machine.cpu().pc == halt {
            return;
        }
        machine.step().unwrap();
        if let Some(jit) = machine.jit() {
            jit.wait_idle();
        }
    }
    panic!("never reached 0x{:03x}, pc = 0x{:03x}", halt, machine.cpu().pc);
}

#[test]
fn test_add_program_settles_on_jump() {
    // LD V0, 5; ADD V0, V0; JP 0x204
    let mut machine = interpreted(&[0x6005, 0x8004, 0x1204]);

    let outcome = machine
        .run_with_limits(RunLimits {
            max_cycles: Some(50),
            time_limit: None,
        })
        .unwrap();

    assert_eq!(outcome, RunOutcome::CycleLimit);
    assert_eq!(machine.cycles(), 50);
    assert_eq!(machine.cpu().reg(RegId::V0), 10);
    assert_eq!(machine.cpu().reg(RegId::VF), 0);
    assert_eq!(machine.cpu().pc, 0x204);
}

#[test]
fn test_call_and_return() {
    // 0x200 CALL 0x206; 0x202 JP 0x202; 0x204 pad; 0x206 LD V1, 7; 0x208 RET
    let mut machine = interpreted(&[0x2206, 0x1202, 0x0000, 0x6107, 0x00ee]);

    machine.step().unwrap();
    assert_eq!(machine.cpu().pc, 0x206);
    assert_eq!(machine.cpu().sp, 0x52);
    assert_eq!(machine.memory().read::<u16>(0x52).unwrap(), 0x202);

    machine.step().unwrap();
    machine.step().unwrap();
    assert_eq!(machine.cpu().pc, 0x202);
    assert_eq!(machine.cpu().sp, 0x50);
    assert_eq!(machine.cpu().reg(RegId::V1), 7);
}

/// Calls a subroutine twenty times; the subroutine accumulates into V0/V1
/// and stores both at 0x400 + V2.
const HOT_LOOP: &[u16] = &[
    0x6200, // 0x200 LD V2, 0
    0x2210, // 0x202 CALL 0x210
    0x7201, // 0x204 ADD V2, 1
    0x3214, // 0x206 SE V2, 20
    0x1202, // 0x208 JP 0x202
    0x120a, // 0x20a JP 0x20a
    0x0000, 0x0000,
    0x7003, // 0x210 ADD V0, 3
    0x8104, // 0x212 ADD V1, V0
    0xa400, // 0x214 LD I, 0x400
    0xf21e, // 0x216 ADD I, V2
    0xf155, // 0x218 LD [I], V1
    0x00ee, // 0x21a RET
];

#[test]
fn test_jit_matches_interpreter() {
    let Some(mut native) = jitted(HOT_LOOP, 1) else { return };
    let mut reference = interpreted(HOT_LOOP);

    run_to(&mut native, 0x20a);
    run_to(&mut reference, 0x20a);

    assert_eq!(native.cpu(), reference.cpu());
    assert_eq!(native.memory().bytes(), reference.memory().bytes());

    let stats = native.jit_stats().unwrap();
    assert_eq!(stats.compile_requests, 1);
    assert_eq!(stats.blocks_compiled, 1);
    assert_eq!(stats.invalidations, 0);
    // the compiled block covers most calls, so far fewer cycles were needed
    assert!(native.cycles() < reference.cycles());
}

#[test]
fn test_self_modifying_code_is_recompiled() {
    let mut words = vec![
        0x2300, // 0x200 CALL 0x300
        0x6007, // 0x202 LD V0, 7
        0xa301, // 0x204 LD I, 0x301
        0xf055, // 0x206 LD [I], V0  (patches the subroutine's immediate)
        0x2300, // 0x208 CALL 0x300
        0x6100, // 0x20a LD V1, 0
        0x2300, // 0x20c CALL 0x300
        0x120e, // 0x20e JP 0x20e
    ];
    words.resize((0x300 - PROGRAM_START as usize) / 2, 0);
    words.extend_from_slice(&[
        0x6101, // 0x300 LD V1, 1
        0x7101, // 0x302 ADD V1, 1
        0x00ee, // 0x304 RET
    ]);

    let Some(mut native) = jitted(&words, 1) else { return };
    run_to(&mut native, 0x20e);

    assert_eq!(native.cpu().reg(RegId::V1), 8);
    let stats = native.jit_stats().unwrap();
    assert_eq!(stats.invalidations, 1);
    assert_eq!(stats.compile_requests, 2);
    assert_eq!(stats.blocks_compiled, 2);

    let mut reference = interpreted(&words);
    run_to(&mut reference, 0x20e);
    assert_eq!(native.cpu(), reference.cpu());
}

#[test]
fn test_reload_discards_blocks_of_previous_image() {
    fn with_subroutine(main: &[u16], body: [u16; 3]) -> Vec<u16> {
        let mut words = main.to_vec();
        words.resize((0x300 - PROGRAM_START as usize) / 2, 0);
        words.extend_from_slice(&body);
        words
    }

    // CALL 0x300; JP 0x202 / 0x300: LD V1, 1; ADD V1, 1; RET
    let first = with_subroutine(&[0x2300, 0x1202], [0x6101, 0x7101, 0x00ee]);
    // CALL 0x300; LD V1, 0; CALL 0x300; JP 0x206 / 0x300: LD V1, 5; ADD V1, 5; RET
    let second = with_subroutine(&[0x2300, 0x6100, 0x2300, 0x1206], [0x6105, 0x7105, 0x00ee]);

    let Some(mut native) = jitted(&first, 1) else { return };
    run_to(&mut native, 0x202);
    assert_eq!(native.cpu().reg(RegId::V1), 2);
    assert!(native.jit().unwrap().is_cached(0x300));

    native.load(&image(&second)).unwrap();
    assert_eq!(native.cpu().pc, PROGRAM_START);
    run_to(&mut native, 0x206);
    assert_eq!(native.cpu().reg(RegId::V1), 10);

    let mut reference = interpreted(&second);
    run_to(&mut reference, 0x206);
    assert_eq!(native.cpu(), reference.cpu());

    let stats = native.jit_stats().unwrap();
    assert_eq!(stats.compile_requests, 2);
    assert_eq!(stats.blocks_compiled, 2);
    assert_eq!(stats.invalidations, 0);
}

#[test]
fn test_wait_key_blocks_until_pressed() {
    // LD V0, K; JP 0x202
    let mut machine = interpreted(&[0xf00a, 0x1202]);

    for _ in 0..5 {
        machine.step().unwrap();
        assert_eq!(machine.cpu().pc, 0x200);
    }

    machine.peripheral_mut().press_key(0xb);
    machine.step().unwrap();
    assert_eq!(machine.cpu().pc, 0x202);
    assert_eq!(machine.cpu().reg(RegId::V0), 0xb);
}

#[test]
fn test_sound_timer_cues_every_cycle_until_expired() {
    // LD V0, 3; LD ST, V0; JP 0x204
    let mut machine = interpreted(&[0x6003, 0xf018, 0x1204]);
    for _ in 0..40 {
        machine.step().unwrap();
    }
    // set on cycle 2, ticks on cycles 8, 16 and 24
    assert_eq!(machine.peripheral().cues(), 23);
    assert_eq!(machine.cpu().sound_timer, 0);
}

#[test]
fn test_delay_timer_ticks_at_timer_rate() {
    // LD V0, 10; LD DT, V0; JP 0x204
    let mut machine = interpreted(&[0x600a, 0xf015, 0x1204]);
    for _ in 0..16 {
        machine.step().unwrap();
    }
    assert_eq!(machine.cpu().delay_timer, 8);
}

#[test]
fn test_misaligned_pc_is_fatal() {
    let mut machine = interpreted(&[0x6005, 0x1202]);
    machine.cpu_mut().pc = 0x201;
    match machine.step() {
        Err(VmError::Core(Error::MisalignedPc { pc })) => assert_eq!(pc, 0x201),
        other => panic!("expected MisalignedPc, got {:?}", other),
    }
}

#[test]
fn test_illegal_instruction_stops_run() {
    let mut machine = interpreted(&[0x6005, 0x5121]);
    match machine.run() {
        Err(VmError::Core(Error::IllegalInstruction { opcode })) => assert_eq!(opcode, 0x5121),
        other => panic!("expected IllegalInstruction, got {:?}", other),
    }
    assert_eq!(machine.cycles(), 1);
}

#[test]
fn test_oversized_image_is_rejected() {
    let mut machine = interpreted(&[]);
    match machine.load(&vec![0; MAX_PROGRAM_SIZE + 1]) {
        Err(VmError::Core(Error::ProgramTooLarge { size, .. })) => {
            assert_eq!(size, MAX_PROGRAM_SIZE + 1)
        }
        other => panic!("expected ProgramTooLarge, got {:?}", other),
    }
}

#[test]
fn test_exit_request_ends_run() {
    let mut machine = interpreted(&[0x1200]);
    machine.peripheral_mut().request_exit();
    assert_eq!(machine.run_with_limits(RunLimits::default()).unwrap(), RunOutcome::Exited);
    assert_eq!(machine.cycles(), 0);
}

#[test]
fn test_time_limit_ends_run() {
    let mut machine = interpreted(&[0x1200]);
    let outcome = machine
        .run_with_limits(RunLimits {
            max_cycles: None,
            time_limit: Some(Duration::from_millis(20)),
        })
        .unwrap();
    assert_eq!(outcome, RunOutcome::TimeLimit);
    assert!(machine.cycles() > 0);
}

#[test]
fn test_pacing_holds_clock_rate() {
    let config = VmConfig {
        clock_hz: 1000,
        jit: JitConfig {
            enabled: false,
            ..JitConfig::default()
        },
        ..VmConfig::default()
    };
    let mut machine = MachineBuilder::new()
        .with_config(config)
        .with_program(image(&[0x1200]))
        .build()
        .unwrap();

    let started = Instant::now();
    machine
        .run_with_limits(RunLimits {
            max_cycles: Some(20),
            time_limit: None,
        })
        .unwrap();
    assert!(started.elapsed() >= Duration::from_millis(15));
}

#[test]
fn test_interpreted_machine_has_no_jit_stats() {
    let machine = interpreted(&[0x1200]);
    assert!(machine.jit_stats().is_none());
}
