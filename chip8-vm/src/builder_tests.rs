use super::*;
use chip8_core::constants::MAX_PROGRAM_SIZE;
use chip8_core::RegId;

#[test]
fn test_builder_defaults() {
    let machine = MachineBuilder::new().without_jit().build().unwrap();
    assert_eq!(machine.config().clock_hz, 480);
    assert!(machine.config().pace);
    assert!(machine.jit().is_none());
    assert_eq!(machine.cpu().pc, 0x200);
}

#[test]
fn test_builder_loads_program() {
    let mut machine = MachineBuilder::new()
        .without_jit()
        .unpaced()
        .with_program(vec![0x60, 0x2a, 0x12, 0x02])
        .build()
        .unwrap();
    machine.step().unwrap();
    assert_eq!(machine.cpu().reg(RegId::V0), 0x2a);
}

#[test]
fn test_builder_rejects_oversized_program() {
    let result = MachineBuilder::new()
        .without_jit()
        .with_program(vec![0; MAX_PROGRAM_SIZE + 2])
        .build();
    assert!(matches!(
        result.err().and_then(|err| err.core().cloned()),
        Some(chip8_core::Error::ProgramTooLarge { .. })
    ));
}

#[test]
fn test_builder_jit_config() {
    let jit = JitConfig {
        enabled: false,
        hot_threshold: 3,
        ..JitConfig::default()
    };
    let machine = MachineBuilder::new().with_jit(jit.clone()).build().unwrap();
    assert_eq!(machine.config().jit, jit);
}
