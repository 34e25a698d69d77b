use super::*;
use chip8_jit::JitError;

#[test]
fn test_core_errors_display_unchanged() {
    let err: VmError = chip8_core::Error::IllegalInstruction { opcode: 0x5121 }.into();
    assert_eq!(err.to_string(), "Illegal instruction: 0x5121");
}

#[test]
fn test_core_looks_through_jit_errors() {
    let err: VmError = JitError::Core(chip8_core::Error::SystemCall { addr: 0x123 }).into();
    assert_eq!(
        err.core(),
        Some(&chip8_core::Error::SystemCall { addr: 0x123 })
    );

    let err: VmError = JitError::UnsupportedHost("riscv32".to_string()).into();
    assert!(err.core().is_none());
    assert!(err.to_string().starts_with("JIT error:"));
}
