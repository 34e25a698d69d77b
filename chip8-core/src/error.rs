//! Error types for the chip8 machine model

use thiserror::Error;

/// Fatal machine conditions. None of these are retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Out of bounds access: {size} byte(s) at 0x{addr:04x}")]
    OutOfBounds { addr: u16, size: usize },

    #[error("Illegal instruction: 0x{opcode:04x}")]
    IllegalInstruction { opcode: u16 },

    #[error("System call executed: sys 0x{addr:03x}")]
    SystemCall { addr: u16 },

    #[error("Misaligned program counter: 0x{pc:04x}")]
    MisalignedPc { pc: u16 },

    #[error("Program image too large: {size} bytes, max is {max}")]
    ProgramTooLarge { size: usize, max: usize },
}

/// Result type used throughout the machine model
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
