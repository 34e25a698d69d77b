//! Error types for the execution engine

use thiserror::Error;

/// Anything that stops the machine.
#[derive(Error, Debug)]
pub enum VmError {
    /// Fault raised by the machine model: bad fetch, illegal or system
    /// instruction, oversized image
    #[error(transparent)]
    Core(#[from] chip8_core::Error),

    /// Fatal compile error reported by the JIT worker
    #[error("JIT error: {0}")]
    Jit(#[from] chip8_jit::JitError),
}

impl VmError {
    /// The machine-model fault behind this error, looking through JIT
    /// errors that wrap one.
    pub fn core(&self) -> Option<&chip8_core::Error> {
        match self {
            VmError::Core(err) => Some(err),
            VmError::Jit(chip8_jit::JitError::Core(err)) => Some(err),
            VmError::Jit(_) => None,
        }
    }
}

/// Result type for the execution engine
pub type Result<T> = std::result::Result<T, VmError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
