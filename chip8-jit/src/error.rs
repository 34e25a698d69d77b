//! JIT error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum JitError {
    /// A machine-level fault found while translating, such as an illegal opcode
    #[error(transparent)]
    Core(#[from] chip8_core::Error),

    #[error("Native code generation is unavailable on this host: {0}")]
    UnsupportedHost(String),

    #[error("Code generation error: {0}")]
    Codegen(String),

    #[error("Module error: {0}")]
    Module(#[from] cranelift_module::ModuleError),

    #[error("Failed to spawn JIT worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, JitError>;
