//! chip8 execution engine
//!
//! Ties the machine model to the JIT: loads program images, runs the
//! fetch-decode-execute loop at a paced clock, ticks the timers and hands
//! hot subroutines to [`chip8_jit::JitEngine`].

pub mod builder;
pub mod config;
pub mod error;
pub mod loader;
pub mod machine;

pub use builder::MachineBuilder;
pub use config::VmConfig;
pub use error::{Result, VmError};
pub use loader::load_program;
pub use machine::{Machine, RunLimits, RunOutcome};

// Re-export the machine model so embedders need a single dependency
pub use chip8_core::{Cpu, HeadlessPeripheral, Memory, Peripheral, RegId};
pub use chip8_jit::{JitConfig, JitStats};
