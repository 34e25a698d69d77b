//! Core machine model for the chip8 virtual machine
//!
//! This crate provides the building blocks shared by the interpreter and
//! the JIT compiler:
//! - Memory with its dirty-write bitmap
//! - CPU register state
//! - Instruction representation and the opcode decoder
//! - Interpreted instruction semantics
//! - The display/input peripheral interface

pub mod constants;
pub mod cpu;
pub mod decoder;
pub mod error;
pub mod exec;
pub mod instruction;
pub mod memory;
pub mod peripheral;

pub use cpu::{Cpu, RegId};
pub use decoder::decode;
pub use error::{Error, Result};
pub use exec::random_byte;
pub use instruction::Instruction;
pub use memory::Memory;
pub use peripheral::{Framebuffer, HeadlessPeripheral, Peripheral};
