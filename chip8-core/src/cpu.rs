//! CPU register state

use crate::constants::{PROGRAM_START, REGISTER_COUNT, STACK_START};
use std::fmt;
use std::mem::offset_of;

/// General purpose register identifiers.
///
/// `VF` doubles as the flags register for carry, borrow and collision results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum RegId {
    V0 = 0x0,
    V1 = 0x1,
    V2 = 0x2,
    V3 = 0x3,
    V4 = 0x4,
    V5 = 0x5,
    V6 = 0x6,
    V7 = 0x7,
    V8 = 0x8,
    V9 = 0x9,
    VA = 0xa,
    VB = 0xb,
    VC = 0xc,
    VD = 0xd,
    VE = 0xe,
    VF = 0xf,
}

impl RegId {
    /// All registers in index order.
    pub const ALL: [RegId; REGISTER_COUNT] = [
        RegId::V0,
        RegId::V1,
        RegId::V2,
        RegId::V3,
        RegId::V4,
        RegId::V5,
        RegId::V6,
        RegId::V7,
        RegId::V8,
        RegId::V9,
        RegId::VA,
        RegId::VB,
        RegId::VC,
        RegId::VD,
        RegId::VE,
        RegId::VF,
    ];

    /// The flags register.
    pub const FLAGS: RegId = RegId::VF;

    /// Register named by the low four bits of `nibble`.
    pub fn from_nibble(nibble: u8) -> Self {
        Self::ALL[(nibble & 0xf) as usize]
    }

    /// Register index, 0 through 15.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for RegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{:X}", *self as u8)
    }
}

/// Architectural register state.
///
/// The layout is fixed so compiled code can address fields at constant
/// offsets from a single base pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
#[repr(C)]
pub struct Cpu {
    /// V0 through VF
    pub registers: [u8; REGISTER_COUNT],
    /// Program counter
    pub pc: u16,
    /// Stack pointer; addresses the most recently pushed word
    pub sp: u16,
    /// Index register, kept within the 12-bit address space
    pub index: u16,
    /// Delay timer, decremented at the timer rate while nonzero
    pub delay_timer: u8,
    /// Sound timer; the audible cue plays while it is nonzero
    pub sound_timer: u8,
}

impl Cpu {
    /// Byte offset of `registers` for compiled code.
    pub const REGISTERS_OFFSET: usize = offset_of!(Cpu, registers);
    /// Byte offset of `pc` for compiled code.
    pub const PC_OFFSET: usize = offset_of!(Cpu, pc);
    /// Byte offset of `sp` for compiled code.
    pub const SP_OFFSET: usize = offset_of!(Cpu, sp);
    /// Byte offset of `index` for compiled code.
    pub const INDEX_OFFSET: usize = offset_of!(Cpu, index);
    /// Byte offset of `delay_timer` for compiled code.
    pub const DELAY_TIMER_OFFSET: usize = offset_of!(Cpu, delay_timer);
    /// Byte offset of `sound_timer` for compiled code.
    pub const SOUND_TIMER_OFFSET: usize = offset_of!(Cpu, sound_timer);

    /// Power-on state: PC at the program load address, SP at the stack base.
    pub fn new() -> Self {
        Self {
            registers: [0; REGISTER_COUNT],
            pc: PROGRAM_START,
            sp: STACK_START,
            index: 0,
            delay_timer: 0,
            sound_timer: 0,
        }
    }

    /// Read a general purpose register.
    #[inline]
    pub fn reg(&self, reg: RegId) -> u8 {
        self.registers[reg.index()]
    }

    /// Write a general purpose register.
    #[inline]
    pub fn set_reg(&mut self, reg: RegId, value: u8) {
        self.registers[reg.index()] = value;
    }

    /// Byte offset of a register for compiled code.
    pub fn register_offset(reg: RegId) -> usize {
        Self::REGISTERS_OFFSET + reg.index()
    }

    /// Decrement both timers by one if nonzero.
    pub fn tick_timers(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
