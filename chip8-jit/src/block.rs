//! Compiled block handle
//!
//! The only place where executable memory and raw function pointers are
//! touched. A block owns the JIT module its code lives in, and frees that
//! memory when the last handle is dropped.

use chip8_core::constants::INSTRUCTION_WIDTH;
use chip8_core::{Cpu, Memory};
use cranelift_jit::JITModule;
use std::fmt;
use std::mem;
use std::ops::Range;

/// Native entry point: CPU state, memory base, dirty bitmap base.
type BlockFn = unsafe extern "C" fn(*mut Cpu, *mut u8, *mut u8) -> u32;

/// Native code for one block of instructions
pub struct CompiledBlock {
    module: Option<JITModule>,
    entry: BlockFn,
    start: u16,
    instruction_count: usize,
}

// SAFETY: the module is never touched after finalization except to free it
// on drop, and the finalized code is immutable. Invocation requires
// `&mut Cpu` and `&mut Memory`, so it is serialized with every other
// access to machine state.
unsafe impl Send for CompiledBlock {}
unsafe impl Sync for CompiledBlock {}

impl CompiledBlock {
    /// Wrap finalized code.
    ///
    /// # Safety
    /// `code` must be the finalized address of a function in `module` with
    /// the [`BlockFn`] signature that only touches the three regions it is
    /// given, within their bounds.
    pub(crate) unsafe fn new(
        module: JITModule,
        code: *const u8,
        start: u16,
        instruction_count: usize,
    ) -> Self {
        let entry = mem::transmute::<*const u8, BlockFn>(code);
        Self {
            module: Some(module),
            entry,
            start,
            instruction_count,
        }
    }

    /// Run the block against live machine state.
    ///
    /// The block runs until it reaches an instruction it cannot execute,
    /// leaves the block, or exhausts its loop budget. PC is always left
    /// pointing at the next instruction for the interpreter.
    pub fn invoke(&self, cpu: &mut Cpu, memory: &mut Memory) -> u32 {
        let (bytes, dirty) = memory.raw_parts_mut();
        // SAFETY: see `new`. The pointers come from live exclusive borrows.
        unsafe { (self.entry)(cpu as *mut Cpu, bytes, dirty) }
    }

    /// Address of the first instruction.
    pub fn start(&self) -> u16 {
        self.start
    }

    /// Number of instructions translated.
    pub fn instruction_count(&self) -> usize {
        self.instruction_count
    }

    /// Bytes the compiled code was translated from.
    pub fn instruction_range(&self) -> Range<u16> {
        self.start..self.start + self.byte_len() as u16
    }

    pub fn byte_len(&self) -> usize {
        self.instruction_count * INSTRUCTION_WIDTH as usize
    }
}

impl Drop for CompiledBlock {
    fn drop(&mut self) {
        if let Some(module) = self.module.take() {
            // SAFETY: `entry` points into this module and dies with `self`.
            unsafe { module.free_memory() };
        }
    }
}

impl fmt::Debug for CompiledBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledBlock")
            .field("start", &format_args!("0x{:03x}", self.start))
            .field("instruction_count", &self.instruction_count)
            .finish()
    }
}
