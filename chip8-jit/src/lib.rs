//! Cranelift-based JIT compiler for chip8 subroutines
//!
//! Hot CALL targets are translated to native code on a background worker
//! and published into an address-keyed code cache. The execution engine
//! asks the cache for a compiled block on every CALL and invokes it right
//! after interpreting the CALL itself. Blocks whose instruction bytes have
//! been written since compilation are retired and recompiled.

use serde::{Deserialize, Serialize};

pub mod block;
pub mod codegen;
pub mod compiler;
pub mod engine;
pub mod error;
pub mod runtime;

mod queue;

pub use block::CompiledBlock;
pub use codegen::{STATUS_EXIT, STATUS_LOOP_BUDGET};
pub use compiler::BlockCompiler;
pub use engine::JitEngine;
pub use error::{JitError, Result};

/// JIT tuning knobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitConfig {
    /// Enable JIT compilation
    pub enabled: bool,
    /// Number of calls to a target before it is compiled
    pub hot_threshold: u16,
    /// Blocks translating fewer instructions than this are discarded
    pub min_block_instructions: usize,
    /// Backward branches a compiled block may take per invocation before
    /// handing control back to the interpreter
    pub loop_budget: u32,
}

impl Default for JitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hot_threshold: 10,
            min_block_instructions: 2,
            loop_budget: 4096,
        }
    }
}

/// JIT compilation statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JitStats {
    pub compile_requests: u64,
    pub blocks_compiled: u64,
    pub blocks_discarded: u64,
    pub invalidations: u64,
    pub compile_failures: u64,
    pub cached_blocks: usize,
}
