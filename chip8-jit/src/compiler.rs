//! Block compiler: block discovery and module management

use chip8_core::constants::{INSTRUCTION_WIDTH, MEMORY_SIZE};
use chip8_core::{decode, Instruction};
use cranelift::prelude::*;
use cranelift_codegen::isa::OwnedTargetIsa;
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{Linkage, Module};
use std::time::Instant;
use tracing::{debug, trace};

use crate::block::CompiledBlock;
use crate::codegen;
use crate::error::{JitError, Result};
use crate::runtime;
use crate::JitConfig;

/// Translates blocks of a memory image into native code.
///
/// Each compiled block gets a fresh JIT module so it can be freed on its
/// own; the target ISA is built once and shared.
pub struct BlockCompiler {
    isa: OwnedTargetIsa,
    min_block_instructions: usize,
    loop_budget: u32,
}

impl BlockCompiler {
    /// Create a compiler for the host.
    pub fn new(config: &JitConfig) -> Result<Self> {
        let mut flag_builder = settings::builder();
        // Absolute addressing everywhere; PLT-based calls to runtime helpers
        // are not supported by the JIT linker on every architecture.
        for (name, value) in [
            ("opt_level", "speed"),
            ("is_pic", "false"),
            ("use_colocated_libcalls", "false"),
        ] {
            flag_builder
                .set(name, value)
                .map_err(|e| JitError::Codegen(format!("Failed to set {} flag: {}", name, e)))?;
        }

        let isa_builder = cranelift_native::builder()
            .map_err(|msg| JitError::UnsupportedHost(msg.to_string()))?;
        let isa = isa_builder
            .finish(settings::Flags::new(flag_builder))
            .map_err(|e| JitError::Codegen(e.to_string()))?;

        if isa.pointer_type() != types::I64 {
            return Err(JitError::UnsupportedHost(format!(
                "{}-bit pointers",
                isa.pointer_bits()
            )));
        }

        Ok(Self {
            isa,
            min_block_instructions: config.min_block_instructions,
            loop_budget: config.loop_budget,
        })
    }

    /// Compile the block starting at `start` in `image`.
    ///
    /// Returns `Ok(None)` when nothing worth publishing came out: a start
    /// that is not instruction-aligned, no bounding RET before the end of
    /// memory, or fewer translated instructions than the configured minimum.
    pub fn compile(&self, image: &[u8], start: u16) -> Result<Option<CompiledBlock>> {
        let started = Instant::now();

        if start % INSTRUCTION_WIDTH != 0 {
            trace!(start, "misaligned block start");
            return Ok(None);
        }
        let Some(instructions) = scan_block(image, start) else {
            trace!(start, "no bounding ret");
            return Ok(None);
        };

        let mut builder = JITBuilder::with_isa(self.isa.clone(), cranelift_module::default_libcall_names());
        for (name, address) in runtime::symbols() {
            builder.symbol(name, address);
        }
        let mut module = JITModule::new(builder);

        let mut random_sig = module.make_signature();
        random_sig.returns.push(AbiParam::new(types::I32));
        let random_fn = module.declare_function("jit_runtime_random", Linkage::Import, &random_sig)?;

        let pointer_type = module.target_config().pointer_type();
        let mut ctx = module.make_context();
        for _ in 0..3 {
            ctx.func.signature.params.push(AbiParam::new(pointer_type));
        }
        ctx.func.signature.returns.push(AbiParam::new(types::I32));

        let mut func_ctx = FunctionBuilderContext::new();
        let translated = codegen::translate(
            &mut ctx.func,
            &mut func_ctx,
            &mut module,
            random_fn,
            start,
            &instructions,
            self.loop_budget,
        )?;

        if translated < self.min_block_instructions.max(1) {
            debug!(translated, "block at 0x{:03x} too short, discarded", start);
            return Ok(None);
        }

        let name = format!("chip8_block_{:03x}", start);
        let func_id = module.declare_function(&name, Linkage::Local, &ctx.func.signature)?;
        module.define_function(func_id, &mut ctx)?;
        module.clear_context(&mut ctx);
        module.finalize_definitions()?;
        let code = module.get_finalized_function(func_id);

        debug!(
            translated,
            scanned = instructions.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "block at 0x{:03x} compiled",
            start
        );

        // SAFETY: `code` was finalized in `module` from a function with the
        // block signature declared above.
        Ok(Some(unsafe { CompiledBlock::new(module, code, start, translated) }))
    }
}

/// Decode forward from `start` through the first RET, inclusive.
fn scan_block(image: &[u8], start: u16) -> Option<Vec<Instruction>> {
    let end = image.len().min(MEMORY_SIZE);
    let mut instructions = Vec::new();
    let mut addr = start as usize;

    while addr + 1 < end {
        let instruction = decode(u16::from_be_bytes([image[addr], image[addr + 1]]));
        instructions.push(instruction);
        if instruction.is_return() {
            return Some(instructions);
        }
        addr += INSTRUCTION_WIDTH as usize;
    }
    None
}

#[cfg(test)]
#[path = "compiler_tests.rs"]
mod tests;
