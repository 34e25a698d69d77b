//! Cranelift IR generation for one compiled block
//!
//! A block is the straight run of instructions from a CALL target up to
//! and including its bounding RET. Every instruction boundary gets its own
//! Cranelift block (a label), plus one more for the address past the end.
//! Instructions are emitted in order until one is refused; from there on
//! every remaining label becomes an exit stub that writes its own address
//! into PC and returns. Branches into the untranslated tail therefore always
//! resume the interpreter at the right place.
//!
//! The function takes three base pointers (CPU state, memory, dirty bitmap)
//! bound once at entry. All machine values are handled as zero-extended
//! `i32` and narrowed on store.

use chip8_core::constants::{
    ADDRESS_MASK, DIRTY_GRANULE_SHIFT, FONT_GLYPH_SIZE, FONT_START, INSTRUCTION_WIDTH,
};
use chip8_core::{Cpu, Instruction, RegId};
use cranelift::prelude::*;
use cranelift_codegen::ir::{FuncRef, Function};
use cranelift_module::{FuncId, Module};

use crate::error::Result;

/// Status returned when a block hands control back normally.
pub const STATUS_EXIT: u32 = 0;

/// Status returned when a backward branch ran out of loop budget.
pub const STATUS_LOOP_BUDGET: u32 = 1;

/// Outcome of emitting one instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Emitted {
    /// Code emitted; control continues at the next instruction
    FallThrough,
    /// Code emitted, including its own terminator
    Branched,
    /// Not compilable here; nothing was emitted
    Refused,
}

/// Translate `instructions`, located at `start`, into `func`.
///
/// Returns the number of instructions actually translated.
pub(crate) fn translate(
    func: &mut Function,
    func_ctx: &mut FunctionBuilderContext,
    module: &mut dyn Module,
    random_fn: FuncId,
    start: u16,
    instructions: &[Instruction],
    loop_budget: u32,
) -> Result<usize> {
    let pointer_type = module.target_config().pointer_type();
    let mut builder = FunctionBuilder::new(func, func_ctx);
    let random = module.declare_func_in_func(random_fn, builder.func);

    let entry = builder.create_block();
    builder.append_block_params_for_function_params(entry);
    builder.switch_to_block(entry);
    let params = builder.block_params(entry).to_vec();

    let fuel = Variable::new(0);
    builder.declare_var(fuel, types::I32);
    let budget = builder
        .ins()
        .iconst(types::I32, loop_budget.clamp(1, i32::MAX as u32) as i64);
    builder.def_var(fuel, budget);

    let labels: Vec<Block> = (0..=instructions.len())
        .map(|_| builder.create_block())
        .collect();
    builder.ins().jump(labels[0], &[]);

    let mut emitter = Emitter {
        builder,
        pointer_type,
        cpu: params[0],
        memory: params[1],
        dirty: params[2],
        labels,
        start,
        fuel,
        random,
    };

    let mut translated = instructions.len();
    for (i, instruction) in instructions.iter().enumerate() {
        emitter.builder.switch_to_block(emitter.labels[i]);
        match emitter.emit(i, instruction)? {
            Emitted::FallThrough => {
                let next = emitter.labels[i + 1];
                emitter.builder.ins().jump(next, &[]);
            }
            Emitted::Branched => {}
            Emitted::Refused => {
                translated = i;
                break;
            }
        }
    }

    for i in translated..emitter.labels.len() {
        emitter.builder.switch_to_block(emitter.labels[i]);
        let pc = emitter.address_of(i);
        emitter.exit(pc, STATUS_EXIT);
    }

    emitter.builder.seal_all_blocks();
    emitter.builder.finalize();
    Ok(translated)
}

struct Emitter<'a> {
    builder: FunctionBuilder<'a>,
    pointer_type: Type,
    cpu: Value,
    memory: Value,
    dirty: Value,
    labels: Vec<Block>,
    start: u16,
    fuel: Variable,
    random: FuncRef,
}

impl<'a> Emitter<'a> {
    fn emit(&mut self, i: usize, instruction: &Instruction) -> Result<Emitted> {
        let emitted = match *instruction {
            Instruction::Sys { addr } => return Err(chip8_core::Error::SystemCall { addr }.into()),
            Instruction::Invalid { opcode } => {
                return Err(chip8_core::Error::IllegalInstruction { opcode }.into())
            }

            // interpreter-only forms
            Instruction::Cls
            | Instruction::Ret
            | Instruction::Call { .. }
            | Instruction::JumpOffset { .. }
            | Instruction::Draw { .. }
            | Instruction::SkipKey { .. }
            | Instruction::SkipNotKey { .. }
            | Instruction::WaitKey { .. } => Emitted::Refused,

            Instruction::Jump { addr } => self.jump(i, addr),

            Instruction::SkipEqImm { x, byte } => {
                self.skip_if(i, |e| {
                    let vx = e.load_reg(x);
                    e.builder.ins().icmp_imm(IntCC::Equal, vx, byte as i64)
                })
            }
            Instruction::SkipNeImm { x, byte } => {
                self.skip_if(i, |e| {
                    let vx = e.load_reg(x);
                    e.builder.ins().icmp_imm(IntCC::NotEqual, vx, byte as i64)
                })
            }
            Instruction::SkipEqReg { x, y } => self.skip_if(i, |e| {
                let (vx, vy) = (e.load_reg(x), e.load_reg(y));
                e.builder.ins().icmp(IntCC::Equal, vx, vy)
            }),
            Instruction::SkipNeReg { x, y } => self.skip_if(i, |e| {
                let (vx, vy) = (e.load_reg(x), e.load_reg(y));
                e.builder.ins().icmp(IntCC::NotEqual, vx, vy)
            }),

            Instruction::LoadImm { x, byte } => {
                let value = self.builder.ins().iconst(types::I32, byte as i64);
                self.store_reg(x, value);
                Emitted::FallThrough
            }
            Instruction::AddImm { x, byte } => {
                let vx = self.load_reg(x);
                let sum = self.builder.ins().iadd_imm(vx, byte as i64);
                self.store_reg(x, sum);
                Emitted::FallThrough
            }

            Instruction::LoadReg { x, y } => {
                let vy = self.load_reg(y);
                self.store_reg(x, vy);
                Emitted::FallThrough
            }
            Instruction::Or { x, y } => {
                let (vx, vy) = (self.load_reg(x), self.load_reg(y));
                let result = self.builder.ins().bor(vx, vy);
                self.store_reg(x, result);
                Emitted::FallThrough
            }
            Instruction::And { x, y } => {
                let (vx, vy) = (self.load_reg(x), self.load_reg(y));
                let result = self.builder.ins().band(vx, vy);
                self.store_reg(x, result);
                Emitted::FallThrough
            }
            Instruction::Xor { x, y } => {
                let (vx, vy) = (self.load_reg(x), self.load_reg(y));
                let result = self.builder.ins().bxor(vx, vy);
                self.store_reg(x, result);
                Emitted::FallThrough
            }
            Instruction::AddReg { x, y } => {
                let (vx, vy) = (self.load_reg(x), self.load_reg(y));
                let sum = self.builder.ins().iadd(vx, vy);
                let carry = self.builder.ins().icmp_imm(IntCC::UnsignedGreaterThan, sum, 0xff);
                let carry = self.builder.ins().uextend(types::I32, carry);
                self.store_with_flag(x, sum, carry);
                Emitted::FallThrough
            }
            Instruction::Sub { x, y } => {
                let (vx, vy) = (self.load_reg(x), self.load_reg(y));
                let difference = self.builder.ins().isub(vx, vy);
                let flag = self.builder.ins().icmp(IntCC::UnsignedGreaterThan, vx, vy);
                let flag = self.builder.ins().uextend(types::I32, flag);
                self.store_with_flag(x, difference, flag);
                Emitted::FallThrough
            }
            Instruction::SubNeg { x, y } => {
                let (vx, vy) = (self.load_reg(x), self.load_reg(y));
                let difference = self.builder.ins().isub(vy, vx);
                let flag = self.builder.ins().icmp(IntCC::UnsignedGreaterThan, vy, vx);
                let flag = self.builder.ins().uextend(types::I32, flag);
                self.store_with_flag(x, difference, flag);
                Emitted::FallThrough
            }
            Instruction::ShiftRight { x } => {
                let vx = self.load_reg(x);
                let flag = self.builder.ins().band_imm(vx, 1);
                let result = self.builder.ins().ushr_imm(vx, 1);
                self.store_with_flag(x, result, flag);
                Emitted::FallThrough
            }
            Instruction::ShiftLeft { x } => {
                let vx = self.load_reg(x);
                let flag = self.builder.ins().ushr_imm(vx, 7);
                let result = self.builder.ins().ishl_imm(vx, 1);
                self.store_with_flag(x, result, flag);
                Emitted::FallThrough
            }

            Instruction::LoadIndex { addr } => {
                let value = self
                    .builder
                    .ins()
                    .iconst(types::I32, (addr & ADDRESS_MASK) as i64);
                self.store_index(value);
                Emitted::FallThrough
            }
            Instruction::AddIndex { x } => {
                let index = self.load_index();
                let vx = self.load_reg(x);
                let sum = self.builder.ins().iadd(index, vx);
                self.store_index(sum);
                Emitted::FallThrough
            }
            Instruction::LoadGlyph { x } => {
                let vx = self.load_reg(x);
                let offset = self.builder.ins().imul_imm(vx, FONT_GLYPH_SIZE as i64);
                let glyph = self.builder.ins().iadd_imm(offset, FONT_START as i64);
                self.store_index(glyph);
                Emitted::FallThrough
            }
            Instruction::StoreBcd { x } => {
                let vx = self.load_reg(x);
                let hundred = self.builder.ins().iconst(types::I32, 100);
                let ten = self.builder.ins().iconst(types::I32, 10);
                let hundreds = self.builder.ins().udiv(vx, hundred);
                let tens = self.builder.ins().udiv(vx, ten);
                let tens = self.builder.ins().urem(tens, ten);
                let ones = self.builder.ins().urem(vx, ten);

                let index = self.load_index();
                self.store_mem(index, 0, hundreds);
                self.store_mem(index, 1, tens);
                self.store_mem(index, 2, ones);
                Emitted::FallThrough
            }
            Instruction::StoreRegs { x } => {
                let index = self.load_index();
                for k in 0..=x.index() {
                    let value = self.load_reg(RegId::from_nibble(k as u8));
                    self.store_mem(index, k as i64, value);
                }
                let advanced = self.builder.ins().iadd_imm(index, x.index() as i64 + 1);
                self.store_index(advanced);
                Emitted::FallThrough
            }
            Instruction::LoadRegs { x } => {
                let index = self.load_index();
                for k in 0..=x.index() {
                    let value = self.load_mem(index, k as i64);
                    self.store_reg(RegId::from_nibble(k as u8), value);
                }
                let advanced = self.builder.ins().iadd_imm(index, x.index() as i64 + 1);
                self.store_index(advanced);
                Emitted::FallThrough
            }

            Instruction::LoadDelay { x } => {
                let timer = self.load_u8(Cpu::DELAY_TIMER_OFFSET);
                self.store_reg(x, timer);
                Emitted::FallThrough
            }
            Instruction::SetDelay { x } => {
                let vx = self.load_reg(x);
                self.store_u8(Cpu::DELAY_TIMER_OFFSET, vx);
                Emitted::FallThrough
            }
            Instruction::SetSound { x } => {
                let vx = self.load_reg(x);
                self.store_u8(Cpu::SOUND_TIMER_OFFSET, vx);
                Emitted::FallThrough
            }
            Instruction::Random { x, mask } => {
                let call = self.builder.ins().call(self.random, &[]);
                let byte = self.builder.inst_results(call)[0];
                let value = self.builder.ins().band_imm(byte, mask as i64);
                self.store_reg(x, value);
                Emitted::FallThrough
            }
        };
        Ok(emitted)
    }

    fn address_of(&self, i: usize) -> u16 {
        self.start + (i as u16) * INSTRUCTION_WIDTH
    }

    /// Label index of `addr`, if it is an instruction boundary of this block.
    fn label_of(&self, addr: u16) -> Option<usize> {
        let offset = addr.checked_sub(self.start)?;
        if offset % INSTRUCTION_WIDTH != 0 {
            return None;
        }
        let index = (offset / INSTRUCTION_WIDTH) as usize;
        (index < self.labels.len()).then_some(index)
    }

    fn jump(&mut self, i: usize, addr: u16) -> Emitted {
        let Some(target) = self.label_of(addr) else {
            return Emitted::Refused;
        };
        let destination = self.labels[target];

        if target > i {
            self.builder.ins().jump(destination, &[]);
            return Emitted::Branched;
        }

        // backward branches spend loop budget; an empty tank exits instead
        let fuel = self.builder.use_var(self.fuel);
        let taken = self.builder.create_block();
        let exhausted = self.builder.create_block();
        self.builder.ins().brif(fuel, taken, &[], exhausted, &[]);

        self.builder.switch_to_block(taken);
        let fuel = self.builder.ins().iadd_imm(fuel, -1);
        self.builder.def_var(self.fuel, fuel);
        self.builder.ins().jump(destination, &[]);

        self.builder.switch_to_block(exhausted);
        self.exit(addr, STATUS_LOOP_BUDGET);
        Emitted::Branched
    }

    /// Skip the next instruction when `condition` holds. Refused when the
    /// skip target lies past the end of the block.
    fn skip_if(&mut self, i: usize, condition: impl FnOnce(&mut Self) -> Value) -> Emitted {
        let (skip, next) = (i + 2, i + 1);
        if skip >= self.labels.len() {
            return Emitted::Refused;
        }
        let taken = condition(self);
        let (skip, next) = (self.labels[skip], self.labels[next]);
        self.builder.ins().brif(taken, skip, &[], next, &[]);
        Emitted::Branched
    }

    /// Write back the resuming PC and return `status`.
    fn exit(&mut self, pc: u16, status: u32) {
        let pc = self.builder.ins().iconst(types::I32, pc as i64);
        self.builder
            .ins()
            .istore16(MemFlags::trusted(), pc, self.cpu, Cpu::PC_OFFSET as i32);
        let status = self.builder.ins().iconst(types::I32, status as i64);
        self.builder.ins().return_(&[status]);
    }

    fn load_u8(&mut self, offset: usize) -> Value {
        self.builder
            .ins()
            .uload8(types::I32, MemFlags::trusted(), self.cpu, offset as i32)
    }

    fn store_u8(&mut self, offset: usize, value: Value) {
        self.builder
            .ins()
            .istore8(MemFlags::trusted(), value, self.cpu, offset as i32);
    }

    fn load_reg(&mut self, reg: RegId) -> Value {
        self.load_u8(Cpu::register_offset(reg))
    }

    fn store_reg(&mut self, reg: RegId, value: Value) {
        self.store_u8(Cpu::register_offset(reg), value);
    }

    /// Result first, then the flag, so a flag-register destination keeps the flag.
    fn store_with_flag(&mut self, reg: RegId, result: Value, flag: Value) {
        self.store_reg(reg, result);
        self.store_reg(RegId::FLAGS, flag);
    }

    fn load_index(&mut self) -> Value {
        self.builder
            .ins()
            .uload16(types::I32, MemFlags::trusted(), self.cpu, Cpu::INDEX_OFFSET as i32)
    }

    fn store_index(&mut self, value: Value) {
        let masked = self.builder.ins().band_imm(value, ADDRESS_MASK as i64);
        self.builder
            .ins()
            .istore16(MemFlags::trusted(), masked, self.cpu, Cpu::INDEX_OFFSET as i32);
    }

    /// `(index + offset) & mask`, the address of the offset-th transfer byte.
    fn effective_address(&mut self, index: Value, offset: i64) -> Value {
        let addr = self.builder.ins().iadd_imm(index, offset);
        self.builder.ins().band_imm(addr, ADDRESS_MASK as i64)
    }

    fn byte_pointer(&mut self, base: Value, offset: Value) -> Value {
        let offset = self.builder.ins().uextend(self.pointer_type, offset);
        self.builder.ins().iadd(base, offset)
    }

    fn load_mem(&mut self, index: Value, offset: i64) -> Value {
        let addr = self.effective_address(index, offset);
        let ptr = self.byte_pointer(self.memory, addr);
        self.builder.ins().uload8(types::I32, MemFlags::trusted(), ptr, 0)
    }

    fn store_mem(&mut self, index: Value, offset: i64, value: Value) {
        let addr = self.effective_address(index, offset);
        let ptr = self.byte_pointer(self.memory, addr);
        self.builder.ins().istore8(MemFlags::trusted(), value, ptr, 0);
        self.mark_dirty(addr);
    }

    /// Set the bitmap bit of the granule holding `addr`.
    fn mark_dirty(&mut self, addr: Value) {
        let granule = self.builder.ins().ushr_imm(addr, DIRTY_GRANULE_SHIFT as i64);
        let byte = self.builder.ins().ushr_imm(granule, 3);
        let bit = self.builder.ins().band_imm(granule, 7);
        let one = self.builder.ins().iconst(types::I32, 1);
        let mask = self.builder.ins().ishl(one, bit);

        let ptr = self.byte_pointer(self.dirty, byte);
        let bits = self.builder.ins().uload8(types::I32, MemFlags::trusted(), ptr, 0);
        let bits = self.builder.ins().bor(bits, mask);
        self.builder.ins().istore8(MemFlags::trusted(), bits, ptr, 0);
    }
}
