//! Interpreted instruction semantics
//!
//! `execute` runs after the engine has advanced PC past the instruction, so
//! skips add one more instruction width and CALL pushes the current PC.

use crate::constants::{ADDRESS_MASK, FONT_GLYPH_SIZE, FONT_START, INSTRUCTION_WIDTH};
use crate::cpu::{Cpu, RegId};
use crate::error::{Error, Result};
use crate::instruction::Instruction;
use crate::memory::Memory;
use crate::peripheral::Peripheral;

/// Source of `RND` bytes, shared with compiled code.
pub fn random_byte() -> u8 {
    rand::random::<u8>()
}

/// Address `offset` bytes past the index register, folded into the address space.
#[inline]
fn index_at(cpu: &Cpu, offset: u16) -> u16 {
    cpu.index.wrapping_add(offset) & ADDRESS_MASK
}

impl Instruction {
    /// Execute against live machine state.
    pub fn execute(&self, cpu: &mut Cpu, memory: &mut Memory, peripheral: &mut dyn Peripheral) -> Result<()> {
        match *self {
            Instruction::Sys { addr } => return Err(Error::SystemCall { addr }),
            Instruction::Invalid { opcode } => return Err(Error::IllegalInstruction { opcode }),

            Instruction::Cls => {
                peripheral.clear_framebuffer();
                peripheral.present_framebuffer();
            }
            Instruction::Ret => {
                cpu.pc = memory.read::<u16>(cpu.sp & ADDRESS_MASK)?;
                cpu.sp = cpu.sp.wrapping_sub(2);
            }
            Instruction::Jump { addr } => cpu.pc = addr,
            Instruction::Call { addr } => {
                cpu.sp = cpu.sp.wrapping_add(2);
                memory.write::<u16>(cpu.sp & ADDRESS_MASK, cpu.pc)?;
                cpu.pc = addr;
            }

            Instruction::SkipEqImm { x, byte } => {
                let taken = cpu.reg(x) == byte;
                skip_if(cpu, taken);
            }
            Instruction::SkipNeImm { x, byte } => {
                let taken = cpu.reg(x) != byte;
                skip_if(cpu, taken);
            }
            Instruction::SkipEqReg { x, y } => {
                let taken = cpu.reg(x) == cpu.reg(y);
                skip_if(cpu, taken);
            }
            Instruction::SkipNeReg { x, y } => {
                let taken = cpu.reg(x) != cpu.reg(y);
                skip_if(cpu, taken);
            }

            Instruction::LoadImm { x, byte } => cpu.set_reg(x, byte),
            Instruction::AddImm { x, byte } => cpu.set_reg(x, cpu.reg(x).wrapping_add(byte)),

            Instruction::LoadReg { x, y } => cpu.set_reg(x, cpu.reg(y)),
            Instruction::Or { x, y } => cpu.set_reg(x, cpu.reg(x) | cpu.reg(y)),
            Instruction::And { x, y } => cpu.set_reg(x, cpu.reg(x) & cpu.reg(y)),
            Instruction::Xor { x, y } => cpu.set_reg(x, cpu.reg(x) ^ cpu.reg(y)),
            Instruction::AddReg { x, y } => {
                let (result, carry) = cpu.reg(x).overflowing_add(cpu.reg(y));
                set_with_flag(cpu, x, result, carry);
            }
            Instruction::Sub { x, y } => {
                let (vx, vy) = (cpu.reg(x), cpu.reg(y));
                set_with_flag(cpu, x, vx.wrapping_sub(vy), vx > vy);
            }
            Instruction::SubNeg { x, y } => {
                let (vx, vy) = (cpu.reg(x), cpu.reg(y));
                set_with_flag(cpu, x, vy.wrapping_sub(vx), vy > vx);
            }
            Instruction::ShiftRight { x } => {
                let vx = cpu.reg(x);
                set_with_flag(cpu, x, vx >> 1, vx & 0x01 != 0);
            }
            Instruction::ShiftLeft { x } => {
                let vx = cpu.reg(x);
                set_with_flag(cpu, x, vx << 1, vx & 0x80 != 0);
            }

            Instruction::LoadIndex { addr } => cpu.index = addr & ADDRESS_MASK,
            Instruction::JumpOffset { addr } => {
                cpu.pc = addr.wrapping_add(cpu.reg(RegId::V0) as u16) & ADDRESS_MASK;
            }
            Instruction::Random { x, mask } => cpu.set_reg(x, random_byte() & mask),

            Instruction::Draw { x, y, rows } => {
                let mut sprite = [0u8; 16];
                for (row, slot) in sprite.iter_mut().enumerate().take(rows as usize) {
                    *slot = memory.read::<u8>(index_at(cpu, row as u16))?;
                }
                let collision = peripheral
                    .framebuffer_mut()
                    .draw_sprite(cpu.reg(x), cpu.reg(y), &sprite[..rows as usize]);
                cpu.set_reg(RegId::FLAGS, collision as u8);
                peripheral.present_framebuffer();
            }
            Instruction::SkipKey { x } => {
                let pressed = peripheral.is_key_pressed(cpu.reg(x));
                skip_if(cpu, pressed);
            }
            Instruction::SkipNotKey { x } => {
                let pressed = peripheral.is_key_pressed(cpu.reg(x));
                skip_if(cpu, !pressed);
            }

            Instruction::LoadDelay { x } => cpu.set_reg(x, cpu.delay_timer),
            Instruction::WaitKey { x } => match peripheral.take_newly_pressed_key() {
                Some(key) => cpu.set_reg(x, key),
                // nothing pressed: run this instruction again next cycle
                None => cpu.pc = cpu.pc.wrapping_sub(INSTRUCTION_WIDTH),
            },
            Instruction::SetDelay { x } => cpu.delay_timer = cpu.reg(x),
            Instruction::SetSound { x } => cpu.sound_timer = cpu.reg(x),
            Instruction::AddIndex { x } => {
                cpu.index = cpu.index.wrapping_add(cpu.reg(x) as u16) & ADDRESS_MASK;
            }
            Instruction::LoadGlyph { x } => {
                cpu.index = (FONT_START + (cpu.reg(x) as u16) * FONT_GLYPH_SIZE) & ADDRESS_MASK;
            }
            Instruction::StoreBcd { x } => {
                let value = cpu.reg(x);
                memory.write::<u8>(index_at(cpu, 0), value / 100)?;
                memory.write::<u8>(index_at(cpu, 1), value / 10 % 10)?;
                memory.write::<u8>(index_at(cpu, 2), value % 10)?;
            }
            Instruction::StoreRegs { x } => {
                let count = x.index() as u16 + 1;
                for offset in 0..count {
                    memory.write::<u8>(index_at(cpu, offset), cpu.registers[offset as usize])?;
                }
                cpu.index = index_at(cpu, count);
            }
            Instruction::LoadRegs { x } => {
                let count = x.index() as u16 + 1;
                for offset in 0..count {
                    cpu.registers[offset as usize] = memory.read::<u8>(index_at(cpu, offset))?;
                }
                cpu.index = index_at(cpu, count);
            }
        }
        Ok(())
    }
}

#[inline]
fn skip_if(cpu: &mut Cpu, condition: bool) {
    if condition {
        cpu.pc = cpu.pc.wrapping_add(INSTRUCTION_WIDTH);
    }
}

/// Result first, flag last: when `x` is VF the flag wins.
#[inline]
fn set_with_flag(cpu: &mut Cpu, x: RegId, result: u8, flag: bool) {
    cpu.set_reg(x, result);
    cpu.set_reg(RegId::FLAGS, flag as u8);
}

#[cfg(test)]
#[path = "exec_tests.rs"]
mod tests;
