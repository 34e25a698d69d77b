//! Opcode decoder

use crate::cpu::RegId;
use crate::instruction::Instruction;

/// Decode a 16-bit opcode.
///
/// Total over all inputs: undefined bit patterns yield
/// [`Instruction::Invalid`] carrying the raw opcode.
pub fn decode(opcode: u16) -> Instruction {
    let x = RegId::from_nibble((opcode >> 8) as u8);
    let y = RegId::from_nibble((opcode >> 4) as u8);
    let n = (opcode & 0x000f) as u8;
    let byte = (opcode & 0x00ff) as u8;
    let addr = opcode & 0x0fff;

    match opcode >> 12 {
        0x0 => match opcode {
            0x00e0 => Instruction::Cls,
            0x00ee => Instruction::Ret,
            _ => Instruction::Sys { addr },
        },
        0x1 => Instruction::Jump { addr },
        0x2 => Instruction::Call { addr },
        0x3 => Instruction::SkipEqImm { x, byte },
        0x4 => Instruction::SkipNeImm { x, byte },
        0x5 if n == 0 => Instruction::SkipEqReg { x, y },
        0x6 => Instruction::LoadImm { x, byte },
        0x7 => Instruction::AddImm { x, byte },
        0x8 => decode_alu(opcode, x, y, n),
        0x9 if n == 0 => Instruction::SkipNeReg { x, y },
        0xa => Instruction::LoadIndex { addr },
        0xb => Instruction::JumpOffset { addr },
        0xc => Instruction::Random { x, mask: byte },
        0xd => Instruction::Draw { x, y, rows: n },
        0xe => match byte {
            0x9e => Instruction::SkipKey { x },
            0xa1 => Instruction::SkipNotKey { x },
            _ => Instruction::Invalid { opcode },
        },
        0xf => decode_misc(opcode, x, byte),
        _ => Instruction::Invalid { opcode },
    }
}

fn decode_alu(opcode: u16, x: RegId, y: RegId, n: u8) -> Instruction {
    match n {
        0x0 => Instruction::LoadReg { x, y },
        0x1 => Instruction::Or { x, y },
        0x2 => Instruction::And { x, y },
        0x3 => Instruction::Xor { x, y },
        0x4 => Instruction::AddReg { x, y },
        0x5 => Instruction::Sub { x, y },
        0x6 => Instruction::ShiftRight { x },
        0x7 => Instruction::SubNeg { x, y },
        0xe => Instruction::ShiftLeft { x },
        _ => Instruction::Invalid { opcode },
    }
}

fn decode_misc(opcode: u16, x: RegId, byte: u8) -> Instruction {
    match byte {
        0x07 => Instruction::LoadDelay { x },
        0x0a => Instruction::WaitKey { x },
        0x15 => Instruction::SetDelay { x },
        0x18 => Instruction::SetSound { x },
        0x1e => Instruction::AddIndex { x },
        0x29 => Instruction::LoadGlyph { x },
        0x33 => Instruction::StoreBcd { x },
        0x55 => Instruction::StoreRegs { x },
        0x65 => Instruction::LoadRegs { x },
        _ => Instruction::Invalid { opcode },
    }
}

#[cfg(test)]
#[path = "decoder_tests.rs"]
mod tests;
