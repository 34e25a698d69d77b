//! Decoded instruction representation
//!
//! One variant per opcode form. An `Instruction` carries only its operand
//! fields and is created fresh at every fetch.

use crate::cpu::RegId;
use std::fmt;

/// A decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// `0nnn` - call a machine routine (unsupported, fatal)
    Sys { addr: u16 },
    /// `00E0` - clear the framebuffer
    Cls,
    /// `00EE` - return from subroutine
    Ret,
    /// `1nnn` - jump
    Jump { addr: u16 },
    /// `2nnn` - call subroutine
    Call { addr: u16 },
    /// `3xkk` - skip next if Vx == kk
    SkipEqImm { x: RegId, byte: u8 },
    /// `4xkk` - skip next if Vx != kk
    SkipNeImm { x: RegId, byte: u8 },
    /// `5xy0` - skip next if Vx == Vy
    SkipEqReg { x: RegId, y: RegId },
    /// `6xkk` - Vx = kk
    LoadImm { x: RegId, byte: u8 },
    /// `7xkk` - Vx += kk, no flag
    AddImm { x: RegId, byte: u8 },
    /// `8xy0` - Vx = Vy
    LoadReg { x: RegId, y: RegId },
    /// `8xy1` - Vx |= Vy
    Or { x: RegId, y: RegId },
    /// `8xy2` - Vx &= Vy
    And { x: RegId, y: RegId },
    /// `8xy3` - Vx ^= Vy
    Xor { x: RegId, y: RegId },
    /// `8xy4` - Vx += Vy, VF = carry
    AddReg { x: RegId, y: RegId },
    /// `8xy5` - Vx -= Vy, VF = not borrow
    Sub { x: RegId, y: RegId },
    /// `8xy6` - Vx >>= 1, VF = bit shifted out
    ShiftRight { x: RegId },
    /// `8xy7` - Vx = Vy - Vx, VF = not borrow
    SubNeg { x: RegId, y: RegId },
    /// `8xyE` - Vx <<= 1, VF = bit shifted out
    ShiftLeft { x: RegId },
    /// `9xy0` - skip next if Vx != Vy
    SkipNeReg { x: RegId, y: RegId },
    /// `Annn` - I = nnn
    LoadIndex { addr: u16 },
    /// `Bnnn` - jump to nnn + V0
    JumpOffset { addr: u16 },
    /// `Cxkk` - Vx = random & kk
    Random { x: RegId, mask: u8 },
    /// `Dxyn` - draw an n-row sprite from I at (Vx, Vy)
    Draw { x: RegId, y: RegId, rows: u8 },
    /// `Ex9E` - skip next if key Vx is pressed
    SkipKey { x: RegId },
    /// `ExA1` - skip next if key Vx is not pressed
    SkipNotKey { x: RegId },
    /// `Fx07` - Vx = delay timer
    LoadDelay { x: RegId },
    /// `Fx0A` - wait for a key press, store it in Vx
    WaitKey { x: RegId },
    /// `Fx15` - delay timer = Vx
    SetDelay { x: RegId },
    /// `Fx18` - sound timer = Vx
    SetSound { x: RegId },
    /// `Fx1E` - I += Vx
    AddIndex { x: RegId },
    /// `Fx29` - I = address of glyph Vx
    LoadGlyph { x: RegId },
    /// `Fx33` - store BCD of Vx at I, I+1, I+2
    StoreBcd { x: RegId },
    /// `Fx55` - store V0..=Vx at I, advance I
    StoreRegs { x: RegId },
    /// `Fx65` - load V0..=Vx from I, advance I
    LoadRegs { x: RegId },
    /// Any undefined bit pattern
    Invalid { opcode: u16 },
}

impl Instruction {
    /// Target of a `CALL`, if this is one.
    pub fn call_target(&self) -> Option<u16> {
        match *self {
            Instruction::Call { addr } => Some(addr),
            _ => None,
        }
    }

    /// Whether this is a `RET`.
    pub fn is_return(&self) -> bool {
        matches!(self, Instruction::Ret)
    }

    /// Canonical opcode for this instruction.
    ///
    /// Fields the instruction ignores (Vy of the shift forms) encode as zero.
    pub fn encode(&self) -> u16 {
        fn xkk(top: u16, x: RegId, byte: u8) -> u16 {
            top << 12 | (x as u16) << 8 | byte as u16
        }
        fn xyn(top: u16, x: RegId, y: RegId, n: u16) -> u16 {
            top << 12 | (x as u16) << 8 | (y as u16) << 4 | n
        }
        fn fx(x: RegId, low: u16) -> u16 {
            0xf000 | (x as u16) << 8 | low
        }

        match *self {
            Instruction::Sys { addr } => addr & 0x0fff,
            Instruction::Cls => 0x00e0,
            Instruction::Ret => 0x00ee,
            Instruction::Jump { addr } => 0x1000 | (addr & 0x0fff),
            Instruction::Call { addr } => 0x2000 | (addr & 0x0fff),
            Instruction::SkipEqImm { x, byte } => xkk(0x3, x, byte),
            Instruction::SkipNeImm { x, byte } => xkk(0x4, x, byte),
            Instruction::SkipEqReg { x, y } => xyn(0x5, x, y, 0),
            Instruction::LoadImm { x, byte } => xkk(0x6, x, byte),
            Instruction::AddImm { x, byte } => xkk(0x7, x, byte),
            Instruction::LoadReg { x, y } => xyn(0x8, x, y, 0x0),
            Instruction::Or { x, y } => xyn(0x8, x, y, 0x1),
            Instruction::And { x, y } => xyn(0x8, x, y, 0x2),
            Instruction::Xor { x, y } => xyn(0x8, x, y, 0x3),
            Instruction::AddReg { x, y } => xyn(0x8, x, y, 0x4),
            Instruction::Sub { x, y } => xyn(0x8, x, y, 0x5),
            Instruction::ShiftRight { x } => xyn(0x8, x, RegId::V0, 0x6),
            Instruction::SubNeg { x, y } => xyn(0x8, x, y, 0x7),
            Instruction::ShiftLeft { x } => xyn(0x8, x, RegId::V0, 0xe),
            Instruction::SkipNeReg { x, y } => xyn(0x9, x, y, 0),
            Instruction::LoadIndex { addr } => 0xa000 | (addr & 0x0fff),
            Instruction::JumpOffset { addr } => 0xb000 | (addr & 0x0fff),
            Instruction::Random { x, mask } => xkk(0xc, x, mask),
            Instruction::Draw { x, y, rows } => xyn(0xd, x, y, (rows & 0xf) as u16),
            Instruction::SkipKey { x } => xkk(0xe, x, 0x9e),
            Instruction::SkipNotKey { x } => xkk(0xe, x, 0xa1),
            Instruction::LoadDelay { x } => fx(x, 0x07),
            Instruction::WaitKey { x } => fx(x, 0x0a),
            Instruction::SetDelay { x } => fx(x, 0x15),
            Instruction::SetSound { x } => fx(x, 0x18),
            Instruction::AddIndex { x } => fx(x, 0x1e),
            Instruction::LoadGlyph { x } => fx(x, 0x29),
            Instruction::StoreBcd { x } => fx(x, 0x33),
            Instruction::StoreRegs { x } => fx(x, 0x55),
            Instruction::LoadRegs { x } => fx(x, 0x65),
            Instruction::Invalid { opcode } => opcode,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Sys { addr } => write!(f, "sys 0x{:03x}", addr),
            Instruction::Cls => write!(f, "cls"),
            Instruction::Ret => write!(f, "ret"),
            Instruction::Jump { addr } => write!(f, "jp 0x{:03x}", addr),
            Instruction::Call { addr } => write!(f, "call 0x{:03x}", addr),
            Instruction::SkipEqImm { x, byte } => write!(f, "se {}, 0x{:02x}", x, byte),
            Instruction::SkipNeImm { x, byte } => write!(f, "sne {}, 0x{:02x}", x, byte),
            Instruction::SkipEqReg { x, y } => write!(f, "se {}, {}", x, y),
            Instruction::LoadImm { x, byte } => write!(f, "ld {}, 0x{:02x}", x, byte),
            Instruction::AddImm { x, byte } => write!(f, "add {}, 0x{:02x}", x, byte),
            Instruction::LoadReg { x, y } => write!(f, "ld {}, {}", x, y),
            Instruction::Or { x, y } => write!(f, "or {}, {}", x, y),
            Instruction::And { x, y } => write!(f, "and {}, {}", x, y),
            Instruction::Xor { x, y } => write!(f, "xor {}, {}", x, y),
            Instruction::AddReg { x, y } => write!(f, "add {}, {}", x, y),
            Instruction::Sub { x, y } => write!(f, "sub {}, {}", x, y),
            Instruction::ShiftRight { x } => write!(f, "shr {}", x),
            Instruction::SubNeg { x, y } => write!(f, "subn {}, {}", x, y),
            Instruction::ShiftLeft { x } => write!(f, "shl {}", x),
            Instruction::SkipNeReg { x, y } => write!(f, "sne {}, {}", x, y),
            Instruction::LoadIndex { addr } => write!(f, "ld I, 0x{:03x}", addr),
            Instruction::JumpOffset { addr } => write!(f, "jp V0, 0x{:03x}", addr),
            Instruction::Random { x, mask } => write!(f, "rnd {}, 0x{:02x}", x, mask),
            Instruction::Draw { x, y, rows } => write!(f, "drw {}, {}, {}", x, y, rows),
            Instruction::SkipKey { x } => write!(f, "skp {}", x),
            Instruction::SkipNotKey { x } => write!(f, "sknp {}", x),
            Instruction::LoadDelay { x } => write!(f, "ld {}, DT", x),
            Instruction::WaitKey { x } => write!(f, "ld {}, K", x),
            Instruction::SetDelay { x } => write!(f, "ld DT, {}", x),
            Instruction::SetSound { x } => write!(f, "ld ST, {}", x),
            Instruction::AddIndex { x } => write!(f, "add I, {}", x),
            Instruction::LoadGlyph { x } => write!(f, "ld F, {}", x),
            Instruction::StoreBcd { x } => write!(f, "ld B, {}", x),
            Instruction::StoreRegs { x } => write!(f, "ld [I], {}", x),
            Instruction::LoadRegs { x } => write!(f, "ld {}, [I]", x),
            Instruction::Invalid { opcode } => write!(f, "invalid 0x{:04x}", opcode),
        }
    }
}
