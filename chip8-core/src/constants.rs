//! Fixed machine parameters

/// Size of the addressable byte store.
pub const MEMORY_SIZE: usize = 0x1000;

/// Mask folding any address into the 12-bit address space.
pub const ADDRESS_MASK: u16 = 0x0fff;

/// Width of one instruction word in bytes.
pub const INSTRUCTION_WIDTH: u16 = 2;

/// Where the built-in character sprites are seeded.
pub const FONT_START: u16 = 0x000;

/// Bytes per character sprite.
pub const FONT_GLYPH_SIZE: u16 = 5;

/// Load address of program images. Everything below it is reserved.
pub const PROGRAM_START: u16 = 0x200;

/// Largest program image that fits above the reserved area.
pub const MAX_PROGRAM_SIZE: usize = MEMORY_SIZE - PROGRAM_START as usize;

/// The software stack grows upward from the end of the glyph table.
pub const STACK_START: u16 = FONT_START + FONT.len() as u16;

/// log2 of the dirty-tracking granule size in bytes.
///
/// Shared by the interpreter's store path, the code emitted for compiled
/// stores, and the staleness scan.
pub const DIRTY_GRANULE_SHIFT: u32 = 2;

/// Number of dirty-tracking granules covering memory.
pub const DIRTY_GRANULES: usize = MEMORY_SIZE >> DIRTY_GRANULE_SHIFT;

/// Size in bytes of the packed dirty bitmap (one bit per granule).
pub const DIRTY_MAP_BYTES: usize = DIRTY_GRANULES / 8;

/// Number of general purpose registers.
pub const REGISTER_COUNT: usize = 16;

/// Framebuffer width in pixels.
pub const FRAMEBUFFER_WIDTH: usize = 64;

/// Framebuffer height in pixels.
pub const FRAMEBUFFER_HEIGHT: usize = 32;

/// Number of keys on the keypad.
pub const KEYPAD_SIZE: usize = 16;

/// Built-in hexadecimal character sprites, 0 through F.
pub const FONT: [u8; 80] = [
    0xf0, 0x90, 0x90, 0x90, 0xf0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xf0, 0x10, 0xf0, 0x80, 0xf0, // 2
    0xf0, 0x10, 0xf0, 0x10, 0xf0, // 3
    0x90, 0x90, 0xf0, 0x10, 0x10, // 4
    0xf0, 0x80, 0xf0, 0x10, 0xf0, // 5
    0xf0, 0x80, 0xf0, 0x90, 0xf0, // 6
    0xf0, 0x10, 0x20, 0x40, 0x40, // 7
    0xf0, 0x90, 0xf0, 0x90, 0xf0, // 8
    0xf0, 0x90, 0xf0, 0x10, 0xf0, // 9
    0xf0, 0x90, 0xf0, 0x90, 0x90, // A
    0xe0, 0x90, 0xe0, 0x90, 0xe0, // B
    0xf0, 0x80, 0x80, 0x80, 0xf0, // C
    0xe0, 0x90, 0x90, 0x90, 0xe0, // D
    0xf0, 0x80, 0xf0, 0x80, 0xf0, // E
    0xf0, 0x80, 0xf0, 0x80, 0x80, // F
];
