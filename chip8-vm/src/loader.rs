//! Program image loading

use chip8_core::constants::{MAX_PROGRAM_SIZE, PROGRAM_START};
use chip8_core::{Error, Memory};
use tracing::debug;

use crate::error::Result;

/// Seed the font and copy `image` to the program start address.
///
/// Loading does not count as a write for invalidation purposes. Images
/// that would run past the end of memory are rejected before anything is
/// copied.
pub fn load_program(memory: &mut Memory, image: &[u8]) -> Result<()> {
    if image.len() > MAX_PROGRAM_SIZE {
        return Err(Error::ProgramTooLarge {
            size: image.len(),
            max: MAX_PROGRAM_SIZE,
        }
        .into());
    }

    memory.load_font();
    memory.load(PROGRAM_START, image)?;
    debug!(bytes = image.len(), "program loaded at 0x{:03x}", PROGRAM_START);
    Ok(())
}
