//! Runtime support for compiled blocks
//!
//! Operations that compiled code delegates back to Rust. Each helper is
//! registered with the JIT module by name.

/// Random byte for `RND`, drawn from the same source as the interpreter.
///
/// Returned widened to 32 bits; compiled code masks it.
#[no_mangle]
pub extern "C" fn jit_runtime_random() -> u32 {
    chip8_core::random_byte() as u32
}

/// Symbol name and address of every runtime helper.
pub(crate) fn symbols() -> [(&'static str, *const u8); 1] {
    [("jit_runtime_random", jit_runtime_random as *const u8)]
}
