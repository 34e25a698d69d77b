//! Display and input collaborator interface
//!
//! The machine only depends on the [`Peripheral`] trait. Rendering backends
//! live outside this crate; [`HeadlessPeripheral`] is the built-in backend
//! used when nothing can be displayed.

use crate::constants::{FRAMEBUFFER_HEIGHT, FRAMEBUFFER_WIDTH, KEYPAD_SIZE};
use std::collections::VecDeque;
use std::io::Write;
use tracing::trace;

/// Monochrome pixel bitmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framebuffer {
    pixels: Box<[bool]>,
}

impl Framebuffer {
    /// Width in pixels.
    pub const WIDTH: usize = FRAMEBUFFER_WIDTH;
    /// Height in pixels.
    pub const HEIGHT: usize = FRAMEBUFFER_HEIGHT;

    pub fn new() -> Self {
        Self {
            pixels: vec![false; Self::WIDTH * Self::HEIGHT].into_boxed_slice(),
        }
    }

    pub fn clear(&mut self) {
        self.pixels.fill(false);
    }

    /// Pixel at (x, y); coordinates wrap.
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.pixels[Self::offset(x, y)]
    }

    /// XOR one pixel, returning true if it went from set to unset.
    pub fn toggle(&mut self, x: usize, y: usize) -> bool {
        let offset = Self::offset(x, y);
        let was_set = self.pixels[offset];
        self.pixels[offset] = !was_set;
        was_set
    }

    /// XOR an 8-pixel-wide sprite at (x, y), one byte per row, most
    /// significant bit leftmost. Coordinates wrap on both axes.
    ///
    /// Returns true if any pixel was erased.
    pub fn draw_sprite(&mut self, x: u8, y: u8, rows: &[u8]) -> bool {
        let mut collision = false;
        for (dy, row) in rows.iter().enumerate() {
            for dx in 0..8 {
                if row & (0x80 >> dx) != 0 {
                    collision |= self.toggle(x as usize + dx, y as usize + dy);
                }
            }
        }
        collision
    }

    /// Rows of pixels, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[bool]> {
        self.pixels.chunks(Self::WIDTH)
    }

    /// Number of set pixels.
    pub fn lit(&self) -> usize {
        self.pixels.iter().filter(|p| **p).count()
    }

    fn offset(x: usize, y: usize) -> usize {
        (y % Self::HEIGHT) * Self::WIDTH + (x % Self::WIDTH)
    }
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Capabilities the machine needs from its display/input backend.
pub trait Peripheral: Send {
    /// Clear the framebuffer.
    fn clear_framebuffer(&mut self);

    /// Make the current framebuffer contents visible.
    fn present_framebuffer(&mut self);

    /// The framebuffer drawing instructions operate on.
    fn framebuffer_mut(&mut self) -> &mut Framebuffer;

    /// Refresh the pressed-key set and the exit flag.
    fn poll_input_events(&mut self);

    /// Whether the backend has asked the machine to stop.
    fn exit_requested(&self) -> bool;

    /// Whether `key` is currently held. Keys outside the keypad are never held.
    fn is_key_pressed(&self, key: u8) -> bool;

    /// Consume one key pressed since the last call, if any.
    fn take_newly_pressed_key(&mut self) -> Option<u8>;

    /// Produce the audible cue. Called every cycle the sound timer is nonzero.
    fn signal_audible_cue(&mut self);
}

impl<P: Peripheral + ?Sized> Peripheral for Box<P> {
    fn clear_framebuffer(&mut self) {
        (**self).clear_framebuffer()
    }

    fn present_framebuffer(&mut self) {
        (**self).present_framebuffer()
    }

    fn framebuffer_mut(&mut self) -> &mut Framebuffer {
        (**self).framebuffer_mut()
    }

    fn poll_input_events(&mut self) {
        (**self).poll_input_events()
    }

    fn exit_requested(&self) -> bool {
        (**self).exit_requested()
    }

    fn is_key_pressed(&self, key: u8) -> bool {
        (**self).is_key_pressed(key)
    }

    fn take_newly_pressed_key(&mut self) -> Option<u8> {
        (**self).take_newly_pressed_key()
    }

    fn signal_audible_cue(&mut self) {
        (**self).signal_audible_cue()
    }
}

/// A peripheral that never renders.
///
/// Input is scripted through [`press_key`](Self::press_key) and friends,
/// which makes this the backend of choice for tests.
#[derive(Debug, Default)]
pub struct HeadlessPeripheral {
    framebuffer: Framebuffer,
    keys: [bool; KEYPAD_SIZE],
    newly_pressed: VecDeque<u8>,
    exit: bool,
    presents: u64,
    cues: u64,
    bell: bool,
}

impl HeadlessPeripheral {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ring the terminal bell on every audible cue.
    pub fn with_bell(mut self, bell: bool) -> Self {
        self.bell = bell;
        self
    }

    /// Hold a key down. Ignores keys outside the keypad.
    pub fn press_key(&mut self, key: u8) {
        if let Some(slot) = self.keys.get_mut(key as usize) {
            if !*slot {
                self.newly_pressed.push_back(key);
            }
            *slot = true;
        }
    }

    pub fn release_key(&mut self, key: u8) {
        if let Some(slot) = self.keys.get_mut(key as usize) {
            *slot = false;
        }
    }

    pub fn request_exit(&mut self) {
        self.exit = true;
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    /// Number of audible cues signalled so far.
    pub fn cues(&self) -> u64 {
        self.cues
    }

    /// Number of framebuffer presents so far.
    pub fn presents(&self) -> u64 {
        self.presents
    }
}

impl Peripheral for HeadlessPeripheral {
    fn clear_framebuffer(&mut self) {
        self.framebuffer.clear();
    }

    fn present_framebuffer(&mut self) {
        self.presents += 1;
    }

    fn framebuffer_mut(&mut self) -> &mut Framebuffer {
        &mut self.framebuffer
    }

    fn poll_input_events(&mut self) {}

    fn exit_requested(&self) -> bool {
        self.exit
    }

    fn is_key_pressed(&self, key: u8) -> bool {
        self.keys.get(key as usize).copied().unwrap_or(false)
    }

    fn take_newly_pressed_key(&mut self) -> Option<u8> {
        self.newly_pressed.pop_front()
    }

    fn signal_audible_cue(&mut self) {
        self.cues += 1;
        if self.bell {
            let mut stdout = std::io::stdout();
            if stdout.write_all(b"\x07").and_then(|_| stdout.flush()).is_err() {
                trace!("terminal bell unavailable");
            }
        }
    }
}

#[cfg(test)]
#[path = "peripheral_tests.rs"]
mod tests;
