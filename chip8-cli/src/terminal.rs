//! Terminal presenter
//!
//! Draws the framebuffer with half-block characters, two pixel rows per
//! text line. There is no keyboard input: the keypad always reads as
//! released.

use anyhow::{bail, Result};
use chip8_core::{Framebuffer, Peripheral};
use std::io::{IsTerminal, Stdout, Write};
use tracing::warn;

const CLEAR_SCREEN: &str = "\x1b[2J";
const CURSOR_HOME: &str = "\x1b[H";
const HIDE_CURSOR: &str = "\x1b[?25l";
const SHOW_CURSOR: &str = "\x1b[?25h";

pub struct TerminalPeripheral {
    framebuffer: Framebuffer,
    stdout: Stdout,
    bell: bool,
    failed: bool,
}

impl TerminalPeripheral {
    /// Take over the terminal. Fails when stdout is not a terminal.
    pub fn new(bell: bool) -> Result<Self> {
        let mut stdout = std::io::stdout();
        if !stdout.is_terminal() {
            bail!("stdout is not a terminal");
        }
        write!(stdout, "{}{}", CLEAR_SCREEN, HIDE_CURSOR)?;
        stdout.flush()?;

        Ok(Self {
            framebuffer: Framebuffer::new(),
            stdout,
            bell,
            failed: false,
        })
    }

    fn write_frame(&mut self) -> std::io::Result<()> {
        let frame = render(&self.framebuffer);
        let mut out = self.stdout.lock();
        out.write_all(CURSOR_HOME.as_bytes())?;
        out.write_all(frame.as_bytes())?;
        out.flush()
    }

    fn report(&mut self, result: std::io::Result<()>) {
        if let Err(err) = result {
            // warn once; a broken terminal would otherwise flood the log
            if !self.failed {
                warn!("terminal output failed: {}", err);
                self.failed = true;
            }
        }
    }
}

impl Peripheral for TerminalPeripheral {
    fn clear_framebuffer(&mut self) {
        self.framebuffer.clear();
    }

    fn present_framebuffer(&mut self) {
        let result = self.write_frame();
        self.report(result);
    }

    fn framebuffer_mut(&mut self) -> &mut Framebuffer {
        &mut self.framebuffer
    }

    fn poll_input_events(&mut self) {}

    fn exit_requested(&self) -> bool {
        false
    }

    fn is_key_pressed(&self, _key: u8) -> bool {
        false
    }

    fn take_newly_pressed_key(&mut self) -> Option<u8> {
        None
    }

    fn signal_audible_cue(&mut self) {
        if self.bell {
            let result = self
                .stdout
                .write_all(b"\x07")
                .and_then(|_| self.stdout.flush());
            self.report(result);
        }
    }
}

impl Drop for TerminalPeripheral {
    fn drop(&mut self) {
        let _ = write!(self.stdout, "{}", SHOW_CURSOR);
        let _ = self.stdout.flush();
    }
}

/// Render a framebuffer as text, two pixel rows per line.
pub fn render(framebuffer: &Framebuffer) -> String {
    let rows: Vec<&[bool]> = framebuffer.rows().collect();
    let mut text = String::with_capacity((Framebuffer::WIDTH * 3 + 1) * rows.len() / 2);
    for pair in rows.chunks(2) {
        let upper = pair[0];
        let lower = pair.get(1).copied();
        for x in 0..Framebuffer::WIDTH {
            let top = upper[x];
            let bottom = lower.map_or(false, |row| row[x]);
            text.push(match (top, bottom) {
                (true, true) => '█',
                (true, false) => '▀',
                (false, true) => '▄',
                (false, false) => ' ',
            });
        }
        text.push('\n');
    }
    text
}
