//! Program image input: raw binary files or a single line of hex text

use anyhow::{bail, Context, Result};
use std::io::BufRead;
use std::path::Path;

/// Read a program image. A path of `-` reads one hex line from stdin;
/// `hex` treats a file's contents as hex text instead of raw bytes.
pub fn read_image(path: &Path, hex: bool) -> Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .context("reading hex image from stdin")?;
        return decode_hex(&line);
    }

    if hex {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        decode_hex(&text).with_context(|| format!("decoding {}", path.display()))
    } else {
        std::fs::read(path).with_context(|| format!("reading {}", path.display()))
    }
}

/// Decode a hex string, two digits per byte. Surrounding whitespace is
/// ignored; anything else that is not a hex digit is an error.
pub fn decode_hex(text: &str) -> Result<Vec<u8>> {
    let digits = text.trim().as_bytes();
    if digits.len() % 2 != 0 {
        bail!("hex image has odd length {}", digits.len());
    }

    digits
        .chunks(2)
        .enumerate()
        .map(|(i, pair)| -> Result<u8> {
            Ok(nibble(pair[0], 2 * i)? << 4 | nibble(pair[1], 2 * i + 1)?)
        })
        .collect()
}

fn nibble(digit: u8, offset: usize) -> Result<u8> {
    match (digit as char).to_digit(16) {
        Some(value) => Ok(value as u8),
        None => bail!("invalid hex digit {:?} at offset {}", digit as char, offset),
    }
}
