//! Hex dump formatting for packet tracing

use std::fmt::Write;

const BYTES_PER_LINE: usize = 16;

/// Format `data` as `offset  hex  |ascii|` rows of 16 bytes
pub fn hexdump(data: &[u8]) -> String {
    let mut out = String::new();

    for (row, chunk) in data.chunks(BYTES_PER_LINE).enumerate() {
        let _ = write!(out, "{:08x}  ", row * BYTES_PER_LINE);

        for i in 0..BYTES_PER_LINE {
            if i == BYTES_PER_LINE / 2 {
                out.push(' ');
            }
            match chunk.get(i) {
                Some(byte) => {
                    let _ = write!(out, "{:02x} ", byte);
                }
                None => out.push_str("   "),
            }
        }

        out.push_str(" |");
        out.extend(chunk.iter().map(|&b| printable(b)));
        out.push_str("|\n");
    }

    out
}

fn printable(byte: u8) -> char {
    if byte.is_ascii_graphic() || byte == b' ' {
        byte as char
    } else {
        '.'
    }
}
