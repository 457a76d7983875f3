use std::fmt::Write;

const BYTES_PER_LINE: usize = 16;

/// Format `data` as lines of offset, hex bytes and printable ASCII. Offsets
/// start at `base`.
pub fn hex_dump(data: &[u8], base: usize) -> String {
    let mut out = String::new();
    for (i, line) in data.chunks(BYTES_PER_LINE).enumerate() {
        write!(out, "{:04X}:", base + i * BYTES_PER_LINE).unwrap();
        for b in line {
            write!(out, " {:02X}", b).unwrap();
        }
        // Pad a short last line so the ASCII column lines up.
        for _ in line.len()..BYTES_PER_LINE {
            out.push_str("   ");
        }
        out.push_str("  |");
        out.extend(line.iter().map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' }));
        out.push_str("|\n");
    }
    out
}
