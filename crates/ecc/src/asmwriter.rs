//! GAS AT&T-syntax assembly text writer (spec 4.7 "Assembly writer").
//!
//! Three section buffers (`.data`, `.rodata`, `.text`) are filled
//! independently as [`crate::emit`] walks the air program, then
//! concatenated in that fixed order by [`AsmWriter::finish`] — matching
//! "writes `.data`, `.rodata`, `.text` sections in order".

use std::fmt::Write as _;

use crate::symtab::Relocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Data,
    Rodata,
    Text,
}

pub struct AsmWriter {
    data: String,
    rodata: String,
    text: String,
    data_header_written: bool,
    rodata_header_written: bool,
    text_header_written: bool,
}

impl AsmWriter {
    pub fn new() -> Self {
        AsmWriter {
            data: String::new(),
            rodata: String::new(),
            text: String::new(),
            data_header_written: false,
            rodata_header_written: false,
            text_header_written: false,
        }
    }

    fn buf(&mut self, section: Section) -> &mut String {
        match section {
            Section::Data => {
                if !self.data_header_written {
                    self.data.push_str(".data\n");
                    self.data_header_written = true;
                }
                &mut self.data
            }
            Section::Rodata => {
                if !self.rodata_header_written {
                    self.rodata.push_str(".section .rodata\n");
                    self.rodata_header_written = true;
                }
                &mut self.rodata
            }
            Section::Text => {
                if !self.text_header_written {
                    self.text.push_str(".text\n");
                    self.text_header_written = true;
                }
                &mut self.text
            }
        }
    }

    pub fn directive(&mut self, section: Section, line: &str) {
        let _ = writeln!(self.buf(section), "{}", line);
    }

    pub fn globl(&mut self, name: &str) {
        let _ = writeln!(self.buf(Section::Text), ".globl {}", name);
    }

    pub fn label(&mut self, section: Section, name: &str) {
        let _ = writeln!(self.buf(section), "{}:", name);
    }

    /// One instruction line, indented the way hand-written GAS source is.
    pub fn instr(&mut self, line: impl AsRef<str>) {
        let _ = writeln!(self.buf(Section::Text), "\t{}", line.as_ref());
    }

    pub fn comment(&mut self, text: &str) {
        let _ = writeln!(self.buf(Section::Text), "\t# {}", text);
    }

    /// Emits one data item: alignment directive, label, then the
    /// byte/relocation stream (spec 4.7 "Data is serialized by walking
    /// each data buffer's bytes..."). `name_to_label` resolves a
    /// relocation's target symbol to the label text the caller already
    /// computed for it.
    pub fn data_item(
        &mut self,
        section: Section,
        label: &str,
        externally_linked: bool,
        align: u64,
        bytes: &[u8],
        relocations: &[Relocation],
        mut name_to_label: impl FnMut(crate::symtab::SymbolId) -> String,
    ) {
        if externally_linked {
            let _ = writeln!(self.buf(section), ".globl {}", label);
        }
        let _ = writeln!(self.buf(section), ".align {}", align.max(1));
        self.label(section, label);
        let lines = serialize_bytes(bytes, relocations, &mut name_to_label);
        for line in lines {
            let _ = writeln!(self.buf(section), "\t{}", line);
        }
    }

    pub fn finish(self) -> String {
        let mut out = String::new();
        out.push_str(&self.data);
        out.push_str(&self.rodata);
        out.push_str(&self.text);
        out
    }
}

impl Default for AsmWriter {
    fn default() -> Self {
        AsmWriter::new()
    }
}

/// Walks `bytes`, emitting the largest aligned chunk available
/// (`.quad`/`.long`/`.word`/`.byte`) at each position, except where a
/// relocation interrupts the stream: at its recorded offset, emits
/// `.quad label [+ addend]` instead of raw bytes and advances eight bytes
/// (spec 4.7 "Relocations interrupt the byte stream").
fn serialize_bytes(
    bytes: &[u8],
    relocations: &[Relocation],
    name_to_label: &mut impl FnMut(crate::symtab::SymbolId) -> String,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pos: usize = 0;
    while pos < bytes.len() {
        if let Some(reloc) = relocations.iter().find(|r| r.offset as usize == pos) {
            let label = name_to_label(reloc.target);
            lines.push(match reloc.addend {
                0 => format!(".quad {}", label),
                n if n > 0 => format!(".quad {}+{}", label, n),
                n => format!(".quad {}-{}", label, -n),
            });
            pos += 8;
            continue;
        }

        let next_reloc = relocations
            .iter()
            .map(|r| r.offset as usize)
            .filter(|&o| o > pos)
            .min()
            .unwrap_or(bytes.len());
        let remaining = (next_reloc - pos).min(bytes.len() - pos);

        let chunk = if pos % 8 == 0 && remaining >= 8 {
            8
        } else if pos % 4 == 0 && remaining >= 4 {
            4
        } else if pos % 2 == 0 && remaining >= 2 {
            2
        } else {
            1
        };

        let slice = &bytes[pos..pos + chunk];
        let mut buf = [0u8; 8];
        buf[..chunk].copy_from_slice(slice);
        let value = u64::from_le_bytes(buf);
        lines.push(match chunk {
            8 => format!(".quad {}", value as i64),
            4 => format!(".long {}", value as u32),
            2 => format!(".word {}", value as u16),
            _ => format!(".byte {}", value as u8),
        });
        pos += chunk;
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn serializes_plain_bytes_as_largest_aligned_chunks() {
        let bytes = vec![0x68, 0x69, 0x00];
        let lines = serialize_bytes(&bytes, &[], &mut |_| String::new());
        assert_eq!(lines, vec![".word 26984".to_string(), ".byte 0".to_string()]);
    }

    #[test]
    fn relocation_interrupts_the_byte_stream() {
        let bytes = vec![0u8; 16];
        let relocations = vec![Relocation { offset: 0, target: 0, addend: 4 }];
        let lines = serialize_bytes(&bytes, &relocations, &mut |_| "target".to_string());
        assert_eq!(lines[0], ".quad target+4");
        assert_eq!(lines[1], ".quad 0");
    }
}
