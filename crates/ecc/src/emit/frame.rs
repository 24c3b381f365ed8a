//! Stack frame layout (spec 4.6 "Frame layout").
//!
//! One [`Frame`] is built per routine: automatic-duration symbols get a
//! stack slot the first time an operand references them and reuse it on
//! every later reference, the variadic register-save area (if any) is
//! reserved up front, and the final `stackalloc` is rounded up to 16 bytes
//! as the prologue's `sub $stackalloc, %rsp` requires.

use ecc_ast::types::Type;

use crate::air::VReg;
use crate::symtab::{SymbolId, SymbolTable};

use super::operand;

/// Size of the variadic register-save area: six 8-byte integer-argument
/// slots plus eight 16-byte SSE-argument slots (spec 4.6, spec 6
/// "Synthesized symbol names" neighbourhood).
pub const REGISTER_SAVE_AREA: u64 = 176;

pub struct Frame {
    cursor: u64,
    pub uses_varargs: bool,
    callee_saved_used: Vec<&'static str>,
}

impl Frame {
    pub fn new(uses_varargs: bool) -> Self {
        Frame {
            cursor: if uses_varargs { REGISTER_SAVE_AREA } else { 0 },
            uses_varargs,
            callee_saved_used: Vec::new(),
        }
    }

    /// Returns the symbol's `%rbp`-relative offset, assigning one (downward,
    /// aligned to the object's own alignment) the first time it's asked for.
    pub fn offset_of(&mut self, symbols: &mut SymbolTable, sym: SymbolId, ty: &Type) -> i64 {
        if let Some(offset) = symbols.get(sym).stack_offset {
            return offset;
        }
        let size = ty.size_bytes().unwrap_or(8).max(1);
        let align = ty.align_bytes().unwrap_or(1).max(1);
        self.cursor = round_up(self.cursor, align);
        self.cursor += size;
        let offset = -(self.cursor as i64);
        symbols.get_mut(sym).stack_offset = Some(offset);
        offset
    }

    pub fn note_register_write(&mut self, reg: VReg) {
        if operand::is_callee_saved(reg) {
            let name = operand::gp_name(reg, 8);
            if !self.callee_saved_used.contains(&name) {
                self.callee_saved_used.push(name);
            }
        }
    }

    pub fn callee_saved_used(&self) -> &[&'static str] {
        &self.callee_saved_used
    }

    /// `sub`/`add` immediate for the prologue/epilogue: the running cursor
    /// rounded up to a 16-byte boundary (spec 8 "the stack-subtract
    /// immediate is always a multiple of 16").
    pub fn stackalloc(&self) -> u64 {
        round_up(self.cursor, 16)
    }
}

fn round_up(value: u64, align: u64) -> u64 {
    if align <= 1 {
        value
    } else {
        (value + align - 1) / align * align
    }
}
