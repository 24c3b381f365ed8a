//! Register naming and operand → AT&T-syntax-operand-string mapping
//! (spec 4.6 "Operand mapping").
//!
//! A [`crate::air::VReg`] is an index into one of two fixed physical banks:
//! fourteen general-purpose registers (every caller- and callee-saved
//! integer register except `rbp`/`rsp`, which the frame owns outright) or
//! sixteen `xmm` registers, chosen by whether the operand's type is
//! SSE-floating. This keeps the mapping a small static lookup table, the
//! way [`crate::analyzer::intrinsics`] dispatches intrinsics by name rather
//! than a chain of comparisons.

use ecc_ast::types::Type;

use crate::air::VReg;

/// Push order for the prologue; the epilogue pops in reverse (spec 4.6
/// "Epilogue pops callee-saved in reverse order").
pub const CALLEE_SAVED: [&str; 5] = ["rbx", "r12", "r13", "r14", "r15"];

const GP_8: [&str; 14] = [
    "rax", "rbx", "rcx", "rdx", "rsi", "rdi", "r8", "r9", "r10", "r11", "r12", "r13", "r14", "r15",
];
const GP_4: [&str; 14] = [
    "eax", "ebx", "ecx", "edx", "esi", "edi", "r8d", "r9d", "r10d", "r11d", "r12d", "r13d", "r14d", "r15d",
];
const GP_2: [&str; 14] = [
    "ax", "bx", "cx", "dx", "si", "di", "r8w", "r9w", "r10w", "r11w", "r12w", "r13w", "r14w", "r15w",
];
const GP_1: [&str; 14] = [
    "al", "bl", "cl", "dl", "sil", "dil", "r8b", "r9b", "r10b", "r11b", "r12b", "r13b", "r14b", "r15b",
];

/// Argument-passing order for the six integer/pointer argument registers
/// (System V AMD64 ABI), used to spill the variadic register-save area
/// (spec 4.6 "Frame layout").
pub const INT_ARG_REGISTERS: [&str; 6] = ["rdi", "rsi", "rdx", "rcx", "r8", "r9"];

fn bank_index(reg: VReg) -> usize {
    reg.0 as usize % GP_8.len()
}

/// Physical register name for `reg` at `size` bytes (1, 2, 4, or 8).
pub fn gp_name(reg: VReg, size: u64) -> &'static str {
    let i = bank_index(reg);
    match size {
        1 => GP_1[i],
        2 => GP_2[i],
        4 => GP_4[i],
        _ => GP_8[i],
    }
}

pub fn xmm_name(reg: VReg) -> String {
    format!("xmm{}", reg.0 as usize % 16)
}

/// `true` if `reg`, viewed through the GP bank, names one of the five
/// callee-saved registers the pruning pass tracks.
pub fn is_callee_saved(reg: VReg) -> bool {
    CALLEE_SAVED.contains(&GP_8[bank_index(reg)])
}

pub fn mnemonic_suffix(size: u64) -> &'static str {
    match size {
        1 => "b",
        2 => "w",
        4 => "l",
        _ => "q",
    }
}

/// An operand rendered to text, tagged with whether it names an `xmm`
/// register (so the caller can route it to an SSE mnemonic form).
pub struct Rendered {
    pub text: String,
    pub is_sse: bool,
}

/// Renders a register operand at its natural size for `ty`.
pub fn register_operand(reg: VReg, ty: &Type) -> Rendered {
    if ty.is_sse_float() {
        Rendered { text: format!("%{}", xmm_name(reg)), is_sse: true }
    } else {
        let size = ty.size_bytes().unwrap_or(8).max(1);
        Rendered { text: format!("%{}", gp_name(reg, size)), is_sse: false }
    }
}

/// `disp(base)` or `disp(base, index, scale)`, per spec 4.6.
pub fn indirect_register_operand(base: VReg, index: Option<(VReg, u8)>, disp: i64) -> String {
    let base_name = gp_name(base, 8);
    match index {
        Some((idx, scale)) if scale > 1 => {
            format!("{}(%{}, %{}, {})", disp, base_name, gp_name(idx, 8), scale)
        }
        Some((idx, _)) => format!("{}(%{}, %{})", disp, base_name, gp_name(idx, 8)),
        None => format!("{}(%{})", disp, base_name),
    }
}
