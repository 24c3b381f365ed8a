//! SSE↔integer conversion sequences and SSE comparison/NOT sequences
//! (spec 4.6 "Conversion sequences", marked design-critical there).
//!
//! Every function here takes the already-rendered text of its operands —
//! register or memory — and a [`super::Emitter`] to push instruction lines
//! and generated labels into; none of it reaches back into `air` types, so
//! the sequences stay testable independent of operand rendering.

use crate::air::RelOp;

use super::Emitter;

fn sse_mnemonic(base: &str, is_double: bool) -> String {
    format!("{}{}", base, if is_double { "sd" } else { "ss" })
}

/// `cvttss2si` / `cvttsd2si`: truncating SSE → signed integer.
pub fn sse_to_signed(e: &mut Emitter, src: &str, is_double: bool, dst: &str) {
    e.writer.instr(format!("{} {}, {}", sse_mnemonic("cvtt", is_double), src, dst));
}

/// `cvtsi2ss` / `cvtsi2sd`: signed integer → SSE. `src` must already be at
/// least dword width (callers widen narrower sources first).
pub fn signed_to_sse(e: &mut Emitter, src: &str, is_double: bool, dst: &str) {
    e.writer.instr(format!("{} {}, {}", sse_mnemonic("cvtsi2", is_double), src, dst));
}

/// SSE → unsigned 64-bit: compare against 2^63, convert directly below it,
/// otherwise subtract, convert, then correct by doubling and rotating
/// (spec 4.6).
pub fn sse_to_unsigned64(e: &mut Emitter, src: &str, is_double: bool, dst64: &str) {
    let limit = e.ensure_i64_limit(is_double);
    let cmp = sse_mnemonic("ucomis", is_double);
    let below = e.fresh_label();
    let done = e.fresh_label();

    e.writer.instr(format!("{} {}(%rip), {}", cmp, limit, src));
    e.writer.instr(format!("jb {}", below));

    // src >= 2^63: subtract the limit, convert (now in signed range),
    // then reconstruct the unsigned value: double it, set the low bit
    // back, rotate right by one.
    let scratch = sse_scratch(is_double);
    e.writer.instr(format!("{} {}(%rip), {}", sse_mnemonic("movs", is_double), limit, scratch));
    e.writer.instr(format!("{} {}, {}", sse_mnemonic("subs", is_double), scratch, src));
    e.writer.instr(format!("{} {}, {}", sse_mnemonic("cvtt", is_double), src, dst64));
    e.writer.instr(format!("shlq $1, {}", dst64));
    e.writer.instr(format!("orq $1, {}", dst64));
    e.writer.instr(format!("rorq $1, {}", dst64));
    e.writer.instr(format!("jmp {}", done));

    e.writer.label(crate::asmwriter::Section::Text, &below);
    e.writer.instr(format!("{} {}, {}", sse_mnemonic("cvtt", is_double), src, dst64));

    e.writer.label(crate::asmwriter::Section::Text, &done);
}

fn sse_scratch(is_double: bool) -> &'static str {
    if is_double {
        "%xmm15"
    } else {
        "%xmm14"
    }
}

/// Unsigned 64-bit → SSE: direct conversion when the sign bit is clear,
/// otherwise halve (to clear it), convert, then double the result by
/// adding the converted value to itself (spec 4.6).
pub fn unsigned64_to_sse(e: &mut Emitter, src64: &str, is_double: bool, dst: &str) {
    let negative = e.fresh_label();
    let done = e.fresh_label();

    e.writer.instr(format!("testq {}, {}", src64, src64));
    e.writer.instr(format!("js {}", negative));
    signed_to_sse(e, src64, is_double, dst);
    e.writer.instr(format!("jmp {}", done));

    e.writer.label(crate::asmwriter::Section::Text, &negative);
    e.writer.instr(format!("movq {}, %rax", src64));
    e.writer.instr("shrq $1, %rax".to_string());
    e.writer.instr("movq %rax, %r11".to_string());
    e.writer.instr("andq $1, %r11".to_string());
    e.writer.instr("orq %r11, %rax".to_string());
    signed_to_sse(e, "%rax", is_double, dst);
    e.writer.instr(format!("{} {}, {}", sse_mnemonic("adds", is_double), dst, dst));

    e.writer.label(crate::asmwriter::Section::Text, &done);
}

/// SSE equality/inequality: `ucomis?` sets the parity flag on an unordered
/// (NaN) result, so a plain `sete`/`setne` would be wrong for NaN operands.
/// `negate = false` computes `==`, `true` computes `!=`.
pub fn sse_equality(e: &mut Emitter, lhs: &str, rhs: &str, is_double: bool, negate: bool, dst: &str) {
    let unordered = e.fresh_label();
    let done = e.fresh_label();

    e.writer.instr(format!("{} {}, {}", sse_mnemonic("ucomis", is_double), rhs, lhs));
    e.writer.instr(format!("jp {}", unordered));
    e.writer.instr(format!("{} {}", if negate { "setne" } else { "sete" }, dst));
    e.writer.instr(format!("jmp {}", done));

    e.writer.label(crate::asmwriter::Section::Text, &unordered);
    e.writer.instr(format!("movb ${}, {}", if negate { 1 } else { 0 }, dst));

    e.writer.label(crate::asmwriter::Section::Text, &done);
}

/// SSE relational comparison: `comis?`, with the operand order swapped for
/// `<` and `<=` (x86 only has "above"/"above-or-equal" conditions), then
/// `seta`/`setae` — both false on an unordered result, matching IEEE 754
/// comparison semantics for NaN operands.
pub fn sse_relational(e: &mut Emitter, op: RelOp, lhs: &str, rhs: &str, is_double: bool, dst: &str) {
    let cmp = sse_mnemonic("comis", is_double);
    let (first, second, setcc) = match op {
        RelOp::Less => (rhs, lhs, "seta"),
        RelOp::LessEqual => (rhs, lhs, "setae"),
        RelOp::Greater => (lhs, rhs, "seta"),
        RelOp::GreaterEqual => (lhs, rhs, "setae"),
        RelOp::Equal | RelOp::NotEqual => {
            sse_equality(e, lhs, rhs, matches!(op, RelOp::NotEqual), is_double, dst);
            return;
        }
    };
    e.writer.instr(format!("{} {}, {}", cmp, second, first));
    e.writer.instr(format!("{} {}", setcc, dst));
}

/// `!x` on an SSE operand: `ptest` against a mask that isolates the sign
/// bit, then `sete` — the mask is zero everywhere `x`'s magnitude bits
/// are, so the flag is set only when `x` is `+0.0`/`-0.0` (spec 4.6 "NOT
/// of SSE").
pub fn sse_not(e: &mut Emitter, src: &str, is_double: bool, dst: &str) {
    let mask = e.ensure_zero_checker(is_double);
    e.writer.instr(format!("ptest {}(%rip), {}", mask, src));
    e.writer.instr(format!("sete {}", dst));
}
