//! x86-64 emitter (spec 4.6): lowers an [`crate::air::Program`] to GAS
//! AT&T-syntax assembly text via [`crate::asmwriter::AsmWriter`].
//!
//! The emitter treats its air input as preconditioned (spec 7): a missing
//! or mistyped operand is an assertion-class internal error, reported
//! through [`log::error!`] with the instruction skipped, never a `panic!`
//! or a `Result` the caller has to thread through every call site — the
//! same "the affected subtree... to suppress cascades" shape the analyzer
//! uses for user-facing constraint violations, just logged instead of
//! collected, since there is no per-instruction source location to attach
//! a diagnostic to.

mod convert;
mod frame;
mod operand;

use ecc_ast::types::Type;

use crate::air::{ArithOp, Instruction, Opcode, Operand, Program, RelOp, Routine, VReg};
use crate::asmwriter::{AsmWriter, Section};
use crate::symtab::{Linkage, StorageDuration, SymbolId, SymbolTable};

use frame::Frame;

/// Label text for a symbol (spec 4.6 "Symbol / indirect symbol", spec 6
/// "Static symbols at block scope with possibly-colliding names get
/// disambiguated labels"). Every name this crate synthesizes itself
/// (`__cl<n>`, `__sl<n>`, `__fc<n>`, the SSE helper constants) is already
/// unique, so only ordinary block-scope `static` objects — which share the
/// declaration's own source name across possibly many call frames — need
/// the symbol id appended to stay collision-free.
fn label_for_symbol(symbols: &SymbolTable, sym: SymbolId) -> String {
    let s = symbols.get(sym);
    if s.storage_duration == StorageDuration::Static && s.linkage == Linkage::None && !s.name.starts_with("__") {
        format!("{}.{}", s.name, sym)
    } else {
        s.name.clone()
    }
}

/// Lowers a full air program to one assembly text (spec 4.7 section
/// ordering: `.data`, `.rodata`, `.text`).
pub fn emit_program(program: &Program, symbols: &mut SymbolTable) -> String {
    let mut e = Emitter::new();
    for item in &program.data {
        e.emit_data_item(symbols, item.symbol, Section::Data);
    }
    for item in &program.rodata {
        e.emit_data_item(symbols, item.symbol, Section::Rodata);
    }
    for routine in &program.routines {
        e.emit_routine(symbols, routine);
    }
    e.writer.finish()
}

struct RenderedOperand {
    text: String,
    is_sse: bool,
    size: u64,
    ty: Type,
}

struct Emitter {
    writer: AsmWriter,
    gen_label_counter: u32,
    routine_counter: u32,
    sse32_zero_checker: bool,
    sse64_zero_checker: bool,
    sse32_i64_limit: bool,
    sse64_i64_limit: bool,
    float_const_counter: u32,
}

impl Emitter {
    fn new() -> Self {
        Emitter {
            writer: AsmWriter::new(),
            gen_label_counter: 0,
            routine_counter: 0,
            sse32_zero_checker: false,
            sse64_zero_checker: false,
            sse32_i64_limit: false,
            sse64_i64_limit: false,
            float_const_counter: 0,
        }
    }

    /// A compiler-generated branch target with no air counterpart (spec 6
    /// "Local labels `.LGEN<n>` (generated)").
    fn fresh_label(&mut self) -> String {
        self.gen_label_counter += 1;
        format!(".LGEN{}", self.gen_label_counter)
    }

    fn float_constant(&mut self, value: f64, is_double: bool) -> String {
        self.float_const_counter += 1;
        let label = format!("__fc{}", self.float_const_counter);
        let bytes = if is_double { value.to_le_bytes().to_vec() } else { (value as f32).to_le_bytes().to_vec() };
        self.writer.data_item(Section::Rodata, &label, false, if is_double { 8 } else { 4 }, &bytes, &[], |_| String::new());
        label
    }

    fn ensure_zero_checker(&mut self, is_double: bool) -> String {
        let label = if is_double { "__sse64_zero_checker" } else { "__sse32_zero_checker" };
        let already_emitted = if is_double { self.sse64_zero_checker } else { self.sse32_zero_checker };
        if !already_emitted {
            let mask = if is_double {
                mask16(0x7FFF_FFFF_FFFF_FFFFu64.to_le_bytes().to_vec())
            } else {
                mask16(0x7FFF_FFFFu32.to_le_bytes().to_vec())
            };
            self.writer.data_item(Section::Rodata, label, false, 16, &mask, &[], |_| String::new());
            if is_double {
                self.sse64_zero_checker = true;
            } else {
                self.sse32_zero_checker = true;
            }
        }
        label.to_string()
    }

    fn ensure_i64_limit(&mut self, is_double: bool) -> String {
        let label = if is_double { "__sse64_i64_limit" } else { "__sse32_i64_limit" };
        let already_emitted = if is_double { self.sse64_i64_limit } else { self.sse32_i64_limit };
        if !already_emitted {
            let limit = 2f64.powi(63);
            let bytes = if is_double { limit.to_le_bytes().to_vec() } else { (limit as f32).to_le_bytes().to_vec() };
            self.writer.data_item(Section::Rodata, label, false, if is_double { 8 } else { 4 }, &bytes, &[], |_| String::new());
            if is_double {
                self.sse64_i64_limit = true;
            } else {
                self.sse32_i64_limit = true;
            }
        }
        label.to_string()
    }

    fn emit_data_item(&mut self, symbols: &SymbolTable, sym: SymbolId, section: Section) {
        let symbol = symbols.get(sym);
        let label = label_for_symbol(symbols, sym);
        let align = symbol.ty.align_bytes().unwrap_or(1);
        let size = symbol.ty.size_bytes().unwrap_or(0) as usize;
        let bytes = symbol.init_data.clone().unwrap_or_else(|| vec![0u8; size]);
        let externally_linked = symbol.linkage == Linkage::External;
        let relocations = symbol.relocations.clone();
        self.writer
            .data_item(section, &label, externally_linked, align, &bytes, &relocations, |target| label_for_symbol(symbols, target));
    }

    fn emit_routine(&mut self, symbols: &mut SymbolTable, routine: &Routine) {
        let id = self.routine_counter;
        self.routine_counter += 1;

        let label = label_for_symbol(symbols, routine.symbol);
        if symbols.get(routine.symbol).linkage == Linkage::External {
            self.writer.globl(&label);
        }
        self.writer.label(Section::Text, &label);

        let mut frame = Frame::new(routine.uses_varargs);
        self.scan_frame(symbols, routine, &mut frame);

        let epilogue_label = format!(".LR{}", id);
        let mut returns_seen = false;

        self.emit_prologue(&frame, routine.uses_varargs);
        for insn in &routine.insns {
            if insn.opcode == Opcode::Return {
                returns_seen = true;
            }
            self.emit_instruction(symbols, &mut frame, insn, &epilogue_label);
        }
        if returns_seen {
            self.writer.label(Section::Text, &epilogue_label);
        }
        self.emit_epilogue(&frame);
    }

    /// First pass over a routine's instructions: every automatic-duration
    /// symbol reference gets (or reuses) a stack slot, and every
    /// callee-saved register that appears anywhere is conservatively
    /// counted as written — there is no separate def/use operand role in
    /// `air`, so this errs toward saving a register it didn't strictly
    /// need to rather than skipping one it did (spec 4.6 "Pruning pass").
    fn scan_frame(&mut self, symbols: &mut SymbolTable, routine: &Routine, frame: &mut Frame) {
        for insn in &routine.insns {
            for operand in &insn.operands {
                match operand {
                    Operand::Symbol(sym, ty) | Operand::IndirectSymbol(sym, _, ty) => {
                        if symbols.get(*sym).storage_duration == StorageDuration::Automatic {
                            frame.offset_of(symbols, *sym, ty);
                        }
                    }
                    Operand::Register(reg, _) => frame.note_register_write(*reg),
                    Operand::IndirectRegister { base, index, .. } => {
                        frame.note_register_write(*base);
                        if let Some((idx, _)) = index {
                            frame.note_register_write(*idx);
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    fn emit_prologue(&mut self, frame: &Frame, uses_varargs: bool) {
        self.writer.instr("push %rbp");
        self.writer.instr("movq %rsp, %rbp");
        let stackalloc = frame.stackalloc();
        if stackalloc > 0 {
            self.writer.instr(format!("subq ${}, %rsp", stackalloc));
        }
        for reg in frame.callee_saved_used() {
            self.writer.instr(format!("push %{}", reg));
        }
        if uses_varargs {
            for (i, reg) in operand::INT_ARG_REGISTERS.iter().enumerate() {
                let offset = -(frame::REGISTER_SAVE_AREA as i64) + (i as i64) * 8;
                self.writer.instr(format!("movq %{}, {}(%rbp)", reg, offset));
            }
            for i in 0..8i64 {
                let offset = -(frame::REGISTER_SAVE_AREA as i64) + 48 + i * 16;
                self.writer.instr(format!("movaps %xmm{}, {}(%rbp)", i, offset));
            }
        }
    }

    fn emit_epilogue(&mut self, frame: &Frame) {
        for reg in frame.callee_saved_used().iter().rev() {
            self.writer.instr(format!("pop %{}", reg));
        }
        self.writer.instr("leave");
        self.writer.instr("ret");
    }

    fn render(&mut self, symbols: &mut SymbolTable, frame: &mut Frame, op: &Operand) -> RenderedOperand {
        match op {
            Operand::Register(reg, ty) => {
                let r = operand::register_operand(*reg, ty);
                RenderedOperand { text: r.text, is_sse: r.is_sse, size: ty.size_bytes().unwrap_or(8), ty: ty.clone() }
            }
            Operand::IndirectRegister { base, index, disp, ty } => RenderedOperand {
                text: operand::indirect_register_operand(*base, *index, *disp),
                is_sse: ty.is_sse_float(),
                size: ty.size_bytes().unwrap_or(8),
                ty: ty.clone(),
            },
            Operand::Integer(value, ty) => {
                RenderedOperand { text: format!("${}", value), is_sse: false, size: ty.size_bytes().unwrap_or(8), ty: ty.clone() }
            }
            Operand::Float(value, ty) => {
                let label = self.float_constant(*value, ty.is_sse_float() && matches!(ty.size_bytes(), Some(8)));
                RenderedOperand {
                    text: format!("{}(%rip)", label),
                    is_sse: true,
                    size: ty.size_bytes().unwrap_or(8),
                    ty: ty.clone(),
                }
            }
            Operand::Symbol(sym, ty) => {
                let text = if symbols.get(*sym).storage_duration == StorageDuration::Automatic {
                    format!("{}(%rbp)", frame.offset_of(symbols, *sym, ty))
                } else {
                    format!("{}(%rip)", label_for_symbol(symbols, *sym))
                };
                RenderedOperand { text, is_sse: ty.is_sse_float(), size: ty.size_bytes().unwrap_or(8), ty: ty.clone() }
            }
            Operand::IndirectSymbol(sym, disp, ty) => {
                let text = if symbols.get(*sym).storage_duration == StorageDuration::Automatic {
                    format!("{}(%rbp)", frame.offset_of(symbols, *sym, ty) + disp)
                } else if *disp == 0 {
                    format!("{}(%rip)", label_for_symbol(symbols, *sym))
                } else {
                    format!("{}+{}(%rip)", label_for_symbol(symbols, *sym), disp)
                };
                RenderedOperand { text, is_sse: ty.is_sse_float(), size: ty.size_bytes().unwrap_or(8), ty: ty.clone() }
            }
            Operand::Label(id) => RenderedOperand { text: format!(".LA{}", id.0), is_sse: false, size: 8, ty: Type::void() },
        }
    }

    fn emit_instruction(&mut self, symbols: &mut SymbolTable, frame: &mut Frame, insn: &Instruction, epilogue_label: &str) {
        match insn.opcode {
            Opcode::DiscardPhi | Opcode::DiscardSequencePoint | Opcode::DiscardVa => {}
            Opcode::Nop => self.writer.instr("nop"),
            Opcode::Label => {
                if let Some(Operand::Label(id)) = insn.operand(0) {
                    self.writer.label(Section::Text, &format!(".LA{}", id.0));
                } else {
                    log::error!("{}", crate::error::EmitError::MissingOperand("label"));
                }
            }
            Opcode::Jump => {
                if let Some(Operand::Label(id)) = insn.operand(0) {
                    self.writer.instr(format!("jmp .LA{}", id.0));
                } else {
                    log::error!("{}", crate::error::EmitError::MissingOperand("jump"));
                }
            }
            Opcode::JumpIfZero | Opcode::JumpIfNonZero => {
                let (cond, target) = match (insn.operand(0), insn.operand(1)) {
                    (Some(c), Some(Operand::Label(id))) => (c.clone(), *id),
                    _ => {
                        log::error!("{}", crate::error::EmitError::MissingOperand("conditional jump"));
                        return;
                    }
                };
                let cond = self.render(symbols, frame, &cond);
                self.writer.instr(format!("cmp{} $0, {}", operand::mnemonic_suffix(cond.size), cond.text));
                let mnemonic = if insn.opcode == Opcode::JumpIfZero { "je" } else { "jne" };
                self.writer.instr(format!("{} .LA{}", mnemonic, target.0));
            }
            Opcode::Declare => {
                if let Some(op) = insn.operand(0) {
                    self.render(symbols, frame, op);
                } else {
                    log::error!("{}", crate::error::EmitError::MissingOperand("declare"));
                }
            }
            Opcode::Load => self.emit_load(symbols, frame, insn),
            Opcode::StoreAssign => self.emit_store(symbols, frame, insn),
            Opcode::LoadAddress => self.emit_load_address(symbols, frame, insn),
            Opcode::Arithmetic(op) => self.emit_arithmetic(symbols, frame, insn, op, false),
            Opcode::DirectArithmetic(op) => self.emit_arithmetic(symbols, frame, insn, op, true),
            Opcode::Multiply => self.emit_multiply(symbols, frame, insn),
            Opcode::Divide => self.emit_divide(symbols, frame, insn),
            Opcode::ShiftLeft => self.emit_shift(symbols, frame, insn, true),
            Opcode::ShiftRight => self.emit_shift(symbols, frame, insn, false),
            Opcode::Relational(op) => self.emit_relational(symbols, frame, insn, op),
            Opcode::SignExtend => self.emit_extend(symbols, frame, insn, true),
            Opcode::ZeroExtend => self.emit_extend(symbols, frame, insn, false),
            Opcode::ConvertIntToFloat => self.emit_int_to_float(symbols, frame, insn),
            Opcode::ConvertFloatToInt => self.emit_float_to_int(symbols, frame, insn),
            Opcode::Memset => self.emit_memset(symbols, frame, insn),
            Opcode::Syscall => self.emit_syscall(symbols, frame, insn),
            Opcode::Push => {
                if let Some(op) = insn.operand(0).cloned() {
                    let v = self.render(symbols, frame, &op);
                    self.writer.instr(format!("push {}", v.text));
                }
            }
            Opcode::Call => self.emit_call(symbols, frame, insn),
            Opcode::Return => self.emit_return(symbols, frame, insn, epilogue_label),
        }
    }

    fn mov_mnemonic(sse: bool, size: u64, is_double: bool) -> String {
        if sse {
            if is_double {
                "movsd".to_string()
            } else {
                "movss".to_string()
            }
        } else {
            format!("mov{}", operand::mnemonic_suffix(size))
        }
    }

    fn emit_load(&mut self, symbols: &mut SymbolTable, frame: &mut Frame, insn: &Instruction) {
        let (dst, src) = match (insn.operand(0).cloned(), insn.operand(1).cloned()) {
            (Some(d), Some(s)) => (d, s),
            _ => {
                log::error!("{}", crate::error::EmitError::MissingOperand("load"));
                return;
            }
        };
        let src = self.render(symbols, frame, &src);
        let dst = self.render(symbols, frame, &dst);
        let mnemonic = Self::mov_mnemonic(dst.is_sse, dst.size, dst.size == 8);
        self.writer.instr(format!("{} {}, {}", mnemonic, src.text, dst.text));
    }

    fn emit_store(&mut self, symbols: &mut SymbolTable, frame: &mut Frame, insn: &Instruction) {
        let (dst, src) = match (insn.operand(0).cloned(), insn.operand(1).cloned()) {
            (Some(d), Some(s)) => (d, s),
            _ => {
                log::error!("{}", crate::error::EmitError::MissingOperand("store"));
                return;
            }
        };
        let src = self.render(symbols, frame, &src);
        let dst = self.render(symbols, frame, &dst);
        let mnemonic = Self::mov_mnemonic(src.is_sse, src.size, src.size == 8);
        self.writer.instr(format!("{} {}, {}", mnemonic, src.text, dst.text));
    }

    fn emit_load_address(&mut self, symbols: &mut SymbolTable, frame: &mut Frame, insn: &Instruction) {
        let (dst, src) = match (insn.operand(0).cloned(), insn.operand(1).cloned()) {
            (Some(d), Some(s)) => (d, s),
            _ => {
                log::error!("{}", crate::error::EmitError::MissingOperand("load address"));
                return;
            }
        };
        let src = self.render(symbols, frame, &src);
        let dst = self.render(symbols, frame, &dst);
        self.writer.instr(format!("leaq {}, {}", src.text, dst.text));
    }

    fn emit_arithmetic(&mut self, symbols: &mut SymbolTable, frame: &mut Frame, insn: &Instruction, op: ArithOp, direct: bool) {
        let operands: Vec<Operand> = insn.operands.clone();
        let (dst, lhs, rhs) = if direct {
            match (operands.get(0), operands.get(1)) {
                (Some(d), Some(r)) => (d.clone(), d.clone(), r.clone()),
                _ => {
                    log::error!("{}", crate::error::EmitError::MissingOperand("direct arithmetic"));
                    return;
                }
            }
        } else {
            match (operands.get(0), operands.get(1), operands.get(2)) {
                (Some(d), Some(l), Some(r)) => (d.clone(), l.clone(), r.clone()),
                _ => {
                    log::error!("{}", crate::error::EmitError::MissingOperand("arithmetic"));
                    return;
                }
            }
        };
        let dst = self.render(symbols, frame, &dst);
        let lhs = self.render(symbols, frame, &lhs);
        let rhs = self.render(symbols, frame, &rhs);

        if dst.is_sse {
            let base = match op {
                ArithOp::Add => "add",
                ArithOp::Sub => "sub",
                _ => {
                    log::error!("{}", crate::error::EmitError::OperandKindMismatch("bitwise arithmetic on an SSE destination"));
                    return;
                }
            };
            if dst.text != lhs.text {
                self.writer.instr(format!("{} {}, {}", Self::mov_mnemonic(true, 8, dst.size == 8), lhs.text, dst.text));
            }
            self.writer.instr(format!("{}{} {}, {}", base, if dst.size == 8 { "sd" } else { "ss" }, rhs.text, dst.text));
            return;
        }

        if !direct && dst.text != lhs.text {
            self.writer.instr(format!("{} {}, {}", Self::mov_mnemonic(false, dst.size, false), lhs.text, dst.text));
        }
        let mnemonic = match op {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::And => "and",
            ArithOp::Or => "or",
            ArithOp::Xor => "xor",
        };
        self.writer.instr(format!("{}{} {}, {}", mnemonic, operand::mnemonic_suffix(dst.size), rhs.text, dst.text));
    }

    fn emit_multiply(&mut self, symbols: &mut SymbolTable, frame: &mut Frame, insn: &Instruction) {
        let (dst, lhs, rhs) = match (insn.operand(0).cloned(), insn.operand(1).cloned(), insn.operand(2).cloned()) {
            (Some(d), Some(l), Some(r)) => (d, l, r),
            _ => {
                log::error!("{}", crate::error::EmitError::MissingOperand("multiply"));
                return;
            }
        };
        let dst = self.render(symbols, frame, &dst);
        let lhs = self.render(symbols, frame, &lhs);
        let rhs = self.render(symbols, frame, &rhs);

        if dst.is_sse {
            if dst.text != lhs.text {
                self.writer.instr(format!("{} {}, {}", Self::mov_mnemonic(true, 8, dst.size == 8), lhs.text, dst.text));
            }
            self.writer.instr(format!("mul{} {}, {}", if dst.size == 8 { "sd" } else { "ss" }, rhs.text, dst.text));
            return;
        }

        if is_unsigned(&dst.ty) {
            let acc = operand::gp_name(VReg(0), dst.size);
            self.writer.instr(format!("{} {}, %{}", Self::mov_mnemonic(false, dst.size, false), lhs.text, acc));
            self.writer.instr(format!("mul{} {}", operand::mnemonic_suffix(dst.size), rhs.text));
            self.writer.instr(format!("{} %{}, {}", Self::mov_mnemonic(false, dst.size, false), acc, dst.text));
        } else {
            if dst.text != lhs.text {
                self.writer.instr(format!("{} {}, {}", Self::mov_mnemonic(false, dst.size, false), lhs.text, dst.text));
            }
            self.writer.instr(format!("imul{} {}, {}", operand::mnemonic_suffix(dst.size), rhs.text, dst.text));
        }
    }

    fn emit_divide(&mut self, symbols: &mut SymbolTable, frame: &mut Frame, insn: &Instruction) {
        let (dst, lhs, rhs) = match (insn.operand(0).cloned(), insn.operand(1).cloned(), insn.operand(2).cloned()) {
            (Some(d), Some(l), Some(r)) => (d, l, r),
            _ => {
                log::error!("{}", crate::error::EmitError::MissingOperand("divide"));
                return;
            }
        };
        let dst = self.render(symbols, frame, &dst);
        let lhs = self.render(symbols, frame, &lhs);
        let rhs = self.render(symbols, frame, &rhs);

        if dst.is_sse {
            if dst.text != lhs.text {
                self.writer.instr(format!("{} {}, {}", Self::mov_mnemonic(true, 8, dst.size == 8), lhs.text, dst.text));
            }
            self.writer.instr(format!("div{} {}, {}", if dst.size == 8 { "sd" } else { "ss" }, rhs.text, dst.text));
            return;
        }

        let ax = operand::gp_name(VReg(0), dst.size);
        let dx = operand::gp_name(VReg(3), dst.size);
        self.writer.instr(format!("{} {}, %{}", Self::mov_mnemonic(false, dst.size, false), lhs.text, ax));
        if is_unsigned(&dst.ty) {
            self.writer.instr(format!("xor{} %{}, %{}", operand::mnemonic_suffix(dst.size), dx, dx));
            self.writer.instr(format!("div{} {}", operand::mnemonic_suffix(dst.size), rhs.text));
        } else {
            match dst.size {
                8 => self.writer.instr("cqto"),
                4 => self.writer.instr("cltd"),
                _ => self.writer.instr("cwd"),
            };
            self.writer.instr(format!("idiv{} {}", operand::mnemonic_suffix(dst.size), rhs.text));
        }
        self.writer.instr(format!("{} %{}, {}", Self::mov_mnemonic(false, dst.size, false), ax, dst.text));
    }

    fn emit_shift(&mut self, symbols: &mut SymbolTable, frame: &mut Frame, insn: &Instruction, left: bool) {
        let (dst, lhs, amount) = match (insn.operand(0).cloned(), insn.operand(1).cloned(), insn.operand(2).cloned()) {
            (Some(d), Some(l), Some(a)) => (d, l, a),
            _ => {
                log::error!("{}", crate::error::EmitError::MissingOperand("shift"));
                return;
            }
        };
        let dst = self.render(symbols, frame, &dst);
        let lhs = self.render(symbols, frame, &lhs);
        let amount = self.render(symbols, frame, &amount);
        if dst.text != lhs.text {
            self.writer.instr(format!("{} {}, {}", Self::mov_mnemonic(false, dst.size, false), lhs.text, dst.text));
        }
        let count = if amount.text.starts_with('$') {
            amount.text.clone()
        } else {
            self.writer.instr(format!("movb {}, %cl", amount.text));
            "%cl".to_string()
        };
        let mnemonic = if left { "shl" } else if is_unsigned(&dst.ty) { "shr" } else { "sar" };
        self.writer.instr(format!("{}{} {}, {}", mnemonic, operand::mnemonic_suffix(dst.size), count, dst.text));
    }

    fn emit_relational(&mut self, symbols: &mut SymbolTable, frame: &mut Frame, insn: &Instruction, op: RelOp) {
        let (dst, lhs, rhs) = match (insn.operand(0).cloned(), insn.operand(1).cloned(), insn.operand(2).cloned()) {
            (Some(d), Some(l), Some(r)) => (d, l, r),
            _ => {
                log::error!("{}", crate::error::EmitError::MissingOperand("relational"));
                return;
            }
        };
        let lhs_ty = lhs.ty_hint(symbols);
        let dst = self.render(symbols, frame, &dst);
        let lhs = self.render(symbols, frame, &lhs);
        let rhs = self.render(symbols, frame, &rhs);

        if lhs.is_sse {
            let is_double = lhs.size == 8;
            convert::sse_relational(self, op, &lhs.text, &rhs.text, is_double, &dst.text);
            return;
        }

        self.writer.instr(format!("cmp{} {}, {}", operand::mnemonic_suffix(lhs.size), rhs.text, lhs.text));
        let unsigned = is_unsigned(&lhs_ty);
        let setcc = match (op, unsigned) {
            (RelOp::Equal, _) => "sete",
            (RelOp::NotEqual, _) => "setne",
            (RelOp::Less, true) => "setb",
            (RelOp::Less, false) => "setl",
            (RelOp::LessEqual, true) => "setbe",
            (RelOp::LessEqual, false) => "setle",
            (RelOp::Greater, true) => "seta",
            (RelOp::Greater, false) => "setg",
            (RelOp::GreaterEqual, true) => "setae",
            (RelOp::GreaterEqual, false) => "setge",
        };
        self.writer.instr(format!("{} {}", setcc, dst.text));
    }

    fn emit_extend(&mut self, symbols: &mut SymbolTable, frame: &mut Frame, insn: &Instruction, signed: bool) {
        let (dst, src) = match (insn.operand(0).cloned(), insn.operand(1).cloned()) {
            (Some(d), Some(s)) => (d, s),
            _ => {
                log::error!("{}", crate::error::EmitError::MissingOperand("extend"));
                return;
            }
        };
        let dst = self.render(symbols, frame, &dst);
        let src = self.render(symbols, frame, &src);
        let mnemonic = format!(
            "mov{}{}{}",
            if signed { "s" } else { "z" },
            operand::mnemonic_suffix(src.size),
            operand::mnemonic_suffix(dst.size)
        );
        self.writer.instr(format!("{} {}, {}", mnemonic, src.text, dst.text));
    }

    fn emit_int_to_float(&mut self, symbols: &mut SymbolTable, frame: &mut Frame, insn: &Instruction) {
        let (dst, src) = match (insn.operand(0).cloned(), insn.operand(1).cloned()) {
            (Some(d), Some(s)) => (d, s),
            _ => {
                log::error!("{}", crate::error::EmitError::MissingOperand("int-to-float"));
                return;
            }
        };
        let src_ty = src.ty_hint(symbols);
        let dst = self.render(symbols, frame, &dst);
        let src = self.render(symbols, frame, &src);
        let is_double = dst.size == 8;
        if is_unsigned(&src_ty) && src.size == 8 {
            convert::unsigned64_to_sse(self, &src.text, is_double, &dst.text);
        } else {
            convert::signed_to_sse(self, &src.text, is_double, &dst.text);
        }
    }

    fn emit_float_to_int(&mut self, symbols: &mut SymbolTable, frame: &mut Frame, insn: &Instruction) {
        let (dst, src) = match (insn.operand(0).cloned(), insn.operand(1).cloned()) {
            (Some(d), Some(s)) => (d, s),
            _ => {
                log::error!("{}", crate::error::EmitError::MissingOperand("float-to-int"));
                return;
            }
        };
        let dst = self.render(symbols, frame, &dst);
        let src = self.render(symbols, frame, &src);
        let is_double = src.size == 8;
        if is_unsigned(&dst.ty) && dst.size == 8 {
            convert::sse_to_unsigned64(self, &src.text, is_double, &dst.text);
        } else {
            convert::sse_to_signed(self, &src.text, is_double, &dst.text);
        }
    }

    fn emit_memset(&mut self, symbols: &mut SymbolTable, frame: &mut Frame, insn: &Instruction) {
        let (dst, value, len) = match (insn.operand(0).cloned(), insn.operand(1).cloned(), insn.operand(2).cloned()) {
            (Some(d), Some(v), Some(l)) => (d, v, l),
            _ => {
                log::error!("{}", crate::error::EmitError::MissingOperand("memset"));
                return;
            }
        };
        let dst = self.render(symbols, frame, &dst);
        let value = self.render(symbols, frame, &value);
        let len = self.render(symbols, frame, &len);
        self.writer.instr(format!("leaq {}, %rdi", dst.text));
        self.writer.instr(format!("movb {}, %al", value.text));
        self.writer.instr(format!("movq {}, %rcx", len.text));
        self.writer.instr("rep stosb");
    }

    /// `operands[0]` is the syscall number, the rest are arguments placed
    /// in System V syscall-argument order (`rdi`, `rsi`, `rdx`); the
    /// `__ecc_lsys_*` intrinsics this lowers never need more than three.
    fn emit_syscall(&mut self, symbols: &mut SymbolTable, frame: &mut Frame, insn: &Instruction) {
        let mut operands = insn.operands.iter();
        let number = match operands.next() {
            Some(op) => self.render(symbols, frame, op),
            None => {
                log::error!("{}", crate::error::EmitError::MissingOperand("syscall"));
                return;
            }
        };
        self.writer.instr(format!("movq {}, %rax", number.text));
        for (reg, op) in operand::INT_ARG_REGISTERS.iter().zip(operands) {
            let rendered = self.render(symbols, frame, op);
            self.writer.instr(format!("movq {}, %{}", rendered.text, reg));
        }
        self.writer.instr("syscall");
    }

    fn emit_call(&mut self, symbols: &mut SymbolTable, frame: &mut Frame, insn: &Instruction) {
        let operands: Vec<Operand> = insn.operands.clone();
        let (dst, callee) = match operands.len() {
            1 => (None, operands[0].clone()),
            2 => (Some(operands[0].clone()), operands[1].clone()),
            _ => {
                log::error!("{}", crate::error::EmitError::OperandKindMismatch("call"));
                return;
            }
        };
        match &callee {
            Operand::Symbol(sym, _) => {
                let label = label_for_symbol(symbols, *sym);
                self.writer.instr(format!("call {}", label));
            }
            other => {
                let rendered = self.render(symbols, frame, other);
                self.writer.instr(format!("call *{}", rendered.text));
            }
        }
        if let Some(dst) = dst {
            let dst = self.render(symbols, frame, &dst);
            if dst.is_sse {
                self.writer.instr(format!("{} %xmm0, {}", Self::mov_mnemonic(true, 8, dst.size == 8), dst.text));
            } else if dst.text != "%rax" {
                self.writer.instr(format!("{} %rax, {}", Self::mov_mnemonic(false, dst.size, false), dst.text));
            }
        }
    }

    fn emit_return(&mut self, symbols: &mut SymbolTable, frame: &mut Frame, insn: &Instruction, epilogue_label: &str) {
        if let Some(op) = insn.operand(0).cloned() {
            let value = self.render(symbols, frame, &op);
            if value.is_sse {
                if value.text != "%xmm0" {
                    self.writer.instr(format!("{} {}, %xmm0", Self::mov_mnemonic(true, 8, value.size == 8), value.text));
                }
            } else if value.text != "%rax" {
                self.writer.instr(format!("{} {}, %rax", Self::mov_mnemonic(false, value.size, false), value.text));
            }
        }
        self.writer.instr(format!("jmp {}", epilogue_label));
    }
}

fn is_unsigned(ty: &Type) -> bool {
    use ecc_ast::types::{Signedness, TypeKind};
    matches!(
        ty.kind,
        TypeKind::Int(_, Signedness::Unsigned) | TypeKind::Char(Signedness::Unsigned) | TypeKind::Bool | TypeKind::Pointer(_)
    )
}

fn mask16(prefix: Vec<u8>) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[..prefix.len()].copy_from_slice(&prefix);
    out
}

/// Operand clone helper used where a render needs to look at an operand's
/// type before rendering consumes it (emitting one side can need the
/// un-rendered type of the other, e.g. relational signedness).
impl Operand {
    fn ty_hint(&self, _symbols: &SymbolTable) -> Type {
        self.ty().cloned().unwrap_or_else(Type::void)
    }
}
