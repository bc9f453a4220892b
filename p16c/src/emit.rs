//! Instruction emission.
//!
//! The emitter owns the two output segments of an assembled program: the
//! body (top-level code, in source order) and the footer (subroutine bodies
//! and the halt trap). Everything that produces assembly, the compiler and
//! extension macros alike, writes through an `Emitter`.

use std::collections::HashMap;
use std::fmt;

/// Label of the terminal `SET PC, builtin_halt` loop.
pub const HALT_LABEL: &str = "builtin_halt";

/// One of the eight general purpose registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Register {
    A,
    B,
    C,
    X,
    Y,
    Z,
    I,
    J,
}

impl Register {
    pub const ALL: [Register; 8] = [
        Register::A,
        Register::B,
        Register::C,
        Register::X,
        Register::Y,
        Register::Z,
        Register::I,
        Register::J,
    ];

    /// Holds the caller's return address inside a subroutine.
    pub const RETURN: Register = Register::J;

    /// Registers that receive arguments, in parameter order.
    pub const ARGUMENTS: [Register; 7] = [
        Register::A,
        Register::B,
        Register::C,
        Register::X,
        Register::Y,
        Register::Z,
        Register::I,
    ];

    pub fn from_name(name: &str) -> Option<Register> {
        Register::ALL.into_iter().find(|reg| reg.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Register::A => "A",
            Register::B => "B",
            Register::C => "C",
            Register::X => "X",
            Register::Y => "Y",
            Register::Z => "Z",
            Register::I => "I",
            Register::J => "J",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Non-general-purpose operand keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Special {
    Pc,
    Sp,
    Ex,
    Push,
    Pop,
    Peek,
}

impl fmt::Display for Special {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Special::Pc => "PC",
            Special::Sp => "SP",
            Special::Ex => "EX",
            Special::Push => "PUSH",
            Special::Pop => "POP",
            Special::Peek => "PEEK",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Reg(Register),
    Special(Special),
    /// Immediate word, rendered as `0x%04x`.
    Lit(u16),
    Label(String),
    /// `[inner]`
    Mem(Box<Operand>),
    /// `[base+offset]`
    MemOffset(Box<Operand>, Box<Operand>),
}

impl Operand {
    pub fn label(text: impl Into<String>) -> Self {
        Operand::Label(text.into())
    }

    pub fn mem(inner: Operand) -> Self {
        Operand::Mem(Box::new(inner))
    }

    pub fn mem_offset(base: Operand, offset: Operand) -> Self {
        Operand::MemOffset(Box::new(base), Box::new(offset))
    }
}

impl From<Register> for Operand {
    fn from(reg: Register) -> Self {
        Operand::Reg(reg)
    }
}

impl From<Special> for Operand {
    fn from(special: Special) -> Self {
        Operand::Special(special)
    }
}

impl From<u16> for Operand {
    fn from(value: u16) -> Self {
        Operand::Lit(value)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(reg) => write!(f, "{reg}"),
            Operand::Special(special) => write!(f, "{special}"),
            Operand::Lit(value) => write!(f, "0x{value:04x}"),
            Operand::Label(label) => f.write_str(label),
            Operand::Mem(inner) => write!(f, "[{inner}]"),
            Operand::MemOffset(base, offset) => write!(f, "[{base}+{offset}]"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Set,
    Add,
    Sub,
    Mul,
    Mli,
    Div,
    Dvi,
    Mod,
    Mdi,
    And,
    Bor,
    Xor,
    Shr,
    Asr,
    Shl,
    Ifb,
    Ifc,
    Ife,
    Ifn,
    Ifg,
    Ifa,
    Ifl,
    Ifu,
    Adx,
    Sbx,
    Sti,
    Std,
    Jsr,
    Int,
    Iag,
    Ias,
    Rfi,
    Iaq,
    Hwn,
    Hwq,
    Hwi,
    Dat,
}

impl Opcode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Set => "SET",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Mli => "MLI",
            Opcode::Div => "DIV",
            Opcode::Dvi => "DVI",
            Opcode::Mod => "MOD",
            Opcode::Mdi => "MDI",
            Opcode::And => "AND",
            Opcode::Bor => "BOR",
            Opcode::Xor => "XOR",
            Opcode::Shr => "SHR",
            Opcode::Asr => "ASR",
            Opcode::Shl => "SHL",
            Opcode::Ifb => "IFB",
            Opcode::Ifc => "IFC",
            Opcode::Ife => "IFE",
            Opcode::Ifn => "IFN",
            Opcode::Ifg => "IFG",
            Opcode::Ifa => "IFA",
            Opcode::Ifl => "IFL",
            Opcode::Ifu => "IFU",
            Opcode::Adx => "ADX",
            Opcode::Sbx => "SBX",
            Opcode::Sti => "STI",
            Opcode::Std => "STD",
            Opcode::Jsr => "JSR",
            Opcode::Int => "INT",
            Opcode::Iag => "IAG",
            Opcode::Ias => "IAS",
            Opcode::Rfi => "RFI",
            Opcode::Iaq => "IAQ",
            Opcode::Hwn => "HWN",
            Opcode::Hwq => "HWQ",
            Opcode::Hwi => "HWI",
            Opcode::Dat => "DAT",
        }
    }

    /// Single-operand "special" instructions.
    pub fn is_special(self) -> bool {
        matches!(
            self,
            Opcode::Jsr
                | Opcode::Int
                | Opcode::Iag
                | Opcode::Ias
                | Opcode::Rfi
                | Opcode::Iaq
                | Opcode::Hwn
                | Opcode::Hwq
                | Opcode::Hwi
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub op: Opcode,
    pub operands: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Label(String),
    Instruction(Instruction),
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Line::Label(label) => write!(f, ":{label}"),
            Line::Instruction(inst) => {
                write!(f, "{}", inst.op)?;
                for (i, operand) in inst.operands.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{sep}{operand}")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Body,
    Footer,
}

#[derive(Debug)]
pub struct Emitter {
    body: Vec<Line>,
    footer: Vec<Line>,
    active: Segment,
    counters: HashMap<String, u32>,
    /// Footer blocks closed while an enclosing block was still open.
    deferred: Vec<Line>,
    open_blocks: usize,
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Emitter {
    /// A fresh program whose footer already holds the halt trap.
    pub fn new() -> Self {
        let mut emitter = Self {
            body: Vec::new(),
            footer: Vec::new(),
            active: Segment::Body,
            counters: HashMap::new(),
            deferred: Vec::new(),
            open_blocks: 0,
        };
        emitter.in_footer(|e| {
            e.goto(HALT_LABEL);
            e.write_label(HALT_LABEL);
            e.goto(HALT_LABEL);
        });
        emitter
    }

    pub fn binary(&mut self, op: Opcode, a: impl Into<Operand>, b: impl Into<Operand>) {
        debug_assert!(!op.is_special() && op != Opcode::Dat, "{op} takes one operand");
        self.push_line(Line::Instruction(Instruction {
            op,
            operands: vec![a.into(), b.into()],
        }));
    }

    pub fn special(&mut self, op: Opcode, a: impl Into<Operand>) {
        debug_assert!(op.is_special(), "{op} takes two operands");
        self.push_line(Line::Instruction(Instruction {
            op,
            operands: vec![a.into()],
        }));
    }

    /// `DAT` directive reserving literal words.
    pub fn data(&mut self, words: Vec<Operand>) {
        self.push_line(Line::Instruction(Instruction {
            op: Opcode::Dat,
            operands: words,
        }));
    }

    /// Writes `:label`. Callers pass text already mangled by
    /// `SymbolStore::expand_name`.
    pub fn write_label(&mut self, label: &str) {
        self.push_line(Line::Label(label.to_string()));
    }

    pub fn set(&mut self, a: impl Into<Operand>, b: impl Into<Operand>) {
        self.binary(Opcode::Set, a, b);
    }

    pub fn goto(&mut self, label: &str) {
        self.set(Special::Pc, Operand::label(label));
    }

    pub fn jsr(&mut self, label: &str) {
        self.special(Opcode::Jsr, Operand::label(label));
    }

    pub fn push(&mut self, value: impl Into<Operand>) {
        self.set(Special::Push, value);
    }

    pub fn pop(&mut self, into: impl Into<Operand>) {
        self.set(into, Special::Pop);
    }

    pub fn return_from_subroutine(&mut self) {
        self.pop(Special::Pc);
    }

    /// Push `registers`, run `f`, pop them back in reverse order.
    pub fn preserve<R>(&mut self, registers: &[Register], f: impl FnOnce(&mut Self) -> R) -> R {
        for reg in registers {
            self.push(*reg);
        }
        let result = f(self);
        for reg in registers.iter().rev() {
            self.pop(*reg);
        }
        result
    }

    /// Run `f` with the footer active, then restore the previous segment.
    /// What `f` writes to the footer stays one contiguous block.
    pub fn in_footer<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let outer = self.open_block();
        let previous = self.switch_segment(Segment::Footer);
        let result = f(self);
        self.switch_segment(previous);
        self.close_block(outer);
        result
    }

    /// Start collecting footer lines into a fresh block. Returns the lines
    /// the footer held so far; hand them back to `close_block`.
    pub fn open_block(&mut self) -> Vec<Line> {
        self.open_blocks += 1;
        std::mem::take(&mut self.footer)
    }

    /// Finish the innermost block. Blocks closed inside another block are
    /// held back and land after the outermost one.
    pub fn close_block(&mut self, outer: Vec<Line>) {
        let block = std::mem::replace(&mut self.footer, outer);
        self.open_blocks = self.open_blocks.saturating_sub(1);
        if self.open_blocks == 0 {
            self.footer.extend(block);
            self.footer.append(&mut self.deferred);
        } else {
            self.deferred.extend(block);
        }
    }

    /// Make `segment` active and return the one that was active before.
    pub fn switch_segment(&mut self, segment: Segment) -> Segment {
        std::mem::replace(&mut self.active, segment)
    }

    pub fn active_segment(&self) -> Segment {
        self.active
    }

    /// Per-purpose label counter; the first value handed out is 1.
    pub fn next_counter(&mut self, purpose: &str) -> u32 {
        let counter = self.counters.entry(purpose.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    pub fn body(&self) -> &[Line] {
        &self.body
    }

    pub fn footer(&self) -> &[Line] {
        &self.footer
    }

    /// Body then footer, one newline-terminated line each.
    pub fn assemble(&self) -> String {
        let mut out = String::new();
        for line in self.body.iter().chain(self.footer.iter()) {
            out.push_str(&line.to_string());
            out.push('\n');
        }
        out
    }

    fn push_line(&mut self, line: Line) {
        match self.active {
            Segment::Body => self.body.push(line),
            Segment::Footer => self.footer.push(line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_program_is_the_halt_trap() {
        let emitter = Emitter::new();
        assert!(emitter.body().is_empty());
        assert_eq!(
            emitter.assemble(),
            "SET PC, builtin_halt\n:builtin_halt\nSET PC, builtin_halt\n"
        );
    }

    #[test]
    fn operands_render_canonically() {
        assert_eq!(Operand::Lit(5).to_string(), "0x0005");
        assert_eq!(Operand::Lit(0xffff).to_string(), "0xffff");
        assert_eq!(Operand::mem(Operand::Lit(0x8000)).to_string(), "[0x8000]");
        assert_eq!(
            Operand::mem_offset(Register::I.into(), Operand::Lit(0x8000)).to_string(),
            "[I+0x8000]"
        );
        assert_eq!(Operand::from(Special::Push).to_string(), "PUSH");
    }

    #[test]
    fn footer_scope_restores_body() {
        let mut emitter = Emitter::new();
        emitter.set(Register::A, 1u16);
        emitter.in_footer(|e| e.write_label("f"));
        emitter.set(Register::B, 2u16);
        assert_eq!(emitter.active_segment(), Segment::Body);
        let text = emitter.assemble();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "SET A, 0x0001");
        assert_eq!(lines[1], "SET B, 0x0002");
        assert_eq!(lines.last().copied(), Some(":f"));
    }

    #[test]
    fn nested_footer_blocks_stay_contiguous() {
        let mut emitter = Emitter::new();
        emitter.in_footer(|e| {
            e.write_label("outer");
            e.in_footer(|e| {
                e.write_label("inner");
                e.return_from_subroutine();
            });
            e.return_from_subroutine();
        });
        let footer: Vec<String> = emitter.footer().iter().map(|l| l.to_string()).collect();
        assert_eq!(
            footer[3..],
            [":outer", "SET PC, POP", ":inner", "SET PC, POP"]
        );
    }

    #[test]
    fn preserve_pops_in_reverse() {
        let mut emitter = Emitter::new();
        emitter.preserve(&[Register::A, Register::B], |e| {
            e.special(Opcode::Hwi, Register::C);
        });
        let body: Vec<String> = emitter.body().iter().map(|l| l.to_string()).collect();
        assert_eq!(
            body,
            vec!["SET PUSH, A", "SET PUSH, B", "HWI C", "SET B, POP", "SET A, POP"]
        );
    }

    #[test]
    fn counters_are_per_purpose() {
        let mut emitter = Emitter::new();
        assert_eq!(emitter.next_counter("loop"), 1);
        assert_eq!(emitter.next_counter("loop"), 2);
        assert_eq!(emitter.next_counter("string"), 1);
    }
}
