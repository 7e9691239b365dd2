use crate::instruction::{
    FUNCT_JR, FUNCT_SYSCALL, NOP, OPCODE_ADDIU, OPCODE_BEQ, OPCODE_BNE, OPCODE_J, OPCODE_JAL,
    OPCODE_LUI, OPCODE_LW, OPCODE_ORI, OPCODE_SPECIAL, OPCODE_SW,
};
use crate::registers::Register;

/// Position inside the code emitted so far, in words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

/// Emits raw MIPS words for the small routines the kernel plants in guest
/// memory (idle loop, thread-exit and exception-return trampolines).
#[derive(Debug, Default)]
pub struct Assembler {
    words: Vec<u32>,
}

const fn r(reg: Register) -> u32 {
    reg as u32
}

const fn i_type(op: u32, rs: u32, rt: u32, imm: u32) -> u32 {
    (op << 26) | (rs << 21) | (rt << 16) | (imm & 0xFFFF)
}

impl Assembler {
    pub fn new() -> Self {
        Self { words: Vec::new() }
    }

    pub fn label(&self) -> Label {
        Label(self.words.len())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn into_words(self) -> Vec<u32> {
        self.words
    }

    pub fn emit(&mut self, word: u32) -> &mut Self {
        self.words.push(word);
        self
    }

    pub fn nop(&mut self) -> &mut Self {
        self.emit(NOP)
    }

    pub fn syscall(&mut self) -> &mut Self {
        self.emit((OPCODE_SPECIAL << 26) | FUNCT_SYSCALL)
    }

    pub fn addiu(&mut self, rt: Register, rs: Register, imm: i16) -> &mut Self {
        self.emit(i_type(OPCODE_ADDIU, r(rs), r(rt), imm as u16 as u32))
    }

    pub fn lui(&mut self, rt: Register, imm: u16) -> &mut Self {
        self.emit(i_type(OPCODE_LUI, 0, r(rt), imm as u32))
    }

    pub fn ori(&mut self, rt: Register, rs: Register, imm: u16) -> &mut Self {
        self.emit(i_type(OPCODE_ORI, r(rs), r(rt), imm as u32))
    }

    /// `lui` + `ori` pair loading a full 32-bit constant.
    pub fn li(&mut self, rt: Register, value: u32) -> &mut Self {
        self.lui(rt, (value >> 16) as u16);
        self.ori(rt, rt, value as u16)
    }

    pub fn lw(&mut self, rt: Register, offset: i16, base: Register) -> &mut Self {
        self.emit(i_type(OPCODE_LW, r(base), r(rt), offset as u16 as u32))
    }

    pub fn sw(&mut self, rt: Register, offset: i16, base: Register) -> &mut Self {
        self.emit(i_type(OPCODE_SW, r(base), r(rt), offset as u16 as u32))
    }

    pub fn jr(&mut self, rs: Register) -> &mut Self {
        self.emit((OPCODE_SPECIAL << 26) | (r(rs) << 21) | FUNCT_JR)
    }

    pub fn j(&mut self, target: u32) -> &mut Self {
        self.emit((OPCODE_J << 26) | ((target >> 2) & 0x03FF_FFFF))
    }

    pub fn jal(&mut self, target: u32) -> &mut Self {
        self.emit((OPCODE_JAL << 26) | ((target >> 2) & 0x03FF_FFFF))
    }

    /// `beq` to a label already emitted (backwards branch).
    pub fn beq(&mut self, rs: Register, rt: Register, target: Label) -> &mut Self {
        let offset = self.branch_offset(target);
        self.emit(i_type(OPCODE_BEQ, r(rs), r(rt), offset))
    }

    pub fn bne(&mut self, rs: Register, rt: Register, target: Label) -> &mut Self {
        let offset = self.branch_offset(target);
        self.emit(i_type(OPCODE_BNE, r(rs), r(rt), offset))
    }

    fn branch_offset(&self, target: Label) -> u32 {
        // Offsets are relative to the delay slot of the branch being emitted.
        let delay_slot = self.words.len() as i64 + 1;
        (target.0 as i64 - delay_slot) as i16 as u16 as u32
    }

    /// Little-endian byte image of the emitted code.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }
}
