//! Field-level helpers for MIPS I instruction words.
//!
//! Only what the kernel needs: recognising its own trap words, pulling
//! immediates and jump targets out of instructions (relocation, tests) and
//! patching them back in.

pub const SYSCALL: u32 = 0x0000_000C;
pub const NOP: u32 = 0x0000_0000;
/// `jr $ra`
pub const JR_RA: u32 = 0x03E0_0008;

pub const OPCODE_SPECIAL: u32 = 0x00;
pub const OPCODE_J: u32 = 0x02;
pub const OPCODE_JAL: u32 = 0x03;
pub const OPCODE_BEQ: u32 = 0x04;
pub const OPCODE_BNE: u32 = 0x05;
pub const OPCODE_ADDIU: u32 = 0x09;
pub const OPCODE_ORI: u32 = 0x0D;
pub const OPCODE_LUI: u32 = 0x0F;
pub const OPCODE_LW: u32 = 0x23;
pub const OPCODE_SW: u32 = 0x2B;

pub const FUNCT_JR: u32 = 0x08;
pub const FUNCT_SYSCALL: u32 = 0x0C;

pub const IMM16_MASK: u32 = 0x0000_FFFF;
pub const TARGET26_MASK: u32 = 0x03FF_FFFF;

pub const fn opcode(word: u32) -> u32 {
    word >> 26
}

pub const fn rs(word: u32) -> u32 {
    (word >> 21) & 0x1F
}

pub const fn rt(word: u32) -> u32 {
    (word >> 16) & 0x1F
}

pub const fn imm16(word: u32) -> u32 {
    word & IMM16_MASK
}

/// Sign-extended 16-bit immediate.
pub const fn simm16(word: u32) -> i32 {
    (word & IMM16_MASK) as u16 as i16 as i32
}

pub const fn target26(word: u32) -> u32 {
    word & TARGET26_MASK
}

pub const fn with_imm16(word: u32, value: u32) -> u32 {
    (word & !IMM16_MASK) | (value & IMM16_MASK)
}

pub const fn with_target26(word: u32, value: u32) -> u32 {
    (word & !TARGET26_MASK) | (value & TARGET26_MASK)
}

/// Destination of a `j`/`jal` located at `pc`.
pub const fn jump_target(pc: u32, word: u32) -> u32 {
    (pc.wrapping_add(4) & 0xF000_0000) | (target26(word) << 2)
}

/// Destination of a conditional branch located at `pc`.
pub const fn branch_target(pc: u32, word: u32) -> u32 {
    pc.wrapping_add(4).wrapping_add((simm16(word) << 2) as u32)
}

/// Address formed by a `lui`/`addiu`-style pair (`lo` is sign extended).
pub const fn hi_lo_address(hi: u32, lo: u32) -> u32 {
    (imm16(hi) << 16).wrapping_add(simm16(lo) as u32)
}

/// Recognises the `addiu $zero, $zero, id` word that follows `jr $ra` in an
/// import stub, returning the function id it carries.
pub const fn import_function_id(word: u32) -> Option<u32> {
    if word & 0xFFFF_0000 == 0x2400_0000 {
        Some(imm16(word))
    } else {
        None
    }
}
