use mips::instruction::{self, branch_target, hi_lo_address, jump_target, SYSCALL};
use mips::{Assembler, Register};

#[test]
fn test_idle_loop_branches_to_itself() {
    let mut asm = Assembler::new();
    let top = asm.label();
    asm.beq(Register::Zero, Register::Zero, top).nop();

    let words = asm.words();
    assert_eq!(words, &[0x1000_FFFF, 0x0000_0000]);
    assert_eq!(branch_target(0x1000, words[0]), 0x1000);
}

#[test]
fn test_syscall_trampoline_words() {
    let mut asm = Assembler::new();
    asm.addiu(Register::V0, Register::Zero, 0x666).syscall();

    assert_eq!(asm.words(), &[0x2402_0666, SYSCALL]);
}

#[test]
fn test_li_round_trips_through_hi_lo() {
    let mut asm = Assembler::new();
    asm.li(Register::T0, 0x8001_2345);
    let words = asm.words();

    // ori zero-extends, so rebuild with the unsigned low half.
    let value = (instruction::imm16(words[0]) << 16) | instruction::imm16(words[1]);
    assert_eq!(value, 0x8001_2345);
}

#[test]
fn test_hi_lo_address_sign_extends_low_half() {
    // lui t0, 0x0001 ; addiu t0, t0, -0x10
    let hi = 0x3C08_0001;
    let lo = 0x2508_FFF0;
    assert_eq!(hi_lo_address(hi, lo), 0x0000_FFF0);
}

#[test]
fn test_jump_target_uses_region_of_delay_slot() {
    let mut asm = Assembler::new();
    asm.jal(0x0004_2000);
    let word = asm.words()[0];

    assert_eq!(jump_target(0x0001_0000, word), 0x0004_2000);
    assert_eq!(jump_target(0x8001_0000, word), 0x8004_2000);
}

#[test]
fn test_import_function_id() {
    assert_eq!(instruction::import_function_id(0x2400_0017), Some(0x17));
    assert_eq!(instruction::import_function_id(SYSCALL), None);
}
