#![allow(dead_code)]

mod elf;

pub use elf::*;

use bios::module::{EXPORT_TABLE_MAGIC, IMPORT_TABLE_MAGIC};
use bios::{Bios, BiosConfig, ThreadParams};
use mips::instruction::JR_RA;
use mips::Register;

/// Entry point given to test threads. Never executed.
pub const ENTRY: u32 = 0x0010_0000;
/// Where `call` returns to.
pub const RETURN_ADDR: u32 = 0x0010_0400;
/// Guest memory the tests write by hand, above anything the allocator hands out.
pub const SCRATCH: u32 = 0x001E_0000;
pub const STUB_AREA: u32 = 0x001F_0000;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn new_bios() -> Bios {
    init_logger();
    Bios::new(BiosConfig::default())
}

/// Creates and starts a thread without running the scheduler.
pub fn spawn(bios: &mut Bios, priority: u32) -> u32 {
    let id = bios
        .create_thread(ThreadParams::new(priority, ENTRY))
        .expect("create thread");
    bios.start_thread(id, None).expect("start thread");
    id
}

/// Stops the CPU on the instruction at `addr` and hands the trap to the kernel.
pub fn trap_at(bios: &mut Bios, addr: u32) {
    let cpu = bios.cpu_mut();
    cpu.pc = addr;
    cpu.enter_exception();
    cpu.has_exception = true;
    bios.handle_exception();
}

fn name_words(name: &str) -> [u32; 2] {
    let mut raw = [0u8; 8];
    raw[..name.len()].copy_from_slice(name.as_bytes());
    [
        u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
        u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
    ]
}

/// Writes an import table with one stub per function id and returns the
/// address of each stub's `jr $ra`.
pub fn write_import_table(bios: &mut Bios, addr: u32, library: &str, function_ids: &[u32]) -> Vec<u32> {
    let mut words = vec![IMPORT_TABLE_MAGIC, 0, 0x0101];
    words.extend(name_words(library));
    let mut stubs = Vec::new();
    for &id in function_ids {
        stubs.push(addr + words.len() as u32 * 4);
        words.push(JR_RA);
        words.push(0x2400_0000 | id);
    }
    words.extend([0, 0]);
    assert!(bios.memory_mut().write_words(addr, &words));
    stubs
}

/// Writes an export table listing `functions`.
pub fn write_export_table(bios: &mut Bios, addr: u32, library: &str, functions: &[u32]) {
    let mut words = vec![EXPORT_TABLE_MAGIC, 0, 0x0101];
    words.extend(name_words(library));
    words.extend_from_slice(functions);
    words.push(0);
    assert!(bios.memory_mut().write_words(addr, &words));
}

/// Calls through an import stub the way guest code does and returns `v0`.
pub fn call(bios: &mut Bios, stub: u32, args: &[u32]) -> u32 {
    let regs = [Register::A0, Register::A1, Register::A2, Register::A3];
    for (reg, &value) in regs.iter().zip(args) {
        bios.cpu_mut().set_reg(*reg, value);
    }
    bios.cpu_mut().set_reg(Register::Ra, RETURN_ADDR);
    trap_at(bios, stub);
    bios.cpu().reg(Register::V0)
}

pub fn write_words(bios: &mut Bios, addr: u32, words: &[u32]) {
    assert!(bios.memory_mut().write_words(addr, words));
}

pub fn read_word(bios: &Bios, addr: u32) -> u32 {
    bios.memory().read_u32(addr).expect("address in RAM")
}
