//! Guest-side building blocks for the IOP kernel core: register file and
//! exception state, word-backed guest RAM, instruction field helpers and a
//! tiny assembler for the kernel's own trampolines.

pub mod asm;
pub mod cpu;
pub mod instruction;
pub mod memory;
pub mod registers;

pub use asm::Assembler;
pub use cpu::Cpu;
pub use memory::GuestMemory;
pub use registers::Register;
