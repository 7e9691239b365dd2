use core::fmt;
use core::fmt::Write;

use crate::registers::{Register, ABI_NAMES};

/// Marker stored in the delay-slot register when no branch is pending.
pub const INVALID_PC: u32 = 0x0000_0001;

/// COP0 status bits the kernel core cares about.
pub const STATUS_EXL: u32 = 0x02;
pub const STATUS_ERL: u32 = 0x04;

/// Architectural state of the guest processor as seen by the kernel core.
///
/// The interpreter owns instruction execution; the kernel only reads and
/// writes this state when it switches threads or enters/leaves exceptions.
#[derive(Clone, PartialEq, Eq)]
pub struct Cpu {
    /// General-purpose registers r0-r31. r0 reads as zero for the guest.
    pub gpr: [u32; 32],
    /// Address of the next instruction to execute.
    pub pc: u32,
    /// Target of a taken branch whose delay slot has not executed yet,
    /// or [`INVALID_PC`].
    pub delayed_jump_addr: u32,
    /// COP0 exception program counter.
    pub epc: u32,
    /// COP0 status register.
    pub status: u32,
    /// Set by the interpreter when it stops for an exception.
    pub has_exception: bool,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            gpr: [0; 32],
            pc: 0,
            delayed_jump_addr: INVALID_PC,
            epc: 0,
            status: 0,
            has_exception: false,
        }
    }

    pub fn reg(&self, reg: Register) -> u32 {
        self.gpr[reg.index()]
    }

    pub fn set_reg(&mut self, reg: Register, value: u32) {
        if reg != Register::Zero {
            self.gpr[reg.index()] = value;
        }
    }

    /// First four call arguments (`a0`..`a3`).
    pub fn args(&self) -> [u32; 4] {
        [
            self.reg(Register::A0),
            self.reg(Register::A1),
            self.reg(Register::A2),
            self.reg(Register::A3),
        ]
    }

    /// Record the interrupted PC and raise EXL, like the hardware does on entry.
    pub fn enter_exception(&mut self) {
        self.epc = self.pc;
        self.status |= STATUS_EXL;
    }

    /// Drop the innermost exception level (ERL before EXL).
    pub fn leave_exception(&mut self) {
        if self.status & STATUS_ERL != 0 {
            self.status &= !STATUS_ERL;
        } else {
            self.status &= !STATUS_EXL;
        }
        self.has_exception = false;
    }

    pub fn in_exception(&self) -> bool {
        self.status & (STATUS_EXL | STATUS_ERL) != 0
    }

    /// Human readable register dump.
    pub fn dump_registers(&self) -> String {
        let mut out = String::new();
        for (i, name) in ABI_NAMES.iter().enumerate() {
            let _ = writeln!(out, "r{:02} ({:<4}) = 0x{:08x}", i, name, self.gpr[i]);
        }
        let _ = writeln!(out, "pc          = 0x{:08x}", self.pc);
        let _ = writeln!(out, "epc         = 0x{:08x}", self.epc);
        out
    }
}

impl fmt::Debug for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cpu")
            .field("pc", &format_args!("0x{:08x}", self.pc))
            .field("sp", &format_args!("0x{:08x}", self.reg(Register::Sp)))
            .field("ra", &format_args!("0x{:08x}", self.reg(Register::Ra)))
            .field("epc", &format_args!("0x{:08x}", self.epc))
            .field("status", &format_args!("0x{:08x}", self.status))
            .finish()
    }
}
