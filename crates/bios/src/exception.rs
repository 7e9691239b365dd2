use log::{trace, warn};
use mips::cpu::INVALID_PC;
use mips::instruction::{import_function_id, JR_RA, SYSCALL};
use mips::Register;

use crate::bios::Bios;
use crate::control_block::{SYSCALL_RETURN_FROM_EXCEPTION, SYSCALL_THREAD_FINISH};
use crate::module::{read_library_name, IMPORT_TABLE_MAGIC, LIBRARY_NAME_OFFSET};

/// How far back from a stub the import table header is searched.
const MAX_IMPORT_SCAN_WORDS: u32 = 0x1000;

/// What the trapping word at EPC asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrapKind {
    ThreadFinish,
    ReturnFromException,
    ImportCall { library: String, function_id: u32 },
    Unknown { epc: u32, word: u32 },
}

impl Bios {
    /// Trap entry from the interpreter: services the call at EPC and
    /// resolves any reschedule it requested.
    pub fn handle_exception(&mut self) {
        match self.decode_trap() {
            TrapKind::ThreadFinish => {
                self.cpu.leave_exception();
                self.exit_current_thread();
            }
            TrapKind::ReturnFromException => {
                self.return_from_exception();
            }
            TrapKind::ImportCall {
                library,
                function_id,
            } => {
                self.cpu.leave_exception();
                self.cpu.pc = self.cpu.reg(Register::Ra);
                self.cpu.delayed_jump_addr = INVALID_PC;
                trace!("import call {}#{}", library, function_id);
                if !self.invoke_module(&library, function_id) {
                    warn!("call to unknown library '{}' (function {})", library, function_id);
                }
            }
            TrapKind::Unknown { epc, word } => {
                self.cpu.leave_exception();
                warn!("unhandled trap at 0x{:08x} (word 0x{:08x})", epc, word);
            }
        }
        self.cpu.has_exception = false;
        self.resolve_reschedule();
    }

    /// Classifies the trap at EPC without side effects.
    pub fn decode_trap(&self) -> TrapKind {
        let epc = self.cpu.epc;
        let Some(word) = self.memory.read_u32(epc) else {
            return TrapKind::Unknown { epc, word: 0 };
        };

        if word == SYSCALL {
            return match self.cpu.reg(Register::V0) {
                SYSCALL_THREAD_FINISH => TrapKind::ThreadFinish,
                SYSCALL_RETURN_FROM_EXCEPTION => TrapKind::ReturnFromException,
                _ => TrapKind::Unknown { epc, word },
            };
        }

        // The stub is `jr $ra` followed by `addiu $zero, $zero, id`; EPC may
        // point at either word.
        let stub_id_addr = if word == JR_RA { epc + 4 } else { epc };
        let function_id = self
            .memory
            .read_u32(stub_id_addr)
            .and_then(import_function_id);
        let header = self.find_import_table(stub_id_addr);
        match (function_id, header) {
            (Some(function_id), Some(header)) => {
                match read_library_name(&self.memory, header + LIBRARY_NAME_OFFSET) {
                    Some(library) => TrapKind::ImportCall {
                        library,
                        function_id,
                    },
                    None => TrapKind::Unknown { epc, word },
                }
            }
            _ => TrapKind::Unknown { epc, word },
        }
    }

    fn find_import_table(&self, stub: u32) -> Option<u32> {
        (0..MAX_IMPORT_SCAN_WORDS)
            .map_while(|back| stub.checked_sub(back * 4))
            .find(|&addr| self.memory.read_u32(addr) == Some(IMPORT_TABLE_MAGIC))
    }
}
