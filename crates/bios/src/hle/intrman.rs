use types::{to_guest, KE_ERROR};

use crate::bios::Bios;
use crate::error::{InvalidState, KernelResult};
use crate::module::Module;

use super::{set_status, unknown_function};

const REGISTER_INTR_HANDLER: u32 = 4;
const RELEASE_INTR_HANDLER: u32 = 5;

const LIBRARY: &str = "intrman";

/// Interrupt handler registry.
#[derive(Debug, Default)]
pub struct InterruptManager;

fn release_line(bios: &mut Bios, line: u32) -> KernelResult<()> {
    let id = bios
        .find_interrupt_handler(line)
        .ok_or(InvalidState::HandlerNotFound)?;
    bios.release_interrupt_handler(id)
}

impl Module for InterruptManager {
    fn id(&self) -> &str {
        LIBRARY
    }

    fn function_name(&self, function_id: u32) -> Option<&'static str> {
        match function_id {
            REGISTER_INTR_HANDLER => Some("RegisterIntrHandler"),
            RELEASE_INTR_HANDLER => Some("ReleaseIntrHandler"),
            _ => None,
        }
    }

    fn invoke(&mut self, bios: &mut Bios, function_id: u32) {
        let [a0, a1, a2, a3] = bios.cpu().args();
        let name = self.function_name(function_id).unwrap_or("?");
        match function_id {
            REGISTER_INTR_HANDLER => {
                let result = bios.register_interrupt_handler(a0, a1, a2, a3).map(|_| ());
                set_status(bios, LIBRARY, name, result);
            }
            RELEASE_INTR_HANDLER => {
                let result = release_line(bios, a0);
                set_status(bios, LIBRARY, name, result);
            }
            _ => {
                unknown_function(LIBRARY, function_id);
                bios.set_return_value(to_guest(KE_ERROR));
            }
        }
    }
}
