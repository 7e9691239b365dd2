use types::{to_guest, KE_ERROR};

use crate::bios::Bios;
use crate::module::Module;

use super::{set_status, unknown_function};

const WAIT_VBLANK_START: u32 = 4;
const WAIT_VBLANK_END: u32 = 5;

const LIBRARY: &str = "vblank";

#[derive(Debug, Default)]
pub struct VBlank;

impl Module for VBlank {
    fn id(&self) -> &str {
        LIBRARY
    }

    fn function_name(&self, function_id: u32) -> Option<&'static str> {
        match function_id {
            WAIT_VBLANK_START => Some("WaitVblankStart"),
            WAIT_VBLANK_END => Some("WaitVblankEnd"),
            _ => None,
        }
    }

    fn invoke(&mut self, bios: &mut Bios, function_id: u32) {
        let name = self.function_name(function_id).unwrap_or("?");
        match function_id {
            WAIT_VBLANK_START => {
                let result = bios.sleep_thread_till_vblank_start();
                set_status(bios, LIBRARY, name, result);
            }
            WAIT_VBLANK_END => {
                let result = bios.sleep_thread_till_vblank_end();
                set_status(bios, LIBRARY, name, result);
            }
            _ => {
                unknown_function(LIBRARY, function_id);
                bios.set_return_value(to_guest(KE_ERROR));
            }
        }
    }
}
