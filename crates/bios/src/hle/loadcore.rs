use log::warn;
use types::{to_guest, KE_ERROR, KE_OK};

use crate::bios::Bios;
use crate::module::{DynamicModule, Module};

use super::unknown_function;

const REGISTER_LIBRARY_ENTRIES: u32 = 6;

const LIBRARY: &str = "loadcore";

/// Library registry: lets guest modules export functions to other modules.
#[derive(Debug, Default)]
pub struct LoadCore;

impl Module for LoadCore {
    fn id(&self) -> &str {
        LIBRARY
    }

    fn function_name(&self, function_id: u32) -> Option<&'static str> {
        (function_id == REGISTER_LIBRARY_ENTRIES).then_some("RegisterLibraryEntries")
    }

    fn invoke(&mut self, bios: &mut Bios, function_id: u32) {
        match function_id {
            REGISTER_LIBRARY_ENTRIES => {
                let export_table = bios.cpu().args()[0];
                match DynamicModule::from_export_table(bios.memory(), export_table) {
                    Some(module) => {
                        bios.register_dynamic_module(module);
                        bios.set_return_value(to_guest(KE_OK));
                    }
                    None => {
                        warn!("loadcore: no export table at 0x{:08x}", export_table);
                        bios.set_return_value(to_guest(KE_ERROR));
                    }
                }
            }
            _ => {
                unknown_function(LIBRARY, function_id);
                bios.set_return_value(to_guest(KE_ERROR));
            }
        }
    }
}
