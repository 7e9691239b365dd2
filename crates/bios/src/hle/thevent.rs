use types::{to_guest, KE_ERROR};

use crate::bios::Bios;
use crate::error::KernelResult;
use crate::module::Module;

use super::{set_status, set_value, unknown_function};

const CREATE_EVENT_FLAG: u32 = 4;
const DELETE_EVENT_FLAG: u32 = 5;
const SET_EVENT_FLAG: u32 = 6;
const I_SET_EVENT_FLAG: u32 = 7;
const CLEAR_EVENT_FLAG: u32 = 8;
const I_CLEAR_EVENT_FLAG: u32 = 9;
const WAIT_EVENT_FLAG: u32 = 10;
const POLL_EVENT_FLAG: u32 = 11;
const REFER_EVENT_FLAG_STATUS: u32 = 13;
const I_REFER_EVENT_FLAG_STATUS: u32 = 14;

const LIBRARY: &str = "thevent";

/// Event flag library.
#[derive(Debug, Default)]
pub struct ThreadEvent;

impl ThreadEvent {
    fn create(bios: &mut Bios, param_ptr: u32) -> KernelResult<u32> {
        let attributes = bios.read_word(param_ptr)?;
        let option = bios.read_word(param_ptr + 4)?;
        let bits = bios.read_word(param_ptr + 8)?;
        bios.create_event_flag(attributes, option, bits)
    }

    /// Fills an `iop_event_info` record.
    fn refer(bios: &mut Bios, id: u32, info_ptr: u32) -> KernelResult<()> {
        let status = bios.refer_event_flag_status(id)?;
        let fields = [
            status.attributes,
            status.option,
            status.initial_bits,
            status.current_bits,
            status.wait_count,
        ];
        for (index, value) in fields.into_iter().enumerate() {
            bios.write_word(info_ptr + index as u32 * 4, value)?;
        }
        Ok(())
    }
}

impl Module for ThreadEvent {
    fn id(&self) -> &str {
        LIBRARY
    }

    fn function_name(&self, function_id: u32) -> Option<&'static str> {
        Some(match function_id {
            CREATE_EVENT_FLAG => "CreateEventFlag",
            DELETE_EVENT_FLAG => "DeleteEventFlag",
            SET_EVENT_FLAG => "SetEventFlag",
            I_SET_EVENT_FLAG => "iSetEventFlag",
            CLEAR_EVENT_FLAG => "ClearEventFlag",
            I_CLEAR_EVENT_FLAG => "iClearEventFlag",
            WAIT_EVENT_FLAG => "WaitEventFlag",
            POLL_EVENT_FLAG => "PollEventFlag",
            REFER_EVENT_FLAG_STATUS => "ReferEventFlagStatus",
            I_REFER_EVENT_FLAG_STATUS => "iReferEventFlagStatus",
            _ => return None,
        })
    }

    fn invoke(&mut self, bios: &mut Bios, function_id: u32) {
        let [a0, a1, a2, a3] = bios.cpu().args();
        let name = self.function_name(function_id).unwrap_or("?");
        match function_id {
            CREATE_EVENT_FLAG => {
                let result = Self::create(bios, a0);
                set_value(bios, LIBRARY, name, result);
            }
            DELETE_EVENT_FLAG => {
                let result = bios.delete_event_flag(a0);
                set_status(bios, LIBRARY, name, result);
            }
            SET_EVENT_FLAG | I_SET_EVENT_FLAG => {
                let result = bios.set_event_flag(a0, a1, true);
                set_status(bios, LIBRARY, name, result);
            }
            CLEAR_EVENT_FLAG | I_CLEAR_EVENT_FLAG => {
                let result = bios.clear_event_flag(a0, a1);
                set_status(bios, LIBRARY, name, result);
            }
            WAIT_EVENT_FLAG => {
                let result = bios.wait_event_flag(a0, a1, a2, a3);
                set_status(bios, LIBRARY, name, result);
            }
            POLL_EVENT_FLAG => {
                let result = bios.poll_event_flag(a0, a1, a2, a3);
                set_status(bios, LIBRARY, name, result);
            }
            REFER_EVENT_FLAG_STATUS | I_REFER_EVENT_FLAG_STATUS => {
                let result = Self::refer(bios, a0, a1);
                set_status(bios, LIBRARY, name, result);
            }
            _ => {
                unknown_function(LIBRARY, function_id);
                bios.set_return_value(to_guest(KE_ERROR));
            }
        }
    }
}
