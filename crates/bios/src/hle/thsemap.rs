use types::{to_guest, KE_ERROR};

use crate::bios::Bios;
use crate::error::KernelResult;
use crate::module::Module;
use crate::semaphore::SemaphoreParams;

use super::{set_status, set_value, unknown_function};

const CREATE_SEMA: u32 = 4;
const DELETE_SEMA: u32 = 5;
const SIGNAL_SEMA: u32 = 6;
const I_SIGNAL_SEMA: u32 = 7;
const WAIT_SEMA: u32 = 8;
const POLL_SEMA: u32 = 9;
const REFER_SEMA_STATUS: u32 = 11;

const LIBRARY: &str = "thsemap";

/// Semaphore library.
#[derive(Debug, Default)]
pub struct ThreadSemaphore;

impl ThreadSemaphore {
    fn create(bios: &mut Bios, param_ptr: u32) -> KernelResult<u32> {
        let params = SemaphoreParams {
            attributes: bios.read_word(param_ptr)?,
            option: bios.read_word(param_ptr + 4)?,
            initial_count: bios.read_word(param_ptr + 8)?,
            max_count: bios.read_word(param_ptr + 12)?,
        };
        bios.create_semaphore(params)
    }

    /// Fills an `iop_sema_info` record.
    fn refer(bios: &mut Bios, id: u32, info_ptr: u32) -> KernelResult<()> {
        let status = bios.refer_semaphore_status(id)?;
        let fields = [
            status.attributes,
            status.option,
            status.initial_count,
            status.count,
            status.max_count,
            status.wait_count,
        ];
        for (index, value) in fields.into_iter().enumerate() {
            bios.write_word(info_ptr + index as u32 * 4, value)?;
        }
        Ok(())
    }
}

impl Module for ThreadSemaphore {
    fn id(&self) -> &str {
        LIBRARY
    }

    fn function_name(&self, function_id: u32) -> Option<&'static str> {
        Some(match function_id {
            CREATE_SEMA => "CreateSema",
            DELETE_SEMA => "DeleteSema",
            SIGNAL_SEMA => "SignalSema",
            I_SIGNAL_SEMA => "iSignalSema",
            WAIT_SEMA => "WaitSema",
            POLL_SEMA => "PollSema",
            REFER_SEMA_STATUS => "ReferSemaStatus",
            _ => return None,
        })
    }

    fn invoke(&mut self, bios: &mut Bios, function_id: u32) {
        let [a0, a1, _, _] = bios.cpu().args();
        let name = self.function_name(function_id).unwrap_or("?");
        match function_id {
            CREATE_SEMA => {
                let result = Self::create(bios, a0);
                set_value(bios, LIBRARY, name, result);
            }
            DELETE_SEMA => {
                let result = bios.delete_semaphore(a0);
                set_status(bios, LIBRARY, name, result);
            }
            SIGNAL_SEMA | I_SIGNAL_SEMA => {
                let result = bios.signal_semaphore(a0, false);
                set_status(bios, LIBRARY, name, result);
            }
            WAIT_SEMA => {
                let result = bios.wait_semaphore(a0);
                set_status(bios, LIBRARY, name, result);
            }
            POLL_SEMA => {
                let result = bios.poll_semaphore(a0);
                set_status(bios, LIBRARY, name, result);
            }
            REFER_SEMA_STATUS => {
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
