use types::{to_guest, KE_ERROR};

use crate::bios::Bios;
use crate::error::{InvalidState, KernelResult};
use crate::module::Module;
use crate::thread::ThreadParams;

use super::{set_status, set_value, unknown_function};

const CREATE_THREAD: u32 = 4;
const DELETE_THREAD: u32 = 5;
const START_THREAD: u32 = 6;
const START_THREAD_ARGS: u32 = 7;
const EXIT_THREAD: u32 = 8;
const CHANGE_THREAD_PRIORITY: u32 = 14;
const ROTATE_THREAD_READY_QUEUE: u32 = 16;
const GET_THREAD_ID: u32 = 20;
const REFER_THREAD_STATUS: u32 = 21;
const SLEEP_THREAD: u32 = 23;
const WAKEUP_THREAD: u32 = 24;
const I_WAKEUP_THREAD: u32 = 25;
const CANCEL_WAKEUP_THREAD: u32 = 26;
const DELAY_THREAD: u32 = 32;
const GET_SYSTEM_TIME: u32 = 33;
const USEC_TO_SYS_CLOCK: u32 = 39;
const SYS_CLOCK_TO_USEC: u32 = 40;

const LIBRARY: &str = "thbase";

/// Thread management library.
#[derive(Debug, Default)]
pub struct ThreadBase;

impl ThreadBase {
    fn create_thread(bios: &mut Bios, param_ptr: u32) -> KernelResult<u32> {
        let params = ThreadParams {
            attributes: bios.read_word(param_ptr)?,
            option: bios.read_word(param_ptr + 4)?,
            entry: bios.read_word(param_ptr + 8)?,
            stack_size: bios.read_word(param_ptr + 12)?,
            priority: bios.read_word(param_ptr + 16)?,
        };
        bios.create_thread(params)
    }

    fn start_thread_args(bios: &mut Bios, id: u32, size: u32, args_ptr: u32) -> KernelResult<()> {
        let args = if size == 0 || args_ptr == 0 {
            Vec::new()
        } else {
            bios.memory()
                .read_bytes(args_ptr, size as usize)
                .ok_or(InvalidState::BadAddress(args_ptr))?
                .to_vec()
        };
        bios.start_thread_args(id, &args)
    }

    /// Fills an `iop_thread_info` record.
    fn refer_thread_status(bios: &mut Bios, id: u32, info_ptr: u32) -> KernelResult<()> {
        let info = bios.refer_thread_status(id)?;
        let id = info.id;
        let thread = *bios.thread(id);
        let fields = [
            thread.attributes,
            thread.option,
            info.status.raw(),
            thread.entry,
            thread.stack_base,
            thread.stack_size,
            thread.gp,
            thread.init_priority,
            thread.priority,
            info.wait_object.map_or(0, |_| info.status.raw()),
            info.wait_object.unwrap_or(0),
            thread.wakeup_count,
        ];
        for (index, value) in fields.into_iter().enumerate() {
            bios.write_word(info_ptr + index as u32 * 4, value)?;
        }
        Ok(())
    }

    fn write_clock(bios: &mut Bios, ptr: u32, clock: u64) -> KernelResult<()> {
        bios.write_word(ptr, clock as u32)?;
        bios.write_word(ptr + 4, (clock >> 32) as u32)
    }

    fn sys_clock_to_usec(bios: &mut Bios, clock_ptr: u32, sec_ptr: u32, usec_ptr: u32) -> KernelResult<()> {
        let lo = bios.read_word(clock_ptr)? as u64;
        let hi = bios.read_word(clock_ptr + 4)? as u64;
        let clock = (hi << 32) | lo;
        let total = bios.clock_to_micro_sec(clock);
        bios.write_word(sec_ptr, (total / 1_000_000) as u32)?;
        bios.write_word(usec_ptr, (total % 1_000_000) as u32)
    }
}

impl Module for ThreadBase {
    fn id(&self) -> &str {
        LIBRARY
    }

    fn function_name(&self, function_id: u32) -> Option<&'static str> {
        Some(match function_id {
            CREATE_THREAD => "CreateThread",
            DELETE_THREAD => "DeleteThread",
            START_THREAD => "StartThread",
            START_THREAD_ARGS => "StartThreadArgs",
            EXIT_THREAD => "ExitThread",
            CHANGE_THREAD_PRIORITY => "ChangeThreadPriority",
            ROTATE_THREAD_READY_QUEUE => "RotateThreadReadyQueue",
            GET_THREAD_ID => "GetThreadId",
            REFER_THREAD_STATUS => "ReferThreadStatus",
            SLEEP_THREAD => "SleepThread",
            WAKEUP_THREAD => "WakeupThread",
            I_WAKEUP_THREAD => "iWakeupThread",
            CANCEL_WAKEUP_THREAD => "CancelWakeupThread",
            DELAY_THREAD => "DelayThread",
            GET_SYSTEM_TIME => "GetSystemTime",
            USEC_TO_SYS_CLOCK => "USec2SysClock",
            SYS_CLOCK_TO_USEC => "SysClock2USec",
            _ => return None,
        })
    }

    fn invoke(&mut self, bios: &mut Bios, function_id: u32) {
        let [a0, a1, a2, _] = bios.cpu().args();
        let name = self.function_name(function_id).unwrap_or("?");
        match function_id {
            CREATE_THREAD => {
                let result = Self::create_thread(bios, a0);
                set_value(bios, LIBRARY, name, result);
            }
            DELETE_THREAD => {
                let result = bios.delete_thread(a0);
                set_status(bios, LIBRARY, name, result);
            }
            START_THREAD => {
                let result = bios.start_thread(a0, Some(a1));
                set_status(bios, LIBRARY, name, result);
            }
            START_THREAD_ARGS => {
                let result = Self::start_thread_args(bios, a0, a1, a2);
                set_status(bios, LIBRARY, name, result);
            }
            EXIT_THREAD => {
                bios.exit_current_thread();
                set_status(bios, LIBRARY, name, Ok(()));
            }
            CHANGE_THREAD_PRIORITY => {
                let result = bios.change_thread_priority(a0, a1);
                set_status(bios, LIBRARY, name, result);
            }
            ROTATE_THREAD_READY_QUEUE => {
                let result = bios.rotate_thread_ready_queue(a0);
                set_status(bios, LIBRARY, name, result);
            }
            GET_THREAD_ID => {
                let id = bios.current_thread_id();
                bios.set_return_value(id);
            }
            REFER_THREAD_STATUS => {
                let result = Self::refer_thread_status(bios, a0, a1);
                set_status(bios, LIBRARY, name, result);
            }
            SLEEP_THREAD => {
                let result = bios.sleep_thread();
                set_status(bios, LIBRARY, name, result);
            }
            WAKEUP_THREAD | I_WAKEUP_THREAD => {
                let result = bios.wakeup_thread(a0, false);
                set_status(bios, LIBRARY, name, result);
            }
            CANCEL_WAKEUP_THREAD => {
                let result = bios.cancel_wakeup_thread(a0);
                set_value(bios, LIBRARY, name, result);
            }
            DELAY_THREAD => {
                let result = bios.delay_thread(a0);
                set_status(bios, LIBRARY, name, result);
            }
            GET_SYSTEM_TIME => {
                let now = bios.current_time();
                let result = Self::write_clock(bios, a0, now);
                set_status(bios, LIBRARY, name, result);
            }
            USEC_TO_SYS_CLOCK => {
                let clock = bios.micro_sec_to_clock(a0 as u64);
                let result = Self::write_clock(bios, a1, clock);
                set_status(bios, LIBRARY, name, result);
            }
            SYS_CLOCK_TO_USEC => {
                let result = Self::sys_clock_to_usec(bios, a0, a1, a2);
                set_status(bios, LIBRARY, name, result);
            }
            _ => {
                unknown_function(LIBRARY, function_id);
                bios.set_return_value(to_guest(KE_ERROR));
            }
        }
    }
}
