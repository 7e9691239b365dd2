//! Native stand-ins for the firmware's kernel libraries. Each translates
//! guest calls (arguments in `a0`..`a3`) into kernel operations and leaves
//! the firmware result code in `v0`.

mod intrman;
mod loadcore;
mod thbase;
mod thevent;
mod thsemap;
mod vblank;

pub use intrman::InterruptManager;
pub use loadcore::LoadCore;
pub use thbase::ThreadBase;
pub use thevent::ThreadEvent;
pub use thsemap::ThreadSemaphore;
pub use vblank::VBlank;

use log::{trace, warn};
use types::{to_guest, KE_OK};

use crate::bios::Bios;
use crate::error::{InvalidState, KernelError, KernelResult};

pub(crate) fn register_kernel_libraries(bios: &mut Bios) {
    bios.register_module(Bios::module_handle(ThreadBase));
    bios.register_module(Bios::module_handle(ThreadSemaphore));
    bios.register_module(Bios::module_handle(ThreadEvent));
    bios.register_module(Bios::module_handle(InterruptManager));
    bios.register_module(Bios::module_handle(VBlank));
    bios.register_module(Bios::module_handle(LoadCore));
}

fn log_failure(library: &str, function: &str, err: &KernelError) {
    match err {
        KernelError::InvalidState(InvalidState::SemaphoreZero)
        | KernelError::InvalidState(InvalidState::ConditionNotMet) => {
            trace!("{}::{}: {}", library, function, err)
        }
        _ => warn!("{}::{} failed: {}", library, function, err),
    }
}

/// Stores a value-returning call's outcome in `v0`.
pub(crate) fn set_value(bios: &mut Bios, library: &str, function: &str, result: KernelResult<u32>) {
    let value = match result {
        Ok(value) => value,
        Err(err) => {
            log_failure(library, function, &err);
            to_guest(err.code())
        }
    };
    bios.set_return_value(value);
}

/// Stores `KE_OK` or the error code in `v0`.
pub(crate) fn set_status(bios: &mut Bios, library: &str, function: &str, result: KernelResult<()>) {
    set_value(bios, library, function, result.map(|()| to_guest(KE_OK)));
}

pub(crate) fn unknown_function(library: &str, function_id: u32) {
    warn!("{}: unknown function #{}", library, function_id);
}
