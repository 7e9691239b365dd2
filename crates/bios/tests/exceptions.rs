mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use bios::control_block::{SYSCALL_THREAD_FINISH, THREAD_FINISH_ADDR};
use bios::{Bios, Module, ThreadStatus, TrapKind};
use common::*;
use mips::Register;
use types::{to_guest, KE_ERROR};

#[test]
fn returning_from_entry_ends_the_thread() {
    let mut bios = new_bios();
    spawn(&mut bios, 10);
    bios.resolve_reschedule();

    bios.cpu_mut().set_reg(Register::V0, SYSCALL_THREAD_FINISH);
    trap_at(&mut bios, THREAD_FINISH_ADDR + 4);
    assert_eq!(bios.current_thread_id(), 0);
    assert!(bios.get_thread_infos().is_empty());
    assert!(!bios.cpu().has_exception);
}

#[test]
fn decodes_import_stub_at_either_word() {
    let mut bios = new_bios();
    let stubs = write_import_table(&mut bios, STUB_AREA, "thbase", &[20, 33]);

    for epc in [stubs[1], stubs[1] + 4] {
        bios.cpu_mut().epc = epc;
        assert_eq!(
            bios.decode_trap(),
            TrapKind::ImportCall {
                library: "thbase".into(),
                function_id: 33
            }
        );
    }
}

#[test]
fn unknown_words_are_reported() {
    let mut bios = new_bios();
    write_words(&mut bios, SCRATCH, &[0x1234_5678]);
    bios.cpu_mut().epc = SCRATCH;
    assert_eq!(
        bios.decode_trap(),
        TrapKind::Unknown {
            epc: SCRATCH,
            word: 0x1234_5678
        }
    );

    bios.cpu_mut().set_reg(Register::V0, 0x42);
    bios.cpu_mut().epc = THREAD_FINISH_ADDR + 4;
    assert!(matches!(bios.decode_trap(), TrapKind::Unknown { .. }));

    trap_at(&mut bios, SCRATCH);
    assert!(!bios.cpu().has_exception);
}

#[test]
fn import_call_returns_to_caller() {
    let mut bios = new_bios();
    let id = spawn(&mut bios, 20);
    bios.resolve_reschedule();
    let stubs = write_import_table(&mut bios, STUB_AREA, "thbase", &[20]);

    assert_eq!(call(&mut bios, stubs[0], &[]), id);
    assert_eq!(bios.cpu().pc, RETURN_ADDR);
}

#[test]
fn unknown_library_and_function() {
    let mut bios = new_bios();
    spawn(&mut bios, 20);
    bios.resolve_reschedule();
    let missing = write_import_table(&mut bios, STUB_AREA, "nosuch", &[3]);
    let thbase = write_import_table(&mut bios, STUB_AREA + 0x100, "thbase", &[999]);

    bios.cpu_mut().set_reg(Register::V0, 0x1234);
    assert_eq!(call(&mut bios, missing[0], &[]), 0x1234);
    assert_eq!(bios.cpu().pc, RETURN_ADDR);

    assert_eq!(call(&mut bios, thbase[0], &[]), to_guest(KE_ERROR));
}

#[test]
fn thread_calls_create_and_start() {
    let mut bios = new_bios();
    let caller = spawn(&mut bios, 20);
    bios.resolve_reschedule();
    let stubs = write_import_table(&mut bios, STUB_AREA, "thbase", &[4, 6, 21]);
    write_words(&mut bios, SCRATCH, &[0, 0, ENTRY, 0x800, 15]);

    let child = call(&mut bios, stubs[0], &[SCRATCH]);
    assert_eq!(child, caller + 1);
    assert_eq!(
        bios.refer_thread_status(child).unwrap().status,
        ThreadStatus::Created
    );

    call(&mut bios, stubs[1], &[child, 0x99]);
    assert_eq!(bios.current_thread_id(), child);
    assert_eq!(bios.cpu().reg(Register::A0), 0x99);
    let saved = bios.refer_thread_status(caller).unwrap();
    assert_eq!(saved.pc, RETURN_ADDR);

    let info = SCRATCH + 0x40;
    assert_eq!(call(&mut bios, stubs[2], &[caller, info]), 0);
    assert_eq!(read_word(&bios, info + 8), ThreadStatus::Running.raw());
    assert_eq!(read_word(&bios, info + 12), ENTRY);
    assert_eq!(read_word(&bios, info + 28), 20);
    assert_eq!(read_word(&bios, info + 32), 20);
}

#[test]
fn semaphore_library() {
    let mut bios = new_bios();
    spawn(&mut bios, 20);
    bios.resolve_reschedule();
    let stubs = write_import_table(&mut bios, STUB_AREA, "thsemap", &[4, 8, 9, 6, 11]);
    write_words(&mut bios, SCRATCH, &[0, 0, 1, 1]);

    let sema = call(&mut bios, stubs[0], &[SCRATCH]);
    assert_eq!(sema, 1);
    assert_eq!(call(&mut bios, stubs[1], &[sema]), 0);
    assert_eq!(call(&mut bios, stubs[2], &[sema]), to_guest(types::KE_SEMA_ZERO));
    assert_eq!(call(&mut bios, stubs[3], &[sema]), 0);

    let info = SCRATCH + 0x40;
    assert_eq!(call(&mut bios, stubs[4], &[sema, info]), 0);
    let words: Vec<u32> = (0..6).map(|i| read_word(&bios, info + i * 4)).collect();
    assert_eq!(words, vec![0, 0, 1, 1, 1, 0]);

    assert_eq!(call(&mut bios, stubs[1], &[42]), to_guest(types::KE_UNKNOWN_SEMID));
}

#[test]
fn event_flag_library() {
    let mut bios = new_bios();
    spawn(&mut bios, 20);
    bios.resolve_reschedule();
    let stubs = write_import_table(&mut bios, STUB_AREA, "thevent", &[4, 6, 11, 13]);
    write_words(&mut bios, SCRATCH, &[0, 0, 0b10]);

    let flag = call(&mut bios, stubs[0], &[SCRATCH]);
    assert_eq!(call(&mut bios, stubs[1], &[flag, 0b1]), 0);

    let result = SCRATCH + 0x80;
    assert_eq!(call(&mut bios, stubs[2], &[flag, 0b11, 0, result]), 0);
    assert_eq!(read_word(&bios, result), 0b11);
    assert_eq!(
        call(&mut bios, stubs[2], &[flag, 0b100, 0, result]),
        to_guest(types::KE_EVF_COND)
    );

    let info = SCRATCH + 0x40;
    assert_eq!(call(&mut bios, stubs[3], &[flag, info]), 0);
    let words: Vec<u32> = (0..5).map(|i| read_word(&bios, info + i * 4)).collect();
    assert_eq!(words, vec![0, 0, 0b10, 0b11, 0]);
}

#[test]
fn interrupt_library() {
    let mut bios = new_bios();
    let stubs = write_import_table(&mut bios, STUB_AREA, "intrman", &[4, 5]);

    assert_eq!(call(&mut bios, stubs[0], &[9, 0, 0x0010_0800, 0]), 0);
    assert!(bios.find_interrupt_handler(9).is_some());
    assert_eq!(
        call(&mut bios, stubs[0], &[9, 0, 0x0010_0800, 0]),
        to_guest(types::KE_FOUND_HANDLER)
    );
    assert_eq!(call(&mut bios, stubs[1], &[9]), 0);
    assert_eq!(call(&mut bios, stubs[1], &[9]), to_guest(types::KE_NOTFOUND_HANDLER));
}

#[test]
fn vblank_wait_blocks_until_notified() {
    let mut bios = new_bios();
    let id = spawn(&mut bios, 20);
    bios.resolve_reschedule();
    let stubs = write_import_table(&mut bios, STUB_AREA, "vblank", &[4]);

    call(&mut bios, stubs[0], &[]);
    assert_eq!(bios.current_thread_id(), 0);

    bios.notify_vblank_start();
    assert_eq!(bios.current_thread_id(), id);
    assert_eq!(bios.cpu().pc, RETURN_ADDR);
    assert_eq!(bios.cpu().reg(Register::V0), 0);
}

#[test]
fn guest_libraries_are_registered_and_called() {
    let mut bios = new_bios();
    spawn(&mut bios, 20);
    bios.resolve_reschedule();
    let table = SCRATCH + 0x200;
    write_export_table(&mut bios, table, "mylib", &[0x0010_0500, 0x0010_0600]);
    let loadcore = write_import_table(&mut bios, STUB_AREA, "loadcore", &[6]);
    let mylib = write_import_table(&mut bios, STUB_AREA + 0x100, "mylib", &[1]);

    assert_eq!(call(&mut bios, loadcore[0], &[table]), 0);
    let modules = bios.dynamic_modules();
    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0].name(), "mylib");
    assert_eq!(modules[0].function_count(), 2);

    call(&mut bios, mylib[0], &[]);
    assert_eq!(bios.cpu().pc, 0x0010_0600);
    assert_eq!(bios.cpu().reg(Register::Ra), RETURN_ADDR);

    let moved = SCRATCH + 0x300;
    write_export_table(&mut bios, moved, "mylib", &[0x0010_0700]);
    assert_eq!(call(&mut bios, loadcore[0], &[moved]), 0);
    assert_eq!(bios.dynamic_modules().len(), 1);
    assert_eq!(bios.dynamic_modules()[0].export_table(), moved);

    assert_eq!(call(&mut bios, loadcore[0], &[SCRATCH + 0x400]), to_guest(KE_ERROR));
}

struct Doubler {
    calls: Rc<Cell<u32>>,
}

impl Module for Doubler {
    fn id(&self) -> &str {
        "mylib"
    }

    fn invoke(&mut self, bios: &mut Bios, function_id: u32) {
        self.calls.set(self.calls.get() + 1);
        bios.set_return_value(function_id * 2);
    }
}

#[test]
fn native_libraries_shadow_guest_ones() {
    let mut bios = new_bios();
    let calls = Rc::new(Cell::new(0));
    bios.register_module(Rc::new(RefCell::new(Doubler {
        calls: calls.clone(),
    })));
    write_export_table(&mut bios, SCRATCH, "mylib", &[0x0010_0500]);
    let loadcore = write_import_table(&mut bios, STUB_AREA, "loadcore", &[6]);
    let mylib = write_import_table(&mut bios, STUB_AREA + 0x100, "mylib", &[7]);
    call(&mut bios, loadcore[0], &[SCRATCH]);

    assert_eq!(call(&mut bios, mylib[0], &[]), 14);
    assert_eq!(calls.get(), 1);
    assert_eq!(bios.cpu().pc, RETURN_ADDR);
}
