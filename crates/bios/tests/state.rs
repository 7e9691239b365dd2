mod common;

use bios::control_block::CONTROL_BLOCK_SIZE;
use bios::{BiosState, MemoryBlock, SemaphoreParams, StateError, ThreadQueue};
use common::{new_bios, sample_irx, spawn};

fn thread_summary(bios: &bios::Bios) -> Vec<(u32, u32, bios::ThreadStatus)> {
    bios.get_thread_infos()
        .into_iter()
        .map(|info| (info.id, info.priority, info.status))
        .collect()
}

#[test]
fn state_survives_json_round_trip() {
    let mut bios = new_bios();
    let sema = bios.create_semaphore(SemaphoreParams::new(0, 1)).unwrap();
    let a = spawn(&mut bios, 10);
    spawn(&mut bios, 20);
    bios.resolve_reschedule();
    bios.wait_semaphore(sema).unwrap();
    bios.resolve_reschedule();
    bios.load_and_start_module("sample.irx", &sample_irx().build(), &[])
        .unwrap();
    bios.count_ticks(500);

    let state = bios.save_state();
    let json = serde_json::to_string(&state).unwrap();
    let decoded: BiosState = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, state);

    let mut restored = new_bios();
    restored.load_state(&decoded).unwrap();
    assert_eq!(restored.current_thread_id(), bios.current_thread_id());
    assert_eq!(restored.current_time(), 500);
    assert_eq!(thread_summary(&restored), thread_summary(&bios));
    assert_eq!(
        restored.queue_ids(ThreadQueue::Ready),
        bios.queue_ids(ThreadQueue::Ready)
    );
    assert_eq!(
        restored.queue_ids(ThreadQueue::Semaphore(sema)),
        vec![a]
    );
    assert_eq!(restored.get_module_infos(), bios.get_module_infos());
    assert_eq!(restored.sysmem().blocks(), bios.sysmem().blocks());

    restored.signal_semaphore(sema, false).unwrap();
    restored.resolve_reschedule();
    assert_eq!(restored.current_thread_id(), a);
}

#[test]
fn control_block_size_must_match() {
    let bios = new_bios();
    let mut state = bios.save_state();
    assert_eq!(state.control_block.len(), CONTROL_BLOCK_SIZE);
    state.control_block.truncate(16);

    let mut target = new_bios();
    assert_eq!(
        target.load_state(&state),
        Err(StateError::ControlBlockSize {
            expected: CONTROL_BLOCK_SIZE,
            found: 16
        })
    );
}

#[test]
fn overlapping_blocks_are_rejected() {
    let bios = new_bios();
    let mut state = bios.save_state();
    state.memory_blocks = vec![
        MemoryBlock {
            address: 0x0001_0000,
            size: 0x200,
        },
        MemoryBlock {
            address: 0x0001_0100,
            size: 0x100,
        },
    ];

    let mut target = new_bios();
    assert_eq!(
        target.load_state(&state),
        Err(StateError::MemoryBlock {
            address: 0x0001_0100,
            size: 0x100
        })
    );
}
