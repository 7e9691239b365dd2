mod common;

use bios::control_block::{THREADS, USER_MEMORY_START};
use bios::{module_name_from_path, InvalidState, KernelError, LoadError, MemoryBlock};
use common::*;
use irx::RelocationError;
use mips::instruction::{branch_target, hi_lo_address, jump_target};
use mips::Register;

fn text_words(bios: &bios::Bios, base: u32) -> Vec<u32> {
    (0..5).map(|i| read_word(bios, base + i * 4)).collect()
}

fn assert_relocated(bios: &bios::Bios, base: u32) {
    let words = text_words(bios, base);
    assert_eq!(hi_lo_address(words[0], words[1]), base + 0x8010);
    assert_eq!(jump_target(base + 8, words[2]), base + 0x40);
    assert_eq!(words[4], base + 0x20);
}

#[test]
fn relocatable_image_goes_to_allocator_memory() {
    let mut bios = new_bios();
    let free = bios.sysmem().free_memory();
    let loaded = bios.load_executable(&sample_irx().build()).unwrap();

    assert_eq!(loaded.link_base, 0);
    assert_eq!(loaded.entry, loaded.base);
    assert_eq!(loaded.end, loaded.base + 20);
    assert_eq!(loaded.delta(), loaded.base);
    assert!(bios.sysmem().free_memory() < free);
    assert_relocated(&bios, loaded.base);
}

#[test]
fn relocation_is_base_independent() {
    // `beq $zero, $zero, +3; nop` after the sample: targets offset 0x24.
    let mut builder = sample_irx().reloc(20, R_MIPS_PC16);
    builder.text.extend([0x1000_0003, 0x0000_0000]);
    let bytes = builder.build();
    for base in [0x0002_0000, 0x0002_3450] {
        let mut bios = new_bios();
        let loaded = bios.load_executable_at(&bytes, base).unwrap();
        assert_eq!(loaded.base, base);
        assert_relocated(&bios, base);
        let branch = read_word(&bios, base + 20);
        assert_eq!(branch, 0x1000_0003);
        assert_eq!(branch_target(base + 20, branch), base + 0x24);
    }
}

#[test]
fn explicit_base_is_reserved() {
    let mut bios = new_bios();
    let bytes = sample_irx().build();
    bios.load_executable_at(&bytes, USER_MEMORY_START).unwrap();

    spawn(&mut bios, 20);
    assert_eq!(
        bios.sysmem().blocks(),
        vec![
            MemoryBlock { address: USER_MEMORY_START, size: 20 },
            MemoryBlock { address: USER_MEMORY_START + 0x100, size: 0x4000 },
        ]
    );
    assert_relocated(&bios, USER_MEMORY_START);

    let err = bios.load_executable_at(&bytes, USER_MEMORY_START).unwrap_err();
    assert!(matches!(err, LoadError::DoesNotFit { base: USER_MEMORY_START, size: 20 }));
}

#[test]
fn image_may_not_overwrite_the_kernel() {
    let mut bios = new_bios();
    let thread = spawn(&mut bios, 20);
    let blocks = bios.sysmem().blocks();
    let bytes = sample_irx().build();

    for base in [THREADS.base(), 0x8000_0000 | THREADS.base(), USER_MEMORY_START - 0x10] {
        let err = bios.load_executable_at(&bytes, base).unwrap_err();
        assert!(matches!(err, LoadError::KernelRegion { .. }), "base 0x{:08x}", base);
    }
    let exec = ElfBuilder::exec(0x0000_0400, sample_text()).build();
    assert!(matches!(
        bios.load_executable(&exec).unwrap_err(),
        LoadError::KernelRegion { base: 0x400, .. }
    ));

    assert_eq!(bios.sysmem().blocks(), blocks);
    assert_eq!(bios.refer_thread_status(thread).unwrap().priority, 20);
}

#[test]
fn bss_is_zeroed() {
    let mut bios = new_bios();
    let base = 0x0003_0000;
    assert!(bios.memory_mut().fill(base, 0x100, 0xAA));
    let mut builder = sample_irx();
    builder.bss_size = 0x40;
    let loaded = bios.load_executable_at(&builder.build(), base).unwrap();

    assert_eq!(loaded.end, base + 20 + 0x40);
    let bss = bios.memory().read_bytes(base + 20, 0x40).unwrap();
    assert!(bss.iter().all(|&b| b == 0));
    assert_eq!(read_word(&bios, base + 20 + 0x40), 0xAAAA_AAAA);
}

#[test]
fn executable_is_placed_at_link_address() {
    let mut bios = new_bios();
    let bytes = ElfBuilder::exec(0x0004_0000, sample_text()).build();
    let loaded = bios.load_executable(&bytes).unwrap();
    assert_eq!(loaded.base, 0x0004_0000);
    assert_eq!(loaded.entry, 0x0004_0000);
    assert_eq!(text_words(&bios, loaded.base), sample_text());

    let err = bios.load_executable(&bytes).unwrap_err();
    assert!(matches!(err, LoadError::DoesNotFit { base: 0x0004_0000, .. }));
}

#[test]
fn failed_load_releases_memory() {
    let mut bios = new_bios();
    let free = bios.sysmem().free_memory();
    let bytes = sample_irx().reloc(0, R_MIPS_GOT16).build();

    let err = bios.load_executable(&bytes).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Relocation(RelocationError::UnsupportedType { raw_type: 9, .. })
    ));
    assert_eq!(bios.sysmem().free_memory(), free);

    let err = bios.load_executable(b"not an elf").unwrap_err();
    assert!(matches!(err, LoadError::ImageFormat(_)));
    assert_eq!(bios.sysmem().free_memory(), free);
}

#[test]
fn oversized_arguments_abort_the_start() {
    let mut bios = new_bios();
    let free = bios.sysmem().free_memory();
    let huge = vec![b'x'; 0x5000];

    let err = bios
        .load_and_start_module("big.irx", &sample_irx().build(), &huge)
        .unwrap_err();
    assert!(matches!(
        err,
        LoadError::Kernel(KernelError::InvalidState(InvalidState::BadAddress(_)))
    ));
    assert!(bios.get_thread_infos().is_empty());
    assert!(bios.get_module_infos().is_empty());
    assert!(!bios.reschedule_pending());
    assert_eq!(bios.sysmem().free_memory(), free);
}

#[test]
fn module_starts_with_argv() {
    let mut bios = new_bios();
    let bytes = sample_irx().with_iopmod("sample", 0x7FF0).build();
    let path = "host:/modules/sample.irx";

    let thread = bios
        .load_and_start_module(path, &bytes, b"-v\0fast\0")
        .unwrap();
    assert_eq!(bios.current_thread_id(), thread);

    let modules = bios.get_module_infos();
    assert_eq!(modules.len(), 1);
    let module = &modules[0];
    assert_eq!(module.name, "sample");
    assert_eq!(module.entry, module.begin);
    assert_eq!(module.gp, 0x7FF0 + module.begin);
    assert_relocated(&bios, module.begin);

    let cpu = bios.cpu();
    assert_eq!(cpu.pc, module.entry);
    assert_eq!(cpu.reg(Register::Gp), module.gp);
    assert_eq!(cpu.reg(Register::A0), 3);
    let argv = cpu.reg(Register::A1);
    let args: Vec<String> = (0..3)
        .map(|i| {
            let ptr = read_word(&bios, argv + i * 4);
            bios.memory().read_cstr(ptr, 64).unwrap()
        })
        .collect();
    assert_eq!(args, vec![path, "-v", "fast"]);
    assert_eq!(read_word(&bios, argv + 12), 0);
    assert_eq!(cpu.reg(Register::Sp) & 0xF, 0);
    assert!(cpu.reg(Register::Sp) < argv);

    assert_eq!(bios.module_at(module.begin + 4).map(|m| m.name.as_str()), Some("sample"));
    assert!(bios.module_at(module.end).is_none());
}

#[test]
fn module_name_falls_back_to_path() {
    let mut bios = new_bios();
    bios.load_and_start_module("cdrom0:\\MODULES\\PADMAN.IRX;1", &sample_irx().build(), &[])
        .unwrap();
    assert_eq!(bios.get_module_infos()[0].name, "PADMAN.IRX");
    assert_eq!(bios.cpu().reg(Register::A0), 1);

    assert_eq!(module_name_from_path("rom0:SIO2MAN"), "SIO2MAN");
    assert_eq!(module_name_from_path("plain.irx"), "plain.irx");
}

#[test]
fn module_start_does_not_preempt_running_thread() {
    let mut bios = new_bios();
    let running = spawn(&mut bios, 10);
    bios.resolve_reschedule();

    let thread = bios
        .load_and_start_module("sample.irx", &sample_irx().build(), &[])
        .unwrap();
    assert_eq!(bios.current_thread_id(), running);
    assert!(bios.reschedule_pending());
    bios.resolve_reschedule();
    assert_eq!(bios.current_thread_id(), running);
    assert!(bios.queue_ids(bios::ThreadQueue::Ready).contains(&thread));
}

#[test]
fn module_loads_from_guest_memory() {
    let mut bios = new_bios();
    let bytes = sample_irx().with_iopmod("inmem", 0).build();
    assert!(bios.memory_mut().write_bytes(SCRATCH, &bytes));

    let thread = bios
        .load_and_start_module_from_memory(SCRATCH, "rom0:INMEM", &[])
        .unwrap();
    assert_eq!(bios.current_thread_id(), thread);
    assert_eq!(bios.get_module_infos()[0].name, "inmem");

    let err = bios
        .load_and_start_module_from_memory(0x0100_0000, "bad", &[])
        .unwrap_err();
    assert!(matches!(err, LoadError::BadGuestAddress(0x0100_0000)));
}
