use irx::{apply_relocations, IopImage, IopMod, WordAccess};
use log::{debug, info, warn};
use mips::memory::PHYSICAL_MASK;
use mips::{GuestMemory, Register};
use types::ModuleInfo;

use crate::bios::Bios;
use crate::control_block::{CONTROL_BLOCK_END, CONTROL_BLOCK_START};
use crate::error::LoadError;
use crate::thread::ThreadParams;

/// Where an image ended up in guest memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedImage {
    pub base: u32,
    /// One past the last byte, including zero-filled memory.
    pub end: u32,
    /// Entry point at its final address.
    pub entry: u32,
    /// Address the image was linked for.
    pub link_base: u32,
}

impl LoadedImage {
    /// Amount every link-time address moved by.
    pub fn delta(&self) -> u32 {
        self.base.wrapping_sub(self.link_base)
    }
}

/// Placed image bytes seen through their link-time addresses.
struct GuestWindow<'m> {
    memory: &'m mut GuestMemory,
    link_base: u32,
    base: u32,
    size: u32,
}

impl GuestWindow<'_> {
    fn translate(&self, address: u32) -> Option<u32> {
        let offset = address.checked_sub(self.link_base)?;
        (offset.checked_add(4)? <= self.size).then(|| self.base + offset)
    }
}

impl WordAccess for GuestWindow<'_> {
    fn read_word(&self, address: u32) -> Option<u32> {
        self.memory.read_u32(self.translate(address)?)
    }

    fn write_word(&mut self, address: u32, value: u32) -> bool {
        match self.translate(address) {
            Some(guest) => self.memory.write_u32(guest, value),
            None => false,
        }
    }
}

/// Rejects a range that would overwrite the kernel control block.
fn check_outside_kernel(base: u32, size: u32) -> Result<(), LoadError> {
    let start = base & PHYSICAL_MASK;
    let overlaps = match start.checked_add(size) {
        Some(end) => start < CONTROL_BLOCK_END && end > CONTROL_BLOCK_START,
        None => true,
    };
    if overlaps {
        return Err(LoadError::KernelRegion { base, size });
    }
    Ok(())
}

/// Module name derived from a load path: the file name after the last
/// `/`, `\` or `:`, without a `;N` version suffix.
pub fn module_name_from_path(path: &str) -> String {
    let file = path.rsplit(['/', '\\', ':']).next().unwrap_or(path);
    file.split(';').next().unwrap_or(file).to_string()
}

impl Bios {
    /// Loads an image into memory obtained from the allocator: relocatable
    /// images go wherever there is room, executables at their link address.
    pub fn load_executable(&mut self, bytes: &[u8]) -> Result<LoadedImage, LoadError> {
        let image = IopImage::parse(bytes)?;
        self.load_image(&image)
    }

    /// Loads an image at `base`, reserving that range from the allocator.
    pub fn load_executable_at(&mut self, bytes: &[u8], base: u32) -> Result<LoadedImage, LoadError> {
        let image = IopImage::parse(bytes)?;
        let size = image.segment().mem_size.max(1);
        check_outside_kernel(base, size)?;
        self.sysmem
            .allocate_at(base, size)
            .ok_or(LoadError::DoesNotFit { base, size })?;
        self.place_image(&image, base).inspect_err(|_| {
            self.sysmem.free(base);
        })
    }

    fn load_image(&mut self, image: &IopImage<'_>) -> Result<LoadedImage, LoadError> {
        let segment = image.segment();
        let size = segment.mem_size.max(1);
        let base = if image.is_relocatable() {
            self.sysmem
                .allocate(size)
                .ok_or(LoadError::OutOfMemory { size })?
        } else {
            check_outside_kernel(segment.vaddr, size)?;
            self.sysmem
                .allocate_at(segment.vaddr, size)
                .ok_or(LoadError::DoesNotFit {
                    base: segment.vaddr,
                    size,
                })?
        };
        self.place_image(image, base).inspect_err(|_| {
            self.sysmem.free(base);
        })
    }

    fn place_image(&mut self, image: &IopImage<'_>, base: u32) -> Result<LoadedImage, LoadError> {
        let segment = image.segment();
        check_outside_kernel(base, segment.mem_size.max(1))?;
        if self.memory.offset(base, segment.mem_size as usize).is_none() {
            return Err(LoadError::DoesNotFit {
                base,
                size: segment.mem_size,
            });
        }
        self.memory.write_bytes(base, image.segment_data());
        let bss_size = (segment.mem_size - segment.file_size) as usize;
        self.memory.fill(base + segment.file_size, bss_size, 0);

        if image.is_relocatable() || base != segment.vaddr {
            self.relocate_executable(image, base)?;
        }

        let loaded = LoadedImage {
            base,
            end: base + segment.mem_size,
            entry: image.entry().wrapping_sub(segment.vaddr).wrapping_add(base),
            link_base: segment.vaddr,
        };
        info!(
            "image loaded at 0x{:08x}-0x{:08x}, entry 0x{:08x}",
            loaded.base, loaded.end, loaded.entry
        );
        Ok(loaded)
    }

    /// Applies the image's REL entries to its bytes placed at `base`.
    /// Returns how many words were patched.
    pub fn relocate_executable(&mut self, image: &IopImage<'_>, base: u32) -> Result<usize, LoadError> {
        let segment = image.segment();
        let relocations = image.relocations()?;
        for reloc in &relocations {
            if reloc.kind != irx::RelocationKind::None && !segment.contains(reloc.offset, 4) {
                return Err(irx::RelocationError::OutOfRange {
                    offset: reloc.offset,
                }
                .into());
            }
        }
        let mut window = GuestWindow {
            memory: &mut self.memory,
            link_base: segment.vaddr,
            base,
            size: segment.mem_size,
        };
        let delta = base.wrapping_sub(segment.vaddr);
        let patched = apply_relocations(&mut window, &relocations, delta)?;
        debug!("{} words relocated by 0x{:08x}", patched, delta);
        Ok(patched)
    }

    /// Loads a module, creates its entry thread at the default priority and
    /// starts it with `argc`/`argv` built from `path` and the NUL-separated
    /// `args`. Returns the thread id.
    pub fn load_and_start_module(
        &mut self,
        path: &str,
        bytes: &[u8],
        args: &[u8],
    ) -> Result<u32, LoadError> {
        let image = IopImage::parse(bytes)?;
        let iopmod = image.iopmod()?;
        let loaded = self.load_image(&image)?;
        let thread_id = self
            .start_module(path, &image, iopmod.as_ref(), &loaded, args)
            .inspect_err(|_| {
                self.sysmem.free(loaded.base);
            })?;

        if self.current_thread_id() == 0 && !self.in_interrupt() {
            self.reschedule();
        }
        Ok(thread_id)
    }

    /// [`Bios::load_and_start_module`] for an image already in guest memory.
    pub fn load_and_start_module_from_memory(
        &mut self,
        address: u32,
        path: &str,
        args: &[u8],
    ) -> Result<u32, LoadError> {
        let bytes = self
            .memory
            .tail(address)
            .ok_or(LoadError::BadGuestAddress(address))?
            .to_vec();
        self.load_and_start_module(path, &bytes, args)
    }

    fn start_module(
        &mut self,
        path: &str,
        image: &IopImage<'_>,
        iopmod: Option<&IopMod>,
        loaded: &LoadedImage,
        args: &[u8],
    ) -> Result<u32, LoadError> {
        let name = iopmod
            .map(|iopmod| iopmod.name.clone())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| module_name_from_path(path));
        let gp = iopmod.map_or(0, |iopmod| iopmod.gp.wrapping_add(loaded.delta()));

        let params = ThreadParams::new(self.config.default_priority, loaded.entry);
        let thread_id = self.create_thread(params)?;
        self.thread_mut(thread_id).gp = gp;
        let reschedule_was_pending = self.reschedule_pending();
        if let Err(err) = self.start_with_argv(thread_id, path, args) {
            if let Err(delete_err) = self.delete_thread(thread_id) {
                warn!("dropping entry thread {} failed: {}", thread_id, delete_err);
            }
            // Nothing changed for the threads that were already there.
            if !reschedule_was_pending {
                self.cb_mut().reschedule_needed = 0;
            }
            return Err(err);
        }

        let segment = image.segment();
        let record = ModuleInfo {
            name,
            begin: loaded.base,
            end: loaded.end,
            entry: loaded.entry,
            gp,
            text_size: iopmod.map_or(segment.file_size, |iopmod| iopmod.text_size),
            data_size: iopmod.map_or(0, |iopmod| iopmod.data_size),
            bss_size: iopmod.map_or(segment.mem_size - segment.file_size, |iopmod| iopmod.bss_size),
        };
        info!(
            "module '{}' started: thread {}, 0x{:08x}-0x{:08x}",
            record.name, thread_id, record.begin, record.end
        );
        self.loaded_modules.push(record);
        Ok(thread_id)
    }

    fn start_with_argv(&mut self, thread_id: u32, path: &str, args: &[u8]) -> Result<(), LoadError> {
        self.start_thread(thread_id, None)?;

        let mut strings = Vec::with_capacity(path.len() + 1 + args.len() + 1);
        let mut offsets = vec![0u32];
        strings.extend_from_slice(path.as_bytes());
        strings.push(0);
        for arg in args.split(|&b| b == 0).filter(|arg| !arg.is_empty()) {
            offsets.push(strings.len() as u32);
            strings.extend_from_slice(arg);
            strings.push(0);
        }
        let strings_addr = self.push_to_thread_stack(thread_id, &strings)?;

        let argv: Vec<u8> = offsets
            .iter()
            .map(|offset| strings_addr + offset)
            .chain(std::iter::once(0))
            .flat_map(u32::to_le_bytes)
            .collect();
        let argv_addr = self.push_to_thread_stack(thread_id, &argv)?;
        self.align_thread_stack(thread_id);

        let context = &mut self.thread_mut(thread_id).context;
        context.gpr[Register::A0.index()] = offsets.len() as u32;
        context.gpr[Register::A1.index()] = argv_addr;
        Ok(())
    }

    /// Descriptors of every module started so far, in load order.
    pub fn get_module_infos(&self) -> Vec<ModuleInfo> {
        self.loaded_modules.clone()
    }

    /// The loaded module containing `address`.
    pub fn module_at(&self, address: u32) -> Option<&ModuleInfo> {
        self.loaded_modules.iter().find(|module| module.contains(address))
    }
}
