use core::fmt::Write;
use core::mem::size_of;

use bytemuck::Pod;

/// Segment bits stripped from guest addresses (KSEG0/KSEG1 mirror KUSEG).
pub const PHYSICAL_MASK: u32 = 0x1FFF_FFFF;

// Kernel structs are viewed in place, so host byte order must match the guest.
const _: () = assert!(cfg!(target_endian = "little"), "guest memory views require a little-endian host");

/// Flat guest RAM.
///
/// Backed by 32-bit words so that `#[repr(C)]` structs made of `u32` fields
/// can be borrowed straight out of guest memory: a kernel object and the
/// guest address pointing at it are the same bytes.
pub struct GuestMemory {
    words: Vec<u32>,
}

impl GuestMemory {
    pub fn new(size: usize) -> Self {
        Self {
            words: vec![0u32; size.div_ceil(4)],
        }
    }

    pub fn size(&self) -> usize {
        self.words.len() * 4
    }

    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.words)
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.words)
    }

    /// Host offset for a guest address, if it is backed by RAM.
    pub fn offset(&self, addr: u32, len: usize) -> Option<usize> {
        let start = (addr & PHYSICAL_MASK) as usize;
        let end = start.checked_add(len)?;
        if end > self.size() {
            return None;
        }
        Some(start)
    }

    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    pub fn read_u8(&self, addr: u32) -> Option<u8> {
        let off = self.offset(addr, 1)?;
        Some(self.bytes()[off])
    }

    pub fn read_u16(&self, addr: u32) -> Option<u16> {
        let off = self.offset(addr, 2)?;
        let raw = self.bytes()[off..off + 2].try_into().ok()?;
        Some(u16::from_le_bytes(raw))
    }

    pub fn read_u32(&self, addr: u32) -> Option<u32> {
        let off = self.offset(addr, 4)?;
        let raw = self.bytes()[off..off + 4].try_into().ok()?;
        Some(u32::from_le_bytes(raw))
    }

    pub fn write_u8(&mut self, addr: u32, value: u8) -> bool {
        match self.offset(addr, 1) {
            Some(off) => {
                self.bytes_mut()[off] = value;
                true
            }
            None => false,
        }
    }

    pub fn write_u16(&mut self, addr: u32, value: u16) -> bool {
        self.write_bytes(addr, &value.to_le_bytes())
    }

    pub fn write_u32(&mut self, addr: u32, value: u32) -> bool {
        self.write_bytes(addr, &value.to_le_bytes())
    }

    pub fn read_bytes(&self, addr: u32, len: usize) -> Option<&[u8]> {
        let off = self.offset(addr, len)?;
        Some(&self.bytes()[off..off + len])
    }

    /// Everything from `addr` to the end of RAM.
    pub fn tail(&self, addr: u32) -> Option<&[u8]> {
        let off = self.offset(addr, 0)?;
        Some(&self.bytes()[off..])
    }

    pub fn write_bytes(&mut self, addr: u32, data: &[u8]) -> bool {
        match self.offset(addr, data.len()) {
            Some(off) => {
                self.bytes_mut()[off..off + data.len()].copy_from_slice(data);
                true
            }
            None => false,
        }
    }

    pub fn fill(&mut self, addr: u32, len: usize, value: u8) -> bool {
        match self.offset(addr, len) {
            Some(off) => {
                self.bytes_mut()[off..off + len].fill(value);
                true
            }
            None => false,
        }
    }

    pub fn write_words(&mut self, addr: u32, words: &[u32]) -> bool {
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        self.write_bytes(addr, &bytes)
    }

    /// Reads a NUL-terminated string of at most `max_len` bytes.
    pub fn read_cstr(&self, addr: u32, max_len: usize) -> Option<String> {
        let start = self.offset(addr, 0)?;
        let end = (start + max_len).min(self.size());
        let raw = &self.bytes()[start..end];
        let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Some(String::from_utf8_lossy(&raw[..len]).into_owned())
    }

    /// Borrows a plain-old-data struct stored at `addr`.
    ///
    /// Fails when the range is outside RAM or `addr` is not aligned for `T`.
    pub fn view<T: Pod>(&self, addr: u32) -> Option<&T> {
        let off = self.offset(addr, size_of::<T>())?;
        bytemuck::try_from_bytes(&self.bytes()[off..off + size_of::<T>()]).ok()
    }

    pub fn view_mut<T: Pod>(&mut self, addr: u32) -> Option<&mut T> {
        let off = self.offset(addr, size_of::<T>())?;
        bytemuck::try_from_bytes_mut(&mut self.bytes_mut()[off..off + size_of::<T>()]).ok()
    }

    /// Hex dump of `[start, end)`, sixteen bytes per line.
    pub fn dump(&self, start: u32, end: u32) -> String {
        let mut out = String::new();
        let mut addr = start;
        while addr < end {
            let len = (end - addr).min(16) as usize;
            let Some(line) = self.read_bytes(addr, len) else {
                break;
            };
            let hex: Vec<String> = line.iter().map(|b| format!("{:02x}", b)).collect();
            let ascii: String = line
                .iter()
                .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
                .collect();
            let _ = writeln!(out, "{:08x}  {:<47}  |{}|", addr, hex.join(" "), ascii);
            addr += len as u32;
        }
        out
    }
}

impl core::fmt::Debug for GuestMemory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GuestMemory")
            .field("size", &format_args!("0x{:x}", self.size()))
            .finish()
    }
}
