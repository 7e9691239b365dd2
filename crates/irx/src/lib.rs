//! Parsing and relocation of IOP executable images.
//!
//! Images are 32-bit little-endian MIPS ELF files, either fixed executables
//! or IOP relocatable modules (IRX). goblin does the field extraction; this
//! crate picks the loadable segment, reads the IOPMOD metadata section and
//! models relocation entries as typed variants with their arithmetic.

pub mod error;
pub mod image;
pub mod reloc;

pub use error::{ImageError, RelocationError};
pub use image::{ImageKind, IopImage, IopMod, Segment};
pub use reloc::{apply_relocations, LinkedBuffer, Relocation, RelocationKind, WordAccess};
