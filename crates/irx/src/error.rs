use core::fmt;

/// Malformed or unsupported executable image.
#[derive(Debug)]
pub enum ImageError {
    Parse(goblin::error::Error),
    NotElf32,
    BigEndian,
    UnsupportedMachine(u16),
    UnsupportedType(u16),
    NoLoadableSegment,
    MultipleLoadableSegments,
    SegmentOutOfBounds { offset: u64, size: u64 },
    MalformedSection { index: usize, reason: &'static str },
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "failed to parse ELF image: {}", err),
            Self::NotElf32 => f.write_str("image is not a 32-bit ELF"),
            Self::BigEndian => f.write_str("image is big-endian"),
            Self::UnsupportedMachine(machine) => write!(f, "unsupported machine type {}", machine),
            Self::UnsupportedType(kind) => write!(f, "unsupported ELF type 0x{:04x}", kind),
            Self::NoLoadableSegment => f.write_str("no loadable program header found"),
            Self::MultipleLoadableSegments => f.write_str("multiple loadable program headers found"),
            Self::SegmentOutOfBounds { offset, size } => write!(
                f,
                "loadable segment [0x{:x}, +0x{:x}) lies outside the image",
                offset, size
            ),
            Self::MalformedSection { index, reason } => {
                write!(f, "section {}: {}", index, reason)
            }
        }
    }
}

impl std::error::Error for ImageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<goblin::error::Error> for ImageError {
    fn from(err: goblin::error::Error) -> Self {
        Self::Parse(err)
    }
}

/// A relocation entry that cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelocationError {
    UnsupportedType { offset: u32, raw_type: u32 },
    OutOfRange { offset: u32 },
    UnpairedHi16 { offset: u32 },
    BadTargetSection { section: usize, target: usize },
}

impl fmt::Display for RelocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedType { offset, raw_type } => write!(
                f,
                "unsupported relocation type {} at 0x{:08x}",
                raw_type, offset
            ),
            Self::OutOfRange { offset } => {
                write!(f, "relocation at 0x{:08x} is outside its section", offset)
            }
            Self::UnpairedHi16 { offset } => {
                write!(f, "HI16 relocation at 0x{:08x} has no matching LO16", offset)
            }
            Self::BadTargetSection { section, target } => write!(
                f,
                "relocation section {} targets missing section {}",
                section, target
            ),
        }
    }
}

impl std::error::Error for RelocationError {}
