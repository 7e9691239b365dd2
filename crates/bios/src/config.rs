/// Tunables for a kernel instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BiosConfig {
    /// Size of guest RAM in bytes.
    pub ram_size: usize,
    /// Kernel clock rate in Hz, used for time conversions.
    pub clock_frequency: u64,
    /// Stack given to threads created with a zero stack size.
    pub default_stack_size: u32,
    /// Priority of module entry threads.
    pub default_priority: u32,
    /// Log every kernel call at debug level.
    pub verbose: bool,
}

impl Default for BiosConfig {
    fn default() -> Self {
        Self {
            ram_size: 0x0020_0000,
            clock_frequency: 36_864_000,
            default_stack_size: 0x4000,
            default_priority: 64,
            verbose: false,
        }
    }
}
