use log::trace;

use crate::bios::Bios;

impl Bios {
    /// Kernel clock ticks since reset.
    pub fn current_time(&self) -> u64 {
        self.cb().time()
    }

    /// Advances the clock and readies timed sleepers that are due.
    pub fn count_ticks(&mut self, ticks: u32) {
        let now = self.current_time().wrapping_add(ticks as u64);
        self.cb_mut().set_time(now);
        let woken = self.wake_expired_sleepers();
        if woken > 0 {
            trace!("{} thread(s) woken at tick {}", woken, now);
        }
        self.resolve_reschedule();
    }

    pub fn milli_sec_to_clock(&self, milliseconds: u64) -> u64 {
        milliseconds.saturating_mul(self.config.clock_frequency) / 1_000
    }

    pub fn micro_sec_to_clock(&self, microseconds: u64) -> u64 {
        microseconds.saturating_mul(self.config.clock_frequency) / 1_000_000
    }

    pub fn clock_to_micro_sec(&self, clock: u64) -> u64 {
        clock.saturating_mul(1_000_000) / self.config.clock_frequency
    }
}
