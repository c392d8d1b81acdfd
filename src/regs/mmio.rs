//! Memory-mapped register bank for real silicon
//!
//! Implements [`RegisterBank`] over the chip's internal bus window with the
//! barrier discipline the weakly-ordered Cortex-M memory model requires:
//! DMB around reads so stale values are never observed, DSB after writes so
//! a trigger write has reached the peripheral before the following poll.

use super::RegisterBank;

/// Register bank backed by a live MMIO window.
pub struct MmioBank {
    base: *mut u8,
}

// The window is a hardware peripheral; exclusive ownership is established
// at construction.
unsafe impl Send for MmioBank {}

impl MmioBank {
    /// Wrap the internal-bus window at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be the chip's register window base and the caller must
    /// ensure exclusive access to it for the lifetime of the bank.
    pub const unsafe fn new(base: *mut u8) -> Self {
        Self { base }
    }
}

impl RegisterBank for MmioBank {
    #[inline(always)]
    fn read(&mut self, addr: u16) -> u8 {
        unsafe {
            cortex_m::asm::dmb();
            let v = core::ptr::read_volatile(self.base.add(addr as usize));
            cortex_m::asm::dmb();
            v
        }
    }

    #[inline(always)]
    fn write(&mut self, addr: u16, val: u8) {
        unsafe {
            cortex_m::asm::dmb();
            core::ptr::write_volatile(self.base.add(addr as usize), val);
            cortex_m::asm::dsb();
        }
    }
}
