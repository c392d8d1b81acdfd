//! ISR / main-loop coordination
//!
//! The interrupt handler acknowledges hardware and sets flags; the main
//! loop does everything that can block. Each flag is single-producer,
//! single-consumer: the ISR sets it, the main loop takes it. On this core
//! the atomics are not strictly required, but they state the contract at
//! the interrupt boundary instead of leaving it implicit.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::bulk::BulkOutState;
use crate::regs::{self, IrqStat, RegisterBank};
use crate::Bridge;

/// Flags handed from interrupt context to the main loop.
pub struct DeferredFlags {
    need_bulk_init: AtomicBool,
    need_cbw_process: AtomicBool,
}

impl DeferredFlags {
    pub(crate) const fn new() -> Self {
        Self {
            need_bulk_init: AtomicBool::new(false),
            need_cbw_process: AtomicBool::new(false),
        }
    }

    pub(crate) fn set_need_bulk_init(&self) {
        self.need_bulk_init.store(true, Ordering::Release);
    }

    pub(crate) fn set_need_cbw_process(&self) {
        self.need_cbw_process.store(true, Ordering::Release);
    }

    fn take(flag: &AtomicBool) -> bool {
        flag.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn take_need_bulk_init(&self) -> bool {
        Self::take(&self.need_bulk_init)
    }

    pub(crate) fn take_need_cbw_process(&self) -> bool {
        Self::take(&self.need_cbw_process)
    }

    pub(crate) fn clear_all(&self) {
        self.need_bulk_init.store(false, Ordering::Release);
        self.need_cbw_process.store(false, Ordering::Release);
    }
}

impl<B: RegisterBank> Bridge<B> {
    /// Interrupt entry point: wire this into the USB interrupt vector.
    ///
    /// Runs to completion, never blocks on bulk work. Control transfers
    /// are driven synchronously from here; everything else becomes a flag
    /// for [`Bridge::poll_once`]. Bus reset is serviced first so the other
    /// handlers see post-reset state.
    pub fn isr(&mut self) {
        let irq = IrqStat::from_bits_truncate(self.bank.read(regs::IRQ_STAT));

        if irq.contains(IrqStat::RESET) {
            self.on_bus_reset();
        }
        if irq.contains(IrqStat::LINK) {
            self.on_link_event();
        }
        if irq.contains(IrqStat::TRAIN) {
            self.on_link_training();
        }
        if irq.contains(IrqStat::EP0) {
            self.on_ep0_event();
        }
        if irq.contains(IrqStat::CBW) {
            self.flags.set_need_cbw_process();
        }

        self.bank.write(regs::IRQ_ACK, irq.bits());
    }

    /// One iteration of the main polling loop; call forever from `main`.
    ///
    /// Ordering matters twice here. The bulk-OUT step runs before CBW
    /// processing so a freshly armed 0xE7 is not advanced until the next
    /// iteration, giving the mass-storage engine time to leave its busy
    /// state. And a pending CBW is only taken while the bulk-OUT machine
    /// is idle, which keeps exactly one command outstanding.
    pub fn poll_once(&mut self) {
        if self.flags.take_need_bulk_init() {
            self.bulk_engine_init();
        }

        if let Err(_e) = self.bulk_out_step() {
            // Abandoned; the host's own timeout recovers the transaction.
            #[cfg(feature = "defmt")]
            defmt::debug!("bulk-out step abandoned: {}", _e);
        }

        if self.bulk_out_state() == BulkOutState::Idle && self.flags.take_need_cbw_process() {
            if let Err(_e) = self.handle_cbw() {
                #[cfg(feature = "defmt")]
                defmt::debug!("cbw abandoned: {}", _e);
            }
        }
    }
}
