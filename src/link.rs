//! SuperSpeed link-event and link-training supervision
//!
//! Without this dispatcher the SuperSpeed link dies after 30-75 seconds of
//! idle: the hardware raises per-bit training events that must be serviced
//! and acknowledged, and a training event with the PHY reporting link-down
//! requires forcing the recovery configuration. Link speed changes are not
//! errors but mode transitions; any in-flight deferred work is abandoned
//! because the host re-enumerates.

use crate::regs::{self, Ep0Csr, Ep0Phase, LinkEvent, PhyStat, RegisterBank, TrainEvent};
use crate::Bridge;

/// Process-wide link speed state.
///
/// Written only by the link supervisor, read by every phase/status
/// completion routine to select USB2 vs USB3 sequencing.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LinkState {
    usb3: bool,
}

impl LinkState {
    pub(crate) const fn new(usb3: bool) -> Self {
        Self { usb3 }
    }

    pub(crate) fn is_usb3(&self) -> bool {
        self.usb3
    }

    pub(crate) fn set_usb3(&mut self, usb3: bool) {
        self.usb3 = usb3;
    }
}

impl<B: RegisterBank> Bridge<B> {
    /// SuperSpeed link-up/link-down event handler.
    ///
    /// SS_FAIL drops to USB2 sequencing and abandons all deferred state;
    /// the host will re-enumerate at the fallback speed. Both paths finish
    /// by acknowledging every link-event bit.
    pub(crate) fn on_link_event(&mut self) {
        let ev = LinkEvent::from_bits_truncate(self.bank.read(regs::LINK_EVENT));
        if ev.contains(LinkEvent::SS_FAIL) {
            self.link.set_usb3(false);
            self.reset_deferred_state();
        }
        if ev.contains(LinkEvent::SS_OK) {
            self.link.set_usb3(true);
            #[cfg(feature = "defmt")]
            defmt::trace!("[3]");
        }
        self.bank.write(regs::LINK_EVENT, LinkEvent::all().bits());
    }

    /// Per-bit link-training event dispatch.
    ///
    /// Fixed priority PM > TRAINING > FLAG > RESET_ACK (bit3 > bit0 > bit1
    /// > bit2), each bit acknowledged with its own mask. RESET_ACK is the
    /// one bit whose handler must run before its acknowledgment; do not
    /// reorder without hardware validation.
    pub(crate) fn on_link_training(&mut self) {
        let ev = TrainEvent::from_bits_truncate(self.bank.read(regs::LINK_TRAIN));

        if ev.contains(TrainEvent::PM) {
            self.bank.write(regs::LINK_TRAIN, TrainEvent::PM.bits());
            self.bank.write(regs::LINK_PM, 0);
        }
        if ev.contains(TrainEvent::TRAINING) {
            self.bank.write(regs::LINK_TRAIN, TrainEvent::TRAINING.bits());
            #[cfg(feature = "defmt")]
            defmt::trace!("[T]");
            for i in 0..regs::LTSSM_WORK_LEN {
                self.bank.write(regs::LTSSM_WORK_BASE + i, 0);
            }
            if self.bank.is_set(regs::PHY_STAT, PhyStat::LINK_DOWN.bits()) {
                self.bank.write(regs::LINK_RECOVER, regs::RECOVER_CFG);
            }
        }
        if ev.contains(TrainEvent::FLAG) {
            self.bank.write(regs::LINK_TRAIN, TrainEvent::FLAG.bits());
        }
        if ev.contains(TrainEvent::RESET_ACK) {
            self.bank.write(regs::LINK_RECOVER, 0);
            self.bank.write(regs::LINK_TRAIN, TrainEvent::RESET_ACK.bits());
        }
    }

    /// USB bus reset: EP0 control bits back to their enabled defaults and
    /// every outstanding bulk operation invalidated.
    pub(crate) fn on_bus_reset(&mut self) {
        self.bank.write(regs::EP0_CSR, Ep0Csr::EP0_EN.bits());
        self.bank.write(regs::EP0_ACK, Ep0Phase::all().bits());
        self.reset_deferred_state();
        #[cfg(feature = "defmt")]
        defmt::trace!("[R]");
    }

    /// Unconditional reset of all deferred state (link failure, bus reset).
    pub(crate) fn reset_deferred_state(&mut self) {
        self.flags.clear_all();
        self.bulk_out.reset();
        self.ep0_status_pending = false;
    }
}
