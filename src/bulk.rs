//! Bulk data engine: software-DMA IN, CSW emission, deferred bulk-OUT
//!
//! Bulk IN is immediate: the dispatcher stages the payload in the endpoint
//! buffer and [`Bridge::sw_dma_bulk_in`] runs the hardware-assisted send to
//! completion with a bounded wait. Bulk OUT is deferred: the CBW handler
//! only records the target and length, and the two-state machine here is
//! stepped from the main loop because the mass-storage engine is still
//! busy when the handler returns and cannot be re-armed from that context.

use crate::bot::{CswStatus, CSW_SIGNATURE};
use crate::error::Result;
use crate::regs::{
    self, BulkStat, BulkTrig, DmaStat, EpOutCfg0, EpOutCfg1, MscCtl, RegisterBank, SwdmaCtl,
    SwdmaDir, SwdmaMode,
};
use crate::Bridge;

/// Deferred bulk-OUT machine states.
///
/// Per CBW the progression is Idle -> Armed -> Waiting -> Idle; a bus reset
/// or SuperSpeed link failure forces Idle from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BulkOutState {
    /// No bulk-OUT transfer outstanding
    #[default]
    Idle,
    /// CBW 0xE7 accepted; OUT endpoint not yet armed
    Armed,
    /// OUT endpoint armed; waiting for the host payload
    Waiting,
}

/// Context of the one outstanding bulk-OUT transfer.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BulkOutContext {
    state: BulkOutState,
    target: u16,
    length: u8,
}

impl BulkOutContext {
    pub(crate) const fn new() -> Self {
        Self {
            state: BulkOutState::Idle,
            target: 0,
            length: 0,
        }
    }

    pub(crate) fn state(&self) -> BulkOutState {
        self.state
    }

    /// Record a 0xE7 CBW; the main loop arms the endpoint later.
    pub(crate) fn arm(&mut self, target: u16, length: u8) {
        self.target = target;
        self.length = length;
        self.state = BulkOutState::Armed;
    }

    /// Abandon any in-flight transfer (bus reset, link failure, completion).
    pub(crate) fn reset(&mut self) {
        self.state = BulkOutState::Idle;
    }
}

impl<B: RegisterBank> Bridge<B> {
    /// Software-DMA bulk IN: send `len` bytes already staged in the bulk
    /// endpoint buffer, sourced at `addr`.
    ///
    /// No retry exists: if the endpoint-complete bit never appears the
    /// function returns with the transaction unacknowledged and the host
    /// observes a stall/timeout.
    pub(crate) fn sw_dma_bulk_in(&mut self, addr: u16, len: u16) -> Result<()> {
        // A stale completion from a previous transfer would satisfy the
        // wait below immediately.
        if self.bank.is_set(regs::BULK_STAT, BulkStat::EP_COMPLETE.bits()) {
            self.bank.write(regs::BULK_ACK, BulkStat::EP_COMPLETE.bits());
        }

        self.bank.set_bits(regs::SWDMA_MODE, SwdmaMode::ENABLE.bits());
        self.bank.write(regs::SWDMA_SRC_LO, addr as u8);
        self.bank.write(regs::SWDMA_SRC_HI, (addr >> 8) as u8);
        self.bank.write(regs::SWDMA_DIR, SwdmaDir::IN.bits());
        self.bank.write(regs::SWDMA_CTL, SwdmaCtl::XFER.bits());
        self.bank.write(regs::SWDMA_CTL, 0);
        self.bank.write(regs::XFER_LEN, len.min(0xFF) as u8);
        self.bank.write(regs::BULK_TRIG, BulkTrig::SEND.bits());

        let budget = self.budgets.bulk_complete;
        budget.wait_for(|| self.bank.is_set(regs::BULK_STAT, BulkStat::EP_COMPLETE.bits()))?;

        self.bank.write(regs::BULK_ACK, BulkStat::EP_COMPLETE.bits());
        self.bank.clear_bits(regs::SWDMA_MODE, SwdmaMode::ENABLE.bits());
        self.bank.write(regs::XFER_LEN, regs::CSW_LEN);
        Ok(())
    }

    fn emit_csw(&mut self, status: CswStatus, keep_residue: bool) {
        for (i, b) in CSW_SIGNATURE.iter().enumerate() {
            self.bank.write(regs::BULK_BUF + i as u16, *b);
        }
        for i in 0..4u16 {
            let b = self.cbw_tag[i as usize];
            self.bank.write(regs::BULK_BUF + 4 + i, b);
        }
        if !keep_residue {
            for i in 0..4u16 {
                self.bank.write(regs::BULK_BUF + 8 + i, 0);
            }
        }
        self.bank.write(regs::BULK_BUF + 12, status as u8);
        self.bank.write(regs::XFER_LEN, regs::CSW_LEN);
        self.bank.write(regs::BULK_TRIG, BulkTrig::SEND.bits());
        self.rearm_msc_engine();
    }

    /// Build and send the CSW with a zeroed residue field.
    pub(crate) fn send_csw(&mut self, status: CswStatus) {
        self.emit_csw(status, false);
    }

    /// CSW variant for 0xE4: the residue field already carries the read
    /// data and must survive.
    pub(crate) fn send_csw_keep_residue(&mut self, status: CswStatus) {
        self.emit_csw(status, true);
    }

    /// Re-arm the mass-storage engine for the next CBW.
    pub(crate) fn rearm_msc_engine(&mut self) {
        self.bank.write(regs::MSC_SIG, regs::MSC_SIG_PATTERN);
        self.bank.write(regs::MSC_CTL, MscCtl::REARM.bits());
        self.bank.write(regs::MSC_CTL, 0);
    }

    /// Deferred bulk initialization, run from the main loop after
    /// SET_CONFIGURATION: re-arm the engine and restore CSW framing.
    pub(crate) fn bulk_engine_init(&mut self) {
        self.rearm_msc_engine();
        self.bank.write(regs::XFER_LEN, regs::CSW_LEN);
    }

    /// One main-loop step of the deferred bulk-OUT machine.
    pub(crate) fn bulk_out_step(&mut self) -> Result<()> {
        match self.bulk_out.state() {
            BulkOutState::Idle => Ok(()),
            BulkOutState::Armed => {
                self.bank.write(regs::EPOUT_CFG0, EpOutCfg0::ARM.bits());
                self.bank.write(regs::EPOUT_CFG1, EpOutCfg1::ARM.bits());
                self.bulk_out.state = BulkOutState::Waiting;
                Ok(())
            }
            BulkOutState::Waiting => {
                if !self.bank.is_set(regs::BULK_STAT, BulkStat::DATA_AVAIL.bits()) {
                    return Ok(());
                }
                self.bank.write(regs::EPOUT_CFG1, EpOutCfg1::ACK.bits());
                self.bank.set_bits(regs::SWDMA_MODE, SwdmaMode::ENABLE.bits());

                // Same handshake as CBW capture: the staging buffer is not
                // stable until the ready bit appears and the byte count is
                // non-zero.
                self.bank.write(regs::DMA_HANDSHAKE, 0);
                let budget = self.budgets.dma_handshake;
                budget.wait_for(|| self.bank.is_set(regs::DMA_STAT, DmaStat::READY.bits()))?;
                budget.wait_for(|| self.bank.read(regs::DMA_COUNT) != 0)?;

                let target = self.bulk_out.target;
                let length = self.bulk_out.length as u16;
                for i in 0..length {
                    let v = self.bank.read(regs::OUT_STAGING + i);
                    self.bank.write(target.wrapping_add(i), v);
                }

                self.bank.clear_bits(regs::SWDMA_MODE, SwdmaMode::ENABLE.bits());
                self.send_csw(CswStatus::Passed);
                self.bulk_out.reset();
                Ok(())
            }
        }
    }
}
