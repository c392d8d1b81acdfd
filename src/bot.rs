//! Vendor command dispatch over SCSI Bulk-Only Transport framing
//!
//! The hardware mass-storage engine captures each Command Block Wrapper
//! into a fixed register window and raises a "CBW received" event; the
//! dispatcher runs from the main loop, performs the DMA handshake that
//! makes the captured fields trustworthy, and dispatches on the vendor
//! opcode in cb\[0\]. Every opcode except bulk-OUT (0xE7) terminates with a
//! Command Status Wrapper inside the same dispatch call; 0xE7 arms the
//! deferred bulk-OUT machine and leaves the CSW to it.

use crate::error::{Error, Result};
use crate::regs::{self, DmaStat, MscMode, RegisterBank};
use crate::Bridge;

/// CSW signature bytes ("USBS").
pub const CSW_SIGNATURE: [u8; 4] = *b"USBS";

/// CSW status byte.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CswStatus {
    /// Command passed
    #[default]
    Passed = 0x00,
    /// Command failed
    Failed = 0x01,
    /// Phase error (defined by BOT, not produced by this engine)
    PhaseError = 0x02,
}

/// Vendor opcodes carried in cb\[0\] of the CBW.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VendorOp {
    /// 0xE4: read up to 4 registers, returned in the CSW residue field
    RegRead,
    /// 0xE5: write one register
    RegWrite,
    /// 0xE6: bulk block read via software-DMA IN
    BlockRead,
    /// 0xE7: bulk block write, completed by the deferred OUT machine
    BlockWrite,
    /// 0xE8: no-data acknowledge
    NoData,
    /// Anything else; always answered with CSW status 1
    Unknown(u8),
}

impl From<u8> for VendorOp {
    fn from(op: u8) -> Self {
        match op {
            0xE4 => Self::RegRead,
            0xE5 => Self::RegWrite,
            0xE6 => Self::BlockRead,
            0xE7 => Self::BlockWrite,
            0xE8 => Self::NoData,
            other => Self::Unknown(other),
        }
    }
}

/// Command Block Wrapper as captured by the hardware.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Cbw {
    /// Host tag, echoed in the CSW
    pub tag: [u8; 4],
    /// dCBWDataTransferLength
    pub data_transfer_length: u32,
    /// bmCBWFlags (bit7: direction)
    pub flags: u8,
    /// bCBWLUN
    pub lun: u8,
    /// bCBWCBLength
    pub cb_len: u8,
    /// Command block: opcode, parameter, address bytes
    pub cb: [u8; 16],
}

impl Cbw {
    /// Vendor opcode.
    pub fn opcode(&self) -> u8 {
        self.cb[0]
    }

    /// Size/value/length parameter byte.
    pub fn param(&self) -> u8 {
        self.cb[1]
    }

    /// Target address. cb\[2\] carries bits 16..23 of the original encoding
    /// and is ignored by the 64 KiB register bank.
    pub fn address(&self) -> u16 {
        u16::from_be_bytes([self.cb[3], self.cb[4]])
    }
}

impl<B: RegisterBank> Bridge<B> {
    fn read_cbw(&mut self) -> Cbw {
        let mut tag = [0u8; 4];
        for (i, b) in tag.iter_mut().enumerate() {
            *b = self.bank.read(regs::CBW_TAG_BASE + i as u16);
        }
        let mut dtl = [0u8; 4];
        for (i, b) in dtl.iter_mut().enumerate() {
            *b = self.bank.read(regs::CBW_DTL_BASE + i as u16);
        }
        let mut cb = [0u8; 16];
        for (i, b) in cb.iter_mut().enumerate() {
            *b = self.bank.read(regs::CBW_CB_BASE + i as u16);
        }
        Cbw {
            tag,
            data_transfer_length: u32::from_le_bytes(dtl),
            flags: self.bank.read(regs::CBW_FLAGS),
            lun: self.bank.read(regs::CBW_LUN),
            cb_len: self.bank.read(regs::CBW_CBLEN),
            cb,
        }
    }

    /// Process the CBW the hardware has captured.
    ///
    /// Runs only while the engine reports ready; the captured registers are
    /// not stable until the fixed DMA handshake (write 0, poll ready)
    /// completes. The tag is moved to its holding area first because the
    /// endpoint buffer that carried it is about to be overwritten by
    /// response bytes.
    pub(crate) fn handle_cbw(&mut self) -> Result<()> {
        if !self.bank.is_set(regs::MSC_MODE, MscMode::READY.bits()) {
            return Err(Error::InvalidState);
        }

        self.bank.write(regs::DMA_HANDSHAKE, 0);
        let budget = self.budgets.dma_handshake;
        budget.wait_for(|| self.bank.is_set(regs::DMA_STAT, DmaStat::READY.bits()))?;

        let cbw = self.read_cbw();
        self.cbw_tag = cbw.tag;

        #[cfg(feature = "defmt")]
        defmt::trace!("[CBW:{=u8:X}]", cbw.opcode());

        match VendorOp::from(cbw.opcode()) {
            VendorOp::RegRead => {
                let size = cbw.param().min(4);
                let addr = cbw.address();
                // Residue doubles as the data return channel here.
                for i in 0..4u16 {
                    let v = if i < size as u16 {
                        self.bank.read(addr.wrapping_add(i))
                    } else {
                        0
                    };
                    self.bank.write(regs::BULK_BUF + 8 + i, v);
                }
                self.send_csw_keep_residue(CswStatus::Passed);
            }
            VendorOp::RegWrite => {
                self.bank.write(cbw.address(), cbw.param());
                self.send_csw(CswStatus::Passed);
            }
            VendorOp::BlockRead => {
                let len: u16 = match cbw.param() {
                    0 => 64,
                    n => n as u16,
                };
                let addr = cbw.address();
                for i in 0..len {
                    let v = self.bank.read(addr.wrapping_add(i));
                    self.bank.write(regs::BULK_BUF + i, v);
                }
                self.sw_dma_bulk_in(addr, len)?;
                self.send_csw(CswStatus::Passed);
            }
            VendorOp::BlockWrite => {
                // No CSW yet: arming the OUT endpoint from this handler
                // races the engine's busy state; the main loop arms it on
                // its next iteration and emits the CSW after the data lands.
                self.bulk_out.arm(cbw.address(), cbw.param());
            }
            VendorOp::NoData => {
                self.send_csw(CswStatus::Passed);
            }
            VendorOp::Unknown(_) => {
                self.send_csw(CswStatus::Failed);
            }
        }
        Ok(())
    }
}
