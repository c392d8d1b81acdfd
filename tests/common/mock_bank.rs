//! Scripted register-bank double
//!
//! Backs the full 64 KiB internal address space with plain memory and
//! scripts the hardware behaviors the protocol engine's handshakes depend
//! on: self-clearing triggers, write-1-to-clear status registers, the
//! DMA-handshake ready bit, and capture of every frame a trigger would
//! have put on the bus.

use usb4_bridge_fw::regs::{self, RegisterBank};

/// Register bank with scripted hardware responses and a write journal.
pub struct MockBank {
    mem: Vec<u8>,
    /// Frames sent from the bulk endpoint buffer (length = XFER_LEN)
    pub bulk_in_frames: Vec<Vec<u8>>,
    /// Frames sent from the EP0 buffer (length = EP0_LEN; ZLPs are empty)
    pub ep0_frames: Vec<Vec<u8>>,
    /// Every `write` in order, for ordering assertions
    pub writes: Vec<(u16, u8)>,
    /// When false, bulk-IN sends never complete (hung endpoint)
    pub auto_complete_bulk: bool,
    /// When false, the DMA handshake ready bit never appears
    pub auto_dma_ready: bool,
}

impl MockBank {
    pub fn new() -> Self {
        let mut mem = vec![0u8; 0x1_0000];
        // Engine powers up ready for a CBW; CSW framing is the hardware
        // default of the transfer-length register.
        mem[regs::MSC_MODE as usize] = regs::MscMode::READY.bits();
        mem[regs::XFER_LEN as usize] = regs::CSW_LEN;
        Self {
            mem,
            bulk_in_frames: Vec::new(),
            ep0_frames: Vec::new(),
            writes: Vec::new(),
            auto_complete_bulk: true,
            auto_dma_ready: true,
        }
    }

    /// Poke a register directly, bypassing the scripted side effects.
    /// Used to inject hardware-driven state (events, captured CBWs).
    pub fn set_reg(&mut self, addr: u16, val: u8) {
        self.mem[addr as usize] = val;
    }

    /// OR bits into a register directly (event injection).
    pub fn or_reg(&mut self, addr: u16, mask: u8) {
        self.mem[addr as usize] |= mask;
    }

    /// Peek without side effects.
    pub fn peek(&self, addr: u16) -> u8 {
        self.mem[addr as usize]
    }

    fn capture(&self, base: u16, len: usize) -> Vec<u8> {
        let base = base as usize;
        self.mem[base..base + len].to_vec()
    }
}

impl RegisterBank for MockBank {
    fn read(&mut self, addr: u16) -> u8 {
        self.mem[addr as usize]
    }

    fn write(&mut self, addr: u16, val: u8) {
        self.writes.push((addr, val));
        match addr {
            regs::EP0_TRIG => {
                if val & regs::Ep0Trig::SEND.bits() != 0 {
                    let len = self.mem[regs::EP0_LEN as usize] as usize;
                    let frame = self.capture(regs::EP0_BUF, len);
                    self.ep0_frames.push(frame);
                }
                if val & regs::Ep0Trig::ZLP.bits() != 0 {
                    self.ep0_frames.push(Vec::new());
                }
                // All EP0 triggers self-clear once latched.
                self.mem[addr as usize] = 0;
            }
            regs::EP0_ACK => {
                self.mem[regs::EP0_PHASE as usize] &= !val;
            }
            regs::BULK_TRIG => {
                if val & regs::BulkTrig::SEND.bits() != 0 {
                    let len = self.mem[regs::XFER_LEN as usize] as usize;
                    let frame = self.capture(regs::BULK_BUF, len);
                    self.bulk_in_frames.push(frame);
                    if self.auto_complete_bulk {
                        self.mem[regs::BULK_STAT as usize] |= regs::BulkStat::EP_COMPLETE.bits();
                    }
                }
                self.mem[addr as usize] = 0;
            }
            regs::BULK_ACK => {
                self.mem[regs::BULK_STAT as usize] &= !val;
            }
            regs::DMA_HANDSHAKE => {
                if val == 0 && self.auto_dma_ready {
                    self.mem[regs::DMA_STAT as usize] |= regs::DmaStat::READY.bits();
                }
            }
            regs::EPOUT_CFG1 => {
                self.mem[addr as usize] = val;
                if val & regs::EpOutCfg1::ACK.bits() != 0 {
                    self.mem[regs::BULK_STAT as usize] &= !regs::BulkStat::DATA_AVAIL.bits();
                }
            }
            regs::IRQ_ACK => {
                self.mem[regs::IRQ_STAT as usize] &= !val;
            }
            regs::LINK_EVENT | regs::LINK_TRAIN => {
                self.mem[addr as usize] &= !val;
            }
            _ => {
                self.mem[addr as usize] = val;
            }
        }
    }
}
