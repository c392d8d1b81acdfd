//! Register bank abstraction and chip register map
//!
//! The bridge controller exposes its USB device controller, software-DMA
//! engine and SuperSpeed link-training hardware as 8-bit registers in a
//! 16-bit internal address space. All protocol logic goes through the
//! [`RegisterBank`] trait so the state machines can be exercised against a
//! scripted bank in tests instead of real silicon.
//!
//! Bit semantics below follow the bridge controller datasheet conventions:
//! status registers are read-only with write-1-to-clear mirrors, trigger
//! registers self-clear once the hardware has latched the request.

#[cfg(feature = "mmio")]
pub mod mmio;

use bitflags::bitflags;

/// Byte-addressed access to the chip's internal register space.
///
/// `read`/`write` are the only required operations; the bit helpers are
/// conveniences layered on top. Implementations for real hardware must use
/// volatile accesses (see [`mmio`]).
pub trait RegisterBank {
    /// Read one register.
    fn read(&mut self, addr: u16) -> u8;
    /// Write one register.
    fn write(&mut self, addr: u16, val: u8);

    /// Read-modify-write OR of `mask` into a register.
    fn set_bits(&mut self, addr: u16, mask: u8) {
        let v = self.read(addr);
        self.write(addr, v | mask);
    }

    /// Read-modify-write AND-NOT of `mask` into a register.
    fn clear_bits(&mut self, addr: u16, mask: u8) {
        let v = self.read(addr);
        self.write(addr, v & !mask);
    }

    /// True if every bit of `mask` is set.
    fn is_set(&mut self, addr: u16, mask: u8) -> bool {
        self.read(addr) & mask == mask
    }
}

// === EP0 / device controller block ===

/// Boot-time link speed status
pub const SPEED_STAT: u16 = 0x9004;
/// SuperSpeed link event status (write-1-to-clear)
pub const LINK_EVENT: u16 = 0x9008;
/// Top-level interrupt cause
pub const IRQ_STAT: u16 = 0x9010;
/// Interrupt acknowledge (write-1-to-clear mirror of [`IRQ_STAT`])
pub const IRQ_ACK: u16 = 0x9011;
/// EP0 phase status: which control-transfer phase awaits firmware
pub const EP0_PHASE: u16 = 0x9020;
/// EP0 phase acknowledge
pub const EP0_ACK: u16 = 0x9021;
/// IN data-phase byte count
pub const EP0_LEN: u16 = 0x9022;
/// EP0 control/status
pub const EP0_CSR: u16 = 0x9023;
/// EP0 transfer trigger (self-clearing)
pub const EP0_TRIG: u16 = 0x9024;
/// Device address latch
pub const DEV_ADDR: u16 = 0x9025;
/// First byte of the hardware-captured SETUP packet (8 bytes)
pub const SETUP_BASE: u16 = 0x9030;

/// Per-bit link-training event status (write-1-to-clear)
pub const LINK_TRAIN: u16 = 0x91D1;
/// PHY status
pub const PHY_STAT: u16 = 0x91D2;
/// Link recovery configuration
pub const LINK_RECOVER: u16 = 0x91D3;
/// Link power-management control; write 0 to exit U1/U2
pub const LINK_PM: u16 = 0x91D4;
/// LTSSM work area cleared on a training event (12 bytes)
pub const LTSSM_WORK_BASE: u16 = 0x9200;
/// LTSSM work area length
pub const LTSSM_WORK_LEN: u16 = 12;
/// Value written to [`LINK_RECOVER`] to force recovery configuration
pub const RECOVER_CFG: u8 = 0x10;

/// EP0 control data buffer (64 bytes)
pub const EP0_BUF: u16 = 0x9800;
/// EP0 buffer capacity
pub const EP0_BUF_LEN: u16 = 64;

// === Mass-storage / bulk engine block ===

/// Mass-storage engine mode/readiness
pub const MSC_MODE: u16 = 0xA000;
/// Mass-storage engine control (REARM pulse)
pub const MSC_CTL: u16 = 0xA001;
/// Mass-storage engine signature latch
pub const MSC_SIG: u16 = 0xA002;
/// DMA handshake start: write 0, then poll [`DMA_STAT`]
pub const DMA_HANDSHAKE: u16 = 0xA008;
/// DMA handshake status
pub const DMA_STAT: u16 = 0xA009;
/// Bytes auto-DMA'd into the OUT staging buffer
pub const DMA_COUNT: u16 = 0xA00A;
/// Software-DMA mode enable
pub const SWDMA_MODE: u16 = 0xA010;
/// Software-DMA source address, low byte
pub const SWDMA_SRC_LO: u16 = 0xA011;
/// Software-DMA source address, high byte
pub const SWDMA_SRC_HI: u16 = 0xA012;
/// Software-DMA direction
pub const SWDMA_DIR: u16 = 0xA013;
/// Software-DMA transfer control (pulsed)
pub const SWDMA_CTL: u16 = 0xA014;
/// Bulk-IN send trigger (self-clearing)
pub const BULK_TRIG: u16 = 0xA015;
/// Bulk endpoint status
pub const BULK_STAT: u16 = 0xA016;
/// Bulk endpoint status acknowledge (write-1-to-clear)
pub const BULK_ACK: u16 = 0xA017;
/// Bulk-IN frame length; hardware default 13 frames the CSW
pub const XFER_LEN: u16 = 0xA018;
/// OUT endpoint arming, stage 0
pub const EPOUT_CFG0: u16 = 0xA020;
/// OUT endpoint arming/acknowledge, stage 1
pub const EPOUT_CFG1: u16 = 0xA021;

/// Hardware-captured CBW tag (4 bytes)
pub const CBW_TAG_BASE: u16 = 0xA040;
/// Hardware-captured CBW dataTransferLength (4 bytes, little-endian)
pub const CBW_DTL_BASE: u16 = 0xA044;
/// CBW bmCBWFlags
pub const CBW_FLAGS: u16 = 0xA048;
/// CBW bCBWLUN
pub const CBW_LUN: u16 = 0xA049;
/// CBW bCBWCBLength
pub const CBW_CBLEN: u16 = 0xA04A;
/// First byte of the 16-byte command block
pub const CBW_CB_BASE: u16 = 0xA04B;

/// Bulk endpoint data buffer (512 bytes); the CSW is built at its base
pub const BULK_BUF: u16 = 0xB000;
/// Bulk buffer capacity
pub const BULK_BUF_LEN: u16 = 512;
/// OUT staging buffer the hardware auto-DMAs bulk-OUT payloads into
pub const OUT_STAGING: u16 = 0xB800;
/// OUT staging capacity
pub const OUT_STAGING_LEN: u16 = 256;

/// Signature pattern that re-arms the mass-storage engine
pub const MSC_SIG_PATTERN: u8 = 0xA5;
/// CSW length, also the hardware default of [`XFER_LEN`]
pub const CSW_LEN: u8 = 13;

bitflags! {
    /// [`SPEED_STAT`] bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SpeedStat: u8 {
        /// Link came up at SuperSpeed
        const SS_ACTIVE = 1 << 0;
    }
}

bitflags! {
    /// [`LINK_EVENT`] bits (write-1-to-clear)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LinkEvent: u8 {
        /// SuperSpeed link training failed; host will fall back to USB2
        const SS_FAIL = 1 << 0;
        /// SuperSpeed link (re)established
        const SS_OK = 1 << 1;
    }
}

bitflags! {
    /// [`IRQ_STAT`] / [`IRQ_ACK`] bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IrqStat: u8 {
        /// EP0 control-transfer phase event
        const EP0 = 1 << 0;
        /// CBW received on the bulk-OUT endpoint
        const CBW = 1 << 1;
        /// SuperSpeed link event ([`LINK_EVENT`] has bits pending)
        const LINK = 1 << 2;
        /// Link-training sub-event ([`LINK_TRAIN`] has bits pending)
        const TRAIN = 1 << 3;
        /// USB bus reset
        const RESET = 1 << 4;
    }
}

bitflags! {
    /// [`EP0_PHASE`] / [`EP0_ACK`] bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Ep0Phase: u8 {
        /// SETUP packet captured, awaiting firmware
        const SETUP_RDY = 1 << 0;
        /// Data phase ready for firmware action
        const DATA_RDY = 1 << 1;
        /// Status phase ready for firmware action
        const STATUS_RDY = 1 << 2;
    }
}

bitflags! {
    /// [`EP0_CSR`] bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Ep0Csr: u8 {
        /// EP0 buffer holds valid IN data
        const DATA_VALID = 1 << 0;
        /// OUT-direction toggle used by the USB2 status-completion dance
        const OUT_TOGGLE = 1 << 1;
        /// EP0 enabled
        const EP0_EN = 1 << 7;
    }
}

bitflags! {
    /// [`EP0_TRIG`] bits; SEND self-clears when the hardware latches it
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Ep0Trig: u8 {
        /// Start the IN data-phase DMA from the EP0 buffer
        const SEND = 1 << 0;
        /// Run the status-complete DMA operation
        const STATUS_DMA = 1 << 1;
        /// Send a zero-length packet
        const ZLP = 1 << 2;
    }
}

bitflags! {
    /// [`LINK_TRAIN`] bits (write-1-to-clear, one ack write per bit)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TrainEvent: u8 {
        /// Link training / recovery entry
        const TRAINING = 1 << 0;
        /// Informational flag event
        const FLAG = 1 << 1;
        /// Link-reset acknowledgment
        const RESET_ACK = 1 << 2;
        /// U1/U2 power-management transition
        const PM = 1 << 3;
    }
}

bitflags! {
    /// [`PHY_STAT`] bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PhyStat: u8 {
        /// PHY reports the link down
        const LINK_DOWN = 1 << 0;
    }
}

bitflags! {
    /// [`MSC_MODE`] bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MscMode: u8 {
        /// Engine idle and a CBW may be processed
        const READY = 1 << 0;
    }
}

bitflags! {
    /// [`MSC_CTL`] bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MscCtl: u8 {
        /// Re-arm the engine for the next CBW (pulse)
        const REARM = 1 << 0;
    }
}

bitflags! {
    /// [`DMA_STAT`] bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DmaStat: u8 {
        /// Handshake complete, captured CBW/OUT registers are stable
        const READY = 1 << 0;
    }
}

bitflags! {
    /// [`SWDMA_MODE`] bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SwdmaMode: u8 {
        /// Software-DMA mode enabled
        const ENABLE = 1 << 0;
    }
}

bitflags! {
    /// [`SWDMA_DIR`] bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SwdmaDir: u8 {
        /// Device-to-host
        const IN = 1 << 0;
    }
}

bitflags! {
    /// [`SWDMA_CTL`] bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SwdmaCtl: u8 {
        /// Transfer control, pulsed high then low
        const XFER = 1 << 0;
    }
}

bitflags! {
    /// [`BULK_TRIG`] bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BulkTrig: u8 {
        /// Start the bulk-IN send of [`XFER_LEN`] bytes from the bulk buffer
        const SEND = 1 << 0;
    }
}

bitflags! {
    /// [`BULK_STAT`] / [`BULK_ACK`] bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BulkStat: u8 {
        /// Bulk endpoint transfer complete
        const EP_COMPLETE = 1 << 0;
        /// Bulk-OUT data available
        const DATA_AVAIL = 1 << 1;
    }
}

bitflags! {
    /// [`EPOUT_CFG0`] bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EpOutCfg0: u8 {
        /// Arm the OUT endpoint, stage 0
        const ARM = 1 << 0;
    }
}

bitflags! {
    /// [`EPOUT_CFG1`] bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EpOutCfg1: u8 {
        /// Arm the OUT endpoint, stage 1
        const ARM = 1 << 1;
        /// Acknowledge OUT data reception
        const ACK = 1 << 2;
    }
}
