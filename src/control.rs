//! EP0 control-transfer phase engine
//!
//! Drives the control endpoint through SETUP -> (DATA) -> STATUS against the
//! hardware phase register. The engine runs synchronously in the interrupt
//! path: control transfers are latency-sensitive and the spins here are
//! short and bounded. USB2 and USB3 electricals complete the status phase
//! differently, so every completion routine branches on the live link state.

use crate::error::Result;
use crate::regs::{self, Ep0Csr, Ep0Phase, Ep0Trig, RegisterBank};
use crate::Bridge;

/// Standard and vendor bRequest codes handled by the dispatcher.
pub mod request {
    /// CLEAR_FEATURE (endpoint halt)
    pub const CLEAR_FEATURE: u8 = 0x01;
    /// SET_ADDRESS
    pub const SET_ADDRESS: u8 = 0x05;
    /// GET_DESCRIPTOR
    pub const GET_DESCRIPTOR: u8 = 0x06;
    /// SET_CONFIGURATION
    pub const SET_CONFIGURATION: u8 = 0x09;
    /// SET_INTERFACE
    pub const SET_INTERFACE: u8 = 0x0B;
    /// Vendor: read a memory block via the control pipe
    pub const VND_MEM_READ: u8 = 0xE4;
    /// Vendor: write one byte via the control pipe
    pub const VND_REG_WRITE: u8 = 0xE5;
    /// Vendor: write a memory block via the control pipe (USB3 only)
    pub const VND_MEM_WRITE: u8 = 0xE6;
}

/// SETUP packet as captured by the controller, one register per byte.
#[derive(Debug, Clone, Copy)]
#[allow(non_snake_case)] // USB spec field names
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetupPacket {
    /// Request type and direction
    pub bmRequestType: u8,
    /// Specific request
    pub bRequest: u8,
    /// wValue, low byte
    pub wValueL: u8,
    /// wValue, high byte
    pub wValueH: u8,
    /// wIndex, low byte
    pub wIndexL: u8,
    /// wIndex, high byte
    pub wIndexH: u8,
    /// wLength, low byte
    pub wLengthL: u8,
    /// wLength, high byte
    pub wLengthH: u8,
}

impl SetupPacket {
    /// Assembled wValue.
    pub fn w_value(&self) -> u16 {
        u16::from_le_bytes([self.wValueL, self.wValueH])
    }

    /// Assembled wIndex.
    pub fn w_index(&self) -> u16 {
        u16::from_le_bytes([self.wIndexL, self.wIndexH])
    }

    /// Assembled wLength.
    pub fn w_length(&self) -> u16 {
        u16::from_le_bytes([self.wLengthL, self.wLengthH])
    }
}

impl<B: RegisterBank> Bridge<B> {
    /// EP0 interrupt entry: SETUP packets are handled immediately; a
    /// STATUS_RDY event finishes the deferred USB2 status phase left over
    /// from the previous IN data phase.
    pub(crate) fn on_ep0_event(&mut self) {
        let phase = Ep0Phase::from_bits_truncate(self.bank.read(regs::EP0_PHASE));
        if phase.contains(Ep0Phase::SETUP_RDY) {
            self.on_setup_phase();
        } else if self.ep0_status_pending && phase.contains(Ep0Phase::STATUS_RDY) {
            self.ep0_status_pending = false;
            self.complete_status_usb2();
        }
    }

    fn read_setup(&mut self) -> SetupPacket {
        let mut raw = [0u8; 8];
        for (i, b) in raw.iter_mut().enumerate() {
            *b = self.bank.read(regs::SETUP_BASE + i as u16);
        }
        SetupPacket {
            bmRequestType: raw[0],
            bRequest: raw[1],
            wValueL: raw[2],
            wValueH: raw[3],
            wIndexL: raw[4],
            wIndexH: raw[5],
            wLengthL: raw[6],
            wLengthH: raw[7],
        }
    }

    /// SETUP phase: capture the packet, acknowledge the phase, dispatch.
    ///
    /// Unrecognized requests (SET_SEL, SET_ISOCH_DELAY, anything else a
    /// host stack may probe with) get the generic no-data acknowledge.
    pub(crate) fn on_setup_phase(&mut self) {
        let setup = self.read_setup();
        self.bank.write(regs::EP0_ACK, Ep0Phase::SETUP_RDY.bits());

        match (setup.bmRequestType, setup.bRequest) {
            (0x00, request::SET_ADDRESS) => {
                self.bank.write(regs::DEV_ADDR, setup.wValueL);
                #[cfg(feature = "defmt")]
                defmt::trace!("[A]");
                self.send_zlp_ack();
            }
            (0x80, request::GET_DESCRIPTOR) => {
                // Abandoned on timeout: the host cancelled the request.
                let _ = self.handle_get_descriptor(setup.wValueH, setup.wValueL, setup.w_length());
            }
            (0x00, request::SET_CONFIGURATION) => {
                // The mass-storage engine cannot be armed from interrupt
                // context while it is still busy; defer to the main loop.
                self.flags.set_need_bulk_init();
                #[cfg(feature = "defmt")]
                defmt::trace!("[C]");
                self.send_zlp_ack();
            }
            (0x01, request::SET_INTERFACE) => {
                self.send_zlp_ack();
            }
            (0x02, request::CLEAR_FEATURE) => {
                // Endpoint halt cleared: the bulk pipe restarts from a clean
                // engine, so re-arm it for the next CBW.
                self.rearm_msc_engine();
                self.send_zlp_ack();
            }
            (0xC0, request::VND_MEM_READ) => {
                let _ = self.vendor_ctrl_read(setup.w_value(), setup.w_length());
            }
            (0x40, request::VND_REG_WRITE) => {
                self.bank.write(setup.w_value(), setup.wIndexL);
                self.send_zlp_ack();
            }
            (0x40, request::VND_MEM_WRITE) if self.link.is_usb3() => {
                let _ = self.vendor_ctrl_write(setup.w_value(), setup.w_length());
            }
            _ => self.send_zlp_ack(),
        }
    }

    /// USB3 status completion: wait for the status phase, run the
    /// status-complete DMA operation, acknowledge.
    pub(crate) fn complete_status_usb3(&mut self) -> Result<()> {
        let budget = self.budgets.control_phase;
        budget.wait_for(|| self.bank.is_set(regs::EP0_PHASE, Ep0Phase::STATUS_RDY.bits()))?;
        self.bank.write(regs::EP0_TRIG, Ep0Trig::STATUS_DMA.bits());
        self.bank.write(regs::EP0_ACK, Ep0Phase::STATUS_RDY.bits());
        Ok(())
    }

    /// USB2 status completion for IN transfers that carried data.
    ///
    /// USB2 electricals split the ack across two hardware events, so this
    /// runs from the interrupt *after* the data phase and performs the
    /// OUT-direction configuration toggle required on that path.
    pub(crate) fn complete_status_usb2(&mut self) {
        self.bank.set_bits(regs::EP0_CSR, Ep0Csr::OUT_TOGGLE.bits());
        self.bank.write(regs::EP0_ACK, Ep0Phase::STATUS_RDY.bits());
        self.bank.clear_bits(regs::EP0_CSR, Ep0Csr::OUT_TOGGLE.bits());
    }

    /// No-data acknowledgment for requests without a data phase.
    pub(crate) fn send_zlp_ack(&mut self) {
        if self.link.is_usb3() {
            let _ = self.complete_status_usb3();
        } else {
            self.bank.write(regs::EP0_LEN, 0);
            self.bank.write(regs::EP0_TRIG, Ep0Trig::ZLP.bits());
            let budget = self.budgets.control_phase;
            let _ = budget.wait_for(|| self.bank.read(regs::EP0_TRIG) & Ep0Trig::ZLP.bits() == 0);
            self.bank.write(regs::EP0_ACK, Ep0Phase::STATUS_RDY.bits());
        }
    }

    /// IN data phase: `len` bytes are already staged in the EP0 buffer.
    ///
    /// Programs length and status, fires the send DMA, spin-waits for the
    /// trigger to self-clear, acknowledges the data phase. USB3 completes
    /// status synchronously; USB2 leaves it pending for the next interrupt.
    pub(crate) fn send_descriptor_data(&mut self, len: u8) -> Result<()> {
        self.bank.write(regs::EP0_LEN, len);
        self.bank.set_bits(regs::EP0_CSR, Ep0Csr::DATA_VALID.bits());
        self.bank.write(regs::EP0_TRIG, Ep0Trig::SEND.bits());
        let budget = self.budgets.control_phase;
        budget.wait_for(|| self.bank.read(regs::EP0_TRIG) & Ep0Trig::SEND.bits() == 0)?;
        self.bank.write(regs::EP0_ACK, Ep0Phase::DATA_RDY.bits());
        if self.link.is_usb3() {
            self.complete_status_usb3()?;
        } else {
            self.ep0_status_pending = true;
        }
        Ok(())
    }

    /// Vendor 0xC0/0xE4: read a memory block through the control pipe.
    fn vendor_ctrl_read(&mut self, addr: u16, w_length: u16) -> Result<()> {
        let len = w_length.min(regs::EP0_BUF_LEN) as u8;
        for i in 0..len as u16 {
            let v = self.bank.read(addr.wrapping_add(i));
            self.bank.write(regs::EP0_BUF + i, v);
        }
        self.send_descriptor_data(len)
    }

    /// Vendor 0x40/0xE6 (USB3 only): write a memory block through the
    /// control pipe. The payload arrives in the DATA-OUT phase.
    fn vendor_ctrl_write(&mut self, addr: u16, w_length: u16) -> Result<()> {
        let budget = self.budgets.control_phase;
        budget.wait_for(|| self.bank.is_set(regs::EP0_PHASE, Ep0Phase::DATA_RDY.bits()))?;
        let len = w_length.min(regs::EP0_BUF_LEN);
        for i in 0..len {
            let v = self.bank.read(regs::EP0_BUF + i);
            self.bank.write(addr.wrapping_add(i), v);
        }
        self.bank.write(regs::EP0_ACK, Ep0Phase::DATA_RDY.bits());
        self.complete_status_usb3()
    }
}
