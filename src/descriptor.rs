//! Enumeration descriptor tables and GET_DESCRIPTOR handling
//!
//! All descriptors are static byte tables; the device descriptor carries
//! USB3 values natively and is patched down for a USB2 link, and the
//! configuration descriptor gains SuperSpeed Endpoint Companion descriptors
//! only when the SuperSpeed link is up. Responses are always truncated to
//! the host-requested length.

use heapless::Vec;

use crate::error::Result;
use crate::regs::{self, RegisterBank};
use crate::Bridge;

/// Descriptor type codes from the USB specification.
pub mod desc_type {
    /// Device descriptor
    pub const DEVICE: u8 = 0x01;
    /// Configuration descriptor
    pub const CONFIGURATION: u8 = 0x02;
    /// String descriptor
    pub const STRING: u8 = 0x03;
    /// Binary Object Store descriptor
    pub const BOS: u8 = 0x0F;
}

/// Largest descriptor the engine serves; bounded by the EP0 buffer.
pub const MAX_DESCRIPTOR_LEN: usize = regs::EP0_BUF_LEN as usize;

const DEVICE_DESC: [u8; 18] = [
    0x12,       // bLength
    0x01,       // bDescriptorType (DEVICE)
    0x20, 0x03, // bcdUSB (3.2)
    0x00,       // bDeviceClass (defined at interface level)
    0x00,       // bDeviceSubClass
    0x00,       // bDeviceProtocol
    0x09,       // bMaxPacketSize0 (2^9 = 512)
    0x09, 0x12, // idVendor (0x1209)
    0x10, 0x73, // idProduct (0x7310)
    0x00, 0x01, // bcdDevice (1.0)
    0x01,       // iManufacturer
    0x02,       // iProduct
    0x03,       // iSerialNumber
    0x01,       // bNumConfigurations
];

const BOS_DESC: [u8; 22] = [
    0x05,       // bLength
    0x0F,       // bDescriptorType (BOS)
    0x16, 0x00, // wTotalLength (22)
    0x02,       // bNumDeviceCaps
    // USB 2.0 Extension capability
    0x07,       // bLength
    0x10,       // bDescriptorType (DEVICE CAPABILITY)
    0x02,       // bDevCapabilityType (USB 2.0 EXTENSION)
    0x02, 0x00, 0x00, 0x00, // bmAttributes (LPM supported)
    // SuperSpeed USB Device Capability
    0x0A,       // bLength
    0x10,       // bDescriptorType (DEVICE CAPABILITY)
    0x03,       // bDevCapabilityType (SUPERSPEED USB)
    0x00,       // bmAttributes
    0x0E, 0x00, // wSpeedsSupported (FS/HS/SS)
    0x01,       // bFunctionalitySupport (full speed and up)
    0x0A,       // bU1DevExitLat (10 us)
    0xFF, 0x07, // wU2DevExitLat (2047 us)
];

const STRING0: [u8; 4] = [0x04, 0x03, 0x09, 0x04]; // langid 0x0409
const STRING_MFR: [u8; 10] = [
    0x0A, 0x03, b't', 0, b'i', 0, b'n', 0, b'y', 0,
];
const STRING_PRODUCT: [u8; 8] = [0x08, 0x03, b'u', 0, b's', 0, b'b', 0];
const STRING_SERIAL: [u8; 8] = [0x08, 0x03, b'0', 0, b'0', 0, b'1', 0];
const STRING_EMPTY: [u8; 2] = [0x02, 0x03];

/// Device descriptor for the current link speed.
///
/// The table is natively USB3; a USB2 link patches bcdUSB down to 2.1 and
/// widens bMaxPacketSize0 from the 2^n encoding to a plain 64.
pub fn device_descriptor(usb3: bool) -> [u8; 18] {
    let mut d = DEVICE_DESC;
    if !usb3 {
        d[2] = 0x10; // bcdUSB 2.1
        d[3] = 0x02;
        d[7] = 0x40; // bMaxPacketSize0 64
    }
    d
}

/// Configuration bundle: one vendor-class interface with the two bulk
/// endpoints, plus SuperSpeed companion descriptors on a USB3 link.
pub fn config_descriptor(usb3: bool) -> Vec<u8, MAX_DESCRIPTOR_LEN> {
    let mut d: Vec<u8, MAX_DESCRIPTOR_LEN> = Vec::new();
    let total: u16 = if usb3 { 44 } else { 32 };
    let max_packet: [u8; 2] = if usb3 { [0x00, 0x04] } else { [0x00, 0x02] };

    // Capacity is MAX_DESCRIPTOR_LEN and total <= 44; the pushes cannot fail.
    let _ = d.extend_from_slice(&[
        0x09,       // bLength
        0x02,       // bDescriptorType (CONFIGURATION)
        total as u8,
        (total >> 8) as u8,
        0x01,       // bNumInterfaces
        0x01,       // bConfigurationValue
        0x00,       // iConfiguration
        0x80,       // bmAttributes (bus powered)
        0x32,       // bMaxPower
    ]);
    let _ = d.extend_from_slice(&[
        0x09, // bLength
        0x04, // bDescriptorType (INTERFACE)
        0x00, // bInterfaceNumber
        0x00, // bAlternateSetting
        0x02, // bNumEndpoints
        0xFF, // bInterfaceClass (vendor)
        0x00, // bInterfaceSubClass
        0x00, // bInterfaceProtocol
        0x00, // iInterface
    ]);
    let _ = d.extend_from_slice(&[
        0x07, 0x05, 0x81, 0x02, max_packet[0], max_packet[1], 0x00, // EP1 IN bulk
    ]);
    if usb3 {
        let _ = d.extend_from_slice(&[0x06, 0x30, 0x00, 0x00, 0x00, 0x00]);
    }
    let _ = d.extend_from_slice(&[
        0x07, 0x05, 0x02, 0x02, max_packet[0], max_packet[1], 0x00, // EP2 OUT bulk
    ]);
    if usb3 {
        let _ = d.extend_from_slice(&[0x06, 0x30, 0x00, 0x00, 0x00, 0x00]);
    }
    d
}

/// BOS descriptor (USB 2.0 Extension + SuperSpeed capability).
pub fn bos_descriptor() -> &'static [u8] {
    &BOS_DESC
}

/// String descriptor by index; unknown indices fall back to the empty
/// string rather than stalling.
pub fn string_descriptor(index: u8) -> &'static [u8] {
    match index {
        0 => &STRING0,
        1 => &STRING_MFR,
        2 => &STRING_PRODUCT,
        3 => &STRING_SERIAL,
        _ => &STRING_EMPTY,
    }
}

impl<B: RegisterBank> Bridge<B> {
    /// GET_DESCRIPTOR: stage the selected table in the EP0 buffer and send
    /// `min(wLength, nativeLength)` bytes of it.
    ///
    /// If the data-phase-ready bit never appears within the poll budget the
    /// host has cancelled the request; the routine returns without sending.
    pub(crate) fn handle_get_descriptor(
        &mut self,
        dtype: u8,
        index: u8,
        w_length: u16,
    ) -> Result<()> {
        let budget = self.budgets.control_phase;
        budget.wait_for(|| {
            self.bank
                .is_set(regs::EP0_PHASE, regs::Ep0Phase::DATA_RDY.bits())
        })?;

        let mut table: Vec<u8, MAX_DESCRIPTOR_LEN> = Vec::new();
        match dtype {
            desc_type::DEVICE => {
                let _ = table.extend_from_slice(&device_descriptor(self.link.is_usb3()));
            }
            desc_type::CONFIGURATION => {
                table = config_descriptor(self.link.is_usb3());
            }
            desc_type::STRING => {
                let _ = table.extend_from_slice(string_descriptor(index));
            }
            desc_type::BOS => {
                let _ = table.extend_from_slice(bos_descriptor());
            }
            _ => {
                self.send_zlp_ack();
                return Ok(());
            }
        }

        let len = (w_length as usize).min(table.len());
        for (i, b) in table[..len].iter().enumerate() {
            self.bank.write(regs::EP0_BUF + i as u16, *b);
        }
        self.send_descriptor_data(len as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_descriptor_speed_patching() {
        let ss = device_descriptor(true);
        assert_eq!(&ss[2..4], &[0x20, 0x03]);
        assert_eq!(ss[7], 0x09);

        let hs = device_descriptor(false);
        assert_eq!(&hs[2..4], &[0x10, 0x02]);
        assert_eq!(hs[7], 0x40);
        // Speed patching never touches identity fields.
        assert_eq!(&hs[8..12], &ss[8..12]);
    }

    #[test]
    fn config_descriptor_lengths_match_total() {
        let ss = config_descriptor(true);
        assert_eq!(ss.len(), 44);
        assert_eq!(u16::from_le_bytes([ss[2], ss[3]]), 44);

        let hs = config_descriptor(false);
        assert_eq!(hs.len(), 32);
        assert_eq!(u16::from_le_bytes([hs[2], hs[3]]), 32);
        // No SuperSpeed companion descriptors on a USB2 link.
        assert!(!hs.windows(2).any(|w| w == [0x06, 0x30]));
    }

    #[test]
    fn config_descriptor_has_two_bulk_endpoints() {
        let d = config_descriptor(true);
        let eps: std::vec::Vec<&[u8]> = d
            .windows(4)
            .filter(|w| w[0] == 0x07 && w[1] == 0x05)
            .collect();
        assert_eq!(eps.len(), 2);
        assert_eq!(eps[0][2], 0x81); // IN
        assert_eq!(eps[1][2], 0x02); // OUT
        assert!(eps.iter().all(|e| e[3] == 0x02)); // bulk
    }

    #[test]
    fn bos_descriptor_is_22_bytes_with_two_caps() {
        let bos = bos_descriptor();
        assert_eq!(bos.len(), 22);
        assert_eq!(u16::from_le_bytes([bos[2], bos[3]]), 22);
        assert_eq!(bos[4], 2);
    }

    #[test]
    fn unknown_string_index_is_empty_string() {
        assert_eq!(string_descriptor(9), &[0x02, 0x03]);
        assert_eq!(string_descriptor(0)[2..], [0x09, 0x04]);
    }
}
