//! Shared test drivers: bring up a bridge over the mock bank and feed it
//! SETUP packets and CBWs the way the hardware would.

// Not every test binary uses every driver.
#![allow(dead_code)]

pub mod mock_bank;

pub use mock_bank::MockBank;

use usb4_bridge_fw::regs;
use usb4_bridge_fw::{Bridge, PollBudgets};

/// Parsed 13-byte Command Status Wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCsw {
    pub signature: [u8; 4],
    pub tag: [u8; 4],
    pub residue: [u8; 4],
    pub status: u8,
}

impl TestCsw {
    pub fn parse(frame: &[u8]) -> Self {
        assert_eq!(frame.len(), 13, "CSW frame must be 13 bytes");
        Self {
            signature: frame[0..4].try_into().unwrap(),
            tag: frame[4..8].try_into().unwrap(),
            residue: frame[8..12].try_into().unwrap(),
            status: frame[12],
        }
    }
}

/// Bridge over a fresh mock bank at the given boot speed.
pub fn new_bridge(usb3: bool) -> Bridge<MockBank> {
    let mut bank = MockBank::new();
    if usb3 {
        bank.set_reg(regs::SPEED_STAT, regs::SpeedStat::SS_ACTIVE.bits());
    }
    Bridge::new(bank, PollBudgets::default())
}

/// Latch a CBW into the capture registers, raise the CBW interrupt, and
/// run one ISR + one main-loop iteration (the dispatch).
pub fn deliver_cbw(bridge: &mut Bridge<MockBank>, tag: [u8; 4], cb: &[u8]) {
    assert!(cb.len() <= 16);
    let bank = bridge.bank_mut();
    for (i, b) in tag.iter().enumerate() {
        bank.set_reg(regs::CBW_TAG_BASE + i as u16, *b);
    }
    bank.set_reg(regs::CBW_CBLEN, cb.len() as u8);
    for i in 0..16u16 {
        let b = cb.get(i as usize).copied().unwrap_or(0);
        bank.set_reg(regs::CBW_CB_BASE + i, b);
    }
    bank.or_reg(regs::IRQ_STAT, regs::IrqStat::CBW.bits());
    bridge.isr();
    bridge.poll_once();
}

/// Latch a SETUP packet, mark all three EP0 phases hardware-ready, raise
/// the EP0 interrupt and run the ISR (control transfers run synchronously).
pub fn deliver_setup(bridge: &mut Bridge<MockBank>, setup: [u8; 8]) {
    let bank = bridge.bank_mut();
    for (i, b) in setup.iter().enumerate() {
        bank.set_reg(regs::SETUP_BASE + i as u16, *b);
    }
    bank.set_reg(regs::EP0_PHASE, regs::Ep0Phase::all().bits());
    bank.or_reg(regs::IRQ_STAT, regs::IrqStat::EP0.bits());
    bridge.isr();
}

/// GET_DESCRIPTOR SETUP packet.
pub fn get_descriptor_setup(dtype: u8, index: u8, w_length: u16) -> [u8; 8] {
    [
        0x80,
        0x06,
        index,
        dtype,
        0x00,
        0x00,
        w_length as u8,
        (w_length >> 8) as u8,
    ]
}

/// Stage an OUT payload the hardware would have auto-DMA'd and run the
/// main loop until the deferred bulk-OUT machine completes.
///
/// Call with the bulk-OUT machine in the Armed state (right after the
/// 0xE7 CBW dispatch).
pub fn complete_bulk_out(bridge: &mut Bridge<MockBank>, payload: &[u8]) {
    // Armed -> Waiting: this iteration only arms the OUT endpoint.
    bridge.poll_once();

    let bank = bridge.bank_mut();
    for (i, b) in payload.iter().enumerate() {
        bank.set_reg(regs::OUT_STAGING + i as u16, *b);
    }
    bank.set_reg(regs::DMA_COUNT, payload.len() as u8);
    bank.or_reg(regs::BULK_STAT, regs::BulkStat::DATA_AVAIL.bits());

    // Waiting -> Idle: copy, CSW, re-arm.
    bridge.poll_once();
}

/// Pop the most recent bulk-IN frame and parse it as a CSW.
pub fn last_csw(bridge: &mut Bridge<MockBank>) -> TestCsw {
    let frame = bridge
        .bank_mut()
        .bulk_in_frames
        .pop()
        .expect("no bulk-IN frame captured");
    TestCsw::parse(&frame)
}
