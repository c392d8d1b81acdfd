#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

//! USB protocol engine for a USB4/Thunderbolt-to-NVMe bridge controller
//!
//! This crate is the vendor-class firmware core that runs on the bridge
//! chip's embedded microcontroller. It enumerates as a USB device, serves
//! enumeration descriptors, and bridges the host into the chip's internal
//! register space through a vendor command set layered on SCSI Bulk-Only
//! Transport framing.
//!
//! # Core Components
//!
//! - [`control`] - EP0 control-transfer phase engine (SETUP/DATA/STATUS)
//! - [`descriptor`] - enumeration descriptor tables and GET_DESCRIPTOR
//! - [`bot`] - CBW/CSW framing and the vendor opcode dispatcher
//! - [`bulk`] - software-DMA bulk IN and the deferred bulk-OUT machine
//! - [`link`] - SuperSpeed link-event and link-training supervision
//! - [`sched`] - interrupt entry point and the main-loop step
//! - [`regs`] - register bank abstraction over the chip's address space
//!
//! # Execution model
//!
//! Single core, no allocator, no OS. [`Bridge::isr`] runs to completion on
//! each hardware event: it acknowledges registers, sets deferred flags and
//! drives EP0 synchronously (control transfers are latency-sensitive enough
//! to justify ISR-context spinning). [`Bridge::poll_once`] is the main-loop
//! body; all bulk work and deferred initialization happens there. Every
//! blocking wait is a bounded spin-poll ([`poll::PollBudget`]) whose
//! exhaustion abandons the transaction to the host's own timeout.

#[cfg(feature = "defmt")]
use defmt as _;

pub mod bot;
pub mod bulk;
pub mod control;
pub mod descriptor;
pub mod error;
pub mod link;
pub mod poll;
pub mod regs;
pub mod sched;

pub use bulk::BulkOutState;
pub use error::{Error, Result};
pub use poll::{PollBudget, PollBudgets};
pub use regs::RegisterBank;

use bulk::BulkOutContext;
use link::LinkState;
use sched::DeferredFlags;

/// The firmware core: owns the register bank and all protocol state.
///
/// One `Bridge` exists per controller. Wire [`Bridge::isr`] into the USB
/// interrupt vector and call [`Bridge::poll_once`] forever from `main`.
pub struct Bridge<B: RegisterBank> {
    pub(crate) bank: B,
    pub(crate) budgets: PollBudgets,
    pub(crate) link: LinkState,
    pub(crate) flags: DeferredFlags,
    pub(crate) bulk_out: BulkOutContext,
    /// CBW tag holding area; the endpoint buffer that carried the tag is
    /// overwritten by response data before the CSW is built.
    pub(crate) cbw_tag: [u8; 4],
    /// USB2 splits IN-status completion across two hardware events; set
    /// after a data phase, consumed by the next EP0 interrupt.
    pub(crate) ep0_status_pending: bool,
}

impl<B: RegisterBank> Bridge<B> {
    /// Bring up the protocol engine over `bank`.
    ///
    /// Reads the boot-time link speed; everything else starts idle. The
    /// hardware itself (clocks, PLLs, PHY power) must already be up.
    pub fn new(mut bank: B, budgets: PollBudgets) -> Self {
        let usb3 = bank.is_set(regs::SPEED_STAT, regs::SpeedStat::SS_ACTIVE.bits());
        Self {
            bank,
            budgets,
            link: LinkState::new(usb3),
            flags: DeferredFlags::new(),
            bulk_out: BulkOutContext::new(),
            cbw_tag: [0; 4],
            ep0_status_pending: false,
        }
    }

    /// True while the SuperSpeed link is up.
    pub fn is_usb3(&self) -> bool {
        self.link.is_usb3()
    }

    /// Current deferred bulk-OUT state.
    pub fn bulk_out_state(&self) -> BulkOutState {
        self.bulk_out.state()
    }

    /// Direct access to the register bank.
    ///
    /// Used by board glue for registers outside the protocol engine and by
    /// tests to script hardware behavior.
    pub fn bank_mut(&mut self) -> &mut B {
        &mut self.bank
    }
}
