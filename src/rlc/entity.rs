// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The combined AM bearer: a TX half and an RX half sharing bearer
//! configuration and a status-signaling channel.
//!
//! The halves interact only through [`StatusSignal`] (RX → TX) and the
//! retransmission queue (fed from the TX side's own poll-retransmit timer).
//! Neither half holds a reference to the other directly; both hold a handle
//! to the shared signal, constructed once by the owning entity and handed to
//! each half at construction — the non-owning back-reference the design
//! calls for, without a literal parent pointer.

use crate::config::RlcBearerConfig;
use crate::error::Result;
use crate::rlc::pdu::{self, StatusPdu};
use crate::rlc::rx::RlcAmRx;
use crate::rlc::tx::RlcAmTx;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// RX → TX signaling channel: a pending status report plus the
/// `t-StatusProhibit` deadline that gates when it may actually be sent.
pub(crate) struct StatusSignal {
    required: AtomicBool,
    prohibit_until: Mutex<Option<Instant>>,
    report: Mutex<Option<StatusPdu>>,
}

impl StatusSignal {
    fn new() -> Self {
        Self {
            required: AtomicBool::new(false),
            prohibit_until: Mutex::new(None),
            report: Mutex::new(None),
        }
    }

    pub(crate) fn request(&self, report: StatusPdu) {
        self.put_report(report);
        self.required.store(true, Ordering::Relaxed);
    }

    pub(crate) fn is_required(&self) -> bool {
        self.required.load(Ordering::Relaxed)
    }

    pub(crate) fn clear_required(&self) {
        self.required.store(false, Ordering::Relaxed);
    }

    pub(crate) fn prohibit_running(&self) -> bool {
        match *self.prohibit_until.lock() {
            Some(until) => Instant::now() < until,
            None => false,
        }
    }

    pub(crate) fn start_prohibit(&self, dur: Duration) {
        *self.prohibit_until.lock() = Some(Instant::now() + dur);
    }

    pub(crate) fn take_report(&self) -> Option<StatusPdu> {
        self.report.lock().take()
    }

    pub(crate) fn put_report(&self, report: StatusPdu) {
        *self.report.lock() = Some(report);
    }
}

/// One RLC AM bearer: the TX and RX halves plus shared configuration.
pub struct RlcAmEntity {
    pub tx: RlcAmTx,
    pub rx: RlcAmRx,
}

impl RlcAmEntity {
    pub fn new() -> Self {
        let status = Arc::new(StatusSignal::new());
        Self {
            tx: RlcAmTx::new(Arc::clone(&status)),
            rx: RlcAmRx::new(status),
        }
    }

    pub fn configure(&mut self, cfg: RlcBearerConfig) -> Result<()> {
        self.tx.configure(cfg.clone())?;
        self.rx.configure(cfg)?;
        Ok(())
    }

    /// Route one PDU received from MAC to the half that owns its D/C bit:
    /// a control PDU (status report from the peer) feeds TX's retransmission
    /// bookkeeping; a data PDU feeds RX's reassembly/reordering.
    pub fn handle_pdu(&mut self, data: &[u8]) -> Result<()> {
        if pdu::is_control_pdu(data)? {
            let status = StatusPdu::read(data)?;
            self.tx.handle_status_pdu(&status);
            Ok(())
        } else {
            self.rx.handle_data_pdu(data)
        }
    }

    /// Reestablish both halves to freshly-constructed equivalent state.
    pub fn reestablish(&mut self) {
        self.tx.reestablish();
        self.rx.reestablish();
    }

    pub fn stop(&mut self) {
        self.tx.stop();
        self.rx.stop();
    }
}

impl Default for RlcAmEntity {
    fn default() -> Self {
        Self::new()
    }
}
