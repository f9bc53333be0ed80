// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RLC AM transmit half.
//!
//! Grounded on the teacher's retransmit-cache split in the reliability
//! writer (cache-hit retransmit vs. cache-miss gap), adapted here to RLC's
//! status-then-retransmission-then-new-SDU read-out order (§4.3.1).

use crate::config::{RlcBearerConfig, MAX_SDUS_PER_RLC_PDU};
use crate::error::{Error, Result};
use crate::rlc::entity::StatusSignal;
use crate::rlc::pdu::{DataPduHeader, SegmentInfo, StatusPdu};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct RetxEntry {
    sn: u16,
    payload: Vec<u8>,
}

/// RLC AM TX entity half. All public operations serialize behind `&mut self`
/// — the owning [`crate::rlc::entity::RlcAmEntity`] is expected to guard
/// concurrent MAC/upper-layer access with its own mutex, matching the
/// source's single `std::mutex` per entity.
pub struct RlcAmTx {
    cfg: RlcBearerConfig,
    enabled: bool,
    tx_next: u16,
    tx_sdu_queue: VecDeque<Vec<u8>>,
    queue_bytes: usize,
    /// Outstanding sent-but-unacknowledged PDUs, by SN. Pruned or moved to
    /// `retx_queue` by [`RlcAmTx::handle_status_pdu`].
    tx_window: BTreeMap<u16, Vec<u8>>,
    retx_queue: VecDeque<RetxEntry>,
    pdus_without_poll: u32,
    bytes_without_poll: u64,
    poll_sn: Option<u16>,
    t_poll_retransmit_deadline: Option<Instant>,
    status: Arc<StatusSignal>,
}

impl RlcAmTx {
    pub(crate) fn new(status: Arc<StatusSignal>) -> Self {
        Self {
            cfg: RlcBearerConfig::default(),
            enabled: false,
            tx_next: 0,
            tx_sdu_queue: VecDeque::new(),
            queue_bytes: 0,
            tx_window: BTreeMap::new(),
            retx_queue: VecDeque::new(),
            pdus_without_poll: 0,
            bytes_without_poll: 0,
            poll_sn: None,
            t_poll_retransmit_deadline: None,
            status,
        }
    }

    pub fn configure(&mut self, cfg: RlcBearerConfig) -> Result<()> {
        if let Some(len) = cfg.tx_queue_length {
            if len > MAX_SDUS_PER_RLC_PDU {
                return Err(Error::TxQueueTooLong {
                    configured: len,
                    max: MAX_SDUS_PER_RLC_PDU,
                });
            }
        }
        let modulus = cfg.sn_size.modulus();
        self.cfg = cfg;
        self.tx_next %= modulus as u16;
        self.enabled = true;
        Ok(())
    }

    pub fn write_sdu(&mut self, sdu: Vec<u8>) -> Result<()> {
        if let Some(max) = self.cfg.tx_queue_length {
            if self.tx_sdu_queue.len() >= max {
                return Err(Error::QueueFull);
            }
        }
        self.queue_bytes += sdu.len();
        self.tx_sdu_queue.push_back(sdu);
        Ok(())
    }

    /// `(bytes, priority_bytes)`. Priority bytes covers status + retransmit
    /// traffic; `bytes` covers new-SDU traffic, matching the MAC scheduler's
    /// need to weigh retransmission ahead of fresh data.
    pub fn get_buffer_state(&self) -> (u32, u32) {
        let hdr_len = 2u32;
        let sdu_bytes = (self.queue_bytes as u32) + hdr_len * self.tx_sdu_queue.len() as u32;

        let mut prio_bytes = 0u32;
        if self.do_status() {
            prio_bytes += 2;
        }
        for entry in &self.retx_queue {
            prio_bytes += hdr_len + entry.payload.len() as u32;
        }

        (sdu_bytes, prio_bytes)
    }

    /// Discard a previously-sent, not-yet-acknowledged PDU by sequence
    /// number. A queued-but-unsent SDU has no SN yet (SNs are only assigned
    /// at `read_pdu` time), so only `tx_window`/`retx_queue` entries are
    /// addressable here.
    pub fn discard_sdu(&mut self, sn: u16) {
        self.tx_window.remove(&sn);
        self.retx_queue.retain(|entry| entry.sn != sn);
    }

    pub fn empty_queue(&mut self) {
        self.tx_sdu_queue.clear();
        self.queue_bytes = 0;
    }

    pub fn reestablish(&mut self) {
        self.stop();
        self.tx_next = 0;
        self.tx_window.clear();
        self.retx_queue.clear();
        self.pdus_without_poll = 0;
        self.bytes_without_poll = 0;
        self.poll_sn = None;
        self.t_poll_retransmit_deadline = None;
    }

    pub fn stop(&mut self) {
        self.enabled = false;
        self.empty_queue();
    }

    fn do_status(&self) -> bool {
        self.status.is_required() && !self.status.prohibit_running()
    }

    /// Modular distance `ack_sn - sn`, in `[0, modulus)`. Zero means `sn` is
    /// the status report's `ack_sn` itself, i.e. not yet implied ACKed.
    fn mod_distance_to(&self, sn: u16, ack_sn: u16) -> u32 {
        let m = self.cfg.sn_size.modulus();
        (u32::from(ack_sn) + m - u32::from(sn)) % m
    }

    /// Consume a status report from the peer: every outstanding SN the
    /// report implies as covered (anything preceding `ack_sn`) is either a
    /// cache hit — still in `tx_window`, so queue it for retransmission — or
    /// a cache miss that is simply pruned, mirroring the teacher's
    /// retransmit handler's hit/miss split. Anything *not* covered (not yet
    /// reached by the peer's `ack_sn`) is left untouched in `tx_window`.
    pub fn handle_status_pdu(&mut self, status: &StatusPdu) {
        let nacked: Vec<u16> = status.nacks.iter().map(|n| n.sn).collect();
        let covered: Vec<u16> = self
            .tx_window
            .keys()
            .copied()
            .filter(|&sn| self.mod_distance_to(sn, status.ack_sn) > 0)
            .collect();

        for sn in covered {
            if nacked.contains(&sn) {
                if let Some(payload) = self.tx_window.remove(&sn) {
                    if !self.retx_queue.iter().any(|e| e.sn == sn) {
                        self.retx_queue.push_back(RetxEntry { sn, payload });
                    }
                }
            } else {
                // Acknowledged: drop from the window, nothing to retransmit.
                self.tx_window.remove(&sn);
            }
        }
    }

    fn poll_retransmit_expired(&self) -> bool {
        matches!(self.t_poll_retransmit_deadline, Some(deadline) if Instant::now() >= deadline)
    }

    /// Decide whether this PDU should carry the poll bit, per §4.3.1's four
    /// trigger conditions, and roll the poll bookkeeping forward if so.
    fn decide_poll(&mut self, sn: u16, pdu_bytes: u64, queue_now_empty: bool) -> bool {
        self.pdus_without_poll += 1;
        self.bytes_without_poll += pdu_bytes;

        let poll = self.pdus_without_poll >= self.cfg.poll_pdu
            || self.bytes_without_poll >= self.cfg.poll_byte
            || (queue_now_empty && self.poll_sn.is_none())
            || self.poll_retransmit_expired();

        if poll {
            self.pdus_without_poll = 0;
            self.bytes_without_poll = 0;
            self.poll_sn = Some(sn);
            self.t_poll_retransmit_deadline =
                Some(Instant::now() + Duration::from_millis(self.cfg.t_poll_retransmit_ms));
        }
        poll
    }

    /// MAC read-out opportunity. Returns the number of bytes written;
    /// `Ok(0)` means "nothing to send this opportunity", not an error.
    pub fn read_pdu(&mut self, out: &mut [u8]) -> Result<usize> {
        if !self.enabled {
            log::debug!("RLC AM TX: entity not active, not generating PDU");
            return Ok(0);
        }
        log::debug!("RLC AM TX: MAC opportunity - {} bytes", out.len());

        if self.do_status() {
            if let Some(report) = self.status.take_report() {
                match report.write(out) {
                    Ok(len) => {
                        self.status.clear_required();
                        self.status
                            .start_prohibit(Duration::from_millis(self.cfg.t_status_prohibit_ms));
                        return Ok(len);
                    }
                    Err(_) => {
                        // Doesn't fit this opportunity; try again next time.
                        self.status.put_report(report);
                    }
                }
            }
        }

        if let Some(front) = self.retx_queue.front() {
            let hdr = DataPduHeader {
                poll: false,
                si: SegmentInfo::FullSdu,
                sn: front.sn,
                segment_offset: 0,
            };
            let needed = hdr.encoded_len() + front.payload.len();
            if needed <= out.len() {
                let entry = self.retx_queue.pop_front().expect("front() just matched Some");
                let queue_empty = self.tx_sdu_queue.is_empty() && self.retx_queue.is_empty();
                let poll = self.decide_poll(entry.sn, needed as u64, queue_empty);
                let hdr = DataPduHeader { poll, ..hdr };
                let hlen = hdr.write(out)?;
                out[hlen..hlen + entry.payload.len()].copy_from_slice(&entry.payload);
                return Ok(hlen + entry.payload.len());
            }
            // TODO: split the pending retransmission and re-queue the residue
            // once segmentation emission is implemented.
            return Ok(0);
        }

        let Some(sdu) = self.tx_sdu_queue.pop_front() else {
            return Ok(0);
        };
        self.queue_bytes = self.queue_bytes.saturating_sub(sdu.len());

        let sn = self.tx_next;
        let hdr = DataPduHeader {
            poll: false,
            si: SegmentInfo::FullSdu,
            sn,
            segment_offset: 0,
        };
        let needed = hdr.encoded_len() + sdu.len();
        if needed > out.len() {
            log::warn!("RLC AM TX: segmentation not supported yet, dropping SN {sn} opportunity");
            return Ok(0);
        }

        let queue_empty = self.tx_sdu_queue.is_empty() && self.retx_queue.is_empty();
        let poll = self.decide_poll(sn, needed as u64, queue_empty);
        let hdr = DataPduHeader { poll, ..hdr };
        let hlen = hdr.write(out)?;
        let sdu_len = sdu.len();
        out[hlen..hlen + sdu_len].copy_from_slice(&sdu);

        self.tx_window.insert(sn, sdu);
        self.tx_next = ((u32::from(self.tx_next) + 1) % self.cfg.sn_size.modulus()) as u16;

        Ok(hlen + sdu_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rlc::entity::RlcAmEntity;

    #[test]
    fn read_pdu_before_configure_returns_zero() {
        let status = Arc::new(StatusSignal::new());
        let mut tx = RlcAmTx::new(status);
        let mut buf = [0u8; 64];
        assert_eq!(tx.read_pdu(&mut buf).unwrap(), 0);
    }

    #[test]
    fn three_sdus_read_out_in_order_with_incrementing_sn() {
        let mut entity = RlcAmEntity::new();
        entity.configure(RlcBearerConfig::default()).unwrap();
        entity.tx.write_sdu(vec![0xAA; 50]).unwrap();
        entity.tx.write_sdu(vec![0xBB; 40]).unwrap();
        entity.tx.write_sdu(vec![0xCC; 30]).unwrap();

        let mut buf = [0u8; 60];
        for (i, expected_byte) in [0xAAu8, 0xBB, 0xCC].into_iter().enumerate() {
            let len = entity.tx.read_pdu(&mut buf).unwrap();
            assert!(len > 0);
            let hdr = DataPduHeader::read(&buf[..len]).unwrap();
            assert_eq!(hdr.sn, i as u16);
            assert_eq!(buf[hdr.encoded_len()], expected_byte);
        }
        assert_eq!(entity.tx.get_buffer_state().0, 0);
    }

    #[test]
    fn oversized_sdu_without_segmentation_yields_zero_bytes() {
        let mut entity = RlcAmEntity::new();
        entity.configure(RlcBearerConfig::default()).unwrap();
        entity.tx.write_sdu(vec![0u8; 100]).unwrap();

        let mut buf = [0u8; 10];
        assert_eq!(entity.tx.read_pdu(&mut buf).unwrap(), 0);
    }

    #[test]
    fn configure_rejects_oversized_queue_length() {
        let mut entity = RlcAmEntity::new();
        let mut cfg = RlcBearerConfig::default();
        cfg.tx_queue_length = Some(MAX_SDUS_PER_RLC_PDU + 1);
        assert!(entity.configure(cfg).is_err());
    }

    #[test]
    fn write_sdu_fails_when_bounded_queue_is_full() {
        let mut entity = RlcAmEntity::new();
        let mut cfg = RlcBearerConfig::default();
        cfg.tx_queue_length = Some(1);
        entity.configure(cfg).unwrap();
        entity.tx.write_sdu(vec![1]).unwrap();
        assert!(matches!(entity.tx.write_sdu(vec![2]), Err(Error::QueueFull)));
    }

    #[test]
    fn poll_bit_set_on_last_sdu_with_no_poll_in_flight() {
        let mut entity = RlcAmEntity::new();
        entity.configure(RlcBearerConfig::default()).unwrap();
        entity.tx.write_sdu(vec![1, 2, 3]).unwrap();

        let mut buf = [0u8; 64];
        let len = entity.tx.read_pdu(&mut buf).unwrap();
        let hdr = DataPduHeader::read(&buf[..len]).unwrap();
        assert!(hdr.poll);
    }

    #[test]
    fn nacked_sn_is_retransmitted_ahead_of_new_sdus() {
        use crate::rlc::pdu::NackRange;

        let mut entity = RlcAmEntity::new();
        entity.configure(RlcBearerConfig::default()).unwrap();
        entity.tx.write_sdu(vec![0xAA; 10]).unwrap();

        let mut buf = [0u8; 64];
        let len = entity.tx.read_pdu(&mut buf).unwrap();
        let hdr = DataPduHeader::read(&buf[..len]).unwrap();
        assert_eq!(hdr.sn, 0);

        entity.tx.write_sdu(vec![0xBB; 10]).unwrap();
        entity.tx.handle_status_pdu(&StatusPdu {
            ack_sn: 1,
            nacks: vec![NackRange { sn: 0, segment_offset_start: None, segment_offset_end: None }],
        });

        let len = entity.tx.read_pdu(&mut buf).unwrap();
        let hdr = DataPduHeader::read(&buf[..len]).unwrap();
        assert_eq!(hdr.sn, 0, "retransmission must be served before the new SDU");
        assert_eq!(buf[hdr.encoded_len()], 0xAA);

        let len = entity.tx.read_pdu(&mut buf).unwrap();
        let hdr = DataPduHeader::read(&buf[..len]).unwrap();
        assert_eq!(hdr.sn, 1, "new SDU follows once the retransmission has drained");
    }

    #[test]
    fn acked_sn_is_pruned_without_retransmission() {
        let mut entity = RlcAmEntity::new();
        entity.configure(RlcBearerConfig::default()).unwrap();
        entity.tx.write_sdu(vec![1, 2, 3]).unwrap();

        let mut buf = [0u8; 64];
        entity.tx.read_pdu(&mut buf).unwrap();
        entity.tx.handle_status_pdu(&StatusPdu { ack_sn: 1, nacks: vec![] });

        assert!(entity.tx.tx_window.is_empty());
        assert!(entity.tx.retx_queue.is_empty());
    }

    #[test]
    fn discard_sdu_removes_outstanding_window_entry() {
        let mut entity = RlcAmEntity::new();
        entity.configure(RlcBearerConfig::default()).unwrap();
        entity.tx.write_sdu(vec![1, 2, 3]).unwrap();

        let mut buf = [0u8; 64];
        entity.tx.read_pdu(&mut buf).unwrap();
        assert!(!entity.tx.tx_window.is_empty());

        entity.tx.discard_sdu(0);
        assert!(entity.tx.tx_window.is_empty());
    }
}
