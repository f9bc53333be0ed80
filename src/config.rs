// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Single source of truth for sync-engine and RLC-AM constants.
//!
//! Every magic number used elsewhere in this crate is named here once, with
//! a doc comment giving its origin — never hardcode a duplicate elsewhere.

use crate::error::{Error, Result};

/// Number of TX mutexes allocated per worker in the rotating uplink ring.
///
/// The ring length is `MUTEX_X_WORKER * pool_size`; pool size must evenly
/// divide the ring length (see sync engine TX-mutex rotation).
pub const MUTEX_X_WORKER: usize = 4;

/// Maximum PSS-search frames scanned per EARFCN during cell search.
pub const SRSLTE_DEFAULT_MAX_FRAMES_PSS: u32 = 50;

/// Number of valid PSS frames required before declaring a cell found.
pub const SRSLTE_DEFAULT_NOF_VALID_PSS_FRAMES: u32 = 5;

/// Maximum frames scanned for PBCH/MIB decode during cell search.
pub const SRSLTE_DEFAULT_MAX_FRAMES_PBCH: u32 = 100;

/// Number of subframes averaged into the CellMeasure RSRP accumulator.
pub const RSRP_MEASURE_NOF_FRAMES: u32 = 100;

/// CellSelect iterations allowed before declaring an SFN-sync timeout.
pub const SYNC_SFN_TIMEOUT: u32 = 1000;

/// TTI count per radio frame (10 subframes per frame, SFN wraps at 1024 frames).
pub const TTI_PER_SFN_WRAP: u32 = 10240;

/// Advance (in subframes) of a PRACH transmission ahead of the triggering RX timestamp.
pub const PRACH_TX_ADVANCE_SF: f64 = 1.0;

/// Subframe length in samples for a given resource-block count.
///
/// Mirrors `SRSLTE_SF_LEN_PRB`: one subframe (1 ms) at the sample rate implied
/// by `nof_prb` resource blocks (15 kHz subcarrier spacing, LTE/NR numerology 0).
pub fn sf_len_prb(nof_prb: u32) -> usize {
    // 15.36 MSps per 100 PRB scaled linearly, rounded to the nearest sample.
    ((f64::from(nof_prb)) * 15360.0 / 100.0).round() as usize
}

/// One FDD band's EARFCN → carrier-frequency mapping (3GPP TS 36.101
/// Table 5.7.3-1): `dl_low_mhz`/`ul_low_mhz` are the band's lowest downlink/
/// uplink carrier frequencies, `offset` is the first DL EARFCN in the band,
/// and `range` is how many consecutive DL EARFCNs the band covers.
struct BandEntry {
    dl_low_mhz: f64,
    ul_low_mhz: f64,
    offset: u32,
    range: u32,
}

/// A handful of common FDD bands, enough to resolve the EARFCN plans this
/// crate is exercised against; not the full 3GPP band table.
const BANDS: &[BandEntry] = &[
    BandEntry { dl_low_mhz: 2110.0, ul_low_mhz: 1920.0, offset: 0, range: 600 },
    BandEntry { dl_low_mhz: 1805.0, ul_low_mhz: 1710.0, offset: 1200, range: 750 },
    BandEntry { dl_low_mhz: 2620.0, ul_low_mhz: 2500.0, offset: 2750, range: 700 },
    BandEntry { dl_low_mhz: 925.0, ul_low_mhz: 880.0, offset: 3450, range: 350 },
    BandEntry { dl_low_mhz: 791.0, ul_low_mhz: 832.0, offset: 6150, range: 300 },
];

/// Resolve a downlink EARFCN to its `(dl_freq_hz, ul_freq_hz)` pair.
///
/// The DL and UL EARFCN ranges of an FDD band share the same offset delta
/// (TS 36.101 §5.7.3), so both frequencies move by the same `0.1 MHz` step
/// from the band's low-end frequencies; no separate UL EARFCN lookup is
/// needed.
pub fn earfcn_to_band_freqs(earfcn: u32) -> Result<(f64, f64)> {
    for band in BANDS {
        if earfcn >= band.offset && earfcn < band.offset + band.range {
            let delta_mhz = 0.1 * f64::from(earfcn - band.offset);
            let dl_hz = (band.dl_low_mhz + delta_mhz) * 1e6;
            let ul_hz = (band.ul_low_mhz + delta_mhz) * 1e6;
            return Ok((dl_hz, ul_hz));
        }
    }
    Err(Error::InvalidEarfcn(earfcn))
}

/// Maximum SDUs a single RLC AM PDU opportunity may draw from the TX queue.
///
/// `configure()` rejects bearer configs whose `tx_queue_length` exceeds this.
pub const MAX_SDUS_PER_RLC_PDU: usize = 128;

/// Default `pollPDU`: send a poll every N PDUs when no poll is pending.
pub const DEFAULT_POLL_PDU: u32 = 16;

/// Default `pollByte`: send a poll every N bytes when no poll is pending.
pub const DEFAULT_POLL_BYTE: u64 = 25_000;

/// Default `t-PollRetransmit` in milliseconds.
pub const DEFAULT_T_POLL_RETRANSMIT_MS: u64 = 80;

/// Default `t-Reordering` in milliseconds.
pub const DEFAULT_T_REORDERING_MS: u64 = 50;

/// Default `t-StatusProhibit` in milliseconds.
pub const DEFAULT_T_STATUS_PROHIBIT_MS: u64 = 10;

/// SN-size variants supported by the RLC AM NR PDU header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnSize {
    Bits6,
    Bits12,
    /// Reserved for a future revision; not yet emitted or parsed.
    Bits18,
}

impl SnSize {
    /// Sequence-number space size, `2^sn_size`.
    pub const fn modulus(self) -> u32 {
        match self {
            SnSize::Bits6 => 1 << 6,
            SnSize::Bits12 => 1 << 12,
            SnSize::Bits18 => 1 << 18,
        }
    }

    /// AM window size, `2^(sn_size-1)`.
    pub const fn window_size(self) -> u32 {
        self.modulus() / 2
    }
}

/// Runtime-tunable sync engine parameters.
///
/// Compile-time constants above cover protocol-fixed values; this struct
/// covers the handful of values that legitimately vary per deployment
/// (EARFCN plan, CPU pinning, realtime priority). A dynamic hot-reload store
/// (as used by the wider DDS config layer this crate is adapted from) is not
/// warranted here — one engine per process, reconfigured rarely.
#[derive(Debug, Clone)]
pub struct SyncEngineConfig {
    /// Number of receive antennas to allocate subframe buffers for.
    pub rx_antennas: u32,
    /// Realtime scheduling priority (0 = default `SCHED_OTHER`, >0 = `SCHED_FIFO`).
    pub priority: i32,
    /// CPU core to pin the sync thread to, or `None` for no affinity.
    pub cpu_affinity: Option<usize>,
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        Self {
            rx_antennas: 1,
            priority: 0,
            cpu_affinity: None,
        }
    }
}

/// Runtime-tunable RLC AM bearer parameters.
#[derive(Debug, Clone)]
pub struct RlcBearerConfig {
    pub sn_size: SnSize,
    /// Bound on `tx_sdu_queue` length; `None` means unbounded.
    pub tx_queue_length: Option<usize>,
    pub poll_pdu: u32,
    pub poll_byte: u64,
    pub t_poll_retransmit_ms: u64,
    pub t_reordering_ms: u64,
    pub t_status_prohibit_ms: u64,
}

impl Default for RlcBearerConfig {
    fn default() -> Self {
        Self {
            sn_size: SnSize::Bits12,
            tx_queue_length: None,
            poll_pdu: DEFAULT_POLL_PDU,
            poll_byte: DEFAULT_POLL_BYTE,
            t_poll_retransmit_ms: DEFAULT_T_POLL_RETRANSMIT_MS,
            t_reordering_ms: DEFAULT_T_REORDERING_MS,
            t_status_prohibit_ms: DEFAULT_T_STATUS_PROHIBIT_MS,
        }
    }
}
