// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sync state machine and the data it carries.

/// Cyclic-prefix kind of an acquired cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclicPrefix {
    Normal,
    Extended,
}

/// An acquired cell's identity. Produced by cell search, immutable until
/// reselection discards it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellIdentity {
    pub pci: u32,
    pub cp: CyclicPrefix,
    pub nof_ports: u32,
    pub nof_prb: u32,
    pub earfcn: u32,
}

/// Radio sample-rate mode, tracking whether the engine is scanning for a
/// cell or camping on one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleRateMode {
    None,
    Find,
    Camp,
}

/// The sync engine's finite state set. Transitions are the sole prerogative
/// of the engine's main loop; external actors request transitions via
/// commands honored at the next loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    CellSearch,
    CellSelect,
    CellMeasure,
    CellCamp,
}

/// Auxiliary fields threaded through the main loop alongside `SyncState`.
#[derive(Debug)]
pub(crate) struct SyncAux {
    pub tti: u32,
    pub sync_sfn_cnt: u32,
    pub cfo_hz: f64,
    pub srate_mode: SampleRateMode,
    pub measure_rsrp: f64,
    pub measure_cnt: u32,
    pub agc_gain: f64,
    pub radio_is_streaming: bool,
    /// True from `cell_search_start()` until the scanned cell is confirmed
    /// camped on; routes a successful SFN sync to CellMeasure instead of
    /// straight to CellCamp, and is cleared once CellCamp is reached.
    pub cell_search_in_progress: bool,
    pub last_dsp_failure_streak: u32,
    /// Worker CFO: `cfo_hz` scaled by the camped cell's UL/DL frequency
    /// ratio, i.e. the correction applied on the uplink carrier rather than
    /// the downlink one it was measured on.
    pub worker_cfo_hz: f64,
}

impl Default for SyncAux {
    fn default() -> Self {
        Self {
            tti: 0,
            sync_sfn_cnt: 0,
            cfo_hz: 0.0,
            srate_mode: SampleRateMode::None,
            measure_rsrp: 0.0,
            measure_cnt: 0,
            agc_gain: 0.0,
            radio_is_streaming: false,
            cell_search_in_progress: false,
            last_dsp_failure_streak: 0,
            worker_cfo_hz: 0.0,
        }
    }
}
