// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::unreadable_literal)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::needless_pass_by_value)]

//! Cross-module loopback scenarios for the sync engine, driven by fake
//! `RadioDriver`/`DspFrontend`/`RrcHandle` implementations rather than real
//! hardware. Mirrors the teacher's `tests/reliable_repair.rs` convention:
//! deterministic fakes plus a background-thread-plus-join lifecycle.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use ue_rlc_sync::sync::{
    CellIdentity, CellSearchResult, CyclicPrefix, DspFrontend, RadioDriver, RadioTimestamp,
    RrcHandle, SyncEngine, WorkerPool,
};

#[derive(Debug, Clone)]
enum RrcEvent {
    InSync,
    OutOfSync,
    CellFound { earfcn: u32, rsrp_dbm: f64 },
}

struct ChannelRrc {
    tx: mpsc::Sender<RrcEvent>,
}

impl RrcHandle for ChannelRrc {
    fn in_sync(&mut self) {
        let _ = self.tx.send(RrcEvent::InSync);
    }

    fn out_of_sync(&mut self) {
        let _ = self.tx.send(RrcEvent::OutOfSync);
    }

    fn cell_found(&mut self, earfcn: u32, _cell: CellIdentity, rsrp_dbm: f64) {
        let _ = self.tx.send(RrcEvent::CellFound { earfcn, rsrp_dbm });
    }
}

/// A radio driver that records nothing and does nothing; the sync engine
/// never inspects its return values beyond what `DspFrontend` also reports.
struct NoopRadio;

impl RadioDriver for NoopRadio {
    fn rx_now(&mut self, _buffers: &mut [&mut [i16]], _nsamples: usize) -> Option<RadioTimestamp> {
        Some(RadioTimestamp { full_secs: 0, frac_secs: 0.0 })
    }
    fn tx_offset(&mut self, _samples: i32) {}
    fn start_rx(&mut self) {}
    fn stop_rx(&mut self) {}
    fn tx_end(&mut self) {}
    fn set_rx_freq(&mut self, _hz: f64) {}
    fn set_tx_freq(&mut self, _hz: f64) {}
    fn set_rx_srate(&mut self, _hz: f64) {}
    fn set_tx_srate(&mut self, _hz: f64) {}
    fn set_master_clock_rate(&mut self, _hz: f64) {}
    fn set_tti_len(&mut self, _samples: usize) {}
    fn get_tti_len(&self) -> usize {
        15360
    }
    fn set_rx_gain_th(&mut self, db: f64) -> f64 {
        db
    }
}

fn test_cell(pci: u32, earfcn: u32) -> CellIdentity {
    CellIdentity {
        pci,
        cp: CyclicPrefix::Normal,
        nof_ports: 1,
        nof_prb: 100,
        earfcn,
    }
}

/// Scenario 1: a single EARFCN with an immediately-found cell reaches
/// CellCamp and reports `in_sync()` within a handful of subframes.
struct SingleCellDsp {
    cell: CellIdentity,
}

impl DspFrontend for SingleCellDsp {
    fn cell_search(&mut self, _force_pci: Option<u32>) -> Option<CellSearchResult> {
        Some(CellSearchResult { cell: self.cell, cfo_hz: 0.0 })
    }
    fn sync_sfn(&mut self) -> Option<u32> {
        Some(0)
    }
    fn zerocopy_fetch(&mut self, _buffers: &mut [&mut [i16]]) -> bool {
        true
    }
    fn measure_rsrp_dbm(&mut self) -> Option<f64> {
        Some(-90.0)
    }
    fn sync_metrics(&self) -> (f64, f64) {
        (0.0, 0.0)
    }
    fn set_sss_algorithm(&mut self, _alg: ue_rlc_sync::sync::SssAlgorithm) {}
}

#[test]
fn single_earfcn_reaches_camp_and_reports_in_sync() {
    let (tx, rx) = mpsc::channel();
    let pool = Arc::new(WorkerPool::new(2));
    let engine = SyncEngine::start(
        Box::new(NoopRadio),
        Box::new(SingleCellDsp { cell: test_cell(3, 2850) }),
        Box::new(ChannelRrc { tx }),
        pool,
        1,
        0,
        None,
    )
    .expect("engine starts");

    engine.set_earfcn_list(vec![2850]);
    engine.cell_search_start();

    let mut saw_cell_found = false;
    let mut saw_in_sync = false;
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while std::time::Instant::now() < deadline && !(saw_cell_found && saw_in_sync) {
        if let Ok(ev) = rx.recv_timeout(Duration::from_millis(200)) {
            match ev {
                RrcEvent::CellFound { earfcn, .. } => {
                    assert_eq!(earfcn, 2850);
                    saw_cell_found = true;
                }
                RrcEvent::InSync => saw_in_sync = true,
                RrcEvent::OutOfSync => {}
            }
        }
    }

    assert!(saw_cell_found, "expected rrc.cell_found() to fire");
    assert!(saw_in_sync, "expected rrc.in_sync() to fire once camped");
    assert!(engine.is_sync());
    engine.stop().expect("clean shutdown");
}

/// Scenario 2: an empty EARFCN list leaves the engine in Idle, never
/// reporting a cell or touching sync state.
#[test]
fn empty_earfcn_list_stays_idle() {
    let (tx, rx) = mpsc::channel();
    let pool = Arc::new(WorkerPool::new(1));
    let engine = SyncEngine::start(
        Box::new(NoopRadio),
        Box::new(SingleCellDsp { cell: test_cell(1, 1) }),
        Box::new(ChannelRrc { tx }),
        pool,
        1,
        0,
        None,
    )
    .expect("engine starts");

    // no set_earfcn_list() call: the list stays empty
    engine.cell_search_start();

    assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    assert!(!engine.is_sync());
    assert_eq!(engine.current_tti(), 0);
    engine.stop().expect("clean shutdown");
}

/// Scenario 3: the first EARFCN fails PSS decode, the cursor advances, and
/// the second EARFCN succeeds.
struct FailThenSucceedDsp {
    calls: std::sync::atomic::AtomicU32,
    cell: CellIdentity,
}

impl DspFrontend for FailThenSucceedDsp {
    fn cell_search(&mut self, _force_pci: Option<u32>) -> Option<CellSearchResult> {
        let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if n == 0 {
            None
        } else {
            Some(CellSearchResult { cell: self.cell, cfo_hz: 0.0 })
        }
    }
    fn sync_sfn(&mut self) -> Option<u32> {
        Some(0)
    }
    fn zerocopy_fetch(&mut self, _buffers: &mut [&mut [i16]]) -> bool {
        true
    }
    fn measure_rsrp_dbm(&mut self) -> Option<f64> {
        Some(-90.0)
    }
    fn sync_metrics(&self) -> (f64, f64) {
        (0.0, 0.0)
    }
    fn set_sss_algorithm(&mut self, _alg: ue_rlc_sync::sync::SssAlgorithm) {}
}

#[test]
fn second_earfcn_succeeds_after_first_fails() {
    let (tx, rx) = mpsc::channel();
    let pool = Arc::new(WorkerPool::new(1));
    let engine = SyncEngine::start(
        Box::new(NoopRadio),
        Box::new(FailThenSucceedDsp {
            calls: std::sync::atomic::AtomicU32::new(0),
            cell: test_cell(7, 1950),
        }),
        Box::new(ChannelRrc { tx }),
        pool,
        1,
        0,
        None,
    )
    .expect("engine starts");

    engine.set_earfcn_list(vec![1800, 1950]);
    engine.cell_search_start();

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    let mut found_earfcn = None;
    while std::time::Instant::now() < deadline && found_earfcn.is_none() {
        if let Ok(RrcEvent::CellFound { earfcn, .. }) = rx.recv_timeout(Duration::from_millis(200))
        {
            found_earfcn = Some(earfcn);
        }
    }

    assert_eq!(found_earfcn, Some(1950), "should camp on the second EARFCN");
    engine.stop().expect("clean shutdown");
}

/// Scenario 6: three consecutive DSP failures during CellCamp yield exactly
/// one `out_of_sync()` call, the engine falls back to CellSelect, and no
/// worker handle leaks out of the pool (the pool can still be drained).
struct FlakyCampDsp {
    camped_once: std::sync::atomic::AtomicBool,
}

impl DspFrontend for FlakyCampDsp {
    fn cell_search(&mut self, _force_pci: Option<u32>) -> Option<CellSearchResult> {
        Some(CellSearchResult { cell: test_cell(5, 6300), cfo_hz: 0.0 })
    }
    fn sync_sfn(&mut self) -> Option<u32> {
        // Resyncs exactly once, to get into CellCamp the first time. After
        // the camp failure below kicks the engine back to CellSelect, SFN
        // sync keeps failing (simulating the continued desync that a real
        // burst of consecutive DSP errors implies), so the engine never
        // re-enters CellCamp and never calls zerocopy_fetch again.
        if self.camped_once.swap(true, std::sync::atomic::Ordering::SeqCst) {
            None
        } else {
            Some(0)
        }
    }
    fn zerocopy_fetch(&mut self, _buffers: &mut [&mut [i16]]) -> bool {
        false
    }
    fn measure_rsrp_dbm(&mut self) -> Option<f64> {
        Some(-95.0)
    }
    fn sync_metrics(&self) -> (f64, f64) {
        (0.0, 0.0)
    }
    fn set_sss_algorithm(&mut self, _alg: ue_rlc_sync::sync::SssAlgorithm) {}
}

#[test]
fn camp_failure_reports_out_of_sync_once_and_recovers() {
    let (tx, rx) = mpsc::channel();
    let pool = Arc::new(WorkerPool::new(2));
    let engine = SyncEngine::start(
        Box::new(NoopRadio),
        Box::new(FlakyCampDsp { camped_once: std::sync::atomic::AtomicBool::new(false) }),
        Box::new(ChannelRrc { tx }),
        pool,
        1,
        0,
        None,
    )
    .expect("engine starts");

    engine.set_earfcn_list(vec![6300]);
    engine.cell_search_start();

    let mut out_of_sync_count = 0;
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while std::time::Instant::now() < deadline {
        if let Ok(ev) = rx.recv_timeout(Duration::from_millis(200)) {
            if matches!(ev, RrcEvent::OutOfSync) {
                out_of_sync_count += 1;
            }
        }
    }

    assert_eq!(
        out_of_sync_count, 1,
        "engine must bail out of CellCamp after the first DSP failure, not retry in place"
    );
    // The worker pool must still be usable afterwards: no handle leaked.
    engine.stop().expect("clean shutdown, proving no worker-pool deadlock");
}
