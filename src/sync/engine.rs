// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sync engine main loop.
//!
//! Single OS thread, dispatching on [`SyncState`] each iteration. Started and
//! stopped via a `stop_flag` + `JoinHandle` pair (the same pattern the
//! reliability layer's background dispatch loop uses), with a `Drop` impl as
//! a safety net if the caller forgets to call [`SyncEngine::stop`].

use crate::config::{
    self, RSRP_MEASURE_NOF_FRAMES, SYNC_SFN_TIMEOUT, TTI_PER_SFN_WRAP,
};
use crate::error::{Error, Result};
use crate::sync::interfaces::{DspFrontend, RadioDriver, RrcHandle};
use crate::sync::state::{CellIdentity, SampleRateMode, SyncAux, SyncState};
use crate::sync::worker_pool::WorkerPool;
use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

enum Command {
    CellSearchStart,
    CellSelect { earfcn: u32, cell: CellIdentity },
    ResyncSfn,
    SetAgcEnable(bool),
    SetTimeAdvSeconds(f32),
}

/// Observable state published by the engine thread, read from any thread
/// without blocking the engine's own loop. `cell` uses an `ArcSwapOption`
/// rather than a mutex: readers (e.g. an RRC status page) never contend with
/// the one writer, which swaps a fresh `Arc` in once per loop iteration.
struct Shared {
    tti: AtomicU32,
    is_sync: AtomicBool,
    cell: ArcSwapOption<CellIdentity>,
}

/// Drives a radio/DSP pair through cell search, selection, measurement, and
/// steady-state camping, dispatching workers and reporting to RRC.
pub struct SyncEngine {
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    cmd_tx: Sender<Command>,
    shared: Arc<Shared>,
    earfcn: Arc<Mutex<Vec<u32>>>,
}

impl SyncEngine {
    /// Build and start the engine. `rx_antennas` sizes the subframe buffer;
    /// `priority`/`cpu_affinity` configure the OS thread per §4.1.
    pub fn start(
        radio: Box<dyn RadioDriver>,
        dsp: Box<dyn DspFrontend>,
        rrc: Box<dyn RrcHandle>,
        pool: Arc<WorkerPool>,
        rx_antennas: u32,
        priority: i32,
        cpu_affinity: Option<usize>,
    ) -> Result<Self> {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let shared = Arc::new(Shared {
            tti: AtomicU32::new(0),
            is_sync: AtomicBool::new(false),
            cell: ArcSwapOption::from(None),
        });
        let earfcn = Arc::new(Mutex::new(Vec::new()));
        let (cmd_tx, cmd_rx) = mpsc::channel();

        let stop_flag_thread = Arc::clone(&stop_flag);
        let shared_thread = Arc::clone(&shared);
        let earfcn_thread = Arc::clone(&earfcn);

        let handle = thread::Builder::new()
            .name("sync-engine".into())
            .spawn(move || {
                if let Err(e) = apply_realtime_scheduling(priority, cpu_affinity) {
                    log::warn!("sync engine: realtime scheduling unavailable: {e}");
                }
                let mut inner = EngineLoop {
                    radio,
                    dsp,
                    rrc,
                    pool,
                    rx_antennas,
                    state: SyncState::Idle,
                    aux: SyncAux::default(),
                    earfcn: earfcn_thread,
                    earfcn_cursor: -1,
                    time_adv_sec: 0.0,
                    do_agc: false,
                    last_cell: None,
                    ul_dl_factor: 1.0,
                    cell_is_set: false,
                };
                inner.run(&stop_flag_thread, &shared_thread, &cmd_rx);
            })
            .map_err(Error::Io)?;

        Ok(Self {
            stop_flag,
            handle: Some(handle),
            cmd_tx,
            shared,
            earfcn,
        })
    }

    pub fn set_earfcn_list(&self, list: Vec<u32>) {
        *self.earfcn.lock() = list;
    }

    pub fn cell_search_start(&self) {
        let _ = self.cmd_tx.send(Command::CellSearchStart);
    }

    pub fn cell_select(&self, earfcn: u32, cell: CellIdentity) {
        let _ = self.cmd_tx.send(Command::CellSelect { earfcn, cell });
    }

    pub fn resync_sfn(&self) {
        let _ = self.cmd_tx.send(Command::ResyncSfn);
    }

    pub fn set_agc_enable(&self, enable: bool) {
        let _ = self.cmd_tx.send(Command::SetAgcEnable(enable));
    }

    pub fn set_time_adv_seconds(&self, secs: f32) {
        let _ = self.cmd_tx.send(Command::SetTimeAdvSeconds(secs));
    }

    pub fn current_tti(&self) -> u32 {
        self.shared.tti.load(Ordering::Relaxed)
    }

    pub fn is_sync(&self) -> bool {
        self.shared.is_sync.load(Ordering::Relaxed)
    }

    pub fn current_cell(&self) -> Option<CellIdentity> {
        self.shared.cell.load().as_deref().copied()
    }

    /// Stop the engine and join its thread. Safe to call at most once;
    /// dropping without calling `stop` also joins, matching the teacher's
    /// `Router` safety net.
    pub fn stop(mut self) -> std::io::Result<()> {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(h) = self.handle.take() {
            h.join().map_err(|_| std::io::Error::other("sync engine thread panicked"))?;
        }
        Ok(())
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

struct EngineLoop {
    radio: Box<dyn RadioDriver>,
    dsp: Box<dyn DspFrontend>,
    rrc: Box<dyn RrcHandle>,
    pool: Arc<WorkerPool>,
    rx_antennas: u32,
    state: SyncState,
    aux: SyncAux,
    earfcn: Arc<Mutex<Vec<u32>>>,
    earfcn_cursor: i64,
    time_adv_sec: f32,
    do_agc: bool,
    last_cell: Option<CellIdentity>,
    /// `ul_freq / dl_freq` for the currently-selected cell's band, computed
    /// once at cell selection and reused every camped TTI to scale CFO.
    ul_dl_factor: f64,
    /// Whether `init_cell` has configured DSP/worker state for a cell that
    /// `free_cell` still needs to tear down.
    cell_is_set: bool,
}

impl EngineLoop {
    fn run(&mut self, stop_flag: &AtomicBool, shared: &Shared, cmd_rx: &Receiver<Command>) {
        while !stop_flag.load(Ordering::Relaxed) {
            self.drain_commands(cmd_rx);

            match self.state {
                SyncState::Idle => thread::sleep(Duration::from_millis(1)),
                SyncState::CellSearch => self.step_cell_search(),
                SyncState::CellSelect => self.step_cell_select(),
                SyncState::CellMeasure => self.step_cell_measure(),
                SyncState::CellCamp => {
                    if !self.step_cell_camp() {
                        break;
                    }
                }
            }

            shared.tti.store(self.aux.tti, Ordering::Relaxed);
            shared
                .is_sync
                .store(self.state == SyncState::CellCamp, Ordering::Relaxed);
            let published_cell = match self.state {
                SyncState::Idle | SyncState::CellSearch => None,
                _ => self.last_cell,
            };
            shared.cell.store(published_cell.map(Arc::new));
        }
    }

    fn drain_commands(&mut self, cmd_rx: &Receiver<Command>) {
        while let Ok(cmd) = cmd_rx.try_recv() {
            match cmd {
                Command::CellSearchStart => self.cell_search_start(),
                Command::CellSelect { earfcn, cell } => self.enter_cell_select(earfcn, cell, false),
                Command::ResyncSfn => {
                    self.aux.sync_sfn_cnt = 0;
                    self.state = SyncState::CellSelect;
                }
                Command::SetAgcEnable(enable) => self.do_agc = enable,
                Command::SetTimeAdvSeconds(secs) => self.time_adv_sec = secs,
            }
        }
    }

    fn cell_search_start(&mut self) {
        let list_len = self.earfcn.lock().len();
        if list_len == 0 {
            log::info!("Empty EARFCN list. Stopping cell search...");
            self.state = SyncState::Idle;
            return;
        }
        self.earfcn_cursor = -1;
        self.cell_search_next();
    }

    fn cell_search_next(&mut self) {
        self.free_cell();
        self.aux.cell_search_in_progress = true;
        self.earfcn_cursor += 1;
        let list = self.earfcn.lock().clone();
        if list.is_empty() {
            self.state = SyncState::Idle;
            return;
        }
        if self.earfcn_cursor as usize >= list.len() {
            self.earfcn_cursor = 0;
        }
        self.radio.set_rx_freq(f64::from(list[self.earfcn_cursor as usize]));
        self.state = SyncState::CellSearch;
    }

    fn step_cell_search(&mut self) {
        if let Some(found) = self.dsp.cell_search(None) {
            self.aux.cfo_hz = found.cfo_hz;
            self.last_cell = Some(found.cell);
            let nof_prb = found.cell.nof_prb;
            let srate = (config::sf_len_prb(nof_prb) * 1000) as f64;
            if (30_720_000.0 / srate).fract().abs() < f64::EPSILON {
                self.radio.set_master_clock_rate(30.72e6);
            } else {
                self.radio.set_master_clock_rate(23.04e6);
            }
            self.aux.srate_mode = SampleRateMode::Camp;
            self.radio.set_rx_srate(srate);
            self.radio.set_tx_srate(srate);

            let list = self.earfcn.lock();
            let earfcn = list.get(self.earfcn_cursor.max(0) as usize).copied().unwrap_or(0);
            drop(list);
            self.enter_cell_select(earfcn, found.cell, true);
        } else {
            log::warn!("Cell Search: no cell found on this EARFCN, advancing");
            self.cell_search_next();
        }
    }

    fn enter_cell_select(&mut self, earfcn: u32, cell: CellIdentity, from_scan: bool) {
        self.free_cell();

        match config::earfcn_to_band_freqs(earfcn) {
            Ok((dl_hz, ul_hz)) => {
                self.radio.set_rx_freq(dl_hz);
                self.radio.set_tx_freq(ul_hz);
                self.ul_dl_factor = ul_hz / dl_hz;
            }
            Err(e) => log::error!("Cell Select: {e}"),
        }

        if !self.init_cell(cell) {
            log::error!(
                "Cell Select: initializing cell in EARFCN={earfcn}, PCI={}",
                cell.pci
            );
        }

        self.aux.cell_search_in_progress = from_scan;
        self.aux.sync_sfn_cnt = 0;
        self.state = SyncState::CellSelect;
    }

    /// Transition to Idle, give the run loop a chance to observe it, then
    /// tear down DSP/per-worker state for the outgoing cell.
    fn free_cell(&mut self) {
        if self.state != SyncState::Idle {
            self.state = SyncState::Idle;
            thread::sleep(Duration::from_millis(2));
        }
        if self.cell_is_set {
            for i in 0..self.pool.nof_workers() {
                let _ = self.pool.get_worker(i);
            }
            self.dsp.free_cell();
            self.cell_is_set = false;
        }
    }

    /// Configure DSP/per-worker state for a newly selected cell, set the
    /// radio's TTI length, optionally start AGC, and prime the CFO estimate
    /// carried over from cell search.
    fn init_cell(&mut self, cell: CellIdentity) -> bool {
        for i in 0..self.pool.nof_workers() {
            if self.pool.get_worker(i).is_none() {
                return false;
            }
        }
        if !self.dsp.init_cell(cell) {
            return false;
        }
        self.radio.set_tti_len(config::sf_len_prb(cell.nof_prb));
        if self.do_agc {
            self.aux.agc_gain = self.radio.set_rx_gain_th(self.aux.agc_gain);
        }
        self.cell_is_set = true;
        true
    }

    fn step_cell_select(&mut self) {
        if !self.aux.radio_is_streaming {
            self.radio.start_rx();
            self.aux.radio_is_streaming = true;
        }

        match self.dsp.sync_sfn() {
            Some(_sfn) => {
                if self.aux.cell_search_in_progress {
                    self.aux.measure_cnt = 0;
                    self.aux.measure_rsrp = 0.0;
                    self.state = SyncState::CellMeasure;
                } else {
                    self.state = SyncState::CellCamp;
                }
            }
            None => {
                self.aux.sync_sfn_cnt += 1;
                if self.aux.sync_sfn_cnt >= SYNC_SFN_TIMEOUT {
                    self.aux.sync_sfn_cnt = 0;
                    self.radio.stop_rx();
                    self.aux.radio_is_streaming = false;
                    log::warn!("Timeout while synchronizing SFN");
                }
            }
        }
    }

    fn step_cell_measure(&mut self) {
        match self.dsp.measure_rsrp_dbm() {
            Some(rsrp_dbm) => {
                let n = f64::from(self.aux.measure_cnt);
                self.aux.measure_rsrp = (rsrp_dbm + n * self.aux.measure_rsrp) / (n + 1.0);
                self.aux.measure_cnt += 1;
                if self.aux.measure_cnt >= RSRP_MEASURE_NOF_FRAMES {
                    let list = self.earfcn.lock();
                    let earfcn = list.get(self.earfcn_cursor.max(0) as usize).copied().unwrap_or(0);
                    let cell = self.last_cell.unwrap_or(CellIdentity {
                        pci: 0,
                        cp: crate::sync::state::CyclicPrefix::Normal,
                        nof_ports: 1,
                        nof_prb: 100,
                        earfcn,
                    });
                    drop(list);
                    self.rrc.cell_found(earfcn, cell, self.aux.measure_rsrp);
                    self.aux.cell_search_in_progress = false;
                    self.state = SyncState::CellCamp;
                }
            }
            None => {
                log::error!("SYNC: measuring RSRP cell measurement failed");
                self.cell_search_next();
            }
        }
    }

    /// Returns `false` when the worker pool has closed and the loop should
    /// terminate.
    fn step_cell_camp(&mut self) -> bool {
        self.aux.tti = (self.aux.tti + 1) % TTI_PER_SFN_WRAP;

        let handle = match self.pool.wait_worker(self.aux.tti) {
            Ok(h) => h,
            Err(_) => return false,
        };

        let sf_len = config::sf_len_prb(100);
        let mut buffers = vec![vec![0i16; sf_len * 2]; self.rx_antennas as usize];
        let mut refs: Vec<&mut [i16]> = buffers.iter_mut().map(|b| b.as_mut_slice()).collect();

        let rx_time = self.radio.rx_now(&mut refs, sf_len);

        if self.dsp.zerocopy_fetch(&mut refs) {
            let (sfo, cfo) = self.dsp.sync_metrics();
            self.aux.cfo_hz = cfo;
            self.aux.last_dsp_failure_streak = 0;
            let _ = sfo;

            // Worker CFO, scaled by the band's UL/DL frequency ratio so the
            // uplink synthesizer corrects for the same physical offset
            // measured on the downlink.
            self.aux.worker_cfo_hz = self.ul_dl_factor * cfo / 15_000.0;

            let prach_ready = self.dsp.prach_is_ready(self.aux.tti);
            let time_adv_sec = self.time_adv_sec;
            let tx_mutex_index = handle.tx_mutex_index;

            self.pool.with_tx_mutex(tx_mutex_index, || {
                if let Some(rx_time) = rx_time {
                    // TX timestamp: RX timestamp plus the fixed 4 ms
                    // processing pipeline delay, less the UE's time advance.
                    let tx_advance_secs = (4e-3 - f64::from(time_adv_sec)).max(0.0);
                    let tx_time = rx_time.add(Duration::from_secs_f64(tx_advance_secs));
                    let offset_samples =
                        (tx_advance_secs * sf_len as f64 / 1e-3).round() as i32;
                    self.radio.tx_offset(offset_samples);
                    let _ = tx_time;

                    if prach_ready {
                        let prach_advance_secs = config::PRACH_TX_ADVANCE_SF * 1e-3;
                        let prach_tx_time = rx_time.add(Duration::from_secs_f64(prach_advance_secs));
                        let _ = prach_tx_time;
                        let _preamble = self.dsp.prach_fetch();
                        let prach_offset_samples =
                            (prach_advance_secs * sf_len as f64 / 1e-3).round() as i32;
                        self.radio.tx_offset(prach_offset_samples);
                    }
                }
                self.radio.tx_end();
            });

            self.pool.start_worker(handle);

            if self.aux.tti % 10 == 0 {
                self.rrc.in_sync();
            }
        } else {
            self.aux.last_dsp_failure_streak += 1;
            log::error!(
                "Sync error (streak {}). Sending out-of-sync to RRC",
                self.aux.last_dsp_failure_streak
            );
            self.rrc.out_of_sync();
            self.pool.start_worker(handle);
            self.state = SyncState::CellSelect;
        }

        true
    }
}

#[cfg(all(target_os = "linux"))]
fn apply_realtime_scheduling(priority: i32, cpu_affinity: Option<usize>) -> Result<()> {
    if let Some(core_id) = cpu_affinity {
        unsafe {
            let mut cpu_set: libc::cpu_set_t = std::mem::zeroed();
            libc::CPU_SET(core_id, &mut cpu_set);
            let res = libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &cpu_set);
            if res != 0 {
                return Err(Error::Affinity(format!(
                    "sched_setaffinity(core={core_id}) failed"
                )));
            }
        }
    }
    if priority > 0 {
        unsafe {
            let param = libc::sched_param {
                sched_priority: priority,
            };
            let res = libc::sched_setscheduler(0, libc::SCHED_FIFO, &param);
            if res != 0 {
                return Err(Error::Affinity(format!(
                    "sched_setscheduler(SCHED_FIFO, priority={priority}) failed"
                )));
            }
        }
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn apply_realtime_scheduling(_priority: i32, _cpu_affinity: Option<usize>) -> Result<()> {
    Ok(())
}
