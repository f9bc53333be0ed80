// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UE receive-side synchronization core.
//!
//! ```text
//! +-----------+  wait_worker(tti)  +--------------+
//! | SyncEngine | ------------------> | WorkerPool   |
//! | (1 thread) | <------------------ | TTI-ordering |
//! +-----------+  start_worker(h)    | + TX-mutex   |
//!       |                            +--------------+
//!       v
//! {Idle, CellSearch, CellSelect, CellMeasure, CellCamp}
//! ```
//!
//! DSP decode and radio I/O run inline on the engine's single thread inside
//! `step_cell_camp`; the pool lends no decode capacity of its own. It hands
//! out `WorkerHandle`s in strict TTI order and owns the rotating TX-mutex
//! ring those handles index into, so that an uplink submit issued while
//! holding mutex index `k` always serializes against the next submit that
//! rotates onto the same index — the ordering guarantee a multi-worker
//! decode pipeline would need, kept ready for one even though this revision
//! drives it from a single thread.
//!
//! | Component | File |
//! |---|---|
//! | Sync state machine, cell identity, aux fields | [`state`] |
//! | External collaborator traits (radio, DSP, RRC) | [`interfaces`] |
//! | Worker pool gateway | [`worker_pool`] |
//! | Main loop / public contract | [`engine`] |

mod engine;
mod interfaces;
mod state;
mod worker_pool;

pub use engine::SyncEngine;
pub use interfaces::{
    CellSearchResult, DspFrontend, RadioDriver, RadioTimestamp, RrcHandle, SssAlgorithm,
};
pub use state::{CellIdentity, CyclicPrefix, SampleRateMode, SyncState};
pub use worker_pool::{WorkerHandle, WorkerPool, WorkerPoolError};
