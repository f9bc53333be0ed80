// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # UE Sync + RLC-AM — cellular receive-side core
//!
//! A realtime UE (User Equipment) synchronization loop paired with an
//! Acknowledged-Mode RLC (Radio Link Control) entity for NR/LTE-style
//! link layers.
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                      RRC / MAC / Upper Layers                       |
//! +---------------------------------------------------------------------+
//! |  Sync Engine            |  Worker Pool      |  RLC-AM Entity        |
//! |  {Idle,Search,Select,    |  wait_worker()    |  TX: queue/poll/retx |
//! |   Measure,Camp}          |  start_worker()   |  RX: reorder/status  |
//! +---------------------------------------------------------------------+
//! |                 Radio driver / DSP frontend (external)              |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ue_rlc_sync::config::RlcBearerConfig;
//! use ue_rlc_sync::rlc::RlcAmEntity;
//!
//! let mut bearer = RlcAmEntity::new();
//! bearer.configure(RlcBearerConfig::default()).unwrap();
//! bearer.tx.write_sdu(vec![1, 2, 3]).unwrap();
//! let mut buf = [0u8; 64];
//! let n = bearer.tx.read_pdu(&mut buf).unwrap();
//! assert!(n > 0);
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod rlc;
pub mod sync;

pub use error::{Error, Result};
