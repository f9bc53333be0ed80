// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Optional in-process logging sink.
//!
//! All sync-engine and RLC-AM modules emit diagnostics through the `log`
//! facade crate (`log::debug!`/`info!`/`warn!`/`error!`) so any host
//! application can plug in its own backend (`env_logger`, `tracing-log`,
//! etc.). This module is a separate, optional convenience: a host that does
//! not want to wire up a full `log` backend can call [`init_logger`] with a
//! [`ConsoleOutput`] or [`FileOutput`] sink to capture the same diagnostics
//! directly, independent of whether a `log` backend is installed.

pub mod logger;
mod output;

pub use logger::{flush_logger, init_logger};
pub use output::{ConsoleOutput, FileOutput, LogLevel, Output};
