// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-wide error type.
//!
//! Covers the three failure severities of the sync/dispatch core (transient,
//! operational, fatal) and the RLC-AM entity boundary errors. Transient and
//! operational conditions are normally *not* constructed as `Error` values —
//! they are counted and folded into a state transition — but the variants
//! exist so internal helpers have a uniform way to report them when they do
//! cross a function boundary.

/// Errors returned by sync-engine and RLC-AM operations.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Sync engine errors
    // ========================================================================
    /// EARFCN value has no valid band mapping.
    InvalidEarfcn(u32),
    /// DSP handle initialization failed (`init_cell`).
    DspInitFailed(String),
    /// Radio frequency/sample-rate tuning failed.
    RadioTuneFailed(String),
    /// Worker pool has been closed; no further TTIs can be issued.
    WorkerPoolClosed,

    // ========================================================================
    // RLC TX errors
    // ========================================================================
    /// SDU queue is bounded and full.
    QueueFull,
    /// SDU does not fit in `max_bytes` even as a first segment; segmentation
    /// is not implemented by this revision (see design notes).
    SegmentationUnsupported { sdu_len: usize, max_bytes: usize },
    /// `configure()` rejected a bearer config whose queue length exceeds the
    /// maximum SDUs representable per RLC PDU.
    TxQueueTooLong { configured: usize, max: usize },
    /// Encoded PDU would not fit in the caller-provided buffer.
    BufferTooSmall { needed: usize, available: usize },

    // ========================================================================
    // RLC RX errors
    // ========================================================================
    /// PDU header failed to parse.
    MalformedPdu(String),
    /// Sequence number already delivered to the upper layer.
    DuplicateSn(u16),
    /// Sequence number falls outside `[rx_next, rx_next + window_size)`.
    OutOfWindow { sn: u16 },

    // ========================================================================
    // Configuration / platform errors
    // ========================================================================
    /// Bearer or engine configuration is invalid.
    InvalidConfig(String),
    /// CPU affinity or realtime-priority syscall failed.
    Affinity(String),
    /// Underlying I/O error.
    Io(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidEarfcn(earfcn) => write!(f, "invalid EARFCN: {earfcn}"),
            Error::DspInitFailed(msg) => write!(f, "DSP init failed: {msg}"),
            Error::RadioTuneFailed(msg) => write!(f, "radio tune failed: {msg}"),
            Error::WorkerPoolClosed => write!(f, "worker pool closed"),
            Error::QueueFull => write!(f, "SDU queue full"),
            Error::SegmentationUnsupported { sdu_len, max_bytes } => write!(
                f,
                "segmentation not supported: SDU of {sdu_len} bytes does not fit in {max_bytes} bytes"
            ),
            Error::TxQueueTooLong { configured, max } => write!(
                f,
                "tx_queue_length {configured} exceeds MAX_SDUS_PER_RLC_PDU {max}"
            ),
            Error::BufferTooSmall { needed, available } => {
                write!(f, "buffer too small: need {needed}, have {available}")
            }
            Error::MalformedPdu(msg) => write!(f, "malformed PDU: {msg}"),
            Error::DuplicateSn(sn) => write!(f, "duplicate SN: {sn}"),
            Error::OutOfWindow { sn } => write!(f, "SN {sn} outside receive window"),
            Error::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Error::Affinity(msg) => write!(f, "affinity/priority error: {msg}"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// Convenient alias for results using the crate's `Error` type.
pub type Result<T> = core::result::Result<T, Error>;
