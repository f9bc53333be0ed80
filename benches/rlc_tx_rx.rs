// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RLC AM TX/RX Benchmark
//!
//! Measures `read_pdu()`/`handle_data_pdu()` cost with different:
//! - Payload sizes (small control-plane-sized SDUs up to near-MTU)
//! - In-order vs out-of-order delivery (reassembly map overhead)
//!
//! This benchmark isolates the RLC layer's per-PDU overhead without MAC or
//! radio I/O.

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_possible_truncation)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ue_rlc_sync::config::RlcBearerConfig;
use ue_rlc_sync::rlc::RlcAmEntity;

/// Benchmark `read_pdu()` cost with different SDU sizes.
fn bench_read_pdu_by_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("rlc_tx_read_pdu_by_size");

    for size in [16, 64, 256, 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mut entity = RlcAmEntity::new();
            entity.configure(RlcBearerConfig::default()).unwrap();
            let mut buf = vec![0u8; size + 8];

            b.iter(|| {
                entity.tx.write_sdu(vec![0xAB; size]).unwrap();
                let len = entity.tx.read_pdu(&mut buf).unwrap();
                black_box(len)
            });
        });
    }

    group.finish();
}

/// Benchmark `handle_data_pdu()` for in-order arrival, the fast path that
/// never touches the reassembly map beyond the current SN.
fn bench_handle_data_pdu_in_order(c: &mut Criterion) {
    let mut group = c.benchmark_group("rlc_rx_in_order");

    group.bench_function("handle_data_pdu", |b| {
        let mut tx_entity = RlcAmEntity::new();
        tx_entity.configure(RlcBearerConfig::default()).unwrap();
        let mut rx_entity = RlcAmEntity::new();
        rx_entity.configure(RlcBearerConfig::default()).unwrap();
        let mut buf = [0u8; 256];

        b.iter(|| {
            tx_entity.tx.write_sdu(vec![0xCD; 128]).unwrap();
            let len = tx_entity.tx.read_pdu(&mut buf).unwrap();
            rx_entity.rx.handle_data_pdu(&buf[..len]).unwrap();
            black_box(rx_entity.rx.take_delivered())
        });
    });

    group.finish();
}

/// Benchmark `handle_data_pdu()` when every third PDU arrives out of order,
/// forcing the reassembly map to hold entries rather than deliver inline.
fn bench_handle_data_pdu_reordered(c: &mut Criterion) {
    let mut group = c.benchmark_group("rlc_rx_reordered");

    group.bench_function("handle_data_pdu", |b| {
        let mut tx_entity = RlcAmEntity::new();
        tx_entity.configure(RlcBearerConfig::default()).unwrap();
        let mut rx_entity = RlcAmEntity::new();
        rx_entity.configure(RlcBearerConfig::default()).unwrap();
        let mut bufs = [[0u8; 256]; 3];

        b.iter(|| {
            for buf in &mut bufs {
                tx_entity.tx.write_sdu(vec![0xEF; 128]).unwrap();
                let len = tx_entity.tx.read_pdu(buf).unwrap();
                black_box(len);
            }
            // deliver SN order 1, 2, 0 within the batch
            let _ = rx_entity.rx.handle_data_pdu(&bufs[1]);
            let _ = rx_entity.rx.handle_data_pdu(&bufs[2]);
            let _ = rx_entity.rx.handle_data_pdu(&bufs[0]);
            black_box(rx_entity.rx.take_delivered())
        });
    });

    group.finish();
}

criterion_group!(
    rlc_benches,
    bench_read_pdu_by_size,
    bench_handle_data_pdu_in_order,
    bench_handle_data_pdu_reordered,
);
criterion_main!(rlc_benches);
