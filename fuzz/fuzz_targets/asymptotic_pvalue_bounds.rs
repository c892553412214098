// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

#[path = "common.rs"]
mod common;

use gseg_core::{SimilarityGraph, StatKind, WindowBounds};
use gseg_pvalue::asymptotic::tilt;
use gseg_pvalue::{AsymptoticConfig, pval1, pval2};
use libfuzzer_sys::fuzz_target;
use std::collections::BTreeMap;

/// Ring plus chords; every node has degree >= 2 so the moments stay defined.
fn build_graph(cursor: &mut common::ByteCursor<'_>, n: usize) -> Option<SimilarityGraph> {
    let mut edges: Vec<(usize, usize)> = (0..n).map(|i| (i, (i + 1) % n)).collect();
    let chords = common::bounded(cursor.next_u8(), 0, 3 * n);
    for _ in 0..chords {
        let u = usize::from(cursor.next_u8()) % n;
        let v = usize::from(cursor.next_u8()) % n;
        edges.push((u, v));
    }
    SimilarityGraph::from_edges(n, &edges).ok()
}

fn build_maximum(cursor: &mut common::ByteCursor<'_>) -> f64 {
    match cursor.next_u8() % 8 {
        0 => f64::NAN,
        1 => f64::INFINITY,
        2 => -f64::from(cursor.next_i16()).abs(),
        3 => cursor.next_f64(),
        _ => f64::from(cursor.next_i16()) / 1024.0,
    }
}

fuzz_target!(|data: &[u8]| {
    let mut cursor = common::ByteCursor::new(data);
    let n = common::bounded(cursor.next_u8(), 4, 80);
    let Some(graph) = build_graph(&mut cursor, n) else {
        return;
    };
    let n0 = common::bounded(cursor.next_u8(), 1, n - 1);
    let n1 = common::bounded(cursor.next_u8(), n0, n - 1);
    let Ok(window) = WindowBounds::new(n0, n1, n) else {
        return;
    };

    let zmax: BTreeMap<StatKind, f64> = StatKind::ALL
        .iter()
        .map(|&kind| (kind, build_maximum(&mut cursor)))
        .collect();
    let config = AsymptoticConfig {
        skew_corr: cursor.next_u8() & 1 == 0,
        ..AsymptoticConfig::default()
    };

    let stats = graph.stats();
    for result in [
        pval1(&stats, &zmax, window, &config),
        pval2(&stats, &zmax, window, &config),
    ] {
        let Ok(pvalues) = result else {
            continue;
        };
        for (kind, p) in &pvalues.values {
            assert!((0.0..=1.0).contains(p), "{kind}: p-value {p} outside [0, 1]");
        }
    }

    let b = f64::from(cursor.next_i16()) / 256.0;
    let r = f64::from(cursor.next_i16()) / 4096.0;
    let (theta, ratio) = tilt(b, r);
    assert!(!theta.is_infinite(), "theta={theta} for b={b}, r={r}");
    let _ = ratio;
});
