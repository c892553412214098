// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

#[path = "common.rs"]
mod common;

use gseg_core::{
    BudgetMode, Constraints, ExecutionContext, ScanWindow, SimilarityGraph, StatKind,
    StatSelection,
};
use gseg_pvalue::{AsymptoticConfig, PermutationConfig, permpval2, permval1, pval1, pval2};
use gseg_scan::{changepoint1, changepoint2};
use libfuzzer_sys::fuzz_target;

fn build_selection(seed: u8) -> StatSelection {
    match seed % 5 {
        0 => StatSelection::All,
        k => StatSelection::Single(StatKind::ALL[usize::from(k - 1)]),
    }
}

fn build_window(cursor: &mut common::ByteCursor<'_>, n: usize) -> ScanWindow {
    let n0 = (cursor.next_u8() & 1 == 1).then(|| common::bounded(cursor.next_u8(), 0, n));
    let n1 = (cursor.next_u8() & 1 == 1).then(|| common::bounded(cursor.next_u8(), 0, n));
    ScanWindow::new(n0, n1)
}

/// Dense matrix with the occasional malformed entry so validation is exercised too.
fn build_adjacency(cursor: &mut common::ByteCursor<'_>, n: usize) -> Vec<f64> {
    let density = cursor.next_u8();
    let corrupt = cursor.next_u8();
    let mut values = vec![0.0; n * n];
    for i in 0..n {
        for j in (i + 1)..n {
            if cursor.next_u8() < density {
                values[i * n + j] = 1.0;
                values[j * n + i] = 1.0;
            }
        }
    }
    match corrupt % 16 {
        0 if n > 1 => values[1] = 2.5,
        1 => values[0] = f64::NAN,
        2 if n > 2 => values[n * n - 1] = f64::INFINITY,
        _ => {}
    }
    values
}

fn assert_probability(p: f64) {
    assert!((0.0..=1.0).contains(&p), "p-value {p} outside [0, 1]");
}

fuzz_target!(|data: &[u8]| {
    let mut cursor = common::ByteCursor::new(data);
    let n = common::bounded(cursor.next_u8(), 1, 40);
    let selection = build_selection(cursor.next_u8());
    let window = build_window(&mut cursor, n);
    let interval = cursor.next_u8() & 1 == 1;
    let skew_corr = cursor.next_u8() & 1 == 0;
    let permutations = common::bounded(cursor.next_u8(), 0, 6);
    let seed = cursor.next_u64();
    let adjacency = build_adjacency(&mut cursor, n);

    let Ok(graph) = SimilarityGraph::from_dense(&adjacency, n) else {
        return;
    };
    let Ok(window) = window.resolve(graph.n()) else {
        return;
    };

    let constraints = Constraints::default();
    let ctx = ExecutionContext::new(&constraints).with_budget_mode(BudgetMode::SoftDegrade);
    let config = AsymptoticConfig {
        skew_corr,
        ..AsymptoticConfig::default()
    };
    let stats = graph.stats();

    let observed = if interval {
        let Ok(scan) = changepoint2(&graph, selection, window, &ctx) else {
            return;
        };
        scan.zmax()
    } else {
        let Ok(scan) = changepoint1(&graph, selection, window) else {
            return;
        };
        scan.zmax()
    };

    let asymptotic = if interval {
        pval2(&stats, &observed, window, &config)
    } else {
        pval1(&stats, &observed, window, &config)
    };
    if let Ok(pvalues) = asymptotic {
        pvalues.values.values().copied().for_each(assert_probability);
    }

    if permutations > 0 {
        let perm_config = PermutationConfig {
            permutations,
            seed,
        };
        let result = if interval {
            permpval2(&graph, selection, window, &observed, &perm_config, &ctx)
        } else {
            permval1(&graph, selection, window, &observed, &perm_config, &ctx)
        };
        if let Ok(result) = result {
            for outcome in result.outcomes.values() {
                assert_probability(outcome.pval);
            }
        }
    }
});
