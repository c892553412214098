// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::GsegError;

/// Builds ascending neighbour lists from a row-major `n x n` matrix.
///
/// Any nonzero off-diagonal entry is an edge. The diagonal is ignored. No
/// validation is performed; see [`SimilarityGraph::from_dense`].
pub fn connectivity_from_dense(values: &[f64], n: usize) -> Vec<Vec<usize>> {
    (0..n)
        .map(|i| {
            let row = &values[i * n..(i + 1) * n];
            row.iter()
                .enumerate()
                .filter(|&(j, &v)| j != i && v != 0.0)
                .map(|(j, _)| j)
                .collect()
        })
        .collect()
}

pub fn degree_sequence(connectivity: &[Vec<usize>]) -> Vec<usize> {
    connectivity.iter().map(Vec::len).collect()
}

/// Pairs `(i, j)` with `i > j`, ordered by `i` then `j`.
pub fn lower_edge_list(connectivity: &[Vec<usize>]) -> Vec<(usize, usize)> {
    let mut edges = Vec::new();
    for (i, links) in connectivity.iter().enumerate() {
        edges.extend(links.iter().copied().filter(|&j| j < i).map(|j| (i, j)));
    }
    edges
}

/// Size of the intersection of two ascending index lists.
fn sorted_intersection_len(left: &[usize], right: &[usize]) -> usize {
    let (mut a, mut b, mut count) = (0, 0, 0);
    while a < left.len() && b < right.len() {
        match left[a].cmp(&right[b]) {
            std::cmp::Ordering::Less => a += 1,
            std::cmp::Ordering::Greater => b += 1,
            std::cmp::Ordering::Equal => {
                count += 1;
                a += 1;
                b += 1;
            }
        }
    }
    count
}

/// Degree-moment summaries of a graph used by the null moments and the
/// skewness corrections.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct GraphStats {
    pub n: usize,
    pub n_edges: usize,
    pub sum_degrees_squared: f64,
    /// `sum d(d-1)`
    pub x1: f64,
    /// `sum d(d-1)(d-2)`
    pub x2: f64,
    /// `sum over edges (d_u - 1)(d_v - 1)`
    pub x3: f64,
    /// `sum d(d-1)(n_edges - d)`
    pub x4: f64,
    /// `sum over edges |N(u) & N(v)|`, i.e. three times the triangle count.
    pub x5: f64,
}

impl GraphStats {
    pub fn n_edges_f64(&self) -> f64 {
        self.n_edges as f64
    }

    /// `0.5 * sum d^2 - n_edges`: number of pairs of edges sharing a node.
    pub fn shared_node_pairs(&self) -> f64 {
        0.5 * self.sum_degrees_squared - self.n_edges_f64()
    }

    /// `n_edges (n_edges - 1) - 2 * shared_node_pairs`: ordered pairs of
    /// disjoint edges.
    pub fn disjoint_edge_pairs(&self) -> f64 {
        let m = self.n_edges_f64();
        m * (m - 1.0) - 2.0 * self.shared_node_pairs()
    }
}

/// Validated undirected similarity graph over linearly ordered nodes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimilarityGraph {
    n: usize,
    connectivity: Vec<Vec<usize>>,
    n_edges: usize,
}

impl SimilarityGraph {
    /// Builds a graph from a row-major `n x n` adjacency matrix.
    pub fn from_dense(values: &[f64], n: usize) -> Result<Self, GsegError> {
        if n == 0 {
            return Err(GsegError::invalid_input("n must be >= 1"));
        }
        let expected_len = n
            .checked_mul(n)
            .ok_or_else(|| GsegError::invalid_input("n*n overflow while validating shape"))?;
        if values.len() != expected_len {
            return Err(GsegError::invalid_input(format!(
                "adjacency length mismatch: got {}, expected {expected_len} (n={n})",
                values.len()
            )));
        }
        if let Some((idx, value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(GsegError::invalid_input(format!(
                "adjacency must be finite: entry ({}, {}) is {value}",
                idx / n,
                idx % n
            )));
        }
        for i in 0..n {
            for j in (i + 1)..n {
                let upper = values[i * n + j];
                let lower = values[j * n + i];
                if upper != lower {
                    return Err(GsegError::invalid_input(format!(
                        "adjacency must be symmetric: E[{i}][{j}]={upper} but E[{j}][{i}]={lower}"
                    )));
                }
            }
        }

        Ok(Self::from_connectivity_unchecked(
            n,
            connectivity_from_dense(values, n),
        ))
    }

    /// Builds a graph from matrix rows; every row must have `rows.len()` entries.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self, GsegError> {
        let n = rows.len();
        let mut values = Vec::with_capacity(n.saturating_mul(n));
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != n {
                return Err(GsegError::invalid_input(format!(
                    "adjacency must be square: row {i} has {} entries, expected {n}",
                    row.len()
                )));
            }
            values.extend_from_slice(row);
        }
        Self::from_dense(&values, n)
    }

    /// Builds a graph from an undirected edge list.
    ///
    /// Self-loops are dropped and repeated edges collapse into one.
    pub fn from_edges(n: usize, edges: &[(usize, usize)]) -> Result<Self, GsegError> {
        if n == 0 {
            return Err(GsegError::invalid_input("n must be >= 1"));
        }
        let mut connectivity = vec![Vec::new(); n];
        for &(u, v) in edges {
            if u >= n || v >= n {
                return Err(GsegError::invalid_input(format!(
                    "edge ({u}, {v}) references a node outside 0..{n}"
                )));
            }
            if u == v {
                continue;
            }
            connectivity[u].push(v);
            connectivity[v].push(u);
        }
        for links in &mut connectivity {
            links.sort_unstable();
            links.dedup();
        }
        Ok(Self::from_connectivity_unchecked(n, connectivity))
    }

    fn from_connectivity_unchecked(n: usize, connectivity: Vec<Vec<usize>>) -> Self {
        let total_degree: usize = connectivity.iter().map(Vec::len).sum();
        Self {
            n,
            connectivity,
            n_edges: total_degree / 2,
        }
    }

    /// Returns the graph with node `k` renamed to `index[k]`.
    ///
    /// The node that ends up at position `i` is the old node `k` with
    /// `index[k] == i`; its neighbours are mapped through `index` as well.
    pub fn relabel(&self, index: &[usize]) -> Result<Self, GsegError> {
        if index.len() != self.n {
            return Err(GsegError::invalid_argument(format!(
                "relabel index length mismatch: got {}, expected {}",
                index.len(),
                self.n
            )));
        }
        let mut inverse = vec![usize::MAX; self.n];
        for (old, &new) in index.iter().enumerate() {
            if new >= self.n || inverse[new] != usize::MAX {
                return Err(GsegError::invalid_argument(
                    "relabel index must be a permutation of 0..n",
                ));
            }
            inverse[new] = old;
        }

        let connectivity = inverse
            .iter()
            .map(|&old| {
                let mut links: Vec<usize> =
                    self.connectivity[old].iter().map(|&k| index[k]).collect();
                links.sort_unstable();
                links
            })
            .collect();
        Ok(Self {
            n: self.n,
            connectivity,
            n_edges: self.n_edges,
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn n_edges(&self) -> usize {
        self.n_edges
    }

    pub fn connectivity(&self) -> &[Vec<usize>] {
        &self.connectivity
    }

    pub fn neighbors(&self, node: usize) -> &[usize] {
        &self.connectivity[node]
    }

    pub fn degrees(&self) -> Vec<usize> {
        degree_sequence(&self.connectivity)
    }

    pub fn sum_degrees_squared(&self) -> f64 {
        self.connectivity
            .iter()
            .map(|links| {
                let d = links.len() as f64;
                d * d
            })
            .sum()
    }

    pub fn edge_list(&self) -> Vec<(usize, usize)> {
        lower_edge_list(&self.connectivity)
    }

    /// Computes the degree-moment summaries in one pass over nodes and edges.
    pub fn stats(&self) -> GraphStats {
        let m = self.n_edges as f64;
        let (mut sum_sq, mut x1, mut x2, mut x4) = (0.0, 0.0, 0.0, 0.0);
        for links in &self.connectivity {
            let d = links.len() as f64;
            sum_sq += d * d;
            x1 += d * (d - 1.0);
            x2 += d * (d - 1.0) * (d - 2.0);
            x4 += d * (d - 1.0) * (m - d);
        }

        let (mut x3, mut x5) = (0.0, 0.0);
        for (u, links) in self.connectivity.iter().enumerate() {
            let du = links.len() as f64;
            for &v in links.iter().filter(|&&v| v < u) {
                let dv = self.connectivity[v].len() as f64;
                x3 += (du - 1.0) * (dv - 1.0);
                x5 += sorted_intersection_len(links, &self.connectivity[v]) as f64;
            }
        }

        GraphStats {
            n: self.n,
            n_edges: self.n_edges,
            sum_degrees_squared: sum_sq,
            x1,
            x2,
            x3,
            x4,
            x5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SimilarityGraph, connectivity_from_dense, lower_edge_list};

    fn triangle_with_tail() -> SimilarityGraph {
        // 0-1-2 triangle, 2-3 tail.
        SimilarityGraph::from_edges(4, &[(0, 1), (1, 2), (0, 2), (2, 3)])
            .expect("edge list should be valid")
    }

    #[test]
    fn dense_connectivity_ignores_diagonal() {
        let values = [
            1.0, 1.0, 0.0, //
            1.0, 5.0, 2.0, //
            0.0, 2.0, 0.0,
        ];
        let conn = connectivity_from_dense(&values, 3);
        assert_eq!(conn, vec![vec![1], vec![0, 2], vec![1]]);
        assert_eq!(lower_edge_list(&conn), vec![(1, 0), (2, 1)]);
    }

    #[test]
    fn degrees_sum_to_twice_edge_count() {
        let graph = triangle_with_tail();
        let degrees = graph.degrees();
        assert_eq!(degrees, vec![2, 2, 3, 1]);
        assert_eq!(degrees.iter().sum::<usize>(), 2 * graph.n_edges());
        assert_eq!(graph.sum_degrees_squared(), 18.0);
    }

    #[test]
    fn stats_match_hand_computed_moment_sums() {
        let stats = triangle_with_tail().stats();
        assert_eq!(stats.n_edges, 4);
        assert_eq!(stats.x1, 2.0 + 2.0 + 6.0);
        assert_eq!(stats.x2, 6.0);
        // edges (1,0):1*1, (2,0):2*1, (2,1):2*1, (3,2):0*2
        assert_eq!(stats.x3, 5.0);
        // d(d-1)(m-d): 2*2 + 2*2 + 6*1 + 0
        assert_eq!(stats.x4, 14.0);
        // each triangle edge shares one common neighbour
        assert_eq!(stats.x5, 3.0);
        assert_eq!(stats.shared_node_pairs(), 5.0);
        assert_eq!(stats.disjoint_edge_pairs(), 2.0);
    }

    #[test]
    fn from_dense_rejects_bad_shapes_and_values() {
        assert!(SimilarityGraph::from_dense(&[], 0).is_err());
        assert!(SimilarityGraph::from_dense(&[0.0; 5], 2).is_err());

        let asymmetric = [0.0, 1.0, 0.0, 0.0];
        let err = SimilarityGraph::from_dense(&asymmetric, 2).expect_err("asymmetric input");
        assert!(err.to_string().contains("symmetric"));

        let non_finite = [0.0, f64::NAN, f64::NAN, 0.0];
        let err = SimilarityGraph::from_dense(&non_finite, 2).expect_err("NaN input");
        assert!(err.to_string().contains("finite"));
    }

    #[test]
    fn from_rows_requires_square_input() {
        let rows = vec![vec![0.0, 1.0], vec![1.0]];
        let err = SimilarityGraph::from_rows(&rows).expect_err("ragged rows must fail");
        assert!(err.to_string().contains("square"));

        let rows = vec![vec![0.0, 1.0], vec![1.0, 0.0]];
        let graph = SimilarityGraph::from_rows(&rows).expect("square rows should work");
        assert_eq!(graph.n_edges(), 1);
    }

    #[test]
    fn from_edges_drops_loops_and_duplicates() {
        let graph = SimilarityGraph::from_edges(3, &[(0, 1), (1, 0), (2, 2), (1, 2)])
            .expect("edges should be valid");
        assert_eq!(graph.n_edges(), 2);
        assert_eq!(graph.neighbors(1), &[0, 2]);
        assert!(SimilarityGraph::from_edges(3, &[(0, 3)]).is_err());
    }

    #[test]
    fn relabel_moves_node_k_to_index_k() {
        let graph = triangle_with_tail();
        // old node 3 (the tail) becomes node 0, and so on.
        let index = [1, 2, 3, 0];
        let relabeled = graph.relabel(&index).expect("valid permutation");
        assert_eq!(relabeled.n_edges(), graph.n_edges());
        assert_eq!(relabeled.neighbors(0), &[3]);
        assert_eq!(relabeled.neighbors(3), &[0, 1, 2]);
        assert_eq!(relabeled.stats(), graph.stats());

        assert!(graph.relabel(&[0, 0, 1, 2]).is_err());
        assert!(graph.relabel(&[0, 1]).is_err());
    }
}
