//! Immutable compressed-sparse-row representation of an undirected weighted
//! network.
//!
//! Each undirected edge is stored twice, once in either direction. Self-links
//! are not stored in the adjacency; their total weight is kept as a scalar.

use nalgebra_sparse::CsrMatrix;
use petgraph::graph::UnGraph;
use petgraph::visit::EdgeRef;

use crate::error::{Error, Result};

mod transform;

/// How node weights are assigned at construction.
#[derive(Debug, Clone)]
pub enum NodeWeights {
    /// Every node gets weight 1.
    Unit,
    /// Each node's weight is the sum of its incident edge weights,
    /// self-links excluded.
    TotalEdgeWeights,
    /// Caller-supplied weights, one per node.
    Explicit(Vec<f64>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    n_nodes: usize,
    node_weights: Vec<f64>,
    first_neighbor_indices: Vec<usize>,
    neighbors: Vec<usize>,
    edge_weights: Vec<f64>,
    total_edge_weight_self_links: f64,
}

impl Network {
    /// Builds a network from an edge list.
    ///
    /// Unless `sorted` is set, edges are given once per undirected pair and in
    /// any order; the builder symmetrises and sorts them. With `sorted` set,
    /// `edges` must already hold both directions of every edge in
    /// lexicographic order. Self-links are folded into the self-link total
    /// either way and never enter the adjacency.
    pub fn from_edges(
        n_nodes: usize,
        edges: &[(usize, usize)],
        edge_weights: Option<&[f64]>,
        node_weights: NodeWeights,
        sorted: bool,
        check_integrity: bool,
    ) -> Result<Self> {
        if let Some(weights) = edge_weights {
            if weights.len() != edges.len() {
                return Err(Error::InvalidNetwork(format!(
                    "edge weight array has length {}, expected {}",
                    weights.len(),
                    edges.len()
                )));
            }
        }
        for &(u, v) in edges {
            if u >= n_nodes || v >= n_nodes {
                return Err(Error::InvalidNetwork(format!(
                    "edge ({u}, {v}) references a node outside 0..{n_nodes}"
                )));
            }
        }

        let weight_of = |i: usize| edge_weights.map_or(1.0, |w| w[i]);

        let mut total_edge_weight_self_links = 0.0;
        let mut directed: Vec<(usize, usize, f64)> =
            Vec::with_capacity(if sorted { edges.len() } else { 2 * edges.len() });
        for (i, &(u, v)) in edges.iter().enumerate() {
            if u == v {
                total_edge_weight_self_links += weight_of(i);
            } else if sorted {
                directed.push((u, v, weight_of(i)));
            } else {
                directed.push((u, v, weight_of(i)));
                directed.push((v, u, weight_of(i)));
            }
        }
        if !sorted {
            directed.sort_unstable_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        }

        let mut first_neighbor_indices = Vec::with_capacity(n_nodes + 1);
        let mut neighbors = Vec::with_capacity(directed.len());
        let mut weights = Vec::with_capacity(directed.len());
        first_neighbor_indices.push(0);
        let mut node = 0;
        for &(u, v, w) in &directed {
            while node < u {
                first_neighbor_indices.push(neighbors.len());
                node += 1;
            }
            neighbors.push(v);
            weights.push(w);
        }
        while node < n_nodes {
            first_neighbor_indices.push(neighbors.len());
            node += 1;
        }

        let node_weights =
            resolve_node_weights(node_weights, n_nodes, &first_neighbor_indices, &weights)?;

        let network = Network {
            n_nodes,
            node_weights,
            first_neighbor_indices,
            neighbors,
            edge_weights: weights,
            total_edge_weight_self_links,
        };
        if check_integrity {
            network.check_integrity()?;
        }
        Ok(network)
    }

    /// Builds a network from pre-assembled CSR adjacency arrays.
    pub fn from_adjacency(
        first_neighbor_indices: Vec<usize>,
        neighbors: Vec<usize>,
        edge_weights: Option<Vec<f64>>,
        node_weights: NodeWeights,
        check_integrity: bool,
    ) -> Result<Self> {
        if first_neighbor_indices.is_empty() {
            return Err(Error::InvalidNetwork(
                "first neighbor index array is empty".into(),
            ));
        }
        let n_nodes = first_neighbor_indices.len() - 1;
        let edge_weights = edge_weights.unwrap_or_else(|| vec![1.0; neighbors.len()]);
        if edge_weights.len() != neighbors.len() {
            return Err(Error::InvalidNetwork(format!(
                "edge weight array has length {}, expected {}",
                edge_weights.len(),
                neighbors.len()
            )));
        }
        let node_weights =
            resolve_node_weights(node_weights, n_nodes, &first_neighbor_indices, &edge_weights)?;
        let network = Network {
            n_nodes,
            node_weights,
            first_neighbor_indices,
            neighbors,
            edge_weights,
            total_edge_weight_self_links: 0.0,
        };
        if check_integrity {
            network.check_integrity()?;
        }
        Ok(network)
    }

    /// Builds a network from a petgraph undirected graph whose node and edge
    /// weights are the network's node and edge weights.
    pub fn from_graph(graph: &UnGraph<f64, f64>) -> Result<Self> {
        let mut edges = Vec::with_capacity(graph.edge_count());
        let mut weights = Vec::with_capacity(graph.edge_count());
        for edge in graph.edge_references() {
            edges.push((edge.source().index(), edge.target().index()));
            weights.push(*edge.weight());
        }
        let node_weights: Vec<f64> = graph.node_weights().copied().collect();
        Self::from_edges(
            graph.node_count(),
            &edges,
            Some(&weights),
            NodeWeights::Explicit(node_weights),
            false,
            false,
        )
    }

    /// Builds a network from the upper triangle of a symmetric sparse matrix.
    pub fn from_csr_matrix(matrix: &CsrMatrix<f64>, node_weights: NodeWeights) -> Result<Self> {
        if matrix.nrows() != matrix.ncols() {
            return Err(Error::InvalidNetwork(format!(
                "adjacency matrix is {}x{}, expected square",
                matrix.nrows(),
                matrix.ncols()
            )));
        }
        let mut edges = Vec::new();
        let mut weights = Vec::new();
        for (row, col, &weight) in matrix.triplet_iter() {
            if row <= col && weight != 0.0 {
                edges.push((row, col));
                weights.push(weight);
            }
        }
        Self::from_edges(
            matrix.nrows(),
            &edges,
            Some(&weights),
            node_weights,
            false,
            false,
        )
    }

    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.n_nodes
    }

    /// Number of directed edges; each undirected edge counts twice.
    #[inline]
    pub fn n_edges(&self) -> usize {
        self.neighbors.len()
    }

    #[inline]
    pub fn n_undirected_edges(&self) -> usize {
        self.neighbors.len() / 2
    }

    #[inline]
    pub fn node_weight(&self, node: usize) -> f64 {
        self.node_weights[node]
    }

    #[inline]
    pub fn node_weights(&self) -> &[f64] {
        &self.node_weights
    }

    #[inline]
    pub fn degree(&self, node: usize) -> usize {
        self.first_neighbor_indices[node + 1] - self.first_neighbor_indices[node]
    }

    /// Iterates over `(neighbor, edge_weight)` pairs of a node, in ascending
    /// neighbor order.
    #[inline]
    pub fn neighbors(&self, node: usize) -> NeighborIterator<'_> {
        let start = self.first_neighbor_indices[node];
        let end = self.first_neighbor_indices[node + 1];
        NeighborIterator {
            neighbors: &self.neighbors[start..end],
            weights: &self.edge_weights[start..end],
            position: 0,
        }
    }

    /// Total incident edge weight of a node, self-links excluded.
    pub fn strength(&self, node: usize) -> f64 {
        let start = self.first_neighbor_indices[node];
        let end = self.first_neighbor_indices[node + 1];
        self.edge_weights[start..end].iter().sum()
    }

    pub fn total_node_weight(&self) -> f64 {
        self.node_weights.iter().sum()
    }

    /// Total undirected edge weight, self-links excluded.
    pub fn total_edge_weight(&self) -> f64 {
        self.edge_weights.iter().sum::<f64>() / 2.0
    }

    #[inline]
    pub fn total_edge_weight_self_links(&self) -> f64 {
        self.total_edge_weight_self_links
    }

    /// Writes each node's total incident edge weight into `result`.
    pub fn total_edge_weight_per_node(&self, result: &mut Vec<f64>) {
        result.clear();
        result.extend((0..self.n_nodes).map(|node| self.strength(node)));
    }

    /// A copy of this network whose node weights are the per-node total
    /// incident edge weights. Used to rewrite modularity as CPM.
    pub fn with_node_weights_set_to_total_edge_weights(&self) -> Network {
        let mut network = self.clone();
        network.node_weights = (0..self.n_nodes).map(|node| self.strength(node)).collect();
        network
    }

    /// Verifies the CSR invariants, naming the first violated one.
    pub fn check_integrity(&self) -> Result<()> {
        if self.first_neighbor_indices.len() != self.n_nodes + 1 {
            return Err(Error::InvalidNetwork(format!(
                "first neighbor index array has length {}, expected {}",
                self.first_neighbor_indices.len(),
                self.n_nodes + 1
            )));
        }
        if self.first_neighbor_indices[0] != 0
            || self.first_neighbor_indices[self.n_nodes] != self.neighbors.len()
        {
            return Err(Error::InvalidNetwork(
                "first neighbor indices do not span the edge arrays".into(),
            ));
        }
        if self.edge_weights.len() != self.neighbors.len() {
            return Err(Error::InvalidNetwork(format!(
                "edge weight array has length {}, expected {}",
                self.edge_weights.len(),
                self.neighbors.len()
            )));
        }
        if self.node_weights.len() != self.n_nodes {
            return Err(Error::InvalidNetwork(format!(
                "node weight array has length {}, expected {}",
                self.node_weights.len(),
                self.n_nodes
            )));
        }
        for node in 0..self.n_nodes {
            let start = self.first_neighbor_indices[node];
            let end = self.first_neighbor_indices[node + 1];
            if end < start {
                return Err(Error::InvalidNetwork(format!(
                    "first neighbor indices decrease at node {node}"
                )));
            }
            for i in start..end {
                let neighbor = self.neighbors[i];
                if neighbor >= self.n_nodes {
                    return Err(Error::InvalidNetwork(format!(
                        "node {node} has neighbor {neighbor} outside 0..{}",
                        self.n_nodes
                    )));
                }
                if neighbor == node {
                    return Err(Error::InvalidNetwork(format!(
                        "node {node} has a self-loop in the adjacency"
                    )));
                }
                if i > start && self.neighbors[i - 1] >= neighbor {
                    return Err(Error::InvalidNetwork(format!(
                        "neighbors of node {node} are not strictly increasing"
                    )));
                }
                match self.reverse_edge_weight(neighbor, node) {
                    Some(weight) if weight == self.edge_weights[i] => {}
                    Some(_) => {
                        return Err(Error::InvalidNetwork(format!(
                            "edge ({node}, {neighbor}) has asymmetric weights"
                        )));
                    }
                    None => {
                        return Err(Error::InvalidNetwork(format!(
                            "edge ({node}, {neighbor}) has no reverse edge"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn reverse_edge_weight(&self, from: usize, to: usize) -> Option<f64> {
        let start = self.first_neighbor_indices[from];
        let end = self.first_neighbor_indices[from + 1];
        self.neighbors[start..end]
            .binary_search(&to)
            .ok()
            .map(|position| self.edge_weights[start + position])
    }
}

fn resolve_node_weights(
    node_weights: NodeWeights,
    n_nodes: usize,
    first_neighbor_indices: &[usize],
    edge_weights: &[f64],
) -> Result<Vec<f64>> {
    match node_weights {
        NodeWeights::Unit => Ok(vec![1.0; n_nodes]),
        NodeWeights::TotalEdgeWeights => Ok((0..n_nodes)
            .map(|node| {
                edge_weights[first_neighbor_indices[node]..first_neighbor_indices[node + 1]]
                    .iter()
                    .sum()
            })
            .collect()),
        NodeWeights::Explicit(weights) => {
            if weights.len() != n_nodes {
                return Err(Error::InvalidNetwork(format!(
                    "node weight array has length {}, expected {n_nodes}",
                    weights.len()
                )));
            }
            Ok(weights)
        }
    }
}

pub struct NeighborIterator<'a> {
    neighbors: &'a [usize],
    weights: &'a [f64],
    position: usize,
}

impl Iterator for NeighborIterator<'_> {
    type Item = (usize, f64);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.position == self.neighbors.len() {
            return None;
        }
        let item = (self.neighbors[self.position], self.weights[self.position]);
        self.position += 1;
        Some(item)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.neighbors.len() - self.position;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for NeighborIterator<'_> {}
