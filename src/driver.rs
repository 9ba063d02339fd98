//! Top-level drivers: multi-random-start clustering and layout runs.

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crate::clustering::Clustering;
use crate::community_search::{calc_cpm_quality, leiden::Leiden, louvain::Louvain};
use crate::error::{Error, Result};
use crate::layout::vos::GradientDescentLayout;
use crate::layout::Layout;
use crate::network::Network;

/// Which multilevel algorithm optimises the clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusteringAlgorithm {
    Leiden,
    Louvain,
}

/// Quality function for clustering runs.
///
/// Modularity is rewritten into CPM before optimisation: node weights become
/// total incident edge weights and the resolution is divided by twice the
/// total edge weight plus the self-link total.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClusteringQuality {
    Cpm { resolution: f64 },
    Modularity { resolution: f64 },
}

/// Quality function for layout runs. LinLog is VOS with linear attraction
/// and logarithmic repulsion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayoutQuality {
    Vos {
        attraction: i32,
        repulsion: i32,
        edge_weight_increment: f64,
    },
    LinLog,
}

/// Edge-weight normalisation applied before a run. All variants reset node
/// weights to 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    None,
    AssociationStrength,
    Fractionalization,
}

impl Normalization {
    fn apply(self, network: &Network) -> Network {
        match self {
            Normalization::None => network.create_network_without_normalization(),
            Normalization::AssociationStrength => {
                network.create_normalized_network_using_association_strength()
            }
            Normalization::Fractionalization => {
                network.create_normalized_network_using_fractionalization()
            }
        }
    }
}

/// Runs a clustering algorithm from several random starts and keeps the
/// highest-quality result, size-ordered and optionally stripped of small
/// clusters.
pub struct ClusteringRunner {
    algorithm: ClusteringAlgorithm,
    quality: ClusteringQuality,
    normalization: Normalization,
    n_random_starts: usize,
    n_iterations: usize,
    randomness: f64,
    min_cluster_size: usize,
    seed: u64,
    network: Option<Network>,
}

impl ClusteringRunner {
    pub fn new(algorithm: ClusteringAlgorithm, quality: ClusteringQuality) -> Self {
        ClusteringRunner {
            algorithm,
            quality,
            normalization: Normalization::None,
            n_random_starts: 1,
            n_iterations: 10,
            randomness: 0.01,
            min_cluster_size: 1,
            seed: 0,
            network: None,
        }
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn with_n_random_starts(mut self, n_random_starts: usize) -> Self {
        self.n_random_starts = n_random_starts;
        self
    }

    /// `n_iterations == 0` iterates each start until no improvement.
    pub fn with_n_iterations(mut self, n_iterations: usize) -> Self {
        self.n_iterations = n_iterations;
        self
    }

    pub fn with_randomness(mut self, randomness: f64) -> Self {
        self.randomness = randomness;
        self
    }

    /// Clusters smaller than this are merged into a neighboring cluster
    /// after the run.
    pub fn with_min_cluster_size(mut self, min_cluster_size: usize) -> Self {
        self.min_cluster_size = min_cluster_size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn set_network(&mut self, network: Network) {
        self.network = Some(network);
    }

    pub fn run(&self) -> Result<Clustering> {
        self.run_from(None)
    }

    /// Like [`run`](Self::run), but every random start begins from the given
    /// clustering instead of singletons.
    pub fn run_from(&self, initial: Option<&Clustering>) -> Result<Clustering> {
        let network = self.network.as_ref().ok_or(Error::Uninitialized)?;
        if network.n_nodes() == 0 {
            return Err(Error::InvalidParameter {
                name: "network",
                message: "network has no nodes",
            });
        }
        let resolution = match self.quality {
            ClusteringQuality::Cpm { resolution }
            | ClusteringQuality::Modularity { resolution } => resolution,
        };
        if resolution < 0.0 {
            return Err(Error::InvalidParameter {
                name: "resolution",
                message: "resolution must be non-negative",
            });
        }
        if self.randomness <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "randomness",
                message: "randomness must be positive",
            });
        }
        if let Some(initial) = initial {
            if initial.n_nodes() != network.n_nodes() {
                return Err(Error::InvalidParameter {
                    name: "initial",
                    message: "initial clustering does not cover the network",
                });
            }
        }

        let normalized = self.normalization.apply(network);
        let (network, resolution) = match self.quality {
            ClusteringQuality::Cpm { .. } => (normalized, resolution),
            ClusteringQuality::Modularity { .. } => {
                let rewritten = normalized.with_node_weights_set_to_total_edge_weights();
                let normaliser = 2.0 * rewritten.total_edge_weight()
                    + rewritten.total_edge_weight_self_links();
                let resolution = if normaliser > 0.0 {
                    resolution / normaliser
                } else {
                    resolution
                };
                (rewritten, resolution)
            }
        };

        let mut rng = ChaCha20Rng::seed_from_u64(self.seed);
        let mut best: Option<(Clustering, f64)> = None;
        for start in 0..self.n_random_starts.max(1) {
            let mut clustering = match initial {
                Some(initial) => initial.clone(),
                None => Clustering::new_singleton(network.n_nodes()),
            };
            match self.algorithm {
                ClusteringAlgorithm::Leiden => {
                    let mut leiden = Leiden::new(resolution, self.randomness, self.n_iterations);
                    leiden.improve_clustering(&network, &mut clustering, &mut rng);
                }
                ClusteringAlgorithm::Louvain => {
                    let mut louvain = Louvain::new(resolution, self.n_iterations);
                    louvain.improve_clustering(&network, &mut clustering, &mut rng);
                }
            }
            let quality = calc_cpm_quality(&network, &clustering, resolution);
            log::debug!(
                "random start {start}: {} clusters, quality {quality:.6}",
                clustering.n_clusters()
            );
            if best
                .as_ref()
                .map_or(true, |&(_, best_quality)| quality > best_quality)
            {
                best = Some((clustering, quality));
            }
        }

        let (mut clustering, _) = best.expect("at least one random start");
        clustering.order_clusters_by_n_nodes();
        if self.min_cluster_size > 1 {
            merge_small_clusters_by_n_nodes(&network, &mut clustering, self.min_cluster_size);
            clustering.order_clusters_by_n_nodes();
        }
        Ok(clustering)
    }
}

/// Merges every cluster with fewer than `min_n_nodes` nodes into a
/// neighboring cluster. Returns whether anything was merged.
pub fn merge_small_clusters_by_n_nodes(
    network: &Network,
    clustering: &mut Clustering,
    min_n_nodes: usize,
) -> bool {
    merge_small_clusters(network, clustering, min_n_nodes as f64, |n_nodes, _| {
        n_nodes as f64
    })
}

/// Merges every cluster with total node weight below `min_weight` into a
/// neighboring cluster. Returns whether anything was merged.
pub fn merge_small_clusters_by_weight(
    network: &Network,
    clustering: &mut Clustering,
    min_weight: f64,
) -> bool {
    merge_small_clusters(network, clustering, min_weight, |_, weight| weight)
}

/// Small-cluster removal on the reduced network: repeatedly take the
/// smallest cluster under the threshold and fold it into the neighboring
/// cluster with the highest connection weight per unit of node weight. A
/// small cluster without a unique best neighbor is left in place.
fn merge_small_clusters(
    network: &Network,
    clustering: &mut Clustering,
    min_key: f64,
    key: impl Fn(usize, f64) -> f64,
) -> bool {
    let reduced_network = network.create_reduced_network(clustering);
    let n_clusters = clustering.n_clusters();

    // merge state over reduced nodes; `assignment[r]` is the cluster a
    // reduced node currently belongs to
    let mut assignment: Vec<usize> = (0..n_clusters).collect();
    let mut members: Vec<Vec<usize>> = (0..n_clusters).map(|cluster| vec![cluster]).collect();
    let mut n_nodes_per_cluster = clustering.n_nodes_per_cluster();
    let mut cluster_weights: Vec<f64> = (0..n_clusters)
        .map(|cluster| reduced_network.node_weight(cluster))
        .collect();
    let mut excluded = vec![false; n_clusters];
    let mut edge_weight_per_cluster = vec![0.0; n_clusters];
    let mut touched_clusters: Vec<usize> = Vec::new();

    let mut update = false;
    loop {
        let mut smallest: Option<usize> = None;
        for cluster in 0..n_clusters {
            if n_nodes_per_cluster[cluster] == 0 || excluded[cluster] {
                continue;
            }
            let cluster_key = key(n_nodes_per_cluster[cluster], cluster_weights[cluster]);
            if cluster_key >= min_key {
                continue;
            }
            if smallest.map_or(true, |current| {
                cluster_key < key(n_nodes_per_cluster[current], cluster_weights[current])
            }) {
                smallest = Some(cluster);
            }
        }
        let Some(smallest) = smallest else {
            break;
        };

        for &member in &members[smallest] {
            for (neighbor, edge_weight) in reduced_network.neighbors(member) {
                let neighbor_cluster = assignment[neighbor];
                if neighbor_cluster == smallest {
                    continue;
                }
                if edge_weight_per_cluster[neighbor_cluster] == 0.0 {
                    touched_clusters.push(neighbor_cluster);
                }
                edge_weight_per_cluster[neighbor_cluster] += edge_weight;
            }
        }

        let mut best: Option<usize> = None;
        let mut best_ratio = 0.0;
        let mut tied = false;
        for &candidate in &touched_clusters {
            let ratio = edge_weight_per_cluster[candidate] / cluster_weights[candidate];
            if best.is_none() || ratio > best_ratio {
                best = Some(candidate);
                best_ratio = ratio;
                tied = false;
            } else if ratio == best_ratio {
                tied = true;
            }
        }
        for &candidate in &touched_clusters {
            edge_weight_per_cluster[candidate] = 0.0;
        }
        touched_clusters.clear();

        match best {
            Some(best) if !tied => {
                let moved = std::mem::take(&mut members[smallest]);
                for &member in &moved {
                    assignment[member] = best;
                }
                members[best].extend(moved);
                n_nodes_per_cluster[best] += n_nodes_per_cluster[smallest];
                n_nodes_per_cluster[smallest] = 0;
                cluster_weights[best] += cluster_weights[smallest];
                cluster_weights[smallest] = 0.0;
                update = true;
            }
            _ => {
                excluded[smallest] = true;
            }
        }
    }

    if update {
        clustering.merge_clusters(&Clustering::from_assignments(assignment));
        clustering.remove_empty_clusters();
    }
    update
}

/// Runs gradient descent from several random starts and keeps the
/// lowest-quality (best) layout, standardised.
pub struct LayoutRunner {
    quality: LayoutQuality,
    normalization: Normalization,
    n_random_starts: usize,
    max_n_iterations: usize,
    seed: u64,
    network: Option<Network>,
}

impl LayoutRunner {
    pub fn new(quality: LayoutQuality) -> Self {
        LayoutRunner {
            quality,
            normalization: Normalization::None,
            n_random_starts: 1,
            max_n_iterations: 1000,
            seed: 0,
            network: None,
        }
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn with_n_random_starts(mut self, n_random_starts: usize) -> Self {
        self.n_random_starts = n_random_starts;
        self
    }

    pub fn with_max_n_iterations(mut self, max_n_iterations: usize) -> Self {
        self.max_n_iterations = max_n_iterations;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn set_network(&mut self, network: Network) {
        self.network = Some(network);
    }

    pub fn run(&self) -> Result<Layout> {
        let network = self.network.as_ref().ok_or(Error::Uninitialized)?;
        if network.n_nodes() == 0 {
            return Err(Error::InvalidParameter {
                name: "network",
                message: "network has no nodes",
            });
        }

        let normalized = self.normalization.apply(network);
        let (attraction, repulsion, mut edge_weight_increment) = match self.quality {
            LayoutQuality::Vos {
                attraction,
                repulsion,
                edge_weight_increment,
            } => (attraction, repulsion, edge_weight_increment),
            LayoutQuality::LinLog => (1, 0, 0.0),
        };
        // disconnected networks drift apart without a weak global attraction
        if edge_weight_increment == 0.0 && normalized.identify_components().n_clusters() > 1 {
            edge_weight_increment = 0.01;
        }

        let descent = GradientDescentLayout::new(attraction, repulsion, edge_weight_increment)?
            .with_max_n_iterations(self.max_n_iterations);

        let mut rng = ChaCha20Rng::seed_from_u64(self.seed);
        let mut best: Option<(Layout, f64)> = None;
        for start in 0..self.n_random_starts.max(1) {
            let mut layout = Layout::new_random(normalized.n_nodes(), &mut rng);
            descent.improve_layout(&normalized, &mut layout, &mut rng);
            let quality = descent.calc_quality(&normalized, &layout);
            log::debug!("random start {start}: quality {quality:.6}");
            if best
                .as_ref()
                .map_or(true, |&(_, best_quality)| quality < best_quality)
            {
                best = Some((layout, quality));
            }
        }

        let (mut layout, _) = best.expect("at least one random start");
        layout.standardize(true);
        Ok(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NodeWeights;
    use crate::util;

    fn two_triangles_weighted() -> Network {
        let edges = [(0, 1), (1, 2), (2, 0), (2, 3), (3, 5), (5, 4), (4, 3)];
        Network::from_edges(6, &edges, None, NodeWeights::TotalEdgeWeights, false, true).unwrap()
    }

    #[test]
    fn test_uninitialized_runner_errors() {
        let runner = ClusteringRunner::new(
            ClusteringAlgorithm::Leiden,
            ClusteringQuality::Cpm { resolution: 1.0 },
        );
        assert_eq!(runner.run(), Err(Error::Uninitialized));
    }

    #[test]
    fn test_leiden_with_association_strength_finds_the_triangles() {
        let mut runner = ClusteringRunner::new(
            ClusteringAlgorithm::Leiden,
            ClusteringQuality::Cpm { resolution: 0.2 },
        )
        .with_normalization(Normalization::AssociationStrength)
        .with_n_random_starts(3)
        .with_seed(42);
        runner.set_network(two_triangles_weighted());

        let clustering = runner.run().unwrap();
        assert_eq!(clustering.n_clusters(), 2);
        assert_eq!(clustering.cluster_of(0), clustering.cluster_of(1));
        assert_eq!(clustering.cluster_of(1), clustering.cluster_of(2));
        assert_eq!(clustering.cluster_of(3), clustering.cluster_of(4));
        assert_eq!(clustering.cluster_of(4), clustering.cluster_of(5));
        assert_ne!(clustering.cluster_of(0), clustering.cluster_of(3));

        let normalized = two_triangles_weighted()
            .create_normalized_network_using_association_strength();
        assert!(crate::community_search::calc_cpm_quality(&normalized, &clustering, 0.2) > 0.0);
    }

    #[test]
    fn test_modularity_matches_rescaled_cpm() {
        use rand::SeedableRng;
        use rand_chacha::ChaCha20Rng;

        let network = two_triangles_weighted();
        let user_resolution = 1.0;
        let seed = 77;

        let mut runner = ClusteringRunner::new(
            ClusteringAlgorithm::Louvain,
            ClusteringQuality::Modularity {
                resolution: user_resolution,
            },
        )
        .with_seed(seed);
        runner.set_network(network.clone());
        let by_modularity = runner.run().unwrap();

        // the same run, with the rewrite done by hand
        let rewritten = network
            .create_network_without_normalization()
            .with_node_weights_set_to_total_edge_weights();
        let effective_resolution = user_resolution
            / (2.0 * rewritten.total_edge_weight() + rewritten.total_edge_weight_self_links());
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut clustering = Clustering::new_singleton(rewritten.n_nodes());
        let mut louvain = Louvain::new(effective_resolution, 10);
        louvain.improve_clustering(&rewritten, &mut clustering, &mut rng);
        clustering.order_clusters_by_n_nodes();

        assert_eq!(by_modularity.clusters(), clustering.clusters());
    }

    #[test]
    fn test_merge_small_clusters_by_n_nodes() {
        // a triangle plus a pendant node in its own cluster
        let edges = [(0, 1), (1, 2), (2, 0), (2, 3)];
        let network =
            Network::from_edges(4, &edges, None, NodeWeights::Unit, false, true).unwrap();
        let mut clustering = Clustering::from_assignments(vec![0, 0, 0, 1]);
        assert!(merge_small_clusters_by_n_nodes(&network, &mut clustering, 2));
        assert_eq!(clustering.n_clusters(), 1);
    }

    #[test]
    fn test_merge_small_clusters_leaves_isolated_clusters() {
        // two components; the small one has no neighbor to merge into
        let edges = [(0, 1), (1, 2), (2, 0)];
        let network =
            Network::from_edges(4, &edges, None, NodeWeights::Unit, false, true).unwrap();
        let mut clustering = Clustering::from_assignments(vec![0, 0, 0, 1]);
        assert!(!merge_small_clusters_by_n_nodes(&network, &mut clustering, 2));
        assert_eq!(clustering.n_clusters(), 2);
    }

    #[test]
    fn test_merge_small_clusters_by_weight() {
        let edges = [(0, 1), (1, 2), (2, 0), (2, 3)];
        let network = Network::from_edges(
            4,
            &edges,
            None,
            NodeWeights::Explicit(vec![2.0, 2.0, 2.0, 0.5]),
            false,
            true,
        )
        .unwrap();
        let mut clustering = Clustering::from_assignments(vec![0, 0, 0, 1]);
        assert!(merge_small_clusters_by_weight(&network, &mut clustering, 1.0));
        assert_eq!(clustering.n_clusters(), 1);
    }

    #[test]
    fn test_layout_runner_produces_standardized_layout() {
        let mut runner = LayoutRunner::new(LayoutQuality::Vos {
            attraction: 2,
            repulsion: 1,
            edge_weight_increment: 0.0,
        })
        .with_n_random_starts(2)
        .with_max_n_iterations(100)
        .with_seed(5);
        runner.set_network(two_triangles_weighted());

        let layout = runner.run().unwrap();
        assert_eq!(layout.n_nodes(), 6);
        assert!(util::calc_average(layout.x()).abs() < 1e-9);
        assert!(util::calc_average(layout.y()).abs() < 1e-9);
        assert!((layout.average_distance() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_layout_runner_rejects_bad_exponents() {
        let mut runner = LayoutRunner::new(LayoutQuality::Vos {
            attraction: 1,
            repulsion: 1,
            edge_weight_increment: 0.0,
        });
        runner.set_network(two_triangles_weighted());
        assert!(matches!(
            runner.run(),
            Err(Error::InvalidParameter { name: "attraction", .. })
        ));
    }

    #[test]
    fn test_disconnected_network_gets_edge_weight_increment() {
        // two disjoint edges; the run must finish with finite coordinates
        let edges = [(0, 1), (2, 3)];
        let network =
            Network::from_edges(4, &edges, None, NodeWeights::Unit, false, true).unwrap();
        let mut runner = LayoutRunner::new(LayoutQuality::Vos {
            attraction: 2,
            repulsion: 1,
            edge_weight_increment: 0.0,
        })
        .with_max_n_iterations(50)
        .with_seed(3);
        runner.set_network(network);
        let layout = runner.run().unwrap();
        assert!(layout.x().iter().all(|x| x.is_finite()));
        assert!(layout.y().iter().all(|y| y.is_finite()));
    }
}
