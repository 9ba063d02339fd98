use rand::seq::SliceRandom;
use rand::Rng;

use crate::clustering::Clustering;
use crate::network::Network;
use crate::util;

/// Stochastic local merging, the refinement step of Leiden.
///
/// Starts from a singleton clustering of a subnetwork and makes a single
/// randomised pass: each node still in a well-connected singleton may join a
/// well-connected neighboring cluster, picked with probability proportional
/// to `exp(gain / randomness)` among the non-negative-gain candidates. A
/// cluster that has absorbed a node is locked and contributes no further
/// moves.
#[derive(Debug, Default)]
pub struct LocalMerging {
    resolution: f64,
    randomness: f64,
    cluster_weights: Vec<f64>,
    non_singleton_clusters: Vec<bool>,
    external_edge_weight_per_cluster: Vec<f64>,
    edge_weight_per_cluster: Vec<f64>,
    neighboring_clusters: Vec<usize>,
    cum_transformed_quality_increments: Vec<f64>,
    node_order: Vec<usize>,
}

impl LocalMerging {
    pub fn new(resolution: f64, randomness: f64) -> Self {
        LocalMerging {
            resolution,
            randomness,
            ..LocalMerging::default()
        }
    }

    pub fn run<R: Rng>(&mut self, network: &Network, rng: &mut R) -> Clustering {
        let n_nodes = network.n_nodes();
        let mut clustering = Clustering::new_singleton(n_nodes);
        if n_nodes == 1 {
            return clustering;
        }

        let total_node_weight = network.total_node_weight();

        self.cluster_weights.clear();
        self.cluster_weights.extend(network.node_weights());
        // each singleton's external edge weight starts as its total incident
        // edge weight
        network.total_edge_weight_per_node(&mut self.external_edge_weight_per_cluster);

        self.non_singleton_clusters.clear();
        self.non_singleton_clusters.resize(n_nodes, false);
        self.edge_weight_per_cluster.clear();
        self.edge_weight_per_cluster.resize(n_nodes, 0.0);
        self.neighboring_clusters.clear();
        self.neighboring_clusters.resize(n_nodes, 0);

        self.node_order.clear();
        self.node_order.extend(0..n_nodes);
        self.node_order.shuffle(rng);

        let mut update = false;
        for i in 0..n_nodes {
            let j = self.node_order[i];

            // only nodes in well-connected singletons may move
            if self.non_singleton_clusters[j] {
                continue;
            }
            if self.external_edge_weight_per_cluster[j]
                < self.cluster_weights[j]
                    * (total_node_weight - self.cluster_weights[j])
                    * self.resolution
            {
                continue;
            }

            self.cluster_weights[j] = 0.0;
            self.external_edge_weight_per_cluster[j] = 0.0;

            self.neighboring_clusters[0] = j;
            let mut n_neighboring_clusters = 1;
            for (target, edge_weight) in network.neighbors(j) {
                let neighbor_cluster = clustering.cluster_of(target);
                if self.edge_weight_per_cluster[neighbor_cluster] == 0.0 {
                    self.neighboring_clusters[n_neighboring_clusters] = neighbor_cluster;
                    n_neighboring_clusters += 1;
                }
                self.edge_weight_per_cluster[neighbor_cluster] += edge_weight;
            }

            let node_weight = network.node_weight(j);
            let mut best_cluster = j;
            let mut max_quality_increment = 0.0;
            let mut total_transformed_quality_increment = 0.0;
            self.cum_transformed_quality_increments.clear();
            for k in 0..n_neighboring_clusters {
                let cluster = self.neighboring_clusters[k];

                // only well-connected clusters are candidates
                if self.external_edge_weight_per_cluster[cluster]
                    >= self.cluster_weights[cluster]
                        * (total_node_weight - self.cluster_weights[cluster])
                        * self.resolution
                {
                    let quality_increment = self.edge_weight_per_cluster[cluster]
                        - node_weight * self.cluster_weights[cluster] * self.resolution;
                    if quality_increment > max_quality_increment {
                        best_cluster = cluster;
                        max_quality_increment = quality_increment;
                    }
                    if quality_increment >= 0.0 {
                        total_transformed_quality_increment +=
                            util::fast_exp(quality_increment / self.randomness);
                    }
                }

                self.cum_transformed_quality_increments
                    .push(total_transformed_quality_increment);
                self.edge_weight_per_cluster[cluster] = 0.0;
            }

            let chosen_cluster = if total_transformed_quality_increment < f64::INFINITY {
                let r = total_transformed_quality_increment * rng.random::<f64>();
                let index =
                    util::binary_search(&self.cum_transformed_quality_increments, r);
                self.neighboring_clusters[index.min(n_neighboring_clusters - 1)]
            } else {
                best_cluster
            };

            self.cluster_weights[chosen_cluster] += node_weight;
            for (target, edge_weight) in network.neighbors(j) {
                if clustering.cluster_of(target) == chosen_cluster {
                    self.external_edge_weight_per_cluster[chosen_cluster] -= edge_weight;
                } else {
                    self.external_edge_weight_per_cluster[chosen_cluster] += edge_weight;
                }
            }

            if chosen_cluster != j {
                clustering.set_cluster(j, chosen_cluster);
                self.non_singleton_clusters[chosen_cluster] = true;
                update = true;
            }
        }

        if update {
            clustering.remove_empty_clusters();
        }
        clustering
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NodeWeights;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_merges_a_dense_subnetwork() {
        // complete graph on 4 nodes; at low resolution everything may merge
        let edges = [(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)];
        let network =
            Network::from_edges(4, &edges, None, NodeWeights::Unit, false, true).unwrap();
        let mut merging = LocalMerging::new(0.1, 0.01);
        let mut rng = ChaCha20Rng::seed_from_u64(21);
        let clustering = merging.run(&network, &mut rng);
        assert!(clustering.n_clusters() < 4);
        assert_eq!(clustering.n_nodes(), 4);
    }

    #[test]
    fn test_single_node_subnetwork_stays_singleton() {
        let network =
            Network::from_edges(1, &[], None, NodeWeights::Unit, false, true).unwrap();
        let mut merging = LocalMerging::new(1.0, 0.01);
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let clustering = merging.run(&network, &mut rng);
        assert_eq!(clustering.n_clusters(), 1);
    }

    #[test]
    fn test_locked_clusters_do_not_move_again() {
        // a path graph: once the middle absorbs an endpoint, the middle
        // cluster is locked, so repeated runs stay consistent
        let edges = [(0, 1), (1, 2)];
        let network =
            Network::from_edges(3, &edges, None, NodeWeights::Unit, false, true).unwrap();
        let mut merging = LocalMerging::new(0.05, 0.01);
        for seed in 0..10 {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let clustering = merging.run(&network, &mut rng);
            // every cluster id stays within bounds and the pass terminates
            assert!(clustering.clusters().iter().all(|&c| c < clustering.n_clusters()));
        }
    }
}
