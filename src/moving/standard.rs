use rand::seq::SliceRandom;
use rand::Rng;

use crate::clustering::Clustering;
use crate::network::Network;

/// Standard local moving: cycles through the nodes in random order, greedily
/// moving each node to the cluster with the largest quality gain, until a
/// full pass makes no move.
#[derive(Debug, Default)]
pub struct StandardLocalMoving {
    resolution: f64,
    cluster_weights: Vec<f64>,
    n_nodes_per_cluster: Vec<usize>,
    unused_clusters: Vec<usize>,
    node_order: Vec<usize>,
    edge_weight_per_cluster: Vec<f64>,
    neighboring_clusters: Vec<usize>,
}

impl StandardLocalMoving {
    pub fn new(resolution: f64) -> Self {
        StandardLocalMoving {
            resolution,
            ..StandardLocalMoving::default()
        }
    }

    fn ensure_capacity(&mut self, n_nodes: usize) {
        self.cluster_weights.resize(n_nodes, 0.0);
        self.n_nodes_per_cluster.resize(n_nodes, 0);
        self.unused_clusters.resize(n_nodes, 0);
        self.edge_weight_per_cluster.resize(n_nodes, 0.0);
        self.neighboring_clusters.resize(n_nodes, 0);
    }

    /// Runs the sweep. Returns whether any node moved.
    pub fn improve_clustering<R: Rng>(
        &mut self,
        network: &Network,
        clustering: &mut Clustering,
        rng: &mut R,
    ) -> bool {
        let n_nodes = network.n_nodes();
        if n_nodes == 0 {
            return false;
        }

        self.ensure_capacity(n_nodes);
        self.cluster_weights[..n_nodes].fill(0.0);
        self.n_nodes_per_cluster[..n_nodes].fill(0);
        self.edge_weight_per_cluster[..n_nodes].fill(0.0);

        for node in 0..n_nodes {
            let cluster = clustering.cluster_of(node);
            self.cluster_weights[cluster] += network.node_weight(node);
            self.n_nodes_per_cluster[cluster] += 1;
        }

        // stack of empty cluster ids; scanning high to low leaves the
        // smallest unused id on top
        let mut n_unused_clusters = 0;
        for cluster in (0..n_nodes).rev() {
            if self.n_nodes_per_cluster[cluster] == 0 {
                self.unused_clusters[n_unused_clusters] = cluster;
                n_unused_clusters += 1;
            }
        }

        self.node_order.clear();
        self.node_order.extend(0..n_nodes);
        self.node_order.shuffle(rng);

        let mut update = false;
        let mut n_unstable_nodes = n_nodes;
        let mut i = 0;
        while n_unstable_nodes > 0 {
            let j = self.node_order[i];
            let current_cluster = clustering.cluster_of(j);
            let node_weight = network.node_weight(j);

            // take j out of its cluster before enumerating candidates
            self.cluster_weights[current_cluster] -= node_weight;
            self.n_nodes_per_cluster[current_cluster] -= 1;
            if self.n_nodes_per_cluster[current_cluster] == 0 {
                self.unused_clusters[n_unused_clusters] = current_cluster;
                n_unused_clusters += 1;
            }

            // candidate clusters: an empty one first, then the clusters of
            // j's neighbors
            self.neighboring_clusters[0] = self.unused_clusters[n_unused_clusters - 1];
            let mut n_neighboring_clusters = 1;
            for (target, edge_weight) in network.neighbors(j) {
                let neighbor_cluster = clustering.cluster_of(target);
                if self.edge_weight_per_cluster[neighbor_cluster] == 0.0
                    && neighbor_cluster != self.neighboring_clusters[0]
                {
                    self.neighboring_clusters[n_neighboring_clusters] = neighbor_cluster;
                    n_neighboring_clusters += 1;
                }
                self.edge_weight_per_cluster[neighbor_cluster] += edge_weight;
            }

            // staying put is the initial best, so equal gains keep the node
            // in its old cluster
            let mut best_cluster = current_cluster;
            let mut max_quality_increment = self.edge_weight_per_cluster[current_cluster]
                - node_weight * self.cluster_weights[current_cluster] * self.resolution;
            for k in 0..n_neighboring_clusters {
                let cluster = self.neighboring_clusters[k];
                let quality_increment = self.edge_weight_per_cluster[cluster]
                    - node_weight * self.cluster_weights[cluster] * self.resolution;
                if quality_increment > max_quality_increment {
                    best_cluster = cluster;
                    max_quality_increment = quality_increment;
                }
            }

            for k in 0..n_neighboring_clusters {
                self.edge_weight_per_cluster[self.neighboring_clusters[k]] = 0.0;
            }
            self.edge_weight_per_cluster[current_cluster] = 0.0;

            self.cluster_weights[best_cluster] += node_weight;
            self.n_nodes_per_cluster[best_cluster] += 1;
            if best_cluster == self.unused_clusters[n_unused_clusters - 1] {
                n_unused_clusters -= 1;
            }

            n_unstable_nodes -= 1;
            if best_cluster != current_cluster {
                clustering.set_cluster(j, best_cluster);
                n_unstable_nodes = n_nodes;
                update = true;
            }

            i = (i + 1) % n_nodes;
        }

        clustering.remove_empty_clusters();
        update
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::community_search::calc_cpm_quality;
    use crate::network::{tests::two_triangles, NodeWeights};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_separates_two_communities() {
        let edges = [(0, 1), (1, 2), (2, 0), (3, 4)];
        let network =
            Network::from_edges(5, &edges, None, NodeWeights::Unit, false, true).unwrap();
        let mut clustering = Clustering::new_singleton(5);
        let mut local_moving = StandardLocalMoving::new(0.25);
        let mut rng = ChaCha20Rng::seed_from_u64(42);

        assert!(local_moving.improve_clustering(&network, &mut clustering, &mut rng));
        assert_eq!(clustering.n_clusters(), 2);
        assert_eq!(clustering.cluster_of(0), clustering.cluster_of(1));
        assert_eq!(clustering.cluster_of(0), clustering.cluster_of(2));
        assert_eq!(clustering.cluster_of(3), clustering.cluster_of(4));
        assert_ne!(clustering.cluster_of(0), clustering.cluster_of(3));
    }

    #[test]
    fn test_quality_never_decreases() {
        let network = two_triangles();
        let resolution = 0.3;
        let mut local_moving = StandardLocalMoving::new(resolution);
        for seed in 0..5 {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let mut clustering = Clustering::new_singleton(network.n_nodes());
            let before = calc_cpm_quality(&network, &clustering, resolution);
            local_moving.improve_clustering(&network, &mut clustering, &mut rng);
            let after = calc_cpm_quality(&network, &clustering, resolution);
            assert!(after >= before - 1e-12, "seed {seed}: {before} -> {after}");
        }
    }

    #[test]
    fn test_converged_clustering_reports_no_update() {
        let edges = [(0, 1), (1, 2), (2, 0), (3, 4)];
        let network =
            Network::from_edges(5, &edges, None, NodeWeights::Unit, false, true).unwrap();
        let mut clustering = Clustering::new_singleton(5);
        let mut local_moving = StandardLocalMoving::new(0.25);
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        local_moving.improve_clustering(&network, &mut clustering, &mut rng);
        assert!(!local_moving.improve_clustering(&network, &mut clustering, &mut rng));
    }
}
