use rand::seq::SliceRandom;
use rand::Rng;

use crate::clustering::Clustering;
use crate::network::Network;

/// Queue-driven local moving: like the standard sweep, but after a node
/// moves only its destabilised neighbors are revisited. The random
/// permutation buffer doubles as a ring-buffer queue.
#[derive(Debug, Default)]
pub struct FastLocalMoving {
    resolution: f64,
    cluster_weights: Vec<f64>,
    n_nodes_per_cluster: Vec<usize>,
    unused_clusters: Vec<usize>,
    node_order: Vec<usize>,
    edge_weight_per_cluster: Vec<f64>,
    neighboring_clusters: Vec<usize>,
    stable_nodes: Vec<bool>,
}

impl FastLocalMoving {
    pub fn new(resolution: f64) -> Self {
        FastLocalMoving {
            resolution,
            ..FastLocalMoving::default()
        }
    }

    fn ensure_capacity(&mut self, n_nodes: usize) {
        self.cluster_weights.resize(n_nodes, 0.0);
        self.n_nodes_per_cluster.resize(n_nodes, 0);
        self.unused_clusters.resize(n_nodes, 0);
        self.edge_weight_per_cluster.resize(n_nodes, 0.0);
        self.neighboring_clusters.resize(n_nodes, 0);
        self.stable_nodes.resize(n_nodes, false);
    }

    /// Runs the sweep until the queue of unstable nodes drains. Returns
    /// whether any node moved.
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
        self.stable_nodes[..n_nodes].fill(false);

        for node in 0..n_nodes {
            let cluster = clustering.cluster_of(node);
            self.cluster_weights[cluster] += network.node_weight(node);
            self.n_nodes_per_cluster[cluster] += 1;
        }

        let mut n_unused_clusters = 0;
        for cluster in (0..n_nodes).rev() {
            if self.n_nodes_per_cluster[cluster] == 0 {
                self.unused_clusters[n_unused_clusters] = cluster;
                n_unused_clusters += 1;
            }
        }

        // all nodes start unstable, queued in random order
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

            self.cluster_weights[current_cluster] -= node_weight;
            self.n_nodes_per_cluster[current_cluster] -= 1;
            if self.n_nodes_per_cluster[current_cluster] == 0 {
                self.unused_clusters[n_unused_clusters] = current_cluster;
                n_unused_clusters += 1;
            }

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
                self.edge_weight_per_cluster[cluster] = 0.0;
            }
            self.edge_weight_per_cluster[current_cluster] = 0.0;

            self.cluster_weights[best_cluster] += node_weight;
            self.n_nodes_per_cluster[best_cluster] += 1;
            if best_cluster == self.unused_clusters[n_unused_clusters - 1] {
                n_unused_clusters -= 1;
            }

            self.stable_nodes[j] = true;
            n_unstable_nodes -= 1;

            if best_cluster != current_cluster {
                clustering.set_cluster(j, best_cluster);

                // requeue stable neighbors left outside the new cluster
                for (neighbor, _) in network.neighbors(j) {
                    if self.stable_nodes[neighbor]
                        && clustering.cluster_of(neighbor) != best_cluster
                    {
                        self.stable_nodes[neighbor] = false;
                        n_unstable_nodes += 1;
                        self.node_order[(i + n_unstable_nodes) % n_nodes] = neighbor;
                    }
                }
                update = true;
            }

            i = (i + 1) % n_nodes;
        }

        clustering.remove_empty_clusters();
        update
    }
}
