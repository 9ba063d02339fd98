//! Networks derived from an existing one: normalisations, pruning,
//! subnetworks, reduced (aggregate) networks and component labelling.

use std::collections::VecDeque;

use rand::Rng;

use crate::clustering::Clustering;
use crate::network::Network;

impl Network {
    /// Divides each edge weight by its expected value under a configuration
    /// model, `n_u * n_v / T` with `T` the total node weight. Node weights
    /// reset to 1 and the self-link total to 0.
    pub fn create_normalized_network_using_association_strength(&self) -> Network {
        let total_node_weight = self.total_node_weight();
        self.normalized(|u, v, weight| {
            weight / (self.node_weights[u] * self.node_weights[v] / total_node_weight)
        })
    }

    /// Multiplies each edge weight by `(N / n_u + N / n_v) / 2` with `N` the
    /// number of nodes. Node weights reset to 1 and the self-link total to 0.
    pub fn create_normalized_network_using_fractionalization(&self) -> Network {
        let n_nodes = self.n_nodes as f64;
        self.normalized(|u, v, weight| {
            weight * (n_nodes / self.node_weights[u] + n_nodes / self.node_weights[v]) / 2.0
        })
    }

    /// Keeps edge weights as they are; node weights reset to 1 and the
    /// self-link total to 0.
    pub fn create_network_without_normalization(&self) -> Network {
        self.normalized(|_, _, weight| weight)
    }

    fn normalized(&self, weight_of: impl Fn(usize, usize, f64) -> f64) -> Network {
        let mut edge_weights = Vec::with_capacity(self.edge_weights.len());
        for u in 0..self.n_nodes {
            for (v, weight) in self.neighbors(u) {
                edge_weights.push(weight_of(u, v, weight));
            }
        }
        Network {
            n_nodes: self.n_nodes,
            node_weights: vec![1.0; self.n_nodes],
            first_neighbor_indices: self.first_neighbor_indices.clone(),
            neighbors: self.neighbors.clone(),
            edge_weights,
            total_edge_weight_self_links: 0.0,
        }
    }

    /// Keeps at most `max_n_edges` undirected edges, dropping the lightest.
    ///
    /// Ties at the threshold weight are broken by a per-pair pseudorandom
    /// number drawn from an `n_nodes²` table, keyed on the unordered pair so
    /// the pruned network stays symmetric. Quadratic in memory; meant for
    /// small networks.
    pub fn create_pruned_network<R: Rng>(&self, max_n_edges: usize, rng: &mut R) -> Network {
        let n_undirected_edges = self.neighbors.len() / 2;
        if max_n_edges >= n_undirected_edges {
            return self.clone();
        }

        let mut undirected_weights = Vec::with_capacity(n_undirected_edges);
        for u in 0..self.n_nodes {
            for (v, weight) in self.neighbors(u) {
                if u < v {
                    undirected_weights.push(weight);
                }
            }
        }
        undirected_weights
            .sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let threshold = undirected_weights[n_undirected_edges - max_n_edges - 1];
        let n_above_threshold = undirected_weights
            .iter()
            .filter(|&&weight| weight > threshold)
            .count();
        // quota of threshold-weight edges still allowed; counting this way
        // stays exact when every edge weight is equal
        let tie_quota = max_n_edges - n_above_threshold;

        let mut random_numbers = vec![0.0; self.n_nodes * self.n_nodes];
        for number in random_numbers.iter_mut() {
            *number = rng.random::<f64>();
        }
        let random_of =
            |u: usize, v: usize| random_numbers[u.min(v) * self.n_nodes + u.max(v)];

        let mut tie_randoms = Vec::new();
        for u in 0..self.n_nodes {
            for (v, weight) in self.neighbors(u) {
                if u < v && weight == threshold {
                    tie_randoms.push(random_of(u, v));
                }
            }
        }
        tie_randoms.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        let random_threshold = if tie_quota == 0 {
            f64::INFINITY
        } else {
            tie_randoms[tie_quota - 1]
        };

        let keep = |u: usize, v: usize, weight: f64| {
            weight > threshold || (weight == threshold && random_of(u, v) >= random_threshold)
        };

        let mut first_neighbor_indices = Vec::with_capacity(self.n_nodes + 1);
        let mut neighbors = Vec::new();
        let mut edge_weights = Vec::new();
        first_neighbor_indices.push(0);
        for u in 0..self.n_nodes {
            for (v, weight) in self.neighbors(u) {
                if keep(u, v, weight) {
                    neighbors.push(v);
                    edge_weights.push(weight);
                }
            }
            first_neighbor_indices.push(neighbors.len());
        }

        Network {
            n_nodes: self.n_nodes,
            node_weights: self.node_weights.clone(),
            first_neighbor_indices,
            neighbors,
            edge_weights,
            total_edge_weight_self_links: self.total_edge_weight_self_links,
        }
    }

    /// Induced subgraph of one cluster, with node ids relabelled to `0..k`.
    pub fn create_subnetwork(&self, clustering: &Clustering, cluster: usize) -> Network {
        let nodes: Vec<usize> = (0..self.n_nodes)
            .filter(|&node| clustering.cluster_of(node) == cluster)
            .collect();
        let mut node_map = vec![0; self.n_nodes];
        let mut subnetwork_neighbors = vec![0; self.neighbors.len()];
        let mut subnetwork_weights = vec![0.0; self.neighbors.len()];
        self.subnetwork(
            clustering,
            cluster,
            &nodes,
            &mut node_map,
            &mut subnetwork_neighbors,
            &mut subnetwork_weights,
        )
    }

    /// Induced subgraph of every cluster. The scratch arrays for the reverse
    /// node map and the edge buffers are allocated once and reused across
    /// clusters.
    pub fn create_subnetworks(&self, clustering: &Clustering) -> Vec<Network> {
        let nodes_per_cluster = clustering.nodes_per_cluster();
        let mut node_map = vec![0; self.n_nodes];
        let mut subnetwork_neighbors = vec![0; self.neighbors.len()];
        let mut subnetwork_weights = vec![0.0; self.neighbors.len()];
        (0..clustering.n_clusters())
            .map(|cluster| {
                self.subnetwork(
                    clustering,
                    cluster,
                    &nodes_per_cluster[cluster],
                    &mut node_map,
                    &mut subnetwork_neighbors,
                    &mut subnetwork_weights,
                )
            })
            .collect()
    }

    fn subnetwork(
        &self,
        clustering: &Clustering,
        cluster: usize,
        nodes: &[usize],
        node_map: &mut [usize],
        subnetwork_neighbors: &mut [usize],
        subnetwork_weights: &mut [f64],
    ) -> Network {
        if nodes.len() == 1 {
            return Network {
                n_nodes: 1,
                node_weights: vec![self.node_weights[nodes[0]]],
                first_neighbor_indices: vec![0, 0],
                neighbors: Vec::new(),
                edge_weights: Vec::new(),
                total_edge_weight_self_links: 0.0,
            };
        }

        for (new_id, &node) in nodes.iter().enumerate() {
            node_map[node] = new_id;
        }

        let mut first_neighbor_indices = Vec::with_capacity(nodes.len() + 1);
        let mut node_weights = Vec::with_capacity(nodes.len());
        first_neighbor_indices.push(0);
        let mut n_subnetwork_edges = 0;
        for &node in nodes {
            node_weights.push(self.node_weights[node]);
            for (neighbor, weight) in self.neighbors(node) {
                if clustering.cluster_of(neighbor) == cluster {
                    subnetwork_neighbors[n_subnetwork_edges] = node_map[neighbor];
                    subnetwork_weights[n_subnetwork_edges] = weight;
                    n_subnetwork_edges += 1;
                }
            }
            first_neighbor_indices.push(n_subnetwork_edges);
        }

        Network {
            n_nodes: nodes.len(),
            node_weights,
            first_neighbor_indices,
            neighbors: subnetwork_neighbors[..n_subnetwork_edges].to_vec(),
            edge_weights: subnetwork_weights[..n_subnetwork_edges].to_vec(),
            total_edge_weight_self_links: 0.0,
        }
    }

    /// Quotient network with one node per cluster. Super-node weights are the
    /// summed member weights; intra-cluster edge weights fold into the
    /// self-link total.
    pub fn create_reduced_network(&self, clustering: &Clustering) -> Network {
        let n_clusters = clustering.n_clusters();
        let mut node_weights = vec![0.0; n_clusters];
        for node in 0..self.n_nodes {
            node_weights[clustering.cluster_of(node)] += self.node_weights[node];
        }

        let nodes_per_cluster = clustering.nodes_per_cluster();
        let mut total_edge_weight_self_links = self.total_edge_weight_self_links;
        let mut first_neighbor_indices = Vec::with_capacity(n_clusters + 1);
        let mut neighbors = Vec::new();
        let mut edge_weights = Vec::new();
        first_neighbor_indices.push(0);

        // dense per-cluster accumulator, reset after each super-node
        let mut cluster_edge_weight = vec![0.0; n_clusters];
        let mut touched_clusters: Vec<usize> = Vec::new();
        for cluster in 0..n_clusters {
            for &node in &nodes_per_cluster[cluster] {
                for (neighbor, weight) in self.neighbors(node) {
                    let neighbor_cluster = clustering.cluster_of(neighbor);
                    if neighbor_cluster == cluster {
                        total_edge_weight_self_links += weight;
                    } else {
                        if cluster_edge_weight[neighbor_cluster] == 0.0 {
                            touched_clusters.push(neighbor_cluster);
                        }
                        cluster_edge_weight[neighbor_cluster] += weight;
                    }
                }
            }
            touched_clusters.sort_unstable();
            for &neighbor_cluster in &touched_clusters {
                neighbors.push(neighbor_cluster);
                edge_weights.push(cluster_edge_weight[neighbor_cluster]);
                cluster_edge_weight[neighbor_cluster] = 0.0;
            }
            touched_clusters.clear();
            first_neighbor_indices.push(neighbors.len());
        }

        Network {
            n_nodes: n_clusters,
            node_weights,
            first_neighbor_indices,
            neighbors,
            edge_weights,
            total_edge_weight_self_links,
        }
    }

    /// Labels connected components by breadth-first search. Components are
    /// ordered by decreasing size; equal-sized components keep the order of
    /// their smallest node ids.
    pub fn identify_components(&self) -> Clustering {
        let mut clusters = vec![usize::MAX; self.n_nodes];
        let mut n_components = 0;
        let mut queue = VecDeque::new();
        for start in 0..self.n_nodes {
            if clusters[start] != usize::MAX {
                continue;
            }
            clusters[start] = n_components;
            queue.push_back(start);
            while let Some(node) = queue.pop_front() {
                for (neighbor, _) in self.neighbors(node) {
                    if clusters[neighbor] == usize::MAX {
                        clusters[neighbor] = n_components;
                        queue.push_back(neighbor);
                    }
                }
            }
            n_components += 1;
        }
        let mut clustering = Clustering::from_assignments(clusters);
        clustering.order_clusters_by_n_nodes();
        clustering
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::tests::two_triangles;
    use crate::network::NodeWeights;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_association_strength_resets_node_weights() {
        let network = two_triangles();
        let normalized = network.create_normalized_network_using_association_strength();
        assert_relative_eq!(normalized.total_node_weight(), 6.0);
        assert_relative_eq!(normalized.total_edge_weight_self_links(), 0.0);
    }

    #[test]
    fn test_association_strength_is_symmetric() {
        let network = two_triangles();
        let normalized = network.create_normalized_network_using_association_strength();
        normalized.check_integrity().unwrap();
        // spot-check one normalised weight: edge (2, 3), strengths 3 and 3,
        // total node weight 14
        let weight = normalized
            .neighbors(2)
            .find(|&(v, _)| v == 3)
            .map(|(_, w)| w)
            .unwrap();
        assert_relative_eq!(weight, 1.0 / (3.0 * 3.0 / 14.0));
    }

    #[test]
    fn test_fractionalization_is_symmetric() {
        let network = two_triangles();
        let normalized = network.create_normalized_network_using_fractionalization();
        normalized.check_integrity().unwrap();
        let weight = normalized
            .neighbors(0)
            .find(|&(v, _)| v == 1)
            .map(|(_, w)| w)
            .unwrap();
        assert_relative_eq!(weight, (6.0 / 2.0 + 6.0 / 2.0) / 2.0);
    }

    #[test]
    fn test_reduce_by_singleton_is_identity() {
        let network = two_triangles();
        let singleton = Clustering::new_singleton(network.n_nodes());
        let reduced = network.create_reduced_network(&singleton);
        assert_eq!(reduced, network);
    }

    #[test]
    fn test_reduced_network_aggregates_weights() {
        let network = two_triangles();
        let clustering = Clustering::from_assignments(vec![0, 0, 0, 1, 1, 1]);
        let reduced = network.create_reduced_network(&clustering);
        assert_eq!(reduced.n_nodes(), 2);
        // the two triangles are joined by the single edge (2, 3)
        assert_relative_eq!(reduced.total_edge_weight(), 1.0);
        // three intra-triangle edges per cluster, each seen twice
        assert_relative_eq!(reduced.total_edge_weight_self_links(), 12.0);
        assert_relative_eq!(reduced.node_weight(0), 7.0);
        assert_relative_eq!(reduced.node_weight(1), 7.0);
    }

    #[test]
    fn test_subnetworks() {
        let network = two_triangles();
        let clustering = Clustering::from_assignments(vec![0, 0, 0, 1, 1, 1]);
        let subnetworks = network.create_subnetworks(&clustering);
        assert_eq!(subnetworks.len(), 2);
        for subnetwork in &subnetworks {
            assert_eq!(subnetwork.n_nodes(), 3);
            assert_eq!(subnetwork.n_undirected_edges(), 3);
            subnetwork.check_integrity().unwrap();
        }
    }

    #[test]
    fn test_single_node_subnetwork_has_empty_adjacency() {
        let network = two_triangles();
        let clustering = Clustering::from_assignments(vec![0, 1, 1, 1, 1, 1]);
        let subnetwork = network.create_subnetwork(&clustering, 0);
        assert_eq!(subnetwork.n_nodes(), 1);
        assert_eq!(subnetwork.n_edges(), 0);
    }

    #[test]
    fn test_identify_components_orders_by_size() {
        let edges = [(0, 1), (2, 3)];
        let network =
            Network::from_edges(4, &edges, None, NodeWeights::Unit, false, true).unwrap();
        let components = network.identify_components();
        assert_eq!(components.n_clusters(), 2);
        assert_eq!(components.clusters(), &[0, 0, 1, 1]);
    }

    #[test]
    fn test_identify_components_largest_first() {
        let edges = [(0, 1), (2, 3), (3, 4)];
        let network =
            Network::from_edges(5, &edges, None, NodeWeights::Unit, false, true).unwrap();
        let components = network.identify_components();
        assert_eq!(components.clusters(), &[1, 1, 0, 0, 0]);
    }

    #[test]
    fn test_pruned_network_keeps_heaviest_edges() {
        let edges = [(0, 1), (1, 2), (2, 3), (3, 0)];
        let weights = [4.0, 3.0, 2.0, 1.0];
        let network =
            Network::from_edges(4, &edges, Some(&weights), NodeWeights::Unit, false, true)
                .unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let pruned = network.create_pruned_network(2, &mut rng);
        assert_eq!(pruned.n_undirected_edges(), 2);
        pruned.check_integrity().unwrap();
        let kept: Vec<f64> = pruned.neighbors(1).map(|(_, w)| w).collect();
        assert_eq!(kept, vec![4.0, 3.0]);
    }

    #[test]
    fn test_pruned_network_breaks_ties_symmetrically() {
        // all weights equal, so pruning is pure tie-breaking
        let edges = [(0, 1), (1, 2), (2, 3), (3, 0), (0, 2)];
        let network =
            Network::from_edges(4, &edges, None, NodeWeights::Unit, false, true).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let pruned = network.create_pruned_network(3, &mut rng);
        assert_eq!(pruned.n_undirected_edges(), 3);
        pruned.check_integrity().unwrap();
    }
}
