use rand::Rng;

use crate::clustering::Clustering;
use crate::community_search::calc_cpm_quality;
use crate::moving::fast::FastLocalMoving;
use crate::moving::merging::LocalMerging;
use crate::network::Network;

/// The Leiden algorithm: fast local moving, refinement of each cluster by
/// stochastic local merging, and recursive aggregation on the refined
/// clustering.
///
/// Refinement may split a cluster into well-connected parts but never merges
/// nodes across clusters, so the pre-refinement cluster of a node is always
/// a function of its refined cluster.
pub struct Leiden {
    resolution: f64,
    n_iterations: usize,
    local_moving: FastLocalMoving,
    local_merging: LocalMerging,
    n_clusters_per_subnetwork: Vec<usize>,
}

impl Leiden {
    /// `n_iterations == 0` means iterate until no improvement. `randomness`
    /// scales the stochastic cluster choice during refinement.
    pub fn new(resolution: f64, randomness: f64, n_iterations: usize) -> Self {
        Leiden {
            resolution,
            n_iterations,
            local_moving: FastLocalMoving::new(resolution),
            local_merging: LocalMerging::new(resolution, randomness),
            n_clusters_per_subnetwork: Vec::new(),
        }
    }

    /// Improves a clustering in place. Returns whether anything changed.
    pub fn improve_clustering<R: Rng>(
        &mut self,
        network: &Network,
        clustering: &mut Clustering,
        rng: &mut R,
    ) -> bool {
        let mut update = false;
        if self.n_iterations > 0 {
            for _ in 0..self.n_iterations {
                update |= self.improve_clustering_one_iteration(network, clustering, rng);
            }
        } else {
            while self.improve_clustering_one_iteration(network, clustering, rng) {
                update = true;
            }
        }
        update
    }

    fn improve_clustering_one_iteration<R: Rng>(
        &mut self,
        network: &Network,
        clustering: &mut Clustering,
        rng: &mut R,
    ) -> bool {
        let mut update = self
            .local_moving
            .improve_clustering(network, clustering, rng);

        if clustering.n_clusters() == network.n_nodes() {
            return update;
        }

        // refine each cluster on its own subnetwork; refined cluster ids of
        // cluster i occupy a contiguous block starting at its offset
        let subnetworks = network.create_subnetworks(clustering);
        let nodes_per_cluster = clustering.nodes_per_cluster();
        self.n_clusters_per_subnetwork.clear();
        let mut refined = vec![0; network.n_nodes()];
        let mut offset = 0;
        for (cluster, subnetwork) in subnetworks.iter().enumerate() {
            let subnetwork_clustering = self.local_merging.run(subnetwork, rng);
            for (node_in_subnetwork, &node) in nodes_per_cluster[cluster].iter().enumerate() {
                refined[node] = offset + subnetwork_clustering.cluster_of(node_in_subnetwork);
            }
            offset += subnetwork_clustering.n_clusters();
            self.n_clusters_per_subnetwork
                .push(subnetwork_clustering.n_clusters());
        }
        let refinement = Clustering::from_assignments(refined);

        let (reduced_network, mut reduced_clustering) =
            if refinement.n_clusters() < network.n_nodes() {
                let reduced_network = network.create_reduced_network(&refinement);
                // each refined cluster starts out in its pre-refinement cluster
                let mut reduced_clusters = vec![0; refinement.n_clusters()];
                let mut first = 0;
                for (cluster, &n_clusters) in self.n_clusters_per_subnetwork.iter().enumerate() {
                    for reduced_cluster in reduced_clusters.iter_mut().skip(first).take(n_clusters)
                    {
                        *reduced_cluster = cluster;
                    }
                    first += n_clusters;
                }
                *clustering = refinement;
                (
                    reduced_network,
                    Clustering::from_assignments(reduced_clusters),
                )
            } else {
                // refinement split everything back into singletons; aggregate
                // on the unrefined clustering instead
                let reduced_network = network.create_reduced_network(clustering);
                let reduced_clustering = Clustering::new_singleton(reduced_network.n_nodes());
                (reduced_network, reduced_clustering)
            };

        log::debug!(
            "aggregated {} nodes into {} super-nodes",
            network.n_nodes(),
            reduced_network.n_nodes()
        );
        update |=
            self.improve_clustering_one_iteration(&reduced_network, &mut reduced_clustering, rng);
        clustering.merge_clusters(&reduced_clustering);
        update
    }

    pub fn calc_quality(&self, network: &Network, clustering: &Clustering) -> f64 {
        calc_cpm_quality(network, clustering, self.resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NodeWeights;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn two_triangles_unit() -> Network {
        let edges = [(0, 1), (1, 2), (2, 0), (2, 3), (3, 5), (5, 4), (4, 3)];
        Network::from_edges(6, &edges, None, NodeWeights::Unit, false, true).unwrap()
    }

    #[test]
    fn test_finds_the_two_triangles() {
        let network = two_triangles_unit();
        let mut clustering = Clustering::new_singleton(network.n_nodes());
        let mut leiden = Leiden::new(0.2, 0.01, 10);
        let mut rng = ChaCha20Rng::seed_from_u64(42);

        assert!(leiden.improve_clustering(&network, &mut clustering, &mut rng));
        assert_eq!(clustering.n_clusters(), 2);
        assert_eq!(clustering.cluster_of(0), clustering.cluster_of(1));
        assert_eq!(clustering.cluster_of(1), clustering.cluster_of(2));
        assert_eq!(clustering.cluster_of(3), clustering.cluster_of(4));
        assert_eq!(clustering.cluster_of(4), clustering.cluster_of(5));
        assert_ne!(clustering.cluster_of(0), clustering.cluster_of(3));
        assert!(leiden.calc_quality(&network, &clustering) > 0.0);
    }

    #[test]
    fn test_quality_never_decreases_across_iterations() {
        let network = two_triangles_unit();
        let mut clustering = Clustering::new_singleton(network.n_nodes());
        let mut leiden = Leiden::new(0.25, 0.01, 1);
        let mut rng = ChaCha20Rng::seed_from_u64(13);
        let mut previous = leiden.calc_quality(&network, &clustering);
        for _ in 0..4 {
            leiden.improve_clustering(&network, &mut clustering, &mut rng);
            let quality = leiden.calc_quality(&network, &clustering);
            assert!(quality >= previous - 1e-12);
            previous = quality;
        }
    }

    #[test]
    fn test_refinement_respects_cluster_boundaries() {
        // one Leiden iteration on a larger random-ish graph: every pair of
        // nodes sharing a refined-level cluster must also share a final
        // cluster with consistent labelling across iterations
        let edges = [
            (0, 1),
            (1, 2),
            (2, 0),
            (3, 4),
            (4, 5),
            (5, 3),
            (6, 7),
            (7, 8),
            (8, 6),
            (2, 3),
            (5, 6),
        ];
        let network =
            Network::from_edges(9, &edges, None, NodeWeights::Unit, false, true).unwrap();
        let mut clustering = Clustering::new_singleton(network.n_nodes());
        let mut leiden = Leiden::new(0.2, 0.01, 0);
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        leiden.improve_clustering(&network, &mut clustering, &mut rng);
        assert_eq!(clustering.n_clusters(), 3);
        for triangle in [[0, 1, 2], [3, 4, 5], [6, 7, 8]] {
            assert_eq!(
                clustering.cluster_of(triangle[0]),
                clustering.cluster_of(triangle[1])
            );
            assert_eq!(
                clustering.cluster_of(triangle[1]),
                clustering.cluster_of(triangle[2])
            );
        }
    }
}
