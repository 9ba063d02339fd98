use rand::Rng;

use crate::clustering::Clustering;
use crate::community_search::calc_cpm_quality;
use crate::moving::standard::StandardLocalMoving;
use crate::network::Network;

/// The Louvain algorithm: standard local moving followed by recursive
/// aggregation, repeated for a fixed number of iterations or until an
/// iteration stops improving.
pub struct Louvain {
    resolution: f64,
    n_iterations: usize,
    local_moving: StandardLocalMoving,
}

impl Louvain {
    /// `n_iterations == 0` means iterate until no improvement.
    pub fn new(resolution: f64, n_iterations: usize) -> Self {
        Louvain {
            resolution,
            n_iterations,
            local_moving: StandardLocalMoving::new(resolution),
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

        let reduced_network = network.create_reduced_network(clustering);
        log::debug!(
            "aggregated {} nodes into {} clusters",
            network.n_nodes(),
            reduced_network.n_nodes()
        );
        let mut reduced_clustering = Clustering::new_singleton(reduced_network.n_nodes());
        update |=
            self.improve_clustering_one_iteration(&reduced_network, &mut reduced_clustering, rng);
        clustering.merge_clusters(&reduced_clustering);
        update
    }

    pub fn calc_quality(&self, network: &Network, clustering: &Clustering) -> f64 {
        calc_cpm_quality(network, clustering, self.resolution)
    }
}
