//! Multilevel community-detection drivers and the CPM quality function.

pub mod leiden;
pub mod louvain;

use crate::clustering::Clustering;
use crate::network::Network;

/// Constant Potts Model quality of a clustering.
///
/// Within-cluster edge weights (both directions) and the self-link total,
/// minus the resolution times the squared cluster weights, normalised by
/// twice the total edge weight plus the self-link total. Modularity is this
/// function after node weights are set to total incident edge weights and
/// the resolution is divided by that same normaliser.
pub fn calc_cpm_quality(network: &Network, clustering: &Clustering, resolution: f64) -> f64 {
    let mut quality = 0.0;
    for node in 0..network.n_nodes() {
        let cluster = clustering.cluster_of(node);
        for (neighbor, edge_weight) in network.neighbors(node) {
            if clustering.cluster_of(neighbor) == cluster {
                quality += edge_weight;
            }
        }
    }
    quality += network.total_edge_weight_self_links();

    let mut cluster_weights = vec![0.0; clustering.n_clusters()];
    for node in 0..network.n_nodes() {
        cluster_weights[clustering.cluster_of(node)] += network.node_weight(node);
    }
    for cluster_weight in cluster_weights {
        quality -= resolution * cluster_weight * cluster_weight;
    }

    quality / (2.0 * network.total_edge_weight() + network.total_edge_weight_self_links())
}
