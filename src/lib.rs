//! # vosnet
//!
//! Community detection and layout for undirected weighted networks.
//!
//! The crate provides an immutable compressed-sparse-row network
//! representation, the Louvain and Leiden algorithms optimising the Constant
//! Potts Model (and modularity via reparametrisation), and a VOS-style
//! two-dimensional layout optimised by step-adaptive gradient descent.
//!
//! Everything is single-threaded and deterministic under a fixed seed.
//!
//! ```
//! use vosnet::{
//!     ClusteringAlgorithm, ClusteringQuality, ClusteringRunner, Network, NodeWeights,
//!     Normalization,
//! };
//!
//! let edges = [(0, 1), (1, 2), (2, 0), (2, 3), (3, 5), (5, 4), (4, 3)];
//! let network =
//!     Network::from_edges(6, &edges, None, NodeWeights::TotalEdgeWeights, false, true).unwrap();
//!
//! let mut runner = ClusteringRunner::new(
//!     ClusteringAlgorithm::Leiden,
//!     ClusteringQuality::Cpm { resolution: 0.2 },
//! )
//! .with_normalization(Normalization::AssociationStrength)
//! .with_seed(42);
//! runner.set_network(network);
//!
//! let clustering = runner.run().unwrap();
//! assert_eq!(clustering.n_clusters(), 2);
//! ```

pub mod clustering;
pub mod community_search;
pub mod driver;
pub mod error;
pub mod layout;
pub mod moving;
pub mod network;
pub mod util;

pub use clustering::Clustering;
pub use community_search::{calc_cpm_quality, leiden::Leiden, louvain::Louvain};
pub use driver::{
    merge_small_clusters_by_n_nodes, merge_small_clusters_by_weight, ClusteringAlgorithm,
    ClusteringQuality, ClusteringRunner, LayoutQuality, LayoutRunner, Normalization,
};
pub use error::{Error, Result};
pub use layout::{vos::GradientDescentLayout, Layout};
pub use moving::{fast::FastLocalMoving, merging::LocalMerging, standard::StandardLocalMoving};
pub use network::{Network, NodeWeights};
