//! Assignment of nodes to clusters.

/// A node-to-cluster map together with the number of clusters.
///
/// Cluster ids are not required to be dense until
/// [`remove_empty_clusters`](Clustering::remove_empty_clusters) is called;
/// `n_clusters` is always one more than the largest stored id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clustering {
    clusters: Vec<usize>,
    n_clusters: usize,
}

impl Clustering {
    /// Every node in its own cluster.
    pub fn new_singleton(n_nodes: usize) -> Self {
        Clustering {
            clusters: (0..n_nodes).collect(),
            n_clusters: n_nodes,
        }
    }

    /// Takes over an explicit assignment array.
    pub fn from_assignments(clusters: Vec<usize>) -> Self {
        let n_clusters = clusters.iter().max().map_or(0, |&c| c + 1);
        Clustering {
            clusters,
            n_clusters,
        }
    }

    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.clusters.len()
    }

    #[inline]
    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    #[inline]
    pub fn cluster_of(&self, node: usize) -> usize {
        self.clusters[node]
    }

    #[inline]
    pub fn clusters(&self) -> &[usize] {
        &self.clusters
    }

    /// Assigns a node to a cluster, widening `n_clusters` if needed.
    #[inline]
    pub fn set_cluster(&mut self, node: usize, cluster: usize) {
        self.clusters[node] = cluster;
        self.n_clusters = self.n_clusters.max(cluster + 1);
    }

    pub fn n_nodes_per_cluster(&self) -> Vec<usize> {
        let mut counts = vec![0; self.n_clusters];
        for &cluster in &self.clusters {
            counts[cluster] += 1;
        }
        counts
    }

    /// Member lists per cluster, bucketed in two passes so each list is
    /// allocated at its exact size. Nodes appear in ascending order.
    pub fn nodes_per_cluster(&self) -> Vec<Vec<usize>> {
        let counts = self.n_nodes_per_cluster();
        let mut members: Vec<Vec<usize>> =
            counts.iter().map(|&count| Vec::with_capacity(count)).collect();
        for (node, &cluster) in self.clusters.iter().enumerate() {
            members[cluster].push(node);
        }
        members
    }

    /// Relabels clusters to `0..n_clusters`, dropping empty ids and keeping
    /// the relative order of the remaining ones.
    pub fn remove_empty_clusters(&mut self) {
        let mut sizes = vec![0; self.n_clusters];
        for &cluster in &self.clusters {
            sizes[cluster] += 1;
        }
        let mut new_ids = vec![usize::MAX; self.n_clusters];
        let mut next_id = 0;
        for (cluster, &size) in sizes.iter().enumerate() {
            if size > 0 {
                new_ids[cluster] = next_id;
                next_id += 1;
            }
        }
        for cluster in self.clusters.iter_mut() {
            *cluster = new_ids[*cluster];
        }
        self.n_clusters = next_id;
    }

    /// Relabels clusters in decreasing order of node count. Ties keep their
    /// original relative order.
    pub fn order_clusters_by_n_nodes(&mut self) {
        let keys: Vec<f64> = self
            .n_nodes_per_cluster()
            .into_iter()
            .map(|count| count as f64)
            .collect();
        self.order_clusters_by_key(&keys);
    }

    /// Relabels clusters in decreasing order of total node weight. Ties keep
    /// their original relative order.
    pub fn order_clusters_by_weight(&mut self, node_weights: &[f64]) {
        let mut keys = vec![0.0; self.n_clusters];
        for (node, &cluster) in self.clusters.iter().enumerate() {
            keys[cluster] += node_weights[node];
        }
        self.order_clusters_by_key(&keys);
    }

    fn order_clusters_by_key(&mut self, keys: &[f64]) {
        let mut order: Vec<usize> = (0..self.n_clusters).collect();
        order.sort_by(|&a, &b| {
            keys[b]
                .partial_cmp(&keys[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut new_ids = vec![0; self.n_clusters];
        for (rank, &cluster) in order.iter().enumerate() {
            new_ids[cluster] = rank;
        }
        for cluster in self.clusters.iter_mut() {
            *cluster = new_ids[*cluster];
        }
        // clusters with zero key sort last and fall off the count
        self.n_clusters = keys.iter().filter(|&&key| key > 0.0).count();
    }

    /// Composes this clustering with a clustering of its clusters: node `i`
    /// ends up in `outer.cluster_of(self.cluster_of(i))`.
    pub fn merge_clusters(&mut self, outer: &Clustering) {
        for cluster in self.clusters.iter_mut() {
            *cluster = outer.cluster_of(*cluster);
        }
        self.n_clusters = outer.n_clusters();
    }
}
