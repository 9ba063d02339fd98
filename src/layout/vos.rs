//! VOS layout quality function and its gradient-descent optimiser.
//!
//! The quality function penalises long edges (attraction) and short node
//! pairs (repulsion) through the distance transform `f_k(d) = d^k / k`
//! (`ln d` for `k = 0`). It is minimised by per-node normalised gradient
//! steps with an adaptive step size.

use rand::Rng;

use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::network::Network;
use crate::util;

const DEFAULT_MAX_N_ITERATIONS: usize = 1000;
const DEFAULT_INITIAL_STEP_SIZE: f64 = 1.0;
const DEFAULT_MIN_STEP_SIZE: f64 = 0.001;
const DEFAULT_STEP_SIZE_REDUCTION: f64 = 0.75;
const DEFAULT_REQUIRED_N_QUALITY_UPDATES: usize = 5;

/// Gradient descent over the VOS quality function.
#[derive(Debug, Clone)]
pub struct GradientDescentLayout {
    attraction: i32,
    repulsion: i32,
    edge_weight_increment: f64,
    max_n_iterations: usize,
    initial_step_size: f64,
    min_step_size: f64,
    step_size_reduction: f64,
    required_n_quality_updates: usize,
}

impl GradientDescentLayout {
    /// Creates an optimiser for the given quality-function parameters.
    ///
    /// `attraction` must exceed `repulsion`; the edge weight increment adds a
    /// weak attraction between every node pair and must be non-negative.
    pub fn new(attraction: i32, repulsion: i32, edge_weight_increment: f64) -> Result<Self> {
        if attraction <= repulsion {
            return Err(Error::InvalidParameter {
                name: "attraction",
                message: "attraction must be greater than repulsion",
            });
        }
        if edge_weight_increment < 0.0 {
            return Err(Error::InvalidParameter {
                name: "edge_weight_increment",
                message: "edge weight increment must be non-negative",
            });
        }
        Ok(GradientDescentLayout {
            attraction,
            repulsion,
            edge_weight_increment,
            max_n_iterations: DEFAULT_MAX_N_ITERATIONS,
            initial_step_size: DEFAULT_INITIAL_STEP_SIZE,
            min_step_size: DEFAULT_MIN_STEP_SIZE,
            step_size_reduction: DEFAULT_STEP_SIZE_REDUCTION,
            required_n_quality_updates: DEFAULT_REQUIRED_N_QUALITY_UPDATES,
        })
    }

    pub fn with_max_n_iterations(mut self, max_n_iterations: usize) -> Self {
        self.max_n_iterations = max_n_iterations;
        self
    }

    pub fn with_step_sizes(
        mut self,
        initial_step_size: f64,
        min_step_size: f64,
        step_size_reduction: f64,
    ) -> Self {
        self.initial_step_size = initial_step_size;
        self.min_step_size = min_step_size;
        self.step_size_reduction = step_size_reduction;
        self
    }

    /// Runs gradient descent until the iteration budget is spent or the step
    /// size drops below its minimum.
    pub fn improve_layout<R: Rng>(&self, network: &Network, layout: &mut Layout, rng: &mut R) {
        let n_nodes = network.n_nodes();
        if n_nodes == 0 {
            return;
        }

        let mut step_size = self.initial_step_size;
        let mut quality = f64::INFINITY;
        let mut n_quality_updates = 0;
        let mut visited = vec![false; n_nodes];

        let mut iteration = 0;
        while iteration < self.max_n_iterations && step_size >= self.min_step_size {
            let old_quality = quality;
            quality = 0.0;
            visited.fill(false);

            let node_order = util::random_permutation(n_nodes, rng);
            for &k in &node_order {
                let (mut gradient_x, mut gradient_y) = (0.0, 0.0);
                let (x_k, y_k) = layout.coordinates(k);

                // attraction along edges
                for (l, edge_weight) in network.neighbors(k) {
                    let dx = x_k - layout.x()[l];
                    let dy = y_k - layout.y()[l];
                    let squared_distance = dx * dx + dy * dy;
                    let distance = squared_distance.sqrt();
                    if squared_distance > 0.0 {
                        let gradient =
                            edge_weight * util::fast_pow(distance, self.attraction - 2);
                        gradient_x += gradient * dx;
                        gradient_y += gradient * dy;
                    }
                    if !visited[l] {
                        quality += edge_weight * self.distance_transform(distance, self.attraction);
                    }
                }

                // uniform attraction and repulsion over all pairs; a zero
                // distance would blow up the gradient, so that term is skipped
                for l in 0..n_nodes {
                    if l == k {
                        continue;
                    }
                    let dx = x_k - layout.x()[l];
                    let dy = y_k - layout.y()[l];
                    let squared_distance = dx * dx + dy * dy;
                    let distance = squared_distance.sqrt();

                    if self.edge_weight_increment > 0.0 {
                        if squared_distance > 0.0 {
                            let gradient = self.edge_weight_increment
                                * util::fast_pow(distance, self.attraction - 2);
                            gradient_x += gradient * dx;
                            gradient_y += gradient * dy;
                        }
                        if !visited[l] {
                            quality += self.edge_weight_increment
                                * self.distance_transform(distance, self.attraction);
                        }
                    }

                    let repulsion_weight = network.node_weight(k) * network.node_weight(l);
                    if squared_distance > 0.0 {
                        let gradient =
                            repulsion_weight * util::fast_pow(distance, self.repulsion - 2);
                        gradient_x -= gradient * dx;
                        gradient_y -= gradient * dy;
                    }
                    if !visited[l] {
                        quality -=
                            repulsion_weight * self.distance_transform(distance, self.repulsion);
                    }
                }
                visited[k] = true;

                let gradient_length =
                    (gradient_x * gradient_x + gradient_y * gradient_y).sqrt();
                if gradient_length > 0.0 {
                    layout.x[k] = x_k - step_size * gradient_x / gradient_length;
                    layout.y[k] = y_k - step_size * gradient_y / gradient_length;
                }
            }

            if quality < old_quality {
                n_quality_updates += 1;
                if n_quality_updates >= self.required_n_quality_updates {
                    step_size /= self.step_size_reduction;
                    n_quality_updates = 0;
                }
            } else {
                step_size *= self.step_size_reduction;
                n_quality_updates = 0;
            }

            log::trace!(
                "gradient descent iteration {iteration}: quality {quality:.6}, step size {step_size:.6}"
            );
            iteration += 1;
        }
    }

    /// The exact quality of a layout, summed over all node pairs.
    pub fn calc_quality(&self, network: &Network, layout: &Layout) -> f64 {
        let n_nodes = network.n_nodes();
        let mut quality = 0.0;

        for node in 0..n_nodes {
            let (x, y) = layout.coordinates(node);
            for (neighbor, edge_weight) in network.neighbors(node) {
                if neighbor < node {
                    let dx = x - layout.x()[neighbor];
                    let dy = y - layout.y()[neighbor];
                    let distance = (dx * dx + dy * dy).sqrt();
                    quality += edge_weight * self.distance_transform(distance, self.attraction);
                }
            }
        }

        for i in 0..n_nodes {
            let (x_i, y_i) = layout.coordinates(i);
            for j in 0..i {
                let dx = x_i - layout.x()[j];
                let dy = y_i - layout.y()[j];
                let distance = (dx * dx + dy * dy).sqrt();
                if self.edge_weight_increment > 0.0 {
                    quality += self.edge_weight_increment
                        * self.distance_transform(distance, self.attraction);
                }
                quality -= network.node_weight(i)
                    * network.node_weight(j)
                    * self.distance_transform(distance, self.repulsion);
            }
        }

        quality
    }

    fn distance_transform(&self, distance: f64, exponent: i32) -> f64 {
        if exponent == 0 {
            distance.ln()
        } else {
            util::fast_pow(distance, exponent) / exponent as f64
        }
    }
}
