//! Two-dimensional node coordinates and their standardisation.

use rand::Rng;

use crate::error::{Error, Result};
use crate::util;

pub mod vos;

/// Node coordinates of a layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl Layout {
    /// Random coordinates, uniform in `[-1, 1]²`.
    pub fn new_random<R: Rng>(n_nodes: usize, rng: &mut R) -> Self {
        let mut x = Vec::with_capacity(n_nodes);
        let mut y = Vec::with_capacity(n_nodes);
        for _ in 0..n_nodes {
            x.push(2.0 * rng.random::<f64>() - 1.0);
            y.push(2.0 * rng.random::<f64>() - 1.0);
        }
        Layout { x, y }
    }

    pub fn from_coordinates(x: Vec<f64>, y: Vec<f64>) -> Result<Self> {
        if x.len() != y.len() {
            return Err(Error::InvalidParameter {
                name: "coordinates",
                message: "x and y arrays differ in length",
            });
        }
        Ok(Layout { x, y })
    }

    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.x.len()
    }

    #[inline]
    pub fn coordinates(&self, node: usize) -> (f64, f64) {
        (self.x[node], self.y[node])
    }

    #[inline]
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    #[inline]
    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn min_distance(&self) -> f64 {
        self.fold_distances(f64::INFINITY, f64::min)
    }

    pub fn max_distance(&self) -> f64 {
        self.fold_distances(f64::NEG_INFINITY, f64::max)
    }

    /// Mean Euclidean distance over all node pairs.
    pub fn average_distance(&self) -> f64 {
        let n = self.n_nodes();
        if n < 2 {
            return 0.0;
        }
        let total = self.fold_distances(0.0, |sum, distance| sum + distance);
        total / (n * (n - 1) / 2) as f64
    }

    fn fold_distances(&self, init: f64, fold: impl Fn(f64, f64) -> f64) -> f64 {
        let mut accumulator = init;
        for i in 0..self.n_nodes() {
            for j in 0..i {
                let dx = self.x[i] - self.x[j];
                let dy = self.y[i] - self.y[j];
                accumulator = fold(accumulator, (dx * dx + dy * dy).sqrt());
            }
        }
        accumulator
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        for x in self.x.iter_mut() {
            *x += dx;
        }
        for y in self.y.iter_mut() {
            *y += dy;
        }
    }

    /// Rotates the coordinate frame by `angle` radians, so a point lying at
    /// `angle` ends up on the positive x axis.
    pub fn rotate(&mut self, angle: f64) {
        let (sin, cos) = angle.sin_cos();
        for node in 0..self.n_nodes() {
            let x = self.x[node];
            let y = self.y[node];
            self.x[node] = cos * x + sin * y;
            self.y[node] = -sin * x + cos * y;
        }
    }

    pub fn flip_x(&mut self) {
        for x in self.x.iter_mut() {
            *x = -*x;
        }
    }

    pub fn flip_y(&mut self) {
        for y in self.y.iter_mut() {
            *y = -*y;
        }
    }

    /// Standardises the layout: centroid to the origin, principal component
    /// along the x axis, each axis flipped so its median is non-positive and,
    /// with `use_dilation`, coordinates scaled to mean pairwise distance 1.
    pub fn standardize(&mut self, use_dilation: bool) {
        let n = self.n_nodes();
        if n == 0 {
            return;
        }

        self.translate(-util::calc_average(&self.x), -util::calc_average(&self.y));

        let mut covariance_xx = 0.0;
        let mut covariance_yy = 0.0;
        let mut covariance_xy = 0.0;
        for node in 0..n {
            covariance_xx += self.x[node] * self.x[node];
            covariance_yy += self.y[node] * self.y[node];
            covariance_xy += self.x[node] * self.y[node];
        }
        // principal eigenvector angle of the 2x2 covariance matrix
        let angle = 0.5 * (2.0 * covariance_xy).atan2(covariance_xx - covariance_yy);
        self.rotate(angle);

        if util::calc_median(&self.x) > 0.0 {
            self.flip_x();
        }
        if util::calc_median(&self.y) > 0.0 {
            self.flip_y();
        }

        if use_dilation {
            let average_distance = self.average_distance();
            if average_distance > 0.0 {
                for x in self.x.iter_mut() {
                    *x /= average_distance;
                }
                for y in self.y.iter_mut() {
                    *y /= average_distance;
                }
            }
        }
    }
}
