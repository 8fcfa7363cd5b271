//! Network backends.
//!
//! Both backends implement the same [`Backend`] contract:
//!
//! - `set_input` loads layer 0
//! - `forward` computes every downstream layer as `activation(prev * W + b)`
//! - `backward` computes error terms from the output toward the input with the
//!   current weights, then applies `W -= lr * outer(prev, error)` and `b -= lr * error`
//!
//! [`MatrixBackend`] works on whole layers at a time through [`Matrix`] operations.
//! [`GraphBackend`] walks explicit neuron objects.
//!
//! Parameters move between backends (and to disk) as [`Parameters`], whose weight
//! matrices use the exchange orientation `(in_width, out_width)`.

mod graph;
mod matrix;

pub use graph::GraphBackend;
pub use matrix::MatrixBackend;

use rand::Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Activation, Error, Matrix, Result, Topology};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Matrix,
    Graph,
}

pub trait Backend: Send {
    fn kind(&self) -> BackendKind;

    fn topology(&self) -> Topology;

    /// Fails with `DimensionMismatch` unless `input.len()` equals the input width.
    fn set_input(&mut self, input: &[f64]) -> Result<()>;

    fn forward(&mut self) -> Result<()>;

    /// One gradient-descent step toward `expected` for the current input.
    ///
    /// `forward` must have run for the current input.
    fn backward(&mut self, expected: &[f64], learning_rate: f64) -> Result<()>;

    /// Activation of the output layer after the last `forward`.
    fn output(&self) -> Vec<f64>;

    fn parameters(&self) -> Parameters;

    /// Replace all weights and biases. Shapes must match the current topology;
    /// nothing is modified on failure.
    fn set_parameters(&mut self, params: &Parameters) -> Result<()>;
}

/// Build a freshly initialized backend of `kind` for `topology`.
pub fn build<R: Rng + ?Sized>(
    kind: BackendKind,
    topology: &Topology,
    activation: Activation,
    rng: &mut R,
) -> Box<dyn Backend> {
    match kind {
        BackendKind::Matrix => Box::new(MatrixBackend::new(topology, activation, rng)),
        BackendKind::Graph => Box::new(GraphBackend::new(topology, activation, rng)),
    }
}

/// Full weight and bias set in exchange orientation.
///
/// Transition `i` has a `(sizes[i], sizes[i + 1])` weight matrix and a bias vector
/// of length `sizes[i + 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    weights: Vec<Matrix>,
    biases: Vec<Vec<f64>>,
}

impl Parameters {
    /// Validates that shapes chain into a topology.
    pub fn new(weights: Vec<Matrix>, biases: Vec<Vec<f64>>) -> Result<Self> {
        if weights.is_empty() {
            return Err(Error::DimensionMismatch(
                "parameters must contain at least one transition".to_owned(),
            ));
        }
        if weights.len() != biases.len() {
            return Err(Error::DimensionMismatch(format!(
                "{} weight matrices but {} bias vectors",
                weights.len(),
                biases.len()
            )));
        }
        for (i, (w, b)) in weights.iter().zip(&biases).enumerate() {
            if w.rows() == 0 || w.cols() == 0 {
                return Err(Error::DimensionMismatch(format!(
                    "transition {i} has an empty {}x{} weight matrix",
                    w.rows(),
                    w.cols()
                )));
            }
            if b.len() != w.cols() {
                return Err(Error::DimensionMismatch(format!(
                    "transition {i}: bias len {} does not match weight cols {}",
                    b.len(),
                    w.cols()
                )));
            }
            if i > 0 && w.rows() != weights[i - 1].cols() {
                return Err(Error::DimensionMismatch(format!(
                    "transition {i}: weight rows {} do not match previous cols {}",
                    w.rows(),
                    weights[i - 1].cols()
                )));
            }
        }
        Ok(Self { weights, biases })
    }

    #[inline]
    pub fn transitions(&self) -> usize {
        self.weights.len()
    }

    #[inline]
    pub fn weights(&self) -> &[Matrix] {
        &self.weights
    }

    #[inline]
    pub fn biases(&self) -> &[Vec<f64>] {
        &self.biases
    }

    /// `[rows(w0), cols(w0), cols(w1), ...]`.
    pub fn topology(&self) -> Topology {
        let mut sizes = Vec::with_capacity(self.weights.len() + 1);
        sizes.push(self.weights[0].rows());
        sizes.extend(self.weights.iter().map(Matrix::cols));
        // `new` rejected empty shapes and broken chains.
        Topology::from_validated(sizes)
    }

    pub(crate) fn check_topology(&self, topology: &Topology) -> Result<()> {
        let ours = self.topology();
        if &ours != topology {
            return Err(Error::DimensionMismatch(format!(
                "parameters describe layers {:?}, backend has {:?}",
                ours.sizes(),
                topology.sizes()
            )));
        }
        Ok(())
    }
}
