use rand::Rng;

use super::{Backend, BackendKind, Parameters};
use crate::{Activation, Error, Matrix, Result, Topology};

/// Stacked-matrix backend.
///
/// Layer activations are `(1, width)` row vectors; weight `i` is
/// `(sizes[i], sizes[i + 1])`, so a forward step is `act[i] * W[i] + b[i]`.
#[derive(Debug, Clone)]
pub struct MatrixBackend {
    weights: Vec<Matrix>,
    biases: Vec<Matrix>,
    /// One row vector per layer, input included.
    values: Vec<Matrix>,
    activation: Activation,
}

impl MatrixBackend {
    pub fn new<R: Rng + ?Sized>(topology: &Topology, activation: Activation, rng: &mut R) -> Self {
        let (weights, biases) = topology
            .transitions()
            .map(|(n_in, n_out)| (Matrix::random(n_in, n_out, rng), Matrix::random(1, n_out, rng)))
            .unzip();
        let values = topology.sizes().iter().map(|&w| Matrix::zeros(1, w)).collect();

        Self {
            weights,
            biases,
            values,
            activation,
        }
    }
}

impl Backend for MatrixBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Matrix
    }

    fn topology(&self) -> Topology {
        let sizes = self.values.iter().map(Matrix::cols).collect();
        Topology::from_validated(sizes)
    }

    fn set_input(&mut self, input: &[f64]) -> Result<()> {
        let width = self.values[0].cols();
        if input.len() != width {
            return Err(Error::DimensionMismatch(format!(
                "input len {} does not match input width {width}",
                input.len()
            )));
        }
        self.values[0] = Matrix::row_vector(input.to_vec());
        Ok(())
    }

    fn forward(&mut self) -> Result<()> {
        for i in 0..self.weights.len() {
            let z = self.values[i].multiply(&self.weights[i])?.add(&self.biases[i])?;
            self.values[i + 1] = z.activate(self.activation);
        }
        Ok(())
    }

    fn backward(&mut self, expected: &[f64], learning_rate: f64) -> Result<()> {
        let act = self.activation;
        let output = &self.values[self.values.len() - 1];
        if expected.len() != output.cols() {
            return Err(Error::DimensionMismatch(format!(
                "expected len {} does not match output width {}",
                expected.len(),
                output.cols()
            )));
        }

        let mut errors = output
            .sub(&Matrix::row_vector(expected.to_vec()))?
            .hadamard(&output.activate_derivative(act))?;

        for i in (0..self.weights.len()).rev() {
            // Propagate through the weights as they were during the forward pass.
            let prev_errors = if i > 0 {
                Some(
                    errors
                        .multiply(&self.weights[i].transpose())?
                        .hadamard(&self.values[i].activate_derivative(act))?,
                )
            } else {
                None
            };

            let grad = self.values[i].transpose().multiply(&errors)?;
            self.weights[i].sub_assign_scaled(&grad, learning_rate)?;
            self.biases[i].sub_assign_scaled(&errors, learning_rate)?;

            if let Some(e) = prev_errors {
                errors = e;
            }
        }
        Ok(())
    }

    fn output(&self) -> Vec<f64> {
        self.values[self.values.len() - 1].as_slice().to_vec()
    }

    fn parameters(&self) -> Parameters {
        Parameters {
            weights: self.weights.clone(),
            biases: self.biases.iter().map(|b| b.as_slice().to_vec()).collect(),
        }
    }

    fn set_parameters(&mut self, params: &Parameters) -> Result<()> {
        params.check_topology(&self.topology())?;
        // Native orientation equals the exchange orientation.
        self.weights = params.weights.clone();
        self.biases = params
            .biases
            .iter()
            .map(|b| Matrix::row_vector(b.clone()))
            .collect();
        Ok(())
    }
}
