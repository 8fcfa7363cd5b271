use rand::Rng;

use super::{Backend, BackendKind, Parameters};
use crate::{Activation, Error, Layer, Matrix, Result, Topology};

/// Neuron-graph backend.
///
/// The network owns its layers in order; layer 0 is the input layer. "Previous" and
/// "next" are plain index arithmetic, so there are no back references to manage.
#[derive(Debug, Clone)]
pub struct GraphBackend {
    layers: Vec<Layer>,
    activation: Activation,
}

impl GraphBackend {
    pub fn new<R: Rng + ?Sized>(topology: &Topology, activation: Activation, rng: &mut R) -> Self {
        let mut layers = Vec::with_capacity(topology.layer_count());
        let mut prev = 0;
        for &size in topology.sizes() {
            layers.push(Layer::new(size, prev, rng));
            prev = size;
        }
        Self { layers, activation }
    }

    #[inline]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }
}

/// Index of the single `1.0` in a one-hot vector.
fn hot_index(expected: &[f64]) -> Result<usize> {
    let mut hot = expected.iter().enumerate().filter(|&(_, &v)| v == 1.0);
    let idx = hot.next().map(|(i, _)| i);
    let all_cold = expected.iter().all(|&v| v == 0.0 || v == 1.0);
    match (idx, hot.next(), all_cold) {
        (Some(i), None, true) => Ok(i),
        _ => Err(Error::InvalidData(
            "expected output must be a one-hot vector".to_owned(),
        )),
    }
}

impl Backend for GraphBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Graph
    }

    fn topology(&self) -> Topology {
        let sizes = self.layers.iter().map(Layer::len).collect();
        Topology::from_validated(sizes)
    }

    fn set_input(&mut self, input: &[f64]) -> Result<()> {
        if input.len() != self.layers[0].len() {
            return Err(Error::DimensionMismatch(format!(
                "input len {} does not match input width {}",
                input.len(),
                self.layers[0].len()
            )));
        }
        self.layers[0].set_values(input)
    }

    fn forward(&mut self) -> Result<()> {
        for i in 1..self.layers.len() {
            let (before, rest) = self.layers.split_at_mut(i);
            rest[0].feed_forward(&before[i - 1], self.activation);
        }
        Ok(())
    }

    fn backward(&mut self, expected: &[f64], learning_rate: f64) -> Result<()> {
        let last = self.layers.len() - 1;
        if expected.len() != self.layers[last].len() {
            return Err(Error::DimensionMismatch(format!(
                "expected len {} does not match output width {}",
                expected.len(),
                self.layers[last].len()
            )));
        }
        let target = hot_index(expected)?;

        self.layers[last].output_errors(target, self.activation);
        for i in (1..last).rev() {
            let (head, tail) = self.layers.split_at_mut(i + 1);
            head[i].hidden_errors(&tail[0], self.activation);
        }

        for i in 1..self.layers.len() {
            let (before, rest) = self.layers.split_at_mut(i);
            rest[0].update(&before[i - 1], learning_rate);
        }
        Ok(())
    }

    fn output(&self) -> Vec<f64> {
        self.layers[self.layers.len() - 1].values()
    }

    fn parameters(&self) -> Parameters {
        let mut weights = Vec::with_capacity(self.layers.len() - 1);
        let mut biases = Vec::with_capacity(self.layers.len() - 1);

        for pair in self.layers.windows(2) {
            let (prev, layer) = (&pair[0], &pair[1]);
            // Neuron-major storage is (out, in); transpose into (in, out).
            let mut w = Matrix::zeros(prev.len(), layer.len());
            for (j, n) in layer.neurons().iter().enumerate() {
                for (i, &v) in n.weights().iter().enumerate() {
                    w.set(i, j, v);
                }
            }
            weights.push(w);
            biases.push(layer.neurons().iter().map(|n| n.bias()).collect());
        }

        Parameters { weights, biases }
    }

    fn set_parameters(&mut self, params: &Parameters) -> Result<()> {
        params.check_topology(&self.topology())?;

        for (layer, (w, b)) in self.layers[1..]
            .iter_mut()
            .zip(params.weights.iter().zip(&params.biases))
        {
            let native = w.transpose();
            for (j, n) in layer.neurons_mut().iter_mut().enumerate() {
                n.set_weights(native.row(j));
                n.set_bias(b[j]);
            }
        }
        Ok(())
    }
}
