use rand::Rng;

use crate::Activation;
use crate::matrix::INIT_RANGE;

/// A single unit of the graph backend.
///
/// `weights[i]` is the weight of the connection from neuron `i` of the previous layer.
/// Input-layer neurons have no weights.
#[derive(Debug, Clone, PartialEq)]
pub struct Neuron {
    value: f64,
    error: f64,
    bias: f64,
    weights: Vec<f64>,
}

impl Neuron {
    pub fn new<R: Rng + ?Sized>(num_inputs: usize, rng: &mut R) -> Self {
        let weights = (0..num_inputs)
            .map(|_| rng.gen_range(-INIT_RANGE..=INIT_RANGE))
            .collect();
        let bias = if num_inputs == 0 {
            0.0
        } else {
            rng.gen_range(-INIT_RANGE..=INIT_RANGE)
        };
        Self {
            value: 0.0,
            error: 0.0,
            bias,
            weights,
        }
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    #[inline]
    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    #[inline]
    pub fn error(&self) -> f64 {
        self.error
    }

    #[inline]
    pub fn bias(&self) -> f64 {
        self.bias
    }

    #[inline]
    pub fn set_bias(&mut self, bias: f64) {
        self.bias = bias;
    }

    #[inline]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    #[inline]
    pub fn weight(&self, from: usize) -> f64 {
        self.weights[from]
    }

    /// Overwrites the incoming weights; the caller keeps the length consistent.
    #[inline]
    pub fn set_weights(&mut self, weights: &[f64]) {
        debug_assert_eq!(weights.len(), self.weights.len());
        self.weights.clear();
        self.weights.extend_from_slice(weights);
    }

    /// `value = activation(sum(inputs * weights) + bias)`.
    #[inline]
    pub fn activate(&mut self, inputs: &[f64], activation: Activation) {
        debug_assert_eq!(inputs.len(), self.weights.len());

        let mut sum = self.bias;
        for (&w, &x) in self.weights.iter().zip(inputs) {
            sum = w.mul_add(x, sum);
        }
        self.value = activation.forward(sum);
    }

    /// `error = upstream * activation'(value)`.
    #[inline]
    pub fn set_error(&mut self, upstream: f64, activation: Activation) {
        self.error = upstream * activation.derivative(self.value);
    }

    /// `w -= lr * error * input`, `b -= lr * error`.
    #[inline]
    pub fn update(&mut self, inputs: &[f64], learning_rate: f64) {
        debug_assert_eq!(inputs.len(), self.weights.len());

        let step = learning_rate * self.error;
        for (w, &x) in self.weights.iter_mut().zip(inputs) {
            *w -= step * x;
        }
        self.bias -= step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn activate_uses_weights_and_bias() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut n = Neuron::new(2, &mut rng);
        n.set_weights(&[1.0, -1.0]);
        n.set_bias(0.0);
        n.activate(&[0.5, 0.5], Activation::Sigmoid);
        assert_eq!(n.value(), 0.5);
    }

    #[test]
    fn update_moves_against_the_error() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut n = Neuron::new(2, &mut rng);
        n.set_weights(&[0.0, 0.0]);
        n.set_bias(0.0);
        n.set_value(0.5);
        n.set_error(2.0, Activation::Sigmoid);
        assert_eq!(n.error(), 0.5);

        n.update(&[1.0, -2.0], 0.1);
        assert_eq!(n.weights(), &[-0.05, 0.1]);
        assert_eq!(n.bias(), -0.05);
    }

    #[test]
    fn input_neurons_have_no_weights() {
        let mut rng = StdRng::seed_from_u64(0);
        let n = Neuron::new(0, &mut rng);
        assert!(n.weights().is_empty());
        assert_eq!(n.bias(), 0.0);
    }
}
