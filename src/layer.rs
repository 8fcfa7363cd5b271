use rand::Rng;

use crate::{Activation, Error, Neuron, Result};

/// One layer of the graph backend.
///
/// Layers do not point at their neighbours: the owning network passes the previous
/// or next layer in explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    neurons: Vec<Neuron>,
}

impl Layer {
    /// `size` neurons, each with `prev_size` incoming weights.
    pub fn new<R: Rng + ?Sized>(size: usize, prev_size: usize, rng: &mut R) -> Self {
        let neurons = (0..size).map(|_| Neuron::new(prev_size, rng)).collect();
        Self { neurons }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.neurons.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.neurons.is_empty()
    }

    #[inline]
    pub fn neurons(&self) -> &[Neuron] {
        &self.neurons
    }

    #[inline]
    pub fn neurons_mut(&mut self) -> &mut [Neuron] {
        &mut self.neurons
    }

    pub fn values(&self) -> Vec<f64> {
        self.neurons.iter().map(Neuron::value).collect()
    }

    pub fn set_values(&mut self, values: &[f64]) -> Result<()> {
        if values.len() != self.neurons.len() {
            return Err(Error::DimensionMismatch(format!(
                "{} values for a layer of {} neurons",
                values.len(),
                self.neurons.len()
            )));
        }
        for (n, &v) in self.neurons.iter_mut().zip(values) {
            n.set_value(v);
        }
        Ok(())
    }

    pub fn feed_forward(&mut self, prev: &Layer, activation: Activation) {
        let inputs = prev.values();
        for n in &mut self.neurons {
            n.activate(&inputs, activation);
        }
    }

    /// Output-layer errors for a one-hot target whose hot unit is `target`.
    pub fn output_errors(&mut self, target: usize, activation: Activation) {
        for (j, n) in self.neurons.iter_mut().enumerate() {
            let expected = if j == target { 1.0 } else { 0.0 };
            let upstream = n.value() - expected;
            n.set_error(upstream, activation);
        }
    }

    /// Hidden-layer errors: `activation'(value_j) * sum_k(error_k * w_kj)` over `next`.
    pub fn hidden_errors(&mut self, next: &Layer, activation: Activation) {
        for (j, n) in self.neurons.iter_mut().enumerate() {
            let upstream: f64 = next.neurons.iter().map(|k| k.error() * k.weight(j)).sum();
            n.set_error(upstream, activation);
        }
    }

    pub fn update(&mut self, prev: &Layer, learning_rate: f64) {
        let inputs = prev.values();
        for n in &mut self.neurons {
            n.update(&inputs, learning_rate);
        }
    }
}
