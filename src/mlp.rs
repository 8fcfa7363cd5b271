//! The training driver.
//!
//! [`Mlp`] owns one active backend together with the topology, configuration,
//! datasets, metrics and listener around it. Operations take `&mut self`, so a
//! driver can only ever run one of them at a time; share it across threads behind a
//! lock if a UI needs to kick off work in the background.
//!
//! The epoch, cross-validation and test loops live in `train.rs`.

use std::path::Path;

use log::{debug, info};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::backend::{self, Backend, BackendKind, Parameters};
use crate::data::label_to_letter;
use crate::train::argmax_label;
use crate::{
    Config, Dataset, Error, Image, Listener, Metrics, NoopListener, Result, Topology, persist,
};

/// What the driver is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    #[default]
    Idle,
    TrainingEpochs,
    CrossValidating,
    Testing,
    Predicting,
}

pub struct Mlp {
    pub(crate) config: Config,
    pub(crate) topology: Topology,
    pub(crate) backend: Box<dyn Backend>,
    pub(crate) train: Dataset,
    pub(crate) test: Dataset,
    pub(crate) metrics: Metrics,
    pub(crate) listener: Box<dyn Listener>,
    pub(crate) rng: StdRng,
    pub(crate) state: State,
}

impl Mlp {
    /// A driver with default configuration, seeded from OS entropy.
    pub fn new(topology: Topology) -> Self {
        Self::new_with_rng(topology, StdRng::from_entropy())
    }

    /// Deterministic construction: the same seed yields the same initial weights and
    /// the same shuffles.
    pub fn new_with_seed(topology: Topology, seed: u64) -> Self {
        Self::new_with_rng(topology, StdRng::seed_from_u64(seed))
    }

    pub fn new_with_rng(topology: Topology, mut rng: StdRng) -> Self {
        let config = Config::default();
        let backend = backend::build(config.backend, &topology, config.activation, &mut rng);
        let metrics = Metrics::new(topology.output_size());
        Self {
            config,
            topology,
            backend,
            train: Dataset::default(),
            test: Dataset::default(),
            metrics,
            listener: Box::new(NoopListener),
            rng,
            state: State::Idle,
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Install a new configuration.
    ///
    /// A change of backend kind or activation reinitializes the backend; every other
    /// field applies to the next operation.
    pub fn set_config(&mut self, config: Config) -> Result<()> {
        config.validate()?;
        let rebuild =
            config.backend != self.config.backend || config.activation != self.config.activation;
        self.config = config;
        if rebuild {
            self.rebuild();
        }
        Ok(())
    }

    pub fn set_listener<L: Listener + 'static>(&mut self, listener: L) {
        self.listener = Box::new(listener);
    }

    #[inline]
    pub fn state(&self) -> State {
        self.state
    }

    #[inline]
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    #[inline]
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Metrics of the most recent phase.
    #[inline]
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn set_train_dataset(&mut self, dataset: Dataset) {
        debug!("train dataset: {} images", dataset.len());
        self.train = dataset;
    }

    pub fn set_test_dataset(&mut self, dataset: Dataset) {
        debug!("test dataset: {} images", dataset.len());
        self.test = dataset;
    }

    /// Replace the training set with an EMNIST CSV file. The old set is kept on failure.
    pub fn load_train_dataset<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let dataset = Dataset::load_emnist(path)?;
        self.set_train_dataset(dataset);
        Ok(())
    }

    /// Replace the test set with an EMNIST CSV file. The old set is kept on failure.
    pub fn load_test_dataset<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let dataset = Dataset::load_emnist(path)?;
        self.set_test_dataset(dataset);
        Ok(())
    }

    #[inline]
    pub fn train_len(&self) -> usize {
        self.train.len()
    }

    #[inline]
    pub fn test_len(&self) -> usize {
        self.test.len()
    }

    /// Discard the current backend and start over with a freshly initialized one.
    pub fn set_backend_kind(&mut self, kind: BackendKind) {
        self.config.backend = kind;
        self.rebuild();
    }

    /// Keep input and output widths, replace the hidden layers.
    pub fn update_topology(&mut self, hidden_count: usize, hidden_width: usize) -> Result<()> {
        let topology = Topology::with_hidden(
            self.topology.input_size(),
            hidden_count,
            hidden_width,
            self.topology.output_size(),
        )?;
        self.set_topology(topology);
        Ok(())
    }

    /// Replace the whole topology. Trained parameters are discarded.
    pub fn set_topology(&mut self, topology: Topology) {
        self.topology = topology;
        self.rebuild();
    }

    /// Raw output activations for one input vector.
    pub fn predict(&mut self, input: &[f64]) -> Result<Vec<f64>> {
        self.state = State::Predicting;
        let result = self.forward(input);
        self.state = State::Idle;
        result
    }

    /// 1-based label of the strongest output unit.
    pub fn predict_label(&mut self, input: &[f64]) -> Result<usize> {
        self.predict(input).map(|out| argmax_label(&out))
    }

    /// The letter the network reads in `image`.
    pub fn predict_letter(&mut self, image: &Image) -> Result<char> {
        let label = self.predict_label(image.pixels())?;
        label_to_letter(label).ok_or_else(|| {
            Error::InvalidData(format!("predicted label {label} is not a letter"))
        })
    }

    pub fn parameters(&self) -> Parameters {
        self.backend.parameters()
    }

    /// Install explicit parameters. The topology is taken from their shapes.
    ///
    /// Nothing changes on failure.
    pub fn set_parameters(&mut self, params: &Parameters) -> Result<()> {
        let topology = params.topology();
        // A scratch generator keeps the driver's own sequence untouched; every
        // random value is overwritten below anyway.
        let mut scratch = self.rng.clone();
        let mut backend = backend::build(
            self.config.backend,
            &topology,
            self.config.activation,
            &mut scratch,
        );
        backend.set_parameters(params)?;

        debug!("installed parameters for topology {:?}", topology.sizes());
        self.metrics = Metrics::new(topology.output_size());
        self.topology = topology;
        self.backend = backend;
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let p = path.as_ref();
        persist::save(p, &self.backend.parameters())?;
        info!("saved parameters to {}", p.display());
        Ok(())
    }

    /// Load parameters saved by [`Mlp::save`].
    ///
    /// The file is fully decoded and a replacement backend built before anything in
    /// the driver is touched, so a failed load leaves it exactly as it was.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let p = path.as_ref();
        let params = persist::load(p)?;
        self.set_parameters(&params)?;
        info!(
            "loaded parameters from {} (topology {:?})",
            p.display(),
            self.topology.sizes()
        );
        Ok(())
    }

    pub(crate) fn forward(&mut self, input: &[f64]) -> Result<Vec<f64>> {
        self.backend.set_input(input)?;
        self.backend.forward()?;
        Ok(self.backend.output())
    }

    fn rebuild(&mut self) {
        debug!(
            "building {:?} backend for topology {:?}",
            self.config.backend,
            self.topology.sizes()
        );
        self.backend = backend::build(
            self.config.backend,
            &self.topology,
            self.config.activation,
            &mut self.rng,
        );
        self.metrics = Metrics::new(self.topology.output_size());
    }
}

impl Default for Mlp {
    fn default() -> Self {
        Self::new(Topology::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Matrix;

    fn small() -> Mlp {
        Mlp::new_with_seed(Topology::new(vec![4, 3, 2]).unwrap(), 7)
    }

    #[test]
    fn same_seed_same_weights() {
        let a = small();
        let b = small();
        assert_eq!(a.parameters(), b.parameters());
    }

    #[test]
    fn backend_switch_reinitializes() {
        let mut mlp = small();
        let before = mlp.parameters();
        mlp.set_backend_kind(BackendKind::Graph);
        assert_eq!(mlp.backend_kind(), BackendKind::Graph);
        assert_eq!(mlp.config().backend, BackendKind::Graph);
        assert_ne!(mlp.parameters(), before);
        assert_eq!(mlp.parameters().topology(), *mlp.topology());
    }

    #[test]
    fn update_topology_keeps_io_widths() {
        let mut mlp = small();
        mlp.update_topology(3, 5).unwrap();
        assert_eq!(mlp.topology().sizes(), &[4, 5, 5, 5, 2]);
        assert_eq!(mlp.parameters().transitions(), 4);
        assert_eq!(mlp.metrics().classes(), 2);

        mlp.update_topology(0, 0).unwrap();
        assert_eq!(mlp.topology().sizes(), &[4, 2]);
        assert!(mlp.update_topology(1, 0).is_err());
    }

    #[test]
    fn set_parameters_infers_topology() {
        let mut mlp = small();
        let params = Parameters::new(
            vec![Matrix::zeros(4, 6), Matrix::zeros(6, 3)],
            vec![vec![0.0; 6], vec![0.0; 3]],
        )
        .unwrap();
        mlp.set_parameters(&params).unwrap();
        assert_eq!(mlp.topology().sizes(), &[4, 6, 3]);
        assert_eq!(mlp.metrics().classes(), 3);
        assert_eq!(mlp.parameters(), params);

        // Zero weights and biases put every sigmoid unit at 0.5.
        assert_eq!(mlp.predict(&[1.0, 2.0, 3.0, 4.0]).unwrap(), vec![0.5; 3]);
        assert_eq!(mlp.state(), State::Idle);
    }

    #[test]
    fn predict_rejects_wrong_width() {
        let mut mlp = small();
        let err = mlp.predict(&[0.0; 3]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch(_)));
        assert_eq!(mlp.state(), State::Idle);
    }

    #[test]
    fn predict_letter_maps_argmax() {
        let w = Matrix::from_rows(&[vec![0.0, 5.0], vec![0.0, 5.0]]).unwrap();
        let params = Parameters::new(vec![w], vec![vec![0.0, 0.0]]).unwrap();
        let mut mlp = Mlp::new_with_seed(Topology::new(vec![2, 2]).unwrap(), 0);
        mlp.set_parameters(&params).unwrap();
        let image = Image::new(2, vec![1.0, 1.0]);
        assert_eq!(mlp.predict_letter(&image).unwrap(), 'B');
    }

    #[test]
    fn config_change_rebuilds_only_when_needed() {
        let mut mlp = small();
        let before = mlp.parameters();

        let mut cfg = *mlp.config();
        cfg.epochs = 9;
        mlp.set_config(cfg).unwrap();
        assert_eq!(mlp.parameters(), before);

        cfg.activation = crate::Activation::Tanh;
        mlp.set_config(cfg).unwrap();
        assert_ne!(mlp.parameters(), before);

        cfg.k_folds = 1;
        assert!(matches!(mlp.set_config(cfg), Err(Error::InvalidConfig(_))));
        assert_eq!(mlp.config().k_folds, 3);
    }
}
