//! Training and evaluation loops.
//!
//! Every loop walks a shuffled list of indices into a [`Dataset`]; the stored
//! records are never reordered. Progress goes to the driver's [`Listener`]:
//!
//! - `sample_progress` about once per percent of a pass
//! - `training_progress` after every epoch or fold
//! - `metrics` once per epoch, per validated fold and per test run

use std::time::Instant;

use log::{debug, info};
use rand::seq::SliceRandom;

use crate::{Backend, Dataset, Error, Listener, Metrics, Mlp, Result, State, TrainMode};

impl Mlp {
    /// Train with the configured mode.
    ///
    /// Fails with `EmptyDataset` before doing any work if no training set is loaded.
    pub fn train(&mut self) -> Result<()> {
        if self.train.is_empty() {
            return Err(Error::EmptyDataset("no training dataset loaded".to_owned()));
        }

        let result = match self.config.mode {
            TrainMode::Epochs => {
                self.state = State::TrainingEpochs;
                self.train_epochs()
            }
            TrainMode::CrossValidation => {
                self.state = State::CrossValidating;
                self.cross_validate()
            }
        };
        self.state = State::Idle;
        result
    }

    /// Evaluate a random `test_sample` fraction of the test set.
    ///
    /// The finished snapshot is available from [`Mlp::metrics`] and has also been sent
    /// to the listener.
    pub fn test(&mut self) -> Result<()> {
        if self.test.is_empty() {
            return Err(Error::EmptyDataset("no test dataset loaded".to_owned()));
        }

        self.state = State::Testing;
        let count = (self.test.len() as f64 * self.config.test_sample).floor() as usize;
        let mut order: Vec<usize> = (0..self.test.len()).collect();
        order.shuffle(&mut self.rng);
        order.truncate(count);
        debug!("testing on {count} of {} images", self.test.len());

        let mut pass = Pass {
            backend: self.backend.as_mut(),
            metrics: &mut self.metrics,
            listener: self.listener.as_mut(),
            learning_rate: self.config.learning_rate,
        };
        let result = pass.evaluate(&self.test, &order, self.config.verbose);
        self.state = State::Idle;
        result
    }

    fn train_epochs(&mut self) -> Result<()> {
        let epochs = self.config.epochs;
        let verbose = self.config.verbose;
        let since = Instant::now();
        let mut order: Vec<usize> = (0..self.train.len()).collect();
        debug!("training {epochs} epochs on {} images", order.len());

        for epoch in 0..epochs {
            order.shuffle(&mut self.rng);

            let mut pass = Pass {
                backend: self.backend.as_mut(),
                metrics: &mut self.metrics,
                listener: self.listener.as_mut(),
                learning_rate: self.config.learning_rate,
            };
            pass.train_epoch(&self.train, &order)?;

            if verbose {
                info!("{}", self.metrics.train_report(epochs, epoch, since));
            }
            self.listener.training_progress(percent_of(epoch + 1, epochs));
            self.listener.metrics(&self.metrics);
            self.metrics.reset_loss();
        }
        Ok(())
    }

    fn cross_validate(&mut self) -> Result<()> {
        let k = self.config.k_folds;
        let n = self.train.len();
        if k < 2 || n < k {
            return Err(Error::InvalidConfig(format!(
                "cannot split {n} images into {k} folds"
            )));
        }

        let verbose = self.config.verbose;
        let since = Instant::now();
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut self.rng);
        let folds = round_robin_folds(&indices, k);
        debug!("cross-validating {n} images over {k} folds");

        for (f, held_out) in folds.iter().enumerate() {
            let mut order: Vec<usize> = folds
                .iter()
                .enumerate()
                .filter(|&(g, _)| g != f)
                .flat_map(|(_, fold)| fold.iter().copied())
                .collect();
            order.shuffle(&mut self.rng);

            let mut pass = Pass {
                backend: self.backend.as_mut(),
                metrics: &mut self.metrics,
                listener: self.listener.as_mut(),
                learning_rate: self.config.learning_rate,
            };
            pass.train_epoch(&self.train, &order)?;
            if verbose {
                info!("fold {}/{k}: {}", f + 1, pass.metrics.train_report(k, f, since));
            }
            pass.evaluate(&self.train, held_out, verbose)?;

            self.listener.training_progress(percent_of(f + 1, k));
        }
        Ok(())
    }
}

/// Split `indices` into `k` folds by position: element `i` goes to fold `i % k`.
///
/// The folds partition `indices` exactly; sizes differ by at most one.
pub fn round_robin_folds(indices: &[usize], k: usize) -> Vec<Vec<usize>> {
    if k == 0 {
        return Vec::new();
    }
    let mut folds: Vec<Vec<usize>> = (0..k)
        .map(|_| Vec::with_capacity(indices.len().div_ceil(k)))
        .collect();
    for (i, &idx) in indices.iter().enumerate() {
        folds[i % k].push(idx);
    }
    folds
}

/// One-hot target for a 1-based `label` over `width` classes.
pub fn expected_output(label: usize, width: usize) -> Result<Vec<f64>> {
    if !(1..=width).contains(&label) {
        return Err(Error::InvalidData(format!(
            "label {label} outside 1..={width}"
        )));
    }
    let mut expected = vec![0.0; width];
    expected[label - 1] = 1.0;
    Ok(expected)
}

/// 1-based label of the largest output; the first one wins ties.
pub(crate) fn argmax_label(output: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in output.iter().enumerate() {
        if v > output[best] {
            best = i;
        }
    }
    best + 1
}

/// Report sample progress every `step` samples, at most 100 times per pass.
fn progress_step(len: usize) -> usize {
    len.div_ceil(100).max(1)
}

/// Percent reported after sample `done` (1-based) of `len`, if one is due.
///
/// The last sample always reports, and it is the only one that reports 100.
fn progress_percent(done: usize, len: usize, step: usize) -> Option<u32> {
    if done % step != 0 && done != len {
        return None;
    }
    Some((done * 100 / len).max(1) as u32)
}

fn percent_of(done: usize, total: usize) -> f64 {
    100.0 * done as f64 / total as f64
}

/// The parts of the driver a single pass mutates.
struct Pass<'a> {
    backend: &'a mut dyn Backend,
    metrics: &'a mut Metrics,
    listener: &'a mut dyn Listener,
    learning_rate: f64,
}

impl Pass<'_> {
    /// One measured training pass over `order`. Leaves the phase stopped.
    fn train_epoch(&mut self, data: &Dataset, order: &[usize]) -> Result<()> {
        self.metrics.start();
        let result = self.run(data, order, true);
        self.metrics.stop();
        result
    }

    /// One measured, listener-visible evaluation over `order`.
    fn evaluate(&mut self, data: &Dataset, order: &[usize], verbose: bool) -> Result<()> {
        self.metrics.start();
        let result = self.run(data, order, false);
        self.metrics.stop();
        result?;

        if verbose {
            info!("{}", self.metrics);
        }
        self.listener.metrics(&*self.metrics);
        Ok(())
    }

    fn run(&mut self, data: &Dataset, order: &[usize], learn: bool) -> Result<()> {
        let width = self.metrics.classes();
        let step = progress_step(order.len());

        for (i, &idx) in order.iter().enumerate() {
            let image = data.get(idx);
            let expected = expected_output(image.label(), width)?;

            self.backend.set_input(image.pixels())?;
            self.backend.forward()?;
            let output = self.backend.output();
            self.metrics.add_loss(&output, &expected);
            self.metrics.add_prediction(argmax_label(&output), image.label());

            if learn {
                self.backend.backward(&expected, self.learning_rate)?;
            }
            if let Some(percent) = progress_percent(i + 1, order.len(), step) {
                self.listener.sample_progress(percent);
            }
        }
        Ok(())
    }
}
