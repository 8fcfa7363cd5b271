//! Classification metrics.
//!
//! [`Metrics`] accumulates one measured phase (an epoch, a fold or a test run):
//! per-class confusion counts, summed squared-error loss, the number of samples and
//! the elapsed time. The driver calls [`Metrics::start`] at the beginning of each
//! phase and [`Metrics::stop`] before handing a snapshot to the listener.
//!
//! Labels are 1-based everywhere in this module. Per-class accessors panic on a
//! label outside `1..=classes()`, like slice indexing.

use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    tp: Vec<usize>,
    fp: Vec<usize>,
    tn: Vec<usize>,
    fn_: Vec<usize>,
    loss: f64,
    samples: usize,
    predictions: usize,
    elapsed: Duration,
    started: Option<Instant>,
}

/// Sum of squared differences between `predicted` and `expected`.
pub fn squared_error(predicted: &[f64], expected: &[f64]) -> f64 {
    debug_assert_eq!(predicted.len(), expected.len());
    predicted
        .iter()
        .zip(expected)
        .map(|(p, e)| (e - p) * (e - p))
        .sum()
}

impl Metrics {
    pub fn new(classes: usize) -> Self {
        Self {
            tp: vec![0; classes],
            fp: vec![0; classes],
            tn: vec![0; classes],
            fn_: vec![0; classes],
            loss: 0.0,
            samples: 0,
            predictions: 0,
            elapsed: Duration::ZERO,
            started: None,
        }
    }

    #[inline]
    pub fn classes(&self) -> usize {
        self.tp.len()
    }

    /// Clear everything and start the phase timer.
    pub fn start(&mut self) {
        self.clear();
        self.started = Some(Instant::now());
    }

    /// Fold the time since `start` into `elapsed`.
    pub fn stop(&mut self) {
        if let Some(t0) = self.started.take() {
            self.elapsed += t0.elapsed();
        }
    }

    pub fn clear(&mut self) {
        self.tp.fill(0);
        self.fp.fill(0);
        self.tn.fill(0);
        self.fn_.fill(0);
        self.loss = 0.0;
        self.samples = 0;
        self.predictions = 0;
        self.elapsed = Duration::ZERO;
        self.started = None;
    }

    /// Add one sample's squared error.
    pub fn add_loss(&mut self, predicted: &[f64], expected: &[f64]) {
        self.loss += squared_error(predicted, expected);
        self.samples += 1;
    }

    /// Drop the running loss, keeping confusion counts.
    pub fn reset_loss(&mut self) {
        self.loss = 0.0;
        self.samples = 0;
    }

    /// Record one classification outcome.
    ///
    /// A hit is a true positive for `actual`. A miss is a false positive for
    /// `predicted` and a false negative for `actual`. Every other class gets a
    /// true negative.
    ///
    /// Panics if either label is outside `1..=classes()`.
    pub fn add_prediction(&mut self, predicted: usize, actual: usize) {
        assert!(
            (1..=self.classes()).contains(&predicted) && (1..=self.classes()).contains(&actual),
            "labels {predicted}/{actual} outside 1..={}",
            self.classes()
        );
        let (p, a) = (predicted - 1, actual - 1);
        if p == a {
            self.tp[a] += 1;
        } else {
            self.fp[p] += 1;
            self.fn_[a] += 1;
        }
        for (c, tn) in self.tn.iter_mut().enumerate() {
            if c != p && c != a {
                *tn += 1;
            }
        }
        self.predictions += 1;
    }

    /// Panics if `label` is outside `1..=classes()`.
    #[inline]
    pub fn true_positives(&self, label: usize) -> usize {
        self.tp[label - 1]
    }

    /// Panics if `label` is outside `1..=classes()`.
    #[inline]
    pub fn false_positives(&self, label: usize) -> usize {
        self.fp[label - 1]
    }

    /// Panics if `label` is outside `1..=classes()`.
    #[inline]
    pub fn true_negatives(&self, label: usize) -> usize {
        self.tn[label - 1]
    }

    /// Panics if `label` is outside `1..=classes()`.
    #[inline]
    pub fn false_negatives(&self, label: usize) -> usize {
        self.fn_[label - 1]
    }

    #[inline]
    pub fn samples(&self) -> usize {
        self.samples
    }

    #[inline]
    pub fn predictions(&self) -> usize {
        self.predictions
    }

    /// Summed squared error over the phase.
    #[inline]
    pub fn total_loss(&self) -> f64 {
        self.loss
    }

    /// Mean squared error per sample (0 for an empty phase).
    pub fn loss(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.loss / self.samples as f64
        }
    }

    /// Time accumulated between `start` and `stop`.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Fraction of recorded predictions that were correct.
    pub fn accuracy(&self) -> f64 {
        if self.predictions == 0 {
            return 0.0;
        }
        self.tp.iter().sum::<usize>() as f64 / self.predictions as f64
    }

    /// Panics if `label` is outside `1..=classes()`.
    pub fn precision(&self, label: usize) -> f64 {
        ratio(self.tp[label - 1], self.fp[label - 1])
    }

    /// Panics if `label` is outside `1..=classes()`.
    pub fn recall(&self, label: usize) -> f64 {
        ratio(self.tp[label - 1], self.fn_[label - 1])
    }

    /// Panics if `label` is outside `1..=classes()`.
    pub fn f1_score(&self, label: usize) -> f64 {
        let p = self.precision(label);
        let r = self.recall(label);
        if p + r < 1e-12 { 0.0 } else { 2.0 * p * r / (p + r) }
    }

    /// Macro-averaged precision.
    pub fn mean_precision(&self) -> f64 {
        self.macro_average(Self::precision)
    }

    /// Macro-averaged recall.
    pub fn mean_recall(&self) -> f64 {
        self.macro_average(Self::recall)
    }

    /// Macro-averaged F1 score.
    pub fn mean_f1_score(&self) -> f64 {
        self.macro_average(Self::f1_score)
    }

    /// Progress line for pass `done` (0-based) out of `total`, with a naive
    /// remaining-time estimate.
    pub fn train_report(&self, total: usize, done: usize, since: Instant) -> String {
        let elapsed = since.elapsed();
        let per_pass = elapsed.as_secs_f64() / (done + 1) as f64;
        let remaining = per_pass * total.saturating_sub(done + 1) as f64;
        format!(
            "pass {}/{total}: loss {:.6}, accuracy {:.4}, elapsed {:.1}s, remaining ~{:.1}s",
            done + 1,
            self.loss(),
            self.accuracy(),
            elapsed.as_secs_f64(),
            remaining,
        )
    }

    fn macro_average(&self, per_class: fn(&Self, usize) -> f64) -> f64 {
        if self.classes() == 0 {
            return 0.0;
        }
        (1..=self.classes()).map(|l| per_class(self, l)).sum::<f64>() / self.classes() as f64
    }
}

#[inline]
fn ratio(hits: usize, misses: usize) -> f64 {
    if hits + misses == 0 {
        0.0
    } else {
        hits as f64 / (hits + misses) as f64
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "evaluated {} samples", self.samples)?;
        writeln!(f, "  loss:      {:.6}", self.loss())?;
        writeln!(f, "  accuracy:  {:.4}", self.accuracy())?;
        writeln!(f, "  precision: {:.4}", self.mean_precision())?;
        writeln!(f, "  recall:    {:.4}", self.mean_recall())?;
        writeln!(f, "  f1 score:  {:.4}", self.mean_f1_score())?;
        write!(f, "  time:      {:.3}s", self.elapsed.as_secs_f64())
    }
}
