//! Progress and metrics callbacks.
//!
//! The driver calls a [`Listener`] synchronously on its own thread. Receivers that
//! live on another thread (a UI, a logger) can use the `mpsc::Sender<Event>` adapter
//! and drain the channel wherever they like.

use std::sync::mpsc::Sender;

use crate::Metrics;

pub trait Listener: Send {
    /// Percent of the current pass processed so far, in `1..=100`.
    fn sample_progress(&mut self, _percent: u32) {}

    /// Percent of the whole training run (epochs or folds) completed.
    fn training_progress(&mut self, _percent: f64) {}

    /// One finished epoch, fold or test run.
    fn metrics(&mut self, _snapshot: &Metrics) {}
}

/// Ignores every callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl Listener for NoopListener {}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    SampleProgress(u32),
    TrainingProgress(f64),
    Metrics(Box<Metrics>),
}

impl Listener for Sender<Event> {
    // A disconnected receiver only means nobody is listening anymore.
    fn sample_progress(&mut self, percent: u32) {
        let _ = self.send(Event::SampleProgress(percent));
    }

    fn training_progress(&mut self, percent: f64) {
        let _ = self.send(Event::TrainingProgress(percent));
    }

    fn metrics(&mut self, snapshot: &Metrics) {
        let _ = self.send(Event::Metrics(Box::new(snapshot.clone())));
    }
}
