//! A multi-layer perceptron for classifying handwritten letters.
//!
//! `glyph-mlp` trains a dense feed-forward network on 28x28 EMNIST glyphs and maps
//! its output back to `'A'..='Z'`. The network itself sits behind the [`Backend`]
//! trait with two interchangeable implementations:
//!
//! - [`MatrixBackend`] runs whole layers as [`Matrix`] products. Large products use a
//!   Winograd multiply fanned out over a [`ThreadPool`].
//! - [`GraphBackend`] walks explicit [`Layer`]s of [`Neuron`]s.
//!
//! Given the same [`Parameters`], both produce the same outputs and the same updates.
//!
//! [`Mlp`] is the driver: it owns the active backend, the datasets and the metrics,
//! and runs epoch training, k-fold cross-validation, testing, prediction and
//! parameter persistence.
//!
//! # Data layout and shapes
//!
//! - Scalars are `f64`.
//! - Labels are 1-based: `1 -> 'A'`, ..., `26 -> 'Z'`.
//! - Weight matrices are exchanged and saved as `(in_width, out_width)`, row-major.
//!
//! # Quick start
//!
//! ```rust
//! use glyph_mlp::{Dataset, Image, Mlp, Topology};
//!
//! # fn main() -> glyph_mlp::Result<()> {
//! let topology = Topology::new(vec![4, 8, 2])?;
//! let mut mlp = Mlp::new_with_seed(topology, 0);
//!
//! let data: Dataset = [
//!     Image::new(1, vec![1.0, 1.0, 0.0, 0.0]),
//!     Image::new(2, vec![0.0, 0.0, 1.0, 1.0]),
//! ]
//! .into_iter()
//! .collect();
//! mlp.set_train_dataset(data.clone());
//! mlp.set_test_dataset(data);
//!
//! mlp.train()?;
//! mlp.test()?;
//! println!("accuracy {:.2}", mlp.metrics().accuracy());
//!
//! let label = mlp.predict_label(&[1.0, 1.0, 0.0, 0.0])?;
//! assert!((1..=2).contains(&label));
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod backend;
pub mod config;
pub mod data;
pub mod error;
pub mod layer;
pub mod listener;
pub mod matmul;
pub mod matrix;
pub mod metrics;
pub mod mlp;
pub mod neuron;
pub mod persist;
pub mod pool;
pub mod topology;
pub mod train;

pub use activation::Activation;
pub use backend::{Backend, BackendKind, GraphBackend, MatrixBackend, Parameters};
pub use config::{Config, TrainMode};
pub use data::{Dataset, Image};
pub use error::{Error, Result};
pub use layer::Layer;
pub use listener::{Event, Listener, NoopListener};
pub use matrix::Matrix;
pub use metrics::Metrics;
pub use mlp::{Mlp, State};
pub use neuron::Neuron;
pub use pool::ThreadPool;
pub use topology::Topology;
