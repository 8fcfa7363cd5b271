use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};

use glyph_mlp::{
    BackendKind, Config, Dataset, Error, Event, Image, Matrix, Metrics, Mlp, Parameters, State,
    Topology, TrainMode,
};

fn tmp_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join(name)
}

/// Three well separated classes over three pixels.
fn separable(per_class: usize) -> Dataset {
    (0..per_class)
        .flat_map(|i| {
            (1..=3).map(move |label| {
                let mut pixels = vec![0.1 + 0.01 * i as f64; 3];
                pixels[label - 1] = 0.9 - 0.01 * i as f64;
                Image::new(label, pixels)
            })
        })
        .collect()
}

fn driver(kind: BackendKind, seed: u64) -> (Mlp, Receiver<Event>) {
    let mut mlp = Mlp::new_with_seed(Topology::new(vec![3, 3, 3]).unwrap(), seed);
    mlp.set_backend_kind(kind);
    let (tx, rx) = mpsc::channel();
    mlp.set_listener(tx);
    (mlp, rx)
}

fn snapshots(rx: &Receiver<Event>) -> Vec<Metrics> {
    rx.try_iter()
        .filter_map(|e| match e {
            Event::Metrics(m) => Some(*m),
            _ => None,
        })
        .collect()
}

#[test]
fn training_reduces_loss_on_both_backends() {
    for kind in [BackendKind::Matrix, BackendKind::Graph] {
        let (mut mlp, rx) = driver(kind, 3);
        mlp.set_config(Config {
            backend: kind,
            epochs: 50,
            learning_rate: 0.5,
            ..Config::default()
        })
        .unwrap();
        mlp.set_train_dataset(separable(10));

        mlp.train().unwrap();
        assert_eq!(mlp.state(), State::Idle);

        let epochs = snapshots(&rx);
        assert_eq!(epochs.len(), 50, "{kind:?}");
        assert!(epochs.iter().all(|m| m.samples() == 30));
        let first = epochs[0].total_loss();
        let last = epochs[49].total_loss();
        assert!(last < first, "{kind:?}: {first} -> {last}");
    }
}

#[test]
fn progress_signals_stay_in_range() {
    let (mut mlp, rx) = driver(BackendKind::Matrix, 0);
    mlp.set_train_dataset(separable(4));
    mlp.train().unwrap();

    let events: Vec<Event> = rx.try_iter().collect();
    let samples: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            Event::SampleProgress(p) => Some(*p),
            _ => None,
        })
        .collect();
    let training: Vec<f64> = events
        .iter()
        .filter_map(|e| match e {
            Event::TrainingProgress(p) => Some(*p),
            _ => None,
        })
        .collect();

    assert!(samples.iter().all(|p| (1..=100).contains(p)));
    assert_eq!(training.len(), mlp.config().epochs);
    assert_eq!(training.last().copied(), Some(100.0));
}

#[test]
fn training_without_data_fails_before_any_work() {
    let (mut mlp, rx) = driver(BackendKind::Matrix, 0);
    let before = mlp.parameters();

    assert!(matches!(mlp.train(), Err(Error::EmptyDataset(_))));
    assert!(matches!(mlp.test(), Err(Error::EmptyDataset(_))));
    assert!(rx.try_iter().next().is_none());
    assert_eq!(mlp.parameters(), before);
    assert_eq!(mlp.state(), State::Idle);
}

#[test]
fn out_of_range_label_is_invalid_data() {
    let (mut mlp, _rx) = driver(BackendKind::Graph, 0);
    mlp.set_train_dataset(Dataset::new(vec![Image::new(4, vec![0.0; 3])]));
    assert!(matches!(mlp.train(), Err(Error::InvalidData(_))));
    assert_eq!(mlp.state(), State::Idle);

    // A failed operation does not poison the driver.
    mlp.set_train_dataset(separable(2));
    mlp.train().unwrap();
}

#[test]
fn wrong_pixel_count_is_a_dimension_mismatch() {
    let (mut mlp, _rx) = driver(BackendKind::Matrix, 0);
    mlp.set_test_dataset(Dataset::new(vec![Image::new(1, vec![0.0; 5])]));
    assert!(matches!(mlp.test(), Err(Error::DimensionMismatch(_))));
}

#[test]
fn test_samples_the_configured_fraction() {
    let (mut mlp, rx) = driver(BackendKind::Matrix, 1);
    mlp.set_config(Config {
        test_sample: 0.5,
        ..Config::default()
    })
    .unwrap();
    mlp.set_test_dataset(separable(5));

    mlp.test().unwrap();
    let snaps = snapshots(&rx);
    assert_eq!(snaps.len(), 1);
    assert_eq!(snaps[0].predictions(), 7);
    assert_eq!(snaps[0].samples(), 7);
    assert_eq!(mlp.metrics(), &snaps[0]);
}

#[test]
fn cross_validation_reports_every_fold() {
    let (mut mlp, rx) = driver(BackendKind::Matrix, 2);
    mlp.set_config(Config {
        mode: TrainMode::CrossValidation,
        k_folds: 4,
        ..Config::default()
    })
    .unwrap();
    mlp.set_train_dataset(separable(5));

    mlp.train().unwrap();
    let events: Vec<Event> = rx.try_iter().collect();
    let folds: Vec<&Metrics> = events
        .iter()
        .filter_map(|e| match e {
            Event::Metrics(m) => Some(m.as_ref()),
            _ => None,
        })
        .collect();
    assert_eq!(folds.len(), 4);
    // 15 images over 4 folds: 4, 4, 4, 3 held out.
    let held_out: usize = folds.iter().map(|m| m.predictions()).sum();
    assert_eq!(held_out, 15);

    let progress: Vec<f64> = events
        .iter()
        .filter_map(|e| match e {
            Event::TrainingProgress(p) => Some(*p),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![25.0, 50.0, 75.0, 100.0]);
}

#[test]
fn cross_validation_needs_enough_samples() {
    let (mut mlp, rx) = driver(BackendKind::Matrix, 0);
    mlp.set_config(Config {
        mode: TrainMode::CrossValidation,
        k_folds: 7,
        ..Config::default()
    })
    .unwrap();
    mlp.set_train_dataset(separable(2));
    assert!(matches!(mlp.train(), Err(Error::InvalidConfig(_))));
    assert!(snapshots(&rx).is_empty());
}

#[test]
fn backends_agree_through_the_driver() {
    let data = Dataset::new(vec![Image::new(2, vec![0.3, 0.6, 0.9])]);
    let (mut reference, _) = driver(BackendKind::Matrix, 0);
    let params = reference.parameters();

    let mut trained = Vec::new();
    for kind in [BackendKind::Matrix, BackendKind::Graph] {
        let (mut mlp, _rx) = driver(kind, 11);
        mlp.set_parameters(&params).unwrap();
        mlp.set_train_dataset(data.clone());
        mlp.train().unwrap();
        trained.push(mlp.parameters());
    }

    for (a, b) in trained[0].weights().iter().zip(trained[1].weights()) {
        for (x, y) in a.as_slice().iter().zip(b.as_slice()) {
            assert!((x - y).abs() < 1e-12);
        }
    }
    for (a, b) in trained[0].biases().iter().zip(trained[1].biases()) {
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-12);
        }
    }
    assert_eq!(reference.predict(&[0.3, 0.6, 0.9]).unwrap().len(), 3);
}

#[test]
fn save_then_load_is_bit_identical() {
    let path = tmp_path("save_then_load.bin");
    let (mut mlp, _rx) = driver(BackendKind::Graph, 5);
    mlp.update_topology(2, 4).unwrap();
    mlp.set_train_dataset(separable(3));
    mlp.train().unwrap();
    mlp.save(&path).unwrap();

    let mut other = Mlp::new_with_seed(Topology::default(), 9);
    other.load(&path).unwrap();
    assert_eq!(other.topology(), mlp.topology());
    assert_eq!(other.topology().sizes(), &[3, 4, 4, 3]);
    assert_eq!(other.parameters(), mlp.parameters());
    assert_eq!(other.metrics().classes(), 3);

    let input = [0.2, 0.4, 0.8];
    let (a, b) = (other.predict(&input).unwrap(), mlp.predict(&input).unwrap());
    assert!(a.iter().zip(&b).all(|(x, y)| (x - y).abs() < 1e-12));
}

#[test]
fn failed_load_leaves_driver_untouched() {
    let good = tmp_path("failed_load_good.bin");
    let truncated = tmp_path("failed_load_truncated.bin");

    let (donor, _) = driver(BackendKind::Matrix, 1);
    donor.save(&good).unwrap();
    let bytes = fs::read(&good).unwrap();
    fs::write(&truncated, &bytes[..bytes.len() - 3]).unwrap();

    let mut mlp = Mlp::new_with_seed(Topology::new(vec![5, 2]).unwrap(), 4);
    mlp.set_test_dataset(Dataset::new(vec![Image::new(1, vec![0.0; 5])]));
    mlp.test().unwrap();

    let params: Parameters = mlp.parameters();
    let metrics = mlp.metrics().clone();
    for path in [truncated, tmp_path("does_not_exist.bin")] {
        assert!(matches!(mlp.load(&path), Err(Error::Io(_))));
        assert_eq!(mlp.parameters(), params);
        assert_eq!(mlp.topology().sizes(), &[5, 2]);
        assert_eq!(mlp.metrics(), &metrics);
        assert_eq!(mlp.state(), State::Idle);
    }
}

#[test]
fn emnist_csv_feeds_the_driver() {
    let path = tmp_path("emnist_small.csv");
    let mut rows = String::new();
    for label in [1, 2, 26] {
        let pixels = vec!["255"; 784].join(",");
        rows.push_str(&format!("{label},{pixels}\n"));
    }
    fs::write(&path, rows).unwrap();

    let mut mlp = Mlp::new_with_seed(Topology::new(vec![784, 8, 26]).unwrap(), 0);
    mlp.load_test_dataset(&path).unwrap();
    assert_eq!(mlp.test_len(), 3);
    mlp.test().unwrap();
    assert_eq!(mlp.metrics().predictions(), 3);

    assert!(mlp.load_train_dataset(tmp_path("missing.csv")).is_err());
    assert_eq!(mlp.train_len(), 0);
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[test]
fn driver_forward_pass_matches_hand_computation() {
    let w0 = Matrix::from_rows(&[
        vec![0.1, -0.2, 0.3],
        vec![0.0, 0.4, -0.1],
        vec![0.2, 0.2, 0.2],
        vec![-0.3, 0.1, 0.0],
    ])
    .unwrap();
    let w1 = Matrix::from_rows(&[vec![0.5, -0.5], vec![0.3, 0.2], vec![-0.4, 0.1]]).unwrap();
    let params =
        Parameters::new(vec![w0, w1], vec![vec![0.1, 0.0, -0.1], vec![0.05, -0.05]]).unwrap();
    let input = [1.0, 0.5, -0.5, 0.25];

    // Hidden pre-activations: 0.1 + 0.0 - 0.1 - 0.075 + 0.1 = 0.025, etc.
    let h = [sigmoid(0.025), sigmoid(-0.075), sigmoid(0.05)];
    let expected = [
        sigmoid(0.5 * h[0] + 0.3 * h[1] - 0.4 * h[2] + 0.05),
        sigmoid(-0.5 * h[0] + 0.2 * h[1] + 0.1 * h[2] - 0.05),
    ];

    for kind in [BackendKind::Matrix, BackendKind::Graph] {
        let mut mlp = Mlp::new_with_seed(Topology::default(), 0);
        mlp.set_backend_kind(kind);
        mlp.set_parameters(&params).unwrap();
        assert_eq!(mlp.topology().sizes(), &[4, 3, 2]);

        let out = mlp.predict(&input).unwrap();
        assert_eq!(out.len(), 2);
        for (got, want) in out.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12, "{kind:?}: {got} vs {want}");
        }
        assert_eq!(mlp.predict_label(&input).unwrap(), 1);
    }
}

#[test]
fn sample_progress_is_sent_about_once_per_percent() {
    let (mut mlp, rx) = driver(BackendKind::Matrix, 0);
    mlp.set_test_dataset(separable(50));
    assert_eq!(mlp.test_len(), 150);
    mlp.test().unwrap();

    let sent: Vec<u32> = rx
        .try_iter()
        .filter_map(|e| match e {
            Event::SampleProgress(p) => Some(p),
            _ => None,
        })
        .collect();
    assert!(sent.len() <= 100, "{} signals", sent.len());
    assert_eq!(sent.iter().filter(|&&p| p == 100).count(), 1);
    assert_eq!(sent.last(), Some(&100));
}
