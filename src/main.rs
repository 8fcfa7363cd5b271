use std::env;
use std::process::ExitCode;
use std::sync::mpsc;
use std::thread;

use log::{error, info};

use glyph_mlp::{Config, Error, Event, Metrics, Mlp, Result, Topology};

const USAGE: &str = "usage:
  glyph-mlp train <train.csv> <test.csv> [config.json] [--save <weights.bin>]
  glyph-mlp test <weights.bin> <test.csv>";

enum Command {
    Train {
        train: String,
        test: String,
        config: Option<String>,
        save: Option<String>,
    },
    Test {
        weights: String,
        test: String,
    },
}

fn parse(args: &[String]) -> Option<Command> {
    match args {
        [cmd, weights, test] if cmd == "test" => Some(Command::Test {
            weights: weights.clone(),
            test: test.clone(),
        }),
        [cmd, train, test, rest @ ..] if cmd == "train" => {
            let mut config = None;
            let mut save = None;
            let mut it = rest.iter();
            while let Some(arg) = it.next() {
                if arg == "--save" {
                    save = Some(it.next()?.clone());
                } else if config.is_none() {
                    config = Some(arg.clone());
                } else {
                    return None;
                }
            }
            Some(Command::Train {
                train: train.clone(),
                test: test.clone(),
                config,
                save,
            })
        }
        _ => None,
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(cmd) = parse(&args) else {
        eprintln!("{USAGE}");
        return ExitCode::from(2);
    };

    match run(cmd) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cmd: Command) -> Result<()> {
    let (tx, rx) = mpsc::channel::<Event>();

    // The driver works on its own thread; this one only reports progress.
    let worker = thread::spawn(move || -> Result<Metrics> {
        let mut mlp = Mlp::new(Topology::default());
        mlp.set_listener(tx);
        match cmd {
            Command::Train {
                train,
                test,
                config,
                save,
            } => {
                if let Some(path) = config {
                    mlp.set_config(Config::load_json(path)?)?;
                }
                mlp.load_train_dataset(train)?;
                mlp.load_test_dataset(test)?;
                mlp.train()?;
                mlp.test()?;
                if let Some(path) = save {
                    mlp.save(path)?;
                }
            }
            Command::Test { weights, test } => {
                mlp.load(weights)?;
                mlp.load_test_dataset(test)?;
                mlp.test()?;
            }
        }
        // Dropping the driver drops its sender and ends the loop below.
        Ok(mlp.metrics().clone())
    });

    for event in rx {
        match event {
            Event::SampleProgress(p) if p % 25 == 0 => info!("pass {p}%"),
            Event::SampleProgress(_) => {}
            Event::TrainingProgress(p) => info!("training {p:.0}%"),
            Event::Metrics(m) => info!(
                "loss {:.6}, accuracy {:.4}, f1 {:.4}",
                m.loss(),
                m.accuracy(),
                m.mean_f1_score()
            ),
        }
    }

    let metrics = worker.join().map_err(|_| Error::TaskPanicked)??;
    println!("{metrics}");
    Ok(())
}
