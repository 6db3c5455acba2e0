use std::error::Error;
use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mlp_eval::{
    config::AppConfig,
    dataset, logging,
    plot::{self, ConfusionMatrixPlot},
    presenter::ConsolePresenter,
    shell::Shell,
    Evaluator, MlpFactory, Procedure,
};
use tracing::{info, warn};

#[derive(Parser)]
#[command(version, about = "MLP classifier evaluation")]
struct Cli {
    /// YAML config file; command-line flags override its values
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// CSV dataset
    #[arg(short, long, value_name = "PATH")]
    data: Option<PathBuf>,
    /// Where confusion-matrix plots are written
    #[arg(short, long, value_name = "PATH")]
    plot: Option<PathBuf>,
    /// Seed k-fold shuffling for reproducible folds
    #[arg(long, value_name = "INT")]
    kfold_seed: Option<u64>,
    /// Seed weight initialisation and batch order
    #[arg(long, value_name = "INT")]
    model_seed: Option<u64>,
    /// Z-score each feature column after loading
    #[arg(long)]
    standardize: bool,
    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive menu with one entry per procedure (default)
    Shell,
    /// Run a single procedure and exit
    Run {
        #[arg(value_enum)]
        procedure: Procedure,
    },
}

impl Cli {
    fn overrides(&self) -> AppConfig {
        AppConfig {
            data: self.data.clone(),
            plot_path: self.plot.clone(),
            kfold_seed: self.kfold_seed,
            model_seed: self.model_seed,
            standardize: self.standardize.then_some(true),
            ..AppConfig::default()
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();
    logging::init_logging(args.verbose)?;

    let file_config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    let config = file_config.merge(args.overrides());

    let data_path = config.data_path();
    let dataset = dataset::load(&data_path, &config.load_options())?;
    info!(
        path = %data_path.display(),
        samples = dataset.len(),
        features = dataset.n_features(),
        classes = ?dataset.classes(),
        "dataset loaded"
    );

    let evaluator = Evaluator::new(MlpFactory, config.evaluation_settings());
    let renderer = ConfusionMatrixPlot::default();
    let mut presenter = ConsolePresenter::stdout();

    let outcome = match args.command.unwrap_or(Command::Shell) {
        Command::Shell => {
            let mut shell = Shell::new(&evaluator, &dataset, presenter, &renderer);
            shell
                .run(io::stdin().lock(), io::stdout())
                .map_err(Box::<dyn Error>::from)
        }
        Command::Run { procedure } => evaluator
            .run(procedure, &dataset, &mut presenter, &renderer)
            .map(|_| ())
            .map_err(Box::<dyn Error>::from),
    };

    let plot_path = &evaluator.settings().plot_path;
    match plot::remove_plot(plot_path) {
        Ok(true) => info!(path = %plot_path.display(), "removed plot file"),
        Ok(false) => {}
        Err(error) => warn!(%error, "failed to remove plot file"),
    }

    outcome
}
