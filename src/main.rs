use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;

use perinatal_risk::utils::logging::console::print_run_summary;
use perinatal_risk::{DataQualityReport, Pipeline, PipelineConfig};

#[derive(Debug, Parser)]
#[command(
    name = "perinatal-risk",
    version,
    about = "Municipality-year perinatal indicators, hybrid risk classes and mortality forecasts",
    long_about = "perinatal-risk fuses births, fetal deaths, infant deaths, facility and \
        service extracts into one municipality-year feature table.\n\n\
        Commands:\n  \
        build    Build and classify the feature table\n  \
        train    Build the table and train the quantile ensemble\n  \
        score    Build the table and forecast every row with stored models\n  \
        run      All of the above"
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build and classify the feature table
    Build(PathArgs),
    /// Build the feature table and train the quantile ensemble
    Train(PathArgs),
    /// Forecast every municipality-year with the stored models
    Score(PathArgs),
    /// Build, classify, train and score
    Run(PathArgs),
}

#[derive(Debug, Args)]
struct PathArgs {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory (overrides the configuration)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Models directory (overrides the configuration)
    #[arg(short, long)]
    models: Option<PathBuf>,
}

impl PathArgs {
    fn load_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)
                .with_context(|| format!("loading configuration {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        if let Some(output) = &self.output {
            config.output.directory.clone_from(output);
        }
        if let Some(models) = &self.models {
            config.output.models_directory.clone_from(models);
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let start = Instant::now();
    let (Command::Build(args) | Command::Train(args) | Command::Score(args) | Command::Run(args)) =
        &cli.command;
    let config = args.load_config()?;
    info!("{config}");
    let pipeline = Pipeline::new(config).context("invalid configuration")?;
    let mut quality = DataQualityReport::new();

    let summary = match &cli.command {
        Command::Build(_) => {
            let (_, mut summary) = pipeline
                .build(&mut quality)
                .context("building the feature table")?;
            summary.outputs.push(pipeline.write_quality(&quality)?);
            summary
        }
        Command::Train(_) => {
            let (classified, mut summary) = pipeline
                .build(&mut quality)
                .context("building the feature table")?;
            let (_, written) = pipeline
                .train(&classified.table)
                .context("training the quantile ensemble")?;
            summary.outputs.extend(written);
            summary.outputs.push(pipeline.write_quality(&quality)?);
            summary
        }
        Command::Score(_) => {
            let (classified, mut summary) = pipeline
                .build(&mut quality)
                .context("building the feature table")?;
            let forecaster = pipeline.load_forecaster();
            let (_, path) = pipeline
                .score(&classified, &forecaster, &mut quality)
                .context("scoring municipality-years")?;
            summary.outputs.push(path);
            summary.degraded_forecasts = Some(forecaster.is_degraded());
            summary.outputs.push(pipeline.write_quality(&quality)?);
            summary
        }
        Command::Run(_) => pipeline.run(&mut quality).context("running the pipeline")?,
    };

    print_run_summary(&summary, &quality, start.elapsed());
    Ok(())
}
