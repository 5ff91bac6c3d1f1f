//! affect-attack: adversarial emotion perturbation of review texts.
//!
//! Usage:
//!   affect-attack attack "i love this coffee shop"
//!   affect-attack run --dataset starbucks --limit 100 --seed 7
//!   affect-attack run --input reviews.csv --column body
//!   affect-attack report data/attacked_starbucks.csv data/attacked_hotels.csv

use affect_attack::analysis::{DatasetReport, analysis_overview, analyze};
use affect_attack::attack::{AttackParams, attack_sentence};
use affect_attack::batch::{BatchRunner, failures_path, read_rows, row_rng, write_failures, write_records};
use affect_attack::config::Config;
use affect_attack::dataset::DatasetSpec;
use affect_attack::{build_services, init_tracing};
use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "affect-attack")]
#[command(about = "Single-word adversarial attacks on the emotion profile of texts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Attack one sentence and print the attack record as JSON
    Attack {
        text: String,
        /// Seed for the search order of emotionless text
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Attack every usable row of a dataset and write the records as CSV
    #[command(group(ArgGroup::new("source").required(true).args(["dataset", "input"])))]
    Run {
        /// Bundled preset: amazon, starbucks, hotels or restaurants
        #[arg(long)]
        dataset: Option<String>,
        /// Arbitrary CSV file
        #[arg(long)]
        input: Option<PathBuf>,
        /// Text column of --input
        #[arg(long, default_value = "text")]
        column: String,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Success analysis of attacked CSV files
    Report {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Print the reports as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load().context("loading configuration")?;
    init_tracing(&config.runtime.log_level);

    match cli.command {
        Commands::Attack { text, seed } => attack_one(&config, &text, seed).await,
        Commands::Run {
            dataset,
            input,
            column,
            output,
            limit,
            seed,
        } => {
            let spec = match (dataset, input) {
                (Some(name), _) => DatasetSpec::preset(&name, &config.batch.data_dir)?,
                (None, Some(path)) => DatasetSpec::custom(path, column),
                (None, None) => anyhow::bail!("either --dataset or --input is required"),
            };
            run_dataset(&config, spec, output, limit, seed.or(config.attack.seed)).await
        }
        Commands::Report { files, json } => report(&files, json),
    }
}

async fn attack_one(config: &Config, text: &str, seed: Option<u64>) -> Result<()> {
    let services = build_services(config).await?;
    let params = AttackParams::from(&config.attack);
    let mut rng = row_rng(seed.or(config.attack.seed), 0);
    let record = attack_sentence(text, &services, &params, &mut rng).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

async fn run_dataset(
    config: &Config,
    spec: DatasetSpec,
    output: Option<PathBuf>,
    limit: Option<usize>,
    seed: Option<u64>,
) -> Result<()> {
    let texts = spec.load_texts(limit)?;
    let output = output.unwrap_or_else(|| {
        config
            .batch
            .data_dir
            .join(format!("attacked_{}.csv", spec.name))
    });

    let services = build_services(config).await?;
    let runner = BatchRunner::new(
        services,
        AttackParams::from(&config.attack),
        &config.batch,
        seed,
    );
    let result = runner.run(texts).await;

    write_records(&output, &result.records)?;
    if !result.failures.is_empty() {
        let errors = failures_path(&output);
        write_failures(&errors, &result.failures)?;
        info!("{} failed rows written to {}", result.failures.len(), errors.display());
    }
    println!("{}", serde_json::to_string_pretty(&result.summary)?);
    Ok(())
}

fn report(files: &[PathBuf], json: bool) -> Result<()> {
    let mut reports: Vec<DatasetReport> = Vec::with_capacity(files.len());
    for path in files {
        let rows = read_rows(path).with_context(|| format!("reading {}", path.display()))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().trim_start_matches("attacked_").to_string())
            .unwrap_or_else(|| path.display().to_string());
        reports.push(analyze(name, &rows)?);
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        analysis_overview(&reports).printstd();
    }
    Ok(())
}
