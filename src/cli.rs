use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::auth::Token;
use crate::config::{Config, OutputFormat};
use crate::cost::AggregateResult;
use crate::output;
use crate::providers::CostCalculator;
use crate::store::CalculationStore;

#[derive(Parser)]
#[command(name = "actions-cost")]
#[command(
    author,
    version,
    about = "Estimate what a public repository's GitHub Actions usage would cost",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./actions-cost.{toml,json,yaml,yml})
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum)]
    format: Option<OutputFormat>,

    /// Write output to a file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,

    /// Do not read or write stored calculations
    #[arg(long, global = true, default_value_t = false)]
    no_store: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch recent workflow runs and estimate their cost
    Calculate {
        /// Repository in format 'owner/repo'
        #[arg(short, long)]
        repo: Option<String>,

        /// Number of days of history to sample
        #[arg(short, long, allow_negative_numbers = true)]
        days: Option<i64>,

        #[arg(short, long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,

        #[arg(short, long)]
        base_url: Option<String>,

        /// Runs fetched at the same time
        #[arg(long)]
        max_concurrent_runs: Option<usize>,
    },
    /// Show the stored calculation of a repository
    Show {
        #[arg(short, long)]
        repo: Option<String>,
    },
    /// List all stored calculations
    List,
    /// Remove the stored calculation of a repository
    Clear {
        #[arg(short, long)]
        repo: Option<String>,
    },
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;
        let store_enabled = config.store.enabled && !self.no_store;
        let mut store = CalculationStore::new(config.store.path.clone(), store_enabled)
            .context("Failed to open calculation store")?;

        match &self.command {
            Commands::Calculate {
                repo,
                days,
                token,
                base_url,
                max_concurrent_runs,
            } => {
                let repo = resolve_repo(repo.as_deref(), &config)?;
                let token = token
                    .as_deref()
                    .or(config.github.token.as_deref())
                    .map(Token::from);
                let base_url = base_url.as_deref().unwrap_or(&config.github.base_url);
                let days = days.unwrap_or(config.github.days);
                let max_concurrent_runs =
                    max_concurrent_runs.unwrap_or(config.github.max_concurrent_runs);

                self.execute_calculate(
                    &mut store,
                    &repo,
                    token,
                    base_url,
                    days,
                    max_concurrent_runs,
                    &config,
                )
                .await
            }
            Commands::Show { repo } => {
                let repo = resolve_repo(repo.as_deref(), &config)?;
                let record = store
                    .get(&repo)
                    .with_context(|| format!("No stored calculation for {repo}"))?;

                match self.format(&config) {
                    OutputFormat::Summary => {
                        output::print_record(record);
                        Ok(())
                    }
                    OutputFormat::Json => {
                        let pretty = self.pretty || config.output.pretty;
                        self.write_output(|out| output::export_json(record, pretty, out))
                    }
                    format => {
                        let result = record
                            .result
                            .as_ref()
                            .with_context(|| format!("No completed calculation for {repo}"))?;
                        self.export(result, format, &config)
                    }
                }
            }
            Commands::List => {
                if self.format(&config) == OutputFormat::Summary {
                    output::print_records(store.records());
                    Ok(())
                } else {
                    let records: Vec<_> = store.records().collect();
                    let pretty = self.pretty || config.output.pretty;
                    self.write_output(|out| output::export_json(&records, pretty, out))
                }
            }
            Commands::Clear { repo } => {
                let repo = resolve_repo(repo.as_deref(), &config)?;
                if store.remove(&repo)? {
                    info!("Removed stored calculation for {repo}");
                } else {
                    info!("No stored calculation for {repo}");
                }
                Ok(())
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_calculate(
        &self,
        store: &mut CalculationStore,
        repo: &str,
        token: Option<Token>,
        base_url: &str,
        days: i64,
        max_concurrent_runs: usize,
        config: &Config,
    ) -> Result<()> {
        info!("Estimating GitHub Actions cost for: {repo}");

        let calculator = CostCalculator::new(base_url, repo, token, max_concurrent_runs)?;
        let result = calculator.calculate(store, days).await?;

        match self.format(config) {
            OutputFormat::Summary => {
                output::print_summary(&result);
                Ok(())
            }
            format => self.export(&result, format, config),
        }
    }

    fn format(&self, config: &Config) -> OutputFormat {
        self.format.unwrap_or(config.output.format)
    }

    fn export(&self, result: &AggregateResult, format: OutputFormat, config: &Config) -> Result<()> {
        let pretty = self.pretty || config.output.pretty;
        self.write_output(|out| output::export_result(result, format, pretty, out))
    }

    fn write_output<F>(&self, write: F) -> Result<()>
    where
        F: FnOnce(&mut dyn Write) -> Result<()>,
    {
        if let Some(path) = &self.output {
            let mut file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            write(&mut file)?;
            info!("Output written to: {}", path.display());
        } else {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            write(&mut handle)?;
        }
        Ok(())
    }
}

fn resolve_repo(repo: Option<&str>, config: &Config) -> Result<String> {
    repo.or(config.github.repo.as_deref())
        .map(ToString::to_string)
        .context("No repository given; pass --repo owner/repo or set github.repo in the config file")
}
