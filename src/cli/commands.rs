//! CLI command definitions for quizforge.
//!
//! Three surfaces: `generate` runs a batch through the pipeline, `retry`
//! sweeps the dead-letter queue, and `dlq` inspects or clears it.

use clap::Parser;
use std::sync::Arc;
use tracing::info;

use crate::content::DataType;
use crate::generator::ParamSampler;
use crate::llm::{AnthropicClient, GeminiImageClient};
use crate::pipeline::{Pipeline, PipelineConfig, PipelineRunner};
use crate::storage::{DlqStore, HttpFigureStore, HttpQuestionSink};

/// Chart-question generator with a dead-letter retry queue.
#[derive(Parser)]
#[command(name = "quizforge")]
#[command(about = "Generate chart-based reading questions through a three-stage AI pipeline")]
#[command(version)]
#[command(
    long_about = "quizforge generates chart-based reading questions: structured chart data,\na rendered figure image, then the question itself. Failed items land in a\nSQLite dead-letter queue and can be retried from the stage that failed.\n\nExample usage:\n  quizforge generate --count 5 --data-types bar_chart,line_graph"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Generate a batch of questions.
    #[command(alias = "gen")]
    Generate(GenerateArgs),

    /// Retry every pending item in the dead-letter queue.
    Retry(RetryArgs),

    /// Inspect or clear the dead-letter queue.
    Dlq(DlqArgs),
}

/// Arguments for `quizforge generate`.
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Number of questions to generate.
    #[arg(short = 'n', long, default_value = "1")]
    pub count: usize,

    /// Comma-separated data types to cycle through
    /// (bar_chart, multi_series_bar, line_graph, data_table).
    #[arg(long)]
    pub data_types: Option<String>,

    /// Batch id recorded on every item (default: a fresh UUID).
    #[arg(long)]
    pub batch_id: Option<String>,

    /// Seed for the parameter sampler (default: entropy).
    #[arg(long)]
    pub seed: Option<u64>,

    /// DLQ database URL.
    #[arg(long, env = "QUIZFORGE_DLQ_DB")]
    pub dlq_db: Option<String>,
}

/// Arguments for `quizforge retry`.
#[derive(Parser, Debug)]
pub struct RetryArgs {
    /// DLQ database URL.
    #[arg(long, env = "QUIZFORGE_DLQ_DB")]
    pub dlq_db: Option<String>,
}

/// Arguments for `quizforge dlq`.
#[derive(Parser, Debug)]
pub struct DlqArgs {
    #[command(subcommand)]
    pub command: DlqSubcommand,

    /// DLQ database URL.
    #[arg(long, global = true, env = "QUIZFORGE_DLQ_DB")]
    pub dlq_db: Option<String>,
}

/// DLQ inspection subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum DlqSubcommand {
    /// Show queue counts by status and by failure stage.
    Stats,

    /// Delete all succeeded records.
    ClearSucceeded,

    /// Delete every record.
    ClearAll,
}

/// Parse CLI arguments without executing.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Generate(args) => run_generate_command(args).await?,
        Commands::Retry(args) => run_retry_command(args).await?,
        Commands::Dlq(args) => run_dlq_command(args).await?,
    }
    Ok(())
}

/// Builds the pipeline config, applying CLI overrides on top of the
/// environment.
fn build_config(dlq_db: Option<String>, data_types: Option<&str>) -> anyhow::Result<PipelineConfig> {
    let mut config = PipelineConfig::from_env()?;
    if let Some(url) = dlq_db {
        config = config.with_dlq_database_url(url);
    }
    if let Some(list) = data_types {
        let parsed = list
            .split(',')
            .map(|s| s.trim().parse::<DataType>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("invalid --data-types: {e}"))?;
        config = config.with_data_types(parsed);
    }
    config.validate()?;
    Ok(config)
}

/// Wires the concrete providers and stores into a runner.
async fn build_runner(config: PipelineConfig, seed: Option<u64>) -> anyhow::Result<PipelineRunner> {
    let text_provider = Arc::new(AnthropicClient::from_env()?);
    let image_provider = Arc::new(GeminiImageClient::from_env()?);
    let figure_store = Arc::new(HttpFigureStore::from_env()?);
    let question_sink = Arc::new(HttpQuestionSink::from_env()?);

    let dlq = DlqStore::connect(&config.dlq_database_url).await?;
    let sampler = match seed {
        Some(seed) => ParamSampler::new(seed),
        None => ParamSampler::from_entropy(),
    };

    let pipeline = Pipeline::new(
        config.clone(),
        text_provider,
        image_provider,
        figure_store,
        question_sink,
    );

    Ok(PipelineRunner::new(pipeline, dlq, sampler, config))
}

async fn run_generate_command(args: GenerateArgs) -> anyhow::Result<()> {
    let config = build_config(args.dlq_db, args.data_types.as_deref())?;
    let mut runner = build_runner(config, args.seed).await?;

    let report = runner.run_batch(args.count, args.batch_id).await?;

    info!(
        batch_id = report.batch_id,
        successful = report.successful,
        failed = report.failed,
        "generate finished"
    );
    println!(
        "batch {}: {} stored, {} queued for retry",
        report.batch_id, report.successful, report.failed
    );
    Ok(())
}

async fn run_retry_command(args: RetryArgs) -> anyhow::Result<()> {
    let config = build_config(args.dlq_db, None)?;
    let runner = build_runner(config, None).await?;

    let report = runner.retry_pending().await?;

    println!(
        "retried {}: {} succeeded, {} requeued, {} failed permanently",
        report.attempted, report.succeeded, report.requeued, report.exhausted
    );
    Ok(())
}

async fn run_dlq_command(args: DlqArgs) -> anyhow::Result<()> {
    let config = build_config(args.dlq_db, None)?;
    let dlq = DlqStore::connect(&config.dlq_database_url).await?;

    match args.command {
        DlqSubcommand::Stats => {
            let stats = dlq.stats().await?;
            println!("pending:            {}", stats.pending);
            println!("retrying:           {}", stats.retrying);
            println!("succeeded:          {}", stats.succeeded);
            println!("failed permanently: {}", stats.failed_permanently);
            if !stats.by_stage.is_empty() {
                println!("by failure stage:");
                for (stage, n) in &stats.by_stage {
                    println!("  {stage}: {n}");
                }
            }
        }
        DlqSubcommand::ClearSucceeded => {
            let removed = dlq.clear_succeeded().await?;
            println!("removed {removed} succeeded records");
        }
        DlqSubcommand::ClearAll => {
            let removed = dlq.clear_all().await?;
            println!("removed {removed} records");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_structure() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_args_parse() {
        let cli = Cli::try_parse_from([
            "quizforge",
            "generate",
            "--count",
            "5",
            "--data-types",
            "bar_chart,line_graph",
            "--seed",
            "42",
        ])
        .unwrap();
        match cli.command {
            Commands::Generate(args) => {
                assert_eq!(args.count, 5);
                assert_eq!(args.data_types.as_deref(), Some("bar_chart,line_graph"));
                assert_eq!(args.seed, Some(42));
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn test_dlq_subcommands_parse() {
        let cli = Cli::try_parse_from(["quizforge", "dlq", "stats"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Dlq(DlqArgs {
                command: DlqSubcommand::Stats,
                ..
            })
        ));

        let cli = Cli::try_parse_from(["quizforge", "dlq", "clear-all"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Dlq(DlqArgs {
                command: DlqSubcommand::ClearAll,
                ..
            })
        ));
    }

    #[test]
    fn test_build_config_rejects_bad_data_types() {
        let result = build_config(None, Some("pie_chart"));
        assert!(result.is_err());
    }
}
