//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

use qforge_core::{
    ExportFormat, RunRequest, default_output_path, load_topics, render_table, sample_topics,
    write_report,
};
use qforge_llm::LlmClient;
use qforge_search::StackExchangeClient;
use qforge_shared::{
    AppConfig, LlmConfig, SearchConfig, config_file_path, init_config, load_config,
    validate_api_key,
};

use crate::progress::CliProgress;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// qforge: turn topics into refined, use-case framed questions.
#[derive(Parser)]
#[command(
    name = "qforge",
    version,
    about = "Find real questions for each topic, fill gaps with generated ones, and refine them with an LLM.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the full pipeline over topics from a CSV file.
    Run {
        /// CSV file containing a topic column.
        #[arg(short, long)]
        input: PathBuf,

        /// Randomly select this many topics (defaults to all).
        #[arg(short = 'n', long)]
        topics: Option<usize>,

        /// Questions per topic.
        #[arg(short, long)]
        questions: Option<usize>,

        /// Only use questions asked within the last N years.
        #[arg(long)]
        years: Option<u32>,

        /// Label written into the "Full Topic Name" column.
        #[arg(long)]
        full_name: Option<String>,

        /// Header of the topic column.
        #[arg(long)]
        column: Option<String>,

        /// Output file (defaults to a timestamped file in the configured output dir).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Export format: xlsx, csv or json (inferred from --out, xlsx when omitted).
        #[arg(long)]
        format: Option<ExportFormat>,

        /// Seed for topic selection, for reproducible runs.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the cleaned topic list from a CSV file.
    Topics {
        /// CSV file containing a topic column.
        #[arg(short, long)]
        input: PathBuf,

        /// Header of the topic column.
        #[arg(long)]
        column: Option<String>,
    },

    /// Run a single search against the Q&A site.
    Search {
        /// Search query.
        query: String,

        /// Maximum number of results.
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// Only include questions asked within the last N years.
        #[arg(long)]
        years: Option<u32>,
    },

    /// Refine a single question with the LLM.
    Refine {
        /// Question title to refine.
        question: String,

        /// Question body passed as extra context.
        #[arg(long)]
        body: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "qforge=warn",
        1 => "qforge=info",
        2 => "qforge=debug",
        _ => "qforge=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Options for `qforge run`, after flag parsing.
struct RunArgs {
    input: PathBuf,
    topics: Option<usize>,
    questions: Option<usize>,
    years: Option<u32>,
    full_name: Option<String>,
    column: Option<String>,
    out: Option<PathBuf>,
    format: Option<ExportFormat>,
    seed: Option<u64>,
}

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            input,
            topics,
            questions,
            years,
            full_name,
            column,
            out,
            format,
            seed,
        } => {
            cmd_run(RunArgs {
                input,
                topics,
                questions,
                years,
                full_name,
                column,
                out,
                format,
                seed,
            })
            .await
        }
        Command::Topics { input, column } => cmd_topics(&input, column.as_deref()),
        Command::Search {
            query,
            limit,
            years,
        } => cmd_search(&query, limit, years).await,
        Command::Refine { question, body } => cmd_refine(&question, body.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(args: RunArgs) -> Result<()> {
    // Validate API key before doing anything
    let config = load_config()?;
    validate_api_key(&config)?;

    let column = args
        .column
        .unwrap_or_else(|| config.defaults.topic_column.clone());
    let all_topics = load_topics(&args.input, &column)?;

    let selected = match args.topics.or(config.defaults.topic_count) {
        Some(count) => {
            let mut rng = match args.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            sample_topics(&all_topics, count, &mut rng)?
        }
        None => all_topics,
    };

    let request = RunRequest {
        full_topic_name: args.full_name,
        years: args.years.or(config.defaults.years),
        max_variations: config.defaults.max_variations,
        ..RunRequest::new(
            selected,
            args.questions.unwrap_or(config.defaults.questions_per_topic),
        )
    };
    request.validate()?;

    let search = StackExchangeClient::new(SearchConfig::try_from(&config)?)?;
    let model = LlmClient::new(LlmConfig::try_from(&config)?)?;

    info!(
        input = %args.input.display(),
        topics = request.topics.len(),
        questions = request.questions_per_topic,
        "starting run"
    );

    let reporter = CliProgress::new();
    let report = qforge_core::run(&search, &model, &request, &reporter).await?;

    if report.is_empty() {
        println!("no results");
        return Ok(());
    }

    println!();
    print!("{}", render_table(&report.rows));
    println!();

    let format = args
        .format
        .or_else(|| args.out.as_deref().and_then(ExportFormat::from_path))
        .unwrap_or_default();
    let out = args.out.unwrap_or_else(|| {
        default_output_path(Path::new(&config.defaults.output_dir), &report, format)
    });
    write_report(&report, &out, format)?;

    let elapsed = report.finished_at - report.started_at;
    println!("  Run:      {}", report.run_id);
    println!("  Topics:   {}", report.topics.len());
    println!("  Rows:     {}", report.rows.len());
    println!("  Errors:   {}", report.error_rows());
    println!("  Model:    {}", report.model);
    println!(
        "  Time:     {:.1}s",
        elapsed.num_milliseconds() as f64 / 1000.0
    );
    println!("  Output:   {}", out.display());
    println!();

    Ok(())
}

fn cmd_topics(input: &Path, column: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let column = column.unwrap_or(&config.defaults.topic_column);
    let topics = load_topics(input, column)?;

    if topics.is_empty() {
        return Err(eyre!(
            "no topics found in column '{column}' of {}",
            input.display()
        ));
    }
    for (i, topic) in topics.iter().enumerate() {
        println!("{:>4}. {topic}", i + 1);
    }
    Ok(())
}

async fn cmd_search(query: &str, limit: usize, years: Option<u32>) -> Result<()> {
    let config = load_config()?;
    let client = StackExchangeClient::new(SearchConfig::try_from(&config)?)?;

    info!(query, limit, "searching");
    let hits = client.search(query, limit, years).await?;

    if hits.is_empty() {
        println!("no results");
        return Ok(());
    }
    for hit in hits {
        println!(
            "[{:>4}] {} ({} answers, {})",
            hit.score,
            hit.title,
            hit.answer_count,
            hit.creation_date.format("%Y-%m-%d")
        );
        println!("       {}", hit.link);
        if !hit.tags.is_empty() {
            println!("       tags: {}", hit.tags.join(", "));
        }
    }
    Ok(())
}

async fn cmd_refine(question: &str, body: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let client = LlmClient::new(LlmConfig::try_from(&config)?)?;

    let result = client.refine(question, body).await?;
    println!("Refined question: {}", result.refined_question);
    println!("Domain:           {}", result.domain);
    println!("Use case:         {}", result.use_case);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    println!("# {}", config_file_path()?.display());
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
