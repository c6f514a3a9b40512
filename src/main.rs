use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use docent_core::config::{Config, ProviderKind};
use docent_core::{AnswerOutcome, Pipeline};
use docent_llm::any::AnyProvider;
use docent_llm::ollama::OllamaProvider;
use docent_llm::openai::OpenAiProvider;
use tokio_util::sync::CancellationToken;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Answer questions about a document using retrieval-augmented generation.
#[derive(Debug, Parser)]
#[command(name = "docent", version, about)]
struct Cli {
    /// Path to the TOML config file (falls back to `DOCENT_CONFIG`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Answer one or more questions about a document.
    Ask {
        /// Document to read, or `-` for stdin.
        #[arg(long)]
        document: PathBuf,

        /// Question to ask; repeat for several.
        #[arg(long = "question", short = 'q')]
        questions: Vec<String>,

        /// File with one question per line.
        #[arg(long)]
        questions_file: Option<PathBuf>,

        /// Print one-line summaries instead of full answers.
        #[arg(long)]
        summary: bool,
    },
    /// Print the effective configuration after env overrides.
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config);
    let config = Config::load(&config_path)?;
    config.validate()?;

    match cli.command {
        Command::Config => {
            print!("{}", toml::to_string(&config).context("failed to render config")?);
            Ok(())
        }
        Command::Ask {
            document,
            questions,
            questions_file,
            summary,
        } => {
            let document = read_document(&document)?;
            let questions = collect_questions(questions, questions_file.as_deref())?;
            run(&config, &document, &questions, summary).await
        }
    }
}

async fn run(
    config: &Config,
    document: &str,
    questions: &[String],
    summary: bool,
) -> anyhow::Result<()> {
    let provider = Arc::new(create_provider(config)?);
    tracing::info!(
        provider = config.llm.provider.as_str(),
        model = %config.llm.model,
        "provider ready"
    );
    let pipeline = Pipeline::new(Arc::clone(&provider), provider, config)?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for ctrl-c: {e}");
            return;
        }
        tracing::info!("received shutdown signal");
        trigger.cancel();
    });

    let outcomes = pipeline
        .process_with_cancel(document, questions, &cancel)
        .await?;

    println!("{}", render_report(&outcomes, summary)?);
    Ok(())
}

fn render_report(outcomes: &[AnswerOutcome], summary: bool) -> anyhow::Result<String> {
    let report = if summary {
        let lines: Vec<String> = outcomes
            .iter()
            .map(|o| match o {
                AnswerOutcome::Answered { answer } => answer.summary(),
                AnswerOutcome::Failed { error } => format!("failed - {error}"),
            })
            .collect();
        serde_json::json!({ "answers": lines })
    } else {
        serde_json::json!({ "answers": outcomes })
    };
    serde_json::to_string_pretty(&report).context("failed to serialize answers")
}

fn create_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let llm = &config.llm;
    match llm.provider {
        ProviderKind::OpenAi => {
            let api_key = config
                .secrets
                .openai_api_key
                .as_ref()
                .context("DOCENT_OPENAI_API_KEY or OPENAI_API_KEY must be set for the openai provider")?;
            let provider = OpenAiProvider::new(
                api_key.expose().to_owned(),
                llm.base_url.clone(),
                llm.model.clone(),
                Some(llm.embedding_model.clone()),
            )?
            .with_generation(llm.max_tokens, llm.temperature)
            .with_json_mode(true);
            Ok(AnyProvider::OpenAi(provider))
        }
        ProviderKind::Ollama => Ok(AnyProvider::Ollama(OllamaProvider::new(
            &llm.base_url,
            llm.model.clone(),
            llm.embedding_model.clone(),
        )?)),
    }
}

fn read_document(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read document from stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read document {}", path.display()))
}

fn collect_questions(
    mut questions: Vec<String>,
    questions_file: Option<&Path>,
) -> anyhow::Result<Vec<String>> {
    if let Some(path) = questions_file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read questions file {}", path.display()))?;
        questions.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(str::to_owned),
        );
    }
    if questions.is_empty() {
        bail!("no questions given: use --question or --questions-file");
    }
    Ok(questions)
}

fn resolve_config_path(flag: Option<PathBuf>) -> PathBuf {
    if let Some(path) = flag {
        return path;
    }
    if let Ok(path) = std::env::var("DOCENT_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
