use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod config;
mod history;
mod llm;
mod output;
mod processor;

use config::AppConfig;
use history::{HistoryExtractor, ShellType};
use llm::{LlmClient, LlmEnhancer, LlmProvider};
use output::RunbookData;
use processor::{Pipeline, PipelineOutput};

#[derive(Parser)]
#[command(name = "runbook-gen")]
#[command(about = "📜 runbook-gen - Turn shell history into a runbook")]
#[command(long_about = "runbook-gen reads a range of your shell history, drops duplicates and typos,
redacts secrets, and groups the remaining commands into documented steps.

An LLM provider can optionally polish the result. Only redacted commands are ever sent.")]
#[command(version)]
#[command(help_template = "{before-help}{name} {version}
{about}

{usage-heading} {usage}

{all-args}{after-help}

EXAMPLES:
    # Find the command numbers you want
    history | tail -40

    # Document commands 1200 to 1235
    runbook-gen generate --from 1200 --to 1235 -o deploy.md --title \"Deploy the API\"

    # Configure an AI provider
    runbook-gen config --provider claude --api-key sk-ant-...

For more help on specific commands, use: runbook-gen <command> --help")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 📝 Generate a runbook from a range of shell history
    #[command(alias = "gen")]
    #[command(long_about = "Extract commands FROM..=TO from shell history and render them as a markdown runbook.

Command numbers are the ones shown by your shell's `history` builtin.

EXAMPLES:
    runbook-gen generate --from 100 --to 120
    runbook-gen generate --from 100 --to 120 -o runbook.md --timestamps
    runbook-gen generate --from 5 --to 9 --history-file ~/.bash_history --shell bash --no-ai")]
    Generate {
        /// First history number to include
        #[arg(short, long)]
        from: usize,

        /// Last history number to include
        #[arg(short, long)]
        to: usize,

        /// Write the runbook here instead of stdout
        #[arg(short, long, help = "Output markdown file (written with owner-only permissions)")]
        output: Option<PathBuf>,

        #[arg(long, default_value = "Runbook")]
        title: String,

        /// History file to read instead of the detected one
        #[arg(long)]
        history_file: Option<PathBuf>,

        /// Shell that wrote the history file (zsh, bash, fish)
        #[arg(long)]
        shell: Option<String>,

        /// Keep original text of redacted commands in memory for auditing
        #[arg(long)]
        strict: bool,

        /// Add a time comment above each command that has one
        #[arg(long)]
        timestamps: bool,

        /// Skip AI enhancement even if a provider is configured
        #[arg(long)]
        no_ai: bool,

        /// Layout preset: standard or minimal
        #[arg(long, default_value = "standard")]
        template: String,

        /// Seconds after which a repeated command is kept
        #[arg(long, value_name = "SECS")]
        dedup_gap: Option<u64>,

        /// Pause in seconds that starts a new step
        #[arg(long, value_name = "SECS")]
        group_gap: Option<u64>,
    },

    /// 🔧 Configure AI provider settings
    #[command(long_about = "Set the AI provider, API key, model or base URL.

Without flags, prints the current configuration with API keys masked.

EXAMPLES:
    runbook-gen config --provider claude --api-key sk-ant-...
    runbook-gen config --provider ollama --base-url http://localhost:11434/api --model llama3
    runbook-gen config")]
    Config {
        /// LLM provider (claude, chatgpt, ollama)
        #[arg(short, long)]
        provider: Option<String>,

        /// API key for the provider
        #[arg(short = 'k', long)]
        api_key: Option<String>,

        /// Model to request
        #[arg(short, long)]
        model: Option<String>,

        /// Custom API endpoint (useful for Ollama or proxies)
        #[arg(short, long)]
        base_url: Option<String>,
    },
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "runbook_gen=debug" } else { "runbook_gen=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Generate {
            from,
            to,
            output,
            title,
            history_file,
            shell,
            strict,
            timestamps,
            no_ai,
            template,
            dedup_gap,
            group_gap,
        } => {
            let mut config = AppConfig::load()?;
            if strict {
                config.processing.strict_redaction = true;
            }
            if let Some(secs) = dedup_gap {
                config.processing.dedup_time_gap_secs = secs;
            }
            if let Some(secs) = group_gap {
                config.processing.group_time_gap_secs = secs;
            }

            let pipeline = Pipeline::from_config(&config.processing).context("Invalid redaction pattern in config")?;

            let extractor = match history_file {
                Some(path) => {
                    let shell = shell.as_deref().map(ShellType::from_name).unwrap_or_else(ShellType::detect);
                    HistoryExtractor::new(path, shell)?
                }
                None => HistoryExtractor::detect()?,
            };
            tracing::debug!(path = %extractor.path().display(), shell = extractor.shell().name(), "reading history");

            let entries = extractor.extract(from, to)?;
            eprintln!("📜 Extracted {} commands from {}", entries.len(), extractor.path().display());

            let result = run_pipeline(&pipeline, &config, &entries, no_ai).await;
            eprintln!(
                "🧹 {} of {} commands after deduplication, {} redactions",
                result.deduplicated_count,
                result.extracted_count,
                result.redactions.len()
            );
            for summary in &result.merge_summaries {
                tracing::info!(reason = %summary, "merged duplicate commands");
            }

            let mut data = RunbookData::new(title, result.groups);
            data.time_range = Some(format!("commands #{} to #{}", from, to));
            data.redacted_count = result.redactions.len();
            data.ai_overview = result.overview;
            data.ai_prerequisites = result.prerequisites;

            let mut generator = output::generator_for(&template);
            if timestamps {
                let mut markdown_config = generator.get_config().clone();
                markdown_config.include_timestamps = true;
                generator.set_config(markdown_config);
            }

            match output {
                Some(path) => {
                    generator.generate_to_file(&data, &path)?;
                    eprintln!("✅ Runbook with {} steps written to {}", data.groups.len(), path.display());
                }
                None => print!("{}", generator.generate(&data)),
            }
        }

        Commands::Config {
            provider,
            api_key,
            model,
            base_url,
        } => {
            let mut config = AppConfig::load()?;

            if provider.is_none() && api_key.is_none() && model.is_none() && base_url.is_none() {
                println!("🔧 Configuration ({})", AppConfig::config_file_path()?.display());
                println!("{}", config.llm.describe());
                for warning in config.llm.validate() {
                    println!("⚠️  {}", warning);
                }
                return Ok(());
            }

            let provider_name = match provider.or_else(|| config.llm.default_provider.clone()) {
                Some(name) => name,
                None => bail!("Specify --provider (claude, chatgpt, ollama) to configure"),
            };
            let provider = LlmProvider::from_str(&provider_name)?;
            let name = provider.name();

            if let Some(key) = api_key {
                config.llm.set_api_key(name, key);
            }
            if let Some(model) = model {
                config.llm.set_model(name, model);
            }
            if let Some(url) = base_url {
                config.llm.set_base_url(name, url);
            }
            config.llm.providers.entry(name.to_string()).or_default();
            config.llm.set_default_provider(name.to_string())?;

            let path = config.save()?;
            println!("✅ Set {} as default provider", name);
            println!("   Saved to {}", path.display());
        }
    }

    Ok(())
}

/// Run the pipeline, with AI enhancement when a provider is available
async fn run_pipeline(pipeline: &Pipeline, config: &AppConfig, entries: &[history::Entry], no_ai: bool) -> PipelineOutput {
    if no_ai {
        return pipeline.run(entries);
    }

    match LlmClient::from_config(&config.llm) {
        Ok(client) => {
            eprintln!("🤖 AI enhancement via {} ({})", client.provider().name(), client.model());
            let enhancer = LlmEnhancer::new(client, pipeline.sanitizer().clone());
            pipeline.run_enhanced(entries, &enhancer).await
        }
        Err(e) => {
            tracing::debug!(error = %e, "AI enhancement unavailable");
            pipeline.run(entries)
        }
    }
}
