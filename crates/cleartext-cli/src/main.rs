//! Cleartext CLI — run the text-processing API, or use it from a terminal.
//!
//! Run `cleartext serve` to start the HTTP server.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;
use tracing_subscriber::EnvFilter;

use cleartext_core::config::Settings;
use cleartext_core::error::ClearTextError;
use cleartext_core::operation::{require_text, Operation, RewriteStyle, SummaryLength};
use cleartext_core::provider::ProviderFamily;
use cleartext_hub::api::{start_server, AppState};
use cleartext_hub::language::{LanguageDetector, WhatlangDetector};
use cleartext_hub::providers::ProviderSet;

// ─── CLI Definition ────────────────────────────────────────

/// Cleartext — summarize, rewrite, title and language-detect text
#[derive(Parser)]
#[command(name = "cleartext", version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to the user config dir)
    #[arg(short, long, global = true, env = "CLEARTEXT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 🌐 Start the REST API server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },

    /// 📝 Summarize text (reads stdin when TEXT is omitted)
    Summarize {
        text: Option<String>,

        /// short | long
        #[arg(short, long, default_value = "short")]
        length: SummaryLength,
    },

    /// ✍️  Rewrite text in another tone (reads stdin when TEXT is omitted)
    Rewrite {
        text: Option<String>,

        /// simple | formal
        #[arg(short, long, default_value = "simple")]
        style: RewriteStyle,
    },

    /// 🏷️  Generate a title (reads stdin when TEXT is omitted)
    Title { text: Option<String> },

    /// 🌍 Detect the language of a text (reads stdin when TEXT is omitted)
    Detect { text: Option<String> },

    /// 🔗 Show the provider chain the current configuration produces
    Chain,

    /// ⚙️  Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration (secrets masked)
    Show,
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = parse_args(None, std::env::args_os()).unwrap_or_else(|e| e.exit());

    let config_path = cli.config.clone().unwrap_or_else(Settings::default_path);
    let mut settings = Settings::load(&config_path)?;
    settings.apply_env(|key| std::env::var(key).ok())?;

    init_logging(&settings);

    match cli.command {
        // ─── API Server ────────────────────────────────
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            settings.validate()?;
            let state = AppState::from_settings(settings)?;
            start_server(state).await?;
        }

        // ─── One-shot operations ───────────────────────
        Commands::Summarize { text, length } => {
            run_operation(settings, Operation::Summarize(length), text).await?;
        }
        Commands::Rewrite { text, style } => {
            run_operation(settings, Operation::Rewrite(style), text).await?;
        }
        Commands::Title { text } => {
            run_operation(settings, Operation::Title, text).await?;
        }

        Commands::Detect { text } => {
            let text = input_text(text)?;
            match WhatlangDetector.detect(require_text(&text)?) {
                Ok(code) => println!("{}", code),
                Err(e) => {
                    eprintln!("{} {}", "✗".red(), e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Chain => {
            settings.validate()?;
            let providers = ProviderSet::from_settings(&settings)?;
            println!(
                "{} {}",
                "Provider chain (tried in order), primary:".cyan(),
                providers.primary().to_string().bold()
            );
            for (i, candidate) in providers.candidates(Operation::Title, "").iter().enumerate() {
                println!("  {}. {}", i + 1, candidate.id.bold());
            }
        }

        // ─── Config Management ─────────────────────────
        Commands::Config { action } => match action {
            ConfigAction::Show => show_config(&settings, &config_path),
            ConfigAction::Path => println!("{}", config_path.display()),
        },
    }

    Ok(())
}

/// Load `.env` (or `dotenv_file`) first, so `CLEARTEXT_CONFIG` may come from
/// it too, then parse the arguments. A missing file is fine; real
/// deployments set the environment directly.
fn parse_args<I, T>(dotenv_file: Option<&Path>, args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let _ = match dotenv_file {
        Some(path) => dotenv::from_path(path),
        None => dotenv::dotenv().map(|_| ()),
    };
    Cli::try_parse_from(args)
}

/// `RUST_LOG` wins; otherwise debug in development, info elsewhere.
fn init_logging(settings: &Settings) {
    let default = if settings.is_development() {
        "info,cleartext_core=debug,cleartext_hub=debug"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn input_text(arg: Option<String>) -> anyhow::Result<String> {
    match arg {
        Some(text) => Ok(text),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read text from stdin")?;
            Ok(buf)
        }
    }
}

async fn run_operation(
    settings: Settings,
    operation: Operation,
    text: Option<String>,
) -> anyhow::Result<()> {
    let text = input_text(text)?;
    require_text(&text)?;
    settings.validate()?;

    let providers = ProviderSet::from_settings(&settings)?;
    let deadline = settings.request_deadline();

    let result = tokio::time::timeout(deadline, providers.execute(operation, &text))
        .await
        .map_err(|_| ClearTextError::DeadlineExceeded(deadline))?;

    match result {
        Ok(output) => {
            println!("{}", output.text);
            eprintln!("{}", format!("via {}", output.provider).dimmed());
            Ok(())
        }
        Err(ClearTextError::ProvidersExhausted { attempts }) => {
            eprintln!("{} All providers failed:", "✗".red());
            for attempt in attempts {
                eprintln!("  {} {}", attempt.provider.bold(), attempt.error.to_string().dimmed());
            }
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

fn show_config(settings: &Settings, path: &Path) {
    let mask = |key: Option<&str>| match key {
        Some(k) if k.chars().count() > 8 => {
            let head: String = k.chars().take(4).collect();
            let tail: String = k.chars().skip(k.chars().count() - 4).collect();
            format!("{}…{}", head, tail)
        }
        Some(_) => "****".to_string(),
        None => "(not set)".dimmed().to_string(),
    };

    println!("{} {}", "Config file:".cyan(), path.display());
    println!("  env                  {}", settings.env);
    println!("  llm_provider         {}", settings.llm_provider);
    println!(
        "  gemini_api_key       {}",
        mask(settings.credential(ProviderFamily::Gemini))
    );
    println!(
        "  openai_api_key       {}",
        mask(settings.credential(ProviderFamily::OpenAi))
    );
    println!(
        "  internal_api_key     {}",
        mask(settings.internal_api_key.as_deref())
    );
    println!("  variant_policy       {:?}", settings.variant_policy);
    println!("  upstream_timeout     {}s", settings.upstream_timeout_secs);
    println!("  request_deadline     {}s", settings.request_deadline_secs);
    println!(
        "  rate_limit           {} req / {}s",
        settings.rate_limit.max_requests, settings.rate_limit.window_secs
    );
    println!("  server               {}:{}", settings.server.host, settings.server.port);
    let docs = if settings.docs_enabled() { "enabled" } else { "disabled" };
    println!("  docs                 {}", docs);

    if let Err(e) = settings.validate() {
        println!("{} {}", "⚠".yellow(), e);
    }
}
