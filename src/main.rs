use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};

use kestrel_core::KestrelConfig;

mod server;

#[derive(Parser)]
#[command(
    name = "kestrel",
    version,
    about = "Code-review automation toolkit",
    long_about = "Kestrel turns source-control diffs into AI-generated review feedback.\n\n\
                   The CLI parses unified diffs into a structured model; the webhook service\n\
                   fans review work out across a bounded worker pool behind adaptive\n\
                   admission control.\n\n\
                   Examples:\n  \
                     git diff main | kestrel parse      Summarize a diff from stdin\n  \
                     kestrel parse --file changes.patch Summarize a diff from a file\n  \
                     kestrel parse --format json        Emit the full structured diff\n  \
                     kestrel serve                      Start the webhook review service"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (default: .kestrel.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a unified diff into the structured review model
    #[command(long_about = "Parse a unified diff into the structured review model.\n\n\
        Reads from stdin or a file. Parsing is permissive: malformed fragments are\n\
        skipped rather than failing the whole diff.\n\n\
        Examples:\n  git diff | kestrel parse\n  kestrel parse --file changes.patch --format json")]
    Parse {
        /// Read diff from file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Start the webhook review service
    #[command(long_about = "Start the webhook review service.\n\n\
        POST /review accepts unified-diff text and returns per-file review results;\n\
        GET /metrics exposes Prometheus metrics; GET /healthz is exempt from rate\n\
        limiting.\n\n\
        Examples:\n  kestrel serve\n  kestrel serve --bind 0.0.0.0:8791")]
    Serve {
        /// Override the configured bind address
        #[arg(long)]
        bind: Option<String>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable summary
    Text,
    /// Machine-readable JSON with camelCase keys
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    human_panic::setup_panic!();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Parse { file } => cmd_parse(&file, cli.format),
        Command::Serve { bind } => server::serve(config, bind).await,
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(path: Option<&Path>) -> Result<KestrelConfig> {
    match path {
        Some(path) => KestrelConfig::from_file(path)
            .into_diagnostic()
            .wrap_err(format!("loading {}", path.display())),
        None => {
            let default = Path::new(".kestrel.toml");
            if default.exists() {
                KestrelConfig::from_file(default)
                    .into_diagnostic()
                    .wrap_err("loading .kestrel.toml")
            } else {
                Ok(KestrelConfig::default())
            }
        }
    }
}

fn cmd_parse(file: &Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let input = read_diff_input(file)?;
    let diff = kestrel_diff::parse(&input);

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&diff).into_diagnostic()?;
            println!("{json}");
        }
        OutputFormat::Text => {
            if diff.files.is_empty() {
                println!("No files in diff.");
                return Ok(());
            }
            for file in &diff.files {
                if file.is_binary {
                    println!("{} {} (binary)", file.status, file.path.display());
                } else {
                    println!("{file}  [{}]", file.language);
                }
            }
            println!(
                "\n{} files, +{} -{}",
                diff.files.len(),
                diff.additions,
                diff.deletions
            );
        }
    }
    Ok(())
}

fn read_diff_input(file: &Option<PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err(format!("reading {}", path.display())),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .into_diagnostic()
                .wrap_err("reading stdin")?;
            Ok(input)
        }
    }
}
