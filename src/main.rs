//! manifest-subst CLI - placeholder substitution for deployment manifests

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use manifest_subst::config::{FileConfig, KvMode, Settings, SourceConfig, SourceMode};
use manifest_subst::error::{FixSuggestion, SubstError};
use manifest_subst::source::loader::{build_registry, capture_env};
use manifest_subst::template::{scan, substitute_with_report, Outcome, Substitution};

#[derive(Parser)]
#[command(name = "manifest-subst")]
#[command(about = "Substitute ${kind:name} placeholders in deployment manifests")]
#[command(version)]
struct Cli {
    /// Debug logging (token decisions, HTTP activity)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Substitute placeholders in a template file
    Process(ProcessArgs),

    /// List the placeholders in a template without resolving them
    Scan {
        /// Template file to inspect
        file: PathBuf,
    },
}

#[derive(Args)]
struct ProcessArgs {
    /// Template file to read
    #[arg(short, long)]
    input: PathBuf,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Where vars come from
    #[arg(long, value_enum)]
    vars_source: Option<SourceMode>,

    /// Where secrets come from
    #[arg(long, value_enum)]
    secrets_source: Option<SourceMode>,

    /// Backing store for kv tokens
    #[arg(long, value_enum)]
    kv_source: Option<KvMode>,

    /// Environment section of the config file to apply (dev, staging, prod...)
    #[arg(short, long)]
    environment: Option<String>,

    /// Azure Key Vault name
    #[arg(long)]
    keyvault_name: Option<String>,

    /// Full Key Vault URL (overrides --keyvault-name)
    #[arg(long)]
    keyvault_url: Option<String>,

    /// Config file (default: ./manifest-subst.toml, then the user config)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Key Vault request timeout in seconds (at least 1)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Retries for transient Key Vault failures
    #[arg(long)]
    max_retries: Option<u32>,

    /// Print what happened to each placeholder (names only) on stderr
    #[arg(long)]
    report: bool,
}

impl ProcessArgs {
    fn source_config(&self) -> SourceConfig {
        SourceConfig {
            vars_source: self.vars_source,
            secrets_source: self.secrets_source,
            kv_source: self.kv_source,
            keyvault_name: self.keyvault_name.clone(),
            keyvault_url: self.keyvault_url.clone(),
            vars_prefix: None,
            secrets_prefix: None,
            timeout_secs: self.timeout,
            max_retries: self.max_retries,
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else if cli.quiet {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };

    // Logs go to stderr; stdout may carry the rendered manifest
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    let result = match cli.command {
        Commands::Process(args) => process(args).await,
        Commands::Scan { file } => scan_file(&file),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

async fn process(args: ProcessArgs) -> Result<(), SubstError> {
    let (config_path, file_config) = FileConfig::discover(args.config.as_deref())?;
    if let Some(path) = &config_path {
        tracing::info!(path = %path.display(), "Loaded config file");
    }

    let settings = Settings::resolve(&file_config, args.environment.as_deref(), args.source_config());
    let env = capture_env();
    let registry = build_registry(&settings, &env)?;

    let template = tokio::fs::read_to_string(&args.input).await?;
    let result = substitute_with_report(&template, &registry).await?;

    tracing::info!(
        tokens = result.tokens.len(),
        resolved = result.count(Outcome::Resolved),
        defaulted = result.count(Outcome::Defaulted),
        verbatim = result.count(Outcome::Verbatim),
        "Substitution complete"
    );

    if args.report {
        print_report(&result);
    }

    match &args.output {
        Some(path) => {
            tokio::fs::write(path, &result.output).await?;
            println!(
                "{} Successfully processed '{}' to '{}'",
                "✓".green(),
                args.input.display(),
                path.display()
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(result.output.as_bytes())?;
            stdout.flush()?;
        }
    }

    Ok(())
}

fn print_report(result: &Substitution) {
    eprintln!("{}", "Placeholders:".cyan().bold());
    for token in &result.tokens {
        let outcome = match token.outcome {
            Outcome::Resolved => "resolved".green(),
            Outcome::Defaulted => "default".yellow(),
            Outcome::Verbatim => "left as-is".dimmed(),
        };
        eprintln!("  {}:{}  {}", token.kind.as_str().cyan(), token.name, outcome);
    }
}

fn scan_file(file: &Path) -> Result<(), SubstError> {
    let template = fs::read_to_string(file)?;
    let tokens = scan(&template);

    if tokens.is_empty() {
        println!("{} No placeholders in '{}'", "✓".green(), file.display());
        return Ok(());
    }

    println!("{} {} placeholder(s) in '{}'", "→".cyan(), tokens.len(), file.display());
    for token in &tokens {
        let line = template[..token.span.start].matches('\n').count() + 1;
        let marker = if token.required {
            "required".red().to_string()
        } else if let Some(default) = token.default {
            format!("default: {}", default)
        } else {
            "optional".dimmed().to_string()
        };
        println!("  {:>4}  {}:{}  {}", line, token.kind.as_str().cyan(), token.name, marker);
    }

    Ok(())
}
