//! schema-convert CLI - convert a database schema for a distributed SQL target.

use clap::{Parser, Subcommand};
use schema_convert::{Config, ConvertError, Conv, Converter, OutputPaths, Report, SessionStore};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "schema-convert")]
#[command(about = "Convert a source database schema to a distributed SQL target")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Print the report as JSON to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the source schema, map it and verify expressions
    Convert {
        /// Print the report without writing session, DDL or report files
        #[arg(long)]
        dry_run: bool,

        /// Output file prefix (default: from config, else the source name)
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Re-verify a saved session and write fresh outputs
    Resume {
        /// Session file written by a previous run
        #[arg(long)]
        session: PathBuf,

        /// Output file prefix (default: the session file name)
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Print the report of a saved session
    Report {
        /// Session file written by a previous run
        #[arg(long)]
        session: PathBuf,
    },

    /// Check the configuration file and exit
    Validate,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), ConvertError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    // Reporting on a session needs no configuration
    if let Commands::Report { session } = &cli.command {
        let loaded = SessionStore::load(session)?;
        print_report(&Report::assemble(&loaded.conv), cli.output_json)?;
        return Ok(());
    }

    let config = Config::load(&cli.config)?.with_auto_tuning();
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Report { .. } => {} // handled above
        Commands::Validate => {
            println!("Configuration is valid: {}", cli.config.display());
            println!("  Source: {}", config.source.dialect);
            println!("  Target: {}", config.target.dialect.as_str());
            println!(
                "  Verifier: {}",
                if config.target.verifier.is_some() { "configured" } else { "none" }
            );
        }

        Commands::Convert { dry_run, prefix } => {
            let prefix = prefix.unwrap_or_else(|| config.output_prefix());
            let cancel = setup_signal_handler();
            let converter = Converter::new(config).with_cancel(cancel.clone());

            let mut conv = converter.convert_from_source().await?;
            finish(&converter, &mut conv, &prefix, dry_run, cli.output_json)?;
            if cancel.is_cancelled() {
                return Err(ConvertError::Cancelled);
            }
        }

        Commands::Resume { session, prefix } => {
            let prefix = prefix.unwrap_or_else(|| session_prefix(&session));
            let cancel = setup_signal_handler();
            let converter = Converter::new(config).with_cancel(cancel.clone());

            info!("Resuming from {}", session.display());
            let mut conv = converter.convert_from_session(&session).await?;
            finish(&converter, &mut conv, &prefix, false, cli.output_json)?;
            if cancel.is_cancelled() {
                return Err(ConvertError::Cancelled);
            }
        }
    }

    Ok(())
}

fn finish(
    converter: &Converter,
    conv: &mut Conv,
    prefix: &str,
    dry_run: bool,
    output_json: bool,
) -> Result<(), ConvertError> {
    let report = if dry_run {
        info!("Dry run: no files written");
        Report::assemble(conv)
    } else {
        let outputs = OutputPaths::from_prefix(prefix);
        let report = converter.persist(conv, &outputs)?;
        if !output_json {
            println!("Wrote {}", outputs.ddl.display());
            println!("Wrote {}", outputs.report.display());
            if outputs.session.exists() {
                println!("Wrote {}", outputs.session.display());
            }
        }
        report
    };
    if conv.is_partial() {
        warn!("Conversion was aborted; outputs are partial");
    }
    print_report(&report, output_json)
}

fn print_report(report: &Report, output_json: bool) -> Result<(), ConvertError> {
    if output_json {
        println!("{}", report.to_json()?);
    } else {
        println!("\n{}", report.render_text());
    }
    Ok(())
}

/// `shop.session.json` -> `shop`.
fn session_prefix(session: &Path) -> String {
    let name = session
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("schema");
    let stem = name
        .strip_suffix(".session.json")
        .or_else(|| name.strip_suffix(".json"))
        .unwrap_or(name);
    session
        .with_file_name(stem)
        .to_string_lossy()
        .into_owned()
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stdout is reserved for the report
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Cancel the returned token on SIGINT or SIGTERM.
///
/// Readers stop between tables and the verifier between expressions; the
/// model gets one `aborted` issue.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    for (kind, label) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let token = cancel_token.clone();
        tokio::spawn(async move {
            match signal(kind) {
                Ok(mut stream) => {
                    stream.recv().await;
                    eprintln!("\nReceived {}. Stopping at the next safe point...", label);
                    token.cancel();
                }
                Err(e) => eprintln!("Failed to install {} handler: {}", label, e),
            }
        });
    }

    cancel_token
}

/// Signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                eprintln!("\nReceived Ctrl-C. Stopping at the next safe point...");
                token.cancel();
            }
            Err(e) => eprintln!("Failed to install Ctrl-C handler: {}", e),
        }
    });

    cancel_token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_prefix() {
        assert_eq!(session_prefix(Path::new("out/shop.session.json")), "out/shop");
        assert_eq!(session_prefix(Path::new("snap.json")), "snap");
        assert_eq!(session_prefix(Path::new("snap")), "snap");
    }
}
