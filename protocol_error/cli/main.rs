//! for CLI
//!
//! Builds a fatal chain from the given messages and hands it to the
//! top-level handler, printing the report the way a halted protocol run would.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use protocol_error::config::LoggingConfig;
use protocol_error::logging::init_logging;
use protocol_error::report::{exit_with_report, ReportFormat};
use protocol_error::{run_unit, FatalProtocolError, UnitOutcome};
use tracing::info;

#[derive(Parser)]
#[command(name = "fatal-report", version, about = "Render a fatal protocol error chain")]
struct Cli {
    #[arg(long, help = "Print the report as JSON (and write JSON log files)")]
    json: bool,

    #[arg(long, help = "Also log to a daily rolling file in this directory")]
    log_dir: Option<PathBuf>,

    #[arg(long, default_value = "fatal-report", help = "Name of the unit of work being halted")]
    unit: String,

    #[arg(required = true, help = "Messages, outermost first; each one is caused by the next")]
    messages: Vec<String>,
}

/// Innermost message first, each outer message wrapping the previous error as its cause.
fn build_chain(messages: &[String]) -> Result<FatalProtocolError> {
    let mut rest = messages.iter().rev();
    let innermost = rest.next().context("at least one message is required")?;
    Ok(rest.fold(FatalProtocolError::new(innermost.as_str()), |cause, message| {
        FatalProtocolError::with_cause(message.as_str(), cause)
    }))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = LoggingConfig::default().with_json(cli.json);
    if let Some(dir) = &cli.log_dir {
        config = config.with_log_dir(dir);
    }
    let guard = init_logging(&config).context("failed to initialize logging")?;

    let chain = build_chain(&cli.messages)?;
    info!(depth = chain.depth(), unit = %cli.unit, "raising fatal chain");

    let report = match run_unit(&cli.unit, move || Err::<(), _>(chain)) {
        UnitOutcome::Halted(report) => report,
        UnitOutcome::Completed(()) => bail!("unit completed without a fatal error"),
    };

    let format = if cli.json { ReportFormat::Json } else { ReportFormat::Text };

    // exit skips destructors; flush file logs first
    drop(guard);
    exit_with_report(&report, std::io::stdout().lock(), format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_chain_orders_outermost_first() {
        let messages = vec!["mix round aborted".to_string(), "checkpoint failed".to_string(), "disk full".to_string()];
        let err = build_chain(&messages).unwrap();

        assert_eq!(err.message(), "mix round aborted");
        let chain: Vec<String> = err.chain().map(|e| e.to_string()).collect();
        assert_eq!(chain, messages);
    }

    #[test]
    fn test_build_chain_rejects_empty_input() {
        assert!(build_chain(&[]).is_err());
    }

    #[test]
    fn test_cli_requires_a_message() {
        assert!(Cli::try_parse_from(["fatal-report"]).is_err());
        let cli = Cli::try_parse_from(["fatal-report", "--json", "disk full"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.unit, "fatal-report");
        assert_eq!(cli.messages, vec!["disk full"]);
    }
}
