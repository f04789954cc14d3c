//! Top-level handling of fatal errors.
//!
//! A unit of work runs under [`run_unit`]. When it fails, the whole
//! message/cause chain is captured into a [`FatalReport`], logged, kept in
//! the [`FATAL_LOG`](crate::audit::FATAL_LOG) and the unit is halted. There
//! is no retry.

use std::error::Error;
use std::fmt;
use std::io::Write;

use serde::Serialize;
use tracing::{debug, error, info_span};

use crate::audit::{FatalLog, FATAL_LOG};
use crate::error::{Chain, FatalProtocolError};

/// Process exit status after a fatal error (`EX_SOFTWARE` from sysexits).
pub const FATAL_EXIT_CODE: i32 = 70;

/// Errors raised while writing a report out.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Report I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Report serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// How a report is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// Snapshot of one observed fatal chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FatalReport {
    /// Name of the halted unit of work.
    pub unit: String,
    /// Messages from the outermost error to the innermost cause.
    pub chain: Vec<String>,
    /// blake3 digest of `chain`, identical for identical chains.
    pub fingerprint: String,
    /// RFC 3339 UTC time of observation.
    pub timestamp: String,
}

impl FatalReport {
    /// Capture the chain of `err` as seen by the handler of `unit`.
    pub fn capture(unit: impl Into<String>, err: &(dyn Error + 'static)) -> Self {
        let chain: Vec<String> = Chain::new(err).map(|e| e.to_string()).collect();
        Self {
            unit: unit.into(),
            fingerprint: fingerprint(&chain),
            chain,
            timestamp: now_rfc3339(),
        }
    }

    /// Message of the outermost error.
    pub fn message(&self) -> &str {
        self.chain.first().map(String::as_str).unwrap_or_default()
    }

    /// Messages of the causes, outermost first.
    pub fn causes(&self) -> &[String] {
        self.chain.get(1..).unwrap_or_default()
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Write the report followed by a newline.
    pub fn write_to<W: Write>(&self, mut out: W, format: ReportFormat) -> Result<(), ReportError> {
        match format {
            ReportFormat::Text => writeln!(out, "{}", self)?,
            ReportFormat::Json => writeln!(out, "{}", self.to_json()?)?,
        }
        out.flush()?;
        Ok(())
    }
}

impl fmt::Display for FatalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fatal error in {}: {}", self.unit, self.message())?;
        for cause in self.causes() {
            write!(f, "\n    caused by: {}", cause)?;
        }
        Ok(())
    }
}

fn fingerprint(chain: &[String]) -> String {
    let mut hasher = blake3::Hasher::new();
    for message in chain {
        // length prefix keeps ["ab", "c"] and ["a", "bc"] apart
        hasher.update(&(message.len() as u64).to_le_bytes());
        hasher.update(message.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Helper to get current timestamp as RFC3339 string
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Result of running a unit of work under [`run_unit`].
#[derive(Debug)]
pub enum UnitOutcome<T> {
    Completed(T),
    Halted(FatalReport),
}

impl<T> UnitOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, UnitOutcome::Completed(_))
    }

    pub fn is_halted(&self) -> bool {
        matches!(self, UnitOutcome::Halted(_))
    }

    pub fn completed(self) -> Option<T> {
        match self {
            UnitOutcome::Completed(value) => Some(value),
            UnitOutcome::Halted(_) => None,
        }
    }

    pub fn report(&self) -> Option<&FatalReport> {
        match self {
            UnitOutcome::Completed(_) => None,
            UnitOutcome::Halted(report) => Some(report),
        }
    }
}

/// Run `work` as the unit `unit`, reporting into the global fatal log.
pub fn run_unit<T, F>(unit: &str, work: F) -> UnitOutcome<T>
where
    F: FnOnce() -> Result<T, FatalProtocolError>,
{
    run_unit_with(&FATAL_LOG, unit, work)
}

/// Run `work` as the unit `unit`, reporting into `log`.
///
/// A fatal error halts the unit: it is observed exactly once and the
/// closure is never invoked again.
pub fn run_unit_with<T, F>(log: &FatalLog, unit: &str, work: F) -> UnitOutcome<T>
where
    F: FnOnce() -> Result<T, FatalProtocolError>,
{
    let span = info_span!("unit", unit = %unit);
    let _entered = span.enter();

    match work() {
        Ok(value) => {
            debug!("unit completed");
            UnitOutcome::Completed(value)
        }
        Err(err) => UnitOutcome::Halted(observe(log, unit, &err)),
    }
}

/// Capture, log and record a fatal error observed at the boundary of `unit`.
pub fn observe(log: &FatalLog, unit: &str, err: &(dyn Error + 'static)) -> FatalReport {
    let report = FatalReport::capture(unit, err);
    let rendered = report.chain.join(": ");
    error!(
        unit = %report.unit,
        fingerprint = %report.fingerprint,
        depth = report.chain.len(),
        error = %rendered,
        "unit halted by fatal error"
    );
    log.record(report.clone());
    report
}

/// Report `err` on stderr and in the logs, then exit with [`FATAL_EXIT_CODE`].
pub fn terminate(unit: &str, err: &(dyn Error + 'static)) -> ! {
    let report = observe(&FATAL_LOG, unit, err);
    exit_with_report(&report, std::io::stderr().lock(), ReportFormat::Text)
}

/// Write an observed report to `out`, then exit with [`FATAL_EXIT_CODE`].
///
/// The exit status stays fatal even if the report cannot be written.
/// Destructors do not run; drop logging guards before calling this.
pub fn exit_with_report<W: Write>(report: &FatalReport, out: W, format: ReportFormat) -> ! {
    if let Err(e) = report.write_to(out, format) {
        error!(fingerprint = %report.fingerprint, "failed to write fatal report: {}", e);
        eprintln!("{}", report);
    }
    std::process::exit(FATAL_EXIT_CODE)
}
