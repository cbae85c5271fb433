//! The `ipinfo` output contract: exactly one wire line on the writer,
//! diagnostics only through `tracing`, and an exit status.

use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::process::ExitCode;

use super::types::GeoRecord;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A record was resolved (provider or fallback) and written.
    Resolved,
    /// Resolution panicked; the fallback line was written instead.
    Fault,
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Resolved => ExitCode::SUCCESS,
            Outcome::Fault => ExitCode::FAILURE,
        }
    }
}

/// Resolve, then write the record's wire line to `out`. A panic escaping
/// `resolve` still produces the fallback line.
pub fn run<W: Write>(resolve: impl FnOnce() -> GeoRecord, out: &mut W) -> Outcome {
    match panic::catch_unwind(AssertUnwindSafe(resolve)) {
        Ok(record) => {
            emit(&record, out);
            tracing::info!(source = %record.source(), "provider used");
            Outcome::Resolved
        }
        Err(_) => {
            // The pipeline still needs a parsable line.
            emit(&GeoRecord::fallback(), out);
            tracing::error!("unexpected fault while resolving location");
            Outcome::Fault
        }
    }
}

fn emit<W: Write>(record: &GeoRecord, out: &mut W) {
    if let Err(e) = writeln!(out, "{}", record.wire_line()).and_then(|_| out.flush()) {
        tracing::error!(error = %e, "failed to write wire line");
    }
}
