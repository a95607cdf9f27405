// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod control;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod execution_context;
pub mod numeric;
pub mod observability;
pub mod repro;
pub mod time_series;

pub use control::CancelToken;
pub use diagnostics::{DIAGNOSTICS_SCHEMA_VERSION, RunDiagnostics};
pub use error::{BcpError, ErrorKind};
pub use events::EventRecord;
pub use execution_context::ExecutionContext;
pub use observability::{LogLevel, LogRecord, LogSink, MemoryLog, ProgressSink, TelemetrySink};
pub use repro::{ReproMode, derive_chain_seed};
pub use time_series::TimeSeries;

/// Core shared types for Bayesian change-point analysis.
pub fn crate_name() -> &'static str {
    "bcp-core"
}
