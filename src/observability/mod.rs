//! Observability subsystem
//!
//! - Structured logging (JSON, one line per event)
//! - Typed coordination events with stable names
//! - Per-engine counters and a bounded event journal
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on coordination decisions
//! 3. No async or background threads
//! 4. Deterministic output
//!
//! # Usage
//!
//! ```ignore
//! use bootgate::observability::{Logger, Severity};
//!
//! Logger::set_min_severity(Severity::Warn);
//! Logger::log(Severity::Warn, "EVENT_REJECTED", &[("relation", "slurm-cluster:1")]);
//! ```

mod events;
mod journal;
mod logger;
mod metrics;

pub use events::Event;
pub use journal::{Journal, JournalEntry, DEFAULT_JOURNAL_CAPACITY};
pub use logger::{render_line, Logger, Severity};
pub use metrics::CoordinationMetrics;
