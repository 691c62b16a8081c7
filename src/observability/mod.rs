//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Handler, counter and store produce:
//!     → logging.rs (structured log events, request spans)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows into the trace span of every request
//! - Metrics are cheap (atomic increments) and a no-op until installed

pub mod logging;
pub mod metrics;
