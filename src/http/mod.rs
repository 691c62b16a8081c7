//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → cors.rs (preflight short-circuit, allow-origin on the way out)
//!     → handler.rs (method policy, increment, plain-text count)
//!     → Send to client
//! ```

pub mod cors;
pub mod handler;
pub mod server;

pub use cors::CorsPolicy;
pub use handler::AppState;
pub use server::CounterServer;
