//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (loopback, behind a TLS reverse proxy)
//!     → server.rs (Axum setup, request ID, trace, timeout)
//!     → middleware/access_control.rs (loopback gate)
//!     → request.rs (split /{secret}/{user}/{format})
//!     → ConfigService::get (blocking pool)
//!     → response.rs (status mapping, profile and custom headers)
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{UserPath, X_REQUEST_ID};
pub use response::{ApiError, ResponseHeaders};
pub use server::{AppState, HttpServer};
