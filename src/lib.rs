//! Subscription config distribution for VLESS/Reality proxy fleets.
//!
//! # Architecture Overview
//!
//! ```text
//!     reverse proxy (TLS)          ┌──────────────────────────────────────────────┐
//!     ─────────────────────────────┼─▶ http ──▶ service ──▶ storage (users,      │
//!     GET /{secret}/{user}/{fmt}   │                 │       servers, templates) │
//!                                  │                 ▼                            │
//!                                  │              access (group filter)           │
//!                                  │                 │                            │
//!                                  │                 ▼                            │
//!     ◀────────────────────────────┼── builders (rule-engine YAML, URI, JSON)     │
//!                                  │        └── obfuscation (per-build paths)     │
//!                                  │                                              │
//!                                  │  config · observability · lifecycle          │
//!                                  └──────────────────────────────────────────────┘
//! ```

// Core
pub mod access;
pub mod builders;
pub mod model;
pub mod obfuscation;
pub mod service;
pub mod storage;

// Request surface
pub mod http;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use service::{ConfigService, Format, RenderedConfig, ServiceError};
pub use storage::CacheSet;
