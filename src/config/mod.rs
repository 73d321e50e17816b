//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → SUBSTUB_* environment overrides
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → paths feed the repositories, http feeds the server
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; data files are re-read on change by
//!   the file cache, the config file itself is not
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AppConfig, CustomHeaderConfig, HttpConfig, ListenerConfig, ObfuscationConfig,
    ObservabilityConfig, PathsConfig,
};
