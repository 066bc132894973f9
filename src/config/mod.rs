//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ControlPlaneConfig (validated, immutable)
//!     → handed to the composition root at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Route definitions are NOT config: they live in the route store

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AuthConfig, ControlPlaneConfig, DatabaseConfig, GatewayConfig, ListenerConfig,
    ObservabilityConfig, OperatorCredential, SecurityConfig, TimeoutConfig, TlsConfig,
};
