//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → PoolConfig (validated, immutable)
//!     → HaPool builder
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Backends can also be registered programmatically; a file is optional

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BackendConfig, FailoverConfig, HealthCheckConfig, ObservabilityConfig, PoolConfig,
    SchedulerConfig, ShutdownConfig, StrategyKind,
};
pub use validation::{validate_config, ValidationError};
