//! Switchyard Runtime - configuration and logging for the message router.
//!
//! This crate provides:
//! - Layered configuration (`ConfigLoader`): defaults, config files,
//!   profiles and `SWITCHYARD_*` environment variables
//! - Logging setup (`LoggingBuilder`) on `tracing-subscriber`
//! - `SwitchyardRuntime`, which validates configuration, installs logging
//!   and hands out routers with the configured options
//!
//! ```ignore
//! use switchyard_runtime::SwitchyardRuntime;
//!
//! let runtime = SwitchyardRuntime::load()?;
//! let router = runtime.router_builder().register(registration).build();
//! ```

pub mod config;
pub mod logging;
pub mod runtime;

pub use config::{
    ConfigError, ConfigLoader, ConfigResult, LoggingConfig, Profile, RouterConfig,
    SwitchyardConfig,
};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::SwitchyardRuntime;
