//! Runtime wiring: configuration, logging and router construction.
//!
//! ```rust,ignore
//! use switchyard_runtime::SwitchyardRuntime;
//!
//! let runtime = SwitchyardRuntime::load()?;
//! let router = runtime
//!     .router_builder()
//!     .register(Registration::for_message::<Order, _>(OrderHandler))
//!     .build();
//! ```

use std::path::Path;

use switchyard_router::{MessageRouter, RouterBuilder, RouterOptions};
use tracing::info;

use crate::config::{ConfigLoader, ConfigResult, SwitchyardConfig, validate_config};
use crate::logging;

/// Loaded configuration with logging installed.
///
/// Routers built from the runtime share its [`RouterOptions`].
#[derive(Debug, Clone)]
pub struct SwitchyardRuntime {
    config: SwitchyardConfig,
}

impl SwitchyardRuntime {
    /// Loads configuration from the current directory, the user config
    /// directory and the environment.
    pub fn load() -> ConfigResult<Self> {
        Self::from_loader(
            ConfigLoader::new()
                .with_current_dir()
                .with_user_config_dir(),
        )
    }

    /// Loads configuration from exactly this file plus the environment.
    pub fn load_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        Self::from_loader(ConfigLoader::new().file(path))
    }

    /// Builds the runtime from a customized loader.
    pub fn from_loader(loader: ConfigLoader) -> ConfigResult<Self> {
        Self::from_config(loader.load()?)
    }

    /// Validates the configuration and initializes logging.
    ///
    /// Logging is installed at most once per process; later runtimes keep
    /// the first subscriber.
    pub fn from_config(config: SwitchyardConfig) -> ConfigResult<Self> {
        validate_config(&config)?;
        logging::init_from_config(&config.logging);

        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            unknown_fields = ?config.router.unknown_fields,
            "Runtime initialized from configuration"
        );

        Ok(Self { config })
    }

    /// The validated configuration.
    pub fn config(&self) -> &SwitchyardConfig {
        &self.config
    }

    /// Router options derived from the `router` section.
    pub fn router_options(&self) -> RouterOptions {
        self.config.router.to_options()
    }

    /// A router builder pre-seeded with the configured options.
    pub fn router_builder(&self) -> RouterBuilder {
        MessageRouter::builder().options(self.router_options())
    }

    /// An empty router with the configured options; registrations can be
    /// added later with [`MessageRouter::add`].
    pub fn router(&self) -> MessageRouter {
        MessageRouter::new(self.router_options())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigError, LogOutput};
    use serde::{Deserialize, Serialize};
    use switchyard_core::{
        CancellationToken, HandlerResult, MessageContext, MessageCorrelation, UnknownFieldPolicy,
    };
    use switchyard_router::{HandlerContext, Registration, handler_fn};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Order {
        id: u32,
    }

    fn ignoring_config() -> SwitchyardConfig {
        let mut config = SwitchyardConfig::default();
        config.router.unknown_fields = UnknownFieldPolicy::Ignore;
        config
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = SwitchyardConfig::default();
        config.logging.output = LogOutput::File;

        let result = SwitchyardRuntime::from_config(config);
        assert!(matches!(result, Err(ConfigError::MissingField { .. })));
    }

    #[test]
    fn test_router_options_follow_config() {
        let runtime = SwitchyardRuntime::from_config(ignoring_config()).unwrap();

        assert_eq!(
            runtime.config().router.unknown_fields,
            UnknownFieldPolicy::Ignore
        );
        assert_eq!(
            runtime.router_options().unknown_fields,
            UnknownFieldPolicy::Ignore
        );
        assert_eq!(
            runtime.router().options().unknown_fields,
            UnknownFieldPolicy::Ignore
        );
    }

    #[tokio::test]
    async fn test_configured_policy_reaches_routing() {
        let runtime = SwitchyardRuntime::from_config(ignoring_config()).unwrap();
        let router = runtime
            .router_builder()
            .register(Registration::for_message::<Order, _>(handler_fn(
                |_: Order, _: HandlerContext| async move { HandlerResult::Ok(()) },
            )))
            .build();

        let context = MessageContext::new("msg-1", "pump-1").unwrap();
        let result = router
            .route_text(
                r#"{"id": 7, "note": "extra"}"#,
                &context,
                &MessageCorrelation::new("op-1", "tx-1"),
                &CancellationToken::new(),
            )
            .await;

        assert!(result.is_successful());
    }

    #[tokio::test]
    async fn test_default_policy_rejects_unknown_fields() {
        let runtime = SwitchyardRuntime::from_config(SwitchyardConfig::default()).unwrap();
        let router = runtime
            .router_builder()
            .register(Registration::for_message::<Order, _>(handler_fn(
                |_: Order, _: HandlerContext| async move { HandlerResult::Ok(()) },
            )))
            .build();

        let context = MessageContext::new("msg-2", "pump-1").unwrap();
        let result = router
            .route_text(
                r#"{"id": 7, "note": "extra"}"#,
                &context,
                &MessageCorrelation::new("op-1", "tx-1"),
                &CancellationToken::new(),
            )
            .await;

        assert!(!result.is_successful());
    }

    #[test]
    fn test_load_file_missing() {
        let result = SwitchyardRuntime::load_file("/nonexistent/switchyard.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }
}
