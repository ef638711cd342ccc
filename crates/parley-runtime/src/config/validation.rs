//! Configuration validation utilities.

use std::net::SocketAddr;

use url::Url;

use super::error::{ConfigError, ConfigResult};
use super::schema::{
    BotConfig, DispatchConfig, LogOutput, LoggingConfig, ParleyConfig, WebHookConfig,
};

/// Validates the entire configuration.
pub fn validate_config(config: &ParleyConfig) -> ConfigResult<()> {
    validate_bot_config(&config.bot)?;
    validate_logging_config(&config.logging)?;
    validate_dispatch_config(&config.dispatch)?;
    validate_webhook_config(&config.webhook)?;
    Ok(())
}

fn validate_bot_config(bot: &BotConfig) -> ConfigResult<()> {
    if bot.name.trim().is_empty() {
        return Err(ConfigError::validation("bot.name must not be empty"));
    }
    if bot.name.contains('/') {
        return Err(ConfigError::validation(format!(
            "bot.name must not contain '/', got {:?}",
            bot.name
        )));
    }
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.file_path is required when logging.output is \"file\"",
        ));
    }

    if logging.filters.keys().any(|module| module.trim().is_empty()) {
        return Err(ConfigError::validation(
            "logging.filters contains an empty module name",
        ));
    }

    Ok(())
}

fn validate_dispatch_config(dispatch: &DispatchConfig) -> ConfigResult<()> {
    if dispatch.queue_capacity == 0 {
        return Err(ConfigError::validation(
            "dispatch.queue_capacity must be greater than 0",
        ));
    }
    Ok(())
}

/// The bind address and base URL are checked even while web hooks are
/// disabled, so a typo surfaces before the host is switched on.
fn validate_webhook_config(webhook: &WebHookConfig) -> ConfigResult<()> {
    webhook
        .bind
        .parse::<SocketAddr>()
        .map_err(|e| ConfigError::invalid_address(&webhook.bind, e.to_string()))?;

    if let Some(base) = &webhook.base_url {
        validate_base_url(base)?;
    }

    Ok(())
}

fn validate_base_url(base: &str) -> ConfigResult<()> {
    let url = Url::parse(base).map_err(|e| ConfigError::invalid_url(base, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ConfigError::invalid_url(
            base,
            format!("scheme must be http or https, got {scheme}"),
        )),
    }
}
