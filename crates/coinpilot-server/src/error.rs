use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {env_var}: {reason}")]
    Invalid { env_var: String, reason: String },

    #[error("Invalid listen address '{0}'")]
    InvalidAddress(String),

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// The environment variable that sets a dotted config key, e.g. `server.port`
pub fn to_env_var(field_path: &str) -> String {
    // Nested keys are separated by a double underscore
    format!("COINPILOT_{}", field_path.replace('.', "__").to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_env_var() {
        assert_eq!(to_env_var("server.port"), "COINPILOT_SERVER__PORT");
        assert_eq!(
            to_env_var("prices.source_timeout_secs"),
            "COINPILOT_PRICES__SOURCE_TIMEOUT_SECS"
        );
    }
}
