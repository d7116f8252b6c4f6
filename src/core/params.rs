use serde::{Deserialize, Serialize};
use tracing::warn;

/// Environment variable overriding the default RAM budget, in megabytes.
pub const MAX_RAM_HINT_ENV: &str = "RASTREAM_MAX_RAM_HINT";

const DEFAULT_MAX_RAM_HINT_MB: u64 = 256;

/// Fallback knobs used when a caller leaves a streaming parameter unset,
/// suitable for config files and presets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingDefaults {
    /// RAM budget substituted for a policy budget of 0, in megabytes
    pub max_ram_hint_mb: u64,
}

impl Default for StreamingDefaults {
    fn default() -> Self {
        Self {
            max_ram_hint_mb: DEFAULT_MAX_RAM_HINT_MB,
        }
    }
}

impl StreamingDefaults {
    /// Resolve the defaults from the environment, falling back to the
    /// built-in values when the variable is absent or malformed.
    pub fn from_env() -> Self {
        match std::env::var(MAX_RAM_HINT_ENV) {
            Ok(raw) => match parse_ram_hint(&raw) {
                Some(mb) => Self {
                    max_ram_hint_mb: mb,
                },
                None => {
                    warn!(
                        "Ignoring invalid {}={:?}, using {} MB",
                        MAX_RAM_HINT_ENV, raw, DEFAULT_MAX_RAM_HINT_MB
                    );
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// The default budget in bytes, as the divisor computation consumes it.
    pub fn ram_budget_bytes(&self) -> u64 {
        self.max_ram_hint_mb.saturating_mul(1024 * 1024)
    }
}

fn parse_ram_hint(raw: &str) -> Option<u64> {
    match raw.trim().parse::<u64>() {
        Ok(0) => None,
        Ok(mb) => Some(mb),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budget() {
        let defaults = StreamingDefaults::default();
        assert_eq!(defaults.max_ram_hint_mb, 256);
        assert_eq!(defaults.ram_budget_bytes(), 256 * 1024 * 1024);
    }

    #[test]
    fn test_parse_ram_hint() {
        assert_eq!(parse_ram_hint("512"), Some(512));
        assert_eq!(parse_ram_hint(" 64 "), Some(64));
        assert_eq!(parse_ram_hint("0"), None);
        assert_eq!(parse_ram_hint("lots"), None);
        assert_eq!(parse_ram_hint(""), None);
    }

    #[test]
    fn test_budget_saturates() {
        let defaults = StreamingDefaults {
            max_ram_hint_mb: u64::MAX,
        };
        assert_eq!(defaults.ram_budget_bytes(), u64::MAX);
    }
}
