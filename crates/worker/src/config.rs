use std::num::{NonZeroU32, NonZeroUsize};
use std::path::PathBuf;
use std::time::Duration;

use pixelfleet_remote::token::{Token, TOKEN_ATTEMPT_TIMEOUT};

use crate::engine::EngineSettings;

/// Default base URL of the mutation API.
pub const DEFAULT_API_URL: &str = "https://entropixel.ru";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed.
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },

    /// Neither a static token nor a challenge URL was configured.
    #[error("either PIXELFLEET_TOKEN or PIXELFLEET_CHALLENGE_URL must be set")]
    NoTokenSource,
}

/// Where authorization tokens come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    /// One pre-issued token reused for every acquisition.
    Static(Token),
    /// `GET` this URL for every acquisition.
    Challenge(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Worker process configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub api_url: String,
    pub batch_file: PathBuf,
    pub token_source: TokenSource,
    /// Per-attempt token race timeout.
    pub token_timeout: Duration,
    /// Reload covering chunks before each pass.
    pub refresh_canvas: bool,
    pub log_format: LogFormat,
    pub engine: EngineSettings,
}

impl WorkerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                         | Default                         |
    /// |---------------------------------|---------------------------------|
    /// | `PIXELFLEET_API_URL`            | `https://entropixel.ru`         |
    /// | `PIXELFLEET_BATCH_FILE`         | required                        |
    /// | `PIXELFLEET_PARALLELISM`        | `128`                           |
    /// | `PIXELFLEET_MAX_PASSES`         | `10`                            |
    /// | `PIXELFLEET_FINGERPRINT_TAIL`   | `a6cd4b387585d9f5df6ba2c69dc1`  |
    /// | `PIXELFLEET_TOKEN`              | --                              |
    /// | `PIXELFLEET_CHALLENGE_URL`      | --                              |
    /// | `PIXELFLEET_TOKEN_TIMEOUT_SECS` | `3`                             |
    /// | `PIXELFLEET_MAX_ITEM_ATTEMPTS`  | `25` (`0` = unlimited)          |
    /// | `PIXELFLEET_REFRESH_CANVAS`     | `true`                          |
    /// | `LOG_FORMAT`                    | `text`                          |
    ///
    /// A static token wins over a challenge URL when both are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = EngineSettings::default();

        let api_url = var("PIXELFLEET_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into());

        let batch_file = var("PIXELFLEET_BATCH_FILE")
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing("PIXELFLEET_BATCH_FILE"))?;

        let parallelism = match var("PIXELFLEET_PARALLELISM") {
            Some(raw) => parse::<NonZeroUsize>("PIXELFLEET_PARALLELISM", &raw)?,
            None => defaults.parallelism,
        };

        let max_passes = match var("PIXELFLEET_MAX_PASSES") {
            Some(raw) => parse::<NonZeroU32>("PIXELFLEET_MAX_PASSES", &raw)?.get(),
            None => defaults.max_passes,
        };

        let fingerprint_tail =
            var("PIXELFLEET_FINGERPRINT_TAIL").unwrap_or(defaults.fingerprint_tail);

        let token_source = match (var("PIXELFLEET_TOKEN"), var("PIXELFLEET_CHALLENGE_URL")) {
            (Some(token), _) => TokenSource::Static(Token::new(token.trim())),
            (None, Some(url)) => TokenSource::Challenge(url),
            (None, None) => return Err(ConfigError::NoTokenSource),
        };

        let token_timeout = match var("PIXELFLEET_TOKEN_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = parse::<f64>("PIXELFLEET_TOKEN_TIMEOUT_SECS", &raw)?;
                Duration::try_from_secs_f64(secs)
                    .ok()
                    .filter(|d| !d.is_zero())
                    .ok_or_else(|| ConfigError::Invalid {
                        name: "PIXELFLEET_TOKEN_TIMEOUT_SECS",
                        reason: "must be a positive number of seconds".into(),
                    })?
            }
            None => TOKEN_ATTEMPT_TIMEOUT,
        };

        let max_item_attempts = match var("PIXELFLEET_MAX_ITEM_ATTEMPTS") {
            Some(raw) => NonZeroU32::new(parse::<u32>("PIXELFLEET_MAX_ITEM_ATTEMPTS", &raw)?),
            None => defaults.max_item_attempts,
        };

        let refresh_canvas = match var("PIXELFLEET_REFRESH_CANVAS") {
            Some(raw) => parse_bool("PIXELFLEET_REFRESH_CANVAS", &raw)?,
            None => true,
        };

        let log_format = match var("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT",
                    reason: format!("expected `text` or `json`, got `{other}`"),
                })
            }
        };

        Ok(Self {
            api_url,
            batch_file,
            token_source,
            token_timeout,
            refresh_canvas,
            log_format,
            engine: EngineSettings {
                parallelism,
                max_passes,
                fingerprint_tail,
                max_item_attempts,
                ..defaults
            },
        })
    }
}

fn parse<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            name,
            reason: format!("expected a boolean, got `{other}`"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<WorkerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("PIXELFLEET_BATCH_FILE", "batch.json"),
        ("PIXELFLEET_TOKEN", "tok"),
    ];

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let config = load(&REQUIRED).unwrap();

        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.batch_file, PathBuf::from("batch.json"));
        assert_eq!(config.token_source, TokenSource::Static(Token::new("tok")));
        assert_eq!(config.token_timeout, Duration::from_secs(3));
        assert!(config.refresh_canvas);
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.engine.parallelism.get(), 128);
        assert_eq!(config.engine.max_passes, 10);
        assert_eq!(config.engine.max_item_attempts.map(NonZeroU32::get), Some(25));
    }

    #[test]
    fn batch_file_is_required() {
        assert_matches!(
            load(&[("PIXELFLEET_TOKEN", "tok")]),
            Err(ConfigError::Missing("PIXELFLEET_BATCH_FILE"))
        );
    }

    #[test]
    fn a_token_source_is_required() {
        assert_matches!(
            load(&[("PIXELFLEET_BATCH_FILE", "b.json")]),
            Err(ConfigError::NoTokenSource)
        );
    }

    #[test]
    fn challenge_url_is_used_without_static_token() {
        let config = load(&[
            ("PIXELFLEET_BATCH_FILE", "b.json"),
            ("PIXELFLEET_CHALLENGE_URL", "http://solver/token"),
        ])
        .unwrap();
        assert_eq!(
            config.token_source,
            TokenSource::Challenge("http://solver/token".into())
        );
    }

    #[test]
    fn zero_parallelism_is_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("PIXELFLEET_PARALLELISM", "0"));
        assert_matches!(
            load(&vars),
            Err(ConfigError::Invalid { name: "PIXELFLEET_PARALLELISM", .. })
        );
    }

    #[test]
    fn zero_attempt_budget_means_unlimited() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("PIXELFLEET_MAX_ITEM_ATTEMPTS", "0"));
        assert_eq!(load(&vars).unwrap().engine.max_item_attempts, None);
    }

    #[test]
    fn overrides_are_parsed() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("PIXELFLEET_PARALLELISM", "11"),
            ("PIXELFLEET_MAX_PASSES", "4"),
            ("PIXELFLEET_TOKEN_TIMEOUT_SECS", "1.5"),
            ("PIXELFLEET_REFRESH_CANVAS", "off"),
            ("LOG_FORMAT", "json"),
        ]);
        let config = load(&vars).unwrap();

        assert_eq!(config.engine.parallelism.get(), 11);
        assert_eq!(config.engine.max_passes, 4);
        assert_eq!(config.token_timeout, Duration::from_millis(1500));
        assert!(!config.refresh_canvas);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("LOG_FORMAT", "xml"));
        assert_matches!(load(&vars), Err(ConfigError::Invalid { name: "LOG_FORMAT", .. }));
    }
}
