//! Engine configuration.
//!
//! Limits and behaviour switches for an [`Engine`](crate::backend::Engine).
//! A configuration can be built in code, read from the environment or parsed
//! from a TOML document:
//!
//! ```toml
//! max_choice_points = 1000000
//! max_call_depth = 10000
//! max_stack_bytes = 67108864
//! trace = false
//! unknown = "error"
//! ```

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// What happens when an undefined procedure is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownPolicy {
    /// Throw `existence_error(procedure, Name/Arity)`
    Error,
    /// Fail silently
    Fail,
}

impl FromStr for UnknownPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(UnknownPolicy::Error),
            "fail" => Ok(UnknownPolicy::Fail),
            other => Err(ConfigError::InvalidValue {
                key: "unknown",
                value: other.to_string(),
            }),
        }
    }
}

/// Configuration for the engine
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of live choice points
    pub max_choice_points: usize,
    /// Maximum nesting of predicate activations.
    ///
    /// Every activation nests a few interpreter frames on the native stack,
    /// so on a given thread `max_stack_bytes` usually binds first. Deep
    /// recursion needs both raised, and a thread whose stack holds the
    /// budget: see [`Engine::run_on_thread`](crate::backend::Engine::run_on_thread).
    pub max_call_depth: usize,
    /// Native stack, in bytes, that nested activations of one goal may use
    /// before a call throws `resource_error(stack)`.
    ///
    /// Must stay below the stack of the thread running the engine minus
    /// [`STACK_HEADROOM`]. The default fits the 2 MiB threads the standard
    /// library spawns.
    pub max_stack_bytes: usize,
    /// Maximum operand stack size of a single activation
    pub max_operand_stack: usize,
    /// Emit one `horn::vm::step` trace event per instruction
    pub trace: bool,
    /// Behaviour of calls to undefined procedures
    pub unknown: UnknownPolicy,
}

/// Stack kept free above `max_stack_bytes` for the frames of the call that
/// trips the limit and for the code that handles the error
pub const STACK_HEADROOM: usize = 1 << 20;

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_choice_points: 1 << 20,
            max_call_depth: 1000,
            max_operand_stack: 65536,
            max_stack_bytes: 1 << 20,
            trace: false,
            unknown: UnknownPolicy::Error,
        }
    }
}

/// Errors raised while building a configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A value could not be interpreted for its key
    InvalidValue { key: &'static str, value: String },
    /// The TOML document is malformed
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { key, value } => {
                write!(f, "Invalid value for {}: {:?}", key, value)
            }
            Self::Parse(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl EngineConfig {
    /// Stack size for a thread dedicated to an engine with this configuration
    pub fn thread_stack_size(&self) -> usize {
        self.max_stack_bytes.saturating_add(STACK_HEADROOM)
    }

    /// Parse a configuration from a TOML document.
    ///
    /// Missing keys take their default values.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Build a configuration from `HORN_*` environment variables.
    ///
    /// Unset variables keep their default values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a key lookup (the environment in production).
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(v) = lookup("HORN_MAX_CHOICE_POINTS") {
            self.max_choice_points = parse_limit("max_choice_points", &v)?;
        }
        if let Some(v) = lookup("HORN_MAX_CALL_DEPTH") {
            self.max_call_depth = parse_limit("max_call_depth", &v)?;
        }
        if let Some(v) = lookup("HORN_MAX_OPERAND_STACK") {
            self.max_operand_stack = parse_limit("max_operand_stack", &v)?;
        }
        if let Some(v) = lookup("HORN_MAX_STACK_BYTES") {
            self.max_stack_bytes = parse_limit("max_stack_bytes", &v)?;
        }
        if let Some(v) = lookup("HORN_TRACE") {
            self.trace = matches!(v.as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(v) = lookup("HORN_UNKNOWN") {
            self.unknown = v.parse()?;
        }
        Ok(self)
    }
}

fn parse_limit(key: &'static str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_toml_partial_config() {
        let config = EngineConfig::from_toml_str("max_call_depth = 12\nunknown = \"fail\"\n")
            .expect("valid config");
        assert_eq!(config.max_call_depth, 12);
        assert_eq!(config.unknown, UnknownPolicy::Fail);
        assert_eq!(config.max_choice_points, EngineConfig::default().max_choice_points);
    }

    #[test]
    fn test_thread_stack_covers_budget() {
        let config = EngineConfig::from_toml_str("max_stack_bytes = 4096").expect("valid config");
        assert_eq!(config.max_stack_bytes, 4096);
        assert_eq!(config.thread_stack_size(), 4096 + STACK_HEADROOM);
    }

    #[test]
    fn test_toml_rejects_bad_policy() {
        assert!(EngineConfig::from_toml_str("unknown = \"warn\"").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("HORN_MAX_CHOICE_POINTS", "64"),
            ("HORN_MAX_STACK_BYTES", "8388608"),
            ("HORN_TRACE", "1"),
            ("HORN_UNKNOWN", "fail"),
        ]
        .into_iter()
        .collect();
        let config = EngineConfig::default()
            .with_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .expect("valid overrides");
        assert_eq!(config.max_choice_points, 64);
        assert_eq!(config.max_stack_bytes, 8 << 20);
        assert!(config.trace);
        assert_eq!(config.unknown, UnknownPolicy::Fail);
    }

    #[test]
    fn test_env_rejects_zero_limit() {
        let err = EngineConfig::default()
            .with_overrides(|k| (k == "HORN_MAX_CALL_DEPTH").then(|| "0".to_string()))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "max_call_depth",
                value: "0".to_string()
            }
        );
    }
}
