//! Configuration data model

use std::path::PathBuf;

/// Default location of the configuration file, before `~` expansion
pub const DEFAULT_CONFIG_PATH: &str = "~/.config/sway-focus/config.kdl";

/// Default per-operation deadline for queries, in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub global: GlobalConfig,
    /// Focus rules in file order
    pub rules: Vec<FocusRule>,
    /// Command run when no rule matches
    pub default_command: Option<String>,
}

impl Config {
    /// The command to run when a node with the given identifiers gains focus
    ///
    /// The first matching rule wins; otherwise the default command, if any.
    pub fn command_for(&self, app_id: Option<&str>, class: Option<&str>) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.matches(app_id, class))
            .map(|rule| rule.command.as_str())
            .or(self.default_command.as_deref())
    }
}

/// Global options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalConfig {
    pub log_level: LogLevel,
    /// Overrides `$SWAYSOCK` when set
    pub socket: Option<PathBuf>,
    pub timeout_ms: u64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            socket: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive usable with `tracing_subscriber::EnvFilter`
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// Maps a focused application to a sway command
///
/// `app_id` matches Wayland clients, `class` matches Xwayland clients. When
/// both are set, both must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FocusRule {
    pub app_id: Option<String>,
    pub class: Option<String>,
    pub command: String,
}

impl FocusRule {
    pub fn matches(&self, app_id: Option<&str>, class: Option<&str>) -> bool {
        if self.app_id.is_none() && self.class.is_none() {
            return false;
        }

        let app_id_ok = match &self.app_id {
            Some(expected) => app_id == Some(expected.as_str()),
            None => true,
        };
        let class_ok = match &self.class {
            Some(expected) => class == Some(expected.as_str()),
            None => true,
        };

        app_id_ok && class_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(app_id: Option<&str>, class: Option<&str>, command: &str) -> FocusRule {
        FocusRule {
            app_id: app_id.map(String::from),
            class: class.map(String::from),
            command: command.to_string(),
        }
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let config = Config {
            rules: vec![
                rule(Some("kitty"), None, "first"),
                rule(Some("kitty"), None, "second"),
            ],
            default_command: Some("fallback".to_string()),
            ..Default::default()
        };

        assert_eq!(config.command_for(Some("kitty"), None), Some("first"));
    }

    #[test]
    fn test_default_applies_when_nothing_matches() {
        let config = Config {
            rules: vec![rule(None, Some("Firefox"), "browser")],
            default_command: Some("fallback".to_string()),
            ..Default::default()
        };

        assert_eq!(config.command_for(Some("foot"), None), Some("fallback"));
        assert_eq!(config.command_for(None, Some("Firefox")), Some("browser"));
    }

    #[test]
    fn test_nothing_runs_without_match_or_default() {
        let config = Config {
            rules: vec![rule(Some("kitty"), None, "x")],
            ..Default::default()
        };
        assert_eq!(config.command_for(Some("foot"), None), None);
        assert_eq!(config.command_for(None, None), None);
    }

    #[test]
    fn test_rule_with_both_matchers_needs_both() {
        let both = rule(Some("steam"), Some("Steam"), "x");
        assert!(both.matches(Some("steam"), Some("Steam")));
        assert!(!both.matches(Some("steam"), None));
        assert!(!both.matches(None, Some("Steam")));
    }

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("trace".parse::<LogLevel>().unwrap().as_str(), "trace");
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
