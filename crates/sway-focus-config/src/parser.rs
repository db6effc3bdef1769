//! KDL configuration parser

use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::model::*;

/// Parse a configuration file from the given path
pub fn parse_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parse configuration from a string
pub fn parse_config_str(content: &str) -> Result<Config, ConfigError> {
    let doc: kdl::KdlDocument = content.parse().map_err(|e: kdl::KdlError| {
        // kdl carries its own miette version; rebuild the span from offset/len
        let span = miette::SourceSpan::from((e.span.offset(), e.span.len()));
        ConfigError::ParseError {
            src: content.to_string(),
            span,
            source: e,
        }
    })?;

    let mut config = Config::default();

    for node in doc.nodes() {
        match node.name().value() {
            "global" => {
                config.global = parse_global(node)?;
            }
            "rule" => {
                config.rules.push(parse_rule(node, content)?);
            }
            "default" => {
                if config.default_command.is_some() {
                    return Err(ConfigError::Invalid {
                        message: "only one `default` node is allowed".to_string(),
                    });
                }
                config.default_command = Some(required_command(node, content)?);
            }
            name => {
                tracing::warn!("Unknown top-level node: {}", name);
            }
        }
    }

    Ok(config)
}

fn parse_global(node: &kdl::KdlNode) -> Result<GlobalConfig, ConfigError> {
    let mut global = GlobalConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            let value = child.entries().first().map(|entry| entry.value());

            match child.name().value() {
                "log-level" => {
                    if let Some(val) = value.and_then(|v| v.as_string()) {
                        global.log_level = val
                            .parse()
                            .map_err(|e| ConfigError::Invalid { message: e })?;
                    }
                }
                "socket" => {
                    if let Some(val) = value.and_then(|v| v.as_string()) {
                        global.socket = Some(PathBuf::from(shellexpand::tilde(val).into_owned()));
                    }
                }
                "timeout-ms" => {
                    let ms = value
                        .and_then(|v| v.as_i64())
                        .filter(|ms| *ms > 0)
                        .ok_or_else(|| ConfigError::Invalid {
                            message: "timeout-ms must be a positive integer".to_string(),
                        })?;
                    global.timeout_ms = ms as u64;
                }
                name => {
                    tracing::warn!("Unknown global config option: {}", name);
                }
            }
        }
    }

    Ok(global)
}

fn parse_rule(node: &kdl::KdlNode, source: &str) -> Result<FocusRule, ConfigError> {
    let rule = FocusRule {
        app_id: string_property(node, "app-id").map(String::from),
        class: string_property(node, "class").map(String::from),
        command: required_command(node, source)?,
    };

    if rule.app_id.is_none() && rule.class.is_none() {
        return Err(missing_field(node, source, "app-id or class"));
    }

    for entry in node.entries() {
        match entry.name().map(|name| name.value()) {
            Some("app-id" | "class" | "command") => {}
            Some(name) => tracing::warn!("Unknown rule property: {}", name),
            None => tracing::warn!("Ignoring positional argument on rule"),
        }
    }

    Ok(rule)
}

fn required_command(node: &kdl::KdlNode, source: &str) -> Result<String, ConfigError> {
    string_property(node, "command")
        .filter(|command| !command.trim().is_empty())
        .map(String::from)
        .ok_or_else(|| missing_field(node, source, "command"))
}

/// Value of the string property `key`, e.g. `app-id="kitty"`
fn string_property<'a>(node: &'a kdl::KdlNode, key: &str) -> Option<&'a str> {
    node.entries()
        .iter()
        .filter(|entry| entry.name().map(|name| name.value()) == Some(key))
        .last()
        .and_then(|entry| entry.value().as_string())
}

fn missing_field(node: &kdl::KdlNode, source: &str, field: &str) -> ConfigError {
    let span = node.name().span();
    ConfigError::MissingField {
        field: format!("{} (on `{}`)", field, node.name().value()),
        src: source.to_string(),
        span: miette::SourceSpan::from((span.offset(), span.len())),
    }
}
