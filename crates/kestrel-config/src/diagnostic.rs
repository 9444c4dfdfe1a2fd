// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns figment errors into miette diagnostics for `kestrel.toml`.
//!
//! Every diagnostic names the section it belongs to and, when the offending
//! key can be found in a loaded file, points at it. Unknown keys get a
//! Jaro-Winkler "did you mean" suggestion, and a key written under the
//! wrong table (`timeout_secs` under `[agent]`) is reported with the table it
//! actually lives in.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity for a suggestion. Catches `naem` -> `name`
/// and `memroy_window` -> `memory_window` without proposing unrelated keys.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// The tables of `kestrel.toml` and the keys each accepts.
///
/// Mirrors [`crate::model::KestrelConfig`]; a test keeps the two in step.
pub const SECTION_KEYS: &[(&str, &[&str])] = &[
    (
        "agent",
        &[
            "name",
            "log_level",
            "workspace",
            "system_prompt",
            "system_prompt_file",
            "max_tool_iterations",
            "memory_window",
            "consolidation_enabled",
            "max_tool_result_chars",
        ],
    ),
    (
        "provider",
        &[
            "api_key",
            "api_base",
            "model",
            "temperature",
            "max_tokens",
            "max_retries",
            "retry_base_delay_ms",
            "request_timeout_secs",
        ],
    ),
    (
        "approval",
        &[
            "enabled",
            "strict_mode",
            "timeout_secs",
            "memory_window_secs",
            "overrides",
        ],
    ),
    ("cron", &["enabled", "store_path"]),
    (
        "gateway",
        &[
            "enabled",
            "bind_address",
            "port",
            "bearer_token",
            "allowed_senders",
        ],
    ),
    ("tools", &["bash_timeout_secs", "restrict_to_workspace"]),
];

/// A configuration problem, rendered Elm-style by miette.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key (or top-level table) that Kestrel does not know.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(kestrel::config::unknown_key),
        help("{}", format_unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        /// The unrecognized key as written.
        key: String,
        /// Closest valid key in the same table, if any is close enough.
        suggestion: Option<String>,
        /// Comma-separated keys the table accepts.
        valid_keys: String,
        #[label("this key is not recognized")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A valid key placed under the wrong table.
    #[error("`{key}` is not a `[{section}]` setting")]
    #[diagnostic(
        code(kestrel::config::misplaced_key),
        help("move it under {}", format_tables(belongs_in))
    )]
    MisplacedKey {
        key: String,
        /// The table it was written under.
        section: String,
        /// Tables that do accept it.
        belongs_in: Vec<String>,
        #[label("belongs in another table")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value of the wrong type, e.g. a string for `approval.timeout_secs`.
    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(code(kestrel::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        /// Dotted path such as `approval.timeout_secs`.
        key: String,
        detail: String,
        expected: String,
        #[label("wrong type here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A key with no default that was not provided.
    #[error("missing required key `{key}`")]
    #[diagnostic(code(kestrel::config::missing_key), help("{}", format_missing_key_help(key)))]
    MissingKey {
        /// Dotted path such as `provider.model`.
        key: String,
    },

    /// A value that parsed but makes no sense (zero budgets, bad log level).
    #[error("validation error: {message}")]
    #[diagnostic(code(kestrel::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(kestrel::config::other))]
    Other(String),
}

fn format_unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

fn format_tables(tables: &[String]) -> String {
    tables
        .iter()
        .map(|t| format!("`[{t}]`"))
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Points at both ways of supplying a missing value.
fn format_missing_key_help(key: &str) -> String {
    match key.split_once('.') {
        Some((section, field)) => format!(
            "add `{field} = <value>` under `[{section}]` in kestrel.toml, or set {}",
            env_var_for(section, field)
        ),
        None => format!("add `{key} = <value>` to kestrel.toml"),
    }
}

/// The `KESTREL_<SECTION>_<KEY>` variable that overrides a key.
pub fn env_var_for(section: &str, field: &str) -> String {
    format!(
        "KESTREL_{}_{}",
        section.to_uppercase(),
        field.to_uppercase()
    )
}

/// Keys accepted by a table, `None` for tables Kestrel does not have.
pub fn keys_for_section(section: &str) -> Option<&'static [&'static str]> {
    SECTION_KEYS
        .iter()
        .find(|(name, _)| *name == section)
        .map(|(_, keys)| *keys)
}

/// Tables other than `current` that accept `key`.
fn other_sections_with(key: &str, current: &str) -> Vec<String> {
    SECTION_KEYS
        .iter()
        .filter(|(name, keys)| *name != current && keys.contains(&key))
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Converts a figment error (which can carry several) into diagnostics.
///
/// `toml_sources` are `(path, content)` pairs used to attach spans.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| to_config_error(&error, toml_sources))
        .collect()
}

fn to_config_error(error: &figment::Error, toml_sources: &[(String, String)]) -> ConfigError {
    use figment::error::Kind;

    let path: Vec<String> = error.path.iter().map(|s| s.to_string()).collect();

    match &error.kind {
        Kind::UnknownField(field, expected) => {
            let (span, src) = locate(error, &path, field, toml_sources);
            let section = path.first().map(String::as_str);

            if let Some(section) = section {
                let belongs_in = other_sections_with(field, section);
                if !belongs_in.is_empty() {
                    return ConfigError::MisplacedKey {
                        key: field.clone(),
                        section: section.to_string(),
                        belongs_in,
                        span,
                        src,
                    };
                }
            }

            // Prefer our own table listing; figment's covers the top level.
            let valid: Vec<&str> = match section.and_then(keys_for_section) {
                Some(keys) => keys.to_vec(),
                None => expected.to_vec(),
            };
            ConfigError::UnknownKey {
                key: field.clone(),
                suggestion: suggest_key(field, &valid),
                valid_keys: valid.join(", "),
                span,
                src,
            }
        }
        Kind::MissingField(field) => {
            let mut key = path.clone();
            key.push(field.to_string());
            ConfigError::MissingKey { key: key.join(".") }
        }
        Kind::InvalidType(actual, expected) => {
            let (span, src) = match path.split_last() {
                Some((field, section)) => locate(error, section, field, toml_sources),
                None => (None, None),
            };
            ConfigError::InvalidType {
                key: path.join("."),
                detail: format!("found {actual}, expected {expected}"),
                expected: expected.to_string(),
                span,
                src,
            }
        }
        _ => ConfigError::Other(error.to_string()),
    }
}

/// Finds `field` under `section` in the file the error came from.
fn locate(
    error: &figment::Error,
    section: &[String],
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let origin = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });

    // Inline strings carry no file origin; a lone source must be it.
    let source = match origin {
        Some(path) => toml_sources.iter().find(|(p, _)| *p == path),
        None if toml_sources.len() == 1 => toml_sources.first(),
        None => None,
    };
    let Some((path, content)) = source else {
        return (None, None);
    };

    match find_key_offset(content, section, field) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(path, content.clone())),
        ),
        None => (None, None),
    }
}

/// Byte offset of `field` within the `[section]` table of `content`.
///
/// An empty `section` searches from the top of the file. Only lines that
/// assign the key (`field =`, `field=`) match, so a value mentioning the key
/// name is not mistaken for it.
pub fn find_key_offset(content: &str, section: &[String], field: &str) -> Option<usize> {
    let start = match section.first() {
        None => 0,
        Some(name) => {
            let header = format!("[{name}]");
            content.find(&header)? + header.len()
        }
    };

    let mut offset = start;
    for line in content[start..].split_inclusive('\n') {
        let trimmed = line.trim_start();
        // Stop at the next table header.
        if !section.is_empty() && trimmed.starts_with('[') {
            return None;
        }
        if let Some(rest) = trimmed.strip_prefix(field)
            && rest.trim_start().starts_with('=')
        {
            return Some(offset + line.len() - trimmed.len());
        }
        offset += line.len();
    }
    None
}

/// Closest key in `valid_keys` by Jaro-Winkler similarity, if close enough.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Prints every error to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        match handler.render_report(&mut buf, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{buf}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KestrelConfig;

    fn section(name: &str) -> Vec<String> {
        vec![name.to_string()]
    }

    #[test]
    fn section_table_covers_the_model() {
        let value = toml::Value::try_from(KestrelConfig::default()).unwrap();
        let tables = value.as_table().unwrap();
        for (name, table) in tables {
            let keys = keys_for_section(name).unwrap_or_else(|| panic!("no keys for [{name}]"));
            for key in table.as_table().unwrap().keys() {
                assert!(keys.contains(&key.as_str()), "[{name}] {key} missing");
            }
        }
        assert_eq!(tables.len(), SECTION_KEYS.len());
    }

    #[test]
    fn suggests_agent_keys() {
        let agent = keys_for_section("agent").unwrap();
        assert_eq!(suggest_key("naem", agent), Some("name".to_string()));
        assert_eq!(
            suggest_key("memroy_window", agent),
            Some("memory_window".to_string())
        );
        assert_eq!(suggest_key("zzzzzz", agent), None);
    }

    #[test]
    fn suggests_approval_timeout() {
        let approval = keys_for_section("approval").unwrap();
        assert_eq!(
            suggest_key("timout_secs", approval),
            Some("timeout_secs".to_string())
        );
    }

    #[test]
    fn shared_keys_are_found_in_every_other_table() {
        assert_eq!(other_sections_with("enabled", "cron"), vec!["approval", "gateway"]);
        assert_eq!(other_sections_with("timeout_secs", "agent"), vec!["approval"]);
        assert!(other_sections_with("naem", "agent").is_empty());
    }

    #[test]
    fn missing_key_help_names_the_env_var() {
        let help = format_missing_key_help("provider.model");
        assert!(help.contains("under `[provider]`"));
        assert!(help.contains("KESTREL_PROVIDER_MODEL"));
    }

    #[test]
    fn find_key_offset_stays_inside_its_table() {
        let content = "[provider]\nmodl = \"a\"\n\n[cron]\nmodl = \"b\"\n";
        let o = find_key_offset(content, &section("cron"), "modl").unwrap();
        assert!(o > content.find("[cron]").unwrap());
        assert_eq!(&content[o..o + 4], "modl");
        assert_eq!(find_key_offset(content, &section("tools"), "modl"), None);
    }

    #[test]
    fn find_key_offset_ignores_keys_in_later_tables() {
        let content = "[agent]\nname = \"wren\"\n[approval]\ntimeout_secs = 5\n";
        assert_eq!(find_key_offset(content, &section("agent"), "timeout_secs"), None);
    }

    #[test]
    fn find_key_offset_requires_assignment() {
        let content = "[agent]\nname_hint = 1\nname=\"x\"\n";
        let o = find_key_offset(content, &section("agent"), "name").unwrap();
        assert_eq!(&content[o..o + 6], "name=\"");
    }
}
