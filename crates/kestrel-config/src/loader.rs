// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./kestrel.toml` > `~/.config/kestrel/kestrel.toml` >
//! `/etc/kestrel/kestrel.toml` with environment variable overrides via `KESTREL_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::KestrelConfig;

/// Sections recognised in `KESTREL_<SECTION>_<KEY>` environment variables.
const ENV_SECTIONS: &[&str] = &["agent", "provider", "approval", "cron", "gateway", "tools"];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/kestrel/kestrel.toml`
/// 3. `~/.config/kestrel/kestrel.toml`
/// 4. `./kestrel.toml`
/// 5. `KESTREL_*` environment variables
pub fn load_config() -> Result<KestrelConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<KestrelConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KestrelConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<KestrelConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KestrelConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the layered Figment before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(KestrelConfig::default()))
        .merge(Toml::file("/etc/kestrel/kestrel.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("kestrel/kestrel.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("kestrel.toml"))
        .merge(env_provider())
}

/// Maps `KESTREL_PROVIDER_API_KEY` to `provider.api_key`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names
/// themselves contain underscores.
fn env_provider() -> Env {
    Env::prefixed("KESTREL_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
