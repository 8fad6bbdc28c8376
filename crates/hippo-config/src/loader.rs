// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./hippo.toml` > `~/.config/hippo/hippo.toml` > `/etc/hippo/hippo.toml`
//! with environment variable overrides via the `HIPPO_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::HippoConfig;

/// Top-level sections that environment variables may address.
const SECTIONS: &[&str] = &["agent", "brain", "embeddings", "provider"];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/hippo/hippo.toml`
/// 3. `~/.config/hippo/hippo.toml`
/// 4. `./hippo.toml`
/// 5. `HIPPO_*` environment variables
pub fn load_config() -> Result<HippoConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<HippoConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HippoConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<HippoConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HippoConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for XDG config loading.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(HippoConfig::default()))
        .merge(Toml::file("/etc/hippo/hippo.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("hippo/hippo.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("hippo.toml"))
        .merge(env_provider())
}

/// Maps a lowercased, prefix-stripped env var name to a dotted config key.
///
/// Only the leading section name is split off, so `brain_storage_dir`
/// becomes `brain.storage_dir` and never `brain.storage.dir`.
pub fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

fn env_provider() -> Env {
    Env::prefixed("HIPPO_").map(|key| map_env_key(key.as_str()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_split_on_section_only() {
        assert_eq!(map_env_key("brain_storage_dir"), "brain.storage_dir");
        assert_eq!(map_env_key("embeddings_api_key"), "embeddings.api_key");
        assert_eq!(map_env_key("provider_max_tokens"), "provider.max_tokens");
        assert_eq!(map_env_key("agent_log_level"), "agent.log_level");
    }

    #[test]
    fn unknown_sections_pass_through() {
        assert_eq!(map_env_key("unrelated"), "unrelated");
        assert_eq!(map_env_key("brainy_thing"), "brainy_thing");
    }
}
