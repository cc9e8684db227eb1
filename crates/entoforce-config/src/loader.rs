// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `/etc/entoforce/entoforce.toml` < `~/.config/entoforce/entoforce.toml`
//! < `./entoforce.toml`, with `ENTOFORCE_` environment variables on top.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::EntoforceConfig;

const SYSTEM_CONFIG: &str = "/etc/entoforce/entoforce.toml";
const LOCAL_CONFIG: &str = "entoforce.toml";

/// Section names recognised by the env provider, in `ENTOFORCE_<SECTION>_<KEY>` form.
const ENV_SECTIONS: &[&str] = &[
    "service", "telegram", "storage", "dispatch", "intake", "gateway",
];

/// Config files in merge order (earlier is overridden by later).
pub fn config_file_candidates() -> Vec<PathBuf> {
    let mut files = vec![PathBuf::from(SYSTEM_CONFIG)];
    if let Some(dir) = dirs::config_dir() {
        files.push(dir.join("entoforce/entoforce.toml"));
    }
    files.push(PathBuf::from(LOCAL_CONFIG));
    files
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
pub fn load_config() -> Result<EntoforceConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<EntoforceConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(EntoforceConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<EntoforceConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(EntoforceConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    config_file_candidates()
        .into_iter()
        .fold(
            Figment::new().merge(Serialized::defaults(EntoforceConfig::default())),
            |figment, path| figment.merge(Toml::file(path)),
        )
        .merge(env_provider())
}

/// Environment provider mapping `ENTOFORCE_DISPATCH_DEFAULT_MAX_LOAD` to
/// `dispatch.default_max_load`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// keys that contain underscores survive intact.
fn env_provider() -> Env {
    Env::prefixed("ENTOFORCE_").map(|key| {
        let key_str = key.as_str();
        let mapped = ENV_SECTIONS
            .iter()
            .find_map(|section| {
                key_str
                    .strip_prefix(section)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .map(|rest| format!("{section}.{rest}"))
            })
            .unwrap_or_else(|| key_str.to_string());
        mapped.into()
    })
}
