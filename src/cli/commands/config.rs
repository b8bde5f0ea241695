//! Config file bootstrap and inspection

use crate::config::Config;

const MASK: &str = "********";

pub fn cmd_config_init() -> anyhow::Result<()> {
    if Config::create_default_if_missing()? {
        println!("Created config.toml with default settings.");
        println!("Set the Sonarr API key and stream credentials before running a sweep.");
    } else {
        println!("config.toml already exists, leaving it untouched.");
    }
    Ok(())
}

pub fn cmd_config_show(config: &Config) -> anyhow::Result<()> {
    print!("{}", toml::to_string_pretty(&masked(config))?);
    Ok(())
}

/// Copy of `config` with API keys and the provider password replaced.
#[must_use]
pub fn masked(config: &Config) -> Config {
    let mut config = config.clone();
    for secret in [
        &mut config.sonarr.api_key,
        &mut config.radarr.api_key,
        &mut config.stream.password,
    ] {
        if !secret.is_empty() {
            *secret = MASK.to_string();
        }
    }
    config
}
