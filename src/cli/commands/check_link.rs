//! Probe one stream URL the way a sweep would

use crate::config::Config;
use crate::services::{LinkStatus, StreamValidator};
use crate::state::build_validator;

use super::ctrl_c_token;

pub async fn cmd_check_link(config: &Config, url: &str) -> anyhow::Result<()> {
    let validator = build_validator(config)?;
    if !validator.is_enabled() {
        println!("URL validation is disabled in config; every link counts as valid.");
    }

    let token = ctrl_c_token();
    match validator.validate(url, &token).await? {
        LinkStatus::Valid => println!("✓ Valid: {url}"),
        LinkStatus::Invalid(reason) => println!("✗ Invalid ({reason}): {url}"),
    }
    Ok(())
}
