use anyhow::{bail, Result};
use contactflow_core::normalize::social;

pub fn run(url: &str) -> Result<()> {
    let Some(platform) = social::detect_platform(url) else {
        bail!("'{}' does not match a supported social platform", url);
    };
    let profile = social::normalize_profile(platform, url)?;
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}
