use anyhow::{Context, Result};
use contactflow_core::OrchestratorConfig;
use contactflow_infrastructure::ConfigLoader;
use std::path::PathBuf;

pub fn show(explicit: Option<PathBuf>) -> Result<()> {
    let config = ConfigLoader::new(explicit)
        .load()
        .context("Failed to load configuration")?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

pub fn path(explicit: Option<PathBuf>) -> Result<()> {
    match ConfigLoader::new(explicit).path() {
        Some(path) => println!("{}", path.display()),
        None => println!("(no configuration directory on this platform)"),
    }
    Ok(())
}

pub fn init(explicit: Option<PathBuf>) -> Result<()> {
    let loader = ConfigLoader::new(explicit);
    let path = loader
        .path()
        .context("No configuration path could be resolved")?
        .to_path_buf();
    if path.exists() {
        println!("Configuration already exists at {}", path.display());
        return Ok(());
    }
    loader
        .save(&OrchestratorConfig::default())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("✅ Wrote default configuration to {}", path.display());
    Ok(())
}
