//! `parley config`: print the effective configuration.

use parley_config::AppConfig;

pub fn show(config: &AppConfig) -> anyhow::Result<()> {
    println!("# {}", AppConfig::config_dir().join("config.toml").display());
    println!("{}", config.to_toml()?);
    Ok(())
}
