use crate::config::{ConfigFile, EngineConfig};
use anyhow::Result;
use std::path::Path;
use tracing::debug;

pub async fn parse_config_from_file(path: impl AsRef<Path>) -> Result<EngineConfig> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path).await?;

    let extension = path.extension().and_then(|s| s.to_str());
    debug!("Loading engine config from {}", path.display());

    match extension {
        Some("yaml") | Some("yml") => parse_yaml(&contents),
        Some("toml") => parse_toml(&contents),
        Some("json") => parse_json(&contents),
        _ => Err(anyhow::anyhow!(
            "Unsupported file format. Use .yaml, .yml, .toml, or .json"
        )),
    }
}

pub fn parse_config_from_str(content: &str, format: &str) -> Result<EngineConfig> {
    match format.to_lowercase().as_str() {
        "yaml" | "yml" => parse_yaml(content),
        "toml" => parse_toml(content),
        "json" => parse_json(content),
        _ => Err(anyhow::anyhow!("Unsupported format: {}", format)),
    }
}

fn parse_yaml(content: &str) -> Result<EngineConfig> {
    let config: EngineConfig = serde_yaml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

fn parse_toml(content: &str) -> Result<EngineConfig> {
    let file: ConfigFile = toml::from_str(content)?;
    file.engine.validate()?;
    Ok(file.engine)
}

fn parse_json(content: &str) -> Result<EngineConfig> {
    let config: EngineConfig = serde_json::from_str(content)?;
    config.validate()?;
    Ok(config)
}
