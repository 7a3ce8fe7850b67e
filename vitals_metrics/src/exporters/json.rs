use crate::snapshot::DashboardSnapshot;
use anyhow::Result;
use std::path::Path;

pub struct JsonExporter;

impl JsonExporter {
    pub async fn export(snapshot: &DashboardSnapshot, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    pub fn to_string(snapshot: &DashboardSnapshot) -> Result<String> {
        Ok(serde_json::to_string_pretty(snapshot)?)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<DashboardSnapshot> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}
