use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::fs;

/// `allotment_diagnostics_2025-01-31T09-15-02-250Z.json`
pub fn report_filename(now: DateTime<Utc>) -> String {
    format!(
        "allotment_diagnostics_{}.json",
        now.format("%Y-%m-%dT%H-%M-%S-%3fZ")
    )
}

pub async fn write_report(
    dir: &Path,
    report: &Value,
    now: DateTime<Utc>,
) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create diagnostics dir '{}'", dir.display()))?;
    let path = dir.join(report_filename(now));
    let body = serde_json::to_string_pretty(report).context("failed to encode diagnostics")?;
    fs::write(&path, body)
        .await
        .with_context(|| format!("failed to write diagnostics to '{}'", path.display()))?;
    Ok(path)
}
