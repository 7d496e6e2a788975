use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use serde::Deserialize;
use shared::domain::{BoundingBox, GeoPoint, GraphDetail};
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "console.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleSettings {
    /// Validated with [`parse_backend_url`] whenever it is set.
    pub backend_url: String,
    pub request_timeout_secs: u64,
    pub graph_detail: GraphDetail,
    pub use_cache: bool,
    /// Area sent with graph build requests.
    pub view: BoundingBox,
    pub simulation_seed: Option<u64>,
    pub diagnostics_dir: PathBuf,
    pub log_filter: String,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:8080".into(),
            request_timeout_secs: 120,
            graph_detail: GraphDetail::Medium,
            use_cache: true,
            view: BoundingBox::around(GeoPoint::new(26.2740, 73.0360), 0.15, 0.2),
            simulation_seed: None,
            diagnostics_dir: PathBuf::from("."),
            log_filter: "info".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    backend_url: Option<String>,
    request_timeout_secs: Option<u64>,
    graph_detail: Option<GraphDetail>,
    use_cache: Option<bool>,
    view: Option<BoundingBox>,
    simulation_seed: Option<u64>,
    diagnostics_dir: Option<PathBuf>,
    log_filter: Option<String>,
}

/// Defaults, then the TOML file, then environment overrides. A missing
/// default file is fine; a missing file named explicitly is not.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<ConsoleSettings> {
    let mut settings = ConsoleSettings::default();

    let path = config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    match fs::read_to_string(path) {
        Ok(raw) => {
            let file_cfg = toml::from_str::<FileConfig>(&raw)
                .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
            apply_file(&mut settings, file_cfg)?;
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound && config_path.is_none() => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()));
        }
    }

    apply_env(&mut settings, |name| std::env::var(name).ok())?;
    Ok(settings)
}

pub fn parse_backend_url(raw: &str) -> anyhow::Result<Url> {
    let url = Url::parse(raw.trim()).with_context(|| format!("invalid backend url '{raw}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("backend url '{raw}' must use http or https");
    }
    Ok(url)
}

fn checked_url(raw: &str) -> anyhow::Result<String> {
    parse_backend_url(raw)?;
    Ok(raw.trim().to_string())
}

fn apply_file(settings: &mut ConsoleSettings, file_cfg: FileConfig) -> anyhow::Result<()> {
    if let Some(v) = file_cfg.backend_url {
        settings.backend_url = checked_url(&v)?;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = file_cfg.graph_detail {
        settings.graph_detail = v;
    }
    if let Some(v) = file_cfg.use_cache {
        settings.use_cache = v;
    }
    if let Some(v) = file_cfg.view {
        if !v.is_well_formed() {
            bail!("config view bounds are malformed: {v:?}");
        }
        settings.view = v;
    }
    if let Some(v) = file_cfg.simulation_seed {
        settings.simulation_seed = Some(v);
    }
    if let Some(v) = file_cfg.diagnostics_dir {
        settings.diagnostics_dir = v;
    }
    if let Some(v) = file_cfg.log_filter {
        settings.log_filter = v;
    }
    Ok(())
}

fn apply_env(
    settings: &mut ConsoleSettings,
    var: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = var("ALLOT_BACKEND_URL") {
        settings.backend_url = checked_url(&v)?;
    }
    if let Some(v) = var("APP__BACKEND_URL") {
        settings.backend_url = checked_url(&v)?;
    }

    if let Some(v) = var("APP__REQUEST_TIMEOUT_SECS") {
        settings.request_timeout_secs = v
            .trim()
            .parse()
            .with_context(|| format!("APP__REQUEST_TIMEOUT_SECS is not a number: '{v}'"))?;
    }

    if let Some(v) = var("APP__GRAPH_DETAIL") {
        settings.graph_detail = v.parse().map_err(anyhow::Error::msg)?;
    }

    if let Some(v) = var("APP__USE_CACHE") {
        settings.use_cache = match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            other => bail!("APP__USE_CACHE must be a boolean, got '{other}'"),
        };
    }

    if let Some(v) = var("APP__SIMULATION_SEED") {
        settings.simulation_seed = Some(
            v.trim()
                .parse()
                .with_context(|| format!("APP__SIMULATION_SEED is not a number: '{v}'"))?,
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    fn temp_config(contents: &str) -> PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("allot_console_test_{suffix}.toml"));
        fs::write(&path, contents).expect("write config");
        path
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_point_at_local_backend() {
        let settings = ConsoleSettings::default();
        assert_eq!(settings.backend_url, "http://localhost:8080");
        assert!(parse_backend_url(&settings.backend_url).is_ok());
        assert_eq!(settings.request_timeout_secs, 120);
        assert_eq!(settings.graph_detail, GraphDetail::Medium);
        assert!(settings.use_cache);
        assert!(settings.view.is_well_formed());
        assert!(settings.view.min_lat < 26.2740 && 26.2740 < settings.view.max_lat);
    }

    #[test]
    fn file_values_override_defaults() {
        let path = temp_config(
            r#"
backend_url = "http://10.0.0.5:9000"
graph_detail = "high"
use_cache = false
simulation_seed = 42

[view]
min_lat = 26.0
min_lon = 72.9
max_lat = 26.5
max_lon = 73.2
"#,
        );
        let mut settings = ConsoleSettings::default();
        let raw = fs::read_to_string(&path).expect("read");
        apply_file(&mut settings, toml::from_str(&raw).expect("parse")).expect("apply");
        fs::remove_file(path).expect("cleanup");

        assert_eq!(settings.backend_url, "http://10.0.0.5:9000");
        assert_eq!(settings.graph_detail, GraphDetail::High);
        assert!(!settings.use_cache);
        assert_eq!(settings.simulation_seed, Some(42));
        assert_eq!(settings.view.max_lon, 73.2);
        assert_eq!(settings.request_timeout_secs, 120);
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        assert!(toml::from_str::<FileConfig>("backend = \"x\"").is_err());
    }

    #[test]
    fn app_prefixed_url_wins_over_legacy_name() {
        let mut settings = ConsoleSettings::default();
        apply_env(
            &mut settings,
            vars(&[
                ("ALLOT_BACKEND_URL", "http://legacy:8080"),
                ("APP__BACKEND_URL", "https://allot.example:8443"),
                ("APP__USE_CACHE", "off"),
                ("APP__GRAPH_DETAIL", "LOW"),
                ("APP__REQUEST_TIMEOUT_SECS", "30"),
            ]),
        )
        .expect("env");
        assert_eq!(settings.backend_url, "https://allot.example:8443");
        assert!(!settings.use_cache);
        assert_eq!(settings.graph_detail, GraphDetail::Low);
        assert_eq!(settings.request_timeout_secs, 30);
    }

    #[test]
    fn malformed_env_values_are_errors() {
        let mut settings = ConsoleSettings::default();
        assert!(apply_env(&mut settings, vars(&[("APP__SIMULATION_SEED", "abc")])).is_err());
        assert!(apply_env(&mut settings, vars(&[("APP__USE_CACHE", "maybe")])).is_err());
        assert!(apply_env(&mut settings, vars(&[("APP__BACKEND_URL", "ftp://host")])).is_err());
        assert_eq!(settings, ConsoleSettings::default());
    }

    #[test]
    fn explicit_missing_config_file_is_an_error() {
        let missing = env::temp_dir().join("allot_console_definitely_missing.toml");
        assert!(load_settings(Some(&missing)).is_err());
    }
}
