use crate::error::LedgerError;
use crate::ledger::paths::LedgerPaths;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloaderConfig {
    #[serde(default)]
    pub script_dir: Option<String>,
    #[serde(default)]
    pub python_bin: Option<String>,
    #[serde(default = "default_download_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_cloud_base_url")]
    pub cloud_base_url: String,
}

fn default_download_timeout_secs() -> u64 {
    1_800
}

fn default_cloud_base_url() -> String {
    "https://cloud.tsinghua.edu.cn".to_string()
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            script_dir: None,
            python_bin: None,
            timeout_secs: default_download_timeout_secs(),
            cloud_base_url: default_cloud_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub enabled: bool,
    pub format: String,
    pub pandoc_bin: Option<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: "pdf".to_string(),
            pandoc_bin: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LedgerConfig {
    pub downloader: DownloaderConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialLedgerConfig {
    downloader: Option<DownloaderConfig>,
    export: Option<ExportConfig>,
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => match v.trim() {
            "1" | "true" | "TRUE" | "yes" | "on" => true,
            "0" | "false" | "FALSE" | "no" | "off" => false,
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_or_optional(var: &str, fallback: Option<String>) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => fallback,
    }
}

fn validate(cfg: &LedgerConfig) -> Result<()> {
    if cfg.downloader.timeout_secs == 0 {
        return Err(LedgerError::InvalidConfig(
            "download timeout must be >= 1 second".to_string(),
        )
        .into());
    }
    let base = cfg.downloader.cloud_base_url.trim();
    if !(base.starts_with("https://") || base.starts_with("http://")) {
        return Err(LedgerError::InvalidConfig(format!(
            "cloud base url must be http(s): `{base}`"
        ))
        .into());
    }
    let format = cfg.export.format.trim();
    if format.is_empty() || !format.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        return Err(LedgerError::InvalidConfig(format!(
            "export format must be a plain extension like `pdf`: `{format}`"
        ))
        .into());
    }
    Ok(())
}

pub fn config_file_path(paths: &LedgerPaths) -> PathBuf {
    if let Ok(custom) = env::var("LEDGER_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    paths.ledger_home.join("ledger.toml")
}

fn merge_file_config(base: &mut LedgerConfig, paths: &LedgerPaths) -> Result<()> {
    let path = config_file_path(paths);
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)
        .map_err(|err| anyhow!("failed to read ledger config {}: {err}", path.display()))?;
    let parsed = parse_partial(&raw)
        .map_err(|err| anyhow!("failed to parse ledger config {}: {err}", path.display()))?;
    apply_partial(base, parsed);
    Ok(())
}

fn parse_partial(raw: &str) -> Result<PartialLedgerConfig, toml::de::Error> {
    toml::from_str(raw)
}

fn apply_partial(base: &mut LedgerConfig, parsed: PartialLedgerConfig) {
    if let Some(downloader) = parsed.downloader {
        base.downloader = downloader;
    }
    if let Some(export) = parsed.export {
        base.export = export;
    }
}

pub fn load_config(paths: &LedgerPaths) -> Result<LedgerConfig> {
    let mut cfg = LedgerConfig::default();
    merge_file_config(&mut cfg, paths)?;

    cfg.downloader.script_dir =
        env_or_optional("LEDGER_DOWNLOADER_DIR", cfg.downloader.script_dir.take());
    cfg.downloader.python_bin =
        env_or_optional("LEDGER_DOWNLOADER_PYTHON", cfg.downloader.python_bin.take());
    cfg.downloader.timeout_secs =
        env_or_u64("LEDGER_DOWNLOAD_TIMEOUT_SECS", cfg.downloader.timeout_secs);
    cfg.downloader.cloud_base_url =
        env_or_string("LEDGER_CLOUD_BASE_URL", &cfg.downloader.cloud_base_url);
    cfg.export.enabled = env_or_bool("LEDGER_EXPORT_ENABLED", cfg.export.enabled);
    cfg.export.format = env_or_string("LEDGER_EXPORT_FORMAT", &cfg.export.format);
    cfg.export.pandoc_bin = env_or_optional("LEDGER_PANDOC_BIN", cfg.export.pandoc_bin.take());

    validate(&cfg)?;
    Ok(cfg)
}
