use anyhow::Result;
use std::env;
use std::path::PathBuf;

pub const LEDGER_FILE_NAME: &str = "booking_info.md";

#[derive(Debug, Clone)]
pub struct LedgerPaths {
    pub ledger_home: PathBuf,
    pub save_dir: PathBuf,
    pub ledger_file: PathBuf,
    pub logs_dir: PathBuf,
}

impl LedgerPaths {
    pub fn audit_log(&self) -> PathBuf {
        self.logs_dir.join("audit.log")
    }
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<LedgerPaths> {
    let ledger_home = match env::var("LEDGER_HOME") {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => required_home_dir()?.join("booking-ledger"),
    };

    let save_dir = env_or_default_path("LEDGER_SAVE_DIR", ledger_home.join("output"));
    let ledger_file = env_or_default_path("LEDGER_FILE", save_dir.join(LEDGER_FILE_NAME));
    let logs_dir = env_or_default_path("LEDGER_LOGS_DIR", ledger_home.join("logs"));

    Ok(LedgerPaths {
        ledger_home,
        save_dir,
        ledger_file,
        logs_dir,
    })
}
