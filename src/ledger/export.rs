use crate::error::LedgerError;
use crate::ledger::config::ExportConfig;
use crate::ledger::util::run_command_with_optional_timeout;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

const EXPORT_TIMEOUT_SECS: u64 = 300;

fn resolve_pandoc_bin(cfg: &ExportConfig) -> Result<PathBuf> {
    if let Some(bin) = cfg.pandoc_bin.as_deref() {
        let path = PathBuf::from(bin);
        if path.exists() {
            return Ok(path);
        }
        return which::which(bin).map_err(|_| {
            LedgerError::ExportFailed(format!("pandoc binary `{bin}` not found")).into()
        });
    }
    which::which("pandoc")
        .map_err(|_| LedgerError::ExportFailed("pandoc not found on PATH".to_string()).into())
}

pub fn export_path(ledger: &Path, cfg: &ExportConfig) -> PathBuf {
    ledger.with_extension(cfg.format.trim())
}

/// Convert the ledger with pandoc. Callers treat failure as a warning.
pub fn export_ledger(ledger: &Path, cfg: &ExportConfig) -> Result<PathBuf> {
    if !ledger.is_file() {
        return Err(
            LedgerError::ExportFailed(format!("{} does not exist", ledger.display())).into(),
        );
    }
    let bin = resolve_pandoc_bin(cfg)?;
    let target = export_path(ledger, cfg);

    let mut cmd = Command::new(&bin);
    cmd.arg(ledger).arg("-o").arg(&target);
    let output = run_command_with_optional_timeout(&mut cmd, Some(EXPORT_TIMEOUT_SECS))
        .with_context(|| format!("failed to run `{}`", bin.display()))?;
    if !output.status.success() {
        return Err(LedgerError::ExportFailed(format!(
            "pandoc exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ))
        .into());
    }
    tracing::info!(target = %target.display(), "ledger exported");
    Ok(target)
}
