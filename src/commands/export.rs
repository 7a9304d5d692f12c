use anyhow::Result;

use crate::commands::CommandReport;
use crate::ledger::audit;
use crate::ledger::config::{LedgerConfig, load_config};
use crate::ledger::export::export_ledger;
use crate::ledger::paths::{LedgerPaths, resolve_paths};

/// Export the ledger; a failure becomes a warning detail, never an issue.
pub fn export_with_warning(paths: &LedgerPaths, cfg: &LedgerConfig, report: &mut CommandReport) {
    match export_ledger(&paths.ledger_file, &cfg.export) {
        Ok(target) => {
            report.detail(format!("export.path={}", target.display()));
            audit::record(paths, "export", "ok", &target.display().to_string());
        }
        Err(err) => {
            let err_text = format!("{err:#}");
            tracing::warn!(
                ledger = %paths.ledger_file.display(),
                error = %err_text,
                "ledger export skipped"
            );
            report.detail(format!("export.warning={err_text}"));
            audit::record(paths, "export", "warn", &err_text);
        }
    }
}

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;
    let mut report = CommandReport::new("export");

    report.detail(format!("ledger_file={}", paths.ledger_file.display()));
    report.detail(format!("export.format={}", cfg.export.format));
    if !paths.ledger_file.exists() {
        report.issue("ledger file does not exist yet; run `apply` first");
        return Ok(report);
    }

    export_with_warning(&paths, &cfg, &mut report);
    Ok(report)
}
