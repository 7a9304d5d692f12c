use anyhow::Result;
use std::env;

use crate::commands::CommandReport;
use crate::ledger::config::{config_file_path, load_config};
use crate::ledger::document::Document;
use crate::ledger::paths::resolve_paths;
use crate::ledger::store::{LedgerStore, sha256_hex};

include!(concat!(env!("OUT_DIR"), "/ledger_env_allowlist.rs"));

fn overridden_env_keys() -> Vec<&'static str> {
    GENERATED_ENV_ALLOWLIST
        .iter()
        .copied()
        .filter(|key| env::var_os(key).is_some_and(|v| !v.is_empty()))
        .collect()
}

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("status");

    report.detail(format!("build_id={}", env!("BUILD_UUID")));
    report.detail(format!("ledger_home={}", paths.ledger_home.display()));
    report.detail(format!("save_dir={}", paths.save_dir.display()));
    report.detail(format!("ledger_file={}", paths.ledger_file.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));
    report.detail(format!("config_file={}", config_file_path(&paths).display()));
    let overridden = overridden_env_keys();
    if !overridden.is_empty() {
        report.detail(format!("env.overrides={}", overridden.join(",")));
    }

    match load_config(&paths) {
        Ok(cfg) => {
            report.detail(format!(
                "downloader.script_dir={}",
                cfg.downloader.script_dir.as_deref().unwrap_or("unset")
            ));
            report.detail(format!("downloader.timeout_secs={}", cfg.downloader.timeout_secs));
            report.detail(format!("export.enabled={}", cfg.export.enabled));
            report.detail(format!("export.format={}", cfg.export.format));
        }
        Err(err) => report.issue(format!("config: {err:#}")),
    }

    if !paths.ledger_file.exists() {
        report.detail("ledger.exists=false");
        return Ok(report);
    }

    let text = LedgerStore::new(&paths.ledger_file).read_text()?;
    let outcome = Document::parse(&text);
    report.detail("ledger.exists=true");
    report.detail(format!("ledger.dates={}", outcome.document.date_count()));
    report.detail(format!("ledger.entries={}", outcome.document.entry_count()));
    if let Some(latest) = outcome.document.dates_descending().next() {
        report.detail(format!("ledger.latest_date={latest}"));
        if let Some(entry) = outcome
            .document
            .group(latest)
            .and_then(|group| group.iter_descending().next())
        {
            report.detail(format!("ledger.latest_entry={}", entry.header()));
        }
    }
    report.detail(format!("ledger.sha256={}", sha256_hex(&text)));
    if !outcome.anomalies.is_empty() {
        report.detail(format!(
            "ledger.unreadable_segments={} (run `verify` for details)",
            outcome.anomalies.len()
        ));
    }

    Ok(report)
}
