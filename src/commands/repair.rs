use anyhow::Result;

use crate::commands::CommandReport;
use crate::commands::verify::{self, VerifyOptions};
use crate::ledger::audit;
use crate::ledger::paths::resolve_paths;
use crate::ledger::store::LedgerStore;

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("repair");

    let store = LedgerStore::new(&paths.ledger_file);
    let out = store.rewrite_canonical()?;
    for anomaly in &out.dropped {
        report.detail(format!("dropped {}: {anomaly}", anomaly.kind()));
    }
    report.detail(format!("ledger.rewritten={}", out.rewritten));
    report.detail(format!("ledger.dates={}", out.dates));
    report.detail(format!("ledger.entries={}", out.entries));
    audit::record(
        &paths,
        "repair",
        "ok",
        &format!(
            "rewritten={} dropped={} entries={}",
            out.rewritten,
            out.dropped.len(),
            out.entries
        ),
    );

    report.merge(verify::run(&VerifyOptions { strict: true })?);
    Ok(report)
}
