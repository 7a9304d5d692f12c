use anyhow::Result;

use crate::commands::CommandReport;
use crate::ledger::document::Document;
use crate::ledger::paths::resolve_paths;
use crate::ledger::store::LedgerStore;

#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    pub strict: bool,
}

pub fn run(opts: &VerifyOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("verify");
    report.detail(format!("ledger_file={}", paths.ledger_file.display()));

    let text = LedgerStore::new(&paths.ledger_file).read_text()?;
    let outcome = Document::parse(&text);
    report.detail(format!("ledger.dates={}", outcome.document.date_count()));
    report.detail(format!("ledger.entries={}", outcome.document.entry_count()));
    if outcome.document.is_empty() {
        report.detail("ledger.empty=true");
    }

    for anomaly in &outcome.anomalies {
        report.issue(format!("{}: {anomaly}", anomaly.kind()));
    }

    let canonical = outcome.document.serialize();
    let is_canonical = canonical == text || (canonical.is_empty() && text.trim().is_empty());
    report.detail(format!("ledger.canonical={is_canonical}"));
    if opts.strict && !is_canonical {
        report.issue("ledger is not in canonical order or spacing; run `repair`");
    }

    Ok(report)
}
