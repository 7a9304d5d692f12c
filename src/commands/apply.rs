use anyhow::Result;
use std::path::PathBuf;

use crate::commands::CommandReport;
use crate::commands::export::export_with_warning;
use crate::ledger::audit;
use crate::ledger::config::load_config;
use crate::ledger::paths::resolve_paths;
use crate::ledger::record::load_records;
use crate::ledger::resolve::ScriptDownloader;
use crate::ledger::store::LedgerStore;

#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    pub record_files: Vec<PathBuf>,
    pub export: bool,
}

pub fn run(opts: &ApplyOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;
    let mut report = CommandReport::new("apply");

    let store = LedgerStore::new(&paths.ledger_file);
    let downloader = ScriptDownloader::from_config(&cfg.downloader);
    report.detail(format!("ledger_file={}", store.path().display()));
    report.detail(format!("save_dir={}", paths.save_dir.display()));

    let mut applied = 0usize;
    let mut last_sha256 = None;
    for file in &opts.record_files {
        let records = match load_records(file) {
            Ok(records) => records,
            Err(err) => {
                report.issue(format!("{err:#}"));
                continue;
            }
        };

        // One apply per record: each re-reads and rewrites the ledger.
        for record in &records {
            match store.apply(record, &downloader, &paths.save_dir) {
                Ok(out) => {
                    applied += 1;
                    let line = format!(
                        "record seq={} date={} outcome={} folder={} video={} cover1={} cover2={}",
                        out.apply.sequence,
                        out.apply.date_key,
                        out.apply.outcome.as_str(),
                        out.media_folder.display(),
                        out.media.video,
                        out.media.portrait_cover,
                        out.media.landscape_cover
                    );
                    if out.apply.dropped_segments > 0 {
                        report.detail(format!(
                            "ledger.dropped_segments={}",
                            out.apply.dropped_segments
                        ));
                    }
                    audit::record(&paths, "apply", "ok", &line);
                    report.detail(line);
                    last_sha256 = Some(out.apply.sha256);
                }
                Err(err) => {
                    let line = format!("record seq={} failed: {err:#}", record.seq);
                    audit::record(&paths, "apply", "error", &line);
                    report.issue(line);
                }
            }
        }
    }
    report.detail(format!("records_applied={applied}"));
    if let Some(sha) = last_sha256 {
        report.detail(format!("ledger.sha256={sha}"));
    }

    if applied > 0 && opts.export && cfg.export.enabled {
        export_with_warning(&paths, &cfg, &mut report);
    }

    Ok(report)
}
